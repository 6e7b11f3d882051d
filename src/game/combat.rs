use super::Game;
use crate::constants::{PLAYER_BASE_DAMAGE, THEFT_CHANCE};
use crate::types::{CombatResult, Item, Position};

impl Game {
    /// Resolves every fight standing on `position`: monsters trade blows
    /// with each co-located player, then co-located players brawl among
    /// themselves when the difficulty allows it. Dead monsters leave the
    /// game immediately; dead players are swept by the caller.
    pub(crate) fn resolve_combat(&mut self, position: Position) -> Vec<CombatResult> {
        let mut results = Vec::new();

        let player_indices: Vec<usize> = (0..self.players.len())
            .filter(|&i| self.players[i].view.position == position)
            .collect();

        for &player_idx in &player_indices {
            let mut monster_idx = 0;
            while monster_idx < self.monsters.len() {
                if self.monsters[monster_idx].view.position != position {
                    monster_idx += 1;
                    continue;
                }

                // The monster strikes first, the player always swings back.
                let monster_damage = self.rng.below(self.monsters[monster_idx].view.damage);
                self.players[player_idx].view.health -= monster_damage;
                results.push(CombatResult {
                    attacker: self.monsters[monster_idx].view.id.clone(),
                    defender: self.players[player_idx].view.id.clone(),
                    damage: monster_damage,
                    is_monster: true,
                    item_stolen: None,
                    map_stolen: false,
                });

                let player_damage = self.rng.below(PLAYER_BASE_DAMAGE);
                self.monsters[monster_idx].view.health -= player_damage;
                results.push(CombatResult {
                    attacker: self.players[player_idx].view.id.clone(),
                    defender: self.monsters[monster_idx].view.id.clone(),
                    damage: player_damage,
                    is_monster: false,
                    item_stolen: None,
                    map_stolen: false,
                });

                if self.monsters[monster_idx].view.health <= 0 {
                    self.monsters.remove(monster_idx);
                } else {
                    monster_idx += 1;
                }
            }
        }

        if self.settings.player_vs_player_enabled && player_indices.len() > 1 {
            for a in 0..player_indices.len() {
                for b in a + 1..player_indices.len() {
                    if let Some(result) =
                        self.resolve_player_combat(player_indices[a], player_indices[b])
                    {
                        results.push(result);
                    }
                }
            }
        }

        results
    }

    /// One attacker/defender exchange. A theft roll may redirect the attack
    /// into stealing an inventory item or the defender's map knowledge; a
    /// failed item grab falls through to plain damage.
    fn resolve_player_combat(&mut self, attacker: usize, defender: usize) -> Option<CombatResult> {
        if self.rng.bool(THEFT_CHANCE) {
            if self.rng.bool(0.5) {
                if let Some(stolen) = self.steal_item(attacker, defender) {
                    return Some(CombatResult {
                        attacker: self.players[attacker].view.id.clone(),
                        defender: self.players[defender].view.id.clone(),
                        damage: 0,
                        is_monster: false,
                        item_stolen: Some(stolen),
                        map_stolen: false,
                    });
                }
            } else {
                self.transfer_map(defender, attacker);
                return Some(CombatResult {
                    attacker: self.players[attacker].view.id.clone(),
                    defender: self.players[defender].view.id.clone(),
                    damage: 0,
                    is_monster: false,
                    item_stolen: None,
                    map_stolen: true,
                });
            }
        }

        let base = self.rng.below(PLAYER_BASE_DAMAGE);
        let damage = (base as f32 * (1.0 + self.difficulty as f32 * 0.1)).floor() as i32;
        self.players[defender].view.health -= damage;

        Some(CombatResult {
            attacker: self.players[attacker].view.id.clone(),
            defender: self.players[defender].view.id.clone(),
            damage,
            is_monster: false,
            item_stolen: None,
            map_stolen: false,
        })
    }

    fn steal_item(&mut self, attacker: usize, defender: usize) -> Option<Item> {
        if self.players[defender].view.inventory.is_empty() {
            return None;
        }
        let pick = self
            .rng
            .pick_index(self.players[defender].view.inventory.len());
        let stolen = self.players[defender].view.inventory.remove(pick);
        self.players[attacker].view.inventory.push(stolen.clone());
        Some(stolen)
    }
}
