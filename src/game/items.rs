use super::Game;
use crate::constants::MAX_HEALTH;
use crate::types::{Item, ItemKind, Position, UseItemOutcome};

impl Game {
    /// Seeds the maze with its item population: exactly one key, a handful
    /// of flashlights and blank maps scaled to the current roster, and
    /// healing potions per the difficulty settings.
    pub(crate) fn generate_initial_items(&mut self) {
        let key_pos = self.random_position();
        self.spawn_item(ItemKind::Key, key_pos);

        let flashlights = self.players.len().div_ceil(4) + 1;
        for _ in 0..flashlights {
            let pos = self.random_position();
            self.spawn_item(ItemKind::Flashlight, pos);
        }

        for _ in 0..self.settings.healing_potion_count {
            let pos = self.random_position();
            self.spawn_item(ItemKind::Potion, pos);
        }

        let maps = self.players.len() / 2 + 1;
        for _ in 0..maps {
            let pos = self.random_position();
            self.spawn_item(ItemKind::Map, pos);
        }
    }

    fn random_position(&mut self) -> Position {
        Position {
            x: self.rng.below(self.maze.width),
            y: self.rng.below(self.maze.height),
            level: self.rng.below(self.maze.levels),
        }
    }

    pub(crate) fn spawn_item(&mut self, kind: ItemKind, position: Position) -> String {
        let id = self.make_id("item");
        self.maze.cell_mut(position).items.push(Item {
            id: id.clone(),
            kind,
            position,
        });
        id
    }

    /// Takes the first item in the player's cell. A second flashlight is
    /// refused; everything else stacks freely. Picking up a map also grants
    /// a patch of knowledge around the pickup spot.
    pub fn pickup_item(&mut self, player_id: &str) -> Option<Item> {
        let idx = self.player_index(player_id)?;
        let position = self.players[idx].view.position;

        let kind = self.maze.cell(position).items.first()?.kind;
        if kind == ItemKind::Flashlight && self.players[idx].view.holds(ItemKind::Flashlight) {
            return None;
        }

        let item = self.maze.cell_mut(position).items.remove(0);
        self.players[idx].view.inventory.push(item.clone());
        if kind == ItemKind::Map {
            self.absorb_found_map(idx);
        }
        Some(item)
    }

    pub fn drop_item(&mut self, player_id: &str, item_id: &str) -> Option<Item> {
        let idx = self.player_index(player_id)?;
        let slot = self.players[idx]
            .view
            .inventory
            .iter()
            .position(|item| item.id == item_id)?;

        let mut item = self.players[idx].view.inventory.remove(slot);
        item.position = self.players[idx].view.position;
        self.maze.cell_mut(item.position).items.push(item.clone());
        Some(item)
    }

    /// Potions heal and are consumed; the rest are passive and report why
    /// they cannot be activated.
    pub fn use_item(&mut self, player_id: &str, item_id: &str) -> Option<UseItemOutcome> {
        let idx = self.player_index(player_id)?;
        let slot = self.players[idx]
            .view
            .inventory
            .iter()
            .position(|item| item.id == item_id)?;

        let outcome = match self.players[idx].view.inventory[slot].kind {
            ItemKind::Potion => {
                let heal = self.rng.below(self.settings.healing_potion_strength);
                let player = &mut self.players[idx].view;
                player.health = (player.health + heal).min(MAX_HEALTH);
                player.inventory.remove(slot);
                UseItemOutcome {
                    success: true,
                    effect: Some(format!("Healed {heal} health")),
                }
            }
            ItemKind::Flashlight => UseItemOutcome {
                success: false,
                effect: Some("Flashlight is always active".to_string()),
            },
            ItemKind::Map => UseItemOutcome {
                success: false,
                effect: Some("Map is always active".to_string()),
            },
            ItemKind::Key => UseItemOutcome {
                success: false,
                effect: Some("Key is used automatically at exit".to_string()),
            },
        };
        Some(outcome)
    }
}
