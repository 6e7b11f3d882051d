use super::{Game, MonsterInternal};
use crate::types::{Direction, MonsterKind, MonsterView, Position};

impl Game {
    pub(crate) fn spawn_monsters(&mut self, now_ms: u64) {
        for _ in 0..self.settings.monster_count {
            let kind = self.roll_monster_kind();
            let position = Position {
                x: self.rng.below(self.maze.width),
                y: self.rng.below(self.maze.height),
                level: self.rng.below(self.maze.levels),
            };
            let id = self.make_id("monster");
            self.monsters.push(MonsterInternal {
                view: MonsterView {
                    id,
                    kind,
                    position,
                    health: monster_health(kind, self.settings.monster_damage),
                    damage: self.settings.monster_damage,
                    visibility: self.settings.monster_visibility,
                    move_interval_ms: self.settings.monster_move_interval_ms,
                },
                next_move_at_ms: now_ms + self.settings.monster_move_interval_ms,
            });
        }
    }

    fn roll_monster_kind(&mut self) -> MonsterKind {
        if self.settings.allow_dragons && self.rng.bool(0.2) {
            return MonsterKind::Dragon;
        }
        if self.settings.allow_trolls && self.rng.bool(0.4) {
            return MonsterKind::Troll;
        }
        MonsterKind::Goblin
    }

    /// Moves every monster whose timer has elapsed and reschedules it.
    /// Monsters only roam while the game is ongoing.
    pub fn advance_monsters(&mut self, now_ms: u64) {
        if self.status != crate::types::GameStatus::Ongoing {
            return;
        }
        for idx in 0..self.monsters.len() {
            if self.monsters[idx].next_move_at_ms > now_ms {
                continue;
            }
            self.move_monster(idx);
            let interval = self.monsters[idx].view.move_interval_ms;
            self.monsters[idx].next_move_at_ms = now_ms + interval;
        }
    }

    /// A monster that spots a player on its own level pursues them greedily,
    /// closing the larger axis gap first. Otherwise it wanders into a random
    /// open neighbor. Monsters know every secret door and pass them freely.
    fn move_monster(&mut self, idx: usize) -> bool {
        let position = self.monsters[idx].view.position;

        if self.settings.monster_pursuit_enabled {
            if let Some(target) = self.nearest_visible_player(idx) {
                let dx = target.x - position.x;
                let dy = target.y - position.y;
                let mut candidates = Vec::new();
                let step_x = if dx > 0 {
                    Some(Direction::East)
                } else if dx < 0 {
                    Some(Direction::West)
                } else {
                    None
                };
                let step_y = if dy > 0 {
                    Some(Direction::South)
                } else if dy < 0 {
                    Some(Direction::North)
                } else {
                    None
                };
                if dx.abs() >= dy.abs() {
                    candidates.extend(step_x);
                    candidates.extend(step_y);
                } else {
                    candidates.extend(step_y);
                    candidates.extend(step_x);
                }

                for dir in candidates {
                    if self.monster_can_step(position, dir) {
                        self.monsters[idx].view.position =
                            self.maze.wrapped_neighbor(position, dir);
                        return true;
                    }
                }
            }
        }

        let open: Vec<Direction> = Direction::LATERAL
            .into_iter()
            .filter(|dir| self.monster_can_step(position, *dir))
            .collect();
        if !open.is_empty() {
            let dir = open[self.rng.pick_index(open.len())];
            self.monsters[idx].view.position = self.maze.wrapped_neighbor(position, dir);
        }
        false
    }

    pub fn monster_positions(&self) -> Vec<Position> {
        self.monsters.iter().map(|m| m.view.position).collect()
    }

    fn monster_can_step(&self, from: Position, dir: Direction) -> bool {
        let cell = self.maze.cell(from);
        !cell.walls.get(dir) || cell.secret_doors.get(dir)
    }

    fn nearest_visible_player(&self, idx: usize) -> Option<Position> {
        let monster = &self.monsters[idx].view;
        let mut nearest: Option<(f32, Position)> = None;
        for player in &self.players {
            if player.view.position.level != monster.position.level {
                continue;
            }
            let dx = (player.view.position.x - monster.position.x) as f32;
            let dy = (player.view.position.y - monster.position.y) as f32;
            let distance = (dx * dx + dy * dy).sqrt();
            if distance > monster.visibility as f32 {
                continue;
            }
            if nearest.map_or(true, |(best, _)| distance < best) {
                nearest = Some((distance, player.view.position));
            }
        }
        nearest.map(|(_, position)| position)
    }
}

fn monster_health(kind: MonsterKind, monster_damage: i32) -> i32 {
    match kind {
        MonsterKind::Goblin => 30 + monster_damage * 2,
        MonsterKind::Troll => 80 + monster_damage * 3,
        MonsterKind::Dragon => 150 + monster_damage * 4,
    }
}
