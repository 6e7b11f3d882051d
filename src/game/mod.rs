mod combat;
mod items;
mod map_knowledge;
mod monsters;
mod visibility;

use crate::constants::{MAX_HEALTH, MOVE_HEAL_AMOUNT, SECRET_DOOR_PASS_CHANCE};
use crate::maze::{generate_maze, Maze};
use crate::rng::Rng;
use crate::types::{
    DifficultySettings, Direction, GameStatus, ItemKind, MapKnowledge, MonsterView, MoveOutcome,
    PlayerView, Position, Winner,
};

pub(crate) struct PlayerInternal {
    pub view: PlayerView,
    pub map: MapKnowledge,
}

pub(crate) struct MonsterInternal {
    pub view: MonsterView,
    pub next_move_at_ms: u64,
}

/// One running match. All randomness flows through the seeded [`Rng`], so a
/// game created with the same seed and fed the same commands replays
/// identically.
pub struct Game {
    pub id: String,
    pub status: GameStatus,
    pub difficulty: i32,
    pub settings: DifficultySettings,
    pub maze: Maze,
    pub exit_position: Position,
    pub winner: Option<Winner>,
    pub created_at_iso: String,
    pub(crate) players: Vec<PlayerInternal>,
    pub(crate) monsters: Vec<MonsterInternal>,
    pub(crate) rng: Rng,
    next_id: u64,
}

impl Game {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: String,
        width: i32,
        height: i32,
        levels: i32,
        difficulty: i32,
        seed: u32,
        now_ms: u64,
        created_at_iso: String,
    ) -> Self {
        let settings = crate::constants::get_difficulty_settings(difficulty);
        let mut rng = Rng::new(seed);
        let maze = generate_maze(width, height, levels, settings.secret_door_chance, &mut rng);

        // The exit is always somewhere on the top level.
        let exit_position = Position {
            x: rng.below(width),
            y: rng.below(height),
            level: levels - 1,
        };

        let mut game = Self {
            id,
            status: GameStatus::Waiting,
            difficulty,
            settings,
            maze,
            exit_position,
            winner: None,
            created_at_iso,
            players: Vec::new(),
            monsters: Vec::new(),
            rng,
            next_id: 0,
        };
        game.spawn_monsters(now_ms);
        game.generate_initial_items();
        game
    }

    pub(crate) fn make_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}_{}", self.next_id)
    }

    pub(crate) fn player_index(&self, player_id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.view.id == player_id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player_view(&self, player_id: &str) -> Option<PlayerView> {
        self.player_index(player_id)
            .map(|idx| self.players[idx].view.clone())
    }

    /// Drops the player into a random cell on level 0 and flips a waiting
    /// game to ongoing.
    pub fn add_player(&mut self, player_id: String, name: String) -> PlayerView {
        let position = Position {
            x: self.rng.below(self.maze.width),
            y: self.rng.below(self.maze.height),
            level: 0,
        };
        let view = PlayerView {
            id: player_id,
            name,
            position,
            health: MAX_HEALTH,
            inventory: Vec::new(),
        };
        self.players.push(PlayerInternal {
            view: view.clone(),
            map: map_knowledge::initial_map(position),
        });

        if self.status == GameStatus::Waiting {
            self.status = GameStatus::Ongoing;
        }
        view
    }

    /// Removing the key holder from an ongoing game ends it in their favor;
    /// the check runs before the roster shrinks so the departing player's
    /// inventory is still inspectable.
    pub fn remove_player(&mut self, player_id: &str) -> Option<PlayerView> {
        let idx = self.player_index(player_id)?;

        if self.status == GameStatus::Ongoing && self.players[idx].view.holds(ItemKind::Key) {
            self.status = GameStatus::Finished;
            self.winner = Some(Winner {
                player_id: self.players[idx].view.id.clone(),
                player_name: self.players[idx].view.name.clone(),
                exited_with_key: true,
            });
        }

        Some(self.players.remove(idx).view)
    }

    pub fn move_player(&mut self, player_id: &str, direction: Direction) -> Option<MoveOutcome> {
        let idx = self.player_index(player_id)?;
        if self.status == GameStatus::Finished {
            return Some(MoveOutcome::blocked());
        }

        let from = self.players[idx].view.position;
        let (to, is_secret_door) = match self.destination(from, direction) {
            Some(step) => step,
            None => return Some(MoveOutcome::blocked()),
        };

        self.players[idx].view.position = to;
        let combat_results = self.resolve_combat(to);

        // Walking is slow regeneration.
        let mover = &mut self.players[idx].view;
        mover.health = (mover.health + MOVE_HEAL_AMOUNT).min(MAX_HEALTH);

        let mut game_won = false;
        if self.players[idx].view.health > 0
            && self.players[idx].view.position == self.exit_position
            && self.players[idx].view.holds(ItemKind::Key)
        {
            game_won = true;
            self.status = GameStatus::Finished;
            self.winner = Some(Winner {
                player_id: self.players[idx].view.id.clone(),
                player_name: self.players[idx].view.name.clone(),
                exited_with_key: true,
            });
        }

        let map_dropped = self.players[idx].view.health > 0 && self.check_map_drop(idx);

        let mut casualties = Vec::new();
        let mut survivor = 0;
        while survivor < self.players.len() {
            if self.players[survivor].view.health <= 0 {
                casualties.push(self.players.remove(survivor).view);
            } else {
                survivor += 1;
            }
        }

        Some(MoveOutcome {
            success: true,
            combat_results,
            game_won,
            secret_door_found: is_secret_door,
            map_dropped,
            casualties,
        })
    }

    /// Resolves a requested step to the cell it would land on, or `None`
    /// when a wall or missing stairs block it. The flag reports whether the
    /// step passed through a secret door.
    fn destination(&mut self, from: Position, direction: Direction) -> Option<(Position, bool)> {
        match direction {
            Direction::Up => {
                let cell = self.maze.cell(from);
                if !cell.stairs.up || from.level + 1 >= self.maze.levels {
                    return None;
                }
                let to = Position {
                    level: from.level + 1,
                    ..from
                };
                // Both ends must agree or the stairs lead nowhere.
                self.maze.cell(to).stairs.down.then_some((to, false))
            }
            Direction::Down => {
                let cell = self.maze.cell(from);
                if !cell.stairs.down || from.level == 0 {
                    return None;
                }
                let to = Position {
                    level: from.level - 1,
                    ..from
                };
                self.maze.cell(to).stairs.up.then_some((to, false))
            }
            lateral => {
                let to = self.maze.wrapped_neighbor(from, lateral);
                let cell = self.maze.cell(from);
                if !cell.walls.get(lateral) {
                    return Some((to, false));
                }
                if cell.secret_doors.get(lateral) && self.rng.bool(SECRET_DOOR_PASS_CHANCE) {
                    return Some((to, true));
                }
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(super) fn test_game(difficulty: i32, seed: u32) -> Game {
        Game::new(
            "game_test".to_string(),
            8,
            8,
            3,
            difficulty,
            seed,
            0,
            "2026-01-01T00:00:00Z".to_string(),
        )
    }

    #[test]
    fn first_player_starts_the_game() {
        let mut game = test_game(1, 11);
        assert_eq!(game.status, GameStatus::Waiting);
        let view = game.add_player("p1".to_string(), "alice".to_string());
        assert_eq!(game.status, GameStatus::Ongoing);
        assert_eq!(view.position.level, 0);
        assert_eq!(view.health, MAX_HEALTH);
    }

    #[test]
    fn exit_is_on_the_top_level() {
        let game = test_game(3, 21);
        assert_eq!(game.exit_position.level, game.maze.levels - 1);
        assert!(game.maze.in_bounds(game.exit_position));
    }

    #[test]
    fn open_passage_moves_succeed_and_heal() {
        let mut game = test_game(1, 31);
        game.add_player("p1".to_string(), "alice".to_string());
        game.players[0].view.health = 50;

        // Find an open lateral direction from the spawn cell.
        let from = game.players[0].view.position;
        let open = Direction::LATERAL
            .into_iter()
            .find(|dir| !game.maze.cell(from).walls.get(*dir))
            .expect("perfect maze cells always have an opening");

        let outcome = game.move_player("p1", open).expect("player exists");
        assert!(outcome.success);
        assert_eq!(game.players[0].view.health, 50 + MOVE_HEAL_AMOUNT);
        assert_ne!(game.players[0].view.position, from);
    }

    #[test]
    fn walled_moves_are_blocked() {
        let mut game = test_game(1, 41);
        game.add_player("p1".to_string(), "alice".to_string());
        let from = game.players[0].view.position;
        let blocked = Direction::LATERAL.into_iter().find(|dir| {
            let cell = game.maze.cell(from);
            cell.walls.get(*dir) && !cell.secret_doors.get(*dir)
        });
        // Some spawn cells are fully open; skip those seeds.
        if let Some(dir) = blocked {
            let outcome = game.move_player("p1", dir).expect("player exists");
            assert!(!outcome.success);
            assert_eq!(game.players[0].view.position, from);
        }
    }

    #[test]
    fn up_requires_matching_stairs() {
        let mut game = test_game(1, 51);
        game.add_player("p1".to_string(), "alice".to_string());

        // Spawn cells without stairs cannot go up.
        let from = game.players[0].view.position;
        if !game.maze.cell(from).stairs.up {
            let outcome = game.move_player("p1", Direction::Up).expect("player exists");
            assert!(!outcome.success);
        }

        // Teleport onto a stair cell and climb.
        let stair = (0..game.maze.height)
            .flat_map(|y| (0..game.maze.width).map(move |x| Position { x, y, level: 0 }))
            .find(|pos| game.maze.cell(*pos).stairs.up)
            .expect("adjacent levels are always linked");
        game.players[0].view.position = stair;
        let outcome = game.move_player("p1", Direction::Up).expect("player exists");
        assert!(outcome.success);
        assert_eq!(game.players[0].view.position.level, 1);
    }

    #[test]
    fn down_from_ground_level_is_blocked() {
        let mut game = test_game(1, 61);
        game.add_player("p1".to_string(), "alice".to_string());
        let outcome = game
            .move_player("p1", Direction::Down)
            .expect("player exists");
        assert!(!outcome.success);
        assert_eq!(game.players[0].view.position.level, 0);
    }

    #[test]
    fn reaching_the_exit_with_the_key_wins() {
        let mut game = test_game(1, 71);
        game.add_player("p1".to_string(), "alice".to_string());

        let key = crate::types::Item {
            id: "item_key".to_string(),
            kind: ItemKind::Key,
            position: game.exit_position,
        };
        game.players[0].view.inventory.push(key);

        // Park next to the exit through an open passage and step in.
        let exit = game.exit_position;
        let dir = Direction::LATERAL
            .into_iter()
            .find(|dir| !game.maze.cell(exit).walls.get(*dir))
            .expect("exit cell has an opening");
        game.players[0].view.position = game.maze.wrapped_neighbor(exit, dir);
        let outcome = game
            .move_player("p1", dir.opposite())
            .expect("player exists");

        assert!(outcome.success);
        assert!(outcome.game_won);
        assert_eq!(game.status, GameStatus::Finished);
        let winner = game.winner.as_ref().expect("winner recorded");
        assert_eq!(winner.player_id, "p1");
        assert!(winner.exited_with_key);
    }

    #[test]
    fn exit_without_key_does_not_win() {
        let mut game = test_game(1, 81);
        game.add_player("p1".to_string(), "alice".to_string());
        let exit = game.exit_position;
        let dir = Direction::LATERAL
            .into_iter()
            .find(|dir| !game.maze.cell(exit).walls.get(*dir))
            .expect("exit cell has an opening");
        game.players[0].view.position = game.maze.wrapped_neighbor(exit, dir);
        let outcome = game
            .move_player("p1", dir.opposite())
            .expect("player exists");
        assert!(outcome.success);
        assert!(!outcome.game_won);
        assert_eq!(game.status, GameStatus::Ongoing);
    }

    #[test]
    fn moves_are_rejected_after_the_game_finishes() {
        let mut game = test_game(1, 91);
        game.add_player("p1".to_string(), "alice".to_string());
        game.status = GameStatus::Finished;
        let outcome = game
            .move_player("p1", Direction::North)
            .expect("player exists");
        assert!(!outcome.success);
    }

    #[test]
    fn departing_key_holder_ends_the_game() {
        let mut game = test_game(1, 101);
        game.add_player("p1".to_string(), "alice".to_string());
        game.add_player("p2".to_string(), "bob".to_string());
        let key = crate::types::Item {
            id: "item_key".to_string(),
            kind: ItemKind::Key,
            position: game.players[0].view.position,
        };
        game.players[0].view.inventory.push(key);

        let removed = game.remove_player("p1").expect("player exists");
        assert_eq!(removed.id, "p1");
        assert_eq!(game.status, GameStatus::Finished);
        assert_eq!(
            game.winner.as_ref().map(|w| w.player_id.as_str()),
            Some("p1")
        );
        assert_eq!(game.player_count(), 1);
    }

    #[test]
    fn departing_without_key_keeps_the_game_going() {
        let mut game = test_game(1, 111);
        game.add_player("p1".to_string(), "alice".to_string());
        game.add_player("p2".to_string(), "bob".to_string());
        let _ = game.remove_player("p2");
        assert_eq!(game.status, GameStatus::Ongoing);
        assert!(game.winner.is_none());
    }

    #[test]
    fn secret_doors_eventually_yield() {
        let mut game = test_game(1, 131);
        game.add_player("p1".to_string(), "alice".to_string());
        let from = Position { x: 1, y: 1, level: 0 };
        game.players[0].view.position = from;

        // Manufacture a secret door on the east wall of the player's cell.
        let neighbor = game.maze.wrapped_neighbor(from, Direction::East);
        game.maze.cell_mut(from).walls.set(Direction::East, true);
        game.maze.cell_mut(neighbor).walls.set(Direction::West, true);
        game.maze.cell_mut(from).secret_doors.set(Direction::East, true);
        game.maze
            .cell_mut(neighbor)
            .secret_doors
            .set(Direction::West, true);

        let mut passed = false;
        for _ in 0..64 {
            let outcome = game
                .move_player("p1", Direction::East)
                .expect("player exists");
            if outcome.success {
                assert!(outcome.secret_door_found);
                passed = true;
                break;
            }
            assert_eq!(game.players[0].view.position, from);
        }
        assert!(passed, "a coin-flip door failing 64 times is out of reach");
        assert_eq!(game.players[0].view.position, neighbor);
    }

    #[test]
    fn same_seed_replays_identically() {
        let build = || {
            let mut game = test_game(4, 121);
            game.add_player("p1".to_string(), "alice".to_string());
            for dir in [
                Direction::North,
                Direction::East,
                Direction::East,
                Direction::South,
            ] {
                let _ = game.move_player("p1", dir);
            }
            game.players[0].view.position
        };
        assert_eq!(build(), build());
    }
}
