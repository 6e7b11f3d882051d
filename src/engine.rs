use std::collections::HashMap;

use thiserror::Error;

use crate::constants::{
    GAME_DESTROY_TIMEOUT_MS, MAX_DIFFICULTY, MAX_DIMENSION, MAX_LEVELS, MIN_DIFFICULTY,
    MIN_DIMENSION, MIN_LEVELS,
};
use crate::game::Game;
use crate::types::{
    Direction, GameListing, Item, MoveOutcome, PlayerView, UseItemOutcome, VisibleState,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("game not found")]
    GameNotFound,
    #[error("player not found")]
    PlayerNotFound,
    #[error("game already finished")]
    GameFinished,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Clone, Copy, Debug)]
pub struct CreateGameParams {
    pub width: i32,
    pub height: i32,
    pub levels: i32,
    pub difficulty: i32,
    pub seed: u32,
}

/// Registry of running games. Owns every [`Game`] and the destruction
/// deadlines of matches whose last player walked out.
#[derive(Default)]
pub struct GameEngine {
    games: HashMap<String, Game>,
    destroy_deadlines: HashMap<String, u64>,
    next_game_id: u64,
}

impl GameEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_game(
        &mut self,
        params: CreateGameParams,
        now_ms: u64,
        created_at_iso: String,
    ) -> Result<String, EngineError> {
        let dimension_range = MIN_DIMENSION..=MAX_DIMENSION;
        if !dimension_range.contains(&params.width) || !dimension_range.contains(&params.height) {
            return Err(EngineError::InvalidArgument(format!(
                "width and height must be between {MIN_DIMENSION} and {MAX_DIMENSION}"
            )));
        }
        if !(MIN_LEVELS..=MAX_LEVELS).contains(&params.levels) {
            return Err(EngineError::InvalidArgument(format!(
                "levels must be between {MIN_LEVELS} and {MAX_LEVELS}"
            )));
        }
        if !(MIN_DIFFICULTY..=MAX_DIFFICULTY).contains(&params.difficulty) {
            return Err(EngineError::InvalidArgument(format!(
                "difficulty must be between {MIN_DIFFICULTY} and {MAX_DIFFICULTY}"
            )));
        }

        self.next_game_id += 1;
        let game_id = format!("game_{}", self.next_game_id);
        let game = Game::new(
            game_id.clone(),
            params.width,
            params.height,
            params.levels,
            params.difficulty,
            params.seed,
            now_ms,
            created_at_iso,
        );
        self.games.insert(game_id.clone(), game);
        Ok(game_id)
    }

    pub fn game(&self, game_id: &str) -> Result<&Game, EngineError> {
        self.games.get(game_id).ok_or(EngineError::GameNotFound)
    }

    fn game_mut(&mut self, game_id: &str) -> Result<&mut Game, EngineError> {
        self.games.get_mut(game_id).ok_or(EngineError::GameNotFound)
    }

    /// Finished games reject joins; a player dropped into one could never
    /// move again. The destruction timer is only cancelled once the join
    /// actually lands.
    pub fn add_player(
        &mut self,
        game_id: &str,
        player_id: String,
        name: String,
    ) -> Result<PlayerView, EngineError> {
        let game = self.game_mut(game_id)?;
        if game.status == crate::types::GameStatus::Finished {
            return Err(EngineError::GameFinished);
        }
        let view = game.add_player(player_id, name);
        self.destroy_deadlines.remove(game_id);
        Ok(view)
    }

    /// Detaches a player and arms the destruction timer when the roster
    /// empties out.
    pub fn remove_player(
        &mut self,
        game_id: &str,
        player_id: &str,
        now_ms: u64,
    ) -> Result<PlayerView, EngineError> {
        let game = self.game_mut(game_id)?;
        let removed = game
            .remove_player(player_id)
            .ok_or(EngineError::PlayerNotFound)?;
        if game.player_count() == 0 {
            self.destroy_deadlines
                .insert(game_id.to_string(), now_ms + GAME_DESTROY_TIMEOUT_MS);
        }
        Ok(removed)
    }

    pub fn move_player(
        &mut self,
        game_id: &str,
        player_id: &str,
        direction: Direction,
    ) -> Result<MoveOutcome, EngineError> {
        let game = self.game_mut(game_id)?;
        game.move_player(player_id, direction)
            .ok_or(EngineError::PlayerNotFound)
    }

    pub fn pickup_item(&mut self, game_id: &str, player_id: &str) -> Result<Option<Item>, EngineError> {
        let game = self.game_mut(game_id)?;
        if game.player_view(player_id).is_none() {
            return Err(EngineError::PlayerNotFound);
        }
        Ok(game.pickup_item(player_id))
    }

    pub fn drop_item(
        &mut self,
        game_id: &str,
        player_id: &str,
        item_id: &str,
    ) -> Result<Option<Item>, EngineError> {
        let game = self.game_mut(game_id)?;
        if game.player_view(player_id).is_none() {
            return Err(EngineError::PlayerNotFound);
        }
        Ok(game.drop_item(player_id, item_id))
    }

    pub fn use_item(
        &mut self,
        game_id: &str,
        player_id: &str,
        item_id: &str,
    ) -> Result<UseItemOutcome, EngineError> {
        let game = self.game_mut(game_id)?;
        if game.player_view(player_id).is_none() {
            return Err(EngineError::PlayerNotFound);
        }
        Ok(game.use_item(player_id, item_id).unwrap_or(UseItemOutcome {
            success: false,
            effect: None,
        }))
    }

    pub fn visible_state(
        &mut self,
        game_id: &str,
        player_id: &str,
    ) -> Result<VisibleState, EngineError> {
        let game = self.game_mut(game_id)?;
        game.visible_state(player_id)
            .ok_or(EngineError::PlayerNotFound)
    }

    /// Joinable games, oldest first. Finished matches are not listed.
    pub fn list_games(&self) -> Vec<GameListing> {
        let mut listings: Vec<GameListing> = self
            .games
            .values()
            .filter(|game| game.status != crate::types::GameStatus::Finished)
            .map(|game| GameListing {
                id: game.id.clone(),
                player_count: game.player_count(),
                status: game.status,
                created_at_iso: game.created_at_iso.clone(),
            })
            .collect();
        listings.sort_by(|a, b| {
            a.created_at_iso
                .cmp(&b.created_at_iso)
                .then_with(|| a.id.cmp(&b.id))
        });
        listings
    }

    /// One scheduler beat: advance every due monster and reap abandoned
    /// games whose grace period ran out.
    pub fn tick(&mut self, now_ms: u64) {
        for game in self.games.values_mut() {
            game.advance_monsters(now_ms);
        }

        let expired: Vec<String> = self
            .destroy_deadlines
            .iter()
            .filter(|&(game_id, &deadline)| {
                deadline <= now_ms
                    && self
                        .games
                        .get(game_id)
                        .map_or(true, |game| game.player_count() == 0)
            })
            .map(|(game_id, _)| game_id.clone())
            .collect();
        for game_id in expired {
            self.destroy_deadlines.remove(&game_id);
            self.games.remove(&game_id);
            println!("[engine] destroyed abandoned game {game_id}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(difficulty: i32) -> CreateGameParams {
        CreateGameParams {
            width: 8,
            height: 8,
            levels: 2,
            difficulty,
            seed: 42,
        }
    }

    fn engine_with_game() -> (GameEngine, String) {
        let mut engine = GameEngine::new();
        let game_id = engine
            .create_game(params(1), 0, "2026-01-01T00:00:00Z".to_string())
            .expect("valid params");
        (engine, game_id)
    }

    #[test]
    fn create_game_rejects_out_of_range_arguments() {
        let mut engine = GameEngine::new();
        let bad_width = CreateGameParams {
            width: 1,
            ..params(1)
        };
        let bad_levels = CreateGameParams {
            levels: 0,
            ..params(1)
        };
        let bad_difficulty = params(11);

        for bad in [bad_width, bad_levels, bad_difficulty] {
            let err = engine
                .create_game(bad, 0, "2026-01-01T00:00:00Z".to_string())
                .expect_err("out of range");
            assert!(matches!(err, EngineError::InvalidArgument(_)));
        }
        assert!(engine.list_games().is_empty());
    }

    #[test]
    fn unknown_ids_surface_the_right_errors() {
        let (mut engine, game_id) = engine_with_game();
        assert!(matches!(
            engine.move_player("game_999", "p1", Direction::North),
            Err(EngineError::GameNotFound)
        ));
        assert!(matches!(
            engine.move_player(&game_id, "p1", Direction::North),
            Err(EngineError::PlayerNotFound)
        ));
        assert!(matches!(
            engine.pickup_item(&game_id, "p1"),
            Err(EngineError::PlayerNotFound)
        ));
    }

    #[test]
    fn listings_track_roster_and_status() {
        let (mut engine, game_id) = engine_with_game();
        assert_eq!(engine.list_games()[0].player_count, 0);

        engine
            .add_player(&game_id, "p1".to_string(), "alice".to_string())
            .expect("game exists");
        let listing = &engine.list_games()[0];
        assert_eq!(listing.player_count, 1);
        assert_eq!(listing.status, crate::types::GameStatus::Ongoing);
    }

    #[test]
    fn listings_are_ordered_oldest_first() {
        let mut engine = GameEngine::new();
        engine
            .create_game(params(1), 0, "2026-01-02T00:00:00Z".to_string())
            .expect("valid params");
        engine
            .create_game(params(1), 0, "2026-01-01T00:00:00Z".to_string())
            .expect("valid params");
        let listings = engine.list_games();
        assert_eq!(listings.len(), 2);
        assert!(listings[0].created_at_iso < listings[1].created_at_iso);
    }

    #[test]
    fn abandoned_games_are_reaped_after_the_grace_period() {
        let (mut engine, game_id) = engine_with_game();
        engine
            .add_player(&game_id, "p1".to_string(), "alice".to_string())
            .expect("game exists");
        engine
            .remove_player(&game_id, "p1", 1_000)
            .expect("player exists");

        engine.tick(1_000 + GAME_DESTROY_TIMEOUT_MS - 1);
        assert!(engine.game(&game_id).is_ok());

        engine.tick(1_000 + GAME_DESTROY_TIMEOUT_MS);
        assert!(engine.game(&game_id).is_err());
    }

    #[test]
    fn rejoining_cancels_the_destruction_timer() {
        let (mut engine, game_id) = engine_with_game();
        engine
            .add_player(&game_id, "p1".to_string(), "alice".to_string())
            .expect("game exists");
        engine
            .remove_player(&game_id, "p1", 1_000)
            .expect("player exists");
        engine
            .add_player(&game_id, "p2".to_string(), "bob".to_string())
            .expect("game exists");

        engine.tick(1_000 + GAME_DESTROY_TIMEOUT_MS);
        assert!(engine.game(&game_id).is_ok());
    }

    #[test]
    fn joins_are_rejected_after_the_game_finishes() {
        use crate::types::{Item, ItemKind};

        let (mut engine, game_id) = engine_with_game();
        engine
            .add_player(&game_id, "p1".to_string(), "alice".to_string())
            .expect("game exists");

        // Hand p1 the key; their departure ends the game in their favor.
        {
            let game = engine.games.get_mut(&game_id).expect("game exists");
            let position = game.players[0].view.position;
            game.players[0].view.inventory.push(Item {
                id: "item_key".to_string(),
                kind: ItemKind::Key,
                position,
            });
        }
        engine
            .remove_player(&game_id, "p1", 1_000)
            .expect("player exists");

        assert!(matches!(
            engine.add_player(&game_id, "p2".to_string(), "bob".to_string()),
            Err(EngineError::GameFinished)
        ));

        // The failed join must not cancel the destruction timer.
        engine.tick(1_000 + GAME_DESTROY_TIMEOUT_MS);
        assert!(engine.game(&game_id).is_err());
    }

    #[test]
    fn easy_ten_by_ten_game_matches_the_difficulty_table() {
        use crate::types::{ItemKind, Position};

        let mut engine = GameEngine::new();
        let game_id = engine
            .create_game(
                CreateGameParams {
                    width: 10,
                    height: 10,
                    levels: 3,
                    difficulty: 1,
                    seed: 99,
                },
                0,
                "2026-01-01T00:00:00Z".to_string(),
            )
            .expect("valid params");
        let game = engine.game(&game_id).expect("game exists");

        let count = |kind: ItemKind| {
            game.maze
                .grid
                .iter()
                .flatten()
                .flatten()
                .flat_map(|cell| cell.items.iter())
                .filter(|item| item.kind == kind)
                .count()
        };
        assert_eq!(count(ItemKind::Key), 1);
        assert_eq!(count(ItemKind::Potion), 11);
        assert!(game.monster_positions().is_empty());

        // The torus wraps in all four directions.
        let corner = Position { x: 0, y: 0, level: 0 };
        assert_eq!(game.maze.wrapped_neighbor(corner, Direction::North).y, 9);
        assert_eq!(game.maze.wrapped_neighbor(corner, Direction::West).x, 9);
        let far = Position { x: 9, y: 9, level: 0 };
        assert_eq!(game.maze.wrapped_neighbor(far, Direction::South).y, 0);
        assert_eq!(game.maze.wrapped_neighbor(far, Direction::East).x, 0);
    }

    #[test]
    fn tick_moves_due_monsters() {
        let mut engine = GameEngine::new();
        let game_id = engine
            .create_game(params(6), 0, "2026-01-01T00:00:00Z".to_string())
            .expect("valid params");
        engine
            .add_player(&game_id, "p1".to_string(), "alice".to_string())
            .expect("game exists");

        let interval = engine.game(&game_id).expect("game exists").settings
            .monster_move_interval_ms;
        let before: Vec<_> = engine
            .game(&game_id)
            .expect("game exists")
            .monster_positions();
        engine.tick(interval);
        let after: Vec<_> = engine
            .game(&game_id)
            .expect("game exists")
            .monster_positions();
        assert_ne!(before, after);
    }
}
