use crate::types::DifficultySettings;

pub const TICK_MS: u64 = 250;

pub const MAX_HEALTH: i32 = 100;
pub const MOVE_HEAL_AMOUNT: i32 = 1;
pub const PLAYER_BASE_DAMAGE: i32 = 5;
pub const SECRET_DOOR_PASS_CHANCE: f32 = 0.5;
pub const THEFT_CHANCE: f32 = 0.3;

pub const GAME_DESTROY_TIMEOUT_MS: u64 = 5 * 60 * 1000;

pub const MIN_DIMENSION: i32 = 2;
pub const MAX_DIMENSION: i32 = 128;
pub const MIN_LEVELS: i32 = 1;
pub const MAX_LEVELS: i32 = 16;
pub const MIN_DIFFICULTY: i32 = 1;
pub const MAX_DIFFICULTY: i32 = 10;

/// All gameplay tunables derived from a single difficulty level, computed
/// once at game creation and immutable afterwards.
pub fn get_difficulty_settings(difficulty: i32) -> DifficultySettings {
    DifficultySettings {
        monster_count: if difficulty <= 3 {
            0
        } else {
            (difficulty * 3) / 2
        },
        monster_move_interval_ms: (3_000 - difficulty as i64 * 300).max(500) as u64,
        monster_visibility: 2 + difficulty / 2,
        monster_damage: 3 + (difficulty * 3) / 2,
        monster_pursuit_enabled: difficulty > 5,
        player_visibility: (12 - difficulty).max(3),
        healing_potion_count: (12 - difficulty).max(0),
        healing_potion_strength: (60 - difficulty * 5).max(10),
        player_vs_player_enabled: difficulty >= 5,
        secret_door_chance: 0.02 + difficulty as f32 * 0.01,
        allow_trolls: difficulty >= 4,
        allow_dragons: difficulty >= 8,
        map_drop_chance: 0.005 * difficulty as f32,
    }
}
