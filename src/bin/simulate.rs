use std::io::Write;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::Parser;
use maze_raiders_server::constants::{MAX_HEALTH, TICK_MS};
use maze_raiders_server::engine::{CreateGameParams, GameEngine};
use maze_raiders_server::rng::Rng;
use maze_raiders_server::types::{Direction, GameStatus};
use serde::Serialize;
use serde_json::json;

/// Headless soak run: drives random walkers through a full game and checks
/// the engine invariants every round.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long, default_value_t = 20)]
    width: i32,
    #[arg(long, default_value_t = 20)]
    height: i32,
    #[arg(long, default_value_t = 3)]
    levels: i32,
    #[arg(long, default_value_t = 5)]
    difficulty: i32,
    #[arg(long, default_value_t = 4)]
    players: usize,
    /// Rounds of movement; every living walker takes one step per round.
    #[arg(long, default_value_t = 2_000)]
    moves: u64,
    #[arg(long)]
    seed: Option<u32>,
    #[arg(long)]
    summary_out: Option<PathBuf>,
}

#[derive(Clone, Debug, Default, Serialize)]
struct RunStats {
    rounds: u64,
    #[serde(rename = "movesAttempted")]
    moves_attempted: u64,
    #[serde(rename = "movesBlocked")]
    moves_blocked: u64,
    #[serde(rename = "combatEvents")]
    combat_events: u64,
    #[serde(rename = "secretDoorsFound")]
    secret_doors_found: u64,
    #[serde(rename = "itemsPickedUp")]
    items_picked_up: u64,
    #[serde(rename = "mapsDropped")]
    maps_dropped: u64,
    deaths: u64,
    #[serde(rename = "gameWon")]
    game_won: bool,
    anomalies: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    let seed = cli.seed.unwrap_or_else(|| now_ms() as u32);

    let mut engine = GameEngine::new();
    let game_id = engine
        .create_game(
            CreateGameParams {
                width: cli.width,
                height: cli.height,
                levels: cli.levels,
                difficulty: cli.difficulty,
                seed,
            },
            0,
            "1970-01-01T00:00:00Z".to_string(),
        )
        .expect("simulation parameters are valid");

    let mut roster = Vec::new();
    for idx in 0..cli.players {
        let player_id = format!("sim_{}", idx + 1);
        engine
            .add_player(&game_id, player_id.clone(), format!("Walker-{:02}", idx + 1))
            .expect("game exists");
        roster.push(player_id);
    }

    println!(
        "{}",
        json!({
            "event": "start",
            "gameId": game_id,
            "seed": seed,
            "players": cli.players,
            "difficulty": cli.difficulty,
        })
    );

    // Control-plane randomness is separate from the game's own rng so the
    // walk itself is reproducible per seed.
    let mut control = Rng::new(seed.wrapping_add(1));
    let mut stats = RunStats::default();
    let mut clock_ms = 0u64;

    'rounds: for round in 0..cli.moves {
        stats.rounds = round + 1;
        clock_ms += TICK_MS;
        engine.tick(clock_ms);

        for player_id in roster.clone() {
            let alive = engine
                .game(&game_id)
                .ok()
                .and_then(|game| game.player_view(&player_id))
                .is_some();
            if !alive {
                continue;
            }

            let all = [
                Direction::North,
                Direction::South,
                Direction::East,
                Direction::West,
                Direction::Up,
                Direction::Down,
            ];
            let direction = all[control.pick_index(all.len())];
            stats.moves_attempted += 1;

            let outcome = engine
                .move_player(&game_id, &player_id, direction)
                .expect("walker is in the game");
            if !outcome.success {
                stats.moves_blocked += 1;
            }
            stats.combat_events += outcome.combat_results.len() as u64;
            stats.deaths += outcome.casualties.len() as u64;
            if outcome.secret_door_found {
                stats.secret_doors_found += 1;
            }
            if outcome.map_dropped {
                stats.maps_dropped += 1;
            }

            if let Ok(Some(_)) = engine.pickup_item(&game_id, &player_id) {
                stats.items_picked_up += 1;
            }

            if outcome.game_won {
                stats.game_won = true;
                break 'rounds;
            }
        }

        check_invariants(&engine, &game_id, &roster, &mut stats);
        if engine.game(&game_id).map(|game| game.status) == Ok(GameStatus::Finished) {
            break;
        }
    }

    let summary = json!({
        "event": "summary",
        "gameId": game_id,
        "seed": seed,
        "stats": stats,
    });
    println!("{summary}");

    if let Some(path) = cli.summary_out {
        let mut file = std::fs::File::create(&path).expect("summary path is writable");
        writeln!(file, "{summary}").expect("summary write succeeds");
    }

    if !stats.anomalies.is_empty() {
        std::process::exit(1);
    }
}

fn check_invariants(engine: &GameEngine, game_id: &str, roster: &[String], stats: &mut RunStats) {
    let Ok(game) = engine.game(game_id) else {
        stats.anomalies.push("game disappeared mid-run".to_string());
        return;
    };

    for player_id in roster {
        let Some(view) = game.player_view(player_id) else {
            continue;
        };
        if view.health <= 0 || view.health > MAX_HEALTH {
            stats
                .anomalies
                .push(format!("{player_id} health out of range: {}", view.health));
        }
        if !game.maze.in_bounds(view.position) {
            stats
                .anomalies
                .push(format!("{player_id} escaped the maze"));
        }
    }

    for position in game.monster_positions() {
        if !game.maze.in_bounds(position) {
            stats.anomalies.push("monster escaped the maze".to_string());
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
