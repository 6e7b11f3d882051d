use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use maze_raiders_server::constants::TICK_MS;
use maze_raiders_server::engine::{CreateGameParams, GameEngine};
use maze_raiders_server::server_protocol::{parse_client_message, ParsedClientMessage};
use maze_raiders_server::types::Direction;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tower_http::services::ServeDir;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

const DEFAULT_WIDTH: i32 = 20;
const DEFAULT_HEIGHT: i32 = 20;
const DEFAULT_LEVELS: i32 = 3;
const DEFAULT_DIFFICULTY: i32 = 3;

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Clone)]
struct ClientContext {
    tx: mpsc::Sender<OutboundMessage>,
    game_id: Option<String>,
    player_id: Option<String>,
}

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

struct ServerState {
    engine: GameEngine,
    clients: HashMap<String, ClientContext>,
}

impl ServerState {
    fn new() -> Self {
        Self {
            engine: GameEngine::new(),
            clients: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CreateGameRequest {
    width: Option<i32>,
    height: Option<i32>,
    levels: Option<i32>,
    difficulty: Option<i32>,
}

#[tokio::main]
async fn main() {
    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let state = Arc::new(Mutex::new(ServerState::new()));
    start_tick_loop(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/games", post(create_game_handler).get(list_games_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) = resolve_static_dir() {
        println!(
            "[server] static file root: {}",
            static_dir.to_string_lossy()
        );
        app.fallback_service(ServeDir::new(static_dir))
    } else {
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind server socket");

    println!("[server] listening on :{port}");
    axum::serve(listener, app)
        .await
        .expect("server runtime failed");
}

fn resolve_static_dir() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var("STATIC_DIR") {
        let path = PathBuf::from(raw);
        if path.join("index.html").is_file() {
            return Some(path);
        }
    }
    let candidates = [PathBuf::from("dist/client"), PathBuf::from("../dist/client")];
    candidates
        .into_iter()
        .find(|path| path.join("index.html").is_file())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn create_game_handler(
    State(state): State<SharedState>,
    Json(request): Json<CreateGameRequest>,
) -> impl IntoResponse {
    let params = CreateGameParams {
        width: request.width.unwrap_or(DEFAULT_WIDTH),
        height: request.height.unwrap_or(DEFAULT_HEIGHT),
        levels: request.levels.unwrap_or(DEFAULT_LEVELS),
        difficulty: request.difficulty.unwrap_or(DEFAULT_DIFFICULTY),
        seed: rand::random::<u32>(),
    };

    let mut guard = state.lock().await;
    match guard
        .engine
        .create_game(params, now_ms(), chrono::Utc::now().to_rfc3339())
    {
        Ok(game_id) => {
            println!("[server] created game {game_id}");
            (StatusCode::CREATED, Json(json!({ "gameId": game_id }))).into_response()
        }
        Err(err) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

async fn list_games_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let guard = state.lock().await;
    Json(json!({ "games": guard.engine.list_games() }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(256);

    {
        let mut guard = state.lock().await;
        guard.clients.insert(
            client_id.clone(),
            ClientContext {
                tx: tx.clone(),
                game_id: None,
                player_id: None,
            },
        );
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(state.clone(), &client_id, raw.to_string()).await;
            }
            Message::Binary(raw) => {
                if let Ok(text) = String::from_utf8(raw.to_vec()) {
                    handle_client_message(state.clone(), &client_id, text).await;
                } else {
                    send_error_to_client(&state, &client_id, "invalid utf8 message").await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    handle_disconnect(state, &client_id).await;
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: SharedState, client_id: &str, raw: String) {
    let Some(message) = parse_client_message(&raw) else {
        send_error_to_client(&state, client_id, "invalid message").await;
        return;
    };

    match message {
        ParsedClientMessage::Join { game_id, name } => {
            handle_join(state, client_id, game_id, name).await;
        }
        ParsedClientMessage::Move { direction } => {
            handle_move(state, client_id, direction).await;
        }
        ParsedClientMessage::Pickup => {
            handle_pickup(state, client_id).await;
        }
        ParsedClientMessage::Drop { item_id } => {
            handle_drop(state, client_id, item_id).await;
        }
        ParsedClientMessage::Use { item_id } => {
            handle_use(state, client_id, item_id).await;
        }
        ParsedClientMessage::Leave => {
            let mut guard = state.lock().await;
            detach_from_game(&mut guard, client_id, true);
        }
        ParsedClientMessage::Ping { t } => {
            let mut guard = state.lock().await;
            send_to_client(
                &mut guard,
                client_id,
                &json!({
                    "type": "pong",
                    "t": t,
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }
    }
}

async fn handle_join(state: SharedState, client_id: &str, game_id: String, name: String) {
    let mut guard = state.lock().await;

    // One game per connection; leaving the old one first keeps the
    // rosters honest.
    detach_from_game(&mut guard, client_id, true);

    let player_id = make_id("player");
    let view = match guard
        .engine
        .add_player(&game_id, player_id.clone(), sanitize_name(&name))
    {
        Ok(view) => view,
        Err(err) => {
            let message = err.to_string();
            send_to_client(
                &mut guard,
                client_id,
                &json!({
                    "type": "error",
                    "message": message,
                }),
                QueuePolicy::DisconnectOnFull,
            );
            return;
        }
    };

    if let Some(ctx) = guard.clients.get_mut(client_id) {
        ctx.game_id = Some(game_id.clone());
        ctx.player_id = Some(player_id.clone());
    }

    broadcast_to_game(
        &mut guard,
        &game_id,
        &json!({
            "type": "playerJoined",
            "player": view,
        }),
        QueuePolicy::DisconnectOnFull,
        Some(client_id),
    );

    let initial_state = guard.engine.visible_state(&game_id, &player_id).ok();
    send_to_client(
        &mut guard,
        client_id,
        &json!({
            "type": "joined",
            "playerId": player_id,
            "gameId": game_id,
            "state": initial_state,
        }),
        QueuePolicy::DisconnectOnFull,
    );
    println!("[server] {player_id} joined {game_id}");
}

async fn handle_move(state: SharedState, client_id: &str, direction: Direction) {
    let mut guard = state.lock().await;
    let Some((game_id, player_id)) = bound_game(&guard, client_id) else {
        send_to_client(
            &mut guard,
            client_id,
            &json!({
                "type": "error",
                "message": "join a game first",
            }),
            QueuePolicy::DisconnectOnFull,
        );
        return;
    };

    let outcome = match guard.engine.move_player(&game_id, &player_id, direction) {
        Ok(outcome) => outcome,
        Err(err) => {
            let message = err.to_string();
            send_to_client(
                &mut guard,
                client_id,
                &json!({
                    "type": "error",
                    "message": message,
                }),
                QueuePolicy::DisconnectOnFull,
            );
            return;
        }
    };

    let position = guard
        .engine
        .game(&game_id)
        .ok()
        .and_then(|game| game.player_view(&player_id))
        .map(|view| view.position);
    broadcast_to_game(
        &mut guard,
        &game_id,
        &json!({
            "type": "playerMoved",
            "playerId": player_id,
            "success": outcome.success,
            "position": position,
        }),
        QueuePolicy::DisconnectOnFull,
        None,
    );

    if !outcome.success {
        return;
    }

    if outcome.secret_door_found {
        send_to_client(
            &mut guard,
            client_id,
            &json!({
                "type": "secretDoorFound",
            }),
            QueuePolicy::DisconnectOnFull,
        );
    }

    if outcome.map_dropped {
        broadcast_to_game(
            &mut guard,
            &game_id,
            &json!({
                "type": "mapDropped",
                "playerId": player_id,
                "position": position,
            }),
            QueuePolicy::DisconnectOnFull,
            None,
        );
    }

    if !outcome.combat_results.is_empty() {
        broadcast_to_game(
            &mut guard,
            &game_id,
            &json!({
                "type": "combatResults",
                "results": outcome.combat_results,
            }),
            QueuePolicy::DisconnectOnFull,
            None,
        );
    }

    for casualty in &outcome.casualties {
        broadcast_to_game(
            &mut guard,
            &game_id,
            &json!({
                "type": "playerDied",
                "playerId": casualty.id,
                "playerName": casualty.name,
            }),
            QueuePolicy::DisconnectOnFull,
            None,
        );
        unbind_player(&mut guard, &casualty.id);
    }

    if outcome.game_won {
        let winner = guard
            .engine
            .game(&game_id)
            .ok()
            .and_then(|game| game.winner.clone());
        broadcast_to_game(
            &mut guard,
            &game_id,
            &json!({
                "type": "gameWon",
                "winner": winner,
            }),
            QueuePolicy::DisconnectOnFull,
            None,
        );
    }

    // Hints about the destination cell so clients can prompt the player.
    if let Some(cell) = guard
        .engine
        .game(&game_id)
        .ok()
        .and_then(|game| game.player_view(&player_id).map(|view| game.maze.cell(view.position).clone()))
    {
        if !cell.items.is_empty() {
            send_to_client(
                &mut guard,
                client_id,
                &json!({
                    "type": "itemsAvailable",
                    "items": cell.items,
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }
        if cell.stairs.up || cell.stairs.down {
            send_to_client(
                &mut guard,
                client_id,
                &json!({
                    "type": "stairsAvailable",
                    "up": cell.stairs.up,
                    "down": cell.stairs.down,
                }),
                QueuePolicy::DisconnectOnFull,
            );
        }
    }

    push_game_states(&mut guard, &game_id, QueuePolicy::DisconnectOnFull);
}

async fn handle_pickup(state: SharedState, client_id: &str) {
    let mut guard = state.lock().await;
    let Some((game_id, player_id)) = bound_game(&guard, client_id) else {
        send_error(&mut guard, client_id, "join a game first");
        return;
    };

    match guard.engine.pickup_item(&game_id, &player_id) {
        Ok(Some(item)) => {
            broadcast_to_game(
                &mut guard,
                &game_id,
                &json!({
                    "type": "itemPickedUp",
                    "playerId": player_id,
                    "item": item,
                }),
                QueuePolicy::DisconnectOnFull,
                None,
            );
            push_game_states(&mut guard, &game_id, QueuePolicy::DisconnectOnFull);
        }
        Ok(None) => {
            send_error(&mut guard, client_id, "nothing to pick up");
        }
        Err(err) => {
            let message = err.to_string();
            send_error(&mut guard, client_id, &message);
        }
    }
}

async fn handle_drop(state: SharedState, client_id: &str, item_id: String) {
    let mut guard = state.lock().await;
    let Some((game_id, player_id)) = bound_game(&guard, client_id) else {
        send_error(&mut guard, client_id, "join a game first");
        return;
    };

    match guard.engine.drop_item(&game_id, &player_id, &item_id) {
        Ok(Some(item)) => {
            broadcast_to_game(
                &mut guard,
                &game_id,
                &json!({
                    "type": "itemDropped",
                    "playerId": player_id,
                    "item": item,
                }),
                QueuePolicy::DisconnectOnFull,
                None,
            );
            push_game_states(&mut guard, &game_id, QueuePolicy::DisconnectOnFull);
        }
        Ok(None) => {
            send_error(&mut guard, client_id, "item is not in your inventory");
        }
        Err(err) => {
            let message = err.to_string();
            send_error(&mut guard, client_id, &message);
        }
    }
}

async fn handle_use(state: SharedState, client_id: &str, item_id: String) {
    let mut guard = state.lock().await;
    let Some((game_id, player_id)) = bound_game(&guard, client_id) else {
        send_error(&mut guard, client_id, "join a game first");
        return;
    };

    match guard.engine.use_item(&game_id, &player_id, &item_id) {
        Ok(outcome) => {
            send_to_client(
                &mut guard,
                client_id,
                &json!({
                    "type": "itemUsed",
                    "itemId": item_id,
                    "success": outcome.success,
                    "effect": outcome.effect,
                }),
                QueuePolicy::DisconnectOnFull,
            );
            if outcome.success {
                push_game_states(&mut guard, &game_id, QueuePolicy::DisconnectOnFull);
            }
        }
        Err(err) => {
            let message = err.to_string();
            send_error(&mut guard, client_id, &message);
        }
    }
}

async fn handle_disconnect(state: SharedState, client_id: &str) {
    let mut guard = state.lock().await;
    detach_from_game(&mut guard, client_id, true);
    guard.clients.remove(client_id);
}

/// Pulls the client out of its current game, if any, ending the game in
/// the departing player's favor when they hold the key.
fn detach_from_game(state: &mut ServerState, client_id: &str, broadcast_after: bool) {
    let Some((game_id, player_id)) = bound_game(state, client_id) else {
        return;
    };
    if let Some(ctx) = state.clients.get_mut(client_id) {
        ctx.game_id = None;
        ctx.player_id = None;
    }

    let removed = state
        .engine
        .remove_player(&game_id, &player_id, now_ms())
        .is_ok();
    if !removed || !broadcast_after {
        return;
    }

    broadcast_to_game(
        state,
        &game_id,
        &json!({
            "type": "playerLeft",
            "playerId": player_id,
        }),
        QueuePolicy::DisconnectOnFull,
        None,
    );

    // The departing player may have been the key holder.
    let winner = state
        .engine
        .game(&game_id)
        .ok()
        .and_then(|game| game.winner.clone());
    if let Some(winner) = winner {
        broadcast_to_game(
            state,
            &game_id,
            &json!({
                "type": "gameWon",
                "winner": winner,
            }),
            QueuePolicy::DisconnectOnFull,
            None,
        );
    }
    println!("[server] {player_id} left {game_id}");
}

/// Drops the game binding of whichever client plays `player_id` without
/// touching the engine roster (used after in-game death).
fn unbind_player(state: &mut ServerState, player_id: &str) {
    let client_id = state
        .clients
        .iter()
        .find(|(_, ctx)| ctx.player_id.as_deref() == Some(player_id))
        .map(|(id, _)| id.clone());
    if let Some(client_id) = client_id {
        if let Some(ctx) = state.clients.get_mut(&client_id) {
            ctx.game_id = None;
            ctx.player_id = None;
        }
    }
}

fn bound_game(state: &ServerState, client_id: &str) -> Option<(String, String)> {
    let ctx = state.clients.get(client_id)?;
    Some((ctx.game_id.clone()?, ctx.player_id.clone()?))
}

fn start_tick_loop(state: SharedState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_MS));
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            guard.engine.tick(now_ms());

            let game_ids: Vec<String> = guard
                .clients
                .values()
                .filter_map(|ctx| ctx.game_id.clone())
                .collect();
            let mut seen = std::collections::HashSet::new();
            for game_id in game_ids {
                if seen.insert(game_id.clone()) {
                    push_game_states(&mut guard, &game_id, QueuePolicy::DropOnFull);
                }
            }
        }
    });
}

/// Sends each connected player of a game their own visibility-filtered
/// snapshot.
fn push_game_states(state: &mut ServerState, game_id: &str, policy: QueuePolicy) {
    let bindings: Vec<(String, String)> = state
        .clients
        .iter()
        .filter(|(_, ctx)| ctx.game_id.as_deref() == Some(game_id))
        .filter_map(|(client_id, ctx)| {
            ctx.player_id
                .clone()
                .map(|player_id| (client_id.clone(), player_id))
        })
        .collect();

    for (client_id, player_id) in bindings {
        let Ok(snapshot) = state.engine.visible_state(game_id, &player_id) else {
            continue;
        };
        send_to_client(
            state,
            &client_id,
            &json!({
                "type": "gameStateUpdate",
                "state": snapshot,
            }),
            policy,
        );
    }
}

fn broadcast_to_game(
    state: &mut ServerState,
    game_id: &str,
    message: &Value,
    policy: QueuePolicy,
    exclude_client: Option<&str>,
) {
    let payload = message.to_string();
    let client_ids: Vec<String> = state
        .clients
        .iter()
        .filter(|(client_id, ctx)| {
            ctx.game_id.as_deref() == Some(game_id)
                && exclude_client != Some(client_id.as_str())
        })
        .map(|(client_id, _)| client_id.clone())
        .collect();

    let mut failed_clients = Vec::new();
    for client_id in client_ids {
        let Some(client) = state.clients.get(&client_id) else {
            continue;
        };
        if client
            .tx
            .try_send(OutboundMessage::Text(payload.clone()))
            .is_err()
            && policy == QueuePolicy::DisconnectOnFull
        {
            failed_clients.push(client_id);
        }
    }
    if policy == QueuePolicy::DisconnectOnFull {
        for client_id in failed_clients {
            kick_client(state, &client_id);
        }
    }
}

fn send_to_client(state: &mut ServerState, client_id: &str, message: &Value, policy: QueuePolicy) {
    let send_failed = if let Some(client) = state.clients.get(client_id) {
        client
            .tx
            .try_send(OutboundMessage::Text(message.to_string()))
            .is_err()
    } else {
        false
    };
    if send_failed && policy == QueuePolicy::DisconnectOnFull {
        kick_client(state, client_id);
    }
}

fn send_error(state: &mut ServerState, client_id: &str, message: &str) {
    send_to_client(
        state,
        client_id,
        &json!({
            "type": "error",
            "message": message,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

async fn send_error_to_client(state: &SharedState, client_id: &str, message: &str) {
    let mut guard = state.lock().await;
    send_error(&mut guard, client_id, message);
}

fn kick_client(state: &mut ServerState, client_id: &str) {
    detach_from_game(state, client_id, false);
    if let Some(client) = state.clients.remove(client_id) {
        let _ = client.tx.try_send(OutboundMessage::Close {
            code: 1011,
            reason: "send queue overflow".to_string(),
        });
    }
}

fn sanitize_name(value: &str) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return "Player".to_string();
    }
    trimmed.chars().take(16).collect()
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
