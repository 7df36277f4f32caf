use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use clap::Parser;
use craft_war_server::config::GameConfig;
use craft_war_server::engine::GameSession;
use craft_war_server::error::ConfigError;
use craft_war_server::server_protocol::{parse_client_message, ParsedClientMessage};
use craft_war_server::server_utils::{format_timestamp, normalize_room_id};
use craft_war_server::snapshot::{diff, Snapshot};
use craft_war_server::types::{Phase, RuntimeEvent};
use futures_util::{SinkExt, StreamExt};
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_PORT: u16 = 2567;
const CLIENT_QUEUE_CAPACITY: usize = 256;
const ROOM_INBOX_CAPACITY: usize = 512;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Debug, Parser)]
#[command(name = "server", about = "Authoritative match server")]
struct Cli {
    /// Listen port. Falls back to $PORT, then 2567.
    #[arg(long)]
    port: Option<u16>,
    /// TOML balance overrides.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Error)]
enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("server socket: {0}")]
    Io(#[from] std::io::Error),
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

#[derive(Debug)]
enum RoomInput {
    Join {
        client_id: String,
        tx: mpsc::Sender<OutboundMessage>,
    },
    Leave {
        client_id: String,
    },
    Message {
        client_id: String,
        message: ParsedClientMessage,
    },
}

#[derive(Clone, Copy, Debug)]
struct RoomStatus {
    phase: Phase,
    players: usize,
}

struct RoomHandle {
    inbox: mpsc::Sender<RoomInput>,
    status: watch::Receiver<RoomStatus>,
    created_at: DateTime<Utc>,
}

struct ServerState {
    config: Arc<GameConfig>,
    rooms: HashMap<String, RoomHandle>,
}

#[derive(Debug, Deserialize)]
struct WsQuery {
    room: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("craft_war_server=info,server=info")),
        )
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "server stopped");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ServerError> {
    let port = cli
        .port
        .or_else(|| {
            std::env::var("PORT")
                .ok()
                .and_then(|value| value.parse::<u16>().ok())
        })
        .unwrap_or(DEFAULT_PORT);
    let config = Arc::new(GameConfig::load_or_default(cli.config.as_deref())?);
    info!(
        tick_rate = config.tick_rate,
        round_duration_sec = config.round_duration_sec,
        "balance loaded"
    );

    let state = Arc::new(Mutex::new(ServerState {
        config,
        rooms: HashMap::new(),
    }));

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/sessions", get(sessions_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(port, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn sessions_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let guard = state.lock().await;
    let mut sessions: Vec<(&String, &RoomHandle)> = guard.rooms.iter().collect();
    sessions.sort_by(|a, b| a.0.cmp(b.0));
    let payload: Vec<Value> = sessions
        .into_iter()
        .map(|(room_id, handle)| {
            let status = *handle.status.borrow();
            json!({
                "id": room_id,
                "phase": status.phase,
                "players": status.players,
                "createdAt": format_timestamp(handle.created_at),
            })
        })
        .collect();
    Json(json!({ "sessions": payload }))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    let room_id = normalize_room_id(query.room.as_deref());
    ws.on_upgrade(move |socket| handle_socket(state, socket, room_id))
}

async fn handle_socket(state: SharedState, socket: WebSocket, room_id: Option<String>) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(CLIENT_QUEUE_CAPACITY);

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

    let Some(room_id) = room_id else {
        reject(&tx, "invalid room id");
        drop(tx);
        let _ = writer.await;
        return;
    };

    let inbox = room_inbox(&state, &room_id).await;
    let joined = inbox
        .send(RoomInput::Join {
            client_id: client_id.clone(),
            tx: tx.clone(),
        })
        .await;
    if joined.is_err() {
        reject(&tx, "room is closing");
        drop(tx);
        let _ = writer.await;
        return;
    }
    debug!(client_id = %client_id, room_id = %room_id, "socket attached");

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };
        let raw = match message {
            Message::Text(raw) => raw.to_string(),
            Message::Binary(raw) => match String::from_utf8(raw.to_vec()) {
                Ok(text) => text,
                Err(_) => {
                    send_error(&tx, "invalid utf8 message");
                    continue;
                }
            },
            Message::Close(_) => break,
            _ => continue,
        };

        match parse_client_message(&raw) {
            Some(ParsedClientMessage::Ping { t }) => {
                let _ = tx.try_send(OutboundMessage::Text(
                    json!({ "type": "pong", "t": t }).to_string(),
                ));
            }
            Some(message) => {
                let forwarded = inbox
                    .send(RoomInput::Message {
                        client_id: client_id.clone(),
                        message,
                    })
                    .await;
                if forwarded.is_err() {
                    break;
                }
            }
            None => {
                warn!(client_id = %client_id, "unparseable client message");
                send_error(&tx, "invalid message");
            }
        }
    }

    let _ = inbox
        .send(RoomInput::Leave {
            client_id: client_id.clone(),
        })
        .await;
    drop(tx);
    let _ = writer.await;
    debug!(client_id = %client_id, "socket closed");
}

/// Returns the inbox of `room_id`, starting a fresh session when none runs.
async fn room_inbox(state: &SharedState, room_id: &str) -> mpsc::Sender<RoomInput> {
    let mut guard = state.lock().await;
    if let Some(handle) = guard.rooms.get(room_id) {
        if !handle.inbox.is_closed() {
            return handle.inbox.clone();
        }
    }

    let (inbox_tx, inbox_rx) = mpsc::channel(ROOM_INBOX_CAPACITY);
    let (status_tx, status_rx) = watch::channel(RoomStatus {
        phase: Phase::Waiting,
        players: 0,
    });
    let seed: u32 = rand::rng().random();
    guard.rooms.insert(
        room_id.to_string(),
        RoomHandle {
            inbox: inbox_tx.clone(),
            status: status_rx,
            created_at: Utc::now(),
        },
    );

    let config = guard.config.clone();
    let room = room_id.to_string();
    let registry = state.clone();
    tokio::spawn(async move {
        match GameSession::new(config, seed) {
            Ok(session) => run_room(room.clone(), session, inbox_rx, status_tx).await,
            Err(err) => {
                error!(room_id = %room, %err, "session rejected its config");
                drop(inbox_rx);
            }
        }
        let mut guard = registry.lock().await;
        let finished = guard
            .rooms
            .get(&room)
            .map(|handle| handle.inbox.is_closed())
            .unwrap_or(false);
        if finished {
            guard.rooms.remove(&room);
        }
    });
    inbox_tx
}

struct Room {
    id: String,
    session: GameSession,
    clients: HashMap<String, mpsc::Sender<OutboundMessage>>,
    last_snapshot: Snapshot,
    status: watch::Sender<RoomStatus>,
    seated_once: bool,
}

async fn run_room(
    room_id: String,
    session: GameSession,
    mut inbox: mpsc::Receiver<RoomInput>,
    status: watch::Sender<RoomStatus>,
) {
    let tick_ms = session.config().tick_ms();
    let mut room = Room {
        id: room_id,
        last_snapshot: session.build_snapshot(),
        session,
        clients: HashMap::new(),
        status,
        seated_once: false,
    };
    info!(room_id = %room.id, "session created");

    let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
    loop {
        tokio::select! {
            _ = interval.tick() => room.tick(tick_ms),
            input = inbox.recv() => match input {
                Some(input) => room.handle_input(input),
                None => break,
            },
        }
        if room.should_close() {
            break;
        }
    }

    inbox.close();
    room.close_all("session closed");
    info!(room_id = %room.id, "session closed");
}

impl Room {
    fn handle_input(&mut self, input: RoomInput) {
        match input {
            RoomInput::Join { client_id, tx } => {
                let Some(slot) = self.session.join(&client_id) else {
                    reject(&tx, "session is not accepting players");
                    return;
                };
                self.clients.insert(client_id.clone(), tx);
                self.seated_once = true;
                self.send_to(
                    &client_id,
                    &json!({
                        "type": "welcome",
                        "clientId": client_id,
                        "playerId": slot,
                        "roomId": self.id,
                        "tickRate": self.session.config().tick_rate,
                    }),
                    QueuePolicy::DisconnectOnFull,
                );
                self.last_snapshot = self.session.build_snapshot();
                let state = json!({
                    "type": "state",
                    "snapshot": self.last_snapshot,
                });
                self.broadcast(&state, QueuePolicy::DisconnectOnFull);
                self.flush_lifecycle_events();
            }
            RoomInput::Leave { client_id } => {
                self.clients.remove(&client_id);
                self.session.leave(&client_id);
                self.flush_lifecycle_events();
            }
            RoomInput::Message { client_id, message } => match message {
                ParsedClientMessage::Command(command) => {
                    if !self.session.enqueue(&client_id, command) {
                        self.send_to(
                            &client_id,
                            &json!({ "type": "error", "message": "match is not running" }),
                            QueuePolicy::DropOnFull,
                        );
                    }
                }
                ParsedClientMessage::Ping { .. } => {}
            },
        }
        self.publish_status();
    }

    fn tick(&mut self, tick_ms: u64) {
        if self.session.phase() != Phase::Playing {
            return;
        }
        if let Err(err) = self.session.step(tick_ms) {
            error!(room_id = %self.id, %err, "tick failed");
            self.broadcast(
                &json!({ "type": "error", "message": "session halted" }),
                QueuePolicy::DisconnectOnFull,
            );
            self.publish_status();
            return;
        }

        let next = self.session.build_snapshot();
        let delta = diff(&self.last_snapshot, &next);
        self.last_snapshot = next;

        let (lifecycle, events): (Vec<RuntimeEvent>, Vec<RuntimeEvent>) = self
            .session
            .drain_events()
            .into_iter()
            .partition(is_lifecycle_event);
        self.broadcast(
            &json!({
                "type": "delta",
                "delta": delta,
                "events": events,
            }),
            QueuePolicy::DisconnectOnFull,
        );
        for event in lifecycle {
            self.broadcast_lifecycle(event);
        }
        self.publish_status();
    }

    fn flush_lifecycle_events(&mut self) {
        for event in self.session.drain_events() {
            if is_lifecycle_event(&event) {
                self.broadcast_lifecycle(event);
            }
        }
    }

    fn broadcast_lifecycle(&mut self, event: RuntimeEvent) {
        match event {
            RuntimeEvent::GameStart => {
                self.broadcast(&json!({ "type": "game_start" }), QueuePolicy::DisconnectOnFull);
            }
            RuntimeEvent::GameResult { .. } => {
                let payload = serde_json::to_value(&event).unwrap_or(Value::Null);
                self.broadcast(&payload, QueuePolicy::DisconnectOnFull);
            }
            _ => {}
        }
    }

    fn should_close(&self) -> bool {
        match self.session.phase() {
            Phase::Finished => true,
            Phase::Waiting => self.seated_once && self.clients.is_empty(),
            Phase::Playing => false,
        }
    }

    fn publish_status(&self) {
        let status = RoomStatus {
            phase: self.session.phase(),
            players: self.session.players().len(),
        };
        self.status.send_replace(status);
    }

    fn send_to(&mut self, client_id: &str, message: &Value, policy: QueuePolicy) {
        let send_failed = self
            .clients
            .get(client_id)
            .map(|tx| tx.try_send(OutboundMessage::Text(message.to_string())).is_err())
            .unwrap_or(false);
        if send_failed && policy == QueuePolicy::DisconnectOnFull {
            self.drop_client(client_id);
        }
    }

    fn broadcast(&mut self, message: &Value, policy: QueuePolicy) {
        let payload = message.to_string();
        let mut failed_clients = Vec::new();
        for (client_id, tx) in &self.clients {
            if tx.try_send(OutboundMessage::Text(payload.clone())).is_err()
                && policy == QueuePolicy::DisconnectOnFull
            {
                failed_clients.push(client_id.clone());
            }
        }
        for client_id in failed_clients {
            self.drop_client(&client_id);
        }
    }

    fn drop_client(&mut self, client_id: &str) {
        warn!(room_id = %self.id, client_id, "client queue full, disconnecting");
        if let Some(tx) = self.clients.remove(client_id) {
            let _ = tx.try_send(OutboundMessage::Close {
                code: 1013,
                reason: "client too slow".to_string(),
            });
        }
        self.session.leave(client_id);
        self.flush_lifecycle_events();
    }

    fn close_all(&mut self, reason: &str) {
        for (_, tx) in self.clients.drain() {
            let _ = tx.try_send(OutboundMessage::Close {
                code: 1000,
                reason: reason.to_string(),
            });
        }
    }
}

fn is_lifecycle_event(event: &RuntimeEvent) -> bool {
    matches!(
        event,
        RuntimeEvent::GameStart | RuntimeEvent::GameResult { .. }
    )
}

fn send_error(tx: &mpsc::Sender<OutboundMessage>, message: &str) {
    let _ = tx.try_send(OutboundMessage::Text(
        json!({ "type": "error", "message": message }).to_string(),
    ));
}

fn reject(tx: &mpsc::Sender<OutboundMessage>, message: &str) {
    send_error(tx, message);
    let _ = tx.try_send(OutboundMessage::Close {
        code: 1008,
        reason: message.to_string(),
    });
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}
