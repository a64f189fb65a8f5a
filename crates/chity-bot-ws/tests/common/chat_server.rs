//! WebSocket chat service for testing
//!
//! Implements just enough of the chat protocol for one bot to register,
//! bootstrap into a single public group and post messages to it.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, RwLock};

const LOBBY_ID: u32 = 1;

/// Shared server state
#[derive(Default)]
struct ServerState {
    /// Every command received, in order
    received: RwLock<Vec<String>>,
}

/// WebSocket chat service for testing
pub struct ChatServer {
    state: Arc<ServerState>,
    addr: Option<SocketAddr>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl ChatServer {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ServerState::default()),
            addr: None,
            shutdown_tx: None,
        }
    }

    /// Start the server on a random available port
    pub async fn start(&mut self) -> Result<SocketAddr, std::io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        self.addr = Some(addr);

        let state = self.state.clone();
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        self.shutdown_tx = Some(shutdown_tx);

        let app = Router::new().route("/", get(ws_handler)).with_state(state);

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_rx.recv().await;
                })
                .await
                .ok();
        });

        Ok(addr)
    }

    pub fn port(&self) -> Option<u16> {
        self.addr.map(|addr| addr.port())
    }

    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
    }

    pub async fn received(&self) -> Vec<String> {
        self.state.received.read().await.clone()
    }
}

impl Default for ChatServer {
    fn default() -> Self {
        Self::new()
    }
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ServerState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn lobby() -> Value {
    json!({ "group_id": LOBBY_ID, "owner_id": 1, "name": "lobby", "desc": "", "public": true })
}

async fn handle_socket(socket: WebSocket, state: Arc<ServerState>) {
    let (mut sender, mut receiver) = socket.split();
    let mut user_id = 0u32;
    let mut username = String::new();
    let mut displayname = String::new();
    let mut next_msg_id = 1u32;

    while let Some(Ok(msg)) = receiver.next().await {
        let Message::Text(text) = msg else {
            continue;
        };
        let Ok(packet) = serde_json::from_str::<Value>(&text) else {
            continue;
        };
        let cmd = packet["cmd"].as_str().unwrap_or_default().to_string();
        state.received.write().await.push(cmd.clone());

        let mut replies = Vec::new();
        match cmd.as_str() {
            "login" => replies.push(json!({
                "cmd": "error",
                "error_msg": "Incorrect username or password",
                "from": { "cmd": "login" },
            })),
            "register" => {
                user_id = 2;
                username = packet["username"].as_str().unwrap_or_default().to_string();
                displayname = packet["displayname"].as_str().unwrap_or_default().to_string();
                replies.push(json!({ "cmd": "session", "id": 0 }));
            }
            "client_user_info" => replies.push(json!({
                "cmd": "client_user_info",
                "user_id": user_id,
                "username": username,
                "displayname": displayname,
                "bio": null,
                "created_at": "2024-01-01 00:00:00",
                "pfp_name": null,
                "status": "online",
            })),
            "client_groups" => {
                replies.push(json!({ "cmd": "client_groups", "groups": [lobby()] }));
                // Frames the bot does not know about must not disturb it.
                replies.push(json!({ "cmd": "group_codes", "codes": [] }));
            }
            "get_all_groups" => replies.push(json!({ "cmd": "get_all_groups", "groups": [lobby()] })),
            "get_member_ids" => replies.push(json!({
                "cmd": "get_member_ids",
                "group_id": LOBBY_ID,
                "member_ids": [1, user_id],
            })),
            "get_user" => replies.push(json!({
                "cmd": "get_user",
                "users": [{ "user_id": 1, "username": "admin", "displayname": "Admin" }],
            })),
            "group_msg" => {
                replies.push(json!({
                    "cmd": "group_msg",
                    "msg_id": next_msg_id,
                    "group_id": LOBBY_ID,
                    "user_id": 1,
                    "content": "welcome",
                    "attachments": [],
                    "timestamp": "2024-01-01 00:00:00",
                }));
                next_msg_id += 1;
            }
            _ => {}
        }

        for reply in replies {
            if sender.send(Message::Text(reply.to_string())).await.is_err() {
                return;
            }
        }
        if cmd == "register" && sender.send(Message::Ping(vec![1, 2, 3])).await.is_err() {
            return;
        }
    }
}
