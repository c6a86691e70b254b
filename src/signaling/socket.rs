use super::events::{ClientEvent, ParticipantSummary, PeerSummary, ServerEvent};
use crate::http::AppState;
use crate::identity::Identity;
use crate::registry::Participant;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WsQuery {
    pub token: Option<String>,
    pub guest_name: Option<String>,
}

/// GET /ws — upgrade to the signaling connection.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query))
}

async fn handle_socket(socket: WebSocket, state: AppState, query: WsQuery) {
    let socket_id = uuid::Uuid::new_v4().to_string();
    let identity = state
        .identity
        .resolve(query.token.as_deref(), query.guest_name.as_deref(), &socket_id)
        .await;

    info!(
        "socket connected: {} ({}) {}",
        identity.display_name(),
        socket_id,
        if identity.is_guest() { "[guest]" } else { "[auth]" }
    );

    let (mut ws_tx, mut ws_rx) = socket.split();

    // All outbound traffic funnels through one channel so the writer task
    // is the only place touching the sink.
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerEvent>();
    state.directory.register(socket_id.clone(), tx.clone()).await;

    let writer: JoinHandle<()> = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    error!("failed to encode server event: {}", e);
                    continue;
                }
            };
            if ws_tx.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    let mut conn = Connection {
        state: &state,
        socket_id: &socket_id,
        identity: &identity,
        tx: &tx,
        room_feed: None,
    };

    while let Some(message) = ws_rx.next().await {
        match message {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                Ok(event) => conn.dispatch(event).await,
                Err(e) => {
                    warn!("unparseable client event from {}: {}", socket_id, e);
                    conn.reply(ServerEvent::Error {
                        message: "malformed event".to_string(),
                    });
                }
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("socket error for {}: {}", socket_id, e);
                break;
            }
        }
    }

    if let Some(feed) = conn.room_feed.take() {
        feed.abort();
    }
    disconnect(&state, &socket_id, &identity).await;
    drop(tx);
    writer.abort();
}

/// Per-connection context threaded through event handling.
struct Connection<'a> {
    state: &'a AppState,
    socket_id: &'a str,
    identity: &'a Identity,
    tx: &'a mpsc::UnboundedSender<ServerEvent>,
    /// Forwarder task piping the room topic into this connection
    room_feed: Option<JoinHandle<()>>,
}

impl Connection<'_> {
    fn reply(&self, event: ServerEvent) {
        let _ = self.tx.send(event);
    }

    async fn dispatch(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::JoinRoom { room_id, user_name } => {
                self.handle_join(room_id, user_name).await;
            }
            ClientEvent::WebrtcSignal { signal, to, .. } => {
                self.state.relay.forward(self.socket_id, &to, signal).await;
            }
            ClientEvent::StartRecording { room_id } => {
                if let Err(e) = self.state.coordinator.start(&room_id, self.identity).await {
                    warn!("start-recording rejected for room {}: {}", room_id, e);
                    self.reply(ServerEvent::Error {
                        message: e.to_string(),
                    });
                }
            }
            ClientEvent::StopRecording { room_id } => {
                if let Err(e) = self.state.coordinator.stop(&room_id, self.identity).await {
                    warn!("stop-recording rejected for room {}: {}", room_id, e);
                    self.reply(ServerEvent::Error {
                        message: e.to_string(),
                    });
                }
            }
        }
    }

    async fn handle_join(&mut self, room_id: String, user_name: Option<String>) {
        let user_name = user_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.identity.display_name().to_string());

        let participant = Participant {
            socket_id: self.socket_id.to_string(),
            user_id: self.identity.user_id().to_string(),
            user_name: user_name.clone(),
            is_guest: self.identity.is_guest(),
        };

        let snapshot = self.state.registry.join(&room_id, participant).await;
        info!(
            "{} joined room {} ({} participants)",
            user_name,
            room_id,
            snapshot.len()
        );

        // Feed the room topic into this connection's outbound channel,
        // replacing any feed from a previous join.
        let mut topic = self.state.bus.subscribe(&room_id).await;
        let tx = self.tx.clone();
        let feed = tokio::spawn(async move {
            loop {
                match topic.recv().await {
                    Ok(event) => {
                        if tx.send(event).is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("room feed lagged, dropped {} events", missed);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        if let Some(previous) = self.room_feed.replace(feed) {
            previous.abort();
        }

        let others: Vec<&Participant> = snapshot
            .iter()
            .filter(|p| p.socket_id != self.socket_id)
            .collect();

        // The joiner initiates toward every existing member; the members
        // only learn the joiner exists and wait for its offer.
        self.reply(ServerEvent::ExistingUsers(
            others.iter().map(|p| PeerSummary::from(*p)).collect(),
        ));
        let joiner = PeerSummary {
            socket_id: self.socket_id.to_string(),
            user_name,
        };
        for other in &others {
            self.state
                .directory
                .send_to(&other.socket_id, ServerEvent::UserJoinedWebrtc(joiner.clone()))
                .await;
        }

        // Every member gets the roster excluding itself.
        for member in &snapshot {
            let roster: Vec<ParticipantSummary> = snapshot
                .iter()
                .filter(|p| p.socket_id != member.socket_id)
                .map(ParticipantSummary::from)
                .collect();
            self.state
                .directory
                .send_to(&member.socket_id, ServerEvent::RoomParticipants(roster))
                .await;
        }

        self.reply(ServerEvent::UserId {
            id: self.identity.user_id().to_string(),
        });
    }
}

async fn disconnect(state: &AppState, socket_id: &str, identity: &Identity) {
    info!("socket disconnected: {} ({})", identity.display_name(), socket_id);

    let torn_down = state.relay.teardown(socket_id).await;
    if torn_down > 0 {
        info!("tore down {} peer links for {}", torn_down, socket_id);
    }
    state.directory.unregister(socket_id).await;

    if let Some(departure) = state.registry.leave_by_socket(socket_id).await {
        state
            .bus
            .publish(
                &departure.room_id,
                ServerEvent::UserLeft {
                    socket_id: socket_id.to_string(),
                    user_name: departure.departed.user_name.clone(),
                },
            )
            .await;
        state
            .bus
            .publish(
                &departure.room_id,
                ServerEvent::RoomParticipants(
                    departure.remaining.iter().map(ParticipantSummary::from).collect(),
                ),
            )
            .await;

        if departure.remaining.is_empty() {
            state.bus.remove_topic(&departure.room_id).await;
        }
    }
}
