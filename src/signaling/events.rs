use crate::registry::Participant;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Peer reference delivered for WebRTC setup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PeerSummary {
    pub socket_id: String,
    pub user_name: String,
}

impl From<&Participant> for PeerSummary {
    fn from(p: &Participant) -> Self {
        Self {
            socket_id: p.socket_id.clone(),
            user_name: p.user_name.clone(),
        }
    }
}

/// Participant view sent on the wire; omits the stable user id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub socket_id: String,
    pub user_name: String,
    pub is_guest: bool,
}

impl From<&Participant> for ParticipantSummary {
    fn from(p: &Participant) -> Self {
        Self {
            socket_id: p.socket_id.clone(),
            user_name: p.user_name.clone(),
            is_guest: p.is_guest,
        }
    }
}

/// Events sent by clients.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_id: String,
        #[serde(default)]
        user_name: Option<String>,
    },
    /// Opaque signal bundle addressed to one peer in the same room
    #[serde(rename_all = "camelCase")]
    WebrtcSignal {
        signal: Value,
        to: String,
        #[allow(dead_code)]
        room_id: String,
    },
    #[serde(rename_all = "camelCase")]
    StartRecording { room_id: String },
    #[serde(rename_all = "camelCase")]
    StopRecording { room_id: String },
}

/// Events sent to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    /// Members already present, delivered to a joiner; the joiner initiates
    /// a connection toward each of them
    ExistingUsers(Vec<PeerSummary>),
    /// A new member arrived; recipients wait for its offer
    UserJoinedWebrtc(PeerSummary),
    #[serde(rename_all = "camelCase")]
    WebrtcSignal { signal: Value, from: String },
    RoomParticipants(Vec<ParticipantSummary>),
    #[serde(rename_all = "camelCase")]
    UserLeft {
        socket_id: String,
        user_name: String,
    },
    #[serde(rename_all = "camelCase")]
    RecordingStartSync {
        /// Synchronized capture start, epoch milliseconds
        start_time: i64,
    },
    RecordingStopSync,
    #[serde(rename_all = "camelCase")]
    RecordingProcessing {
        recording_id: String,
        message: String,
    },
    #[serde(rename_all = "camelCase")]
    VideoReady {
        download_url: String,
        recording_id: String,
    },
    #[serde(rename_all = "camelCase")]
    VideoError {
        recording_id: Option<String>,
        error: String,
    },
    #[serde(rename_all = "camelCase")]
    UserId { id: String },
    #[serde(rename_all = "camelCase")]
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_room_parses_wire_shape() {
        let raw = r#"{"event":"join-room","data":{"roomId":"abc123","userName":"ada"}}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        match event {
            ClientEvent::JoinRoom { room_id, user_name } => {
                assert_eq!(room_id, "abc123");
                assert_eq!(user_name.as_deref(), Some("ada"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn signal_payload_stays_opaque() {
        let raw = r#"{"event":"webrtc-signal","data":{"signal":{"type":"offer","sdp":"v=0"},"to":"s2","roomId":"r1"}}"#;
        let event: ClientEvent = serde_json::from_str(raw).unwrap();
        match event {
            ClientEvent::WebrtcSignal { signal, to, .. } => {
                assert_eq!(to, "s2");
                assert_eq!(signal["type"], "offer");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn start_sync_serializes_camel_case() {
        let event = ServerEvent::RecordingStartSync { start_time: 1700000003000 };
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({"event":"recording-start-sync","data":{"startTime":1700000003000i64}})
        );
    }

    #[test]
    fn stop_sync_has_no_payload() {
        let value = serde_json::to_value(&ServerEvent::RecordingStopSync).unwrap();
        assert_eq!(value, json!({"event":"recording-stop-sync"}));
    }

    #[test]
    fn participants_omit_user_id() {
        let event = ServerEvent::RoomParticipants(vec![ParticipantSummary {
            socket_id: "s1".into(),
            user_name: "ada".into(),
            is_guest: false,
        }]);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value["data"][0],
            json!({"socketId":"s1","userName":"ada","isGuest":false})
        );
    }
}
