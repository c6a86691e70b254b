use super::bus::SocketDirectory;
use super::events::ServerEvent;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Lifecycle of one peer link, driven by the relay traffic we observe.
///
/// The first bundle in either direction opens the link in `Signaling`; a
/// bundle flowing the opposite way marks it `Connected` (signals are
/// complete bundles, so one round trip is the whole handshake). Departure
/// closes every link touching the socket; a delivery failure marks the link
/// `Errored` without disturbing the rest of the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    Signaling,
    Connected,
    Closed,
    Errored,
}

#[derive(Debug)]
struct PeerLink {
    phase: LinkPhase,
    /// Socket that sent the first bundle over this link
    opened_by: String,
}

/// Store-and-forward relay for opaque WebRTC signal bundles.
///
/// Payloads are never parsed beyond the envelope; the relay's only job is
/// addressing, plus bookkeeping of per-peer link state.
pub struct SignalingRelay {
    directory: Arc<SocketDirectory>,
    links: Mutex<HashMap<(String, String), PeerLink>>,
}

impl SignalingRelay {
    pub fn new(directory: Arc<SocketDirectory>) -> Self {
        Self {
            directory,
            links: Mutex::new(HashMap::new()),
        }
    }

    /// Forward a signal bundle to the target socket as `{signal, from}`.
    ///
    /// An unknown or unreachable target drops this one interaction: the
    /// link is marked errored, the sender stays connected.
    pub async fn forward(&self, from: &str, to: &str, signal: Value) -> bool {
        let delivered = self
            .directory
            .send_to(
                to,
                ServerEvent::WebrtcSignal {
                    signal,
                    from: from.to_string(),
                },
            )
            .await;

        let key = link_key(from, to);
        let mut links = self.links.lock().await;
        let link = links.entry(key).or_insert_with(|| PeerLink {
            phase: LinkPhase::Signaling,
            opened_by: from.to_string(),
        });

        if !delivered {
            warn!("dropping signal from {} to unreachable peer {}", from, to);
            link.phase = LinkPhase::Errored;
            return false;
        }

        if link.phase == LinkPhase::Signaling && link.opened_by != from {
            // Reverse-direction bundle: the answering side has replied.
            link.phase = LinkPhase::Connected;
        }
        debug!("relayed signal {} -> {} ({:?})", from, to, link.phase);
        true
    }

    /// Tear down every link touching the departing socket. Returns how many
    /// links were removed.
    pub async fn teardown(&self, socket_id: &str) -> usize {
        let mut links = self.links.lock().await;
        let before = links.len();
        links.retain(|(a, b), _| a != socket_id && b != socket_id);
        before - links.len()
    }

    /// Current phase of the link between two sockets, if one exists.
    pub async fn link_phase(&self, a: &str, b: &str) -> Option<LinkPhase> {
        let links = self.links.lock().await;
        links.get(&link_key(a, b)).map(|l| l.phase)
    }
}

/// Links are direction-agnostic: one entry per unordered socket pair.
fn link_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}
