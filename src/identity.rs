//! Connection identity resolution
//!
//! Every connection resolves to either an authenticated user or a guest.
//! Resolution never fails the connection: a missing, unknown, or invalid
//! token degrades to a guest identity tied to the connection's socket id.

use std::collections::HashMap;

/// Identity attached to a connection for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// A signed-in user with a stable id
    Authenticated { id: String, username: String },
    /// An anonymous participant; the id is connection-scoped
    Guest {
        ephemeral_id: String,
        display_name: String,
    },
}

impl Identity {
    /// Build the guest identity for a socket, using the supplied display
    /// name when present.
    pub fn guest(socket_id: &str, display_name: Option<&str>) -> Self {
        Identity::Guest {
            ephemeral_id: format!("guest-{socket_id}"),
            display_name: display_name
                .filter(|n| !n.is_empty())
                .unwrap_or("Guest")
                .to_string(),
        }
    }

    /// Stable user id for authenticated users, synthetic id for guests.
    pub fn user_id(&self) -> &str {
        match self {
            Identity::Authenticated { id, .. } => id,
            Identity::Guest { ephemeral_id, .. } => ephemeral_id,
        }
    }

    pub fn display_name(&self) -> &str {
        match self {
            Identity::Authenticated { username, .. } => username,
            Identity::Guest { display_name, .. } => display_name,
        }
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Identity::Guest { .. })
    }
}

/// Resolves connection credentials to an [`Identity`].
///
/// Implementations must never fail: any resolution problem falls back to a
/// guest identity.
#[async_trait::async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(
        &self,
        token: Option<&str>,
        guest_name: Option<&str>,
        socket_id: &str,
    ) -> Identity;
}

/// Token-table resolver backed by the static token list in configuration.
///
/// The account system lives outside this service; this resolver is the
/// boundary implementation used in deployment and tests.
pub struct TokenTableResolver {
    tokens: HashMap<String, (String, String)>,
}

impl TokenTableResolver {
    pub fn new(entries: impl IntoIterator<Item = (String, String, String)>) -> Self {
        let tokens = entries
            .into_iter()
            .map(|(token, user_id, username)| (token, (user_id, username)))
            .collect();
        Self { tokens }
    }
}

#[async_trait::async_trait]
impl IdentityResolver for TokenTableResolver {
    async fn resolve(
        &self,
        token: Option<&str>,
        guest_name: Option<&str>,
        socket_id: &str,
    ) -> Identity {
        match token.and_then(|t| self.tokens.get(t)) {
            Some((id, username)) => Identity::Authenticated {
                id: id.clone(),
                username: username.clone(),
            },
            None => {
                if token.is_some() {
                    tracing::warn!("invalid token on connect, continuing as guest");
                }
                Identity::guest(socket_id, guest_name)
            }
        }
    }
}
