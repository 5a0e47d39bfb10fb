//! Presence: disconnect cleanup and user search.

use cardlink_shared::{is_registered_id, LookupType, ServerMessage};

use super::{ConnectionId, Relay};

/// Optional fields of a `search_user` request.
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub search_query: Option<String>,
}

impl Relay {
    /// Handle the transport closing `conn`.
    ///
    /// Connections evicted by a forced registration are already gone and
    /// are ignored here.
    pub fn disconnect(&mut self, conn: ConnectionId) {
        let Some(identity) = self.connections.identity_of(conn).map(str::to_owned) else {
            if self.connections.remove(conn).is_some() {
                tracing::debug!("Unauthenticated connection {} closed", conn);
            }
            return;
        };

        tracing::info!("Connection {} closed for user {}", conn, identity);
        self.release(conn, &identity);
        self.connections.remove(conn);
    }

    /// Unbind `conn` from `identity`; once the identity has no open
    /// connection left, drop its name and end its game.
    pub(super) fn release(&mut self, conn: ConnectionId, identity: &str) {
        self.connections.unbind(identity, conn);
        if self.connections.is_online(identity) {
            return;
        }

        tracing::info!("User {} is now fully offline", identity);
        if let Some(name) = self.directory.remove(identity) {
            tracing::debug!("Removed {} from the searchable name map", name);
        }
        self.abandon_pairing(identity);
    }

    /// Look up an online user by id first, then by display name.
    pub(super) fn search_user(&self, conn: ConnectionId, request: SearchRequest) {
        if request.user_id.is_none() && request.username.is_none() {
            return;
        }
        let requested_id = request.user_id.as_deref().unwrap_or_default().trim();
        let requested_name = request.username.as_deref().unwrap_or_default().trim();
        let search_query = [
            request.search_query.as_deref(),
            Some(requested_id),
            Some(requested_name),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|query| !query.is_empty())
        .unwrap_or_default()
        .to_string();

        let by_id = (!requested_id.is_empty())
            .then(|| self.directory.name_of(requested_id))
            .flatten()
            .filter(|_| self.connections.is_online(requested_id))
            .map(|name| (requested_id, name, LookupType::UserId));
        let by_name = || {
            (!requested_name.is_empty())
                .then(|| self.directory.id_for(requested_name))
                .flatten()
                .filter(|user_id| self.connections.is_online(user_id))
                .map(|user_id| (user_id, requested_name, LookupType::DisplayName))
        };

        let reply = match by_id.or_else(by_name) {
            Some((user_id, user_name, lookup_type)) => {
                tracing::debug!(
                    "User search for '{}': found {} via {:?}",
                    search_query,
                    user_id,
                    lookup_type
                );
                ServerMessage::UserSearchResult {
                    found: true,
                    user_id: Some(user_id.to_string()),
                    user_name: Some(user_name.to_string()),
                    lookup_type,
                    search_query,
                    is_registered_user: Some(is_registered_id(user_id)),
                }
            }
            None => {
                tracing::debug!("User search for '{}': not found or offline", search_query);
                let lookup_type = if requested_id.is_empty() {
                    LookupType::DisplayName
                } else {
                    LookupType::UserId
                };
                ServerMessage::UserSearchResult {
                    found: false,
                    user_id: None,
                    user_name: None,
                    lookup_type,
                    search_query,
                    is_registered_user: None,
                }
            }
        };
        self.connections.send_to_connection(conn, reply);
    }
}
