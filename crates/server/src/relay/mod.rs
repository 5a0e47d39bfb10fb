//! The relay core: presence, identities, invites, blocks and the active game.
//!
//! All state lives in one [`Relay`]. Callers serialize access (the server
//! keeps it behind a single mutex) and every public method commits its
//! writes and queues its outbound frames before returning, so no caller can
//! observe a half-applied operation.

mod blocks;
mod connections;
mod directory;
mod dispatch;
mod invites;
mod pairing;
mod presence;


use std::collections::{BTreeMap, BTreeSet};

use cardlink_shared::{Invite, RelayError, ServerMessage};
use serde::Serialize;

use blocks::BlockList;
use connections::ConnectionRegistry;
use directory::IdentityDirectory;
use invites::InviteLedger;
use pairing::Pairing;

pub use connections::{ConnectionId, Outbound, Outbox};
pub use pairing::ActivePair;

/// Coordinator owning every piece of relay state.
#[derive(Debug, Default)]
pub struct Relay {
    connections: ConnectionRegistry,
    directory: IdentityDirectory,
    blocks: BlockList,
    invites: InviteLedger,
    pairing: Pairing,
}

impl Relay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly opened socket and greet it.
    pub fn connect(&mut self, outbox: Outbox) -> ConnectionId {
        let conn = self.connections.accept(outbox);
        self.connections.send_to_connection(
            conn,
            ServerMessage::Connected {
                message: "Welcome. Please register.".to_string(),
            },
        );
        tracing::info!("New WebSocket connection: ID {}", conn);
        conn
    }

    /// The identity `conn` is bound to.
    fn authenticated(&self, conn: ConnectionId) -> Result<String, RelayError> {
        self.connections
            .identity_of(conn)
            .map(str::to_owned)
            .ok_or(RelayError::AuthRequired)
    }

    fn display_name_or_id(&self, user_id: &str) -> String {
        self.directory
            .name_of(user_id)
            .unwrap_or(user_id)
            .to_string()
    }

    /// Point-in-time copy of every structure, for diagnostics.
    pub fn dump(&self) -> RelayDump {
        let connections_by_user = self
            .connections
            .identities()
            .map(|user_id| {
                let open = self
                    .connections
                    .connections_of(user_id)
                    .into_iter()
                    .map(|conn| self.connections.is_connection_open(conn))
                    .collect::<Vec<_>>();
                (
                    user_id.to_string(),
                    UserConnections {
                        count: open.len(),
                        open,
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();

        RelayDump {
            connected_clients: connections_by_user.keys().cloned().collect(),
            online_users_by_user_id: sorted(self.directory.names_by_id()),
            online_users_by_name: sorted(self.directory.ids_by_name()),
            total_users_online: connections_by_user.len(),
            total_connections: connections_by_user.values().map(|c| c.count).sum(),
            connections_by_user,
            invites: self
                .invites
                .all()
                .iter()
                .map(|(id, invite)| (id.clone(), invite.clone()))
                .collect(),
            pending_invites_by_user: sorted(self.invites.pending_index()),
            blocked_users: sorted(self.blocks.entries()),
            active_pair: self.pairing.active().cloned(),
        }
    }
}

fn sorted<V: Clone>(map: &std::collections::HashMap<String, V>) -> BTreeMap<String, V> {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserConnections {
    pub count: usize,
    pub open: Vec<bool>,
}

/// Everything the relay knows, in a stable order.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayDump {
    pub connected_clients: Vec<String>,
    pub online_users_by_user_id: BTreeMap<String, String>,
    pub online_users_by_name: BTreeMap<String, String>,
    pub total_users_online: usize,
    pub total_connections: usize,
    pub connections_by_user: BTreeMap<String, UserConnections>,
    pub invites: BTreeMap<String, Invite>,
    pub pending_invites_by_user: BTreeMap<String, BTreeSet<String>>,
    pub blocked_users: BTreeMap<String, BTreeSet<String>>,
    pub active_pair: Option<ActivePair>,
}
