//! Live connections and the identities they are bound to.

use std::collections::{BTreeSet, HashMap};

use cardlink_shared::ServerMessage;
use tokio::sync::mpsc;

/// Process-unique, monotonically increasing connection identifier.
pub type ConnectionId = u64;

/// What the socket writer task should do next.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Message(ServerMessage),
    /// Send a close frame and stop writing.
    Close,
}

/// Sending half of a connection's outbound queue.
pub type Outbox = mpsc::UnboundedSender<Outbound>;

/// A transport connection as seen by the relay.
#[derive(Debug)]
pub struct Connection {
    outbox: Outbox,
    identity: Option<String>,
}

impl Connection {
    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    /// False once the writer task has gone away.
    pub fn is_open(&self) -> bool {
        !self.outbox.is_closed()
    }

    fn push(&self, outbound: Outbound) -> bool {
        self.outbox.send(outbound).is_ok()
    }
}

/// Maps identities to the set of connections authenticated as them.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    next_id: ConnectionId,
    connections: HashMap<ConnectionId, Connection>,
    by_identity: HashMap<String, BTreeSet<ConnectionId>>,
}

impl ConnectionRegistry {
    /// Track a freshly opened, unbound connection.
    pub fn accept(&mut self, outbox: Outbox) -> ConnectionId {
        self.next_id += 1;
        let id = self.next_id;
        self.connections.insert(
            id,
            Connection {
                outbox,
                identity: None,
            },
        );
        id
    }

    pub fn contains(&self, conn: ConnectionId) -> bool {
        self.connections.contains_key(&conn)
    }

    pub fn identity_of(&self, conn: ConnectionId) -> Option<&str> {
        self.connections.get(&conn).and_then(Connection::identity)
    }

    /// Bind `conn` to `identity`. Binding twice is a no-op.
    pub fn bind(&mut self, identity: &str, conn: ConnectionId) {
        let Some(connection) = self.connections.get_mut(&conn) else {
            return;
        };
        connection.identity = Some(identity.to_string());
        self.by_identity
            .entry(identity.to_string())
            .or_default()
            .insert(conn);
    }

    /// Detach `conn` from `identity`.
    ///
    /// Returns true when that was the identity's last connection, in which
    /// case the identity is dropped from the registry.
    pub fn unbind(&mut self, identity: &str, conn: ConnectionId) -> bool {
        if let Some(connection) = self.connections.get_mut(&conn) {
            if connection.identity.as_deref() == Some(identity) {
                connection.identity = None;
            }
        }

        let Some(set) = self.by_identity.get_mut(identity) else {
            return false;
        };
        set.remove(&conn);
        if set.is_empty() {
            self.by_identity.remove(identity);
            return true;
        }
        false
    }

    /// Forget a connection entirely, unbinding it first.
    pub fn remove(&mut self, conn: ConnectionId) -> Option<Connection> {
        let identity = self.identity_of(conn).map(str::to_owned);
        if let Some(identity) = identity {
            self.unbind(&identity, conn);
        }
        self.connections.remove(&conn)
    }

    /// Send `notice` to `conn`, ask its writer to close, and forget it.
    ///
    /// The transport's later close notification finds no record and does
    /// nothing.
    pub fn evict(&mut self, conn: ConnectionId, notice: ServerMessage) {
        if let Some(connection) = self.remove(conn) {
            connection.push(Outbound::Message(notice));
            connection.push(Outbound::Close);
        }
    }

    /// Every connection bound to `identity`, open or not.
    pub fn connections_of(&self, identity: &str) -> Vec<ConnectionId> {
        self.by_identity
            .get(identity)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn has_connections(&self, identity: &str) -> bool {
        self.by_identity.contains_key(identity)
    }

    pub fn is_connection_open(&self, conn: ConnectionId) -> bool {
        self.connections
            .get(&conn)
            .map(Connection::is_open)
            .unwrap_or(false)
    }

    /// True iff at least one bound connection is still open.
    pub fn is_online(&self, identity: &str) -> bool {
        self.by_identity
            .get(identity)
            .map(|set| set.iter().any(|conn| self.is_connection_open(*conn)))
            .unwrap_or(false)
    }

    /// Deliver `message` to every open connection of `identity`.
    ///
    /// Returns whether at least one delivery succeeded.
    pub fn send_to(&self, identity: &str, message: ServerMessage) -> bool {
        let Some(set) = self.by_identity.get(identity) else {
            tracing::debug!("No connections found for user {}", identity);
            return false;
        };

        let mut sent = 0;
        for connection in set.iter().filter_map(|conn| self.connections.get(conn)) {
            if connection.is_open() && connection.push(Outbound::Message(message.clone())) {
                sent += 1;
            }
        }

        tracing::debug!("Sent message to {} connections for user {}", sent, identity);
        sent > 0
    }

    pub fn send_to_connection(&self, conn: ConnectionId, message: ServerMessage) -> bool {
        self.connections
            .get(&conn)
            .map(|connection| connection.push(Outbound::Message(message)))
            .unwrap_or(false)
    }

    /// Move `conns` from `old` to `new`. Used by identity migration only.
    pub(super) fn rebind(&mut self, conns: &[ConnectionId], old: &str, new: &str) {
        for conn in conns {
            self.unbind(old, *conn);
            self.bind(new, *conn);
        }
    }

    /// Identities with at least one bound connection.
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.by_identity.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open() -> (Outbox, mpsc::UnboundedReceiver<Outbound>) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn test_bind_and_presence() {
        let mut registry = ConnectionRegistry::default();
        let (tx1, _rx1) = open();
        let (tx2, _rx2) = open();
        let c1 = registry.accept(tx1);
        let c2 = registry.accept(tx2);
        assert!(c2 > c1);

        assert!(!registry.is_online("u1"));
        registry.bind("u1", c1);
        registry.bind("u1", c1);
        registry.bind("u1", c2);
        assert_eq!(registry.connections_of("u1"), vec![c1, c2]);
        assert!(registry.is_online("u1"));

        assert!(!registry.unbind("u1", c1));
        assert!(registry.unbind("u1", c2));
        assert!(!registry.has_connections("u1"));
        assert!(!registry.is_online("u1"));
    }

    #[test]
    fn test_send_skips_closed_connections() {
        let mut registry = ConnectionRegistry::default();
        let (tx1, rx1) = open();
        let (tx2, mut rx2) = open();
        let c1 = registry.accept(tx1);
        let c2 = registry.accept(tx2);
        registry.bind("u1", c1);
        registry.bind("u1", c2);

        drop(rx1);
        assert!(registry.is_online("u1"));
        assert!(registry.send_to("u1", ServerMessage::PeerLeft));
        assert_eq!(rx2.try_recv().unwrap(), Outbound::Message(ServerMessage::PeerLeft));

        drop(rx2);
        assert!(!registry.is_online("u1"));
        assert!(!registry.send_to("u1", ServerMessage::PeerLeft));
        assert!(!registry.send_to("nobody", ServerMessage::PeerLeft));
    }

    #[test]
    fn test_evict_notifies_then_closes() {
        let mut registry = ConnectionRegistry::default();
        let (tx, mut rx) = open();
        let conn = registry.accept(tx);
        registry.bind("u1", conn);

        let notice = ServerMessage::ForceDisconnected {
            message: "bye".to_string(),
        };
        registry.evict(conn, notice.clone());

        assert_eq!(rx.try_recv().unwrap(), Outbound::Message(notice));
        assert_eq!(rx.try_recv().unwrap(), Outbound::Close);
        assert!(!registry.contains(conn));
        assert!(!registry.has_connections("u1"));
        assert!(registry.remove(conn).is_none());
    }

    #[test]
    fn test_rebind_moves_every_connection() {
        let mut registry = ConnectionRegistry::default();
        let (tx1, _rx1) = open();
        let (tx2, _rx2) = open();
        let c1 = registry.accept(tx1);
        let c2 = registry.accept(tx2);
        registry.bind("old", c1);
        registry.bind("old", c2);

        registry.rebind(&[c1, c2], "old", "new");

        assert!(!registry.has_connections("old"));
        assert_eq!(registry.connections_of("new"), vec![c1, c2]);
        assert_eq!(registry.identity_of(c1), Some("new"));
        assert_eq!(registry.identity_of(c2), Some("new"));
    }
}
