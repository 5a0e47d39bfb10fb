//! Identity directory: the id <-> display name binding, registration and
//! identity migration.

use std::collections::HashMap;

use cardlink_shared::{is_registered_id, RelayError, ServerMessage};

use super::{ConnectionId, Relay};

/// Bidirectional map between identifiers and display names.
///
/// `names_by_id` and `ids_by_name` are kept as mutual inverses; only
/// [`IdentityDirectory::bind`] and [`IdentityDirectory::remove`] write them.
#[derive(Debug, Default)]
pub struct IdentityDirectory {
    names_by_id: HashMap<String, String>,
    ids_by_name: HashMap<String, String>,
}

impl IdentityDirectory {
    pub fn name_of(&self, user_id: &str) -> Option<&str> {
        self.names_by_id.get(user_id).map(String::as_str)
    }

    pub fn id_for(&self, display_name: &str) -> Option<&str> {
        self.ids_by_name.get(display_name).map(String::as_str)
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.names_by_id.contains_key(user_id)
    }

    /// Bind `user_id` to `display_name`, dropping the id's previous name.
    ///
    /// Callers check that the name is not held by another id first.
    pub fn bind(&mut self, user_id: &str, display_name: &str) {
        if let Some(previous) = self
            .names_by_id
            .insert(user_id.to_string(), display_name.to_string())
        {
            if previous != display_name {
                self.ids_by_name.remove(&previous);
            }
        }
        self.ids_by_name
            .insert(display_name.to_string(), user_id.to_string());
    }

    pub fn remove(&mut self, user_id: &str) -> Option<String> {
        let name = self.names_by_id.remove(user_id)?;
        if self.ids_by_name.get(&name).map(String::as_str) == Some(user_id) {
            self.ids_by_name.remove(&name);
        }
        Some(name)
    }

    pub(super) fn migrate(&mut self, old: &str, new: &str) {
        if let Some(name) = self.names_by_id.remove(old) {
            self.ids_by_name.insert(name.clone(), new.to_string());
            self.names_by_id.insert(new.to_string(), name);
        }
    }

    pub fn names_by_id(&self) -> &HashMap<String, String> {
        &self.names_by_id
    }

    pub fn ids_by_name(&self) -> &HashMap<String, String> {
        &self.ids_by_name
    }
}

/// Every write an identity migration performs, gathered before any of them
/// is applied.
#[derive(Debug)]
struct MigrationPlan {
    old: String,
    new: String,
    connections: Vec<ConnectionId>,
    received_invites: Vec<String>,
    sent_invites: Vec<String>,
    blocked_by: Vec<String>,
}

impl MigrationPlan {
    fn collect(relay: &Relay, old: &str, new: &str) -> Self {
        let (received_invites, sent_invites) = relay.invites.references_to(old);
        Self {
            old: old.to_string(),
            new: new.to_string(),
            connections: relay.connections.connections_of(old),
            received_invites,
            sent_invites,
            blocked_by: relay.blocks.owners_blocking(old),
        }
    }

    fn apply(self, relay: &mut Relay) {
        let (old, new) = (self.old.as_str(), self.new.as_str());
        relay.connections.rebind(&self.connections, old, new);
        relay.directory.migrate(old, new);
        relay
            .invites
            .migrate(old, new, &self.received_invites, &self.sent_invites);
        relay.blocks.migrate(old, new, &self.blocked_by);
        relay.pairing.migrate(old, new);

        tracing::info!(
            "Migrated {} -> {}: {} connections, {} received and {} sent invites, {} block entries",
            old,
            new,
            self.connections.len(),
            self.received_invites.len(),
            self.sent_invites.len(),
            self.blocked_by.len()
        );
    }
}

impl Relay {
    /// Authenticate `conn` as `user_id` under `display_name`.
    ///
    /// Every check runs before the first write, so a rejected registration
    /// leaves no trace.
    pub(super) fn register(
        &mut self,
        conn: ConnectionId,
        user_id: &str,
        display_name: &str,
        force: bool,
    ) -> Result<(), RelayError> {
        if user_id.trim().is_empty() {
            return Err(RelayError::IdentifierMissing);
        }
        let display_name = match display_name.trim() {
            "" => user_id,
            name => name,
        };

        if let Some(owner) = self.directory.id_for(display_name) {
            if owner != user_id {
                tracing::info!(
                    "Registration failed for {}. Display name '{}' is already in use by {}",
                    user_id,
                    display_name,
                    owner
                );
                return Err(RelayError::NameConflict(display_name.to_string()));
            }
        }

        let others: Vec<ConnectionId> = self
            .connections
            .connections_of(user_id)
            .into_iter()
            .filter(|other| *other != conn)
            .collect();
        let live_elsewhere = others
            .iter()
            .any(|other| self.connections.is_connection_open(*other));
        if live_elsewhere && !force {
            tracing::info!("Registration failed for {}. User is already connected", user_id);
            return Err(RelayError::AlreadyConnected);
        }

        if !others.is_empty() {
            tracing::info!(
                "Force registering {}. Disconnecting {} existing connections",
                user_id,
                others.len()
            );
            let notice = ServerMessage::ForceDisconnected {
                message: "Your session was disconnected because you logged in from another \
                          location."
                    .to_string(),
            };
            for other in others {
                self.connections.evict(other, notice.clone());
            }
        }

        let previous = self.connections.identity_of(conn).map(str::to_owned);
        if let Some(previous) = previous.filter(|previous| previous != user_id) {
            self.release(conn, &previous);
        }

        if let Some(old_name) = self.directory.name_of(user_id) {
            if old_name != display_name {
                tracing::info!(
                    "User {} is changing name from '{}' to '{}'",
                    user_id,
                    old_name,
                    display_name
                );
            }
        }
        self.directory.bind(user_id, display_name);
        self.connections.bind(user_id, conn);
        tracing::info!("User {} ({}) is now online and searchable", display_name, user_id);

        let invites = self.invites.pending_for(user_id);
        self.connections
            .send_to_connection(conn, ServerMessage::PendingInvites { invites });
        self.connections.send_to_connection(
            conn,
            ServerMessage::Joined {
                user_id: user_id.to_string(),
                display_name: display_name.to_string(),
                is_registered_user: is_registered_id(user_id),
            },
        );
        Ok(())
    }

    /// Switch the connection's identity to `new_display_name` if no other
    /// identity holds it.
    ///
    /// Returns false on conflict and leaves the caller to report it. Empty or
    /// unchanged names succeed without doing anything.
    pub(super) fn rename_if_unused(&mut self, conn: ConnectionId, new_display_name: &str) -> bool {
        let Some(user_id) = self.connections.identity_of(conn).map(str::to_owned) else {
            return false;
        };
        let new_display_name = new_display_name.trim();
        if new_display_name.is_empty()
            || self.directory.name_of(&user_id) == Some(new_display_name)
        {
            return true;
        }

        if let Some(owner) = self.directory.id_for(new_display_name) {
            if owner != user_id {
                tracing::warn!(
                    "User {} asked for display name '{}', but it is taken by {}",
                    user_id,
                    new_display_name,
                    owner
                );
                return false;
            }
        }

        tracing::info!("Updating display name for {} to '{}'", user_id, new_display_name);
        self.directory.bind(&user_id, new_display_name);
        self.invites.rename_party(&user_id, new_display_name);

        self.connections.send_to_connection(
            conn,
            ServerMessage::DisplayNameUpdated {
                new_display_name: new_display_name.to_string(),
                message: "Your display name was updated based on your request.".to_string(),
            },
        );
        true
    }

    /// Move every reference to `old` over to `new` in one step.
    pub(super) fn migrate(
        &mut self,
        conn: ConnectionId,
        old: &str,
        new: &str,
    ) -> Result<(), RelayError> {
        if self.connections.identity_of(conn) != Some(old) || new.trim().is_empty() {
            tracing::warn!(
                "Invalid migration request. Old ID: {}, current ID: {:?}",
                old,
                self.connections.identity_of(conn)
            );
            return Err(RelayError::InvalidMigration);
        }
        if self.connections.has_connections(new) || self.directory.contains(new) {
            tracing::warn!("Migration failed: new user ID {} already exists", new);
            return Err(RelayError::MigrationConflict);
        }

        MigrationPlan::collect(self, old, new).apply(self);

        let display_name = self.display_name_or_id(new);
        self.connections.send_to_connection(
            conn,
            ServerMessage::IdentityMigrated {
                old_user_id: old.to_string(),
                new_user_id: new.to_string(),
                display_name,
                message: "Identity successfully migrated".to_string(),
            },
        );
        Ok(())
    }
}
