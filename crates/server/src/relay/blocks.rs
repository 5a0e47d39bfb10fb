//! Directed block relation between identities.

use std::collections::{BTreeSet, HashMap};

use cardlink_shared::{InviteStatus, RelayError, ServerMessage};

use super::{ConnectionId, Relay};

/// `blocker -> {blocked}`.
#[derive(Debug, Default)]
pub struct BlockList {
    blocked_by_owner: HashMap<String, BTreeSet<String>>,
}

impl BlockList {
    pub fn block(&mut self, owner: &str, target: &str) {
        self.blocked_by_owner
            .entry(owner.to_string())
            .or_default()
            .insert(target.to_string());
    }

    pub fn unblock(&mut self, owner: &str, target: &str) {
        if let Some(set) = self.blocked_by_owner.get_mut(owner) {
            set.remove(target);
            if set.is_empty() {
                self.blocked_by_owner.remove(owner);
            }
        }
    }

    /// True iff `recipient` has blocked `sender`.
    pub fn is_blocked(&self, sender: &str, recipient: &str) -> bool {
        self.blocked_by_owner
            .get(recipient)
            .map(|set| set.contains(sender))
            .unwrap_or(false)
    }

    /// Owners whose block set names `identity`.
    pub(super) fn owners_blocking(&self, identity: &str) -> Vec<String> {
        self.blocked_by_owner
            .iter()
            .filter(|(_, set)| set.contains(identity))
            .map(|(owner, _)| owner.clone())
            .collect()
    }

    /// Rename `old` to `new` as an owner and inside the listed owners' sets.
    pub(super) fn migrate(&mut self, old: &str, new: &str, blocked_by: &[String]) {
        if let Some(set) = self.blocked_by_owner.remove(old) {
            self.blocked_by_owner
                .entry(new.to_string())
                .or_default()
                .extend(set);
        }
        for owner in blocked_by {
            let owner = if owner == old { new } else { owner.as_str() };
            if let Some(set) = self.blocked_by_owner.get_mut(owner) {
                set.remove(old);
                set.insert(new.to_string());
            }
        }
    }

    pub fn entries(&self) -> &HashMap<String, BTreeSet<String>> {
        &self.blocked_by_owner
    }
}

impl Relay {
    /// Block `target` for the connection's identity and cancel every
    /// pending invite between the two.
    pub(super) fn block(&mut self, conn: ConnectionId, target: &str) -> Result<(), RelayError> {
        let owner = self.authenticated(conn)?;
        self.blocks.block(&owner, target);

        let withdrawn = self.invites.cancel_pending(target, &owner);
        let retracted = self.invites.cancel_pending(&owner, target);
        tracing::info!(
            "User {} blocked {} ({} received and {} sent invites cancelled)",
            owner,
            target,
            withdrawn.len(),
            retracted.len()
        );

        let responder = self.display_name_or_id(&owner);
        for invite_id in retracted {
            self.connections.send_to(
                target,
                ServerMessage::InviteResponse {
                    invite_id,
                    status: InviteStatus::Cancelled,
                    responder: responder.clone(),
                },
            );
        }

        self.connections.send_to_connection(
            conn,
            ServerMessage::UserBlocked {
                blocked_user_id: target.to_string(),
            },
        );
        Ok(())
    }

    pub(super) fn unblock(&mut self, conn: ConnectionId, target: &str) -> Result<(), RelayError> {
        let owner = self.authenticated(conn)?;
        self.blocks.unblock(&owner, target);
        tracing::info!("User {} unblocked {}", owner, target);

        self.connections.send_to_connection(
            conn,
            ServerMessage::UserUnblocked {
                unblocked_user_id: target.to_string(),
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_is_directed() {
        let mut blocks = BlockList::default();
        blocks.block("u2", "u1");

        assert!(blocks.is_blocked("u1", "u2"));
        assert!(!blocks.is_blocked("u2", "u1"));

        blocks.unblock("u2", "u1");
        assert!(!blocks.is_blocked("u1", "u2"));
        assert!(blocks.entries().is_empty());
    }

    #[test]
    fn test_migrate_rewrites_both_sides() {
        let mut blocks = BlockList::default();
        blocks.block("old", "u9");
        blocks.block("u2", "old");
        blocks.block("u3", "old");

        let owners = blocks.owners_blocking("old");
        blocks.migrate("old", "new", &owners);

        assert!(blocks.is_blocked("u9", "new"));
        assert!(blocks.is_blocked("new", "u2"));
        assert!(blocks.is_blocked("new", "u3"));
        assert!(!blocks.entries().contains_key("old"));
        assert!(blocks.owners_blocking("old").is_empty());
    }

    #[test]
    fn test_migrate_self_block() {
        let mut blocks = BlockList::default();
        blocks.block("old", "old");

        let owners = blocks.owners_blocking("old");
        blocks.migrate("old", "new", &owners);

        assert!(blocks.is_blocked("new", "new"));
        assert!(blocks.owners_blocking("old").is_empty());
    }
}
