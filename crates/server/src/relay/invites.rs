//! Invite ledger and the per-recipient pending index.

use std::collections::{BTreeSet, HashMap};

use cardlink_shared::{
    is_registered_id, Invite, InviteDecision, InviteStatus, RelayError, ServerMessage,
    DEFAULT_DECK_CARD_COUNT,
};
use chrono::Utc;
use uuid::Uuid;

use super::{ConnectionId, Relay};

/// Build a fresh invite id: `inv_<unix millis>_<9 random chars>`.
pub fn generate_invite_id() -> String {
    let entropy = Uuid::new_v4().simple().to_string();
    format!("inv_{}_{}", Utc::now().timestamp_millis(), &entropy[..9])
}

/// Fields of a `send_invite` request after authentication.
#[derive(Debug, Clone)]
pub struct InviteRequest {
    pub from_user_name: String,
    pub to_user_id: String,
    pub to_user_name: String,
    pub deck_card_count: Option<u32>,
    pub deck_json_key: String,
}

/// Every invite ever created, plus an index of the pending ones by recipient.
///
/// An invite id is present in `pending_by_recipient` iff the invite's status
/// is [`InviteStatus::Pending`].
#[derive(Debug, Default)]
pub struct InviteLedger {
    invites: HashMap<String, Invite>,
    pending_by_recipient: HashMap<String, BTreeSet<String>>,
}

impl InviteLedger {
    pub fn insert(&mut self, invite: Invite) {
        if invite.status.is_pending() {
            self.pending_by_recipient
                .entry(invite.to_user_id.clone())
                .or_default()
                .insert(invite.id.clone());
        }
        self.invites.insert(invite.id.clone(), invite);
    }

    pub fn get(&self, invite_id: &str) -> Option<&Invite> {
        self.invites.get(invite_id)
    }

    /// Pending invites addressed to `recipient`, oldest first.
    pub fn pending_for(&self, recipient: &str) -> Vec<Invite> {
        let mut pending: Vec<Invite> = self
            .pending_by_recipient
            .get(recipient)
            .into_iter()
            .flatten()
            .filter_map(|id| self.invites.get(id))
            .filter(|invite| invite.status.is_pending())
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        pending
    }

    /// Move a pending invite to a terminal status and unindex it.
    ///
    /// Returns `None` if the invite is unknown or no longer pending.
    pub fn resolve(&mut self, invite_id: &str, status: InviteStatus) -> Option<&Invite> {
        let invite = self.invites.get_mut(invite_id)?;
        if !invite.status.is_pending() || status.is_pending() {
            return None;
        }
        invite.status = status;

        if let Some(set) = self.pending_by_recipient.get_mut(&invite.to_user_id) {
            set.remove(invite_id);
            if set.is_empty() {
                self.pending_by_recipient.remove(&invite.to_user_id);
            }
        }
        Some(invite)
    }

    /// Cancel every pending invite sent by `from` to `to`; returns their ids.
    pub fn cancel_pending(&mut self, from: &str, to: &str) -> Vec<String> {
        let ids: Vec<String> = self
            .pending_by_recipient
            .get(to)
            .into_iter()
            .flatten()
            .filter(|id| {
                self.invites
                    .get(*id)
                    .map(|invite| invite.from_user_id == from)
                    .unwrap_or(false)
            })
            .cloned()
            .collect();

        for id in &ids {
            self.resolve(id, InviteStatus::Cancelled);
        }
        ids
    }

    /// Update `user_id`'s display name on every pending invite it is part of.
    pub fn rename_party(&mut self, user_id: &str, display_name: &str) {
        for invite in self.invites.values_mut() {
            if !invite.status.is_pending() || !invite.involves(user_id) {
                continue;
            }
            if invite.from_user_id == user_id {
                invite.from_user_name = display_name.to_string();
            }
            if invite.to_user_id == user_id {
                invite.to_user_name = display_name.to_string();
            }
        }
    }

    /// Ids of invites received and sent by `user_id`, in any status.
    pub(super) fn references_to(&self, user_id: &str) -> (Vec<String>, Vec<String>) {
        let received = self
            .invites
            .values()
            .filter(|invite| invite.to_user_id == user_id)
            .map(|invite| invite.id.clone())
            .collect();
        let sent = self
            .invites
            .values()
            .filter(|invite| invite.from_user_id == user_id)
            .map(|invite| invite.id.clone())
            .collect();
        (received, sent)
    }

    /// Rewrite the listed invites from `old` to `new` and move the pending
    /// index entry, merging with anything already queued for `new`.
    pub(super) fn migrate(&mut self, old: &str, new: &str, received: &[String], sent: &[String]) {
        if let Some(set) = self.pending_by_recipient.remove(old) {
            self.pending_by_recipient
                .entry(new.to_string())
                .or_default()
                .extend(set);
        }
        for id in received {
            if let Some(invite) = self.invites.get_mut(id) {
                invite.to_user_id = new.to_string();
            }
        }
        for id in sent {
            if let Some(invite) = self.invites.get_mut(id) {
                invite.from_user_id = new.to_string();
            }
        }
    }

    pub fn all(&self) -> &HashMap<String, Invite> {
        &self.invites
    }

    pub fn pending_index(&self) -> &HashMap<String, BTreeSet<String>> {
        &self.pending_by_recipient
    }
}

impl Relay {
    /// Pending invites addressed to `user_id`.
    pub fn pending_invites_for(&self, user_id: &str) -> Vec<Invite> {
        self.invites.pending_for(user_id)
    }

    /// Create an invite from the connection's identity and deliver it.
    pub(super) fn send_invite(
        &mut self,
        conn: ConnectionId,
        request: InviteRequest,
    ) -> Result<(), RelayError> {
        let from = self.authenticated(conn)?;

        // The sender's stated name wins when it is free; otherwise keep ours.
        self.rename_if_unused(conn, &request.from_user_name);
        let from_name = self.display_name_or_id(&from);

        if self.blocks.is_blocked(&from, &request.to_user_id) {
            return Err(RelayError::Blocked);
        }

        let to_user_name = match self.directory.name_of(&request.to_user_id) {
            Some(recorded) => {
                if recorded != request.to_user_name {
                    tracing::warn!(
                        "Invite for {} had display name '{}', but server record is '{}'. \
                         Using server record.",
                        request.to_user_id,
                        request.to_user_name,
                        recorded
                    );
                }
                recorded.to_string()
            }
            None => {
                if self.connections.is_online(&request.to_user_id) {
                    tracing::warn!(
                        "Invite for {} but user has no name record, using provided name '{}'",
                        request.to_user_id,
                        request.to_user_name
                    );
                }
                request.to_user_name.clone()
            }
        };

        let invite = Invite {
            id: generate_invite_id(),
            from_user_is_registered: is_registered_id(&from),
            to_user_is_registered: is_registered_id(&request.to_user_id),
            from_user_id: from,
            from_user_name: from_name,
            to_user_id: request.to_user_id,
            to_user_name,
            timestamp: Utc::now(),
            deck_card_count: request.deck_card_count.unwrap_or(DEFAULT_DECK_CARD_COUNT),
            deck_json_key: request.deck_json_key,
            status: InviteStatus::Pending,
        };
        let invite_id = invite.id.clone();
        let recipient = invite.to_user_id.clone();
        self.invites.insert(invite.clone());

        let delivered = self
            .connections
            .send_to(&recipient, ServerMessage::NewInvite { invite });
        tracing::info!(
            "Invite {} sent. Recipient {} online: {}",
            invite_id,
            recipient,
            delivered
        );

        self.connections
            .send_to_connection(conn, ServerMessage::InviteSent { invite_id });
        Ok(())
    }

    /// Accept or decline an invite addressed to the connection's identity.
    pub(super) fn respond_invite(
        &mut self,
        conn: ConnectionId,
        invite_id: &str,
        decision: InviteDecision,
        responder_name: Option<&str>,
    ) -> Result<(), RelayError> {
        let responder = self.authenticated(conn)?;

        let invite = self
            .invites
            .get(invite_id)
            .ok_or_else(|| RelayError::InviteNotFound(invite_id.to_string()))?;
        if invite.to_user_id != responder {
            return Err(RelayError::InviteRecipientMismatch(invite_id.to_string()));
        }

        let status = InviteStatus::from(decision);
        let invite = self
            .invites
            .resolve(invite_id, status)
            .cloned()
            .ok_or_else(|| RelayError::InviteAlreadyResolved(invite_id.to_string()))?;

        if let Some(name) = responder_name {
            self.rename_if_unused(conn, name);
        }

        self.connections.send_to(
            &invite.from_user_id,
            ServerMessage::InviteResponse {
                invite_id: invite.id.clone(),
                status,
                responder: self.display_name_or_id(&responder),
            },
        );
        tracing::info!("Invite {} {:?} by {}", invite.id, status, responder);

        if decision == InviteDecision::Accepted {
            if self.pairing.is_active() {
                tracing::info!("Invite {} accepted while a game is already running", invite.id);
            } else {
                self.start_pairing(&invite);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invite(id: &str, from: &str, to: &str) -> Invite {
        Invite {
            id: id.to_string(),
            from_user_id: from.to_string(),
            from_user_name: format!("name-{}", from),
            to_user_id: to.to_string(),
            to_user_name: format!("name-{}", to),
            from_user_is_registered: true,
            to_user_is_registered: true,
            timestamp: Utc::now(),
            deck_card_count: DEFAULT_DECK_CARD_COUNT,
            deck_json_key: "deck".to_string(),
            status: InviteStatus::Pending,
        }
    }

    #[test]
    fn test_generate_invite_id() {
        let id1 = generate_invite_id();
        let id2 = generate_invite_id();

        assert!(id1.starts_with("inv_"));
        let suffix = id1.rsplit('_').next().unwrap();
        assert_eq!(suffix.len(), 9);
        assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_resolve_is_terminal() {
        let mut ledger = InviteLedger::default();
        ledger.insert(invite("i1", "u1", "u2"));
        assert_eq!(ledger.pending_for("u2").len(), 1);

        assert!(ledger.resolve("i1", InviteStatus::Declined).is_some());
        assert!(ledger.pending_for("u2").is_empty());
        assert!(ledger.pending_index().is_empty());

        assert!(ledger.resolve("i1", InviteStatus::Accepted).is_none());
        assert!(ledger.resolve("missing", InviteStatus::Accepted).is_none());
        assert_eq!(ledger.get("i1").unwrap().status, InviteStatus::Declined);
    }

    #[test]
    fn test_cancel_pending_only_touches_that_direction() {
        let mut ledger = InviteLedger::default();
        ledger.insert(invite("i1", "u1", "u2"));
        ledger.insert(invite("i2", "u3", "u2"));
        ledger.insert(invite("i3", "u2", "u1"));

        let cancelled = ledger.cancel_pending("u1", "u2");

        assert_eq!(cancelled, vec!["i1".to_string()]);
        assert_eq!(ledger.get("i1").unwrap().status, InviteStatus::Cancelled);
        assert_eq!(ledger.get("i2").unwrap().status, InviteStatus::Pending);
        assert_eq!(ledger.get("i3").unwrap().status, InviteStatus::Pending);
        assert_eq!(ledger.pending_for("u2").len(), 1);
    }

    #[test]
    fn test_rename_party_skips_resolved() {
        let mut ledger = InviteLedger::default();
        ledger.insert(invite("i1", "u1", "u2"));
        ledger.insert(invite("i2", "u2", "u1"));
        ledger.resolve("i2", InviteStatus::Declined);

        ledger.rename_party("u1", "Alicia");

        assert_eq!(ledger.get("i1").unwrap().from_user_name, "Alicia");
        assert_eq!(ledger.get("i2").unwrap().to_user_name, "name-u1");
    }

    #[test]
    fn test_migrate_merges_pending_index() {
        let mut ledger = InviteLedger::default();
        ledger.insert(invite("i1", "u9", "old"));
        ledger.insert(invite("i2", "u8", "new"));
        ledger.insert(invite("i3", "old", "u7"));

        let (received, sent) = ledger.references_to("old");
        ledger.migrate("old", "new", &received, &sent);

        let pending: Vec<String> = ledger.pending_for("new").into_iter().map(|i| i.id).collect();
        assert_eq!(pending.len(), 2);
        assert!(pending.contains(&"i1".to_string()));
        assert!(pending.contains(&"i2".to_string()));
        assert_eq!(ledger.get("i3").unwrap().from_user_id, "new");
        assert!(ledger.all().values().all(|invite| !invite.involves("old")));
        assert!(!ledger.pending_index().contains_key("old"));
    }
}
