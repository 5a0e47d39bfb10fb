//! Data model shared between the relay and its clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifiers starting with this prefix belong to unregistered guests.
pub const GUEST_PREFIX: &str = "guest_";

/// Deck size assumed when an invite does not say otherwise.
pub const DEFAULT_DECK_CARD_COUNT: u32 = 55;

/// Whether `user_id` is a client-generated guest identifier.
pub fn is_guest_id(user_id: &str) -> bool {
    user_id.trim().starts_with(GUEST_PREFIX)
}

/// Whether `user_id` names a registered (permanent) account.
pub fn is_registered_id(user_id: &str) -> bool {
    !is_guest_id(user_id)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteStatus {
    Pending,
    Accepted,
    Declined,
    Cancelled,
}

impl InviteStatus {
    pub fn is_pending(self) -> bool {
        self == InviteStatus::Pending
    }
}

/// A recipient's answer to an invite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InviteDecision {
    Accepted,
    Declined,
}

impl From<InviteDecision> for InviteStatus {
    fn from(decision: InviteDecision) -> Self {
        match decision {
            InviteDecision::Accepted => InviteStatus::Accepted,
            InviteDecision::Declined => InviteStatus::Declined,
        }
    }
}

/// A proposal from one identity to play a game with another.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Invite {
    pub id: String,
    pub from_user_id: String,
    pub from_user_name: String,
    pub to_user_id: String,
    pub to_user_name: String,
    pub from_user_is_registered: bool,
    pub to_user_is_registered: bool,
    pub timestamp: DateTime<Utc>,
    pub deck_card_count: u32,
    /// Opaque reference to the deck both players load.
    pub deck_json_key: String,
    pub status: InviteStatus,
}

impl Invite {
    /// Whether `user_id` is the sender or the recipient.
    pub fn involves(&self, user_id: &str) -> bool {
        self.from_user_id == user_id || self.to_user_id == user_id
    }
}

/// Which half of the shared deck a player draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerPosition {
    /// The inviter.
    A,
    /// The player who accepted.
    B,
}

/// How a user search matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LookupType {
    UserId,
    DisplayName,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guest_prefix() {
        assert!(is_guest_id("guest_1234"));
        assert!(is_guest_id("  guest_abc"));
        assert!(!is_guest_id("auth0|5f1c"));
        assert!(is_registered_id("u1"));
        assert!(!is_registered_id("guest_u1"));
    }

    #[test]
    fn test_invite_wire_shape() {
        let invite = Invite {
            id: "inv_1_abc".to_string(),
            from_user_id: "u1".to_string(),
            from_user_name: "Alice".to_string(),
            to_user_id: "guest_u2".to_string(),
            to_user_name: "Bob".to_string(),
            from_user_is_registered: true,
            to_user_is_registered: false,
            timestamp: Utc::now(),
            deck_card_count: DEFAULT_DECK_CARD_COUNT,
            deck_json_key: "decks/classic.json".to_string(),
            status: InviteStatus::Pending,
        };

        let value = serde_json::to_value(&invite).unwrap();
        assert_eq!(value["fromUserId"], "u1");
        assert_eq!(value["toUserIsRegistered"], false);
        assert_eq!(value["deckCardCount"], 55);
        assert_eq!(value["deckJsonKey"], "decks/classic.json");
        assert_eq!(value["status"], "pending");
        assert!(invite.involves("guest_u2"));
        assert!(!invite.involves("u3"));
    }
}
