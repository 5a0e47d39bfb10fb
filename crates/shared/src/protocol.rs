//! WebSocket message types.
//!
//! Every frame is a single JSON object tagged by its `type` field. Field
//! names are camelCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::models::{Invite, InviteDecision, InviteStatus, LookupType, PlayerPosition};

/// Opaque gameplay fields, forwarded between paired players untouched.
pub type GamePayload = Map<String, Value>;

/// Messages sent from a client to the relay.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Register {
        user_id: String,
        #[serde(default)]
        user_name: Option<String>,
    },
    /// Like `Register`, but closes any other connection of the same user.
    ForceRegister {
        user_id: String,
        #[serde(default)]
        user_name: Option<String>,
    },
    UpdateDisplayName {
        new_display_name: String,
    },
    /// Look up an online user by id, falling back to display name.
    SearchUser {
        #[serde(default)]
        user_id: Option<String>,
        #[serde(default)]
        username: Option<String>,
        #[serde(default)]
        search_query: Option<String>,
    },
    SendInvite {
        from_user_id: String,
        from_user_name: String,
        to_user_id: String,
        to_user_name: String,
        #[serde(default)]
        deck_card_count: Option<u32>,
        deck_json_key: String,
    },
    RespondInvite {
        invite_id: String,
        response: InviteDecision,
        #[serde(default)]
        responder_name: Option<String>,
    },
    BlockUser {
        block_user_id: String,
    },
    UnblockUser {
        unblock_user_id: String,
    },
    Move(GamePayload),
    Click(GamePayload),
    AckClick(GamePayload),
    ReadyToDraw(GamePayload),
    GameEnded(GamePayload),
    /// Move every reference to `old_user_id` over to `new_user_id`.
    MigrateIdentity {
        old_user_id: String,
        new_user_id: String,
        #[serde(default)]
        user_name: Option<String>,
    },
}

impl ClientMessage {
    /// The wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Register { .. } => "register",
            ClientMessage::ForceRegister { .. } => "force_register",
            ClientMessage::UpdateDisplayName { .. } => "update_display_name",
            ClientMessage::SearchUser { .. } => "search_user",
            ClientMessage::SendInvite { .. } => "send_invite",
            ClientMessage::RespondInvite { .. } => "respond_invite",
            ClientMessage::BlockUser { .. } => "block_user",
            ClientMessage::UnblockUser { .. } => "unblock_user",
            ClientMessage::Move(_) => "move",
            ClientMessage::Click(_) => "click",
            ClientMessage::AckClick(_) => "ack_click",
            ClientMessage::ReadyToDraw(_) => "ready_to_draw",
            ClientMessage::GameEnded(_) => "game_ended",
            ClientMessage::MigrateIdentity { .. } => "migrate_identity",
        }
    }
}

/// Messages sent from the relay to a client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Greeting sent as soon as the socket opens.
    Connected {
        message: String,
    },
    Joined {
        user_id: String,
        display_name: String,
        is_registered_user: bool,
    },
    RegisterError {
        message: String,
    },
    PendingInvites {
        invites: Vec<Invite>,
    },
    NewInvite {
        invite: Invite,
    },
    InviteSent {
        invite_id: String,
    },
    InviteError {
        message: String,
    },
    InviteResponse {
        invite_id: String,
        status: InviteStatus,
        responder: String,
    },
    UserSearchResult {
        found: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_name: Option<String>,
        lookup_type: LookupType,
        search_query: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_registered_user: Option<bool>,
    },
    UpdateError {
        message: String,
    },
    DisplayNameUpdated {
        new_display_name: String,
        message: String,
    },
    UserBlocked {
        blocked_user_id: String,
    },
    UserUnblocked {
        unblocked_user_id: String,
    },
    /// A game is starting; both players receive the same seed.
    Ready {
        seed: u32,
        deck_json_key: String,
        player_position: PlayerPosition,
        opponent_id: String,
        opponent_name: String,
    },
    Move {
        from_user_id: String,
        #[serde(flatten)]
        payload: GamePayload,
    },
    Click {
        from_user_id: String,
        #[serde(flatten)]
        payload: GamePayload,
    },
    AckClick {
        from_user_id: String,
        #[serde(flatten)]
        payload: GamePayload,
    },
    PeerReadyToDraw {
        from_user_id: String,
    },
    GameEnded {
        from_user_id: String,
        #[serde(flatten)]
        payload: GamePayload,
    },
    /// The opponent's last connection closed mid-game.
    PeerLeft,
    IdentityMigrated {
        old_user_id: String,
        new_user_id: String,
        display_name: String,
        message: String,
    },
    MigrationError {
        message: String,
    },
    ForceDisconnected {
        message: String,
    },
    AuthRequired {
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_register() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"register","userId":"u1","userName":"Alice"}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Register {
                user_id: "u1".to_string(),
                user_name: Some("Alice".to_string()),
            }
        );
        assert_eq!(msg.kind(), "register");
    }

    #[test]
    fn test_parse_send_invite_defaults() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "send_invite",
            "fromUserId": "u1",
            "fromUserName": "Alice",
            "toUserId": "u2",
            "toUserName": "Bob",
            "deckJsonKey": "decks/classic.json"
        }))
        .unwrap();

        match msg {
            ClientMessage::SendInvite { deck_card_count, deck_json_key, .. } => {
                assert_eq!(deck_card_count, None);
                assert_eq!(deck_json_key, "decks/classic.json");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let result = serde_json::from_value::<ClientMessage>(json!({
            "type": "send_invite",
            "fromUserId": "u1",
            "fromUserName": "Alice",
            "toUserName": "Bob",
            "deckJsonKey": "k"
        }));
        assert!(result.is_err());

        let unknown = serde_json::from_value::<ClientMessage>(json!({ "type": "dance" }));
        assert!(unknown.is_err());

        let bad_decision = serde_json::from_value::<ClientMessage>(json!({
            "type": "respond_invite",
            "inviteId": "inv_1",
            "response": "maybe"
        }));
        assert!(bad_decision.is_err());
    }

    #[test]
    fn test_gameplay_payload_is_opaque() {
        let msg: ClientMessage = serde_json::from_value(json!({
            "type": "click",
            "cardIndex": 7,
            "nested": { "x": 1 }
        }))
        .unwrap();

        let ClientMessage::Click(payload) = msg else {
            panic!("expected click");
        };
        assert_eq!(payload.get("cardIndex"), Some(&json!(7)));
        assert_eq!(payload.get("nested"), Some(&json!({ "x": 1 })));
        assert!(payload.get("type").is_none());

        let bare: ClientMessage =
            serde_json::from_value(json!({ "type": "ready_to_draw" })).unwrap();
        assert_eq!(bare, ClientMessage::ReadyToDraw(GamePayload::new()));
    }

    #[test]
    fn test_relayed_message_shape() {
        let mut payload = GamePayload::new();
        payload.insert("cardIndex".to_string(), json!(3));
        let msg = ServerMessage::Click {
            from_user_id: "u1".to_string(),
            payload,
        };

        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value, json!({ "type": "click", "fromUserId": "u1", "cardIndex": 3 }));
    }

    #[test]
    fn test_server_message_tags() {
        let value = serde_json::to_value(ServerMessage::PeerLeft).unwrap();
        assert_eq!(value, json!({ "type": "peer_left" }));

        let value = serde_json::to_value(ServerMessage::Ready {
            seed: 42,
            deck_json_key: "k".to_string(),
            player_position: PlayerPosition::B,
            opponent_id: "u1".to_string(),
            opponent_name: "Alice".to_string(),
        })
        .unwrap();
        assert_eq!(value["type"], "ready");
        assert_eq!(value["playerPosition"], "B");
        assert_eq!(value["opponentName"], "Alice");

        let value = serde_json::to_value(ServerMessage::UserSearchResult {
            found: false,
            user_id: None,
            user_name: None,
            lookup_type: LookupType::DisplayName,
            search_query: "Bob".to_string(),
            is_registered_user: None,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({
                "type": "user_search_result",
                "found": false,
                "lookupType": "displayName",
                "searchQuery": "Bob"
            })
        );
    }
}
