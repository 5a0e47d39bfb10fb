//! Authentication gate and routing of inbound frames.

use cardlink_shared::{ClientMessage, RelayError};

use super::invites::InviteRequest;
use super::pairing::GameplayEvent;
use super::presence::SearchRequest;
use super::{ConnectionId, Relay};

impl Relay {
    /// Parse and route one text frame from `conn`.
    ///
    /// Unparseable frames, unknown kinds and frames missing required fields
    /// are dropped without a reply.
    pub fn handle_text(&mut self, conn: ConnectionId, text: &str) {
        match serde_json::from_str::<ClientMessage>(text) {
            Ok(msg) => self.dispatch(conn, msg),
            Err(e) => {
                let err = RelayError::from(e);
                tracing::debug!("[WS {}] Dropping frame: {}", conn, err);
            }
        }
    }

    /// Route a parsed message, authenticating first where the kind allows it.
    pub fn dispatch(&mut self, conn: ConnectionId, msg: ClientMessage) {
        if !self.connections.contains(conn) {
            tracing::debug!("[WS {}] Ignoring {} from a closed connection", conn, msg.kind());
            return;
        }
        tracing::debug!(
            "[WS {}] Received {} from {}",
            conn,
            msg.kind(),
            self.connections.identity_of(conn).unwrap_or("NOT_AUTHED")
        );

        if self.connections.identity_of(conn).is_none() {
            let gate = match &msg {
                ClientMessage::Register { .. } | ClientMessage::ForceRegister { .. } => Ok(()),
                ClientMessage::SendInvite {
                    from_user_id,
                    from_user_name,
                    ..
                } => self.register(conn, from_user_id, from_user_name, true),
                ClientMessage::MigrateIdentity {
                    old_user_id,
                    user_name,
                    ..
                } => self.register(
                    conn,
                    old_user_id,
                    user_name.as_deref().unwrap_or_default(),
                    true,
                ),
                _ => Err(RelayError::AuthRequired),
            };
            if let Err(err) = gate {
                self.reject(conn, msg.kind(), err);
                return;
            }
        }

        let kind = msg.kind();
        if let Err(err) = self.route(conn, msg) {
            self.reject(conn, kind, err);
        }
    }

    fn route(&mut self, conn: ConnectionId, msg: ClientMessage) -> Result<(), RelayError> {
        match msg {
            ClientMessage::Register { user_id, user_name } => {
                self.register(conn, &user_id, user_name.as_deref().unwrap_or_default(), false)
            }
            ClientMessage::ForceRegister { user_id, user_name } => {
                self.register(conn, &user_id, user_name.as_deref().unwrap_or_default(), true)
            }
            ClientMessage::UpdateDisplayName { new_display_name } => {
                let name = new_display_name.trim();
                if name.is_empty() {
                    Err(RelayError::InvalidDisplayName)
                } else if self.rename_if_unused(conn, name) {
                    Ok(())
                } else {
                    Err(RelayError::DisplayNameTaken(name.to_string()))
                }
            }
            ClientMessage::SearchUser {
                user_id,
                username,
                search_query,
            } => {
                self.search_user(
                    conn,
                    SearchRequest {
                        user_id,
                        username,
                        search_query,
                    },
                );
                Ok(())
            }
            ClientMessage::SendInvite {
                from_user_name,
                to_user_id,
                to_user_name,
                deck_card_count,
                deck_json_key,
                ..
            } => self.send_invite(
                conn,
                InviteRequest {
                    from_user_name,
                    to_user_id,
                    to_user_name,
                    deck_card_count,
                    deck_json_key,
                },
            ),
            ClientMessage::RespondInvite {
                invite_id,
                response,
                responder_name,
            } => self.respond_invite(conn, &invite_id, response, responder_name.as_deref()),
            ClientMessage::BlockUser { block_user_id } => self.block(conn, &block_user_id),
            ClientMessage::UnblockUser { unblock_user_id } => self.unblock(conn, &unblock_user_id),
            ClientMessage::Move(payload) => self.gameplay(conn, GameplayEvent::Move(payload)),
            ClientMessage::Click(payload) => self.gameplay(conn, GameplayEvent::Click(payload)),
            ClientMessage::AckClick(payload) => {
                self.gameplay(conn, GameplayEvent::AckClick(payload))
            }
            ClientMessage::ReadyToDraw(_) => self.gameplay(conn, GameplayEvent::ReadyToDraw),
            ClientMessage::GameEnded(payload) => {
                self.gameplay(conn, GameplayEvent::GameEnded(payload))
            }
            ClientMessage::MigrateIdentity {
                old_user_id,
                new_user_id,
                ..
            } => self.migrate(conn, &old_user_id, &new_user_id),
        }
    }

    fn gameplay(&mut self, conn: ConnectionId, event: GameplayEvent) -> Result<(), RelayError> {
        let sender = self.authenticated(conn)?;
        self.relay_gameplay(&sender, event);
        Ok(())
    }

    /// Report a refused request back to the connection that made it.
    fn reject(&self, conn: ConnectionId, kind: &str, err: RelayError) {
        tracing::warn!("[WS {}] {} rejected: {}", conn, kind, err);
        if let Some(notice) = err.to_message() {
            self.connections.send_to_connection(conn, notice);
        }
    }
}
