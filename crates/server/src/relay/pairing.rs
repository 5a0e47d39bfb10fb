//! The single active game pairing and gameplay relay.

use cardlink_shared::{GamePayload, Invite, PlayerPosition, ServerMessage};
use rand::Rng;
use serde::Serialize;

use super::Relay;

/// Exclusive upper bound for game seeds (`2^31 - 1`).
pub const SEED_BOUND: u32 = 2_147_483_647;

/// The two players of the running game and their shared shuffle seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivePair {
    /// The inviter.
    pub a: String,
    /// The player who accepted.
    pub b: String,
    pub seed: u32,
}

impl ActivePair {
    /// The other member, if `user_id` is in this pair.
    pub fn peer_of(&self, user_id: &str) -> Option<&str> {
        if self.a == user_id {
            Some(&self.b)
        } else if self.b == user_id {
            Some(&self.a)
        } else {
            None
        }
    }
}

/// `Empty -> Active -> Empty`. At most one pair exists system-wide.
#[derive(Debug, Default)]
pub struct Pairing {
    active: Option<ActivePair>,
}

impl Pairing {
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&ActivePair> {
        self.active.as_ref()
    }

    pub fn peer_of(&self, user_id: &str) -> Option<&str> {
        self.active.as_ref().and_then(|pair| pair.peer_of(user_id))
    }

    /// Install `pair`. Refuses when a pair is already active.
    pub fn begin(&mut self, pair: ActivePair) -> bool {
        if self.active.is_some() {
            return false;
        }
        self.active = Some(pair);
        true
    }

    pub fn end(&mut self) -> Option<ActivePair> {
        self.active.take()
    }

    pub(super) fn migrate(&mut self, old: &str, new: &str) {
        if let Some(pair) = self.active.as_mut() {
            if pair.a == old {
                pair.a = new.to_string();
            }
            if pair.b == old {
                pair.b = new.to_string();
            }
        }
    }
}

/// A gameplay frame from one member of the pair.
#[derive(Debug, Clone, PartialEq)]
pub enum GameplayEvent {
    Move(GamePayload),
    Click(GamePayload),
    AckClick(GamePayload),
    ReadyToDraw,
    GameEnded(GamePayload),
}

impl GameplayEvent {
    /// The frame the peer receives, stamped with the sender's id.
    pub fn into_message(self, from_user_id: &str) -> ServerMessage {
        let from_user_id = from_user_id.to_string();
        match self {
            GameplayEvent::Move(payload) => ServerMessage::Move {
                from_user_id,
                payload: strip_reserved(payload),
            },
            GameplayEvent::Click(payload) => ServerMessage::Click {
                from_user_id,
                payload: strip_reserved(payload),
            },
            GameplayEvent::AckClick(payload) => ServerMessage::AckClick {
                from_user_id,
                payload: strip_reserved(payload),
            },
            GameplayEvent::ReadyToDraw => ServerMessage::PeerReadyToDraw { from_user_id },
            GameplayEvent::GameEnded(payload) => ServerMessage::GameEnded {
                from_user_id,
                payload: strip_reserved(payload),
            },
        }
    }
}

/// Drop keys the relay sets itself so a client cannot spoof them.
fn strip_reserved(mut payload: GamePayload) -> GamePayload {
    payload.remove("type");
    payload.remove("fromUserId");
    payload
}

impl Relay {
    /// Start a game for an accepted invite if nothing is running and both
    /// players are online. Otherwise this is a logged no-op.
    pub(super) fn start_pairing(&mut self, invite: &Invite) {
        if self.pairing.is_active() {
            return;
        }

        let inviter_online = self.connections.is_online(&invite.from_user_id);
        let acceptor_online = self.connections.is_online(&invite.to_user_id);
        if !(inviter_online && acceptor_online) {
            tracing::info!(
                "Cannot start game for invite {}: {} online {}, {} online {}",
                invite.id,
                invite.from_user_id,
                inviter_online,
                invite.to_user_id,
                acceptor_online
            );
            return;
        }

        let seed = rand::thread_rng().gen_range(0..SEED_BOUND);
        self.pairing.begin(ActivePair {
            a: invite.from_user_id.clone(),
            b: invite.to_user_id.clone(),
            seed,
        });
        tracing::info!(
            "Starting game {} vs {} with seed {}",
            invite.from_user_id,
            invite.to_user_id,
            seed
        );

        self.connections.send_to(
            &invite.from_user_id,
            ServerMessage::Ready {
                seed,
                deck_json_key: invite.deck_json_key.clone(),
                player_position: PlayerPosition::A,
                opponent_id: invite.to_user_id.clone(),
                opponent_name: invite.to_user_name.clone(),
            },
        );
        self.connections.send_to(
            &invite.to_user_id,
            ServerMessage::Ready {
                seed,
                deck_json_key: invite.deck_json_key.clone(),
                player_position: PlayerPosition::B,
                opponent_id: invite.from_user_id.clone(),
                opponent_name: invite.from_user_name.clone(),
            },
        );
    }

    /// Forward a gameplay frame from `sender` to the other pair member.
    /// Frames from outside the pair are ignored.
    pub(super) fn relay_gameplay(&mut self, sender: &str, event: GameplayEvent) {
        let Some(peer) = self.pairing.peer_of(sender).map(str::to_owned) else {
            tracing::debug!("Ignoring gameplay from {}: not in the active game", sender);
            return;
        };

        let ends_game = matches!(event, GameplayEvent::GameEnded(_));
        tracing::debug!("Relaying gameplay from {} to {}", sender, peer);
        self.connections.send_to(&peer, event.into_message(sender));

        if ends_game {
            self.pairing.end();
            tracing::info!("Game ended by {}", sender);
        }
    }

    /// Tear down the game `user_id` was part of and tell the other player.
    pub(super) fn abandon_pairing(&mut self, user_id: &str) {
        let Some(peer) = self.pairing.peer_of(user_id).map(str::to_owned) else {
            return;
        };
        tracing::info!("Notifying opponent {} that {} has left the game", peer, user_id);
        self.connections.send_to(&peer, ServerMessage::PeerLeft);
        self.pairing.end();
    }
}
