//! Request rejection types.

use thiserror::Error;

use crate::protocol::ServerMessage;

/// Why a client request was refused.
///
/// Every variant except [`RelayError::Malformed`] is reported back to the
/// requesting connection; none of them leave partial writes behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    #[error("You must register or log in before performing this action.")]
    AuthRequired,

    #[error("A valid User ID is required.")]
    IdentifierMissing,

    #[error("Display name \"{0}\" is already taken. Please choose another one.")]
    NameConflict(String),

    #[error("This user is already connected elsewhere. Please logout first or force connect.")]
    AlreadyConnected,

    #[error("Invite {0} does not exist.")]
    InviteNotFound(String),

    #[error("Invite {0} is addressed to someone else.")]
    InviteRecipientMismatch(String),

    #[error("Invite {0} has already been answered.")]
    InviteAlreadyResolved(String),

    #[error("Cannot send invite to this user")]
    Blocked,

    #[error("A valid newDisplayName is required.")]
    InvalidDisplayName,

    #[error("Display name \"{0}\" is already taken.")]
    DisplayNameTaken(String),

    #[error("Invalid migration request.")]
    InvalidMigration,

    #[error("New user ID is already in use.")]
    MigrationConflict,

    #[error("Malformed message: {0}")]
    Malformed(String),
}

impl RelayError {
    /// The notice sent to the requesting connection, if any.
    pub fn to_message(&self) -> Option<ServerMessage> {
        let message = self.to_string();
        match self {
            RelayError::AuthRequired => Some(ServerMessage::AuthRequired { message }),
            RelayError::IdentifierMissing
            | RelayError::NameConflict(_)
            | RelayError::AlreadyConnected => Some(ServerMessage::RegisterError { message }),
            RelayError::InviteNotFound(_)
            | RelayError::InviteRecipientMismatch(_)
            | RelayError::InviteAlreadyResolved(_)
            | RelayError::Blocked => Some(ServerMessage::InviteError { message }),
            RelayError::InvalidDisplayName | RelayError::DisplayNameTaken(_) => {
                Some(ServerMessage::UpdateError { message })
            }
            RelayError::InvalidMigration | RelayError::MigrationConflict => {
                Some(ServerMessage::MigrationError { message })
            }
            RelayError::Malformed(_) => None,
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        RelayError::Malformed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_map_to_notice_kinds() {
        let notice = RelayError::NameConflict("Alice".to_string()).to_message();
        assert_eq!(
            notice,
            Some(ServerMessage::RegisterError {
                message: "Display name \"Alice\" is already taken. Please choose another one."
                    .to_string()
            })
        );

        assert!(matches!(
            RelayError::Blocked.to_message(),
            Some(ServerMessage::InviteError { .. })
        ));
        assert!(matches!(
            RelayError::MigrationConflict.to_message(),
            Some(ServerMessage::MigrationError { .. })
        ));
        assert!(matches!(
            RelayError::AuthRequired.to_message(),
            Some(ServerMessage::AuthRequired { .. })
        ));
    }

    #[test]
    fn test_malformed_is_silent() {
        let err: RelayError = serde_json::from_str::<serde_json::Value>("{nope")
            .unwrap_err()
            .into();
        assert!(matches!(err, RelayError::Malformed(_)));
        assert_eq!(err.to_message(), None);
    }
}
