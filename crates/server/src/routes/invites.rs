//! Pending invite lookup over HTTP.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use cardlink_shared::Invite;
use serde::{Deserialize, Serialize};

use super::ErrorBody;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PendingInvites {
    pub invites: Vec<Invite>,
}

/// Pending invites addressed to `userId`, oldest first.
pub async fn list_pending(
    State(state): State<AppState>,
    Query(query): Query<PendingQuery>,
) -> Result<Json<PendingInvites>, (StatusCode, Json<ErrorBody>)> {
    let user_id = query
        .user_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: "userId required".to_string(),
                }),
            )
        })?;

    let invites = state.relay.lock().await.pending_invites_for(&user_id);
    Ok(Json(PendingInvites { invites }))
}
