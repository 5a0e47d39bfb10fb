//! HTTP route handlers.

pub mod debug;
pub mod invites;
pub mod well_known;

use serde::Serialize;

/// JSON body for rejected HTTP requests.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Any unrouted path answers like a health check.
pub async fn fallback() -> &'static str {
    "OK"
}
