//! App-link association files served from the configured directory.

use std::path::Path;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};

use crate::state::AppState;

pub async fn apple_app_site_association(State(state): State<AppState>) -> Response {
    serve_json_file(&state.config.well_known_dir, "apple-app-site-association").await
}

pub async fn assetlinks(State(state): State<AppState>) -> Response {
    serve_json_file(&state.config.well_known_dir, "assetlinks.json").await
}

async fn serve_json_file(dir: &Path, name: &str) -> Response {
    let path = dir.join(name);
    match tokio::fs::read(&path).await {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            (StatusCode::NOT_FOUND, "Not found").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn state_with_dir(dir: &Path) -> AppState {
        AppState::new(Config {
            well_known_dir: dir.to_path_buf(),
            ..Config::default()
        })
    }

    #[tokio::test]
    async fn test_serves_files_as_json() {
        let dir = std::env::temp_dir()
            .join(format!("cardlink-well-known-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("assetlinks.json"), br#"[{"relation":[]}]"#)
            .await
            .unwrap();

        let response = assetlinks(State(state_with_dir(&dir))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );

        let response = apple_app_site_association(State(state_with_dir(&dir))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }
}
