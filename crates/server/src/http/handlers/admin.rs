use adapter::RefreshError;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct RefreshResponse {
    pub integration_id: String,
    pub expires_at: String,
}

fn check_admin(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let auth_header = headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or((
            StatusCode::UNAUTHORIZED,
            "Missing Authorization header".into(),
        ))?;
    let expected_token = format!("Bearer {}", state.admin_token);
    if auth_header != expected_token {
        return Err((StatusCode::FORBIDDEN, "Invalid Admin Token".into()));
    }
    Ok(())
}

/// 手动续期一个集成的长期凭证
pub async fn refresh_integration(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(integration_id): Path<String>,
) -> Result<Json<RefreshResponse>, (StatusCode, String)> {
    check_admin(&state, &headers)?;

    let expires_at = state
        .refresher
        .refresh(&integration_id)
        .await
        .map_err(|e| {
            let status = match e {
                RefreshError::NotFound(_) => StatusCode::NOT_FOUND,
                RefreshError::Upstream(_) => StatusCode::BAD_GATEWAY,
                RefreshError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };
            (status, e.to_string())
        })?;

    Ok(Json(RefreshResponse {
        integration_id,
        expires_at: expires_at.to_rfc3339(),
    }))
}
