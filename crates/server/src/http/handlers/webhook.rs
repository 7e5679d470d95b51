use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
};
use domain::protocol;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::signature::{self, SIGNATURE_HEADER};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// 订阅验证：mode 为 subscribe 且 token 一致时原样返回 challenge
pub async fn verify_subscription(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<String, (StatusCode, String)> {
    let token_ok = !state.verify_token.is_empty()
        && query.verify_token.as_deref() == Some(state.verify_token.as_str());
    if query.mode.as_deref() != Some("subscribe") || !token_ok {
        warn!("Webhook verification rejected");
        return Err((StatusCode::FORBIDDEN, "Verification failed".to_string()));
    }
    Ok(query.challenge.unwrap_or_default())
}

/// 校验签名、解析后立即确认；后续处理在 ingest pool 中进行
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, (StatusCode, String)> {
    if !state.app_secret.is_empty() {
        let provided = headers.get(SIGNATURE_HEADER).and_then(|h| h.to_str().ok());
        if !signature::verify(&state.app_secret, &body, provided) {
            warn!("Webhook signature mismatch");
            return Err((StatusCode::FORBIDDEN, "Invalid signature".to_string()));
        }
    }

    let envelope = protocol::parse_envelope(&body)
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let notifications = envelope.into_notifications();
    debug!(count = notifications.len(), "Webhook accepted");

    for notification in notifications {
        state
            .ingest
            .submit(notification)
            .await
            .map_err(|e| (StatusCode::SERVICE_UNAVAILABLE, e.to_string()))?;
    }

    Ok(StatusCode::OK)
}
