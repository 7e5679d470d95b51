use super::models::{DirectMessageRequest, Recipient, ReplyRequest, TextMessage, TokenResponse};
use crate::traits::{OutboundClient, RefreshedCredential};
use crate::GraphConfig;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Response;
use std::time::Duration;
use tracing::debug;

/// 错误响应体只保留前一段用于日志
const ERROR_BODY_LIMIT: usize = 512;

#[derive(Clone)]
pub struct GraphClient {
    http: reqwest::Client,
    config: GraphConfig,
}

impl GraphClient {
    pub fn new(config: GraphConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, config })
    }

    fn graph_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.graph_base_url.trim_end_matches('/'),
            self.config.api_version,
            path
        )
    }
}

async fn ensure_success(resp: Response, op: &str) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let mut body = resp.text().await.unwrap_or_default();
    if body.len() > ERROR_BODY_LIMIT {
        let mut cut = ERROR_BODY_LIMIT;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    Err(anyhow!("{} status {}: {}", op, status.as_u16(), body))
}

#[async_trait]
impl OutboundClient for GraphClient {
    async fn reply_to_comment(&self, credential: &str, comment_id: &str, message: &str) -> Result<()> {
        let url = self.graph_url(&format!("{}/replies", comment_id));
        let resp = self
            .http
            .post(&url)
            .json(&ReplyRequest {
                message,
                access_token: credential,
            })
            .send()
            .await
            .context("ReplyComment request failed")?;
        ensure_success(resp, "ReplyComment").await?;
        debug!(comment_id = %comment_id, "Public reply accepted");
        Ok(())
    }

    async fn send_direct_message(
        &self,
        credential: &str,
        recipient_id: &str,
        message: &str,
    ) -> Result<()> {
        let url = self.graph_url("me/messages");
        let resp = self
            .http
            .post(&url)
            .json(&DirectMessageRequest {
                recipient: Recipient { id: recipient_id },
                message: TextMessage { text: message },
                access_token: credential,
            })
            .send()
            .await
            .context("SendDM request failed")?;
        ensure_success(resp, "SendDM").await?;
        debug!(recipient_id = %recipient_id, "Direct message accepted");
        Ok(())
    }

    async fn refresh_credential(&self, credential: &str) -> Result<RefreshedCredential> {
        let url = format!(
            "{}/refresh_access_token",
            self.config.refresh_base_url.trim_end_matches('/')
        );
        let resp = self
            .http
            .get(&url)
            .query(&[("grant_type", "ig_refresh_token"), ("access_token", credential)])
            .send()
            .await
            .context("Refresh request failed")?;
        let token: TokenResponse = ensure_success(resp, "Refresh")
            .await?
            .json()
            .await
            .context("Failed to decode refresh response")?;
        Ok(RefreshedCredential {
            access_token: token.access_token,
            expires_in: token.expires_in,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::{Path, Query, State},
        http::StatusCode,
        routing::{get, post},
        Json, Router,
    };
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<(String, serde_json::Value)>>>;

    async fn spawn_graph_stub() -> (String, Captured) {
        let captured: Captured = Arc::new(Mutex::new(Vec::new()));

        async fn replies(
            State(c): State<Captured>,
            Path((_ver, comment_id)): Path<(String, String)>,
            Json(body): Json<serde_json::Value>,
        ) -> StatusCode {
            c.lock().unwrap().push((format!("reply:{}", comment_id), body));
            if comment_id == "broken" {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::OK
            }
        }

        async fn messages(
            State(c): State<Captured>,
            Json(body): Json<serde_json::Value>,
        ) -> StatusCode {
            c.lock().unwrap().push(("dm".to_string(), body));
            StatusCode::OK
        }

        async fn refresh(Query(q): Query<HashMap<String, String>>) -> Json<serde_json::Value> {
            Json(serde_json::json!({
                "access_token": format!("{}-new", q.get("access_token").cloned().unwrap_or_default()),
                "token_type": "bearer",
                "expires_in": 5184000
            }))
        }

        let app = Router::new()
            .route("/:ver/:comment_id/replies", post(replies))
            .route("/:ver/me/messages", post(messages))
            .route("/refresh_access_token", get(refresh))
            .with_state(captured.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), captured)
    }

    fn client_for(base: &str) -> GraphClient {
        GraphClient::new(GraphConfig {
            graph_base_url: base.to_string(),
            refresh_base_url: base.to_string(),
            api_version: "v21.0".to_string(),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_reply_and_dm_payloads() {
        let (base, captured) = spawn_graph_stub().await;
        let client = client_for(&base);

        client.reply_to_comment("tok", "C1", "Thanks!").await.unwrap();
        client.send_direct_message("tok", "U1", "hello").await.unwrap();

        let calls = captured.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].0, "reply:C1");
        assert_eq!(calls[0].1["message"], "Thanks!");
        assert_eq!(calls[0].1["access_token"], "tok");
        assert_eq!(calls[1].1["recipient"]["id"], "U1");
        assert_eq!(calls[1].1["message"]["text"], "hello");
    }

    #[tokio::test]
    async fn test_non_success_status_is_error() {
        let (base, _) = spawn_graph_stub().await;
        let err = client_for(&base)
            .reply_to_comment("tok", "broken", "x")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ReplyComment status 400"));
    }

    #[tokio::test]
    async fn test_refresh_credential() {
        let (base, _) = spawn_graph_stub().await;
        let refreshed = client_for(&base).refresh_credential("old").await.unwrap();
        assert_eq!(refreshed.access_token, "old-new");
        assert_eq!(refreshed.expires_in, Some(5184000));
    }
}
