use crate::traits::OutboundClient;
use chrono::{DateTime, Duration, Utc};
use domain::Clock;
use std::sync::Arc;
use storage::{CachedCredentialResolver, Db};
use thiserror::Error;
use tracing::info;

/// 平台未返回有效期时按 60 天计
const DEFAULT_LIFETIME_DAYS: i64 = 60;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("integration {0} not found")]
    NotFound(String),
    #[error("upstream refresh failed: {0}")]
    Upstream(#[source] anyhow::Error),
    #[error("storage error: {0}")]
    Storage(#[source] anyhow::Error),
}

/// 长期凭证续期：调用平台刷新接口，写回数据库并覆盖缓存
#[derive(Clone)]
pub struct CredentialRefresher {
    db: Db,
    client: Arc<dyn OutboundClient>,
    resolver: CachedCredentialResolver,
    clock: Arc<dyn Clock>,
}

impl CredentialRefresher {
    pub fn new(
        db: Db,
        client: Arc<dyn OutboundClient>,
        resolver: CachedCredentialResolver,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            db,
            client,
            resolver,
            clock,
        }
    }

    /// 返回新的过期时间
    pub async fn refresh(&self, integration_id: &str) -> Result<DateTime<Utc>, RefreshError> {
        let integration = self
            .db
            .get_integration(integration_id)
            .await
            .map_err(RefreshError::Storage)?
            .ok_or_else(|| RefreshError::NotFound(integration_id.to_string()))?;

        let refreshed = self
            .client
            .refresh_credential(&integration.access_token)
            .await
            .map_err(RefreshError::Upstream)?;

        let now = self.clock.now();
        // 缺失或离谱的 expires_in 都按默认有效期处理
        let expires_at = refreshed
            .expires_in
            .filter(|secs| *secs > 0)
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| now.checked_add_signed(lifetime))
            .unwrap_or_else(|| now + Duration::days(DEFAULT_LIFETIME_DAYS));

        self.db
            .update_token(&integration.id, &refreshed.access_token, Some(expires_at))
            .await
            .map_err(RefreshError::Storage)?;
        self.resolver
            .prime(&integration.tenant_id, &refreshed.access_token, Some(expires_at))
            .await
            .map_err(RefreshError::Storage)?;

        info!(
            integration_id = %integration.id,
            tenant_id = %integration.tenant_id,
            expires_at = %expires_at,
            "Credential refreshed"
        );
        Ok(expires_at)
    }
}
