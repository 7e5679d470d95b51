use crate::{kv::CoordinationStore, traits::CredentialResolver, Db};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use domain::{keys, Clock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// 没有过期时间的凭证缓存 30 分钟
const DEFAULT_CACHE_TTL_MINS: i64 = 30;
/// 缓存比真实过期早 2 分钟失效
const EXPIRY_SAFETY_MARGIN_MINS: i64 = 2;
/// 距离过期不足 3 分钟的缓存视为不可用
const NEAR_EXPIRY_MINS: i64 = 3;

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CachedCredential {
    token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
}

/// 先查协调存储里的缓存，再回落到数据库，并把结果写回缓存
#[derive(Clone)]
pub struct CachedCredentialResolver {
    db: Db,
    kv: Arc<dyn CoordinationStore>,
    clock: Arc<dyn Clock>,
}

impl CachedCredentialResolver {
    pub fn new(db: Db, kv: Arc<dyn CoordinationStore>, clock: Arc<dyn Clock>) -> Self {
        Self { db, kv, clock }
    }

    /// 覆盖写缓存；刷新凭证后调用以替换旧值
    pub async fn prime(
        &self,
        tenant_id: &str,
        token: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let now = self.clock.now();
        let mut ttl = Duration::minutes(DEFAULT_CACHE_TTL_MINS);
        if let Some(at) = expires_at {
            let until = at - now - Duration::minutes(EXPIRY_SAFETY_MARGIN_MINS);
            if until > Duration::minutes(1) {
                ttl = until;
            }
        }

        let payload = serde_json::to_string(&CachedCredential {
            token: token.to_string(),
            expires_at,
        })?;
        self.kv
            .set(&keys::credential_cache(tenant_id), &payload, ttl.to_std()?)
            .await
    }

    async fn cached(&self, tenant_id: &str) -> Option<String> {
        let raw = match self.kv.get(&keys::credential_cache(tenant_id)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(tenant_id = %tenant_id, error = %e, "Credential cache lookup failed");
                return None;
            }
        };

        let cached: CachedCredential = serde_json::from_str(&raw).ok()?;
        if cached.token.is_empty() {
            return None;
        }
        let fresh = cached
            .expires_at
            .map_or(true, |at| at - self.clock.now() > Duration::minutes(NEAR_EXPIRY_MINS));
        fresh.then_some(cached.token)
    }
}

#[async_trait]
impl CredentialResolver for CachedCredentialResolver {
    async fn tenant_for_account(&self, platform_account_id: &str) -> Result<Option<String>> {
        self.db.tenant_for_account(platform_account_id).await
    }

    async fn credential(&self, tenant_id: &str) -> Result<Option<String>> {
        if let Some(token) = self.cached(tenant_id).await {
            debug!(tenant_id = %tenant_id, "Credential cache hit");
            return Ok(Some(token));
        }

        let Some(row) = self.db.latest_integration_for_tenant(tenant_id).await? else {
            return Ok(None);
        };
        if row.access_token.is_empty() {
            return Ok(None);
        }

        if let Err(e) = self.prime(tenant_id, &row.access_token, row.expires_at).await {
            warn!(tenant_id = %tenant_id, error = %e, "Failed to cache credential");
        }
        Ok(Some(row.access_token))
    }
}
