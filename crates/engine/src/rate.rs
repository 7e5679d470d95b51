use anyhow::Result;
use domain::{keys, ActionKind, Clock};
use std::sync::Arc;
use std::time::Duration;
use storage::CoordinationStore;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub hour_count: i64,
    pub day_count: i64,
}

/// 每租户每动作的小时/日双窗口计数器，外加按接收者的私信冷却标记
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CoordinationStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CoordinationStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// 先计数再判断，计数反映的是尝试次数。上限 ≤ 0 表示该维度不限
    pub async fn allow(
        &self,
        tenant_id: &str,
        action: ActionKind,
        max_per_hour: i64,
        max_per_day: i64,
    ) -> Result<RateDecision> {
        let now = self.clock.now();
        let hour_count = self
            .store
            .incr_with_ttl(&keys::hour_counter(tenant_id, action, now), keys::HOUR_WINDOW_TTL)
            .await?;
        let day_count = self
            .store
            .incr_with_ttl(&keys::day_counter(tenant_id, action, now), keys::DAY_WINDOW_TTL)
            .await?;

        let allowed = (max_per_hour <= 0 || hour_count <= max_per_hour)
            && (max_per_day <= 0 || day_count <= max_per_day);

        Ok(RateDecision {
            allowed,
            hour_count,
            day_count,
        })
    }

    pub async fn set_cooldown(&self, tenant_id: &str, recipient_id: &str, ttl: Duration) -> Result<()> {
        self.store
            .set(&keys::dm_cooldown(tenant_id, recipient_id), "1", ttl)
            .await
    }

    /// 查询失败按"未冷却"处理
    pub async fn is_cooling_down(&self, tenant_id: &str, recipient_id: &str) -> bool {
        match self.store.get(&keys::dm_cooldown(tenant_id, recipient_id)).await {
            Ok(flag) => flag.is_some(),
            Err(e) => {
                warn!(
                    tenant_id = %tenant_id,
                    recipient_id = %recipient_id,
                    error = %e,
                    "Cooldown lookup failed"
                );
                false
            }
        }
    }
}
