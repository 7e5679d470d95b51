use crate::queue::{DeliveryError, WorkHandler};
use crate::rate::RateLimiter;
use adapter::OutboundClient;
use async_trait::async_trait;
use domain::{ActionKind, ScheduledWorkItem};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryLimits {
    pub max_per_hour: i64,
    pub max_per_day: i64,
    pub dm_cooldown: Duration,
}

impl Default for DeliveryLimits {
    fn default() -> Self {
        Self {
            max_per_hour: 25,
            max_per_day: 200,
            dm_cooldown: Duration::from_secs(24 * 3600),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    /// 接收者仍在冷却期，没有发送
    CooledDown,
}

/// 消费工作项：冷却检查 → 限流 → 调用平台 → 私信成功后设置冷却
#[derive(Clone)]
pub struct DeliveryExecutor {
    limiter: RateLimiter,
    client: Arc<dyn OutboundClient>,
    limits: DeliveryLimits,
}

impl DeliveryExecutor {
    pub fn new(limiter: RateLimiter, client: Arc<dyn OutboundClient>, limits: DeliveryLimits) -> Self {
        Self {
            limiter,
            client,
            limits,
        }
    }

    pub async fn execute(&self, item: &ScheduledWorkItem) -> Result<DeliveryOutcome, DeliveryError> {
        let is_dm = item.kind == ActionKind::DirectMessage;

        if is_dm && self.limiter.is_cooling_down(&item.tenant_id, &item.target_id).await {
            info!(
                tenant_id = %item.tenant_id,
                recipient_id = %item.target_id,
                "DM recipient cooling down, skipped"
            );
            return Ok(DeliveryOutcome::CooledDown);
        }

        let decision = self
            .limiter
            .allow(
                &item.tenant_id,
                item.kind,
                self.limits.max_per_hour,
                self.limits.max_per_day,
            )
            .await?;
        if !decision.allowed {
            warn!(
                tenant_id = %item.tenant_id,
                kind = %item.kind,
                hour_count = decision.hour_count,
                day_count = decision.day_count,
                "Throttled"
            );
            return Err(DeliveryError::SkipRetry(format!(
                "{} rate limited (hour={}, day={})",
                item.kind, decision.hour_count, decision.day_count
            )));
        }

        match item.kind {
            ActionKind::PublicReply => {
                self.client
                    .reply_to_comment(&item.credential, &item.target_id, &item.message)
                    .await?
            }
            ActionKind::DirectMessage => {
                self.client
                    .send_direct_message(&item.credential, &item.target_id, &item.message)
                    .await?
            }
        }

        if is_dm {
            if let Err(e) = self
                .limiter
                .set_cooldown(&item.tenant_id, &item.target_id, self.limits.dm_cooldown)
                .await
            {
                warn!(
                    tenant_id = %item.tenant_id,
                    recipient_id = %item.target_id,
                    error = %e,
                    "Failed to arm DM cooldown"
                );
            }
        }

        info!(
            tenant_id = %item.tenant_id,
            kind = %item.kind,
            target_id = %item.target_id,
            automation_id = %item.automation_id,
            "Delivered"
        );
        Ok(DeliveryOutcome::Sent)
    }
}

#[async_trait]
impl WorkHandler for DeliveryExecutor {
    async fn handle(&self, item: &ScheduledWorkItem) -> Result<(), DeliveryError> {
        self.execute(item).await.map(|_| ())
    }
}
