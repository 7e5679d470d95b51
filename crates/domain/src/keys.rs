//! 协调存储的 key 布局

use crate::models::ActionKind;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// 幂等令牌有效期 (7 天)，同时也是去重窗口的上界
pub const IDEMPOTENCY_TTL: Duration = Duration::from_secs(7 * 24 * 3600);

/// 小时桶过期时间：一小时 + 5 分钟余量
pub const HOUR_WINDOW_TTL: Duration = Duration::from_secs(3600 + 5 * 60);

/// 日桶过期时间：一天 + 30 分钟余量
pub const DAY_WINDOW_TTL: Duration = Duration::from_secs(24 * 3600 + 30 * 60);

pub fn event_token(event_id: &str) -> String {
    format!("idem:event:{}", event_id)
}

pub fn exec_token(automation_id: &str, action_node_id: &str, comment_id: &str) -> String {
    format!("idem:exec:{}:{}:{}", automation_id, action_node_id, comment_id)
}

pub fn hour_counter(tenant_id: &str, action: ActionKind, now: DateTime<Utc>) -> String {
    format!(
        "rl:{}:{}:hour:{}",
        tenant_id,
        action.as_str(),
        now.format("%Y%m%d%H")
    )
}

pub fn day_counter(tenant_id: &str, action: ActionKind, now: DateTime<Utc>) -> String {
    format!(
        "rl:{}:{}:day:{}",
        tenant_id,
        action.as_str(),
        now.format("%Y%m%d")
    )
}

pub fn dm_cooldown(tenant_id: &str, recipient_id: &str) -> String {
    format!("cooldown:dm:{}:{}", tenant_id, recipient_id)
}

pub fn credential_cache(tenant_id: &str) -> String {
    format!("credential-cache:{}", tenant_id)
}
