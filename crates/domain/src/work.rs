use crate::models::ActionKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 可独立重试的出站工作项
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledWorkItem {
    pub kind: ActionKind,
    pub tenant_id: String,
    /// PublicReply: 被回复的评论 ID; DirectMessage: 接收者用户 ID
    pub target_id: String,
    /// 触发本次动作的评论，仅用于追踪
    pub comment_id: String,
    pub message: String,
    pub credential: String,
    pub automation_id: String,
    pub action_node_id: String,
    pub not_before: DateTime<Utc>,
}
