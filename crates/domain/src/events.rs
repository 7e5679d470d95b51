use crate::models::CommentEvent;
use serde::{Deserialize, Serialize};

/// Webhook 解析出的原始评论通知，尚未绑定租户与凭证
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentNotification {
    pub platform_account_id: String,
    pub comment_id: String,
    pub post_id: String,
    pub text: String,
    pub author_id: String,
    pub author_handle: String,
}

impl CommentNotification {
    /// 平台没有独立的投递 ID，沿用评论 ID 作为事件 ID
    pub fn event_id(&self) -> &str {
        &self.comment_id
    }

    pub fn into_event(self, tenant_id: String, credential: String) -> CommentEvent {
        CommentEvent {
            event_id: self.event_id().to_string(),
            tenant_id,
            platform_account_id: self.platform_account_id,
            comment_id: self.comment_id,
            post_id: self.post_id,
            text: self.text,
            author_id: self.author_id,
            author_handle: self.author_handle,
            credential,
        }
    }
}
