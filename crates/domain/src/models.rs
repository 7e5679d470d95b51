use serde::{Deserialize, Serialize};
use std::fmt;

/// 一条入站评论通知，解析完成后不可变，只被匹配器消费一次
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentEvent {
    pub event_id: String,
    pub tenant_id: String,
    pub platform_account_id: String,
    pub comment_id: String,
    pub post_id: String,
    pub text: String,
    pub author_id: String,
    pub author_handle: String,
    /// 租户专属的出站凭证 (page access token)
    pub credential: String,
}

/// 出站动作类型，同时也是限流计数器的维度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    PublicReply,
    DirectMessage,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::PublicReply => "public_reply",
            ActionKind::DirectMessage => "dm",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
