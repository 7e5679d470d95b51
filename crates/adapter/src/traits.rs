use anyhow::Result;
use async_trait::async_trait;

/// 长期凭证刷新结果，`expires_in` 单位为秒
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshedCredential {
    pub access_token: String,
    pub expires_in: Option<i64>,
}

/// 外部消息平台 API；每次调用都带上租户自己的凭证
#[async_trait]
pub trait OutboundClient: Send + Sync {
    async fn reply_to_comment(&self, credential: &str, comment_id: &str, message: &str) -> Result<()>;

    async fn send_direct_message(
        &self,
        credential: &str,
        recipient_id: &str,
        message: &str,
    ) -> Result<()>;

    async fn refresh_credential(&self, credential: &str) -> Result<RefreshedCredential>;
}
