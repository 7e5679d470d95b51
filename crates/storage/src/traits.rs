use anyhow::Result;
use async_trait::async_trait;
use domain::AutomationDefinition;

/// 只读的自动化流程仓库
#[async_trait]
pub trait AutomationRepository: Send + Sync {
    /// 指定平台账号下所有启用的、触发器为评论的流程
    async fn list_active(&self, platform_account_id: &str) -> Result<Vec<AutomationDefinition>>;
}

/// 平台账号 → 租户、租户 → 出站凭证
#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn tenant_for_account(&self, platform_account_id: &str) -> Result<Option<String>>;

    async fn credential(&self, tenant_id: &str) -> Result<Option<String>>;
}
