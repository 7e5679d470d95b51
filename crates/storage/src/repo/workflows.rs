use crate::{models::SqlWorkflow, traits::AutomationRepository, Db};
use anyhow::Context;
use async_trait::async_trait;
use domain::{AutomationDefinition, TRIGGER_COMMENT_RECEIVED};

impl Db {
    pub async fn list_active_workflows(
        &self,
        account_id: &str,
    ) -> anyhow::Result<Vec<AutomationDefinition>> {
        let rows = sqlx::query_as::<_, SqlWorkflow>(
            r#"
            SELECT w.id, w.definition
            FROM workflows w
            JOIN integrations i ON i.id = w.integration_id
            WHERE i.account_id = ?
              AND w.is_active = TRUE
              AND w.trigger_type = ?
            ORDER BY w.created_at DESC, w.id ASC
            "#,
        )
        .bind(account_id)
        .bind(TRIGGER_COMMENT_RECEIVED)
        .fetch_all(&self.pool)
        .await
        .context("query workflows")?;

        // 定义 JSON 本身损坏时整体报错，便于在配置阶段发现
        rows.into_iter()
            .map(|row| {
                AutomationDefinition::from_json(&row.id, &row.definition).map_err(Into::into)
            })
            .collect()
    }

    pub async fn upsert_workflow(
        &self,
        id: &str,
        integration_id: &str,
        trigger_type: &str,
        is_active: bool,
        definition: &str,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO workflows (id, integration_id, trigger_type, is_active, definition)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                integration_id = excluded.integration_id,
                trigger_type = excluded.trigger_type,
                is_active = excluded.is_active,
                definition = excluded.definition
            "#,
        )
        .bind(id)
        .bind(integration_id)
        .bind(trigger_type)
        .bind(is_active)
        .bind(definition)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl AutomationRepository for Db {
    async fn list_active(&self, platform_account_id: &str) -> anyhow::Result<Vec<AutomationDefinition>> {
        self.list_active_workflows(platform_account_id).await
    }
}
