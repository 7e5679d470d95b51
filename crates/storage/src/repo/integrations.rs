use crate::{models::Integration, Db};
use chrono::{DateTime, Utc};

const PROVIDER: &str = "INSTAGRAM";

impl Db {
    pub async fn upsert_integration(
        &self,
        id: &str,
        tenant_id: &str,
        account_id: &str,
        access_token: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO integrations (id, tenant_id, account_id, provider, access_token, expires_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                tenant_id = excluded.tenant_id,
                account_id = excluded.account_id,
                access_token = excluded.access_token,
                expires_at = excluded.expires_at,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(account_id)
        .bind(PROVIDER)
        .bind(access_token)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn tenant_for_account(&self, account_id: &str) -> anyhow::Result<Option<String>> {
        let tenant = sqlx::query_scalar::<_, String>(
            r#"
            SELECT tenant_id FROM integrations
            WHERE account_id = ? AND provider = ?
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(account_id)
        .bind(PROVIDER)
        .fetch_optional(&self.pool)
        .await?;
        Ok(tenant)
    }

    /// 租户最近更新的一条凭证
    pub async fn latest_integration_for_tenant(
        &self,
        tenant_id: &str,
    ) -> anyhow::Result<Option<Integration>> {
        let row = sqlx::query_as::<_, Integration>(
            r#"
            SELECT id, tenant_id, account_id, access_token, expires_at
            FROM integrations
            WHERE tenant_id = ? AND provider = ?
            ORDER BY updated_at DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(PROVIDER)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_integration(&self, id: &str) -> anyhow::Result<Option<Integration>> {
        let row = sqlx::query_as::<_, Integration>(
            "SELECT id, tenant_id, account_id, access_token, expires_at FROM integrations WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn update_token(
        &self,
        id: &str,
        access_token: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE integrations
            SET access_token = ?,
                expires_at = ?,
                last_sync_at = CURRENT_TIMESTAMP,
                updated_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(access_token)
        .bind(expires_at)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
