use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(FromRow)]
pub struct SqlWorkflow {
    pub id: String,
    pub definition: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Integration {
    pub id: String,
    pub tenant_id: String,
    pub account_id: String,
    pub access_token: String,
    pub expires_at: Option<DateTime<Utc>>,
}
