use adapter::CredentialRefresher;
use engine::IngestPool;

#[derive(Clone)]
pub struct AppState {
    pub ingest: IngestPool,
    pub refresher: CredentialRefresher,
    /// 为空时跳过签名校验
    pub app_secret: String,
    pub verify_token: String,
    pub admin_token: String,
}
