use config::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;

const ENV_PREFIX: &str = "REPLYBOT_";
const DEFAULT_ADMIN_TOKEN: &str = "admin_secret_change_me";

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub redis: RedisSettings,
    pub platform: PlatformSettings,
    pub queue: QueueSettings,
    pub limits: LimitSettings,
    pub security: SecuritySettings,
}

#[derive(Deserialize, Clone, Debug)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Clone, Debug)]
pub struct DatabaseSettings {
    pub url: String,
}

/// 未配置 url 时使用进程内存储 (仅适合单实例)
#[derive(Deserialize, Clone, Debug, Default)]
pub struct RedisSettings {
    pub url: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
pub struct PlatformSettings {
    /// 为空时不校验 webhook 签名
    pub app_secret: String,
    pub verify_token: String,
    pub api_version: String,
    pub graph_base_url: String,
    pub refresh_base_url: String,
    pub request_timeout_secs: u64,
    /// 租户凭证缺失时的兜底 token
    pub fallback_token: String,
}

#[derive(Deserialize, Clone, Debug)]
pub struct QueueSettings {
    pub concurrency: usize,
    pub max_retry: u32,
    pub timeout_secs: u64,
    pub retry_initial_ms: u64,
    pub retry_max_secs: u64,
    pub ingest_capacity: usize,
    pub ingest_inflight: usize,
}

#[derive(Deserialize, Clone, Debug)]
pub struct LimitSettings {
    pub max_per_hour: i64,
    pub max_per_day: i64,
    pub dm_cooldown_secs: u64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct SecuritySettings {
    pub admin_token: String,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());
        Self::load(&run_mode, collect_env_vars())
    }

    fn load(run_mode: &str, overrides: HashMap<String, String>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.url", "sqlite://data/replybot.db")?
            .set_default("platform.app_secret", "")?
            .set_default("platform.verify_token", "")?
            .set_default("platform.api_version", "v21.0")?
            .set_default("platform.graph_base_url", "https://graph.facebook.com")?
            .set_default("platform.refresh_base_url", "https://graph.instagram.com")?
            .set_default("platform.request_timeout_secs", 10)?
            .set_default("platform.fallback_token", "")?
            .set_default("queue.concurrency", 10)?
            .set_default("queue.max_retry", 8)?
            .set_default("queue.timeout_secs", 15)?
            .set_default("queue.retry_initial_ms", 1000)?
            .set_default("queue.retry_max_secs", 600)?
            .set_default("queue.ingest_capacity", 1024)?
            .set_default("queue.ingest_inflight", 32)?
            .set_default("limits.max_per_hour", 25)?
            .set_default("limits.max_per_day", 200)?
            .set_default("limits.dm_cooldown_secs", 24 * 3600)?
            .set_default("security.admin_token", DEFAULT_ADMIN_TOKEN)?
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::File::with_name(&format!("config.{}", run_mode)).required(false));

        for (key, value) in overrides {
            builder = builder.set_override(key, value)?;
        }

        let settings: Settings = builder.build()?.try_deserialize()?;
        if run_mode == "production" {
            settings.check_production()?;
        }
        Ok(settings)
    }

    fn check_production(&self) -> Result<(), ConfigError> {
        if self.platform.app_secret.is_empty() {
            return Err(ConfigError::Message(
                "platform.app_secret is required in production".into(),
            ));
        }
        if self.security.admin_token == DEFAULT_ADMIN_TOKEN {
            return Err(ConfigError::Message(
                "security.admin_token must be changed in production".into(),
            ));
        }
        Ok(())
    }
}

/// `REPLYBOT_QUEUE__CONCURRENCY=4` → `queue.concurrency`
fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(k, _)| k.starts_with(ENV_PREFIX))
        .map(|(k, v)| {
            let key = k
                .trim_start_matches(ENV_PREFIX)
                .replace("__", ".")
                .to_lowercase();
            (key, v)
        })
        .collect()
}
