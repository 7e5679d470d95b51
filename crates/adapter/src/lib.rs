mod drivers;
mod refresh;
mod traits;

pub use drivers::graph::GraphClient;
pub use refresh::{CredentialRefresher, RefreshError};
pub use traits::{OutboundClient, RefreshedCredential};

/// Graph API 连接参数
#[derive(Clone, Debug)]
pub struct GraphConfig {
    pub graph_base_url: String,
    pub refresh_base_url: String,
    pub api_version: String,
    pub request_timeout_secs: u64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            graph_base_url: "https://graph.facebook.com".to_string(),
            refresh_base_url: "https://graph.instagram.com".to_string(),
            api_version: "v21.0".to_string(),
            request_timeout_secs: 10,
        }
    }
}
