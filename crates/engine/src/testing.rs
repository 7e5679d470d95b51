//! 测试用的内存替身

use adapter::{OutboundClient, RefreshedCredential};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use domain::{AutomationDefinition, ManualClock, ScheduledWorkItem};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use storage::{AutomationRepository, CoordinationStore, CredentialResolver};

use crate::queue::{TaskOptions, WorkQueue};

pub fn clock_at(y: i32, m: u32, d: u32, h: u32, min: u32) -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap())
}

/// 与端到端场景一致的流程：P1 帖子、promo 关键词、一条公开回复和带按钮的私信
pub fn promo_definition(id: &str) -> AutomationDefinition {
    let raw = serde_json::json!({
        "id": id,
        "nodes": [
            {"id": "trigger", "data": {"type": "IG_COMMENT_RECEIVED", "igUserCommentData": {
                "selectedPostId": ["P1"],
                "includeKeywords": ["promo"],
                "excludeKeywords": ["spam"]
            }}},
            {"id": "action", "data": {"type": "IG_SEND_MSG", "igReplyData": {
                "publicReplies": ["Thanks!"],
                "dmMessage": "Check this: ",
                "buttons": [{"title": "Shop", "url": "http://x", "enabled": true}],
                "safetyConfig": {"combinedLimits": {
                    "delayBetweenActions": [2, 5],
                    "commentToDmDelay": [1, 3]
                }}
            }}}
        ],
        "edges": [{"source": "trigger", "target": "action"}]
    });
    AutomationDefinition::from_json(id, &raw.to_string()).unwrap()
}

pub struct FailingStore;

#[async_trait]
impl CoordinationStore for FailingStore {
    async fn claim_once(&self, _: &str, _: Duration) -> Result<bool> {
        Err(anyhow!("store unavailable"))
    }

    async fn incr_with_ttl(&self, _: &str, _: Duration) -> Result<i64> {
        Err(anyhow!("store unavailable"))
    }

    async fn get(&self, _: &str) -> Result<Option<String>> {
        Err(anyhow!("store unavailable"))
    }

    async fn set(&self, _: &str, _: &str, _: Duration) -> Result<()> {
        Err(anyhow!("store unavailable"))
    }
}

#[derive(Default)]
pub struct StaticRepo {
    pub by_account: HashMap<String, Vec<AutomationDefinition>>,
    pub fail: bool,
}

impl StaticRepo {
    pub fn with(account: &str, defs: Vec<AutomationDefinition>) -> Self {
        Self {
            by_account: HashMap::from([(account.to_string(), defs)]),
            fail: false,
        }
    }
}

#[async_trait]
impl AutomationRepository for StaticRepo {
    async fn list_active(&self, platform_account_id: &str) -> Result<Vec<AutomationDefinition>> {
        if self.fail {
            return Err(anyhow!("repository unavailable"));
        }
        Ok(self
            .by_account
            .get(platform_account_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct StaticResolver {
    pub tenants: HashMap<String, String>,
    pub credentials: HashMap<String, String>,
    pub fail_credentials: bool,
}

#[async_trait]
impl CredentialResolver for StaticResolver {
    async fn tenant_for_account(&self, platform_account_id: &str) -> Result<Option<String>> {
        Ok(self.tenants.get(platform_account_id).cloned())
    }

    async fn credential(&self, tenant_id: &str) -> Result<Option<String>> {
        if self.fail_credentials {
            return Err(anyhow!("credential store down"));
        }
        Ok(self.credentials.get(tenant_id).cloned())
    }
}

#[derive(Default)]
pub struct RecordingQueue {
    pub items: Mutex<Vec<(ScheduledWorkItem, TaskOptions)>>,
}

impl RecordingQueue {
    pub fn taken(&self) -> Vec<(ScheduledWorkItem, TaskOptions)> {
        self.items.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkQueue for RecordingQueue {
    async fn enqueue(&self, item: ScheduledWorkItem, options: TaskOptions) -> Result<()> {
        self.items.lock().unwrap().push((item, options));
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Reply { credential: String, comment_id: String, message: String },
    Dm { credential: String, recipient_id: String, message: String },
}

#[derive(Default)]
pub struct FakeClient {
    pub sent: Mutex<Vec<Sent>>,
    pub fail: bool,
}

impl FakeClient {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl OutboundClient for FakeClient {
    async fn reply_to_comment(&self, credential: &str, comment_id: &str, message: &str) -> Result<()> {
        if self.fail {
            return Err(anyhow!("ReplyComment status 500"));
        }
        self.sent.lock().unwrap().push(Sent::Reply {
            credential: credential.into(),
            comment_id: comment_id.into(),
            message: message.into(),
        });
        Ok(())
    }

    async fn send_direct_message(&self, credential: &str, recipient_id: &str, message: &str) -> Result<()> {
        if self.fail {
            return Err(anyhow!("SendDM status 500"));
        }
        self.sent.lock().unwrap().push(Sent::Dm {
            credential: credential.into(),
            recipient_id: recipient_id.into(),
            message: message.into(),
        });
        Ok(())
    }

    async fn refresh_credential(&self, credential: &str) -> Result<RefreshedCredential> {
        Ok(RefreshedCredential {
            access_token: credential.to_string(),
            expires_in: None,
        })
    }
}
