use crate::error::DomainError;
use crate::keywords::{self, KeywordSet};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::HashSet;
use tracing::warn;

pub const TRIGGER_COMMENT_RECEIVED: &str = "IG_COMMENT_RECEIVED";
pub const ACTION_SEND_MESSAGE: &str = "IG_SEND_MSG";

const TRIGGER_DATA_KEY: &str = "igUserCommentData";
const REPLY_DATA_KEY: &str = "igReplyData";

/// 租户配置的一条自动化流程，加载时一次性解码成强类型节点
#[derive(Debug, Clone)]
pub struct AutomationDefinition {
    pub id: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    CommentReceived(TriggerConfig),
    SendMessage(ReplyConfig),
    /// 引擎不处理的节点类型，保留原始类型名
    Other(String),
}

#[derive(Debug, Clone, Default)]
pub struct TriggerConfig {
    pub allowed_posts: HashSet<String>,
    pub include: KeywordSet,
    pub exclude: KeywordSet,
}

impl TriggerConfig {
    pub fn accepts_post(&self, post_id: &str) -> bool {
        self.allowed_posts.contains(post_id)
    }

    pub fn accepts_text(&self, text: &str) -> bool {
        keywords::matches_include_exclude(text, &self.include, &self.exclude)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReplyConfig {
    #[serde(deserialize_with = "lenient")]
    pub public_replies: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    pub dm_message: String,
    #[serde(deserialize_with = "lenient")]
    pub buttons: Vec<ButtonConfig>,
    #[serde(rename = "safetyConfig", deserialize_with = "lenient")]
    pub safety: SafetyConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ButtonConfig {
    #[serde(deserialize_with = "lenient")]
    pub title: String,
    #[serde(deserialize_with = "lenient")]
    pub url: String,
    #[serde(deserialize_with = "lenient")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SafetyConfig {
    #[serde(deserialize_with = "lenient")]
    pub enabled: bool,
    #[serde(deserialize_with = "lenient")]
    pub mode: String,
    #[serde(deserialize_with = "lenient")]
    pub combined_limits: CombinedLimits,
    #[serde(deserialize_with = "lenient")]
    pub action_types: SafetyActionTypes,
    #[serde(deserialize_with = "lenient")]
    pub content_rules: ContentRules,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CombinedLimits {
    #[serde(rename = "maxActionsPerHour", deserialize_with = "lenient")]
    pub max_per_hour: i64,
    #[serde(rename = "maxActionsPerDay", deserialize_with = "lenient")]
    pub max_per_day: i64,
    #[serde(deserialize_with = "lenient")]
    pub delay_between_actions: DelayRange,
    #[serde(deserialize_with = "lenient")]
    pub comment_to_dm_delay: DelayRange,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SafetyActionTypes {
    #[serde(deserialize_with = "lenient")]
    pub enable_comment_reply: bool,
    #[serde(rename = "enableDMReply", deserialize_with = "lenient")]
    pub enable_dm_reply: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContentRules {
    #[serde(deserialize_with = "lenient")]
    pub max_mentions: i64,
    #[serde(deserialize_with = "lenient")]
    pub max_hashtags: i64,
}

/// 秒级闭区间，JSON 里是 `[min, max]`；缺的位置记 0，多出的忽略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Vec<Value>")]
pub struct DelayRange {
    pub min: i64,
    pub max: i64,
}

impl DelayRange {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }
}

impl From<[i64; 2]> for DelayRange {
    fn from([min, max]: [i64; 2]) -> Self {
        Self { min, max }
    }
}

impl From<Vec<Value>> for DelayRange {
    fn from(values: Vec<Value>) -> Self {
        let at = |i: usize| values.get(i).and_then(Value::as_i64).unwrap_or(0);
        Self {
            min: at(0),
            max: at(1),
        }
    }
}

/// 单个字段为 null 或类型不符时取零值，其余字段照常解码
fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

// --- 原始 JSON 结构 ---

#[derive(Deserialize)]
struct RawDefinition {
    #[serde(default)]
    id: String,
    #[serde(default)]
    nodes: Vec<RawNode>,
    #[serde(default)]
    edges: Vec<Edge>,
}

#[derive(Deserialize)]
struct RawNode {
    #[serde(default)]
    id: String,
    #[serde(default, rename = "type")]
    node_type: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawTriggerData {
    #[serde(rename = "selectedPostId", deserialize_with = "lenient")]
    selected_post_ids: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    include_keywords: Vec<String>,
    #[serde(deserialize_with = "lenient")]
    exclude_keywords: Vec<String>,
}

impl AutomationDefinition {
    /// 解析存储里的 definition JSON；JSON 中没有 id 时使用表主键
    pub fn from_json(row_id: &str, raw: &str) -> Result<Self, DomainError> {
        let def: RawDefinition =
            serde_json::from_str(raw).map_err(|source| DomainError::InvalidDefinition {
                id: row_id.to_string(),
                source,
            })?;

        let id = if def.id.is_empty() {
            row_id.to_string()
        } else {
            def.id
        };

        let nodes = def
            .nodes
            .into_iter()
            .filter(|n| !n.id.is_empty())
            .map(|n| decode_node(&id, n))
            .collect();

        Ok(Self {
            id,
            nodes,
            edges: def.edges,
        })
    }

    /// 第一个 comment-received 触发节点
    pub fn trigger(&self) -> Option<(&Node, &TriggerConfig)> {
        self.nodes.iter().find_map(|n| match &n.kind {
            NodeKind::CommentReceived(cfg) => Some((n, cfg)),
            _ => None,
        })
    }

    /// 沿第一条出边找到后继节点
    pub fn next_node(&self, from: &str) -> Option<&Node> {
        let edge = self.edges.iter().find(|e| e.source == from)?;
        if edge.target.is_empty() {
            return None;
        }
        self.nodes.iter().find(|n| n.id == edge.target)
    }
}

fn decode_node(automation_id: &str, raw: RawNode) -> Node {
    // 节点类型写在 data.type 里，顶层 type 只作兜底
    let kind_name = raw
        .data
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or(raw.node_type)
        .unwrap_or_default();

    let kind = match kind_name.as_str() {
        TRIGGER_COMMENT_RECEIVED => {
            let data: RawTriggerData =
                decode_payload(automation_id, &raw.id, raw.data.get(TRIGGER_DATA_KEY));
            NodeKind::CommentReceived(TriggerConfig {
                allowed_posts: data.selected_post_ids.into_iter().collect(),
                include: KeywordSet::new(data.include_keywords),
                exclude: KeywordSet::new(data.exclude_keywords),
            })
        }
        ACTION_SEND_MESSAGE => NodeKind::SendMessage(decode_payload(
            automation_id,
            &raw.id,
            raw.data.get(REPLY_DATA_KEY),
        )),
        _ => NodeKind::Other(kind_name),
    };

    Node { id: raw.id, kind }
}

/// 节点配置损坏时退回零值，不影响同一流程的其余部分
fn decode_payload<T>(automation_id: &str, node_id: &str, payload: Option<&Value>) -> T
where
    T: Default + for<'de> Deserialize<'de>,
{
    let Some(value) = payload else {
        return T::default();
    };
    if value.is_null() {
        return T::default();
    }
    match T::deserialize(value) {
        Ok(v) => v,
        Err(e) => {
            warn!(
                automation_id = %automation_id,
                node_id = %node_id,
                error = %e,
                "Malformed node payload, using defaults"
            );
            T::default()
        }
    }
}
