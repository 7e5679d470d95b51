//! Instagram webhook 信封 (只保留评论相关字段)

use crate::error::DomainError;
use crate::events::CommentNotification;
use serde::Deserialize;

const COMMENT_FIELDS: &[&str] = &["comments", "ig_comments"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WebhookEnvelope {
    pub object: String,
    pub entry: Vec<WebhookEntry>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WebhookEntry {
    /// IG business account id
    pub id: String,
    pub changes: Vec<WebhookChange>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct WebhookChange {
    pub field: String,
    pub value: CommentValue,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentValue {
    #[serde(rename = "id")]
    pub comment_id: String,
    pub post_id: String,
    pub text: String,
    pub from: CommentAuthor,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CommentAuthor {
    pub id: String,
    pub username: String,
}

pub fn parse_envelope(body: &[u8]) -> Result<WebhookEnvelope, DomainError> {
    Ok(serde_json::from_slice(body)?)
}

impl WebhookEnvelope {
    /// 展开成评论通知；非评论字段和没有评论 ID 的变更被忽略
    pub fn into_notifications(self) -> Vec<CommentNotification> {
        self.entry
            .into_iter()
            .flat_map(|entry| {
                let account_id = entry.id;
                entry
                    .changes
                    .into_iter()
                    .filter(|ch| COMMENT_FIELDS.contains(&ch.field.as_str()))
                    .filter(|ch| !ch.value.comment_id.is_empty())
                    .map(move |ch| CommentNotification {
                        platform_account_id: account_id.clone(),
                        comment_id: ch.value.comment_id,
                        post_id: ch.value.post_id,
                        text: ch.value.text,
                        author_id: ch.value.from.id,
                        author_handle: ch.value.from.username,
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_comment_changes() {
        let body = br#"{
            "object": "instagram",
            "entry": [{
                "id": "1784",
                "changes": [
                    {"field": "comments", "value": {"id": "C1", "post_id": "P1", "text": "promo?",
                        "from": {"id": "U1", "username": "ferris"}}},
                    {"field": "mentions", "value": {"id": "M1"}},
                    {"field": "ig_comments", "value": {"id": "C2", "post_id": "P1", "text": "hi"}}
                ]
            }]
        }"#;

        let notes = parse_envelope(body).unwrap().into_notifications();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].platform_account_id, "1784");
        assert_eq!(notes[0].event_id(), "C1");
        assert_eq!(notes[0].author_handle, "ferris");
        assert_eq!(notes[1].comment_id, "C2");
        assert!(notes[1].author_id.is_empty());
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(parse_envelope(b"not-json").is_err());
    }

    #[test]
    fn test_notification_into_event() {
        let note = CommentNotification {
            platform_account_id: "acc".into(),
            comment_id: "C9".into(),
            post_id: "P".into(),
            text: "t".into(),
            author_id: "U".into(),
            author_handle: "h".into(),
        };
        let ev = note.into_event("tenant-1".into(), "tok".into());
        assert_eq!(ev.event_id, "C9");
        assert_eq!(ev.tenant_id, "tenant-1");
        assert_eq!(ev.credential, "tok");
    }
}
