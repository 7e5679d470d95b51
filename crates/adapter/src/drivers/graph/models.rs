use serde::{Deserialize, Serialize};

#[derive(Serialize)]
pub(super) struct ReplyRequest<'a> {
    pub message: &'a str,
    pub access_token: &'a str,
}

#[derive(Serialize)]
pub(super) struct Recipient<'a> {
    pub id: &'a str,
}

#[derive(Serialize)]
pub(super) struct TextMessage<'a> {
    pub text: &'a str,
}

#[derive(Serialize)]
pub(super) struct DirectMessageRequest<'a> {
    pub recipient: Recipient<'a>,
    pub message: TextMessage<'a>,
    pub access_token: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct TokenResponse {
    pub access_token: String,
    /// 秒 (约 60 天)
    #[serde(default)]
    pub expires_in: Option<i64>,
}
