//! 开发用：向本地服务投递一条带签名的模拟评论 webhook

use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3000";

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn sign(secret: &str, body: &[u8]) -> anyhow::Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid HMAC key: {}", e))?;
    mac.update(body);
    Ok(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base_url = env_or("REPLYBOT_BASE_URL", DEFAULT_BASE_URL);
    let secret = env_or("REPLYBOT_PLATFORM__APP_SECRET", "");
    let account_id = env_or("DEMO_ACCOUNT_ID", "17841400000000000");
    let post_id = env_or("DEMO_POST_ID", "P1");
    let text = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tell me about the promo".to_string());

    let comment_id = format!("demo-{:x}", rand::random::<u64>());
    let body = json!({
        "object": "instagram",
        "entry": [{
            "id": account_id,
            "changes": [{
                "field": "comments",
                "value": {
                    "id": comment_id,
                    "post_id": post_id,
                    "text": text,
                    "from": {"id": "demo-user", "username": "ferris"}
                }
            }]
        }]
    })
    .to_string();

    let client = reqwest::Client::new();
    let url = format!("{}/webhook/instagram", base_url);
    println!("Posting comment {} to {}", comment_id, url);

    // 第二次投递相同内容，服务端应当忽略
    for attempt in 1..=2 {
        let mut req = client
            .post(&url)
            .header("content-type", "application/json")
            .body(body.clone());
        if !secret.is_empty() {
            req = req.header("X-Hub-Signature-256", sign(&secret, body.as_bytes())?);
        }
        let resp = req.send().await?;
        println!("   [{}/2] -> {}", attempt, resp.status());
    }

    Ok(())
}
