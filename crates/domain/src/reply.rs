use crate::automation::{ButtonConfig, ContentRules};

/// 按作者 ID 的稳定哈希选一条公开回复，同一作者对同一候选列表总是得到同一结果
pub fn pick_reply<'a>(candidates: &'a [String], salt: &str) -> Option<&'a str> {
    if candidates.is_empty() {
        return None;
    }
    let h = salt
        .bytes()
        .fold(0u64, |h, b| (h * 31 + u64::from(b)) & 0x7fff_ffff);
    let idx = (h % candidates.len() as u64) as usize;
    Some(candidates[idx].as_str())
}

/// 私信正文：模板 + 每个启用按钮一行 `title: url`
pub fn render_dm(template: &str, buttons: &[ButtonConfig]) -> String {
    let mut text = template.to_string();
    for btn in buttons.iter().filter(|b| b.enabled && !b.url.is_empty()) {
        text.push('\n');
        text.push_str(&btn.title);
        text.push_str(": ");
        text.push_str(&btn.url);
    }
    text
}

/// 公开回复的内容规则钩子：超出上限的 @mention / #hashtag 被移除
pub fn apply_content_rules(message: &str, rules: &ContentRules) -> String {
    if rules.max_mentions <= 0 && rules.max_hashtags <= 0 {
        return message.to_string();
    }

    let mut mentions = 0i64;
    let mut hashtags = 0i64;
    let mut dropped = false;

    let kept: Vec<&str> = message
        .split_whitespace()
        .filter(|word| {
            let (counter, limit) = if word.len() > 1 && word.starts_with('@') {
                (&mut mentions, rules.max_mentions)
            } else if word.len() > 1 && word.starts_with('#') {
                (&mut hashtags, rules.max_hashtags)
            } else {
                return true;
            };
            if limit <= 0 {
                return true;
            }
            *counter += 1;
            if *counter > limit {
                dropped = true;
                return false;
            }
            true
        })
        .collect();

    if dropped {
        kept.join(" ")
    } else {
        message.to_string()
    }
}
