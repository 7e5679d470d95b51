use regex::Regex;

/// 印尼语 → 英文关键词的固定同义规则 (子串匹配)
const SYNONYMS: &[(&str, &str)] = &[("harga", "price"), ("informasi", "info")];

/// 小写、去首尾空白、丢弃非 ASCII 字符 (emoji 等)
pub fn normalize(text: &str) -> String {
    text.to_lowercase()
        .trim()
        .chars()
        .filter(|c| c.is_ascii())
        .collect()
}

#[derive(Debug, Clone)]
struct Keyword {
    text: String,
    pattern: Regex,
}

/// 预编译的关键词列表，按整词边界匹配
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    keywords: Vec<Keyword>,
}

impl KeywordSet {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keywords = keywords
            .into_iter()
            .filter_map(|kw| {
                let text = kw.as_ref().trim().to_lowercase();
                if text.is_empty() {
                    return None;
                }
                let pattern = Regex::new(&format!(r"\b{}\b", regex::escape(&text))).ok()?;
                Some(Keyword { text, pattern })
            })
            .collect();
        Self { keywords }
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k.text == keyword)
    }

    /// `normalized` 需已经过 [`normalize`]
    pub fn matches(&self, normalized: &str) -> bool {
        self.keywords.iter().any(|k| k.pattern.is_match(normalized))
    }
}

/// 排除词优先；包含词为空时直接放行
pub fn matches_include_exclude(text: &str, include: &KeywordSet, exclude: &KeywordSet) -> bool {
    let normalized = normalize(text);

    if exclude.matches(&normalized) {
        return false;
    }

    if include.is_empty() {
        return true;
    }

    if include.matches(&normalized) {
        return true;
    }

    SYNONYMS
        .iter()
        .any(|(source, target)| normalized.contains(source) && include.contains(target))
}
