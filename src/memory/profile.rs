//! 访客画像启发式：兴趣 / 主题抽取与个性化问候
//!
//! 抽取只扫描用户消息，按固定关键词锚点截取到句末的从句，统一小写并用集合去重。
//! 刻意保持关键词匹配，不做词干化或语义归一。

use std::collections::BTreeSet;
use std::sync::OnceLock;

use chrono::{Local, Timelike};
use regex::Regex;

use crate::memory::{ConversationStyle, Message, Preferences, Role};

fn interest_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:interested in|passionate about|favorite|enjoy|like)\s+([^.!?\n]+)")
            .expect("static interest regex")
    })
}

fn topic_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(?:about|regarding|concerning|topic|subject)\s+([^.!?\n]+)")
            .expect("static topic regex")
    })
}

fn extract_with(re: &Regex, messages: &[Message]) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    for message in messages.iter().filter(|m| m.role == Role::User) {
        for caps in re.captures_iter(&message.content) {
            if let Some(clause) = caps.get(1) {
                let normalized = clause
                    .as_str()
                    .trim()
                    .trim_end_matches([',', ';', ':'])
                    .trim()
                    .to_lowercase();
                if !normalized.is_empty() {
                    found.insert(normalized);
                }
            }
        }
    }
    found
}

/// 从用户消息中抽取兴趣（锚点：interested in / like / enjoy / favorite / passionate about）
pub fn extract_interests(messages: &[Message]) -> BTreeSet<String> {
    extract_with(interest_regex(), messages)
}

/// 从用户消息中抽取主题（锚点：about / regarding / concerning / topic / subject）
pub fn extract_topics(messages: &[Message]) -> BTreeSet<String> {
    extract_with(topic_regex(), messages)
}

/// 按小时与偏好生成问候语（纯函数，便于测试）
pub fn greeting_at(preferences: &Preferences, hour: u32) -> String {
    let day_part = if hour < 12 {
        "Good morning"
    } else if hour < 18 {
        "Good afternoon"
    } else {
        "Good evening"
    };

    let mut text = match preferences.conversation_style {
        ConversationStyle::Technical => format!("{day_part}! Ready to dig into some code?"),
        ConversationStyle::Casual => format!("{day_part}! Great to see you around here."),
        ConversationStyle::Detailed => {
            format!("{day_part}! I'm happy to walk through anything in depth.")
        }
        ConversationStyle::Default => format!("{day_part}! How can I help you today?"),
    };

    if !preferences.interests.is_empty() {
        let interests = preferences
            .interests
            .iter()
            .cloned()
            .collect::<Vec<_>>()
            .join(", ");
        text.push_str(&format!(" I remember you're interested in {interests}."));
    }

    text
}

/// 当前本地时间的个性化问候
pub fn personalized_greeting(preferences: &Preferences) -> String {
    greeting_at(preferences, Local::now().hour())
}
