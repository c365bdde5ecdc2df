//! Telegram Bot API notifier.

use std::time::Duration;

use super::{Notifier, NotifyError};

pub const TELEGRAM_API: &str = "https://api.telegram.org";

/// Characters MarkdownV2 reserves; each must be backslash-escaped in plain text.
const RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    '\\',
];

/// Escape text so Telegram renders it verbatim under `parse_mode=MarkdownV2`.
pub fn escape_markdown_v2(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for c in text.chars() {
        if RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Posts announcements to one chat through `sendMessage`.
pub struct TelegramNotifier {
    client: reqwest::blocking::Client,
    endpoint: String,
    chat_id: String,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // endpoint embeds the bot token
        f.debug_struct("TelegramNotifier")
            .field("chat_id", &self.chat_id)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    pub fn new(token: &str, chat_id: &str, timeout: Duration) -> Result<Self, NotifyError> {
        Self::with_api_base(TELEGRAM_API, token, chat_id, timeout)
    }

    pub fn with_api_base(
        api_base: &str,
        token: &str,
        chat_id: &str,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotifyError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{token}/sendMessage",
                api_base.trim_end_matches('/')
            ),
            chat_id: chat_id.to_string(),
        })
    }

    fn payload(&self, message: &str) -> serde_json::Value {
        serde_json::json!({
            "chat_id": self.chat_id,
            "text": escape_markdown_v2(message),
            "parse_mode": "MarkdownV2",
        })
    }
}

impl Notifier for TelegramNotifier {
    fn notify(&self, message: &str) -> Result<(), NotifyError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&self.payload(message))
            .send()
            // reqwest errors carry the URL, and the URL carries the token
            .map_err(|e| NotifyError::Transport(e.without_url().to_string()))?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().unwrap_or_default();
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_every_reserved_character() {
        assert_eq!(
            escape_markdown_v2("SBIN - EMA50 Daily | Price: 612.40"),
            "SBIN \\- EMA50 Daily \\| Price: 612\\.40"
        );
        assert_eq!(escape_markdown_v2("a_b*c[d](e)!"), "a\\_b\\*c\\[d\\]\\(e\\)\\!");
        assert_eq!(escape_markdown_v2("\\"), "\\\\");
    }

    #[test]
    fn leaves_emoji_and_digits_alone() {
        assert_eq!(
            escape_markdown_v2("🎯 TCS hit Target3: 4100"),
            "🎯 TCS hit Target3: 4100"
        );
    }

    #[test]
    fn payload_and_debug_hide_token() {
        let n = TelegramNotifier::with_api_base(
            "http://localhost:1/",
            "123:SECRET",
            "-100",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(n.endpoint, "http://localhost:1/bot123:SECRET/sendMessage");
        let payload = n.payload("✅ done.");
        assert_eq!(payload["parse_mode"], "MarkdownV2");
        assert_eq!(payload["text"], "✅ done\\.");
        assert_eq!(payload["chat_id"], "-100");
        assert!(!format!("{n:?}").contains("SECRET"));
    }
}
