// src/notify.rs

use reqwest::blocking::Client;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Request failed: {0}")]
    RequestFailed(String),
    #[error("API error: {0}")]
    ApiError(String),
}

/// Outbound messages to people identified by chat id (moderators, submitters).
pub trait Notifier: Send + Sync {
    fn send(&self, chat_id: i64, text: &str) -> Result<(), NotifyError>;
}

/// Deliver to every recipient; a failed delivery is logged and never bubbles up.
pub fn notify_each(notifier: &dyn Notifier, chat_ids: &[i64], text: &str) {
    for &chat_id in chat_ids {
        if let Err(e) = notifier.send(chat_id, text) {
            tracing::warn!(chat_id, error = %e, "notification not delivered");
        }
    }
}

/// Used when no bot token is configured.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        tracing::info!(chat_id, text, "notification (log only)");
        Ok(())
    }
}

pub struct TelegramNotifier {
    token: String,
    client: Client,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: i64,
    text: &'a str,
    disable_web_page_preview: bool,
}

impl TelegramNotifier {
    pub fn new(token: String) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::RequestFailed(e.to_string()))?;
        Ok(Self { token, client })
    }
}

impl Notifier for TelegramNotifier {
    fn send(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.token);
        let payload = SendMessage {
            chat_id,
            text,
            disable_web_page_preview: true,
        };

        let resp = self
            .client
            .post(url)
            .json(&payload)
            .send()
            .map_err(|e| NotifyError::RequestFailed(e.without_url().to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().unwrap_or_else(|_| "Unknown error".to_string());
            return Err(NotifyError::ApiError(format!("{status}: {body}")));
        }

        tracing::debug!(chat_id, "telegram message sent");
        Ok(())
    }
}

/// Builds the configured notifier: Telegram when a token is set, log-only otherwise.
pub fn from_token(token: Option<&str>) -> Result<Box<dyn Notifier>, NotifyError> {
    match token.map(str::trim).filter(|t| !t.is_empty()) {
        Some(t) => Ok(Box::new(TelegramNotifier::new(t.to_string())?)),
        None => {
            tracing::warn!("TELEGRAM_TOKEN not set, notifications will only be logged");
            Ok(Box::new(LogNotifier))
        }
    }
}

#[cfg(test)]
pub use recording::RecordingNotifier;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_each_reaches_everyone() {
        let n = RecordingNotifier::default();
        notify_each(&n, &[1, 2, 3], "hello");
        assert_eq!(n.count(), 3);
        assert_eq!(n.messages_for(2), vec!["hello".to_string()]);
    }

    #[test]
    fn delivery_failures_are_swallowed() {
        let n = RecordingNotifier {
            fail: true,
            ..Default::default()
        };
        notify_each(&n, &[1], "hello");
        assert_eq!(n.count(), 0);
    }

    #[test]
    fn blank_token_means_log_only() {
        assert!(from_token(Some("  ")).is_ok());
        assert!(from_token(None).is_ok());
    }
}
