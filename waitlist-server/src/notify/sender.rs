//! Outbound message delivery
//!
//! The queue core only ever calls [`NotificationSender::send`]. Adapters:
//!
//! | Adapter | Use |
//! |---------|-----|
//! | [`LogSender`] | Development: writes the message to the log |
//! | [`MockSender`] | Tests: records messages, can be told to fail |
//! | [`TwilioSender`](super::twilio::TwilioSender) | Production SMS |

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

/// Delivery failure reported by a provider adapter
#[derive(Debug, Clone, Error)]
pub enum SendError {
    #[error("Provider rejected message: {0}")]
    Rejected(String),

    #[error("Provider unreachable: {0}")]
    Transport(String),
}

/// Capability to deliver one text message
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, phone: &str, message: &str) -> Result<(), SendError>;

    /// Adapter name for logs and health output
    fn name(&self) -> &'static str;
}

/// Sender that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSender;

#[async_trait]
impl NotificationSender for LogSender {
    async fn send(&self, phone: &str, message: &str) -> Result<(), SendError> {
        tracing::info!(to = %phone, message = %message, "SMS (log adapter)");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// A message captured by [`MockSender`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub message: String,
    pub sent_at: i64,
}

/// Recording sender for tests
#[derive(Debug, Default)]
pub struct MockSender {
    sent: Mutex<Vec<SentMessage>>,
    should_fail: Mutex<bool>,
}

impl MockSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sender whose every `send` fails
    pub fn failing() -> Self {
        let sender = Self::default();
        sender.set_should_fail(true);
        sender
    }

    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl NotificationSender for MockSender {
    async fn send(&self, phone: &str, message: &str) -> Result<(), SendError> {
        if *self.should_fail.lock() {
            tracing::warn!(to = %phone, "Mock SMS failure (simulated)");
            return Err(SendError::Rejected("simulated failure".into()));
        }
        self.sent.lock().push(SentMessage {
            to: phone.to_string(),
            message: message.to_string(),
            sent_at: shared::util::now_millis(),
        });
        Ok(())
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_messages() {
        let sender = MockSender::new();
        sender.send("+15550100", "hello").await.unwrap();
        sender.send("+15550101", "world").await.unwrap();

        let sent = sender.sent_messages();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].to, "+15550100");
        assert_eq!(sent[1].message, "world");

        sender.clear();
        assert!(sender.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let sender = MockSender::failing();
        assert!(sender.send("+15550100", "hello").await.is_err());
        assert!(sender.sent_messages().is_empty());

        sender.set_should_fail(false);
        assert!(sender.send("+15550100", "hello").await.is_ok());
    }

    #[tokio::test]
    async fn test_log_sender_succeeds() {
        assert!(LogSender.send("+15550100", "hi").await.is_ok());
        assert_eq!(LogSender.name(), "log");
    }
}
