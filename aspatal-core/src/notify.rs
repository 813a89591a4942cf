//! Outbound notifications (verification links, welcome mails)

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::info;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("delivery to {recipient} failed: {reason}")]
    Delivery { recipient: String, reason: String },
}

/// Delivery channel for account mail. Callers decide whether a failure is
/// fatal for the operation that triggered it.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, email: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}

/// Writes every message to the log instead of delivering it.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, email: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!(target: "aspatal::notify", to = email, subject, "{}", body);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutboundMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Captures messages in memory. Can be switched into a failing mode to
/// exercise delivery-failure paths.
#[derive(Debug, Default)]
pub struct Outbox {
    messages: Mutex<Vec<OutboundMessage>>,
    failing: Mutex<bool>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn messages(&self) -> Vec<OutboundMessage> {
        self.messages.lock().clone()
    }

    pub fn last_to(&self, email: &str) -> Option<OutboundMessage> {
        self.messages
            .lock()
            .iter()
            .rev()
            .find(|m| m.to == email)
            .cloned()
    }
}

#[async_trait]
impl Notifier for Outbox {
    async fn send(&self, email: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        if *self.failing.lock() {
            return Err(NotifyError::Delivery {
                recipient: email.to_string(),
                reason: "outbox is in failing mode".to_string(),
            });
        }
        self.messages.lock().push(OutboundMessage {
            to: email.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

/// Link embedded in verification mail.
pub fn verification_link(base_url: &str, token: &str) -> String {
    format!(
        "{}/api/auth/verify?token={}",
        base_url.trim_end_matches('/'),
        token
    )
}

/// Pull the token back out of a verification link.
pub fn token_from_link(link: &str) -> Option<&str> {
    link.split_once("token=").map(|(_, t)| {
        t.split(|c: char| c == '&' || c.is_whitespace())
            .next()
            .unwrap_or(t)
    })
}
