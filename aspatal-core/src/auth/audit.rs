//! Audit trail for security events and account administration

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{info, warn};
use uuid::Uuid;

/// Types of audit events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    /// Authentication events
    AuthenticationSuccess,
    AuthenticationFailure,

    /// Authorization events
    AuthorizationFailure,

    /// Account lifecycle events
    AccountRegistered,
    AccountVerified,
    AccountProvisioned,
    AccountUpdated,
    AccountDeleted,

    /// Outbound mail could not be delivered
    NotificationFailed,
}

/// Audit log entry
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: AuditEventType,
    /// Account the event concerns, if known
    pub email: Option<String>,
    pub success: bool,
    pub detail: Option<String>,
    pub request_id: Option<String>,
}

impl AuditEntry {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            email: None,
            success: true,
            detail: None,
            request_id: None,
        }
    }

    pub fn with_email(mut self, email: &str) -> Self {
        self.email = Some(email.to_string());
        self
    }

    /// Marks the entry as a failure.
    pub fn with_error(mut self, error: &str) -> Self {
        self.detail = Some(error.to_string());
        self.success = false;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }
}

/// Bounded in-memory audit ring. Oldest entries are dropped once full.
pub struct AuditLog {
    entries: Mutex<VecDeque<AuditEntry>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&self, entry: AuditEntry) {
        let email = entry.email.as_deref().unwrap_or("anonymous");
        let detail = entry.detail.as_deref().unwrap_or("");
        if entry.success {
            info!(target: "aspatal::audit", event = ?entry.event_type, email, detail, "audit");
        } else {
            warn!(target: "aspatal::audit", event = ?entry.event_type, email, detail, "audit");
        }

        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn log_auth_success(&self, email: &str) {
        self.record(AuditEntry::new(AuditEventType::AuthenticationSuccess).with_email(email));
    }

    pub fn log_auth_failure(&self, email: &str, error: &str) {
        self.record(
            AuditEntry::new(AuditEventType::AuthenticationFailure)
                .with_email(email)
                .with_error(error),
        );
    }

    pub fn log_authorization_failure(&self, email: Option<&str>, path: &str, request_id: &str) {
        let mut entry = AuditEntry::new(AuditEventType::AuthorizationFailure)
            .with_error(&format!("access denied to {}", path))
            .with_request_id(request_id);
        if let Some(email) = email {
            entry = entry.with_email(email);
        }
        self.record(entry);
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .iter()
            .rev()
            .take(limit)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(1000)
    }
}
