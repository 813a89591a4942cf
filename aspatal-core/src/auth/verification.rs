//! Email verification: PENDING accounts carry a single-use token that moves
//! them to ACTIVE.

use crate::auth::{Account, PendingVerification};
use crate::error::{AuthError, AuthResult};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

pub const VERIFICATION_SUBJECT: &str = "Verify Your Email - Aspatal";

/// Mints verification tokens.
#[derive(Debug, Clone)]
pub struct VerificationPolicy {
    ttl: Duration,
}

impl VerificationPolicy {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Fresh 128-bit random token valid for the policy TTL.
    pub fn mint(&self, now: DateTime<Utc>) -> PendingVerification {
        PendingVerification {
            token: Uuid::new_v4().simple().to_string(),
            expires_at: now + self.ttl,
        }
    }
}

/// Move a pending account to ACTIVE, consuming its token.
///
/// Expired tokens are indistinguishable from unknown ones.
pub fn activate(account: &mut Account, token: &str, now: DateTime<Utc>) -> AuthResult<()> {
    match &account.verification {
        Some(pending) if pending.token == token && !pending.is_expired_at(now) => {
            account.enabled = true;
            account.verification = None;
            Ok(())
        }
        _ => Err(AuthError::InvalidVerificationToken),
    }
}

pub fn verification_body(link: &str) -> String {
    format!("Click the link to verify your account: {}", link)
}
