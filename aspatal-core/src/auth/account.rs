//! Accounts, roles and bcrypt password hashing

use crate::error::{AuthError, AuthResult};
use bcrypt::{hash, verify};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account role. Closed set; drives both profile shape and route access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "String")]
pub enum Role {
    Patient,
    Doctor,
    Receptionist,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Patient, Role::Doctor, Role::Receptionist, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "PATIENT",
            Role::Doctor => "DOCTOR",
            Role::Receptionist => "RECEPTIONIST",
            Role::Admin => "ADMIN",
        }
    }

    /// Staff roles are provisioned by an administrator and skip verification.
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Patient)
    }
}

impl FromStr for Role {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PATIENT" => Ok(Role::Patient),
            "DOCTOR" => Ok(Role::Doctor),
            "RECEPTIONIST" => Ok(Role::Receptionist),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(AuthError::InvalidInput(format!("unknown role '{}'", s))),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric account identifier. Profiles share the id of their account.
pub type AccountId = u64;

/// Outstanding email verification for a pending account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingVerification {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl PendingVerification {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Lifecycle state derived from the enabled flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccountState {
    Pending,
    Active,
}

/// Root identity record.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    pub enabled: bool,
    #[serde(skip_serializing)]
    pub verification: Option<PendingVerification>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl Account {
    pub fn state(&self) -> AccountState {
        if self.enabled {
            AccountState::Active
        } else {
            AccountState::Pending
        }
    }
}

/// Account fields supplied at creation; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub enabled: bool,
    pub verification: Option<PendingVerification>,
}

/// Canonical form used for every lookup and uniqueness check.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

/// bcrypt hashing with a configurable cost.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
}

impl PasswordHasher {
    pub const MIN_COST: u32 = 4;
    pub const MAX_COST: u32 = 31;

    pub fn new(cost: u32) -> AuthResult<Self> {
        if !(Self::MIN_COST..=Self::MAX_COST).contains(&cost) {
            return Err(AuthError::InvalidInput(format!(
                "bcrypt cost must be between {} and {}",
                Self::MIN_COST,
                Self::MAX_COST
            )));
        }
        Ok(Self { cost })
    }

    pub fn hash(&self, password: &str) -> AuthResult<String> {
        hash(password, self.cost)
            .map_err(|e| AuthError::Internal(format!("failed to hash password: {}", e)))
    }

    /// A stored hash that bcrypt cannot parse never verifies.
    pub fn verify(&self, password: &str, password_hash: &str) -> bool {
        verify(password, password_hash).unwrap_or(false)
    }
}
