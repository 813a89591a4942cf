//! Role-based access control: per-route access table and the authorization
//! decision applied to an explicit request context.

use crate::auth::{Role, SessionClaims};
use crate::error::{AuthError, AuthResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Caller identity asserted by a valid session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub email: String,
    pub role: Role,
}

impl From<SessionClaims> for Identity {
    fn from(claims: SessionClaims) -> Self {
        Self {
            email: claims.email,
            role: claims.role,
        }
    }
}

/// Per-request context, passed down the handler chain by value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub identity: Option<Identity>,
    pub request_id: String,
}

impl RequestContext {
    pub fn anonymous(request_id: impl Into<String>) -> Self {
        Self {
            identity: None,
            request_id: request_id.into(),
        }
    }

    pub fn authenticated(identity: Identity, request_id: impl Into<String>) -> Self {
        Self {
            identity: Some(identity),
            request_id: request_id.into(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.identity.is_none()
    }
}

/// Capability a route requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    /// Exactly this role; no hierarchy.
    Role(Role),
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Access::Public => f.write_str("public"),
            Access::Authenticated => f.write_str("authenticated"),
            Access::Role(role) => write!(f, "role:{}", role),
        }
    }
}

/// Path-prefix access table. The longest matching prefix wins; unmatched paths
/// fall back to the default.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Vec<(String, Access)>,
    default: Access,
}

impl AccessPolicy {
    pub fn new(default: Access) -> Self {
        Self {
            rules: Vec::new(),
            default,
        }
    }

    pub fn with_rule(mut self, prefix: impl Into<String>, access: Access) -> Self {
        let prefix = prefix.into().trim_end_matches('/').to_string();
        self.rules.retain(|(p, _)| *p != prefix);
        self.rules.push((prefix, access));
        self
    }

    /// Route table for the hospital API.
    pub fn hospital() -> Self {
        Self::new(Access::Authenticated)
            .with_rule("/api/auth", Access::Public)
            .with_rule("/health", Access::Public)
            .with_rule("/api/admin", Access::Role(Role::Admin))
            .with_rule("/api/doctor", Access::Role(Role::Doctor))
            .with_rule("/api/receptionist", Access::Role(Role::Receptionist))
            .with_rule("/api/patient", Access::Role(Role::Patient))
            .with_rule("/api/chat", Access::Authenticated)
    }

    pub fn access_for(&self, path: &str) -> Access {
        self.rules
            .iter()
            .filter(|(prefix, _)| matches_prefix(path, prefix))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, access)| *access)
            .unwrap_or(self.default)
    }
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::hospital()
    }
}

/// `/api/admin` matches `/api/admin` and `/api/admin/x`, not `/api/administrator`.
fn matches_prefix(path: &str, prefix: &str) -> bool {
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || prefix.is_empty(),
        None => false,
    }
}

/// Decide whether `ctx` satisfies `access`.
pub fn authorize(ctx: &RequestContext, access: Access) -> AuthResult<()> {
    match (access, &ctx.identity) {
        (Access::Public, _) => Ok(()),
        (_, None) => Err(AuthError::Unauthenticated),
        (Access::Authenticated, Some(_)) => Ok(()),
        (Access::Role(required), Some(identity)) if identity.role == required => Ok(()),
        (Access::Role(_), Some(identity)) => Err(AuthError::Forbidden {
            role: identity.role.as_str().to_string(),
        }),
    }
}
