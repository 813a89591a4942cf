//! Error taxonomy shared by the identity core and the clinic services.
//!
//! Every error maps onto a stable [`ErrorCategory`] so the HTTP layer can pick a
//! status code without string matching, and onto a stable machine-readable
//! `code()` that clients can branch on.

use crate::notify::NotifyError;
use crate::store::StoreError;

/// Coarse classification used to pick a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    BadInput,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Unavailable,
    Internal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::BadInput => "bad_input",
            ErrorCategory::Unauthorized => "unauthorized",
            ErrorCategory::Forbidden => "forbidden",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::Conflict => "conflict",
            ErrorCategory::Unavailable => "unavailable",
            ErrorCategory::Internal => "internal",
        }
    }

    /// HTTP status code for this category.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCategory::BadInput => 400,
            ErrorCategory::Unauthorized => 401,
            ErrorCategory::Forbidden => 403,
            ErrorCategory::NotFound => 404,
            ErrorCategory::Conflict => 409,
            ErrorCategory::Unavailable => 502,
            ErrorCategory::Internal => 500,
        }
    }
}

/// Errors raised by account lifecycle, credential checks and request gating.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("email is already registered")]
    DuplicateEmail,

    /// Same variant for unknown email and wrong password.
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account email has not been verified")]
    AccountNotVerified,

    /// Unknown, already consumed, or expired verification token.
    #[error("invalid verification token")]
    InvalidVerificationToken,

    /// Malformed, badly signed or expired session token.
    #[error("invalid session token")]
    InvalidToken { reason: String },

    #[error("authentication required")]
    Unauthenticated,

    #[error("access denied for role {role}")]
    Forbidden { role: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("notification could not be delivered: {0}")]
    NotificationFailed(#[from] NotifyError),

    #[error(transparent)]
    Store(StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn invalid_token(reason: impl Into<String>) -> Self {
        AuthError::InvalidToken {
            reason: reason.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::DuplicateEmail => "duplicate_email",
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::AccountNotVerified => "account_not_verified",
            AuthError::InvalidVerificationToken => "invalid_verification_token",
            AuthError::InvalidToken { .. } => "invalid_token",
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::Forbidden { .. } => "forbidden",
            AuthError::InvalidInput(_) => "invalid_input",
            AuthError::NotificationFailed(_) => "notification_failed",
            AuthError::Store(e) => e.code(),
            AuthError::Internal(_) => "internal_error",
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AuthError::DuplicateEmail => ErrorCategory::Conflict,
            AuthError::InvalidCredentials
            | AuthError::InvalidToken { .. }
            | AuthError::Unauthenticated => ErrorCategory::Unauthorized,
            AuthError::AccountNotVerified | AuthError::Forbidden { .. } => ErrorCategory::Forbidden,
            AuthError::InvalidVerificationToken | AuthError::InvalidInput(_) => {
                ErrorCategory::BadInput
            }
            AuthError::NotificationFailed(_) => ErrorCategory::Unavailable,
            AuthError::Store(e) => e.category(),
            AuthError::Internal(_) => ErrorCategory::Internal,
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            // The store's uniqueness constraint is the final arbiter of the
            // register race; the loser surfaces as a duplicate.
            StoreError::DuplicateEmail(_) => AuthError::DuplicateEmail,
            other => AuthError::Store(other),
        }
    }
}

/// Errors raised by the clinic domain services.
#[derive(Debug, thiserror::Error)]
pub enum ClinicError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("operation not permitted: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(StoreError),
}

impl ClinicError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ClinicError::NotFound(what.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        ClinicError::InvalidInput(msg.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            ClinicError::NotFound(_) => "not_found",
            ClinicError::InvalidInput(_) => "invalid_input",
            ClinicError::Forbidden(_) => "forbidden",
            ClinicError::Auth(e) => e.code(),
            ClinicError::Store(e) => e.code(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            ClinicError::NotFound(_) => ErrorCategory::NotFound,
            ClinicError::InvalidInput(_) => ErrorCategory::BadInput,
            ClinicError::Forbidden(_) => ErrorCategory::Forbidden,
            ClinicError::Auth(e) => e.category(),
            ClinicError::Store(e) => e.category(),
        }
    }
}

impl From<StoreError> for ClinicError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail(_) => ClinicError::Auth(AuthError::DuplicateEmail),
            StoreError::NotFound(what) => ClinicError::NotFound(what),
            other => ClinicError::Store(other),
        }
    }
}

pub type AuthResult<T> = std::result::Result<T, AuthError>;
pub type ClinicResult<T> = std::result::Result<T, ClinicError>;
