//! Authentication and authorization for Aspatal
//!
//! This module provides:
//! - Account records with bcrypt password hashing
//! - Email verification for self-registered accounts
//! - Stateless JWT session tokens
//! - Role-based access control for HTTP routes
//! - Audit logging for security events

pub mod account;
pub mod audit;
pub mod jwt;
pub mod rbac;
pub mod verification;

pub use account::*;
pub use audit::*;
pub use jwt::*;
pub use rbac::*;
pub use verification::*;

use crate::clinic::{DoctorDetails, Profile};
use crate::config::{AuthSettings, BootstrapSettings};
use crate::error::{AuthError, AuthResult};
use crate::notify::{verification_link, Notifier};
use crate::store::AccountStore;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const MIN_PASSWORD_LEN: usize = 6;

const GENERATED_PASSWORD_CHARS: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789!@#$%^&*";
const GENERATED_PASSWORD_LEN: usize = 8;

const WELCOME_SUBJECT: &str = "Welcome to Aspatal";

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles"));

/// Self-registration payload.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Staff-created account. Verification is skipped and a password is generated.
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub phone_number: Option<String>,
    pub doctor: DoctorDetails,
}

/// How a generated password reaches its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialDelivery {
    /// Mail it; a delivery failure degrades to a warning.
    Email,
    /// Hand it back to the provisioning caller.
    ReturnToCaller,
}

#[derive(Debug, Clone)]
pub struct Provisioned {
    pub account: Account,
    pub password: String,
    pub notification_failed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub token: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

/// Account lifecycle, credential checks and session issuance.
pub struct AuthSystem {
    store: Arc<dyn AccountStore>,
    notifier: Arc<dyn Notifier>,
    codec: TokenCodec,
    hasher: PasswordHasher,
    verification: VerificationPolicy,
    audit: AuditLog,
    public_base_url: String,
    /// Verified against when the email is unknown so both login failures cost
    /// one bcrypt round.
    dummy_hash: String,
}

impl AuthSystem {
    pub fn new(
        settings: &AuthSettings,
        public_base_url: impl Into<String>,
        store: Arc<dyn AccountStore>,
        notifier: Arc<dyn Notifier>,
    ) -> AuthResult<Self> {
        let token_ttl = minutes(settings.token_ttl_minutes)?;
        let verification_ttl = minutes(settings.verification_ttl_hours.saturating_mul(60))?;

        let codec = TokenCodec::new(settings.jwt_secret.as_bytes(), token_ttl)?;
        let hasher = PasswordHasher::new(settings.password_hash_cost)?;
        let dummy_hash = hasher.hash(&generate_password())?;

        Ok(Self {
            store,
            notifier,
            codec,
            hasher,
            verification: VerificationPolicy::new(verification_ttl),
            audit: AuditLog::new(settings.audit_capacity),
            public_base_url: public_base_url.into(),
            dummy_hash,
        })
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    /// Identity asserted by a bearer token.
    pub fn validate_token(&self, token: &str) -> AuthResult<Identity> {
        self.codec.validate(token).map(Identity::from)
    }

    /// Create a PENDING account and mail its verification link.
    ///
    /// A delivery failure is returned as `NotificationFailed`; the account is
    /// kept and the link can be re-sent with [`AuthSystem::resend_verification`].
    pub async fn register(&self, request: RegisterRequest) -> AuthResult<Account> {
        let email = normalize_email(&request.email);
        validate_email(&email)?;
        validate_password(&request.password)?;
        let name = validate_name(&request.name)?;
        let role = request.role.unwrap_or(Role::Patient);

        let pending = self.verification.mint(Utc::now());
        let token = pending.token.clone();
        let new_account = NewAccount {
            email: email.clone(),
            password_hash: self.hasher.hash(&request.password)?,
            role,
            enabled: false,
            verification: Some(pending),
        };
        let profile = Profile::for_role(role, name, request.phone_number, DoctorDetails::default());

        let account = match self.store.insert(new_account, Some(profile)).await {
            Ok(account) => account,
            Err(e) => {
                let err = AuthError::from(e);
                self.audit.record(
                    AuditEntry::new(AuditEventType::AccountRegistered)
                        .with_email(&email)
                        .with_error(&err.to_string()),
                );
                return Err(err);
            }
        };

        self.audit.record(
            AuditEntry::new(AuditEventType::AccountRegistered)
                .with_email(&account.email)
                .with_detail(account.role.as_str()),
        );
        info!(email = %account.email, role = %account.role, "registered account pending verification");

        self.send_verification(&account.email, &token).await?;
        Ok(account)
    }

    /// Consume a verification token, moving its account to ACTIVE.
    pub async fn verify(&self, token: &str) -> AuthResult<Account> {
        let account = self
            .store
            .consume_verification_token(token, Utc::now())
            .await?
            .ok_or(AuthError::InvalidVerificationToken)?;

        self.audit
            .record(AuditEntry::new(AuditEventType::AccountVerified).with_email(&account.email));
        info!(email = %account.email, "account verified");
        Ok(account)
    }

    /// Mint a fresh token for a PENDING account and re-send the link.
    ///
    /// Unknown and already-active emails succeed without doing anything, and a
    /// delivery failure is only logged, so the response never reveals whether
    /// the address is registered.
    pub async fn resend_verification(&self, email: &str) -> AuthResult<()> {
        let email = normalize_email(email);
        let account = match self.store.find_by_email(&email).await? {
            Some(account) if !account.enabled => account,
            _ => {
                debug!(email = %email, "verification resend skipped");
                return Ok(());
            }
        };

        let pending = self.verification.mint(Utc::now());
        let token = pending.token.clone();
        if !self.store.reissue_verification(account.id, pending).await? {
            debug!(email = %email, "account activated before resend, skipped");
            return Ok(());
        }

        if let Err(e) = self.send_verification(&account.email, &token).await {
            warn!(email = %account.email, error = %e, "verification resend failed");
        }
        Ok(())
    }

    pub async fn login(&self, email: &str, password: &str) -> AuthResult<LoginOutcome> {
        let email = normalize_email(email);

        let account = match self.store.find_by_email(&email).await? {
            Some(account) if self.hasher.verify(password, &account.password_hash) => account,
            Some(_) => return Err(self.login_failed(&email, "wrong password")),
            None => {
                let _ = self.hasher.verify(password, &self.dummy_hash);
                return Err(self.login_failed(&email, "unknown email"));
            }
        };

        if !account.enabled {
            self.audit.log_auth_failure(&email, "account not verified");
            return Err(AuthError::AccountNotVerified);
        }

        let issued = self.codec.issue(&account.email, account.role)?;

        if let Err(e) = self.store.record_login(account.id, Utc::now()).await {
            warn!(email = %email, error = %e, "failed to record last login");
        }

        self.audit.log_auth_success(&email);
        Ok(LoginOutcome {
            token: issued.token,
            role: account.role,
            expires_at: issued.expires_at,
        })
    }

    /// Create an ACTIVE account with a generated password.
    pub async fn provision(
        &self,
        request: ProvisionRequest,
        delivery: CredentialDelivery,
    ) -> AuthResult<Provisioned> {
        let email = normalize_email(&request.email);
        validate_email(&email)?;
        let name = validate_name(&request.name)?;

        let password = generate_password();
        let profile = Profile::for_role(request.role, name, request.phone_number, request.doctor);
        let account = self
            .store
            .insert(
                NewAccount {
                    email,
                    password_hash: self.hasher.hash(&password)?,
                    role: request.role,
                    enabled: true,
                    verification: None,
                },
                Some(profile),
            )
            .await?;

        self.audit.record(
            AuditEntry::new(AuditEventType::AccountProvisioned)
                .with_email(&account.email)
                .with_detail(account.role.as_str()),
        );
        info!(email = %account.email, role = %account.role, "provisioned account");

        let mut notification_failed = false;
        if delivery == CredentialDelivery::Email {
            let body = welcome_body(&account.email, &password);
            if let Err(e) = self.notifier.send(&account.email, WELCOME_SUBJECT, &body).await {
                warn!(email = %account.email, error = %e, "account created but welcome mail failed");
                self.audit.record(
                    AuditEntry::new(AuditEventType::NotificationFailed)
                        .with_email(&account.email)
                        .with_error(&e.to_string()),
                );
                notification_failed = true;
            }
        }

        Ok(Provisioned {
            account,
            password,
            notification_failed,
        })
    }

    /// Create the first administrator when none exists and one is configured.
    pub async fn bootstrap_admin(&self, settings: &BootstrapSettings) -> AuthResult<Option<Account>> {
        if self.store.first_admin().await?.is_some() {
            return Ok(None);
        }

        let Some(email) = settings.admin_email.as_deref() else {
            warn!("no administrator account exists and bootstrap.admin_email is not set");
            return Ok(None);
        };
        let email = normalize_email(email);
        validate_email(&email)?;
        let name = validate_name(&settings.admin_name)?;

        let (password, generated) = match &settings.admin_password {
            Some(password) => {
                validate_password(password)?;
                (password.clone(), false)
            }
            None => (generate_password(), true),
        };

        let profile = Profile::for_role(Role::Admin, name, None, DoctorDetails::default());
        let account = self
            .store
            .insert(
                NewAccount {
                    email,
                    password_hash: self.hasher.hash(&password)?,
                    role: Role::Admin,
                    enabled: true,
                    verification: None,
                },
                Some(profile),
            )
            .await?;

        self.audit.record(
            AuditEntry::new(AuditEventType::AccountProvisioned)
                .with_email(&account.email)
                .with_detail("bootstrap administrator"),
        );
        if generated {
            warn!(
                email = %account.email,
                password = %password,
                "created bootstrap administrator with a generated password; change it immediately"
            );
        } else {
            info!(email = %account.email, "created bootstrap administrator");
        }

        Ok(Some(account))
    }

    async fn send_verification(&self, email: &str, token: &str) -> AuthResult<()> {
        let link = verification_link(&self.public_base_url, token);
        if let Err(e) = self
            .notifier
            .send(email, VERIFICATION_SUBJECT, &verification_body(&link))
            .await
        {
            self.audit.record(
                AuditEntry::new(AuditEventType::NotificationFailed)
                    .with_email(email)
                    .with_error(&e.to_string()),
            );
            return Err(AuthError::NotificationFailed(e));
        }
        Ok(())
    }

    fn login_failed(&self, email: &str, reason: &str) -> AuthError {
        self.audit.log_auth_failure(email, reason);
        AuthError::InvalidCredentials
    }
}

fn minutes(value: u64) -> AuthResult<Duration> {
    i64::try_from(value)
        .ok()
        .and_then(Duration::try_minutes)
        .ok_or_else(|| AuthError::InvalidInput(format!("duration of {} minutes is out of range", value)))
}

pub fn validate_email(email: &str) -> AuthResult<()> {
    if EMAIL_RE.is_match(email) {
        Ok(())
    } else {
        Err(AuthError::InvalidInput("a valid email address is required".to_string()))
    }
}

pub fn validate_password(password: &str) -> AuthResult<()> {
    if password.chars().count() >= MIN_PASSWORD_LEN {
        Ok(())
    } else {
        Err(AuthError::InvalidInput(format!(
            "password must be at least {} characters long",
            MIN_PASSWORD_LEN
        )))
    }
}

pub fn validate_name(name: &str) -> AuthResult<&str> {
    let name = name.trim();
    if name.is_empty() {
        Err(AuthError::InvalidInput("name is required".to_string()))
    } else {
        Ok(name)
    }
}

/// Random password for staff-created accounts.
pub fn generate_password() -> String {
    let mut rng = rand::thread_rng();
    (0..GENERATED_PASSWORD_LEN)
        .map(|_| GENERATED_PASSWORD_CHARS[rng.gen_range(0..GENERATED_PASSWORD_CHARS.len())] as char)
        .collect()
}

fn welcome_body(email: &str, password: &str) -> String {
    format!(
        "Hello,\n\nYour account has been created.\n\nEmail: {}\nPassword: {}\n\nPlease log in and change your password.\n\nAspatal Team",
        email, password
    )
}
