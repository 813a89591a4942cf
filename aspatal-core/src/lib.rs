//! Aspatal Core - identity, sessions and clinic domain
//!
//! This crate provides the building blocks of the Aspatal hospital backend:
//! - Account lifecycle, email verification and login
//! - HS256 session tokens and the route access policy
//! - Patients, doctors, bookings, appointments, prescriptions and chat
//! - Storage and notification seams with in-memory implementations

pub mod auth;
pub mod clinic;
pub mod config;
pub mod error;
pub mod logging;
pub mod notify;
pub mod store;

pub use auth::{
    Access, AccessPolicy, Account, AccountId, AuditLog, AuthSystem, Identity, RequestContext, Role,
    SessionClaims, TokenCodec,
};
pub use clinic::ClinicService;
pub use config::*;
pub use error::*;
pub use logging::init_logging;
pub use notify::{LogNotifier, Notifier, Outbox};
pub use store::{AccountStore, ClinicStore, MemoryStore, Store, StoreError};
