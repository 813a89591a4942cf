//! Clinic domain: profiles, bookings, appointments, prescriptions and chat.
//!
//! Every operation takes the caller's [`Identity`](crate::auth::Identity)
//! explicitly; route-level role checks have already been applied by the
//! authorization gate.

pub mod appointment;
pub mod chat;
pub mod prescription;
pub mod profile;
pub mod service;

pub use appointment::*;
pub use chat::*;
pub use prescription::*;
pub use profile::*;
pub use service::*;
