//! Aspatal Server - HTTP surface of the hospital backend
//!
//! The router is exposed as a library so integration tests can drive it
//! without binding a socket.

pub mod error;
pub mod extract;
pub mod gate;
pub mod routes;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use gate::{GateLayer, REQUEST_ID_HEADER};
pub use server::{app, router, serve, AppState};
