//! HTTP route table. Paths are declared in full so the gate sees the same
//! path the policy table is written against.

mod admin;
mod auth;
mod chat;
mod doctor;
mod patient;
mod receptionist;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(auth::routes())
        .merge(admin::routes())
        .merge(receptionist::routes())
        .merge(doctor::routes())
        .merge(patient::routes())
        .merge(chat::routes())
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
