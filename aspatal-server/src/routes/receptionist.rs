use aspatal_core::clinic::{Appointment, BookingRequest, MemberView, PatientRegistration, RecordId};
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::extract::Body;
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/receptionist/patients",
            get(list_patients).post(register_patient),
        )
        .route("/api/receptionist/booking-requests", get(pending_bookings))
        .route(
            "/api/receptionist/booking-requests/{id}/approve",
            post(approve_booking),
        )
        .route(
            "/api/receptionist/booking-requests/{id}/reject",
            post(reject_booking),
        )
}

async fn list_patients(State(state): State<AppState>) -> ApiResult<Json<Vec<MemberView>>> {
    Ok(Json(state.clinic.list_patients().await?))
}

/// The generated password is returned so the front desk can hand it over.
async fn register_patient(
    State(state): State<AppState>,
    Body(request): Body<PatientRegistration>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let provisioned = state.clinic.register_patient(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Patient registered successfully",
            "account": provisioned.account,
            "password": provisioned.password,
        })),
    ))
}

async fn pending_bookings(State(state): State<AppState>) -> ApiResult<Json<Vec<BookingRequest>>> {
    Ok(Json(state.clinic.pending_bookings().await?))
}

async fn approve_booking(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<Json<Appointment>> {
    Ok(Json(state.clinic.approve_booking(id).await?))
}

async fn reject_booking(
    State(state): State<AppState>,
    Path(id): Path<RecordId>,
) -> ApiResult<Json<BookingRequest>> {
    Ok(Json(state.clinic.reject_booking(id).await?))
}
