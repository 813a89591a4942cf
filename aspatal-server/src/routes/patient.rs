use aspatal_core::clinic::{
    Appointment, BookingInput, BookingRequest, DoctorSummary, MemberView, Prescription,
};
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use http::StatusCode;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::extract::{Body, Caller};
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/patient/booking-requests",
            get(my_bookings).post(request_booking),
        )
        .route("/api/patient/prescriptions", get(prescriptions))
        .route("/api/patient/medical-history", get(medical_history))
        .route("/api/patient/doctors", get(doctors))
        .route("/api/patient/profile", get(profile).delete(delete_profile))
}

async fn request_booking(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Body(input): Body<BookingInput>,
) -> ApiResult<(StatusCode, Json<BookingRequest>)> {
    let booking = state.clinic.request_booking(&identity, input).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

async fn my_bookings(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> ApiResult<Json<Vec<BookingRequest>>> {
    Ok(Json(state.clinic.my_bookings(&identity).await?))
}

async fn prescriptions(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> ApiResult<Json<Vec<Prescription>>> {
    Ok(Json(state.clinic.my_prescriptions(&identity).await?))
}

async fn medical_history(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> ApiResult<Json<Vec<Appointment>>> {
    Ok(Json(state.clinic.medical_history(&identity).await?))
}

async fn doctors(State(state): State<AppState>) -> ApiResult<Json<Vec<DoctorSummary>>> {
    Ok(Json(state.clinic.doctors().await?))
}

async fn profile(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> ApiResult<Json<MemberView>> {
    Ok(Json(state.clinic.patient_profile(&identity).await?))
}

async fn delete_profile(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> ApiResult<Json<Value>> {
    state.clinic.delete_own_record(&identity).await?;
    Ok(Json(json!({ "message": "Patient record deleted successfully" })))
}
