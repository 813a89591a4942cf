use aspatal_core::auth::AccountId;
use aspatal_core::clinic::{Appointment, MemberView, PatientSummary, Prescription, RecordId};
use axum::extract::{Path, State};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::NaiveDate;
use http::StatusCode;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extract::{Body, Caller, Params};
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/doctor/appointments", get(appointments))
        .route("/api/doctor/appointments/{id}/status", put(update_status))
        .route("/api/doctor/patients", get(assigned_patients))
        .route("/api/doctor/patients/{id}/history", get(visit_history))
        .route("/api/doctor/patients/{id}/prescriptions", get(patient_prescriptions))
        .route("/api/doctor/prescriptions", post(create_prescription))
        .route("/api/doctor/profile", get(profile))
}

#[derive(Debug, Deserialize)]
struct DateFilter {
    date: Option<NaiveDate>,
}

async fn appointments(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Params(filter): Params<DateFilter>,
) -> ApiResult<Json<Vec<Appointment>>> {
    Ok(Json(
        state
            .clinic
            .doctor_appointments(&identity, filter.date)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
struct StatusUpdate {
    status: String,
}

async fn update_status(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path(id): Path<RecordId>,
    Body(update): Body<StatusUpdate>,
) -> ApiResult<Json<Appointment>> {
    Ok(Json(
        state
            .clinic
            .update_appointment_status(&identity, id, &update.status)
            .await?,
    ))
}

async fn assigned_patients(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> ApiResult<Json<Vec<PatientSummary>>> {
    Ok(Json(state.clinic.assigned_patients(&identity).await?))
}

async fn visit_history(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path(patient_id): Path<AccountId>,
) -> ApiResult<Json<Vec<Appointment>>> {
    Ok(Json(
        state
            .clinic
            .patient_visit_history(&identity, patient_id)
            .await?,
    ))
}

async fn patient_prescriptions(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Path(patient_id): Path<AccountId>,
) -> ApiResult<Json<Vec<Prescription>>> {
    Ok(Json(
        state
            .clinic
            .patient_prescriptions(&identity, patient_id)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
struct PrescriptionInput {
    patient_id: AccountId,
    content: String,
}

async fn create_prescription(
    State(state): State<AppState>,
    Caller(identity): Caller,
    Body(input): Body<PrescriptionInput>,
) -> ApiResult<(StatusCode, Json<Prescription>)> {
    let prescription = state
        .clinic
        .create_prescription(&identity, input.patient_id, &input.content)
        .await?;
    Ok((StatusCode::CREATED, Json(prescription)))
}

async fn profile(
    State(state): State<AppState>,
    Caller(identity): Caller,
) -> ApiResult<Json<MemberView>> {
    Ok(Json(state.clinic.doctor_profile(&identity).await?))
}
