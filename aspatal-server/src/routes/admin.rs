use aspatal_core::auth::{AccountId, AuditEntry};
use aspatal_core::clinic::{EmployeeRequest, MemberView};
use axum::extract::{Path, State};
use axum::routing::{delete, get};
use axum::{Json, Router};
use http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::extract::{Body, Params};
use crate::server::AppState;

const DEFAULT_AUDIT_LIMIT: usize = 100;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/admin/employees", get(list_employees).post(add_employee))
        .route(
            "/api/admin/employees/{id}",
            get(get_employee).put(update_employee).delete(delete_employee),
        )
        .route("/api/admin/employees/role/{role}", get(employees_by_role))
        .route("/api/admin/patients", get(list_patients))
        .route("/api/admin/patients/{id}", delete(delete_patient))
        .route("/api/admin/audit", get(audit))
}

async fn add_employee(
    State(state): State<AppState>,
    Body(request): Body<EmployeeRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let provisioned = state.clinic.add_employee(request).await?;
    let message = if provisioned.notification_failed {
        "Employee added, but the welcome email could not be sent"
    } else {
        "Employee added successfully"
    };
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": message,
            "account": provisioned.account,
            "notification_failed": provisioned.notification_failed,
        })),
    ))
}

async fn list_employees(State(state): State<AppState>) -> ApiResult<Json<Vec<MemberView>>> {
    Ok(Json(state.clinic.list_employees().await?))
}

async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
) -> ApiResult<Json<MemberView>> {
    Ok(Json(state.clinic.employee(id).await?))
}

async fn employees_by_role(
    State(state): State<AppState>,
    Path(role): Path<String>,
) -> ApiResult<Json<Vec<MemberView>>> {
    Ok(Json(state.clinic.employees_by_role(&role).await?))
}

async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
    Body(request): Body<EmployeeRequest>,
) -> ApiResult<Json<MemberView>> {
    Ok(Json(state.clinic.update_employee(id, request).await?))
}

async fn delete_employee(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
) -> ApiResult<Json<Value>> {
    state.clinic.delete_employee(id).await?;
    Ok(Json(json!({ "message": "Employee deleted successfully" })))
}

async fn list_patients(State(state): State<AppState>) -> ApiResult<Json<Vec<MemberView>>> {
    Ok(Json(state.clinic.list_patients().await?))
}

async fn delete_patient(
    State(state): State<AppState>,
    Path(id): Path<AccountId>,
) -> ApiResult<Json<Value>> {
    state.clinic.delete_patient(id).await?;
    Ok(Json(json!({ "message": "Patient deleted successfully" })))
}

#[derive(Debug, Deserialize)]
struct AuditParams {
    limit: Option<usize>,
}

async fn audit(
    State(state): State<AppState>,
    Params(params): Params<AuditParams>,
) -> Json<Vec<AuditEntry>> {
    let limit = params.limit.unwrap_or(DEFAULT_AUDIT_LIMIT);
    Json(state.auth.audit().recent(limit))
}
