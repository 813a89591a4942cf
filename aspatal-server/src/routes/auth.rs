use aspatal_core::auth::{Identity, LoginOutcome, RegisterRequest};
use aspatal_core::Role;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::extract::{Body, Caller, Params};
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/verify", get(verify))
        .route("/api/auth/resend-verification", post(resend_verification))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
}

async fn register(
    State(state): State<AppState>,
    Body(request): Body<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    // Staff accounts are provisioned by an administrator.
    if matches!(request.role, Some(role) if role != Role::Patient) {
        return Err(ApiError::bad_request("only PATIENT accounts can self-register"));
    }

    let account = state.auth.register(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Registration successful. Check your email to verify your account.",
            "account": account,
        })),
    ))
}

#[derive(Debug, Deserialize)]
struct VerifyParams {
    token: String,
}

async fn verify(
    State(state): State<AppState>,
    Params(params): Params<VerifyParams>,
) -> ApiResult<Json<Value>> {
    let account = state.auth.verify(&params.token).await?;
    Ok(Json(json!({
        "message": "Email verified successfully",
        "email": account.email,
    })))
}

#[derive(Debug, Deserialize)]
struct ResendRequest {
    email: String,
}

async fn resend_verification(
    State(state): State<AppState>,
    Body(request): Body<ResendRequest>,
) -> ApiResult<Json<Value>> {
    state.auth.resend_verification(&request.email).await?;
    Ok(Json(json!({
        "message": "If the account is awaiting verification, a new link has been sent.",
    })))
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    Body(request): Body<LoginRequest>,
) -> ApiResult<Json<LoginOutcome>> {
    let outcome = state.auth.login(&request.email, &request.password).await?;
    Ok(Json(outcome))
}

async fn me(Caller(identity): Caller) -> Json<Identity> {
    Json(identity)
}
