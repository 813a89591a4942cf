//! Authorization gate.
//!
//! `GateLayer` wraps the router. For every request it resolves the bearer
//! token into a [`RequestContext`] (anonymous when the token is missing or
//! invalid), checks the route's required [`Access`](aspatal_core::Access)
//! against the policy table, and either rejects with 401/403 or forwards the
//! request with the context in its extensions.

use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use aspatal_core::auth::authorize;
use aspatal_core::{AccessPolicy, AuthSystem, RequestContext};
use axum::body::Body;
use axum::response::{IntoResponse, Response};
use http::{HeaderValue, Request};
use tower::{Layer, Service};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::ApiError;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct GateLayer {
    auth: Arc<AuthSystem>,
    policy: Arc<AccessPolicy>,
}

impl GateLayer {
    pub fn new(auth: Arc<AuthSystem>, policy: Arc<AccessPolicy>) -> Self {
        Self { auth, policy }
    }
}

impl<S> Layer<S> for GateLayer {
    type Service = GateService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GateService {
            inner,
            auth: self.auth.clone(),
            policy: self.policy.clone(),
        }
    }
}

#[derive(Clone)]
pub struct GateService<S> {
    inner: S,
    auth: Arc<AuthSystem>,
    policy: Arc<AccessPolicy>,
}

impl<S> Service<Request<Body>> for GateService<S>
where
    S: Service<Request<Body>, Error = Infallible> + Clone + Send + 'static,
    S::Response: IntoResponse,
    S::Future: Send,
{
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let auth = self.auth.clone();
        let policy = self.policy.clone();

        Box::pin(async move {
            let ctx = resolve_context(&auth, &req);
            let path = req.uri().path().to_string();
            let access = policy.access_for(&path);

            if let Err(err) = authorize(&ctx, access) {
                let email = ctx.identity.as_ref().map(|i| i.email.as_str());
                warn!(
                    request_id = %ctx.request_id,
                    path = %path,
                    required = %access,
                    email = email.unwrap_or("-"),
                    "request rejected by gate"
                );
                auth.audit()
                    .log_authorization_failure(email, &path, &ctx.request_id);
                let resp = ApiError::from(err).into_response();
                return Ok(with_request_id(resp, &ctx.request_id));
            }

            let request_id = ctx.request_id.clone();
            req.extensions_mut().insert(ctx);
            let resp = inner
                .call(req)
                .await
                .unwrap_or_else(|infallible| match infallible {});
            Ok(with_request_id(resp.into_response(), &request_id))
        })
    }
}

/// Build the request context. Invalid tokens are not an error here; routes
/// that need an identity reject the anonymous context.
fn resolve_context(auth: &AuthSystem, req: &Request<Body>) -> RequestContext {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty() && v.len() <= 128)
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let Some(token) = extract_bearer_token(req) else {
        return RequestContext::anonymous(request_id);
    };

    match auth.validate_token(token) {
        Ok(identity) => RequestContext::authenticated(identity, request_id),
        Err(e) => {
            debug!(request_id = %request_id, error = ?e, "bearer token rejected, continuing anonymously");
            RequestContext::anonymous(request_id)
        }
    }
}

/// Extract bearer token from the Authorization header.
fn extract_bearer_token(req: &Request<Body>) -> Option<&str> {
    req.headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn with_request_id(mut resp: Response, request_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        resp.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    resp
}
