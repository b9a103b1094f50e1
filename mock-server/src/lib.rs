//! In-memory stand-in for the school-management REST API.
//!
//! Serves everything under `/api` with the same paths, status codes and
//! `{"detail": ...}` error bodies as the real service. State lives in a
//! single `RwLock`ed `Store`; a fresh `app()` starts with only the seeded
//! admin account.

mod admin;
mod auth;
mod roles;
pub mod store;

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;

pub use store::{Store, User, ADMIN_EMAIL, ADMIN_PASSWORD};

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    Router::new()
        .nest(
            "/api",
            auth::routes()
                .merge(admin::routes())
                .merge(roles::routes()),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Error response in the `{"detail": "..."}` shape.
#[derive(Debug)]
pub struct ApiFailure {
    pub status: StatusCode,
    pub detail: String,
}

impl ApiFailure {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }

    pub fn forbidden(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, detail)
    }

    pub fn not_found(resource: &str) -> Self {
        Self::new(
            StatusCode::NOT_FOUND,
            format!("{} not found", store::singular(resource)),
        )
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Could not validate credentials")
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

/// The user behind the request's bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl AuthUser {
    pub fn require_role(&self, role: &str) -> Result<(), ApiFailure> {
        if self.0.role == role {
            Ok(())
        } else {
            Err(ApiFailure::forbidden("Not enough permissions"))
        }
    }
}

impl FromRequestParts<Db> for AuthUser {
    type Rejection = ApiFailure;

    async fn from_request_parts(parts: &mut Parts, db: &Db) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or_else(ApiFailure::unauthorized)?;
        let store = db.read().await;
        store
            .user_for_token(token)
            .cloned()
            .map(AuthUser)
            .ok_or_else(ApiFailure::unauthorized)
    }
}

/// Accept only JSON objects as request bodies.
pub(crate) fn object(body: Value) -> Result<Map<String, Value>, ApiFailure> {
    match body {
        Value::Object(fields) => Ok(fields),
        _ => Err(ApiFailure::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Request body must be a JSON object",
        )),
    }
}
