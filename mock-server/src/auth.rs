use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{ApiFailure, AuthUser, Db, User};

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RegisterUser {
    pub email: String,
    pub password: String,
    pub role: String,
}

pub fn routes() -> Router<Db> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/me", get(me))
}

async fn login(State(db): State<Db>, Form(form): Form<LoginForm>) -> Result<Json<Value>, ApiFailure> {
    let token = db
        .write()
        .await
        .issue_token(&form.username, &form.password)
        .ok_or_else(|| ApiFailure::new(StatusCode::UNAUTHORIZED, "Incorrect email or password"))?;
    tracing::info!(user = %form.username, "issued token");
    Ok(Json(json!({ "access_token": token, "token_type": "bearer" })))
}

async fn register(
    State(db): State<Db>,
    Json(input): Json<RegisterUser>,
) -> Result<(StatusCode, Json<User>), ApiFailure> {
    let user = db
        .write()
        .await
        .add_user(&input.email, &input.password, &input.role)?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn me(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}
