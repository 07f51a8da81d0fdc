//! HTTP handlers for registration, login and the user directory.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use roster_core::text::optional_text;
use roster_core::DirectoryEvent;
use roster_store::{RegistrationForm, UserRepo};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::extract::JsonOrForm;
use crate::server::AppState;

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    #[serde(deserialize_with = "optional_text")]
    pub email: Option<String>,
    #[serde(deserialize_with = "optional_text")]
    pub password: Option<String>,
}

/// `POST /users`
pub async fn register(
    State(state): State<AppState>,
    JsonOrForm(form): JsonOrForm<RegistrationForm>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let new_user = form.validate()?;
    let user = UserRepo::new(state.db.clone()).create(new_user)?;
    tracing::info!(user_id = %user.id, email = %user.email, "User registered");

    // Err only means nobody is listening.
    let _ = state
        .directory_tx
        .send(DirectoryEvent::UserCreated(user.summary()));

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "User saved",
            "user": user,
        })),
    ))
}

/// `POST /login`
pub async fn login(
    State(state): State<AppState>,
    JsonOrForm(req): JsonOrForm<LoginRequest>,
) -> Result<Json<Value>, ApiError> {
    let (Some(email), Some(password)) = (
        req.email.filter(|e| !e.is_empty()),
        req.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::BadRequest("Email and Password required".into()));
    };

    let user = UserRepo::new(state.db.clone())
        .find_by_credentials(&email, &password)?
        .ok_or_else(|| ApiError::Unauthorized("Invalid email or password".into()))?;

    tracing::info!(user_id = %user.id, "Login succeeded");
    Ok(Json(json!({
        "success": true,
        "message": "Login successful",
        "user": user,
    })))
}

/// `GET /` and `GET /users`
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let users = UserRepo::new(state.db.clone()).list()?;
    Ok(Json(json!({
        "success": true,
        "users": users,
    })))
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let users = UserRepo::new(state.db.clone()).count()?;
    Ok(Json(json!({
        "status": "healthy",
        "liveUsers": state.lifecycle.live_count(),
        "connections": state.clients.count(),
        "subscribers": state.clients.subscriber_count(),
        "users": users,
    })))
}
