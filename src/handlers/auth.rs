use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::handlers::common::success_response;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /auth/dispatcher-login
#[utoipa::path(
    post,
    path = "/auth/dispatcher-login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Authenticated", body = crate::services::auth::LoginResponse),
        (status = 401, description = "Bad credentials", body = crate::errors::ErrorResponse)
    ),
    tag = "Auth"
)]
pub async fn dispatcher_login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let response = state
        .services
        .auth
        .login(&request.username, &request.password)
        .await?;
    Ok(success_response(response))
}

/// Middleware guarding the dispatch surface: verifies the bearer token and
/// makes the claims available to downstream handlers.
pub async fn require_dispatcher(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ServiceError::Unauthorized("missing bearer token".to_string()))?;

    let claims = state.services.auth.verify_token(token)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
