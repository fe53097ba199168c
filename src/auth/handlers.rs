use axum::{
    extract::State,
    routing::{get, patch, post},
    Json, Router,
};
use tracing::instrument;

use super::dto::{
    LoginRequest, LoginResponse, PublicUser, SignUpRequest, UpdateFcmTokenRequest, VerifyRequest,
};
use super::extractors::Auth;
use crate::response::{ApiResponse, ServiceError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/verify", post(verify))
        .route("/auth/login", post(login))
        .route("/user/profile", get(profile))
        .route("/user/fcm-token", patch(update_fcm_token))
}

#[instrument(skip(state, body))]
async fn sign_up(
    State(state): State<AppState>,
    Json(body): Json<SignUpRequest>,
) -> Result<Json<ApiResponse<PublicUser>>, ServiceError> {
    if body.username.trim().is_empty() {
        return Err(ServiceError::Validation("username is required".into()));
    }
    let data = state.auth.sign_up(body).await?;
    Ok(ApiResponse::ok(data))
}

#[instrument(skip(state, body))]
async fn verify(
    State(state): State<AppState>,
    Json(body): Json<VerifyRequest>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state
        .auth
        .verify(&body.email, &body.verification_code)
        .await?;
    Ok(ApiResponse::ok(()))
}

#[instrument(skip(state, body))]
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ServiceError> {
    let data = state.auth.login(&body.email, &body.password).await?;
    Ok(ApiResponse::ok(data))
}

#[instrument(skip(state, principal))]
async fn profile(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> Result<Json<ApiResponse<PublicUser>>, ServiceError> {
    let data = state.auth.profile(&principal).await?;
    Ok(ApiResponse::ok(data))
}

#[instrument(skip(state, principal, body))]
async fn update_fcm_token(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Json(body): Json<UpdateFcmTokenRequest>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state
        .auth
        .update_fcm_token(&principal, &body.fcm_registration_token)
        .await?;
    Ok(ApiResponse::ok(()))
}
