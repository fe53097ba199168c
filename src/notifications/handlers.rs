use axum::{
    extract::{Multipart, Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{NewNotificationRequest, UploadedImage};
use super::repo::Notification;
use crate::auth::extractors::Auth;
use crate::response::{ApiResponse, ServiceError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/notification", get(fetch_all).post(store))
        .route(
            "/notification/:edge_server_id/:id",
            get(view).delete(delete),
        )
}

/// Multipart intake: text fields plus an optional `image` file part.
#[instrument(skip(state, principal, multipart))]
async fn store(
    State(state): State<AppState>,
    Auth(principal): Auth,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<Notification>>, ServiceError> {
    let mut device_id: Option<Uuid> = None;
    let mut device_type: Option<String> = None;
    let mut object_label: Option<String> = None;
    let mut risk_level: Option<String> = None;
    let mut title: Option<String> = None;
    let mut description: Option<String> = None;
    let mut image: Option<UploadedImage> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::Validation(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "image" => {
                let filename = field.file_name().unwrap_or("image").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServiceError::Validation(e.to_string()))?;
                image = Some(UploadedImage {
                    filename,
                    content_type,
                    bytes,
                });
            }
            _ => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ServiceError::Validation(e.to_string()))?;
                match name.as_str() {
                    "device_id" => {
                        device_id = Some(value.parse().map_err(|_| {
                            ServiceError::Validation("device_id must be a uuid".into())
                        })?)
                    }
                    "device_type" => device_type = Some(value),
                    "object_label" => object_label = Some(value),
                    "risk_level" => risk_level = Some(value),
                    "title" => title = Some(value),
                    "description" => description = Some(value),
                    _ => {}
                }
            }
        }
    }

    let req = NewNotificationRequest {
        device_id: device_id
            .ok_or_else(|| ServiceError::Validation("device_id is required".into()))?,
        device_type: device_type
            .ok_or_else(|| ServiceError::Validation("device_type is required".into()))?,
        object_label,
        risk_level,
        title: title.ok_or_else(|| ServiceError::Validation("title is required".into()))?,
        description,
    };

    let data = state.notifications.store(&principal, req, image).await?;
    Ok(ApiResponse::ok(data))
}

#[instrument(skip(state, principal))]
async fn fetch_all(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> Result<Json<ApiResponse<Vec<Notification>>>, ServiceError> {
    let data = state.notifications.fetch_all(&principal).await?;
    Ok(ApiResponse::ok(data))
}

#[instrument(skip(state, principal))]
async fn view(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Path((edge_server_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<Notification>>, ServiceError> {
    let data = state
        .notifications
        .view(&principal, edge_server_id, id)
        .await?;
    Ok(ApiResponse::ok(data))
}

#[instrument(skip(state, principal))]
async fn delete(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Path((edge_server_id, id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state
        .notifications
        .delete(&principal, edge_server_id, id)
        .await?;
    Ok(ApiResponse::ok(()))
}
