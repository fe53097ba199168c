use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::dto::{
    AddDeviceRequest, CreateInvitationRequest, DeviceConfigEntry, DeviceControlRequest,
    DeviceList, EdgeProvisioned, InvitationCode, JoinInvitationRequest, NewEdgeServerRequest,
    ReadSensorDataQuery, StoreSensorDataRequest, StoredCount, UpdateDeviceRequest,
};
use super::model::{Device, EdgeSummary, Membership, SensorData};
use super::repo::DeviceDetails;
use crate::auth::extractors::Auth;
use crate::response::{ApiResponse, ServiceError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/edge-server", post(add_edge_server).get(fetch_edge_servers))
        .route("/edge-server/invitation", post(create_invitation))
        .route("/edge-server/invitation/join", post(join_invitation))
        .route("/edge-server/device", post(add_device).put(update_device))
        .route("/edge-server/device/restart", post(restart_device))
        .route("/edge-server/device/start", post(start_device))
        .route("/edge-server/devices-config", get(fetch_devices_config))
        .route("/edge-server/:edge_server_id/devices", get(fetch_devices))
        .route(
            "/edge-server/:edge_server_id/device/:device_id",
            get(view_device),
        )
        .route("/sensor-data", post(store_sensor_data).get(read_sensor_data))
}

fn require_field(value: &str, name: &str) -> Result<(), ServiceError> {
    if value.trim().is_empty() {
        return Err(ServiceError::Validation(format!("{name} is required")));
    }
    Ok(())
}

#[instrument(skip(state, principal, body))]
async fn add_edge_server(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Json(body): Json<NewEdgeServerRequest>,
) -> Result<Json<ApiResponse<EdgeProvisioned>>, ServiceError> {
    require_field(&body.name, "name")?;
    let data = state
        .edge
        .add_edge_server(&principal, body.name, body.vendor, body.description)
        .await?;
    Ok(ApiResponse::ok(data))
}

#[instrument(skip(state, principal))]
async fn fetch_edge_servers(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> Result<Json<ApiResponse<Vec<EdgeSummary>>>, ServiceError> {
    let data = state.edge.fetch_edge_servers(&principal).await?;
    Ok(ApiResponse::ok(data))
}

#[instrument(skip(state, principal, body))]
async fn create_invitation(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Json(body): Json<CreateInvitationRequest>,
) -> Result<Json<ApiResponse<InvitationCode>>, ServiceError> {
    let data = state
        .edge
        .create_invitation(&principal, body.edge_server_id)
        .await?;
    Ok(ApiResponse::ok(data))
}

#[instrument(skip(state, principal, body))]
async fn join_invitation(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Json(body): Json<JoinInvitationRequest>,
) -> Result<Json<ApiResponse<Membership>>, ServiceError> {
    require_field(&body.invitation_code, "invitation_code")?;
    let data = state
        .edge
        .join_invitation(&principal, &body.invitation_code)
        .await?;
    Ok(ApiResponse::ok(data))
}

#[instrument(skip(state, principal, body))]
async fn add_device(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Json(body): Json<AddDeviceRequest>,
) -> Result<Json<ApiResponse<Device>>, ServiceError> {
    require_field(&body.device.vendor_name, "vendor_name")?;
    require_field(&body.device.vendor_number, "vendor_number")?;
    require_field(&body.device.source_address, "source_address")?;
    let data = state
        .edge
        .add_device(&principal, body.edge_server_id, body.device)
        .await?;
    Ok(ApiResponse::ok(data))
}

#[instrument(skip(state, principal, body))]
async fn update_device(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Json(body): Json<UpdateDeviceRequest>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    require_field(&body.device.vendor_name, "vendor_name")?;
    require_field(&body.device.vendor_number, "vendor_number")?;
    require_field(&body.device.source_address, "source_address")?;
    state
        .edge
        .update_device_config(&principal, body.edge_server_id, body.device_id, body.device)
        .await?;
    Ok(ApiResponse::ok(()))
}

#[instrument(skip(state, principal, body))]
async fn restart_device(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Json(body): Json<DeviceControlRequest>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state
        .edge
        .restart_device(&principal, body.edge_server_id, body.process_index)
        .await?;
    Ok(ApiResponse::ok(()))
}

#[instrument(skip(state, principal, body))]
async fn start_device(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Json(body): Json<DeviceControlRequest>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state
        .edge
        .start_device(&principal, body.edge_server_id, body.process_index)
        .await?;
    Ok(ApiResponse::ok(()))
}

#[instrument(skip(state, principal))]
async fn fetch_devices(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Path(edge_server_id): Path<Uuid>,
) -> Result<Json<ApiResponse<DeviceList>>, ServiceError> {
    let data = state.edge.fetch_devices(&principal, edge_server_id).await?;
    Ok(ApiResponse::ok(data))
}

#[instrument(skip(state, principal))]
async fn fetch_devices_config(
    State(state): State<AppState>,
    Auth(principal): Auth,
) -> Result<Json<ApiResponse<Vec<DeviceConfigEntry>>>, ServiceError> {
    let data = state.edge.fetch_devices_config(&principal).await?;
    Ok(ApiResponse::ok(data))
}

#[instrument(skip(state, principal))]
async fn view_device(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Path((edge_server_id, device_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<ApiResponse<DeviceDetails>>, ServiceError> {
    let data = state
        .edge
        .view_device(&principal, edge_server_id, device_id)
        .await?;
    Ok(ApiResponse::ok(data))
}

#[instrument(skip(state, principal, body))]
async fn store_sensor_data(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Json(body): Json<StoreSensorDataRequest>,
) -> Result<Json<ApiResponse<StoredCount>>, ServiceError> {
    let stored = state
        .edge
        .store_sensor_data(&principal, body.device_id, body.readings)
        .await?;
    Ok(ApiResponse::ok(StoredCount { stored }))
}

#[instrument(skip(state, principal))]
async fn read_sensor_data(
    State(state): State<AppState>,
    Auth(principal): Auth,
    Query(q): Query<ReadSensorDataQuery>,
) -> Result<Json<ApiResponse<Vec<SensorData>>>, ServiceError> {
    let data = state
        .edge
        .read_sensor_data(
            &principal,
            q.edge_server_id,
            q.device_id,
            q.start_date,
            q.end_date,
        )
        .await?;
    Ok(ApiResponse::ok(data))
}
