use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{Device, DeviceKind, SourceKind};

#[derive(Debug, Deserialize)]
pub struct NewEdgeServerRequest {
    pub name: String,
    pub vendor: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EdgeProvisioned {
    pub edge_server_id: Uuid,
    pub mqtt_user: String,
    pub mqtt_password: String,
    pub mqtt_pub_topic: String,
    pub mqtt_sub_topic: String,
    pub edge_access_token: String,
}

/// Device fields as submitted; enums arrive as plain strings and are
/// validated in the service before anything touches the store.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceRequest {
    pub vendor_name: String,
    pub vendor_number: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub source_type: String,
    pub source_address: String,
    pub assigned_model_type: i16,
    pub assigned_model_index: i16,
    pub additional_info: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct AddDeviceRequest {
    pub edge_server_id: Uuid,
    #[serde(flatten)]
    pub device: DeviceRequest,
}

#[derive(Debug, Deserialize)]
pub struct UpdateDeviceRequest {
    pub edge_server_id: Uuid,
    pub device_id: Uuid,
    #[serde(flatten)]
    pub device: DeviceRequest,
}

#[derive(Debug, Deserialize)]
pub struct DeviceControlRequest {
    pub edge_server_id: Uuid,
    pub process_index: i32,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvitationRequest {
    pub edge_server_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct InvitationCode {
    pub invitation_code: String,
}

#[derive(Debug, Deserialize)]
pub struct JoinInvitationRequest {
    pub invitation_code: String,
}

#[derive(Debug, Serialize)]
pub struct DeviceList {
    pub edge_server_id: Uuid,
    pub name: String,
    pub devices: Vec<Device>,
}

/// One entry of the gateway's denormalized device config, with the
/// model index resolved to its name.
#[derive(Debug, Serialize)]
pub struct DeviceConfigEntry {
    pub device_id: Uuid,
    pub device_vendor_name: String,
    pub edge_server_name: String,
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    pub source_type: SourceKind,
    pub source_address: String,
    pub assigned_model_type: String,
    pub assigned_model_index: i16,
    pub additional_info: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SensorReadingRequest {
    /// Ignored on ingest; the edge server id always comes from the token.
    #[serde(default)]
    pub edge_server_id: Option<Uuid>,
    pub data_measured: serde_json::Value,
    pub inference_label_status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
}

#[derive(Debug, Deserialize)]
pub struct StoreSensorDataRequest {
    pub device_id: Uuid,
    pub readings: Vec<SensorReadingRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ReadSensorDataQuery {
    pub edge_server_id: Uuid,
    pub device_id: Option<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub start_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub end_date: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct StoredCount {
    pub stored: u64,
}
