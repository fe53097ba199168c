use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Group role. Admin is granted to the creator of an edge server,
/// Member to users who join through an invitation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[repr(i16)]
pub enum Role {
    Admin = 1,
    Member = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "device_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Camera,
    Sensor,
}

impl DeviceKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "camera" => Some(Self::Camera),
            "sensor" => Some(Self::Sensor),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "source_kind", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Usb,
    Rtsp,
    Http,
}

impl SourceKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "usb" => Some(Self::Usb),
            "rtsp" => Some(Self::Rtsp),
            "http" => Some(Self::Http),
            _ => None,
        }
    }
}

/// Inference model families, stored as a small index. The index is
/// range-checked on writes; reads resolve it back to the name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    ObjectDetection,
    DataAnalytic,
}

impl ModelKind {
    pub fn from_index(index: i16) -> Option<Self> {
        match index {
            0 => Some(Self::ObjectDetection),
            1 => Some(Self::DataAnalytic),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ObjectDetection => "objectDetection",
            Self::DataAnalytic => "dataAnalytic",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EdgeServer {
    pub id: Uuid,
    pub name: String,
    pub vendor: Option<String>,
    pub description: Option<String>,
    pub mqtt_user: String,
    #[serde(skip_serializing)]
    pub mqtt_password: String,
    pub mqtt_pub_topic: String,
    pub mqtt_sub_topic: String,
    pub invitation_code: Option<String>,
    pub invitation_expired_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EdgeSummary {
    pub id: Uuid,
    pub name: String,
    pub vendor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Device {
    pub id: Uuid,
    pub vendor_name: String,
    pub vendor_number: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    pub source_type: SourceKind,
    pub source_address: String,
    pub assigned_model_type: i16,
    pub assigned_model_index: i16,
    pub additional_info: Option<serde_json::Value>,
    pub created_at: OffsetDateTime,
}

/// Validated device fields, shared by the add and update paths.
#[derive(Debug, Clone)]
pub struct NewDevice {
    pub vendor_name: String,
    pub vendor_number: String,
    pub kind: DeviceKind,
    pub source_type: SourceKind,
    pub source_address: String,
    pub assigned_model_type: i16,
    pub assigned_model_index: i16,
    pub additional_info: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Membership {
    pub user_id: Uuid,
    pub edge_server_id: Uuid,
    pub role_id: Role,
}

#[derive(Debug, Clone, FromRow)]
pub struct MqttTopics {
    pub mqtt_pub_topic: String,
    pub mqtt_sub_topic: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SensorData {
    pub id: Uuid,
    pub edge_server_id: Uuid,
    pub device_id: Uuid,
    pub data_measured: serde_json::Value,
    pub inference_label_status: String,
    pub captured_at: OffsetDateTime,
}

/// A reading as persisted; `edge_server_id` is always stamped from the
/// caller's edge token, never taken from the wire.
#[derive(Debug, Clone)]
pub struct SensorReading {
    pub edge_server_id: Uuid,
    pub device_id: Uuid,
    pub data_measured: serde_json::Value,
    pub inference_label_status: String,
    pub captured_at: OffsetDateTime,
}
