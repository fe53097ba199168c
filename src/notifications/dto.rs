use bytes::Bytes;
use uuid::Uuid;

/// Text fields of the multipart notification upload; the optional
/// image part is carried separately as [`UploadedImage`].
#[derive(Debug, Clone)]
pub struct NewNotificationRequest {
    pub device_id: Uuid,
    pub device_type: String,
    pub object_label: Option<String>,
    pub risk_level: Option<String>,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub filename: String,
    pub content_type: String,
    pub bytes: Bytes,
}
