use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Status codes carried in every response envelope. Success is `1`;
/// each failure kind has its own negative code so clients can branch
/// without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum OperationStatus {
    Success = 1,
    RepoError = -1,
    CloudStorageError = -2,
    CloudMessagingError = -3,
    ModelNotFound = -4,
    UnauthorizedAccess = -5,
    FieldValidationError = -6,
    SendEmailError = -7,
    InvalidCredential = -8,
    ModelExists = -10,
    VerificationCodeInvalid = -12,
    JwtGenerateError = -13,
    Unverified = -14,
    AddDeviceError = -18,
    MqttPublishError = -19,
    InvalidEdgeToken = -122,
    InvalidDateRange = -133,
    UpdateDeviceError = -180,
    DeviceConfigError = -181,
    DeviceControlError = -182,
    InvitationCodeInvalid = -185,
    InvitationCodeExpired = -186,
}

impl OperationStatus {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Uniform JSON envelope returned by every endpoint:
/// `{status, statusCode, message, data}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub status: bool,
    pub status_code: i32,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Json<Self> {
        Json(Self {
            status: true,
            status_code: OperationStatus::Success.code(),
            message: "ok".into(),
            data: Some(data),
        })
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Failure taxonomy shared by all services. Membership misses are
/// deliberately flattened into `Unauthorized` so a caller cannot tell
/// "no such edge server" apart from "not a member".
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unauthorized access")]
    Unauthorized,
    #[error("model not found")]
    NotFound,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    AddDevice(String),
    #[error("{0}")]
    UpdateDevice(String),
    #[error("{0}")]
    DeviceConfig(String),
    #[error("{0}")]
    DeviceControl(String),
    #[error("{0}")]
    InvitationInvalid(&'static str),
    #[error("invitation code expired")]
    InvitationExpired,
    #[error("invalid edge token")]
    InvalidEdgeToken,
    #[error("invalid date range")]
    InvalidDateRange,
    #[error("invalid credential")]
    InvalidCredential,
    #[error("user is unverified")]
    Unverified,
    #[error("email already exist")]
    EmailTaken,
    #[error("verification code invalid")]
    VerificationInvalid,
    #[error("failed to generate token")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("mqtt publish failed: {0}")]
    Publish(String),
    #[error("cloud storage error: {0}")]
    Storage(String),
    #[error("cloud messaging error: {0}")]
    Push(String),
    #[error("send email failed: {0}")]
    Email(String),
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<sqlx::Error> for ServiceError {
    fn from(e: sqlx::Error) -> Self {
        ServiceError::Store(anyhow::Error::new(e))
    }
}

impl ServiceError {
    pub fn status(&self) -> OperationStatus {
        match self {
            ServiceError::Unauthorized => OperationStatus::UnauthorizedAccess,
            ServiceError::NotFound => OperationStatus::ModelNotFound,
            ServiceError::Validation(_) => OperationStatus::FieldValidationError,
            ServiceError::AddDevice(_) => OperationStatus::AddDeviceError,
            ServiceError::UpdateDevice(_) => OperationStatus::UpdateDeviceError,
            ServiceError::DeviceConfig(_) => OperationStatus::DeviceConfigError,
            ServiceError::DeviceControl(_) => OperationStatus::DeviceControlError,
            ServiceError::InvitationInvalid(_) => OperationStatus::InvitationCodeInvalid,
            ServiceError::InvitationExpired => OperationStatus::InvitationCodeExpired,
            ServiceError::InvalidEdgeToken => OperationStatus::InvalidEdgeToken,
            ServiceError::InvalidDateRange => OperationStatus::InvalidDateRange,
            ServiceError::InvalidCredential => OperationStatus::InvalidCredential,
            ServiceError::Unverified => OperationStatus::Unverified,
            ServiceError::EmailTaken => OperationStatus::ModelExists,
            ServiceError::VerificationInvalid => OperationStatus::VerificationCodeInvalid,
            ServiceError::Jwt(_) => OperationStatus::JwtGenerateError,
            ServiceError::Publish(_) => OperationStatus::MqttPublishError,
            ServiceError::Storage(_) => OperationStatus::CloudStorageError,
            ServiceError::Push(_) => OperationStatus::CloudMessagingError,
            ServiceError::Email(_) => OperationStatus::SendEmailError,
            ServiceError::Store(_) => OperationStatus::RepoError,
        }
    }

    /// Success maps to 200, misses to 404, membership failures to 403
    /// and every other failure to 400.
    pub fn http_status(&self) -> StatusCode {
        match self {
            ServiceError::Unauthorized => StatusCode::FORBIDDEN,
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> axum::response::Response {
        if let ServiceError::Store(e) = &self {
            error!(error = %e, "store operation failed");
        }
        let body = ApiResponse::<serde_json::Value> {
            status: false,
            status_code: self.status().code(),
            message: self.to_string(),
            data: None,
        };
        (self.http_status(), Json(body)).into_response()
    }
}
