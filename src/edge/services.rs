use std::sync::Arc;

use time::{Duration, OffsetDateTime};
use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{
    DeviceConfigEntry, DeviceList, DeviceRequest, EdgeProvisioned, InvitationCode,
    SensorReadingRequest,
};
use super::model::{
    Device, EdgeSummary, Membership, ModelKind, NewDevice, Role, SensorData, SensorReading,
};
use super::repo::{DeviceDetails, EdgeRepository, NewEdgeServer};
use crate::auth::claims::Principal;
use crate::auth::jwt::JwtKeys;
use crate::auth::repo::UserRepository;
use crate::mqtt::MqttPublisher;
use crate::response::{ServiceError, ServiceResult};
use crate::util::random_alphanumeric;

const INVITATION_TTL: Duration = Duration::minutes(5);
const SYNC_CONFIG_COMMAND: &str = "/syncEdgeConfig";

/// Membership gate shared by every edge-scoped operation. A missing
/// row is flattened into `Unauthorized`, so a caller cannot tell a
/// foreign edge server from a nonexistent one.
pub(crate) async fn require_membership(
    users: &dyn UserRepository,
    user_id: Uuid,
    edge_server_id: Uuid,
) -> ServiceResult<Role> {
    match users.membership(user_id, edge_server_id).await? {
        Some(membership) => Ok(membership.role_id),
        None => Err(ServiceError::Unauthorized),
    }
}

/// Edge-server lifecycle, device configuration orchestration, the
/// invitation engine and sensor-data ingestion.
pub struct EdgeService {
    repo: Arc<dyn EdgeRepository>,
    users: Arc<dyn UserRepository>,
    mqtt: Arc<dyn MqttPublisher>,
    jwt: JwtKeys,
}

impl EdgeService {
    pub fn new(
        repo: Arc<dyn EdgeRepository>,
        users: Arc<dyn UserRepository>,
        mqtt: Arc<dyn MqttPublisher>,
        jwt: JwtKeys,
    ) -> Self {
        Self {
            repo,
            users,
            mqtt,
            jwt,
        }
    }

    /// Registers a gateway: fresh MQTT credential bundle, edge row plus
    /// Admin membership for the creator, and a permanent edge-scoped
    /// token the gateway will use as its device credential.
    pub async fn add_edge_server(
        &self,
        principal: &Principal,
        name: String,
        vendor: Option<String>,
        description: Option<String>,
    ) -> ServiceResult<EdgeProvisioned> {
        let user = principal.user();

        let new = NewEdgeServer {
            name,
            vendor,
            description,
            mqtt_user: format!("{}-{}", random_alphanumeric(6), user.email),
            mqtt_password: random_alphanumeric(12),
            mqtt_pub_topic: format!("pub-{}", random_alphanumeric(6)),
            mqtt_sub_topic: format!("sub-{}", random_alphanumeric(6)),
        };

        let edge = self.repo.store_edge(user.user_id, new).await?;
        let edge_access_token = self.jwt.sign_edge(user, edge.id)?;

        info!(edge_server_id = %edge.id, user_id = %user.user_id, "edge server registered");
        Ok(EdgeProvisioned {
            edge_server_id: edge.id,
            mqtt_user: edge.mqtt_user,
            mqtt_password: edge.mqtt_password,
            mqtt_pub_topic: edge.mqtt_pub_topic,
            mqtt_sub_topic: edge.mqtt_sub_topic,
            edge_access_token,
        })
    }

    pub async fn fetch_edge_servers(
        &self,
        principal: &Principal,
    ) -> ServiceResult<Vec<EdgeSummary>> {
        self.repo.fetch_edges(principal.user_id()).await
    }

    /// Issues a fresh invitation code. Admin only; a new code silently
    /// replaces any previous one for the same edge server.
    pub async fn create_invitation(
        &self,
        principal: &Principal,
        edge_server_id: Uuid,
    ) -> ServiceResult<InvitationCode> {
        let role =
            require_membership(self.users.as_ref(), principal.user_id(), edge_server_id).await?;
        if role != Role::Admin {
            return Err(ServiceError::Unauthorized);
        }

        let code = random_alphanumeric(12);
        let expires_at = OffsetDateTime::now_utc() + INVITATION_TTL;
        self.repo
            .update_invitation(edge_server_id, &code, expires_at)
            .await?
            .ok_or(ServiceError::NotFound)?;

        Ok(InvitationCode {
            invitation_code: code,
        })
    }

    /// Joins the edge server an invitation code belongs to. The code is
    /// shared: it stays valid for further users until it expires or is
    /// replaced.
    pub async fn join_invitation(
        &self,
        principal: &Principal,
        invitation_code: &str,
    ) -> ServiceResult<Membership> {
        let edge = self
            .repo
            .find_by_invitation_code(invitation_code)
            .await?
            .ok_or(ServiceError::InvitationInvalid("invitation code invalid"))?;

        let expired = edge
            .invitation_expired_at
            .map(|t| t < OffsetDateTime::now_utc())
            .unwrap_or(true);
        if expired {
            return Err(ServiceError::InvitationExpired);
        }

        let user_id = principal.user_id();
        if self.users.membership(user_id, edge.id).await?.is_some() {
            return Err(ServiceError::InvitationInvalid(
                "you have already joined this group",
            ));
        }

        self.users.add_membership(user_id, edge.id, Role::Member).await
    }

    /// Persists a new device, then tells the gateway to re-pull its
    /// config. A failed publish after a successful persist is surfaced
    /// to the caller; the stored row is kept (no compensation).
    pub async fn add_device(
        &self,
        _principal: &Principal,
        edge_server_id: Uuid,
        req: DeviceRequest,
    ) -> ServiceResult<Device> {
        let new = parse_device_fields(req).map_err(ServiceError::AddDevice)?;

        let topics = self
            .repo
            .mqtt_topics(edge_server_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        let device = self.repo.store_device(edge_server_id, new).await?;

        if let Err(e) = self.mqtt.publish(&topics.mqtt_pub_topic, SYNC_CONFIG_COMMAND).await {
            warn!(
                edge_server_id = %edge_server_id,
                device_id = %device.id,
                error = %e,
                "device stored but config sync publish failed"
            );
            return Err(e);
        }

        Ok(device)
    }

    /// Same save-then-publish shape as `add_device`, against an
    /// existing device.
    pub async fn update_device_config(
        &self,
        _principal: &Principal,
        edge_server_id: Uuid,
        device_id: Uuid,
        req: DeviceRequest,
    ) -> ServiceResult<()> {
        let new = parse_device_fields(req).map_err(ServiceError::UpdateDevice)?;

        let topics = self
            .repo
            .mqtt_topics(edge_server_id)
            .await?
            .ok_or(ServiceError::NotFound)?;

        self.repo
            .update_device(device_id, new)
            .await?
            .ok_or(ServiceError::NotFound)?;

        if let Err(e) = self.mqtt.publish(&topics.mqtt_pub_topic, SYNC_CONFIG_COMMAND).await {
            warn!(
                edge_server_id = %edge_server_id,
                device_id = %device_id,
                error = %e,
                "device updated but config sync publish failed"
            );
            return Err(e);
        }

        Ok(())
    }

    pub async fn restart_device(
        &self,
        _principal: &Principal,
        edge_server_id: Uuid,
        process_index: i32,
    ) -> ServiceResult<()> {
        self.publish_control(edge_server_id, &format!("/restartDevice {process_index}"))
            .await
    }

    pub async fn start_device(
        &self,
        _principal: &Principal,
        edge_server_id: Uuid,
        process_index: i32,
    ) -> ServiceResult<()> {
        self.publish_control(edge_server_id, &format!("/startDevice {process_index}"))
            .await
    }

    /// Fire-and-forget control command. Only the local publish result
    /// is observable; nothing is persisted.
    async fn publish_control(&self, edge_server_id: Uuid, command: &str) -> ServiceResult<()> {
        let topics = self
            .repo
            .mqtt_topics(edge_server_id)
            .await?
            .ok_or(ServiceError::NotFound)?;
        self.mqtt
            .publish(&topics.mqtt_pub_topic, command)
            .await
            .map_err(|e| ServiceError::DeviceControl(e.to_string()))
    }

    pub async fn fetch_devices(
        &self,
        principal: &Principal,
        edge_server_id: Uuid,
    ) -> ServiceResult<DeviceList> {
        require_membership(self.users.as_ref(), principal.user_id(), edge_server_id).await?;
        let (edge, devices) = self
            .repo
            .fetch_edge_with_devices(principal.user_id(), edge_server_id)
            .await?
            .ok_or(ServiceError::Unauthorized)?;
        Ok(DeviceList {
            edge_server_id: edge.id,
            name: edge.name,
            devices,
        })
    }

    /// Self-description for the gateway itself: requires an edge-scoped
    /// token and returns the denormalized per-device config.
    pub async fn fetch_devices_config(
        &self,
        principal: &Principal,
    ) -> ServiceResult<Vec<DeviceConfigEntry>> {
        let ctx = principal.require_device()?;

        let Some((edge, devices)) = self
            .repo
            .fetch_edge_with_devices(ctx.user.user_id, ctx.edge_server_id)
            .await?
        else {
            return Ok(Vec::new());
        };

        let mut entries = Vec::with_capacity(devices.len());
        for d in devices {
            // Indices are validated on write; a miss here means the
            // stored row predates the current model table.
            let model = ModelKind::from_index(d.assigned_model_type).ok_or_else(|| {
                ServiceError::DeviceConfig(format!(
                    "unknown model index {}",
                    d.assigned_model_type
                ))
            })?;
            entries.push(DeviceConfigEntry {
                device_id: d.id,
                device_vendor_name: d.vendor_name,
                edge_server_name: edge.name.clone(),
                kind: d.kind,
                source_type: d.source_type,
                source_address: d.source_address,
                assigned_model_type: model.as_str().to_string(),
                assigned_model_index: d.assigned_model_index,
                additional_info: d.additional_info,
            });
        }
        Ok(entries)
    }

    /// Device view for members. A miss here is a real 404, distinct
    /// from the membership gate's 403.
    pub async fn view_device(
        &self,
        principal: &Principal,
        edge_server_id: Uuid,
        device_id: Uuid,
    ) -> ServiceResult<DeviceDetails> {
        require_membership(self.users.as_ref(), principal.user_id(), edge_server_id).await?;
        self.repo
            .view_device(device_id)
            .await?
            .ok_or(ServiceError::NotFound)
    }

    /// Bulk-ingests readings from a gateway. The token's edge server id
    /// is stamped onto every row; whatever the wire said is discarded.
    pub async fn store_sensor_data(
        &self,
        principal: &Principal,
        device_id: Uuid,
        readings: Vec<SensorReadingRequest>,
    ) -> ServiceResult<u64> {
        let ctx = principal.require_device()?;

        let rows: Vec<SensorReading> = readings
            .into_iter()
            .map(|r| SensorReading {
                edge_server_id: ctx.edge_server_id,
                device_id,
                data_measured: r.data_measured,
                inference_label_status: r.inference_label_status,
                captured_at: r.captured_at,
            })
            .collect();

        self.repo.store_sensor_data(rows).await
    }

    pub async fn read_sensor_data(
        &self,
        principal: &Principal,
        edge_server_id: Uuid,
        device_id: Option<Uuid>,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> ServiceResult<Vec<SensorData>> {
        require_membership(self.users.as_ref(), principal.user_id(), edge_server_id).await?;
        if start > end {
            return Err(ServiceError::InvalidDateRange);
        }
        self.repo
            .read_sensor_data(edge_server_id, device_id, start, end)
            .await
    }
}

/// Closed-enum validation, run before any I/O. The model index is
/// bounds-checked against the model table as well.
fn parse_device_fields(req: DeviceRequest) -> Result<NewDevice, String> {
    let kind = super::model::DeviceKind::parse(&req.kind)
        .ok_or_else(|| "invalid device type".to_string())?;
    let source_type = super::model::SourceKind::parse(&req.source_type)
        .ok_or_else(|| "invalid device source type".to_string())?;
    ModelKind::from_index(req.assigned_model_type)
        .ok_or_else(|| "invalid assigned model type".to_string())?;

    Ok(NewDevice {
        vendor_name: req.vendor_name,
        vendor_number: req.vendor_number,
        kind,
        source_type,
        source_address: req.source_address,
        assigned_model_type: req.assigned_model_type,
        assigned_model_index: req.assigned_model_index,
        additional_info: req.additional_info,
    })
}
