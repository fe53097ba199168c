use axum::async_trait;
use serde::Serialize;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::model::{
    Device, EdgeServer, EdgeSummary, MqttTopics, NewDevice, Role, SensorData, SensorReading,
};
use crate::notifications::repo::Notification;
use crate::response::ServiceResult;

#[derive(Debug, Clone)]
pub struct NewEdgeServer {
    pub name: String,
    pub vendor: Option<String>,
    pub description: Option<String>,
    pub mqtt_user: String,
    pub mqtt_password: String,
    pub mqtt_pub_topic: String,
    pub mqtt_sub_topic: String,
}

/// A device joined with its owning edge server and open notifications.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceDetails {
    pub device: Device,
    pub edge_server: EdgeSummary,
    pub notifications: Vec<Notification>,
}

/// Edge-server records, their devices and the sensor-data stream.
/// Lookup misses are `None`; only real store faults become errors.
#[async_trait]
pub trait EdgeRepository: Send + Sync {
    /// Persists the edge server and the creator's Admin membership in
    /// one transaction.
    async fn store_edge(&self, owner_id: Uuid, new: NewEdgeServer) -> ServiceResult<EdgeServer>;
    async fn mqtt_topics(&self, edge_server_id: Uuid) -> ServiceResult<Option<MqttTopics>>;
    async fn fetch_edges(&self, user_id: Uuid) -> ServiceResult<Vec<EdgeSummary>>;
    /// Edge server plus its devices, visible only through an existing
    /// membership of `user_id`.
    async fn fetch_edge_with_devices(
        &self,
        user_id: Uuid,
        edge_server_id: Uuid,
    ) -> ServiceResult<Option<(EdgeServer, Vec<Device>)>>;
    async fn store_device(&self, edge_server_id: Uuid, new: NewDevice) -> ServiceResult<Device>;
    async fn update_device(&self, device_id: Uuid, new: NewDevice) -> ServiceResult<Option<()>>;
    async fn view_device(&self, device_id: Uuid) -> ServiceResult<Option<DeviceDetails>>;
    async fn update_invitation(
        &self,
        edge_server_id: Uuid,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> ServiceResult<Option<()>>;
    async fn find_by_invitation_code(&self, code: &str) -> ServiceResult<Option<EdgeServer>>;
    async fn store_sensor_data(&self, readings: Vec<SensorReading>) -> ServiceResult<u64>;
    async fn read_sensor_data(
        &self,
        edge_server_id: Uuid,
        device_id: Option<Uuid>,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> ServiceResult<Vec<SensorData>>;
}

pub struct PgEdgeRepository {
    db: PgPool,
}

impl PgEdgeRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const EDGE_COLUMNS: &str = "id, name, vendor, description, mqtt_user, mqtt_password, \
     mqtt_pub_topic, mqtt_sub_topic, invitation_code, invitation_expired_at, created_at";

const DEVICE_COLUMNS: &str = "id, vendor_name, vendor_number, type, source_type, source_address, \
     assigned_model_type, assigned_model_index, additional_info, created_at";

#[async_trait]
impl EdgeRepository for PgEdgeRepository {
    async fn store_edge(&self, owner_id: Uuid, new: NewEdgeServer) -> ServiceResult<EdgeServer> {
        let mut tx = self.db.begin().await?;

        let edge = sqlx::query_as::<_, EdgeServer>(&format!(
            r#"
            INSERT INTO edge_servers
                (name, vendor, description, mqtt_user, mqtt_password, mqtt_pub_topic, mqtt_sub_topic)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {EDGE_COLUMNS}
            "#
        ))
        .bind(&new.name)
        .bind(&new.vendor)
        .bind(&new.description)
        .bind(&new.mqtt_user)
        .bind(&new.mqtt_password)
        .bind(&new.mqtt_pub_topic)
        .bind(&new.mqtt_sub_topic)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO user_groups (user_id, edge_server_id, role_id) VALUES ($1, $2, $3)",
        )
        .bind(owner_id)
        .bind(edge.id)
        .bind(Role::Admin)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(edge)
    }

    async fn mqtt_topics(&self, edge_server_id: Uuid) -> ServiceResult<Option<MqttTopics>> {
        let topics = sqlx::query_as::<_, MqttTopics>(
            "SELECT mqtt_pub_topic, mqtt_sub_topic FROM edge_servers WHERE id = $1",
        )
        .bind(edge_server_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(topics)
    }

    async fn fetch_edges(&self, user_id: Uuid) -> ServiceResult<Vec<EdgeSummary>> {
        let rows = sqlx::query_as::<_, EdgeSummary>(
            r#"
            SELECT e.id, e.name, e.vendor
            FROM edge_servers e
            JOIN user_groups g ON g.edge_server_id = e.id
            WHERE g.user_id = $1
            ORDER BY e.created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn fetch_edge_with_devices(
        &self,
        user_id: Uuid,
        edge_server_id: Uuid,
    ) -> ServiceResult<Option<(EdgeServer, Vec<Device>)>> {
        let edge = sqlx::query_as::<_, EdgeServer>(
            r#"
            SELECT e.id, e.name, e.vendor, e.description, e.mqtt_user, e.mqtt_password,
                   e.mqtt_pub_topic, e.mqtt_sub_topic, e.invitation_code,
                   e.invitation_expired_at, e.created_at
            FROM edge_servers e
            JOIN user_groups g ON g.edge_server_id = e.id
            WHERE e.id = $1 AND g.user_id = $2
            "#,
        )
        .bind(edge_server_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        let Some(edge) = edge else {
            return Ok(None);
        };

        let devices = sqlx::query_as::<_, Device>(
            r#"
            SELECT d.id, d.vendor_name, d.vendor_number, d.type, d.source_type,
                   d.source_address, d.assigned_model_type, d.assigned_model_index,
                   d.additional_info, d.created_at
            FROM devices d
            JOIN devices_edge_servers l ON l.device_id = d.id
            WHERE l.edge_server_id = $1
            ORDER BY d.created_at
            "#,
        )
        .bind(edge_server_id)
        .fetch_all(&self.db)
        .await?;

        Ok(Some((edge, devices)))
    }

    async fn store_device(&self, edge_server_id: Uuid, new: NewDevice) -> ServiceResult<Device> {
        let mut tx = self.db.begin().await?;

        let device = sqlx::query_as::<_, Device>(&format!(
            r#"
            INSERT INTO devices
                (vendor_name, vendor_number, type, source_type, source_address,
                 assigned_model_type, assigned_model_index, additional_info)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {DEVICE_COLUMNS}
            "#
        ))
        .bind(&new.vendor_name)
        .bind(&new.vendor_number)
        .bind(new.kind)
        .bind(new.source_type)
        .bind(&new.source_address)
        .bind(new.assigned_model_type)
        .bind(new.assigned_model_index)
        .bind(&new.additional_info)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO devices_edge_servers (edge_server_id, device_id) VALUES ($1, $2)")
            .bind(edge_server_id)
            .bind(device.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(device)
    }

    async fn update_device(&self, device_id: Uuid, new: NewDevice) -> ServiceResult<Option<()>> {
        let result = sqlx::query(
            r#"
            UPDATE devices
            SET vendor_name = $2, vendor_number = $3, type = $4, source_type = $5,
                source_address = $6, assigned_model_type = $7, assigned_model_index = $8,
                additional_info = $9
            WHERE id = $1
            "#,
        )
        .bind(device_id)
        .bind(&new.vendor_name)
        .bind(&new.vendor_number)
        .bind(new.kind)
        .bind(new.source_type)
        .bind(&new.source_address)
        .bind(new.assigned_model_type)
        .bind(new.assigned_model_index)
        .bind(&new.additional_info)
        .execute(&self.db)
        .await?;
        Ok((result.rows_affected() > 0).then_some(()))
    }

    async fn view_device(&self, device_id: Uuid) -> ServiceResult<Option<DeviceDetails>> {
        let device = sqlx::query_as::<_, Device>(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices WHERE id = $1"
        ))
        .bind(device_id)
        .fetch_optional(&self.db)
        .await?;

        let Some(device) = device else {
            return Ok(None);
        };

        let edge_server = sqlx::query_as::<_, EdgeSummary>(
            r#"
            SELECT e.id, e.name, e.vendor
            FROM edge_servers e
            JOIN devices_edge_servers l ON l.edge_server_id = e.id
            WHERE l.device_id = $1
            "#,
        )
        .bind(device_id)
        .fetch_optional(&self.db)
        .await?;

        // A device without an owning edge server is not addressable.
        let Some(edge_server) = edge_server else {
            return Ok(None);
        };

        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, edge_server_id, device_id, device_type, object_label,
                   risk_level, title, description, image, is_viewed, created_at, deleted_at
            FROM notifications
            WHERE device_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            "#,
        )
        .bind(device_id)
        .fetch_all(&self.db)
        .await?;

        Ok(Some(DeviceDetails {
            device,
            edge_server,
            notifications,
        }))
    }

    async fn update_invitation(
        &self,
        edge_server_id: Uuid,
        code: &str,
        expires_at: OffsetDateTime,
    ) -> ServiceResult<Option<()>> {
        let result = sqlx::query(
            "UPDATE edge_servers SET invitation_code = $2, invitation_expired_at = $3 WHERE id = $1",
        )
        .bind(edge_server_id)
        .bind(code)
        .bind(expires_at)
        .execute(&self.db)
        .await?;
        Ok((result.rows_affected() > 0).then_some(()))
    }

    async fn find_by_invitation_code(&self, code: &str) -> ServiceResult<Option<EdgeServer>> {
        let edge = sqlx::query_as::<_, EdgeServer>(&format!(
            "SELECT {EDGE_COLUMNS} FROM edge_servers WHERE invitation_code = $1"
        ))
        .bind(code)
        .fetch_optional(&self.db)
        .await?;
        Ok(edge)
    }

    async fn store_sensor_data(&self, readings: Vec<SensorReading>) -> ServiceResult<u64> {
        // All-or-nothing: a single failed row rolls back the batch.
        let mut tx = self.db.begin().await?;
        let count = readings.len() as u64;
        for reading in readings {
            sqlx::query(
                r#"
                INSERT INTO sensor_data
                    (edge_server_id, device_id, data_measured, inference_label_status, captured_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(reading.edge_server_id)
            .bind(reading.device_id)
            .bind(&reading.data_measured)
            .bind(&reading.inference_label_status)
            .bind(reading.captured_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(count)
    }

    async fn read_sensor_data(
        &self,
        edge_server_id: Uuid,
        device_id: Option<Uuid>,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> ServiceResult<Vec<SensorData>> {
        let rows = sqlx::query_as::<_, SensorData>(
            r#"
            SELECT id, edge_server_id, device_id, data_measured, inference_label_status, captured_at
            FROM sensor_data
            WHERE edge_server_id = $1
              AND ($2::uuid IS NULL OR device_id = $2)
              AND captured_at BETWEEN $3 AND $4
            ORDER BY captured_at DESC
            "#,
        )
        .bind(edge_server_id)
        .bind(device_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}
