//! In-memory fakes for the repository and collaborator traits, shared
//! by the service tests. Nothing here talks to Postgres, the broker or
//! any other network service.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use axum::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::auth::claims::{DeviceCtx, Principal, UserCtx};
use crate::auth::jwt::JwtKeys;
use crate::auth::password::hash_password;
use crate::auth::repo::{NewUser, User, UserRepository};
use crate::auth::services::AuthService;
use crate::config::JwtConfig;
use crate::edge::model::{
    Device, EdgeServer, EdgeSummary, Membership, MqttTopics, NewDevice, Role, SensorData,
    SensorReading,
};
use crate::edge::repo::{DeviceDetails, EdgeRepository, NewEdgeServer};
use crate::edge::services::EdgeService;
use crate::mailer::Mailer;
use crate::mqtt::MqttPublisher;
use crate::notifications::repo::{NewNotification, Notification, NotificationRepository};
use crate::notifications::services::NotificationService;
use crate::push::PushClient;
use crate::response::{ServiceError, ServiceResult};
use crate::storage::StorageClient;

pub const TEST_PASSWORD: &str = "hunter2hunter2";

pub fn user_principal(user: &User) -> Principal {
    Principal::User(UserCtx {
        user_id: user.id,
        email: user.email.clone(),
        username: user.username.clone(),
    })
}

pub fn device_principal(user: &User, edge_server_id: Uuid) -> Principal {
    Principal::Device(DeviceCtx {
        user: UserCtx {
            user_id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
        },
        edge_server_id,
    })
}

#[derive(Default)]
pub struct MemoryUserRepo {
    users: Mutex<Vec<User>>,
    memberships: Arc<Mutex<Vec<Membership>>>,
}

#[async_trait]
impl UserRepository for MemoryUserRepo {
    async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<User>> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.id == id)
            .cloned())
    }

    async fn create(&self, new: NewUser) -> ServiceResult<User> {
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            is_verified: false,
            verification_code: Some(new.verification_code),
            fcm_registration_token: new.fcm_registration_token,
            created_at: OffsetDateTime::now_utc(),
        };
        self.users.lock().unwrap().push(user.clone());
        Ok(user)
    }

    async fn verify(&self, email: &str, code: &str) -> ServiceResult<Option<()>> {
        let mut users = self.users.lock().unwrap();
        match users.iter_mut().find(|u| {
            u.email == email && !u.is_verified && u.verification_code.as_deref() == Some(code)
        }) {
            Some(user) => {
                user.is_verified = true;
                user.verification_code = None;
                Ok(Some(()))
            }
            None => Ok(None),
        }
    }

    async fn set_fcm_token(&self, id: Uuid, token: &str) -> ServiceResult<()> {
        if let Some(user) = self.users.lock().unwrap().iter_mut().find(|u| u.id == id) {
            user.fcm_registration_token = Some(token.to_string());
        }
        Ok(())
    }

    async fn membership(
        &self,
        user_id: Uuid,
        edge_server_id: Uuid,
    ) -> ServiceResult<Option<Membership>> {
        Ok(self
            .memberships
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.user_id == user_id && m.edge_server_id == edge_server_id)
            .cloned())
    }

    async fn add_membership(
        &self,
        user_id: Uuid,
        edge_server_id: Uuid,
        role: Role,
    ) -> ServiceResult<Membership> {
        let membership = Membership {
            user_id,
            edge_server_id,
            role_id: role,
        };
        self.memberships.lock().unwrap().push(membership.clone());
        Ok(membership)
    }

    async fn group_fcm_tokens(&self, edge_server_id: Uuid) -> ServiceResult<Vec<String>> {
        let memberships = self.memberships.lock().unwrap();
        let users = self.users.lock().unwrap();
        Ok(users
            .iter()
            .filter(|u| {
                memberships
                    .iter()
                    .any(|m| m.user_id == u.id && m.edge_server_id == edge_server_id)
            })
            .filter_map(|u| u.fcm_registration_token.clone())
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryEdgeRepo {
    edges: Mutex<Vec<EdgeServer>>,
    devices: Mutex<Vec<(Uuid, Device)>>,
    sensor_data: Mutex<Vec<SensorData>>,
    memberships: Arc<Mutex<Vec<Membership>>>,
    notifications: Arc<Mutex<Vec<Notification>>>,
}

fn device_from_new(new: NewDevice) -> Device {
    Device {
        id: Uuid::new_v4(),
        vendor_name: new.vendor_name,
        vendor_number: new.vendor_number,
        kind: new.kind,
        source_type: new.source_type,
        source_address: new.source_address,
        assigned_model_type: new.assigned_model_type,
        assigned_model_index: new.assigned_model_index,
        additional_info: new.additional_info,
        created_at: OffsetDateTime::now_utc(),
    }
}

#[async_trait]
impl EdgeRepository for MemoryEdgeRepo {
    async fn store_edge(&self, owner_id: Uuid, new: NewEdgeServer) -> ServiceResult<EdgeServer> {
        let edge = EdgeServer {
            id: Uuid::new_v4(),
            name: new.name,
            vendor: new.vendor,
            description: new.description,
            mqtt_user: new.mqtt_user,
            mqtt_password: new.mqtt_password,
            mqtt_pub_topic: new.mqtt_pub_topic,
            mqtt_sub_topic: new.mqtt_sub_topic,
            invitation_code: None,
            invitation_expired_at: None,
            created_at: OffsetDateTime::now_utc(),
        };
        self.edges.lock().unwrap().push(edge.clone());
        self.memberships.lock().unwrap().push(Membership {
            user_id: owner_id,
            edge_server_id: edge.id,
            role_id: Role::Admin,
        });
        Ok(edge)
    }

    async fn mqtt_topics(&self, edge_server_id: Uuid) -> ServiceResult<Option<MqttTopics>> {
        Ok(self
            .edges
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == edge_server_id)
            .map(|e| MqttTopics {
                mqtt_pub_topic: e.mqtt_pub_topic.clone(),
                mqtt_sub_topic: e.mqtt_sub_topic.clone(),
            }))
    }

    async fn fetch_edges(&self, user_id: Uuid) -> ServiceResult<Vec<EdgeSummary>> {
        let memberships = self.memberships.lock().unwrap();
        Ok(self
            .edges
            .lock()
            .unwrap()
            .iter()
            .filter(|e| {
                memberships
                    .iter()
                    .any(|m| m.user_id == user_id && m.edge_server_id == e.id)
            })
            .map(|e| EdgeSummary {
                id: e.id,
                name: e.name.clone(),
                vendor: e.vendor.clone(),
            })
            .collect())
    }

    async fn fetch_edge_with_devices(
        &self,
        user_id: Uuid,
        edge_server_id: Uuid,
    ) -> ServiceResult<Option<(EdgeServer, Vec<Device>)>> {
        let is_member = self
            .memberships
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.user_id == user_id && m.edge_server_id == edge_server_id);
        if !is_member {
            return Ok(None);
        }
        let Some(edge) = self
            .edges
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == edge_server_id)
            .cloned()
        else {
            return Ok(None);
        };
        let devices = self
            .devices
            .lock()
            .unwrap()
            .iter()
            .filter(|(owner, _)| *owner == edge_server_id)
            .map(|(_, d)| d.clone())
            .collect();
        Ok(Some((edge, devices)))
    }

    async fn store_device(&self, edge_server_id: Uuid, new: NewDevice) -> ServiceResult<Device> {
        let device = device_from_new(new);
        self.devices
            .lock()
            .unwrap()
            .push((edge_server_id, device.clone()));
        Ok(device)
    }

    async fn update_device(&self, device_id: Uuid, new: NewDevice) -> ServiceResult<Option<()>> {
        let mut devices = self.devices.lock().unwrap();
        match devices.iter_mut().find(|(_, d)| d.id == device_id) {
            Some((_, device)) => {
                let created_at = device.created_at;
                *device = device_from_new(new);
                device.id = device_id;
                device.created_at = created_at;
                Ok(Some(()))
            }
            None => Ok(None),
        }
    }

    async fn view_device(&self, device_id: Uuid) -> ServiceResult<Option<DeviceDetails>> {
        let devices = self.devices.lock().unwrap();
        let Some((owner, device)) = devices
            .iter()
            .find(|(_, d)| d.id == device_id)
            .map(|(o, d)| (*o, d.clone()))
        else {
            return Ok(None);
        };
        let Some(edge_server) = self
            .edges
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.id == owner)
            .map(|e| EdgeSummary {
                id: e.id,
                name: e.name.clone(),
                vendor: e.vendor.clone(),
            })
        else {
            return Ok(None);
        };
        let notifications = self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.device_id == device_id && n.deleted_at.is_none())
            .cloned()
            .collect();
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
        let mut edges = self.edges.lock().unwrap();
        match edges.iter_mut().find(|e| e.id == edge_server_id) {
            Some(edge) => {
                edge.invitation_code = Some(code.to_string());
                edge.invitation_expired_at = Some(expires_at);
                Ok(Some(()))
            }
            None => Ok(None),
        }
    }

    async fn find_by_invitation_code(&self, code: &str) -> ServiceResult<Option<EdgeServer>> {
        Ok(self
            .edges
            .lock()
            .unwrap()
            .iter()
            .find(|e| e.invitation_code.as_deref() == Some(code))
            .cloned())
    }

    async fn store_sensor_data(&self, readings: Vec<SensorReading>) -> ServiceResult<u64> {
        let mut rows = self.sensor_data.lock().unwrap();
        let count = readings.len() as u64;
        for r in readings {
            rows.push(SensorData {
                id: Uuid::new_v4(),
                edge_server_id: r.edge_server_id,
                device_id: r.device_id,
                data_measured: r.data_measured,
                inference_label_status: r.inference_label_status,
                captured_at: r.captured_at,
            });
        }
        Ok(count)
    }

    async fn read_sensor_data(
        &self,
        edge_server_id: Uuid,
        device_id: Option<Uuid>,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> ServiceResult<Vec<SensorData>> {
        let mut rows: Vec<SensorData> = self
            .sensor_data
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.edge_server_id == edge_server_id)
            .filter(|r| device_id.map(|d| r.device_id == d).unwrap_or(true))
            .filter(|r| r.captured_at >= start && r.captured_at <= end)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
        Ok(rows)
    }
}

#[derive(Default)]
pub struct MemoryNotificationRepo {
    rows: Arc<Mutex<Vec<Notification>>>,
}

#[async_trait]
impl NotificationRepository for MemoryNotificationRepo {
    async fn store(&self, new: NewNotification) -> ServiceResult<Notification> {
        let row = Notification {
            id: Uuid::new_v4(),
            user_id: Some(new.user_id),
            edge_server_id: Some(new.edge_server_id),
            device_id: new.device_id,
            device_type: new.device_type,
            object_label: new.object_label,
            risk_level: new.risk_level,
            title: new.title,
            description: new.description,
            image: new.image,
            is_viewed: false,
            created_at: OffsetDateTime::now_utc(),
            deleted_at: None,
        };
        self.rows.lock().unwrap().push(row.clone());
        Ok(row)
    }

    async fn find(&self, id: Uuid) -> ServiceResult<Option<Notification>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.id == id && n.deleted_at.is_none())
            .cloned())
    }

    async fn fetch_all(&self, user_id: Uuid) -> ServiceResult<Vec<Notification>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.user_id == Some(user_id) && n.deleted_at.is_none())
            .cloned()
            .collect())
    }

    async fn mark_viewed(&self, id: Uuid) -> ServiceResult<()> {
        if let Some(row) = self.rows.lock().unwrap().iter_mut().find(|n| n.id == id) {
            row.is_viewed = true;
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> ServiceResult<Option<()>> {
        let mut rows = self.rows.lock().unwrap();
        match rows
            .iter_mut()
            .find(|n| n.id == id && n.deleted_at.is_none())
        {
            Some(row) => {
                row.deleted_at = Some(OffsetDateTime::now_utc());
                Ok(Some(()))
            }
            None => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct RecordingMqtt {
    pub published: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl MqttPublisher for RecordingMqtt {
    async fn publish(&self, topic: &str, payload: &str) -> ServiceResult<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::Publish("broker unavailable".into()));
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), payload.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String, String)>>,
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> ServiceResult<()> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string(), body.to_string()));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingPush {
    pub sent: Mutex<Vec<(Vec<String>, String, String, Option<String>)>>,
}

#[async_trait]
impl PushClient for RecordingPush {
    async fn send_notification(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
        image_url: Option<&str>,
    ) -> ServiceResult<()> {
        self.sent.lock().unwrap().push((
            tokens.to_vec(),
            title.to_string(),
            body.to_string(),
            image_url.map(str::to_string),
        ));
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingStorage {
    pub uploaded: Mutex<Vec<String>>,
}

#[async_trait]
impl StorageClient for RecordingStorage {
    async fn upload(&self, key: &str, _body: Bytes, _content_type: &str) -> ServiceResult<String> {
        self.uploaded.lock().unwrap().push(key.to_string());
        Ok(format!("https://storage.test/{key}"))
    }
}

/// Fully wired set of fakes behind the real services.
pub struct TestBackend {
    pub jwt: JwtKeys,
    pub users: Arc<MemoryUserRepo>,
    pub edges: Arc<MemoryEdgeRepo>,
    pub notifications: Arc<MemoryNotificationRepo>,
    pub mqtt: Arc<RecordingMqtt>,
    pub mailer: Arc<RecordingMailer>,
    pub push: Arc<RecordingPush>,
    pub storage: Arc<RecordingStorage>,
}

pub fn test_backend() -> TestBackend {
    let memberships: Arc<Mutex<Vec<Membership>>> = Arc::default();
    let notification_rows: Arc<Mutex<Vec<Notification>>> = Arc::default();

    let users = Arc::new(MemoryUserRepo {
        users: Mutex::default(),
        memberships: memberships.clone(),
    });
    let edges = Arc::new(MemoryEdgeRepo {
        edges: Mutex::default(),
        devices: Mutex::default(),
        sensor_data: Mutex::default(),
        memberships,
        notifications: notification_rows.clone(),
    });
    let notifications = Arc::new(MemoryNotificationRepo {
        rows: notification_rows,
    });

    TestBackend {
        jwt: JwtKeys::new(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            user_ttl_hours: 168,
        }),
        users,
        edges,
        notifications,
        mqtt: Arc::default(),
        mailer: Arc::default(),
        push: Arc::default(),
        storage: Arc::default(),
    }
}

impl TestBackend {
    pub fn auth_service(&self) -> AuthService {
        AuthService::new(self.users.clone(), self.jwt.clone(), self.mailer.clone())
    }

    pub fn edge_service(&self) -> EdgeService {
        EdgeService::new(
            self.edges.clone(),
            self.users.clone(),
            self.mqtt.clone(),
            self.jwt.clone(),
        )
    }

    pub fn notification_service(&self) -> NotificationService {
        NotificationService::new(
            self.notifications.clone(),
            self.users.clone(),
            self.storage.clone(),
            self.push.clone(),
        )
    }

    pub fn last_email_body(&self) -> Option<String> {
        self.mailer
            .sent
            .lock()
            .unwrap()
            .last()
            .map(|(_, _, body)| body.clone())
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.mqtt.published.lock().unwrap().clone()
    }

    /// Seeds a verified account whose password is [`TEST_PASSWORD`].
    pub async fn seed_verified_user(&self, email: &str, username: &str) -> User {
        let user = self
            .users
            .create(NewUser {
                username: username.to_string(),
                email: email.to_string(),
                password_hash: hash_password(TEST_PASSWORD).expect("hash"),
                verification_code: "000000".to_string(),
                fcm_registration_token: None,
            })
            .await
            .expect("create user");
        self.users
            .verify(email, "000000")
            .await
            .expect("verify")
            .expect("code matches");
        self.users.find_by_email(email).await.expect("find").expect("seeded")
    }
}
