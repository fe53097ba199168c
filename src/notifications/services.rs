use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use super::dto::{NewNotificationRequest, UploadedImage};
use super::repo::{NewNotification, Notification, NotificationRepository};
use crate::auth::claims::Principal;
use crate::auth::repo::UserRepository;
use crate::edge::model::Role;
use crate::edge::services::require_membership;
use crate::push::PushClient;
use crate::response::{ServiceError, ServiceResult};
use crate::storage::StorageClient;

/// Alert intake from gateways plus the member-facing read/delete side.
pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    users: Arc<dyn UserRepository>,
    storage: Arc<dyn StorageClient>,
    push: Arc<dyn PushClient>,
}

impl NotificationService {
    pub fn new(
        repo: Arc<dyn NotificationRepository>,
        users: Arc<dyn UserRepository>,
        storage: Arc<dyn StorageClient>,
        push: Arc<dyn PushClient>,
    ) -> Self {
        Self {
            repo,
            users,
            storage,
            push,
        }
    }

    /// Stores an alert raised by a gateway. Only edge-scoped tokens may
    /// call this; the notification is attributed to the token's edge
    /// server and its owning user. The push fan-out runs detached, so a
    /// push failure never fails the intake.
    pub async fn store(
        &self,
        principal: &Principal,
        req: NewNotificationRequest,
        image: Option<UploadedImage>,
    ) -> ServiceResult<Notification> {
        let ctx = principal.require_device()?;

        let image_url = match image {
            Some(img) => {
                let key = format!("notifications/{}-{}", Uuid::new_v4(), img.filename);
                Some(
                    self.storage
                        .upload(&key, img.bytes, &img.content_type)
                        .await?,
                )
            }
            None => None,
        };

        let notification = self
            .repo
            .store(NewNotification {
                user_id: ctx.user.user_id,
                edge_server_id: ctx.edge_server_id,
                device_id: req.device_id,
                device_type: req.device_type,
                object_label: req.object_label,
                risk_level: req.risk_level,
                title: req.title,
                description: req.description,
                image: image_url,
            })
            .await?;

        let tokens = self.users.group_fcm_tokens(ctx.edge_server_id).await?;
        if !tokens.is_empty() {
            let push = Arc::clone(&self.push);
            let title = notification.title.clone();
            let body = notification.description.clone().unwrap_or_default();
            let image = notification.image.clone();
            tokio::spawn(async move {
                if let Err(e) = push
                    .send_notification(&tokens, &title, &body, image.as_deref())
                    .await
                {
                    warn!(error = %e, "notification push fan-out failed");
                }
            });
        }

        info!(notification_id = %notification.id, device_id = %notification.device_id, "notification stored");
        Ok(notification)
    }

    pub async fn fetch_all(&self, principal: &Principal) -> ServiceResult<Vec<Notification>> {
        self.repo.fetch_all(principal.user_id()).await
    }

    /// Member read; marks the notification viewed as a side effect.
    pub async fn view(
        &self,
        principal: &Principal,
        edge_server_id: Uuid,
        id: Uuid,
    ) -> ServiceResult<Notification> {
        require_membership(self.users.as_ref(), principal.user_id(), edge_server_id).await?;
        let notification = self.repo.find(id).await?.ok_or(ServiceError::NotFound)?;
        self.repo.mark_viewed(id).await?;
        Ok(notification)
    }

    /// Soft delete, Admins only.
    pub async fn delete(
        &self,
        principal: &Principal,
        edge_server_id: Uuid,
        id: Uuid,
    ) -> ServiceResult<()> {
        let role =
            require_membership(self.users.as_ref(), principal.user_id(), edge_server_id).await?;
        if role != Role::Admin {
            return Err(ServiceError::Unauthorized);
        }
        self.repo.delete(id).await?.ok_or(ServiceError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::testutil::{device_principal, test_backend, user_principal, TestBackend};

    fn alert(device_id: Uuid) -> NewNotificationRequest {
        NewNotificationRequest {
            device_id,
            device_type: "camera".into(),
            object_label: Some("person".into()),
            risk_level: Some("high".into()),
            title: "Person detected".into(),
            description: Some("Person near the back door".into()),
        }
    }

    async fn seeded_edge(backend: &TestBackend) -> (crate::auth::repo::User, Uuid) {
        let user = backend.seed_verified_user("owner@example.com", "owner").await;
        let edge = backend
            .edge_service()
            .add_edge_server(&user_principal(&user), "garage".into(), None, None)
            .await
            .expect("provision");
        (user, edge.edge_server_id)
    }

    #[tokio::test]
    async fn store_requires_an_edge_token() {
        let backend = test_backend();
        let (user, _) = seeded_edge(&backend).await;
        let svc = backend.notification_service();

        let err = svc
            .store(&user_principal(&user), alert(Uuid::new_v4()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidEdgeToken));
        assert!(svc
            .fetch_all(&user_principal(&user))
            .await
            .expect("fetch")
            .is_empty());
    }

    #[tokio::test]
    async fn store_uploads_image_and_fans_out_push() {
        let backend = test_backend();
        let (user, edge_id) = seeded_edge(&backend).await;
        backend
            .users
            .set_fcm_token(user.id, "fcm-owner")
            .await
            .expect("token");
        let svc = backend.notification_service();

        let image = UploadedImage {
            filename: "frame.jpg".into(),
            content_type: "image/jpeg".into(),
            bytes: Bytes::from_static(b"jpegdata"),
        };
        let stored = svc
            .store(&device_principal(&user, edge_id), alert(Uuid::new_v4()), Some(image))
            .await
            .expect("store");

        assert_eq!(stored.edge_server_id, Some(edge_id));
        assert_eq!(stored.user_id, Some(user.id));
        let url = stored.image.clone().expect("image url");
        assert!(url.starts_with("https://storage.test/notifications/"));
        assert!(url.ends_with("-frame.jpg"));

        // The fan-out runs detached; wait for it to land.
        for _ in 0..100 {
            if !backend.push.sent.lock().unwrap().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let sent = backend.push.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        let (tokens, title, _, push_image) = &sent[0];
        assert_eq!(tokens, &vec!["fcm-owner".to_string()]);
        assert_eq!(title, "Person detected");
        assert_eq!(push_image.as_deref(), Some(url.as_str()));
    }

    #[tokio::test]
    async fn view_gates_on_membership_and_marks_viewed() {
        let backend = test_backend();
        let (user, edge_id) = seeded_edge(&backend).await;
        let outsider = backend
            .seed_verified_user("outsider@example.com", "outsider")
            .await;
        let svc = backend.notification_service();

        let stored = svc
            .store(&device_principal(&user, edge_id), alert(Uuid::new_v4()), None)
            .await
            .expect("store");
        assert!(!stored.is_viewed);

        let err = svc
            .view(&user_principal(&outsider), edge_id, stored.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized));

        svc.view(&user_principal(&user), edge_id, stored.id)
            .await
            .expect("view");
        let after = backend
            .notifications
            .find(stored.id)
            .await
            .expect("find")
            .expect("still there");
        assert!(after.is_viewed);

        let err = svc
            .view(&user_principal(&user), edge_id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
    }

    #[tokio::test]
    async fn delete_is_admin_only_and_soft() {
        let backend = test_backend();
        let (user, edge_id) = seeded_edge(&backend).await;
        let friend = backend
            .seed_verified_user("friend@example.com", "friend")
            .await;
        let edge_svc = backend.edge_service();
        let code = edge_svc
            .create_invitation(&user_principal(&user), edge_id)
            .await
            .expect("invite")
            .invitation_code;
        edge_svc
            .join_invitation(&user_principal(&friend), &code)
            .await
            .expect("join");

        let svc = backend.notification_service();
        let stored = svc
            .store(&device_principal(&user, edge_id), alert(Uuid::new_v4()), None)
            .await
            .expect("store");

        let err = svc
            .delete(&user_principal(&friend), edge_id, stored.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized));

        svc.delete(&user_principal(&user), edge_id, stored.id)
            .await
            .expect("delete");
        assert!(svc
            .fetch_all(&user_principal(&user))
            .await
            .expect("fetch")
            .is_empty());

        let err = svc
            .delete(&user_principal(&user), edge_id, stored.id)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound));
    }
}
