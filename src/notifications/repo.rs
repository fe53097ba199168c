use axum::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::response::ServiceResult;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub edge_server_id: Option<Uuid>,
    pub device_id: Uuid,
    pub device_type: String,
    pub object_label: Option<String>,
    pub risk_level: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub is_viewed: bool,
    pub created_at: OffsetDateTime,
    #[serde(skip_serializing)]
    pub deleted_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub edge_server_id: Uuid,
    pub device_id: Uuid,
    pub device_type: String,
    pub object_label: Option<String>,
    pub risk_level: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub image: Option<String>,
}

/// Notification rows are soft-deleted; deleted rows stay out of every
/// read path.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn store(&self, new: NewNotification) -> ServiceResult<Notification>;
    async fn find(&self, id: Uuid) -> ServiceResult<Option<Notification>>;
    async fn fetch_all(&self, user_id: Uuid) -> ServiceResult<Vec<Notification>>;
    async fn mark_viewed(&self, id: Uuid) -> ServiceResult<()>;
    async fn delete(&self, id: Uuid) -> ServiceResult<Option<()>>;
}

pub struct PgNotificationRepository {
    db: PgPool,
}

impl PgNotificationRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const NOTIFICATION_COLUMNS: &str = "id, user_id, edge_server_id, device_id, device_type, \
     object_label, risk_level, title, description, image, is_viewed, created_at, deleted_at";

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn store(&self, new: NewNotification) -> ServiceResult<Notification> {
        let row = sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications
                (user_id, edge_server_id, device_id, device_type, object_label,
                 risk_level, title, description, image)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .bind(new.user_id)
        .bind(new.edge_server_id)
        .bind(new.device_id)
        .bind(&new.device_type)
        .bind(&new.object_label)
        .bind(&new.risk_level)
        .bind(&new.title)
        .bind(&new.description)
        .bind(&new.image)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn find(&self, id: Uuid) -> ServiceResult<Option<Notification>> {
        let row = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM notifications WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn fetch_all(&self, user_id: Uuid) -> ServiceResult<Vec<Notification>> {
        let rows = sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {NOTIFICATION_COLUMNS}
            FROM notifications
            WHERE user_id = $1 AND deleted_at IS NULL
            ORDER BY created_at DESC
            "#
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn mark_viewed(&self, id: Uuid) -> ServiceResult<()> {
        sqlx::query("UPDATE notifications SET is_viewed = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> ServiceResult<Option<()>> {
        let result = sqlx::query(
            "UPDATE notifications SET deleted_at = now() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.db)
        .await?;
        Ok((result.rows_affected() > 0).then_some(()))
    }
}
