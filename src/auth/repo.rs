use axum::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::edge::model::{Membership, Role};
use crate::response::ServiceResult;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_verified: bool,
    #[serde(skip_serializing)]
    pub verification_code: Option<String>,
    pub fcm_registration_token: Option<String>,
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub verification_code: String,
    pub fcm_registration_token: Option<String>,
}

/// User accounts plus the user↔edge-server membership table. The
/// membership rows are the source of truth for every authorization
/// decision; a miss is reported as `None`, never as an error.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>>;
    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<User>>;
    async fn create(&self, new: NewUser) -> ServiceResult<User>;
    /// Marks the user verified when the code matches; `None` on mismatch.
    async fn verify(&self, email: &str, code: &str) -> ServiceResult<Option<()>>;
    async fn set_fcm_token(&self, id: Uuid, token: &str) -> ServiceResult<()>;

    async fn membership(
        &self,
        user_id: Uuid,
        edge_server_id: Uuid,
    ) -> ServiceResult<Option<Membership>>;
    async fn add_membership(
        &self,
        user_id: Uuid,
        edge_server_id: Uuid,
        role: Role,
    ) -> ServiceResult<Membership>;
    /// FCM tokens of every member of the edge server's group.
    async fn group_fcm_tokens(&self, edge_server_id: Uuid) -> ServiceResult<Vec<String>>;
}

pub struct PgUserRepository {
    db: PgPool,
}

impl PgUserRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const USER_COLUMNS: &str = "id, username, email, password_hash, is_verified, \
     verification_code, fcm_registration_token, created_at";

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str) -> ServiceResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> ServiceResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn create(&self, new: NewUser) -> ServiceResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, is_verified, verification_code, fcm_registration_token)
            VALUES ($1, $2, $3, FALSE, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.verification_code)
        .bind(&new.fcm_registration_token)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn verify(&self, email: &str, code: &str) -> ServiceResult<Option<()>> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET is_verified = TRUE, verification_code = NULL
            WHERE email = $1 AND verification_code = $2 AND is_verified = FALSE
            "#,
        )
        .bind(email)
        .bind(code)
        .execute(&self.db)
        .await?;
        Ok((result.rows_affected() > 0).then_some(()))
    }

    async fn set_fcm_token(&self, id: Uuid, token: &str) -> ServiceResult<()> {
        sqlx::query("UPDATE users SET fcm_registration_token = $2 WHERE id = $1")
            .bind(id)
            .bind(token)
            .execute(&self.db)
            .await?;
        Ok(())
    }

    async fn membership(
        &self,
        user_id: Uuid,
        edge_server_id: Uuid,
    ) -> ServiceResult<Option<Membership>> {
        let row = sqlx::query_as::<_, Membership>(
            r#"
            SELECT user_id, edge_server_id, role_id
            FROM user_groups
            WHERE user_id = $1 AND edge_server_id = $2
            "#,
        )
        .bind(user_id)
        .bind(edge_server_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row)
    }

    async fn add_membership(
        &self,
        user_id: Uuid,
        edge_server_id: Uuid,
        role: Role,
    ) -> ServiceResult<Membership> {
        let row = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO user_groups (user_id, edge_server_id, role_id)
            VALUES ($1, $2, $3)
            RETURNING user_id, edge_server_id, role_id
            "#,
        )
        .bind(user_id)
        .bind(edge_server_id)
        .bind(role)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    async fn group_fcm_tokens(&self, edge_server_id: Uuid) -> ServiceResult<Vec<String>> {
        let tokens = sqlx::query_scalar::<_, String>(
            r#"
            SELECT u.fcm_registration_token
            FROM users u
            JOIN user_groups g ON g.user_id = u.id
            WHERE g.edge_server_id = $1 AND u.fcm_registration_token IS NOT NULL
            "#,
        )
        .bind(edge_server_id)
        .fetch_all(&self.db)
        .await?;
        Ok(tokens)
    }
}
