use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::auth::jwt::JwtKeys;
use crate::auth::repo::PgUserRepository;
use crate::auth::services::AuthService;
use crate::config::AppConfig;
use crate::edge::repo::PgEdgeRepository;
use crate::edge::services::EdgeService;
use crate::mailer::SmtpMailer;
use crate::mqtt::Mqtt;
use crate::notifications::repo::PgNotificationRepository;
use crate::notifications::services::NotificationService;
use crate::push::FcmClient;
use crate::storage::Storage;

/// Shared application state, cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub jwt: JwtKeys,
    pub auth: Arc<AuthService>,
    pub edge: Arc<EdgeService>,
    pub notifications: Arc<NotificationService>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;
        info!("database pool ready");

        let jwt = JwtKeys::new(&config.jwt);
        let mqtt = Arc::new(Mqtt::connect(&config.mqtt));
        let storage = Arc::new(Storage::new(&config.storage).await?);
        let push = Arc::new(FcmClient::new(&config.push));
        let mailer = Arc::new(SmtpMailer::new(&config.smtp)?);

        let users = Arc::new(PgUserRepository::new(db.clone()));
        let edges = Arc::new(PgEdgeRepository::new(db.clone()));
        let notifications_repo = Arc::new(PgNotificationRepository::new(db.clone()));

        let auth = Arc::new(AuthService::new(users.clone(), jwt.clone(), mailer));
        let edge = Arc::new(EdgeService::new(
            edges,
            users.clone(),
            mqtt,
            jwt.clone(),
        ));
        let notifications = Arc::new(NotificationService::new(
            notifications_repo,
            users,
            storage,
            push,
        ));

        Ok(Self {
            db,
            config: Arc::new(config),
            jwt,
            auth,
            edge,
            notifications,
        })
    }
}
