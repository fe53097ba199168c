use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use super::claims::{Claims, UserCtx};
use crate::config::JwtConfig;
use crate::response::ServiceResult;

/// Edge tokens are the gateway's long-lived device credential, not a
/// user session; they effectively never expire.
const EDGE_TOKEN_TTL_SECS: i64 = 100 * 365 * 24 * 60 * 60;

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    user_ttl_secs: i64,
}

impl JwtKeys {
    pub fn new(cfg: &JwtConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(cfg.secret.as_bytes()),
            decoding: DecodingKey::from_secret(cfg.secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            user_ttl_secs: cfg.user_ttl_hours * 3600,
        }
    }

    fn sign(
        &self,
        user: &UserCtx,
        edge_server_id: Option<Uuid>,
        ttl_secs: i64,
    ) -> ServiceResult<String> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = Claims {
            sub: user.user_id,
            email: user.email.clone(),
            username: user.username.clone(),
            edge_server_id,
            iat: now as usize,
            exp: (now + ttl_secs) as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
        };
        let token = encode(&Header::default(), &claims, &self.encoding)?;
        debug!(user_id = %user.user_id, edge = ?edge_server_id, "jwt signed");
        Ok(token)
    }

    pub fn sign_user(&self, user: &UserCtx) -> ServiceResult<String> {
        self.sign(user, None, self.user_ttl_secs)
    }

    pub fn sign_edge(&self, user: &UserCtx, edge_server_id: Uuid) -> ServiceResult<String> {
        self.sign(user, Some(edge_server_id), EDGE_TOKEN_TTL_SECS)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::Principal;

    fn keys() -> JwtKeys {
        JwtKeys::new(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            user_ttl_hours: 168,
        })
    }

    fn user() -> UserCtx {
        UserCtx {
            user_id: Uuid::new_v4(),
            email: "a@example.com".into(),
            username: "alice".into(),
        }
    }

    #[test]
    fn user_token_round_trips_without_edge_id() {
        let keys = keys();
        let user = user();
        let token = keys.sign_user(&user).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.sub, user.user_id);
        assert_eq!(claims.username, "alice");
        assert!(claims.edge_server_id.is_none());
        assert!(matches!(Principal::from_claims(claims), Principal::User(_)));
    }

    #[test]
    fn edge_token_carries_edge_server_id() {
        let keys = keys();
        let user = user();
        let edge = Uuid::new_v4();
        let token = keys.sign_edge(&user, edge).expect("sign");
        let claims = keys.verify(&token).expect("verify");
        assert_eq!(claims.edge_server_id, Some(edge));
        let principal = Principal::from_claims(claims);
        assert_eq!(
            principal.require_device().expect("device").edge_server_id,
            edge
        );
    }

    #[test]
    fn verify_rejects_foreign_secret() {
        let token = keys().sign_user(&user()).expect("sign");
        let other = JwtKeys::new(&JwtConfig {
            secret: "other-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
            user_ttl_hours: 168,
        });
        assert!(other.verify(&token).is_err());
    }
}
