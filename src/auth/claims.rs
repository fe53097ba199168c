use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::response::ServiceError;

/// JWT payload. User sessions and edge-scoped device tokens share the
/// same structure; `edge_server_id` is only present on the latter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edge_server_id: Option<Uuid>,
    pub iat: usize,
    pub exp: usize,
    pub iss: String,
    pub aud: String,
}

/// Identity of a human user session.
#[derive(Debug, Clone)]
pub struct UserCtx {
    pub user_id: Uuid,
    pub email: String,
    pub username: String,
}

/// Identity of a physical gateway calling with an edge-scoped token.
#[derive(Debug, Clone)]
pub struct DeviceCtx {
    pub user: UserCtx,
    pub edge_server_id: Uuid,
}

/// The two token shapes, resolved once at the request boundary so
/// operations can demand a specific shape by type instead of probing
/// claim fields.
#[derive(Debug, Clone)]
pub enum Principal {
    User(UserCtx),
    Device(DeviceCtx),
}

impl Principal {
    pub fn from_claims(claims: Claims) -> Self {
        let user = UserCtx {
            user_id: claims.sub,
            email: claims.email,
            username: claims.username,
        };
        match claims.edge_server_id {
            Some(edge_server_id) => Principal::Device(DeviceCtx {
                user,
                edge_server_id,
            }),
            None => Principal::User(user),
        }
    }

    pub fn user(&self) -> &UserCtx {
        match self {
            Principal::User(u) => u,
            Principal::Device(d) => &d.user,
        }
    }

    pub fn user_id(&self) -> Uuid {
        self.user().user_id
    }

    /// Edge-scoped operations only accept device tokens.
    pub fn require_device(&self) -> Result<&DeviceCtx, ServiceError> {
        match self {
            Principal::Device(d) => Ok(d),
            Principal::User(_) => Err(ServiceError::InvalidEdgeToken),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims(edge: Option<Uuid>) -> Claims {
        Claims {
            sub: Uuid::new_v4(),
            email: "gw@example.com".into(),
            username: "gw".into(),
            edge_server_id: edge,
            iat: 0,
            exp: usize::MAX,
            iss: "test".into(),
            aud: "test".into(),
        }
    }

    #[test]
    fn resolves_token_shape_from_edge_id() {
        let user = Principal::from_claims(claims(None));
        assert!(matches!(user, Principal::User(_)));
        assert!(user.require_device().is_err());

        let edge = Uuid::new_v4();
        let device = Principal::from_claims(claims(Some(edge)));
        let ctx = device.require_device().expect("device token");
        assert_eq!(ctx.edge_server_id, edge);
    }
}
