use std::sync::Arc;

use tracing::{info, warn};

use super::claims::{Principal, UserCtx};
use super::dto::{LoginResponse, PublicUser, SignUpRequest};
use super::jwt::JwtKeys;
use super::password::{hash_password, is_valid_email, verify_password};
use super::repo::{NewUser, UserRepository};
use crate::mailer::Mailer;
use crate::response::{ServiceError, ServiceResult};
use crate::util::random_alphanumeric;

pub struct AuthService {
    users: Arc<dyn UserRepository>,
    jwt: JwtKeys,
    mailer: Arc<dyn Mailer>,
}

impl AuthService {
    pub fn new(users: Arc<dyn UserRepository>, jwt: JwtKeys, mailer: Arc<dyn Mailer>) -> Self {
        Self { users, jwt, mailer }
    }

    /// Creates an unverified account and emails a verification code.
    /// The email send is best effort; a transport failure does not roll
    /// back the account.
    pub async fn sign_up(&self, req: SignUpRequest) -> ServiceResult<PublicUser> {
        let email = req.email.trim().to_lowercase();
        if !is_valid_email(&email) {
            return Err(ServiceError::Validation("invalid email".into()));
        }
        if req.password != req.confirm_password {
            return Err(ServiceError::Validation("password is not the same".into()));
        }
        if req.password.len() < 8 {
            return Err(ServiceError::Validation("password too short".into()));
        }
        if self.users.find_by_email(&email).await?.is_some() {
            return Err(ServiceError::EmailTaken);
        }

        let password_hash = hash_password(&req.password)?;
        let verification_code = random_alphanumeric(6);

        let user = self
            .users
            .create(NewUser {
                username: req.username,
                email: email.clone(),
                password_hash,
                verification_code: verification_code.clone(),
                fcm_registration_token: req.fcm_registration_token,
            })
            .await?;

        if let Err(e) = self
            .mailer
            .send(&email, "Verification Code", &verification_code)
            .await
        {
            warn!(error = %e, email = %email, "verification email failed");
        }

        info!(user_id = %user.id, "user signed up");
        Ok(user.into())
    }

    pub async fn verify(&self, email: &str, code: &str) -> ServiceResult<()> {
        self.users
            .verify(email, code)
            .await?
            .ok_or(ServiceError::VerificationInvalid)
    }

    /// Unknown email and wrong password are indistinguishable to the
    /// caller; both come back as invalid credential.
    pub async fn login(&self, email: &str, password: &str) -> ServiceResult<LoginResponse> {
        let user = self
            .users
            .find_by_email(email)
            .await?
            .ok_or(ServiceError::InvalidCredential)?;

        if !verify_password(password, &user.password_hash)? {
            return Err(ServiceError::InvalidCredential);
        }
        if !user.is_verified {
            return Err(ServiceError::Unverified);
        }

        let access_token = self.jwt.sign_user(&UserCtx {
            user_id: user.id,
            email: user.email,
            username: user.username,
        })?;

        info!(user_id = %user.id, "user logged in");
        Ok(LoginResponse { access_token })
    }

    pub async fn profile(&self, principal: &Principal) -> ServiceResult<PublicUser> {
        let user = self
            .users
            .find_by_id(principal.user_id())
            .await?
            .ok_or(ServiceError::NotFound)?;
        Ok(user.into())
    }

    pub async fn update_fcm_token(&self, principal: &Principal, token: &str) -> ServiceResult<()> {
        self.users.set_fcm_token(principal.user_id(), token).await
    }
}
