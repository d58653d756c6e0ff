use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    session_store: Arc<dyn SessionStore>,
    credential_hasher: Arc<dyn CredentialHasher>,
    token_codec: Arc<dyn TokenCodec>,
    min_password_len: usize,
}

impl RealAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        session_store: Arc<dyn SessionStore>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
    ) -> Self {
        Self {
            user_repo,
            session_store,
            credential_hasher,
            token_codec,
            min_password_len: 6,
        }
    }

    pub fn with_min_password_len(mut self, min_password_len: usize) -> Self {
        self.min_password_len = min_password_len;
        self
    }

    fn normalize_email(email: &str) -> String {
        email.trim().to_lowercase()
    }

    fn validate_register(&self, email: &str, password: &str) -> Result<(), AuthError> {
        match email.split_once('@') {
            Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {}
            _ => return Err(AuthError::InvalidInput("malformed email".to_string())),
        }
        if password.len() < self.min_password_len {
            return Err(AuthError::InvalidInput("password too short".to_string()));
        }
        Ok(())
    }

    /// Runs the refresh checks in order. Any error returned here before the
    /// final `Ok` leaves the store untouched.
    async fn check_refresh(
        &self,
        refresh_token: Option<&str>,
    ) -> Result<(User, RefreshClaims), AuthError> {
        let raw = refresh_token
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken)?;

        let claims = self
            .token_codec
            .verify_refresh_token(&RefreshToken(raw.to_string()))?;

        let user = self
            .session_store
            .find_by_id(claims.user_id)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if claims.token_version != user.token_version {
            return Err(AuthError::StaleVersion);
        }

        Ok((user, claims))
    }

    fn issue_pair(
        &self,
        user: &User,
        auth_time: Option<DateTime<Utc>>,
    ) -> Result<AuthTokens, AuthError> {
        let (access_token, access_exp) = self.token_codec.issue_access_token(user)?;
        let (refresh_token, refresh_exp) = match auth_time {
            Some(auth_time) => self
                .token_codec
                .issue_refresh_token_for_session(user, auth_time)?,
            None => self.token_codec.issue_refresh_token(user)?,
        };

        Ok(AuthTokens {
            access_token,
            refresh_token,
            access_token_expires_at: access_exp,
            refresh_token_expires_at: refresh_exp,
        })
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn register(&self, request: RegisterInput) -> Result<UserId, AuthError> {
        let email = Self::normalize_email(&request.email);
        self.validate_register(&email, &request.password)?;

        let password_hash = self
            .credential_hasher
            .hash_password(&request.password)
            .await?;
        let user = self
            .user_repo
            .create(UserId::new_random(), &email, &password_hash)
            .await?;

        info!(user_id = %user.id, "user registered");
        Ok(user.id)
    }

    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError> {
        let email = Self::normalize_email(&request.email);

        let creds = self
            .user_repo
            .get_credentials_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let ok = self
            .credential_hasher
            .verify_password(&request.password, &creds.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::InvalidCredentials);
        }

        let tokens = self.issue_tokens(&creds.user)?;
        info!(user_id = %creds.user.id, "user logged in");

        Ok(LoginResult {
            user_id: creds.user.id,
            tokens,
        })
    }

    fn issue_tokens(&self, user: &User) -> Result<AuthTokens, AuthError> {
        self.issue_pair(user, None)
    }

    async fn rotate(&self, refresh_token: Option<&str>) -> Result<RotateOutcome, AuthError> {
        match self.check_refresh(refresh_token).await {
            Ok((user, claims)) => {
                let auth_time = DateTime::from_timestamp(claims.auth_time, 0)
                    .ok_or_else(|| AuthError::InternalError("bad auth_time".to_string()))?;
                // Always re-issued, even though the version did not change.
                let tokens = self.issue_pair(&user, Some(auth_time))?;
                debug!(user_id = %user.id, version = %user.token_version, "refresh token rotated");
                Ok(RotateOutcome::Success(tokens))
            }
            Err(e) => match DenialReason::from_error(&e) {
                Some(reason) => {
                    info!(%reason, error = %e, "refresh denied");
                    Ok(RotateOutcome::Denied { reason })
                }
                None => Err(e),
            },
        }
    }

    async fn revoke_all(&self, user_id: UserId) -> Result<(), AuthError> {
        self.session_store.increment_token_version(user_id).await?;
        info!(%user_id, "all refresh tokens revoked");
        Ok(())
    }

    async fn verify_access(&self, token: &str) -> Result<UserId, AuthError> {
        let claims = self
            .token_codec
            .verify_access_token(&AccessToken(token.to_string()))?;

        if self
            .session_store
            .find_by_id(claims.user_id)
            .await?
            .is_none()
        {
            return Err(AuthError::UserNotFound);
        }

        Ok(claims.user_id)
    }

    async fn find_user(&self, user_id: UserId) -> Result<User, AuthError> {
        self.session_store
            .find_by_id(user_id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }
}
