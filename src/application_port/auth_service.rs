use crate::domain_model::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("refresh token missing")]
    MissingToken,
    #[error("token signature invalid")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("user not found")]
    UserNotFound,
    #[error("token version is stale")]
    StaleVersion,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("user already exists")]
    UserExists,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("internal error: {0}")]
    InternalError(String),
}

/// Why a refresh was refused. Only ever logged, never sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    Missing,
    Invalid,
    NoSuchUser,
    StaleVersion,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::Missing => "missing",
            DenialReason::Invalid => "invalid",
            DenialReason::NoSuchUser => "no_such_user",
            DenialReason::StaleVersion => "stale_version",
        }
    }

    /// Collapses a token-validation error into its denial reason. Errors that
    /// are not about the presented token (store failures and the like) have
    /// no reason and stay errors.
    pub fn from_error(error: &AuthError) -> Option<Self> {
        match error {
            AuthError::MissingToken => Some(DenialReason::Missing),
            AuthError::InvalidSignature | AuthError::Expired => Some(DenialReason::Invalid),
            AuthError::UserNotFound => Some(DenialReason::NoSuchUser),
            AuthError::StaleVersion => Some(DenialReason::StaleVersion),
            _ => None,
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum RotateOutcome {
    Success(AuthTokens),
    Denied { reason: DenialReason },
}

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user_id: UserId,
    pub tokens: AuthTokens,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessToken(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshToken(pub String);

#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub access_token: AccessToken,
    pub refresh_token: RefreshToken,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessClaims {
    pub user_id: UserId,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshClaims {
    pub user_id: UserId,
    pub token_version: TokenVersion,
    pub jti: String,
    /// Unix time of the login that started this chain of rotations.
    pub auth_time: i64,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

pub trait TokenCodec: Send + Sync {
    fn issue_access_token(&self, user: &User) -> Result<(AccessToken, DateTime<Utc>), AuthError>;

    fn issue_refresh_token(&self, user: &User)
    -> Result<(RefreshToken, DateTime<Utc>), AuthError>;

    /// Like `issue_refresh_token`, but keeps the login time of an existing session.
    fn issue_refresh_token_for_session(
        &self,
        user: &User,
        auth_time: DateTime<Utc>,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError>;

    fn verify_access_token(&self, token: &AccessToken) -> Result<AccessClaims, AuthError>;

    fn verify_refresh_token(&self, token: &RefreshToken) -> Result<RefreshClaims, AuthError>;
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, request: RegisterInput) -> Result<UserId, AuthError>;

    async fn login(&self, request: LoginInput) -> Result<LoginResult, AuthError>;

    /// Mints a fresh access/refresh pair for an already authenticated user.
    fn issue_tokens(&self, user: &User) -> Result<AuthTokens, AuthError>;

    /// Exchanges a refresh token for a new pair. `Err` is reserved for
    /// infrastructure failures; every problem with the token itself is a
    /// `RotateOutcome::Denied`.
    async fn rotate(&self, refresh_token: Option<&str>) -> Result<RotateOutcome, AuthError>;

    /// Invalidates every refresh token issued to the user so far.
    async fn revoke_all(&self, user_id: UserId) -> Result<(), AuthError>;

    async fn verify_access(&self, token: &str) -> Result<UserId, AuthError>;

    async fn find_user(&self, user_id: UserId) -> Result<User, AuthError>;
}
