use crate::application_port::*;
use crate::domain_model::*;

/// Owner of the per-user `token_version` counter.
#[async_trait::async_trait]
pub trait SessionStore: Send + Sync {
    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>, AuthError>;

    /// Atomically bumps the user's token version by one.
    /// Fails with `AuthError::UserNotFound` when there is no such user.
    async fn increment_token_version(&self, user_id: UserId) -> Result<(), AuthError>;
}
