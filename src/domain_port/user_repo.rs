use crate::application_port::*;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    /// Insert a user with token version 0. Fails with `AuthError::UserExists`
    /// when the email is taken.
    async fn create(
        &self,
        user_id: UserId,
        email: &str,
        password_hash: &str,
    ) -> Result<User, AuthError>;

    /// Fetch a user and its password hash by email (for login).
    async fn get_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, AuthError>;
}
