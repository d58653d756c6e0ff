use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

/// Process-local user table. Nothing survives a restart; meant for
/// development and tests.
#[derive(Default)]
pub struct MemoryUserStore {
    users: DashMap<UserId, UserCredentials>,
    emails: DashMap<String, UserId>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserStore {
    async fn create(
        &self,
        user_id: UserId,
        email: &str,
        password_hash: &str,
    ) -> Result<User, AuthError> {
        match self.emails.entry(email.to_string()) {
            Entry::Occupied(_) => Err(AuthError::UserExists),
            Entry::Vacant(slot) => {
                let user = User {
                    id: user_id,
                    email: email.to_string(),
                    token_version: TokenVersion::default(),
                    created_at: Utc::now(),
                };
                self.users.insert(
                    user_id,
                    UserCredentials {
                        user: user.clone(),
                        password_hash: password_hash.to_string(),
                    },
                );
                slot.insert(user_id);
                Ok(user)
            }
        }
    }

    async fn get_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, AuthError> {
        let Some(user_id) = self.emails.get(email).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&user_id).map(|row| row.value().clone()))
    }
}

#[async_trait::async_trait]
impl SessionStore for MemoryUserStore {
    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>, AuthError> {
        Ok(self.users.get(&user_id).map(|row| row.user.clone()))
    }

    async fn increment_token_version(&self, user_id: UserId) -> Result<(), AuthError> {
        // get_mut holds the shard write lock, so concurrent bumps serialize.
        let mut row = self
            .users
            .get_mut(&user_id)
            .ok_or(AuthError::UserNotFound)?;
        row.user.token_version = row
            .user
            .token_version
            .next()
            .ok_or_else(|| AuthError::Store(format!("token version exhausted for {user_id}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn new_users_start_at_version_zero() {
        let store = MemoryUserStore::new();
        let id = UserId::new_random();

        let user = store.create(id, "bob@example.com", "hash").await.unwrap();
        assert_eq!(user.token_version, TokenVersion(0));

        let found = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(found.email, "bob@example.com");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let store = MemoryUserStore::new();
        store
            .create(UserId::new_random(), "bob@example.com", "hash")
            .await
            .unwrap();

        let again = store
            .create(UserId::new_random(), "bob@example.com", "hash")
            .await;
        assert!(matches!(again, Err(AuthError::UserExists)));
    }

    #[tokio::test]
    async fn credentials_are_found_by_email() {
        let store = MemoryUserStore::new();
        let id = UserId::new_random();
        store.create(id, "carol@example.com", "phc").await.unwrap();

        let creds = store
            .get_credentials_by_email("carol@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(creds.user.id, id);
        assert_eq!(creds.password_hash, "phc");

        assert!(
            store
                .get_credentials_by_email("nobody@example.com")
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn increment_of_unknown_user_fails() {
        let store = MemoryUserStore::new();
        let result = store.increment_token_version(UserId::new_random()).await;
        assert!(matches!(result, Err(AuthError::UserNotFound)));
    }

    #[tokio::test]
    async fn exhausted_version_fails_instead_of_standing_still() {
        let store = MemoryUserStore::new();
        let id = UserId::new_random();
        store.create(id, "erin@example.com", "hash").await.unwrap();
        store.users.get_mut(&id).unwrap().user.token_version = TokenVersion(u32::MAX);

        let result = store.increment_token_version(id).await;
        assert!(matches!(result, Err(AuthError::Store(_))));

        let user = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.token_version, TokenVersion(u32::MAX));
    }

    #[tokio::test]
    async fn concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryUserStore::new());
        let id = UserId::new_random();
        store.create(id, "dave@example.com", "hash").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.increment_token_version(id).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let user = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(user.token_version, TokenVersion(32));
    }
}
