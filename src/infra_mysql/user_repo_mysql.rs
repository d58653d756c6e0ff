use super::util::is_dup_key;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

const CREATE_USER_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS user (
    user_id       BINARY(16)   NOT NULL PRIMARY KEY,
    email         VARCHAR(255) NOT NULL UNIQUE,
    password_hash VARCHAR(255) NOT NULL,
    token_version INT UNSIGNED NOT NULL DEFAULT 0,
    created_at    TIMESTAMP(6) NOT NULL DEFAULT CURRENT_TIMESTAMP(6)
)
"#;

pub struct MySqlUserRepo {
    pool: MySqlPool,
}

impl MySqlUserRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlUserRepo { pool }
    }

    /// Creates the `user` table when it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), AuthError> {
        sqlx::query(CREATE_USER_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| AuthError::Store(format!("create user table: {e}")))?;
        Ok(())
    }

    fn row_to_user(row: &MySqlRow) -> Result<User, AuthError> {
        let id: UserId = row
            .try_get("user_id")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let email: String = row
            .try_get("email")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let token_version: TokenVersion = row
            .try_get("token_version")
            .map_err(|e| AuthError::Store(e.to_string()))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| AuthError::Store(e.to_string()))?;

        Ok(User {
            id,
            email,
            token_version,
            created_at,
        })
    }
}

#[async_trait::async_trait]
impl UserRepo for MySqlUserRepo {
    async fn create(
        &self,
        user_id: UserId,
        email: &str,
        password_hash: &str,
    ) -> Result<User, AuthError> {
        sqlx::query(
            r#"
INSERT INTO user (user_id, email, password_hash, token_version)
VALUES (?, ?, ?, 0)
"#,
        )
        .bind(user_id)
        .bind(email)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                AuthError::UserExists
            } else {
                AuthError::Store(e.to_string())
            }
        })?;

        self.find_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::Store("inserted user vanished".to_string()))
    }

    async fn get_credentials_by_email(
        &self,
        email: &str,
    ) -> Result<Option<UserCredentials>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT user_id, email, password_hash, token_version, created_at
FROM user
WHERE email = ?
"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Store(e.to_string()))?;

        row_opt
            .map(|row| {
                let user = Self::row_to_user(&row)?;
                let password_hash: String = row
                    .try_get("password_hash")
                    .map_err(|e| AuthError::Store(e.to_string()))?;
                Ok(UserCredentials {
                    user,
                    password_hash,
                })
            })
            .transpose()
    }
}

#[async_trait::async_trait]
impl SessionStore for MySqlUserRepo {
    async fn find_by_id(&self, user_id: UserId) -> Result<Option<User>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT user_id, email, token_version, created_at
FROM user
WHERE user_id = ?
"#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("query user: {e}")))?;

        row_opt.as_ref().map(Self::row_to_user).transpose()
    }

    async fn increment_token_version(&self, user_id: UserId) -> Result<(), AuthError> {
        // Single statement; the row lock makes concurrent bumps serialize.
        let result = sqlx::query(
            r#"
UPDATE user
SET token_version = token_version + 1
WHERE user_id = ?
"#,
        )
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AuthError::Store(format!("increment token_version: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(AuthError::UserNotFound);
        }
        Ok(())
    }
}
