use crate::api::CookiePolicy;
use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::logger::*;
use crate::settings::{Auth, Settings};
use anyhow::anyhow;
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use std::time::Duration;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pub cookie_policy: Arc<CookiePolicy>,
    pub request_timeout: Duration,
    pool: Option<MySqlPool>,
}

/// Builds the signer configuration. Both secrets must be present, non-empty
/// and different; anything else stops the process before it serves requests.
pub fn jwt_config(auth: &Auth) -> Result<JwtConfig, AuthError> {
    let access_secret = auth
        .access_token_secret
        .as_ref()
        .ok_or_else(|| AuthError::Configuration("access token secret is not set".to_string()))?;
    let refresh_secret = auth
        .refresh_token_secret
        .as_ref()
        .ok_or_else(|| AuthError::Configuration("refresh token secret is not set".to_string()))?;

    Ok(JwtConfig {
        issuer: auth.issuer.clone(),
        access_ttl: secs(auth.access_ttl_secs)?,
        refresh_ttl: secs(auth.refresh_ttl_secs)?,
        max_session: auth.max_session_secs.map(secs).transpose()?,
        access_secret: access_secret.expose().as_bytes().to_vec(),
        refresh_secret: refresh_secret.expose().as_bytes().to_vec(),
    })
}

fn secs(value: u64) -> Result<chrono::Duration, AuthError> {
    i64::try_from(value)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .ok_or_else(|| AuthError::Configuration(format!("duration out of range: {value}s")))
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let jwt_config = jwt_config(&settings.auth)?;
        debug!(?jwt_config);
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::try_new(jwt_config)?);
        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher);

        let (user_repo, session_store, pool): (
            Arc<dyn UserRepo>,
            Arc<dyn SessionStore>,
            Option<MySqlPool>,
        ) = match settings.store.backend.as_str() {
            "memory" => {
                warn!("using the in-memory store; users and token versions are lost on restart");
                let store = Arc::new(MemoryUserStore::new());
                let user_repo: Arc<dyn UserRepo> = store.clone();
                let session_store: Arc<dyn SessionStore> = store;
                (user_repo, session_store, None)
            }
            "mysql" => {
                let dsn = settings.store.mysql_dsn.as_ref().ok_or_else(|| {
                    AuthError::Configuration(
                        "store.mysql_dsn is required for the mysql backend".to_string(),
                    )
                })?;
                let pool = MySqlPoolOptions::new()
                    .max_connections(settings.store.max_connections)
                    .acquire_timeout(Duration::from_secs(settings.store.acquire_timeout_secs))
                    .connect(dsn.expose())
                    .await?;
                let repo = Arc::new(MySqlUserRepo::new(pool.clone()));
                repo.ensure_schema().await?;
                let user_repo: Arc<dyn UserRepo> = repo.clone();
                let session_store: Arc<dyn SessionStore> = repo;
                (user_repo, session_store, Some(pool))
            }
            other => return Err(anyhow!("Unknown store backend: {}", other)),
        };

        let auth_service: Arc<dyn AuthService> = Arc::new(
            RealAuthService::new(user_repo, session_store, credential_hasher, token_codec)
                .with_min_password_len(settings.auth.min_password_len),
        );

        let cookie_policy = Arc::new(CookiePolicy {
            path: settings.cookie.path.clone(),
            secure: settings.cookie.secure,
        });

        info!(backend = %settings.store.backend, "server started");

        Ok(Self {
            auth_service,
            cookie_policy,
            request_timeout: Duration::from_secs(settings.http.request_timeout_secs),
            pool,
        })
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}
