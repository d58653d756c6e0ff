use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

#[derive(Clone)]
pub struct JwtConfig {
    pub issuer: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    /// Upper bound on a session measured from the original login. `None`
    /// lets every rotation slide the session forward indefinitely.
    pub max_session: Option<Duration>,
    pub access_secret: Vec<u8>,
    pub refresh_secret: Vec<u8>,
}

impl fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtConfig")
            .field("issuer", &self.issuer)
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("max_session", &self.max_session)
            .field("access_secret", &"<redacted>")
            .field("refresh_secret", &"<redacted>")
            .finish()
    }
}

impl JwtConfig {
    fn validate(&self) -> Result<(), AuthError> {
        if self.access_secret.is_empty() {
            return Err(AuthError::Configuration(
                "access token secret is missing".to_string(),
            ));
        }
        if self.refresh_secret.is_empty() {
            return Err(AuthError::Configuration(
                "refresh token secret is missing".to_string(),
            ));
        }
        if self.access_secret == self.refresh_secret {
            return Err(AuthError::Configuration(
                "access and refresh token secrets must differ".to_string(),
            ));
        }
        Ok(())
    }
}

fn sign<C: Serialize>(claims: &C, key: &EncodingKey) -> Result<String, AuthError> {
    encode(&Header::new(Algorithm::HS256), claims, key)
        .map_err(|e| AuthError::InternalError(e.to_string()))
}

/// Checks signature, issuer and expiry (no leeway) and returns the claims.
pub fn verify<C: DeserializeOwned>(
    token: &str,
    key: &DecodingKey,
    issuer: &str,
) -> Result<C, AuthError> {
    let mut v = Validation::new(Algorithm::HS256);
    v.leeway = 0;
    v.validate_exp = true;
    v.set_issuer(&[issuer]);
    let data = decode::<C>(token, key, &v).map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        _ => AuthError::InvalidSignature,
    })?;
    Ok(data.claims)
}

fn to_datetime(ts: i64) -> Result<DateTime<Utc>, AuthError> {
    DateTime::from_timestamp(ts, 0).ok_or(AuthError::InvalidSignature)
}

pub struct JwtHs256Codec {
    cfg: JwtConfig,
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
}

impl JwtHs256Codec {
    pub fn try_new(cfg: JwtConfig) -> Result<Self, AuthError> {
        cfg.validate()?;
        Ok(JwtHs256Codec {
            access_encoding: EncodingKey::from_secret(&cfg.access_secret),
            access_decoding: DecodingKey::from_secret(&cfg.access_secret),
            refresh_encoding: EncodingKey::from_secret(&cfg.refresh_secret),
            refresh_decoding: DecodingKey::from_secret(&cfg.refresh_secret),
            cfg,
        })
    }

    #[inline]
    fn gen_jti() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn session_deadline(&self, auth_time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.cfg.max_session.map(|max| auth_time + max)
    }
}

impl TokenCodec for JwtHs256Codec {
    fn issue_access_token(&self, user: &User) -> Result<(AccessToken, DateTime<Utc>), AuthError> {
        let iat_dt = Utc::now();
        let exp_dt = iat_dt + self.cfg.access_ttl;
        let claims = AccessClaims {
            user_id: user.id,
            iat: iat_dt.timestamp(),
            exp: exp_dt.timestamp(),
            iss: self.cfg.issuer.clone(),
        };
        let token = sign(&claims, &self.access_encoding)?;
        Ok((AccessToken(token), exp_dt))
    }

    fn issue_refresh_token(
        &self,
        user: &User,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError> {
        self.issue_refresh_token_for_session(user, Utc::now())
    }

    fn issue_refresh_token_for_session(
        &self,
        user: &User,
        auth_time: DateTime<Utc>,
    ) -> Result<(RefreshToken, DateTime<Utc>), AuthError> {
        let iat_dt = Utc::now();
        let mut exp_dt = iat_dt + self.cfg.refresh_ttl;
        if let Some(deadline) = self.session_deadline(auth_time) {
            exp_dt = exp_dt.min(deadline);
        }
        let claims = RefreshClaims {
            user_id: user.id,
            token_version: user.token_version,
            jti: Self::gen_jti(),
            auth_time: auth_time.timestamp(),
            iat: iat_dt.timestamp(),
            exp: exp_dt.timestamp(),
            iss: self.cfg.issuer.clone(),
        };
        let token = sign(&claims, &self.refresh_encoding)?;
        Ok((RefreshToken(token), exp_dt))
    }

    fn verify_access_token(&self, token: &AccessToken) -> Result<AccessClaims, AuthError> {
        verify(&token.0, &self.access_decoding, &self.cfg.issuer)
    }

    fn verify_refresh_token(&self, token: &RefreshToken) -> Result<RefreshClaims, AuthError> {
        let claims: RefreshClaims = verify(&token.0, &self.refresh_decoding, &self.cfg.issuer)?;
        if let Some(deadline) = self.session_deadline(to_datetime(claims.auth_time)?) {
            if Utc::now() >= deadline {
                return Err(AuthError::Expired);
            }
        }
        Ok(claims)
    }
}
