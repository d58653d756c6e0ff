use super::cookie::CookiePolicy;
use super::error::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::logger::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use warp::http::header::SET_COOKIE;
use warp::{self, Reply, reject};

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiError>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(code: ApiErrorCode, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// What the refresh endpoint needs from the incoming request. The token is
/// only ever read from the cookie, never from the query string or body.
#[derive(Debug, Clone, Default)]
pub struct RefreshContext {
    pub refresh_token: Option<String>,
}

/// Applies the per-request deadline to a service call.
pub(super) async fn within<T, F>(deadline: Duration, fut: F) -> Result<T, ApiErrorCode>
where
    F: Future<Output = Result<T, AuthError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result.map_err(ApiErrorCode::from),
        Err(_) => {
            warn!(?deadline, "request deadline exceeded");
            Err(ApiErrorCode::Timeout)
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub ok: bool,
    pub access_token: String,
}

impl RefreshResponse {
    fn denied() -> warp::reply::Response {
        let body = RefreshResponse {
            ok: false,
            access_token: String::new(),
        };
        warp::reply::json(&body).into_response()
    }
}

pub async fn refresh_token(
    context: RefreshContext,
    auth_service: Arc<dyn AuthService>,
    cookie_policy: Arc<CookiePolicy>,
    deadline: Duration,
) -> Result<warp::reply::Response, warp::Rejection> {
    let outcome = within(
        deadline,
        auth_service.rotate(context.refresh_token.as_deref()),
    )
    .await;

    // Every failure looks the same to the client: 200, ok=false, no cookie.
    let tokens = match outcome {
        Ok(RotateOutcome::Success(tokens)) => tokens,
        Ok(RotateOutcome::Denied { .. }) => return Ok(RefreshResponse::denied()),
        Err(code) => {
            debug!(?code, "refresh failed");
            return Ok(RefreshResponse::denied());
        }
    };

    let cookie =
        cookie_policy.refresh_cookie(&tokens.refresh_token, tokens.refresh_token_expires_at);
    let body = RefreshResponse {
        ok: true,
        access_token: tokens.access_token.0,
    };
    Ok(warp::reply::with_header(warp::reply::json(&body), SET_COOKIE, cookie).into_response())
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user_id: UserId,
}

pub async fn register(
    body: RegisterRequest,
    auth_service: Arc<dyn AuthService>,
    deadline: Duration,
) -> Result<impl warp::Reply, warp::Rejection> {
    let register_input = RegisterInput {
        email: body.email,
        password: body.password,
    };
    let user_id = within(deadline, auth_service.register(register_input))
        .await
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(RegisterResponse {
        user_id,
    })))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user_id: UserId,
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
}

pub async fn login(
    body: LoginRequest,
    auth_service: Arc<dyn AuthService>,
    cookie_policy: Arc<CookiePolicy>,
    deadline: Duration,
) -> Result<impl warp::Reply, warp::Rejection> {
    let login_input = LoginInput {
        email: body.email,
        password: body.password,
    };
    let login_result = within(deadline, auth_service.login(login_input))
        .await
        .map_err(reject::custom)?;

    let tokens = login_result.tokens;
    let cookie =
        cookie_policy.refresh_cookie(&tokens.refresh_token, tokens.refresh_token_expires_at);
    let login_response = LoginResponse {
        user_id: login_result.user_id,
        access_token: tokens.access_token.0,
        access_token_expires_at: tokens.access_token_expires_at,
    };

    Ok(warp::reply::with_header(
        warp::reply::json(&ApiResponse::ok(login_response)),
        SET_COOKIE,
        cookie,
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    pub logged_out: bool,
}

pub async fn logout(
    cookie_policy: Arc<CookiePolicy>,
) -> Result<impl warp::Reply, warp::Rejection> {
    Ok(warp::reply::with_header(
        warp::reply::json(&ApiResponse::ok(LogoutResponse { logged_out: true })),
        SET_COOKIE,
        cookie_policy.clearing_cookie(),
    ))
}

#[derive(Debug, Serialize)]
pub struct RevokeResponse {
    pub revoked: bool,
}

/// Logout everywhere: every refresh token issued to the caller stops working.
pub async fn revoke_refresh_tokens(
    user_id: UserId,
    auth_service: Arc<dyn AuthService>,
    cookie_policy: Arc<CookiePolicy>,
    deadline: Duration,
) -> Result<impl warp::Reply, warp::Rejection> {
    within(deadline, auth_service.revoke_all(user_id))
        .await
        .map_err(reject::custom)?;

    Ok(warp::reply::with_header(
        warp::reply::json(&ApiResponse::ok(RevokeResponse { revoked: true })),
        SET_COOKIE,
        cookie_policy.clearing_cookie(),
    ))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MeResponse {
    pub id: UserId,
    pub email: String,
    pub token_version: TokenVersion,
}

pub async fn me(
    user_id: UserId,
    auth_service: Arc<dyn AuthService>,
    deadline: Duration,
) -> Result<impl warp::Reply, warp::Rejection> {
    let user = within(deadline, auth_service.find_user(user_id))
        .await
        .map_err(reject::custom)?;

    Ok(warp::reply::json(&ApiResponse::ok(MeResponse {
        id: user.id,
        email: user.email,
        token_version: user.token_version,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use warp::http::StatusCode;

    enum Failure {
        Store,
        Stall,
    }

    /// Only `rotate` is reachable from the refresh handler.
    struct UnavailableAuthService(Failure);

    #[async_trait::async_trait]
    impl AuthService for UnavailableAuthService {
        async fn register(&self, _request: RegisterInput) -> Result<UserId, AuthError> {
            unimplemented!()
        }

        async fn login(&self, _request: LoginInput) -> Result<LoginResult, AuthError> {
            unimplemented!()
        }

        fn issue_tokens(&self, _user: &User) -> Result<AuthTokens, AuthError> {
            unimplemented!()
        }

        async fn rotate(&self, _refresh_token: Option<&str>) -> Result<RotateOutcome, AuthError> {
            match self.0 {
                Failure::Store => Err(AuthError::Store("connection reset".to_string())),
                Failure::Stall => {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Err(AuthError::Store("unreachable".to_string()))
                }
            }
        }

        async fn revoke_all(&self, _user_id: UserId) -> Result<(), AuthError> {
            unimplemented!()
        }

        async fn verify_access(&self, _token: &str) -> Result<UserId, AuthError> {
            unimplemented!()
        }

        async fn find_user(&self, _user_id: UserId) -> Result<User, AuthError> {
            unimplemented!()
        }
    }

    async fn refresh_with(failure: Failure, deadline: Duration) -> warp::reply::Response {
        let context = RefreshContext {
            refresh_token: Some("a.b.c".to_string()),
        };
        let cookie_policy = Arc::new(CookiePolicy {
            path: "/".to_string(),
            secure: false,
        });
        refresh_token(
            context,
            Arc::new(UnavailableAuthService(failure)),
            cookie_policy,
            deadline,
        )
        .await
        .unwrap()
    }

    async fn assert_uniform_denial(response: warp::reply::Response) {
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get(SET_COOKIE).is_none());

        let body = warp::hyper::body::to_bytes(response.into_body())
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "ok": false, "accessToken": "" }));
    }

    #[tokio::test]
    async fn store_failure_answers_with_the_denial() {
        let response = refresh_with(Failure::Store, Duration::from_secs(5)).await;
        assert_uniform_denial(response).await;
    }

    #[tokio::test]
    async fn missed_deadline_answers_with_the_denial() {
        let started = std::time::Instant::now();
        let response = refresh_with(Failure::Stall, Duration::from_millis(20)).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_uniform_denial(response).await;
    }
}
