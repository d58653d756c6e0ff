use super::cookie::REFRESH_COOKIE_NAME;
use super::error::*;
use super::handler::{self, RefreshContext, within};
use crate::application_port::AuthService;
use crate::domain_model::UserId;
use crate::server::*;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use warp::{Filter, reject};

const JSON_BODY_LIMIT: u64 = 16 * 1024;

pub fn routes(
    server: Arc<Server>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let deadline = server.request_timeout;

    let index = warp::path::end()
        .and(warp::get())
        .map(|| "keyturn is running");

    let refresh_token = warp::path("refresh_token")
        .and(warp::path::end())
        .and(warp::post())
        .and(refresh_context())
        .and(with(server.auth_service.clone()))
        .and(with(server.cookie_policy.clone()))
        .and(with_deadline(deadline))
        .and_then(handler::refresh_token);

    let register = warp::path("register")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and(with_deadline(deadline))
        .and_then(handler::register);

    let login = warp::path("login")
        .and(warp::path::end())
        .and(warp::post())
        .and(json_body())
        .and(with(server.auth_service.clone()))
        .and(with(server.cookie_policy.clone()))
        .and(with_deadline(deadline))
        .and_then(handler::login);

    let logout = warp::path("logout")
        .and(warp::path::end())
        .and(warp::post())
        .and(with(server.cookie_policy.clone()))
        .and_then(handler::logout);

    let revoke = warp::path("revoke_refresh_tokens")
        .and(warp::path::end())
        .and(warp::post())
        .and(with_verification(server.auth_service.clone(), deadline))
        .and(with(server.auth_service.clone()))
        .and(with(server.cookie_policy.clone()))
        .and(with_deadline(deadline))
        .and_then(handler::revoke_refresh_tokens);

    let me = warp::path("me")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_verification(server.auth_service.clone(), deadline))
        .and(with(server.auth_service.clone()))
        .and(with_deadline(deadline))
        .and_then(handler::me);

    index
        .or(refresh_token)
        .or(register)
        .or(login)
        .or(logout)
        .or(revoke)
        .or(me)
}

fn with<ServiceType>(
    service: Arc<ServiceType>,
) -> impl Filter<Extract = (Arc<ServiceType>,), Error = Infallible> + Clone
where
    ServiceType: Send + Sync + ?Sized,
{
    warp::any().map(move || service.clone())
}

fn with_deadline(
    deadline: Duration,
) -> impl Filter<Extract = (Duration,), Error = Infallible> + Clone {
    warp::any().map(move || deadline)
}

fn json_body<T>() -> impl Filter<Extract = (T,), Error = warp::Rejection> + Clone
where
    T: serde::de::DeserializeOwned + Send,
{
    warp::body::content_length_limit(JSON_BODY_LIMIT).and(warp::body::json())
}

fn refresh_context() -> impl Filter<Extract = (RefreshContext,), Error = Infallible> + Clone {
    warp::cookie::optional(REFRESH_COOKIE_NAME)
        .map(|refresh_token: Option<String>| RefreshContext { refresh_token })
}

fn with_verification(
    auth_service: Arc<dyn AuthService>,
    deadline: Duration,
) -> impl Filter<Extract = (UserId,), Error = warp::Rejection> + Clone {
    warp::header::optional::<String>("authorization").and_then(
        move |header: Option<String>| {
            let auth_service = auth_service.clone();
            async move {
                let token = header
                    .as_deref()
                    .and_then(|h| h.strip_prefix("Bearer "))
                    .ok_or_else(|| reject::custom(ApiErrorCode::InvalidToken))?;
                let user_id = within(deadline, auth_service.verify_access(token))
                    .await
                    .map_err(reject::custom)?;
                Ok::<UserId, warp::Rejection>(user_id)
            }
        },
    )
}
