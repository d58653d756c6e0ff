#![allow(dead_code)]

use keyturn::api;
use keyturn::server::Server;
use keyturn::settings::{Auth, Cookie, Http, Log, Secret, Settings, Store};
use serde_json::{Value, json};
use std::sync::Arc;
use warp::Filter;
use warp::http::StatusCode;

pub const PASSWORD: &str = "correct horse battery";

pub fn test_settings() -> Settings {
    Settings {
        auth: Auth {
            issuer: "keyturn.test".to_string(),
            access_ttl_secs: 900,
            refresh_ttl_secs: 604_800,
            max_session_secs: None,
            min_password_len: 6,
            access_token_secret: Some(Secret::new("integration-access-secret")),
            refresh_token_secret: Some(Secret::new("integration-refresh-secret")),
        },
        cookie: Cookie::default(),
        http: Http {
            address: "127.0.0.1:0".to_string(),
            cert_path: None,
            key_path: None,
            cors_origin: None,
            request_timeout_secs: 5,
        },
        log: Log {
            filter: "info".to_string(),
        },
        store: Store {
            backend: "memory".to_string(),
            mysql_dsn: None,
            max_connections: 1,
            acquire_timeout_secs: 1,
        },
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub set_cookie: Option<String>,
    pub body: Value,
    pub raw_body: Vec<u8>,
}

impl TestResponse {
    /// Value of the `jwt` cookie set by this response, if any.
    pub fn refresh_cookie(&self) -> Option<String> {
        let header = self.set_cookie.as_deref()?;
        let (pair, _) = header.split_once(';')?;
        let value = pair.strip_prefix("jwt=")?;
        Some(value.to_string())
    }

    pub fn access_token(&self) -> String {
        self.body["data"]["accessToken"]
            .as_str()
            .expect("response carries an access token")
            .to_string()
    }
}

pub struct TestApp {
    pub server: Arc<Server>,
}

pub struct LoggedIn {
    pub user_id: String,
    pub access_token: String,
    pub refresh_token: String,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_settings(test_settings()).await
    }

    pub async fn with_settings(settings: Settings) -> Self {
        let server = Server::try_new(&settings)
            .await
            .expect("server starts with test settings");
        TestApp {
            server: Arc::new(server),
        }
    }

    pub async fn send(&self, request: warp::test::RequestBuilder) -> TestResponse {
        let filter = api::routes(self.server.clone()).recover(api::recover_error);
        let response = request.reply(&filter).await;

        let set_cookie = response
            .headers()
            .get("set-cookie")
            .map(|v| v.to_str().unwrap().to_string());
        let raw_body = response.body().to_vec();
        let body = serde_json::from_slice(&raw_body).unwrap_or(Value::Null);

        TestResponse {
            status: response.status(),
            set_cookie,
            body,
            raw_body,
        }
    }

    pub async fn register(&self, email: &str, password: &str) -> TestResponse {
        self.send(
            warp::test::request()
                .method("POST")
                .path("/register")
                .json(&json!({ "email": email, "password": password })),
        )
        .await
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        self.send(
            warp::test::request()
                .method("POST")
                .path("/login")
                .json(&json!({ "email": email, "password": password })),
        )
        .await
    }

    pub async fn refresh(&self, refresh_token: Option<&str>) -> TestResponse {
        let mut request = warp::test::request().method("POST").path("/refresh_token");
        if let Some(token) = refresh_token {
            request = request.header("cookie", format!("jwt={token}"));
        }
        self.send(request).await
    }

    pub async fn revoke(&self, access_token: &str) -> TestResponse {
        self.send(
            warp::test::request()
                .method("POST")
                .path("/revoke_refresh_tokens")
                .header("authorization", format!("Bearer {access_token}")),
        )
        .await
    }

    pub async fn me(&self, access_token: &str) -> TestResponse {
        self.send(
            warp::test::request()
                .method("GET")
                .path("/me")
                .header("authorization", format!("Bearer {access_token}")),
        )
        .await
    }

    /// Registers `email` and logs in, returning both tokens.
    pub async fn signed_up(&self, email: &str) -> LoggedIn {
        let registered = self.register(email, PASSWORD).await;
        assert_eq!(registered.status, StatusCode::OK, "{:?}", registered.body);

        let login = self.login(email, PASSWORD).await;
        assert_eq!(login.status, StatusCode::OK, "{:?}", login.body);

        LoggedIn {
            user_id: login.body["data"]["userId"].as_str().unwrap().to_string(),
            access_token: login.access_token(),
            refresh_token: login.refresh_cookie().expect("login sets the jwt cookie"),
        }
    }
}

/// The body every refused refresh gets, whatever the reason.
pub fn denied_body() -> Value {
    json!({ "ok": false, "accessToken": "" })
}
