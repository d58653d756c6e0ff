//! Refresh-token cookie delivery.

use crate::application_port::RefreshToken;
use chrono::{DateTime, Utc};

/// Cookie carrying the refresh token. Script never sees it (`HttpOnly`).
pub const REFRESH_COOKIE_NAME: &str = "jwt";

#[derive(Debug, Clone)]
pub struct CookiePolicy {
    pub path: String,
    pub secure: bool,
}

impl CookiePolicy {
    /// `Set-Cookie` value for a freshly issued refresh token. `Max-Age` ends
    /// together with the token.
    pub fn refresh_cookie(&self, token: &RefreshToken, expires_at: DateTime<Utc>) -> String {
        let max_age = (expires_at - Utc::now()).num_seconds().max(0);
        self.render(&token.0, max_age)
    }

    /// `Set-Cookie` value that makes the browser drop the refresh token.
    pub fn clearing_cookie(&self) -> String {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age: i64) -> String {
        let secure = if self.secure { "; Secure" } else { "" };
        format!(
            "{}={}; HttpOnly; SameSite=Strict; Path={}; Max-Age={}{}",
            REFRESH_COOKIE_NAME, value, self.path, max_age, secure
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn policy(secure: bool) -> CookiePolicy {
        CookiePolicy {
            path: "/".to_string(),
            secure,
        }
    }

    #[test]
    fn refresh_cookie_is_http_only_and_same_site() {
        let cookie = policy(false).refresh_cookie(
            &RefreshToken("abc.def.ghi".to_string()),
            Utc::now() + Duration::days(7),
        );

        assert!(cookie.starts_with("jwt=abc.def.ghi; "));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Path=/"));
        assert!(!cookie.contains("Secure"));
    }

    #[test]
    fn max_age_follows_token_expiry() {
        let cookie = policy(false).refresh_cookie(
            &RefreshToken("t".to_string()),
            Utc::now() + Duration::seconds(3600),
        );
        let max_age: i64 = cookie
            .split("Max-Age=")
            .nth(1)
            .unwrap()
            .parse()
            .unwrap();
        assert!((3598..=3600).contains(&max_age));
    }

    #[test]
    fn secure_flag_is_appended_when_enabled() {
        let cookie = policy(true).refresh_cookie(
            &RefreshToken("t".to_string()),
            Utc::now() + Duration::days(1),
        );
        assert!(cookie.ends_with("; Secure"));
    }

    #[test]
    fn clearing_cookie_expires_immediately() {
        assert_eq!(
            policy(false).clearing_cookie(),
            "jwt=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0"
        );
    }
}
