/*!
 * Session tokens and cookies
 * HS256 JWT carried in an HttpOnly cookie; the subject is the user's openId.
 */
use axum::http::{header, HeaderMap};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SessionConfig;

/// JWT Claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    pub sub: String, // openId
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid session token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

#[derive(Clone)]
pub struct SessionManager {
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    pub fn cookie_name(&self) -> &str {
        &self.config.cookie_name
    }

    pub fn issue(&self, open_id: &str, name: Option<&str>) -> Result<String, SessionError> {
        let now = Utc::now();
        let exp = now + self.config.lifetime();

        let claims = SessionClaims {
            sub: open_id.to_string(),
            name: name.map(str::to_string),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        Ok(encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.secret.as_bytes()),
        )?)
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let data = decode::<SessionClaims>(
            token,
            &DecodingKey::from_secret(self.config.secret.as_bytes()),
            &Validation::default(),
        )?;
        Ok(data.claims)
    }

    /// Pull the session token out of the request's Cookie header(s).
    pub fn token_from_headers(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(name, _)| *name == self.config.cookie_name)
            .map(|(_, value)| value.trim_matches('"').to_string())
            .filter(|value| !value.is_empty())
    }

    fn attributes(&self) -> &'static str {
        if self.config.cookie_secure {
            "Path=/; HttpOnly; Secure; SameSite=None"
        } else {
            "Path=/; HttpOnly; SameSite=Lax"
        }
    }

    /// `Set-Cookie` value that stores a session token.
    pub fn session_cookie(&self, token: &str) -> String {
        format!(
            "{}={}; {}; Max-Age={}",
            self.config.cookie_name,
            token,
            self.attributes(),
            self.config.lifetime().num_seconds()
        )
    }

    /// `Set-Cookie` value that expires the session cookie immediately.
    pub fn clear_cookie(&self) -> String {
        format!(
            "{}=; {}; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT",
            self.config.cookie_name,
            self.attributes()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn manager() -> SessionManager {
        SessionManager::new(SessionConfig {
            secret: "test-secret".to_string(),
            ..SessionConfig::default()
        })
    }

    #[test]
    fn test_issue_then_verify() {
        let sessions = manager();
        let token = sessions.issue("oid-42", Some("Grace")).unwrap();
        let claims = sessions.verify(&token).unwrap();
        assert_eq!(claims.sub, "oid-42");
        assert_eq!(claims.name.as_deref(), Some("Grace"));
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_oversized_ttl_still_issues_tokens() {
        let sessions = SessionManager::new(SessionConfig {
            ttl_days: i64::MAX,
            ..SessionConfig::default()
        });
        let token = sessions.issue("oid-42", None).unwrap();
        assert_eq!(sessions.verify(&token).unwrap().sub, "oid-42");
        assert!(sessions
            .session_cookie(&token)
            .contains(&format!("Max-Age={}", 3650 * 24 * 60 * 60)));
    }

    #[test]
    fn test_verify_rejects_foreign_secret() {
        let token = manager().issue("oid-42", None).unwrap();
        let other = SessionManager::new(SessionConfig {
            secret: "another-secret".to_string(),
            ..SessionConfig::default()
        });
        assert!(other.verify(&token).is_err());
        assert!(manager().verify("invalid.jwt.token").is_err());
    }

    #[test]
    fn test_token_from_cookie_header() {
        let sessions = manager();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; app_session_id=abc.def.ghi; other=1"),
        );
        assert_eq!(
            sessions.token_from_headers(&headers).as_deref(),
            Some("abc.def.ghi")
        );

        let mut empty = HeaderMap::new();
        empty.insert(header::COOKIE, HeaderValue::from_static("app_session_id="));
        assert!(sessions.token_from_headers(&empty).is_none());
        assert!(sessions.token_from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_clear_cookie_is_already_expired() {
        let cookie = manager().clear_cookie();
        assert!(cookie.starts_with("app_session_id=;"));
        assert!(cookie.contains("Max-Age=0"));
        assert!(cookie.contains("HttpOnly"));
    }

    #[test]
    fn test_secure_cookie_uses_samesite_none() {
        let sessions = SessionManager::new(SessionConfig {
            cookie_secure: true,
            ..SessionConfig::default()
        });
        let cookie = sessions.session_cookie("tok");
        assert!(cookie.contains("Secure; SameSite=None"));
        assert!(cookie.contains(&format!("Max-Age={}", 365 * 24 * 60 * 60)));
    }
}
