//! Process configuration, read once from the environment at startup.

use chrono::Duration;
use std::net::SocketAddr;

pub const DEFAULT_JWT_SECRET: &str = "default-jwt-secret-change-in-production";
pub const DEFAULT_COOKIE_NAME: &str = "app_session_id";
/// Longest session lifetime honoured, in days.
pub const MAX_SESSION_TTL_DAYS: i64 = 3650;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: String,
    pub host: String,
    pub port: u16,
    /// `openId` of the site owner; that identity is promoted to admin on login.
    pub owner_open_id: Option<String>,
    pub session: SessionConfig,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secret: String,
    pub cookie_name: String,
    /// `Secure; SameSite=None` when set, `SameSite=Lax` otherwise.
    pub cookie_secure: bool,
    pub ttl_days: i64,
}

impl SessionConfig {
    /// Session lifetime, clamped to `1..=MAX_SESSION_TTL_DAYS` days.
    pub fn lifetime(&self) -> Duration {
        Duration::days(self.ttl_days.clamp(1, MAX_SESSION_TTL_DAYS))
    }
}

/// Positive day counts only; anything above the maximum is capped.
fn parse_ttl_days(raw: Option<String>) -> Option<i64> {
    raw?.trim()
        .parse::<i64>()
        .ok()
        .filter(|days| *days > 0)
        .map(|days| days.min(MAX_SESSION_TTL_DAYS))
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: DEFAULT_JWT_SECRET.to_string(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            cookie_secure: false,
            ttl_days: 365,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3001,
            owner_open_id: None,
            session: SessionConfig::default(),
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://127.0.0.1:3000".to_string(),
            ],
        }
    }
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let environment =
            std::env::var("ENVIRONMENT").unwrap_or_else(|_| defaults.environment.clone());
        let is_production = environment == "production";

        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .or_else(|| std::env::var("FRONTEND_ORIGIN").ok().map(|o| vec![o]))
            .unwrap_or(defaults.allowed_origins);

        Self {
            host: std::env::var("HOST").unwrap_or(defaults.host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            owner_open_id: std::env::var("OWNER_OPEN_ID")
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            session: SessionConfig {
                secret: std::env::var("JWT_SECRET").unwrap_or(defaults.session.secret),
                cookie_name: std::env::var("SESSION_COOKIE_NAME")
                    .unwrap_or(defaults.session.cookie_name),
                cookie_secure: env_flag("SESSION_COOKIE_SECURE").unwrap_or(is_production),
                ttl_days: parse_ttl_days(std::env::var("SESSION_TTL_DAYS").ok())
                    .unwrap_or(defaults.session.ttl_days),
            },
            allowed_origins,
            environment,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    /// Refuse to run in production with the insecure default secret.
    pub fn check_production_secrets(&self) -> Result<(), String> {
        if self.is_production()
            && (self.session.secret.is_empty() || self.session.secret == DEFAULT_JWT_SECRET)
        {
            return Err(
                "JWT_SECRET must be set to a secure, unique value in production".to_string(),
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_binds_localhost() {
        let config = AppConfig::default();
        assert_eq!(config.bind_addr().unwrap().port(), 3001);
        assert_eq!(config.session.cookie_name, DEFAULT_COOKIE_NAME);
        assert!(config.owner_open_id.is_none());
    }

    #[test]
    fn test_session_ttl_parsing_caps_huge_values() {
        assert_eq!(parse_ttl_days(Some("30".to_string())), Some(30));
        assert_eq!(parse_ttl_days(Some("0".to_string())), None);
        assert_eq!(parse_ttl_days(Some("-5".to_string())), None);
        assert_eq!(parse_ttl_days(Some("soon".to_string())), None);
        assert_eq!(parse_ttl_days(None), None);
        assert_eq!(
            parse_ttl_days(Some("9223372036854775807".to_string())),
            Some(MAX_SESSION_TTL_DAYS)
        );
    }

    #[test]
    fn test_lifetime_is_clamped() {
        let huge = SessionConfig {
            ttl_days: i64::MAX,
            ..SessionConfig::default()
        };
        assert_eq!(huge.lifetime(), Duration::days(MAX_SESSION_TTL_DAYS));
        let zero = SessionConfig {
            ttl_days: 0,
            ..SessionConfig::default()
        };
        assert_eq!(zero.lifetime(), Duration::days(1));
    }

    #[test]
    fn test_production_rejects_default_secret() {
        let mut config = AppConfig {
            environment: "production".to_string(),
            ..AppConfig::default()
        };
        assert!(config.check_production_secrets().is_err());

        config.session.secret = "a-real-secret-value".to_string();
        assert!(config.check_production_secrets().is_ok());

        let dev = AppConfig::default();
        assert!(dev.check_production_secrets().is_ok());
    }
}
