//! Application configuration loaded from environment variables.

use std::env;

use blog_infra::database::DatabaseConfig;

#[cfg(feature = "rate-limit")]
use blog_infra::RateLimitConfig;

/// Which mail transport to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailBackend {
    Smtp,
    Console,
    Memory,
}

impl MailBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "smtp" => Some(MailBackend::Smtp),
            "console" => Some(MailBackend::Console),
            "memory" => Some(MailBackend::Memory),
            _ => None,
        }
    }
}

/// Mail configuration.
#[derive(Debug, Clone)]
pub struct MailConfig {
    /// Sender address for outgoing mail.
    pub from: String,
    pub backend: MailBackend,
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: Option<DatabaseConfig>,
    pub mail: MailConfig,
    #[cfg(feature = "rate-limit")]
    pub rate_limit: RateLimitConfig,
    /// Expose the `/admin/` endpoints.
    pub admin_enabled: bool,
    /// Trust `Forwarded` / `X-Forwarded-For` for client addresses.
    pub trust_proxy_headers: bool,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database = env::var("DATABASE_URL").ok().map(|url| {
            let defaults = DatabaseConfig::new(url);
            DatabaseConfig {
                max_connections: env::var("DB_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.max_connections),
                min_connections: env::var("DB_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.min_connections),
                ..defaults
            }
        });

        let backend = match env::var("MAIL_BACKEND") {
            Ok(value) => MailBackend::parse(&value).unwrap_or_else(|| {
                tracing::warn!(value = %value, "Unknown MAIL_BACKEND, using console");
                MailBackend::Console
            }),
            Err(_) => MailBackend::Console,
        };

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            database,
            mail: MailConfig {
                from: env::var("BLOG_MAIL_FROM")
                    .unwrap_or_else(|_| "webmaster@localhost".to_string()),
                backend,
            },
            #[cfg(feature = "rate-limit")]
            rate_limit: RateLimitConfig::from_env(),
            admin_enabled: env_flag("BLOG_ADMIN_ENABLED"),
            trust_proxy_headers: env_flag("BLOG_TRUST_PROXY_HEADERS"),
        }
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false)
}
