use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    /// Default `source` stamped on ingested events.
    pub name: String,
    pub timeout_secs: u64,
    /// Local feed document read instead of `url` when set.
    pub file: Option<String>,
}

impl FeedConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn is_production(self) -> bool {
        self == Environment::Production
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Postgres URL; unset runs on in-memory stores.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
    pub feed: FeedConfig,
    pub cors_origin: String,
    pub environment: Environment,
}

pub const DEFAULT_FEED_URL: &str = "https://www.gdacs.org/xml/rss.xml";

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET").context("JWT_SECRET is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "disasterwatch".into()),
            audience: std::env::var("JWT_AUDIENCE")
                .unwrap_or_else(|_| "disasterwatch-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(60),
        };
        let feed = FeedConfig {
            url: std::env::var("FEED_URL").unwrap_or_else(|_| DEFAULT_FEED_URL.into()),
            name: std::env::var("FEED_NAME").unwrap_or_else(|_| "GDACS".into()),
            timeout_secs: env_parse("FEED_TIMEOUT_SECS").unwrap_or(10),
            file: std::env::var("FEED_FILE").ok().filter(|v| !v.trim().is_empty()),
        };
        let port = env_parse("APP_PORT")
            .or_else(|| env_parse("PORT"))
            .unwrap_or(5000);

        Ok(Self {
            host: std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port,
            database_url,
            jwt,
            feed,
            cors_origin: std::env::var("CORS_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
            environment: std::env::var("APP_ENV")
                .map(|v| Environment::parse(&v))
                .unwrap_or(Environment::Development),
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
