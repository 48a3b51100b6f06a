use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
    /// Lifetime of email verification and password reset links.
    pub email_ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
    pub from_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base URL under which uploaded objects are publicly reachable.
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub api_host: String,
    pub api_port: u16,
    /// Used to build links in outgoing emails.
    pub public_url: String,
    pub database_url: String,
    pub db_max_connections: u32,
    pub redis_url: String,
    pub cors_origins: Vec<String>,
    pub static_dir: String,
    /// Take the client address from `X-Forwarded-For`. Only safe behind a
    /// proxy that overwrites the header.
    pub trust_forwarded_for: bool,
    pub jwt: JwtConfig,
    pub mail: MailConfig,
    pub storage: StorageConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let api_host = std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let api_port = parse_or("APP_PORT", 8000);
        let public_url = std::env::var("APP_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", api_port));
        let cors_origins = std::env::var("CORS_ORIGINS")
            .map(|v| split_list(&v))
            .unwrap_or_else(|_| vec![format!("http://{}:{}", api_host, api_port)]);

        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "contacts-api".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "contacts-users".into()),
            ttl_minutes: parse_or("JWT_TTL_MINUTES", 15),
            refresh_ttl_minutes: parse_or("JWT_REFRESH_TTL_MINUTES", 60 * 24 * 7),
            email_ttl_minutes: parse_or("JWT_EMAIL_TTL_MINUTES", 60 * 24),
        };

        let mail = MailConfig {
            server: required("MAIL_SERVER")?,
            port: parse_or("MAIL_PORT", 465),
            username: required("MAIL_USERNAME")?,
            password: required("MAIL_PASSWORD")?,
            from: required("MAIL_FROM")?,
            from_name: std::env::var("MAIL_FROM_NAME").unwrap_or_else(|_| "Contacts API".into()),
        };

        let endpoint = required("STORAGE_ENDPOINT")?;
        let bucket = std::env::var("STORAGE_BUCKET").unwrap_or_else(|_| "avatars".into());
        let storage = StorageConfig {
            public_url: std::env::var("STORAGE_PUBLIC_URL")
                .unwrap_or_else(|_| format!("{}/{}", endpoint.trim_end_matches('/'), bucket)),
            endpoint,
            bucket,
            access_key: required("STORAGE_ACCESS_KEY")?,
            secret_key: required("STORAGE_SECRET_KEY")?,
            region: std::env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".into()),
        };

        Ok(Self {
            api_host,
            api_port,
            public_url,
            database_url: required("DATABASE_URL")?,
            db_max_connections: parse_or("DB_MAX_CONNECTIONS", 10),
            redis_url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379/0".into()),
            cors_origins,
            static_dir: std::env::var("STATIC_DIR").unwrap_or_else(|_| "static".into()),
            trust_forwarded_for: parse_or("TRUST_PROXY", false),
            jwt,
            mail,
            storage,
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).with_context(|| format!("missing environment variable {}", key))
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
