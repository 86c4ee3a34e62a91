//! Server Configuration
//!
//! Everything comes from the environment (after `.env`). Parsing goes through
//! a lookup function so tests can feed a plain map.

use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, bail};
use auth::AuthConfig;
use base64::Engine;
use base64::engine::general_purpose;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_ORIGINS: &str = "http://localhost:8000,http://127.0.0.1:8000";
const DEFAULT_SESSION_TTL_MINUTES: i64 = 60 * 24 * 14;
const DEFAULT_PRUNE_INTERVAL_SECS: u64 = 3600;

pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

impl fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug)]
pub struct ServerConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub frontend_origins: Vec<String>,
    pub prune_interval: Duration,
    pub bootstrap_admin: Option<BootstrapAdmin>,
    pub auth: AuthConfig,
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL").context("DATABASE_URL must be set")?;
        let bind_addr: SocketAddr = parse_or(&get, "BIND_ADDR", DEFAULT_BIND_ADDR.parse()?)?;

        let frontend_origins = get("FRONTEND_ORIGINS")
            .unwrap_or_else(|| DEFAULT_ORIGINS.to_string())
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();

        let prune_secs: u64 = parse_or(&get, "PRUNE_INTERVAL_SECS", DEFAULT_PRUNE_INTERVAL_SECS)?;
        if prune_secs == 0 {
            bail!("PRUNE_INTERVAL_SECS must be positive");
        }

        let bootstrap_admin = match (get("BOOTSTRAP_ADMIN_EMAIL"), get("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (None, None) => None,
            _ => bail!("BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD must be set together"),
        };

        Ok(Self {
            database_url,
            bind_addr,
            frontend_origins,
            prune_interval: Duration::from_secs(prune_secs),
            bootstrap_admin,
            auth: auth_config(&get)?,
        })
    }
}

fn auth_config(get: &impl Fn(&str) -> Option<String>) -> anyhow::Result<AuthConfig> {
    let mut config = match get("SECRET_KEY") {
        Some(encoded) => AuthConfig {
            secret_key: decode_secret(&encoded)?,
            ..AuthConfig::default()
        },
        None if cfg!(debug_assertions) => {
            tracing::warn!("SECRET_KEY not set, using a random key; sessions end on restart");
            AuthConfig::with_random_secret()
        }
        None => bail!("SECRET_KEY must be set in production"),
    };

    let ttl_minutes: i64 = parse_or(get, "SESSION_TTL_MINUTES", DEFAULT_SESSION_TTL_MINUTES)?;
    if ttl_minutes <= 0 {
        bail!("SESSION_TTL_MINUTES must be positive");
    }
    config.session_ttl = chrono::Duration::minutes(ttl_minutes);

    if let Some(name) = get("SESSION_COOKIE") {
        config.session_cookie_name = name;
    }
    if let Some(name) = get("CSRF_COOKIE") {
        config.csrf_cookie_name = name;
    }
    if let Some(name) = get("MFA_COOKIE") {
        config.mfa_cookie_name = name;
    }
    if let Some(app_name) = get("APP_NAME") {
        // The issuer is the label prefix of the otpauth URI
        if app_name.contains(':') {
            bail!("APP_NAME must not contain ':'");
        }
        config.totp_issuer = app_name;
    }

    // TLS usually terminates at the proxy
    config.cookie_secure = parse_or(get, "COOKIE_SECURE", false)?;
    config.password_pepper = get("PASSWORD_PEPPER").map(String::into_bytes);

    Ok(config)
}

fn decode_secret(encoded: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = general_purpose::STANDARD
        .decode(encoded.trim())
        .context("SECRET_KEY must be base64")?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow::anyhow!("SECRET_KEY must decode to 32 bytes, got {}", b.len()))
}

fn parse_or<T>(get: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://db/fh")])).unwrap();

        assert_eq!(config.bind_addr, "0.0.0.0:8000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.prune_interval, Duration::from_secs(3600));
        assert_eq!(config.auth.session_ttl, chrono::Duration::days(14));
        assert_eq!(config.auth.session_cookie_name, "fh_session");
        assert_eq!(config.auth.totp_issuer, "FamilyHub");
        assert!(!config.auth.cookie_secure);
        assert!(config.bootstrap_admin.is_none());
        assert_eq!(config.frontend_origins.len(), 2);
    }

    #[test]
    fn test_database_url_required() {
        assert!(ServerConfig::from_lookup(lookup(&[])).is_err());
        assert!(ServerConfig::from_lookup(lookup(&[("DATABASE_URL", "  ")])).is_err());
    }

    #[test]
    fn test_overrides() {
        let key = general_purpose::STANDARD.encode([7u8; 32]);
        let config = ServerConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/fh"),
            ("BIND_ADDR", "127.0.0.1:9000"),
            ("SECRET_KEY", &key),
            ("SESSION_TTL_MINUTES", "60"),
            ("APP_NAME", "Smiths"),
            ("COOKIE_SECURE", "true"),
            ("PASSWORD_PEPPER", "pepper"),
            ("FRONTEND_ORIGINS", "https://home.example, "),
            ("BOOTSTRAP_ADMIN_EMAIL", "admin@example.com"),
            ("BOOTSTRAP_ADMIN_PASSWORD", "changeme123"),
        ]))
        .unwrap();

        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.auth.secret_key, [7u8; 32]);
        assert_eq!(config.auth.session_ttl, chrono::Duration::hours(1));
        assert_eq!(config.auth.totp_issuer, "Smiths");
        assert!(config.auth.cookie_secure);
        assert_eq!(config.auth.pepper(), Some(b"pepper".to_vec()));
        assert_eq!(config.frontend_origins, vec!["https://home.example".to_string()]);
        let admin = config.bootstrap_admin.unwrap();
        assert_eq!(admin.email, "admin@example.com");
        assert!(!format!("{admin:?}").contains("changeme123"));
    }

    #[test]
    fn test_rejects_bad_values() {
        let short_key = general_purpose::STANDARD.encode([1u8; 16]);
        for (key, value) in [
            ("SECRET_KEY", short_key.as_str()),
            ("SECRET_KEY", "not base64!"),
            ("SESSION_TTL_MINUTES", "0"),
            ("PRUNE_INTERVAL_SECS", "soon"),
            ("BIND_ADDR", "nowhere"),
            ("BOOTSTRAP_ADMIN_EMAIL", "admin@example.com"),
            ("APP_NAME", "Family:Hub"),
        ] {
            let result = ServerConfig::from_lookup(lookup(&[
                ("DATABASE_URL", "postgres://db/fh"),
                (key, value),
            ]));
            assert!(result.is_err(), "{key}={value} should be rejected");
        }
    }
}
