use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::with_security_headers;

const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:5173";

#[derive(Debug, Clone)]
pub struct Config {
    /// Unset selects the in-memory backend.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub host: IpAddr,
    pub port: u16,
    pub reservation_ttl: Duration,
    pub sweep_interval: Duration,
    pub payment_timeout: Duration,
    pub allowed_origins: Vec<String>,
    pub production: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: None,
            database_max_connections: 5,
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3001,
            reservation_ttl: Duration::from_secs(900),
            sweep_interval: Duration::from_secs(30),
            payment_timeout: Duration::from_secs(10),
            allowed_origins: split_origins(DEFAULT_ALLOWED_ORIGINS),
            production: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            database_url: env::var("DATABASE_URL")
                .ok()
                .filter(|url| !url.trim().is_empty()),
            database_max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            host: parse_or("HOST", defaults.host),
            port: parse_or("PORT", defaults.port),
            reservation_ttl: secs_or("RESERVATION_TTL_SECS", defaults.reservation_ttl),
            sweep_interval: secs_or("RESERVATION_SWEEP_INTERVAL_SECS", defaults.sweep_interval),
            payment_timeout: secs_or("PAYMENT_TIMEOUT_SECS", defaults.payment_timeout),
            allowed_origins: env::var("CORS_ALLOWED_ORIGINS")
                .map(|raw| split_origins(&raw))
                .unwrap_or(defaults.allowed_origins),
            production: env::var("RUST_ENV")
                .map(|v| v.eq_ignore_ascii_case("production"))
                .unwrap_or(false),
        }
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_or<T>(key: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Config: invalid {}='{}', using default {}", key, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

/// A whole number of seconds. Zero is rejected since none of these
/// durations can be empty.
fn secs_or(key: &str, default: Duration) -> Duration {
    match parse_or(key, default.as_secs()) {
        0 => {
            tracing::warn!(
                "Config: {} must be positive, using default {}",
                key,
                default.as_secs()
            );
            default
        }
        secs => Duration::from_secs(secs),
    }
}
