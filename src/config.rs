//! Environment-driven configuration
//!
//! Read once at start-up after `dotenvy::dotenv()`. Missing or unparseable
//! values fall back to defaults.

use std::env;
use std::str::FromStr;

use tracing::warn;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_RETRIES: u32 = 5;
pub const DEFAULT_CAS_ATTEMPTS: u32 = 3;
pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const DEFAULT_MAX_PAGE_SIZE: usize = 100;
pub const DEFAULT_EVENT_CAPACITY: usize = 1000;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub service: ServiceConfig,
}

/// Knobs consumed by the transaction service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Retries allowed before a failed transaction stays failed
    pub max_retries: u32,
    /// Compare-and-swap attempts before a conflict is surfaced
    pub cas_attempts: u32,
    pub default_page_size: usize,
    pub max_page_size: usize,
    pub event_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            cas_attempts: DEFAULT_CAS_ATTEMPTS,
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl ServiceConfig {
    /// Clamp the default page size so a request without `limit` stays valid
    pub fn normalized(mut self) -> Self {
        if self.default_page_size > self.max_page_size {
            warn!(
                default_page_size = self.default_page_size,
                max_page_size = self.max_page_size,
                "Default page size exceeds max page size, clamping"
            );
            self.default_page_size = self.max_page_size;
        }
        self
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = ServiceConfig::default();
        let service = ServiceConfig {
            max_retries: env_or("TX_MAX_RETRIES", defaults.max_retries),
            cas_attempts: env_or("TX_CAS_ATTEMPTS", defaults.cas_attempts).max(1),
            default_page_size: env_or("TX_DEFAULT_PAGE_SIZE", defaults.default_page_size).max(1),
            max_page_size: env_or("TX_MAX_PAGE_SIZE", defaults.max_page_size).max(1),
            event_capacity: env_or("TX_EVENT_CAPACITY", defaults.event_capacity).max(1),
        };

        Self {
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            service,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, default = %default, "Invalid config value, using default");
            default
        }),
        Err(_) => default,
    }
}
