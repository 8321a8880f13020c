use std::env;
use std::time::Duration;

use crate::topology::DEFAULT_MAX_HOPS;

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub db_max_connections: u32,
    pub listen_addr: String,
    pub environment: String,
    /// Upper bound on connections walked by a customer trace
    pub trace_max_hops: usize,
    pub request_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn load() -> Self {
        Self {
            db_path: get_env("DB_PATH", "/data/spectra.db"),
            db_max_connections: get_env("DB_MAX_CONNECTIONS", "5")
                .parse()
                .unwrap_or(5),
            listen_addr: get_env("LISTEN_ADDR", "0.0.0.0:8080"),
            environment: get_env("ENVIRONMENT", "development"),
            trace_max_hops: get_env("TRACE_MAX_HOPS", "")
                .parse()
                .ok()
                .filter(|hops| *hops > 0)
                .unwrap_or(DEFAULT_MAX_HOPS),
            request_timeout: Duration::from_secs(
                get_env("REQUEST_TIMEOUT_SECS", "30").parse().unwrap_or(30),
            ),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "/data/spectra.db".to_string(),
            db_max_connections: 5,
            listen_addr: "0.0.0.0:8080".to_string(),
            environment: "development".to_string(),
            trace_max_hops: DEFAULT_MAX_HOPS,
            request_timeout: Duration::from_secs(30),
        }
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
