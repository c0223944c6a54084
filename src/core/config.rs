use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub poll_ms: u64,
    pub poll_batch: i64,
    pub filter_cache_size: usize,
    pub trusted_headers: bool,
    pub database_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 7171,
            poll_ms: 500,
            poll_batch: 500,
            filter_cache_size: 256,
            trusted_headers: false,
            database_url: None,
        }
    }
}

impl Config {
    /// Read configuration from the environment, falling back to defaults
    /// for anything unset or malformed.
    pub fn from_env() -> Self {
        let defaults = Config::default();
        Config {
            host: env::var("CORE_HOST").unwrap_or(defaults.host),
            port: parse_var("CORE_PORT", defaults.port),
            poll_ms: parse_var("POLL_MS", defaults.poll_ms),
            poll_batch: parse_var("POLL_BATCH", defaults.poll_batch),
            filter_cache_size: parse_var("FILTER_CACHE_SIZE", defaults.filter_cache_size),
            trusted_headers: env::var("TRUSTED_HEADERS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.trusted_headers),
            database_url: env::var("DATABASE_URL").ok(),
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
