use std::env;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct Config {
    /// Postgres URL. Without one the server keeps matches in memory only.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub clock_tick_ms: u64,
    pub clock_persist_every: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        Self {
            database_url: get("DATABASE_URL").filter(|v| !v.trim().is_empty()),
            db_max_connections: get("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: get("PORT").and_then(|v| v.parse().ok()).unwrap_or(8000),
            clock_tick_ms: get("CLOCK_TICK_MS")
                .and_then(|v| v.parse().ok())
                .filter(|ms| *ms > 0)
                .unwrap_or(1000),
            clock_persist_every: get("CLOCK_PERSIST_EVERY")
                .and_then(|v| v.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(10),
        }
    }

    pub fn clock_tick(&self) -> Duration {
        Duration::from_millis(self.clock_tick_ms)
    }
}
