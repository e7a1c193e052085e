use std::net::SocketAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Which `Store` implementation the binaries wire up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Postgres => write!(f, "postgres"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,
    /// Bearer tokens accepted by the HTTP API. Empty disables auth in
    /// development.
    pub api_keys: Vec<String>,
    pub store: StoreBackend,
    /// Present whenever `store` is [`StoreBackend::Postgres`].
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub analyzer_url: Option<String>,
    pub analyzer_timeout_secs: u64,
    pub feed_url: Option<String>,
    pub feed_timeout_secs: u64,
    pub feed_max_retries: u32,
    pub feed_retry_backoff_base_ms: u64,
    pub inter_kol_delay_ms: u64,
    pub event_poll_interval_secs: u64,
    /// Placeholder multiplier in the influence formula until a real
    /// posting-frequency signal exists.
    pub activity_coefficient: f64,
    pub kol_sweep_cron: String,
    pub event_status_cron: String,
    pub event_metrics_cron: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("api_keys", &format_args!("[{} redacted]", self.api_keys.len()))
            .field("store", &self.store)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("analyzer_url", &self.analyzer_url)
            .field("analyzer_timeout_secs", &self.analyzer_timeout_secs)
            .field("feed_url", &self.feed_url)
            .field("feed_timeout_secs", &self.feed_timeout_secs)
            .field("feed_max_retries", &self.feed_max_retries)
            .field(
                "feed_retry_backoff_base_ms",
                &self.feed_retry_backoff_base_ms,
            )
            .field("inter_kol_delay_ms", &self.inter_kol_delay_ms)
            .field("event_poll_interval_secs", &self.event_poll_interval_secs)
            .field("activity_coefficient", &self.activity_coefficient)
            .field("kol_sweep_cron", &self.kol_sweep_cron)
            .field("event_status_cron", &self.event_status_cron)
            .field("event_metrics_cron", &self.event_metrics_cron)
            .finish()
    }
}
