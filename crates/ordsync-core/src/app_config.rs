use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
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

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Number of master records committed per write transaction.
    pub write_batch_size: usize,
    pub db_max_retries: u32,
    pub db_retry_backoff_base_ms: u64,
    /// Order feed consumed by the scheduled upload job.
    pub feed_path: Option<PathBuf>,
    pub upload_cron: String,
    pub catalog_path: PathBuf,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("write_batch_size", &self.write_batch_size)
            .field("db_max_retries", &self.db_max_retries)
            .field("db_retry_backoff_base_ms", &self.db_retry_backoff_base_ms)
            .field("feed_path", &self.feed_path)
            .field("upload_cron", &self.upload_cron)
            .field("catalog_path", &self.catalog_path)
            .finish()
    }
}
