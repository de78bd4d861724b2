use std::path::PathBuf;

#[derive(Clone, Debug)]
pub struct Config {
    /// Absent means the job infrastructure runs in disabled mode: producers
    /// no-op and the worker refuses to start.
    pub database_url: Option<String>,
    pub worker_id: String,
    pub lease_seconds: i64,
    pub reap_interval_ms: u64,
    pub idle_sleep_ms: u64,
    pub admin_addr: Option<String>,
    pub migrate_on_startup: bool,

    pub render_api_url: String,
    pub render_api_key: String,
    pub render_poll_interval_ms: u64,
    pub render_max_polls: u32,

    pub storage_root: PathBuf,
    pub storage_public_url: String,

    pub webhook_tolerance_ms: i64,
    pub maintenance_interval_secs: u64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let worker_id = env_or_fallback("RENDERFLOW_WORKER_ID", "WORKER_ID")
            .or_else(|| std::env::var("HOSTNAME").ok())
            .unwrap_or_else(|| "worker-1".to_string());

        let lease_seconds = env_or_fallback("RENDERFLOW_LEASE_SECONDS", "LEASE_SECONDS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let reap_interval_ms = env_parse("RENDERFLOW_REAP_INTERVAL_MS", 5_000);
        let idle_sleep_ms = env_parse("RENDERFLOW_IDLE_SLEEP_MS", 250);

        let admin_addr = env_or_fallback("RENDERFLOW_ADMIN_ADDR", "ADMIN_ADDR")
            .and_then(|s| normalize_optional_addr(&s));

        let migrate_on_startup = env_bool("RENDERFLOW_MIGRATE_ON_STARTUP").unwrap_or(false);

        let render_api_url = std::env::var("RENDER_API_URL")
            .unwrap_or_else(|_| "https://api.creatomate.com/v1".to_string());
        let render_api_key = std::env::var("RENDER_API_KEY").unwrap_or_default();
        let render_poll_interval_ms = env_parse("RENDER_POLL_INTERVAL_MS", 5_000);
        let render_max_polls = env_parse("RENDER_MAX_POLLS", 60);

        let storage_root = std::env::var("STORAGE_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./artifacts"));
        let storage_public_url = std::env::var("STORAGE_PUBLIC_URL")
            .unwrap_or_else(|_| "http://localhost:8080/artifacts".to_string());

        let webhook_tolerance_ms = env_parse("WEBHOOK_TOLERANCE_MS", 300_000);
        let maintenance_interval_secs = env_parse("MAINTENANCE_INTERVAL_SECS", 60);

        Ok(Self {
            database_url,
            worker_id,
            lease_seconds,
            reap_interval_ms,
            idle_sleep_ms,
            admin_addr,
            migrate_on_startup,
            render_api_url,
            render_api_key,
            render_poll_interval_ms,
            render_max_polls,
            storage_root,
            storage_public_url,
            webhook_tolerance_ms,
            maintenance_interval_secs,
        })
    }
}

fn env_or_fallback(primary: &str, fallback: &str) -> Option<String> {
    std::env::var(primary)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| std::env::var(fallback).ok().filter(|s| !s.trim().is_empty()))
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn normalize_optional_addr(value: &str) -> Option<String> {
    let v = value.trim();
    if v.is_empty() {
        return None;
    }
    if matches!(v.to_lowercase().as_str(), "0" | "off" | "false" | "none") {
        return None;
    }
    Some(v.to_string())
}
