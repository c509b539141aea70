//! Environment-driven configuration, validated eagerly at startup.
//!
//! Mirrors the pack's convention of reading everything from env vars in
//! `main.rs` (see `sem_os_server`), but centralized into one struct so the
//! rest of the crate never calls `std::env::var` directly.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: String,

    pub queue_prefix: String,

    pub ocr_engine: OcrEngine,
    pub ocr_autofallback: bool,

    pub worker_pool_size: usize,
    pub processing_timeout: Duration,
    pub stuck_timeout: Duration,
    pub reaper_interval: Duration,
    pub retry_sweep_interval: Duration,
    pub max_processing_attempts: i32,

    pub score_threshold_auto_approve: i32,
    pub score_threshold_auto_reject: i32,

    pub reviewer_api_url: String,
    pub reviewer_api_key: String,
    pub reviewer_callback_url: String,
    pub reviewer_hmac_secret: String,
    pub reviewer_hmac_secret_legacy: Option<String>,
    pub max_forwarder_envelope_attempts: u32,

    pub blob_presign_ttl: Duration,
    pub max_upload_bytes: u64,
}

/// Conservative, fixed post-OCR auto-approve threshold. This is
/// intentionally not configurable — collapsing it into the explicit
/// thresholds would regress the dual-pathway policy.
pub const POST_OCR_AUTO_APPROVE_THRESHOLD: i32 = 75;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OcrEngine {
    Cpu,
    Gpu,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // Best-effort local .env loading; absence is not an error.
        let _ = dotenvy::dotenv();

        let ocr_engine = match env_opt("OCR_ENGINE").as_deref() {
            Some("gpu") => OcrEngine::Gpu,
            _ => OcrEngine::Cpu,
        };

        Ok(Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            database_url: env_required("DATABASE_URL")?,

            queue_prefix: env_or("QUEUE_PREFIX", "filot:ocr:"),

            ocr_engine,
            ocr_autofallback: env_bool("OCR_AUTOFALLBACK", true),

            worker_pool_size: env_parse_or("WORKER_POOL_SIZE", 2)?,
            processing_timeout: Duration::from_secs(env_parse_or("PROCESSING_TIMEOUT_SECS", 600)?),
            stuck_timeout: Duration::from_secs(env_parse_or("STUCK_TIMEOUT_SECS", 300)?),
            reaper_interval: Duration::from_secs(env_parse_or("REAPER_INTERVAL_SECS", 60)?),
            retry_sweep_interval: Duration::from_secs(env_parse_or("RETRY_SWEEP_INTERVAL_SECS", 1)?),
            max_processing_attempts: env_parse_or("MAX_PROCESSING_ATTEMPTS", 3)?,

            score_threshold_auto_approve: env_parse_or("AI_SCORE_THRESHOLD_AUTO_APPROVE", 85)?,
            score_threshold_auto_reject: env_parse_or("AI_SCORE_THRESHOLD_AUTO_REJECT", 35)?,

            reviewer_api_url: env_or("REVIEWER_API_URL", "http://localhost:9090"),
            reviewer_api_key: env_or("REVIEWER_API_KEY", ""),
            reviewer_callback_url: env_or(
                "REVIEWER_CALLBACK_URL",
                "http://localhost:8080/internal/reviews",
            ),
            reviewer_hmac_secret: env_required("REVIEWER_HMAC_SECRET")?,
            reviewer_hmac_secret_legacy: env_opt("REVIEWER_HMAC_SECRET_LEGACY"),
            max_forwarder_envelope_attempts: env_parse_or("MAX_FORWARDER_ENVELOPE_ATTEMPTS", 5)?,

            blob_presign_ttl: Duration::from_secs(env_parse_or("BLOB_PRESIGN_TTL_SECS", 3600)?),
            max_upload_bytes: env_parse_or("MAX_UPLOAD_BYTES", 5 * 1024 * 1024)?,
        })
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_string())
}

fn env_required(key: &str) -> anyhow::Result<String> {
    env_opt(key).ok_or_else(|| anyhow::anyhow!("{key} must be set"))
}

fn env_bool(key: &str, default: bool) -> bool {
    match env_opt(key).as_deref() {
        Some("true") | Some("1") | Some("yes") => true,
        Some("false") | Some("0") | Some("no") => false,
        _ => default,
    }
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match env_opt(key) {
        Some(v) => v
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}")),
        None => Ok(default),
    }
}
