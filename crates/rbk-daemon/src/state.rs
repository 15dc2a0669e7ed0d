//! Shared state for rbk-daemon.
//!
//! Everything here is read-only after startup; per-request mutation lives in
//! Postgres, so handlers share one `Arc<AppState>` without locks.

use rbk_config::{AppConfig, ResolvedSecrets};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health / status responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct AppState {
    pub pool: PgPool,
    pub config: AppConfig,
    /// SHA-256 of the canonical merged config the process booted with.
    pub config_hash: String,
    pub secrets: ResolvedSecrets,
    pub build: BuildInfo,
}

impl AppState {
    pub fn new(
        pool: PgPool,
        config: AppConfig,
        config_hash: impl Into<String>,
        secrets: ResolvedSecrets,
    ) -> Self {
        // Start the uptime clock at construction, not at the first status call.
        let _ = uptime_secs();
        Self {
            pool,
            config,
            config_hash: config_hash.into(),
            secrets,
            build: BuildInfo {
                service: "rbk-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
        }
    }
}

pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}
