//! Engine configuration.
//!
//! Values come from `TICKETFORGE_*` environment variables, with defaults
//! suitable for local development. Unparseable values fall back to the
//! default rather than aborting startup.

use std::env;
use std::time::Duration as StdDuration;

use chrono::Duration;

/// How long a pending reservation holds inventory.
pub const DEFAULT_RESERVATION_TTL_MINUTES: i64 = 15;
/// Platform fee in basis points of the subtotal (5%).
pub const DEFAULT_SERVICE_FEE_BASIS_POINTS: u32 = 500;
/// How often the expiry reaper sweeps.
pub const DEFAULT_REAPER_INTERVAL_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub reservation_ttl_minutes: i64,
    pub service_fee_basis_points: u32,
    pub reaper_interval_secs: u64,
    /// Server-side secret mixed into scan tokens.
    pub scan_secret: String,
    pub database_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            reservation_ttl_minutes: DEFAULT_RESERVATION_TTL_MINUTES,
            service_fee_basis_points: DEFAULT_SERVICE_FEE_BASIS_POINTS,
            reaper_interval_secs: DEFAULT_REAPER_INTERVAL_SECS,
            scan_secret: "dev-only-scan-secret".to_string(),
            database_url: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            reservation_ttl_minutes: env_parsed(
                "TICKETFORGE_RESERVATION_TTL_MINUTES",
                defaults.reservation_ttl_minutes,
            ),
            service_fee_basis_points: env_parsed(
                "TICKETFORGE_SERVICE_FEE_BPS",
                defaults.service_fee_basis_points,
            ),
            reaper_interval_secs: env_parsed(
                "TICKETFORGE_REAPER_INTERVAL_SECS",
                defaults.reaper_interval_secs,
            ),
            scan_secret: env::var("TICKETFORGE_SCAN_SECRET").unwrap_or(defaults.scan_secret),
            database_url: env::var("TICKETFORGE_DATABASE_URL").ok(),
        }
    }

    pub fn reservation_ttl(&self) -> Duration {
        Duration::minutes(self.reservation_ttl_minutes)
    }

    pub fn reaper_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.reaper_interval_secs)
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
