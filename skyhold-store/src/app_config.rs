use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub reservation: ReservationRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReservationRules {
    pub seat_hold_seconds: u64,
    pub max_passengers: u32,
    #[serde(default = "default_reference_length")]
    pub reference_length: usize,
    #[serde(default = "default_reference_attempts")]
    pub reference_attempts: u32,
    #[serde(default = "default_cancellation_retries")]
    pub cancellation_retries: u32,
    /// 0 disables the hold reaper; lazy expiry keeps availability correct either way.
    #[serde(default)]
    pub reaper_interval_seconds: u64,
}

fn default_reference_length() -> usize { 8 }
fn default_reference_attempts() -> u32 { 5 }
fn default_cancellation_retries() -> u32 { 3 }

impl Default for ReservationRules {
    fn default() -> Self {
        Self {
            seat_hold_seconds: 900,
            max_passengers: 9,
            reference_length: default_reference_length(),
            reference_attempts: default_reference_attempts(),
            cancellation_retries: default_cancellation_retries(),
            reaper_interval_seconds: 0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Postgres,
    /// Single-process only. Several API instances over one memory store
    /// would each sell the same seats.
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub run_migrations: bool,
}

fn default_max_connections() -> u32 { 10 }

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            // Per-environment overrides are optional
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. SKYHOLD_RESERVATION__SEAT_HOLD_SECONDS=600
            .add_source(config::Environment::with_prefix("SKYHOLD").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
