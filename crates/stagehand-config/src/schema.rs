//! Raw TOML schema
//!
//! Mirrors the on-disk layout exactly; conversion into the typed
//! [`Config`](crate::Config) happens after validation.

use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize)]
pub struct RawConfig {
    pub config_version: u32,
    pub gateway: RawGateway,
    #[serde(default)]
    pub engine: RawEngine,
    #[serde(default)]
    pub service: RawService,
}

#[derive(Debug, Deserialize)]
pub struct RawGateway {
    /// The single guild this engine instance serves
    pub guild_id: String,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Name of the environment variable holding the bot token; the secret
    /// itself never lives in this file
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,
}

#[derive(Debug, Deserialize)]
pub struct RawEngine {
    #[serde(default = "default_reconcile_interval_seconds")]
    pub reconcile_interval_seconds: u64,
    #[serde(default = "default_min_lookahead_seconds")]
    pub min_lookahead_seconds: u64,
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

impl Default for RawEngine {
    fn default() -> Self {
        Self {
            reconcile_interval_seconds: default_reconcile_interval_seconds(),
            min_lookahead_seconds: default_min_lookahead_seconds(),
            retry_attempts: default_retry_attempts(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RawService {
    /// Control socket path; defaults to the runtime-dir convention
    pub socket_path: Option<PathBuf>,
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_token_env() -> String {
    "STAGEHAND_BOT_TOKEN".to_string()
}

fn default_request_timeout_seconds() -> u64 {
    10
}

fn default_reconcile_interval_seconds() -> u64 {
    300
}

fn default_min_lookahead_seconds() -> u64 {
    60
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_base_ms() -> u64 {
    500
}
