//! Typed configuration

use stagehand_util::{socket_path_without_env, Backoff, GuildId};
use std::path::PathBuf;
use std::time::Duration;

use crate::RawConfig;

/// Validated daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub gateway: GatewaySettings,
    pub engine: EngineSettings,
    pub service: ServiceSettings,
}

#[derive(Debug, Clone)]
pub struct GatewaySettings {
    pub guild: GuildId,
    pub api_base: String,
    pub token_env: String,
    pub request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub reconcile_interval: Duration,
    pub min_lookahead: Duration,
    pub retry: Backoff,
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub socket_path: PathBuf,
}

impl Config {
    /// Convert a validated raw config into settings. Must only be called
    /// after [`validate_config`](crate::validate_config) passed.
    pub fn from_raw(raw: RawConfig) -> Self {
        Self {
            gateway: GatewaySettings {
                guild: GuildId::new(raw.gateway.guild_id),
                api_base: raw.gateway.api_base.trim_end_matches('/').to_string(),
                token_env: raw.gateway.token_env,
                request_timeout: Duration::from_secs(raw.gateway.request_timeout_seconds),
            },
            engine: EngineSettings {
                reconcile_interval: Duration::from_secs(raw.engine.reconcile_interval_seconds),
                min_lookahead: Duration::from_secs(raw.engine.min_lookahead_seconds),
                retry: Backoff::new(
                    raw.engine.retry_attempts,
                    Duration::from_millis(raw.engine.retry_base_ms),
                ),
            },
            service: ServiceSettings {
                socket_path: raw
                    .service
                    .socket_path
                    .unwrap_or_else(socket_path_without_env),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RawEngine, RawGateway, RawService};

    #[test]
    fn trailing_slash_stripped_from_api_base() {
        let raw = RawConfig {
            config_version: 1,
            gateway: RawGateway {
                guild_id: "1".into(),
                api_base: "https://example.test/api/".into(),
                token_env: "T".into(),
                request_timeout_seconds: 10,
            },
            engine: RawEngine::default(),
            service: RawService::default(),
        };

        let config = Config::from_raw(raw);
        assert_eq!(config.gateway.api_base, "https://example.test/api");
    }
}
