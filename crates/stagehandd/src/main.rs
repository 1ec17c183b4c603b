//! stagehandd - the stagehand background service
//!
//! This is the main entry point for the daemon. It wires together all the
//! components:
//! - Configuration loading
//! - Remote gateway client (bot-token REST)
//! - Automation engine (job table, scheduler, reconciler)
//! - Control socket for operator commands
//! - Periodic reconciliation loop

use anyhow::{Context, Result};
use clap::Parser;
use stagehand_api::{Command, ErrorCode, ErrorInfo, Response, ResponsePayload};
use stagehand_config::load_config;
use stagehand_core::{Engine, EngineConfig, EngineError};
use stagehand_discord::DiscordGateway;
use stagehand_gateway::GatewayError;
use stagehand_ipc::{IpcServer, ServerMessage};
use stagehand_util::default_config_path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// stagehandd - automatic activation of scheduled voice and stage sessions
#[derive(Parser, Debug)]
#[command(name = "stagehandd")]
#[command(about = "Automatic activation of scheduled voice and stage sessions", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/stagehand/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set STAGEHAND_SOCKET env var)
    #[arg(short, long, env = "STAGEHAND_SOCKET")]
    socket: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Service {
    engine: Engine,
    ipc: Arc<IpcServer>,
    reconcile_interval: Duration,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let config = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            guild = %config.gateway.guild,
            "Configuration loaded"
        );

        let token = std::env::var(&config.gateway.token_env).with_context(|| {
            format!(
                "Bot token environment variable {} is not set",
                config.gateway.token_env
            )
        })?;

        let gateway = DiscordGateway::new(
            &config.gateway.api_base,
            token,
            config.gateway.request_timeout,
        )
        .context("Failed to build gateway client")?;

        let engine = Engine::new(
            config.gateway.guild.clone(),
            Arc::new(gateway),
            EngineConfig {
                min_lookahead: config.engine.min_lookahead,
                retry: config.engine.retry,
            },
        );

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| config.service.socket_path.clone());

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start().await?;

        Ok(Self {
            engine,
            ipc: Arc::new(ipc),
            reconcile_interval: config.engine.reconcile_interval,
        })
    }

    async fn run(self) -> Result<()> {
        let ipc_ref = self.ipc.clone();
        let mut ipc_messages = ipc_ref
            .take_message_receiver()
            .await
            .expect("Message receiver should be available");

        // Spawn control-socket accept task
        let ipc_accept = ipc_ref.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "Control socket server error");
            }
        });

        // Set up signal handlers
        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        // The first tick fires immediately, which doubles as the startup
        // synchronization against the remote session list.
        let mut reconcile_timer = tokio::time::interval(self.reconcile_interval);
        reconcile_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        info!(
            interval_secs = self.reconcile_interval.as_secs(),
            "Service running"
        );

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                // Periodic reconciliation
                _ = reconcile_timer.tick() => {
                    match self.engine.reconcile().await {
                        Ok(outcome) => {
                            debug!(
                                added = outcome.added,
                                removed = outcome.removed,
                                updated = outcome.updated,
                                "Periodic reconciliation finished"
                            );
                        }
                        Err(e) => {
                            warn!(error = %e, "Reconciliation failed; retrying next cycle");
                        }
                    }
                }

                // Operator commands
                Some(msg) = ipc_messages.recv() => {
                    self.handle_ipc_message(msg).await;
                }
            }
        }

        info!("Shutting down stagehandd");
        self.engine.shutdown();
        self.ipc.shutdown();
        info!("Shutdown complete");
        Ok(())
    }

    async fn handle_ipc_message(&self, msg: ServerMessage) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                let response = self
                    .handle_command(request.request_id, request.command)
                    .await;
                let _ = self.ipc.send_response(&client_id, response).await;
            }

            ServerMessage::ClientConnected { client_id } => {
                debug!(client_id = %client_id, "Operator connected");
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Operator disconnected");
            }
        }
    }

    async fn handle_command(&self, request_id: u64, command: Command) -> Response {
        match command {
            Command::Reconcile => match self.engine.reconcile().await {
                Ok(outcome) => {
                    Response::success(request_id, ResponsePayload::Reconciled(outcome))
                }
                Err(e) => Response::error(request_id, error_info(e)),
            },

            Command::ListScheduled => {
                let jobs = self.engine.list_scheduled().await;
                Response::success(request_id, ResponsePayload::Jobs(jobs))
            }

            Command::Activate { session_id } => {
                match self.engine.activate_now(&session_id).await {
                    Ok(report) => Response::success(
                        request_id,
                        ResponsePayload::Activated {
                            session_id: report.session_id,
                            ended_conflicts: report.ended_conflicts,
                            warnings: report.warnings,
                        },
                    ),
                    Err(e) => Response::error(request_id, error_info(e)),
                }
            }

            Command::Status => {
                let status = self.engine.status().await;
                Response::success(request_id, ResponsePayload::Status(status))
            }

            Command::Ping => Response::success(request_id, ResponsePayload::Pong),
        }
    }
}

/// Surface an engine error over the control protocol
fn error_info(err: EngineError) -> ErrorInfo {
    let code = match &err {
        EngineError::Gateway(GatewayError::Unavailable(_)) => ErrorCode::GatewayUnavailable,
        EngineError::Gateway(GatewayError::PermissionDenied(_)) => ErrorCode::PermissionDenied,
        EngineError::Gateway(GatewayError::NotFound(_)) => ErrorCode::SessionNotFound,
        EngineError::Gateway(GatewayError::RateLimited { .. }) => ErrorCode::RateLimited,
        EngineError::Gateway(GatewayError::Protocol(_)) => ErrorCode::InternalError,
        EngineError::NotActivatable(_) => ErrorCode::SessionNotFound,
    };
    ErrorInfo::new(code, err.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Token and overrides may come from a local .env during development
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "stagehandd starting");

    let service = Service::new(&args).await?;
    service.run().await
}
