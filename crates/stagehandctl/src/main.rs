//! stagehandctl - operator CLI for stagehandd
//!
//! Thin client over the control socket: every subcommand maps onto one
//! protocol command and renders the response as plain text.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use stagehand_api::{Command, ResponsePayload, ResponseResult};
use stagehand_ipc::IpcClient;
use stagehand_util::{default_socket_path, format_duration, SessionId};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "stagehandctl")]
#[command(about = "Control the stagehand session automation daemon", long_about = None)]
struct Cli {
    /// Daemon socket path (or set STAGEHAND_SOCKET env var)
    #[arg(short, long, default_value_os_t = default_socket_path())]
    socket: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Resynchronize the job table with the remote session list
    Reconcile,

    /// Show all sessions that will auto-start
    List,

    /// Start a session now, ending any conflicting live session first
    Activate {
        /// Remote session identifier
        session_id: String,
    },

    /// Show daemon status
    Status,

    /// Check that the daemon is reachable
    Ping,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut client = IpcClient::connect(&cli.socket)
        .await
        .with_context(|| format!("Failed to connect to stagehandd at {:?}", cli.socket))?;

    let command = match &cli.command {
        CliCommand::Reconcile => Command::Reconcile,
        CliCommand::List => Command::ListScheduled,
        CliCommand::Activate { session_id } => Command::Activate {
            session_id: SessionId::new(session_id.clone()),
        },
        CliCommand::Status => Command::Status,
        CliCommand::Ping => Command::Ping,
    };

    let response = client.send(command).await.context("Request failed")?;

    let payload = match response.result {
        ResponseResult::Ok(payload) => payload,
        ResponseResult::Err(info) => bail!("{:?}: {}", info.code, info.message),
    };

    render(payload);
    Ok(())
}

fn render(payload: ResponsePayload) {
    match payload {
        ResponsePayload::Reconciled(outcome) => {
            println!(
                "Reconciled: {} added, {} removed, {} updated",
                outcome.added, outcome.removed, outcome.updated
            );
        }

        ResponsePayload::Jobs(jobs) => {
            if jobs.is_empty() {
                println!("No sessions currently tracked for automation.");
                return;
            }
            for job in jobs {
                println!(
                    "{}  {:<32}  channel {}  fires {} (in {})",
                    job.session_id,
                    job.name,
                    job.channel,
                    job.fire_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    format_duration(job.time_remaining),
                );
            }
        }

        ResponsePayload::Activated {
            session_id,
            ended_conflicts,
            warnings,
        } => {
            println!("Activated session {}", session_id);
            for ended in ended_conflicts {
                println!("  ended conflicting session {}", ended);
            }
            for warning in warnings {
                println!("  warning: {}", warning);
            }
        }

        ResponsePayload::Status(status) => {
            println!("Guild:           {}", status.guild);
            println!("Tracked jobs:    {}", status.tracked_jobs);
            println!("Armed timers:    {}", status.armed_timers);
            println!(
                "Scheduler:       {}",
                if status.scheduler_live { "running" } else { "stopped" }
            );
            match status.last_reconcile_at {
                Some(at) => println!("Last reconcile:  {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
                None => println!("Last reconcile:  never"),
            }
            match status.next_fire_at {
                Some(at) => {
                    let remaining = (at - Utc::now()).to_std().unwrap_or_default();
                    println!(
                        "Next activation: {} (in {})",
                        at.format("%Y-%m-%d %H:%M:%S UTC"),
                        format_duration(remaining)
                    );
                }
                None => println!("Next activation: none scheduled"),
            }
        }

        ResponsePayload::Pong => println!("pong"),
    }
}
