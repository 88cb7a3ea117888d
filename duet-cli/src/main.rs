use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;
use duet::model::ConnectionStatus;
use duet::signaling::{
    CallNotification, ExitReason, MemoryRelay, TransportConfig, WebRtcTransportFactory,
};
use duet::{CallConfig, CallHandle, CallRuntime, ParticipantId, RoomId};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "duet")]
#[command(about = "Two-party call signaling demo")]
struct Cli {
    /// JSON file with `call` and `transport` sections; missing fields use defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run two participants in-process over the in-memory relay.
    Demo {
        #[arg(long, default_value = "demo")]
        room: String,

        /// Approve the join request without prompting.
        #[arg(long)]
        auto_approve: bool,

        /// Seconds to keep the call up once both sides are connected.
        #[arg(long, default_value_t = 10)]
        hold: u64,
    },
    /// Print the effective configuration as JSON.
    Config,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct DuetConfig {
    call: CallConfig,
    transport: TransportConfig,
}

fn load_config(path: Option<&Path>) -> Result<DuetConfig> {
    let Some(path) = path else {
        return Ok(DuetConfig::default());
    };
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid config {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Demo {
            room,
            auto_approve,
            hold,
        } => run_demo(config, RoomId::new(room), auto_approve, hold).await?,
    }

    Ok(())
}

struct Side {
    label: ColoredString,
    handle: CallHandle,
    notifications: UnboundedReceiver<CallNotification>,
    connected: bool,
    exited: bool,
}

async fn run_demo(config: DuetConfig, room: RoomId, auto_approve: bool, hold: u64) -> Result<()> {
    println!("{}", format!("📞 Starting call in room '{room}'").green().bold());

    let relay = MemoryRelay::new();
    let factory = Arc::new(WebRtcTransportFactory::new(config.transport));

    let mut sides = Vec::with_capacity(2);
    for label in ["alice".blue(), "bob".magenta()] {
        let (handle, notifications) = CallRuntime::start(
            Arc::new(relay.clone()),
            factory.clone(),
            room.clone(),
            ParticipantId::new(),
            config.call.clone(),
        )
        .await
        .with_context(|| format!("{label} could not join {room}"))?;
        println!("   {} joined as {}", label, handle.local());
        sides.push(Side {
            label,
            handle,
            notifications,
            connected: false,
            exited: false,
        });
    }
    let [mut first, mut second]: [Side; 2] = sides
        .try_into()
        .map_err(|_| anyhow::anyhow!("expected two participants"))?;

    let mut deadline: Option<tokio::time::Instant> = None;
    loop {
        if first.exited && second.exited {
            break;
        }
        let hold_expired = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            Some(n) = first.notifications.recv(), if !first.exited => {
                handle_notification(&mut first, n, auto_approve).await?;
            }
            Some(n) = second.notifications.recv(), if !second.exited => {
                handle_notification(&mut second, n, auto_approve).await?;
            }
            _ = hold_expired => {
                println!("{}", "👋 Hanging up".yellow());
                first.handle.leave().await.ok();
                second.handle.leave().await.ok();
                deadline = None;
            }
            _ = tokio::signal::ctrl_c() => {
                println!("{}", "👋 Interrupted, hanging up".yellow());
                first.handle.leave().await.ok();
                second.handle.leave().await.ok();
            }
            else => break,
        }

        if deadline.is_none() && first.connected && second.connected {
            println!(
                "{}",
                format!("✨ Call established, holding for {hold}s").green().bold()
            );
            deadline = Some(tokio::time::Instant::now() + Duration::from_secs(hold));
            first.connected = false;
            second.connected = false;
        }
    }

    first.handle.finished().await;
    second.handle.finished().await;
    println!("{}", "Done.".green());
    Ok(())
}

async fn handle_notification(
    side: &mut Side,
    notification: CallNotification,
    auto_approve: bool,
) -> Result<()> {
    match notification {
        CallNotification::StatusChanged(status) => {
            let text = status.to_string();
            let text = match status {
                ConnectionStatus::Connected => text.green(),
                ConnectionStatus::Failed | ConnectionStatus::Rejected => text.red(),
                ConnectionStatus::Disconnected => text.yellow(),
                _ => text.normal(),
            };
            println!("   {} status: {}", side.label, text);
            if status == ConnectionStatus::Connected {
                side.connected = true;
            }
        }
        CallNotification::RoleAssigned(role) => {
            println!("   {} is {}", side.label, role.to_string().cyan())
        }
        CallNotification::ApprovalRequested(joiner) => {
            let approved = if auto_approve {
                true
            } else {
                let prompt = format!("{} wants to join. Let them in?", joiner);
                tokio::task::spawn_blocking(move || {
                    Confirm::new().with_prompt(prompt).default(true).interact()
                })
                .await
                .context("Approval prompt panicked")?
                .context("Failed to read approval")?
            };
            info!("Decision for {}: {}", joiner, approved);
            if approved {
                side.handle.approve(joiner).await?;
            } else {
                side.handle.reject(joiner).await?;
            }
        }
        CallNotification::RemoteMediaAvailable => {
            println!("   {} {}", side.label, "receives remote media".green())
        }
        CallNotification::PeerUnresponsive => {
            warn!("Peer of {} stopped answering keepalives", side.handle.local());
            println!("   {} {}", side.label, "peer unresponsive".yellow())
        }
        CallNotification::PeerResponsive => {
            println!("   {} {}", side.label, "peer responsive again".green())
        }
        CallNotification::SessionWarning { remaining } => {
            println!(
                "   {} {}",
                side.label,
                format!("session ends in {}s", remaining.as_secs()).yellow()
            );
            side.handle.extend_session().await.ok();
        }
        CallNotification::SessionExtended { limit } => {
            println!("   {} session extended to {}s", side.label, limit.as_secs())
        }
        CallNotification::SessionExpired => {
            println!("   {} {}", side.label, "session expired".red())
        }
        CallNotification::Exited(reason) => {
            let text = format!("{reason:?}");
            let text = match reason {
                ExitReason::Left => text.normal(),
                _ => text.red(),
            };
            println!("   {} exited: {}", side.label, text);
            side.exited = true;
        }
    }
    Ok(())
}
