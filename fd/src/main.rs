//! fleetd - fleet coordinator
//!
//! CLI entry point: runs the server or talks to a running one over IPC.

use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{debug, info};

use fleetd::cli::{Cli, Command, OutputFormat, get_log_path};
use fleetd::config::Config;
use fleetd::domain::{AgentId, AgentLifecycleState, AgentStatus, Assignment, SlotLifecycleState, SlotStatus};
use fleetd::ipc::{DispatchOutcome, FleetClient};
use fleetd::server;

fn setup_logging(log_level: Option<&str>) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    let log_path = get_log_path();
    if let Some(log_dir) = log_path.parent() {
        fs::create_dir_all(log_dir).context("Failed to create log directory")?;
    }

    let level = match log_level.map(|s| s.to_uppercase()) {
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .context("Failed to open log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(socket) = &cli.socket {
        config.ipc.socket_path = Some(socket.clone());
    }

    let level = cli.log_level.as_deref().or(config.log_level.as_deref());
    setup_logging(level).context("Failed to setup logging")?;

    let client = FleetClient::with_socket_path(config.ipc.socket_path());

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Serve => server::run_server(&config).await,
        Command::Slots { criteria, format } => {
            let slots = client.list_slots(criteria).await?;
            print_slots(&slots, &format)
        }
        Command::Agents { criteria, format } => {
            let agents = client.list_agents(criteria).await?;
            print_agents(&agents, &format)
        }
        Command::Agent { id, format } => {
            let agent = client.get_agent(AgentId::from(id)).await?;
            print_agents(std::slice::from_ref(&agent), &format)
        }
        Command::Install {
            binary,
            config_set,
            criteria,
            limit,
            format,
        } => {
            let assignment = Assignment::new(
                binary.parse().context("Invalid binary coordinate")?,
                config_set.parse().context("Invalid config coordinate")?,
            );
            let outcome = client.install(criteria, limit, assignment).await?;
            print_outcome(&outcome, &format)
        }
        Command::Terminate { criteria, format } => {
            let outcome = client.terminate(criteria).await?;
            print_outcome(&outcome, &format)
        }
        Command::Offline { id } => {
            client.agent_offline(AgentId::from(id.as_str())).await?;
            println!("Agent {} marked offline", id);
            Ok(())
        }
        Command::Announce { file } => {
            let status = read_status(&file)?;
            let agent_id = status.agent_id.clone();
            client.announce(status).await?;
            println!("Announced agent {}", agent_id);
            Ok(())
        }
        Command::Ping => cmd_ping(&client).await,
        Command::Stop => cmd_stop(&client).await,
        Command::Logs { lines } => cmd_logs(lines),
    }
}

async fn cmd_ping(client: &FleetClient) -> Result<()> {
    debug!("cmd_ping: called");
    if !client.socket_exists() {
        println!("fleetd is not running (no socket)");
        return Ok(());
    }

    match client.ping().await {
        Ok(version) => {
            println!("fleetd is alive and responsive");
            println!("Version: {}", version);
        }
        Err(e) => {
            println!("fleetd socket exists but is not responding");
            println!("Error: {}", e);
        }
    }
    Ok(())
}

async fn cmd_stop(client: &FleetClient) -> Result<()> {
    debug!("cmd_stop: called");
    if !client.socket_exists() {
        println!("fleetd is not running");
        return Ok(());
    }
    client.shutdown().await?;
    println!("fleetd stopping");
    Ok(())
}

fn cmd_logs(lines: usize) -> Result<()> {
    debug!(lines, "cmd_logs: called");
    let log_path = get_log_path();

    if !log_path.exists() {
        println!("No log file found at: {}", log_path.display());
        return Ok(());
    }

    let file = fs::File::open(&log_path).context("Failed to open log file")?;
    let all_lines: Vec<String> = BufReader::new(file).lines().map_while(Result::ok).collect();
    let start = all_lines.len().saturating_sub(lines);
    for line in &all_lines[start..] {
        println!("{}", line);
    }
    Ok(())
}

fn read_status(file: &Path) -> Result<AgentStatus> {
    let content = if file == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read status from stdin")?;
        buf
    } else {
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?
    };
    serde_json::from_str(&content).context("Failed to parse agent status")
}

fn print_slots(slots: &[SlotStatus], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(slots)?),
        OutputFormat::Text => {
            if slots.is_empty() {
                println!("No slots");
                return Ok(());
            }
            println!("{:<38} {:<12} {:<12} {:<32} {}", "ID", "NAME", "STATE", "BINARY", "CONFIG");
            for slot in slots {
                let (binary, config) = match &slot.assignment {
                    Some(a) => (a.binary.to_string(), a.config.to_string()),
                    None => ("-".to_string(), "-".to_string()),
                };
                println!(
                    "{:<38} {:<12} {:<12} {:<32} {}",
                    slot.id,
                    slot.name,
                    slot_state(slot.state),
                    binary,
                    config
                );
            }
        }
    }
    Ok(())
}

fn print_agents(agents: &[AgentStatus], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(agents)?),
        OutputFormat::Text => {
            if agents.is_empty() {
                println!("No agents");
                return Ok(());
            }
            println!("{:<38} {:<10} {:<6} {}", "ID", "STATE", "SLOTS", "LOCATION");
            for agent in agents {
                println!(
                    "{:<38} {:<10} {:<6} {}",
                    agent.agent_id,
                    agent_state(agent.state),
                    agent.slots.len(),
                    agent.location
                );
            }
        }
    }
    Ok(())
}

fn print_outcome(outcome: &DispatchOutcome, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::json!({
                "slots": outcome.slots,
                "failures": outcome.failures,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        OutputFormat::Text => {
            print_slots(&outcome.slots, format)?;
            for failure in &outcome.failures {
                let target = match &failure.slot_id {
                    Some(slot_id) => format!("{}/{}", failure.agent_id, slot_id),
                    None => failure.agent_id.to_string(),
                };
                println!("{} {}: {}", "FAILED".red().bold(), target, failure.message);
            }
        }
    }
    Ok(())
}

fn slot_state(state: SlotLifecycleState) -> String {
    let text = format!("{:<12}", state.to_string());
    match state {
        SlotLifecycleState::Running => text.green().to_string(),
        SlotLifecycleState::Stopped => text.yellow().to_string(),
        SlotLifecycleState::Terminated => text.dimmed().to_string(),
        SlotLifecycleState::Unknown => text.red().to_string(),
        SlotLifecycleState::Unassigned => text,
    }
}

fn agent_state(state: AgentLifecycleState) -> String {
    let text = format!("{:<10}", state.to_string());
    match state {
        AgentLifecycleState::Online => text.green().to_string(),
        AgentLifecycleState::Offline => text.red().to_string(),
    }
}
