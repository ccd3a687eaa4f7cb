//! Server wiring and run loop
//!
//! Builds the coordinator from config, serves IPC requests, and runs the
//! status expiration sweep until a signal or a `Shutdown` request arrives.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use eyre::{Context, Result};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::coordinator::{Coordinator, CoordinatorError};
use crate::domain::AgentLifecycleState;
use crate::filter::{AgentFilter, Criteria, FilterMode, SlotFilter};
use crate::gateway::HttpAgentGateway;
use crate::ipc::{self, FleetRequest, FleetResponse};
use crate::registry::FleetRegistry;
use crate::repository::{
    ConfigRepository, DirConfigRepository, HttpConfigRepository, MavenBinaryRepository,
};
use crate::resolver::InstallationResolver;

/// Server version reported by `Ping`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build the coordinator and its collaborators from validated config
pub async fn build_coordinator(config: &Config) -> Result<Coordinator> {
    debug!("build_coordinator: called");
    let repos = &config.repositories;

    let binary_bases = repos.binary_bases()?;
    if binary_bases.is_empty() {
        eyre::bail!("No binary repository configured");
    }
    let binary = Arc::new(
        MavenBinaryRepository::new(binary_bases, config.gateway.timeout())
            .context("Failed to create binary repository")?,
    );

    let mut chain: Vec<Arc<dyn ConfigRepository>> = Vec::new();
    if let Some(dir) = &repos.local_config_dir {
        chain.push(Arc::new(DirConfigRepository::local(dir)));
    }
    if let Some(dir) = &repos.git_config_dir {
        let git = DirConfigRepository::git(dir);
        if let Err(e) = git.refresh().await {
            warn!(dir = %dir.display(), error = %e, "Could not refresh git config repository, using checkout as is");
        }
        chain.push(Arc::new(git));
    }
    let remote_bases = repos.remote_config_bases()?;
    if !remote_bases.is_empty() {
        let remote = HttpConfigRepository::new(remote_bases, config.gateway.timeout())
            .context("Failed to create remote config repository")?;
        chain.push(Arc::new(remote));
    }
    if chain.is_empty() {
        warn!("No config repositories configured; every install will fail to resolve");
    }

    let resolver = InstallationResolver::new(binary, chain);
    info!(tiers = ?resolver.tier_names(), "Installation resolver ready");

    let gateway = Arc::new(HttpAgentGateway::new(config.gateway.timeout()).context("Failed to create agent gateway")?);

    Ok(Coordinator::new(
        config.coordinator.clone(),
        Arc::new(FleetRegistry::new()),
        gateway,
        resolver,
    ))
}

/// Handle one request against the coordinator
///
/// `Shutdown` is acknowledged here; stopping is the caller's job.
pub async fn handle_request(coordinator: &Coordinator, request: FleetRequest) -> FleetResponse {
    debug!(?request, "handle_request: called");
    match execute(coordinator, request).await {
        Ok(response) => response,
        Err(e) => {
            debug!(kind = e.kind(), error = %e, "handle_request: failed");
            FleetResponse::from(e)
        }
    }
}

async fn execute(coordinator: &Coordinator, request: FleetRequest) -> Result<FleetResponse, CoordinatorError> {
    match request {
        FleetRequest::ListSlots { criteria } => {
            let filter = SlotFilter::build(&criteria, FilterMode::Optional)?;
            let slots = coordinator.get_all_slots_status(&filter).await;
            Ok(FleetResponse::Slots { slots })
        }
        FleetRequest::Install {
            criteria,
            limit,
            assignment,
        } => {
            let filter = install_filter(&criteria)?;
            let report = coordinator
                .install_assignment_with_report(&filter, limit, &assignment)
                .await?;
            Ok(FleetResponse::Dispatched {
                failures: report.failure_summaries(),
                slots: report.succeeded,
            })
        }
        FleetRequest::Terminate { criteria } => {
            let filter = SlotFilter::build(&criteria, FilterMode::Required)?;
            let report = coordinator.terminate_with_report(&filter).await?;
            Ok(FleetResponse::Dispatched {
                failures: report.failure_summaries(),
                slots: report.succeeded,
            })
        }
        FleetRequest::Announce { status } => {
            coordinator.update_agent_status(status).await?;
            Ok(FleetResponse::Ok)
        }
        FleetRequest::AgentOffline { agent_id } => {
            coordinator.mark_agent_offline(&agent_id).await?;
            Ok(FleetResponse::Ok)
        }
        FleetRequest::GetAgent { agent_id } => {
            let status = coordinator.get_agent_status(&agent_id).await?;
            Ok(FleetResponse::Agent { status })
        }
        FleetRequest::ListAgents { criteria } => {
            let filter = AgentFilter::build(&criteria, FilterMode::Optional)?;
            let agents = coordinator.all_agent_statuses(&filter).await;
            Ok(FleetResponse::Agents { agents })
        }
        FleetRequest::Ping => Ok(FleetResponse::Pong {
            version: VERSION.to_string(),
        }),
        FleetRequest::Shutdown => Ok(FleetResponse::Ok),
    }
}

/// Agent filter for an install request
///
/// Without an explicit `state` criterion only online agents are eligible.
fn install_filter(criteria: &Criteria) -> Result<AgentFilter, CoordinatorError> {
    let filter = AgentFilter::build(criteria, FilterMode::Optional)?;
    if criteria.iter().any(|(key, _)| key == "state") {
        Ok(filter)
    } else {
        Ok(filter.with_state(AgentLifecycleState::Online))
    }
}

/// Serve IPC connections until `shutdown` resolves or a `Shutdown` request arrives
pub async fn serve<F>(coordinator: Arc<Coordinator>, listener: UnixListener, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    debug!("serve: called");
    let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);
    let mut sweep = tokio::time::interval(coordinator.config().sweep_interval());
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, _addr)) => {
                        debug!("serve: IPC connection accepted");
                        let coordinator = Arc::clone(&coordinator);
                        let stop_tx = stop_tx.clone();
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(&coordinator, stream, stop_tx).await {
                                warn!(error = %e, "IPC connection error");
                            }
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "IPC accept error");
                    }
                }
            }

            _ = sweep.tick() => {
                coordinator.expire_stale_agents().await;
            }

            _ = stop_rx.recv() => {
                info!("Shutdown requested over IPC");
                break;
            }

            _ = &mut shutdown => {
                debug!("serve: shutdown signal received");
                break;
            }
        }
    }

    Ok(())
}

async fn handle_connection(coordinator: &Coordinator, mut stream: UnixStream, stop_tx: mpsc::Sender<()>) -> Result<()> {
    let request = match ipc::read_request(&mut stream).await {
        Ok(request) => request,
        Err(e) => {
            let response = FleetResponse::Error {
                kind: "InvalidArgument".to_string(),
                message: format!("{:#}", e),
            };
            ipc::send_response(&mut stream, &response).await?;
            return Err(e);
        }
    };

    let is_shutdown = matches!(request, FleetRequest::Shutdown);
    let response = handle_request(coordinator, request).await;
    ipc::send_response(&mut stream, &response).await?;

    if is_shutdown {
        let _ = stop_tx.send(()).await;
    }
    Ok(())
}

/// Run the server: build everything from config and serve until stopped
pub async fn run_server(config: &Config) -> Result<()> {
    debug!("run_server: called");
    info!("fleetd starting...");

    config.validate().context("Invalid configuration")?;
    info!("Startup validation passed");

    let coordinator = Arc::new(build_coordinator(config).await?);

    let socket_path: PathBuf = config.ipc.socket_path();
    let (listener, socket_path) = ipc::create_listener_at(&socket_path)?;
    info!(?socket_path, "IPC socket listening");

    info!("fleetd running. Press Ctrl+C to stop.");
    let result = serve(coordinator, listener, shutdown_signal()).await;

    info!("fleetd shutting down...");
    ipc::cleanup_socket(&socket_path);
    debug!("run_server: shutdown complete");
    result
}

/// Resolves on SIGINT or SIGTERM (ctrl-c elsewhere)
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match (signal(SignalKind::interrupt()), signal(SignalKind::terminate())) {
            (Ok(mut sigint), Ok(mut sigterm)) => {
                tokio::select! {
                    _ = sigint.recv() => warn!("SIGINT received"),
                    _ = sigterm.recv() => warn!("SIGTERM received"),
                }
            }
            _ => {
                warn!("Could not install signal handlers, falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
