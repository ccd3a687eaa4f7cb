//! Coordinator implementation

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{TimeDelta, Utc};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::config::CoordinatorConfig;
use super::error::CoordinatorError;
use super::report::{DispatchFailure, DispatchReport};
use crate::domain::{AgentId, AgentStatus, Assignment, Installation, SlotId, SlotStatus};
use crate::filter::{AgentFilter, FilterError, SlotFilter};
use crate::gateway::{AgentGateway, GatewayError};
use crate::registry::{FleetRegistry, RegistryError};
use crate::resolver::InstallationResolver;

/// What a dispatch task asks of its agent
#[derive(Clone)]
enum Operation {
    Install(Arc<Installation>),
    Terminate,
}

impl Operation {
    fn name(&self) -> &'static str {
        match self {
            Operation::Install(_) => "install",
            Operation::Terminate => "terminate",
        }
    }
}

/// One agent call in a batch
///
/// For install `slot_id` is the hint; for terminate it is the slot to kill.
struct Target {
    agent: Arc<AgentStatus>,
    slot_id: Option<SlotId>,
}

/// Flags the batch as cancelled when the batch future is dropped
struct CancelOnDrop(Arc<AtomicBool>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Top-level orchestrator over the fleet
///
/// Holds no state of its own beyond the registry; every call re-reads a
/// fresh registry snapshot.
pub struct Coordinator {
    config: CoordinatorConfig,
    registry: Arc<FleetRegistry>,
    gateway: Arc<dyn AgentGateway>,
    resolver: InstallationResolver,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        registry: Arc<FleetRegistry>,
        gateway: Arc<dyn AgentGateway>,
        resolver: InstallationResolver,
    ) -> Self {
        debug!(?config, "Coordinator::new: called");
        Self {
            config,
            registry,
            gateway,
            resolver,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<FleetRegistry> {
        &self.registry
    }

    /// Announce entry point: the only way an agent becomes visible
    pub async fn update_agent_status(&self, status: AgentStatus) -> Result<(), CoordinatorError> {
        debug!(agent_id = %status.agent_id, "Coordinator::update_agent_status: called");
        Ok(self.registry.update_agent_status(status).await?)
    }

    pub async fn get_agent_status(&self, agent_id: &AgentId) -> Result<AgentStatus, CoordinatorError> {
        Ok(self.registry.get_agent_status(agent_id).await?)
    }

    pub async fn mark_agent_offline(&self, agent_id: &AgentId) -> Result<(), CoordinatorError> {
        debug!(%agent_id, "Coordinator::mark_agent_offline: called");
        Ok(self.registry.mark_offline(agent_id).await?)
    }

    /// Slots matching `filter`, read from the registry only
    pub async fn get_all_slots_status(&self, filter: &SlotFilter) -> Vec<SlotStatus> {
        debug!(?filter, "Coordinator::get_all_slots_status: called");
        self.registry
            .all_slot_statuses()
            .await
            .into_iter()
            .filter(|candidate| filter.matches(candidate))
            .map(|candidate| candidate.slot)
            .collect()
    }

    /// Agents matching `filter`, ordered by agent id
    pub async fn all_agent_statuses(&self, filter: &AgentFilter) -> Vec<AgentStatus> {
        debug!(?filter, "Coordinator::all_agent_statuses: called");
        self.registry
            .all_agent_statuses()
            .await
            .into_iter()
            .filter(|agent| filter.matches(agent))
            .collect()
    }

    /// Resolve `assignment` and install it on up to `limit` agents
    pub async fn install_assignment(
        &self,
        filter: &AgentFilter,
        limit: usize,
        assignment: &Assignment,
    ) -> Result<Vec<SlotStatus>, CoordinatorError> {
        Ok(self.install_assignment_with_report(filter, limit, assignment).await?.succeeded)
    }

    pub async fn install_assignment_with_report(
        &self,
        filter: &AgentFilter,
        limit: usize,
        assignment: &Assignment,
    ) -> Result<DispatchReport, CoordinatorError> {
        debug!(binary = %assignment.binary, config = %assignment.config, %limit, "Coordinator::install_assignment: called");
        check_limit(limit)?;
        let installation = self.resolver.resolve(assignment).await?;
        self.install_with_report(filter, limit, &installation).await
    }

    pub async fn install(
        &self,
        filter: &AgentFilter,
        limit: usize,
        installation: &Installation,
    ) -> Result<Vec<SlotStatus>, CoordinatorError> {
        Ok(self.install_with_report(filter, limit, installation).await?.succeeded)
    }

    /// Install on at most `limit` agents matching `filter`, lowest agent id first
    ///
    /// Agents that fail are left out of `succeeded` and listed in `failed`.
    /// No matching agent is an empty report, not an error.
    pub async fn install_with_report(
        &self,
        filter: &AgentFilter,
        limit: usize,
        installation: &Installation,
    ) -> Result<DispatchReport, CoordinatorError> {
        debug!(?filter, %limit, "Coordinator::install_with_report: called");
        check_limit(limit)?;

        let targets: Vec<Target> = self
            .registry
            .all_agent_statuses()
            .await
            .into_iter()
            .filter(|agent| filter.matches(agent))
            .take(limit)
            .map(|agent| Target {
                slot_id: agent.first_unassigned_slot().map(|s| s.id.clone()),
                agent: Arc::new(agent),
            })
            .collect();

        if targets.is_empty() {
            info!("No eligible agents for install");
            return Ok(DispatchReport::default());
        }

        let report = self
            .dispatch(Operation::Install(Arc::new(installation.clone())), targets)
            .await;
        info!(
            binary = %installation.assignment.binary,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Install finished"
        );
        Ok(report)
    }

    pub async fn terminate(&self, filter: &SlotFilter) -> Result<Vec<SlotStatus>, CoordinatorError> {
        Ok(self.terminate_with_report(filter).await?.succeeded)
    }

    /// Terminate every slot matching `filter`
    ///
    /// A filter without criteria is refused so an empty request can never
    /// reach the whole fleet.
    pub async fn terminate_with_report(&self, filter: &SlotFilter) -> Result<DispatchReport, CoordinatorError> {
        debug!(?filter, "Coordinator::terminate_with_report: called");
        if !filter.has_criteria() {
            return Err(FilterError::MissingCriteria.into());
        }

        let mut targets = Vec::new();
        for agent in self.registry.all_agent_statuses().await {
            let agent = Arc::new(agent);
            for candidate in agent.agent_slots() {
                if filter.matches(&candidate) {
                    targets.push(Target {
                        agent: Arc::clone(&agent),
                        slot_id: Some(candidate.slot.id),
                    });
                }
            }
        }
        targets.sort_by(|a, b| (&a.agent.agent_id, &a.slot_id).cmp(&(&b.agent.agent_id, &b.slot_id)));

        if targets.is_empty() {
            info!("No slots matched terminate filter");
            return Ok(DispatchReport::default());
        }

        let report = self.dispatch(Operation::Terminate, targets).await;
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "Terminate finished"
        );
        Ok(report)
    }

    /// Mark agents that stopped announcing as offline
    pub async fn expire_stale_agents(&self) -> Vec<AgentId> {
        let max_age = i64::try_from(self.config.status_expiration_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .unwrap_or(TimeDelta::MAX);
        let expired = self.registry.expire_stale(Utc::now(), max_age).await;
        for agent_id in &expired {
            warn!(%agent_id, "Agent status expired, marked offline");
        }
        expired
    }

    /// Fan out one task per target, bounded by the dispatch permits
    ///
    /// Results come back in target order. A task that has begun its gateway
    /// call finishes and merges even if this future is dropped; tasks still
    /// waiting for a permit see the cancel flag and skip.
    async fn dispatch(&self, operation: Operation, targets: Vec<Target>) -> DispatchReport {
        debug!(operation = operation.name(), targets = targets.len(), "Coordinator::dispatch: called");
        let permits = Arc::new(Semaphore::new(self.config.dispatch_permits()));
        let cancelled = Arc::new(AtomicBool::new(false));
        let _guard = CancelOnDrop(Arc::clone(&cancelled));

        let (keys, handles): (Vec<(AgentId, Option<SlotId>)>, Vec<JoinHandle<Option<Result<SlotStatus, GatewayError>>>>) =
            targets
                .into_iter()
                .map(|target| {
                    let key = (target.agent.agent_id.clone(), target.slot_id.clone());
                    let handle = tokio::spawn(run_target(
                        Arc::clone(&self.gateway),
                        Arc::clone(&self.registry),
                        operation.clone(),
                        target,
                        Arc::clone(&permits),
                        Arc::clone(&cancelled),
                    ));
                    (key, handle)
                })
                .unzip();

        let joined = join_all(handles).await;

        let mut report = DispatchReport::default();
        for ((agent_id, slot_id), result) in keys.into_iter().zip(joined) {
            let outcome = match result {
                Ok(Some(outcome)) => outcome,
                Ok(None) => continue,
                Err(e) => Err(GatewayError::InvalidResponse(format!("dispatch task failed: {}", e))),
            };

            match outcome {
                Ok(slot) => report.succeeded.push(slot),
                Err(source) => {
                    warn!(%agent_id, ?slot_id, operation = operation.name(), error = %source, "Agent call failed");
                    let slot_id = match operation {
                        Operation::Install(_) => None,
                        Operation::Terminate => slot_id,
                    };
                    report.failed.push(DispatchFailure {
                        agent_id: agent_id.clone(),
                        slot_id,
                        error: CoordinatorError::RemoteDispatchFailure { agent_id, source },
                    });
                }
            }
        }
        report
    }
}

/// Body of one dispatch task
///
/// Returns `None` when the batch was cancelled before this target started.
async fn run_target(
    gateway: Arc<dyn AgentGateway>,
    registry: Arc<FleetRegistry>,
    operation: Operation,
    target: Target,
    permits: Arc<Semaphore>,
    cancelled: Arc<AtomicBool>,
) -> Option<Result<SlotStatus, GatewayError>> {
    let _permit = permits.acquire_owned().await.ok()?;
    if cancelled.load(Ordering::SeqCst) {
        debug!(agent_id = %target.agent.agent_id, "run_target: batch cancelled, skipping");
        return None;
    }

    let agent = target.agent.as_ref();
    let result = match (&operation, &target.slot_id) {
        (Operation::Install(installation), hint) => gateway.install(agent, hint.as_ref(), installation).await,
        (Operation::Terminate, Some(slot_id)) => gateway.terminate(agent, slot_id).await,
        (Operation::Terminate, None) => Err(GatewayError::InvalidResponse("no slot to terminate".to_string())),
    };
    let result = result.and_then(|slot| check_slot_id(slot, target.slot_id.as_ref()));

    if let Ok(slot) = &result {
        match registry.merge_slot(&agent.agent_id, slot.clone()).await {
            Ok(_) => debug!(agent_id = %agent.agent_id, slot_id = %slot.id, state = %slot.state, "run_target: merged"),
            Err(RegistryError::AgentNotFound(_)) => {
                warn!(agent_id = %agent.agent_id, "Agent left the registry before its result could be merged")
            }
            Err(e) => warn!(agent_id = %agent.agent_id, error = %e, "Merge failed"),
        }
    }

    Some(result)
}

/// An agent must answer for the slot it was asked about
fn check_slot_id(slot: SlotStatus, expected: Option<&SlotId>) -> Result<SlotStatus, GatewayError> {
    match expected {
        Some(expected) if slot.id != *expected => Err(GatewayError::InvalidResponse(format!(
            "agent answered for slot {} instead of {}",
            slot.id, expected
        ))),
        _ => Ok(slot),
    }
}

fn check_limit(limit: usize) -> Result<(), CoordinatorError> {
    if limit == 0 {
        return Err(CoordinatorError::InvalidArgument("limit must be at least 1".to_string()));
    }
    Ok(())
}
