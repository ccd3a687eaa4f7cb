//! fleetd - fleet coordinator
//!
//! Agents announce their slots; the coordinator keeps the latest status of
//! every agent in memory, answers filtered slot queries, and fans install and
//! terminate requests out to the matching agents with bounded concurrency.
//!
//! # Modules
//!
//! - [`domain`] - Agent, slot, and coordinate types
//! - [`filter`] - Slot and agent predicates built from key/value criteria
//! - [`registry`] - In-memory fleet registry
//! - [`repository`] - Binary and config sources
//! - [`resolver`] - Assignment to installation resolution over a config chain
//! - [`gateway`] - Remote agent calls
//! - [`coordinator`] - Install/terminate orchestration
//! - [`ipc`] - Local control socket
//! - [`server`] - Wiring and run loop
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod domain;
pub mod filter;
pub mod gateway;
pub mod ipc;
pub mod registry;
pub mod repository;
pub mod resolver;
pub mod server;

// Re-export commonly used types
pub use config::Config;
pub use coordinator::{Coordinator, CoordinatorConfig, CoordinatorError, DispatchFailure, DispatchReport};
pub use domain::{
    AgentId, AgentLifecycleState, AgentSlot, AgentStatus, Assignment, BinaryCoordinate, ConfigCoordinate, ConfigMap,
    Installation, SlotId, SlotLifecycleState, SlotStatus,
};
pub use filter::{AgentFilter, FilterError, FilterMode, SlotFilter};
pub use gateway::{AgentGateway, GatewayError, HttpAgentGateway};
pub use registry::{FleetRegistry, RegistryError};
pub use repository::{BinaryRepository, ConfigRepository, RepositoryError};
pub use resolver::{InstallationResolver, ResolveError};
