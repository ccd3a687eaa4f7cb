//! Coordinator for fleet operations
//!
//! The Coordinator owns the fleet registry and carries out filtered queries
//! plus the two fan-out operations:
//! - **Install:** resolve an assignment, then install it on a bounded set of agents
//! - **Terminate:** stop every slot matching a filter
//!
//! Per-agent failures shrink the result instead of failing the call.

mod config;
mod core;
mod error;
mod report;

pub use config::CoordinatorConfig;
pub use core::Coordinator;
pub use error::CoordinatorError;
pub use report::{DispatchFailure, DispatchReport, FailureSummary};
