//! Domain types for fleetd
//!
//! Agents announce an `AgentStatus` carrying their slots. Operators target
//! slots with an `Assignment`, which the resolver turns into an `Installation`.

mod agent;
mod coordinate;
mod id;
mod slot;

pub use agent::{AgentLifecycleState, AgentStatus};
pub use coordinate::{BinaryCoordinate, ConfigCoordinate, CoordinateError, DEFAULT_PACKAGING};
pub use id::{AgentId, SlotId};
pub use slot::{AgentSlot, Assignment, ConfigMap, Installation, SlotLifecycleState, SlotStatus};
