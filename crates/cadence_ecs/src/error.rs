//! Error types for cadence_ecs

use crate::entity::Uid;
use crate::storage::SlotId;
use thiserror::Error;

/// Errors that can occur while working with a [`World`](crate::World).
///
/// Every raising accessor has an optional-returning `find_*` sibling;
/// callers that want tolerance should prefer those. Invariant violations
/// (state regression, dispatch-table misuse) are programming errors and
/// panic instead of surfacing here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// No system is registered for the requested system or component type
    #[error("no system registered for {0}")]
    SystemNotFound(&'static str),

    /// No entity with this uid exists in any lifecycle queue
    #[error("entity {0} not found")]
    EntityNotFound(Uid),

    /// The slot id does not denote a live component
    #[error("{component} slot {slot} not found")]
    ComponentNotFound {
        /// Component type name
        component: &'static str,
        /// The slot id that was looked up
        slot: SlotId,
    },

    /// The entity does not own a component of the requested type
    #[error("entity {uid} has no {component} component")]
    MissingComponent {
        /// Uid of the entity that was queried
        uid: Uid,
        /// Component type name
        component: &'static str,
    },
}

/// Result type for cadence_ecs operations
pub type Result<T> = std::result::Result<T, EcsError>;
