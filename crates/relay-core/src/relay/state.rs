//! Lifecycle state machine and resource tracking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::debug;

/// Coarse-grained operational phase of a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelayState {
    /// No work has succeeded since construction or the last cleanup.
    #[default]
    Idle,
    /// A dependency call succeeded and resources are held.
    Active,
    /// The most recent dependency call failed.
    Error,
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayState::Idle => write!(f, "idle"),
            RelayState::Active => write!(f, "active"),
            RelayState::Error => write!(f, "error"),
        }
    }
}

/// Identifier of an async operation, unique per relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OperationId(pub u64);

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

/// A resource held by a relay until [`cleanup`](crate::Relay::cleanup).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    /// Held after a successful dependency call.
    Invocation,
    /// An async operation waiting on its completion.
    Pending(OperationId),
}

/// Admission ticket for an async operation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Ticket {
    pub id: OperationId,
    pub generation: u64,
}

/// Mutable relay state shared with in-flight completion routines.
#[derive(Debug, Default)]
pub(crate) struct Lifecycle {
    state: RelayState,
    resources: BTreeSet<Resource>,
    last_error: Option<String>,
    // Advanced by every reset; completions carrying an older value are stale.
    generation: u64,
    next_operation: u64,
}

impl Lifecycle {
    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn has_error(&self) -> bool {
        self.last_error.is_some()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn has_resources(&self) -> bool {
        !self.resources.is_empty()
    }

    pub fn resources(&self) -> Vec<Resource> {
        self.resources.iter().copied().collect()
    }

    pub fn in_flight(&self) -> usize {
        self.resources
            .iter()
            .filter(|r| matches!(r, Resource::Pending(_)))
            .count()
    }

    /// Record a successful dependency call. `Error` is kept until the next reset.
    pub fn succeed(&mut self) {
        self.resources.insert(Resource::Invocation);
        if self.state != RelayState::Error {
            self.transition(RelayState::Active);
        }
    }

    /// Record a failed dependency call.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
        self.transition(RelayState::Error);
    }

    /// Admit a new async operation, or refuse if `limit` operations are already pending.
    pub fn begin(&mut self, limit: Option<usize>) -> Option<Ticket> {
        if limit.is_some_and(|limit| self.in_flight() >= limit) {
            return None;
        }

        self.next_operation += 1;
        let id = OperationId(self.next_operation);
        self.resources.insert(Resource::Pending(id));

        Some(Ticket {
            id,
            generation: self.generation,
        })
    }

    /// Apply the result of an async operation.
    ///
    /// Returns `false` when the operation predates the last reset.
    pub fn settle(&mut self, ticket: Ticket, success: bool, data: &str) -> bool {
        if ticket.generation != self.generation {
            debug!(operation = %ticket.id, "Stale completion absorbed");
            return false;
        }

        self.resources.remove(&Resource::Pending(ticket.id));
        if success {
            self.succeed();
        } else {
            self.fail(data);
        }
        true
    }

    /// Drop every resource, clear the error and return to idle.
    ///
    /// Returns the number of resources released.
    pub fn reset(&mut self) -> usize {
        let released = self.resources.len();
        self.resources.clear();
        self.last_error = None;
        self.generation += 1;
        self.transition(RelayState::Idle);
        released
    }

    fn transition(&mut self, next: RelayState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Relay state transition");
            self.state = next;
        }
    }
}
