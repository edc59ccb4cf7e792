// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the state machine framework.

/// Error returned by a transition hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while handling an event.
///
/// In both cases the entity keeps the state it had before the event arrived.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError<S, T> {
    /// The transition table has no entry for the current state and event type.
    #[error("invalid event {event_type} at current state {state}")]
    InvalidStateTransition {
        /// State the entity was in when the event arrived.
        state: S,
        /// Type of the offending event.
        event_type: T,
    },

    /// The transition exists but its side-effect hook failed.
    #[error("transition hook failed for event {event_type} at state {state}: {source}")]
    HookFailed {
        /// State the entity was in when the event arrived.
        state: S,
        /// Type of the event being handled.
        event_type: T,
        /// Error returned by the hook.
        #[source]
        source: HookError,
    },
}

impl<S: Copy, T: Copy> TransitionError<S, T> {
    /// The state the entity was (and still is) in.
    pub fn state(&self) -> S {
        match self {
            Self::InvalidStateTransition { state, .. } | Self::HookFailed { state, .. } => *state,
        }
    }

    /// The event type that could not be applied.
    pub fn event_type(&self) -> T {
        match self {
            Self::InvalidStateTransition { event_type, .. }
            | Self::HookFailed { event_type, .. } => *event_type,
        }
    }
}

/// Errors raised while freezing a transition table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FactoryError {
    /// Two transitions were registered for the same `(state, event type)` pair.
    #[error("duplicate transition from {state} on {event_type}")]
    DuplicateTransition {
        /// Source state of the duplicated entry.
        state: String,
        /// Event type of the duplicated entry.
        event_type: String,
    },
}
