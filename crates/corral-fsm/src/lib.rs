// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Corral FSM - Declarative Lifecycle State Machines
//!
//! This crate provides a reusable finite state machine engine and the
//! lifecycle tables for the entities a corral control plane manages.
//!
//! # Model
//!
//! A lifecycle is described once, at start-up, as a transition table keyed by
//! `(current state, event type)`. Each entry names a target state and an
//! optional side-effect hook. The table is assembled with a
//! [`StateMachineFactoryBuilder`] and then frozen into an immutable
//! [`StateMachineFactory`] that is shared by every entity of that kind.
//!
//! ```text
//!   StateMachineFactoryBuilder::new(INIT)
//!       .add_transition(INIT, INSTALLING, INSTALL)
//!       .add_transition_with_hook(INSTALLING, INSTALLED, OP_SUCCEEDED, hook)
//!       .freeze()                       ──►  Arc<StateMachineFactory>
//!                                                   │ make(owner)
//!                                                   ▼
//!                                            StateMachine (one per entity)
//!                                                   │ handle_event(&event)
//!                                                   ▼
//!                            lookup (state, type) ─► hook(owner, event) ─► commit
//! ```
//!
//! # Event Handling Guarantees
//!
//! | Situation | Result | State |
//! |-----------|--------|-------|
//! | No entry for `(state, type)` | [`TransitionError::InvalidStateTransition`] | unchanged |
//! | Entry present, hook fails | [`TransitionError::HookFailed`] | unchanged |
//! | Entry present, hook succeeds (or none) | `Ok(target)` | `target` |
//!
//! Lookup, hook and commit run under a per-machine lock, so concurrent events
//! for one entity are serialized while different entities never contend.
//!
//! # Lifecycles
//!
//! - [`host`]: agent registration and heartbeat health
//! - [`component`]: install/start/stop/uninstall of a component on a host
//! - [`action`]: execution of an action or job

#![deny(missing_docs)]

/// Action and job execution lifecycle.
pub mod action;

/// Service component (host component) lifecycle.
pub mod component;

/// Transition errors.
pub mod error;

/// Transition table builder and frozen factory.
pub mod factory;

/// Host (agent) lifecycle.
pub mod host;

/// Per-entity state machine runtime.
pub mod machine;

pub use error::{FactoryError, HookError, TransitionError};
pub use factory::{StateMachineFactory, StateMachineFactoryBuilder, TransitionHook};
pub use machine::{MachineEventType, MachineState, StateMachine, StateMachineEvent};
