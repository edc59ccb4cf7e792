// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Corral Core - Cluster Control Plane
//!
//! This crate federates the resources of a managed cluster (clusters,
//! services, components, hosts, host components, configurations, requests,
//! tasks and users) behind one typed query interface, and drives the
//! lifecycle of hosts and host components through state machines from
//! `corral-fsm`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Callers                                         │
//! │                (REST layer, CLI, scheduler, tests)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                 │ navigation path + fields            │ create/update/delete
//!                 ▼                                     │
//! ┌───────────────────────────────┐                     │
//! │        QueryExecutor          │                     │
//! │  path predicate, field        │                     │
//! │  resolution, sub-resources    │                     │
//! └───────────────────────────────┘                     │
//!                 │                                     │
//!                 ▼                                     ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        ClusterController                                 │
//! │     schema lookup → resource provider → property providers →             │
//! │     post-filter → sort → page → projection                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//!        │                        │                          │
//!        ▼                        ▼                          ▼
//! ┌──────────────┐    ┌──────────────────────┐    ┌──────────────────────┐
//! │   SQLite     │    │     ClusterState     │    │  Property sources    │
//! │  resources   │    │ host / host component│    │ (metrics, rack, ...) │
//! │    table     │    │   state machines     │    │                      │
//! └──────────────┘    └──────────────────────┘    └──────────────────────┘
//!                                │ HostCommand
//!                                ▼
//!                     ┌──────────────────────┐
//!                     │  CommandDispatcher   │
//!                     │   (orchestration)    │
//!                     └──────────────────────┘
//! ```
//!
//! # Reads
//!
//! A read names a resource type, a [`request::Request`] (the properties to
//! return, empty for all) and an optional [`predicate::Predicate`]. The
//! controller widens the request with the key properties and the properties
//! the predicate needs, lets the resource provider fetch (possibly a
//! superset), lets each property provider add what it owns, and only then
//! filters by the predicate and projects back to what was asked for.
//!
//! A failing property provider is logged and skipped; the read succeeds
//! without its properties.
//!
//! # Lifecycle
//!
//! | Entity | States |
//! |--------|--------|
//! | Host | `INIT`, `WAITING_FOR_VERIFICATION`, `HEALTHY`, `UNHEALTHY`, `HEARTBEAT_LOST` |
//! | Host component | `INIT`, `INSTALLING`, `INSTALLED`, `STARTING`, `STARTED`, `STOPPING`, `UNINSTALLING`, `UNINSTALLED`, `WIPING_OUT` and a `*_FAILED` state per operation |
//!
//! Setting `HostRoles/desired_state` on host components applies the event
//! that moves each of them towards that state and dispatches the matching
//! [`live::HostCommand`]s. The update returns an in-progress
//! [`request::RequestStatus`]; completion arrives later as component events
//! on [`live::ClusterState`].
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `CORRAL_DATABASE_URL` | Yes | - | SQLite connection string |
//! | `CORRAL_MAX_CONNECTIONS` | No | `5` | Pool size (1 for in-memory databases) |
//! | `CORRAL_SCHEMA_PATH` | No | built-in | JSON schema descriptor file |
//!
//! # Modules
//!
//! - [`config`]: Configuration from environment variables
//! - [`controller`]: Cluster controller and its provider registry
//! - [`error`]: Error types with stable error codes
//! - [`live`]: Live host and host component state
//! - [`predicate`]: Predicates and their builder
//! - [`provider`]: Resource and property providers
//! - [`query`]: Navigation paths and the query executor
//! - [`runtime`]: Start-up wiring

#![deny(missing_docs)]

/// Configuration loaded from environment variables.
pub mod config;

/// Cluster controller federating resource and property providers.
pub mod controller;

/// Error types with stable error codes.
pub mod error;

/// Live cluster state and orchestration commands.
pub mod live;

/// Embedded database migrations.
pub mod migrations;

/// Predicate tree, evaluation and fluent builder.
pub mod predicate;

/// Resource and property provider interfaces and implementations.
pub mod provider;

/// Hierarchical queries producing result trees.
pub mod query;

/// Read and write requests and their outcome.
pub mod request;

/// Resources, resource types and property ids.
pub mod resource;

/// Start-up wiring of a complete control plane.
pub mod runtime;

/// Resource schemas and their sources.
pub mod schema;

/// Result trees.
pub mod tree;

pub use controller::{ClusterController, ClusterControllerBuilder, ControllerCell};
pub use error::{CoreError, Result};
pub use query::{NavigationPath, QueryExecutor};
pub use runtime::{ControlPlane, ControlPlaneBuilder};
