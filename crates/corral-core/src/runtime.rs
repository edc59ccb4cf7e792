// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Start-up wiring for an embedded control plane.
//!
//! [`ControlPlane`] bundles the controller, the query executor and the live
//! cluster state. Every resource type gets a provider: explicitly registered
//! ones win, host components are served from live state, and everything
//! else is stored in SQLite.
//!
//! # Example
//!
//! ```rust,ignore
//! use corral_core::config::Config;
//! use corral_core::runtime::ControlPlane;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let plane = ControlPlane::from_config(&config).await?;
//!
//!     let path = "/clusters/c1/services".parse()?;
//!     let tree = plane.executor().execute(&path, &Default::default()).await?;
//!     println!("{}", serde_json::to_string_pretty(&tree)?);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

use crate::config::Config;
use crate::controller::ClusterController;
use crate::live::{ClusterState, CommandDispatcher, LoggingDispatcher};
use crate::migrations;
use crate::provider::{
    ComponentCountPropertyProvider, LiveHostComponentProvider, LiveHostPropertyProvider, PropertyProvider,
    ResourceProvider, SqliteResourceProvider,
};
use crate::query::{QueryExecutor, ResourceDefinitions};
use crate::resource::ResourceType;
use crate::schema::{BuiltinSchemaSource, JsonSchemaSource, SchemaRegistry, SchemaSource};

/// Builder for creating a [`ControlPlane`].
#[derive(Default)]
pub struct ControlPlaneBuilder {
    pool: Option<SqlitePool>,
    schema_source: Option<Box<dyn SchemaSource>>,
    definitions: Option<ResourceDefinitions>,
    dispatcher: Option<Arc<dyn CommandDispatcher>>,
    cluster_state: Option<Arc<ClusterState>>,
    resource_providers: Vec<Arc<dyn ResourceProvider>>,
    property_providers: Vec<Arc<dyn PropertyProvider>>,
}

impl std::fmt::Debug for ControlPlaneBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlPlaneBuilder")
            .field("pool", &self.pool.as_ref().map(|_| "..."))
            .field("schema_source", &self.schema_source.as_ref().map(|_| "..."))
            .field("dispatcher", &self.dispatcher.as_ref().map(|_| "..."))
            .field("resource_providers", &self.resource_providers.len())
            .field("property_providers", &self.property_providers.len())
            .finish()
    }
}

impl ControlPlaneBuilder {
    /// Create a builder with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the SQLite pool backing the relational providers (required).
    pub fn pool(mut self, pool: SqlitePool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Load schemas from `source` instead of the built-in ones.
    pub fn schema_source(mut self, source: impl SchemaSource + 'static) -> Self {
        self.schema_source = Some(Box::new(source));
        self
    }

    /// Navigate `definitions` instead of the built-in hierarchy.
    pub fn definitions(mut self, definitions: ResourceDefinitions) -> Self {
        self.definitions = Some(definitions);
        self
    }

    /// Send orchestration commands to `dispatcher` (default: log them).
    pub fn dispatcher(mut self, dispatcher: Arc<dyn CommandDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Use an existing live cluster state.
    pub fn cluster_state(mut self, state: Arc<ClusterState>) -> Self {
        self.cluster_state = Some(state);
        self
    }

    /// Serve a type from `provider` instead of the default.
    pub fn resource_provider(mut self, provider: Arc<dyn ResourceProvider>) -> Self {
        self.resource_providers.push(provider);
        self
    }

    /// Add a property provider after the built-in ones.
    pub fn property_provider(mut self, provider: Arc<dyn PropertyProvider>) -> Self {
        self.property_providers.push(provider);
        self
    }

    /// Run migrations, load schemas and wire every provider.
    pub async fn build(self) -> Result<ControlPlane> {
        let pool = self
            .pool
            .ok_or_else(|| anyhow::anyhow!("database pool is required"))?;

        migrations::run_sqlite(&pool).await?;
        info!("Database migrations applied");

        let source = self
            .schema_source
            .unwrap_or_else(|| Box::new(BuiltinSchemaSource));
        let schemas = Arc::new(SchemaRegistry::from_source(source.as_ref())?);

        let cluster_state = self.cluster_state.unwrap_or_default();
        let dispatcher = self
            .dispatcher
            .unwrap_or_else(|| Arc::new(LoggingDispatcher));

        let mut builder = ClusterController::builder(schemas.clone());
        for provider in self.resource_providers {
            builder = builder.resource_provider(provider);
        }
        if !builder.has_resource_provider(ResourceType::HostComponent) {
            builder = builder.resource_provider(Arc::new(LiveHostComponentProvider::new(
                cluster_state.clone(),
                dispatcher,
            )));
        }
        for resource_type in ResourceType::ALL {
            if !builder.has_resource_provider(resource_type) {
                builder = builder.resource_provider(Arc::new(SqliteResourceProvider::new(
                    pool.clone(),
                    schemas.schema(resource_type),
                )));
            }
        }

        builder = builder
            .property_provider(Arc::new(LiveHostPropertyProvider::new(cluster_state.clone())))
            .property_provider(Arc::new(ComponentCountPropertyProvider::new(cluster_state.clone())));
        for provider in self.property_providers {
            builder = builder.property_provider(provider);
        }

        let controller = Arc::new(builder.build()?);
        let executor = QueryExecutor::new(
            controller.clone(),
            Arc::new(self.definitions.unwrap_or_else(ResourceDefinitions::builtin)),
        );

        info!("Control plane ready");

        Ok(ControlPlane {
            controller,
            executor,
            cluster_state,
            pool,
        })
    }
}

/// A wired control plane.
#[derive(Debug, Clone)]
pub struct ControlPlane {
    controller: Arc<ClusterController>,
    executor: QueryExecutor,
    cluster_state: Arc<ClusterState>,
    pool: SqlitePool,
}

impl ControlPlane {
    /// Create a builder for configuring the control plane.
    pub fn builder() -> ControlPlaneBuilder {
        ControlPlaneBuilder::new()
    }

    /// Connect to the configured database and build with defaults.
    ///
    /// File databases need a URL that allows creation, e.g.
    /// `sqlite:corral.db?mode=rwc`. An in-memory database is limited to one
    /// connection that is never recycled, so all callers share it.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let options = if config.is_in_memory() {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };
        let pool = options.connect(&config.database_url).await?;
        info!(max_connections = pool.options().get_max_connections(), "Connected to resource store");

        let mut builder = Self::builder().pool(pool);
        if let Some(path) = &config.schema_path {
            builder = builder.schema_source(JsonSchemaSource::new(path));
        }
        builder.build().await
    }

    /// The cluster controller.
    pub fn controller(&self) -> &Arc<ClusterController> {
        &self.controller
    }

    /// The query executor.
    pub fn executor(&self) -> &QueryExecutor {
        &self.executor
    }

    /// Live hosts and host components.
    pub fn cluster_state(&self) -> &Arc<ClusterState> {
        &self.cluster_state
    }

    /// The resource store pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
