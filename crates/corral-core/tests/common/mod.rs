// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for corral-core integration tests.
//!
//! Provides an in-memory control plane with a recording dispatcher, and
//! helpers for seeding stored resources.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use serde_json::Value;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

use corral_core::live::{CommandDispatcher, HostCommand};
use corral_core::request::{PropertyMap, Request};
use corral_core::resource::{PropertyId, ResourceType};
use corral_core::runtime::ControlPlane;

/// Route test logs through the test harness. Set `RUST_LOG` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A fresh in-memory database with migrations applied.
pub async fn test_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to open in-memory database");
    corral_core::migrations::SQLITE
        .run(&pool)
        .await
        .expect("Failed to run migrations");
    pool
}

/// Dispatcher that keeps every batch it is handed.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    batches: Mutex<Vec<(Uuid, Vec<HostCommand>)>>,
}

impl RecordingDispatcher {
    pub fn batches(&self) -> Vec<(Uuid, Vec<HostCommand>)> {
        self.batches.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CommandDispatcher for RecordingDispatcher {
    async fn dispatch(&self, request_id: Uuid, commands: Vec<HostCommand>) -> corral_core::Result<()> {
        self.batches.lock().unwrap().push((request_id, commands));
        Ok(())
    }
}

/// Test context: a wired control plane and the dispatcher it sends to.
pub struct TestContext {
    pub plane: ControlPlane,
    pub dispatcher: Arc<RecordingDispatcher>,
}

impl TestContext {
    pub async fn new() -> Self {
        init_tracing();
        let dispatcher = Arc::new(RecordingDispatcher::default());
        let plane = ControlPlane::builder()
            .pool(test_pool().await)
            .dispatcher(dispatcher.clone())
            .build()
            .await
            .expect("Failed to build control plane");
        Self { plane, dispatcher }
    }

    /// Store one resource per property list.
    pub async fn seed(&self, resource_type: ResourceType, rows: &[&[(&str, &str)]]) {
        let request = Request::write(rows.iter().map(|row| props(row)));
        self.plane
            .controller()
            .create_resources(resource_type, &request)
            .await
            .expect("Failed to seed resources");
    }
}

/// Property map from `(path, value)` pairs.
pub fn props(pairs: &[(&str, &str)]) -> PropertyMap {
    pairs
        .iter()
        .map(|(path, value)| (PropertyId::parse(path), Value::from(*value)))
        .collect()
}

/// Shorthand for [`PropertyId::parse`].
pub fn pid(path: &str) -> PropertyId {
    PropertyId::parse(path)
}

/// Set of field strings.
pub fn fields(paths: &[&str]) -> std::collections::BTreeSet<String> {
    paths.iter().map(|p| p.to_string()).collect()
}
