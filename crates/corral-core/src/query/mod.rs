// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Hierarchical queries over the cluster controller.
//!
//! A [`NavigationPath`] such as `/clusters/c1/services/HDFS/components`
//! selects resources of its leaf type. The ids along the path become an
//! equality predicate on the leaf schema's key properties, caller fields
//! are resolved against the schema, and declared sub-resources are queried
//! recursively, producing a [`TreeNode`](crate::tree::TreeNode).

pub mod definitions;
pub mod executor;
pub mod fields;
pub mod path;

pub use self::definitions::{ResourceDefinition, ResourceDefinitions};
pub use self::executor::QueryExecutor;
pub use self::fields::{FieldSelection, resolve_fields};
pub use self::path::{NavigationPath, PathSegment};
