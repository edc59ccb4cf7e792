// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Schema descriptors read from a JSON file.
//!
//! ```json
//! [
//!   {
//!     "resource_type": "Cluster",
//!     "key_properties": { "Cluster": "Clusters/cluster_name" },
//!     "properties": [
//!       { "path": "Clusters/version" },
//!       { "path": "metrics/load/load_one", "temporal": true }
//!     ]
//!   }
//! ]
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::{Schema, SchemaSource};
use crate::error::SchemaError;
use crate::resource::ResourceType;

#[derive(Debug, Deserialize)]
struct SchemaDefinition {
    resource_type: ResourceType,
    key_properties: BTreeMap<ResourceType, String>,
    #[serde(default)]
    properties: Vec<PropertyDefinition>,
}

#[derive(Debug, Deserialize)]
struct PropertyDefinition {
    path: String,
    #[serde(default)]
    temporal: bool,
}

/// Reads schema descriptors from a JSON file.
#[derive(Debug, Clone)]
pub struct JsonSchemaSource {
    path: PathBuf,
}

impl JsonSchemaSource {
    /// Source reading `path` on every load.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Parse descriptors from a JSON string.
    pub fn parse(json: &str, origin: &str) -> Result<HashMap<ResourceType, Schema>, SchemaError> {
        let load_error = |details: String| SchemaError::Load {
            origin: origin.to_string(),
            details,
        };

        let definitions: Vec<SchemaDefinition> =
            serde_json::from_str(json).map_err(|e| load_error(e.to_string()))?;

        let mut schemas = HashMap::with_capacity(definitions.len());
        for definition in definitions {
            let ty = definition.resource_type;
            let mut builder = Schema::builder(ty);
            for (identified, path) in &definition.key_properties {
                builder = builder.key_property(*identified, path);
            }
            for property in &definition.properties {
                builder = if property.temporal {
                    builder.temporal_property(&property.path)
                } else {
                    builder.property(&property.path)
                };
            }
            if schemas.insert(ty, builder.build()).is_some() {
                return Err(load_error(format!("duplicate definition for {}", ty)));
            }
        }

        Ok(schemas)
    }
}

impl SchemaSource for JsonSchemaSource {
    fn load_schemas(&self) -> Result<HashMap<ResourceType, Schema>, SchemaError> {
        let origin = self.path.display().to_string();
        let json = std::fs::read_to_string(&self.path).map_err(|e| SchemaError::Load {
            origin: origin.clone(),
            details: e.to_string(),
        })?;
        Self::parse(&json, &origin)
    }
}
