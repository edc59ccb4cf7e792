// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for corral-core.
//!
//! [`CoreError`] is what every federation call returns. Each variant maps to a
//! stable error code so an outer layer (REST, CLI) can translate it without
//! matching on message text. [`SchemaError`] is only produced while loading
//! schemas at start-up.

use thiserror::Error;

use crate::resource::ResourceType;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors returned by providers, the cluster controller and the query executor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum CoreError {
    /// A lookup that must identify exactly one resource matched none.
    #[error("No {resource_type} resource matches {predicate}")]
    NoSuchResource {
        /// Type that was looked up.
        resource_type: ResourceType,
        /// Rendered predicate used for the lookup.
        predicate: String,
    },

    /// A create collided with an existing resource.
    #[error("{resource_type} resource '{key}' already exists")]
    ResourceAlreadyExists {
        /// Type being created.
        resource_type: ResourceType,
        /// Identity of the existing resource.
        key: String,
    },

    /// The provider does not implement the requested operation.
    #[error("Operation '{operation}' is not supported for {resource_type} resources")]
    UnsupportedOperation {
        /// Type the operation targeted.
        resource_type: ResourceType,
        /// The rejected operation (create, update, delete).
        operation: &'static str,
    },

    /// No resource provider is registered for the type.
    #[error("No resource provider registered for {resource_type}")]
    NoResourceProvider {
        /// The unserved type.
        resource_type: ResourceType,
    },

    /// A navigation path names a type that is not an ancestor of the target.
    #[error("{ancestor} is not an ancestor of {resource_type}")]
    UnrelatedAncestor {
        /// Target type of the query.
        resource_type: ResourceType,
        /// The offending path segment type.
        ancestor: ResourceType,
    },

    /// The request is malformed.
    #[error("Invalid request: {message}")]
    InvalidRequest {
        /// What is wrong with it.
        message: String,
    },

    /// A lifecycle event is not accepted in the entity's current state.
    #[error("Invalid transition for '{entity}': event {event_type} not accepted in state {state}")]
    InvalidStateTransition {
        /// The entity the event was delivered to.
        entity: String,
        /// State the entity was (and still is) in.
        state: String,
        /// The rejected event type.
        event_type: String,
    },

    /// The controller or its providers are wired inconsistently.
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the wiring problem.
        message: String,
    },

    /// A backing store failed.
    #[error("Backend error during '{operation}': {details}")]
    Backend {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },
}

impl CoreError {
    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::NoSuchResource { .. } => "NO_SUCH_RESOURCE",
            Self::ResourceAlreadyExists { .. } => "RESOURCE_ALREADY_EXISTS",
            Self::UnsupportedOperation { .. } => "UNSUPPORTED_OPERATION",
            Self::NoResourceProvider { .. } => "NO_RESOURCE_PROVIDER",
            Self::UnrelatedAncestor { .. } => "UNRELATED_ANCESTOR",
            Self::InvalidRequest { .. } => "INVALID_REQUEST",
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::Configuration { .. } => "CONFIGURATION_ERROR",
            Self::Backend { .. } => "BACKEND_ERROR",
        }
    }

    /// Shorthand for [`CoreError::InvalidRequest`].
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    /// Whether the caller can recover by changing its request.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Configuration { .. } | Self::Backend { .. })
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::Backend {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Backend {
            operation: "json".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for CoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        CoreError::Backend {
            operation: "migrate".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<SchemaError> for CoreError {
    fn from(err: SchemaError) -> Self {
        CoreError::Configuration {
            message: err.to_string(),
        }
    }
}

/// Schema loading and validation errors. These are start-up defects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// The source supplied no schema for a resource type.
    #[error("no schema defined for resource type {0}")]
    MissingSchema(ResourceType),

    /// A schema was registered under a type it does not describe.
    #[error("schema registered for {registered} describes {declared}")]
    MismatchedSchema {
        /// Type the schema was registered under.
        registered: ResourceType,
        /// Type the schema itself declares.
        declared: ResourceType,
    },

    /// A schema lacks the key property for itself or one of its ancestors.
    #[error("schema for {resource_type} has no key property for {ancestor}")]
    MissingKeyProperty {
        /// Type whose schema is incomplete.
        resource_type: ResourceType,
        /// The ancestor (or the type itself) without a key property.
        ancestor: ResourceType,
    },

    /// A schema descriptor could not be read or parsed.
    #[error("failed to load schema descriptors from {origin}: {details}")]
    Load {
        /// Where the descriptors came from.
        origin: String,
        /// What went wrong.
        details: String,
    },
}
