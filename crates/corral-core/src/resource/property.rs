// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Property identifiers.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identifies a property by name within an optional category.
///
/// The textual form is `category/name`; the category may itself contain `/`
/// (`metrics/cpu/cpu_user` is `cpu_user` in category `metrics/cpu`). A
/// property without a category lives in the catch-all category.
///
/// The temporal flag describes the property and takes no part in equality,
/// ordering or hashing.
#[derive(Debug, Clone)]
pub struct PropertyId {
    name: String,
    category: Option<String>,
    temporal: bool,
}

impl PropertyId {
    /// Create a property id. An empty category means the catch-all category.
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        let category = category.into();
        Self {
            name: name.into(),
            category: (!category.is_empty()).then_some(category),
            temporal: false,
        }
    }

    /// Create a property id in the catch-all category.
    pub fn uncategorized(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: None,
            temporal: false,
        }
    }

    /// Parse `category/name`, splitting at the last `/`.
    pub fn parse(path: &str) -> Self {
        match path.rsplit_once('/') {
            Some((category, name)) => Self::new(name, category),
            None => Self::uncategorized(path),
        }
    }

    /// Mark the property as temporal (time-series valued).
    pub fn with_temporal(mut self, temporal: bool) -> Self {
        self.temporal = temporal;
        self
    }

    /// Property name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Category, or `None` for the catch-all category.
    pub fn category(&self) -> Option<&str> {
        self.category.as_deref()
    }

    /// Whether the property is temporal.
    pub fn is_temporal(&self) -> bool {
        self.temporal
    }

    /// The `category/name` form.
    pub fn path(&self) -> String {
        match &self.category {
            Some(category) => format!("{}/{}", category, self.name),
            None => self.name.clone(),
        }
    }

    /// Whether `other` lives under the category this id names.
    ///
    /// `metrics` covers `metrics/cpu/cpu_user`; `Hosts/host_name` covers
    /// nothing but itself.
    pub fn covers(&self, other: &PropertyId) -> bool {
        if self == other {
            return true;
        }
        let Some(category) = other.category() else {
            return false;
        };
        let path = self.path();
        category == path
            || category
                .strip_prefix(path.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl PartialEq for PropertyId {
    fn eq(&self, other: &Self) -> bool {
        self.category == other.category && self.name == other.name
    }
}

impl Eq for PropertyId {}

impl Hash for PropertyId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.category.hash(state);
        self.name.hash(state);
    }
}

impl PartialOrd for PropertyId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PropertyId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.category
            .cmp(&other.category)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.category {
            Some(category) => write!(f, "{}/{}", category, self.name),
            None => f.write_str(&self.name),
        }
    }
}
