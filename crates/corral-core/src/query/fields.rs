// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Resolution of caller field lists against a schema.
//!
//! Each field is resolved in this order:
//!
//! 1. an optional `[start,end(,step)]` suffix is split off as a temporal range
//! 2. `*` selects every local property
//! 3. a field equal to, or under, a declared sub-resource name (longest
//!    match) is forwarded to that sub-resource
//! 4. a declared category expands to all its properties
//! 5. `category/name` with a declared category names that property
//! 6. anything else is accepted as a property of the catch-all category

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CoreError, Result};
use crate::request::TemporalInfo;
use crate::resource::PropertyId;
use crate::schema::Schema;

/// Outcome of resolving a field list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldSelection {
    /// `*` was requested.
    pub all_properties: bool,
    /// Local properties to project.
    pub property_ids: BTreeSet<PropertyId>,
    /// Temporal ranges by property.
    pub temporal: BTreeMap<PropertyId, TemporalInfo>,
    /// Field lists forwarded to sub-resources, by sub-resource name.
    pub sub_resources: BTreeMap<String, BTreeSet<String>>,
}

/// Resolve `fields` for a resource described by `schema` with the given
/// sub-resource names.
pub fn resolve_fields<'a>(
    schema: &Schema,
    sub_resource_names: impl IntoIterator<Item = &'a String>,
    fields: &BTreeSet<String>,
) -> Result<FieldSelection> {
    let sub_names: Vec<&String> = sub_resource_names.into_iter().collect();
    let mut selection = FieldSelection::default();

    for field in fields {
        let (base, suffix) = split_temporal(field);
        let temporal = suffix.map(parse_temporal).transpose()?;

        if base == "*" {
            selection.all_properties = true;
            continue;
        }

        let sub_resource = sub_names
            .iter()
            .filter(|name| {
                base == name.as_str()
                    || base
                        .strip_prefix(name.as_str())
                        .is_some_and(|rest| rest.starts_with('/'))
            })
            .max_by_key(|name| name.len());
        if let Some(name) = sub_resource {
            let forwarded = selection.sub_resources.entry((*name).clone()).or_default();
            let rest = base[name.len()..].trim_start_matches('/');
            if !rest.is_empty() {
                forwarded.insert(format!("{}{}", rest, suffix.unwrap_or_default()));
            }
            continue;
        }

        let ids = if schema.has_category(base) {
            schema.category_property_ids(base)
        } else {
            let id = PropertyId::parse(base);
            match id.category() {
                Some(category) if schema.has_category(category) => {
                    vec![schema.declared_property(&id).cloned().unwrap_or(id)]
                }
                _ => vec![
                    schema
                        .declared_property(&PropertyId::uncategorized(base))
                        .cloned()
                        .unwrap_or_else(|| PropertyId::uncategorized(base)),
                ],
            }
        };

        for id in ids {
            if let Some(info) = temporal {
                selection.temporal.insert(id.clone(), info);
            }
            selection.property_ids.insert(id);
        }
    }

    Ok(selection)
}

fn split_temporal(field: &str) -> (&str, Option<&str>) {
    match field.find('[') {
        Some(start) if field.ends_with(']') => (&field[..start], Some(&field[start..])),
        _ => (field, None),
    }
}

fn parse_temporal(suffix: &str) -> Result<TemporalInfo> {
    let invalid = || CoreError::invalid_request(format!("invalid temporal range {}", suffix));
    let inner = suffix
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .ok_or_else(invalid)?;

    let mut bounds = Vec::with_capacity(3);
    for part in inner.split(',') {
        let part = part.trim();
        bounds.push(if part.is_empty() {
            None
        } else {
            Some(part.parse::<i64>().map_err(|_| invalid())?)
        });
    }
    if bounds.len() < 2 || bounds.len() > 3 {
        return Err(invalid());
    }

    Ok(TemporalInfo {
        start: bounds[0],
        end: bounds[1],
        step: bounds.get(2).copied().flatten(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceType;
    use crate::schema::SchemaRegistry;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn fields(fields: &[&str]) -> BTreeSet<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_local_properties_and_forwarding() {
        let schema = Schema::builder(ResourceType::Service)
            .key_property(ResourceType::Cluster, "ServiceInfo/cluster_name")
            .key_property(ResourceType::Service, "ServiceInfo/service_name")
            .property("bar/c")
            .property("bar/x")
            .build();
        let subs = names(&["bar/d"]);

        let selection =
            resolve_fields(&schema, &subs, &fields(&["foo", "bar/c", "bar/d/e"])).unwrap();

        assert_eq!(
            selection.property_ids,
            BTreeSet::from([PropertyId::uncategorized("foo"), PropertyId::new("c", "bar")])
        );
        assert_eq!(selection.sub_resources["bar/d"], fields(&["e"]));
        assert!(!selection.all_properties);
    }

    #[test]
    fn test_category_expansion() {
        let registry = SchemaRegistry::builtin().unwrap();
        let host = registry.schema(ResourceType::Host);

        let selection = resolve_fields(host, &names(&[]), &fields(&["metrics/cpu"])).unwrap();

        assert_eq!(selection.property_ids.len(), 2);
        assert!(selection.property_ids.iter().all(|id| id.is_temporal()));
    }

    #[test]
    fn test_temporal_suffix() {
        let registry = SchemaRegistry::builtin().unwrap();
        let host = registry.schema(ResourceType::Host);
        let subs = names(&["host_components"]);

        let selection = resolve_fields(
            host,
            &subs,
            &fields(&["metrics/load/load_one[100,200,15]", "host_components/HostRoles/state"]),
        )
        .unwrap();

        let load = PropertyId::parse("metrics/load/load_one");
        assert_eq!(
            selection.temporal[&load],
            TemporalInfo {
                start: Some(100),
                end: Some(200),
                step: Some(15)
            }
        );
        assert_eq!(selection.sub_resources["host_components"], fields(&["HostRoles/state"]));

        assert!(resolve_fields(host, &subs, &fields(&["metrics/load/load_one[a,b]"])).is_err());
    }

    #[test]
    fn test_star_and_bare_sub_resource() {
        let registry = SchemaRegistry::builtin().unwrap();
        let cluster = registry.schema(ResourceType::Cluster);
        let subs = names(&["hosts", "services"]);

        let selection = resolve_fields(cluster, &subs, &fields(&["*", "hosts"])).unwrap();

        assert!(selection.all_properties);
        assert!(selection.property_ids.is_empty());
        assert!(selection.sub_resources["hosts"].is_empty());
        assert!(!selection.sub_resources.contains_key("services"));
    }

    #[test]
    fn test_longest_sub_resource_wins() {
        let schema = Schema::builder(ResourceType::User)
            .key_property(ResourceType::User, "Users/user_name")
            .build();
        let subs = names(&["a", "a/b"]);

        let selection = resolve_fields(&schema, &subs, &fields(&["a/b/c", "a/z"])).unwrap();

        assert_eq!(selection.sub_resources["a/b"], fields(&["c"]));
        assert_eq!(selection.sub_resources["a"], fields(&["z"]));
    }
}
