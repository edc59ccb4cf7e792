// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Fluent predicate construction.
//!
//! ```
//! use corral_core::predicate::PredicateBuilder;
//!
//! let predicate = PredicateBuilder::new()
//!     .property_in("cluster_name", "HostRoles").equals("c1")
//!     .and()
//!     .begin()
//!         .property("HostRoles/state").equals("STARTED")
//!         .or()
//!         .property("HostRoles/state").equals("INSTALLED")
//!     .end()
//!     .to_predicate();
//! # let _ = predicate;
//! ```
//!
//! AND binds tighter than OR. The builder state is encoded in the types:
//! a property must be followed by an operator, and only a complete
//! expression can be combined or finished.

use serde_json::Value;

use super::{ComparisonOperator, Predicate};
use crate::resource::PropertyId;

#[derive(Debug, Default)]
struct Group {
    disjuncts: Vec<Vec<Predicate>>,
    current: Vec<Predicate>,
    negated: bool,
    negate_next: bool,
}

impl Group {
    fn push(&mut self, predicate: Predicate) {
        let predicate = if std::mem::take(&mut self.negate_next) {
            Predicate::not(predicate)
        } else {
            predicate
        };
        self.current.push(predicate);
    }

    fn next_disjunct(&mut self) {
        let current = std::mem::take(&mut self.current);
        self.disjuncts.push(current);
    }

    fn finish(mut self) -> Option<Predicate> {
        if !self.current.is_empty() {
            self.disjuncts.push(self.current);
        }
        if self.disjuncts.is_empty() {
            return None;
        }
        let predicate = Predicate::or(self.disjuncts.into_iter().map(Predicate::and));
        Some(if self.negated {
            Predicate::not(predicate)
        } else {
            predicate
        })
    }
}

#[derive(Debug)]
struct State {
    groups: Vec<Group>,
}

impl State {
    fn top(&mut self) -> &mut Group {
        if self.groups.is_empty() {
            self.groups.push(Group::default());
        }
        let last = self.groups.len() - 1;
        &mut self.groups[last]
    }

    fn close_group(&mut self) {
        if self.groups.len() < 2 {
            return;
        }
        if let Some(group) = self.groups.pop()
            && let Some(predicate) = group.finish()
        {
            self.top().push(predicate);
        }
    }
}

/// Expects a property, a negation or a group.
#[derive(Debug)]
pub struct PredicateBuilder {
    state: State,
}

impl Default for PredicateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PredicateBuilder {
    /// Start an empty predicate.
    pub fn new() -> Self {
        Self {
            state: State {
                groups: vec![Group::default()],
            },
        }
    }

    /// Next term compares the property at `path` (`category/name`).
    pub fn property(self, path: &str) -> PropertyBuilder {
        self.property_id(PropertyId::parse(path))
    }

    /// Next term compares the property `name` of `category`. An empty
    /// category names the catch-all category.
    pub fn property_in(self, name: &str, category: &str) -> PropertyBuilder {
        self.property_id(PropertyId::new(name, category))
    }

    /// Next term compares `property_id`.
    pub fn property_id(self, property_id: PropertyId) -> PropertyBuilder {
        PropertyBuilder {
            state: self.state,
            property_id,
        }
    }

    /// Negate the next term or group.
    pub fn not(mut self) -> Self {
        let group = self.state.top();
        group.negate_next = !group.negate_next;
        self
    }

    /// Open a parenthesized group; close it with [`ExpressionBuilder::end`].
    pub fn begin(mut self) -> Self {
        let negated = std::mem::take(&mut self.state.top().negate_next);
        self.state.groups.push(Group {
            negated,
            ..Group::default()
        });
        self
    }
}

/// Expects an operator for the pending property.
#[derive(Debug)]
pub struct PropertyBuilder {
    state: State,
    property_id: PropertyId,
}

impl PropertyBuilder {
    fn leaf(mut self, predicate: Predicate) -> ExpressionBuilder {
        self.state.top().push(predicate);
        ExpressionBuilder { state: self.state }
    }

    fn compare(self, operator: ComparisonOperator, value: Value) -> ExpressionBuilder {
        let predicate = Predicate::compare(self.property_id.clone(), operator, value);
        self.leaf(predicate)
    }

    /// `property = value`
    pub fn equals(self, value: impl Into<Value>) -> ExpressionBuilder {
        self.compare(ComparisonOperator::Equals, value.into())
    }

    /// `NOT property = value`
    pub fn not_equals(self, value: impl Into<Value>) -> ExpressionBuilder {
        let predicate = Predicate::not(Predicate::equals(self.property_id.clone(), value));
        self.leaf(predicate)
    }

    /// `property < value`
    pub fn less_than(self, value: impl Into<Value>) -> ExpressionBuilder {
        self.compare(ComparisonOperator::Less, value.into())
    }

    /// `property <= value`
    pub fn less_than_equal_to(self, value: impl Into<Value>) -> ExpressionBuilder {
        self.compare(ComparisonOperator::LessOrEquals, value.into())
    }

    /// `property > value`
    pub fn greater_than(self, value: impl Into<Value>) -> ExpressionBuilder {
        self.compare(ComparisonOperator::Greater, value.into())
    }

    /// `property >= value`
    pub fn greater_than_equal_to(self, value: impl Into<Value>) -> ExpressionBuilder {
        self.compare(ComparisonOperator::GreaterOrEquals, value.into())
    }

    /// `property IN (values)`
    pub fn in_values<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> ExpressionBuilder {
        let predicate = Predicate::in_values(
            self.property_id.clone(),
            values.into_iter().map(Into::into),
        );
        self.leaf(predicate)
    }
}

/// A complete expression that can be combined, closed or finished.
#[derive(Debug)]
pub struct ExpressionBuilder {
    state: State,
}

impl ExpressionBuilder {
    /// Conjoin the next term.
    pub fn and(self) -> PredicateBuilder {
        PredicateBuilder { state: self.state }
    }

    /// Disjoin the next term.
    pub fn or(mut self) -> PredicateBuilder {
        self.state.top().next_disjunct();
        PredicateBuilder { state: self.state }
    }

    /// Close the innermost open group. Without an open group this does nothing.
    pub fn end(mut self) -> Self {
        self.state.close_group();
        self
    }

    /// Finish the predicate, closing any group left open.
    pub fn to_predicate(mut self) -> Predicate {
        while self.state.groups.len() > 1 {
            self.state.close_group();
        }
        self.state
            .groups
            .pop()
            .and_then(Group::finish)
            .unwrap_or_else(|| Predicate::And(Vec::new()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::resource::{Resource, ResourceType};

    fn id(path: &str) -> PropertyId {
        PropertyId::parse(path)
    }

    fn host_component(state: &str) -> Resource {
        let mut resource = Resource::new(ResourceType::HostComponent);
        resource.set_property(&id("HostRoles/cluster_name"), "c1");
        resource.set_property(&id("HostRoles/host_name"), "h1");
        resource.set_property(&id("HostRoles/state"), state);
        resource
    }

    #[test]
    fn test_builder_matches_manual_construction() {
        let built = PredicateBuilder::new()
            .property("HostRoles/cluster_name")
            .equals("c1")
            .and()
            .property("HostRoles/host_name")
            .equals("h1")
            .to_predicate();

        let manual = Predicate::and([
            Predicate::equals(id("HostRoles/host_name"), "h1"),
            Predicate::equals(id("HostRoles/cluster_name"), "c1"),
        ]);

        assert_eq!(built, manual);
    }

    #[test]
    fn test_name_and_category_entry_point() {
        let by_parts = PredicateBuilder::new()
            .property_in("host_name", "HostRoles")
            .equals("h1")
            .and()
            .property_in("owner", "")
            .equals("ops")
            .to_predicate();

        let by_path = PredicateBuilder::new()
            .property("HostRoles/host_name")
            .equals("h1")
            .and()
            .property("owner")
            .equals("ops")
            .to_predicate();

        assert_eq!(by_parts, by_path);
        assert!(by_parts.property_ids().contains(&PropertyId::uncategorized("owner")));
    }

    #[test]
    fn test_call_order_does_not_matter() {
        let a = PredicateBuilder::new()
            .property("x/a")
            .equals(1)
            .and()
            .property("x/b")
            .equals(2)
            .to_predicate();
        let b = PredicateBuilder::new()
            .property("x/b")
            .equals(2)
            .and()
            .property("x/a")
            .equals(1)
            .to_predicate();

        assert_eq!(a, b);
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let predicate = PredicateBuilder::new()
            .property("x/a")
            .equals(1)
            .or()
            .property("x/b")
            .equals(2)
            .and()
            .property("x/c")
            .equals(3)
            .to_predicate();

        let expected = Predicate::or([
            Predicate::equals(id("x/a"), 1),
            Predicate::and([Predicate::equals(id("x/b"), 2), Predicate::equals(id("x/c"), 3)]),
        ]);
        assert_eq!(predicate, expected);
    }

    #[test]
    fn test_groups_and_negation() {
        let predicate = PredicateBuilder::new()
            .property("HostRoles/cluster_name")
            .equals("c1")
            .and()
            .not()
            .begin()
            .property("HostRoles/state")
            .equals("STARTED")
            .or()
            .property("HostRoles/state")
            .equals("INSTALLED")
            .end()
            .to_predicate();

        assert!(predicate.evaluate(&host_component("INSTALL_FAILED")));
        assert!(!predicate.evaluate(&host_component("STARTED")));
        assert!(!predicate.evaluate(&host_component("INSTALLED")));
    }

    #[test]
    fn test_unclosed_group_is_closed() {
        let open = PredicateBuilder::new()
            .property("x/a")
            .equals(1)
            .and()
            .begin()
            .property("x/b")
            .equals(2)
            .to_predicate();

        assert_eq!(
            open,
            Predicate::and([Predicate::equals(id("x/a"), 1), Predicate::equals(id("x/b"), 2)])
        );
    }

    #[test]
    fn test_relational_and_membership() {
        let predicate = PredicateBuilder::new()
            .property("Hosts/cpu_count")
            .greater_than_equal_to(4)
            .and()
            .property("Hosts/cpu_count")
            .less_than(16)
            .and()
            .property("Hosts/os_type")
            .in_values(["centos7", "ubuntu22"])
            .and()
            .property("Hosts/host_name")
            .not_equals("h9")
            .to_predicate();

        let mut host = Resource::new(ResourceType::Host);
        host.set_property(&id("Hosts/cpu_count"), 8);
        host.set_property(&id("Hosts/os_type"), "centos7");
        host.set_property(&id("Hosts/host_name"), "h1");
        assert!(predicate.evaluate(&host));

        host.set_property(&id("Hosts/cpu_count"), 16);
        assert!(!predicate.evaluate(&host));

        host.set_property(&id("Hosts/cpu_count"), json!("12"));
        host.set_property(&id("Hosts/host_name"), "h9");
        assert!(!predicate.evaluate(&host));
    }

    #[test]
    fn test_round_trip_against_matching_and_mismatching_resources() {
        let predicate = PredicateBuilder::new()
            .property("HostRoles/cluster_name")
            .equals("c1")
            .and()
            .property("HostRoles/host_name")
            .equals("h1")
            .and()
            .property("HostRoles/state")
            .equals("STARTED")
            .to_predicate();

        assert!(predicate.evaluate(&host_component("STARTED")));

        for (path, wrong) in [
            ("HostRoles/cluster_name", "c2"),
            ("HostRoles/host_name", "h2"),
            ("HostRoles/state", "INSTALLED"),
        ] {
            let mut resource = host_component("STARTED");
            resource.set_property(&id(path), wrong);
            assert!(!predicate.evaluate(&resource), "{} = {} should not match", path, wrong);
        }
    }
}
