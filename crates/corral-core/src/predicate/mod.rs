// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Boolean predicates over resource properties.
//!
//! [`Predicate::and`] and [`Predicate::or`] produce a canonical form: nested
//! operands of the same kind are flattened, operands are sorted and
//! de-duplicated, and a single operand stands for itself. Two predicates with
//! the same meaning up to operand order therefore compare equal.
//!
//! Providers may push a predicate down to their backing store through a
//! [`PredicateVisitor`]; the controller post-filters with
//! [`Predicate::evaluate`] either way.

mod builder;

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use serde_json::{Number, Value};

pub use self::builder::{ExpressionBuilder, PredicateBuilder, PropertyBuilder};

use crate::resource::{PropertyId, Resource};

/// Comparison applied by a leaf predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComparisonOperator {
    /// `=`
    Equals,
    /// `<`
    Less,
    /// `<=`
    LessOrEquals,
    /// `>`
    Greater,
    /// `>=`
    GreaterOrEquals,
}

impl ComparisonOperator {
    /// Operator symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::Less => "<",
            Self::LessOrEquals => "<=",
            Self::Greater => ">",
            Self::GreaterOrEquals => ">=",
        }
    }

    fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Self::Equals => ordering == Ordering::Equal,
            Self::Less => ordering == Ordering::Less,
            Self::LessOrEquals => ordering != Ordering::Greater,
            Self::Greater => ordering == Ordering::Greater,
            Self::GreaterOrEquals => ordering != Ordering::Less,
        }
    }
}

/// Boolean expression over `(property, operator, literal)` leaves.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `property <op> value`
    Comparison {
        /// Compared property.
        property_id: PropertyId,
        /// Operator.
        operator: ComparisonOperator,
        /// Literal operand.
        value: Value,
    },
    /// `property IN (values)`
    In {
        /// Tested property.
        property_id: PropertyId,
        /// Accepted values, sorted and de-duplicated.
        values: Vec<Value>,
    },
    /// Every operand holds. Empty is always true.
    And(Vec<Predicate>),
    /// Some operand holds. Empty is always false.
    Or(Vec<Predicate>),
    /// The operand does not hold.
    Not(Box<Predicate>),
}

impl Predicate {
    /// `property = value`
    pub fn equals(property_id: PropertyId, value: impl Into<Value>) -> Self {
        Self::compare(property_id, ComparisonOperator::Equals, value)
    }

    /// `property <op> value`
    pub fn compare(property_id: PropertyId, operator: ComparisonOperator, value: impl Into<Value>) -> Self {
        Self::Comparison {
            property_id,
            operator,
            value: value.into(),
        }
    }

    /// `property IN (values)`
    pub fn in_values(property_id: PropertyId, values: impl IntoIterator<Item = Value>) -> Self {
        let mut values: Vec<Value> = values.into_iter().collect();
        values.sort_by_cached_key(Value::to_string);
        values.dedup();
        Self::In { property_id, values }
    }

    /// Canonical conjunction of `operands`.
    pub fn and(operands: impl IntoIterator<Item = Predicate>) -> Self {
        Self::combine(operands, true)
    }

    /// Canonical disjunction of `operands`.
    pub fn or(operands: impl IntoIterator<Item = Predicate>) -> Self {
        Self::combine(operands, false)
    }

    /// Negation of `operand`. Double negation cancels.
    pub fn not(operand: Predicate) -> Self {
        match operand {
            Self::Not(inner) => *inner,
            other => Self::Not(Box::new(other)),
        }
    }

    fn combine(operands: impl IntoIterator<Item = Predicate>, conjunction: bool) -> Self {
        let mut flat = Vec::new();
        for operand in operands {
            match operand {
                Self::And(inner) if conjunction => flat.extend(inner),
                Self::Or(inner) if !conjunction => flat.extend(inner),
                other => flat.push(other),
            }
        }
        flat.sort_by_cached_key(Predicate::to_string);
        flat.dedup();

        if flat.len() == 1 {
            if let Some(single) = flat.pop() {
                return single;
            }
        }
        if conjunction {
            Self::And(flat)
        } else {
            Self::Or(flat)
        }
    }

    /// Evaluate against a resource. A missing property fails every leaf.
    pub fn evaluate(&self, resource: &Resource) -> bool {
        match self {
            Self::Comparison {
                property_id,
                operator,
                value,
            } => resource
                .property_value(property_id)
                .and_then(|actual| compare_values(actual, value))
                .is_some_and(|ordering| operator.accepts(ordering)),
            Self::In {
                property_id,
                values,
            } => resource.property_value(property_id).is_some_and(|actual| {
                values
                    .iter()
                    .any(|v| compare_values(actual, v) == Some(Ordering::Equal))
            }),
            Self::And(operands) => operands.iter().all(|p| p.evaluate(resource)),
            Self::Or(operands) => operands.iter().any(|p| p.evaluate(resource)),
            Self::Not(operand) => !operand.evaluate(resource),
        }
    }

    /// Whether the resource could still match once missing properties are
    /// added. Leaves on absent properties are unknown rather than false.
    ///
    /// Providers filter with this so that properties supplied later by
    /// property providers are left to the controller's post-filter.
    pub fn may_match(&self, resource: &Resource) -> bool {
        self.evaluate_partial(resource).unwrap_or(true)
    }

    fn evaluate_partial(&self, resource: &Resource) -> Option<bool> {
        match self {
            Self::Comparison { property_id, .. } | Self::In { property_id, .. } => {
                resource
                    .has_property(property_id)
                    .then(|| self.evaluate(resource))
            }
            Self::And(operands) => {
                let mut known = true;
                for operand in operands {
                    match operand.evaluate_partial(resource) {
                        Some(false) => return Some(false),
                        Some(true) => {}
                        None => known = false,
                    }
                }
                known.then_some(true)
            }
            Self::Or(operands) => {
                let mut known = true;
                for operand in operands {
                    match operand.evaluate_partial(resource) {
                        Some(true) => return Some(true),
                        Some(false) => {}
                        None => known = false,
                    }
                }
                known.then_some(false)
            }
            Self::Not(operand) => operand.evaluate_partial(resource).map(|b| !b),
        }
    }

    /// Every property referenced by the predicate.
    pub fn property_ids(&self) -> BTreeSet<PropertyId> {
        let mut ids = BTreeSet::new();
        self.collect_property_ids(&mut ids);
        ids
    }

    fn collect_property_ids(&self, ids: &mut BTreeSet<PropertyId>) {
        match self {
            Self::Comparison { property_id, .. } | Self::In { property_id, .. } => {
                ids.insert(property_id.clone());
            }
            Self::And(operands) | Self::Or(operands) => {
                for operand in operands {
                    operand.collect_property_ids(ids);
                }
            }
            Self::Not(operand) => operand.collect_property_ids(ids),
        }
    }

    /// Equality leaves that every match must satisfy: the predicate itself
    /// when it is an equality, or the equalities of a top-level conjunction.
    pub fn pinned_values(&self) -> Vec<(&PropertyId, &Value)> {
        let leaves: &[Predicate] = match self {
            Self::And(operands) => operands,
            other => std::slice::from_ref(other),
        };
        leaves
            .iter()
            .filter_map(|p| match p {
                Self::Comparison {
                    property_id,
                    operator: ComparisonOperator::Equals,
                    value,
                } => Some((property_id, value)),
                _ => None,
            })
            .collect()
    }

    /// Walk the predicate with `visitor`.
    pub fn accept<V: PredicateVisitor + ?Sized>(&self, visitor: &mut V) {
        match self {
            Self::Comparison {
                property_id,
                operator,
                value,
            } => visitor.visit_comparison(property_id, *operator, value),
            Self::In {
                property_id,
                values,
            } => visitor.visit_in(property_id, values),
            Self::And(operands) => visitor.visit_and(operands),
            Self::Or(operands) => visitor.visit_or(operands),
            Self::Not(operand) => visitor.visit_not(operand),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Comparison {
                property_id,
                operator,
                value,
            } => write!(f, "{}{}{}", property_id, operator.symbol(), value),
            Self::In {
                property_id,
                values,
            } => {
                write!(f, "{} IN (", property_id)?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", value)?;
                }
                f.write_str(")")
            }
            Self::And(operands) => write_joined(f, operands, " AND ", "TRUE"),
            Self::Or(operands) => write_joined(f, operands, " OR ", "FALSE"),
            Self::Not(operand) => write!(f, "NOT {}", operand),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, operands: &[Predicate], separator: &str, empty: &str) -> fmt::Result {
    if operands.is_empty() {
        return f.write_str(empty);
    }
    f.write_str("(")?;
    for (i, operand) in operands.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{}", operand)?;
    }
    f.write_str(")")
}

/// Walks a predicate, typically to translate it into a backend filter.
///
/// Conjunctions are descended by default; disjunctions, negations and set
/// membership are skipped unless overridden, which leaves them to the
/// controller's post-filter.
pub trait PredicateVisitor {
    /// A comparison leaf.
    fn visit_comparison(&mut self, property_id: &PropertyId, operator: ComparisonOperator, value: &Value);

    /// A set membership leaf.
    fn visit_in(&mut self, _property_id: &PropertyId, _values: &[Value]) {}

    /// A conjunction.
    fn visit_and(&mut self, operands: &[Predicate]) {
        for operand in operands {
            operand.accept(self);
        }
    }

    /// A disjunction.
    fn visit_or(&mut self, _operands: &[Predicate]) {}

    /// A negation.
    fn visit_not(&mut self, _operand: &Predicate) {}
}

/// Order two property values, if they are comparable.
///
/// Numbers compare numerically, also against strings that parse as numbers.
/// Integers compare exactly across the whole `i64` and `u64` range.
/// Strings compare lexicographically. Booleans compare with booleans, or with
/// strings by their textual form. Two nulls are equal.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        (Value::Number(l), Value::Number(r)) => compare_numbers(l, r),
        (Value::Number(l), Value::String(r)) => compare_numbers(l, &r.trim().parse().ok()?),
        (Value::String(l), Value::Number(r)) => compare_numbers(&l.trim().parse().ok()?, r),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
        (Value::Bool(l), Value::String(r)) => Some(bool_str(*l).cmp(r.as_str())),
        (Value::String(l), Value::Bool(r)) => Some(l.as_str().cmp(bool_str(*r))),
        _ => None,
    }
}

// Integers compare exactly; only floats go through f64.
fn compare_numbers(left: &Number, right: &Number) -> Option<Ordering> {
    match (left.as_i64(), right.as_i64(), left.as_u64(), right.as_u64()) {
        (Some(l), Some(r), _, _) => Some(l.cmp(&r)),
        (_, _, Some(l), Some(r)) => Some(l.cmp(&r)),
        // an i64 against a u64 beyond i64::MAX
        (Some(_), None, _, Some(_)) => Some(Ordering::Less),
        (None, Some(_), Some(_), _) => Some(Ordering::Greater),
        _ => left.as_f64()?.partial_cmp(&right.as_f64()?),
    }
}

fn bool_str(b: bool) -> &'static str {
    if b { "true" } else { "false" }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::resource::ResourceType;

    fn id(path: &str) -> PropertyId {
        PropertyId::parse(path)
    }

    fn host(name: &str, cpus: i64) -> Resource {
        let mut resource = Resource::new(ResourceType::Host);
        resource.set_property(&id("Hosts/host_name"), name);
        resource.set_property(&id("Hosts/cpu_count"), cpus);
        resource
    }

    #[test]
    fn test_and_is_order_independent() {
        let a = Predicate::equals(id("a/x"), "1");
        let b = Predicate::equals(id("a/y"), "2");
        let c = Predicate::equals(id("a/z"), "3");

        let left = Predicate::and([a.clone(), Predicate::and([b.clone(), c.clone()])]);
        let right = Predicate::and([c, b, a.clone(), a]);

        assert_eq!(left, right);
        assert!(matches!(left, Predicate::And(ref ops) if ops.len() == 3));
    }

    #[test]
    fn test_single_operand_collapses() {
        let a = Predicate::equals(id("a/x"), "1");
        assert_eq!(Predicate::or([a.clone()]), a);
        assert_eq!(Predicate::not(Predicate::not(a.clone())), a);
    }

    #[test]
    fn test_evaluate_comparisons() {
        let h = host("h1", 8);

        assert!(Predicate::equals(id("Hosts/host_name"), "h1").evaluate(&h));
        assert!(Predicate::compare(id("Hosts/cpu_count"), ComparisonOperator::Greater, 4).evaluate(&h));
        assert!(Predicate::compare(id("Hosts/cpu_count"), ComparisonOperator::LessOrEquals, "8").evaluate(&h));
        assert!(!Predicate::compare(id("Hosts/cpu_count"), ComparisonOperator::Less, 8).evaluate(&h));
        assert!(Predicate::in_values(id("Hosts/host_name"), [json!("h2"), json!("h1")]).evaluate(&h));
    }

    #[test]
    fn test_missing_property_fails_leaf() {
        let h = host("h1", 8);
        let missing = Predicate::equals(id("Hosts/ip"), "10.0.0.1");

        assert!(!missing.evaluate(&h));
        assert!(Predicate::not(missing).evaluate(&h));
    }

    #[test]
    fn test_may_match_treats_missing_as_unknown() {
        let h = host("h1", 8);
        let on_h1 = Predicate::equals(id("Hosts/host_name"), "h1");
        let on_h2 = Predicate::equals(id("Hosts/host_name"), "h2");
        let missing = Predicate::equals(id("Hosts/ip"), "10.0.0.1");

        assert!(Predicate::and([on_h1.clone(), missing.clone()]).may_match(&h));
        assert!(!Predicate::and([on_h2.clone(), missing.clone()]).may_match(&h));
        assert!(Predicate::or([on_h2.clone(), missing.clone()]).may_match(&h));
        assert!(Predicate::not(missing).may_match(&h));
        assert!(!Predicate::not(on_h1).may_match(&h));
    }

    #[test]
    fn test_empty_connectives() {
        let h = host("h1", 8);
        assert!(Predicate::And(Vec::new()).evaluate(&h));
        assert!(!Predicate::Or(Vec::new()).evaluate(&h));
    }

    #[test]
    fn test_compare_values_rules() {
        assert_eq!(compare_values(&json!(2), &json!(10)), Some(Ordering::Less));
        assert_eq!(compare_values(&json!("2"), &json!(10)), Some(Ordering::Less));
        assert_eq!(compare_values(&json!("2"), &json!("10")), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!(true), &json!("true")), Some(Ordering::Equal));
        assert_eq!(compare_values(&json!("abc"), &json!(1)), None);
        assert_eq!(compare_values(&json!(null), &json!(null)), Some(Ordering::Equal));
        assert_eq!(compare_values(&json!([1]), &json!([1])), None);
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        let big = 9_007_199_254_740_993_i64;
        assert_eq!(compare_values(&json!(big), &json!(big - 1)), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!(big.to_string()), &json!(big - 1)), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!(big), &json!(big.to_string())), Some(Ordering::Equal));
        assert_eq!(compare_values(&json!(u64::MAX), &json!(u64::MAX - 1)), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!(-1), &json!(u64::MAX)), Some(Ordering::Less));
        assert_eq!(compare_values(&json!(u64::MAX), &json!(i64::MAX)), Some(Ordering::Greater));
        assert_eq!(compare_values(&json!(1.5), &json!(2)), Some(Ordering::Less));
        assert_eq!(compare_values(&json!("2.5"), &json!(2)), Some(Ordering::Greater));

        let mut resource = Resource::new(ResourceType::Request);
        resource.set_property(&id("Requests/id"), big);
        assert!(!Predicate::equals(id("Requests/id"), big - 1).evaluate(&resource));
        assert!(Predicate::equals(id("Requests/id"), big).evaluate(&resource));
    }

    #[test]
    fn test_property_ids_and_pinned_values() {
        let p = Predicate::and([
            Predicate::equals(id("HostRoles/cluster_name"), "c1"),
            Predicate::equals(id("HostRoles/host_name"), "h1"),
            Predicate::or([
                Predicate::equals(id("HostRoles/state"), "STARTED"),
                Predicate::equals(id("HostRoles/state"), "INSTALLED"),
            ]),
        ]);

        assert_eq!(p.property_ids().len(), 3);
        let pinned: Vec<_> = p.pinned_values().into_iter().map(|(id, _)| id.path()).collect();
        assert_eq!(pinned, vec!["HostRoles/cluster_name", "HostRoles/host_name"]);
    }

    #[test]
    fn test_display() {
        let p = Predicate::and([
            Predicate::equals(id("Clusters/cluster_name"), "c1"),
            Predicate::not(Predicate::in_values(id("Clusters/version"), [json!("1"), json!("2")])),
        ]);
        assert_eq!(
            p.to_string(),
            "(Clusters/cluster_name=\"c1\" AND NOT Clusters/version IN (\"1\",\"2\"))"
        );
    }

    #[test]
    fn test_visitor_descends_conjunctions_only() {
        struct Collect(Vec<String>);
        impl PredicateVisitor for Collect {
            fn visit_comparison(&mut self, property_id: &PropertyId, _: ComparisonOperator, _: &Value) {
                self.0.push(property_id.path());
            }
        }

        let p = Predicate::and([
            Predicate::equals(id("a/x"), "1"),
            Predicate::or([Predicate::equals(id("a/y"), "2"), Predicate::equals(id("a/z"), "3")]),
        ]);
        let mut visitor = Collect(Vec::new());
        p.accept(&mut visitor);

        assert_eq!(visitor.0, vec!["a/x"]);
    }
}
