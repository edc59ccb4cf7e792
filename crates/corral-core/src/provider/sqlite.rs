// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed resource provider.
//!
//! All types share one `resources` table. A row holds the resource's
//! properties as a flat JSON object keyed by property path, identified by
//! `(resource_type, resource_key)` where the key is built from the values of
//! the schema's identity properties.
//!
//! Equality on identity properties is pushed into SQL with `json_extract`.
//! Everything else is left to the controller's post-filter, so reads may
//! return a superset of the matches.

use chrono::Utc;
use serde_json::{Map, Value};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use tracing::{debug, info, instrument};

use super::{ResourceProvider, project};
use crate::error::{CoreError, Result};
use crate::predicate::{ComparisonOperator, Predicate, PredicateVisitor};
use crate::request::{Request, RequestStatus};
use crate::resource::{PropertyId, Resource, ResourceType};
use crate::schema::Schema;

#[derive(Debug, sqlx::FromRow)]
struct ResourceRow {
    resource_key: String,
    properties: String,
}

/// Resource provider storing one type in the shared `resources` table.
#[derive(Debug, Clone)]
pub struct SqliteResourceProvider {
    pool: SqlitePool,
    resource_type: ResourceType,
    identity: Vec<PropertyId>,
}

impl SqliteResourceProvider {
    /// Create a provider for the type `schema` describes.
    pub fn new(pool: SqlitePool, schema: &Schema) -> Self {
        Self {
            pool,
            resource_type: schema.resource_type(),
            identity: schema.identity_property_ids(),
        }
    }

    /// Storage key and display form of a resource's identity.
    fn resource_key(&self, resource: &Resource) -> Result<(String, String)> {
        let mut parts = Vec::with_capacity(self.identity.len());
        for id in &self.identity {
            let value = resource.property_string(id).ok_or_else(|| {
                CoreError::invalid_request(format!(
                    "{} resources require key property {}",
                    self.resource_type, id
                ))
            })?;
            parts.push(value);
        }
        Ok((serde_json::to_string(&parts)?, parts.join("/")))
    }

    async fn select(&self, conn: &mut SqliteConnection, predicate: Option<&Predicate>) -> Result<Vec<(String, Resource)>> {
        let mut pushdown = IdentityPushdown {
            identity: &self.identity,
            conditions: Vec::new(),
        };
        if let Some(predicate) = predicate {
            predicate.accept(&mut pushdown);
        }

        let mut query =
            QueryBuilder::<Sqlite>::new("SELECT resource_key, properties FROM resources WHERE resource_type = ");
        query.push_bind(self.resource_type.as_str());
        for (path, value) in &pushdown.conditions {
            query.push(" AND json_extract(properties, ");
            query.push_bind(format!("$.\"{}\"", path));
            query.push(") = ");
            query.push_bind(value.clone());
        }
        query.push(" ORDER BY resource_key");

        debug!(pushed_down = pushdown.conditions.len(), "selecting resources");

        let rows: Vec<ResourceRow> = query.build_query_as().fetch_all(&mut *conn).await?;

        rows.into_iter()
            .map(|row| Ok((row.resource_key, from_json(self.resource_type, &row.properties)?)))
            .collect()
    }
}

#[async_trait::async_trait]
impl ResourceProvider for SqliteResourceProvider {
    fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    #[instrument(skip(self, request, predicate), fields(resource_type = %self.resource_type))]
    async fn get_resources(&self, request: &Request, predicate: Option<&Predicate>) -> Result<Vec<Resource>> {
        let mut conn = self.pool.acquire().await?;
        let rows = self.select(&mut conn, predicate).await?;

        debug!(rows = rows.len(), "loaded resources");

        Ok(rows
            .into_iter()
            .map(|(_, mut resource)| {
                project(&mut resource, request, &self.identity);
                resource
            })
            .collect())
    }

    #[instrument(skip(self, request), fields(resource_type = %self.resource_type))]
    async fn create_resources(&self, request: &Request) -> Result<RequestStatus> {
        if request.properties().is_empty() {
            return Err(CoreError::invalid_request("create requires at least one property map"));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::with_capacity(request.properties().len());

        for properties in request.properties() {
            let mut resource = Resource::new(self.resource_type);
            for (id, value) in properties {
                resource.set_property(id, value.clone());
            }
            let (key, display) = self.resource_key(&resource)?;

            let result = sqlx::query(
                r#"
                INSERT INTO resources (resource_type, resource_key, properties, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (resource_type, resource_key) DO NOTHING
                "#,
            )
            .bind(self.resource_type.as_str())
            .bind(&key)
            .bind(to_json(&resource)?)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() == 0 {
                return Err(CoreError::ResourceAlreadyExists {
                    resource_type: self.resource_type,
                    key: display,
                });
            }
            created.push(resource);
        }

        tx.commit().await?;
        info!(count = created.len(), "created resources");

        Ok(RequestStatus::complete(created))
    }

    #[instrument(skip(self, request, predicate), fields(resource_type = %self.resource_type))]
    async fn update_resources(&self, request: &Request, predicate: Option<&Predicate>) -> Result<RequestStatus> {
        let updates = request.merged_properties();
        if updates.is_empty() {
            return Err(CoreError::invalid_request("update requires at least one property"));
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let rows = self.select(&mut tx, predicate).await?;
        let mut updated = Vec::new();

        for (key, mut resource) in rows {
            if predicate.is_some_and(|p| !p.evaluate(&resource)) {
                continue;
            }
            for (id, value) in &updates {
                if self.identity.contains(id) && resource.property_value(id) != Some(value) {
                    return Err(CoreError::invalid_request(format!(
                        "key property {} of {} resources cannot be changed",
                        id, self.resource_type
                    )));
                }
                resource.set_property(id, value.clone());
            }

            sqlx::query(
                r#"
                UPDATE resources
                SET properties = ?, updated_at = ?
                WHERE resource_type = ? AND resource_key = ?
                "#,
            )
            .bind(to_json(&resource)?)
            .bind(now)
            .bind(self.resource_type.as_str())
            .bind(&key)
            .execute(&mut *tx)
            .await?;

            updated.push(resource);
        }

        tx.commit().await?;
        info!(count = updated.len(), "updated resources");

        Ok(RequestStatus::complete(updated))
    }

    #[instrument(skip(self, predicate), fields(resource_type = %self.resource_type))]
    async fn delete_resources(&self, predicate: Option<&Predicate>) -> Result<RequestStatus> {
        let mut tx = self.pool.begin().await?;
        let rows = self.select(&mut tx, predicate).await?;
        let mut deleted = Vec::new();

        for (key, resource) in rows {
            if predicate.is_some_and(|p| !p.evaluate(&resource)) {
                continue;
            }
            sqlx::query("DELETE FROM resources WHERE resource_type = ? AND resource_key = ?")
                .bind(self.resource_type.as_str())
                .bind(&key)
                .execute(&mut *tx)
                .await?;
            deleted.push(resource);
        }

        tx.commit().await?;
        info!(count = deleted.len(), "deleted resources");

        Ok(RequestStatus::complete(deleted))
    }
}

/// Collects string equalities on identity properties from a top-level
/// conjunction.
struct IdentityPushdown<'a> {
    identity: &'a [PropertyId],
    conditions: Vec<(String, String)>,
}

impl PredicateVisitor for IdentityPushdown<'_> {
    fn visit_comparison(&mut self, property_id: &PropertyId, operator: ComparisonOperator, value: &Value) {
        if operator != ComparisonOperator::Equals || !self.identity.contains(property_id) {
            return;
        }
        // Numeric-looking and boolean-looking strings also match numbers and
        // booleans when evaluated, which SQL equality would not.
        let Value::String(literal) = value else {
            return;
        };
        if literal.trim().parse::<f64>().is_ok() || literal == "true" || literal == "false" {
            return;
        }
        let path = property_id.path();
        if path.contains('"') || path.contains('\\') {
            return;
        }
        self.conditions.push((path, literal.clone()));
    }
}

fn to_json(resource: &Resource) -> Result<String> {
    let map: Map<String, Value> = resource
        .properties()
        .map(|(id, value)| (id.path(), value.clone()))
        .collect();
    Ok(serde_json::to_string(&map)?)
}

fn from_json(resource_type: ResourceType, properties: &str) -> Result<Resource> {
    let map: Map<String, Value> = serde_json::from_str(properties)?;
    let mut resource = Resource::new(resource_type);
    for (path, value) in map {
        resource.set_property(&PropertyId::parse(&path), value);
    }
    Ok(resource)
}
