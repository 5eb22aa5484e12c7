//! Inventory repository: read queries over `inventario_cache`.
//!
//! Rows are returned as JSON objects (`to_jsonb(row)`) because the table is wide and
//! owned by another service; the API enriches and forwards them without a fixed schema.

use serde_json::{Map, Value};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use trefa_core::models::{VehicleFilters, LISTED_STATUS};
use trefa_core::AppError;

pub type VehicleRow = Map<String, Value>;

/// Trait for inventory read operations
/// This abstracts the database implementation (PostgreSQL)
#[async_trait::async_trait]
pub trait InventoryRepository: Send + Sync {
    /// Every publicly listed vehicle.
    async fn list_listed(&self) -> Result<Vec<VehicleRow>, AppError>;

    /// One page of listed vehicles matching `filters`, plus the total match count.
    async fn list_filtered(
        &self,
        filters: &VehicleFilters,
    ) -> Result<(Vec<VehicleRow>, i64), AppError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<VehicleRow>, AppError>;

    /// Connectivity check used by readiness.
    async fn ping(&self) -> Result<(), AppError>;
}

#[derive(Clone)]
pub struct PgInventoryRepository {
    pool: PgPool,
}

impl PgInventoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_ROWS: &str = "SELECT to_jsonb(i) AS row FROM inventario_cache i";
const SELECT_COUNT: &str = "SELECT COUNT(*) FROM inventario_cache i";

/// Append the WHERE clause shared by the page and count queries.
pub fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &VehicleFilters) {
    qb.push(" WHERE i.ordenstatus ILIKE ");
    qb.push_bind(LISTED_STATUS.to_string());

    if filters.hide_separado {
        qb.push(" AND (i.separado IS NULL OR i.separado = false)");
    }

    let text_in = [
        ("marca", &filters.marca),
        ("transmision", &filters.transmision),
        ("combustible", &filters.combustible),
        ("garantia", &filters.garantia),
        ("carroceria", &filters.carroceria),
        ("ubicacion", &filters.ubicacion),
    ];
    for (column, values) in text_in {
        if !values.is_empty() {
            qb.push(format!(" AND i.{} = ANY(", column));
            qb.push_bind(values.clone());
            qb.push(")");
        }
    }

    if !filters.autoano.is_empty() {
        qb.push(" AND i.autoano = ANY(");
        qb.push_bind(filters.autoano.clone());
        qb.push(")");
    }

    if !filters.promociones.is_empty() {
        // jsonb array overlap with any of the requested promotions
        qb.push(" AND i.promociones ?| ");
        qb.push_bind(filters.promociones.clone());
    }

    let ranges = [
        ("precio", ">=", filters.min_price),
        ("precio", "<=", filters.max_price),
        ("enganchemin", ">=", filters.min_enganche),
        ("enganchemin", "<=", filters.max_enganche),
    ];
    for (column, op, bound) in ranges {
        if let Some(bound) = bound {
            qb.push(format!(" AND i.{} {} ", column, op));
            qb.push_bind(bound);
        }
    }

    if let Some(ref term) = filters.search {
        qb.push(" AND i.id IN (SELECT id FROM search_vehicles(");
        qb.push_bind(term.clone());
        qb.push("))");
    }
}

/// Page query: filters, ordering and LIMIT/OFFSET.
pub fn build_page_query(filters: &VehicleFilters) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(SELECT_ROWS);
    push_filters(&mut qb, filters);

    match filters.order_by {
        Some(order) => {
            qb.push(format!(
                " ORDER BY i.{} {} NULLS LAST",
                order.field.column(),
                if order.ascending { "ASC" } else { "DESC" }
            ));
        }
        // search_vehicles already ranks by relevance
        None if filters.search.is_none() => {
            qb.push(" ORDER BY i.updated_at DESC");
        }
        None => {}
    }

    qb.push(" LIMIT ");
    qb.push_bind(i64::from(filters.page_size));
    qb.push(" OFFSET ");
    qb.push_bind(filters.offset());
    qb
}

pub fn build_count_query(filters: &VehicleFilters) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(SELECT_COUNT);
    push_filters(&mut qb, filters);
    qb
}

fn row_to_object(row: &sqlx::postgres::PgRow) -> Result<VehicleRow, AppError> {
    let value: Value = row.try_get("row")?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(AppError::Internal(format!(
            "inventario_cache row is not an object: {}",
            other
        ))),
    }
}

#[async_trait::async_trait]
impl InventoryRepository for PgInventoryRepository {
    #[tracing::instrument(skip(self), fields(db.table = "inventario_cache", db.operation = "select"))]
    async fn list_listed(&self) -> Result<Vec<VehicleRow>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(SELECT_ROWS);
        qb.push(" WHERE i.ordenstatus ILIKE ");
        qb.push_bind(LISTED_STATUS.to_string());
        qb.push(" ORDER BY i.updated_at DESC");

        let rows = qb.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_object).collect()
    }

    #[tracing::instrument(skip(self, filters), fields(
        db.table = "inventario_cache",
        db.operation = "select",
        page = filters.page,
        page_size = filters.page_size
    ))]
    async fn list_filtered(
        &self,
        filters: &VehicleFilters,
    ) -> Result<(Vec<VehicleRow>, i64), AppError> {
        let rows = build_page_query(filters)
            .build()
            .fetch_all(&self.pool)
            .await?;
        let vehicles = rows
            .iter()
            .map(row_to_object)
            .collect::<Result<Vec<_>, _>>()?;

        let total: i64 = build_count_query(filters)
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        Ok((vehicles, total))
    }

    #[tracing::instrument(skip(self), fields(db.table = "inventario_cache", db.operation = "select"))]
    async fn find_by_slug(&self, slug: &str) -> Result<Option<VehicleRow>, AppError> {
        let row = sqlx::query(
            "SELECT to_jsonb(i) AS row FROM inventario_cache i WHERE i.slug = $1 LIMIT 1",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_object).transpose()
    }

    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(pairs: &[(&str, &str)]) -> VehicleFilters {
        VehicleFilters::from_query_pairs(pairs)
    }

    #[test]
    fn default_page_query_orders_by_recency() {
        let qb = build_page_query(&filters(&[]));
        assert_eq!(
            qb.sql(),
            "SELECT to_jsonb(i) AS row FROM inventario_cache i WHERE i.ordenstatus ILIKE $1 \
             ORDER BY i.updated_at DESC LIMIT $2 OFFSET $3"
        );
    }

    #[test]
    fn filters_are_bound_in_order() {
        let qb = build_count_query(&filters(&[
            ("marca", "Nissan"),
            ("autoano", "2021"),
            ("ubicacion", "Saltillo"),
            ("promociones", "Bono"),
            ("minPrice", "100000"),
            ("maxEnganche", "50000"),
            ("hideSeparado", "true"),
        ]));
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM inventario_cache i WHERE i.ordenstatus ILIKE $1 \
             AND (i.separado IS NULL OR i.separado = false) \
             AND i.marca = ANY($2) AND i.ubicacion = ANY($3) AND i.autoano = ANY($4) \
             AND i.promociones ?| $5 AND i.precio >= $6 AND i.enganchemin <= $7"
        );
    }

    #[test]
    fn search_uses_ranked_ids_without_default_order() {
        let qb = build_page_query(&filters(&[("search", "versa"), ("page", "2")]));
        let sql = qb.sql();
        assert!(sql.contains("AND i.id IN (SELECT id FROM search_vehicles($2))"));
        assert!(!sql.contains("ORDER BY"));
        assert!(sql.ends_with("LIMIT $3 OFFSET $4"));
    }

    #[test]
    fn explicit_order_is_whitelisted() {
        let qb = build_page_query(&filters(&[("orderby", "mileage-asc")]));
        assert!(qb.sql().contains("ORDER BY i.kilometraje ASC NULLS LAST"));

        let qb = build_page_query(&filters(&[("orderby", "precio; DROP TABLE x-asc")]));
        assert!(qb.sql().contains("ORDER BY i.updated_at DESC"));
        assert!(!qb.sql().contains("DROP"));
    }
}
