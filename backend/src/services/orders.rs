//! Order header service: create, view, edit and delete manufacturing orders

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::error::{map_unique_violation, AppError, AppResult};
use crate::external::DocumentRenderer;
use crate::services::catalog::CatalogService;
use crate::services::documents;
use crate::services::stage_data;
use shared::{
    CreateOrderInput, DisplayStatus, FulfillmentStatus, GeneratedDocument, Order, OrderLabels,
    OrderSnapshot, Priority, StageData, StageInstance, StageKey, StageStatus, UpdateOrderInput,
};

/// Order service for managing order headers and their stage scaffolding
#[derive(Clone)]
pub struct OrderService {
    db: PgPool,
}

const ORDER_COLUMNS: &str = "id, order_number, customer_id, product_id, formula_id, location_id, \
    container_size_id, batch_size, priority, due_date, notes, fulfillment_status, display_status, \
    created_at, updated_at";

/// Database row for an order
#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    customer_id: Uuid,
    product_id: Option<Uuid>,
    formula_id: Uuid,
    location_id: Uuid,
    container_size_id: Option<Uuid>,
    batch_size: Decimal,
    priority: String,
    due_date: Option<NaiveDate>,
    notes: Option<String>,
    fulfillment_status: String,
    display_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            order_number: row.order_number,
            customer_id: row.customer_id,
            product_id: row.product_id,
            formula_id: row.formula_id,
            location_id: row.location_id,
            container_size_id: row.container_size_id,
            batch_size: row.batch_size,
            priority: Priority::from_str(&row.priority).unwrap_or_default(),
            due_date: row.due_date,
            notes: row.notes,
            fulfillment_status: FulfillmentStatus::from_str(&row.fulfillment_status)
                .unwrap_or_default(),
            display_status: DisplayStatus::from_str(&row.display_status).unwrap_or_default(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LabelsRow {
    customer_name: Option<String>,
    product_name: Option<String>,
    location_name: Option<String>,
    container_size: Option<String>,
}

/// Database row for a stage instance
#[derive(Debug, sqlx::FromRow)]
struct StageRow {
    id: Uuid,
    order_id: Uuid,
    stage_key: String,
    status: String,
    notes: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StageRow> for StageInstance {
    type Error = AppError;

    fn try_from(row: StageRow) -> Result<Self, Self::Error> {
        let stage_key = StageKey::from_str(&row.stage_key)
            .ok_or_else(|| AppError::Internal(format!("Unknown stage key {}", row.stage_key)))?;

        Ok(StageInstance {
            id: row.id,
            order_id: row.order_id,
            stage_key,
            status: StageStatus::from_str(&row.status).unwrap_or_default(),
            notes: row.notes,
            started_at: row.started_at,
            completed_at: row.completed_at,
            updated_at: row.updated_at,
        })
    }
}

/// Everything shown on the order page
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    pub order: Order,
    pub labels: OrderLabels,
    pub stages: Vec<StageInstance>,
    pub stage_data: StageData,
    pub documents: Vec<GeneratedDocument>,
}

/// Load an order row, optionally locking it for the rest of the transaction
pub(crate) async fn fetch_order(
    conn: &mut PgConnection,
    order_id: Uuid,
    lock: bool,
) -> AppResult<Order> {
    let sql = format!(
        "SELECT {} FROM orders WHERE id = $1{}",
        ORDER_COLUMNS,
        if lock { " FOR UPDATE" } else { "" }
    );

    sqlx::query_as::<_, OrderRow>(&sql)
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?
        .map(Order::from)
        .ok_or_else(|| AppError::NotFound("Order".to_string()))
}

/// Stage instances of an order in catalog order
pub(crate) async fn load_stages(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> AppResult<Vec<StageInstance>> {
    let rows = sqlx::query_as::<_, StageRow>(
        r#"
        SELECT id, order_id, stage_key, status, notes, started_at, completed_at, updated_at
        FROM stage_instances
        WHERE order_id = $1
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    let mut stages = rows
        .into_iter()
        .map(StageInstance::try_from)
        .collect::<AppResult<Vec<_>>>()?;
    stages.sort_by_key(|s| s.stage_key.index());
    Ok(stages)
}

/// Create the seven stage instances of an order if missing
async fn ensure_stages(conn: &mut PgConnection, order_id: Uuid) -> AppResult<()> {
    for stage in StageKey::ALL {
        sqlx::query(
            r#"
            INSERT INTO stage_instances (order_id, stage_key)
            VALUES ($1, $2)
            ON CONFLICT (order_id, stage_key) DO NOTHING
            "#,
        )
        .bind(order_id)
        .bind(stage.as_str())
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

impl OrderService {
    /// Create a new OrderService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create an order with its seven stages and seeded stage data
    pub async fn create_order(&self, input: CreateOrderInput) -> AppResult<OrderView> {
        input.validate()?;

        let location_id = input.location_id.ok_or_else(|| AppError::Validation {
            field: "location_id".to_string(),
            message: "Location is required".to_string(),
        })?;

        let catalog = CatalogService::new(self.db.clone());
        catalog
            .ensure_references(Some(input.customer_id), Some(input.formula_id), location_id)
            .await?;
        let formula = catalog.get_formula(input.formula_id).await?;

        let mut tx = self.db.begin().await?;

        let order_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO orders (order_number, customer_id, product_id, formula_id, location_id,
                                container_size_id, batch_size, priority, due_date, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING id
            "#,
        )
        .bind(input.order_number.trim())
        .bind(input.customer_id)
        .bind(input.product_id)
        .bind(input.formula_id)
        .bind(location_id)
        .bind(input.container_size_id)
        .bind(input.batch_size)
        .bind(input.priority.as_str())
        .bind(input.due_date)
        .bind(&input.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "order_number"))?;

        ensure_stages(&mut tx, order_id).await?;
        stage_data::seed_all(&mut tx, order_id, &formula).await?;

        tx.commit().await?;

        tracing::info!(
            order_id = %order_id,
            order_number = %input.order_number.trim(),
            components = formula.components.len(),
            "Order created"
        );

        self.get_order_view(order_id).await
    }

    /// Get an order header
    pub async fn get_order(&self, order_id: Uuid) -> AppResult<Order> {
        let mut conn = self.db.acquire().await?;
        fetch_order(&mut conn, order_id, false).await
    }

    /// Display names of the records an order references
    async fn load_labels(&self, order_id: Uuid) -> AppResult<OrderLabels> {
        let row = sqlx::query_as::<_, LabelsRow>(
            r#"
            SELECT c.name AS customer_name, p.name AS product_name,
                   l.name AS location_name, cs.label AS container_size
            FROM orders o
            LEFT JOIN customers c ON c.id = o.customer_id
            LEFT JOIN products p ON p.id = o.product_id
            LEFT JOIN locations l ON l.id = o.location_id
            LEFT JOIN container_sizes cs ON cs.id = o.container_size_id
            WHERE o.id = $1
            "#,
        )
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        Ok(OrderLabels {
            customer_name: row.customer_name,
            product_name: row.product_name,
            location_name: row.location_name,
            container_size: row.container_size,
        })
    }

    /// Seed anything an older order is missing. Idempotent.
    pub async fn ensure_seeded(&self, order: &Order) -> AppResult<()> {
        let formula = CatalogService::new(self.db.clone())
            .get_formula(order.formula_id)
            .await?;

        let mut tx = self.db.begin().await?;
        ensure_stages(&mut tx, order.id).await?;
        stage_data::seed_all(&mut tx, order.id, &formula).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Order page: header, stages, stage data and document history
    pub async fn get_order_view(&self, order_id: Uuid) -> AppResult<OrderView> {
        let order = self.get_order(order_id).await?;
        self.ensure_seeded(&order).await?;

        let labels = self.load_labels(order_id).await?;
        let mut conn = self.db.acquire().await?;
        let stages = load_stages(&mut conn, order_id).await?;
        let stage_data = stage_data::load_all(&mut conn, order_id).await?;
        drop(conn);

        let documents = documents::list_for_order(&self.db, order_id).await?;

        Ok(OrderView {
            order,
            labels,
            stages,
            stage_data,
            documents,
        })
    }

    /// Everything the document synthesizer needs for one order
    pub async fn load_snapshot(&self, order_id: Uuid) -> AppResult<OrderSnapshot> {
        let order = self.get_order(order_id).await?;
        let labels = self.load_labels(order_id).await?;
        let formula = CatalogService::new(self.db.clone())
            .get_formula(order.formula_id)
            .await?;

        let mut conn = self.db.acquire().await?;
        let stages = load_stages(&mut conn, order_id).await?;
        let data = stage_data::load_all(&mut conn, order_id).await?;

        Ok(OrderSnapshot {
            order,
            labels,
            formula,
            stages,
            data,
        })
    }

    /// Edit the order header. Stages and the derived status are untouched.
    pub async fn update_order(&self, order_id: Uuid, input: UpdateOrderInput) -> AppResult<Order> {
        input.validate()?;

        let location_id = input.location_id.ok_or_else(|| AppError::Validation {
            field: "location_id".to_string(),
            message: "Location is required".to_string(),
        })?;

        CatalogService::new(self.db.clone())
            .ensure_references(None, None, location_id)
            .await?;

        let sql = format!(
            r#"
            UPDATE orders
            SET location_id = $2, product_id = $3, batch_size = $4, priority = $5,
                due_date = $6, notes = $7, display_status = $8, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ORDER_COLUMNS
        );

        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(order_id)
            .bind(location_id)
            .bind(input.product_id)
            .bind(input.batch_size)
            .bind(input.priority.as_str())
            .bind(input.due_date)
            .bind(&input.notes)
            .bind(input.display_status.as_str())
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;

        tracing::info!(order_id = %order_id, "Order header updated");

        Ok(Order::from(row))
    }

    /// Delete an order: stored documents first, then the cascading row delete
    pub async fn delete_order(
        &self,
        order_id: Uuid,
        renderer: Arc<dyn DocumentRenderer>,
    ) -> AppResult<()> {
        self.get_order(order_id).await?;

        let paths = sqlx::query_scalar::<_, String>(
            r#"
            SELECT d.file_path
            FROM generated_documents d
            JOIN stage_instances s ON s.id = d.stage_instance_id
            WHERE s.order_id = $1
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;

        for path in &paths {
            renderer.remove_file(path).await?;
        }

        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(order_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Order".to_string()));
        }

        tracing::info!(
            order_id = %order_id,
            files = paths.len(),
            "Order deleted"
        );

        Ok(())
    }
}
