//! Stage data stores
//!
//! Seed-if-absent, read and keyed upsert for the records each stage owns.
//! Every function takes a connection so callers can run it inside their own
//! transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use crate::error::AppResult;
use shared::{
    checklist_for, clean_measurements, ChecklistItem, ChecklistValueType, ChecklistValueUpdate,
    ComponentNoteUpdate, DeliveryInfo, DeliveryUpdate, Formula, Measurement, MeasurementInput,
    QualityDecision, QualityItem, ReceiptDecision, ReviewStatus, SourcingComponent, StageData,
    StageKey, StagePayload, QUALITY_CHECKLIST,
};

/// Database row for a sourcing component
#[derive(Debug, sqlx::FromRow)]
struct ComponentRow {
    id: Uuid,
    order_id: Uuid,
    template_index: i32,
    product_id: Option<Uuid>,
    name: String,
    required_quantity: Decimal,
    unit: String,
    notes: Option<String>,
    receipt_status: String,
    receipt_notes: Option<String>,
}

impl From<ComponentRow> for SourcingComponent {
    fn from(row: ComponentRow) -> Self {
        SourcingComponent {
            id: row.id,
            order_id: row.order_id,
            template_index: row.template_index,
            product_id: row.product_id,
            name: row.name,
            required_quantity: row.required_quantity,
            unit: row.unit,
            notes: row.notes,
            receipt_status: ReviewStatus::from_str(&row.receipt_status).unwrap_or_default(),
            receipt_notes: row.receipt_notes,
        }
    }
}

/// Database row for a quality checklist item
#[derive(Debug, sqlx::FromRow)]
struct QualityRow {
    id: Uuid,
    order_id: Uuid,
    item_key: String,
    section: String,
    item_text: String,
    status: String,
    notes: Option<String>,
    display_order: i32,
}

impl From<QualityRow> for QualityItem {
    fn from(row: QualityRow) -> Self {
        QualityItem {
            id: row.id,
            order_id: row.order_id,
            item_key: row.item_key,
            section: row.section,
            item_text: row.item_text,
            status: ReviewStatus::from_str(&row.status).unwrap_or_default(),
            notes: row.notes,
            display_order: row.display_order,
        }
    }
}

/// Database row for a packaging or dispatch checklist item
#[derive(Debug, sqlx::FromRow)]
struct ChecklistRow {
    id: Uuid,
    order_id: Uuid,
    item_key: String,
    section: String,
    item_text: String,
    value_type: String,
    value: Option<String>,
    notes: Option<String>,
    display_order: i32,
}

impl ChecklistRow {
    fn into_item(self, stage_key: StageKey) -> ChecklistItem {
        ChecklistItem {
            id: self.id,
            order_id: self.order_id,
            stage_key,
            item_key: self.item_key,
            section: self.section,
            item_text: self.item_text,
            value_type: ChecklistValueType::from_str(&self.value_type)
                .unwrap_or(ChecklistValueType::Text),
            value: self.value,
            notes: self.notes,
            display_order: self.display_order,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct MeasurementRow {
    id: Uuid,
    order_id: Uuid,
    field_name: String,
    field_value: String,
    position: i32,
}

impl From<MeasurementRow> for Measurement {
    fn from(row: MeasurementRow) -> Self {
        Measurement {
            id: row.id,
            order_id: row.order_id,
            field_name: row.field_name,
            field_value: row.field_value,
            position: row.position,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DeliveryRow {
    order_id: Uuid,
    recipient_name: Option<String>,
    recipient_phone: Option<String>,
    delivered_at: Option<DateTime<Utc>>,
    customer_notes: Option<String>,
    photo_path: Option<String>,
}

impl From<DeliveryRow> for DeliveryInfo {
    fn from(row: DeliveryRow) -> Self {
        DeliveryInfo {
            order_id: row.order_id,
            recipient_name: row.recipient_name,
            recipient_phone: row.recipient_phone,
            delivered_at: row.delivered_at,
            customer_notes: row.customer_notes,
            photo_path: row.photo_path,
        }
    }
}

// ============================================================================
// Seeding
// ============================================================================

/// Copy the formula's components onto the order.
///
/// Only runs while the order has no component rows, so later formula edits
/// never change an order that was already sourced.
pub async fn seed_sourcing(
    conn: &mut PgConnection,
    order_id: Uuid,
    formula: &Formula,
) -> AppResult<u64> {
    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM sourcing_components WHERE order_id = $1",
    )
    .bind(order_id)
    .fetch_one(&mut *conn)
    .await?;

    if existing > 0 {
        return Ok(0);
    }

    let mut inserted = 0;
    for (index, component) in formula.components.iter().enumerate() {
        let result = sqlx::query(
            r#"
            INSERT INTO sourcing_components
                (order_id, template_index, product_id, name, required_quantity, unit, notes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (order_id, template_index) DO NOTHING
            "#,
        )
        .bind(order_id)
        .bind(index as i32)
        .bind(component.product_id)
        .bind(&component.name)
        .bind(component.quantity)
        .bind(&component.unit)
        .bind(&component.notes)
        .execute(&mut *conn)
        .await?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}

/// Insert any quality, packaging and dispatch items the order is missing
pub async fn seed_checklists(conn: &mut PgConnection, order_id: Uuid) -> AppResult<u64> {
    let mut inserted = 0;

    for (position, item) in QUALITY_CHECKLIST.iter().enumerate() {
        let result = sqlx::query(
            r#"
            INSERT INTO quality_items (order_id, item_key, section, item_text, display_order)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (order_id, item_key) DO NOTHING
            "#,
        )
        .bind(order_id)
        .bind(item.key)
        .bind(item.section)
        .bind(item.text)
        .bind(position as i32)
        .execute(&mut *conn)
        .await?;
        inserted += result.rows_affected();
    }

    for stage in [StageKey::Packaging, StageKey::Dispatch] {
        let Some(definitions) = checklist_for(stage) else {
            continue;
        };

        for (position, item) in definitions.iter().enumerate() {
            let result = sqlx::query(
                r#"
                INSERT INTO checklist_items
                    (order_id, stage_key, item_key, section, item_text, value_type, display_order)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (order_id, stage_key, item_key) DO NOTHING
                "#,
            )
            .bind(order_id)
            .bind(stage.as_str())
            .bind(item.key)
            .bind(item.section)
            .bind(item.text)
            .bind(item.value_type.as_str())
            .bind(position as i32)
            .execute(&mut *conn)
            .await?;
            inserted += result.rows_affected();
        }
    }

    Ok(inserted)
}

/// Seed every stage store of an order; safe to call repeatedly
pub async fn seed_all(
    conn: &mut PgConnection,
    order_id: Uuid,
    formula: &Formula,
) -> AppResult<u64> {
    let components = seed_sourcing(conn, order_id, formula).await?;
    let checklists = seed_checklists(conn, order_id).await?;

    if components + checklists > 0 {
        tracing::debug!(
            order_id = %order_id,
            components,
            checklists,
            "Seeded stage data"
        );
    }

    Ok(components + checklists)
}

// ============================================================================
// Reads
// ============================================================================

pub async fn load_components(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> AppResult<Vec<SourcingComponent>> {
    let rows = sqlx::query_as::<_, ComponentRow>(
        r#"
        SELECT id, order_id, template_index, product_id, name, required_quantity, unit,
               notes, receipt_status, receipt_notes
        FROM sourcing_components
        WHERE order_id = $1
        ORDER BY template_index
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(SourcingComponent::from).collect())
}

pub async fn load_quality_items(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> AppResult<Vec<QualityItem>> {
    let rows = sqlx::query_as::<_, QualityRow>(
        r#"
        SELECT id, order_id, item_key, section, item_text, status, notes, display_order
        FROM quality_items
        WHERE order_id = $1
        ORDER BY display_order
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(QualityItem::from).collect())
}

pub async fn load_checklist(
    conn: &mut PgConnection,
    order_id: Uuid,
    stage: StageKey,
) -> AppResult<Vec<ChecklistItem>> {
    let rows = sqlx::query_as::<_, ChecklistRow>(
        r#"
        SELECT id, order_id, item_key, section, item_text, value_type, value, notes, display_order
        FROM checklist_items
        WHERE order_id = $1 AND stage_key = $2
        ORDER BY display_order
        "#,
    )
    .bind(order_id)
    .bind(stage.as_str())
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(|row| row.into_item(stage)).collect())
}

pub async fn load_measurements(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> AppResult<Vec<Measurement>> {
    let rows = sqlx::query_as::<_, MeasurementRow>(
        r#"
        SELECT id, order_id, field_name, field_value, position
        FROM preparation_measurements
        WHERE order_id = $1
        ORDER BY position
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().map(Measurement::from).collect())
}

pub async fn load_delivery(
    conn: &mut PgConnection,
    order_id: Uuid,
) -> AppResult<Option<DeliveryInfo>> {
    let row = sqlx::query_as::<_, DeliveryRow>(
        r#"
        SELECT order_id, recipient_name, recipient_phone, delivered_at, customer_notes, photo_path
        FROM delivery_info
        WHERE order_id = $1
        "#,
    )
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(row.map(DeliveryInfo::from))
}

/// Every stage record of an order
pub async fn load_all(conn: &mut PgConnection, order_id: Uuid) -> AppResult<StageData> {
    Ok(StageData {
        components: load_components(conn, order_id).await?,
        measurements: load_measurements(conn, order_id).await?,
        quality_items: load_quality_items(conn, order_id).await?,
        packaging_items: load_checklist(conn, order_id, StageKey::Packaging).await?,
        dispatch_items: load_checklist(conn, order_id, StageKey::Dispatch).await?,
        delivery: load_delivery(conn, order_id).await?,
    })
}

// ============================================================================
// Capture
// ============================================================================

/// Persist submitted stage form data.
///
/// Items are matched by id within the order; unknown ids are skipped and
/// unspecified items keep their stored values.
pub async fn capture(
    conn: &mut PgConnection,
    order_id: Uuid,
    payload: &StagePayload,
) -> AppResult<()> {
    match payload {
        StagePayload::Sourcing { components } => {
            update_component_notes(conn, order_id, components).await
        }
        StagePayload::Receipt { decisions } => update_receipts(conn, order_id, decisions).await,
        StagePayload::Preparation { measurements } => {
            replace_measurements(conn, order_id, measurements).await
        }
        StagePayload::Quality { decisions } => update_quality(conn, order_id, decisions).await,
        StagePayload::Packaging { values } => {
            update_checklist(conn, order_id, StageKey::Packaging, values).await
        }
        StagePayload::Dispatch { values } => {
            update_checklist(conn, order_id, StageKey::Dispatch, values).await
        }
        StagePayload::Delivering { delivery } => upsert_delivery(conn, order_id, delivery).await,
    }
}

async fn update_component_notes(
    conn: &mut PgConnection,
    order_id: Uuid,
    updates: &[ComponentNoteUpdate],
) -> AppResult<()> {
    for update in updates {
        sqlx::query(
            r#"
            UPDATE sourcing_components
            SET notes = $3, updated_at = NOW()
            WHERE id = $1 AND order_id = $2
            "#,
        )
        .bind(update.component_id)
        .bind(order_id)
        .bind(&update.notes)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn update_receipts(
    conn: &mut PgConnection,
    order_id: Uuid,
    decisions: &[ReceiptDecision],
) -> AppResult<()> {
    for decision in decisions {
        sqlx::query(
            r#"
            UPDATE sourcing_components
            SET receipt_status = $3, receipt_notes = $4, updated_at = NOW()
            WHERE id = $1 AND order_id = $2
            "#,
        )
        .bind(decision.component_id)
        .bind(order_id)
        .bind(decision.status.as_str())
        .bind(&decision.notes)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Replace the order's measurements; rows without a field name are dropped
async fn replace_measurements(
    conn: &mut PgConnection,
    order_id: Uuid,
    measurements: &[MeasurementInput],
) -> AppResult<()> {
    let rows: Vec<(String, String)> = measurements
        .iter()
        .map(|m| (m.field_name.clone(), m.field_value.clone()))
        .collect();

    sqlx::query("DELETE FROM preparation_measurements WHERE order_id = $1")
        .bind(order_id)
        .execute(&mut *conn)
        .await?;

    for (position, (name, value)) in clean_measurements(&rows).into_iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO preparation_measurements (order_id, field_name, field_value, position)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order_id)
        .bind(name)
        .bind(value)
        .bind(position as i32)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn update_quality(
    conn: &mut PgConnection,
    order_id: Uuid,
    decisions: &[QualityDecision],
) -> AppResult<()> {
    for decision in decisions {
        sqlx::query(
            r#"
            UPDATE quality_items
            SET status = $3, notes = $4, updated_at = NOW()
            WHERE id = $1 AND order_id = $2
            "#,
        )
        .bind(decision.item_id)
        .bind(order_id)
        .bind(decision.status.as_str())
        .bind(&decision.notes)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn update_checklist(
    conn: &mut PgConnection,
    order_id: Uuid,
    stage: StageKey,
    values: &[ChecklistValueUpdate],
) -> AppResult<()> {
    for update in values {
        sqlx::query(
            r#"
            UPDATE checklist_items
            SET value = $4, notes = $5, updated_at = NOW()
            WHERE id = $1 AND order_id = $2 AND stage_key = $3
            "#,
        )
        .bind(update.item_id)
        .bind(order_id)
        .bind(stage.as_str())
        .bind(update.value.as_deref().map(str::trim))
        .bind(&update.notes)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// Create or update the delivery record; the stored photo is kept unless a
/// new one is supplied
async fn upsert_delivery(
    conn: &mut PgConnection,
    order_id: Uuid,
    delivery: &DeliveryUpdate,
) -> AppResult<()> {
    let photo_path = delivery
        .photo_path
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());

    sqlx::query(
        r#"
        INSERT INTO delivery_info
            (order_id, recipient_name, recipient_phone, delivered_at, customer_notes, photo_path)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (order_id) DO UPDATE SET
            recipient_name = EXCLUDED.recipient_name,
            recipient_phone = EXCLUDED.recipient_phone,
            delivered_at = EXCLUDED.delivered_at,
            customer_notes = EXCLUDED.customer_notes,
            photo_path = COALESCE(EXCLUDED.photo_path, delivery_info.photo_path),
            updated_at = NOW()
        "#,
    )
    .bind(order_id)
    .bind(&delivery.recipient_name)
    .bind(&delivery.recipient_phone)
    .bind(delivery.delivered_at)
    .bind(&delivery.customer_notes)
    .bind(photo_path)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
