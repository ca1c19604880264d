//! Read-only access to formulas and inventory

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use shared::{ComponentAvailability, Formula, FormulaComponent, SourcingComponent};

/// Catalog service for formula and stock lookups
#[derive(Clone)]
pub struct CatalogService {
    db: PgPool,
}

/// Database row for a formula component
#[derive(Debug, sqlx::FromRow)]
struct FormulaComponentRow {
    name: String,
    product_id: Option<Uuid>,
    quantity: Decimal,
    unit: String,
    notes: Option<String>,
}

impl From<FormulaComponentRow> for FormulaComponent {
    fn from(row: FormulaComponentRow) -> Self {
        FormulaComponent {
            name: row.name,
            product_id: row.product_id,
            quantity: row.quantity,
            unit: row.unit,
            notes: row.notes,
        }
    }
}

impl CatalogService {
    /// Create a new CatalogService instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get a formula with its components in position order
    pub async fn get_formula(&self, formula_id: Uuid) -> AppResult<Formula> {
        let name = sqlx::query_scalar::<_, String>("SELECT name FROM formulas WHERE id = $1")
            .bind(formula_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Formula".to_string()))?;

        let rows = sqlx::query_as::<_, FormulaComponentRow>(
            r#"
            SELECT name, product_id, quantity, unit, notes
            FROM formula_components
            WHERE formula_id = $1
            ORDER BY position
            "#,
        )
        .bind(formula_id)
        .fetch_all(&self.db)
        .await?;

        Ok(Formula {
            id: formula_id,
            name,
            components: rows.into_iter().map(FormulaComponent::from).collect(),
        })
    }

    /// Total quantity of a product held at a location
    pub async fn available_quantity(
        &self,
        product_id: Uuid,
        location_id: Uuid,
    ) -> AppResult<Decimal> {
        let quantity = sqlx::query_scalar::<_, Option<Decimal>>(
            r#"
            SELECT SUM(quantity)
            FROM inventory_records
            WHERE product_id = $1 AND location_id = $2
            "#,
        )
        .bind(product_id)
        .bind(location_id)
        .fetch_one(&self.db)
        .await?;

        Ok(quantity.unwrap_or(Decimal::ZERO))
    }

    /// Stock position of every sourcing component at the order's location
    pub async fn component_availability(
        &self,
        components: &[SourcingComponent],
        location_id: Uuid,
    ) -> AppResult<Vec<ComponentAvailability>> {
        let mut availability = Vec::with_capacity(components.len());

        for component in components {
            let available = match component.product_id {
                Some(product_id) => self.available_quantity(product_id, location_id).await?,
                None => Decimal::ZERO,
            };

            availability.push(ComponentAvailability {
                name: component.name.clone(),
                product_id: component.product_id,
                required: component.required_quantity,
                available,
                unit: component.unit.clone(),
            });
        }

        Ok(availability)
    }

    /// Check that the records an order header refers to exist
    pub async fn ensure_references(
        &self,
        customer_id: Option<Uuid>,
        formula_id: Option<Uuid>,
        location_id: Uuid,
    ) -> AppResult<()> {
        let checks = [
            ("customer_id", "customers", customer_id),
            ("formula_id", "formulas", formula_id),
            ("location_id", "locations", Some(location_id)),
        ];

        for (field, table, id) in checks {
            let Some(id) = id else { continue };
            let exists = sqlx::query_scalar::<_, bool>(&format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1)",
                table
            ))
            .bind(id)
            .fetch_one(&self.db)
            .await?;

            if !exists {
                return Err(AppError::Validation {
                    field: field.to_string(),
                    message: format!("Unknown {}", field.trim_end_matches("_id")),
                });
            }
        }

        Ok(())
    }
}
