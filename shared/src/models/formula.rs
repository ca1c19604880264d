//! Formula models (read-only to the workflow)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A product formula with its ordered component list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    pub id: Uuid,
    pub name: String,
    pub components: Vec<FormulaComponent>,
}

/// A formula component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormulaComponent {
    pub name: String,
    /// Catalog product; `None` for free-text items
    pub product_id: Option<Uuid>,
    pub quantity: Decimal,
    pub unit: String,
    pub notes: Option<String>,
}
