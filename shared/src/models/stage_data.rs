//! Per-stage structured records

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StageKey;

/// Review decision for received components and quality checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ReviewStatus::Pending),
            "approved" => Some(ReviewStatus::Approved),
            "rejected" => Some(ReviewStatus::Rejected),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReviewStatus::Pending => write!(f, "Pending"),
            ReviewStatus::Approved => write!(f, "Approved"),
            ReviewStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

/// A formula component copied onto an order for sourcing and receipt.
///
/// Quantity and unit are frozen when the row is seeded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcingComponent {
    pub id: Uuid,
    pub order_id: Uuid,
    pub template_index: i32,
    /// Catalog product; `None` for manual items
    pub product_id: Option<Uuid>,
    pub name: String,
    pub required_quantity: Decimal,
    pub unit: String,
    pub notes: Option<String>,
    pub receipt_status: ReviewStatus,
    pub receipt_notes: Option<String>,
}

/// One item of the quality checklist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub item_key: String,
    pub section: String,
    pub item_text: String,
    pub status: ReviewStatus,
    pub notes: Option<String>,
    pub display_order: i32,
}

/// Kind of value a packaging or dispatch checklist item holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistValueType {
    Checkbox,
    Number,
    Text,
}

impl ChecklistValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecklistValueType::Checkbox => "checkbox",
            ChecklistValueType::Number => "number",
            ChecklistValueType::Text => "text",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "checkbox" => Some(ChecklistValueType::Checkbox),
            "number" => Some(ChecklistValueType::Number),
            "text" => Some(ChecklistValueType::Text),
            _ => None,
        }
    }
}

/// A packaging or dispatch checklist item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub stage_key: StageKey,
    pub item_key: String,
    pub section: String,
    pub item_text: String,
    pub value_type: ChecklistValueType,
    pub value: Option<String>,
    pub notes: Option<String>,
    pub display_order: i32,
}

impl ChecklistItem {
    /// Whether a checkbox item is ticked
    pub fn is_checked(&self) -> bool {
        matches!(
            self.value.as_deref().map(str::trim),
            Some("1") | Some("true") | Some("yes") | Some("on")
        )
    }

    /// Numeric value, zero when blank or not a number
    pub fn numeric_value(&self) -> Decimal {
        self.value
            .as_deref()
            .and_then(|v| v.trim().parse::<Decimal>().ok())
            .unwrap_or(Decimal::ZERO)
    }

    /// Value formatted for documents
    pub fn display_value(&self) -> String {
        match self.value_type {
            ChecklistValueType::Checkbox => {
                if self.is_checked() {
                    "Yes".to_string()
                } else {
                    "No".to_string()
                }
            }
            _ => self.value.clone().unwrap_or_default(),
        }
    }
}

/// A free-form preparation measurement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Measurement {
    pub id: Uuid,
    pub order_id: Uuid,
    pub field_name: String,
    pub field_value: String,
    pub position: i32,
}

/// Delivery details, at most one per order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeliveryInfo {
    pub order_id: Uuid,
    pub recipient_name: Option<String>,
    pub recipient_phone: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub customer_notes: Option<String>,
    pub photo_path: Option<String>,
}

/// All per-stage records of an order
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageData {
    pub components: Vec<SourcingComponent>,
    pub measurements: Vec<Measurement>,
    pub quality_items: Vec<QualityItem>,
    pub packaging_items: Vec<ChecklistItem>,
    pub dispatch_items: Vec<ChecklistItem>,
    pub delivery: Option<DeliveryInfo>,
}

impl StageData {
    /// Checklist items belonging to a packaging or dispatch stage
    pub fn checklist(&self, stage: StageKey) -> &[ChecklistItem] {
        match stage {
            StageKey::Packaging => &self.packaging_items,
            StageKey::Dispatch => &self.dispatch_items,
            _ => &[],
        }
    }
}
