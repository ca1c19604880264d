//! Manufacturing order header models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::StageStatus;
use crate::validation::validate_batch_size;

/// A manufacturing order (one production run)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    /// Human readable, unique order number (e.g. "MO-2024-0042")
    pub order_number: String,
    pub customer_id: Uuid,
    pub product_id: Option<Uuid>,
    pub formula_id: Uuid,
    pub location_id: Uuid,
    pub container_size_id: Option<Uuid>,
    pub batch_size: Decimal,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    /// Derived from the stage statuses, never set by clients
    pub fulfillment_status: FulfillmentStatus,
    /// Manually maintained status shown on the order board
    pub display_status: DisplayStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Display names of the records an order references
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderLabels {
    pub customer_name: Option<String>,
    pub product_name: Option<String>,
    pub location_name: Option<String>,
    pub container_size: Option<String>,
}

/// Order priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Normal,
    Rush,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Normal => "normal",
            Priority::Rush => "rush",
            Priority::Critical => "critical",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "normal" => Some(Priority::Normal),
            "rush" => Some(Priority::Rush),
            "critical" => Some(Priority::Critical),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Normal => write!(f, "Normal"),
            Priority::Rush => write!(f, "Rush"),
            Priority::Critical => write!(f, "Critical"),
        }
    }
}

/// Order status derived from its stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FulfillmentStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl FulfillmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Pending => "pending",
            FulfillmentStatus::InProgress => "in_progress",
            FulfillmentStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(FulfillmentStatus::Pending),
            "in_progress" => Some(FulfillmentStatus::InProgress),
            "completed" => Some(FulfillmentStatus::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for FulfillmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FulfillmentStatus::Pending => write!(f, "Pending"),
            FulfillmentStatus::InProgress => write!(f, "In Progress"),
            FulfillmentStatus::Completed => write!(f, "Completed"),
        }
    }
}

/// Aggregate the stage statuses of an order into its fulfillment status.
///
/// Completed only when every catalog stage is completed; pending only when
/// no stage has been started or completed.
pub fn aggregate_status(statuses: &[StageStatus]) -> FulfillmentStatus {
    let all_completed = statuses.len() == super::StageKey::ALL.len()
        && statuses.iter().all(|s| *s == StageStatus::Completed);

    if all_completed {
        FulfillmentStatus::Completed
    } else if statuses.iter().any(|s| *s != StageStatus::Pending) {
        FulfillmentStatus::InProgress
    } else {
        FulfillmentStatus::Pending
    }
}

/// Manually edited status shown on the order board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayStatus {
    #[default]
    Getting,
    Preparing,
    Delivering,
    Completed,
    Cancelled,
}

impl DisplayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayStatus::Getting => "getting",
            DisplayStatus::Preparing => "preparing",
            DisplayStatus::Delivering => "delivering",
            DisplayStatus::Completed => "completed",
            DisplayStatus::Cancelled => "cancelled",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "getting" => Some(DisplayStatus::Getting),
            "preparing" => Some(DisplayStatus::Preparing),
            "delivering" => Some(DisplayStatus::Delivering),
            "completed" => Some(DisplayStatus::Completed),
            "cancelled" => Some(DisplayStatus::Cancelled),
            _ => None,
        }
    }
}

/// Input for creating an order
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateOrderInput {
    #[validate(length(min = 1, max = 64, message = "Order number is required"))]
    pub order_number: String,
    pub customer_id: Uuid,
    pub product_id: Option<Uuid>,
    pub formula_id: Uuid,
    #[validate(required(message = "Location is required"))]
    pub location_id: Option<Uuid>,
    pub container_size_id: Option<Uuid>,
    #[validate(custom = "validate_batch_size")]
    pub batch_size: Decimal,
    #[serde(default)]
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
}

/// Input for editing an order header.
///
/// Does not touch stages or the derived fulfillment status.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateOrderInput {
    #[validate(required(message = "Location is required"))]
    pub location_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
    #[validate(custom = "validate_batch_size")]
    pub batch_size: Decimal,
    #[serde(default)]
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[serde(default)]
    pub display_status: DisplayStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_partial_progress() {
        use StageStatus::*;
        let statuses = [Completed, Completed, InProgress, Pending, Pending, Pending, Pending];
        assert_eq!(aggregate_status(&statuses), FulfillmentStatus::InProgress);
    }

    #[test]
    fn test_aggregate_first_stage_completed_only() {
        use StageStatus::*;
        let statuses = [Completed, Pending, Pending, Pending, Pending, Pending, Pending];
        assert_eq!(aggregate_status(&statuses), FulfillmentStatus::InProgress);
    }

    #[test]
    fn test_aggregate_missing_stage_is_not_completed() {
        let statuses = [StageStatus::Completed; 6];
        assert_eq!(aggregate_status(&statuses), FulfillmentStatus::InProgress);
    }

    #[test]
    fn test_create_order_validation() {
        let input = CreateOrderInput {
            order_number: "".to_string(),
            customer_id: Uuid::new_v4(),
            product_id: None,
            formula_id: Uuid::new_v4(),
            location_id: None,
            container_size_id: None,
            batch_size: Decimal::ZERO,
            priority: Priority::Normal,
            due_date: None,
            notes: None,
        };
        let errors = input.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("order_number"));
        assert!(fields.contains_key("location_id"));
        assert!(fields.contains_key("batch_size"));
    }
}
