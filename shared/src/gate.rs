//! Stage gate rules
//!
//! A stage may not start or complete while its predecessor is incomplete.
//! Sourcing, receipt and quality carry extra completion preconditions.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{QualityItem, ReviewStatus, SourcingComponent, StageKey, StageStatus};

/// Stock position of one sourcing component at the order's location
#[derive(Debug, Clone, Serialize)]
pub struct ComponentAvailability {
    pub name: String,
    pub product_id: Option<Uuid>,
    pub required: Decimal,
    pub available: Decimal,
    pub unit: String,
}

impl ComponentAvailability {
    /// Manual items (no catalog product) are never short
    pub fn is_sufficient(&self) -> bool {
        self.product_id.is_none() || self.available >= self.required
    }
}

/// Everything the gate needs to judge a transition
#[derive(Debug, Clone, Default)]
pub struct GateContext {
    pub stage_statuses: HashMap<StageKey, StageStatus>,
    pub availability: Vec<ComponentAvailability>,
    pub components: Vec<SourcingComponent>,
    pub quality_items: Vec<QualityItem>,
}

impl GateContext {
    pub fn status_of(&self, stage: StageKey) -> StageStatus {
        self.stage_statuses.get(&stage).copied().unwrap_or_default()
    }
}

/// A single unmet condition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GateReason {
    PredecessorIncomplete {
        previous: StageKey,
        previous_status: StageStatus,
    },
    InsufficientInventory {
        name: String,
        required: Decimal,
        available: Decimal,
        unit: String,
    },
    ReceiptNotApproved {
        name: String,
        status: ReviewStatus,
    },
    QualityNotApproved {
        section: String,
        item: String,
        status: ReviewStatus,
    },
}

impl std::fmt::Display for GateReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GateReason::PredecessorIncomplete {
                previous,
                previous_status,
            } => write!(
                f,
                "{} must be completed first (currently {})",
                previous.label(),
                previous_status
            ),
            GateReason::InsufficientInventory {
                name,
                required,
                available,
                unit,
            } => write!(
                f,
                "{}: need {} {}, have {} {}",
                name, required, unit, available, unit
            ),
            GateReason::ReceiptNotApproved { name, status } => {
                write!(f, "{}: receipt is {}", name, status)
            }
            GateReason::QualityNotApproved {
                section,
                item,
                status,
            } => write!(f, "{} / {}: {}", section, item, status),
        }
    }
}

/// A rejected stage transition with every unmet condition
#[derive(Debug, Clone, Error, Serialize)]
#[error("{} cannot move to {}: {}", .stage.label(), .target, summarize(.reasons))]
pub struct GateRejection {
    pub stage: StageKey,
    pub target: StageStatus,
    pub reasons: Vec<GateReason>,
}

fn summarize(reasons: &[GateReason]) -> String {
    reasons
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Check the predecessor rule for moving `stage` to `target`
pub fn check_predecessor(
    stage: StageKey,
    target: StageStatus,
    ctx: &GateContext,
) -> Option<GateReason> {
    if target == StageStatus::Pending {
        return None;
    }
    let previous = stage.previous()?;
    let previous_status = ctx.status_of(previous);
    if previous_status == StageStatus::Completed {
        None
    } else {
        Some(GateReason::PredecessorIncomplete {
            previous,
            previous_status,
        })
    }
}

/// Stage-specific conditions that must hold before `stage` can complete
pub fn check_completion(stage: StageKey, ctx: &GateContext) -> Vec<GateReason> {
    match stage {
        StageKey::Sourcing => ctx
            .availability
            .iter()
            .filter(|a| !a.is_sufficient())
            .map(|a| GateReason::InsufficientInventory {
                name: a.name.clone(),
                required: a.required,
                available: a.available,
                unit: a.unit.clone(),
            })
            .collect(),
        StageKey::Receipt => ctx
            .components
            .iter()
            .filter(|c| c.receipt_status != ReviewStatus::Approved)
            .map(|c| GateReason::ReceiptNotApproved {
                name: c.name.clone(),
                status: c.receipt_status,
            })
            .collect(),
        StageKey::Quality => ctx
            .quality_items
            .iter()
            .filter(|q| q.status != ReviewStatus::Approved)
            .map(|q| GateReason::QualityNotApproved {
                section: q.section.clone(),
                item: q.item_text.clone(),
                status: q.status,
            })
            .collect(),
        StageKey::Preparation
        | StageKey::Packaging
        | StageKey::Dispatch
        | StageKey::Delivering => Vec::new(),
    }
}

/// Decide whether `stage` may move to `target`
pub fn validate_transition(
    stage: StageKey,
    target: StageStatus,
    ctx: &GateContext,
) -> Result<(), GateRejection> {
    if let Some(reason) = check_predecessor(stage, target, ctx) {
        return Err(GateRejection {
            stage,
            target,
            reasons: vec![reason],
        });
    }

    if target == StageStatus::Completed {
        let reasons = check_completion(stage, ctx);
        if !reasons.is_empty() {
            return Err(GateRejection {
                stage,
                target,
                reasons,
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(name: &str, status: ReviewStatus) -> SourcingComponent {
        SourcingComponent {
            id: Uuid::new_v4(),
            order_id: Uuid::nil(),
            template_index: 0,
            product_id: Some(Uuid::new_v4()),
            name: name.to_string(),
            required_quantity: Decimal::ONE,
            unit: "kg".to_string(),
            notes: None,
            receipt_status: status,
            receipt_notes: None,
        }
    }

    #[test]
    fn test_sourcing_is_always_eligible_to_start() {
        let ctx = GateContext::default();
        assert!(validate_transition(StageKey::Sourcing, StageStatus::InProgress, &ctx).is_ok());
    }

    #[test]
    fn test_pending_is_never_gated() {
        let ctx = GateContext::default();
        assert!(validate_transition(StageKey::Delivering, StageStatus::Pending, &ctx).is_ok());
    }

    #[test]
    fn test_receipt_requires_all_approved() {
        let mut ctx = GateContext::default();
        ctx.stage_statuses
            .insert(StageKey::Sourcing, StageStatus::Completed);
        ctx.components = vec![
            component("Sugar", ReviewStatus::Approved),
            component("Citric acid", ReviewStatus::Rejected),
            component("Bottles", ReviewStatus::Pending),
        ];

        let err = validate_transition(StageKey::Receipt, StageStatus::Completed, &ctx).unwrap_err();
        assert_eq!(err.reasons.len(), 2);
        let message = err.to_string();
        assert!(message.contains("Citric acid: receipt is Rejected"));
        assert!(message.contains("Bottles: receipt is Pending"));

        // Starting receipt only needs sourcing completed
        assert!(validate_transition(StageKey::Receipt, StageStatus::InProgress, &ctx).is_ok());
    }

    #[test]
    fn test_manual_components_are_exempt_from_stock_check() {
        let mut ctx = GateContext::default();
        ctx.availability = vec![ComponentAvailability {
            name: "Hand-written label".to_string(),
            product_id: None,
            required: Decimal::from(10),
            available: Decimal::ZERO,
            unit: "pcs".to_string(),
        }];
        assert!(validate_transition(StageKey::Sourcing, StageStatus::Completed, &ctx).is_ok());
    }
}
