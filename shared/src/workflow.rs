//! Stage update requests and transition planning

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationErrors};

use crate::gate::{validate_transition, GateContext, GateRejection};
use crate::models::{ReviewStatus, StageInstance, StageKey, StageStatus, StageTimestamps};
use crate::validation::validate_photo_reference;

/// What a stage submission should do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageAction {
    /// Save stage data and apply the requested status
    #[default]
    Update,
    /// Save stage data and re-render documents, keeping the current status
    Regenerate,
}

/// Running notes for one sourcing component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentNoteUpdate {
    pub component_id: Uuid,
    pub notes: Option<String>,
}

/// Receipt decision for one sourcing component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptDecision {
    pub component_id: Uuid,
    pub status: ReviewStatus,
    pub notes: Option<String>,
}

/// A preparation measurement as entered on the stage form
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct MeasurementInput {
    #[validate(length(max = 128, message = "Measurement name must be at most 128 characters"))]
    pub field_name: String,
    pub field_value: String,
}

/// Decision on one quality checklist item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityDecision {
    pub item_id: Uuid,
    pub status: ReviewStatus,
    pub notes: Option<String>,
}

/// New value for one packaging or dispatch checklist item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistValueUpdate {
    pub item_id: Uuid,
    pub value: Option<String>,
    pub notes: Option<String>,
}

/// Delivery details; a missing photo keeps the stored one.
///
/// `photo_path` is an opaque reference to an upload held elsewhere. The server
/// stores and prints it but never opens or deletes it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct DeliveryUpdate {
    #[validate(length(max = 255, message = "Recipient name must be at most 255 characters"))]
    pub recipient_name: Option<String>,
    #[validate(length(max = 64, message = "Recipient phone must be at most 64 characters"))]
    pub recipient_phone: Option<String>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub customer_notes: Option<String>,
    #[validate(custom = "validate_photo_reference")]
    pub photo_path: Option<String>,
}

/// Stage-shaped form data submitted with a stage update
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum StagePayload {
    Sourcing { components: Vec<ComponentNoteUpdate> },
    Receipt { decisions: Vec<ReceiptDecision> },
    Preparation { measurements: Vec<MeasurementInput> },
    Quality { decisions: Vec<QualityDecision> },
    Packaging { values: Vec<ChecklistValueUpdate> },
    Dispatch { values: Vec<ChecklistValueUpdate> },
    Delivering { delivery: DeliveryUpdate },
}

impl StagePayload {
    /// The stage this payload belongs to
    pub fn stage_key(&self) -> StageKey {
        match self {
            StagePayload::Sourcing { .. } => StageKey::Sourcing,
            StagePayload::Receipt { .. } => StageKey::Receipt,
            StagePayload::Preparation { .. } => StageKey::Preparation,
            StagePayload::Quality { .. } => StageKey::Quality,
            StagePayload::Packaging { .. } => StageKey::Packaging,
            StagePayload::Dispatch { .. } => StageKey::Dispatch,
            StagePayload::Delivering { .. } => StageKey::Delivering,
        }
    }

    /// Field rules for the free-text inputs that end up in bounded columns
    pub fn validate_fields(&self) -> Result<(), ValidationErrors> {
        match self {
            StagePayload::Preparation { measurements } => {
                measurements.iter().try_for_each(|m| m.validate())
            }
            StagePayload::Delivering { delivery } => delivery.validate(),
            StagePayload::Sourcing { .. }
            | StagePayload::Receipt { .. }
            | StagePayload::Quality { .. }
            | StagePayload::Packaging { .. }
            | StagePayload::Dispatch { .. } => Ok(()),
        }
    }
}

/// A stage submission
#[derive(Debug, Clone, Deserialize)]
pub struct StageUpdateRequest {
    #[serde(default)]
    pub action: StageAction,
    /// Target status; required for `update`, ignored for `regenerate`
    pub status: Option<StageStatus>,
    pub notes: Option<String>,
    pub payload: Option<StagePayload>,
}

/// What a well-formed submission asks the stage to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStep {
    Update(StageStatus),
    Regenerate,
}

impl StageStep {
    /// Whether the stage gate must approve this step
    pub fn is_gated(&self) -> bool {
        matches!(
            self,
            StageStep::Update(StageStatus::InProgress | StageStatus::Completed)
        )
    }
}

impl StageUpdateRequest {
    /// Check the request is well-formed for `stage` and resolve its step
    pub fn validate_for(&self, stage: StageKey) -> Result<StageStep, &'static str> {
        if let Some(payload) = &self.payload {
            if payload.stage_key() != stage {
                return Err("Payload does not match the stage being updated");
            }
        }
        match (self.action, self.status) {
            (StageAction::Regenerate, _) => Ok(StageStep::Regenerate),
            (StageAction::Update, Some(status)) => Ok(StageStep::Update(status)),
            (StageAction::Update, None) => Err("Status is required for a stage update"),
        }
    }
}

/// The status and timestamps a stage will be saved with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StageTransition {
    pub status: StageStatus,
    pub timestamps: StageTimestamps,
}

impl StageTransition {
    /// The stage as it currently is
    pub fn unchanged(current: &StageInstance) -> Self {
        Self {
            status: current.status,
            timestamps: StageTimestamps {
                started_at: current.started_at,
                completed_at: current.completed_at,
            },
        }
    }
}

/// Work out the new status and timestamps of `current`.
///
/// Regenerate keeps the stage as it is. Updates to `in_progress` or
/// `completed` must pass the gate first.
pub fn plan_transition(
    current: &StageInstance,
    step: StageStep,
    ctx: &GateContext,
    now: DateTime<Utc>,
) -> Result<StageTransition, GateRejection> {
    let target = match step {
        StageStep::Regenerate => return Ok(StageTransition::unchanged(current)),
        StageStep::Update(target) => target,
    };

    validate_transition(current.stage_key, target, ctx)?;

    let timestamps = StageTimestamps {
        started_at: current.started_at,
        completed_at: current.completed_at,
    }
    .transition(current.status, target, now);

    Ok(StageTransition {
        status: target,
        timestamps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(key: StageKey, status: StageStatus) -> StageInstance {
        StageInstance {
            id: Uuid::new_v4(),
            order_id: Uuid::nil(),
            stage_key: key,
            status,
            notes: None,
            started_at: None,
            completed_at: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_payload_deserializes_by_stage_tag() {
        let json = r#"{
            "action": "update",
            "status": "in_progress",
            "notes": "Mixing started",
            "payload": {
                "stage": "preparation",
                "measurements": [{"field_name": "pH", "field_value": "7.0"}]
            }
        }"#;
        let request: StageUpdateRequest = serde_json::from_str(json).unwrap();
        assert_eq!(
            request.validate_for(StageKey::Preparation),
            Ok(StageStep::Update(StageStatus::InProgress))
        );
        assert!(request.validate_for(StageKey::Quality).is_err());
    }

    #[test]
    fn test_update_without_status_is_rejected() {
        let request = StageUpdateRequest {
            action: StageAction::Update,
            status: None,
            notes: None,
            payload: None,
        };
        assert!(request.validate_for(StageKey::Sourcing).is_err());

        let regenerate = StageUpdateRequest {
            action: StageAction::Regenerate,
            ..request
        };
        assert_eq!(
            regenerate.validate_for(StageKey::Sourcing),
            Ok(StageStep::Regenerate)
        );
    }

    #[test]
    fn test_gated_steps() {
        assert!(StageStep::Update(StageStatus::InProgress).is_gated());
        assert!(StageStep::Update(StageStatus::Completed).is_gated());
        assert!(!StageStep::Update(StageStatus::Pending).is_gated());
        assert!(!StageStep::Regenerate.is_gated());
    }

    #[test]
    fn test_long_measurement_name_is_rejected() {
        let payload = StagePayload::Preparation {
            measurements: vec![
                MeasurementInput {
                    field_name: "pH".to_string(),
                    field_value: "7.0".to_string(),
                },
                MeasurementInput {
                    field_name: "x".repeat(200),
                    field_value: "1".to_string(),
                },
            ],
        };
        let errors = payload.validate_fields().unwrap_err();
        assert!(errors.field_errors().contains_key("field_name"));

        let payload = StagePayload::Preparation {
            measurements: vec![MeasurementInput {
                field_name: "x".repeat(128),
                field_value: "1".to_string(),
            }],
        };
        assert!(payload.validate_fields().is_ok());
    }

    #[test]
    fn test_delivery_field_limits() {
        let ok = StagePayload::Delivering {
            delivery: DeliveryUpdate {
                recipient_name: Some("Dana Reyes".to_string()),
                recipient_phone: Some("+1 555 0100".to_string()),
                photo_path: Some("uploads/mo-17/dock.jpg".to_string()),
                ..DeliveryUpdate::default()
            },
        };
        assert!(ok.validate_fields().is_ok());

        let long_phone = StagePayload::Delivering {
            delivery: DeliveryUpdate {
                recipient_phone: Some("9".repeat(65)),
                ..DeliveryUpdate::default()
            },
        };
        let errors = long_phone.validate_fields().unwrap_err();
        assert!(errors.field_errors().contains_key("recipient_phone"));

        let long_name = StagePayload::Delivering {
            delivery: DeliveryUpdate {
                recipient_name: Some("n".repeat(256)),
                ..DeliveryUpdate::default()
            },
        };
        assert!(long_name.validate_fields().is_err());

        let escaping_photo = StagePayload::Delivering {
            delivery: DeliveryUpdate {
                photo_path: Some("../generated_documents/mo-17".to_string()),
                ..DeliveryUpdate::default()
            },
        };
        let errors = escaping_photo.validate_fields().unwrap_err();
        assert!(errors.field_errors().contains_key("photo_path"));
    }

    #[test]
    fn test_regenerate_bypasses_gate() {
        let current = stage(StageKey::Quality, StageStatus::InProgress);
        let transition = plan_transition(
            &current,
            StageStep::Regenerate,
            &GateContext::default(),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(transition.status, StageStatus::InProgress);
    }
}
