//! Stage catalog and per-stage status model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stage of the manufacturing workflow, in catalog order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKey {
    Sourcing,
    Receipt,
    Preparation,
    Quality,
    Packaging,
    Dispatch,
    Delivering,
}

impl StageKey {
    /// Every stage in workflow order
    pub const ALL: [StageKey; 7] = [
        StageKey::Sourcing,
        StageKey::Receipt,
        StageKey::Preparation,
        StageKey::Quality,
        StageKey::Packaging,
        StageKey::Dispatch,
        StageKey::Delivering,
    ];

    /// Position of the stage in the catalog (0-based)
    pub fn index(&self) -> usize {
        match self {
            StageKey::Sourcing => 0,
            StageKey::Receipt => 1,
            StageKey::Preparation => 2,
            StageKey::Quality => 3,
            StageKey::Packaging => 4,
            StageKey::Dispatch => 5,
            StageKey::Delivering => 6,
        }
    }

    /// The stage that must be completed before this one can start
    pub fn previous(&self) -> Option<StageKey> {
        match self.index() {
            0 => None,
            i => Some(Self::ALL[i - 1]),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StageKey::Sourcing => "sourcing",
            StageKey::Receipt => "receipt",
            StageKey::Preparation => "preparation",
            StageKey::Quality => "quality",
            StageKey::Packaging => "packaging",
            StageKey::Dispatch => "dispatch",
            StageKey::Delivering => "delivering",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sourcing" => Some(StageKey::Sourcing),
            "receipt" => Some(StageKey::Receipt),
            "preparation" => Some(StageKey::Preparation),
            "quality" => Some(StageKey::Quality),
            "packaging" => Some(StageKey::Packaging),
            "dispatch" => Some(StageKey::Dispatch),
            "delivering" => Some(StageKey::Delivering),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StageKey::Sourcing => "Material Sourcing",
            StageKey::Receipt => "Material Receipt",
            StageKey::Preparation => "Preparation",
            StageKey::Quality => "Quality Check",
            StageKey::Packaging => "Packaging",
            StageKey::Dispatch => "Dispatch",
            StageKey::Delivering => "Delivery",
        }
    }

    /// Work instruction shown to the team that owns the stage
    pub fn instruction(&self) -> &'static str {
        match self {
            StageKey::Sourcing => {
                "Confirm every formula component is in stock at the production location and note \
                 supplier details for manual items."
            }
            StageKey::Receipt => {
                "Inspect each received component against the sourcing list and approve or reject \
                 it with a reason."
            }
            StageKey::Preparation => {
                "Prepare the batch according to the formula and record the process measurements \
                 (pH, TDS, temperature, mixing time)."
            }
            StageKey::Quality => {
                "Work through the quality checklist section by section. Every item must be \
                 approved before the batch is released."
            }
            StageKey::Packaging => {
                "Complete the packaging checklist before, during and after filling, and reconcile \
                 containers and labels."
            }
            StageKey::Dispatch => {
                "Record vehicle and driver details and confirm the load checks before the \
                 consignment leaves the site."
            }
            StageKey::Delivering => {
                "Capture the recipient, delivery time and proof of delivery photo."
            }
        }
    }

    /// Note handed over to the next team when the stage is completed
    pub fn handover_note(&self) -> &'static str {
        match self {
            StageKey::Sourcing => "Hand over the sourcing list to stores for physical receipt.",
            StageKey::Receipt => "Release approved materials to the preparation area.",
            StageKey::Preparation => {
                "Hand the prepared batch and measurement sheet to quality control."
            }
            StageKey::Quality => "Release the approved batch to the packaging line.",
            StageKey::Packaging => "Move packed and labelled goods to the dispatch bay.",
            StageKey::Dispatch => "Hand the consignment and documents to the driver.",
            StageKey::Delivering => "File the signed delivery proof with the order.",
        }
    }
}

impl std::fmt::Display for StageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Ordered stage keys of the catalog
pub fn stage_keys() -> &'static [StageKey] {
    &StageKey::ALL
}

pub fn label_of(key: StageKey) -> &'static str {
    key.label()
}

pub fn instruction_of(key: StageKey) -> &'static str {
    key.instruction()
}

pub fn handover_note_of(key: StageKey) -> &'static str {
    key.handover_note()
}

/// Catalog entry as exposed to clients
#[derive(Debug, Clone, Serialize)]
pub struct StageDefinition {
    pub key: StageKey,
    pub index: usize,
    pub label: &'static str,
    pub instruction: &'static str,
    pub handover_note: &'static str,
}

/// The full stage catalog in workflow order
pub fn stage_catalog() -> Vec<StageDefinition> {
    StageKey::ALL
        .iter()
        .map(|key| StageDefinition {
            key: *key,
            index: key.index(),
            label: key.label(),
            instruction: key.instruction(),
            handover_note: key.handover_note(),
        })
        .collect()
}

/// Status of a single stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::Pending => "pending",
            StageStatus::InProgress => "in_progress",
            StageStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(StageStatus::Pending),
            "in_progress" => Some(StageStatus::InProgress),
            "completed" => Some(StageStatus::Completed),
            _ => None,
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Pending => write!(f, "Pending"),
            StageStatus::InProgress => write!(f, "In Progress"),
            StageStatus::Completed => write!(f, "Completed"),
        }
    }
}

/// One stage of one order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageInstance {
    pub id: Uuid,
    pub order_id: Uuid,
    pub stage_key: StageKey,
    pub status: StageStatus,
    pub notes: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Start and completion timestamps of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StageTimestamps {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StageTimestamps {
    /// Timestamps after moving from `previous` to `target` at `now`
    pub fn transition(
        self,
        previous: StageStatus,
        target: StageStatus,
        now: DateTime<Utc>,
    ) -> StageTimestamps {
        match target {
            StageStatus::Pending => StageTimestamps::default(),
            StageStatus::InProgress => StageTimestamps {
                started_at: self.started_at.or(Some(now)),
                completed_at: None,
            },
            StageStatus::Completed => {
                let completed_at = if previous == StageStatus::Completed {
                    self.completed_at.or(Some(now))
                } else {
                    Some(now)
                };
                StageTimestamps {
                    started_at: self.started_at.or(Some(now)),
                    completed_at,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_catalog_order_and_predecessors() {
        assert_eq!(stage_keys().len(), 7);
        assert_eq!(StageKey::Sourcing.previous(), None);
        assert_eq!(StageKey::Receipt.previous(), Some(StageKey::Sourcing));
        assert_eq!(StageKey::Delivering.previous(), Some(StageKey::Dispatch));
        for (i, key) in StageKey::ALL.iter().enumerate() {
            assert_eq!(key.index(), i);
            assert_eq!(StageKey::from_str(key.as_str()), Some(*key));
        }
        assert_eq!(StageKey::from_str("shipping"), None);
    }

    #[test]
    fn test_timestamps_start_then_complete() {
        let t0 = Utc::now();
        let t1 = t0 + Duration::minutes(5);

        let started = StageTimestamps::default().transition(
            StageStatus::Pending,
            StageStatus::InProgress,
            t0,
        );
        assert_eq!(started.started_at, Some(t0));
        assert_eq!(started.completed_at, None);

        let completed = started.transition(StageStatus::InProgress, StageStatus::Completed, t1);
        assert_eq!(completed.started_at, Some(t0));
        assert_eq!(completed.completed_at, Some(t1));

        let reset = completed.transition(StageStatus::Completed, StageStatus::Pending, t1);
        assert_eq!(reset, StageTimestamps::default());
    }

    #[test]
    fn test_completing_directly_sets_both_timestamps() {
        let now = Utc::now();
        let ts = StageTimestamps::default().transition(
            StageStatus::Pending,
            StageStatus::Completed,
            now,
        );
        assert_eq!(ts.started_at, Some(now));
        assert_eq!(ts.completed_at, Some(now));
    }

    #[test]
    fn test_reopening_clears_completion_only() {
        let t0 = Utc::now();
        let ts = StageTimestamps {
            started_at: Some(t0),
            completed_at: Some(t0),
        }
        .transition(StageStatus::Completed, StageStatus::InProgress, t0 + Duration::hours(1));
        assert_eq!(ts.started_at, Some(t0));
        assert_eq!(ts.completed_at, None);
    }
}
