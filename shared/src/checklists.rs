//! Fixed checklist definitions seeded onto every order
//!
//! Quality items are approve/reject decisions. Packaging and dispatch items
//! carry a typed value (checkbox, number or text).

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::ChecklistValueType::{Checkbox, Number, Text};
use crate::models::{ChecklistItem, ChecklistValueType, StageKey};

/// A quality checklist definition
#[derive(Debug, Clone, Copy)]
pub struct QualityCheckDefinition {
    pub key: &'static str,
    pub section: &'static str,
    pub text: &'static str,
}

/// A packaging or dispatch checklist definition
#[derive(Debug, Clone, Copy)]
pub struct ChecklistDefinition {
    pub key: &'static str,
    pub section: &'static str,
    pub text: &'static str,
    pub value_type: ChecklistValueType,
}

const fn quality(
    key: &'static str,
    section: &'static str,
    text: &'static str,
) -> QualityCheckDefinition {
    QualityCheckDefinition { key, section, text }
}

const fn check(
    key: &'static str,
    section: &'static str,
    text: &'static str,
    value_type: ChecklistValueType,
) -> ChecklistDefinition {
    ChecklistDefinition {
        key,
        section,
        text,
        value_type,
    }
}

pub const QUALITY_CHECKLIST: &[QualityCheckDefinition] = &[
    quality("appearance_colour", "Appearance", "Colour matches the approved standard"),
    quality("appearance_clarity", "Appearance", "Product is clear and free of visible particles"),
    quality("appearance_odour", "Appearance", "Odour is characteristic with no off-notes"),
    quality("physical_ph", "Physical & Chemical", "pH within specification"),
    quality("physical_tds", "Physical & Chemical", "TDS within specification"),
    quality("physical_density", "Physical & Chemical", "Specific gravity within specification"),
    quality("micro_sample", "Microbiology", "Retention sample taken and labelled"),
    quality("micro_clearance", "Microbiology", "Microbiological clearance received"),
    quality("docs_batch_record", "Documentation", "Batch record complete and signed"),
    quality("docs_formula_match", "Documentation", "Ingredients used match the formula"),
];

pub const PACKAGING_CHECKLIST: &[ChecklistDefinition] = &[
    check("line_cleared", "before", "Packaging line cleared of previous batch", Checkbox),
    check("containers_inspected", "before", "Containers inspected and clean", Checkbox),
    check("containers_issued", "before", "Containers issued", Number),
    check("labels_issued", "before", "Labels issued", Number),
    check("label_text_verified", "before", "Label text, batch and expiry verified", Checkbox),
    check("fill_weight_checked", "during", "Fill weight / volume checked at start", Checkbox),
    check("fill_check_interval", "during", "Fill check interval (minutes)", Number),
    check("seal_integrity", "during", "Seal / cap integrity checked", Checkbox),
    check("containers_filled", "after", "Containers filled", Number),
    check("containers_rejected", "after", "Containers rejected", Number),
    check("containers_returned", "after", "Unused containers returned to stores", Number),
    check("labels_used", "after", "Labels used", Number),
    check("labels_damaged", "after", "Labels damaged", Number),
    check("labels_returned", "after", "Unused labels returned to stores", Number),
    check("packed_by", "after", "Packed by", Text),
];

pub const DISPATCH_CHECKLIST: &[ChecklistDefinition] = &[
    check("vehicle_number", "details", "Vehicle number", Text),
    check("driver_name", "details", "Driver name", Text),
    check("driver_phone", "details", "Driver phone", Text),
    check("units_packed", "details", "Units packed for this order", Number),
    check("units_loaded", "details", "Units loaded", Number),
    check("vehicle_clean", "before_loading", "Vehicle clean, dry and odour free", Checkbox),
    check("cartons_sealed", "before_loading", "Cartons sealed and labelled", Checkbox),
    check("documents_attached", "before_loading", "Delivery note and invoice attached", Checkbox),
    check("load_secured", "before_loading", "Load secured against movement", Checkbox),
];

/// Checklist definitions for packaging and dispatch
pub fn checklist_for(stage: StageKey) -> Option<&'static [ChecklistDefinition]> {
    match stage {
        StageKey::Packaging => Some(PACKAGING_CHECKLIST),
        StageKey::Dispatch => Some(DISPATCH_CHECKLIST),
        _ => None,
    }
}

/// Heading for a checklist section
pub fn section_label(section: &str) -> &str {
    match section {
        "before" => "Before Packaging",
        "during" => "During Packaging",
        "after" => "After Packaging",
        "details" => "Dispatch Details",
        "before_loading" => "Before Loading",
        other => other,
    }
}

/// One row of the material reconciliation table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationLine {
    pub material: &'static str,
    pub issued: Decimal,
    pub used: Decimal,
    pub rejected: Decimal,
    pub returned: Decimal,
    /// issued - used - rejected - returned; non-zero means material is unaccounted for
    pub variance: Decimal,
}

impl ReconciliationLine {
    fn new(
        material: &'static str,
        issued: Decimal,
        used: Decimal,
        rejected: Decimal,
        returned: Decimal,
    ) -> Self {
        Self {
            material,
            issued,
            used,
            rejected,
            returned,
            variance: issued - used - rejected - returned,
        }
    }

    pub fn is_balanced(&self) -> bool {
        self.variance.is_zero()
    }
}

/// Derive the material reconciliation for a packaging or dispatch checklist
pub fn material_reconciliation(
    stage: StageKey,
    items: &[ChecklistItem],
) -> Vec<ReconciliationLine> {
    let value = |key: &str| {
        items
            .iter()
            .find(|item| item.item_key == key)
            .map(ChecklistItem::numeric_value)
            .unwrap_or(Decimal::ZERO)
    };

    match stage {
        StageKey::Packaging => vec![
            ReconciliationLine::new(
                "Containers",
                value("containers_issued"),
                value("containers_filled"),
                value("containers_rejected"),
                value("containers_returned"),
            ),
            ReconciliationLine::new(
                "Labels",
                value("labels_issued"),
                value("labels_used"),
                value("labels_damaged"),
                value("labels_returned"),
            ),
        ],
        StageKey::Dispatch => vec![ReconciliationLine::new(
            "Finished units",
            value("units_packed"),
            value("units_loaded"),
            Decimal::ZERO,
            Decimal::ZERO,
        )],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use uuid::Uuid;

    fn item(key: &str, value: &str) -> ChecklistItem {
        ChecklistItem {
            id: Uuid::new_v4(),
            order_id: Uuid::nil(),
            stage_key: StageKey::Packaging,
            item_key: key.to_string(),
            section: "after".to_string(),
            item_text: key.to_string(),
            value_type: ChecklistValueType::Number,
            value: Some(value.to_string()),
            notes: None,
            display_order: 0,
        }
    }

    #[test]
    fn test_definition_keys_are_unique() {
        let quality: HashSet<_> = QUALITY_CHECKLIST.iter().map(|d| d.key).collect();
        assert_eq!(quality.len(), QUALITY_CHECKLIST.len());

        for stage in [StageKey::Packaging, StageKey::Dispatch] {
            let defs = checklist_for(stage).unwrap();
            let keys: HashSet<_> = defs.iter().map(|d| d.key).collect();
            assert_eq!(keys.len(), defs.len());
        }
        assert!(checklist_for(StageKey::Quality).is_none());
    }

    #[test]
    fn test_packaging_reconciliation() {
        let items = vec![
            item("containers_issued", "100"),
            item("containers_filled", "95"),
            item("containers_rejected", "3"),
            item("containers_returned", "2"),
            item("labels_issued", "110"),
            item("labels_used", "95"),
            item("labels_damaged", "not counted"),
        ];

        let lines = material_reconciliation(StageKey::Packaging, &items);
        assert_eq!(lines.len(), 2);
        assert!(lines[0].is_balanced());
        assert_eq!(lines[1].variance, Decimal::from(15));
    }

    #[test]
    fn test_reconciliation_only_for_checklist_stages() {
        assert!(material_reconciliation(StageKey::Quality, &[]).is_empty());
        let dispatch = material_reconciliation(StageKey::Dispatch, &[]);
        assert_eq!(dispatch.len(), 1);
        assert!(dispatch[0].is_balanced());
    }
}
