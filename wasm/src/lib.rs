//! WebAssembly module for the Manufacturing Order Workflow
//!
//! Provides client-side previews for:
//! - The stage catalog
//! - Order status aggregation
//! - Stage gate checks before a form is submitted
//! - Batch size validation

use std::collections::HashMap;

use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

use shared::{
    aggregate_status, check_predecessor, stage_catalog, validate_batch_size, GateContext,
    StageKey, StageStatus,
};

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("manufacturing order workflow module loaded"));
}

fn parse_statuses(statuses_json: &str) -> Result<HashMap<StageKey, StageStatus>, String> {
    serde_json::from_str(statuses_json).map_err(|e| format!("Invalid statuses JSON: {}", e))
}

fn parse_stage(stage_key: &str) -> Result<StageKey, String> {
    StageKey::from_str(stage_key).ok_or_else(|| format!("Unknown stage key: {}", stage_key))
}

/// Stage catalog as a JSON array
#[wasm_bindgen]
pub fn stage_catalog_json() -> String {
    serde_json::to_string(&stage_catalog()).unwrap_or_else(|_| "[]".to_string())
}

/// Display label of a stage, or an empty string for unknown keys
#[wasm_bindgen]
pub fn stage_label(stage_key: &str) -> String {
    StageKey::from_str(stage_key)
        .map(|k| k.label().to_string())
        .unwrap_or_default()
}

fn aggregate(statuses_json: &str) -> Result<String, String> {
    let by_stage = parse_statuses(statuses_json)?;
    let statuses: Vec<StageStatus> = StageKey::ALL
        .iter()
        .filter_map(|k| by_stage.get(k).copied())
        .collect();
    Ok(aggregate_status(&statuses).as_str().to_string())
}

/// Order status for a `{stage_key: status}` JSON map
#[wasm_bindgen]
pub fn aggregate_order_status(statuses_json: &str) -> Result<String, JsValue> {
    aggregate(statuses_json).map_err(|e| JsValue::from_str(&e))
}

fn predecessor_message(
    stage_key: &str,
    target: &str,
    statuses_json: &str,
) -> Result<String, String> {
    let stage = parse_stage(stage_key)?;
    let target =
        StageStatus::from_str(target).ok_or_else(|| format!("Unknown status: {}", target))?;
    let ctx = GateContext {
        stage_statuses: parse_statuses(statuses_json)?,
        ..GateContext::default()
    };

    Ok(check_predecessor(stage, target, &ctx)
        .map(|reason| reason.to_string())
        .unwrap_or_default())
}

/// Preview the predecessor rule; returns the blocking reason or an empty string
#[wasm_bindgen]
pub fn preview_stage_gate(
    stage_key: &str,
    target: &str,
    statuses_json: &str,
) -> Result<String, JsValue> {
    predecessor_message(stage_key, target, statuses_json).map_err(|e| JsValue::from_str(&e))
}

/// Batch size must be a positive number
#[wasm_bindgen]
pub fn is_valid_batch_size(value: &str) -> bool {
    value
        .trim()
        .parse::<Decimal>()
        .map(|d| validate_batch_size(&d).is_ok())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_catalog_json() {
        let catalog: serde_json::Value = serde_json::from_str(&stage_catalog_json()).unwrap();
        let stages = catalog.as_array().unwrap();
        assert_eq!(stages.len(), 7);
        assert_eq!(stages[3]["key"], "quality");
        assert_eq!(stages[3]["label"], "Quality Check");
    }

    #[test]
    fn test_stage_label() {
        assert_eq!(stage_label("dispatch"), "Dispatch");
        assert_eq!(stage_label("unknown"), "");
    }

    #[test]
    fn test_aggregate() {
        let json = r#"{"sourcing":"completed","receipt":"pending","preparation":"pending",
            "quality":"pending","packaging":"pending","dispatch":"pending",
            "delivering":"pending"}"#;
        assert_eq!(aggregate(json).unwrap(), "in_progress");
        assert!(aggregate("not json").is_err());
    }

    #[test]
    fn test_predecessor_preview() {
        let statuses = r#"{"sourcing":"in_progress"}"#;
        let message = predecessor_message("receipt", "in_progress", statuses).unwrap();
        assert!(message.contains("Material Sourcing must be completed first"));

        let statuses = r#"{"sourcing":"completed"}"#;
        assert_eq!(predecessor_message("receipt", "completed", statuses).unwrap(), "");
        assert!(predecessor_message("mixing", "completed", statuses).is_err());
    }

    #[test]
    fn test_batch_size() {
        assert!(is_valid_batch_size("250"));
        assert!(is_valid_batch_size(" 0.5 "));
        assert!(!is_valid_batch_size("0"));
        assert!(!is_valid_batch_size("-3"));
        assert!(!is_valid_batch_size("lots"));
    }
}
