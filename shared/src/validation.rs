//! Validation utilities for the manufacturing order workflow

use rust_decimal::Decimal;
use validator::ValidationError;

use crate::models::StageKey;

/// Batch size must be a positive quantity
pub fn validate_batch_size(batch_size: &Decimal) -> Result<(), ValidationError> {
    if *batch_size <= Decimal::ZERO {
        let mut error = ValidationError::new("batch_size");
        error.message = Some("Batch size must be greater than zero".into());
        return Err(error);
    }
    Ok(())
}

/// A delivery photo reference must be a relative upload path without `..`
/// segments. Blank means no new photo.
pub fn validate_photo_reference(reference: &str) -> Result<(), ValidationError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Ok(());
    }

    let escapes = reference.starts_with('/')
        || reference.contains('\\')
        || reference.contains(':')
        || reference.split('/').any(|segment| segment == "..");

    if escapes || reference.chars().count() > 512 {
        let mut error = ValidationError::new("photo_path");
        error.message = Some("Photo reference must be a relative upload path".into());
        return Err(error);
    }
    Ok(())
}

/// Parse a stage key from a URL segment
pub fn parse_stage_key(raw: &str) -> Result<StageKey, &'static str> {
    StageKey::from_str(raw.trim()).ok_or("Unknown stage key")
}

/// Normalise measurement rows: trim names and drop rows without a name
pub fn clean_measurements(rows: &[(String, String)]) -> Vec<(String, String)> {
    rows.iter()
        .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

/// Lowercase ASCII slug used for document folders and file names.
///
/// Runs of anything other than letters and digits collapse to a single `-`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;

    for c in input.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("MO-2024/0042"), "mo-2024-0042");
        assert_eq!(slugify("  Order #17  "), "order-17");
        assert_eq!(slugify("in_progress"), "in-progress");
        assert_eq!(slugify("///"), "untitled");
        assert_eq!(slugify("../../etc"), "etc");
    }

    #[test]
    fn test_batch_size() {
        assert!(validate_batch_size(&Decimal::from(250)).is_ok());
        assert!(validate_batch_size(&Decimal::ZERO).is_err());
        assert!(validate_batch_size(&Decimal::from(-1)).is_err());
    }

    #[test]
    fn test_photo_reference() {
        assert!(validate_photo_reference("uploads/mo-17/dock.jpg").is_ok());
        assert!(validate_photo_reference("dock.jpg").is_ok());
        assert!(validate_photo_reference("  ").is_ok());
        assert!(validate_photo_reference("/etc/passwd").is_err());
        assert!(validate_photo_reference("uploads/../../secrets").is_err());
        assert!(validate_photo_reference("C:\\photos\\dock.jpg").is_err());
    }

    #[test]
    fn test_parse_stage_key() {
        assert_eq!(parse_stage_key("quality"), Ok(StageKey::Quality));
        assert!(parse_stage_key("QUALITY").is_err());
        assert!(parse_stage_key("").is_err());
    }

    #[test]
    fn test_clean_measurements() {
        let rows = vec![
            (" pH ".to_string(), "7.2".to_string()),
            ("   ".to_string(), "ignored".to_string()),
            ("TDS".to_string(), " 300 ".to_string()),
        ];
        let cleaned = clean_measurements(&rows);
        assert_eq!(
            cleaned,
            vec![
                ("pH".to_string(), "7.2".to_string()),
                ("TDS".to_string(), "300".to_string())
            ]
        );
    }
}
