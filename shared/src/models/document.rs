//! Generated document models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Output format of a rendered document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Spreadsheet,
    Pdf,
}

impl DocumentFormat {
    /// Every format produced for a stage save
    pub const ALL: [DocumentFormat; 2] = [DocumentFormat::Spreadsheet, DocumentFormat::Pdf];

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Spreadsheet => "spreadsheet",
            DocumentFormat::Pdf => "pdf",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "spreadsheet" => Some(DocumentFormat::Spreadsheet),
            "pdf" => Some(DocumentFormat::Pdf),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Spreadsheet => "xls",
            DocumentFormat::Pdf => "pdf",
        }
    }
}

/// A rendered document registered against a stage (append-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedDocument {
    pub id: Uuid,
    pub stage_instance_id: Uuid,
    pub format: DocumentFormat,
    /// Path relative to the document store root
    pub file_path: String,
    pub file_name: String,
    pub generated_by: Uuid,
    pub generated_at: DateTime<Utc>,
}

/// What a document is about, used for storage layout and naming
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderMeta {
    pub order_number: String,
    /// Stage key, or a report name such as "full_report"
    pub stage_key: String,
}

/// A file written to the document store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub file_name: String,
    pub relative_path: String,
}
