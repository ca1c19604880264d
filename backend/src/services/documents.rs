//! Document service: renders stage documents after a save and keeps the
//! append-only document log

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::DocumentRenderer;
use crate::services::orders::OrderService;
use crate::services::workflow::StageCommitted;
use shared::{
    render_full_report, render_stage_document, slugify, DocumentFormat, GeneratedDocument,
    RenderMeta, StageKey, StoredFile,
};

/// Document service consuming stage commit events
#[derive(Clone)]
pub struct DocumentService {
    db: PgPool,
    renderer: Arc<dyn DocumentRenderer>,
}

/// Database row for a generated document
#[derive(Debug, sqlx::FromRow)]
struct DocumentRow {
    id: Uuid,
    stage_instance_id: Uuid,
    format: String,
    file_path: String,
    file_name: String,
    generated_by: Uuid,
    generated_at: DateTime<Utc>,
}

impl From<DocumentRow> for GeneratedDocument {
    fn from(row: DocumentRow) -> Self {
        GeneratedDocument {
            id: row.id,
            stage_instance_id: row.stage_instance_id,
            format: DocumentFormat::from_str(&row.format).unwrap_or(DocumentFormat::Pdf),
            file_path: row.file_path,
            file_name: row.file_name,
            generated_by: row.generated_by,
            generated_at: row.generated_at,
        }
    }
}

/// Documents produced for one stage save
#[derive(Debug, Default, Serialize)]
pub struct DocumentOutcome {
    pub documents: Vec<GeneratedDocument>,
    /// Set when some or all documents could not be produced
    pub warning: Option<String>,
}

/// A freshly rendered order report
pub struct ReportFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Document history of an order, newest first
pub async fn list_for_order(db: &PgPool, order_id: Uuid) -> AppResult<Vec<GeneratedDocument>> {
    let rows = sqlx::query_as::<_, DocumentRow>(
        r#"
        SELECT d.id, d.stage_instance_id, d.format, d.file_path, d.file_name,
               d.generated_by, d.generated_at
        FROM generated_documents d
        JOIN stage_instances s ON s.id = d.stage_instance_id
        WHERE s.order_id = $1
        ORDER BY d.generated_at DESC
        "#,
    )
    .bind(order_id)
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().map(GeneratedDocument::from).collect())
}

impl DocumentService {
    /// Create a new DocumentService instance
    pub fn new(db: PgPool, renderer: Arc<dyn DocumentRenderer>) -> Self {
        Self { db, renderer }
    }

    /// Render both formats for a committed stage and log them.
    ///
    /// Never fails: problems are reported through `warning` since the stage
    /// save itself has already been committed.
    pub async fn handle_stage_committed(&self, event: &StageCommitted) -> DocumentOutcome {
        let mut outcome = DocumentOutcome::default();

        let snapshot = match OrderService::new(self.db.clone())
            .load_snapshot(event.order_id)
            .await
        {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    order_id = %event.order_id,
                    stage = %event.stage_key.as_str(),
                    error = %e,
                    "Could not load order for document generation"
                );
                outcome.warning = Some(format!(
                    "Stage saved, but documents were not generated: {}",
                    e
                ));
                return outcome;
            }
        };

        let html = render_stage_document(&snapshot, event.stage_key, Utc::now());
        let meta = RenderMeta {
            order_number: snapshot.order.order_number.clone(),
            stage_key: event.stage_key.as_str().to_string(),
        };

        let mut failures = Vec::new();
        for format in DocumentFormat::ALL {
            match self.generate(event, format, &meta, &html).await {
                Ok(document) => outcome.documents.push(document),
                Err(e) => {
                    tracing::warn!(
                        order_id = %event.order_id,
                        stage = %event.stage_key.as_str(),
                        format = %format.as_str(),
                        error = %e,
                        "Document generation failed"
                    );
                    failures.push(format!("{}: {}", format.as_str(), e));
                }
            }
        }

        tracing::info!(
            order_id = %event.order_id,
            stage = %event.stage_key.as_str(),
            status = %event.status.as_str(),
            documents = outcome.documents.len(),
            "Generated stage documents"
        );

        if !failures.is_empty() {
            outcome.warning = Some(format!(
                "Stage saved, but document generation failed ({})",
                failures.join("; ")
            ));
        }

        outcome
    }

    /// Render one format and append it to the document log
    async fn generate(
        &self,
        event: &StageCommitted,
        format: DocumentFormat,
        meta: &RenderMeta,
        html: &str,
    ) -> AppResult<GeneratedDocument> {
        let stored = match format {
            DocumentFormat::Spreadsheet => self.renderer.render_spreadsheet(meta, html).await?,
            DocumentFormat::Pdf => self.renderer.render_pdf(meta, html).await?,
        };

        match self.record(event, format, &stored).await {
            Ok(document) => Ok(document),
            Err(e) => {
                // Every stored file must have a log row
                let _ = self.renderer.remove_file(&stored.relative_path).await;
                Err(e)
            }
        }
    }

    async fn record(
        &self,
        event: &StageCommitted,
        format: DocumentFormat,
        stored: &StoredFile,
    ) -> AppResult<GeneratedDocument> {
        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            INSERT INTO generated_documents
                (stage_instance_id, format, file_path, file_name, generated_by, generated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, stage_instance_id, format, file_path, file_name,
                      generated_by, generated_at
            "#,
        )
        .bind(event.stage_instance_id)
        .bind(format.as_str())
        .bind(&stored.relative_path)
        .bind(&stored.file_name)
        .bind(event.actor)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        Ok(GeneratedDocument::from(row))
    }

    /// Document history of one stage, newest first
    pub async fn list_for_stage(
        &self,
        order_id: Uuid,
        stage_key: StageKey,
    ) -> AppResult<Vec<GeneratedDocument>> {
        let stage_instance_id = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM stage_instances WHERE order_id = $1 AND stage_key = $2",
        )
        .bind(order_id)
        .bind(stage_key.as_str())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Stage".to_string()))?;

        let rows = sqlx::query_as::<_, DocumentRow>(
            r#"
            SELECT id, stage_instance_id, format, file_path, file_name, generated_by, generated_at
            FROM generated_documents
            WHERE stage_instance_id = $1
            ORDER BY generated_at DESC
            "#,
        )
        .bind(stage_instance_id)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(GeneratedDocument::from).collect())
    }

    /// Render the complete order report as a PDF. Nothing is stored.
    pub async fn render_full_report(&self, order_id: Uuid) -> AppResult<ReportFile> {
        let snapshot = OrderService::new(self.db.clone())
            .load_snapshot(order_id)
            .await?;

        let now = Utc::now();
        let html = render_full_report(&snapshot, now);
        let title = format!("{} Order Report", snapshot.order.order_number);
        let bytes = self.renderer.pdf_bytes(&title, &html).await?;

        tracing::info!(order_id = %order_id, bytes = bytes.len(), "Rendered order report");

        Ok(ReportFile {
            file_name: format!(
                "{}_report_{}.pdf",
                slugify(&snapshot.order.order_number),
                now.format("%Y%m%d_%H%M%S")
            ),
            bytes,
        })
    }
}
