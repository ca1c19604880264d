//! Workflow controller for stage submissions
//!
//! A submission saves the stage's form data and notes, runs the stage gate,
//! persists the new status together with the order's aggregate status, and
//! finally hands a `StageCommitted` event to the document service.

use chrono::Utc;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::external::DocumentRenderer;
use crate::services::catalog::CatalogService;
use crate::services::documents::DocumentService;
use crate::services::orders::{fetch_order, load_stages, OrderService};
use crate::services::stage_data;
use shared::{
    aggregate_status, plan_transition, FulfillmentStatus, GateContext, GeneratedDocument, Order,
    StageInstance, StageKey, StageStatus, StageUpdateRequest,
};

/// Emitted once a stage save has been committed
#[derive(Debug, Clone)]
pub struct StageCommitted {
    pub order_id: Uuid,
    pub stage_instance_id: Uuid,
    pub stage_key: StageKey,
    pub status: StageStatus,
    pub actor: Uuid,
}

/// Result of a stage submission
#[derive(Debug, Serialize)]
pub struct StageUpdateResponse {
    pub stage: StageInstance,
    pub order_status: FulfillmentStatus,
    pub documents: Vec<GeneratedDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_warning: Option<String>,
}

/// Workflow service driving stage transitions
#[derive(Clone)]
pub struct WorkflowService {
    db: PgPool,
    documents: DocumentService,
}

impl WorkflowService {
    /// Create a new WorkflowService instance
    pub fn new(db: PgPool, renderer: Arc<dyn DocumentRenderer>) -> Self {
        Self {
            documents: DocumentService::new(db.clone(), renderer),
            db,
        }
    }

    /// Save a stage submission and advance the stage if the gate allows it
    pub async fn submit_stage_update(
        &self,
        order_id: Uuid,
        stage_key: StageKey,
        request: StageUpdateRequest,
        actor: Uuid,
    ) -> AppResult<StageUpdateResponse> {
        let step = request
            .validate_for(stage_key)
            .map_err(|message| AppError::ValidationError(message.to_string()))?;
        if let Some(payload) = &request.payload {
            payload.validate_fields()?;
        }

        let orders = OrderService::new(self.db.clone());
        let order = orders.get_order(order_id).await?;
        orders.ensure_seeded(&order).await?;

        // Form data and notes are kept even when the gate rejects the status change
        let mut tx = self.db.begin().await?;
        if let Some(payload) = &request.payload {
            stage_data::capture(&mut tx, order_id, payload).await?;
        }
        if let Some(notes) = &request.notes {
            sqlx::query(
                r#"
                UPDATE stage_instances
                SET notes = $3, updated_at = NOW()
                WHERE order_id = $1 AND stage_key = $2
                "#,
            )
            .bind(order_id)
            .bind(stage_key.as_str())
            .bind(notes)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;

        // The order lock serialises stage saves, so the plan is made from rows
        // read under it
        let mut tx = self.db.begin().await?;
        fetch_order(&mut tx, order_id, true).await?;

        let stages = load_stages(&mut tx, order_id).await?;
        let current = stages
            .iter()
            .find(|s| s.stage_key == stage_key)
            .cloned()
            .ok_or_else(|| AppError::NotFound("Stage".to_string()))?;

        let ctx = if step.is_gated() {
            self.gate_context(&mut tx, &order, &stages, stage_key).await?
        } else {
            GateContext::default()
        };

        let transition = plan_transition(&current, step, &ctx, Utc::now()).map_err(|rejection| {
            tracing::warn!(
                order_id = %order_id,
                stage = %stage_key.as_str(),
                target = %rejection.target.as_str(),
                reasons = rejection.reasons.len(),
                "Stage gate rejected transition"
            );
            AppError::from(rejection)
        })?;

        sqlx::query(
            r#"
            UPDATE stage_instances
            SET status = $2, started_at = $3, completed_at = $4, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(current.id)
        .bind(transition.status.as_str())
        .bind(transition.timestamps.started_at)
        .bind(transition.timestamps.completed_at)
        .execute(&mut *tx)
        .await?;

        let fresh = load_stages(&mut tx, order_id).await?;
        let statuses: Vec<StageStatus> = fresh.iter().map(|s| s.status).collect();
        let order_status = aggregate_status(&statuses);

        sqlx::query("UPDATE orders SET fulfillment_status = $2, updated_at = NOW() WHERE id = $1")
            .bind(order_id)
            .bind(order_status.as_str())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let stage = fresh
            .into_iter()
            .find(|s| s.id == current.id)
            .ok_or_else(|| AppError::NotFound("Stage".to_string()))?;

        tracing::info!(
            order_id = %order_id,
            stage = %stage_key.as_str(),
            status = %stage.status.as_str(),
            order_status = %order_status.as_str(),
            step = ?step,
            "Stage saved"
        );

        let event = StageCommitted {
            order_id,
            stage_instance_id: stage.id,
            stage_key,
            status: stage.status,
            actor,
        };
        let outcome = self.documents.handle_stage_committed(&event).await;

        Ok(StageUpdateResponse {
            stage,
            order_status,
            documents: outcome.documents,
            document_warning: outcome.warning,
        })
    }

    /// Collect what the gate needs to judge a move of `stage_key`.
    ///
    /// Stock levels are read outside `conn` and are point-in-time.
    async fn gate_context(
        &self,
        conn: &mut PgConnection,
        order: &Order,
        stages: &[StageInstance],
        stage_key: StageKey,
    ) -> AppResult<GateContext> {
        let mut ctx = GateContext {
            stage_statuses: stages.iter().map(|s| (s.stage_key, s.status)).collect(),
            ..GateContext::default()
        };

        match stage_key {
            StageKey::Sourcing => {
                let components = stage_data::load_components(conn, order.id).await?;
                ctx.availability = CatalogService::new(self.db.clone())
                    .component_availability(&components, order.location_id)
                    .await?;
                ctx.components = components;
            }
            StageKey::Receipt => {
                ctx.components = stage_data::load_components(conn, order.id).await?;
            }
            StageKey::Quality => {
                ctx.quality_items = stage_data::load_quality_items(conn, order.id).await?;
            }
            StageKey::Preparation
            | StageKey::Packaging
            | StageKey::Dispatch
            | StageKey::Delivering => {}
        }

        Ok(ctx)
    }
}
