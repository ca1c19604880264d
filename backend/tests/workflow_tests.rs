//! Workflow engine tests
//!
//! Covers sequential gating, sourcing sufficiency, status aggregation and
//! the stage timestamp lifecycle.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    aggregate_status, plan_transition, validate_transition, ComponentAvailability,
    FulfillmentStatus, GateContext, GateReason, QualityItem, ReviewStatus, StageInstance,
    StageKey, StageStatus, StageStep, StageTimestamps,
};
use uuid::Uuid;

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

fn availability(name: &str, required: i64, available: i64, unit: &str) -> ComponentAvailability {
    ComponentAvailability {
        name: name.to_string(),
        product_id: Some(Uuid::new_v4()),
        required: Decimal::from(required),
        available: Decimal::from(available),
        unit: unit.to_string(),
    }
}

fn status_strategy() -> impl Strategy<Value = StageStatus> {
    prop_oneof![
        Just(StageStatus::Pending),
        Just(StageStatus::InProgress),
        Just(StageStatus::Completed),
    ]
}

// ============================================================================
// Status Aggregation
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Completed iff all seven completed; pending iff none started or completed
    #[test]
    fn aggregation_matches_stage_statuses(
        statuses in proptest::collection::vec(status_strategy(), 7)
    ) {
        let result = aggregate_status(&statuses);

        let all_completed = statuses.iter().all(|s| *s == StageStatus::Completed);
        let none_started = statuses.iter().all(|s| *s == StageStatus::Pending);

        prop_assert_eq!(result == FulfillmentStatus::Completed, all_completed);
        prop_assert_eq!(result == FulfillmentStatus::Pending, none_started);
        if !all_completed && !none_started {
            prop_assert_eq!(result, FulfillmentStatus::InProgress);
        }
    }

    /// A stage may not start or complete while its predecessor is incomplete
    #[test]
    fn sequential_gating(
        index in 1usize..7,
        previous_status in prop_oneof![Just(StageStatus::Pending), Just(StageStatus::InProgress)],
        completing in any::<bool>(),
    ) {
        let key = StageKey::ALL[index];
        let previous = StageKey::ALL[index - 1];
        let target = if completing { StageStatus::Completed } else { StageStatus::InProgress };

        let mut ctx = GateContext::default();
        ctx.stage_statuses.insert(previous, previous_status);

        let rejection = validate_transition(key, target, &ctx).unwrap_err();
        prop_assert_eq!(rejection.reasons.len(), 1);
        let is_predecessor = matches!(
            &rejection.reasons[0],
            GateReason::PredecessorIncomplete { previous: p, .. } if *p == previous
        );
        prop_assert!(is_predecessor);

        // Once the predecessor is completed the stage may start
        ctx.stage_statuses.insert(previous, StageStatus::Completed);
        prop_assert!(validate_transition(key, StageStatus::InProgress, &ctx).is_ok());
    }

    /// Sourcing completes only when every stocked component is covered
    #[test]
    fn sourcing_sufficiency(
        required in 1i64..1000,
        available in 0i64..1000,
    ) {
        let mut ctx = GateContext::default();
        ctx.availability = vec![availability("Sugar", required, available, "kg")];

        let result = validate_transition(StageKey::Sourcing, StageStatus::Completed, &ctx);
        prop_assert_eq!(result.is_ok(), available >= required);
    }
}

#[test]
fn aggregation_of_empty_order_is_pending() {
    assert_eq!(
        aggregate_status(&[StageStatus::Pending; 7]),
        FulfillmentStatus::Pending
    );
    assert_eq!(
        aggregate_status(&[StageStatus::Completed; 7]),
        FulfillmentStatus::Completed
    );
}

// ============================================================================
// Stage Gate
// ============================================================================

mod stage_gate {
    use super::*;

    fn quality_item(section: &str, text: &str, status: ReviewStatus) -> QualityItem {
        QualityItem {
            id: Uuid::new_v4(),
            order_id: Uuid::nil(),
            item_key: text.to_lowercase().replace(' ', "_"),
            section: section.to_string(),
            item_text: text.to_string(),
            status,
            notes: None,
            display_order: 0,
        }
    }

    #[test]
    fn quality_lists_every_unapproved_item() {
        let mut ctx = GateContext::default();
        ctx.stage_statuses
            .insert(StageKey::Preparation, StageStatus::Completed);
        ctx.quality_items = vec![
            quality_item("Appearance", "Colour OK", ReviewStatus::Approved),
            quality_item("Appearance", "Clarity OK", ReviewStatus::Rejected),
            quality_item("Microbiology", "Sample taken", ReviewStatus::Pending),
        ];

        let rejection =
            validate_transition(StageKey::Quality, StageStatus::Completed, &ctx).unwrap_err();
        assert_eq!(rejection.reasons.len(), 2);
        assert!(rejection
            .to_string()
            .contains("Appearance / Clarity OK: Rejected"));
        assert!(rejection
            .to_string()
            .contains("Microbiology / Sample taken: Pending"));

        for item in &mut ctx.quality_items {
            item.status = ReviewStatus::Approved;
        }
        assert!(validate_transition(StageKey::Quality, StageStatus::Completed, &ctx).is_ok());
    }

    #[test]
    fn stages_without_preconditions_only_need_predecessor() {
        for key in [
            StageKey::Preparation,
            StageKey::Packaging,
            StageKey::Dispatch,
            StageKey::Delivering,
        ] {
            let mut ctx = GateContext::default();
            if let Some(previous) = key.previous() {
                ctx.stage_statuses.insert(previous, StageStatus::Completed);
            }
            assert!(validate_transition(key, StageStatus::Completed, &ctx).is_ok());
        }
    }

    #[test]
    fn moving_back_to_pending_is_never_gated() {
        let ctx = GateContext::default();
        for key in StageKey::ALL {
            assert!(validate_transition(key, StageStatus::Pending, &ctx).is_ok());
        }
    }
}

// ============================================================================
// Timestamp Lifecycle
// ============================================================================

mod timestamps {
    use super::*;

    #[test]
    fn start_complete_reopen_reset() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let t1 = t0 + Duration::hours(2);
        let t2 = t1 + Duration::hours(1);
        let t3 = t2 + Duration::hours(1);

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

        // Reopening keeps the original start and clears completion
        let reopened = completed.transition(StageStatus::Completed, StageStatus::InProgress, t2);
        assert_eq!(reopened.started_at, Some(t0));
        assert_eq!(reopened.completed_at, None);

        let reset = reopened.transition(StageStatus::InProgress, StageStatus::Pending, t3);
        assert_eq!(reset, StageTimestamps::default());
    }

    #[test]
    fn completing_directly_sets_both() {
        let now = Utc::now();
        let done = StageTimestamps::default().transition(
            StageStatus::Pending,
            StageStatus::Completed,
            now,
        );
        assert_eq!(done.started_at, Some(now));
        assert_eq!(done.completed_at, Some(now));
    }
}

// ============================================================================
// End-to-end sourcing scenario
// ============================================================================

#[test]
fn sourcing_scenario_rejects_then_accepts() {
    // Formula: A 5 kg, B 2 L, manual C 1 pcs; location holds A=5 kg, B=1 L
    let manual = ComponentAvailability {
        name: "C".to_string(),
        product_id: None,
        required: Decimal::ONE,
        available: Decimal::ZERO,
        unit: "pcs".to_string(),
    };
    let mut ctx = GateContext::default();
    ctx.availability = vec![
        availability("A", 5, 5, "kg"),
        availability("B", 2, 1, "L"),
        manual,
    ];

    let mut stages: Vec<StageInstance> = StageKey::ALL
        .iter()
        .map(|key| stage(*key, StageStatus::Pending))
        .collect();

    let rejection = plan_transition(
        &stages[0],
        StageStep::Update(StageStatus::Completed),
        &ctx,
        Utc::now(),
    )
    .unwrap_err();
    assert_eq!(rejection.reasons.len(), 1);
    assert_eq!(
        rejection.reasons[0],
        GateReason::InsufficientInventory {
            name: "B".to_string(),
            required: Decimal::from(2),
            available: Decimal::ONE,
            unit: "L".to_string(),
        }
    );
    assert!(rejection.to_string().contains("B: need 2 L, have 1 L"));

    // Stock of B topped up to 2 L
    ctx.availability[1].available = Decimal::from(2);

    let transition = plan_transition(
        &stages[0],
        StageStep::Update(StageStatus::Completed),
        &ctx,
        Utc::now(),
    )
    .unwrap();
    assert_eq!(transition.status, StageStatus::Completed);
    assert!(transition.timestamps.completed_at.is_some());

    stages[0].status = transition.status;
    let statuses: Vec<StageStatus> = stages.iter().map(|s| s.status).collect();
    assert_eq!(aggregate_status(&statuses), FulfillmentStatus::InProgress);
}

#[test]
fn regenerate_keeps_status_and_timestamps() {
    let mut current = stage(StageKey::Packaging, StageStatus::Completed);
    current.started_at = Some(Utc::now() - Duration::days(1));
    current.completed_at = Some(Utc::now());

    let transition = plan_transition(
        &current,
        StageStep::Regenerate,
        &GateContext::default(),
        Utc::now(),
    )
    .unwrap();

    assert_eq!(transition.status, StageStatus::Completed);
    assert_eq!(transition.timestamps.started_at, current.started_at);
    assert_eq!(transition.timestamps.completed_at, current.completed_at);
}
