//! Task generation tests
//!
//! Covers per-batch generation, spot treatment expansion and the bulk
//! generator against the in-memory store.

mod common;

use std::collections::HashMap;

use proptest::prelude::*;
use uuid::Uuid;

use common::{batch, config, ctx, date, program, spot_treatment, store};
use ipm_server::error::AppError;
use ipm_server::services::task_generation::BulkGenerateInput;
use ipm_server::services::TaskGenerationService;
use shared::{TaskOrigin, TaskStatus};

// ============================================================================
// Per-batch generation
// ============================================================================

#[tokio::test]
async fn test_bedding_batch_gets_one_tank_mix() {
    let store = store();
    let ctx = ctx();
    let b = batch(ctx.org_id, Some("Bedding"), Some(date(2024, 1, 1)));
    store.add_batch(b.clone()).await;
    store
        .add_assignment(ctx.org_id, program("Bedding", &[("p1", 1), ("p2", 1)]))
        .await;

    let service = TaskGenerationService::new(store.clone(), &config());
    let result = service
        .generate_for_batch(&ctx, b.id, date(2024, 1, 1))
        .await
        .unwrap();

    assert_eq!(result.tasks_created, 2);
    let tasks = store.tasks().await;
    assert_eq!(tasks.len(), 2);
    let group_id = tasks[0].tank_mix_group_id;
    assert!(group_id.is_some());
    for task in &tasks {
        assert_eq!(task.scheduled_date, date(2024, 1, 8));
        assert_eq!(task.calendar_week, 2);
        assert!(task.is_tank_mix);
        assert_eq!(task.tank_mix_group_id, group_id);
        assert_eq!(task.batch_id(), Some(b.id));
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(matches!(task.origin, TaskOrigin::Program { .. }));
    }
}

#[tokio::test]
async fn test_single_step_weeks_are_not_tank_mixes() {
    let store = store();
    let ctx = ctx();
    let b = batch(ctx.org_id, Some("Bedding"), None);
    store.add_batch(b.clone()).await;
    store
        .add_assignment(
            ctx.org_id,
            program("Bedding", &[("p1", 0), ("p2", 2), ("p3", 2)]),
        )
        .await;

    let service = TaskGenerationService::new(store.clone(), &config());
    let result = service
        .generate_for_batch(&ctx, b.id, date(2024, 3, 4))
        .await
        .unwrap();
    assert_eq!(result.tasks_created, 3);

    let tasks = store.tasks().await;
    let week0: Vec<_> = tasks.iter().filter(|t| t.week_number == 0).collect();
    assert_eq!(week0.len(), 1);
    assert!(!week0[0].is_tank_mix);
    assert!(week0[0].tank_mix_group_id.is_none());
    assert_eq!(week0[0].scheduled_date, date(2024, 3, 4));

    let week2: Vec<_> = tasks.iter().filter(|t| t.week_number == 2).collect();
    assert_eq!(week2.len(), 2);
    assert!(week2.iter().all(|t| t.is_tank_mix));
    assert_eq!(week2[0].tank_mix_group_id, week2[1].tank_mix_group_id);
    assert_eq!(week2[0].scheduled_date, date(2024, 3, 18));
}

#[tokio::test]
async fn test_batch_without_assignments_creates_nothing() {
    let store = store();
    let ctx = ctx();
    let b = batch(ctx.org_id, Some("Perennials"), None);
    store.add_batch(b.clone()).await;
    store
        .add_assignment(ctx.org_id, program("Bedding", &[("p1", 1)]))
        .await;

    let service = TaskGenerationService::new(store.clone(), &config());
    let result = service
        .generate_for_batch(&ctx, b.id, date(2024, 1, 1))
        .await
        .unwrap();

    assert_eq!(result.tasks_created, 0);
    assert!(store.tasks().await.is_empty());
}

#[tokio::test]
async fn test_batch_without_family_creates_nothing() {
    let store = store();
    let ctx = ctx();
    let b = batch(ctx.org_id, None, None);
    store.add_batch(b.clone()).await;

    let service = TaskGenerationService::new(store.clone(), &config());
    let result = service
        .generate_for_batch(&ctx, b.id, date(2024, 1, 1))
        .await
        .unwrap();

    assert_eq!(result.tasks_created, 0);
    // Only the batch lookup reached the store
    assert_eq!(store.calls(), 1);
}

#[tokio::test]
async fn test_unknown_or_foreign_batch_is_not_found() {
    let store = store();
    let ctx = ctx();
    let foreign = batch(Uuid::new_v4(), Some("Bedding"), None);
    store.add_batch(foreign.clone()).await;

    let service = TaskGenerationService::new(store.clone(), &config());
    let missing = service
        .generate_for_batch(&ctx, Uuid::new_v4(), date(2024, 1, 1))
        .await;
    assert!(matches!(missing, Err(AppError::NotFound(_))));

    let other_org = service
        .generate_for_batch(&ctx, foreign.id, date(2024, 1, 1))
        .await;
    assert!(matches!(other_org, Err(AppError::NotFound(_))));
}

// ============================================================================
// Spot treatments
// ============================================================================

#[tokio::test]
async fn test_spot_treatment_weekly_applications() {
    let store = store();
    let ctx = ctx();
    let treatment = spot_treatment(ctx.org_id, date(2024, 1, 15), 3, Some(7));
    store.add_spot_treatment(treatment.clone()).await;

    let service = TaskGenerationService::new(store.clone(), &config());
    let result = service
        .generate_for_spot_treatment(&ctx, treatment.id)
        .await
        .unwrap();
    assert_eq!(result.tasks_created, 3);

    let tasks = store.tasks().await;
    let dates: Vec<_> = tasks.iter().map(|t| t.scheduled_date).collect();
    assert_eq!(
        dates,
        vec![date(2024, 1, 15), date(2024, 1, 22), date(2024, 1, 29)]
    );
    let weeks: Vec<_> = tasks.iter().map(|t| t.week_number).collect();
    assert_eq!(weeks, vec![0, 1, 2]);
    for task in &tasks {
        assert!(!task.is_tank_mix);
        assert!(task.tank_mix_group_id.is_none());
        assert_eq!(
            task.origin,
            TaskOrigin::SpotTreatment {
                spot_treatment_id: treatment.id
            }
        );
    }
}

#[tokio::test]
async fn test_spot_treatment_uses_configured_default_interval() {
    let store = store();
    let ctx = ctx();
    let treatment = spot_treatment(ctx.org_id, date(2024, 5, 1), 2, None);
    store.add_spot_treatment(treatment.clone()).await;

    let mut cfg = config();
    cfg.default_application_interval_days = 10;
    let service = TaskGenerationService::new(store.clone(), &cfg);
    service
        .generate_for_spot_treatment(&ctx, treatment.id)
        .await
        .unwrap();

    let dates: Vec<_> = store
        .tasks()
        .await
        .iter()
        .map(|t| t.scheduled_date)
        .collect();
    assert_eq!(dates, vec![date(2024, 5, 1), date(2024, 5, 11)]);
}

#[tokio::test]
async fn test_spot_treatment_without_target_is_rejected() {
    let store = store();
    let ctx = ctx();
    let mut treatment = spot_treatment(ctx.org_id, date(2024, 1, 15), 3, Some(7));
    treatment.batch_id = None;
    treatment.location_id = None;
    store.add_spot_treatment(treatment.clone()).await;

    let service = TaskGenerationService::new(store.clone(), &config());
    let result = service.generate_for_spot_treatment(&ctx, treatment.id).await;
    assert!(matches!(result, Err(AppError::Validation { .. })));
    assert!(store.tasks().await.is_empty());
}

#[tokio::test]
async fn test_unknown_spot_treatment_is_not_found() {
    let store = store();
    let service = TaskGenerationService::new(store.clone(), &config());
    let result = service
        .generate_for_spot_treatment(&ctx(), Uuid::new_v4())
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

// ============================================================================
// Bulk generation
// ============================================================================

#[tokio::test]
async fn test_bulk_skips_dates_before_today() {
    let store = store();
    let ctx = ctx();
    let b = batch(ctx.org_id, Some("Bedding"), Some(date(2024, 1, 1)));
    store.add_batch(b.clone()).await;
    store
        .add_assignment(
            ctx.org_id,
            program("Bedding", &[("p1", 0), ("p2", 2), ("p3", 4)]),
        )
        .await;

    let service = TaskGenerationService::new(store.clone(), &config());
    let result = service
        .bulk_generate_as_of(&ctx, BulkGenerateInput::default(), date(2024, 1, 15))
        .await
        .unwrap();

    assert_eq!(result.batches_processed, 1);
    assert_eq!(result.tasks_created, 2);
    assert!(result.failures.is_empty());
    let dates: Vec<_> = store
        .tasks()
        .await
        .iter()
        .map(|t| t.scheduled_date)
        .collect();
    assert_eq!(dates, vec![date(2024, 1, 15), date(2024, 1, 29)]);
}

#[tokio::test]
async fn test_bulk_lists_failures_and_keeps_going() {
    let store = store();
    let ctx = ctx();
    let good = batch(ctx.org_id, Some("Bedding"), Some(date(2024, 2, 5)));
    let bad = batch(ctx.org_id, Some("Bedding"), Some(date(2024, 2, 5)));
    store.add_batch(good.clone()).await;
    store.add_batch(bad.clone()).await;
    store.fail_inserts_for_batch(bad.id).await;
    store
        .add_assignment(ctx.org_id, program("Bedding", &[("p1", 1)]))
        .await;

    let service = TaskGenerationService::new(store.clone(), &config());
    let result = service
        .bulk_generate_as_of(&ctx, BulkGenerateInput::default(), date(2024, 2, 1))
        .await
        .unwrap();

    assert_eq!(result.batches_processed, 1);
    assert_eq!(result.tasks_created, 1);
    assert_eq!(result.failures.len(), 1);
    assert_eq!(result.failures[0].batch_id, bad.id);
    assert!(store
        .tasks()
        .await
        .iter()
        .all(|t| t.batch_id() == Some(good.id)));
}

#[tokio::test]
async fn test_bulk_ignores_inactive_unplanted_and_unassigned_batches() {
    let store = store();
    let ctx = ctx();
    let planted = batch(ctx.org_id, Some("Bedding"), Some(date(2024, 2, 5)));
    let unplanted = batch(ctx.org_id, Some("Bedding"), None);
    let unassigned = batch(ctx.org_id, Some("Shrubs"), Some(date(2024, 2, 5)));
    let mut shipped = batch(ctx.org_id, Some("Bedding"), Some(date(2024, 2, 5)));
    shipped.status = "Shipped".to_string();
    for b in [&planted, &unplanted, &unassigned, &shipped] {
        store.add_batch(b.clone()).await;
    }
    store
        .add_assignment(ctx.org_id, program("Bedding", &[("p1", 1)]))
        .await;

    let service = TaskGenerationService::new(store.clone(), &config());
    let result = service
        .bulk_generate_as_of(&ctx, BulkGenerateInput::default(), date(2024, 2, 1))
        .await
        .unwrap();

    assert_eq!(result.batches_processed, 1);
    assert_eq!(result.tasks_created, 1);
    assert_eq!(store.tasks().await[0].batch_id(), Some(planted.id));
}

#[tokio::test]
async fn test_bulk_family_filter_and_clear_existing() {
    let store = store();
    let ctx = ctx();
    let bedding = batch(ctx.org_id, Some("Bedding"), Some(date(2024, 2, 5)));
    let shrubs = batch(ctx.org_id, Some("Shrubs"), Some(date(2024, 2, 5)));
    store.add_batch(bedding.clone()).await;
    store.add_batch(shrubs.clone()).await;
    store
        .add_assignment(ctx.org_id, program("Bedding", &[("p1", 1)]))
        .await;
    store
        .add_assignment(ctx.org_id, program("Shrubs", &[("s1", 1)]))
        .await;

    let service = TaskGenerationService::new(store.clone(), &config());
    service
        .bulk_generate_as_of(&ctx, BulkGenerateInput::default(), date(2024, 2, 1))
        .await
        .unwrap();
    assert_eq!(store.tasks().await.len(), 2);

    let result = service
        .bulk_generate_as_of(
            &ctx,
            BulkGenerateInput {
                clear_existing: true,
                family_filter: Some("Shrubs".to_string()),
            },
            date(2024, 2, 1),
        )
        .await
        .unwrap();

    assert_eq!(result.batches_processed, 1);
    let tasks = store.tasks().await;
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].batch_id(), Some(shrubs.id));
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Tasks share a tank-mix group exactly when they fall in the same week
    #[test]
    fn prop_tank_mix_groups_follow_weeks(weeks in proptest::collection::vec(0i32..12, 1..10)) {
        let steps: Vec<(String, i32)> = weeks
            .iter()
            .enumerate()
            .map(|(i, w)| (format!("product-{}", i), *w))
            .collect();

        let tasks = tokio_test::block_on(async {
            let store = store();
            let ctx = ctx();
            let b = batch(ctx.org_id, Some("Bedding"), None);
            store.add_batch(b.clone()).await;
            let named: Vec<(&str, i32)> = steps.iter().map(|(n, w)| (n.as_str(), *w)).collect();
            store.add_assignment(ctx.org_id, program("Bedding", &named)).await;
            TaskGenerationService::new(store.clone(), &config())
                .generate_for_batch(&ctx, b.id, date(2024, 1, 1))
                .await
                .unwrap();
            store.tasks().await
        });

        prop_assert_eq!(tasks.len(), weeks.len());

        let mut per_week: HashMap<i32, usize> = HashMap::new();
        for w in &weeks {
            *per_week.entry(*w).or_default() += 1;
        }

        let mut group_week: HashMap<Uuid, i32> = HashMap::new();
        for task in &tasks {
            prop_assert_eq!(task.is_tank_mix, task.tank_mix_group_id.is_some());
            prop_assert_eq!(task.is_tank_mix, per_week[&task.week_number] > 1);
            if let Some(group) = task.tank_mix_group_id {
                let week = *group_week.entry(group).or_insert(task.week_number);
                prop_assert_eq!(week, task.week_number);
            }
        }
        let tank_mix_weeks = per_week.values().filter(|n| **n > 1).count();
        prop_assert_eq!(group_week.len(), tank_mix_weeks);
    }
}
