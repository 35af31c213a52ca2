//! Task planning: expands program steps and spot treatments into dated tasks
//!
//! Steps of one program that land in the same week are applied together as
//! a tank mix and share a generated `tank_mix_group_id`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    AssignedProgram, Batch, NewTask, ProgramStep, SpotTreatment, TaskOrigin, TaskTarget,
};
use crate::week::{add_days, add_weeks, iso_week};

/// Interval between spot-treatment applications when none is recorded
pub const DEFAULT_APPLICATION_INTERVAL_DAYS: i32 = 7;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("spot treatment {0} has neither a batch nor a location target")]
    MissingTarget(Uuid),
}

/// Plan all tasks for one batch from the programs assigned to its family.
///
/// Returns nothing for a batch without a plant family. Programs targeting
/// another family are ignored. When `not_before` is set, week groups dated
/// strictly before it are dropped.
pub fn plan_batch_tasks(
    batch: &Batch,
    start: NaiveDate,
    programs: &[AssignedProgram],
    not_before: Option<NaiveDate>,
) -> Vec<NewTask> {
    let Some(family) = batch.plant_family.as_deref() else {
        return Vec::new();
    };

    let target = TaskTarget::Batch {
        batch_id: batch.id,
        location_id: batch.location_id,
    };

    programs
        .iter()
        .filter(|p| p.target_family == family)
        .flat_map(|p| plan_program_tasks(batch.org_id, target, start, &p.steps, not_before))
        .collect()
}

/// Plan the tasks for one program's steps against a single target
pub fn plan_program_tasks(
    org_id: Uuid,
    target: TaskTarget,
    start: NaiveDate,
    steps: &[ProgramStep],
    not_before: Option<NaiveDate>,
) -> Vec<NewTask> {
    let mut tasks = Vec::with_capacity(steps.len());

    for (week_number, mut week_steps) in steps_by_week(steps) {
        let Some(scheduled_date) = add_weeks(start, week_number) else {
            continue;
        };
        if not_before.is_some_and(|cutoff| scheduled_date < cutoff) {
            continue;
        }

        week_steps.sort_by_key(|s| s.sort_order);
        let is_tank_mix = week_steps.len() > 1;
        let tank_mix_group_id = is_tank_mix.then(Uuid::new_v4);
        let calendar_week = iso_week(scheduled_date);

        tasks.extend(week_steps.into_iter().map(|step| NewTask {
            org_id,
            scheduled_date,
            week_number,
            calendar_week,
            product_id: step.product_id,
            product_name: step.product_name.clone(),
            rate: step.rate,
            rate_unit: step.rate_unit.clone(),
            method: step.method.clone(),
            is_tank_mix,
            tank_mix_group_id,
            target,
            origin: TaskOrigin::Program {
                program_id: step.program_id,
                program_step_id: step.id,
            },
        }));
    }

    tasks
}

/// Expand a spot treatment into one task per application
pub fn plan_spot_treatment(
    treatment: &SpotTreatment,
    default_interval_days: i32,
) -> Result<Vec<NewTask>, PlanError> {
    let target = TaskTarget::from_parts(treatment.batch_id, treatment.location_id)
        .ok_or(PlanError::MissingTarget(treatment.id))?;

    let interval = treatment
        .application_interval_days
        .filter(|d| *d > 0)
        .unwrap_or(default_interval_days);

    let tasks = (0..treatment.applications_total.max(0))
        .filter_map(|index| {
            let scheduled_date = add_days(
                treatment.first_application_date,
                index as i64 * interval as i64,
            )?;
            Some(NewTask {
                org_id: treatment.org_id,
                scheduled_date,
                week_number: index,
                calendar_week: iso_week(scheduled_date),
                product_id: treatment.product_id,
                product_name: treatment.product_name.clone(),
                rate: treatment.rate,
                rate_unit: treatment.rate_unit.clone(),
                method: treatment.method.clone(),
                is_tank_mix: false,
                tank_mix_group_id: None,
                target,
                origin: TaskOrigin::SpotTreatment {
                    spot_treatment_id: treatment.id,
                },
            })
        })
        .collect();

    Ok(tasks)
}

fn steps_by_week(steps: &[ProgramStep]) -> BTreeMap<i32, Vec<&ProgramStep>> {
    let mut weeks: BTreeMap<i32, Vec<&ProgramStep>> = BTreeMap::new();
    for step in steps {
        weeks.entry(step.week_number).or_default().push(step);
    }
    weeks
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn step(program_id: Uuid, name: &str, week: i32, order: i32) -> ProgramStep {
        ProgramStep {
            id: Uuid::new_v4(),
            program_id,
            product_id: Uuid::new_v4(),
            product_name: name.to_string(),
            rate: None,
            rate_unit: Some("ml/L".to_string()),
            method: Some("spray".to_string()),
            week_number: week,
            sort_order: order,
            notes: None,
        }
    }

    fn batch(family: Option<&str>) -> Batch {
        Batch {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            batch_number: "B-100".to_string(),
            plant_family: family.map(str::to_string),
            planted_at: Some(date(2024, 1, 1)),
            status: "Growing".to_string(),
            location_id: Some(Uuid::new_v4()),
        }
    }

    fn program(family: &str, steps: Vec<ProgramStep>) -> AssignedProgram {
        AssignedProgram {
            assignment_id: Uuid::new_v4(),
            program_id: steps.first().map(|s| s.program_id).unwrap_or_else(Uuid::new_v4),
            program_name: "Bedding programme".to_string(),
            target_family: family.to_string(),
            steps,
        }
    }

    #[test]
    fn test_same_week_steps_form_tank_mix() {
        let program_id = Uuid::new_v4();
        let b = batch(Some("Bedding"));
        let p = program(
            "Bedding",
            vec![step(program_id, "p1", 1, 0), step(program_id, "p2", 1, 1)],
        );

        let tasks = plan_batch_tasks(&b, date(2024, 1, 1), &[p], None);

        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.scheduled_date == date(2024, 1, 8)));
        assert!(tasks.iter().all(|t| t.is_tank_mix));
        assert!(tasks[0].tank_mix_group_id.is_some());
        assert_eq!(tasks[0].tank_mix_group_id, tasks[1].tank_mix_group_id);
        assert_eq!(tasks[0].calendar_week, 2);
        assert_eq!(tasks[0].target.batch_id(), Some(b.id));
    }

    #[test]
    fn test_single_step_week_is_not_tank_mix() {
        let program_id = Uuid::new_v4();
        let b = batch(Some("Bedding"));
        let p = program(
            "Bedding",
            vec![step(program_id, "p1", 0, 0), step(program_id, "p2", 2, 0)],
        );

        let tasks = plan_batch_tasks(&b, date(2024, 1, 1), &[p], None);

        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| !t.is_tank_mix));
        assert!(tasks.iter().all(|t| t.tank_mix_group_id.is_none()));
        assert_eq!(tasks[0].scheduled_date, date(2024, 1, 1));
        assert_eq!(tasks[1].scheduled_date, date(2024, 1, 15));
    }

    #[test]
    fn test_tank_mix_ids_are_per_week() {
        let program_id = Uuid::new_v4();
        let b = batch(Some("Bedding"));
        let p = program(
            "Bedding",
            vec![
                step(program_id, "a", 1, 0),
                step(program_id, "b", 1, 1),
                step(program_id, "c", 3, 0),
                step(program_id, "d", 3, 1),
            ],
        );

        let tasks = plan_batch_tasks(&b, date(2024, 1, 1), &[p], None);
        assert_eq!(tasks.len(), 4);
        assert_ne!(tasks[0].tank_mix_group_id, tasks[2].tank_mix_group_id);
    }

    #[test]
    fn test_batch_without_family_gets_nothing() {
        let program_id = Uuid::new_v4();
        let b = batch(None);
        let p = program("Bedding", vec![step(program_id, "p1", 1, 0)]);
        assert!(plan_batch_tasks(&b, date(2024, 1, 1), &[p], None).is_empty());
    }

    #[test]
    fn test_other_family_programs_ignored() {
        let program_id = Uuid::new_v4();
        let b = batch(Some("Perennial"));
        let p = program("Bedding", vec![step(program_id, "p1", 1, 0)]);
        assert!(plan_batch_tasks(&b, date(2024, 1, 1), &[p], None).is_empty());
    }

    #[test]
    fn test_not_before_drops_past_weeks() {
        let program_id = Uuid::new_v4();
        let b = batch(Some("Bedding"));
        let p = program(
            "Bedding",
            vec![
                step(program_id, "past", 0, 0),
                step(program_id, "today", 1, 0),
                step(program_id, "future", 2, 0),
            ],
        );

        let tasks = plan_batch_tasks(&b, date(2024, 1, 1), &[p], Some(date(2024, 1, 8)));
        let names: Vec<_> = tasks.iter().map(|t| t.product_name.as_str()).collect();
        assert_eq!(names, vec!["today", "future"]);
    }

    #[test]
    fn test_spot_treatment_expansion() {
        let treatment = SpotTreatment {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Spot".to_string(),
            rate: None,
            rate_unit: None,
            method: None,
            batch_id: Some(Uuid::new_v4()),
            location_id: None,
            first_application_date: date(2024, 1, 15),
            applications_total: 3,
            application_interval_days: Some(7),
            reason: Some("Aphids".to_string()),
        };

        let tasks = plan_spot_treatment(&treatment, DEFAULT_APPLICATION_INTERVAL_DAYS).unwrap();
        let dates: Vec<_> = tasks.iter().map(|t| t.scheduled_date).collect();
        assert_eq!(
            dates,
            vec![date(2024, 1, 15), date(2024, 1, 22), date(2024, 1, 29)]
        );
        let weeks: Vec<_> = tasks.iter().map(|t| t.week_number).collect();
        assert_eq!(weeks, vec![0, 1, 2]);
        assert!(tasks.iter().all(|t| !t.is_tank_mix && t.tank_mix_group_id.is_none()));
        assert!(tasks
            .iter()
            .all(|t| t.origin.spot_treatment_id() == Some(treatment.id)));
    }

    #[test]
    fn test_spot_treatment_defaults_interval() {
        let treatment = SpotTreatment {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Spot".to_string(),
            rate: None,
            rate_unit: None,
            method: None,
            batch_id: None,
            location_id: Some(Uuid::new_v4()),
            first_application_date: date(2024, 1, 1),
            applications_total: 2,
            application_interval_days: None,
            reason: None,
        };

        let tasks = plan_spot_treatment(&treatment, DEFAULT_APPLICATION_INTERVAL_DAYS).unwrap();
        assert_eq!(tasks[1].scheduled_date, date(2024, 1, 8));
        assert!(matches!(tasks[0].target, TaskTarget::Location { .. }));
    }

    #[test]
    fn test_spot_treatment_without_target() {
        let treatment = SpotTreatment {
            id: Uuid::new_v4(),
            org_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            product_name: "Spot".to_string(),
            rate: None,
            rate_unit: None,
            method: None,
            batch_id: None,
            location_id: None,
            first_application_date: date(2024, 1, 1),
            applications_total: 2,
            application_interval_days: None,
            reason: None,
        };

        assert_eq!(
            plan_spot_treatment(&treatment, 7),
            Err(PlanError::MissingTarget(treatment.id))
        );
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Tank-mix flag and group id follow the size of each week group
        #[test]
        fn prop_tank_mix_iff_shared_week(weeks in proptest::collection::vec(0i32..6, 1..12)) {
            let program_id = Uuid::new_v4();
            let steps: Vec<_> = weeks
                .iter()
                .enumerate()
                .map(|(i, w)| step(program_id, &format!("p{}", i), *w, i as i32))
                .collect();
            let b = batch(Some("Bedding"));
            let tasks = plan_batch_tasks(&b, date(2024, 1, 1), &[program("Bedding", steps)], None);

            prop_assert_eq!(tasks.len(), weeks.len());
            for task in &tasks {
                let same_week = weeks.iter().filter(|w| **w == task.week_number).count();
                prop_assert_eq!(task.is_tank_mix, same_week > 1);
                prop_assert_eq!(task.tank_mix_group_id.is_some(), task.is_tank_mix);
                let mates = tasks.iter().filter(|t| t.week_number == task.week_number);
                for mate in mates {
                    prop_assert_eq!(mate.tank_mix_group_id, task.tank_mix_group_id);
                }
            }
        }
    }
}
