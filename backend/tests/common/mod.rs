//! Fixtures shared by the backend integration tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use ipm_server::config::IpmConfig;
use ipm_server::services::OrgContext;
use ipm_server::store::MemoryStore;
use shared::week::iso_week;
use shared::{
    AssignedProgram, Batch, Bottle, BottleStatus, ProgramStep, SpotTreatment, Task, TaskOrigin,
    TaskStatus, TaskTarget,
};

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn ctx() -> OrgContext {
    OrgContext {
        actor_id: Uuid::new_v4(),
        org_id: Uuid::new_v4(),
    }
}

pub fn config() -> IpmConfig {
    IpmConfig::default()
}

pub fn store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

pub fn batch(org_id: Uuid, family: Option<&str>, planted_at: Option<NaiveDate>) -> Batch {
    Batch {
        id: Uuid::new_v4(),
        org_id,
        batch_number: format!("B-{}", &Uuid::new_v4().simple().to_string()[..6]),
        plant_family: family.map(str::to_string),
        planted_at,
        status: "Growing".to_string(),
        location_id: Some(Uuid::new_v4()),
    }
}

pub fn step(program_id: Uuid, product_name: &str, week_number: i32, sort_order: i32) -> ProgramStep {
    ProgramStep {
        id: Uuid::new_v4(),
        program_id,
        product_id: Uuid::new_v4(),
        product_name: product_name.to_string(),
        rate: Some(Decimal::new(25, 1)),
        rate_unit: Some("ml/L".to_string()),
        method: Some("spray".to_string()),
        week_number,
        sort_order,
        notes: None,
    }
}

/// An assigned program whose steps are given as (product name, week)
pub fn program(family: &str, steps: &[(&str, i32)]) -> AssignedProgram {
    let program_id = Uuid::new_v4();
    AssignedProgram {
        assignment_id: Uuid::new_v4(),
        program_id,
        program_name: format!("{} program", family),
        target_family: family.to_string(),
        steps: steps
            .iter()
            .enumerate()
            .map(|(i, (name, week))| step(program_id, name, *week, i as i32))
            .collect(),
    }
}

pub fn spot_treatment(
    org_id: Uuid,
    first_application_date: NaiveDate,
    applications_total: i32,
    interval: Option<i32>,
) -> SpotTreatment {
    SpotTreatment {
        id: Uuid::new_v4(),
        org_id,
        product_id: Uuid::new_v4(),
        product_name: "Spinosad".to_string(),
        rate: Some(Decimal::from(1)),
        rate_unit: Some("ml/L".to_string()),
        method: Some("spray".to_string()),
        batch_id: Some(Uuid::new_v4()),
        location_id: None,
        first_application_date,
        applications_total,
        application_interval_days: interval,
        reason: Some("Thrips hotspot".to_string()),
    }
}

/// A pending program task for a batch target
pub fn task(
    org_id: Uuid,
    product_id: Uuid,
    product_name: &str,
    scheduled_date: NaiveDate,
    target: TaskTarget,
) -> Task {
    Task {
        id: Uuid::new_v4(),
        org_id,
        scheduled_date,
        week_number: 0,
        calendar_week: iso_week(scheduled_date),
        product_id,
        product_name: product_name.to_string(),
        rate: Some(Decimal::from(2)),
        rate_unit: Some("ml/L".to_string()),
        method: Some("spray".to_string()),
        is_tank_mix: false,
        tank_mix_group_id: None,
        target,
        origin: TaskOrigin::Program {
            program_id: Uuid::new_v4(),
            program_step_id: Uuid::new_v4(),
        },
        location_name: None,
        batch_number: None,
        status: TaskStatus::Pending,
        completed_at: None,
        completed_by: None,
        skip_reason: None,
        compliance: Default::default(),
        created_at: Utc::now(),
    }
}

pub fn batch_target(location_id: Option<Uuid>) -> TaskTarget {
    TaskTarget::Batch {
        batch_id: Uuid::new_v4(),
        location_id,
    }
}

pub fn bottle(org_id: Uuid, status: BottleStatus, volume: i64, remaining: i64) -> Bottle {
    Bottle {
        id: Uuid::new_v4(),
        org_id,
        product_id: Uuid::new_v4(),
        bottle_code: "INS-0001".to_string(),
        status,
        volume_ml: Decimal::from(volume),
        remaining_ml: Decimal::from(remaining),
        batch_number: Some("LOT-22".to_string()),
        expiry_date: None,
        purchase_date: None,
        opened_at: None,
        disposed_at: None,
        created_at: Utc::now(),
    }
}
