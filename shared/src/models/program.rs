//! IPM programs, assignments, spot treatments and the batches they target

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Batch statuses that take a batch out of IPM scheduling
pub const INACTIVE_BATCH_STATUSES: [&str; 2] = ["Archived", "Shipped"];

/// A crop batch as seen by the task generator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Batch {
    pub id: Uuid,
    pub org_id: Uuid,
    pub batch_number: String,
    pub plant_family: Option<String>,
    pub planted_at: Option<NaiveDate>,
    pub status: String,
    pub location_id: Option<Uuid>,
}

impl Batch {
    pub fn is_active(&self) -> bool {
        !INACTIVE_BATCH_STATUSES.contains(&self.status.as_str())
    }
}

/// One dated action inside an IPM program
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgramStep {
    pub id: Uuid,
    pub program_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub rate: Option<Decimal>,
    pub rate_unit: Option<String>,
    pub method: Option<String>,
    pub week_number: i32,
    pub sort_order: i32,
    pub notes: Option<String>,
}

/// An active program assignment together with the program's steps
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssignedProgram {
    pub assignment_id: Uuid,
    pub program_id: Uuid,
    pub program_name: String,
    pub target_family: String,
    pub steps: Vec<ProgramStep>,
}

/// An ad hoc, single-product treatment series
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpotTreatment {
    pub id: Uuid,
    pub org_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub rate: Option<Decimal>,
    pub rate_unit: Option<String>,
    pub method: Option<String>,
    pub batch_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub first_application_date: NaiveDate,
    pub applications_total: i32,
    /// Days between applications; `None` falls back to the configured default
    pub application_interval_days: Option<i32>,
    pub reason: Option<String>,
}
