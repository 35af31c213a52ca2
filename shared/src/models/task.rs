//! IPM task models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;

/// A single scheduled chemical application
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: Uuid,
    pub org_id: Uuid,
    pub scheduled_date: NaiveDate,
    /// Offset in weeks from the program start (or application index for spot treatments)
    pub week_number: i32,
    /// ISO-8601 week of `scheduled_date`
    pub calendar_week: u32,
    pub product_id: Uuid,
    pub product_name: String,
    pub rate: Option<Decimal>,
    pub rate_unit: Option<String>,
    pub method: Option<String>,
    pub is_tank_mix: bool,
    pub tank_mix_group_id: Option<Uuid>,
    pub target: TaskTarget,
    pub origin: TaskOrigin,
    /// Display name of the target location, when joined
    pub location_name: Option<String>,
    /// Display number of the target batch, when joined
    pub batch_number: Option<String>,
    pub status: TaskStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<Uuid>,
    pub skip_reason: Option<String>,
    #[serde(flatten)]
    pub compliance: ComplianceData,
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn batch_id(&self) -> Option<Uuid> {
        self.target.batch_id()
    }

    pub fn location_id(&self) -> Option<Uuid> {
        self.target.location_id()
    }
}

/// What a task treats: a batch (optionally placed at a location) or a bare location
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskTarget {
    Batch {
        batch_id: Uuid,
        location_id: Option<Uuid>,
    },
    Location {
        location_id: Uuid,
    },
}

impl TaskTarget {
    /// Build a target from nullable columns. A batch id always wins.
    pub fn from_parts(batch_id: Option<Uuid>, location_id: Option<Uuid>) -> Option<Self> {
        match (batch_id, location_id) {
            (Some(batch_id), location_id) => Some(TaskTarget::Batch {
                batch_id,
                location_id,
            }),
            (None, Some(location_id)) => Some(TaskTarget::Location { location_id }),
            (None, None) => None,
        }
    }

    pub fn batch_id(&self) -> Option<Uuid> {
        match self {
            TaskTarget::Batch { batch_id, .. } => Some(*batch_id),
            TaskTarget::Location { .. } => None,
        }
    }

    pub fn location_id(&self) -> Option<Uuid> {
        match self {
            TaskTarget::Batch { location_id, .. } => *location_id,
            TaskTarget::Location { location_id } => Some(*location_id),
        }
    }
}

/// Where a task came from. Program and spot-treatment origins are mutually exclusive.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskOrigin {
    Program {
        program_id: Uuid,
        program_step_id: Uuid,
    },
    SpotTreatment {
        spot_treatment_id: Uuid,
    },
}

impl TaskOrigin {
    pub fn from_parts(
        program_id: Option<Uuid>,
        program_step_id: Option<Uuid>,
        spot_treatment_id: Option<Uuid>,
    ) -> Option<Self> {
        match (program_id, program_step_id, spot_treatment_id) {
            (Some(program_id), Some(program_step_id), None) => Some(TaskOrigin::Program {
                program_id,
                program_step_id,
            }),
            (None, None, Some(spot_treatment_id)) => {
                Some(TaskOrigin::SpotTreatment { spot_treatment_id })
            }
            _ => None,
        }
    }

    pub fn program_id(&self) -> Option<Uuid> {
        match self {
            TaskOrigin::Program { program_id, .. } => Some(*program_id),
            TaskOrigin::SpotTreatment { .. } => None,
        }
    }

    pub fn program_step_id(&self) -> Option<Uuid> {
        match self {
            TaskOrigin::Program {
                program_step_id, ..
            } => Some(*program_step_id),
            TaskOrigin::SpotTreatment { .. } => None,
        }
    }

    pub fn spot_treatment_id(&self) -> Option<Uuid> {
        match self {
            TaskOrigin::SpotTreatment { spot_treatment_id } => Some(*spot_treatment_id),
            TaskOrigin::Program { .. } => None,
        }
    }
}

/// Task lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
    Skipped,
    Overdue,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
            TaskStatus::Skipped => "skipped",
            TaskStatus::Overdue => "overdue",
        }
    }

    /// Completed and skipped tasks never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Skipped)
    }

    /// Allowed moves: pending -> any other state, overdue -> completed/skipped
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        match (self, next) {
            (TaskStatus::Pending, TaskStatus::Pending) => false,
            (TaskStatus::Pending, _) => true,
            (TaskStatus::Overdue, TaskStatus::Completed | TaskStatus::Skipped) => true,
            _ => false,
        }
    }
}

impl FromStr for TaskStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TaskStatus::Pending),
            "completed" => Ok(TaskStatus::Completed),
            "skipped" => Ok(TaskStatus::Skipped),
            "overdue" => Ok(TaskStatus::Overdue),
            other => Err(UnknownVariant::new("task status", other)),
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compliance record captured when a task is completed.
///
/// The same bundle is copied onto the plant health log so the spray record
/// survives independently of the task row.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ComplianceData {
    pub bottle_id: Option<Uuid>,
    pub quantity_used_ml: Option<Decimal>,
    pub notes: Option<String>,
    pub crop_name: Option<String>,
    pub reason_for_use: Option<String>,
    pub weather_conditions: Option<String>,
    pub harvest_interval_days: Option<i32>,
    pub safe_harvest_date: Option<NaiveDate>,
    pub area_treated: Option<String>,
    pub sprayer_used: Option<String>,
    pub signed_by: Option<String>,
}

impl ComplianceData {
    /// Fill in the safe-harvest date from the harvest interval when it was not given
    pub fn with_safe_harvest_date(mut self, applied_on: NaiveDate) -> Self {
        if self.safe_harvest_date.is_none() {
            if let Some(days) = self.harvest_interval_days.filter(|d| *d >= 0) {
                self.safe_harvest_date =
                    applied_on.checked_add_days(chrono::Days::new(days as u64));
            }
        }
        self
    }

    /// Stock usage to record, if both the bottle and a positive quantity were given
    pub fn stock_usage(&self) -> Option<(Uuid, Decimal)> {
        match (self.bottle_id, self.quantity_used_ml) {
            (Some(bottle_id), Some(qty)) if qty > Decimal::ZERO => Some((bottle_id, qty)),
            _ => None,
        }
    }
}

/// A task ready to be inserted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTask {
    pub org_id: Uuid,
    pub scheduled_date: NaiveDate,
    pub week_number: i32,
    pub calendar_week: u32,
    pub product_id: Uuid,
    pub product_name: String,
    pub rate: Option<Decimal>,
    pub rate_unit: Option<String>,
    pub method: Option<String>,
    pub is_tank_mix: bool,
    pub tank_mix_group_id: Option<Uuid>,
    pub target: TaskTarget,
    pub origin: TaskOrigin,
}

/// Filters for task listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub from_date: Option<NaiveDate>,
    pub to_date: Option<NaiveDate>,
    pub batch_id: Option<Uuid>,
    pub location_id: Option<Uuid>,
    pub product_id: Option<Uuid>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        self.status.map_or(true, |s| task.status == s)
            && self.from_date.map_or(true, |d| task.scheduled_date >= d)
            && self.to_date.map_or(true, |d| task.scheduled_date <= d)
            && self.batch_id.map_or(true, |id| task.batch_id() == Some(id))
            && self.location_id.map_or(true, |id| task.location_id() == Some(id))
            && self.product_id.map_or(true, |id| task.product_id == id)
    }
}
