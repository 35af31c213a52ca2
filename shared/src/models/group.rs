//! Applicator-facing task groups (derived, never persisted)

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Task;

/// Tasks an applicator handles together: one tank mix, or one product in one week
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskGroup {
    /// Display key: tank-mix group id, or `product-week-method`
    pub id: String,
    /// Week-independent key used to match an applicator job to this group
    pub group_key: String,
    pub product_id: Uuid,
    pub product_name: String,
    pub rate: Option<Decimal>,
    pub rate_unit: Option<String>,
    pub method: Option<String>,
    pub calendar_week: u32,
    pub week_start_date: NaiveDate,
    pub is_tank_mix: bool,
    pub tank_mix_group_id: Option<Uuid>,
    /// Distinct product names in the mix, first-seen order
    pub tank_mix_products: Vec<String>,
    pub locations: Vec<GroupLocation>,
    /// Number of member tasks
    pub total_batches: usize,
    pub tasks: Vec<Task>,
}

/// A location touched by a group and how many member tasks fall on it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupLocation {
    pub location_id: Uuid,
    pub location_name: Option<String>,
    pub batch_count: usize,
}
