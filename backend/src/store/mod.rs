//! Persistence seam for the IPM subsystem
//!
//! Services talk to the relational store only through [`IpmStore`].
//! [`PgStore`] is the production implementation; [`MemoryStore`] backs the
//! test suite and local experiments.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use shared::{
    AssignedProgram, Batch, Bottle, BottleStatus, BottleUpdate, ComplianceData, NewBottle,
    NewMovement, NewTask, SpotTreatment, StockMovement, Task, TaskFilter,
};

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Completion stamp written onto each completed task
#[derive(Debug, Clone)]
pub struct TaskCompletion {
    pub completed_by: Uuid,
    pub completed_at: DateTime<Utc>,
    pub compliance: ComplianceData,
}

/// Skip stamp for a single task
#[derive(Debug, Clone)]
pub struct TaskSkip {
    pub reason: String,
    pub skipped_by: Uuid,
    pub skipped_at: DateTime<Utc>,
}

/// Audit-trail record written to the plant health log for a treated batch
#[derive(Debug, Clone, PartialEq)]
pub struct NewHealthLog {
    pub org_id: Uuid,
    pub batch_id: Uuid,
    pub ipm_task_id: Uuid,
    pub product_name: String,
    pub rate: Option<Decimal>,
    pub rate_unit: Option<String>,
    pub method: Option<String>,
    pub recorded_by: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub compliance: ComplianceData,
}

impl NewHealthLog {
    pub const EVENT_TYPE: &'static str = "ipm_treatment";
}

/// Filters for bottle listings
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct BottleFilter {
    pub product_id: Option<Uuid>,
    pub status: Option<BottleStatus>,
}

impl BottleFilter {
    pub fn matches(&self, bottle: &Bottle) -> bool {
        self.product_id.map_or(true, |id| bottle.product_id == id)
            && self.status.map_or(true, |s| bottle.status == s)
    }
}

#[async_trait]
pub trait IpmStore: Send + Sync {
    /// Connectivity check for health endpoints
    async fn ping(&self) -> AppResult<()>;

    // Reference data

    async fn get_batch(&self, org_id: Uuid, batch_id: Uuid) -> AppResult<Option<Batch>>;

    /// Batches not archived or shipped, optionally of one plant family
    async fn list_active_batches(
        &self,
        org_id: Uuid,
        family: Option<&str>,
    ) -> AppResult<Vec<Batch>>;

    /// Active assignments of active programs, with their steps
    async fn list_active_assignments(
        &self,
        org_id: Uuid,
        family: Option<&str>,
    ) -> AppResult<Vec<AssignedProgram>>;

    async fn get_spot_treatment(
        &self,
        org_id: Uuid,
        spot_treatment_id: Uuid,
    ) -> AppResult<Option<SpotTreatment>>;

    // Tasks

    /// Insert all tasks in one statement; returns the number inserted
    async fn insert_tasks(&self, tasks: &[NewTask]) -> AppResult<usize>;

    async fn delete_pending_tasks(&self, org_id: Uuid) -> AppResult<u64>;

    async fn list_tasks(&self, org_id: Uuid, filter: &TaskFilter) -> AppResult<Vec<Task>>;

    async fn get_tasks(&self, org_id: Uuid, task_ids: &[Uuid]) -> AppResult<Vec<Task>>;

    /// Complete the pending or overdue tasks among `task_ids`
    async fn complete_tasks(
        &self,
        org_id: Uuid,
        task_ids: &[Uuid],
        completion: &TaskCompletion,
    ) -> AppResult<u64>;

    /// Skip one task if it is pending or overdue
    async fn skip_task(&self, org_id: Uuid, task_id: Uuid, skip: &TaskSkip) -> AppResult<u64>;

    /// Flag pending tasks dated before `today` as overdue
    async fn mark_overdue(&self, org_id: Uuid, today: NaiveDate) -> AppResult<u64>;

    async fn insert_health_log(&self, log: &NewHealthLog) -> AppResult<()>;

    /// Close the weekly summary task for a product; fails when none exists
    async fn sync_summary_task(
        &self,
        org_id: Uuid,
        product_id: Uuid,
        calendar_week: u32,
        actor_id: Uuid,
    ) -> AppResult<()>;

    // Stock

    async fn list_bottles(&self, org_id: Uuid, filter: &BottleFilter) -> AppResult<Vec<Bottle>>;

    async fn get_bottle(&self, org_id: Uuid, bottle_id: Uuid) -> AppResult<Option<Bottle>>;

    /// Next label code for a bottle of `product_id`
    async fn generate_bottle_code(&self, org_id: Uuid, product_id: Uuid) -> AppResult<String>;

    async fn insert_bottle(&self, bottle: &NewBottle) -> AppResult<Bottle>;

    async fn update_bottle(
        &self,
        org_id: Uuid,
        bottle_id: Uuid,
        update: &BottleUpdate,
    ) -> AppResult<Bottle>;

    async fn insert_movement(&self, movement: &NewMovement) -> AppResult<StockMovement>;

    /// Ledger of one bottle, oldest first
    async fn list_movements(&self, org_id: Uuid, bottle_id: Uuid)
        -> AppResult<Vec<StockMovement>>;
}
