//! In-memory store used by the test suite and local experiments
//!
//! Behaves like [`super::PgStore`] for everything the services rely on:
//! org scoping, status guards on updates, bottle code sequences and summary
//! task lookups. It also counts calls and can be told to fail specific
//! writes so best-effort paths can be exercised.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use shared::{
    AssignedProgram, Batch, Bottle, BottleStatus, BottleUpdate, NewBottle, NewMovement, NewTask,
    SpotTreatment, StockMovement, Task, TaskFilter, TaskStatus,
};

use super::{BottleFilter, IpmStore, NewHealthLog, TaskCompletion, TaskSkip};
use crate::error::{AppError, AppResult};

/// A summary-task sync the store was asked to perform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SummarySync {
    pub org_id: Uuid,
    pub product_id: Uuid,
    pub calendar_week: u32,
}

#[derive(Default)]
struct State {
    locations: HashMap<Uuid, String>,
    batches: HashMap<Uuid, Batch>,
    assignments: Vec<(Uuid, AssignedProgram)>,
    spot_treatments: HashMap<Uuid, SpotTreatment>,
    tasks: Vec<Task>,
    health_logs: Vec<NewHealthLog>,
    summary_tasks: HashSet<SummarySync>,
    summary_syncs: Vec<SummarySync>,
    product_prefixes: HashMap<Uuid, String>,
    code_sequences: HashMap<(Uuid, Uuid), u32>,
    bottles: Vec<Bottle>,
    movements: Vec<StockMovement>,
    failing_batches: HashSet<Uuid>,
    fail_health_logs: bool,
    fail_bottle_codes: bool,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of store operations performed so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    // Seeding

    pub async fn add_location(&self, location_id: Uuid, name: &str) {
        self.state
            .write()
            .await
            .locations
            .insert(location_id, name.to_string());
    }

    pub async fn add_batch(&self, batch: Batch) {
        self.state.write().await.batches.insert(batch.id, batch);
    }

    pub async fn add_assignment(&self, org_id: Uuid, program: AssignedProgram) {
        self.state.write().await.assignments.push((org_id, program));
    }

    pub async fn add_spot_treatment(&self, treatment: SpotTreatment) {
        self.state
            .write()
            .await
            .spot_treatments
            .insert(treatment.id, treatment);
    }

    pub async fn add_task(&self, task: Task) {
        self.state.write().await.tasks.push(task);
    }

    /// Register a weekly summary task so syncs against it succeed
    pub async fn add_summary_task(&self, org_id: Uuid, product_id: Uuid, calendar_week: u32) {
        self.state.write().await.summary_tasks.insert(SummarySync {
            org_id,
            product_id,
            calendar_week,
        });
    }

    pub async fn set_product_prefix(&self, product_id: Uuid, prefix: &str) {
        self.state
            .write()
            .await
            .product_prefixes
            .insert(product_id, prefix.to_string());
    }

    pub async fn add_bottle(&self, bottle: Bottle) {
        self.state.write().await.bottles.push(bottle);
    }
}

/// Failure injection and inspection, compiled for tests only
#[cfg(any(test, feature = "test-support"))]
impl MemoryStore {
    /// Make task inserts touching `batch_id` fail
    pub async fn fail_inserts_for_batch(&self, batch_id: Uuid) {
        self.state.write().await.failing_batches.insert(batch_id);
    }

    pub async fn fail_health_logs(&self) {
        self.state.write().await.fail_health_logs = true;
    }

    pub async fn fail_bottle_codes(&self) {
        self.state.write().await.fail_bottle_codes = true;
    }

    pub async fn tasks(&self) -> Vec<Task> {
        self.state.read().await.tasks.clone()
    }

    pub async fn health_logs(&self) -> Vec<NewHealthLog> {
        self.state.read().await.health_logs.clone()
    }

    pub async fn summary_syncs(&self) -> Vec<SummarySync> {
        self.state.read().await.summary_syncs.clone()
    }

    pub async fn movements(&self) -> Vec<StockMovement> {
        self.state.read().await.movements.clone()
    }

    pub async fn bottles(&self) -> Vec<Bottle> {
        self.state.read().await.bottles.clone()
    }
}

fn materialize(state: &State, new: &NewTask) -> Task {
    let batch = new.target.batch_id().and_then(|id| state.batches.get(&id));
    let location_name = new
        .target
        .location_id()
        .and_then(|id| state.locations.get(&id))
        .cloned();

    Task {
        id: Uuid::new_v4(),
        org_id: new.org_id,
        scheduled_date: new.scheduled_date,
        week_number: new.week_number,
        calendar_week: new.calendar_week,
        product_id: new.product_id,
        product_name: new.product_name.clone(),
        rate: new.rate,
        rate_unit: new.rate_unit.clone(),
        method: new.method.clone(),
        is_tank_mix: new.is_tank_mix,
        tank_mix_group_id: new.tank_mix_group_id,
        target: new.target,
        origin: new.origin,
        location_name,
        batch_number: batch.map(|b| b.batch_number.clone()),
        status: TaskStatus::Pending,
        completed_at: None,
        completed_by: None,
        skip_reason: None,
        compliance: Default::default(),
        created_at: Utc::now(),
    }
}

fn is_open(task: &Task) -> bool {
    matches!(task.status, TaskStatus::Pending | TaskStatus::Overdue)
}

#[async_trait]
impl IpmStore for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        self.touch();
        Ok(())
    }

    async fn get_batch(&self, org_id: Uuid, batch_id: Uuid) -> AppResult<Option<Batch>> {
        self.touch();
        let state = self.state.read().await;
        Ok(state
            .batches
            .get(&batch_id)
            .filter(|b| b.org_id == org_id)
            .cloned())
    }

    async fn list_active_batches(
        &self,
        org_id: Uuid,
        family: Option<&str>,
    ) -> AppResult<Vec<Batch>> {
        self.touch();
        let state = self.state.read().await;
        let mut batches: Vec<Batch> = state
            .batches
            .values()
            .filter(|b| b.org_id == org_id && b.is_active())
            .filter(|b| family.map_or(true, |f| b.plant_family.as_deref() == Some(f)))
            .cloned()
            .collect();
        batches.sort_by(|a, b| a.batch_number.cmp(&b.batch_number));
        Ok(batches)
    }

    async fn list_active_assignments(
        &self,
        org_id: Uuid,
        family: Option<&str>,
    ) -> AppResult<Vec<AssignedProgram>> {
        self.touch();
        let state = self.state.read().await;
        Ok(state
            .assignments
            .iter()
            .filter(|(org, p)| *org == org_id && family.map_or(true, |f| p.target_family == f))
            .map(|(_, p)| p.clone())
            .collect())
    }

    async fn get_spot_treatment(
        &self,
        org_id: Uuid,
        spot_treatment_id: Uuid,
    ) -> AppResult<Option<SpotTreatment>> {
        self.touch();
        let state = self.state.read().await;
        Ok(state
            .spot_treatments
            .get(&spot_treatment_id)
            .filter(|t| t.org_id == org_id)
            .cloned())
    }

    async fn insert_tasks(&self, tasks: &[NewTask]) -> AppResult<usize> {
        self.touch();
        let mut state = self.state.write().await;
        if let Some(batch_id) = tasks
            .iter()
            .filter_map(|t| t.target.batch_id())
            .find(|id| state.failing_batches.contains(id))
        {
            return Err(AppError::Internal(format!(
                "insert rejected for batch {}",
                batch_id
            )));
        }

        let rows: Vec<Task> = tasks.iter().map(|t| materialize(&state, t)).collect();
        let inserted = rows.len();
        state.tasks.extend(rows);
        Ok(inserted)
    }

    async fn delete_pending_tasks(&self, org_id: Uuid) -> AppResult<u64> {
        self.touch();
        let mut state = self.state.write().await;
        let before = state.tasks.len();
        state
            .tasks
            .retain(|t| !(t.org_id == org_id && t.status == TaskStatus::Pending));
        Ok((before - state.tasks.len()) as u64)
    }

    async fn list_tasks(&self, org_id: Uuid, filter: &TaskFilter) -> AppResult<Vec<Task>> {
        self.touch();
        let state = self.state.read().await;
        let mut tasks: Vec<Task> = state
            .tasks
            .iter()
            .filter(|t| t.org_id == org_id && filter.matches(t))
            .cloned()
            .collect();
        tasks.sort_by(|a, b| {
            a.scheduled_date
                .cmp(&b.scheduled_date)
                .then_with(|| a.product_name.cmp(&b.product_name))
        });
        Ok(tasks)
    }

    async fn get_tasks(&self, org_id: Uuid, task_ids: &[Uuid]) -> AppResult<Vec<Task>> {
        self.touch();
        let state = self.state.read().await;
        Ok(state
            .tasks
            .iter()
            .filter(|t| t.org_id == org_id && task_ids.contains(&t.id))
            .cloned()
            .collect())
    }

    async fn complete_tasks(
        &self,
        org_id: Uuid,
        task_ids: &[Uuid],
        completion: &TaskCompletion,
    ) -> AppResult<u64> {
        self.touch();
        let mut state = self.state.write().await;
        let mut updated = 0;
        for task in state
            .tasks
            .iter_mut()
            .filter(|t| t.org_id == org_id && task_ids.contains(&t.id) && is_open(t))
        {
            task.status = TaskStatus::Completed;
            task.completed_at = Some(completion.completed_at);
            task.completed_by = Some(completion.completed_by);
            task.compliance = completion.compliance.clone();
            updated += 1;
        }
        Ok(updated)
    }

    async fn skip_task(&self, org_id: Uuid, task_id: Uuid, skip: &TaskSkip) -> AppResult<u64> {
        self.touch();
        let mut state = self.state.write().await;
        let task = state
            .tasks
            .iter_mut()
            .find(|t| t.org_id == org_id && t.id == task_id && is_open(t));
        Ok(match task {
            Some(task) => {
                task.status = TaskStatus::Skipped;
                task.skip_reason = Some(skip.reason.clone());
                task.completed_at = Some(skip.skipped_at);
                task.completed_by = Some(skip.skipped_by);
                1
            }
            None => 0,
        })
    }

    async fn mark_overdue(&self, org_id: Uuid, today: NaiveDate) -> AppResult<u64> {
        self.touch();
        let mut state = self.state.write().await;
        let mut updated = 0;
        for task in state.tasks.iter_mut().filter(|t| {
            t.org_id == org_id && t.status == TaskStatus::Pending && t.scheduled_date < today
        }) {
            task.status = TaskStatus::Overdue;
            updated += 1;
        }
        Ok(updated)
    }

    async fn insert_health_log(&self, log: &NewHealthLog) -> AppResult<()> {
        self.touch();
        let mut state = self.state.write().await;
        if state.fail_health_logs {
            return Err(AppError::Internal("health log insert rejected".to_string()));
        }
        state.health_logs.push(log.clone());
        Ok(())
    }

    async fn sync_summary_task(
        &self,
        org_id: Uuid,
        product_id: Uuid,
        calendar_week: u32,
        _actor_id: Uuid,
    ) -> AppResult<()> {
        self.touch();
        let mut state = self.state.write().await;
        let sync = SummarySync {
            org_id,
            product_id,
            calendar_week,
        };
        state.summary_syncs.push(sync);
        if state.summary_tasks.contains(&sync) {
            Ok(())
        } else {
            Err(AppError::NotFound("Summary task".to_string()))
        }
    }

    async fn list_bottles(&self, org_id: Uuid, filter: &BottleFilter) -> AppResult<Vec<Bottle>> {
        self.touch();
        let state = self.state.read().await;
        Ok(state
            .bottles
            .iter()
            .filter(|b| b.org_id == org_id && filter.matches(b))
            .cloned()
            .collect())
    }

    async fn get_bottle(&self, org_id: Uuid, bottle_id: Uuid) -> AppResult<Option<Bottle>> {
        self.touch();
        let state = self.state.read().await;
        Ok(state
            .bottles
            .iter()
            .find(|b| b.org_id == org_id && b.id == bottle_id)
            .cloned())
    }

    async fn generate_bottle_code(&self, org_id: Uuid, product_id: Uuid) -> AppResult<String> {
        self.touch();
        let mut state = self.state.write().await;
        if state.fail_bottle_codes {
            return Err(AppError::Internal(
                "bottle code generation rejected".to_string(),
            ));
        }
        let prefix = state
            .product_prefixes
            .get(&product_id)
            .cloned()
            .unwrap_or_else(|| "BTL".to_string());
        let sequence = state
            .code_sequences
            .entry((org_id, product_id))
            .or_insert(0);
        *sequence += 1;
        Ok(format!("{}-{:04}", prefix, sequence))
    }

    async fn insert_bottle(&self, bottle: &NewBottle) -> AppResult<Bottle> {
        self.touch();
        let row = Bottle {
            id: Uuid::new_v4(),
            org_id: bottle.org_id,
            product_id: bottle.product_id,
            bottle_code: bottle.bottle_code.clone(),
            status: BottleStatus::Sealed,
            volume_ml: bottle.volume_ml,
            remaining_ml: bottle.volume_ml,
            batch_number: bottle.batch_number.clone(),
            expiry_date: bottle.expiry_date,
            purchase_date: bottle.purchase_date,
            opened_at: None,
            disposed_at: None,
            created_at: Utc::now(),
        };
        self.state.write().await.bottles.push(row.clone());
        Ok(row)
    }

    async fn update_bottle(
        &self,
        org_id: Uuid,
        bottle_id: Uuid,
        update: &BottleUpdate,
    ) -> AppResult<Bottle> {
        self.touch();
        let mut state = self.state.write().await;
        let bottle = state
            .bottles
            .iter_mut()
            .find(|b| b.org_id == org_id && b.id == bottle_id)
            .ok_or_else(|| AppError::NotFound("Bottle".to_string()))?;
        bottle.status = update.status;
        bottle.remaining_ml = update.remaining_ml;
        bottle.opened_at = update.opened_at;
        bottle.disposed_at = update.disposed_at;
        Ok(bottle.clone())
    }

    async fn insert_movement(&self, movement: &NewMovement) -> AppResult<StockMovement> {
        self.touch();
        let row = StockMovement {
            id: Uuid::new_v4(),
            org_id: movement.org_id,
            bottle_id: movement.bottle_id,
            product_id: movement.product_id,
            movement_type: movement.movement_type,
            quantity_ml: movement.quantity_ml,
            remaining_after_ml: movement.remaining_after_ml,
            location_id: movement.location_id,
            ipm_task_id: movement.ipm_task_id,
            notes: movement.notes.clone(),
            recorded_by: movement.recorded_by,
            recorded_at: Utc::now(),
        };
        self.state.write().await.movements.push(row.clone());
        Ok(row)
    }

    async fn list_movements(
        &self,
        org_id: Uuid,
        bottle_id: Uuid,
    ) -> AppResult<Vec<StockMovement>> {
        self.touch();
        let state = self.state.read().await;
        Ok(state
            .movements
            .iter()
            .filter(|m| m.org_id == org_id && m.bottle_id == bottle_id)
            .cloned()
            .collect())
    }
}
