//! PostgreSQL implementation of the IPM store
//!
//! Rows are read into typed `*Row` structs and converted into the shared
//! domain types; malformed rows (unknown statuses, missing targets, broken
//! tank-mix linkage) are rejected at this boundary.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use shared::{
    AssignedProgram, Batch, Bottle, BottleUpdate, ComplianceData, NewBottle, NewMovement,
    NewTask, ProgramStep, SpotTreatment, StockMovement, Task, TaskFilter, TaskOrigin,
    TaskStatus, TaskTarget,
};

use super::{BottleFilter, IpmStore, NewHealthLog, TaskCompletion, TaskSkip};
use crate::error::{AppError, AppResult};

/// Store backed by the application's connection pool
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    /// Create a new PgStore instance
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const TASK_SELECT: &str = r#"
    SELECT t.id, t.org_id, t.scheduled_date, t.week_number, t.calendar_week,
           t.product_id, p.name AS product_name, t.rate, t.rate_unit, t.method,
           t.is_tank_mix, t.tank_mix_group_id, t.batch_id,
           COALESCE(t.location_id, b.location_id) AS location_id,
           t.program_id, t.program_step_id, t.spot_treatment_id,
           l.name AS location_name, b.batch_number,
           t.status, t.completed_at, t.completed_by, t.skip_reason,
           t.bottle_id, t.quantity_used_ml, t.notes, t.crop_name, t.reason_for_use,
           t.weather_conditions, t.harvest_interval_days, t.safe_harvest_date,
           t.area_treated, t.sprayer_used, t.signed_by, t.created_at
    FROM ipm_tasks t
    JOIN ipm_products p ON p.id = t.product_id
    LEFT JOIN batches b ON b.id = t.batch_id
    LEFT JOIN nursery_locations l ON l.id = COALESCE(t.location_id, b.location_id)
"#;

const BOTTLE_COLUMNS: &str = r#"
    id, org_id, product_id, bottle_code, status, volume_ml, remaining_ml, batch_number,
    expiry_date, purchase_date, opened_at, disposed_at, created_at
"#;

const MOVEMENT_COLUMNS: &str = r#"
    id, org_id, bottle_id, product_id, movement_type, quantity_ml, remaining_after_ml,
    location_id, ipm_task_id, notes, recorded_by, recorded_at
"#;

#[derive(Debug, FromRow)]
struct BatchRow {
    id: Uuid,
    org_id: Uuid,
    batch_number: String,
    plant_family: Option<String>,
    planted_at: Option<NaiveDate>,
    status: String,
    location_id: Option<Uuid>,
}

impl From<BatchRow> for Batch {
    fn from(row: BatchRow) -> Self {
        Batch {
            id: row.id,
            org_id: row.org_id,
            batch_number: row.batch_number,
            plant_family: row.plant_family,
            planted_at: row.planted_at,
            status: row.status,
            location_id: row.location_id,
        }
    }
}

#[derive(Debug, FromRow)]
struct AssignmentRow {
    assignment_id: Uuid,
    program_id: Uuid,
    program_name: String,
    target_family: String,
}

#[derive(Debug, FromRow)]
struct StepRow {
    id: Uuid,
    program_id: Uuid,
    product_id: Uuid,
    product_name: String,
    rate: Option<Decimal>,
    rate_unit: Option<String>,
    method: Option<String>,
    week_number: i32,
    sort_order: i32,
    notes: Option<String>,
}

impl From<StepRow> for ProgramStep {
    fn from(row: StepRow) -> Self {
        ProgramStep {
            id: row.id,
            program_id: row.program_id,
            product_id: row.product_id,
            product_name: row.product_name,
            rate: row.rate,
            rate_unit: row.rate_unit,
            method: row.method,
            week_number: row.week_number,
            sort_order: row.sort_order,
            notes: row.notes,
        }
    }
}

#[derive(Debug, FromRow)]
struct SpotTreatmentRow {
    id: Uuid,
    org_id: Uuid,
    product_id: Uuid,
    product_name: String,
    rate: Option<Decimal>,
    rate_unit: Option<String>,
    method: Option<String>,
    batch_id: Option<Uuid>,
    location_id: Option<Uuid>,
    first_application_date: NaiveDate,
    applications_total: i32,
    application_interval_days: Option<i32>,
    reason: Option<String>,
}

impl From<SpotTreatmentRow> for SpotTreatment {
    fn from(row: SpotTreatmentRow) -> Self {
        SpotTreatment {
            id: row.id,
            org_id: row.org_id,
            product_id: row.product_id,
            product_name: row.product_name,
            rate: row.rate,
            rate_unit: row.rate_unit,
            method: row.method,
            batch_id: row.batch_id,
            location_id: row.location_id,
            first_application_date: row.first_application_date,
            applications_total: row.applications_total,
            application_interval_days: row.application_interval_days,
            reason: row.reason,
        }
    }
}

#[derive(Debug, FromRow)]
struct TaskRow {
    id: Uuid,
    org_id: Uuid,
    scheduled_date: NaiveDate,
    week_number: i32,
    calendar_week: i32,
    product_id: Uuid,
    product_name: String,
    rate: Option<Decimal>,
    rate_unit: Option<String>,
    method: Option<String>,
    is_tank_mix: bool,
    tank_mix_group_id: Option<Uuid>,
    batch_id: Option<Uuid>,
    location_id: Option<Uuid>,
    program_id: Option<Uuid>,
    program_step_id: Option<Uuid>,
    spot_treatment_id: Option<Uuid>,
    location_name: Option<String>,
    batch_number: Option<String>,
    status: String,
    completed_at: Option<DateTime<Utc>>,
    completed_by: Option<Uuid>,
    skip_reason: Option<String>,
    bottle_id: Option<Uuid>,
    quantity_used_ml: Option<Decimal>,
    notes: Option<String>,
    crop_name: Option<String>,
    reason_for_use: Option<String>,
    weather_conditions: Option<String>,
    harvest_interval_days: Option<i32>,
    safe_harvest_date: Option<NaiveDate>,
    area_treated: Option<String>,
    sprayer_used: Option<String>,
    signed_by: Option<String>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for Task {
    type Error = AppError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let id = row.id;
        let bad_row = move |what: &str| AppError::Internal(format!("Task {} {}", id, what));

        let target = TaskTarget::from_parts(row.batch_id, row.location_id)
            .ok_or_else(|| bad_row("has no batch or location"))?;
        let origin =
            TaskOrigin::from_parts(row.program_id, row.program_step_id, row.spot_treatment_id)
                .ok_or_else(|| bad_row("has no single origin"))?;
        if row.is_tank_mix != row.tank_mix_group_id.is_some() {
            return Err(bad_row("has inconsistent tank-mix linkage"));
        }
        let calendar_week =
            u32::try_from(row.calendar_week).map_err(|_| bad_row("has a negative week"))?;
        let status: TaskStatus = row.status.parse()?;

        Ok(Task {
            id: row.id,
            org_id: row.org_id,
            scheduled_date: row.scheduled_date,
            week_number: row.week_number,
            calendar_week,
            product_id: row.product_id,
            product_name: row.product_name,
            rate: row.rate,
            rate_unit: row.rate_unit,
            method: row.method,
            is_tank_mix: row.is_tank_mix,
            tank_mix_group_id: row.tank_mix_group_id,
            target,
            origin,
            location_name: row.location_name,
            batch_number: row.batch_number,
            status,
            completed_at: row.completed_at,
            completed_by: row.completed_by,
            skip_reason: row.skip_reason,
            compliance: ComplianceData {
                bottle_id: row.bottle_id,
                quantity_used_ml: row.quantity_used_ml,
                notes: row.notes,
                crop_name: row.crop_name,
                reason_for_use: row.reason_for_use,
                weather_conditions: row.weather_conditions,
                harvest_interval_days: row.harvest_interval_days,
                safe_harvest_date: row.safe_harvest_date,
                area_treated: row.area_treated,
                sprayer_used: row.sprayer_used,
                signed_by: row.signed_by,
            },
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct BottleRow {
    id: Uuid,
    org_id: Uuid,
    product_id: Uuid,
    bottle_code: String,
    status: String,
    volume_ml: Decimal,
    remaining_ml: Decimal,
    batch_number: Option<String>,
    expiry_date: Option<NaiveDate>,
    purchase_date: Option<NaiveDate>,
    opened_at: Option<DateTime<Utc>>,
    disposed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<BottleRow> for Bottle {
    type Error = AppError;

    fn try_from(row: BottleRow) -> Result<Self, Self::Error> {
        Ok(Bottle {
            id: row.id,
            org_id: row.org_id,
            product_id: row.product_id,
            bottle_code: row.bottle_code,
            status: row.status.parse()?,
            volume_ml: row.volume_ml,
            remaining_ml: row.remaining_ml,
            batch_number: row.batch_number,
            expiry_date: row.expiry_date,
            purchase_date: row.purchase_date,
            opened_at: row.opened_at,
            disposed_at: row.disposed_at,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: Uuid,
    org_id: Uuid,
    bottle_id: Uuid,
    product_id: Uuid,
    movement_type: String,
    quantity_ml: Decimal,
    remaining_after_ml: Decimal,
    location_id: Option<Uuid>,
    ipm_task_id: Option<Uuid>,
    notes: Option<String>,
    recorded_by: Option<Uuid>,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<MovementRow> for StockMovement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> Result<Self, Self::Error> {
        Ok(StockMovement {
            id: row.id,
            org_id: row.org_id,
            bottle_id: row.bottle_id,
            product_id: row.product_id,
            movement_type: row.movement_type.parse()?,
            quantity_ml: row.quantity_ml,
            remaining_after_ml: row.remaining_after_ml,
            location_id: row.location_id,
            ipm_task_id: row.ipm_task_id,
            notes: row.notes,
            recorded_by: row.recorded_by,
            recorded_at: row.recorded_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl IpmStore for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn get_batch(&self, org_id: Uuid, batch_id: Uuid) -> AppResult<Option<Batch>> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, org_id, batch_number, plant_family, planted_at, status, location_id
            FROM batches
            WHERE id = $1 AND org_id = $2
            "#,
        )
        .bind(batch_id)
        .bind(org_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(Batch::from))
    }

    async fn list_active_batches(
        &self,
        org_id: Uuid,
        family: Option<&str>,
    ) -> AppResult<Vec<Batch>> {
        let rows = sqlx::query_as::<_, BatchRow>(
            r#"
            SELECT id, org_id, batch_number, plant_family, planted_at, status, location_id
            FROM batches
            WHERE org_id = $1
              AND status <> ALL($2)
              AND ($3::text IS NULL OR plant_family = $3)
            ORDER BY planted_at NULLS LAST, batch_number
            "#,
        )
        .bind(org_id)
        .bind(
            shared::INACTIVE_BATCH_STATUSES
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>(),
        )
        .bind(family)
        .fetch_all(&self.db)
        .await?;

        Ok(rows.into_iter().map(Batch::from).collect())
    }

    async fn list_active_assignments(
        &self,
        org_id: Uuid,
        family: Option<&str>,
    ) -> AppResult<Vec<AssignedProgram>> {
        let assignments = sqlx::query_as::<_, AssignmentRow>(
            r#"
            SELECT a.id AS assignment_id, a.program_id, p.name AS program_name, a.target_family
            FROM ipm_assignments a
            JOIN ipm_programs p ON p.id = a.program_id
            WHERE a.org_id = $1
              AND a.is_active
              AND p.is_active
              AND ($2::text IS NULL OR a.target_family = $2)
            ORDER BY a.created_at
            "#,
        )
        .bind(org_id)
        .bind(family)
        .fetch_all(&self.db)
        .await?;

        if assignments.is_empty() {
            return Ok(Vec::new());
        }

        let program_ids: Vec<Uuid> = assignments.iter().map(|a| a.program_id).collect();
        let steps = sqlx::query_as::<_, StepRow>(
            r#"
            SELECT s.id, s.program_id, s.product_id, pr.name AS product_name,
                   s.rate, s.rate_unit, s.method, s.week_number, s.sort_order, s.notes
            FROM ipm_program_steps s
            JOIN ipm_products pr ON pr.id = s.product_id
            WHERE s.program_id = ANY($1)
            ORDER BY s.week_number, s.sort_order
            "#,
        )
        .bind(&program_ids)
        .fetch_all(&self.db)
        .await?;

        let steps: Vec<ProgramStep> = steps.into_iter().map(ProgramStep::from).collect();

        Ok(assignments
            .into_iter()
            .map(|a| AssignedProgram {
                steps: steps
                    .iter()
                    .filter(|s| s.program_id == a.program_id)
                    .cloned()
                    .collect(),
                assignment_id: a.assignment_id,
                program_id: a.program_id,
                program_name: a.program_name,
                target_family: a.target_family,
            })
            .collect())
    }

    async fn get_spot_treatment(
        &self,
        org_id: Uuid,
        spot_treatment_id: Uuid,
    ) -> AppResult<Option<SpotTreatment>> {
        let row = sqlx::query_as::<_, SpotTreatmentRow>(
            r#"
            SELECT st.id, st.org_id, st.product_id, p.name AS product_name, st.rate,
                   st.rate_unit, st.method, st.batch_id, st.location_id,
                   st.first_application_date, st.applications_total,
                   st.application_interval_days, st.reason
            FROM ipm_spot_treatments st
            JOIN ipm_products p ON p.id = st.product_id
            WHERE st.id = $1 AND st.org_id = $2
            "#,
        )
        .bind(spot_treatment_id)
        .bind(org_id)
        .fetch_optional(&self.db)
        .await?;

        Ok(row.map(SpotTreatment::from))
    }

    async fn insert_tasks(&self, tasks: &[NewTask]) -> AppResult<usize> {
        if tasks.is_empty() {
            return Ok(0);
        }

        let mut builder = QueryBuilder::<Postgres>::new(
            r#"
            INSERT INTO ipm_tasks (
                org_id, scheduled_date, week_number, calendar_week, product_id, rate,
                rate_unit, method, is_tank_mix, tank_mix_group_id, batch_id, location_id,
                program_id, program_step_id, spot_treatment_id, status
            )
            "#,
        );
        builder.push_values(tasks, |mut row, task| {
            row.push_bind(task.org_id)
                .push_bind(task.scheduled_date)
                .push_bind(task.week_number)
                .push_bind(task.calendar_week as i32)
                .push_bind(task.product_id)
                .push_bind(task.rate)
                .push_bind(task.rate_unit.clone())
                .push_bind(task.method.clone())
                .push_bind(task.is_tank_mix)
                .push_bind(task.tank_mix_group_id)
                .push_bind(task.target.batch_id())
                .push_bind(task.target.location_id())
                .push_bind(task.origin.program_id())
                .push_bind(task.origin.program_step_id())
                .push_bind(task.origin.spot_treatment_id())
                .push_bind(TaskStatus::Pending.as_str());
        });

        let result = builder.build().execute(&self.db).await?;
        Ok(result.rows_affected() as usize)
    }

    async fn delete_pending_tasks(&self, org_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM ipm_tasks WHERE org_id = $1 AND status = 'pending'")
            .bind(org_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    async fn list_tasks(&self, org_id: Uuid, filter: &TaskFilter) -> AppResult<Vec<Task>> {
        let sql = format!(
            r#"
            {TASK_SELECT}
            WHERE t.org_id = $1
              AND ($2::text IS NULL OR t.status = $2)
              AND ($3::date IS NULL OR t.scheduled_date >= $3)
              AND ($4::date IS NULL OR t.scheduled_date <= $4)
              AND ($5::uuid IS NULL OR t.batch_id = $5)
              AND ($6::uuid IS NULL OR COALESCE(t.location_id, b.location_id) = $6)
              AND ($7::uuid IS NULL OR t.product_id = $7)
            ORDER BY t.scheduled_date, p.name
            "#
        );

        let rows = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(org_id)
            .bind(filter.status.map(|s| s.as_str()))
            .bind(filter.from_date)
            .bind(filter.to_date)
            .bind(filter.batch_id)
            .bind(filter.location_id)
            .bind(filter.product_id)
            .fetch_all(&self.db)
            .await?;

        convert_all(rows)
    }

    async fn get_tasks(&self, org_id: Uuid, task_ids: &[Uuid]) -> AppResult<Vec<Task>> {
        let sql = format!("{TASK_SELECT} WHERE t.org_id = $1 AND t.id = ANY($2)");

        let rows = sqlx::query_as::<_, TaskRow>(&sql)
            .bind(org_id)
            .bind(task_ids)
            .fetch_all(&self.db)
            .await?;

        convert_all(rows)
    }

    async fn complete_tasks(
        &self,
        org_id: Uuid,
        task_ids: &[Uuid],
        completion: &TaskCompletion,
    ) -> AppResult<u64> {
        let c = &completion.compliance;
        let result = sqlx::query(
            r#"
            UPDATE ipm_tasks
            SET status = 'completed', completed_at = $3, completed_by = $4,
                bottle_id = $5, quantity_used_ml = $6, notes = $7, crop_name = $8,
                reason_for_use = $9, weather_conditions = $10, harvest_interval_days = $11,
                safe_harvest_date = $12, area_treated = $13, sprayer_used = $14, signed_by = $15
            WHERE org_id = $1 AND id = ANY($2) AND status IN ('pending', 'overdue')
            "#,
        )
        .bind(org_id)
        .bind(task_ids)
        .bind(completion.completed_at)
        .bind(completion.completed_by)
        .bind(c.bottle_id)
        .bind(c.quantity_used_ml)
        .bind(&c.notes)
        .bind(&c.crop_name)
        .bind(&c.reason_for_use)
        .bind(&c.weather_conditions)
        .bind(c.harvest_interval_days)
        .bind(c.safe_harvest_date)
        .bind(&c.area_treated)
        .bind(&c.sprayer_used)
        .bind(&c.signed_by)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    async fn skip_task(&self, org_id: Uuid, task_id: Uuid, skip: &TaskSkip) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE ipm_tasks
            SET status = 'skipped', skip_reason = $3, completed_at = $4, completed_by = $5
            WHERE org_id = $1 AND id = $2 AND status IN ('pending', 'overdue')
            "#,
        )
        .bind(org_id)
        .bind(task_id)
        .bind(&skip.reason)
        .bind(skip.skipped_at)
        .bind(skip.skipped_by)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    async fn mark_overdue(&self, org_id: Uuid, today: NaiveDate) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE ipm_tasks
            SET status = 'overdue'
            WHERE org_id = $1 AND status = 'pending' AND scheduled_date < $2
            "#,
        )
        .bind(org_id)
        .bind(today)
        .execute(&self.db)
        .await?;

        Ok(result.rows_affected())
    }

    async fn insert_health_log(&self, log: &NewHealthLog) -> AppResult<()> {
        let c = &log.compliance;
        sqlx::query(
            r#"
            INSERT INTO plant_health_logs (
                org_id, batch_id, ipm_task_id, event_type, product_name, rate, rate_unit,
                method, bottle_id, quantity_used_ml, notes, crop_name, reason_for_use,
                weather_conditions, harvest_interval_days, safe_harvest_date, area_treated,
                sprayer_used, signed_by, recorded_by, occurred_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21)
            "#,
        )
        .bind(log.org_id)
        .bind(log.batch_id)
        .bind(log.ipm_task_id)
        .bind(NewHealthLog::EVENT_TYPE)
        .bind(&log.product_name)
        .bind(log.rate)
        .bind(&log.rate_unit)
        .bind(&log.method)
        .bind(c.bottle_id)
        .bind(c.quantity_used_ml)
        .bind(&c.notes)
        .bind(&c.crop_name)
        .bind(&c.reason_for_use)
        .bind(&c.weather_conditions)
        .bind(c.harvest_interval_days)
        .bind(c.safe_harvest_date)
        .bind(&c.area_treated)
        .bind(&c.sprayer_used)
        .bind(&c.signed_by)
        .bind(log.recorded_by)
        .bind(log.occurred_at)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn sync_summary_task(
        &self,
        org_id: Uuid,
        product_id: Uuid,
        calendar_week: u32,
        actor_id: Uuid,
    ) -> AppResult<()> {
        sqlx::query("SELECT sync_ipm_summary_task($1, $2, $3, $4)")
            .bind(org_id)
            .bind(product_id)
            .bind(calendar_week as i32)
            .bind(actor_id)
            .execute(&self.db)
            .await?;

        Ok(())
    }

    async fn list_bottles(&self, org_id: Uuid, filter: &BottleFilter) -> AppResult<Vec<Bottle>> {
        let sql = format!(
            r#"
            SELECT {BOTTLE_COLUMNS}
            FROM ipm_product_bottles
            WHERE org_id = $1
              AND ($2::uuid IS NULL OR product_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY created_at DESC, bottle_code
            "#
        );

        let rows = sqlx::query_as::<_, BottleRow>(&sql)
            .bind(org_id)
            .bind(filter.product_id)
            .bind(filter.status.map(|s| s.as_str()))
            .fetch_all(&self.db)
            .await?;

        convert_all(rows)
    }

    async fn get_bottle(&self, org_id: Uuid, bottle_id: Uuid) -> AppResult<Option<Bottle>> {
        let sql = format!(
            "SELECT {BOTTLE_COLUMNS} FROM ipm_product_bottles WHERE id = $1 AND org_id = $2"
        );

        sqlx::query_as::<_, BottleRow>(&sql)
            .bind(bottle_id)
            .bind(org_id)
            .fetch_optional(&self.db)
            .await?
            .map(Bottle::try_from)
            .transpose()
    }

    async fn generate_bottle_code(&self, org_id: Uuid, product_id: Uuid) -> AppResult<String> {
        let code = sqlx::query_scalar::<_, String>("SELECT generate_bottle_code($1, $2)")
            .bind(org_id)
            .bind(product_id)
            .fetch_one(&self.db)
            .await?;

        Ok(code)
    }

    async fn insert_bottle(&self, bottle: &NewBottle) -> AppResult<Bottle> {
        let sql = format!(
            r#"
            INSERT INTO ipm_product_bottles (
                org_id, product_id, bottle_code, status, volume_ml, remaining_ml,
                batch_number, expiry_date, purchase_date
            )
            VALUES ($1, $2, $3, 'sealed', $4, $4, $5, $6, $7)
            RETURNING {BOTTLE_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, BottleRow>(&sql)
            .bind(bottle.org_id)
            .bind(bottle.product_id)
            .bind(&bottle.bottle_code)
            .bind(bottle.volume_ml)
            .bind(&bottle.batch_number)
            .bind(bottle.expiry_date)
            .bind(bottle.purchase_date)
            .fetch_one(&self.db)
            .await?;

        row.try_into()
    }

    async fn update_bottle(
        &self,
        org_id: Uuid,
        bottle_id: Uuid,
        update: &BottleUpdate,
    ) -> AppResult<Bottle> {
        let sql = format!(
            r#"
            UPDATE ipm_product_bottles
            SET status = $3, remaining_ml = $4, opened_at = $5, disposed_at = $6
            WHERE id = $1 AND org_id = $2
            RETURNING {BOTTLE_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, BottleRow>(&sql)
            .bind(bottle_id)
            .bind(org_id)
            .bind(update.status.as_str())
            .bind(update.remaining_ml)
            .bind(update.opened_at)
            .bind(update.disposed_at)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Bottle".to_string()))?;

        row.try_into()
    }

    async fn insert_movement(&self, movement: &NewMovement) -> AppResult<StockMovement> {
        let sql = format!(
            r#"
            INSERT INTO ipm_stock_movements (
                org_id, bottle_id, product_id, movement_type, quantity_ml, remaining_after_ml,
                location_id, ipm_task_id, notes, recorded_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {MOVEMENT_COLUMNS}
            "#
        );

        let row = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(movement.org_id)
            .bind(movement.bottle_id)
            .bind(movement.product_id)
            .bind(movement.movement_type.as_str())
            .bind(movement.quantity_ml)
            .bind(movement.remaining_after_ml)
            .bind(movement.location_id)
            .bind(movement.ipm_task_id)
            .bind(&movement.notes)
            .bind(movement.recorded_by)
            .fetch_one(&self.db)
            .await?;

        row.try_into()
    }

    async fn list_movements(
        &self,
        org_id: Uuid,
        bottle_id: Uuid,
    ) -> AppResult<Vec<StockMovement>> {
        let sql = format!(
            r#"
            SELECT {MOVEMENT_COLUMNS}
            FROM ipm_stock_movements
            WHERE org_id = $1 AND bottle_id = $2
            ORDER BY recorded_at, id
            "#
        );

        let rows = sqlx::query_as::<_, MovementRow>(&sql)
            .bind(org_id)
            .bind(bottle_id)
            .fetch_all(&self.db)
            .await?;

        convert_all(rows)
    }
}
