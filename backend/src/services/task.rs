//! Task queries, grouping and lifecycle transitions

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared::grouping::group_tasks;
use shared::{
    validate_skip_reason, validate_task_ids, ComplianceData, ItemOutcome, Task, TaskFilter,
    TaskGroup, TaskStatus,
};

use super::stock::{RecordUsageInput, StockService};
use super::OrgContext;
use crate::config::IpmConfig;
use crate::error::{AppError, AppResult};
use crate::store::{IpmStore, NewHealthLog, TaskCompletion, TaskSkip};

/// Notes attached to stock usage recorded while completing tasks
pub const COMPLETION_USAGE_NOTES: &str = "IPM Task completion";

/// Task service for listing, grouping and completing IPM tasks
#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn IpmStore>,
    config: IpmConfig,
}

/// Input for completing a set of tasks
#[derive(Debug, Deserialize)]
pub struct CompleteTasksInput {
    pub task_ids: Vec<String>,
    #[serde(default)]
    pub compliance: Option<ComplianceData>,
}

#[derive(Debug, Deserialize)]
pub struct SkipTaskInput {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionResult {
    pub completed: u64,
    pub summary_sync: Vec<SummarySyncOutcome>,
    /// Best-effort side effects that did not go through; lifted into the response envelope
    #[serde(skip)]
    pub warning: Option<String>,
}

/// Result of syncing one weekly summary task
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SummarySyncOutcome {
    pub product_id: Uuid,
    pub calendar_week: u32,
    #[serde(flatten)]
    pub outcome: ItemOutcome,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SkipResult {
    pub task_id: Uuid,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OverdueResult {
    /// Tasks newly flagged overdue
    pub count: u64,
}

impl TaskService {
    pub fn new(store: Arc<dyn IpmStore>, config: &IpmConfig) -> Self {
        Self {
            store,
            config: config.clone(),
        }
    }

    /// Flat task list, ordered by scheduled date then product name
    pub async fn get_tasks(&self, ctx: &OrgContext, filter: &TaskFilter) -> AppResult<Vec<Task>> {
        self.store.list_tasks(ctx.org_id, filter).await
    }

    /// Tasks folded into applicator groups, ordered by week then product name
    pub async fn get_grouped_tasks(
        &self,
        ctx: &OrgContext,
        filter: &TaskFilter,
    ) -> AppResult<Vec<TaskGroup>> {
        let tasks = self.store.list_tasks(ctx.org_id, filter).await?;
        Ok(group_tasks(tasks))
    }

    /// Complete tasks and write their audit trail.
    ///
    /// The task update is authoritative. Health logs, stock usage and summary
    /// syncs are attempted afterwards and never undo the completion: the
    /// first two surface as a warning, the last as per-pair outcomes.
    pub async fn complete_tasks(
        &self,
        ctx: &OrgContext,
        input: CompleteTasksInput,
    ) -> AppResult<CompletionResult> {
        let task_ids = validate_task_ids(&input.task_ids, self.config.max_tasks_per_completion)?;

        let tasks = self.store.get_tasks(ctx.org_id, &task_ids).await?;
        if tasks.is_empty() {
            return Err(AppError::NotFound("Tasks".to_string()));
        }

        let now = Utc::now();
        let compliance = input
            .compliance
            .unwrap_or_default()
            .with_safe_harvest_date(now.date_naive());

        let completed = self
            .store
            .complete_tasks(
                ctx.org_id,
                &task_ids,
                &TaskCompletion {
                    completed_by: ctx.actor_id,
                    completed_at: now,
                    compliance: compliance.clone(),
                },
            )
            .await?;

        let completed_tasks: Vec<&Task> = tasks
            .iter()
            .filter(|t| t.status.can_transition_to(TaskStatus::Completed))
            .collect();

        let mut warnings = Vec::new();

        let mut failed_logs = 0;
        let mut batch_tasks = 0;
        for task in &completed_tasks {
            let Some(batch_id) = task.batch_id() else {
                continue;
            };
            batch_tasks += 1;
            let log = NewHealthLog {
                org_id: ctx.org_id,
                batch_id,
                ipm_task_id: task.id,
                product_name: task.product_name.clone(),
                rate: task.rate,
                rate_unit: task.rate_unit.clone(),
                method: task.method.clone(),
                recorded_by: ctx.actor_id,
                occurred_at: now,
                compliance: compliance.clone(),
            };
            if let Err(e) = self.store.insert_health_log(&log).await {
                tracing::warn!(task_id = %task.id, error = %e, "Failed to write health log");
                failed_logs += 1;
            }
        }
        if failed_logs > 0 {
            warnings.push(format!(
                "{} of {} health log entries could not be written",
                failed_logs, batch_tasks
            ));
        }

        // Stock is drawn only when this call completed something
        let usage_task = completed_tasks.first().filter(|_| completed > 0);
        if let (Some(task), Some((bottle_id, quantity_ml))) =
            (usage_task, compliance.stock_usage())
        {
            let usage = RecordUsageInput {
                bottle_id,
                quantity_ml,
                location_id: task.location_id(),
                notes: Some(COMPLETION_USAGE_NOTES.to_string()),
                ipm_task_id: Some(task.id),
            };
            if let Err(e) = StockService::new(self.store.clone())
                .record_usage(ctx, usage)
                .await
            {
                tracing::warn!(%bottle_id, error = %e, "Failed to record stock usage");
                warnings.push(format!("Stock usage was not recorded: {}", e));
            }
        }

        let summary_sync = if self.config.summary_sync_enabled {
            self.sync_summaries(ctx, &completed_tasks).await
        } else {
            Vec::new()
        };

        tracing::info!(
            requested = task_ids.len(),
            completed,
            warnings = warnings.len(),
            "Completed IPM tasks"
        );

        Ok(CompletionResult {
            completed,
            summary_sync,
            warning: (!warnings.is_empty()).then(|| warnings.join("; ")),
        })
    }

    /// One sync per distinct (product, calendar week); failures are recorded, not raised
    async fn sync_summaries(&self, ctx: &OrgContext, tasks: &[&Task]) -> Vec<SummarySyncOutcome> {
        let mut seen = HashSet::new();
        let mut outcomes = Vec::new();

        for task in tasks {
            let pair = (task.product_id, task.calendar_week);
            if !seen.insert(pair) {
                continue;
            }
            let result = self
                .store
                .sync_summary_task(ctx.org_id, pair.0, pair.1, ctx.actor_id)
                .await;
            if let Err(e) = &result {
                tracing::debug!(
                    product_id = %pair.0,
                    calendar_week = pair.1,
                    error = %e,
                    "Summary task sync skipped"
                );
            }
            outcomes.push(SummarySyncOutcome {
                product_id: pair.0,
                calendar_week: pair.1,
                outcome: result.into(),
            });
        }

        outcomes
    }

    pub async fn skip_task(
        &self,
        ctx: &OrgContext,
        task_id: Uuid,
        input: SkipTaskInput,
    ) -> AppResult<SkipResult> {
        validate_skip_reason(&input.reason).map_err(|msg| AppError::validation("reason", msg))?;

        let task = self
            .store
            .get_tasks(ctx.org_id, &[task_id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound("Task".to_string()))?;

        if !task.status.can_transition_to(TaskStatus::Skipped) {
            return Err(AppError::InvalidStateTransition(format!(
                "task is already {}",
                task.status
            )));
        }

        let skip = TaskSkip {
            reason: input.reason.trim().to_string(),
            skipped_by: ctx.actor_id,
            skipped_at: Utc::now(),
        };
        if self.store.skip_task(ctx.org_id, task_id, &skip).await? == 0 {
            return Err(AppError::InvalidStateTransition(
                "task changed before it could be skipped".to_string(),
            ));
        }

        tracing::info!(%task_id, "Skipped IPM task");

        Ok(SkipResult {
            task_id,
            status: TaskStatus::Skipped,
        })
    }

    /// Flag pending tasks scheduled before today
    pub async fn mark_overdue(&self, ctx: &OrgContext) -> AppResult<OverdueResult> {
        self.mark_overdue_as_of(ctx, Utc::now().date_naive()).await
    }

    pub async fn mark_overdue_as_of(
        &self,
        ctx: &OrgContext,
        today: NaiveDate,
    ) -> AppResult<OverdueResult> {
        let count = self.store.mark_overdue(ctx.org_id, today).await?;
        if count > 0 {
            tracing::info!(count, "Marked tasks overdue");
        }
        Ok(OverdueResult { count })
    }
}
