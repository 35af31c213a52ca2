//! HTTP handlers for task generation, listing and lifecycle endpoints

use axum::extract::State;
use shared::{Task, TaskFilter, TaskGroup};
use uuid::Uuid;

use super::{ok, ok_with_warning, ActionJson};
use crate::error::AppResult;
use crate::extract::{Json, OptionalJson, Path, Query};
use crate::middleware::CurrentUser;
use crate::services::task::{
    CompleteTasksInput, CompletionResult, OverdueResult, SkipResult, SkipTaskInput,
};
use crate::services::task_generation::{
    BulkGenerateInput, BulkGenerationResult, GenerateForBatchInput, GenerationResult,
};
use crate::services::{TaskGenerationService, TaskService};
use crate::AppState;

/// Generate tasks for a batch from its family's programs
pub async fn generate_batch_tasks(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(batch_id): Path<Uuid>,
    Json(input): Json<GenerateForBatchInput>,
) -> AppResult<ActionJson<GenerationResult>> {
    let service = TaskGenerationService::new(state.store, &state.config.ipm);
    let result = service
        .generate_for_batch(&current_user.0.context(), batch_id, input.potting_date)
        .await?;
    Ok(ok(result))
}

/// Generate the application series of a spot treatment
pub async fn generate_spot_treatment_tasks(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(spot_treatment_id): Path<Uuid>,
) -> AppResult<ActionJson<GenerationResult>> {
    let service = TaskGenerationService::new(state.store, &state.config.ipm);
    let result = service
        .generate_for_spot_treatment(&current_user.0.context(), spot_treatment_id)
        .await?;
    Ok(ok(result))
}

/// Regenerate tasks for all active batches
pub async fn bulk_generate_tasks(
    State(state): State<AppState>,
    current_user: CurrentUser,
    OptionalJson(input): OptionalJson<BulkGenerateInput>,
) -> AppResult<ActionJson<BulkGenerationResult>> {
    let service = TaskGenerationService::new(state.store, &state.config.ipm);
    let result = service
        .bulk_generate(&current_user.0.context(), input)
        .await?;
    Ok(ok(result))
}

/// List tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<TaskFilter>,
) -> AppResult<ActionJson<Vec<Task>>> {
    let service = TaskService::new(state.store, &state.config.ipm);
    let tasks = service
        .get_tasks(&current_user.0.context(), &filter)
        .await?;
    Ok(ok(tasks))
}

/// List tasks folded into applicator groups
pub async fn list_grouped_tasks(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<TaskFilter>,
) -> AppResult<ActionJson<Vec<TaskGroup>>> {
    let service = TaskService::new(state.store, &state.config.ipm);
    let groups = service
        .get_grouped_tasks(&current_user.0.context(), &filter)
        .await?;
    Ok(ok(groups))
}

/// Complete tasks with optional compliance data
pub async fn complete_tasks(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CompleteTasksInput>,
) -> AppResult<ActionJson<CompletionResult>> {
    let service = TaskService::new(state.store, &state.config.ipm);
    let mut result = service
        .complete_tasks(&current_user.0.context(), input)
        .await?;
    let warning = result.warning.take();
    Ok(ok_with_warning(result, warning))
}

/// Skip a single task
pub async fn skip_task(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(task_id): Path<Uuid>,
    Json(input): Json<SkipTaskInput>,
) -> AppResult<ActionJson<SkipResult>> {
    let service = TaskService::new(state.store, &state.config.ipm);
    let result = service
        .skip_task(&current_user.0.context(), task_id, input)
        .await?;
    Ok(ok(result))
}

/// Flag pending tasks in the past as overdue
pub async fn mark_overdue_tasks(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<ActionJson<OverdueResult>> {
    let service = TaskService::new(state.store, &state.config.ipm);
    let result = service.mark_overdue(&current_user.0.context()).await?;
    Ok(ok(result))
}
