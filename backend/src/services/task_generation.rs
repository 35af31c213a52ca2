//! Task generation from program assignments and spot treatments

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shared::planning::{plan_batch_tasks, plan_spot_treatment};
use shared::AssignedProgram;

use super::OrgContext;
use crate::config::IpmConfig;
use crate::error::{AppError, AppResult};
use crate::store::IpmStore;

/// Expands programs and spot treatments into scheduled tasks
#[derive(Clone)]
pub struct TaskGenerationService {
    store: Arc<dyn IpmStore>,
    default_interval_days: i32,
}

/// Input for generating one batch's tasks
#[derive(Debug, Deserialize)]
pub struct GenerateForBatchInput {
    /// Week 0 of every assigned program
    pub potting_date: NaiveDate,
}

/// Input for regenerating tasks across all batches
#[derive(Debug, Default, Deserialize)]
pub struct BulkGenerateInput {
    /// Delete the organization's pending tasks first
    #[serde(default)]
    pub clear_existing: bool,
    /// Only consider batches and assignments of this plant family
    pub family_filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GenerationResult {
    pub tasks_created: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BulkGenerationResult {
    pub batches_processed: usize,
    pub tasks_created: usize,
    pub failures: Vec<BatchFailure>,
}

/// A batch whose tasks could not be written during a bulk run
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BatchFailure {
    pub batch_id: Uuid,
    pub message: String,
}

impl TaskGenerationService {
    pub fn new(store: Arc<dyn IpmStore>, config: &IpmConfig) -> Self {
        Self {
            store,
            default_interval_days: config.default_application_interval_days,
        }
    }

    /// Generate tasks for one batch from the programs assigned to its plant family
    pub async fn generate_for_batch(
        &self,
        ctx: &OrgContext,
        batch_id: Uuid,
        potting_date: NaiveDate,
    ) -> AppResult<GenerationResult> {
        let batch = self
            .store
            .get_batch(ctx.org_id, batch_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Batch".to_string()))?;

        let Some(family) = batch.plant_family.as_deref() else {
            tracing::info!(%batch_id, "Batch has no plant family, nothing to generate");
            return Ok(GenerationResult { tasks_created: 0 });
        };

        let programs = self
            .store
            .list_active_assignments(ctx.org_id, Some(family))
            .await?;
        let tasks = plan_batch_tasks(&batch, potting_date, &programs, None);
        let tasks_created = self.store.insert_tasks(&tasks).await?;

        tracing::info!(
            %batch_id,
            family,
            programs = programs.len(),
            tasks_created,
            "Generated batch tasks"
        );

        Ok(GenerationResult { tasks_created })
    }

    /// Generate one task per application of a spot treatment
    pub async fn generate_for_spot_treatment(
        &self,
        ctx: &OrgContext,
        spot_treatment_id: Uuid,
    ) -> AppResult<GenerationResult> {
        let treatment = self
            .store
            .get_spot_treatment(ctx.org_id, spot_treatment_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Spot treatment".to_string()))?;

        let tasks = plan_spot_treatment(&treatment, self.default_interval_days)?;
        let tasks_created = self.store.insert_tasks(&tasks).await?;

        tracing::info!(%spot_treatment_id, tasks_created, "Generated spot treatment tasks");

        Ok(GenerationResult { tasks_created })
    }

    /// Regenerate tasks for every active batch, dropping dates before today
    pub async fn bulk_generate(
        &self,
        ctx: &OrgContext,
        input: BulkGenerateInput,
    ) -> AppResult<BulkGenerationResult> {
        self.bulk_generate_as_of(ctx, input, Utc::now().date_naive())
            .await
    }

    /// Bulk generation with an explicit "today"
    pub async fn bulk_generate_as_of(
        &self,
        ctx: &OrgContext,
        input: BulkGenerateInput,
        today: NaiveDate,
    ) -> AppResult<BulkGenerationResult> {
        if input.clear_existing {
            let cleared = self.store.delete_pending_tasks(ctx.org_id).await?;
            tracing::info!(cleared, "Cleared pending tasks before bulk generation");
        }

        let family = input.family_filter.as_deref();
        let assignments = self.store.list_active_assignments(ctx.org_id, family).await?;
        let mut by_family: HashMap<String, Vec<AssignedProgram>> = HashMap::new();
        for program in assignments {
            by_family
                .entry(program.target_family.clone())
                .or_default()
                .push(program);
        }

        let batches = self.store.list_active_batches(ctx.org_id, family).await?;

        let mut result = BulkGenerationResult {
            batches_processed: 0,
            tasks_created: 0,
            failures: Vec::new(),
        };

        for batch in batches {
            let Some(programs) = batch
                .plant_family
                .as_deref()
                .and_then(|f| by_family.get(f))
            else {
                continue;
            };
            let Some(planted_at) = batch.planted_at else {
                continue;
            };

            let tasks = plan_batch_tasks(&batch, planted_at, programs, Some(today));
            match self.store.insert_tasks(&tasks).await {
                Ok(created) => {
                    result.batches_processed += 1;
                    result.tasks_created += created;
                }
                Err(e) => {
                    tracing::warn!(batch_id = %batch.id, error = %e, "Bulk generation failed for batch");
                    result.failures.push(BatchFailure {
                        batch_id: batch.id,
                        message: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            batches_processed = result.batches_processed,
            tasks_created = result.tasks_created,
            failures = result.failures.len(),
            "Bulk task generation finished"
        );

        Ok(result)
    }
}
