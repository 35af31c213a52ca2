//! Chemical stock service: bottles and their movement ledger

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use shared::ledger::{self, LedgerStep};
use shared::{Bottle, BottleStatus, NewBottle, NewMovement, ProductStockSummary, StockMovement};

use super::OrgContext;
use crate::error::{AppError, AppResult};
use crate::store::{BottleFilter, IpmStore};

/// Stock service for bottle inventory and usage recording
#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn IpmStore>,
}

/// Input for registering newly received bottles
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBottlesInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 100))]
    pub count: u32,
    pub volume_ml: Decimal,
    #[validate(length(max = 100))]
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub purchase_date: Option<NaiveDate>,
}

/// Input for drawing product from a bottle
#[derive(Debug, Clone, Deserialize)]
pub struct RecordUsageInput {
    pub bottle_id: Uuid,
    pub quantity_ml: Decimal,
    pub location_id: Option<Uuid>,
    pub notes: Option<String>,
    pub ipm_task_id: Option<Uuid>,
}

/// Input for correcting a bottle's level
#[derive(Debug, Deserialize, Validate)]
pub struct AdjustLevelInput {
    pub new_remaining_ml: Decimal,
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DisposeBottleInput {
    pub reason: Option<String>,
}

/// A bottle after a ledger operation, with the movement that recorded it
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BottleChange {
    pub bottle: Bottle,
    pub movement: StockMovement,
}

#[derive(Default)]
struct MovementContext {
    location_id: Option<Uuid>,
    ipm_task_id: Option<Uuid>,
    notes: Option<String>,
}

impl StockService {
    /// Create a new StockService instance
    pub fn new(store: Arc<dyn IpmStore>) -> Self {
        Self { store }
    }

    pub async fn list_bottles(
        &self,
        ctx: &OrgContext,
        filter: &BottleFilter,
    ) -> AppResult<Vec<Bottle>> {
        self.store.list_bottles(ctx.org_id, filter).await
    }

    pub async fn get_bottle(&self, ctx: &OrgContext, bottle_id: Uuid) -> AppResult<Bottle> {
        self.store
            .get_bottle(ctx.org_id, bottle_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Bottle".to_string()))
    }

    /// Register `count` sealed bottles, each with its own generated code.
    ///
    /// A code-generation failure aborts the call; bottles created before it
    /// are kept.
    pub async fn create_bottles(
        &self,
        ctx: &OrgContext,
        input: CreateBottlesInput,
    ) -> AppResult<Vec<Bottle>> {
        input.validate()?;
        if input.volume_ml <= Decimal::ZERO {
            return Err(AppError::validation("volume_ml", "Volume must be positive"));
        }

        let mut bottles = Vec::with_capacity(input.count as usize);
        for _ in 0..input.count {
            let bottle_code = self
                .store
                .generate_bottle_code(ctx.org_id, input.product_id)
                .await?;
            let bottle = self
                .store
                .insert_bottle(&NewBottle {
                    org_id: ctx.org_id,
                    product_id: input.product_id,
                    bottle_code,
                    volume_ml: input.volume_ml,
                    batch_number: input.batch_number.clone(),
                    expiry_date: input.expiry_date,
                    purchase_date: input.purchase_date,
                })
                .await?;
            bottles.push(bottle);
        }

        tracing::info!(
            product_id = %input.product_id,
            count = bottles.len(),
            "Registered bottles"
        );

        Ok(bottles)
    }

    pub async fn open_bottle(&self, ctx: &OrgContext, bottle_id: Uuid) -> AppResult<BottleChange> {
        let bottle = self.get_bottle(ctx, bottle_id).await?;
        let step = ledger::open(&bottle, Utc::now())?;
        self.apply(ctx, &bottle, step, MovementContext::default())
            .await
    }

    /// Draw product from a bottle, opening it if still sealed
    pub async fn record_usage(
        &self,
        ctx: &OrgContext,
        input: RecordUsageInput,
    ) -> AppResult<BottleChange> {
        let bottle = self.get_bottle(ctx, input.bottle_id).await?;
        let step = ledger::usage(&bottle, input.quantity_ml, Utc::now())?;
        let change = self
            .apply(
                ctx,
                &bottle,
                step,
                MovementContext {
                    location_id: input.location_id,
                    ipm_task_id: input.ipm_task_id,
                    notes: input.notes,
                },
            )
            .await?;

        tracing::info!(
            bottle_id = %bottle.id,
            quantity_ml = %input.quantity_ml,
            remaining_ml = %change.bottle.remaining_ml,
            "Recorded stock usage"
        );

        Ok(change)
    }

    pub async fn adjust_bottle_level(
        &self,
        ctx: &OrgContext,
        bottle_id: Uuid,
        input: AdjustLevelInput,
    ) -> AppResult<BottleChange> {
        input.validate()?;
        let bottle = self.get_bottle(ctx, bottle_id).await?;
        let step = ledger::adjustment(&bottle, input.new_remaining_ml, Utc::now())?;
        self.apply(
            ctx,
            &bottle,
            step,
            MovementContext {
                notes: Some(input.reason),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn dispose_bottle(
        &self,
        ctx: &OrgContext,
        bottle_id: Uuid,
        input: DisposeBottleInput,
    ) -> AppResult<BottleChange> {
        let bottle = self.get_bottle(ctx, bottle_id).await?;
        let step = ledger::disposal(&bottle, Utc::now())?;
        self.apply(
            ctx,
            &bottle,
            step,
            MovementContext {
                notes: input.reason,
                ..Default::default()
            },
        )
        .await
    }

    /// Movement ledger of one bottle, oldest first
    pub async fn get_bottle_movements(
        &self,
        ctx: &OrgContext,
        bottle_id: Uuid,
    ) -> AppResult<Vec<StockMovement>> {
        let bottle = self.get_bottle(ctx, bottle_id).await?;
        self.store.list_movements(ctx.org_id, bottle.id).await
    }

    /// Stock on hand per product, ignoring disposed bottles
    pub async fn get_stock_summary(&self, ctx: &OrgContext) -> AppResult<Vec<ProductStockSummary>> {
        let bottles = self
            .store
            .list_bottles(ctx.org_id, &BottleFilter::default())
            .await?;

        let mut summary: BTreeMap<Uuid, ProductStockSummary> = BTreeMap::new();
        for bottle in bottles
            .iter()
            .filter(|b| b.status != BottleStatus::Disposed)
        {
            let entry = summary
                .entry(bottle.product_id)
                .or_insert_with(|| ProductStockSummary {
                    product_id: bottle.product_id,
                    sealed_bottles: 0,
                    open_bottles: 0,
                    total_remaining_ml: Decimal::ZERO,
                });
            match bottle.status {
                BottleStatus::Sealed => entry.sealed_bottles += 1,
                BottleStatus::Open => entry.open_bottles += 1,
                _ => {}
            }
            entry.total_remaining_ml += bottle.remaining_ml;
        }

        Ok(summary.into_values().collect())
    }

    /// Persist the bottle's next state, then append the matching movement
    async fn apply(
        &self,
        ctx: &OrgContext,
        bottle: &Bottle,
        step: LedgerStep,
        context: MovementContext,
    ) -> AppResult<BottleChange> {
        let updated = self
            .store
            .update_bottle(ctx.org_id, bottle.id, &step.update)
            .await?;

        let movement = self
            .store
            .insert_movement(&NewMovement {
                org_id: ctx.org_id,
                bottle_id: bottle.id,
                product_id: bottle.product_id,
                movement_type: step.movement_type,
                quantity_ml: step.quantity_ml,
                remaining_after_ml: step.remaining_after_ml,
                location_id: context.location_id,
                ipm_task_id: context.ipm_task_id,
                notes: context.notes,
                recorded_by: Some(ctx.actor_id),
            })
            .await?;

        Ok(BottleChange {
            bottle: updated,
            movement,
        })
    }
}
