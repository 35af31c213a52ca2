//! HTTP handlers for bottle and stock endpoints

use axum::extract::State;
use shared::{Bottle, ProductStockSummary, StockMovement};
use uuid::Uuid;

use super::{ok, ActionJson};
use crate::error::AppResult;
use crate::extract::{Json, OptionalJson, Path, Query};
use crate::middleware::CurrentUser;
use crate::services::stock::{
    AdjustLevelInput, BottleChange, CreateBottlesInput, DisposeBottleInput, RecordUsageInput,
};
use crate::services::StockService;
use crate::store::BottleFilter;
use crate::AppState;

/// List bottles
pub async fn list_bottles(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filter): Query<BottleFilter>,
) -> AppResult<ActionJson<Vec<Bottle>>> {
    let service = StockService::new(state.store);
    let bottles = service
        .list_bottles(&current_user.0.context(), &filter)
        .await?;
    Ok(ok(bottles))
}

/// Register new bottles
pub async fn create_bottles(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateBottlesInput>,
) -> AppResult<ActionJson<Vec<Bottle>>> {
    let service = StockService::new(state.store);
    let bottles = service
        .create_bottles(&current_user.0.context(), input)
        .await?;
    Ok(ok(bottles))
}

/// Stock on hand per product
pub async fn get_stock_summary(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<ActionJson<Vec<ProductStockSummary>>> {
    let service = StockService::new(state.store);
    let summary = service.get_stock_summary(&current_user.0.context()).await?;
    Ok(ok(summary))
}

/// Get bottle by ID
pub async fn get_bottle(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(bottle_id): Path<Uuid>,
) -> AppResult<ActionJson<Bottle>> {
    let service = StockService::new(state.store);
    let bottle = service
        .get_bottle(&current_user.0.context(), bottle_id)
        .await?;
    Ok(ok(bottle))
}

/// Movement ledger of a bottle
pub async fn get_bottle_movements(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(bottle_id): Path<Uuid>,
) -> AppResult<ActionJson<Vec<StockMovement>>> {
    let service = StockService::new(state.store);
    let movements = service
        .get_bottle_movements(&current_user.0.context(), bottle_id)
        .await?;
    Ok(ok(movements))
}

/// Break the seal on a bottle
pub async fn open_bottle(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(bottle_id): Path<Uuid>,
) -> AppResult<ActionJson<BottleChange>> {
    let service = StockService::new(state.store);
    let change = service
        .open_bottle(&current_user.0.context(), bottle_id)
        .await?;
    Ok(ok(change))
}

/// Dispose of a bottle
pub async fn dispose_bottle(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(bottle_id): Path<Uuid>,
    OptionalJson(input): OptionalJson<DisposeBottleInput>,
) -> AppResult<ActionJson<BottleChange>> {
    let service = StockService::new(state.store);
    let change = service
        .dispose_bottle(&current_user.0.context(), bottle_id, input)
        .await?;
    Ok(ok(change))
}

/// Set a bottle's level after a count or spill
pub async fn adjust_bottle_level(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(bottle_id): Path<Uuid>,
    Json(input): Json<AdjustLevelInput>,
) -> AppResult<ActionJson<BottleChange>> {
    let service = StockService::new(state.store);
    let change = service
        .adjust_bottle_level(&current_user.0.context(), bottle_id, input)
        .await?;
    Ok(ok(change))
}

/// Record product drawn from a bottle; answers with the usage movement
pub async fn record_usage(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<RecordUsageInput>,
) -> AppResult<ActionJson<StockMovement>> {
    let service = StockService::new(state.store);
    let change = service
        .record_usage(&current_user.0.context(), input)
        .await?;
    Ok(ok(change.movement))
}
