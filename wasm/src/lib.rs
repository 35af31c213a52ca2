//! WebAssembly bindings for the nursery IPM UI
//!
//! The browser's week filter and group matching call into the same code the
//! server uses, so week numbers and group keys never disagree:
//! - ISO week and week-start computation
//! - Canonical group keys for matching applicator jobs
//! - Task id validation ahead of a completion request
//! - Grouping of a task list already held by the client

use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;
use wasm_bindgen::prelude::*;

use shared::Task;

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("Invalid date '{}': {}", value, e))
}

fn parse_uuid(field: &str, value: &str) -> Result<Uuid, String> {
    Uuid::parse_str(value).map_err(|_| format!("Invalid {}: {}", field, value))
}

fn group_key(
    tank_mix_group_id: Option<&str>,
    product_id: &str,
    rate: Option<&str>,
    method: Option<&str>,
) -> Result<String, String> {
    let tank_mix = tank_mix_group_id
        .filter(|id| !id.is_empty())
        .map(|id| parse_uuid("tank mix group id", id))
        .transpose()?;
    let product_id = parse_uuid("product id", product_id)?;
    let rate = rate
        .filter(|r| !r.is_empty())
        .map(|r| {
            r.parse::<Decimal>()
                .map_err(|_| format!("Invalid rate: {}", r))
        })
        .transpose()?;
    Ok(shared::grouping::canonical_group_key(
        tank_mix, product_id, rate, method,
    ))
}

fn group_json(tasks_json: &str) -> Result<String, String> {
    let tasks: Vec<Task> =
        serde_json::from_str(tasks_json).map_err(|e| format!("Invalid tasks JSON: {}", e))?;
    serde_json::to_string(&shared::grouping::group_tasks(tasks))
        .map_err(|e| format!("Could not encode groups: {}", e))
}

/// ISO-8601 week number of a `YYYY-MM-DD` date
#[wasm_bindgen]
pub fn iso_week(date: &str) -> Result<u32, JsValue> {
    parse_date(date)
        .map(shared::week::iso_week)
        .map_err(|e| JsValue::from_str(&e))
}

/// Monday of the ISO week containing a `YYYY-MM-DD` date
#[wasm_bindgen]
pub fn week_start(date: &str) -> Result<String, JsValue> {
    parse_date(date)
        .map(|d| shared::week::week_start_date(d).to_string())
        .map_err(|e| JsValue::from_str(&e))
}

/// Week-independent key for matching an applicator job to a task group
#[wasm_bindgen]
pub fn canonical_group_key(
    tank_mix_group_id: Option<String>,
    product_id: &str,
    rate: Option<String>,
    method: Option<String>,
) -> Result<String, JsValue> {
    group_key(
        tank_mix_group_id.as_deref(),
        product_id,
        rate.as_deref(),
        method.as_deref(),
    )
    .map_err(|e| JsValue::from_str(&e))
}

/// Whether a task id will pass the server's completion check
#[wasm_bindgen]
pub fn is_valid_task_id(id: &str) -> bool {
    shared::is_valid_task_id(id)
}

/// Group a JSON task array the way the grouped task listing does
#[wasm_bindgen]
pub fn group_tasks_json(tasks_json: &str) -> Result<String, JsValue> {
    group_json(tasks_json).map_err(|e| JsValue::from_str(&e))
}
