//! HTTP handlers
//!
//! Every action answers with the [`ActionResponse`] envelope.

use axum::Json;
use shared::ActionResponse;

pub mod health;
pub mod stock;
pub mod task;

pub use health::*;
pub use stock::*;
pub use task::*;

/// JSON body of a successful action
pub type ActionJson<T> = Json<ActionResponse<T>>;

fn ok<T>(data: T) -> ActionJson<T> {
    Json(ActionResponse::ok(data))
}

fn ok_with_warning<T>(data: T, warning: Option<String>) -> ActionJson<T> {
    Json(ActionResponse::ok(data).with_warning(warning))
}
