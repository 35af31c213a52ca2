//! Chemical stock models: bottles and the movement ledger

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownVariant;

/// A physical container of product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bottle {
    pub id: Uuid,
    pub org_id: Uuid,
    pub product_id: Uuid,
    /// Server-generated label code, e.g. "FUN-0012"
    pub bottle_code: String,
    pub status: BottleStatus,
    pub volume_ml: Decimal,
    pub remaining_ml: Decimal,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub purchase_date: Option<NaiveDate>,
    pub opened_at: Option<DateTime<Utc>>,
    pub disposed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum BottleStatus {
    #[default]
    Sealed,
    Open,
    Empty,
    Disposed,
}

impl BottleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BottleStatus::Sealed => "sealed",
            BottleStatus::Open => "open",
            BottleStatus::Empty => "empty",
            BottleStatus::Disposed => "disposed",
        }
    }

    /// Whether product can still be drawn from the bottle
    pub fn is_usable(&self) -> bool {
        matches!(self, BottleStatus::Sealed | BottleStatus::Open)
    }
}

impl FromStr for BottleStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sealed" => Ok(BottleStatus::Sealed),
            "open" => Ok(BottleStatus::Open),
            "empty" => Ok(BottleStatus::Empty),
            "disposed" => Ok(BottleStatus::Disposed),
            other => Err(UnknownVariant::new("bottle status", other)),
        }
    }
}

impl std::fmt::Display for BottleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stock movement types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    Open,
    Usage,
    Adjustment,
    Disposal,
}

impl MovementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementType::Open => "open",
            MovementType::Usage => "usage",
            MovementType::Adjustment => "adjustment",
            MovementType::Disposal => "disposal",
        }
    }
}

impl FromStr for MovementType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(MovementType::Open),
            "usage" => Ok(MovementType::Usage),
            "adjustment" => Ok(MovementType::Adjustment),
            "disposal" => Ok(MovementType::Disposal),
            other => Err(UnknownVariant::new("movement type", other)),
        }
    }
}

/// Append-only ledger entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockMovement {
    pub id: Uuid,
    pub org_id: Uuid,
    pub bottle_id: Uuid,
    pub product_id: Uuid,
    pub movement_type: MovementType,
    /// Signed change in millilitres
    pub quantity_ml: Decimal,
    /// Bottle level right after this movement
    pub remaining_after_ml: Decimal,
    pub location_id: Option<Uuid>,
    pub ipm_task_id: Option<Uuid>,
    pub notes: Option<String>,
    pub recorded_by: Option<Uuid>,
    pub recorded_at: DateTime<Utc>,
}

/// Bottle ready to be inserted
#[derive(Debug, Clone, PartialEq)]
pub struct NewBottle {
    pub org_id: Uuid,
    pub product_id: Uuid,
    pub bottle_code: String,
    pub volume_ml: Decimal,
    pub batch_number: Option<String>,
    pub expiry_date: Option<NaiveDate>,
    pub purchase_date: Option<NaiveDate>,
}

/// Movement ready to be appended
#[derive(Debug, Clone, PartialEq)]
pub struct NewMovement {
    pub org_id: Uuid,
    pub bottle_id: Uuid,
    pub product_id: Uuid,
    pub movement_type: MovementType,
    pub quantity_ml: Decimal,
    pub remaining_after_ml: Decimal,
    pub location_id: Option<Uuid>,
    pub ipm_task_id: Option<Uuid>,
    pub notes: Option<String>,
    pub recorded_by: Option<Uuid>,
}

/// New state of a bottle after a ledger operation
#[derive(Debug, Clone, PartialEq)]
pub struct BottleUpdate {
    pub status: BottleStatus,
    pub remaining_ml: Decimal,
    pub opened_at: Option<DateTime<Utc>>,
    pub disposed_at: Option<DateTime<Utc>>,
}

/// Stock on hand for one product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductStockSummary {
    pub product_id: Uuid,
    pub sealed_bottles: i64,
    pub open_bottles: i64,
    pub total_remaining_ml: Decimal,
}
