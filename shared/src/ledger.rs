//! Bottle ledger rules
//!
//! Each operation computes the bottle's next state and the movement that
//! records it. For every step, `remaining_after_ml` equals the bottle's
//! previous `remaining_ml` plus `quantity_ml`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{Bottle, BottleStatus, BottleUpdate, MovementType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("Quantity must be positive")]
    NonPositiveQuantity,

    #[error("Bottle {code} is {status} and cannot be changed")]
    NotUsable { code: String, status: BottleStatus },

    #[error("Bottle {code} is {status}, only sealed bottles can be opened")]
    NotSealed { code: String, status: BottleStatus },

    #[error("Requested {requested} ml but only {remaining} ml remain")]
    Insufficient {
        requested: Decimal,
        remaining: Decimal,
    },

    #[error("Level must be between 0 and {max} ml")]
    LevelOutOfRange { max: Decimal },
}

/// Next bottle state plus the movement describing the change
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerStep {
    pub update: BottleUpdate,
    pub movement_type: MovementType,
    pub quantity_ml: Decimal,
    pub remaining_after_ml: Decimal,
}

/// Break the seal on a bottle
pub fn open(bottle: &Bottle, now: DateTime<Utc>) -> Result<LedgerStep, LedgerError> {
    if bottle.status != BottleStatus::Sealed {
        return Err(LedgerError::NotSealed {
            code: bottle.bottle_code.clone(),
            status: bottle.status,
        });
    }
    Ok(LedgerStep {
        update: BottleUpdate {
            status: BottleStatus::Open,
            remaining_ml: bottle.remaining_ml,
            opened_at: Some(now),
            disposed_at: None,
        },
        movement_type: MovementType::Open,
        quantity_ml: Decimal::ZERO,
        remaining_after_ml: bottle.remaining_ml,
    })
}

/// Draw product from a bottle. Sealed bottles are opened on first use.
pub fn usage(
    bottle: &Bottle,
    quantity_ml: Decimal,
    now: DateTime<Utc>,
) -> Result<LedgerStep, LedgerError> {
    ensure_usable(bottle)?;
    if quantity_ml <= Decimal::ZERO {
        return Err(LedgerError::NonPositiveQuantity);
    }
    if quantity_ml > bottle.remaining_ml {
        return Err(LedgerError::Insufficient {
            requested: quantity_ml,
            remaining: bottle.remaining_ml,
        });
    }

    let remaining = bottle.remaining_ml - quantity_ml;
    Ok(LedgerStep {
        update: BottleUpdate {
            status: level_status(remaining),
            remaining_ml: remaining,
            opened_at: bottle.opened_at.or(Some(now)),
            disposed_at: None,
        },
        movement_type: MovementType::Usage,
        quantity_ml: -quantity_ml,
        remaining_after_ml: remaining,
    })
}

/// Set the level directly, e.g. after a spill or a stock count
pub fn adjustment(
    bottle: &Bottle,
    new_remaining_ml: Decimal,
    now: DateTime<Utc>,
) -> Result<LedgerStep, LedgerError> {
    ensure_usable(bottle)?;
    if new_remaining_ml < Decimal::ZERO || new_remaining_ml > bottle.volume_ml {
        return Err(LedgerError::LevelOutOfRange {
            max: bottle.volume_ml,
        });
    }

    let delta = new_remaining_ml - bottle.remaining_ml;
    let status = if delta.is_zero() && bottle.status == BottleStatus::Sealed {
        BottleStatus::Sealed
    } else {
        level_status(new_remaining_ml)
    };
    let opened_at = match status {
        BottleStatus::Sealed => bottle.opened_at,
        _ => bottle.opened_at.or(Some(now)),
    };

    Ok(LedgerStep {
        update: BottleUpdate {
            status,
            remaining_ml: new_remaining_ml,
            opened_at,
            disposed_at: None,
        },
        movement_type: MovementType::Adjustment,
        quantity_ml: delta,
        remaining_after_ml: new_remaining_ml,
    })
}

/// Write a bottle off. Empty bottles can still be disposed.
pub fn disposal(bottle: &Bottle, now: DateTime<Utc>) -> Result<LedgerStep, LedgerError> {
    if bottle.status == BottleStatus::Disposed {
        return Err(LedgerError::NotUsable {
            code: bottle.bottle_code.clone(),
            status: bottle.status,
        });
    }
    Ok(LedgerStep {
        update: BottleUpdate {
            status: BottleStatus::Disposed,
            remaining_ml: Decimal::ZERO,
            opened_at: bottle.opened_at,
            disposed_at: Some(now),
        },
        movement_type: MovementType::Disposal,
        quantity_ml: -bottle.remaining_ml,
        remaining_after_ml: Decimal::ZERO,
    })
}

fn ensure_usable(bottle: &Bottle) -> Result<(), LedgerError> {
    if bottle.status.is_usable() {
        Ok(())
    } else {
        Err(LedgerError::NotUsable {
            code: bottle.bottle_code.clone(),
            status: bottle.status,
        })
    }
}

fn level_status(remaining: Decimal) -> BottleStatus {
    if remaining.is_zero() {
        BottleStatus::Empty
    } else {
        BottleStatus::Open
    }
}
