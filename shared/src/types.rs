//! Common types used across the platform

use serde::{Deserialize, Serialize};

/// Uniform result envelope returned by every action.
///
/// Callers branch on `success`; a `warning` on a successful response reports
/// a best-effort side effect that did not go through.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl<T> ActionResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            warning: None,
        }
    }

    pub fn with_warning(mut self, warning: Option<String>) -> Self {
        self.warning = warning;
        self
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            warning: None,
        }
    }
}

/// Outcome of one item inside a best-effort bulk operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ItemOutcome {
    Ok,
    Failed { message: String },
}

impl ItemOutcome {
    pub fn is_ok(&self) -> bool {
        matches!(self, ItemOutcome::Ok)
    }
}

impl<E: std::fmt::Display> From<Result<(), E>> for ItemOutcome {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => ItemOutcome::Ok,
            Err(e) => ItemOutcome::Failed {
                message: e.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_omits_empty_fields() {
        let ok = serde_json::to_value(ActionResponse::ok(3)).unwrap();
        assert_eq!(ok, serde_json::json!({ "success": true, "data": 3 }));

        let failed = serde_json::to_value(ActionResponse::<()>::failure("nope")).unwrap();
        assert_eq!(failed, serde_json::json!({ "success": false, "error": "nope" }));
    }

    #[test]
    fn test_item_outcome_from_result() {
        let ok: ItemOutcome = Ok::<(), String>(()).into();
        assert!(ok.is_ok());
        let failed: ItemOutcome = Err::<(), _>("boom").into();
        assert_eq!(
            failed,
            ItemOutcome::Failed {
                message: "boom".to_string()
            }
        );
    }
}
