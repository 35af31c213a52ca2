//! Input validation shared by the server and the browser bindings
//!
//! These checks run before any store access.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;
use uuid::Uuid;

/// Most tasks a single completion request may touch
pub const MAX_TASKS_PER_COMPLETION: usize = 100;

static TASK_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("task id pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskIdError {
    #[error("No task IDs provided")]
    Empty,

    #[error("Cannot complete more than {limit} tasks at once")]
    TooMany { limit: usize },

    #[error("Invalid task ID format")]
    InvalidFormat,
}

/// Hyphenated UUID check. Braced, URN and simple forms are rejected.
pub fn is_valid_task_id(id: &str) -> bool {
    TASK_ID_PATTERN.is_match(id)
}

/// Check the batch size and every id, returning the parsed ids
pub fn validate_task_ids(ids: &[String], limit: usize) -> Result<Vec<Uuid>, TaskIdError> {
    if ids.is_empty() {
        return Err(TaskIdError::Empty);
    }
    if ids.len() > limit {
        return Err(TaskIdError::TooMany { limit });
    }
    ids.iter()
        .map(|id| {
            if !is_valid_task_id(id) {
                return Err(TaskIdError::InvalidFormat);
            }
            Uuid::parse_str(id).map_err(|_| TaskIdError::InvalidFormat)
        })
        .collect()
}

/// A skip must say why
pub fn validate_skip_reason(reason: &str) -> Result<(), &'static str> {
    let trimmed = reason.trim();
    if trimmed.is_empty() {
        return Err("A reason is required to skip a task");
    }
    if trimmed.len() > 500 {
        return Err("Skip reason must be at most 500 characters");
    }
    Ok(())
}
