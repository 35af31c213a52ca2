//! Business logic services for the nursery IPM subsystem

use uuid::Uuid;

pub mod stock;
pub mod task;
pub mod task_generation;

pub use stock::StockService;
pub use task::TaskService;
pub use task_generation::TaskGenerationService;

/// Who is acting and on behalf of which organization.
///
/// Resolved once per request from the verified token and passed to every
/// service call; services never look the organization up themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrgContext {
    pub actor_id: Uuid,
    pub org_id: Uuid,
}
