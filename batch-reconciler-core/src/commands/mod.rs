//! Commands module - reconciler operations over AWS Batch resources

mod apply;
mod plan;
mod reconcile;
pub mod resource;
pub(crate) mod service;

pub use apply::{ApplyReport, ResourceOutcome};
pub use plan::{
    diff_compute_environment, diff_job_queue, FieldChange, Plan, PlanEntry, PlannedAction,
};
pub use service::BatchReconcilerService;
