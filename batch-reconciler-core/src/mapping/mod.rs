//! Specification to request mapping (pure, no I/O)

pub mod request_builder;
pub mod requests;

pub use request_builder::{
    create_compute_environment_request, create_job_queue_request,
    disable_compute_environment_request, disable_job_queue_request,
    update_compute_environment_request, update_job_queue_request,
};
pub use requests::{
    ComputeEnvironmentOrderEntry, ComputeResourceRequest, ComputeResourceUpdateRequest,
    CreateComputeEnvironmentRequest, CreateJobQueueRequest, UpdateComputeEnvironmentRequest,
    UpdateJobQueueRequest,
};
