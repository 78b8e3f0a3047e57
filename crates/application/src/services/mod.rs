//! Application services - Use case implementations

mod pipeline_dispatcher;
mod pipeline_service;
mod session_service;

pub use pipeline_dispatcher::{
    DispatcherConfig, DispatcherHandle, PipelineDispatcher, PipelineJob, RunClaim,
};
pub use pipeline_service::{
    PipelineConfig, PipelineError, PipelineRunner, PipelineService, RunSummary,
};
pub use session_service::{INTERRUPTED_RUN_MESSAGE, SessionService};
