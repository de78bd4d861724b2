pub mod client;
pub mod executions;
pub mod orchestrator;

pub use client::{HttpRenderApi, RenderApi, RenderJobState, RenderRequest, RenderStatus};
pub use executions::{ExecutionStatus, ExecutionsRepo, RenderExecution};
pub use orchestrator::RenderOrchestrator;
