pub mod attempts;
pub mod consumer;
pub mod error_codes;
pub mod handler;
pub mod maintenance;
pub mod metrics;
pub mod model;
pub mod producers;
pub mod repo;
pub mod retry;
pub mod runner;
pub mod timeline;

pub use attempts::AttemptsRepo;
pub use consumer::QueueConsumer;
pub use handler::{HandlerRegistry, JobContext, JobError, Outcome};
pub use maintenance::MaintenanceRepo;
pub use metrics::{Metrics, MetricsRepo};
pub use model::{Job, JobStatus, NewJob};
pub use producers::Producers;
pub use repo::JobsRepo;
pub use runner::JobRunner;
