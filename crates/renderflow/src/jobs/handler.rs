use crate::jobs::Job;
use std::{collections::HashMap, pin::Pin, sync::Arc, time::Duration};
use tokio::time::timeout;

pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;
type HandlerFn = dyn for<'a> Fn(&'a Job, &'a JobContext) -> BoxFuture<'a, Result<Outcome, JobError>>
    + Send
    + Sync;

/// What a handler hands back to the consumer.
///
/// `PermanentFailure` is the soft-failure path: the job is marked succeeded
/// with the failure recorded in its result, and no retry is scheduled no
/// matter how much attempt budget remains. Throwing `JobError` is the only
/// path into the retry machinery.
#[derive(Debug, Clone)]
pub enum Outcome {
    Success(serde_json::Value),
    PermanentFailure { reason: String },
}

#[derive(Debug)]
pub struct JobError {
    pub code: &'static str,
    pub message: String,
}

impl JobError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for JobError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for JobError {}

/// Per-execution context handed to handlers. The attempt number comes from
/// the broker's attempt counter, so handlers never track their own.
#[derive(Clone)]
pub struct JobContext {
    pub worker_id: String,
    pub attempt_no: i32,
}

#[derive(Clone)]
pub struct HandlerEntry {
    handler: Arc<HandlerFn>,
    timeout: Option<Duration>,
}

impl HandlerEntry {
    pub async fn run(&self, job: &Job, ctx: &JobContext) -> Result<Outcome, JobError> {
        let fut = (self.handler)(job, ctx);
        match self.timeout {
            Some(dur) => match timeout(dur, fut).await {
                Ok(inner) => inner,
                Err(_) => Err(JobError::new(
                    "TIMEOUT",
                    format!("handler timeout after {}ms", dur.as_millis()),
                )),
            },
            None => fut.await,
        }
    }
}

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, HandlerEntry>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, job_type: &str, handler: F)
    where
        F: for<'a> Fn(&'a Job, &'a JobContext) -> BoxFuture<'a, Result<Outcome, JobError>>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(
            job_type.to_string(),
            HandlerEntry {
                handler: Arc::new(handler),
                timeout: None,
            },
        );
    }

    pub fn register_with_timeout<F>(&mut self, job_type: &str, handler: F, timeout_dur: Duration)
    where
        F: for<'a> Fn(&'a Job, &'a JobContext) -> BoxFuture<'a, Result<Outcome, JobError>>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(
            job_type.to_string(),
            HandlerEntry {
                handler: Arc::new(handler),
                timeout: Some(timeout_dur),
            },
        );
    }

    pub fn handler_for(&self, job_type: &str) -> Option<HandlerEntry> {
        self.handlers.get(job_type).cloned()
    }
}

pub fn parse_payload<T: for<'de> serde::Deserialize<'de>>(job: &Job) -> Result<T, JobError> {
    serde_json::from_value(job.payload_json.clone())
        .map_err(|e| JobError::new("BAD_PAYLOAD", e.to_string()))
}

pub fn boxed<'a, T>(fut: impl std::future::Future<Output = T> + Send + 'a) -> BoxFuture<'a, T> {
    Box::pin(fut)
}
