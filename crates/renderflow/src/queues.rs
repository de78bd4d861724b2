use crate::jobs::retry::Backoff;

/// The five logical queues. Each has a fixed retry/retention policy; worker
/// concurrency can be overridden per queue from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueName {
    Render,
    Email,
    Webhook,
    FileCleanup,
    Analytics,
}

impl QueueName {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueName::Render => "render",
            QueueName::Email => "email",
            QueueName::Webhook => "webhook",
            QueueName::FileCleanup => "file-cleanup",
            QueueName::Analytics => "analytics",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "render" => Some(QueueName::Render),
            "email" => Some(QueueName::Email),
            "webhook" => Some(QueueName::Webhook),
            "file-cleanup" => Some(QueueName::FileCleanup),
            "analytics" => Some(QueueName::Analytics),
            _ => None,
        }
    }

    pub fn all() -> [QueueName; 5] {
        [
            QueueName::Render,
            QueueName::Email,
            QueueName::Webhook,
            QueueName::FileCleanup,
            QueueName::Analytics,
        ]
    }

    pub fn spec(&self) -> QueueSpec {
        spec_for(*self)
    }
}

#[derive(Debug, Clone)]
pub struct QueueSpec {
    pub name: QueueName,
    pub max_attempts: i32,
    pub backoff: Backoff,
    pub default_concurrency: usize,
    concurrency_env: &'static str,
    /// Retention for terminal jobs (maintenance sweep).
    pub keep_succeeded: i64,
    pub succeeded_max_age_hours: i64,
    pub keep_failed: i64,
}

impl QueueSpec {
    /// Bounded worker concurrency, overridable per queue from the
    /// environment (e.g. RENDER_WORKER_CONCURRENCY=5).
    pub fn concurrency(&self) -> usize {
        std::env::var(self.concurrency_env)
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &usize| *n >= 1)
            .unwrap_or(self.default_concurrency)
    }
}

pub fn spec_for(name: QueueName) -> QueueSpec {
    match name {
        QueueName::Render => QueueSpec {
            name,
            max_attempts: 3,
            backoff: Backoff::Exponential { base_ms: 5_000 },
            default_concurrency: 3,
            concurrency_env: "RENDER_WORKER_CONCURRENCY",
            keep_succeeded: 1_000,
            succeeded_max_age_hours: 24,
            keep_failed: 5_000,
        },
        QueueName::Email => QueueSpec {
            name,
            max_attempts: 3,
            backoff: Backoff::Exponential { base_ms: 2_000 },
            default_concurrency: 5,
            concurrency_env: "EMAIL_WORKER_CONCURRENCY",
            keep_succeeded: 1_000,
            succeeded_max_age_hours: 24,
            keep_failed: 5_000,
        },
        QueueName::Webhook => QueueSpec {
            name,
            max_attempts: 3,
            backoff: Backoff::Exponential { base_ms: 1_000 },
            default_concurrency: 10,
            concurrency_env: "WEBHOOK_WORKER_CONCURRENCY",
            keep_succeeded: 1_000,
            succeeded_max_age_hours: 24,
            keep_failed: 5_000,
        },
        QueueName::FileCleanup => QueueSpec {
            name,
            max_attempts: 1,
            backoff: Backoff::None,
            default_concurrency: 5,
            concurrency_env: "CLEANUP_WORKER_CONCURRENCY",
            keep_succeeded: 500,
            succeeded_max_age_hours: 24,
            keep_failed: 1_000,
        },
        QueueName::Analytics => QueueSpec {
            name,
            max_attempts: 5,
            backoff: Backoff::Fixed { delay_ms: 1_000 },
            default_concurrency: 10,
            concurrency_env: "ANALYTICS_WORKER_CONCURRENCY",
            keep_succeeded: 500,
            succeeded_max_age_hours: 6,
            keep_failed: 1_000,
        },
    }
}
