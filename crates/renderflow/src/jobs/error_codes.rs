#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Timeout,
    DependencyDown,
    RateLimit,
    BadPayload,
    UnknownJobType,
    RenderFailed,
    UploadFailed,
    DeliveryFailed,
    EmailTransient,
    PermanentFailure,
    Unknown,
}

impl ErrorCode {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "TIMEOUT" => Self::Timeout,
            "DEPENDENCY_DOWN" => Self::DependencyDown,
            "RATE_LIMIT" => Self::RateLimit,
            "BAD_PAYLOAD" => Self::BadPayload,
            "UNKNOWN_JOB_TYPE" => Self::UnknownJobType,
            "RENDER_FAILED" => Self::RenderFailed,
            "UPLOAD_FAILED" => Self::UploadFailed,
            "DELIVERY_FAILED" => Self::DeliveryFailed,
            "EMAIL_TRANSIENT" => Self::EmailTransient,
            "PERMANENT_FAILURE" => Self::PermanentFailure,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Timeout => "TIMEOUT",
            Self::DependencyDown => "DEPENDENCY_DOWN",
            Self::RateLimit => "RATE_LIMIT",
            Self::BadPayload => "BAD_PAYLOAD",
            Self::UnknownJobType => "UNKNOWN_JOB_TYPE",
            Self::RenderFailed => "RENDER_FAILED",
            Self::UploadFailed => "UPLOAD_FAILED",
            Self::DeliveryFailed => "DELIVERY_FAILED",
            Self::EmailTransient => "EMAIL_TRANSIENT",
            Self::PermanentFailure => "PERMANENT_FAILURE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

pub fn suggested_action(code: &str) -> &'static str {
    match ErrorCode::from_str(code) {
        ErrorCode::Timeout => {
            "Increase timeout or reduce work per job. Check downstream latency."
        }
        ErrorCode::DependencyDown => {
            "Retry later. Check dependency health and alerting."
        }
        ErrorCode::RateLimit => {
            "Back off. Lower concurrency or respect the provider's Retry-After."
        }
        ErrorCode::BadPayload => {
            "Non-retryable. Fix the producer or validate the payload schema."
        }
        ErrorCode::UnknownJobType => {
            "Non-retryable. Register a handler for this job type or stop enqueuing it."
        }
        ErrorCode::RenderFailed => {
            "Check the render provider's error detail on the execution record."
        }
        ErrorCode::UploadFailed => {
            "Artifact downloaded but storage write failed. Check object-store health; retry re-renders."
        }
        ErrorCode::DeliveryFailed => {
            "Endpoint returned an error or was unreachable. Verify the subscription URL."
        }
        ErrorCode::EmailTransient => {
            "Provider reported a transient send failure. Retry is expected to succeed."
        }
        ErrorCode::PermanentFailure => {
            "Handler classified this as permanent. No retry will be scheduled."
        }
        ErrorCode::Unknown => {
            "Inspect error_message and logs, then add a mapping for this code."
        }
    }
}
