pub mod email;
pub mod events;
pub mod storage;
pub mod telemetry;

pub use email::{EmailError, EmailMessage, EmailReceipt, EmailSender};
pub use events::ProgressBroadcaster;
pub use storage::{ObjectStore, StoredObject};
pub use telemetry::{AnalyticsSink, ErrorTracker};
