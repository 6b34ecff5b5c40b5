//! Run orchestration: submission, execution supervision, cancellation and
//! bounded history.

pub mod history;
pub mod notifier;
pub mod orchestrator;

pub use history::{RunHistory, DEFAULT_HISTORY_CAPACITY};
pub use notifier::RunNotifier;
pub use orchestrator::RunOrchestrator;
