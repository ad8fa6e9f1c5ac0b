use tracing::{debug, info};

/// One-way progress notifications. The pipeline never depends on what a
/// sink does with them.
pub trait ProgressSink: Send + Sync {
    /// `overall` marks run-level summaries as opposed to per-document
    /// percentage updates.
    fn on_progress(&self, message: &str, overall: bool);
}

/// Default sink: run summaries at info, per-document updates at debug.
pub struct TracingProgressSink;

impl ProgressSink for TracingProgressSink {
    fn on_progress(&self, message: &str, overall: bool) {
        if overall {
            info!("{message}");
        } else {
            debug!("{message}");
        }
    }
}
