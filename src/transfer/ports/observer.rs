//! Progress observer port.

use crate::transfer::domain::TransferStep;
use tokio::sync::mpsc::UnboundedSender;

/// Receives step notifications as the pipeline advances.
///
/// Notifications are fire-and-forget: an observer must not block.
pub trait StepObserver: Send + Sync {
    /// Called when `step` begins.
    fn step_started(&self, step: TransferStep);
}

/// Discards all notifications.
impl StepObserver for () {
    fn step_started(&self, _step: TransferStep) {}
}

/// Forwards notifications to a channel; a closed receiver is ignored.
impl StepObserver for UnboundedSender<TransferStep> {
    fn step_started(&self, step: TransferStep) {
        if self.send(step).is_err() {
            tracing::trace!(?step, "step receiver closed");
        }
    }
}
