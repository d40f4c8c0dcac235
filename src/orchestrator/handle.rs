//! Handle to a spawned download run

use crate::cancel::CancelFlag;
use crate::classify::classify;
use crate::error::Error;
use crate::types::{DownloadOutcome, RunId};
use tokio::task::JoinHandle;

/// A download running on the tokio runtime
///
/// Dropping the handle does not stop the run; call [`RunHandle::cancel`].
#[derive(Debug)]
pub struct RunHandle {
    run: RunId,
    cancel: CancelFlag,
    task: JoinHandle<DownloadOutcome>,
}

impl RunHandle {
    pub(super) fn new(run: RunId, cancel: CancelFlag, task: JoinHandle<DownloadOutcome>) -> Self {
        Self { run, cancel, task }
    }

    /// Id carried by every UI event of this run
    pub fn run_id(&self) -> RunId {
        self.run
    }

    /// Request cancellation
    ///
    /// Takes effect before the next attempt or during a backoff wait.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// The run's cancel flag, for UIs that poll `is_cancelled`
    pub fn cancel_flag(&self) -> &CancelFlag {
        &self.cancel
    }

    /// Whether the run has ended
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run to end
    pub async fn wait(self) -> DownloadOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Download task did not complete");
                DownloadOutcome::Failed(classify(Error::Other(format!(
                    "download task did not complete: {e}"
                ))))
            }
        }
    }
}
