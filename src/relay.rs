//! Progress relay between download workers and a single-threaded UI
//!
//! Workers push [`UiEvent`]s through a [`RelaySender`] (or the
//! [`ProgressSink`] handed to engines) from any thread. The UI owns the
//! [`RelayReceiver`] and drains it on its own loop, so every [`UiSurface`]
//! callback runs on the UI thread.
//!
//! Order is preserved. Consecutive progress updates from the same run may be
//! merged into the latest one; terminal and ready events are always delivered.
//!
//! Every event carries the [`RunId`] of the run that sent it. A UI that lets
//! several runs overlap reads [`RelayReceiver::next_tagged`] and keys its
//! state by run; the plain [`RelayReceiver::next`] and [`RelayReceiver::pump`]
//! suit UIs that allow one run at a time.

use crate::cancel::CancelFlag;
use crate::classify::ErrorKind;
use crate::types::{DownloadOutcome, EngineProgress, RunEvent, RunId, UiEvent};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};

/// UI callbacks, invoked only from the dispatch loop
pub trait UiSurface {
    /// Progress bar and status line update
    fn on_progress(&mut self, percent: f32, status: &str);
    /// The run completed successfully
    fn on_success(&mut self);
    /// The run was canceled
    fn on_canceled(&mut self);
    /// The run failed; `message` is safe to display
    fn on_error(&mut self, message: &str);
    /// The run is over and the start control may be re-enabled
    fn on_ready(&mut self);
}

/// Constructor for relay channel pairs
pub struct ProgressRelay;

impl ProgressRelay {
    /// Create a connected sender/receiver pair
    pub fn channel() -> (RelaySender, RelayReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            RelaySender {
                tx,
                run: RunId::default(),
            },
            RelayReceiver {
                rx,
                pending: None,
            },
        )
    }
}

/// Worker-side handle
#[derive(Clone, Debug)]
pub struct RelaySender {
    tx: UnboundedSender<RunEvent>,
    run: RunId,
}

impl RelaySender {
    /// A sender on the same channel that tags its events with `run`
    pub fn for_run(&self, run: RunId) -> RelaySender {
        RelaySender {
            tx: self.tx.clone(),
            run,
        }
    }

    /// Run this sender tags events with
    pub fn run_id(&self) -> RunId {
        self.run
    }

    /// Queue an event for the UI
    ///
    /// Events sent after the UI has gone away are dropped.
    pub fn send(&self, event: UiEvent) {
        let event = RunEvent {
            run: self.run,
            event,
        };
        if self.tx.send(event).is_err() {
            tracing::trace!(run = %self.run, "UI receiver closed, dropping event");
        }
    }

    /// Progress handle for engines
    pub fn progress_sink(&self) -> ProgressSink {
        ProgressSink {
            sender: self.clone(),
        }
    }
}

/// Progress reporter handed to a [`crate::engine::DownloadEngine`]
#[derive(Clone, Debug)]
pub struct ProgressSink {
    sender: RelaySender,
}

impl ProgressSink {
    /// Report raw engine figures
    pub fn report(&self, progress: &EngineProgress) {
        self.sender.send(UiEvent::Progress {
            percent: progress.resolved_percent(),
            status: progress.status_text(),
        });
    }

    /// Report a status line with an explicit percentage
    pub fn status(&self, percent: f32, status: impl Into<String>) {
        self.sender.send(UiEvent::Progress {
            percent: percent.clamp(0.0, 100.0),
            status: status.into(),
        });
    }
}

/// UI-side handle
#[derive(Debug)]
pub struct RelayReceiver {
    rx: UnboundedReceiver<RunEvent>,
    pending: Option<RunEvent>,
}

impl RelayReceiver {
    /// Wait for the next event
    ///
    /// Returns `None` once every sender is gone and the queue is empty.
    pub async fn next(&mut self) -> Option<UiEvent> {
        self.next_tagged().await.map(|tagged| tagged.event)
    }

    /// Wait for the next event along with the run that sent it
    pub async fn next_tagged(&mut self) -> Option<RunEvent> {
        let first = match self.pending.take() {
            Some(event) => event,
            None => self.rx.recv().await?,
        };
        Some(self.coalesce(first))
    }

    /// Take the next queued event without waiting
    pub fn try_next(&mut self) -> Option<UiEvent> {
        self.try_next_tagged().map(|tagged| tagged.event)
    }

    /// Take the next queued event and its run without waiting
    pub fn try_next_tagged(&mut self) -> Option<RunEvent> {
        let first = match self.pending.take() {
            Some(event) => event,
            None => self.rx.try_recv().ok()?,
        };
        Some(self.coalesce(first))
    }

    /// Dispatch everything queued right now, for frame-driven UIs
    ///
    /// Returns the number of callbacks invoked.
    pub fn pump(&mut self, ui: &mut dyn UiSurface) -> usize {
        let mut dispatched = 0;
        while let Some(event) = self.try_next() {
            dispatch(ui, event);
            dispatched += 1;
        }
        dispatched
    }

    /// Dispatch events until every sender is dropped
    pub async fn run<U: UiSurface>(mut self, ui: &mut U) {
        while let Some(event) = self.next().await {
            dispatch(ui, event);
        }
    }

    /// Merge queued progress updates of the same run that directly follow `first`
    fn coalesce(&mut self, first: RunEvent) -> RunEvent {
        if !matches!(first.event, UiEvent::Progress { .. }) {
            return first;
        }

        let mut latest = first;
        loop {
            match self.rx.try_recv() {
                Ok(next)
                    if next.run == latest.run && matches!(next.event, UiEvent::Progress { .. }) =>
                {
                    latest = next
                }
                Ok(other) => {
                    self.pending = Some(other);
                    break;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        latest
    }
}

/// Invoke the callback matching `event`
pub fn dispatch(ui: &mut dyn UiSurface, event: UiEvent) {
    match event {
        UiEvent::Progress { percent, status } => ui.on_progress(percent, &status),
        UiEvent::Succeeded => ui.on_success(),
        UiEvent::Canceled => ui.on_canceled(),
        UiEvent::Failed { message } => ui.on_error(&message),
        UiEvent::Ready => ui.on_ready(),
    }
}

/// Guarantees one terminal event and one ready event per run
///
/// If the run ends without calling [`RunReporter::report`] (early return,
/// panic, or the task being dropped), the reporter sends `Canceled` when
/// cancellation was requested and a generic failure otherwise.
#[derive(Debug)]
pub struct RunReporter {
    sender: RelaySender,
    cancel: CancelFlag,
    finished: bool,
}

impl RunReporter {
    /// Start reporting for one run
    pub fn new(sender: RelaySender, cancel: CancelFlag) -> Self {
        Self {
            sender,
            cancel,
            finished: false,
        }
    }

    /// Report the run's outcome, then ready
    pub fn report(mut self, outcome: &DownloadOutcome) {
        let event = match outcome {
            DownloadOutcome::Succeeded => {
                self.sender.send(UiEvent::Progress {
                    percent: 100.0,
                    status: "Download complete!".to_string(),
                });
                UiEvent::Succeeded
            }
            DownloadOutcome::Canceled => UiEvent::Canceled,
            DownloadOutcome::Failed(error) => UiEvent::Failed {
                message: error.user_message.clone(),
            },
        };
        self.finish(event);
    }

    fn finish(&mut self, event: UiEvent) {
        if self.finished {
            return;
        }
        self.finished = true;
        self.sender.send(event);
        self.sender.send(UiEvent::Ready);
    }
}

impl Drop for RunReporter {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let event = if self.cancel.is_cancelled() {
            UiEvent::Canceled
        } else {
            tracing::warn!("Download run ended without reporting an outcome");
            UiEvent::Failed {
                message: ErrorKind::Unknown.user_message().to_string(),
            }
        };
        self.finish(event);
    }
}
