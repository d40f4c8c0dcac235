//! UI recording and event assertions

use media_dl::{RelayReceiver, UiEvent, UiSurface};

/// UI callback as seen by the UI thread
#[derive(Clone, Debug, PartialEq)]
pub enum UiCall {
    /// Progress bar update
    Progress(f32, String),
    /// Success shown
    Success,
    /// Cancellation shown
    Canceled,
    /// Error dialog with this text
    Error(String),
    /// Start control re-enabled
    Ready,
}

/// UI that records every callback in order
#[derive(Debug, Default)]
pub struct RecordingUi {
    pub calls: Vec<UiCall>,
}

impl RecordingUi {
    /// Callbacks that end a run
    pub fn terminal_calls(&self) -> Vec<&UiCall> {
        self.calls
            .iter()
            .filter(|c| matches!(c, UiCall::Success | UiCall::Canceled | UiCall::Error(_)))
            .collect()
    }

    /// Error messages shown, in order
    pub fn errors(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                UiCall::Error(message) => Some(message.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl UiSurface for RecordingUi {
    fn on_progress(&mut self, percent: f32, status: &str) {
        self.calls.push(UiCall::Progress(percent, status.to_string()));
    }
    fn on_success(&mut self) {
        self.calls.push(UiCall::Success);
    }
    fn on_canceled(&mut self) {
        self.calls.push(UiCall::Canceled);
    }
    fn on_error(&mut self, message: &str) {
        self.calls.push(UiCall::Error(message.to_string()));
    }
    fn on_ready(&mut self) {
        self.calls.push(UiCall::Ready);
    }
}

/// Dispatch everything queued on `receiver` to a fresh recording UI
pub fn drain(receiver: &mut RelayReceiver) -> RecordingUi {
    let mut ui = RecordingUi::default();
    receiver.pump(&mut ui);
    ui
}

/// Collect queued events until `Ready` or the queue is empty
pub fn collect_until_ready(receiver: &mut RelayReceiver) -> Vec<UiEvent> {
    let mut events = Vec::new();
    while let Some(event) = receiver.try_next() {
        let ready = event == UiEvent::Ready;
        events.push(event);
        if ready {
            break;
        }
    }
    events
}

/// Assert that a run ended with exactly one terminal call followed by ready
pub fn assert_single_terminal_then_ready(ui: &RecordingUi) {
    assert_eq!(
        ui.terminal_calls().len(),
        1,
        "expected one terminal callback, got {:?}",
        ui.calls
    );
    assert_eq!(ui.calls.last(), Some(&UiCall::Ready), "ready must come last");
}
