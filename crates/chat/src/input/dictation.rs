use std::sync::Arc;

use parking_lot::Mutex;
use snafu::Snafu;
use tokio::sync::mpsc;

use crate::chat::events::Notice;
use crate::input::compose::ComposeController;

/// One recognized piece of speech.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognitionSegment {
    pub is_final: bool,
    pub transcript: String,
}

impl RecognitionSegment {
    pub fn finalized(transcript: impl Into<String>) -> Self {
        Self {
            is_final: true,
            transcript: transcript.into(),
        }
    }

    pub fn interim(transcript: impl Into<String>) -> Self {
        Self {
            is_final: false,
            transcript: transcript.into(),
        }
    }
}

/// Segments delivered since the previous event; finalized ones are never repeated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecognitionEvent {
    pub segments: Vec<RecognitionSegment>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    PermissionDenied,
    Other(String),
}

impl RecognitionErrorKind {
    /// Maps platform error codes; `not-allowed` style codes mean the user said no.
    pub fn from_code(code: &str) -> Self {
        match code {
            "not-allowed" | "service-not-allowed" | "permission-denied" => Self::PermissionDenied,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionSignal {
    Result(RecognitionEvent),
    Error(RecognitionErrorKind),
    Ended,
}

pub type RecognitionStream = mpsc::UnboundedReceiver<RecognitionSignal>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DictationError {
    #[snafu(display("microphone permission denied"))]
    PermissionDenied { stage: &'static str },
    #[snafu(display("speech recognition failed to start on `{stage}`: {reason}"))]
    StartFailed { stage: &'static str, reason: String },
}

/// Platform speech-recognition capability.
pub trait SpeechRecognizer: Send {
    /// Starts a session; recognition signals arrive on the returned stream.
    fn start(&mut self) -> Result<RecognitionStream, DictationError>;
    fn stop(&mut self);
}

/// Recognizer fed by platform glue through a [`RecognizerFeed`].
#[derive(Debug, Default)]
pub struct ChannelRecognizer {
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<RecognitionSignal>>>>,
}

/// Sending half handed to the platform callbacks.
#[derive(Debug, Clone)]
pub struct RecognizerFeed {
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<RecognitionSignal>>>>,
}

impl ChannelRecognizer {
    pub fn new() -> (Self, RecognizerFeed) {
        let recognizer = Self::default();
        let feed = RecognizerFeed {
            sender: recognizer.sender.clone(),
        };
        (recognizer, feed)
    }
}

impl SpeechRecognizer for ChannelRecognizer {
    fn start(&mut self) -> Result<RecognitionStream, DictationError> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.sender.lock() = Some(tx);
        Ok(rx)
    }

    fn stop(&mut self) {
        self.sender.lock().take();
    }
}

impl RecognizerFeed {
    /// Returns `false` when no session is listening.
    pub fn push(&self, signal: RecognitionSignal) -> bool {
        self.sender
            .lock()
            .as_ref()
            .is_some_and(|sender| sender.send(signal).is_ok())
    }

    pub fn is_listening(&self) -> bool {
        self.sender.lock().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DictationState {
    #[default]
    Idle,
    Recording,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictationUpdate {
    Unchanged,
    Started,
    TextChanged,
    Stopped { notice: Option<Notice> },
}

/// Splices recognized speech into the compose draft.
pub struct DictationAdapter {
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    state: DictationState,
    events: Option<RecognitionStream>,
    needs_separator: bool,
    /// The permission notice is shown once per adapter.
    denial_reported: bool,
}

impl DictationAdapter {
    pub fn new(recognizer: Option<Box<dyn SpeechRecognizer>>) -> Self {
        Self {
            recognizer,
            state: DictationState::Idle,
            events: None,
            needs_separator: false,
            denial_reported: false,
        }
    }

    /// Adapter for platforms without speech recognition; every call is inert.
    pub fn unsupported() -> Self {
        Self::new(None)
    }

    pub fn is_supported(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn state(&self) -> DictationState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == DictationState::Recording
    }

    pub fn toggle(&mut self, compose: &mut ComposeController) -> DictationUpdate {
        match self.state {
            DictationState::Idle => self.start(compose),
            DictationState::Recording => {
                self.stop();
                DictationUpdate::Stopped { notice: None }
            }
        }
    }

    pub fn start(&mut self, compose: &mut ComposeController) -> DictationUpdate {
        if self.is_recording() {
            return DictationUpdate::Unchanged;
        }
        let Some(recognizer) = self.recognizer.as_mut() else {
            return DictationUpdate::Unchanged;
        };

        match recognizer.start() {
            Ok(events) => {
                let base = compose.text().to_string();
                self.needs_separator = !base.is_empty() && !base.ends_with(char::is_whitespace);
                compose.set_dictation_base(base);
                self.events = Some(events);
                self.state = DictationState::Recording;
                tracing::debug!("dictation started");
                DictationUpdate::Started
            }
            Err(DictationError::PermissionDenied { .. }) => {
                tracing::info!("dictation start refused: microphone permission denied");
                self.permission_denied()
            }
            Err(error) => {
                tracing::debug!(error = %error, "dictation failed to start");
                DictationUpdate::Stopped { notice: None }
            }
        }
    }

    /// Stops recording and unsubscribes. Text already spliced in stays.
    pub fn stop(&mut self) {
        if !self.is_recording() {
            return;
        }
        if let Some(recognizer) = self.recognizer.as_mut() {
            recognizer.stop();
        }
        self.events = None;
        self.state = DictationState::Idle;
        self.needs_separator = false;
        tracing::debug!("dictation stopped");
    }

    /// Waits for the next signal of the current session.
    pub async fn next_signal(&mut self) -> Option<RecognitionSignal> {
        match self.events.as_mut() {
            Some(events) => events.recv().await,
            None => None,
        }
    }

    /// Applies every signal already queued. Returns the most significant update.
    pub fn poll(&mut self, compose: &mut ComposeController) -> DictationUpdate {
        let mut latest = DictationUpdate::Unchanged;
        loop {
            let Some(events) = self.events.as_mut() else {
                return latest;
            };
            let signal = match events.try_recv() {
                Ok(signal) => signal,
                Err(mpsc::error::TryRecvError::Empty) => return latest,
                Err(mpsc::error::TryRecvError::Disconnected) => RecognitionSignal::Ended,
            };

            let update = self.handle(signal, compose);
            if matches!(update, DictationUpdate::Stopped { .. }) {
                return update;
            }
            if update != DictationUpdate::Unchanged {
                latest = update;
            }
        }
    }

    pub fn handle(
        &mut self,
        signal: RecognitionSignal,
        compose: &mut ComposeController,
    ) -> DictationUpdate {
        if !self.is_recording() {
            return DictationUpdate::Unchanged;
        }

        match signal {
            RecognitionSignal::Result(event) => self.apply_event(event, compose),
            RecognitionSignal::Error(RecognitionErrorKind::PermissionDenied) => {
                tracing::info!("dictation stopped: microphone permission denied");
                self.stop();
                self.permission_denied()
            }
            RecognitionSignal::Error(RecognitionErrorKind::Other(code)) => {
                tracing::debug!(code = %code, "dictation stopped after recognition error");
                self.stop();
                DictationUpdate::Stopped { notice: None }
            }
            RecognitionSignal::Ended => {
                self.stop();
                DictationUpdate::Stopped { notice: None }
            }
        }
    }

    fn permission_denied(&mut self) -> DictationUpdate {
        let notice = (!self.denial_reported).then_some(Notice::MicrophonePermissionDenied);
        self.denial_reported = true;
        DictationUpdate::Stopped { notice }
    }

    fn apply_event(
        &mut self,
        event: RecognitionEvent,
        compose: &mut ComposeController,
    ) -> DictationUpdate {
        let mut finalized = String::new();
        let mut interim = String::new();
        for segment in event.segments {
            if segment.is_final {
                finalized.push_str(&segment.transcript);
            } else {
                interim.push_str(&segment.transcript);
            }
        }

        let mut base = compose.dictation_base().to_string();
        let separator = if self.needs_separator && !(finalized.is_empty() && interim.is_empty()) {
            " "
        } else {
            ""
        };

        let text = if finalized.is_empty() {
            format!("{base}{separator}{interim}")
        } else {
            base.push_str(separator);
            base.push_str(&finalized);
            self.needs_separator = false;
            compose.set_dictation_base(base.clone());
            format!("{base}{interim}")
        };

        if text == compose.text() {
            return DictationUpdate::Unchanged;
        }
        compose.set_text(text);
        DictationUpdate::TextChanged
    }
}

impl Drop for DictationAdapter {
    fn drop(&mut self) {
        self.stop();
    }
}
