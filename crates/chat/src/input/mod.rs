/// Draft text, pending attachment and the submit gate.
pub mod compose;
/// Speech-to-text splicing into the draft.
pub mod dictation;
/// File picker, drag-and-drop and clipboard capture.
pub mod intake;

pub use compose::{AttachmentDraft, ComposeController};
pub use dictation::{
    ChannelRecognizer, DictationAdapter, DictationError, DictationState, DictationUpdate,
    RecognitionErrorKind, RecognitionEvent, RecognitionSegment, RecognitionSignal,
    RecognitionStream, RecognizerFeed, SpeechRecognizer,
};
pub use intake::{
    AttachmentIntake, CaptureSource, ClipboardPayload, DragTracker, IntakeOutcome, PasteDisposition,
};
