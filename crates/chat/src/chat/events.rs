use parley_llm::{Attachment, MediaKind};

use crate::chat::message::TurnId;
use crate::media::PreviewRef;

/// Emitted when the compose area hands a turn to the orchestrator.
///
/// A video draft passes its preview reference along so the user message can
/// keep displaying it; image previews are released at submit time instead.
#[derive(Debug, PartialEq, Eq)]
pub struct SubmitPayload {
    pub text: String,
    pub attachment: Option<Attachment>,
    pub video_preview: Option<PreviewRef>,
}

impl SubmitPayload {
    /// Creates a text-only payload.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
            video_preview: None,
        }
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn with_video_preview(mut self, preview: PreviewRef) -> Self {
        self.video_preview = Some(preview);
        self
    }

    /// True when there is nothing worth sending.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.attachment.is_none()
    }

    pub fn attachment_kind(&self) -> Option<MediaKind> {
        self.attachment.as_ref().and_then(Attachment::kind)
    }
}

/// Keyboard input relevant to the compose area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub shift: bool,
    /// Ctrl/Alt/Meta.
    pub other_modifier: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Other,
}

impl KeyPress {
    pub const fn enter() -> Self {
        Self {
            key: Key::Enter,
            shift: false,
            other_modifier: false,
        }
    }

    pub const fn shift_enter() -> Self {
        Self {
            key: Key::Enter,
            shift: true,
            other_modifier: false,
        }
    }
}

/// What the compose area did with a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Plain Enter: default handling suppressed, submit requested.
    Submit,
    /// Shift+Enter: a literal newline was inserted.
    InsertedNewline,
    /// Not handled here; let the text widget apply it.
    Default,
}

/// User-facing notices shown outside the conversation log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    MicrophonePermissionDenied,
}

impl Notice {
    pub fn text(&self) -> &'static str {
        match self {
            Self::MicrophonePermissionDenied => {
                "Microphone access was denied. Allow microphone access to use dictation."
            }
        }
    }
}

/// Result of handing one payload to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Empty payload or a request already in flight; nothing changed.
    Ignored,
    /// The display attachment could not be prepared; no backend call was made.
    Aborted { turn: TurnId, reason: String },
    Answered(TurnId),
    Failed { turn: TurnId, description: String },
}
