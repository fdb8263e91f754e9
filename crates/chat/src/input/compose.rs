use std::sync::Arc;

use parley_llm::{Attachment, MediaKind};

use crate::chat::events::{Key, KeyOutcome, KeyPress, SubmitPayload};
use crate::media::{PreviewRef, PreviewRegistry};

/// The single pending attachment and its preview reference.
#[derive(Debug)]
pub struct AttachmentDraft {
    file: Attachment,
    preview: PreviewRef,
    kind: MediaKind,
}

impl AttachmentDraft {
    pub fn file(&self) -> &Attachment {
        &self.file
    }

    pub fn preview_url(&self) -> &str {
        self.preview.url()
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }
}

/// Owns the draft text, the pending attachment and the dictation base text.
pub struct ComposeController {
    text: String,
    attachment: Option<AttachmentDraft>,
    dictation_base: String,
    previews: Arc<PreviewRegistry>,
}

impl ComposeController {
    pub fn new(previews: Arc<PreviewRegistry>) -> Self {
        Self {
            text: String::new(),
            attachment: None,
            dictation_base: String::new(),
            previews,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Replaces the draft text, as a keystroke in the text widget would.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn attachment(&self) -> Option<&AttachmentDraft> {
        self.attachment.as_ref()
    }

    pub fn dictation_base(&self) -> &str {
        &self.dictation_base
    }

    pub(crate) fn set_dictation_base(&mut self, base: String) {
        self.dictation_base = base;
    }

    /// Installs a new attachment, releasing the previous draft's preview first.
    pub fn install_attachment(&mut self, file: Attachment, kind: MediaKind) {
        self.remove_attachment();
        let preview = self.previews.acquire(&file);
        tracing::debug!(
            name = %file.name(),
            kind = kind.label(),
            preview = %preview.url(),
            "attachment draft installed"
        );
        self.attachment = Some(AttachmentDraft {
            file,
            preview,
            kind,
        });
    }

    /// Drops the pending attachment. Returns whether there was one.
    pub fn remove_attachment(&mut self) -> bool {
        let Some(draft) = self.attachment.take() else {
            return false;
        };
        self.previews.release(draft.preview);
        true
    }

    pub fn can_submit(&self, in_flight: bool) -> bool {
        !in_flight && (!self.text.trim().is_empty() || self.attachment.is_some())
    }

    /// Builds the payload and clears the whole draft, or does nothing.
    ///
    /// Image previews are released here; a video preview moves into the
    /// payload because the user message keeps displaying it.
    pub fn submit(&mut self, in_flight: bool) -> Option<SubmitPayload> {
        if !self.can_submit(in_flight) {
            return None;
        }

        let mut payload = SubmitPayload::text(self.text.trim());
        if let Some(draft) = self.attachment.take() {
            match draft.kind {
                MediaKind::Video => payload = payload.with_video_preview(draft.preview),
                MediaKind::Image => {
                    self.previews.release(draft.preview);
                }
            }
            payload = payload.with_attachment(draft.file);
        }

        self.text.clear();
        self.dictation_base.clear();
        Some(payload)
    }

    /// Plain Enter submits; Shift+Enter inserts a newline.
    pub fn key_press(&mut self, key: KeyPress) -> KeyOutcome {
        match key {
            KeyPress {
                key: Key::Enter,
                shift: true,
                ..
            } => {
                self.text.push('\n');
                KeyOutcome::InsertedNewline
            }
            KeyPress {
                key: Key::Enter,
                shift: false,
                other_modifier: false,
            } => KeyOutcome::Submit,
            _ => KeyOutcome::Default,
        }
    }

    /// Installs a suggested prompt as the draft text.
    pub fn apply_suggestion(&mut self, prompt: &str) {
        self.text = prompt.to_string();
        self.dictation_base.clear();
    }

    /// Empties text, attachment and dictation base.
    pub fn discard(&mut self) {
        self.text.clear();
        self.dictation_base.clear();
        self.remove_attachment();
    }
}

impl Drop for ComposeController {
    fn drop(&mut self) {
        self.remove_attachment();
    }
}
