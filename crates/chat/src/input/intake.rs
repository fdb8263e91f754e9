use parley_llm::{Attachment, MediaKind};

use crate::chat::orchestrator::unsupported_type_text;
use crate::input::compose::ComposeController;

/// Where a file came from. All sources converge on [`AttachmentIntake::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    Picker,
    Drop,
    Paste,
}

impl CaptureSource {
    pub fn label(self) -> &'static str {
        match self {
            Self::Picker => "picker",
            Self::Drop => "drop",
            Self::Paste => "paste",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntakeOutcome {
    Installed(MediaKind),
    /// Neither image nor video. `error_text` belongs in the conversation log.
    Rejected {
        mime_type: String,
        error_text: String,
    },
    NoFile,
}

/// Clipboard content delivered by a paste event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClipboardPayload {
    pub files: Vec<Attachment>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasteDisposition {
    /// The paste carried a file; default paste handling must be suppressed.
    Intercepted(IntakeOutcome),
    /// No file; let the text widget paste normally.
    PassThrough,
}

/// Nested enter/leave counter behind the "dragging" indicator.
///
/// Moving across child elements fires enter on the child before leave on the
/// parent, so the indicator only clears when the counter is back at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DragTracker {
    depth: u32,
}

impl DragTracker {
    pub fn enter(&mut self) -> bool {
        self.depth = self.depth.saturating_add(1);
        self.is_dragging()
    }

    pub fn leave(&mut self) -> bool {
        self.depth = self.depth.saturating_sub(1);
        self.is_dragging()
    }

    pub fn reset(&mut self) {
        self.depth = 0;
    }

    pub fn is_dragging(&self) -> bool {
        self.depth > 0
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }
}

/// Normalizes picker, drag-and-drop and paste into one selection path.
#[derive(Debug, Default)]
pub struct AttachmentIntake {
    drag: DragTracker,
}

impl AttachmentIntake {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    pub fn drag_tracker(&self) -> DragTracker {
        self.drag
    }

    /// Validates `file` and makes it the only pending attachment.
    ///
    /// A rejected file leaves any existing draft untouched.
    pub fn select(
        &mut self,
        file: Attachment,
        source: CaptureSource,
        compose: &mut ComposeController,
    ) -> IntakeOutcome {
        let Some(kind) = file.kind() else {
            let mime_type = file.mime_type().to_string();
            tracing::info!(
                source = source.label(),
                name = %file.name(),
                mime_type = %mime_type,
                "rejected unsupported attachment"
            );
            return IntakeOutcome::Rejected {
                error_text: unsupported_type_text(&mime_type),
                mime_type,
            };
        };

        tracing::debug!(
            source = source.label(),
            name = %file.name(),
            kind = kind.label(),
            "attachment selected"
        );
        compose.install_attachment(file, kind);
        IntakeOutcome::Installed(kind)
    }

    /// File picker selection; only the first file counts.
    pub fn pick(
        &mut self,
        files: Vec<Attachment>,
        compose: &mut ComposeController,
    ) -> IntakeOutcome {
        self.select_first(files, CaptureSource::Picker, compose)
    }

    pub fn drag_enter(&mut self) -> bool {
        self.drag.enter()
    }

    pub fn drag_leave(&mut self) -> bool {
        self.drag.leave()
    }

    /// An actual drop always clears the indicator, whatever the counter says.
    pub fn drop_files(
        &mut self,
        files: Vec<Attachment>,
        compose: &mut ComposeController,
    ) -> IntakeOutcome {
        self.drag.reset();
        self.select_first(files, CaptureSource::Drop, compose)
    }

    pub fn paste(
        &mut self,
        payload: ClipboardPayload,
        compose: &mut ComposeController,
    ) -> PasteDisposition {
        if payload.files.is_empty() {
            return PasteDisposition::PassThrough;
        }
        PasteDisposition::Intercepted(self.select_first(
            payload.files,
            CaptureSource::Paste,
            compose,
        ))
    }

    fn select_first(
        &mut self,
        files: Vec<Attachment>,
        source: CaptureSource,
        compose: &mut ComposeController,
    ) -> IntakeOutcome {
        let ignored = files.len().saturating_sub(1);
        let Some(file) = files.into_iter().next() else {
            return IntakeOutcome::NoFile;
        };
        if ignored > 0 {
            tracing::debug!(source = source.label(), ignored, "using first file only");
        }
        self.select(file, source, compose)
    }
}
