use std::sync::Arc;

use parley_llm::{
    Attachment, BackendError, BackendResult, BoxFuture, ChatBackend, describe_failure,
    shared_backend,
};

use crate::chat::{
    ClearRequest, ClearTicket, KeyOutcome, KeyPress, Message, Orchestrator, SubmitPayload,
    TurnOutcome,
};
use crate::input::{
    AttachmentIntake, ClipboardPayload, ComposeController, DictationAdapter, DictationUpdate,
    IntakeOutcome, PasteDisposition, SpeechRecognizer,
};
use crate::media::PreviewRegistry;
use crate::settings::ChatSettings;
use crate::suggestions::{SuggestedPrompt, suggested_prompts};

/// Stands in for a backend that could not be constructed.
///
/// Every send fails with the construction error, so each submit still
/// produces an `Error` message instead of leaving the session unusable.
pub struct UnavailableBackend {
    description: String,
}

impl UnavailableBackend {
    pub fn new(error: &BackendError) -> Self {
        Self {
            description: describe_failure(error),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl ChatBackend for UnavailableBackend {
    fn id(&self) -> &str {
        "unavailable"
    }

    fn name(&self) -> &str {
        "Unavailable"
    }

    fn send<'a>(
        &'a self,
        _prompt: &'a str,
        _attachment: Option<&'a Attachment>,
    ) -> BoxFuture<'a, BackendResult<String>> {
        Box::pin(async move { Err(BackendError::remote(self.description.clone())) })
    }
}

/// What the presenter should show after a clear request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearPrompt {
    NothingToClear,
    Blocked,
    Confirm { message_count: usize },
}

/// One chat window: compose area, attachment intake, dictation and the conversation.
pub struct ChatSession {
    compose: ComposeController,
    intake: AttachmentIntake,
    dictation: DictationAdapter,
    orchestrator: Arc<Orchestrator>,
    previews: Arc<PreviewRegistry>,
    pending_clear: Option<ClearTicket>,
    backend_error: Option<String>,
}

impl ChatSession {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        recognizer: Option<Box<dyn SpeechRecognizer>>,
    ) -> Self {
        let previews = Arc::new(PreviewRegistry::new());
        Self {
            compose: ComposeController::new(previews.clone()),
            intake: AttachmentIntake::new(),
            dictation: DictationAdapter::new(recognizer),
            orchestrator: Arc::new(Orchestrator::new(backend, previews.clone())),
            previews,
            pending_clear: None,
            backend_error: None,
        }
    }

    /// Builds the session on the process-wide backend for `settings`.
    ///
    /// A construction failure is kept and reported by [`Self::backend_error`];
    /// the session still starts.
    pub fn from_settings(
        settings: &ChatSettings,
        recognizer: Option<Box<dyn SpeechRecognizer>>,
    ) -> Self {
        match shared_backend(settings.to_backend_config()) {
            Ok(backend) => Self::new(backend, recognizer),
            Err(error) => {
                tracing::warn!(
                    stage = error.stage(),
                    error = %error,
                    "chat backend unavailable"
                );
                let backend = UnavailableBackend::new(&error);
                let description = backend.description().to_string();
                let mut session = Self::new(Arc::new(backend), recognizer);
                session.backend_error = Some(description);
                session
            }
        }
    }

    pub fn backend_error(&self) -> Option<&str> {
        self.backend_error.as_deref()
    }

    pub fn compose(&self) -> &ComposeController {
        &self.compose
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    pub fn previews(&self) -> &Arc<PreviewRegistry> {
        &self.previews
    }

    pub fn is_in_flight(&self) -> bool {
        self.orchestrator.is_in_flight()
    }

    pub fn is_dragging(&self) -> bool {
        self.intake.is_dragging()
    }

    pub fn can_submit(&self) -> bool {
        self.compose.can_submit(self.is_in_flight())
    }

    pub fn type_text(&mut self, text: impl Into<String>) {
        self.compose.set_text(text);
    }

    pub fn key_press(&mut self, key: KeyPress) -> KeyOutcome {
        self.compose.key_press(key)
    }

    pub fn pick_file(&mut self, files: Vec<Attachment>) -> IntakeOutcome {
        let outcome = self.intake.pick(files, &mut self.compose);
        self.log_rejection(&outcome);
        outcome
    }

    pub fn drag_enter(&mut self) -> bool {
        self.intake.drag_enter()
    }

    pub fn drag_leave(&mut self) -> bool {
        self.intake.drag_leave()
    }

    pub fn drop_files(&mut self, files: Vec<Attachment>) -> IntakeOutcome {
        let outcome = self.intake.drop_files(files, &mut self.compose);
        self.log_rejection(&outcome);
        outcome
    }

    pub fn paste(&mut self, payload: ClipboardPayload) -> PasteDisposition {
        let disposition = self.intake.paste(payload, &mut self.compose);
        if let PasteDisposition::Intercepted(outcome) = &disposition {
            self.log_rejection(outcome);
        }
        disposition
    }

    pub fn remove_attachment(&mut self) -> bool {
        self.compose.remove_attachment()
    }

    pub fn is_dictation_supported(&self) -> bool {
        self.dictation.is_supported()
    }

    pub fn is_recording(&self) -> bool {
        self.dictation.is_recording()
    }

    pub fn toggle_dictation(&mut self) -> DictationUpdate {
        self.dictation.toggle(&mut self.compose)
    }

    pub fn poll_dictation(&mut self) -> DictationUpdate {
        self.dictation.poll(&mut self.compose)
    }

    /// Takes the draft and stops dictation, or `None` when submit is disabled.
    ///
    /// A refused submit leaves a running dictation session alone. Hand the
    /// payload to [`Orchestrator::handle_submit`] to run the turn on another
    /// task while the session keeps handling input.
    pub fn take_submission(&mut self) -> Option<SubmitPayload> {
        if !self.compose.can_submit(self.orchestrator.is_in_flight()) {
            return None;
        }
        self.dictation.stop();
        self.compose.submit(false)
    }

    pub async fn submit(&mut self) -> TurnOutcome {
        let Some(payload) = self.take_submission() else {
            return TurnOutcome::Ignored;
        };
        let orchestrator = self.orchestrator.clone();
        orchestrator.handle_submit(payload).await
    }

    /// Suggestions are offered only on an empty, idle conversation.
    pub fn suggestions(&self) -> &'static [SuggestedPrompt] {
        if self.orchestrator.message_count() == 0 && !self.is_in_flight() {
            suggested_prompts()
        } else {
            &[]
        }
    }

    /// Installs the suggestion as the draft and submits it.
    pub async fn pick_suggestion(&mut self, index: usize) -> Option<TurnOutcome> {
        let Some(prompt) = self.suggestions().get(index) else {
            tracing::debug!(index, "suggestion not offered");
            return None;
        };
        self.compose.apply_suggestion(prompt.prompt);
        Some(self.submit().await)
    }

    pub fn request_clear(&mut self) -> ClearPrompt {
        self.pending_clear = None;
        match self.orchestrator.request_clear() {
            ClearRequest::NothingToClear => ClearPrompt::NothingToClear,
            ClearRequest::Blocked => ClearPrompt::Blocked,
            ClearRequest::NeedsConfirmation(ticket) => {
                let message_count = ticket.message_count();
                self.pending_clear = Some(ticket);
                ClearPrompt::Confirm { message_count }
            }
        }
    }

    /// Empties the log and the draft. `None` when no confirmation was pending
    /// or a request went in flight meanwhile.
    pub fn confirm_clear(&mut self) -> Option<usize> {
        let ticket = self.pending_clear.take()?;
        let removed = self.orchestrator.confirm_clear(ticket)?;
        self.dictation.stop();
        self.compose.discard();
        Some(removed)
    }

    pub fn cancel_clear(&mut self) -> bool {
        self.pending_clear.take().is_some()
    }

    pub fn transcript(&self) -> Vec<Message> {
        self.orchestrator.transcript()
    }

    /// Stops dictation and releases every preview the session still holds.
    pub fn shutdown(&mut self) {
        self.dictation.stop();
        self.compose.discard();
        let released = self.orchestrator.release_retained_previews();
        tracing::debug!(
            released,
            live = self.previews.live_count(),
            "chat session shut down"
        );
    }

    fn log_rejection(&self, outcome: &IntakeOutcome) {
        if let IntakeOutcome::Rejected { error_text, .. } = outcome {
            self.orchestrator.push_error(error_text.clone());
        }
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Sender;
    use crate::input::ChannelRecognizer;

    #[tokio::test]
    async fn unavailable_backend_turns_every_submit_into_an_error() {
        let error = BackendError::MissingApiKey {
            stage: "test",
            provider_id: "gemini".into(),
        };
        let mut session = ChatSession::new(Arc::new(UnavailableBackend::new(&error)), None);

        session.type_text("hello");
        let outcome = session.submit().await;
        assert!(matches!(outcome, TurnOutcome::Failed { .. }));

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].sender(), Sender::Error);
        assert!(transcript[1].text().contains("API key"));
    }

    #[test]
    fn suggestions_are_offered_only_on_empty_log() {
        let error = BackendError::remote("offline");
        let session = ChatSession::new(Arc::new(UnavailableBackend::new(&error)), None);
        assert_eq!(session.suggestions().len(), 4);

        session.orchestrator().push_error("something");
        assert!(session.suggestions().is_empty());
    }

    #[tokio::test]
    async fn refused_submit_keeps_dictation_running() {
        let error = BackendError::remote("offline");
        let (recognizer, feed) = ChannelRecognizer::new();
        let mut session = ChatSession::new(
            Arc::new(UnavailableBackend::new(&error)),
            Some(Box::new(recognizer)),
        );

        session.toggle_dictation();
        assert_eq!(session.submit().await, TurnOutcome::Ignored);
        assert!(session.is_recording());
        assert!(feed.is_listening());

        session.type_text("now there is text");
        session.submit().await;
        assert!(!session.is_recording());
        assert!(!feed.is_listening());
    }

    #[test]
    fn cancel_clear_keeps_the_log() {
        let error = BackendError::remote("offline");
        let mut session = ChatSession::new(Arc::new(UnavailableBackend::new(&error)), None);
        session.orchestrator().push_error("kept");

        assert_eq!(
            session.request_clear(),
            ClearPrompt::Confirm { message_count: 1 }
        );
        assert!(session.cancel_clear());
        assert_eq!(session.confirm_clear(), None);
        assert_eq!(session.transcript().len(), 1);
    }
}
