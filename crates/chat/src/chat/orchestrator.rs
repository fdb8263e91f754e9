use std::sync::Arc;

use parking_lot::Mutex;
use parley_llm::{ChatBackend, MediaKind, describe_failure};

use crate::chat::events::{SubmitPayload, TurnOutcome};
use crate::chat::message::{
    DisplayMedia, Message, MessageId, MessageLog, TurnId, TurnState, TurnTransition,
};
use crate::media::{PreviewRef, PreviewRegistry, to_data_uri};

pub const IMAGE_DISPLAY_FAILURE_TEXT: &str = "Failed to load image for display.";

const PLACEHOLDER_MESSAGE_ID: MessageId = MessageId::new(0);

#[derive(Debug, Default)]
struct ConversationState {
    log: MessageLog,
    turn: TurnState,
    next_turn: u64,
    /// Video previews now owned by user messages in the log.
    retained_previews: Vec<PreviewRef>,
}

impl ConversationState {
    fn alloc_turn(&mut self) -> TurnId {
        self.next_turn = self.next_turn.saturating_add(1);
        TurnId::new(self.next_turn)
    }

    fn reset_turn(&mut self) {
        if let Ok(idle) = self.turn.apply(TurnTransition::ResetToIdle) {
            self.turn = idle;
        }
    }
}

/// Answer to a request to clear the conversation.
#[derive(Debug, PartialEq, Eq)]
pub enum ClearRequest {
    /// The log is already empty; no confirmation is offered.
    NothingToClear,
    /// A request is in flight; destructive actions are disabled.
    Blocked,
    /// Ask the user, then pass the ticket to [`Orchestrator::confirm_clear`].
    NeedsConfirmation(ClearTicket),
}

/// Proof that the user was asked before clearing.
#[derive(Debug, PartialEq, Eq)]
pub struct ClearTicket {
    message_count: usize,
}

impl ClearTicket {
    pub fn message_count(&self) -> usize {
        self.message_count
    }
}

/// Owns the message log and the single in-flight request.
pub struct Orchestrator {
    backend: Arc<dyn ChatBackend>,
    previews: Arc<PreviewRegistry>,
    state: Mutex<ConversationState>,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn ChatBackend>, previews: Arc<PreviewRegistry>) -> Self {
        Self {
            backend,
            previews,
            state: Mutex::new(ConversationState::default()),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.state.lock().turn.is_submitting()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.state.lock().log.messages().to_vec()
    }

    pub fn message_count(&self) -> usize {
        self.state.lock().log.len()
    }

    /// Log snapshot plus the pending model placeholder while a turn is in flight.
    pub fn transcript(&self) -> Vec<Message> {
        let state = self.state.lock();
        let mut messages = state.log.messages().to_vec();
        if state.turn.is_submitting() {
            messages.push(Message::pending_placeholder(PLACEHOLDER_MESSAGE_ID));
        }
        messages
    }

    /// Appends an error message outside of any turn, e.g. a rejected attachment.
    pub fn push_error(&self, text: impl Into<String>) -> MessageId {
        self.state.lock().log.push_error(text)
    }

    /// Runs one turn: user message, backend call, model or error message.
    ///
    /// A second call while a turn is submitting returns [`TurnOutcome::Ignored`]
    /// without queueing anything.
    pub async fn handle_submit(&self, payload: SubmitPayload) -> TurnOutcome {
        let empty = payload.is_empty();
        let kind = payload.attachment_kind();
        let SubmitPayload {
            text,
            attachment,
            video_preview,
        } = payload;

        let turn = {
            let mut state = self.state.lock();
            if empty || state.turn.is_submitting() {
                drop(state);
                tracing::debug!(empty, "submit ignored");
                self.release_unused(video_preview);
                return TurnOutcome::Ignored;
            }

            let turn = state.alloc_turn();
            state.turn = TurnState::Submitting(turn);
            turn
        };
        let guard = InFlightGuard::new(&self.state, turn);

        tracing::info!(
            turn = turn.0,
            prompt_chars = text.chars().count(),
            attachment_mime = attachment.as_ref().map(|file| file.mime_type()),
            attachment_kind = kind.map(MediaKind::label),
            "turn accepted"
        );

        let mut video_preview = video_preview;
        let media = match &attachment {
            None => None,
            Some(file) => match kind {
                Some(MediaKind::Image) => match to_data_uri(file).await {
                    Ok(uri) => Some(DisplayMedia::Image(uri)),
                    Err(error) => {
                        tracing::warn!(
                            turn = turn.0,
                            name = %file.name(),
                            error = %error,
                            "failed to encode image for display"
                        );
                        self.release_unused(video_preview);
                        return self.abort_turn(guard, IMAGE_DISPLAY_FAILURE_TEXT);
                    }
                },
                Some(MediaKind::Video) => {
                    let preview = video_preview
                        .take()
                        .unwrap_or_else(|| self.previews.acquire(file));
                    let url = preview.url().to_string();
                    self.state.lock().retained_previews.push(preview);
                    Some(DisplayMedia::Video(url))
                }
                None => {
                    let reason = unsupported_type_text(file.mime_type());
                    self.release_unused(video_preview);
                    return self.abort_turn(guard, &reason);
                }
            },
        };
        self.release_unused(video_preview);

        let user_message_id = self.state.lock().log.push_user(text.clone(), media);
        tracing::debug!(
            turn = turn.0,
            message_id = user_message_id.0,
            "user message appended"
        );

        // The raw file goes to the backend, never the display copy.
        let result = self.backend.send(&text, attachment.as_ref()).await;

        match result {
            Ok(response) => {
                let message_id = self.state.lock().log.push_model(response);
                tracing::info!(turn = turn.0, message_id = message_id.0, "turn answered");
                guard.settle(TurnTransition::Succeed(turn));
                TurnOutcome::Answered(turn)
            }
            Err(error) => {
                let description = describe_failure(&error);
                let message_id = self.state.lock().log.push_error(description.clone());
                tracing::warn!(
                    turn = turn.0,
                    message_id = message_id.0,
                    stage = error.stage(),
                    error = %error,
                    "turn failed"
                );
                guard.settle(TurnTransition::Fail {
                    turn,
                    message: description.clone(),
                });
                TurnOutcome::Failed { turn, description }
            }
        }
    }

    pub fn request_clear(&self) -> ClearRequest {
        let state = self.state.lock();
        if state.turn.is_submitting() {
            return ClearRequest::Blocked;
        }
        if state.log.is_empty() {
            return ClearRequest::NothingToClear;
        }
        ClearRequest::NeedsConfirmation(ClearTicket {
            message_count: state.log.len(),
        })
    }

    /// Empties the log and releases every preview the log owned.
    ///
    /// Returns `None` when a request went in flight after the ticket was issued.
    pub fn confirm_clear(&self, ticket: ClearTicket) -> Option<usize> {
        let (removed, previews) = {
            let mut state = self.state.lock();
            if state.turn.is_submitting() {
                tracing::debug!("clear confirmed while a turn is in flight; ignored");
                return None;
            }
            let removed = state.log.clear();
            state.reset_turn();
            (removed, std::mem::take(&mut state.retained_previews))
        };

        let released = previews.len();
        for preview in previews {
            self.previews.release(preview);
        }

        tracing::info!(
            removed,
            confirmed_count = ticket.message_count,
            released_previews = released,
            "conversation cleared"
        );
        Some(removed)
    }

    /// Releases previews still owned by the log. Called on teardown.
    pub fn release_retained_previews(&self) -> usize {
        let previews = std::mem::take(&mut self.state.lock().retained_previews);
        let released = previews.len();
        for preview in previews {
            self.previews.release(preview);
        }
        released
    }

    fn release_unused(&self, preview: Option<PreviewRef>) {
        if let Some(preview) = preview {
            self.previews.release(preview);
        }
    }

    fn abort_turn(&self, guard: InFlightGuard<'_>, text: &str) -> TurnOutcome {
        let turn = guard.turn;
        self.state.lock().log.push_error(text);
        guard.settle(TurnTransition::Fail {
            turn,
            message: text.to_string(),
        });
        TurnOutcome::Aborted {
            turn,
            reason: text.to_string(),
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.release_retained_previews();
    }
}

pub fn unsupported_type_text(mime_type: &str) -> String {
    format!("Unsupported file type: {mime_type}. Please attach an image or a video.")
}

/// Clears the in-flight state when dropped, even if the turn future is
/// cancelled or panics between the start and the settling transition.
struct InFlightGuard<'a> {
    state: &'a Mutex<ConversationState>,
    turn: TurnId,
    settled: bool,
}

impl<'a> InFlightGuard<'a> {
    fn new(state: &'a Mutex<ConversationState>, turn: TurnId) -> Self {
        Self {
            state,
            turn,
            settled: false,
        }
    }

    fn settle(mut self, transition: TurnTransition) {
        let mut state = self.state.lock();
        match state.turn.apply(transition) {
            Ok(next) => state.turn = next,
            Err(rejection) => {
                tracing::warn!(turn = self.turn.0, ?rejection, "turn settled out of order");
                if state.turn.active_turn() == Some(self.turn) {
                    state.reset_turn();
                }
            }
        }
        self.settled = true;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self.state.lock();
        if state.turn.active_turn() == Some(self.turn) {
            tracing::warn!(
                turn = self.turn.0,
                "turn dropped before settling; clearing in-flight state"
            );
            state.reset_turn();
        }
    }
}
