/// Stable identifier for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Creates a typed message identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Identifier for one submit/response turn.
///
/// Every accepted submit gets a fresh id so a late completion can never close
/// a newer turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(pub u64);

impl TurnId {
    /// Creates a typed turn identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sender {
    User,
    Model,
    Error,
}

/// Text shown by the transient model placeholder while a turn is pending.
pub const PENDING_PLACEHOLDER_TEXT: &str = "...";

/// Attachment representation carried by a user message for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayMedia {
    /// Self-contained `data:` URI, safe to replay later.
    Image(String),
    /// Local preview reference; not durable.
    Video(String),
}

/// Immutable chat log entry.
///
/// At most one of `image`/`video` is set and `Error` messages carry only text;
/// the constructors are the only way to build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    sender: Sender,
    text: String,
    image: Option<String>,
    video: Option<String>,
}

impl Message {
    pub fn user(id: MessageId, text: impl Into<String>, media: Option<DisplayMedia>) -> Self {
        let (image, video) = match media {
            Some(DisplayMedia::Image(uri)) => (Some(uri), None),
            Some(DisplayMedia::Video(url)) => (None, Some(url)),
            None => (None, None),
        };

        Self {
            id,
            sender: Sender::User,
            text: text.into(),
            image,
            video,
        }
    }

    pub fn model(id: MessageId, text: impl Into<String>) -> Self {
        Self::text_only(id, Sender::Model, text)
    }

    pub fn error(id: MessageId, text: impl Into<String>) -> Self {
        Self::text_only(id, Sender::Error, text)
    }

    /// Model placeholder rendered while a response is pending. Never stored.
    pub fn pending_placeholder(id: MessageId) -> Self {
        Self::model(id, PENDING_PLACEHOLDER_TEXT)
    }

    fn text_only(id: MessageId, sender: Sender, text: impl Into<String>) -> Self {
        Self {
            id,
            sender,
            text: text.into(),
            image: None,
            video: None,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn sender(&self) -> Sender {
        self.sender
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn image(&self) -> Option<&str> {
        self.image.as_deref()
    }

    pub fn video(&self) -> Option<&str> {
        self.video.as_deref()
    }

    pub fn is_pending_placeholder(&self) -> bool {
        self.sender == Sender::Model && self.text == PENDING_PLACEHOLDER_TEXT
    }
}

/// Ordered, append-only message log. Only [`MessageLog::clear`] removes entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageLog {
    messages: Vec<Message>,
    next_id: u64,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next monotonic message id. Ids are never reused, even across clears.
    pub fn alloc_id(&mut self) -> MessageId {
        self.next_id = self.next_id.saturating_add(1);
        MessageId::new(self.next_id)
    }

    pub fn push_user(&mut self, text: impl Into<String>, media: Option<DisplayMedia>) -> MessageId {
        let id = self.alloc_id();
        self.messages.push(Message::user(id, text, media));
        id
    }

    pub fn push_model(&mut self, text: impl Into<String>) -> MessageId {
        let id = self.alloc_id();
        self.messages.push(Message::model(id, text));
        id
    }

    pub fn push_error(&mut self, text: impl Into<String>) -> MessageId {
        let id = self.alloc_id();
        self.messages.push(Message::error(id, text));
        id
    }

    /// Empties the log and returns how many messages were dropped.
    pub fn clear(&mut self) -> usize {
        let removed = self.messages.len();
        self.messages.clear();
        removed
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Turn lifecycle for the single in-flight request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TurnState {
    #[default]
    Idle,
    Submitting(TurnId),
    Succeeded(TurnId),
    Failed {
        turn: TurnId,
        message: String,
    },
}

/// State transition input for the turn lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnTransition {
    Start(TurnId),
    Succeed(TurnId),
    Fail { turn: TurnId, message: String },
    ResetToIdle,
}

/// Rejection reason for illegal turn transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnTransitionRejection {
    AlreadySubmitting { active: TurnId, attempted: TurnId },
    NoActiveTurn,
    TurnMismatch { active: TurnId, attempted: TurnId },
}

/// Result type for turn transition application.
pub type TurnTransitionResult = Result<TurnState, TurnTransitionRejection>;

impl TurnState {
    /// Returns the submitting turn if and only if state is `Submitting`.
    pub fn active_turn(&self) -> Option<TurnId> {
        match self {
            Self::Submitting(turn) => Some(*turn),
            Self::Idle | Self::Succeeded(_) | Self::Failed { .. } => None,
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.active_turn().is_some()
    }

    /// Applies one transition deterministically.
    ///
    /// A new turn may start from any settled state, but never while another
    /// turn is submitting. Settling transitions must name the active turn.
    pub fn apply(&self, transition: TurnTransition) -> TurnTransitionResult {
        match transition {
            TurnTransition::Start(turn) => match self {
                Self::Submitting(active) => Err(TurnTransitionRejection::AlreadySubmitting {
                    active: *active,
                    attempted: turn,
                }),
                Self::Idle | Self::Succeeded(_) | Self::Failed { .. } => {
                    Ok(Self::Submitting(turn))
                }
            },
            TurnTransition::Succeed(turn) => self.settle(turn, Self::Succeeded(turn)),
            TurnTransition::Fail { turn, message } => {
                self.settle(turn, Self::Failed { turn, message })
            }
            TurnTransition::ResetToIdle => Ok(Self::Idle),
        }
    }

    fn settle(&self, turn: TurnId, next: TurnState) -> TurnTransitionResult {
        match self {
            Self::Submitting(active) if *active == turn => Ok(next),
            Self::Submitting(active) => Err(TurnTransitionRejection::TurnMismatch {
                active: *active,
                attempted: turn,
            }),
            Self::Idle | Self::Succeeded(_) | Self::Failed { .. } => {
                Err(TurnTransitionRejection::NoActiveTurn)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_message_carries_exactly_one_media_kind() {
        let image = Message::user(
            MessageId::new(1),
            "look",
            Some(DisplayMedia::Image("data:image/png;base64,AA==".into())),
        );
        assert!(image.image().is_some());
        assert!(image.video().is_none());

        let video = Message::user(
            MessageId::new(2),
            "",
            Some(DisplayMedia::Video("blob:parley/x".into())),
        );
        assert!(video.image().is_none());
        assert_eq!(video.video(), Some("blob:parley/x"));

        let error = Message::error(MessageId::new(3), "boom");
        assert_eq!(error.sender(), Sender::Error);
        assert!(error.image().is_none() && error.video().is_none());
    }

    #[test]
    fn log_ids_keep_increasing_across_clear() {
        let mut log = MessageLog::new();
        let first = log.push_user("a", None);
        let second = log.push_model("b");
        assert!(second > first);

        assert_eq!(log.clear(), 2);
        assert!(log.is_empty());

        let third = log.push_error("c");
        assert!(third > second);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn second_start_while_submitting_is_rejected() {
        let state = TurnState::Idle
            .apply(TurnTransition::Start(TurnId::new(1)))
            .unwrap();
        assert_eq!(
            state.apply(TurnTransition::Start(TurnId::new(2))),
            Err(TurnTransitionRejection::AlreadySubmitting {
                active: TurnId::new(1),
                attempted: TurnId::new(2),
            })
        );
    }

    #[test]
    fn settling_requires_matching_turn() {
        let state = TurnState::Submitting(TurnId::new(4));
        assert_eq!(
            state.apply(TurnTransition::Succeed(TurnId::new(3))),
            Err(TurnTransitionRejection::TurnMismatch {
                active: TurnId::new(4),
                attempted: TurnId::new(3),
            })
        );
        assert_eq!(
            TurnState::Idle.apply(TurnTransition::Succeed(TurnId::new(4))),
            Err(TurnTransitionRejection::NoActiveTurn)
        );

        let failed = state
            .apply(TurnTransition::Fail {
                turn: TurnId::new(4),
                message: "quota exceeded".into(),
            })
            .unwrap();
        assert!(!failed.is_submitting());
        assert!(failed.apply(TurnTransition::Start(TurnId::new(5))).is_ok());
    }

    #[test]
    fn reset_returns_to_idle_from_any_state() {
        let failed = TurnState::Failed {
            turn: TurnId::new(1),
            message: "boom".into(),
        };
        for state in [TurnState::Submitting(TurnId::new(2)), failed, TurnState::Idle] {
            assert_eq!(state.apply(TurnTransition::ResetToIdle), Ok(TurnState::Idle));
        }
    }
}
