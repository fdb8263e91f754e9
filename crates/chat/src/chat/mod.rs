/// Event contracts between the compose area and the orchestrator.
pub mod events;
/// Domain entities and the deterministic turn state machine.
pub mod message;
pub mod orchestrator;

pub use events::{Key, KeyOutcome, KeyPress, Notice, SubmitPayload, TurnOutcome};
pub use message::{
    DisplayMedia, Message, MessageId, MessageLog, PENDING_PLACEHOLDER_TEXT, Sender, TurnId,
    TurnState, TurnTransition, TurnTransitionRejection, TurnTransitionResult,
};
pub use orchestrator::{
    ClearRequest, ClearTicket, IMAGE_DISPLAY_FAILURE_TEXT, Orchestrator, unsupported_type_text,
};
