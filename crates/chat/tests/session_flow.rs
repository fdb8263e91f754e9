use std::sync::Arc;

use parking_lot::Mutex;
use parley::chat::{PENDING_PLACEHOLDER_TEXT, Sender, TurnOutcome};
use parley::input::{
    ChannelRecognizer, ClipboardPayload, IntakeOutcome, PasteDisposition, RecognitionEvent,
    RecognitionSegment, RecognitionSignal,
};
use parley::{ChatSession, ClearPrompt};
use parley_llm::{Attachment, BackendError, BackendResult, BoxFuture, ChatBackend, MediaKind};
use tokio::sync::Notify;

#[derive(Default)]
struct RecordingBackend {
    failure: Option<String>,
    started: Option<Arc<Notify>>,
    release: Option<Arc<Notify>>,
    seen: Mutex<Vec<(String, Option<String>)>>,
}

impl RecordingBackend {
    fn replying() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn failing(description: &str) -> Arc<Self> {
        Arc::new(Self {
            failure: Some(description.to_string()),
            ..Self::default()
        })
    }

    fn gated(started: Arc<Notify>, release: Arc<Notify>) -> Arc<Self> {
        Arc::new(Self {
            started: Some(started),
            release: Some(release),
            ..Self::default()
        })
    }

    fn calls(&self) -> Vec<(String, Option<String>)> {
        self.seen.lock().clone()
    }
}

impl ChatBackend for RecordingBackend {
    fn id(&self) -> &str {
        "recording"
    }

    fn name(&self) -> &str {
        "Recording"
    }

    fn send<'a>(
        &'a self,
        prompt: &'a str,
        attachment: Option<&'a Attachment>,
    ) -> BoxFuture<'a, BackendResult<String>> {
        Box::pin(async move {
            self.seen.lock().push((
                prompt.to_string(),
                attachment.map(|file| file.name().to_string()),
            ));
            if let Some(started) = &self.started {
                started.notify_one();
            }
            if let Some(release) = &self.release {
                release.notified().await;
            }
            match &self.failure {
                Some(description) => Err(BackendError::remote(description.clone())),
                None => Ok(format!("echo: {prompt}")),
            }
        })
    }
}

fn session(backend: &Arc<RecordingBackend>) -> ChatSession {
    ChatSession::new(backend.clone(), None)
}

#[tokio::test]
async fn image_turn_shows_data_uri_and_sends_raw_file() {
    let backend = RecordingBackend::replying();
    let mut session = session(&backend);

    let outcome = session.pick_file(vec![Attachment::from_bytes(
        "photo.jpg",
        "image/jpeg",
        b"jpeg".to_vec(),
    )]);
    assert_eq!(outcome, IntakeOutcome::Installed(MediaKind::Image));
    session.type_text("Describe this image");

    let outcome = session.submit().await;
    assert!(matches!(outcome, TurnOutcome::Answered(_)));

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].sender(), Sender::User);
    assert_eq!(transcript[0].text(), "Describe this image");
    assert_eq!(transcript[0].image(), Some("data:image/jpeg;base64,anBlZw=="));
    assert_eq!(transcript[1].sender(), Sender::Model);
    assert_eq!(transcript[1].text(), "echo: Describe this image");

    assert_eq!(
        backend.calls(),
        vec![(
            "Describe this image".to_string(),
            Some("photo.jpg".to_string())
        )]
    );
    assert_eq!(session.compose().text(), "");
    assert!(session.compose().attachment().is_none());
    assert_eq!(session.previews().live_count(), 0);
}

#[tokio::test]
async fn unsupported_drop_is_logged_and_keeps_session_usable() {
    let backend = RecordingBackend::replying();
    let mut session = session(&backend);

    assert!(session.drag_enter());
    assert!(session.drag_enter());
    assert!(session.drag_leave());
    let outcome = session.drop_files(vec![Attachment::from_bytes(
        "report.pdf",
        "application/pdf",
        vec![0_u8],
    )]);
    assert!(matches!(outcome, IntakeOutcome::Rejected { .. }));
    assert!(!session.is_dragging());

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].sender(), Sender::Error);
    assert!(transcript[0].text().contains("application/pdf"));
    assert!(session.compose().attachment().is_none());
    assert!(backend.calls().is_empty());
}

#[tokio::test]
async fn text_paste_passes_through_and_file_paste_is_intercepted() {
    let backend = RecordingBackend::replying();
    let mut session = session(&backend);

    let text_only = ClipboardPayload {
        files: Vec::new(),
        text: Some("hello".into()),
    };
    assert_eq!(session.paste(text_only), PasteDisposition::PassThrough);

    let with_file = ClipboardPayload {
        files: vec![Attachment::from_bytes("clip.mp4", "video/mp4", vec![1_u8])],
        text: None,
    };
    assert_eq!(
        session.paste(with_file),
        PasteDisposition::Intercepted(IntakeOutcome::Installed(MediaKind::Video))
    );
    assert_eq!(session.previews().live_count(), 1);
}

#[tokio::test]
async fn backend_failure_becomes_error_message() {
    let backend = RecordingBackend::failing("Quota exceeded");
    let mut session = session(&backend);

    session.type_text("hello");
    let outcome = session.submit().await;
    assert!(matches!(
        outcome,
        TurnOutcome::Failed { ref description, .. } if description == "Quota exceeded"
    ));

    let transcript = session.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[1].sender(), Sender::Error);
    assert_eq!(transcript[1].text(), "Quota exceeded");
    assert!(!session.is_in_flight());

    session.type_text("again");
    assert!(matches!(session.submit().await, TurnOutcome::Failed { .. }));
    assert_eq!(session.transcript().len(), 4);
}

#[tokio::test]
async fn dictation_splices_into_draft_and_stops_on_submit() {
    let backend = RecordingBackend::replying();
    let (recognizer, feed) = ChannelRecognizer::new();
    let mut session = ChatSession::new(backend.clone(), Some(Box::new(recognizer)));

    session.type_text("Hello ");
    session.toggle_dictation();
    assert!(session.is_recording());

    feed.push(RecognitionSignal::Result(RecognitionEvent {
        segments: vec![RecognitionSegment::finalized("world")],
    }));
    session.poll_dictation();
    feed.push(RecognitionSignal::Result(RecognitionEvent {
        segments: vec![RecognitionSegment::interim("!")],
    }));
    session.poll_dictation();
    assert_eq!(session.compose().text(), "Hello world!");

    assert!(matches!(session.submit().await, TurnOutcome::Answered(_)));
    assert!(!session.is_recording());
    assert!(!feed.is_listening());
    assert_eq!(session.transcript()[0].text(), "Hello world!");
    assert_eq!(session.compose().dictation_base(), "");
}

#[tokio::test]
async fn second_submit_while_in_flight_is_ignored() {
    let started = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let backend = RecordingBackend::gated(started.clone(), release.clone());
    let mut session = session(&backend);

    session.type_text("first");
    let payload = session.take_submission().unwrap();
    let orchestrator = session.orchestrator().clone();
    let turn = tokio::spawn(async move { orchestrator.handle_submit(payload).await });
    started.notified().await;

    assert!(session.is_in_flight());
    let transcript = session.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[1].text(), PENDING_PLACEHOLDER_TEXT);

    session.type_text("second");
    assert!(!session.can_submit());
    assert_eq!(session.submit().await, TurnOutcome::Ignored);
    assert_eq!(session.compose().text(), "second");
    assert_eq!(session.request_clear(), ClearPrompt::Blocked);
    assert!(session.suggestions().is_empty());

    release.notify_one();
    assert!(matches!(turn.await.unwrap(), TurnOutcome::Answered(_)));
    assert!(!session.is_in_flight());
    assert_eq!(session.transcript().len(), 2);
    assert_eq!(backend.calls().len(), 1);
}

#[tokio::test]
async fn clear_needs_confirmation_and_discards_draft() {
    let backend = RecordingBackend::replying();
    let mut session = session(&backend);
    assert_eq!(session.request_clear(), ClearPrompt::NothingToClear);

    session.pick_file(vec![Attachment::from_bytes(
        "clip.webm",
        "video/webm",
        vec![2_u8],
    )]);
    session.type_text("watch this");
    session.submit().await;
    let video_url = session.transcript()[0].video().unwrap().to_string();
    assert!(session.previews().is_live(&video_url));

    session.type_text("unsent draft");
    session.pick_file(vec![Attachment::from_bytes(
        "next.png",
        "image/png",
        vec![3_u8],
    )]);

    assert_eq!(
        session.request_clear(),
        ClearPrompt::Confirm { message_count: 2 }
    );
    assert_eq!(session.confirm_clear(), Some(2));

    assert!(session.transcript().is_empty());
    assert_eq!(session.compose().text(), "");
    assert!(session.compose().attachment().is_none());
    assert_eq!(session.previews().live_count(), 0);
    assert_eq!(session.suggestions().len(), 4);
}

#[tokio::test]
async fn picking_a_suggestion_submits_it() {
    let backend = RecordingBackend::replying();
    let mut session = session(&backend);

    let title = session.suggestions()[2].title;
    assert_eq!(title, "Get creative");
    let outcome = session.pick_suggestion(2).await;
    assert!(matches!(outcome, Some(TurnOutcome::Answered(_))));
    assert_eq!(
        session.transcript()[0].text(),
        "Write a haiku about a rainy day."
    );

    assert_eq!(session.pick_suggestion(0).await, None);
}

#[tokio::test]
async fn shutdown_releases_every_preview() {
    let backend = RecordingBackend::replying();
    let mut session = session(&backend);

    session.pick_file(vec![Attachment::from_bytes("a.mp4", "video/mp4", vec![1_u8])]);
    session.submit().await;
    session.pick_file(vec![Attachment::from_bytes("b.png", "image/png", vec![1_u8])]);
    assert_eq!(session.previews().live_count(), 2);

    let previews = session.previews().clone();
    session.shutdown();
    assert_eq!(previews.live_count(), 0);
    assert_eq!(previews.acquired_total(), previews.released_total());
}
