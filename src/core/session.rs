//! Chat session controller
//!
//! A `ChatSession` owns one widget's transcript, its input buffer and the
//! "assistant is composing" state. User messages are appended as soon as
//! they are submitted; the assistant reply follows after a fixed delay.
//!
//! Delayed replies are produced by a single worker task per session. Each
//! submission is queued with its own due instant, so overlapping delays keep
//! their deadlines while replies are still appended in submission order.
//! Closing (or dropping) the session aborts the worker, and nothing is
//! appended to a closed transcript.

use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::{builtin, Config};
use crate::conversation::{Message, Transcript};

use super::resolver::{Responder, ResponseResolver};

/// Capacity of the session event channel
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Changes a renderer can react to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SessionEvent {
    MessageAppended(Message),
    ComposingChanged(bool),
    Closed,
}

/// A reply waiting for its delay to elapse
struct PendingReply {
    utterance: String,
    due: Instant,
}

struct SessionState {
    transcript: Transcript,
    input: String,
    /// Replies queued but not yet appended
    pending: usize,
    closed: bool,
}

struct Shared {
    state: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    responder: Arc<dyn Responder>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }
}

/// One user's chat with the assistant
pub struct ChatSession {
    id: Uuid,
    shared: Arc<Shared>,
    queue: mpsc::UnboundedSender<PendingReply>,
    worker: JoinHandle<()>,
    reply_delay: Duration,
    assistant_name: String,
}

impl ChatSession {
    /// Start a session seeded with the greeting
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn new(config: &Config, responder: Arc<dyn Responder>) -> Self {
        let id = Uuid::new_v4();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let shared = Arc::new(Shared {
            state: Mutex::new(SessionState {
                transcript: Transcript::with_greeting(builtin::GREETING),
                input: String::new(),
                pending: 0,
                closed: false,
            }),
            events,
            responder,
        });

        let (queue, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_reply_worker(id, Arc::clone(&shared), rx));

        tracing::info!(session_id = %id, delay_ms = config.reply_delay_ms, "🧞 Chat session started");

        Self {
            id,
            shared,
            queue,
            worker,
            reply_delay: config.reply_delay(),
            assistant_name: config.assistant_name.clone(),
        }
    }

    /// Session with the default delay and the campus rule table
    pub fn with_defaults() -> Self {
        Self::new(&Config::default(), Arc::new(ResponseResolver::default()))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Snapshot of the transcript in display order
    pub fn transcript(&self) -> Vec<Message> {
        self.shared.lock().transcript.messages().to_vec()
    }

    /// Whether any assistant reply is still pending
    pub fn is_composing(&self) -> bool {
        self.shared.lock().pending > 0
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    /// Submit a user message. Blank text is ignored.
    pub fn submit(&self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            tracing::debug!(session_id = %self.id, "Ignoring blank submission");
            return;
        }

        let mut state = self.shared.lock();
        if state.closed {
            tracing::warn!(session_id = %self.id, "Submission after session closed");
            return;
        }

        let pending = PendingReply {
            utterance: text.to_string(),
            due: Instant::now() + self.reply_delay,
        };
        if self.queue.send(pending).is_err() {
            tracing::warn!(session_id = %self.id, "Reply worker is gone, dropping submission");
            return;
        }

        let message = state.transcript.add_user(text).clone();
        state.input.clear();
        state.pending += 1;

        tracing::debug!(session_id = %self.id, message_id = %message.id(), "User message appended");
        self.shared.emit(SessionEvent::MessageAppended(message));
        if state.pending == 1 {
            self.shared.emit(SessionEvent::ComposingChanged(true));
        }
    }

    /// Current contents of the input box
    pub fn input(&self) -> String {
        self.shared.lock().input.clone()
    }

    pub fn set_input(&self, text: &str) {
        self.shared.lock().input = text.to_string();
    }

    /// Submit whatever is in the input box
    pub fn send(&self) {
        let input = self.input();
        self.submit(&input);
    }

    /// Whether the send action should be enabled
    pub fn can_send(&self) -> bool {
        let state = self.shared.lock();
        !state.input.trim().is_empty() && state.pending == 0 && !state.closed
    }

    pub fn quick_actions(&self) -> &'static [&'static str] {
        builtin::QUICK_ACTIONS
    }

    /// Fill the input box with a suggestion without sending it
    pub fn apply_quick_action(&self, action: &str) {
        self.set_input(action);
    }

    /// Text shown next to the typing indicator
    pub fn composing_label(&self) -> String {
        format!("{} is thinking...", self.assistant_name)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }

    /// Tear the session down, cancelling any pending replies
    pub fn close(&self) {
        let mut state = self.shared.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        self.worker.abort();

        if state.pending > 0 {
            state.pending = 0;
            self.shared.emit(SessionEvent::ComposingChanged(false));
        }

        tracing::info!(session_id = %self.id, messages = state.transcript.len(), "Chat session closed");
        self.shared.emit(SessionEvent::Closed);
    }
}

impl Drop for ChatSession {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run_reply_worker(
    session_id: Uuid,
    shared: Arc<Shared>,
    mut queue: mpsc::UnboundedReceiver<PendingReply>,
) {
    while let Some(pending) = queue.recv().await {
        tokio::time::sleep_until(pending.due).await;

        let reply = panic::catch_unwind(AssertUnwindSafe(|| {
            shared.responder.respond(&pending.utterance)
        }));

        let mut state = shared.lock();
        if state.closed {
            break;
        }

        let reply = match reply {
            Ok(reply) => reply,
            Err(_) => {
                tracing::error!(%session_id, "Responder panicked, dropping reply");
                state.pending = state.pending.saturating_sub(1);
                if state.pending == 0 {
                    shared.emit(SessionEvent::ComposingChanged(false));
                }
                continue;
            }
        };

        let message = state.transcript.add_assistant(&reply).clone();
        state.pending = state.pending.saturating_sub(1);

        tracing::debug!(%session_id, message_id = %message.id(), "Assistant reply appended");
        shared.emit(SessionEvent::MessageAppended(message));
        if state.pending == 0 {
            shared.emit(SessionEvent::ComposingChanged(false));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::{MessageId, Role};
    use tokio::time::sleep;

    fn contents(session: &ChatSession) -> Vec<String> {
        session
            .transcript()
            .iter()
            .map(|m| m.content().to_string())
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_starts_with_greeting() {
        let session = ChatSession::with_defaults();
        let transcript = session.transcript();

        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].role(), Role::Assistant);
        assert_eq!(transcript[0].content(), builtin::GREETING);
        assert!(!session.is_composing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_submit_is_noop() {
        let session = ChatSession::with_defaults();
        session.set_input("   ");
        session.submit("   ");
        session.submit("");
        session.send();

        assert_eq!(session.transcript().len(), 1);
        assert!(!session.is_composing());
        assert_eq!(session.input(), "   ");
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_then_delayed_reply() {
        let session = ChatSession::with_defaults();
        let expected = ResponseResolver::default().resolve("library hours");

        session.submit("  library hours ");
        let transcript = session.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].role(), Role::User);
        assert_eq!(transcript[1].content(), "library hours");
        assert!(session.is_composing());

        sleep(Duration::from_millis(1000)).await;
        assert_eq!(session.transcript().len(), 2);
        assert!(session.is_composing());

        sleep(Duration::from_millis(600)).await;
        let transcript = session.transcript();
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[2].role(), Role::Assistant);
        assert_eq!(transcript[2].content(), expected);
        assert!(!session.is_composing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_replies_follow_submission_order() {
        let session = ChatSession::with_defaults();
        let resolver = ResponseResolver::default();

        session.submit("hi");
        sleep(Duration::from_millis(500)).await;
        session.submit("thanks");

        sleep(Duration::from_millis(1100)).await;
        assert_eq!(session.transcript().len(), 4);
        assert!(session.is_composing());

        sleep(Duration::from_millis(500)).await;
        assert_eq!(
            contents(&session),
            vec![
                builtin::GREETING.to_string(),
                "hi".to_string(),
                "thanks".to_string(),
                resolver.resolve("hi"),
                resolver.resolve("thanks"),
            ]
        );
        assert!(!session.is_composing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_back_to_back_submissions() {
        let session = ChatSession::with_defaults();
        session.submit("schedule");
        session.submit("exams");

        sleep(Duration::from_millis(1600)).await;
        let transcript = session.transcript();
        assert_eq!(transcript.len(), 5);
        assert_eq!(transcript[3].content(), ResponseResolver::default().resolve("schedule"));
        assert_eq!(transcript[4].content(), ResponseResolver::default().resolve("exams"));

        let ids: Vec<_> = transcript.iter().map(Message::id).collect();
        assert_eq!(ids, (1..=5).map(MessageId).collect::<Vec<_>>());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_reply() {
        let session = ChatSession::with_defaults();
        session.submit("food");
        session.close();

        sleep(Duration::from_millis(3000)).await;
        assert_eq!(session.transcript().len(), 2);
        assert!(!session.is_composing());
        assert!(session.is_closed());

        session.submit("events");
        assert_eq!(session.transcript().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_reply() {
        let session = ChatSession::with_defaults();
        let mut events = session.subscribe();

        session.submit("library hours");
        drop(session);

        sleep(Duration::from_millis(3000)).await;

        let mut received = Vec::new();
        while let Ok(event) = events.try_recv() {
            received.push(event);
        }

        assert_eq!(received.len(), 4);
        match &received[0] {
            SessionEvent::MessageAppended(m) => {
                assert_eq!(m.role(), Role::User);
                assert_eq!(m.content(), "library hours");
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(received[1], SessionEvent::ComposingChanged(true));
        assert_eq!(received[2], SessionEvent::ComposingChanged(false));
        assert_eq!(received[3], SessionEvent::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_clears_composing_before_closed_event() {
        let session = ChatSession::with_defaults();
        let mut events = session.subscribe();

        session.submit("food");
        session.close();

        let received: Vec<_> = std::iter::from_fn(|| events.try_recv().ok()).collect();
        assert_eq!(received.len(), 4);
        assert_eq!(received[1], SessionEvent::ComposingChanged(true));
        assert_eq!(received[2], SessionEvent::ComposingChanged(false));
        assert_eq!(received[3], SessionEvent::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_when_idle_only_reports_closed() {
        let session = ChatSession::with_defaults();
        let mut events = session.subscribe();

        session.close();
        session.close();

        assert_eq!(events.try_recv().unwrap(), SessionEvent::Closed);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_responder_does_not_wedge_session() {
        struct Grumpy;

        impl Responder for Grumpy {
            fn respond(&self, utterance: &str) -> String {
                if utterance == "boom" {
                    panic!("cannot answer");
                }
                format!("ok: {}", utterance)
            }
        }

        let session = ChatSession::new(&Config::default(), Arc::new(Grumpy));
        session.submit("boom");

        sleep(Duration::from_millis(1600)).await;
        assert!(!session.is_composing());
        assert_eq!(session.transcript().len(), 2);

        session.submit("again");
        sleep(Duration::from_millis(1600)).await;
        assert_eq!(session.transcript()[3].content(), "ok: again");
        assert!(!session.is_composing());
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_buffer_and_quick_actions() {
        let session = ChatSession::with_defaults();
        assert!(!session.can_send());
        assert_eq!(session.quick_actions().len(), 4);

        session.apply_quick_action(session.quick_actions()[1]);
        assert_eq!(session.input(), "Library hours");
        assert!(session.can_send());

        session.send();
        assert_eq!(session.input(), "");
        assert!(!session.can_send());

        session.set_input("Upcoming events");
        assert!(!session.can_send());

        sleep(Duration::from_millis(1600)).await;
        assert!(session.can_send());
        assert_eq!(
            session.transcript()[2].content(),
            ResponseResolver::default().resolve("Library hours")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_events() {
        let session = ChatSession::with_defaults();
        let mut events = session.subscribe();

        session.submit("help");

        match events.recv().await.unwrap() {
            SessionEvent::MessageAppended(m) => assert_eq!(m.content(), "help"),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(events.recv().await.unwrap(), SessionEvent::ComposingChanged(true));

        match events.recv().await.unwrap() {
            SessionEvent::MessageAppended(m) => assert_eq!(m.role(), Role::Assistant),
            other => panic!("unexpected event: {:?}", other),
        }
        assert_eq!(events.recv().await.unwrap(), SessionEvent::ComposingChanged(false));

        session.close();
        assert_eq!(events.recv().await.unwrap(), SessionEvent::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_responder_and_delay() {
        struct Echo;

        impl Responder for Echo {
            fn respond(&self, utterance: &str) -> String {
                format!("echo: {}", utterance)
            }
        }

        let config = Config {
            assistant_name: "Genie".into(),
            ..Config::default()
        }
        .with_reply_delay(Duration::from_millis(10));
        let session = ChatSession::new(&config, Arc::new(Echo));

        assert_eq!(session.composing_label(), "Genie is thinking...");

        session.submit("ping");
        sleep(Duration::from_millis(20)).await;
        assert_eq!(session.transcript()[2].content(), "echo: ping");
    }

    #[test]
    fn test_event_serialization() {
        let json = serde_json::to_value(SessionEvent::ComposingChanged(true)).unwrap();
        assert_eq!(json["type"], "composing_changed");
        assert_eq!(json["data"], true);
    }
}
