//! End-to-end generation flow tests: chat send, phase progression,
//! failure/retry, and slot supersession through the public services.

use async_trait::async_trait;
use futures::StreamExt;
use plume_application::{
    ChatService, GenerationRegistry, PendingMap, ResponseAssembler, TranscriptEntry,
};
use plume_core::error::{PlumeError, Result};
use plume_core::event::{Channel, DonePayload, StreamEvent};
use plume_core::message::{ERROR_GLYPH, MessageRole};
use plume_core::pending::ResponsePhase;
use plume_core::request::GenerationRequest;
use plume_core::section::SectionBatch;
use plume_core::slot::GenerationSlot;
use plume_interaction::{EventStream, GenerationTransport, RenditionKind};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Transport replaying one scripted event list per call, in call order.
struct ReplayTransport {
    scripts: Mutex<Vec<ScriptEntry>>,
}

struct ScriptEntry {
    events: Vec<StreamEvent>,
    delay_per_event: Duration,
}

impl ReplayTransport {
    fn new() -> Self {
        Self {
            scripts: Mutex::new(Vec::new()),
        }
    }

    fn push(&self, events: Vec<StreamEvent>) {
        self.push_with_delay(events, Duration::ZERO);
    }

    fn push_with_delay(&self, events: Vec<StreamEvent>, delay_per_event: Duration) {
        self.scripts.lock().unwrap().push(ScriptEntry {
            events,
            delay_per_event,
        });
    }
}

#[async_trait]
impl GenerationTransport for ReplayTransport {
    async fn stream_generation(&self, _request: &GenerationRequest) -> EventStream {
        let entry = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                ScriptEntry {
                    events: Vec::new(),
                    delay_per_event: Duration::ZERO,
                }
            } else {
                scripts.remove(0)
            }
        };
        let delay = entry.delay_per_event;
        futures::stream::iter(entry.events)
            .then(move |event| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                event
            })
            .boxed()
    }

    async fn prepare_shred(&self, _file_name: &str) -> Result<SectionBatch> {
        Err(PlumeError::internal("not used"))
    }

    async fn export_rendition(&self, _content: &str, _kind: RenditionKind) -> Result<Vec<u8>> {
        Err(PlumeError::internal("not used"))
    }
}

fn delta(content: &str, channel: Channel) -> StreamEvent {
    StreamEvent::Delta {
        content: content.to_string(),
        channel,
    }
}

fn done(text: &str) -> StreamEvent {
    StreamEvent::Done(DonePayload {
        text: Some(text.to_string()),
        rows: None,
    })
}

fn service(transport: Arc<ReplayTransport>) -> (ChatService, Arc<GenerationRegistry>) {
    let registry = Arc::new(GenerationRegistry::new());
    let assembler = ResponseAssembler::new(PendingMap::default())
        .with_settle_interval(Duration::from_millis(1));
    let service = ChatService::new(transport, registry.clone()).with_assembler(assembler);
    (service, registry)
}

#[tokio::test]
async fn chat_send_commits_answer_and_clears_pending() {
    let transport = Arc::new(ReplayTransport::new());
    transport.push(vec![
        delta("Hi", Channel::Analysis),
        delta("Hello", Channel::Final),
        done("Hello"),
    ]);
    let (service, _) = service(transport);
    let slot = GenerationSlot::chat("chat-1");

    let outcome = service
        .send(GenerationRequest::new(slot.clone(), "greet me", "gpt-4o"))
        .await
        .unwrap()
        .expect("not superseded");

    assert_eq!(outcome.message.content, "Hello");
    assert_eq!(
        outcome.phase_history,
        vec![
            ResponsePhase::Accumulating,
            ResponsePhase::Analysis,
            ResponsePhase::Thinking,
            ResponsePhase::Final,
        ]
    );

    let history = service.history(&slot).await;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, MessageRole::User);
    assert_eq!(history[0].content, "greet me");
    assert_eq!(history[1].role, MessageRole::Assistant);
    assert_eq!(history[1].content, "Hello");

    assert!(service.pending_for(&slot).await.is_none());
}

#[tokio::test]
async fn failed_send_commits_error_message_and_retry_succeeds() {
    let transport = Arc::new(ReplayTransport::new());
    transport.push(vec![
        StreamEvent::Error {
            message: "model overloaded".to_string(),
        },
        StreamEvent::Done(DonePayload::default()),
    ]);
    transport.push(vec![delta("Recovered", Channel::Final), done("Recovered")]);
    let (service, registry) = service(transport);
    let slot = GenerationSlot::chat("chat-1");

    let request = GenerationRequest::new(slot.clone(), "original question", "gpt-4o");
    let error = service.send(request.clone()).await.unwrap_err();
    assert!(matches!(error, PlumeError::Generation(_)));

    // The error-flavored message is committed and the descriptor retained
    // with the original user content.
    let history = service.history(&slot).await;
    assert_eq!(history.len(), 2);
    assert!(history[1].content.starts_with(ERROR_GLYPH));
    let retained = registry.peek_last_failed().await.unwrap();
    assert_eq!(retained.content, "original question");

    // Retry resubmits verbatim through the normal start path.
    let outcome = service.retry_last_failed().await.unwrap().unwrap();
    assert_eq!(outcome.message.content, "Recovered");

    // The user message is not duplicated by the retry.
    let history = service.history(&slot).await;
    let user_messages = history
        .iter()
        .filter(|m| m.role == MessageRole::User)
        .count();
    assert_eq!(user_messages, 1);
    assert!(registry.peek_last_failed().await.is_none());
}

#[tokio::test]
async fn stream_without_done_commits_ended_unexpectedly() {
    let transport = Arc::new(ReplayTransport::new());
    transport.push(vec![delta("partial", Channel::Final)]);
    let (service, _) = service(transport);
    let slot = GenerationSlot::chat("chat-1");

    let error = service
        .send(GenerationRequest::new(slot.clone(), "question", "gpt-4o"))
        .await
        .unwrap_err();
    assert!(matches!(error, PlumeError::StreamEndedUnexpectedly));

    let history = service.history(&slot).await;
    assert!(history[1].content.starts_with(ERROR_GLYPH));
    assert!(history[1].content.contains("ended unexpectedly"));
}

#[tokio::test]
async fn superseding_send_cancels_prior_loop_on_same_slot() {
    let transport = Arc::new(ReplayTransport::new());
    // First stream is slow enough to still be running when the second send
    // arrives; its content must never reach history.
    transport.push_with_delay(
        vec![delta("stale", Channel::Final), done("stale")],
        Duration::from_millis(30),
    );
    transport.push(vec![delta("fresh", Channel::Final), done("fresh")]);
    let (service, _) = service(transport);
    let service = Arc::new(service);
    let slot = GenerationSlot::chat("chat-1");

    let slow = tokio::spawn({
        let service = service.clone();
        let slot = slot.clone();
        async move {
            service
                .send(GenerationRequest::new(slot, "first", "gpt-4o"))
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(5)).await;

    let outcome = service
        .send(GenerationRequest::new(slot.clone(), "second", "gpt-4o"))
        .await
        .unwrap()
        .expect("not superseded");
    assert_eq!(outcome.message.content, "fresh");

    // The superseded loop reports None and committed nothing.
    let stale_result = slow.await.unwrap().unwrap();
    assert!(stale_result.is_none());

    let history = service.history(&slot).await;
    let assistant_contents: Vec<_> = history
        .iter()
        .filter(|m| m.role == MessageRole::Assistant)
        .map(|m| m.content.as_str())
        .collect();
    assert_eq!(assistant_contents, vec!["fresh"]);
}

#[tokio::test]
async fn transcript_shows_pending_then_committed() {
    let transport = Arc::new(ReplayTransport::new());
    transport.push_with_delay(
        vec![delta("typing...", Channel::Final), done("typing... done")],
        Duration::from_millis(20),
    );
    let (service, _) = service(transport);
    let service = Arc::new(service);
    let slot = GenerationSlot::chat("chat-1");

    let sender = tokio::spawn({
        let service = service.clone();
        let slot = slot.clone();
        async move {
            service
                .send(GenerationRequest::new(slot, "hello", "gpt-4o"))
                .await
        }
    });

    // Mid-flight the transcript ends with the pending entry.
    tokio::time::sleep(Duration::from_millis(30)).await;
    let transcript = service.transcript(&slot).await;
    assert!(matches!(
        transcript.last().unwrap(),
        TranscriptEntry::Pending(_)
    ));

    sender.await.unwrap().unwrap();
    let transcript = service.transcript(&slot).await;
    assert!(transcript
        .iter()
        .all(|entry| matches!(entry, TranscriptEntry::Committed(_))));
}
