use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use outbound_messaging::{
    application::{
        handlers::message_dispatcher::{DispatchOutcome, MessageDispatchHandler},
        services::{
            channel::{ChannelAdapter, ChannelError, ChannelGateway, SendReceipt},
            producer::Producer,
            retry_policy::RetryPolicy,
        },
        usecases::{
            admit::AdmissionGate,
            send_message::{SendError, SendMessageRequest, SendMessageUseCase},
        },
    },
    domain::{
        events::{EnvelopePayload, EnvelopeStatus, QueueEnvelope, decode, encode},
        models::{
            BulkJob, BulkRecipient, Channel, DeliveryStatus, EnvelopeType, ErrorClass,
            MessageContent, MessageDescriptor, ScheduledMessage, TemplateRef,
        },
        repositories::CreditLedger,
    },
    infrastructure::{
        messaging::in_memory::InMemoryQueue,
        repositories::in_memory::{InMemoryCreditLedger, InMemoryDeliveryRecordRepository},
    },
};

/// Replays queued responses, then succeeds.
struct ScriptedAdapter {
    channel: Channel,
    script: Mutex<VecDeque<Result<SendReceipt, ChannelError>>>,
    calls: AtomicUsize,
}

impl ScriptedAdapter {
    fn new(channel: Channel, script: Vec<Result<SendReceipt, ChannelError>>) -> Arc<Self> {
        Arc::new(Self {
            channel,
            script: Mutex::new(script.into()),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelAdapter for ScriptedAdapter {
    fn channel(&self) -> Channel {
        self.channel
    }

    async fn send(&self, message: &MessageDescriptor) -> Result<SendReceipt, ChannelError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.script.lock().await.pop_front().unwrap_or_else(|| {
            Ok(SendReceipt {
                provider_message_id: Some(format!("wamid.{call}.{}", message.recipient)),
            })
        })
    }
}

struct Harness {
    ledger: Arc<InMemoryCreditLedger>,
    queue: Arc<InMemoryQueue>,
    records: Arc<InMemoryDeliveryRecordRepository>,
    send: SendMessageUseCase,
    handler: MessageDispatchHandler,
}

fn harness(adapters: Vec<Arc<dyn ChannelAdapter>>) -> Harness {
    let ledger = Arc::new(InMemoryCreditLedger::new());
    let queue = Arc::new(InMemoryQueue::new());
    let records = Arc::new(InMemoryDeliveryRecordRepository::new());
    let producer = Producer::new(queue.clone());
    let send = SendMessageUseCase::new(
        Arc::new(AdmissionGate::new(ledger.clone())),
        producer.clone(),
    );
    let handler = MessageDispatchHandler::new(
        ChannelGateway::new(adapters),
        records.clone(),
        producer,
        RetryPolicy::default(),
    );
    Harness {
        ledger,
        queue,
        records,
        send,
        handler,
    }
}

fn whatsapp_text(recipient: &str) -> MessageDescriptor {
    MessageDescriptor {
        channel: Channel::Whatsapp,
        recipient: recipient.into(),
        content: MessageContent::Text {
            body: "Your class starts in one hour".into(),
        },
        sender_id: "coach-1".into(),
        subject: None,
        lead_ref: Some("lead-42".into()),
        correlation_id: Some("req-1".into()),
    }
}

fn bulk_job(count: usize) -> BulkJob {
    BulkJob {
        channel: Channel::Whatsapp,
        sender_id: "coach-1".into(),
        content: MessageContent::Template {
            template_ref: TemplateRef {
                name: "course_launch".into(),
                language: "en".into(),
            },
            template_parameters: vec!["friend".into()],
            body: None,
        },
        subject: None,
        delay_ms: 0,
        recipients: (0..count)
            .map(|i| BulkRecipient {
                recipient: format!("+49151000000{i:02}"),
                template_parameters: Some(vec![format!("Lead {i}")]),
                lead_ref: Some(format!("lead-{i}")),
            })
            .collect(),
        correlation_id: None,
    }
}

fn expired_token() -> ChannelError {
    ChannelError::Provider {
        status: Some(401),
        code: Some(190),
        subcode: Some(463),
        error_type: Some("OAuthException".into()),
        message: "Error validating access token: Session has expired".into(),
    }
}

fn timeout() -> ChannelError {
    ChannelError::Timeout("operation timed out".into())
}

async fn enqueue_single(h: &Harness, message: MessageDescriptor) -> Vec<u8> {
    h.ledger.top_up(&message.sender_id, 1).await.unwrap();
    h.send
        .execute(SendMessageRequest::Single(message))
        .await
        .unwrap();
    h.queue.pop(EnvelopeType::Whatsapp).await.unwrap()
}

#[tokio::test]
async fn bulk_admission_reserves_all_credits_before_any_send() {
    let adapter = ScriptedAdapter::new(Channel::Whatsapp, vec![]);
    let h = harness(vec![adapter.clone()]);
    h.ledger.top_up("coach-1", 5).await.unwrap();

    let response = h
        .send
        .execute(SendMessageRequest::Bulk(bulk_job(5)))
        .await
        .unwrap();

    assert_eq!(response.balance, 0);
    assert_eq!(response.units, 5);
    assert_eq!(response.queue, EnvelopeType::Bulk);
    assert_eq!(h.ledger.balance("coach-1").await.unwrap(), 0);
    assert_eq!(h.queue.len(EnvelopeType::Bulk).await, 1);
    assert_eq!(adapter.calls(), 0);
}

#[tokio::test]
async fn insufficient_credits_never_enqueue() {
    let h = harness(vec![]);
    h.ledger.top_up("coach-1", 4).await.unwrap();

    let err = h
        .send
        .execute(SendMessageRequest::Bulk(bulk_job(5)))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        SendError::InsufficientCredits {
            balance: 4,
            requested: 5
        }
    ));
    assert_eq!(h.ledger.balance("coach-1").await.unwrap(), 4);
    assert_eq!(h.queue.len(EnvelopeType::Bulk).await, 0);
}

#[tokio::test]
async fn invalid_request_reserves_nothing() {
    let h = harness(vec![]);
    h.ledger.top_up("coach-1", 1).await.unwrap();

    let err = h
        .send
        .execute(SendMessageRequest::Single(whatsapp_text("not-a-phone")))
        .await
        .unwrap_err();

    assert!(matches!(err, SendError::Invalid(_)));
    assert_eq!(h.ledger.balance("coach-1").await.unwrap(), 1);
}

#[tokio::test]
async fn unavailable_broker_reports_service_unavailable_and_keeps_reservation() {
    let h = harness(vec![]);
    h.ledger.top_up("coach-1", 3).await.unwrap();
    h.queue.set_online(false);

    let err = h
        .send
        .execute(SendMessageRequest::Single(whatsapp_text("+4915112345678")))
        .await
        .unwrap_err();

    assert!(matches!(err, SendError::ServiceUnavailable));
    assert_eq!(h.ledger.balance("coach-1").await.unwrap(), 2);
}

#[tokio::test]
async fn enqueued_descriptor_decodes_unchanged() {
    let h = harness(vec![]);
    let message = whatsapp_text("+4915112345678");
    let bytes = enqueue_single(&h, message.clone()).await;

    let envelope = decode(&bytes).unwrap();
    assert_eq!(envelope.envelope_type, EnvelopeType::Whatsapp);
    assert_eq!(envelope.retries, 0);
    assert_eq!(envelope.status, EnvelopeStatus::Queued);
    assert_eq!(envelope.payload, EnvelopePayload::Message(message));
}

#[tokio::test]
async fn successful_delivery_is_acked_and_recorded() {
    let adapter = ScriptedAdapter::new(Channel::Whatsapp, vec![]);
    let h = harness(vec![adapter.clone()]);
    let bytes = enqueue_single(&h, whatsapp_text("+4915112345678")).await;

    assert_eq!(h.handler.handle_delivery(&bytes, 1).await, DispatchOutcome::Ack);

    let records = h.records.all().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, DeliveryStatus::Delivered);
    assert!(records[0].provider_message_id.is_some());
    assert_eq!(records[0].lead_ref.as_deref(), Some("lead-42"));
}

#[tokio::test]
async fn expired_token_is_dropped_on_first_attempt() {
    let adapter = ScriptedAdapter::new(Channel::Whatsapp, vec![Err(expired_token())]);
    let h = harness(vec![adapter.clone()]);
    let bytes = enqueue_single(&h, whatsapp_text("+4915112345678")).await;

    assert_eq!(
        h.handler.handle_delivery(&bytes, 1).await,
        DispatchOutcome::DeadLetter
    );
    assert_eq!(adapter.calls(), 1);

    let records = h.records.all().await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, DeliveryStatus::Failed);
    assert_eq!(records[0].error_class, Some(ErrorClass::Permanent));
    assert_eq!(records[0].retry_count, 0);
}

#[tokio::test]
async fn transient_failures_back_off_exponentially_then_drop() {
    let adapter = ScriptedAdapter::new(
        Channel::Whatsapp,
        vec![Err(timeout()), Err(timeout()), Err(timeout()), Err(timeout())],
    );
    let h = harness(vec![adapter.clone()]);
    let bytes = enqueue_single(&h, whatsapp_text("+4915112345678")).await;

    let mut outcomes = Vec::new();
    for delivered in 1..=4 {
        outcomes.push(h.handler.handle_delivery(&bytes, delivered).await);
    }

    assert_eq!(
        outcomes,
        vec![
            DispatchOutcome::Requeue(Duration::from_secs(2)),
            DispatchOutcome::Requeue(Duration::from_secs(4)),
            DispatchOutcome::Requeue(Duration::from_secs(8)),
            DispatchOutcome::DeadLetter,
        ]
    );
    assert_eq!(adapter.calls(), 4);

    let records = h.records.all().await;
    let statuses: Vec<_> = records.iter().map(|r| (r.status, r.retry_count)).collect();
    assert_eq!(
        statuses,
        vec![
            (DeliveryStatus::Retrying, 1),
            (DeliveryStatus::Retrying, 2),
            (DeliveryStatus::Retrying, 3),
            (DeliveryStatus::Failed, 3),
        ]
    );
    assert_eq!(records[3].error_class, Some(ErrorClass::Transient));
}

#[tokio::test]
async fn transient_then_success_acks() {
    let adapter = ScriptedAdapter::new(Channel::Whatsapp, vec![Err(timeout())]);
    let h = harness(vec![adapter.clone()]);
    let bytes = enqueue_single(&h, whatsapp_text("+4915112345678")).await;

    assert_eq!(
        h.handler.handle_delivery(&bytes, 1).await,
        DispatchOutcome::Requeue(Duration::from_secs(2))
    );
    assert_eq!(h.handler.handle_delivery(&bytes, 2).await, DispatchOutcome::Ack);
}

#[tokio::test]
async fn malformed_payload_is_dead_lettered_without_sending() {
    let adapter = ScriptedAdapter::new(Channel::Whatsapp, vec![]);
    let h = harness(vec![adapter.clone()]);

    assert_eq!(
        h.handler.handle_delivery(b"{\"type\":\"whatsapp\"", 1).await,
        DispatchOutcome::DeadLetter
    );
    assert_eq!(adapter.calls(), 0);
    assert!(h.records.all().await.is_empty());
}

#[tokio::test]
async fn unregistered_channel_is_permanent() {
    let h = harness(vec![]);
    let bytes = enqueue_single(&h, whatsapp_text("+4915112345678")).await;

    assert_eq!(
        h.handler.handle_delivery(&bytes, 1).await,
        DispatchOutcome::DeadLetter
    );
    assert_eq!(
        h.records.all().await[0].error_class,
        Some(ErrorClass::Permanent)
    );
}

#[tokio::test]
async fn bulk_envelope_records_every_recipient_and_acks() {
    let adapter = ScriptedAdapter::new(
        Channel::Whatsapp,
        vec![
            Ok(SendReceipt {
                provider_message_id: Some("wamid.1".into()),
            }),
            Err(timeout()),
            Err(expired_token()),
        ],
    );
    let h = harness(vec![adapter.clone()]);
    let bytes = encode(&QueueEnvelope::new(EnvelopePayload::Bulk(bulk_job(4)))).unwrap();

    assert_eq!(h.handler.handle_delivery(&bytes, 1).await, DispatchOutcome::Ack);
    assert_eq!(adapter.calls(), 4);

    let records = h.records.all().await;
    assert_eq!(records.len(), 4);
    let delivered = records
        .iter()
        .filter(|r| r.status == DeliveryStatus::Delivered)
        .count();
    assert_eq!(delivered, 2);
    assert!(records.iter().all(|r| r.envelope_type == EnvelopeType::Bulk));
    assert_eq!(records[2].lead_ref.as_deref(), Some("lead-2"));
}

#[tokio::test]
async fn scheduled_message_waits_until_due_then_moves_to_channel_queue() {
    let h = harness(vec![]);
    let pending = QueueEnvelope::new(EnvelopePayload::Scheduled(ScheduledMessage {
        send_at: Utc::now() + chrono::Duration::minutes(30),
        message: whatsapp_text("+4915112345678"),
    }));

    match h.handler.handle(pending).await {
        DispatchOutcome::Defer(wait) => {
            assert!(wait > Duration::from_secs(29 * 60));
            assert!(wait <= Duration::from_secs(30 * 60));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
    assert_eq!(h.queue.len(EnvelopeType::Whatsapp).await, 0);

    let due = QueueEnvelope::new(EnvelopePayload::Scheduled(ScheduledMessage {
        send_at: Utc::now() - chrono::Duration::seconds(1),
        message: whatsapp_text("+4915112345678"),
    }));
    assert_eq!(h.handler.handle(due).await, DispatchOutcome::Ack);

    let released = decode(&h.queue.pop(EnvelopeType::Whatsapp).await.unwrap()).unwrap();
    assert_eq!(
        released.payload,
        EnvelopePayload::Message(whatsapp_text("+4915112345678"))
    );
}

#[tokio::test]
async fn scheduled_release_retries_while_queue_is_down() {
    let h = harness(vec![]);
    h.queue.set_online(false);
    let due = QueueEnvelope::new(EnvelopePayload::Scheduled(ScheduledMessage {
        send_at: Utc::now(),
        message: whatsapp_text("+4915112345678"),
    }));

    assert_eq!(
        h.handler.handle(due).await,
        DispatchOutcome::Requeue(Duration::from_secs(2))
    );
}
