use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_nats::jetstream::{self, AckKind};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::{
    application::handlers::message_dispatcher::{DispatchOutcome, MessageDispatchHandler},
    domain::models::EnvelopeType,
    infrastructure::messaging::jetstream::JetstreamQueueClient,
};

const RESUBSCRIBE_PAUSE: Duration = Duration::from_secs(2);
/// Consecutive receive errors tolerated before the subscription is rebuilt.
const MAX_RECEIVE_ERRORS: u32 = 5;

/// Consumer loop for one queue. Queues run in parallel, messages within a
/// queue one at a time.
pub struct QueueWorker {
    queue: EnvelopeType,
    client: Arc<JetstreamQueueClient>,
    handler: Arc<MessageDispatchHandler>,
    progress_every: Duration,
}

impl QueueWorker {
    pub fn new(
        queue: EnvelopeType,
        client: Arc<JetstreamQueueClient>,
        handler: Arc<MessageDispatchHandler>,
    ) -> Self {
        Self {
            queue,
            progress_every: client.progress_interval(),
            client,
            handler,
        }
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(shutdown).await })
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let queue = self.queue.queue_name();
        info!(queue, "worker started");

        while !*shutdown.borrow() {
            let Err(err) = self.consume(&mut shutdown).await else {
                break;
            };
            error!(queue, error = %err, "consumer loop failed, resubscribing");
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(RESUBSCRIBE_PAUSE) => {}
            }
        }

        info!(queue, "worker stopped");
    }

    /// Returns `Ok` on shutdown and `Err` when the subscription breaks.
    async fn consume(&self, shutdown: &mut watch::Receiver<bool>) -> anyhow::Result<()> {
        let consumer = self.client.consumer(self.queue).await?;
        let mut messages = consumer
            .stream()
            .max_messages_per_batch(1)
            .messages()
            .await?;

        pump(self.queue.queue_name(), &mut messages, shutdown, move |message| {
            self.process_message(message)
        })
        .await
    }

    async fn process_message(&self, message: jetstream::Message) {
        let queue = self.queue.queue_name();
        let delivered = message
            .info()
            .map(|info| info.delivered.max(1) as u32)
            .unwrap_or(1);

        let handling = self.handler.handle_delivery(&message.payload, delivered);
        let pending = &message;
        let outcome = with_progress(handling, self.progress_every, move || async move {
            if let Err(err) = pending.ack_with(AckKind::Progress).await {
                warn!(queue, error = %err, "failed to extend ack deadline");
            }
        })
        .await;
        debug!(queue, delivered, ?outcome, "acknowledging message");

        if let Err(err) = message.ack_with(ack_kind(outcome)).await {
            // Unacknowledged messages are redelivered after the ack wait.
            error!(queue, error = %err, "failed to acknowledge message");
        }
    }
}

fn ack_kind(outcome: DispatchOutcome) -> AckKind {
    match outcome {
        DispatchOutcome::Ack => AckKind::Ack,
        DispatchOutcome::Requeue(delay) | DispatchOutcome::Defer(delay) => {
            AckKind::Nak(Some(delay))
        }
        DispatchOutcome::DeadLetter => AckKind::Term,
    }
}

/// Feeds received messages to `handle` one at a time until shutdown. Fails
/// when the stream ends or keeps erroring.
async fn pump<S, M, E, H, F>(
    queue: &'static str,
    messages: &mut S,
    shutdown: &mut watch::Receiver<bool>,
    mut handle: H,
) -> anyhow::Result<()>
where
    S: Stream<Item = Result<M, E>> + Unpin,
    E: std::fmt::Display,
    H: FnMut(M) -> F,
    F: Future<Output = ()>,
{
    let mut consecutive_errors = 0;
    loop {
        let next = tokio::select! {
            _ = shutdown.changed() => return Ok(()),
            next = messages.next() => next,
        };
        match next {
            Some(Ok(message)) => {
                consecutive_errors = 0;
                handle(message).await;
            }
            Some(Err(err)) => {
                consecutive_errors += 1;
                warn!(queue, consecutive_errors, error = %err, "failed to receive message");
                if consecutive_errors >= MAX_RECEIVE_ERRORS {
                    anyhow::bail!(
                        "{consecutive_errors} consecutive receive errors, last: {err}"
                    );
                }
            }
            None => anyhow::bail!("message stream ended"),
        }
    }
}

/// Drives `work` to completion, calling `progress` every `every` until it
/// finishes.
async fn with_progress<T, P, F>(
    work: impl Future<Output = T>,
    every: Duration,
    mut progress: P,
) -> T
where
    P: FnMut() -> F,
    F: Future<Output = ()>,
{
    tokio::pin!(work);
    let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            output = &mut work => return output,
            _ = ticker.tick() => progress().await,
        }
    }
}
