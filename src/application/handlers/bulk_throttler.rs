use std::time::Duration;

use tracing::debug;

use crate::{
    application::services::{channel::ChannelGateway, failure_classifier::classify},
    domain::models::{BulkJob, BulkReport, DeliveryResult, MessageDescriptor},
};

pub struct BulkOutcome {
    pub message: MessageDescriptor,
    pub result: DeliveryResult,
}

/// Per-recipient outcomes in recipient order, plus their aggregate.
pub struct BulkRun {
    pub outcomes: Vec<BulkOutcome>,
    pub report: BulkReport,
}

/// Expands a bulk job into single sends, spaced `delay_ms` apart.
#[derive(Clone)]
pub struct BulkThrottler {
    gateway: ChannelGateway,
}

impl BulkThrottler {
    pub fn new(gateway: ChannelGateway) -> Self {
        Self { gateway }
    }

    /// Sends to every recipient in order. A failed recipient never stops the job.
    pub async fn run(&self, job: &BulkJob) -> BulkRun {
        let delay = Duration::from_millis(job.delay_ms);
        let total = job.recipients.len();
        let mut outcomes = Vec::with_capacity(total);

        for (index, recipient) in job.recipients.iter().enumerate() {
            let message = job.descriptor_for(recipient);
            let result = match self.gateway.send(&message).await {
                Ok(receipt) => {
                    DeliveryResult::delivered(&message.recipient, receipt.provider_message_id)
                }
                Err(err) => {
                    let class = classify(&err);
                    debug!(
                        recipient = %message.recipient,
                        error_class = class.as_str(),
                        error = %err,
                        "bulk recipient failed"
                    );
                    DeliveryResult::failed(&message.recipient, class, err.to_string())
                }
            };
            outcomes.push(BulkOutcome { message, result });

            if index + 1 < total && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let report = BulkReport::from_results(outcomes.iter().map(|o| o.result.clone()));
        BulkRun { outcomes, report }
    }
}
