use crate::{domain::models::DeliveryRecord, presentation::http::responses::DeliveryRecordDto};

pub fn map_record(record: &DeliveryRecord) -> DeliveryRecordDto {
    DeliveryRecordDto {
        id: record.id,
        channel: record.channel.as_str().to_string(),
        envelope_type: record.envelope_type.as_str().to_string(),
        recipient: record.recipient.clone(),
        status: record.status.as_str().to_string(),
        provider_message_id: record.provider_message_id.clone(),
        error_class: record.error_class.map(|class| class.as_str().to_string()),
        error_message: record.error_message.clone(),
        retry_count: record.retry_count,
        correlation_id: record.correlation_id.clone(),
        lead_ref: record.lead_ref.clone(),
        attempted_at: record.attempted_at.to_rfc3339(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;
    use crate::domain::models::{Channel, DeliveryStatus, EnvelopeType, ErrorClass};

    #[test]
    fn failed_record_exposes_error_class() {
        let dto = map_record(&DeliveryRecord {
            id: Uuid::new_v4(),
            sender_id: "coach-1".into(),
            channel: Channel::Whatsapp,
            envelope_type: EnvelopeType::Bulk,
            recipient: "+4915100000001".into(),
            status: DeliveryStatus::Failed,
            provider_message_id: None,
            error_class: Some(ErrorClass::Permanent),
            error_message: Some("template not approved".into()),
            retry_count: 0,
            correlation_id: None,
            lead_ref: Some("lead-7".into()),
            attempted_at: Utc::now(),
        });

        assert_eq!(dto.channel, "whatsapp");
        assert_eq!(dto.envelope_type, "bulk");
        assert_eq!(dto.status, "failed");
        assert_eq!(dto.error_class.as_deref(), Some("permanent"));
    }
}
