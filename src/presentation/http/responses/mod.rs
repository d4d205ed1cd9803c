use poem_openapi::Object;
use uuid::Uuid;

#[derive(Object)]
#[oai(rename_all = "camelCase")]
pub struct HealthDto {
    pub status: String,
    pub broker_connected: bool,
}

#[derive(Object)]
#[oai(rename_all = "camelCase")]
pub struct DeliveryStatsDto {
    pub sender_id: String,
    pub total: u64,
    pub delivered: u64,
    pub retrying: u64,
    pub failed: u64,
    pub balance: u64,
}

#[derive(Object)]
#[oai(rename_all = "camelCase")]
pub struct DeliveryRecordDto {
    pub id: Uuid,
    pub channel: String,
    pub envelope_type: String,
    pub recipient: String,
    pub status: String,
    pub provider_message_id: Option<String>,
    pub error_class: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub correlation_id: Option<String>,
    pub lead_ref: Option<String>,
    pub attempted_at: String,
}

#[derive(Object)]
#[oai(rename_all = "camelCase")]
pub struct DeliveryPageDto {
    pub deliveries: Vec<DeliveryRecordDto>,
    pub has_more: bool,
    pub next_offset: Option<u32>,
}
