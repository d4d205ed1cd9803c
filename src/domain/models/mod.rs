pub mod bulk;
pub mod channel;
pub mod delivery;
pub mod message;

pub use bulk::{BulkJob, BulkRecipient, ScheduledMessage, merge_parameters};
pub use channel::{Channel, EnvelopeType};
pub use delivery::{
    BulkReport, DeliveryRecord, DeliveryResult, DeliveryStats, DeliveryStatus, ErrorClass,
};
pub use message::{MediaRef, MediaType, MessageContent, MessageDescriptor, TemplateRef};
