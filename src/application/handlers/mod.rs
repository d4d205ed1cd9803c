pub mod bulk_throttler;
pub mod message_dispatcher;
