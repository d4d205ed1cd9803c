pub mod admit;
pub mod get_delivery_stats;
pub mod list_deliveries;
pub mod send_message;
