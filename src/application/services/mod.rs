pub mod channel;
pub mod failure_classifier;
pub mod producer;
pub mod queue;
pub mod retry_policy;
