pub mod email;
pub mod in_memory;
pub mod jetstream;
pub mod whatsapp;
pub mod worker;
