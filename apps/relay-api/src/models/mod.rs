pub mod alert;
pub mod message;
