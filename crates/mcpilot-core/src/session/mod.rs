//! Conversation logging.

pub mod log;

pub use log::SessionLog;
