//! Webhook handling for GitHub events.
//!
//! This module provides:
//! - Signature verification for webhook payloads (HMAC-SHA256)
//! - Parsing of the events the train reacts to

pub mod events;
pub mod parser;
pub mod signature;

pub use events::TrainEvent;
pub use parser::{ParseError, parse_webhook};
pub use signature::{SignatureError, WebhookSecret};
