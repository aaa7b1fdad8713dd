//! CampusGenie - chat core for the campus information widget
//!
//! Answers campus questions from a fixed keyword table and manages the
//! widget's chat session: the transcript, the input box, and the delayed
//! "assistant is thinking" reply.
//!
//! # Example
//!
//! ```no_run
//! use campus_genie::ChatSession;
//!
//! # async fn demo() {
//! let session = ChatSession::with_defaults();
//! session.submit("Library hours");
//! assert!(session.is_composing());
//!
//! tokio::time::sleep(std::time::Duration::from_millis(1600)).await;
//! for message in session.transcript() {
//!     println!("{:?}: {}", message.role(), message.content());
//! }
//! # }
//! ```

pub mod config;
pub mod conversation;
pub mod core;
pub mod telemetry;

pub use config::{Config, ConfigError};
pub use conversation::{Message, MessageId, Role, Transcript};
pub use crate::core::{
    ChatSession, Replies, Responder, ResponseResolver, RuleTable, SessionEvent,
};
