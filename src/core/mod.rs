//! Core chat components
//!
//! The keyword resolver that picks replies and the session controller that
//! drives a widget's transcript.

mod resolver;
mod session;

pub use resolver::{
    Match, Replies, Responder, ResponseResolver, Rule, RuleError, RuleTable,
    UTTERANCE_PLACEHOLDER,
};
pub use session::{ChatSession, SessionEvent};
