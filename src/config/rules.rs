//! Rule tables loaded from TOML files
//!
//! Deployments can replace the built-in campus replies with their own table.
//! Rules are read in file order, which is also their match precedence.
//!
//! # Example Rule File
//!
//! ```toml
//! [replies]
//! greeting = "Hey! Ask me about the campus."
//! fallback = "Not sure about \"{utterance}\" yet."
//!
//! [[rules]]
//! keyword = "parking"
//! reply = "Visitor parking is in Lot B."
//!
//! [[rules]]
//! keyword = "gym"
//! reply = "The gym is open 6 AM - 11 PM."
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::ConfigError;
use crate::core::{Replies, ResponseResolver, Rule, RuleTable, UTTERANCE_PLACEHOLDER};

/// A rule table file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFile {
    /// Canned reply overrides
    #[serde(default)]
    pub replies: ReplyOverrides,

    /// Keyword rules, highest precedence first
    #[serde(default)]
    pub rules: Vec<Rule>,
}

/// Optional replacements for the built-in canned replies
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplyOverrides {
    #[serde(default)]
    pub greeting: Option<String>,

    #[serde(default)]
    pub acknowledgment: Option<String>,

    /// Fallback template, must contain `{utterance}`
    #[serde(default)]
    pub fallback: Option<String>,
}

impl RuleFile {
    /// Load a rule file from disk
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Parse a rule file from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let file: RuleFile = toml::from_str(content)?;
        Ok(file)
    }

    /// Build a resolver, validating keywords and the fallback template
    pub fn into_resolver(self) -> Result<ResponseResolver, ConfigError> {
        if self.rules.is_empty() {
            return Err(ConfigError::Validation(
                "rule file defines no rules".to_string(),
            ));
        }

        let table = RuleTable::try_from(self.rules)?;

        let defaults = Replies::default();
        let replies = Replies {
            greeting: self.replies.greeting.unwrap_or(defaults.greeting),
            acknowledgment: self.replies.acknowledgment.unwrap_or(defaults.acknowledgment),
            fallback: self.replies.fallback.unwrap_or(defaults.fallback),
        };

        if !replies.fallback.contains(UTTERANCE_PLACEHOLDER) {
            return Err(ConfigError::Validation(format!(
                "fallback reply must contain {}",
                UTTERANCE_PLACEHOLDER
            )));
        }

        tracing::debug!(rules = table.len(), "Loaded rule table");
        Ok(ResponseResolver::new(table, replies))
    }
}

/// Built-in campus texts that don't require files
pub mod builtin {
    /// Name the assistant uses for itself
    pub const ASSISTANT_NAME: &str = "CampusGenie";

    /// First message of every session
    pub const GREETING: &str = "Hello! I'm CampusGenie, your intelligent campus companion! 🧞‍♂️ How can I help you today? I can assist with schedules, facilities, events, and more!";

    /// Suggestions offered above the input box
    pub const QUICK_ACTIONS: &[&str] = &[
        "Show my schedule",
        "Library hours",
        "Upcoming events",
        "Dining options",
    ];

    pub const GREETING_REPLY: &str = "Hello there! 👋 I'm here to make your campus life easier. What would you like to know about?";

    pub const ACKNOWLEDGMENT_REPLY: &str =
        "You're very welcome! 😊 Is there anything else I can help you with today?";

    pub const FALLBACK_TEMPLATE: &str = "I understand you're asking about \"{utterance}\". While I'm still learning about this topic, I can definitely help you with class schedules, campus facilities, upcoming events, dining options, and general campus information. What specific area would you like to explore? 🤔";

    /// Keyword rules in match order
    pub const RULES: &[(&str, &str)] = &[
        (
            "schedule",
            "Here are today's class schedules: \n• 8:00 AM - Mathematics (Room 101)\n• 9:45 AM - Programming Lab (Lab 204)\n• 11:30 AM - Physics (Room 305)\n• 2:00 PM - Project Work (Team rooms)",
        ),
        (
            "exam",
            "Upcoming exams:\n• Mid-term: Oct 15-25, 2025\n• Practical exams: Nov 1-10, 2025\n• Final exams: Dec 10-20, 2025\nDon't forget to register and prepare your hall tickets! 📚",
        ),
        (
            "library",
            "Library Information:\n• Hours: 8:00 AM - 10:00 PM (Mon-Sat)\n• Current capacity: 85% (247/290 seats)\n• New arrivals: 15 books this week\n• Digital resources: Available 24/7\nWould you like me to reserve a seat for you? 📖",
        ),
        (
            "food",
            "Campus Dining Options:\n• Main Cafeteria: Open until 9 PM\n• Coffee Corner: Open 24/7\n• Food Court: 11 AM - 10 PM\n• Today's Special: Butter Chicken & Biryani\nAll payment methods accepted! 🍽️",
        ),
        (
            "event",
            "Upcoming Events:\n• Tech Fest 2025: March 15-17\n• Annual Sports Meet: February 10-12\n• Cultural Night: January 25\n• Industry Career Fair: April 5\nRegister now to participate! 🎉",
        ),
        (
            "help",
            "I can help you with:\n✅ Class schedules & exam dates\n✅ Campus facility information\n✅ Event updates & registrations\n✅ Dining & accommodation info\n✅ Academic calendar & deadlines\n✅ Contact information\n\nJust ask me anything about campus life! 😊",
        ),
    ];
}
