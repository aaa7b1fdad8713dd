//! Keyword reply resolver
//!
//! Picks a canned reply for a user utterance. Rules are checked in table
//! order and the first keyword found in the lowercased utterance wins, so
//! table order decides precedence when keywords overlap. When no rule
//! matches, a greeting or acknowledgment check runs before the templated
//! fallback that echoes the utterance.

use serde::{Deserialize, Serialize};

use crate::config::rules::builtin;

/// Placeholder substituted with the user's original utterance in the fallback
pub const UTTERANCE_PLACEHOLDER: &str = "{utterance}";

/// A keyword and the reply it selects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub keyword: String,
    pub reply: String,
}

impl Rule {
    /// Matches on the keyword or its naive plural, anywhere in the text
    fn matches(&self, normalized: &str) -> bool {
        normalized.contains(self.keyword.as_str())
            || normalized.contains(format!("{}s", self.keyword).as_str())
    }
}

/// Errors from building a rule table
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("Rule keyword must not be empty")]
    EmptyKeyword,

    #[error("Duplicate rule keyword: {0}")]
    DuplicateKeyword(String),
}

/// Ordered keyword -> reply table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The campus table: schedule, exam, library, food, event, help
    pub fn canonical() -> Self {
        builtin::RULES
            .iter()
            .fold(Self::new(), |table, (keyword, reply)| {
                table.with_rule(keyword, reply)
            })
    }

    /// Builder form of [`RuleTable::push`] for tables known to be valid
    ///
    /// # Panics
    ///
    /// Panics on an empty or duplicate keyword.
    pub fn with_rule(mut self, keyword: &str, reply: &str) -> Self {
        if let Err(e) = self.push(keyword, reply) {
            panic!("invalid rule table: {}", e);
        }
        self
    }

    /// Append a rule at the lowest precedence
    pub fn push(&mut self, keyword: &str, reply: &str) -> Result<(), RuleError> {
        let keyword = keyword.to_lowercase();
        if keyword.is_empty() {
            return Err(RuleError::EmptyKeyword);
        }
        if self.rules.iter().any(|r| r.keyword == keyword) {
            return Err(RuleError::DuplicateKeyword(keyword));
        }

        self.rules.push(Rule {
            keyword,
            reply: reply.to_string(),
        });
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    pub fn keywords(&self) -> Vec<&str> {
        self.rules.iter().map(|r| r.keyword.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl TryFrom<Vec<Rule>> for RuleTable {
    type Error = RuleError;

    fn try_from(rules: Vec<Rule>) -> Result<Self, Self::Error> {
        let mut table = Self::new();
        for rule in rules {
            table.push(&rule.keyword, &rule.reply)?;
        }
        Ok(table)
    }
}

/// Canned replies used when no rule matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replies {
    pub greeting: String,
    pub acknowledgment: String,
    /// Must contain `{utterance}`; it is replaced with the original text
    pub fallback: String,
}

impl Default for Replies {
    fn default() -> Self {
        Self {
            greeting: builtin::GREETING_REPLY.to_string(),
            acknowledgment: builtin::ACKNOWLEDGMENT_REPLY.to_string(),
            fallback: builtin::FALLBACK_TEMPLATE.to_string(),
        }
    }
}

/// Which branch of the resolver produced a reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Match<'a> {
    Rule(&'a Rule),
    Greeting,
    Acknowledgment,
    Fallback,
}

/// Anything that can turn a user utterance into an assistant reply
///
/// A session treats a panic in `respond` as a dropped reply: nothing is
/// appended and the composing state is released.
pub trait Responder: Send + Sync {
    fn respond(&self, utterance: &str) -> String;
}

/// Deterministic keyword resolver
#[derive(Debug, Clone)]
pub struct ResponseResolver {
    rules: RuleTable,
    replies: Replies,
}

impl ResponseResolver {
    pub fn new(rules: RuleTable, replies: Replies) -> Self {
        Self { rules, replies }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    /// Report which branch would answer `utterance`
    pub fn matched_rule(&self, utterance: &str) -> Match<'_> {
        let normalized = utterance.to_lowercase();

        if let Some(rule) = self.rules.iter().find(|r| r.matches(&normalized)) {
            return Match::Rule(rule);
        }

        if normalized.contains("hello") || normalized.contains("hi") {
            Match::Greeting
        } else if normalized.contains("thank") {
            Match::Acknowledgment
        } else {
            Match::Fallback
        }
    }

    /// Select the reply for `utterance`. Total over all strings.
    pub fn resolve(&self, utterance: &str) -> String {
        match self.matched_rule(utterance) {
            Match::Rule(rule) => {
                tracing::debug!(keyword = %rule.keyword, "Resolved utterance by rule");
                rule.reply.clone()
            }
            Match::Greeting => {
                tracing::debug!("Resolved utterance as greeting");
                self.replies.greeting.clone()
            }
            Match::Acknowledgment => {
                tracing::debug!("Resolved utterance as acknowledgment");
                self.replies.acknowledgment.clone()
            }
            Match::Fallback => {
                tracing::debug!("No rule matched, using fallback");
                self.replies.fallback.replace(UTTERANCE_PLACEHOLDER, utterance)
            }
        }
    }
}

impl Default for ResponseResolver {
    fn default() -> Self {
        Self::new(RuleTable::canonical(), Replies::default())
    }
}

impl Responder for ResponseResolver {
    fn respond(&self, utterance: &str) -> String {
        self.resolve(utterance)
    }
}
