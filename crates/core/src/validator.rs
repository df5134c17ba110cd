//! Validation of generated code against forbidden structural patterns.

use serde::{Deserialize, Serialize};

/// Result of checking one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationOutcome {
    Accept,
    /// The first forbidden pattern found, in declared order.
    Reject { pattern: String },
}

/// A pure predicate over candidate code.
pub trait Validator: Send + Sync {
    fn validate(&self, code: &str) -> ValidationOutcome;
}

/// Rejects any candidate containing one of a fixed list of substrings.
#[derive(Debug, Clone, Default)]
pub struct PatternValidator {
    patterns: Vec<String>,
}

impl PatternValidator {
    /// Build a validator. Empty patterns would match everything and are dropped.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Validator for PatternValidator {
    fn validate(&self, code: &str) -> ValidationOutcome {
        self.patterns
            .iter()
            .find(|p| code.contains(p.as_str()))
            .map_or(ValidationOutcome::Accept, |p| ValidationOutcome::Reject {
                pattern: p.clone(),
            })
    }
}
