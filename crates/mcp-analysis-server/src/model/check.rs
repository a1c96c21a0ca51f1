use serde::{Deserialize, Serialize};

use super::analysis_response::{Issue, IssueReference};

/// One entry of the check table: how to ask the classifier about a category
/// of concern, and what issue to report when it answers yes.
///
/// Definitions are blueprints. They are never mutated while scanning; every
/// finding gets its own [`Issue`] built by [`CheckDefinition::issue`].
#[derive(Clone, Deserialize, Debug, Serialize, PartialEq, Eq)]
pub struct CheckDefinition {
    pub code: String,
    pub message: String,
    /// Noun phrase naming the category, used in the system instruction.
    pub category: String,
    /// Text placed before the tool description in the user message.
    pub question: String,
}

impl CheckDefinition {
    pub fn new(code: &str, message: &str, category: &str, question: &str) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            category: category.to_string(),
            question: question.to_string(),
        }
    }

    pub fn prompt_for(&self, description: &str) -> ClassificationPrompt {
        ClassificationPrompt {
            system: format!(
                "You are a security classifier checking for {} in tool descriptions.",
                self.category
            ),
            user: format!("{}\n\n{}", self.question, description),
        }
    }

    pub fn issue(&self, reference: IssueReference) -> Issue {
        Issue {
            code: self.code.clone(),
            message: self.message.clone(),
            reference: Some(reference),
        }
    }
}

/// A system/user message pair sent to the classifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassificationPrompt {
    pub system: String,
    pub user: String,
}

/// Result of a single classification check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The classifier answered yes.
    Found,
    /// The classifier answered anything other than yes.
    NotFound,
    /// The classifier could not be reached or its reply could not be read.
    Unavailable,
}

impl CheckOutcome {
    /// Maps a free-text reply to an outcome: any occurrence of "yes",
    /// regardless of case, is a positive answer.
    pub fn from_reply(reply: &str) -> Self {
        if reply.to_lowercase().contains("yes") {
            Self::Found
        } else {
            Self::NotFound
        }
    }
}

/// The outcome of running one check against one tool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CheckEvaluation {
    pub reference: IssueReference,
    /// Position of the check in the analyzer's table.
    pub check_index: usize,
    pub outcome: CheckOutcome,
}
