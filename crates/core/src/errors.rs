use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::domain::review::ReviewStatus;

/// One offending field, optionally scoped to a line index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub field: String,
    pub line_index: Option<usize>,
    pub message: String,
}

impl ValidationIssue {
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), line_index: None, message: message.into() }
    }

    pub fn line(field: impl Into<String>, index: usize, message: impl Into<String>) -> Self {
        Self { field: field.into(), line_index: Some(index), message: message.into() }
    }
}

/// Caller-supplied data failed shape checks. Carries every offending field
/// so the caller can surface them all at once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    /// Distinct line indices named by the issues, ascending.
    pub fn line_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> =
            self.issues.iter().filter_map(|issue| issue.line_index).collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "validation failed: ")?;
        for (position, issue) in self.issues.iter().enumerate() {
            if position > 0 {
                write!(f, "; ")?;
            }
            match issue.line_index {
                Some(index) => write!(f, "{} (line {}): {}", issue.field, index, issue.message)?,
                None => write!(f, "{}: {}", issue.field, issue.message)?,
            }
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Failure taxonomy shared by the review queue, the price resolver, and the
/// quote assembler.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("invalid review transition: item is {from:?}, attempted {attempted:?}")]
    InvalidStateTransition { from: ReviewStatus, attempted: ReviewStatus },
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl CoreError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    /// Whether a caller may retry the operation verbatim. Write paths must
    /// still re-check current state before retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Validation(_) => "The submitted data is invalid. Fix the listed fields and retry.",
            Self::InvalidStateTransition { .. } => {
                "This item was already handled by another reviewer."
            }
            Self::NotFound { .. } => "The requested record no longer exists.",
            Self::StoreUnavailable(_) => {
                "The service is temporarily unavailable. Please retry shortly."
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::review::ReviewStatus;

    use super::{CoreError, ValidationError, ValidationIssue};

    #[test]
    fn validation_error_lists_every_issue_in_order() {
        let error = ValidationError::new(vec![
            ValidationIssue::line("quantity", 1, "quantity must be positive"),
            ValidationIssue::line("rate_per_unit", 3, "rate per unit must be positive"),
            ValidationIssue::field("items", "quote must contain at least one line"),
        ]);

        let rendered = error.to_string();
        assert!(rendered.contains("quantity (line 1)"));
        assert!(rendered.contains("rate_per_unit (line 3)"));
        assert!(rendered.contains("items:"));
        assert_eq!(error.line_indices(), vec![1, 3]);
    }

    #[test]
    fn only_store_unavailable_is_retryable() {
        assert!(CoreError::StoreUnavailable("pool timed out".to_string()).is_retryable());
        assert!(!CoreError::not_found("material", "MAT-9").is_retryable());
        assert!(!CoreError::InvalidStateTransition {
            from: ReviewStatus::Approved,
            attempted: ReviewStatus::Rejected,
        }
        .is_retryable());
    }

    #[test]
    fn transition_conflicts_read_as_already_handled() {
        let error = CoreError::InvalidStateTransition {
            from: ReviewStatus::Rejected,
            attempted: ReviewStatus::Approved,
        };
        assert_eq!(error.user_message(), "This item was already handled by another reviewer.");
    }
}
