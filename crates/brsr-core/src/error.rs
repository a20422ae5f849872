use thiserror::Error;

use crate::catalog::ValueKind;

#[derive(Debug, Error)]
pub enum BrsrError {
    #[error("unknown question: {0}")]
    UnknownQuestion(String),

    #[error("malformed value for composite question {question_id}: {reason}")]
    MalformedCompositeValue { question_id: String, reason: String },

    #[error("unknown subcomponent {subcomponent} for composite question {question_id}")]
    UnknownSubcomponent {
        question_id: String,
        subcomponent: String,
    },

    #[error("invalid value for {question_id}: expected {expected}, got {found}")]
    TypeMismatch {
        question_id: String,
        expected: ValueKind,
        found: String,
    },

    #[error("no access to question {question_id}")]
    Forbidden { question_id: String },

    #[error("roles [{0}] have no access to any question in this report")]
    NoAccessibleQuestions(String),

    #[error("not found: {0}")]
    ScopeNotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("audit log not found for {0}")]
    AuditLogNotFound(String),

    #[error("report {scope} changed during update (expected revision {expected}, found {found})")]
    RevisionConflict {
        scope: String,
        expected: u64,
        found: u64,
    },

    #[error("report data for {scope} committed but progress counters were not updated: {reason}")]
    CounterUpdateFailed { scope: String, reason: String },

    #[error("report data for {scope} committed but the audit trail was not updated: {reason}")]
    AuditAppendFailed { scope: String, reason: String },

    #[error("invalid scope: {0}")]
    InvalidScope(String),

    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BrsrError {
    /// Stable snake_case name of the error kind, used in API responses.
    pub fn kind(&self) -> &'static str {
        match self {
            BrsrError::UnknownQuestion(_) => "unknown_question",
            BrsrError::MalformedCompositeValue { .. } => "malformed_composite_value",
            BrsrError::UnknownSubcomponent { .. } => "unknown_subcomponent",
            BrsrError::TypeMismatch { .. } => "type_mismatch",
            BrsrError::Forbidden { .. } => "forbidden",
            BrsrError::NoAccessibleQuestions(_) => "no_accessible_questions",
            BrsrError::ScopeNotFound(_) => "scope_not_found",
            BrsrError::AlreadyExists(_) => "already_exists",
            BrsrError::AuditLogNotFound(_) => "not_found",
            BrsrError::RevisionConflict { .. } => "revision_conflict",
            BrsrError::CounterUpdateFailed { .. } => "counter_update_failed",
            BrsrError::AuditAppendFailed { .. } => "audit_append_failed",
            BrsrError::InvalidScope(_) => "invalid_scope",
            BrsrError::InvalidCatalog(_) => "invalid_catalog",
            BrsrError::Store(_) => "store",
            BrsrError::Io(_) => "io",
            BrsrError::Yaml(_) => "yaml",
            BrsrError::Json(_) => "json",
        }
    }

    /// The question that triggered a validation-phase failure, if any.
    pub fn question_id(&self) -> Option<&str> {
        match self {
            BrsrError::UnknownQuestion(id) => Some(id),
            BrsrError::MalformedCompositeValue { question_id, .. }
            | BrsrError::TypeMismatch { question_id, .. }
            | BrsrError::Forbidden { question_id } => Some(question_id),
            BrsrError::UnknownSubcomponent { subcomponent, .. } => Some(subcomponent),
            _ => None,
        }
    }

    /// True for failures that abort a batch before anything is written.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BrsrError::UnknownQuestion(_)
                | BrsrError::MalformedCompositeValue { .. }
                | BrsrError::UnknownSubcomponent { .. }
                | BrsrError::TypeMismatch { .. }
                | BrsrError::Forbidden { .. }
        )
    }

    pub(crate) fn store(err: impl std::fmt::Display) -> Self {
        BrsrError::Store(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BrsrError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_name_the_question() {
        let err = BrsrError::Forbidden {
            question_id: "Q1_A".into(),
        };
        assert_eq!(err.question_id(), Some("Q1_A"));
        assert!(err.is_validation());
        assert_eq!(err.kind(), "forbidden");
    }

    #[test]
    fn unknown_subcomponent_reports_the_constructed_id() {
        let err = BrsrError::UnknownSubcomponent {
            question_id: "Q18a".into(),
            subcomponent: "Q18a_interns_male".into(),
        };
        assert_eq!(err.question_id(), Some("Q18a_interns_male"));
        assert!(err.to_string().contains("Q18a_interns_male"));
    }

    #[test]
    fn counter_failure_is_not_a_validation_error() {
        let err = BrsrError::CounterUpdateFailed {
            scope: "acme/p1/2024_2025".into(),
            reason: "disk full".into(),
        };
        assert!(!err.is_validation());
        assert_eq!(err.question_id(), None);
    }
}
