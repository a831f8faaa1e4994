//! Error types for the Incentive Engine.
//!
//! This module provides strongly-typed errors using the `thiserror` crate
//! for all error conditions that can occur while computing incentives and
//! driving them through the approval workflow.

use thiserror::Error;
use uuid::Uuid;

/// Broad classification of an [`EngineError`].
///
/// Callers use the kind to decide how to react: validation and precondition
/// failures are final, conflicts can be retried after a reload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected before any mutation.
    Validation,
    /// The operation is not legal in the current state.
    Precondition,
    /// Optimistic-lock mismatch at the persistence boundary.
    Conflict,
    /// An unknown identifier was referenced.
    NotFound,
    /// Configuration could not be loaded.
    Configuration,
}

/// The main error type for the Incentive Engine.
///
/// # Example
///
/// ```
/// use incentive_engine::error::EngineError;
///
/// let error = EngineError::ConfigNotFound {
///     path: "/missing/engine.yaml".to_string(),
/// };
/// assert_eq!(error.to_string(), "Configuration file not found: /missing/engine.yaml");
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration file was not found at the specified path.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound {
        /// The path that was not found.
        path: String,
    },

    /// Configuration file could not be parsed.
    #[error("Failed to parse configuration file '{path}': {message}")]
    ConfigParseError {
        /// The path to the file that failed to parse.
        path: String,
        /// A description of the parse error.
        message: String,
    },

    /// An input value failed validation.
    #[error("Invalid value for '{field}': {message}")]
    Validation {
        /// The field that was invalid.
        field: String,
        /// A description of what made the value invalid.
        message: String,
    },

    /// Two money amounts with different currencies were combined.
    #[error("Currency mismatch: expected {expected}, found {found}")]
    CurrencyMismatch {
        /// The currency of the left-hand operand.
        expected: String,
        /// The currency of the right-hand operand.
        found: String,
    },

    /// An operation was attempted in a state that does not allow it.
    #[error("Cannot {operation} {entity} {id} in status '{status}'")]
    InvalidTransition {
        /// The kind of record ("calculation" or "approval").
        entity: String,
        /// The record identifier.
        id: Uuid,
        /// The status the record was in.
        status: String,
        /// The attempted operation.
        operation: String,
    },

    /// An approver tried to delegate an approval to themselves.
    #[error("Approver '{approver_id}' cannot delegate an approval to themselves")]
    SelfDelegation {
        /// The approver that attempted the delegation.
        approver_id: String,
    },

    /// The acting approver is not the one assigned to the approval.
    #[error("Approval {approval_id} is assigned to '{assigned}', not '{actor}'")]
    ApproverMismatch {
        /// The approval that was acted upon.
        approval_id: Uuid,
        /// The approver the record is assigned to.
        assigned: String,
        /// The approver that attempted the action.
        actor: String,
    },

    /// A second pending approval was requested for the same level.
    #[error("Calculation {calculation_id} already has a pending approval at level {level}")]
    PendingApprovalExists {
        /// The calculation owning the approvals.
        calculation_id: Uuid,
        /// The level that already has a pending approval.
        level: u32,
    },

    /// An active calculation already exists for the employee, plan and period.
    #[error("Calculation already exists for employee '{employee_id}', plan '{plan_id}', period {period}")]
    DuplicateCalculation {
        /// The employee identifier.
        employee_id: String,
        /// The plan identifier.
        plan_id: String,
        /// The period label.
        period: String,
    },

    /// The persisted record changed since it was read.
    #[error("Concurrent modification of {entity} {id}: expected revision {expected_revision}")]
    ConcurrencyConflict {
        /// The kind of record.
        entity: String,
        /// The record identifier.
        id: Uuid,
        /// The revision the writer expected to replace.
        expected_revision: u64,
    },

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of record.
        entity: String,
        /// The identifier that was not found.
        id: String,
    },
}

impl EngineError {
    /// Shorthand for a [`EngineError::Validation`] error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a [`EngineError::NotFound`] error.
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Returns the broad classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigNotFound { .. } | Self::ConfigParseError { .. } => {
                ErrorKind::Configuration
            }
            Self::Validation { .. } | Self::CurrencyMismatch { .. } | Self::SelfDelegation { .. } => {
                ErrorKind::Validation
            }
            Self::InvalidTransition { .. }
            | Self::ApproverMismatch { .. }
            | Self::PendingApprovalExists { .. }
            | Self::DuplicateCalculation { .. } => ErrorKind::Precondition,
            Self::ConcurrencyConflict { .. } => ErrorKind::Conflict,
            Self::NotFound { .. } => ErrorKind::NotFound,
        }
    }

    /// Returns true if the operation may succeed after reloading the record.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }
}

/// A type alias for Results that return EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_not_found_displays_path() {
        let error = EngineError::ConfigNotFound {
            path: "/missing/engine.yaml".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Configuration file not found: /missing/engine.yaml"
        );
    }

    #[test]
    fn test_validation_displays_field_and_message() {
        let error = EngineError::validation("payout_rate", "must not be negative");
        assert_eq!(
            error.to_string(),
            "Invalid value for 'payout_rate': must not be negative"
        );
        assert_eq!(error.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_currency_mismatch_displays_both_currencies() {
        let error = EngineError::CurrencyMismatch {
            expected: "INR".to_string(),
            found: "USD".to_string(),
        };
        assert_eq!(error.to_string(), "Currency mismatch: expected INR, found USD");
    }

    #[test]
    fn test_invalid_transition_is_precondition() {
        let id = Uuid::nil();
        let error = EngineError::InvalidTransition {
            entity: "approval".to_string(),
            id,
            status: "approved".to_string(),
            operation: "approve".to_string(),
        };
        assert_eq!(
            error.to_string(),
            format!("Cannot approve approval {} in status 'approved'", id)
        );
        assert_eq!(error.kind(), ErrorKind::Precondition);
        assert!(!error.is_retryable());
    }

    #[test]
    fn test_self_delegation_displays_approver() {
        let error = EngineError::SelfDelegation {
            approver_id: "mgr_001".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Approver 'mgr_001' cannot delegate an approval to themselves"
        );
    }

    #[test]
    fn test_concurrency_conflict_is_retryable() {
        let error = EngineError::ConcurrencyConflict {
            entity: "calculation".to_string(),
            id: Uuid::nil(),
            expected_revision: 3,
        };
        assert_eq!(error.kind(), ErrorKind::Conflict);
        assert!(error.is_retryable());
    }

    #[test]
    fn test_not_found_displays_entity_and_id() {
        let error = EngineError::not_found("plan", "plan_unknown");
        assert_eq!(error.to_string(), "plan not found: plan_unknown");
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_errors_implement_std_error() {
        fn assert_error<T: std::error::Error>() {}
        assert_error::<EngineError>();
    }

    #[test]
    fn test_error_propagation_with_question_mark() {
        fn returns_not_found() -> EngineResult<()> {
            Err(EngineError::not_found("employee", "emp_404"))
        }

        fn propagates_error() -> EngineResult<()> {
            returns_not_found()?;
            Ok(())
        }

        assert!(propagates_error().is_err());
    }
}
