//! Tagged failure type shared by every core operation.
//!
//! # Invariants
//! - Validation, invariant and authorization failures are returned before
//!   any write is attempted, so the entity graph is unchanged.
//! - `TransactionAborted` means the whole atomic unit was rolled back.
//! - No variant is downgraded into another on the way to the caller.

use crate::db::DbError;
use crate::model::entity::EntityRef;
use crate::model::grant::{GrantId, GrantUserId, UserId};
use crate::model::validation::ValidationError;
use crate::policy::{Action, Resource};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CoreResult<T> = Result<T, CoreError>;

/// Relation that already exists when a duplicate is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentKind {
    /// `GrantUser` for (grant, user).
    GrantRole,
    /// `GrantReviewer` for (grant, reviewer).
    GrantReviewer,
    /// `Review` for (submission, reviewer).
    Review,
}

impl AssignmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::GrantRole => "grant_role",
            Self::GrantReviewer => "grant_reviewer",
            Self::Review => "review",
        }
    }
}

#[derive(Debug)]
pub enum CoreError {
    /// Field-level constraint failure.
    Validation(ValidationError),
    /// Mutation would leave a grant without an admin. `grant_user_uuid`
    /// names the assignment whose change was refused, when there is one.
    InvariantViolation {
        grant_uuid: GrantId,
        grant_user_uuid: Option<GrantUserId>,
    },
    /// Policy denied the action.
    NotAuthorized {
        actor_uuid: UserId,
        action: Action,
        resource: Resource,
    },
    /// Referenced record does not exist.
    NotFound(EntityRef),
    /// Relation already exists; `scope` is the grant or submission.
    DuplicateAssignment {
        assignment: AssignmentKind,
        scope: EntityRef,
        user_uuid: UserId,
    },
    /// Review requested for a user with no `GrantReviewer` on the grant.
    NotAssignedAsReviewer {
        grant_uuid: GrantId,
        reviewer_uuid: UserId,
    },
    /// Storage failed inside a mutating transaction; nothing was committed.
    TransactionAborted {
        operation: &'static str,
        source: DbError,
    },
    /// Storage failed on a read path.
    Storage(DbError),
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
}

impl CoreError {
    /// Only aborted transactions may succeed when retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionAborted { .. })
    }

    /// Whether an aborted transaction lost the race for the write lock, as
    /// opposed to failing on a statement.
    pub fn is_lock_contention(&self) -> bool {
        match self {
            Self::TransactionAborted { source, .. } => source.is_busy(),
            _ => false,
        }
    }

    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::InvariantViolation { .. } => "invariant_violation",
            Self::NotAuthorized { .. } => "not_authorized",
            Self::NotFound(_) => "not_found",
            Self::DuplicateAssignment { .. } => "duplicate_assignment",
            Self::NotAssignedAsReviewer { .. } => "not_assigned_as_reviewer",
            Self::TransactionAborted { .. } => "transaction_aborted",
            Self::Storage(_) => "storage_error",
            Self::InvalidData(_) => "invalid_data",
            Self::UninitializedConnection { .. } => "uninitialized_connection",
        }
    }

    /// Reclassifies a storage failure raised inside a mutating transaction.
    /// Semantic failures pass through unchanged.
    pub fn aborted(self, operation: &'static str) -> Self {
        match self {
            Self::Storage(source) => Self::TransactionAborted { operation, source },
            other => other,
        }
    }
}

impl Display for CoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "validation failed: {err}"),
            Self::InvariantViolation { grant_uuid, .. } => write!(
                f,
                "there must be at least one admin on grant {grant_uuid}"
            ),
            Self::NotAuthorized {
                actor_uuid,
                action,
                resource,
            } => write!(
                f,
                "user {actor_uuid} is not authorized to {} {}",
                action.as_str(),
                resource.kind()
            ),
            Self::NotFound(entity) => write!(f, "not found: {entity}"),
            Self::DuplicateAssignment {
                assignment,
                scope,
                user_uuid,
            } => write!(
                f,
                "{} already exists for user {user_uuid} on {scope}",
                assignment.as_str()
            ),
            Self::NotAssignedAsReviewer {
                grant_uuid,
                reviewer_uuid,
            } => write!(
                f,
                "user {reviewer_uuid} is not assigned as a reviewer on grant {grant_uuid}"
            ),
            Self::TransactionAborted { operation, source } => {
                write!(f, "transaction `{operation}` aborted: {source}")
            }
            Self::Storage(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "grant review store requires schema version {expected_version}, got {actual_version}"
            ),
        }
    }
}

impl Error for CoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::TransactionAborted { source, .. } => Some(source),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for CoreError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for CoreError {
    fn from(value: DbError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(DbError::Sqlite(value))
    }
}
