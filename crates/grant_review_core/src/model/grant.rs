//! Organization, user and grant aggregate records.
//!
//! # Invariants
//! - A user belongs to exactly one organization; identity never changes.
//! - `GrantUser` is unique per (grant, user); `GrantReviewer` is unique per
//!   (grant, reviewer).
//! - Once `Grant::has_had_admin` is set it is never cleared.

use crate::model::role::{GrantRole, OrganizationRole};
use crate::model::validation::ValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type OrganizationId = Uuid;
pub type UserId = Uuid;
pub type GrantId = Uuid;
pub type GrantUserId = Uuid;
pub type GrantReviewerId = Uuid;
pub type SubmissionId = Uuid;
pub type CriterionId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub uuid: OrganizationId,
    pub name: String,
}

/// Authenticated actor or role/review subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uuid: UserId,
    pub organization_uuid: OrganizationId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub organization_role: OrganizationRole,
}

impl User {
    /// Display name, trimmed when one of the parts is blank.
    pub fn name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Input for creating a user. The organization role falls back to `basic`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub organization_uuid: OrganizationId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub organization_role: Option<OrganizationRole>,
}

/// Inclusive bounds for numeric review scores on one grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreScale {
    pub minimum: i64,
    pub maximum: i64,
}

impl Default for ScoreScale {
    fn default() -> Self {
        Self {
            minimum: 1,
            maximum: 9,
        }
    }
}

impl ScoreScale {
    /// Checks the configured bounds themselves, independent of any answer.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.minimum >= self.maximum {
            return Err(ValidationError::InvalidScoreScale {
                minimum: self.minimum,
                maximum: self.maximum,
            });
        }
        Ok(())
    }

    pub fn contains(&self, score: i64) -> bool {
        (self.minimum..=self.maximum).contains(&score)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grant {
    pub uuid: GrantId,
    pub organization_uuid: OrganizationId,
    pub name: String,
    /// Epoch ms after which submissions are no longer accepted.
    pub submission_close_date: i64,
    pub score_scale: ScoreScale,
    /// Set the first time any admin GrantUser exists; never cleared.
    pub has_had_admin: bool,
}

/// Input for creating a grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewGrant {
    pub organization_uuid: OrganizationId,
    pub name: String,
    pub submission_close_date: i64,
    pub score_scale: ScoreScale,
}

/// A freshly created grant and the admin assignment written with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrantCreation {
    pub grant: Grant,
    pub initial_admin: Option<GrantUser>,
}

/// (grant, user, role) assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantUser {
    pub uuid: GrantUserId,
    pub grant_uuid: GrantId,
    pub user_uuid: UserId,
    pub grant_role: GrantRole,
}

impl GrantUser {
    pub fn is_admin(&self) -> bool {
        self.grant_role == GrantRole::Admin
    }
}

/// (grant, reviewer) eligibility record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantReviewer {
    pub uuid: GrantReviewerId,
    pub grant_uuid: GrantId,
    pub reviewer_uuid: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    pub uuid: SubmissionId,
    pub grant_uuid: GrantId,
    pub applicant_uuid: UserId,
    pub title: String,
}

/// Scoring criterion defined on a grant. Retired criteria stay referenced by
/// existing criteria reviews.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    pub uuid: CriterionId,
    pub grant_uuid: GrantId,
    pub name: String,
    pub sort_order: i64,
    pub is_retired: bool,
}

#[cfg(test)]
mod tests {
    use super::ScoreScale;
    use crate::model::validation::ValidationError;

    #[test]
    fn default_scale_is_one_to_nine() {
        let scale = ScoreScale::default();
        assert!(scale.validate().is_ok());
        assert!(scale.contains(1));
        assert!(scale.contains(9));
        assert!(!scale.contains(0));
        assert!(!scale.contains(10));
    }

    #[test]
    fn scale_requires_minimum_below_maximum() {
        let err = ScoreScale {
            minimum: 5,
            maximum: 5,
        }
        .validate()
        .unwrap_err();
        assert_eq!(
            err,
            ValidationError::InvalidScoreScale {
                minimum: 5,
                maximum: 5
            }
        );
    }
}
