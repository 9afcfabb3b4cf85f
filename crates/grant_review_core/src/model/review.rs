//! Review and per-criterion score records.
//!
//! # Invariants
//! - At most one review per (submission, reviewer).
//! - At most one criteria review per (review, criterion); missing ones are
//!   filled in when a review is opened for editing.

use crate::model::grant::{
    CriterionId, GrantId, GrantReviewer, ScoreScale, SubmissionId, UserId,
};
use crate::model::validation::ValidationError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ReviewId = Uuid;
pub type CriteriaReviewId = Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriteriaReview {
    pub uuid: CriteriaReviewId,
    pub review_uuid: ReviewId,
    pub criterion_uuid: CriterionId,
    pub score: Option<i64>,
    pub comment: Option<String>,
}

/// One reviewer's evaluation of one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub uuid: ReviewId,
    pub submission_uuid: SubmissionId,
    /// Grant owning the submission; resolved on load, not stored on the row.
    pub grant_uuid: GrantId,
    pub reviewer_uuid: UserId,
    pub assigner_uuid: UserId,
    pub overall_impact_score: Option<i64>,
    pub overall_impact_comment: Option<String>,
    /// Ordered by criterion sort order.
    pub criteria_reviews: Vec<CriteriaReview>,
}

impl Review {
    pub fn criteria_review_for(&self, criterion_uuid: CriterionId) -> Option<&CriteriaReview> {
        self.criteria_reviews
            .iter()
            .find(|item| item.criterion_uuid == criterion_uuid)
    }
}

/// Score and comment submitted for one criterion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CriterionScore {
    pub criterion_uuid: CriterionId,
    pub score: Option<i64>,
    pub comment: Option<String>,
}

/// Edit payload for `update_review`. Replaces the listed values.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReviewScores {
    pub overall_impact_score: Option<i64>,
    pub overall_impact_comment: Option<String>,
    pub criteria: Vec<CriterionScore>,
}

impl ReviewScores {
    /// Checks the scale configuration first, then every submitted score.
    pub fn validate(&self, scale: &ScoreScale) -> Result<(), ValidationError> {
        scale.validate()?;

        if let Some(score) = self.overall_impact_score {
            check_score(scale, None, score)?;
        }
        for item in &self.criteria {
            if let Some(score) = item.score {
                check_score(scale, Some(item.criterion_uuid), score)?;
            }
        }
        Ok(())
    }
}

fn check_score(
    scale: &ScoreScale,
    criterion_uuid: Option<CriterionId>,
    score: i64,
) -> Result<(), ValidationError> {
    if scale.contains(score) {
        return Ok(());
    }
    Err(ValidationError::ScoreOutOfRange {
        criterion_uuid,
        score,
        minimum: scale.minimum,
        maximum: scale.maximum,
    })
}

/// Review state around an open-for-editing call. `created_lines` counts the
/// blank criteria reviews added; zero means nothing was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewOpening {
    pub before: Review,
    pub after: Review,
    pub created_lines: usize,
}

/// Outcome of removing a reviewer together with their reviews on one grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewerRemoval {
    pub grant_reviewer: GrantReviewer,
    pub removed_review_uuids: Vec<ReviewId>,
}
