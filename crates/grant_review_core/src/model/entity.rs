//! Typed references to persisted records, used by errors, audit entries and
//! notifications.

use crate::model::grant::{
    CriterionId, GrantId, GrantReviewerId, GrantUserId, OrganizationId, SubmissionId, UserId,
};
use crate::model::review::ReviewId;
use serde::Serialize;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "uuid", rename_all = "snake_case")]
pub enum EntityRef {
    Organization(OrganizationId),
    User(UserId),
    Grant(GrantId),
    GrantUser(GrantUserId),
    GrantReviewer(GrantReviewerId),
    Submission(SubmissionId),
    Criterion(CriterionId),
    Review(ReviewId),
    /// Panels are keyed by their grant.
    Panel(GrantId),
}

impl EntityRef {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Organization(_) => "organization",
            Self::User(_) => "user",
            Self::Grant(_) => "grant",
            Self::GrantUser(_) => "grant_user",
            Self::GrantReviewer(_) => "grant_reviewer",
            Self::Submission(_) => "submission",
            Self::Criterion(_) => "criterion",
            Self::Review(_) => "review",
            Self::Panel(_) => "panel",
        }
    }

    pub fn uuid(&self) -> uuid::Uuid {
        match self {
            Self::Organization(id)
            | Self::User(id)
            | Self::Grant(id)
            | Self::GrantUser(id)
            | Self::GrantReviewer(id)
            | Self::Submission(id)
            | Self::Criterion(id)
            | Self::Review(id)
            | Self::Panel(id) => *id,
        }
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind(), self.uuid())
    }
}
