//! Field-level constraint failures.

use crate::model::grant::CriterionId;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// One violated field constraint. Returned before anything is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Required text field is blank after trim.
    BlankField(&'static str),
    /// Panel start is not strictly before panel end.
    PanelStartNotBeforeEnd { start: i64, end: i64 },
    /// Panel start is not strictly before the grant submission close date.
    PanelStartNotBeforeSubmissionDeadline {
        start: i64,
        submission_close_date: i64,
    },
    /// Meeting link is unparsable or does not use `https`.
    InsecureMeetingLink,
    /// Another user already holds the email address.
    EmailTaken,
    /// Configured numeric bounds are inverted or empty.
    InvalidScoreScale { minimum: i64, maximum: i64 },
    /// Submitted score lies outside the grant score scale.
    /// `criterion_uuid = None` means the overall impact score.
    ScoreOutOfRange {
        criterion_uuid: Option<CriterionId>,
        score: i64,
        minimum: i64,
        maximum: i64,
    },
}

impl ValidationError {
    /// Name of the field that failed.
    pub fn field(&self) -> &'static str {
        match self {
            Self::BlankField(field) => field,
            Self::PanelStartNotBeforeEnd { .. } => "start_datetime",
            Self::PanelStartNotBeforeSubmissionDeadline { .. } => "start_datetime",
            Self::InsecureMeetingLink => "meeting_link",
            Self::EmailTaken => "email",
            Self::InvalidScoreScale { .. } => "score_scale",
            Self::ScoreOutOfRange {
                criterion_uuid: None,
                ..
            } => "overall_impact_score",
            Self::ScoreOutOfRange { .. } => "criteria_reviews.score",
        }
    }

    /// Stable code of the failed constraint.
    pub fn constraint(&self) -> &'static str {
        match self {
            Self::BlankField(_) => "blank",
            Self::PanelStartNotBeforeEnd { .. } => "before_end_datetime",
            Self::PanelStartNotBeforeSubmissionDeadline { .. } => "before_submission_deadline",
            Self::InsecureMeetingLink => "secure_url",
            Self::EmailTaken => "unique_email",
            Self::InvalidScoreScale { .. } => "minimum_below_maximum",
            Self::ScoreOutOfRange { .. } => "within_score_scale",
        }
    }
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField(field) => write!(f, "{field} must not be blank"),
            Self::PanelStartNotBeforeEnd { start, end } => write!(
                f,
                "panel start {start} must be before end date/time {end}"
            ),
            Self::PanelStartNotBeforeSubmissionDeadline {
                start,
                submission_close_date,
            } => write!(
                f,
                "panel start {start} must be before the submission deadline {submission_close_date}"
            ),
            Self::InsecureMeetingLink => write!(f, "meeting link is not a valid secure URL"),
            Self::EmailTaken => write!(f, "email is already in use"),
            Self::InvalidScoreScale { minimum, maximum } => write!(
                f,
                "score scale minimum {minimum} must be less than maximum {maximum}"
            ),
            Self::ScoreOutOfRange {
                criterion_uuid,
                score,
                minimum,
                maximum,
            } => match criterion_uuid {
                Some(id) => write!(
                    f,
                    "score {score} for criterion {id} is outside {minimum}..={maximum}"
                ),
                None => write!(
                    f,
                    "overall impact score {score} is outside {minimum}..={maximum}"
                ),
            },
        }
    }
}

impl Error for ValidationError {}

/// Trims a required text field, rejecting blank input.
pub fn require_text(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::BlankField(field));
    }
    Ok(trimmed.to_string())
}
