//! Review panel schedule attached 1:1 to a grant.
//!
//! # Invariants
//! - `start_datetime < end_datetime` when both are set.
//! - `start_datetime < grant.submission_close_date` when set.
//! - `meeting_link`, when set, is an absolute `https` URL.

use crate::model::grant::{GrantId, UserId};
use crate::model::validation::ValidationError;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Panel {
    pub grant_uuid: GrantId,
    /// Epoch ms.
    pub start_datetime: Option<i64>,
    /// Epoch ms.
    pub end_datetime: Option<i64>,
    pub meeting_location: Option<String>,
    pub meeting_link: Option<String>,
    pub instructions: Option<String>,
    /// Actor of the last successful update.
    pub updated_by: Option<UserId>,
    pub updated_at: i64,
}

/// Partial panel edit. `None` keeps the stored value. `Some(None)` clears a
/// date/time; an empty string clears a text field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PanelUpdate {
    pub start_datetime: Option<Option<i64>>,
    pub end_datetime: Option<Option<i64>>,
    pub meeting_location: Option<String>,
    pub meeting_link: Option<String>,
    pub instructions: Option<String>,
}

impl Panel {
    /// Returns the panel as it would look after `update`, without validating.
    pub fn apply(&self, update: &PanelUpdate) -> Panel {
        Panel {
            grant_uuid: self.grant_uuid,
            start_datetime: update.start_datetime.unwrap_or(self.start_datetime),
            end_datetime: update.end_datetime.unwrap_or(self.end_datetime),
            meeting_location: merge_text(&self.meeting_location, &update.meeting_location),
            meeting_link: merge_text(&self.meeting_link, &update.meeting_link),
            instructions: merge_text(&self.instructions, &update.instructions),
            updated_by: self.updated_by,
            updated_at: self.updated_at,
        }
    }

    /// Validates schedule ordering and the meeting link scheme.
    pub fn validate(&self, submission_close_date: i64) -> Result<(), ValidationError> {
        if let (Some(start), Some(end)) = (self.start_datetime, self.end_datetime) {
            if start >= end {
                return Err(ValidationError::PanelStartNotBeforeEnd { start, end });
            }
        }
        if let Some(start) = self.start_datetime {
            if start >= submission_close_date {
                return Err(ValidationError::PanelStartNotBeforeSubmissionDeadline {
                    start,
                    submission_close_date,
                });
            }
        }
        if let Some(link) = self.meeting_link.as_deref() {
            if !is_secure_url(link) {
                return Err(ValidationError::InsecureMeetingLink);
            }
        }
        Ok(())
    }
}

fn merge_text(current: &Option<String>, update: &Option<String>) -> Option<String> {
    match update {
        None => current.clone(),
        Some(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        }
    }
}

fn is_secure_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => url.scheme() == "https" && url.host_str().is_some(),
        Err(_) => false,
    }
}
