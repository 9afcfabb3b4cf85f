//! Post-commit collaborators: notification dispatch and audit recording.
//!
//! # Responsibility
//! - Define the contracts the core expects from the notification dispatcher
//!   and the audit recorder.
//! - Deliver to both only after a transaction committed.
//!
//! # Invariants
//! - Collaborator failures are logged and never change an operation result.
//! - Audit entries always carry the acting user explicitly.

use crate::model::entity::EntityRef;
use crate::model::grant::{GrantId, GrantReviewerId, UserId};
use crate::model::review::ReviewId;
use log::{info, warn};
use serde::Serialize;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Failure reported by an external collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollaboratorError(pub String);

impl Display for CollaboratorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Error for CollaboratorError {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NotificationEvent {
    ReviewAssigned {
        review_uuid: ReviewId,
        reviewer_uuid: UserId,
    },
    ReviewUnassigned {
        review_uuid: ReviewId,
        reviewer_uuid: UserId,
    },
    ReviewerRemoved {
        grant_reviewer_uuid: GrantReviewerId,
        grant_uuid: GrantId,
        reviewer_uuid: UserId,
        removed_reviews: usize,
    },
}

impl NotificationEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReviewAssigned { .. } => "review_assigned",
            Self::ReviewUnassigned { .. } => "review_unassigned",
            Self::ReviewerRemoved { .. } => "reviewer_removed",
        }
    }
}

/// Fire-and-forget notification sink.
pub trait Notifier: Send + Sync {
    fn dispatch(&self, event: &NotificationEvent) -> Result<(), CollaboratorError>;
}

/// One successful mutation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub actor_uuid: UserId,
    pub entity: EntityRef,
    pub recorded_at_ms: i64,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl AuditEntry {
    /// Builds an entry stamped with the current time.
    pub fn now<B: Serialize, A: Serialize>(
        actor_uuid: UserId,
        entity: EntityRef,
        before: Option<&B>,
        after: Option<&A>,
    ) -> Self {
        Self {
            actor_uuid,
            entity,
            recorded_at_ms: now_epoch_ms(),
            before: before.and_then(summarize),
            after: after.and_then(summarize),
        }
    }
}

fn summarize<T: Serialize>(value: &T) -> Option<Value> {
    serde_json::to_value(value).ok()
}

pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

/// Audit trail sink.
pub trait AuditRecorder: Send + Sync {
    fn record(&self, entry: &AuditEntry) -> Result<(), CollaboratorError>;
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn dispatch(&self, event: &NotificationEvent) -> Result<(), CollaboratorError> {
        info!(
            "event=notification_dispatch module=events status=ok kind={}",
            event.name()
        );
        Ok(())
    }
}

/// Writes audit entries to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAuditRecorder;

impl AuditRecorder for LogAuditRecorder {
    fn record(&self, entry: &AuditEntry) -> Result<(), CollaboratorError> {
        info!(
            "event=audit_record module=events status=ok actor_uuid={} entity={} recorded_at_ms={}",
            entry.actor_uuid, entry.entity, entry.recorded_at_ms
        );
        Ok(())
    }
}

/// Collaborators shared by the services.
#[derive(Clone)]
pub struct Hooks {
    notifier: Arc<dyn Notifier>,
    audit: Arc<dyn AuditRecorder>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self::new(Arc::new(LogNotifier), Arc::new(LogAuditRecorder))
    }
}

impl Hooks {
    pub fn new(notifier: Arc<dyn Notifier>, audit: Arc<dyn AuditRecorder>) -> Self {
        Self { notifier, audit }
    }

    /// Best-effort delivery; call only after commit.
    pub fn notify(&self, event: NotificationEvent) {
        if let Err(err) = self.notifier.dispatch(&event) {
            warn!(
                "event=notification_dispatch module=events status=error kind={} error={}",
                event.name(),
                err
            );
        }
    }

    /// Best-effort audit; call only after commit.
    pub fn audit(&self, entry: AuditEntry) {
        if let Err(err) = self.audit.record(&entry) {
            warn!(
                "event=audit_record module=events status=error actor_uuid={} entity={} error={}",
                entry.actor_uuid, entry.entity, err
            );
        }
    }
}
