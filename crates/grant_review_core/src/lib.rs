//! Core domain logic for grant review: per-grant roles, authorization,
//! reviewer removal, review assignment and panel scheduling.
//! This crate is the single source of truth for business invariants.

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod invariant;
pub mod logging;
pub mod model;
pub mod policy;
pub mod repo;
pub mod service;

pub use config::{ConfigError, CoreConfig, LoggingConfig};
pub use db::{open_db, open_db_in_memory, open_db_with_timeout, DbError};
pub use error::{AssignmentKind, CoreError, CoreResult};
pub use events::{
    AuditEntry, AuditRecorder, CollaboratorError, Hooks, LogAuditRecorder, LogNotifier,
    NotificationEvent, Notifier,
};
pub use invariant::{is_last_admin, AdminSnapshot};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::entity::EntityRef;
pub use model::grant::{
    Criterion, Grant, GrantCreation, GrantReviewer, GrantUser, NewGrant, NewUser, Organization, ScoreScale,
    Submission, User,
};
pub use model::panel::{Panel, PanelUpdate};
pub use model::review::{
    CriteriaReview, CriterionScore, Review, ReviewOpening, ReviewScores, ReviewerRemoval,
};
pub use model::role::{GrantRole, OrganizationRole};
pub use model::validation::ValidationError;
pub use policy::{Action, Decision, GrantRoleLookup, PolicyEngine, Resource};
pub use repo::grant_repo::{GrantRepository, SqliteGrantRepository};
pub use repo::panel_repo::{PanelChange, PanelStore, SqlitePanelRepository};
pub use repo::review_repo::{ReviewStore, SqliteReviewRepository};
pub use repo::role_repo::{RoleStore, SqliteRoleRepository};
pub use service::grant_service::GrantService;
pub use service::panel_service::PanelService;
pub use service::review_service::ReviewService;
pub use service::reviewer_service::ReviewerService;
pub use service::role_service::RoleService;

/// Minimal health-check API for embedders.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
