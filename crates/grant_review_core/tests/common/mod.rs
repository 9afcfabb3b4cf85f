#![allow(dead_code)]

use grant_review_core::db::open_db_in_memory;
use grant_review_core::{
    AuditEntry, AuditRecorder, CollaboratorError, Grant, GrantRepository, GrantRole, GrantUser,
    Hooks, NewGrant, NewUser, NotificationEvent, Notifier, Organization, OrganizationRole,
    RoleStore, ScoreScale, SqliteGrantRepository, SqliteRoleRepository, User,
};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// 2024-06-01T00:00:00Z
pub const JUNE_1_2024_MS: i64 = 1_717_200_000_000;
pub const DAY_MS: i64 = 24 * 60 * 60 * 1000;

pub fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

pub fn organization(conn: &Connection, name: &str) -> Organization {
    SqliteGrantRepository::try_new(conn)
        .unwrap()
        .create_organization(name)
        .unwrap()
}

pub fn user(conn: &Connection, organization: &Organization, role: OrganizationRole) -> User {
    SqliteGrantRepository::try_new(conn)
        .unwrap()
        .create_user(&NewUser {
            organization_uuid: organization.uuid,
            email: format!("{}@example.org", Uuid::new_v4()),
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            organization_role: Some(role),
        })
        .unwrap()
}

/// Grant closing on 2024-06-01, optionally created with a first admin.
pub fn grant(conn: &Connection, organization: &Organization, admin: Option<&User>) -> Grant {
    SqliteGrantRepository::try_new(conn)
        .unwrap()
        .create_grant(
            &NewGrant {
                organization_uuid: organization.uuid,
                name: "Pilot Grant".to_string(),
                submission_close_date: JUNE_1_2024_MS,
                score_scale: ScoreScale::default(),
            },
            admin.map(|item| item.uuid),
        )
        .unwrap()
        .grant
}

pub fn assign(conn: &Connection, grant: &Grant, user: &User, role: GrantRole) -> GrantUser {
    SqliteRoleRepository::try_new(conn)
        .unwrap()
        .assign_role(grant.uuid, user.uuid, role)
        .unwrap()
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

pub fn admin_count(conn: &Connection, grant: &Grant) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM grant_users WHERE grant_uuid = ?1 AND grant_role = 'admin';",
        [grant.uuid.to_string()],
        |row| row.get(0),
    )
    .unwrap()
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<NotificationEvent>>,
}

impl Notifier for RecordingNotifier {
    fn dispatch(&self, event: &NotificationEvent) -> Result<(), CollaboratorError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingAudit {
    pub entries: Mutex<Vec<AuditEntry>>,
}

impl AuditRecorder for RecordingAudit {
    fn record(&self, entry: &AuditEntry) -> Result<(), CollaboratorError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn dispatch(&self, _event: &NotificationEvent) -> Result<(), CollaboratorError> {
        Err(CollaboratorError("mailer offline".to_string()))
    }
}

pub fn recording_hooks() -> (Hooks, Arc<RecordingNotifier>, Arc<RecordingAudit>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let audit = Arc::new(RecordingAudit::default());
    let hooks = Hooks::new(notifier.clone(), audit.clone());
    (hooks, notifier, audit)
}
