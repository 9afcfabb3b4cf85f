//! Organization, user, grant, criterion and submission persistence.
//!
//! These records are plain data entry around the role and review stores;
//! the only cross-table rule here is that a grant is created together with
//! its panel and, optionally, its first admin in one transaction.

use crate::db::migrations::ensure_connection_ready;
use crate::error::{CoreError, CoreResult};
use crate::model::entity::EntityRef;
use crate::model::grant::{
    Criterion, CriterionId, Grant, GrantCreation, GrantId, GrantUser, NewGrant, NewUser,
    Organization, OrganizationId, ScoreScale, Submission, SubmissionId, User, UserId,
};
use crate::model::role::{GrantRole, OrganizationRole};
use crate::model::validation::{require_text, ValidationError};
use crate::repo::{bool_to_int, parse_flag, parse_uuid, with_immediate_tx};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

pub trait GrantRepository {
    fn create_organization(&self, name: &str) -> CoreResult<Organization>;
    fn get_organization(&self, id: OrganizationId) -> CoreResult<Option<Organization>>;
    fn create_user(&self, user: &NewUser) -> CoreResult<User>;
    fn get_user(&self, id: UserId) -> CoreResult<Option<User>>;
    fn set_organization_role(&self, id: UserId, role: OrganizationRole) -> CoreResult<User>;
    /// Creates the grant and its empty panel; with `initial_admin` also the
    /// first admin assignment.
    fn create_grant(&self, grant: &NewGrant, initial_admin: Option<UserId>)
        -> CoreResult<GrantCreation>;
    fn get_grant(&self, id: GrantId) -> CoreResult<Option<Grant>>;
    fn add_criterion(&self, grant_uuid: GrantId, name: &str) -> CoreResult<Criterion>;
    /// Soft-deletes a criterion; existing criteria reviews keep pointing at it.
    fn retire_criterion(&self, id: CriterionId) -> CoreResult<()>;
    fn list_criteria(&self, grant_uuid: GrantId, include_retired: bool)
        -> CoreResult<Vec<Criterion>>;
    fn create_submission(
        &self,
        grant_uuid: GrantId,
        applicant_uuid: UserId,
        title: &str,
    ) -> CoreResult<Submission>;
    fn get_submission(&self, id: SubmissionId) -> CoreResult<Option<Submission>>;
}

pub struct SqliteGrantRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteGrantRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> CoreResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl GrantRepository for SqliteGrantRepository<'_> {
    fn create_organization(&self, name: &str) -> CoreResult<Organization> {
        let organization = Organization {
            uuid: Uuid::new_v4(),
            name: require_text("name", name)?,
        };
        with_immediate_tx(self.conn, "create_organization", |tx| {
            tx.execute(
                "INSERT INTO organizations (uuid, name) VALUES (?1, ?2);",
                params![organization.uuid.to_string(), organization.name],
            )?;
            Ok(())
        })?;
        Ok(organization)
    }

    fn get_organization(&self, id: OrganizationId) -> CoreResult<Option<Organization>> {
        let name: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM organizations WHERE uuid = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name.map(|name| Organization { uuid: id, name }))
    }

    fn create_user(&self, user: &NewUser) -> CoreResult<User> {
        let created = User {
            uuid: Uuid::new_v4(),
            organization_uuid: user.organization_uuid,
            email: require_text("email", &user.email)?,
            first_name: require_text("first_name", &user.first_name)?,
            last_name: require_text("last_name", &user.last_name)?,
            organization_role: user.organization_role.unwrap_or_default(),
        };

        with_immediate_tx(self.conn, "create_user", |tx| {
            if self.get_organization(created.organization_uuid)?.is_none() {
                return Err(CoreError::NotFound(EntityRef::Organization(
                    created.organization_uuid,
                )));
            }
            let taken: Option<String> = tx
                .query_row(
                    "SELECT uuid FROM users WHERE email = ?1;",
                    [created.email.as_str()],
                    |row| row.get(0),
                )
                .optional()?;
            if taken.is_some() {
                return Err(ValidationError::EmailTaken.into());
            }
            tx.execute(
                "INSERT INTO users (
                    uuid,
                    organization_uuid,
                    email,
                    first_name,
                    last_name,
                    organization_role
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    created.uuid.to_string(),
                    created.organization_uuid.to_string(),
                    created.email,
                    created.first_name,
                    created.last_name,
                    created.organization_role.as_str(),
                ],
            )?;
            Ok(())
        })?;
        Ok(created)
    }

    fn get_user(&self, id: UserId) -> CoreResult<Option<User>> {
        load_user(self.conn, id)
    }

    fn set_organization_role(&self, id: UserId, role: OrganizationRole) -> CoreResult<User> {
        with_immediate_tx(self.conn, "set_organization_role", |tx| {
            let changed = tx.execute(
                "UPDATE users
                 SET organization_role = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1;",
                params![id.to_string(), role.as_str()],
            )?;
            if changed == 0 {
                return Err(CoreError::NotFound(EntityRef::User(id)));
            }
            load_user(tx, id)?.ok_or(CoreError::NotFound(EntityRef::User(id)))
        })
    }

    fn create_grant(
        &self,
        grant: &NewGrant,
        initial_admin: Option<UserId>,
    ) -> CoreResult<GrantCreation> {
        grant.score_scale.validate()?;
        let created = Grant {
            uuid: Uuid::new_v4(),
            organization_uuid: grant.organization_uuid,
            name: require_text("name", &grant.name)?,
            submission_close_date: grant.submission_close_date,
            score_scale: grant.score_scale,
            has_had_admin: initial_admin.is_some(),
        };

        let admin = with_immediate_tx(self.conn, "create_grant", |tx| {
            if self.get_organization(created.organization_uuid)?.is_none() {
                return Err(CoreError::NotFound(EntityRef::Organization(
                    created.organization_uuid,
                )));
            }
            tx.execute(
                "INSERT INTO grants (
                    uuid,
                    organization_uuid,
                    name,
                    submission_close_date,
                    review_score_min,
                    review_score_max,
                    has_had_admin
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    created.uuid.to_string(),
                    created.organization_uuid.to_string(),
                    created.name,
                    created.submission_close_date,
                    created.score_scale.minimum,
                    created.score_scale.maximum,
                    bool_to_int(created.has_had_admin),
                ],
            )?;
            tx.execute(
                "INSERT INTO panels (grant_uuid) VALUES (?1);",
                [created.uuid.to_string()],
            )?;

            let Some(admin_uuid) = initial_admin else {
                return Ok(None);
            };
            if load_user(tx, admin_uuid)?.is_none() {
                return Err(CoreError::NotFound(EntityRef::User(admin_uuid)));
            }
            let admin = GrantUser {
                uuid: Uuid::new_v4(),
                grant_uuid: created.uuid,
                user_uuid: admin_uuid,
                grant_role: GrantRole::Admin,
            };
            tx.execute(
                "INSERT INTO grant_users (uuid, grant_uuid, user_uuid, grant_role)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    admin.uuid.to_string(),
                    admin.grant_uuid.to_string(),
                    admin.user_uuid.to_string(),
                    admin.grant_role.as_str(),
                ],
            )?;
            Ok(Some(admin))
        })?;

        info!(
            "event=grant_create module=grant_repo status=ok grant_uuid={} with_admin={}",
            created.uuid,
            admin.is_some()
        );
        Ok(GrantCreation {
            grant: created,
            initial_admin: admin,
        })
    }

    fn get_grant(&self, id: GrantId) -> CoreResult<Option<Grant>> {
        load_grant(self.conn, id)
    }

    fn add_criterion(&self, grant_uuid: GrantId, name: &str) -> CoreResult<Criterion> {
        let name = require_text("name", name)?;
        with_immediate_tx(self.conn, "add_criterion", |tx| {
            if load_grant(tx, grant_uuid)?.is_none() {
                return Err(CoreError::NotFound(EntityRef::Grant(grant_uuid)));
            }
            let sort_order: i64 = tx.query_row(
                "SELECT COALESCE(MAX(sort_order), -1) + 1
                 FROM criteria
                 WHERE grant_uuid = ?1;",
                [grant_uuid.to_string()],
                |row| row.get(0),
            )?;
            let criterion = Criterion {
                uuid: Uuid::new_v4(),
                grant_uuid,
                name,
                sort_order,
                is_retired: false,
            };
            tx.execute(
                "INSERT INTO criteria (uuid, grant_uuid, name, sort_order, is_deleted)
                 VALUES (?1, ?2, ?3, ?4, 0);",
                params![
                    criterion.uuid.to_string(),
                    grant_uuid.to_string(),
                    criterion.name,
                    criterion.sort_order,
                ],
            )?;
            Ok(criterion)
        })
    }

    fn retire_criterion(&self, id: CriterionId) -> CoreResult<()> {
        with_immediate_tx(self.conn, "retire_criterion", |tx| {
            let changed = tx.execute(
                "UPDATE criteria SET is_deleted = 1 WHERE uuid = ?1 AND is_deleted = 0;",
                [id.to_string()],
            )?;
            if changed == 0 {
                return Err(CoreError::NotFound(EntityRef::Criterion(id)));
            }
            Ok(())
        })
    }

    fn list_criteria(
        &self,
        grant_uuid: GrantId,
        include_retired: bool,
    ) -> CoreResult<Vec<Criterion>> {
        list_criteria(self.conn, grant_uuid, include_retired)
    }

    fn create_submission(
        &self,
        grant_uuid: GrantId,
        applicant_uuid: UserId,
        title: &str,
    ) -> CoreResult<Submission> {
        let submission = Submission {
            uuid: Uuid::new_v4(),
            grant_uuid,
            applicant_uuid,
            title: require_text("title", title)?,
        };
        with_immediate_tx(self.conn, "create_submission", |tx| {
            if load_grant(tx, grant_uuid)?.is_none() {
                return Err(CoreError::NotFound(EntityRef::Grant(grant_uuid)));
            }
            if load_user(tx, applicant_uuid)?.is_none() {
                return Err(CoreError::NotFound(EntityRef::User(applicant_uuid)));
            }
            tx.execute(
                "INSERT INTO submissions (uuid, grant_uuid, applicant_uuid, title)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    submission.uuid.to_string(),
                    grant_uuid.to_string(),
                    applicant_uuid.to_string(),
                    submission.title,
                ],
            )?;
            Ok(())
        })?;
        Ok(submission)
    }

    fn get_submission(&self, id: SubmissionId) -> CoreResult<Option<Submission>> {
        load_submission(self.conn, id)
    }
}

pub(crate) fn load_user(conn: &Connection, id: UserId) -> CoreResult<Option<User>> {
    let mut stmt = conn.prepare(
        "SELECT uuid, organization_uuid, email, first_name, last_name, organization_role
         FROM users
         WHERE uuid = ?1;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_user_row(row)?)),
        None => Ok(None),
    }
}

pub(crate) fn load_grant(conn: &Connection, id: GrantId) -> CoreResult<Option<Grant>> {
    let mut stmt = conn.prepare(
        "SELECT
            uuid,
            organization_uuid,
            name,
            submission_close_date,
            review_score_min,
            review_score_max,
            has_had_admin
         FROM grants
         WHERE uuid = ?1;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_grant_row(row)?)),
        None => Ok(None),
    }
}

pub(crate) fn load_submission(conn: &Connection, id: SubmissionId) -> CoreResult<Option<Submission>> {
    let mut stmt = conn.prepare(
        "SELECT uuid, grant_uuid, applicant_uuid, title
         FROM submissions
         WHERE uuid = ?1;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    match rows.next()? {
        Some(row) => Ok(Some(Submission {
            uuid: parse_uuid(&row.get::<_, String>("uuid")?, "submissions.uuid")?,
            grant_uuid: parse_uuid(&row.get::<_, String>("grant_uuid")?, "submissions.grant_uuid")?,
            applicant_uuid: parse_uuid(
                &row.get::<_, String>("applicant_uuid")?,
                "submissions.applicant_uuid",
            )?,
            title: row.get("title")?,
        })),
        None => Ok(None),
    }
}

/// Criteria in display order; retired ones only when asked for.
pub(crate) fn list_criteria(
    conn: &Connection,
    grant_uuid: GrantId,
    include_retired: bool,
) -> CoreResult<Vec<Criterion>> {
    let mut stmt = conn.prepare(
        "SELECT uuid, grant_uuid, name, sort_order, is_deleted
         FROM criteria
         WHERE grant_uuid = ?1
           AND (?2 = 1 OR is_deleted = 0)
         ORDER BY sort_order ASC, uuid ASC;",
    )?;
    let mut rows = stmt.query(params![grant_uuid.to_string(), bool_to_int(include_retired)])?;
    let mut criteria = Vec::new();
    while let Some(row) = rows.next()? {
        criteria.push(Criterion {
            uuid: parse_uuid(&row.get::<_, String>("uuid")?, "criteria.uuid")?,
            grant_uuid: parse_uuid(&row.get::<_, String>("grant_uuid")?, "criteria.grant_uuid")?,
            name: row.get("name")?,
            sort_order: row.get("sort_order")?,
            is_retired: parse_flag(row.get("is_deleted")?, "criteria.is_deleted")?,
        });
    }
    Ok(criteria)
}

fn parse_user_row(row: &Row<'_>) -> CoreResult<User> {
    let role_text: String = row.get("organization_role")?;
    let organization_role = OrganizationRole::parse(&role_text).ok_or_else(|| {
        CoreError::InvalidData(format!(
            "invalid organization role `{role_text}` in users.organization_role"
        ))
    })?;

    Ok(User {
        uuid: parse_uuid(&row.get::<_, String>("uuid")?, "users.uuid")?,
        organization_uuid: parse_uuid(
            &row.get::<_, String>("organization_uuid")?,
            "users.organization_uuid",
        )?,
        email: row.get("email")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        organization_role,
    })
}

fn parse_grant_row(row: &Row<'_>) -> CoreResult<Grant> {
    Ok(Grant {
        uuid: parse_uuid(&row.get::<_, String>("uuid")?, "grants.uuid")?,
        organization_uuid: parse_uuid(
            &row.get::<_, String>("organization_uuid")?,
            "grants.organization_uuid",
        )?,
        name: row.get("name")?,
        submission_close_date: row.get("submission_close_date")?,
        score_scale: ScoreScale {
            minimum: row.get("review_score_min")?,
            maximum: row.get("review_score_max")?,
        },
        has_had_admin: parse_flag(row.get("has_had_admin")?, "grants.has_had_admin")?,
    })
}
