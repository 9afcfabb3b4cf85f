//! Role store: per-grant role assignments.
//!
//! # Responsibility
//! - Create, change and remove `GrantUser` records.
//! - Serve grant-role lookups to the policy engine.
//!
//! # Invariants
//! - A grant that has had an admin keeps at least one admin after every
//!   committed mutation.
//! - The admin snapshot is read inside the mutating `IMMEDIATE`
//!   transaction, so two concurrent demotions cannot both pass the guard.
//! - On failure nothing is written.

use crate::db::migrations::ensure_connection_ready;
use crate::error::{AssignmentKind, CoreError, CoreResult};
use crate::invariant::AdminSnapshot;
use crate::model::entity::EntityRef;
use crate::model::grant::{GrantId, GrantUser, GrantUserId, UserId};
use crate::model::role::GrantRole;
use crate::policy::GrantRoleLookup;
use crate::repo::grant_repo::{load_grant, load_user};
use crate::repo::{parse_uuid, with_immediate_tx};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const GRANT_USER_SELECT_SQL: &str = "SELECT uuid, grant_uuid, user_uuid, grant_role FROM grant_users";

pub trait RoleStore {
    /// Fails with `DuplicateAssignment` when (grant, user) already has a role.
    fn assign_role(&self, grant_uuid: GrantId, user_uuid: UserId, role: GrantRole)
        -> CoreResult<GrantUser>;
    /// Fails with `InvariantViolation` when demoting the last admin.
    fn change_role(&self, grant_user_uuid: GrantUserId, role: GrantRole) -> CoreResult<GrantUser>;
    /// Fails with `InvariantViolation` when removing the last admin.
    fn remove_role(&self, grant_user_uuid: GrantUserId) -> CoreResult<GrantUser>;
    fn get_grant_user(&self, grant_user_uuid: GrantUserId) -> CoreResult<Option<GrantUser>>;
    fn list_grant_users(&self, grant_uuid: GrantId) -> CoreResult<Vec<GrantUser>>;
    /// Committed admin snapshot of one grant.
    fn admin_snapshot(&self, grant_uuid: GrantId) -> CoreResult<AdminSnapshot>;
}

pub struct SqliteRoleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRoleRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> CoreResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl RoleStore for SqliteRoleRepository<'_> {
    fn assign_role(
        &self,
        grant_uuid: GrantId,
        user_uuid: UserId,
        role: GrantRole,
    ) -> CoreResult<GrantUser> {
        let grant_user = with_immediate_tx(self.conn, "assign_role", |tx| {
            if load_grant(tx, grant_uuid)?.is_none() {
                return Err(CoreError::NotFound(EntityRef::Grant(grant_uuid)));
            }
            if load_user(tx, user_uuid)?.is_none() {
                return Err(CoreError::NotFound(EntityRef::User(user_uuid)));
            }
            if find_grant_user(tx, grant_uuid, user_uuid)?.is_some() {
                return Err(CoreError::DuplicateAssignment {
                    assignment: AssignmentKind::GrantRole,
                    scope: EntityRef::Grant(grant_uuid),
                    user_uuid,
                });
            }

            let grant_user = GrantUser {
                uuid: Uuid::new_v4(),
                grant_uuid,
                user_uuid,
                grant_role: role,
            };
            tx.execute(
                "INSERT INTO grant_users (uuid, grant_uuid, user_uuid, grant_role)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    grant_user.uuid.to_string(),
                    grant_uuid.to_string(),
                    user_uuid.to_string(),
                    role.as_str(),
                ],
            )?;
            mark_admin_reached(tx, &grant_user)?;
            Ok(grant_user)
        })?;

        info!(
            "event=role_assign module=role_store status=ok grant_uuid={} grant_user_uuid={} role={}",
            grant_user.grant_uuid,
            grant_user.uuid,
            grant_user.grant_role.as_str()
        );
        Ok(grant_user)
    }

    fn change_role(&self, grant_user_uuid: GrantUserId, role: GrantRole) -> CoreResult<GrantUser> {
        let grant_user = with_immediate_tx(self.conn, "change_role", |tx| {
            let current = load_grant_user(tx, grant_user_uuid)?
                .ok_or(CoreError::NotFound(EntityRef::GrantUser(grant_user_uuid)))?;
            load_admin_snapshot(tx, current.grant_uuid)?.check_change(&current, Some(role))?;

            tx.execute(
                "UPDATE grant_users
                 SET grant_role = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1;",
                params![grant_user_uuid.to_string(), role.as_str()],
            )?;
            let updated = GrantUser {
                grant_role: role,
                ..current
            };
            mark_admin_reached(tx, &updated)?;
            Ok(updated)
        })?;

        info!(
            "event=role_change module=role_store status=ok grant_uuid={} grant_user_uuid={} role={}",
            grant_user.grant_uuid,
            grant_user.uuid,
            grant_user.grant_role.as_str()
        );
        Ok(grant_user)
    }

    fn remove_role(&self, grant_user_uuid: GrantUserId) -> CoreResult<GrantUser> {
        let removed = with_immediate_tx(self.conn, "remove_role", |tx| {
            let current = load_grant_user(tx, grant_user_uuid)?
                .ok_or(CoreError::NotFound(EntityRef::GrantUser(grant_user_uuid)))?;
            load_admin_snapshot(tx, current.grant_uuid)?.check_change(&current, None)?;

            tx.execute(
                "DELETE FROM grant_users WHERE uuid = ?1;",
                [grant_user_uuid.to_string()],
            )?;
            Ok(current)
        })?;

        info!(
            "event=role_remove module=role_store status=ok grant_uuid={} grant_user_uuid={}",
            removed.grant_uuid, removed.uuid
        );
        Ok(removed)
    }

    fn get_grant_user(&self, grant_user_uuid: GrantUserId) -> CoreResult<Option<GrantUser>> {
        load_grant_user(self.conn, grant_user_uuid)
    }

    fn list_grant_users(&self, grant_uuid: GrantId) -> CoreResult<Vec<GrantUser>> {
        list_grant_users(self.conn, grant_uuid)
    }

    fn admin_snapshot(&self, grant_uuid: GrantId) -> CoreResult<AdminSnapshot> {
        load_admin_snapshot(self.conn, grant_uuid)
    }
}

impl GrantRoleLookup for SqliteRoleRepository<'_> {
    fn grant_role(&self, grant_uuid: GrantId, user_uuid: UserId) -> CoreResult<Option<GrantRole>> {
        Ok(find_grant_user(self.conn, grant_uuid, user_uuid)?.map(|item| item.grant_role))
    }
}

/// Loads the grant's assignments and admin history on `conn`. Call it on the
/// transaction that is about to mutate.
pub(crate) fn load_admin_snapshot(conn: &Connection, grant_uuid: GrantId) -> CoreResult<AdminSnapshot> {
    let grant = load_grant(conn, grant_uuid)?
        .ok_or(CoreError::NotFound(EntityRef::Grant(grant_uuid)))?;
    Ok(AdminSnapshot {
        grant_uuid,
        has_had_admin: grant.has_had_admin,
        grant_users: list_grant_users(conn, grant_uuid)?,
    })
}

fn mark_admin_reached(conn: &Connection, grant_user: &GrantUser) -> CoreResult<()> {
    if grant_user.is_admin() {
        conn.execute(
            "UPDATE grants
             SET has_had_admin = 1,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE uuid = ?1
               AND has_had_admin = 0;",
            [grant_user.grant_uuid.to_string()],
        )?;
    }
    Ok(())
}

fn load_grant_user(conn: &Connection, grant_user_uuid: GrantUserId) -> CoreResult<Option<GrantUser>> {
    let mut stmt = conn.prepare(&format!("{GRANT_USER_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([grant_user_uuid.to_string()])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_grant_user_row(row)?)),
        None => Ok(None),
    }
}

fn find_grant_user(
    conn: &Connection,
    grant_uuid: GrantId,
    user_uuid: UserId,
) -> CoreResult<Option<GrantUser>> {
    let uuid: Option<String> = conn
        .query_row(
            "SELECT uuid FROM grant_users WHERE grant_uuid = ?1 AND user_uuid = ?2;",
            params![grant_uuid.to_string(), user_uuid.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match uuid {
        Some(value) => load_grant_user(conn, parse_uuid(&value, "grant_users.uuid")?),
        None => Ok(None),
    }
}

fn list_grant_users(conn: &Connection, grant_uuid: GrantId) -> CoreResult<Vec<GrantUser>> {
    let mut stmt = conn.prepare(&format!(
        "{GRANT_USER_SELECT_SQL} WHERE grant_uuid = ?1 ORDER BY created_at ASC, uuid ASC;"
    ))?;
    let mut rows = stmt.query([grant_uuid.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_grant_user_row(row)?);
    }
    Ok(items)
}

fn parse_grant_user_row(row: &Row<'_>) -> CoreResult<GrantUser> {
    let role_text: String = row.get("grant_role")?;
    let grant_role = GrantRole::parse(&role_text).ok_or_else(|| {
        CoreError::InvalidData(format!(
            "invalid grant role `{role_text}` in grant_users.grant_role"
        ))
    })?;

    Ok(GrantUser {
        uuid: parse_uuid(&row.get::<_, String>("uuid")?, "grant_users.uuid")?,
        grant_uuid: parse_uuid(&row.get::<_, String>("grant_uuid")?, "grant_users.grant_uuid")?,
        user_uuid: parse_uuid(&row.get::<_, String>("user_uuid")?, "grant_users.user_uuid")?,
        grant_role,
    })
}
