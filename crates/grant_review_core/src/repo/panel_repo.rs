//! Panel store: one schedule row per grant.
//!
//! # Invariants
//! - An update is validated against the grant's submission close date
//!   inside the same transaction that writes it.
//! - A rejected update leaves every stored field untouched.

use crate::db::migrations::ensure_connection_ready;
use crate::error::{CoreError, CoreResult};
use crate::model::entity::EntityRef;
use crate::model::grant::{GrantId, UserId};
use crate::model::panel::{Panel, PanelUpdate};
use crate::repo::grant_repo::{load_grant, load_user};
use crate::repo::{parse_uuid, with_immediate_tx};
use log::info;
use rusqlite::{params, Connection};

/// Panel state around one committed update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelChange {
    pub before: Panel,
    pub after: Panel,
}

pub trait PanelStore {
    fn get_panel(&self, grant_uuid: GrantId) -> CoreResult<Option<Panel>>;
    /// Applies `update` on top of the stored panel and records `actor_uuid`
    /// as the last editor.
    fn update_panel(
        &self,
        grant_uuid: GrantId,
        update: &PanelUpdate,
        actor_uuid: UserId,
    ) -> CoreResult<PanelChange>;
}

pub struct SqlitePanelRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqlitePanelRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> CoreResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl PanelStore for SqlitePanelRepository<'_> {
    fn get_panel(&self, grant_uuid: GrantId) -> CoreResult<Option<Panel>> {
        load_panel(self.conn, grant_uuid)
    }

    fn update_panel(
        &self,
        grant_uuid: GrantId,
        update: &PanelUpdate,
        actor_uuid: UserId,
    ) -> CoreResult<PanelChange> {
        let change = with_immediate_tx(self.conn, "update_panel", |tx| {
            let grant = load_grant(tx, grant_uuid)?
                .ok_or(CoreError::NotFound(EntityRef::Grant(grant_uuid)))?;
            if load_user(tx, actor_uuid)?.is_none() {
                return Err(CoreError::NotFound(EntityRef::User(actor_uuid)));
            }
            let before = load_panel(tx, grant_uuid)?
                .ok_or(CoreError::NotFound(EntityRef::Panel(grant_uuid)))?;

            let candidate = before.apply(update);
            candidate.validate(grant.submission_close_date)?;

            tx.execute(
                "UPDATE panels
                 SET start_datetime = ?2,
                     end_datetime = ?3,
                     meeting_location = ?4,
                     meeting_link = ?5,
                     instructions = ?6,
                     updated_by = ?7,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE grant_uuid = ?1;",
                params![
                    grant_uuid.to_string(),
                    candidate.start_datetime,
                    candidate.end_datetime,
                    candidate.meeting_location,
                    candidate.meeting_link,
                    candidate.instructions,
                    actor_uuid.to_string(),
                ],
            )?;
            let after = load_panel(tx, grant_uuid)?
                .ok_or(CoreError::NotFound(EntityRef::Panel(grant_uuid)))?;
            Ok(PanelChange { before, after })
        })?;

        info!(
            "event=panel_update module=panel_store status=ok grant_uuid={} actor_uuid={}",
            grant_uuid, actor_uuid
        );
        Ok(change)
    }
}

fn load_panel(conn: &Connection, grant_uuid: GrantId) -> CoreResult<Option<Panel>> {
    let mut stmt = conn.prepare(
        "SELECT
            grant_uuid,
            start_datetime,
            end_datetime,
            meeting_location,
            meeting_link,
            instructions,
            updated_by,
            updated_at
         FROM panels
         WHERE grant_uuid = ?1;",
    )?;
    let mut rows = stmt.query([grant_uuid.to_string()])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    let updated_by = match row.get::<_, Option<String>>("updated_by")? {
        Some(value) => Some(parse_uuid(&value, "panels.updated_by")?),
        None => None,
    };
    Ok(Some(Panel {
        grant_uuid: parse_uuid(&row.get::<_, String>("grant_uuid")?, "panels.grant_uuid")?,
        start_datetime: row.get("start_datetime")?,
        end_datetime: row.get("end_datetime")?,
        meeting_location: row.get("meeting_location")?,
        meeting_link: row.get("meeting_link")?,
        instructions: row.get("instructions")?,
        updated_by,
        updated_at: row.get("updated_at")?,
    }))
}
