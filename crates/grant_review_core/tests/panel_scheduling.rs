mod common;

use common::{assign, grant, organization, recording_hooks, user, DAY_MS, JUNE_1_2024_MS};
use grant_review_core::{
    CoreError, GrantRole, Hooks, OrganizationRole, PanelService, PanelStore, PanelUpdate,
    SqlitePanelRepository, SqliteRoleRepository, ValidationError,
};
use rusqlite::Connection;

fn service(conn: &Connection, hooks: Hooks) -> PanelService<SqlitePanelRepository<'_>, SqliteRoleRepository<'_>> {
    PanelService::new(
        SqlitePanelRepository::try_new(conn).unwrap(),
        SqliteRoleRepository::try_new(conn).unwrap(),
        hooks,
    )
}

#[test]
fn start_after_submission_deadline_is_rejected_and_stored_start_kept() {
    let conn = common::setup();
    let org = organization(&conn, "Org");
    let owner = user(&conn, &org, OrganizationRole::Admin);
    let grant = grant(&conn, &org, Some(&owner));
    let service = service(&conn, Hooks::default());
    let original_start = JUNE_1_2024_MS - 10 * DAY_MS;
    service
        .update_panel(
            &owner,
            grant.uuid,
            &PanelUpdate {
                start_datetime: Some(Some(original_start)),
                end_datetime: Some(Some(original_start + DAY_MS)),
                ..PanelUpdate::default()
            },
        )
        .unwrap();

    let err = service
        .update_panel(
            &owner,
            grant.uuid,
            &PanelUpdate {
                start_datetime: Some(Some(JUNE_1_2024_MS + DAY_MS)),
                end_datetime: Some(Some(JUNE_1_2024_MS + 2 * DAY_MS)),
                ..PanelUpdate::default()
            },
        )
        .unwrap_err();

    match err {
        CoreError::Validation(validation) => {
            assert!(matches!(
                validation,
                ValidationError::PanelStartNotBeforeSubmissionDeadline { .. }
            ));
            assert_eq!(validation.constraint(), "before_submission_deadline");
        }
        other => panic!("unexpected error: {other}"),
    }
    let stored = service.get_panel(&owner, grant.uuid).unwrap();
    assert_eq!(stored.start_datetime, Some(original_start));
    assert_eq!(stored.end_datetime, Some(original_start + DAY_MS));
}

#[test]
fn start_must_precede_end() {
    let conn = common::setup();
    let org = organization(&conn, "Org");
    let owner = user(&conn, &org, OrganizationRole::Admin);
    let grant = grant(&conn, &org, Some(&owner));
    let start = JUNE_1_2024_MS - 5 * DAY_MS;

    let err = service(&conn, Hooks::default())
        .update_panel(
            &owner,
            grant.uuid,
            &PanelUpdate {
                start_datetime: Some(Some(start)),
                end_datetime: Some(Some(start)),
                ..PanelUpdate::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Validation(ValidationError::PanelStartNotBeforeEnd { .. })
    ));
}

#[test]
fn insecure_meeting_link_is_rejected_without_partial_write() {
    let conn = common::setup();
    let org = organization(&conn, "Org");
    let owner = user(&conn, &org, OrganizationRole::Admin);
    let grant = grant(&conn, &org, Some(&owner));
    let service = service(&conn, Hooks::default());

    let err = service
        .update_panel(
            &owner,
            grant.uuid,
            &PanelUpdate {
                meeting_location: Some("Room 4".to_string()),
                meeting_link: Some("http://meet.example.org/panel".to_string()),
                ..PanelUpdate::default()
            },
        )
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Validation(ValidationError::InsecureMeetingLink)
    ));

    let stored = service.get_panel(&owner, grant.uuid).unwrap();
    assert_eq!(stored.meeting_location, None);
    assert_eq!(stored.meeting_link, None);
}

#[test]
fn successful_update_records_actor_and_audit_summary() {
    let conn = common::setup();
    let org = organization(&conn, "Org");
    let owner = user(&conn, &org, OrganizationRole::Admin);
    let editor = user(&conn, &org, OrganizationRole::Basic);
    let grant = grant(&conn, &org, Some(&owner));
    assign(&conn, &grant, &editor, GrantRole::Editor);
    let (hooks, _, audit) = recording_hooks();
    let service = service(&conn, hooks);
    let start = JUNE_1_2024_MS - 3 * DAY_MS;

    let panel = service
        .update_panel(
            &editor,
            grant.uuid,
            &PanelUpdate {
                start_datetime: Some(Some(start)),
                end_datetime: Some(Some(start + DAY_MS)),
                meeting_link: Some("https://meet.example.org/panel".to_string()),
                instructions: Some("Read every proposal first.".to_string()),
                ..PanelUpdate::default()
            },
        )
        .unwrap();

    assert_eq!(panel.updated_by, Some(editor.uuid));
    assert_eq!(panel.meeting_link.as_deref(), Some("https://meet.example.org/panel"));
    let stored = SqlitePanelRepository::try_new(&conn)
        .unwrap()
        .get_panel(grant.uuid)
        .unwrap()
        .unwrap();
    assert_eq!(stored, panel);

    let entries = audit.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].actor_uuid, editor.uuid);
    assert_eq!(entries[0].before.as_ref().unwrap()["start_datetime"], serde_json::Value::Null);
    assert_eq!(entries[0].after.as_ref().unwrap()["start_datetime"], start);
}

#[test]
fn schedule_can_be_cleared_after_it_was_set() {
    let conn = common::setup();
    let org = organization(&conn, "Org");
    let owner = user(&conn, &org, OrganizationRole::Admin);
    let grant = grant(&conn, &org, Some(&owner));
    let service = service(&conn, Hooks::default());
    let start = JUNE_1_2024_MS - 4 * DAY_MS;
    service
        .update_panel(
            &owner,
            grant.uuid,
            &PanelUpdate {
                start_datetime: Some(Some(start)),
                end_datetime: Some(Some(start + DAY_MS)),
                instructions: Some("Bring notes".to_string()),
                ..PanelUpdate::default()
            },
        )
        .unwrap();

    let cleared = service
        .update_panel(
            &owner,
            grant.uuid,
            &PanelUpdate {
                start_datetime: Some(None),
                end_datetime: Some(None),
                ..PanelUpdate::default()
            },
        )
        .unwrap();

    assert_eq!(cleared.start_datetime, None);
    assert_eq!(cleared.end_datetime, None);
    assert_eq!(cleared.instructions.as_deref(), Some("Bring notes"));
    let stored = service.get_panel(&owner, grant.uuid).unwrap();
    assert_eq!(stored, cleared);
}

#[test]
fn viewer_cannot_update_panel() {
    let conn = common::setup();
    let org = organization(&conn, "Org");
    let owner = user(&conn, &org, OrganizationRole::Admin);
    let viewer = user(&conn, &org, OrganizationRole::Admin);
    let grant = grant(&conn, &org, Some(&owner));
    assign(&conn, &grant, &viewer, GrantRole::Viewer);
    let (hooks, _, audit) = recording_hooks();

    let err = service(&conn, hooks)
        .update_panel(
            &viewer,
            grant.uuid,
            &PanelUpdate {
                instructions: Some("Bring snacks".to_string()),
                ..PanelUpdate::default()
            },
        )
        .unwrap_err();

    assert!(matches!(err, CoreError::NotAuthorized { .. }));
    assert!(audit.entries.lock().unwrap().is_empty());
}
