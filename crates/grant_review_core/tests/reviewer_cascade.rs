mod common;

use common::{assign, grant, organization, recording_hooks, user, FailingNotifier, RecordingAudit};
use grant_review_core::{
    AssignmentKind, CoreError, Grant, GrantRepository, GrantReviewer, GrantRole, Hooks,
    NotificationEvent, OrganizationRole, ReviewStore, ReviewerService, SqliteGrantRepository,
    SqliteReviewRepository, SqliteRoleRepository, User,
};
use rusqlite::Connection;
use std::sync::Arc;

struct World {
    conn: Connection,
    owner: User,
    reviewer: User,
    first_grant: Grant,
    second_grant: Grant,
    first_assignment: GrantReviewer,
}

/// Reviewer with two reviews on the first grant and one on the second.
fn world() -> World {
    let conn = common::setup();
    let org = organization(&conn, "Org");
    let owner = user(&conn, &org, OrganizationRole::Admin);
    let reviewer = user(&conn, &org, OrganizationRole::Basic);
    let applicant = user(&conn, &org, OrganizationRole::Basic);
    let first_grant = grant(&conn, &org, Some(&owner));
    let second_grant = grant(&conn, &org, Some(&owner));

    let grants = SqliteGrantRepository::try_new(&conn).unwrap();
    let reviews = SqliteReviewRepository::try_new(&conn).unwrap();
    let first_assignment = reviews.add_reviewer(first_grant.uuid, reviewer.uuid).unwrap();
    reviews.add_reviewer(second_grant.uuid, reviewer.uuid).unwrap();

    for (grant, submissions) in [(&first_grant, 2), (&second_grant, 1)] {
        grants.add_criterion(grant.uuid, "Significance").unwrap();
        grants.add_criterion(grant.uuid, "Approach").unwrap();
        for index in 0..submissions {
            let submission = grants
                .create_submission(grant.uuid, applicant.uuid, &format!("Proposal {index}"))
                .unwrap();
            let review = reviews
                .create_review(submission.uuid, reviewer.uuid, owner.uuid)
                .unwrap();
            reviews.open_for_editing(review.uuid).unwrap();
        }
    }

    World {
        conn,
        owner,
        reviewer,
        first_grant,
        second_grant,
        first_assignment,
    }
}

fn reviews_by(conn: &Connection, grant: &Grant, reviewer: &User) -> i64 {
    conn.query_row(
        "SELECT COUNT(*)
         FROM reviews r
         INNER JOIN submissions s ON s.uuid = r.submission_uuid
         WHERE s.grant_uuid = ?1 AND r.reviewer_uuid = ?2;",
        [grant.uuid.to_string(), reviewer.uuid.to_string()],
        |row| row.get(0),
    )
    .unwrap()
}

fn service(conn: &Connection, hooks: Hooks) -> ReviewerService<SqliteReviewRepository<'_>, SqliteRoleRepository<'_>> {
    ReviewerService::new(
        SqliteReviewRepository::try_new(conn).unwrap(),
        SqliteRoleRepository::try_new(conn).unwrap(),
        hooks,
    )
}

#[test]
fn delete_reviewer_only_touches_the_target_grant() {
    let world = world();
    let (hooks, notifier, audit) = recording_hooks();
    assert_eq!(reviews_by(&world.conn, &world.first_grant, &world.reviewer), 2);
    assert_eq!(common::count(&world.conn, "criteria_reviews"), 6);

    let removal = service(&world.conn, hooks)
        .delete_reviewer(&world.owner, world.first_assignment.uuid)
        .unwrap();

    assert_eq!(removal.removed_review_uuids.len(), 2);
    assert_eq!(reviews_by(&world.conn, &world.first_grant, &world.reviewer), 0);
    assert_eq!(reviews_by(&world.conn, &world.second_grant, &world.reviewer), 1);
    assert_eq!(common::count(&world.conn, "criteria_reviews"), 2);
    assert_eq!(common::count(&world.conn, "grant_reviewers"), 1);

    let events = notifier.events.lock().unwrap();
    assert_eq!(
        *events,
        vec![NotificationEvent::ReviewerRemoved {
            grant_reviewer_uuid: world.first_assignment.uuid,
            grant_uuid: world.first_grant.uuid,
            reviewer_uuid: world.reviewer.uuid,
            removed_reviews: 2,
        }]
    );
    let entries = audit.entries.lock().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].actor_uuid, world.owner.uuid);
    assert!(entries[0].after.is_none());
}

#[test]
fn failure_on_second_review_delete_rolls_back_everything() {
    let world = world();
    let doomed: String = world
        .conn
        .query_row(
            "SELECT r.uuid
             FROM reviews r
             INNER JOIN submissions s ON s.uuid = r.submission_uuid
             WHERE s.grant_uuid = ?1 AND r.reviewer_uuid = ?2
             ORDER BY r.created_at ASC, r.uuid ASC
             LIMIT 1 OFFSET 1;",
            [world.first_grant.uuid.to_string(), world.reviewer.uuid.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    world
        .conn
        .execute_batch(&format!(
            "CREATE TEMP TRIGGER fail_second_review
             BEFORE DELETE ON reviews
             WHEN OLD.uuid = '{doomed}'
             BEGIN
                 SELECT RAISE(ABORT, 'forced failure');
             END;"
        ))
        .unwrap();
    let reviews_before = common::count(&world.conn, "reviews");
    let lines_before = common::count(&world.conn, "criteria_reviews");
    let (hooks, notifier, audit) = recording_hooks();

    let err = service(&world.conn, hooks)
        .delete_reviewer(&world.owner, world.first_assignment.uuid)
        .unwrap_err();

    assert!(matches!(
        err,
        CoreError::TransactionAborted { operation: "delete_reviewer", .. }
    ));
    assert_eq!(common::count(&world.conn, "reviews"), reviews_before);
    assert_eq!(common::count(&world.conn, "criteria_reviews"), lines_before);
    assert_eq!(reviews_by(&world.conn, &world.first_grant, &world.reviewer), 2);
    assert!(SqliteReviewRepository::try_new(&world.conn)
        .unwrap()
        .get_grant_reviewer(world.first_assignment.uuid)
        .unwrap()
        .is_some());
    assert!(notifier.events.lock().unwrap().is_empty());
    assert!(audit.entries.lock().unwrap().is_empty());
}

#[test]
fn failure_on_reviewer_record_delete_keeps_reviews() {
    let world = world();
    world
        .conn
        .execute_batch(
            "CREATE TEMP TRIGGER fail_reviewer_delete
             BEFORE DELETE ON grant_reviewers
             BEGIN
                 SELECT RAISE(ABORT, 'forced failure');
             END;",
        )
        .unwrap();

    let err = service(&world.conn, Hooks::default())
        .delete_reviewer(&world.owner, world.first_assignment.uuid)
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(!err.is_lock_contention());
    assert_eq!(reviews_by(&world.conn, &world.first_grant, &world.reviewer), 2);
    assert_eq!(common::count(&world.conn, "grant_reviewers"), 2);
}

#[test]
fn notification_failure_does_not_undo_the_cascade() {
    let world = world();
    let hooks = Hooks::new(Arc::new(FailingNotifier), Arc::new(RecordingAudit::default()));

    let removal = service(&world.conn, hooks)
        .delete_reviewer(&world.owner, world.first_assignment.uuid)
        .unwrap();

    assert_eq!(removal.removed_review_uuids.len(), 2);
    assert_eq!(reviews_by(&world.conn, &world.first_grant, &world.reviewer), 0);
}

#[test]
fn viewer_cannot_delete_reviewer() {
    let world = world();
    let org_uuid = world.owner.organization_uuid;
    let viewer = SqliteGrantRepository::try_new(&world.conn)
        .unwrap()
        .create_user(&grant_review_core::NewUser {
            organization_uuid: org_uuid,
            email: "viewer@example.org".to_string(),
            first_name: "View".to_string(),
            last_name: "Only".to_string(),
            organization_role: Some(OrganizationRole::Admin),
        })
        .unwrap();
    assign(&world.conn, &world.first_grant, &viewer, GrantRole::Viewer);

    let err = service(&world.conn, Hooks::default())
        .delete_reviewer(&viewer, world.first_assignment.uuid)
        .unwrap_err();

    assert!(matches!(err, CoreError::NotAuthorized { .. }));
    assert_eq!(reviews_by(&world.conn, &world.first_grant, &world.reviewer), 2);
}

#[test]
fn unknown_reviewer_assignment_is_not_found() {
    let world = world();
    let err = service(&world.conn, Hooks::default())
        .delete_reviewer(&world.owner, uuid::Uuid::new_v4())
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[test]
fn reviewer_cannot_be_added_twice() {
    let world = world();
    let err = service(&world.conn, Hooks::default())
        .add_reviewer(&world.owner, world.first_grant.uuid, world.reviewer.uuid)
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::DuplicateAssignment {
            assignment: AssignmentKind::GrantReviewer,
            ..
        }
    ));
}
