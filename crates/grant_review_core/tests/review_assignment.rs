mod common;

use common::{assign, grant, organization, recording_hooks, user};
use grant_review_core::{
    AssignmentKind, CoreError, CriterionScore, EntityRef, GrantRepository, GrantRole, Hooks,
    NotificationEvent, OrganizationRole, ReviewScores, ReviewService, ReviewStore,
    SqliteGrantRepository, SqliteReviewRepository, SqliteRoleRepository, ValidationError,
};
use rusqlite::Connection;

fn service(conn: &Connection, hooks: Hooks) -> ReviewService<SqliteReviewRepository<'_>, SqliteRoleRepository<'_>> {
    ReviewService::new(
        SqliteReviewRepository::try_new(conn).unwrap(),
        SqliteRoleRepository::try_new(conn).unwrap(),
        hooks,
    )
}

#[test]
fn review_requires_reviewer_assignment_on_the_grant() {
    let conn = common::setup();
    let org = organization(&conn, "Org");
    let owner = user(&conn, &org, OrganizationRole::Admin);
    let stranger = user(&conn, &org, OrganizationRole::Basic);
    let grant = grant(&conn, &org, Some(&owner));
    let submission = SqliteGrantRepository::try_new(&conn)
        .unwrap()
        .create_submission(grant.uuid, owner.uuid, "Proposal")
        .unwrap();

    let err = service(&conn, Hooks::default())
        .create_review(&owner, submission.uuid, stranger.uuid)
        .unwrap_err();

    assert!(matches!(
        err,
        CoreError::NotAssignedAsReviewer { grant_uuid, reviewer_uuid }
            if grant_uuid == grant.uuid && reviewer_uuid == stranger.uuid
    ));
    assert_eq!(common::count(&conn, "reviews"), 0);
}

#[test]
fn create_review_notifies_and_rejects_second_review_by_same_reviewer() {
    let conn = common::setup();
    let org = organization(&conn, "Org");
    let owner = user(&conn, &org, OrganizationRole::Admin);
    let reviewer = user(&conn, &org, OrganizationRole::Basic);
    let grant = grant(&conn, &org, Some(&owner));
    let store = SqliteReviewRepository::try_new(&conn).unwrap();
    store.add_reviewer(grant.uuid, reviewer.uuid).unwrap();
    let submission = SqliteGrantRepository::try_new(&conn)
        .unwrap()
        .create_submission(grant.uuid, owner.uuid, "Proposal")
        .unwrap();
    let (hooks, notifier, _) = recording_hooks();
    let service = service(&conn, hooks);

    let review = service
        .create_review(&owner, submission.uuid, reviewer.uuid)
        .unwrap();
    assert_eq!(review.assigner_uuid, owner.uuid);
    assert_eq!(review.grant_uuid, grant.uuid);
    assert!(review.criteria_reviews.is_empty());

    let err = service
        .create_review(&owner, submission.uuid, reviewer.uuid)
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::DuplicateAssignment {
            assignment: AssignmentKind::Review,
            ..
        }
    ));
    assert_eq!(
        *notifier.events.lock().unwrap(),
        vec![NotificationEvent::ReviewAssigned {
            review_uuid: review.uuid,
            reviewer_uuid: reviewer.uuid,
        }]
    );
}

#[test]
fn opening_for_editing_fills_missing_criteria_and_keeps_retired_ones() {
    let conn = common::setup();
    let org = organization(&conn, "Org");
    let owner = user(&conn, &org, OrganizationRole::Admin);
    let reviewer = user(&conn, &org, OrganizationRole::Basic);
    let grant = grant(&conn, &org, Some(&owner));
    let grants = SqliteGrantRepository::try_new(&conn).unwrap();
    let significance = grants.add_criterion(grant.uuid, "Significance").unwrap();
    let approach = grants.add_criterion(grant.uuid, "Approach").unwrap();
    let store = SqliteReviewRepository::try_new(&conn).unwrap();
    store.add_reviewer(grant.uuid, reviewer.uuid).unwrap();
    let submission = grants
        .create_submission(grant.uuid, owner.uuid, "Proposal")
        .unwrap();
    let service = service(&conn, Hooks::default());
    let review = service
        .create_review(&owner, submission.uuid, reviewer.uuid)
        .unwrap();

    let opened = service.open_for_editing(&owner, review.uuid).unwrap();
    let criteria: Vec<_> = opened
        .criteria_reviews
        .iter()
        .map(|item| item.criterion_uuid)
        .collect();
    assert_eq!(criteria, vec![significance.uuid, approach.uuid]);
    assert!(opened.criteria_reviews.iter().all(|item| item.score.is_none()));

    let reopened = service.open_for_editing(&owner, review.uuid).unwrap();
    assert_eq!(reopened.criteria_reviews, opened.criteria_reviews);

    grants.retire_criterion(approach.uuid).unwrap();
    let innovation = grants.add_criterion(grant.uuid, "Innovation").unwrap();
    let refreshed = service.open_for_editing(&owner, review.uuid).unwrap();
    let criteria: Vec<_> = refreshed
        .criteria_reviews
        .iter()
        .map(|item| item.criterion_uuid)
        .collect();
    assert_eq!(criteria, vec![significance.uuid, approach.uuid, innovation.uuid]);
}

#[test]
fn update_review_validates_scores_against_the_grant_scale() {
    let conn = common::setup();
    let org = organization(&conn, "Org");
    let owner = user(&conn, &org, OrganizationRole::Admin);
    let reviewer = user(&conn, &org, OrganizationRole::Basic);
    let grant = grant(&conn, &org, Some(&owner));
    let grants = SqliteGrantRepository::try_new(&conn).unwrap();
    let significance = grants.add_criterion(grant.uuid, "Significance").unwrap();
    let store = SqliteReviewRepository::try_new(&conn).unwrap();
    store.add_reviewer(grant.uuid, reviewer.uuid).unwrap();
    let submission = grants
        .create_submission(grant.uuid, owner.uuid, "Proposal")
        .unwrap();
    let (hooks, _, audit) = recording_hooks();
    let service = service(&conn, hooks);
    let review = service
        .create_review(&owner, submission.uuid, reviewer.uuid)
        .unwrap();
    service.open_for_editing(&owner, review.uuid).unwrap();

    let out_of_range = ReviewScores {
        overall_impact_score: Some(10),
        overall_impact_comment: None,
        criteria: Vec::new(),
    };
    let err = service
        .update_review(&owner, review.uuid, &out_of_range)
        .unwrap_err();
    assert!(matches!(
        err,
        CoreError::Validation(ValidationError::ScoreOutOfRange { score: 10, .. })
    ));

    let unknown_criterion = ReviewScores {
        overall_impact_score: Some(3),
        overall_impact_comment: None,
        criteria: vec![CriterionScore {
            criterion_uuid: uuid::Uuid::new_v4(),
            score: Some(2),
            comment: None,
        }],
    };
    assert!(matches!(
        service.update_review(&owner, review.uuid, &unknown_criterion),
        Err(CoreError::NotFound(_))
    ));
    let unchanged = store.get_review(review.uuid).unwrap().unwrap();
    assert_eq!(unchanged.overall_impact_score, None);

    let scores = ReviewScores {
        overall_impact_score: Some(2),
        overall_impact_comment: Some("Strong team".to_string()),
        criteria: vec![CriterionScore {
            criterion_uuid: significance.uuid,
            score: Some(1),
            comment: Some("Clear gap".to_string()),
        }],
    };
    let updated = service.update_review(&owner, review.uuid, &scores).unwrap();
    assert_eq!(updated.overall_impact_score, Some(2));
    let line = updated.criteria_review_for(significance.uuid).unwrap();
    assert_eq!(line.score, Some(1));
    assert_eq!(line.comment.as_deref(), Some("Clear gap"));
    // create, open (one line added), update
    assert_eq!(audit.entries.lock().unwrap().len(), 3);
}

#[test]
fn opening_audits_only_when_lines_are_added() {
    let conn = common::setup();
    let org = organization(&conn, "Org");
    let owner = user(&conn, &org, OrganizationRole::Admin);
    let reviewer = user(&conn, &org, OrganizationRole::Basic);
    let grant = grant(&conn, &org, Some(&owner));
    let grants = SqliteGrantRepository::try_new(&conn).unwrap();
    let significance = grants.add_criterion(grant.uuid, "Significance").unwrap();
    SqliteReviewRepository::try_new(&conn)
        .unwrap()
        .add_reviewer(grant.uuid, reviewer.uuid)
        .unwrap();
    let submission = grants
        .create_submission(grant.uuid, owner.uuid, "Proposal")
        .unwrap();
    let (hooks, _, audit) = recording_hooks();
    let service = service(&conn, hooks);
    let review = service
        .create_review(&owner, submission.uuid, reviewer.uuid)
        .unwrap();
    audit.entries.lock().unwrap().clear();

    service.open_for_editing(&owner, review.uuid).unwrap();
    {
        let entries = audit.entries.lock().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor_uuid, owner.uuid);
        assert_eq!(entries[0].entity, EntityRef::Review(review.uuid));
        let before = entries[0].before.as_ref().unwrap();
        let after = entries[0].after.as_ref().unwrap();
        assert_eq!(before["criteria_reviews"].as_array().unwrap().len(), 0);
        assert_eq!(
            after["criteria_reviews"][0]["criterion_uuid"],
            significance.uuid.to_string()
        );
    }

    service.open_for_editing(&owner, review.uuid).unwrap();
    assert_eq!(audit.entries.lock().unwrap().len(), 1);
}

#[test]
fn destroy_review_removes_only_that_review() {
    let conn = common::setup();
    let org = organization(&conn, "Org");
    let owner = user(&conn, &org, OrganizationRole::Admin);
    let editor = user(&conn, &org, OrganizationRole::Basic);
    let viewer = user(&conn, &org, OrganizationRole::Basic);
    let reviewer = user(&conn, &org, OrganizationRole::Basic);
    let grant = grant(&conn, &org, Some(&owner));
    assign(&conn, &grant, &editor, GrantRole::Editor);
    assign(&conn, &grant, &viewer, GrantRole::Viewer);
    let grants = SqliteGrantRepository::try_new(&conn).unwrap();
    grants.add_criterion(grant.uuid, "Significance").unwrap();
    let store = SqliteReviewRepository::try_new(&conn).unwrap();
    store.add_reviewer(grant.uuid, reviewer.uuid).unwrap();
    let first = grants.create_submission(grant.uuid, owner.uuid, "First").unwrap();
    let second = grants.create_submission(grant.uuid, owner.uuid, "Second").unwrap();
    let (hooks, notifier, _) = recording_hooks();
    let service = service(&conn, hooks);
    let doomed = service.create_review(&editor, first.uuid, reviewer.uuid).unwrap();
    let kept = service.create_review(&editor, second.uuid, reviewer.uuid).unwrap();
    service.open_for_editing(&editor, doomed.uuid).unwrap();

    assert!(matches!(
        service.destroy_review(&viewer, doomed.uuid),
        Err(CoreError::NotAuthorized { .. })
    ));
    assert!(service.get_review(&viewer, doomed.uuid).is_ok());

    let removed = service.destroy_review(&editor, doomed.uuid).unwrap();
    assert_eq!(removed.uuid, doomed.uuid);
    assert!(store.get_review(doomed.uuid).unwrap().is_none());
    assert!(store.get_review(kept.uuid).unwrap().is_some());
    assert_eq!(common::count(&conn, "criteria_reviews"), 0);
    assert_eq!(common::count(&conn, "grant_reviewers"), 1);

    let remaining = service
        .list_reviews(&viewer, grant.uuid, Some(reviewer.uuid))
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(notifier.events.lock().unwrap().contains(
        &NotificationEvent::ReviewUnassigned {
            review_uuid: doomed.uuid,
            reviewer_uuid: reviewer.uuid,
        }
    ));
}
