//! Review store: reviewer eligibility, reviews, criteria reviews, and the
//! reviewer-removal cascade.
//!
//! # Responsibility
//! - Persist `GrantReviewer`, `Review` and `CriteriaReview` records.
//! - Remove a reviewer together with every review they wrote on that grant
//!   as one atomic unit.
//!
//! # Invariants
//! - A review exists only for a reviewer assigned to the submission's grant.
//! - Opening a review for editing adds missing criteria reviews for current
//!   criteria and never duplicates or removes one.
//! - The cascade touches reviews of one grant only; any failed delete rolls
//!   back the whole unit.

use crate::db::migrations::ensure_connection_ready;
use crate::error::{AssignmentKind, CoreError, CoreResult};
use crate::model::entity::EntityRef;
use crate::model::grant::{
    CriterionId, GrantId, GrantReviewer, GrantReviewerId, Submission, SubmissionId, UserId,
};
use crate::model::review::{
    CriteriaReview, Review, ReviewId, ReviewOpening, ReviewScores, ReviewerRemoval,
};
use crate::repo::grant_repo::{list_criteria, load_grant, load_submission, load_user};
use crate::repo::role_repo::load_admin_snapshot;
use crate::repo::{parse_uuid, with_immediate_tx};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

const REVIEW_SELECT_SQL: &str = "SELECT
    r.uuid AS uuid,
    r.submission_uuid AS submission_uuid,
    s.grant_uuid AS grant_uuid,
    r.reviewer_uuid AS reviewer_uuid,
    r.assigner_uuid AS assigner_uuid,
    r.overall_impact_score AS overall_impact_score,
    r.overall_impact_comment AS overall_impact_comment
FROM reviews r
INNER JOIN submissions s ON s.uuid = r.submission_uuid";

pub trait ReviewStore {
    /// Fails with `DuplicateAssignment` when the user already reviews the grant.
    fn add_reviewer(&self, grant_uuid: GrantId, reviewer_uuid: UserId) -> CoreResult<GrantReviewer>;
    fn get_grant_reviewer(&self, id: GrantReviewerId) -> CoreResult<Option<GrantReviewer>>;
    fn list_grant_reviewers(&self, grant_uuid: GrantId) -> CoreResult<Vec<GrantReviewer>>;
    /// Deletes the reviewer's reviews on the grant and the reviewer record,
    /// all or nothing.
    fn delete_reviewer(&self, id: GrantReviewerId) -> CoreResult<ReviewerRemoval>;
    fn create_review(
        &self,
        submission_uuid: SubmissionId,
        reviewer_uuid: UserId,
        assigner_uuid: UserId,
    ) -> CoreResult<Review>;
    fn get_review(&self, id: ReviewId) -> CoreResult<Option<Review>>;
    fn get_submission(&self, id: SubmissionId) -> CoreResult<Option<Submission>>;
    /// Reviews on one grant, optionally narrowed to one reviewer.
    fn list_reviews(&self, grant_uuid: GrantId, reviewer_uuid: Option<UserId>)
        -> CoreResult<Vec<Review>>;
    /// Adds a blank criteria review for every current criterion the review
    /// lacks.
    fn open_for_editing(&self, id: ReviewId) -> CoreResult<ReviewOpening>;
    fn update_review(&self, id: ReviewId, scores: &ReviewScores) -> CoreResult<Review>;
    fn destroy_review(&self, id: ReviewId) -> CoreResult<Review>;
}

pub struct SqliteReviewRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteReviewRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> CoreResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl ReviewStore for SqliteReviewRepository<'_> {
    fn add_reviewer(&self, grant_uuid: GrantId, reviewer_uuid: UserId) -> CoreResult<GrantReviewer> {
        let grant_reviewer = with_immediate_tx(self.conn, "add_reviewer", |tx| {
            if load_grant(tx, grant_uuid)?.is_none() {
                return Err(CoreError::NotFound(EntityRef::Grant(grant_uuid)));
            }
            if load_user(tx, reviewer_uuid)?.is_none() {
                return Err(CoreError::NotFound(EntityRef::User(reviewer_uuid)));
            }
            if find_grant_reviewer(tx, grant_uuid, reviewer_uuid)?.is_some() {
                return Err(CoreError::DuplicateAssignment {
                    assignment: AssignmentKind::GrantReviewer,
                    scope: EntityRef::Grant(grant_uuid),
                    user_uuid: reviewer_uuid,
                });
            }

            let grant_reviewer = GrantReviewer {
                uuid: Uuid::new_v4(),
                grant_uuid,
                reviewer_uuid,
            };
            tx.execute(
                "INSERT INTO grant_reviewers (uuid, grant_uuid, reviewer_uuid)
                 VALUES (?1, ?2, ?3);",
                params![
                    grant_reviewer.uuid.to_string(),
                    grant_uuid.to_string(),
                    reviewer_uuid.to_string(),
                ],
            )?;
            Ok(grant_reviewer)
        })?;

        info!(
            "event=reviewer_add module=review_store status=ok grant_uuid={} grant_reviewer_uuid={}",
            grant_reviewer.grant_uuid, grant_reviewer.uuid
        );
        Ok(grant_reviewer)
    }

    fn get_grant_reviewer(&self, id: GrantReviewerId) -> CoreResult<Option<GrantReviewer>> {
        load_grant_reviewer(self.conn, id)
    }

    fn list_grant_reviewers(&self, grant_uuid: GrantId) -> CoreResult<Vec<GrantReviewer>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, grant_uuid, reviewer_uuid
             FROM grant_reviewers
             WHERE grant_uuid = ?1
             ORDER BY created_at ASC, uuid ASC;",
        )?;
        let mut rows = stmt.query([grant_uuid.to_string()])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_grant_reviewer_row(row)?);
        }
        Ok(items)
    }

    fn delete_reviewer(&self, id: GrantReviewerId) -> CoreResult<ReviewerRemoval> {
        let removal = with_immediate_tx(self.conn, "delete_reviewer", |tx| {
            let grant_reviewer = load_grant_reviewer(tx, id)?
                .ok_or(CoreError::NotFound(EntityRef::GrantReviewer(id)))?;

            let review_uuids = list_review_uuids_by_reviewer(
                tx,
                grant_reviewer.grant_uuid,
                grant_reviewer.reviewer_uuid,
            )?;
            for review_uuid in &review_uuids {
                delete_review_rows(tx, *review_uuid)?;
            }

            let changed = tx.execute(
                "DELETE FROM grant_reviewers WHERE uuid = ?1;",
                [id.to_string()],
            )?;
            if changed == 0 {
                return Err(CoreError::NotFound(EntityRef::GrantReviewer(id)));
            }

            load_admin_snapshot(tx, grant_reviewer.grant_uuid)?.verify()?;
            Ok(ReviewerRemoval {
                grant_reviewer,
                removed_review_uuids: review_uuids,
            })
        })?;

        info!(
            "event=reviewer_delete module=review_store status=ok grant_uuid={} grant_reviewer_uuid={} removed_reviews={}",
            removal.grant_reviewer.grant_uuid,
            removal.grant_reviewer.uuid,
            removal.removed_review_uuids.len()
        );
        Ok(removal)
    }

    fn create_review(
        &self,
        submission_uuid: SubmissionId,
        reviewer_uuid: UserId,
        assigner_uuid: UserId,
    ) -> CoreResult<Review> {
        let review = with_immediate_tx(self.conn, "create_review", |tx| {
            let submission = load_submission(tx, submission_uuid)?
                .ok_or(CoreError::NotFound(EntityRef::Submission(submission_uuid)))?;
            for user_uuid in [reviewer_uuid, assigner_uuid] {
                if load_user(tx, user_uuid)?.is_none() {
                    return Err(CoreError::NotFound(EntityRef::User(user_uuid)));
                }
            }
            if find_grant_reviewer(tx, submission.grant_uuid, reviewer_uuid)?.is_none() {
                return Err(CoreError::NotAssignedAsReviewer {
                    grant_uuid: submission.grant_uuid,
                    reviewer_uuid,
                });
            }

            let existing: Option<String> = tx
                .query_row(
                    "SELECT uuid FROM reviews WHERE submission_uuid = ?1 AND reviewer_uuid = ?2;",
                    params![submission_uuid.to_string(), reviewer_uuid.to_string()],
                    |row| row.get(0),
                )
                .optional()?;
            if existing.is_some() {
                return Err(CoreError::DuplicateAssignment {
                    assignment: AssignmentKind::Review,
                    scope: EntityRef::Submission(submission_uuid),
                    user_uuid: reviewer_uuid,
                });
            }

            let review_uuid = Uuid::new_v4();
            tx.execute(
                "INSERT INTO reviews (uuid, submission_uuid, reviewer_uuid, assigner_uuid)
                 VALUES (?1, ?2, ?3, ?4);",
                params![
                    review_uuid.to_string(),
                    submission_uuid.to_string(),
                    reviewer_uuid.to_string(),
                    assigner_uuid.to_string(),
                ],
            )?;
            load_required_review(tx, review_uuid)
        })?;

        info!(
            "event=review_create module=review_store status=ok grant_uuid={} review_uuid={}",
            review.grant_uuid, review.uuid
        );
        Ok(review)
    }

    fn get_review(&self, id: ReviewId) -> CoreResult<Option<Review>> {
        load_review(self.conn, id)
    }

    fn get_submission(&self, id: SubmissionId) -> CoreResult<Option<Submission>> {
        load_submission(self.conn, id)
    }

    fn list_reviews(
        &self,
        grant_uuid: GrantId,
        reviewer_uuid: Option<UserId>,
    ) -> CoreResult<Vec<Review>> {
        let mut stmt = self.conn.prepare(&format!(
            "{REVIEW_SELECT_SQL}
             WHERE s.grant_uuid = ?1
               AND (?2 IS NULL OR r.reviewer_uuid = ?2)
             ORDER BY r.created_at ASC, r.uuid ASC;"
        ))?;
        let mut rows = stmt.query(params![
            grant_uuid.to_string(),
            reviewer_uuid.map(|value| value.to_string()),
        ])?;
        let mut reviews = Vec::new();
        while let Some(row) = rows.next()? {
            reviews.push(parse_review_row(row)?);
        }
        drop(rows);

        for review in &mut reviews {
            review.criteria_reviews = list_criteria_reviews(self.conn, review.uuid)?;
        }
        Ok(reviews)
    }

    fn open_for_editing(&self, id: ReviewId) -> CoreResult<ReviewOpening> {
        let opening = with_immediate_tx(self.conn, "open_for_editing", |tx| {
            let before = load_required_review(tx, id)?;
            let mut created_lines = 0usize;
            for criterion in list_criteria(tx, before.grant_uuid, false)? {
                if before.criteria_review_for(criterion.uuid).is_none() {
                    insert_criteria_review(tx, before.uuid, criterion.uuid)?;
                    created_lines += 1;
                }
            }
            let after = if created_lines > 0 {
                load_required_review(tx, id)?
            } else {
                before.clone()
            };
            Ok(ReviewOpening {
                before,
                after,
                created_lines,
            })
        })?;

        if opening.created_lines > 0 {
            info!(
                "event=review_open module=review_store status=ok review_uuid={} created_criteria_reviews={}",
                id, opening.created_lines
            );
        }
        Ok(opening)
    }

    fn update_review(&self, id: ReviewId, scores: &ReviewScores) -> CoreResult<Review> {
        let review = with_immediate_tx(self.conn, "update_review", |tx| {
            let review = load_required_review(tx, id)?;
            let grant = load_grant(tx, review.grant_uuid)?
                .ok_or(CoreError::NotFound(EntityRef::Grant(review.grant_uuid)))?;
            scores.validate(&grant.score_scale)?;

            for item in &scores.criteria {
                let existing = review
                    .criteria_review_for(item.criterion_uuid)
                    .ok_or(CoreError::NotFound(EntityRef::Criterion(item.criterion_uuid)))?;
                tx.execute(
                    "UPDATE criteria_reviews
                     SET score = ?2,
                         comment = ?3,
                         updated_at = (strftime('%s', 'now') * 1000)
                     WHERE uuid = ?1;",
                    params![existing.uuid.to_string(), item.score, item.comment],
                )?;
            }

            tx.execute(
                "UPDATE reviews
                 SET overall_impact_score = ?2,
                     overall_impact_comment = ?3,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE uuid = ?1;",
                params![
                    id.to_string(),
                    scores.overall_impact_score,
                    scores.overall_impact_comment,
                ],
            )?;
            load_required_review(tx, id)
        })?;

        info!(
            "event=review_update module=review_store status=ok review_uuid={} criteria={}",
            review.uuid,
            scores.criteria.len()
        );
        Ok(review)
    }

    fn destroy_review(&self, id: ReviewId) -> CoreResult<Review> {
        let review = with_immediate_tx(self.conn, "destroy_review", |tx| {
            let review = load_required_review(tx, id)?;
            delete_review_rows(tx, id)?;
            Ok(review)
        })?;

        info!(
            "event=review_destroy module=review_store status=ok grant_uuid={} review_uuid={}",
            review.grant_uuid, review.uuid
        );
        Ok(review)
    }
}

fn delete_review_rows(conn: &Connection, review_uuid: ReviewId) -> CoreResult<()> {
    conn.execute(
        "DELETE FROM criteria_reviews WHERE review_uuid = ?1;",
        [review_uuid.to_string()],
    )?;
    let changed = conn.execute("DELETE FROM reviews WHERE uuid = ?1;", [review_uuid.to_string()])?;
    if changed == 0 {
        return Err(CoreError::NotFound(EntityRef::Review(review_uuid)));
    }
    Ok(())
}

/// Blank criteria review: no score, no comment.
fn insert_criteria_review(
    conn: &Connection,
    review_uuid: ReviewId,
    criterion_uuid: CriterionId,
) -> CoreResult<()> {
    conn.execute(
        "INSERT INTO criteria_reviews (uuid, review_uuid, criterion_uuid)
         VALUES (?1, ?2, ?3);",
        params![
            Uuid::new_v4().to_string(),
            review_uuid.to_string(),
            criterion_uuid.to_string(),
        ],
    )?;
    Ok(())
}

fn list_review_uuids_by_reviewer(
    conn: &Connection,
    grant_uuid: GrantId,
    reviewer_uuid: UserId,
) -> CoreResult<Vec<ReviewId>> {
    let mut stmt = conn.prepare(
        "SELECT r.uuid
         FROM reviews r
         INNER JOIN submissions s ON s.uuid = r.submission_uuid
         WHERE s.grant_uuid = ?1
           AND r.reviewer_uuid = ?2
         ORDER BY r.created_at ASC, r.uuid ASC;",
    )?;
    let mut rows = stmt.query(params![grant_uuid.to_string(), reviewer_uuid.to_string()])?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, "reviews.uuid")?);
    }
    Ok(ids)
}

fn find_grant_reviewer(
    conn: &Connection,
    grant_uuid: GrantId,
    reviewer_uuid: UserId,
) -> CoreResult<Option<GrantReviewer>> {
    let mut stmt = conn.prepare(
        "SELECT uuid, grant_uuid, reviewer_uuid
         FROM grant_reviewers
         WHERE grant_uuid = ?1
           AND reviewer_uuid = ?2;",
    )?;
    let mut rows = stmt.query(params![grant_uuid.to_string(), reviewer_uuid.to_string()])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_grant_reviewer_row(row)?)),
        None => Ok(None),
    }
}

fn load_grant_reviewer(conn: &Connection, id: GrantReviewerId) -> CoreResult<Option<GrantReviewer>> {
    let mut stmt = conn.prepare(
        "SELECT uuid, grant_uuid, reviewer_uuid
         FROM grant_reviewers
         WHERE uuid = ?1;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    match rows.next()? {
        Some(row) => Ok(Some(parse_grant_reviewer_row(row)?)),
        None => Ok(None),
    }
}

fn load_required_review(conn: &Connection, id: ReviewId) -> CoreResult<Review> {
    load_review(conn, id)?.ok_or(CoreError::NotFound(EntityRef::Review(id)))
}

fn load_review(conn: &Connection, id: ReviewId) -> CoreResult<Option<Review>> {
    let mut stmt = conn.prepare(&format!("{REVIEW_SELECT_SQL} WHERE r.uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let mut review = parse_review_row(row)?;
    review.criteria_reviews = list_criteria_reviews(conn, id)?;
    Ok(Some(review))
}

fn list_criteria_reviews(conn: &Connection, review_uuid: ReviewId) -> CoreResult<Vec<CriteriaReview>> {
    let mut stmt = conn.prepare(
        "SELECT
            cr.uuid AS uuid,
            cr.review_uuid AS review_uuid,
            cr.criterion_uuid AS criterion_uuid,
            cr.score AS score,
            cr.comment AS comment
         FROM criteria_reviews cr
         INNER JOIN criteria c ON c.uuid = cr.criterion_uuid
         WHERE cr.review_uuid = ?1
         ORDER BY c.sort_order ASC, cr.uuid ASC;",
    )?;
    let mut rows = stmt.query([review_uuid.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(CriteriaReview {
            uuid: parse_uuid(&row.get::<_, String>("uuid")?, "criteria_reviews.uuid")?,
            review_uuid: parse_uuid(
                &row.get::<_, String>("review_uuid")?,
                "criteria_reviews.review_uuid",
            )?,
            criterion_uuid: parse_uuid(
                &row.get::<_, String>("criterion_uuid")?,
                "criteria_reviews.criterion_uuid",
            )?,
            score: row.get("score")?,
            comment: row.get("comment")?,
        });
    }
    Ok(items)
}

fn parse_review_row(row: &Row<'_>) -> CoreResult<Review> {
    Ok(Review {
        uuid: parse_uuid(&row.get::<_, String>("uuid")?, "reviews.uuid")?,
        submission_uuid: parse_uuid(
            &row.get::<_, String>("submission_uuid")?,
            "reviews.submission_uuid",
        )?,
        grant_uuid: parse_uuid(&row.get::<_, String>("grant_uuid")?, "submissions.grant_uuid")?,
        reviewer_uuid: parse_uuid(
            &row.get::<_, String>("reviewer_uuid")?,
            "reviews.reviewer_uuid",
        )?,
        assigner_uuid: parse_uuid(
            &row.get::<_, String>("assigner_uuid")?,
            "reviews.assigner_uuid",
        )?,
        overall_impact_score: row.get("overall_impact_score")?,
        overall_impact_comment: row.get("overall_impact_comment")?,
        criteria_reviews: Vec::new(),
    })
}

fn parse_grant_reviewer_row(row: &Row<'_>) -> CoreResult<GrantReviewer> {
    Ok(GrantReviewer {
        uuid: parse_uuid(&row.get::<_, String>("uuid")?, "grant_reviewers.uuid")?,
        grant_uuid: parse_uuid(
            &row.get::<_, String>("grant_uuid")?,
            "grant_reviewers.grant_uuid",
        )?,
        reviewer_uuid: parse_uuid(
            &row.get::<_, String>("reviewer_uuid")?,
            "grant_reviewers.reviewer_uuid",
        )?,
    })
}
