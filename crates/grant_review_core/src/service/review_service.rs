//! Review assignment use-case service.
//!
//! # Responsibility
//! - Assign a submission to an eligible reviewer and remove single reviews.
//! - Keep a review's criteria lines in step with the grant's criteria when
//!   it is opened for editing.
//!
//! # Invariants
//! - Mutations follow the grant edit rule; reads are open to any actor.
//! - `ReviewAssigned` / `ReviewUnassigned` go out only after commit.

use crate::error::{CoreError, CoreResult};
use crate::events::{AuditEntry, Hooks, NotificationEvent};
use crate::model::entity::EntityRef;
use crate::model::grant::{GrantId, SubmissionId, User, UserId};
use crate::model::review::{Review, ReviewId, ReviewScores};
use crate::policy::{Action, GrantRoleLookup, PolicyEngine, Resource};
use crate::repo::review_repo::ReviewStore;

pub struct ReviewService<S: ReviewStore, L: GrantRoleLookup> {
    store: S,
    roles: L,
    hooks: Hooks,
}

impl<S: ReviewStore, L: GrantRoleLookup> ReviewService<S, L> {
    pub fn new(store: S, roles: L, hooks: Hooks) -> Self {
        Self { store, roles, hooks }
    }

    /// Fails with `NotAssignedAsReviewer` unless `reviewer_uuid` reviews the
    /// submission's grant.
    pub fn create_review(
        &self,
        actor: &User,
        submission_uuid: SubmissionId,
        reviewer_uuid: UserId,
    ) -> CoreResult<Review> {
        let submission = self
            .store
            .get_submission(submission_uuid)?
            .ok_or(CoreError::NotFound(EntityRef::Submission(submission_uuid)))?;
        self.policy().require(
            actor,
            Action::Create,
            &review_resource(submission.grant_uuid, None),
        )?;

        let review = self
            .store
            .create_review(submission_uuid, reviewer_uuid, actor.uuid)?;

        self.hooks.notify(NotificationEvent::ReviewAssigned {
            review_uuid: review.uuid,
            reviewer_uuid: review.reviewer_uuid,
        });
        self.hooks.audit(AuditEntry::now::<(), _>(
            actor.uuid,
            EntityRef::Review(review.uuid),
            None,
            Some(&review),
        ));
        Ok(review)
    }

    pub fn get_review(&self, actor: &User, review_uuid: ReviewId) -> CoreResult<Review> {
        let review = self.load(review_uuid)?;
        self.policy().require(
            actor,
            Action::Show,
            &review_resource(review.grant_uuid, Some(review_uuid)),
        )?;
        Ok(review)
    }

    pub fn list_reviews(
        &self,
        actor: &User,
        grant_uuid: GrantId,
        reviewer_uuid: Option<UserId>,
    ) -> CoreResult<Vec<Review>> {
        self.policy()
            .require(actor, Action::Index, &review_resource(grant_uuid, None))?;
        self.store.list_reviews(grant_uuid, reviewer_uuid)
    }

    /// Adds a blank criteria line for every current criterion the review
    /// does not score yet. Audited only when a line was added.
    pub fn open_for_editing(&self, actor: &User, review_uuid: ReviewId) -> CoreResult<Review> {
        let review = self.load(review_uuid)?;
        self.policy().require(
            actor,
            Action::Edit,
            &review_resource(review.grant_uuid, Some(review_uuid)),
        )?;
        let opening = self.store.open_for_editing(review_uuid)?;
        if opening.created_lines > 0 {
            self.hooks.audit(AuditEntry::now(
                actor.uuid,
                EntityRef::Review(review_uuid),
                Some(&opening.before),
                Some(&opening.after),
            ));
        }
        Ok(opening.after)
    }

    pub fn update_review(
        &self,
        actor: &User,
        review_uuid: ReviewId,
        scores: &ReviewScores,
    ) -> CoreResult<Review> {
        let before = self.load(review_uuid)?;
        self.policy().require(
            actor,
            Action::Update,
            &review_resource(before.grant_uuid, Some(review_uuid)),
        )?;
        let after = self.store.update_review(review_uuid, scores)?;
        self.hooks.audit(AuditEntry::now(
            actor.uuid,
            EntityRef::Review(review_uuid),
            Some(&before),
            Some(&after),
        ));
        Ok(after)
    }

    pub fn destroy_review(&self, actor: &User, review_uuid: ReviewId) -> CoreResult<Review> {
        let review = self.load(review_uuid)?;
        self.policy().require(
            actor,
            Action::Destroy,
            &review_resource(review.grant_uuid, Some(review_uuid)),
        )?;

        let removed = self.store.destroy_review(review_uuid)?;

        self.hooks.notify(NotificationEvent::ReviewUnassigned {
            review_uuid: removed.uuid,
            reviewer_uuid: removed.reviewer_uuid,
        });
        self.hooks.audit(AuditEntry::now::<_, ()>(
            actor.uuid,
            EntityRef::Review(review_uuid),
            Some(&removed),
            None,
        ));
        Ok(removed)
    }

    fn load(&self, review_uuid: ReviewId) -> CoreResult<Review> {
        self.store
            .get_review(review_uuid)?
            .ok_or(CoreError::NotFound(EntityRef::Review(review_uuid)))
    }

    fn policy(&self) -> PolicyEngine<'_, L> {
        PolicyEngine::new(&self.roles)
    }
}

fn review_resource(grant_uuid: GrantId, review_uuid: Option<ReviewId>) -> Resource {
    Resource::Review {
        grant_uuid,
        review_uuid,
    }
}
