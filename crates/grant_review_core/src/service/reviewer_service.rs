//! Reviewer assignment and the reviewer-removal cascade.
//!
//! # Invariants
//! - `delete_reviewer` commits the reviewer record and all of their reviews
//!   on the grant together, or nothing.
//! - `ReviewerRemoved` is dispatched after commit; a failed dispatch does
//!   not roll anything back.

use crate::error::{CoreError, CoreResult};
use crate::events::{AuditEntry, Hooks, NotificationEvent};
use crate::model::entity::EntityRef;
use crate::model::grant::{GrantId, GrantReviewer, GrantReviewerId, User, UserId};
use crate::model::review::ReviewerRemoval;
use crate::policy::{Action, GrantRoleLookup, PolicyEngine, Resource};
use crate::repo::review_repo::ReviewStore;

pub struct ReviewerService<S: ReviewStore, L: GrantRoleLookup> {
    store: S,
    roles: L,
    hooks: Hooks,
}

impl<S: ReviewStore, L: GrantRoleLookup> ReviewerService<S, L> {
    pub fn new(store: S, roles: L, hooks: Hooks) -> Self {
        Self { store, roles, hooks }
    }

    pub fn list_reviewers(&self, actor: &User, grant_uuid: GrantId) -> CoreResult<Vec<GrantReviewer>> {
        self.policy()
            .require(actor, Action::Index, &reviewer_resource(grant_uuid, None))?;
        self.store.list_grant_reviewers(grant_uuid)
    }

    pub fn add_reviewer(
        &self,
        actor: &User,
        grant_uuid: GrantId,
        reviewer_uuid: UserId,
    ) -> CoreResult<GrantReviewer> {
        self.policy()
            .require(actor, Action::Create, &reviewer_resource(grant_uuid, None))?;
        let created = self.store.add_reviewer(grant_uuid, reviewer_uuid)?;
        self.hooks.audit(AuditEntry::now::<(), _>(
            actor.uuid,
            EntityRef::GrantReviewer(created.uuid),
            None,
            Some(&created),
        ));
        Ok(created)
    }

    /// Removes the reviewer from the grant together with every review they
    /// wrote for its submissions.
    pub fn delete_reviewer(
        &self,
        actor: &User,
        grant_reviewer_uuid: GrantReviewerId,
    ) -> CoreResult<ReviewerRemoval> {
        let grant_reviewer = self
            .store
            .get_grant_reviewer(grant_reviewer_uuid)?
            .ok_or(CoreError::NotFound(EntityRef::GrantReviewer(grant_reviewer_uuid)))?;
        self.policy().require(
            actor,
            Action::Destroy,
            &reviewer_resource(grant_reviewer.grant_uuid, Some(grant_reviewer_uuid)),
        )?;

        let removal = self.store.delete_reviewer(grant_reviewer_uuid)?;

        self.hooks.notify(NotificationEvent::ReviewerRemoved {
            grant_reviewer_uuid,
            grant_uuid: removal.grant_reviewer.grant_uuid,
            reviewer_uuid: removal.grant_reviewer.reviewer_uuid,
            removed_reviews: removal.removed_review_uuids.len(),
        });
        self.hooks.audit(AuditEntry::now::<_, ()>(
            actor.uuid,
            EntityRef::GrantReviewer(grant_reviewer_uuid),
            Some(&removal),
            None,
        ));
        Ok(removal)
    }

    fn policy(&self) -> PolicyEngine<'_, L> {
        PolicyEngine::new(&self.roles)
    }
}

fn reviewer_resource(grant_uuid: GrantId, grant_reviewer_uuid: Option<GrantReviewerId>) -> Resource {
    Resource::GrantReviewer {
        grant_uuid,
        grant_reviewer_uuid,
    }
}
