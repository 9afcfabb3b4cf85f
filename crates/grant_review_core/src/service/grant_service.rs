//! Grant use-case service.
//!
//! # Responsibility
//! - Create grants on behalf of organization admins.
//! - Maintain a grant's criteria and submissions behind the grant edit rule.
//!
//! # Invariants
//! - A grant created here starts with its creator as the only admin.

use crate::error::{CoreError, CoreResult};
use crate::events::{AuditEntry, Hooks};
use crate::model::entity::EntityRef;
use crate::model::grant::{Criterion, CriterionId, Grant, GrantId, NewGrant, Submission, User, UserId};
use crate::policy::{Action, GrantRoleLookup, PolicyEngine, Resource};
use crate::repo::grant_repo::GrantRepository;

pub struct GrantService<R: GrantRepository, L: GrantRoleLookup> {
    repo: R,
    roles: L,
    hooks: Hooks,
}

impl<R: GrantRepository, L: GrantRoleLookup> GrantService<R, L> {
    pub fn new(repo: R, roles: L, hooks: Hooks) -> Self {
        Self { repo, roles, hooks }
    }

    /// Creates the grant, its empty panel and an `admin` role for `actor`.
    pub fn create_grant(&self, actor: &User, grant: &NewGrant) -> CoreResult<Grant> {
        self.policy().require(
            actor,
            Action::Create,
            &Resource::NewGrant {
                organization_uuid: grant.organization_uuid,
            },
        )?;
        let created = self.repo.create_grant(grant, Some(actor.uuid))?;
        self.hooks.audit(AuditEntry::now::<(), _>(
            actor.uuid,
            EntityRef::Grant(created.grant.uuid),
            None,
            Some(&created.grant),
        ));
        if let Some(admin) = &created.initial_admin {
            self.hooks.audit(AuditEntry::now::<(), _>(
                actor.uuid,
                EntityRef::GrantUser(admin.uuid),
                None,
                Some(admin),
            ));
        }
        Ok(created.grant)
    }

    pub fn get_grant(&self, actor: &User, grant_uuid: GrantId) -> CoreResult<Grant> {
        self.policy()
            .require(actor, Action::Show, &Resource::Grant(grant_uuid))?;
        self.repo
            .get_grant(grant_uuid)?
            .ok_or(CoreError::NotFound(EntityRef::Grant(grant_uuid)))
    }

    pub fn list_criteria(&self, actor: &User, grant_uuid: GrantId) -> CoreResult<Vec<Criterion>> {
        self.policy()
            .require(actor, Action::Show, &Resource::Grant(grant_uuid))?;
        self.repo.list_criteria(grant_uuid, false)
    }

    pub fn add_criterion(&self, actor: &User, grant_uuid: GrantId, name: &str) -> CoreResult<Criterion> {
        self.policy()
            .require(actor, Action::Update, &Resource::Grant(grant_uuid))?;
        let criterion = self.repo.add_criterion(grant_uuid, name)?;
        self.hooks.audit(AuditEntry::now::<(), _>(
            actor.uuid,
            EntityRef::Criterion(criterion.uuid),
            None,
            Some(&criterion),
        ));
        Ok(criterion)
    }

    /// Retires a criterion; reviews that already score it keep their line.
    pub fn retire_criterion(
        &self,
        actor: &User,
        grant_uuid: GrantId,
        criterion_uuid: CriterionId,
    ) -> CoreResult<()> {
        self.policy()
            .require(actor, Action::Update, &Resource::Grant(grant_uuid))?;
        let criterion = self
            .repo
            .list_criteria(grant_uuid, false)?
            .into_iter()
            .find(|item| item.uuid == criterion_uuid)
            .ok_or(CoreError::NotFound(EntityRef::Criterion(criterion_uuid)))?;
        self.repo.retire_criterion(criterion_uuid)?;
        self.hooks.audit(AuditEntry::now::<_, ()>(
            actor.uuid,
            EntityRef::Criterion(criterion_uuid),
            Some(&criterion),
            None,
        ));
        Ok(())
    }

    pub fn create_submission(
        &self,
        actor: &User,
        grant_uuid: GrantId,
        applicant_uuid: UserId,
        title: &str,
    ) -> CoreResult<Submission> {
        self.policy()
            .require(actor, Action::Update, &Resource::Grant(grant_uuid))?;
        let submission = self.repo.create_submission(grant_uuid, applicant_uuid, title)?;
        self.hooks.audit(AuditEntry::now::<(), _>(
            actor.uuid,
            EntityRef::Submission(submission.uuid),
            None,
            Some(&submission),
        ));
        Ok(submission)
    }

    fn policy(&self) -> PolicyEngine<'_, L> {
        PolicyEngine::new(&self.roles)
    }
}
