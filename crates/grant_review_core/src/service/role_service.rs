//! Role assignment use-case service.
//!
//! Every action on a grant's role assignments, listing included, requires
//! `admin` or `editor` on that grant. The last-admin check itself lives in
//! the store transaction, not here.

use crate::error::{CoreError, CoreResult};
use crate::events::{AuditEntry, Hooks};
use crate::model::entity::EntityRef;
use crate::model::grant::{GrantId, GrantUser, GrantUserId, User, UserId};
use crate::model::role::GrantRole;
use crate::policy::{Action, GrantRoleLookup, PolicyEngine, Resource};
use crate::repo::role_repo::RoleStore;

pub struct RoleService<S: RoleStore + GrantRoleLookup> {
    store: S,
    hooks: Hooks,
}

impl<S: RoleStore + GrantRoleLookup> RoleService<S> {
    pub fn new(store: S, hooks: Hooks) -> Self {
        Self { store, hooks }
    }

    pub fn list_grant_users(&self, actor: &User, grant_uuid: GrantId) -> CoreResult<Vec<GrantUser>> {
        self.policy()
            .require(actor, Action::Index, &grant_user_resource(grant_uuid, None))?;
        self.store.list_grant_users(grant_uuid)
    }

    pub fn assign_role(
        &self,
        actor: &User,
        grant_uuid: GrantId,
        user_uuid: UserId,
        role: GrantRole,
    ) -> CoreResult<GrantUser> {
        self.policy()
            .require(actor, Action::Create, &grant_user_resource(grant_uuid, None))?;
        let created = self.store.assign_role(grant_uuid, user_uuid, role)?;
        self.hooks.audit(AuditEntry::now::<(), _>(
            actor.uuid,
            EntityRef::GrantUser(created.uuid),
            None,
            Some(&created),
        ));
        Ok(created)
    }

    pub fn change_role(
        &self,
        actor: &User,
        grant_user_uuid: GrantUserId,
        role: GrantRole,
    ) -> CoreResult<GrantUser> {
        let before = self.load(grant_user_uuid)?;
        self.policy().require(
            actor,
            Action::Update,
            &grant_user_resource(before.grant_uuid, Some(grant_user_uuid)),
        )?;
        let after = self.store.change_role(grant_user_uuid, role)?;
        self.hooks.audit(AuditEntry::now(
            actor.uuid,
            EntityRef::GrantUser(grant_user_uuid),
            Some(&before),
            Some(&after),
        ));
        Ok(after)
    }

    pub fn remove_role(&self, actor: &User, grant_user_uuid: GrantUserId) -> CoreResult<GrantUser> {
        let current = self.load(grant_user_uuid)?;
        self.policy().require(
            actor,
            Action::Destroy,
            &grant_user_resource(current.grant_uuid, Some(grant_user_uuid)),
        )?;
        let removed = self.store.remove_role(grant_user_uuid)?;
        self.hooks.audit(AuditEntry::now::<_, ()>(
            actor.uuid,
            EntityRef::GrantUser(grant_user_uuid),
            Some(&removed),
            None,
        ));
        Ok(removed)
    }

    fn load(&self, grant_user_uuid: GrantUserId) -> CoreResult<GrantUser> {
        self.store
            .get_grant_user(grant_user_uuid)?
            .ok_or(CoreError::NotFound(EntityRef::GrantUser(grant_user_uuid)))
    }

    fn policy(&self) -> PolicyEngine<'_, S> {
        PolicyEngine::new(&self.store)
    }
}

fn grant_user_resource(grant_uuid: GrantId, grant_user_uuid: Option<GrantUserId>) -> Resource {
    Resource::GrantUser {
        grant_uuid,
        grant_user_uuid,
    }
}
