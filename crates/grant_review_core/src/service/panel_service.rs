//! Panel scheduling use-case service.

use crate::error::{CoreError, CoreResult};
use crate::events::{AuditEntry, Hooks};
use crate::model::entity::EntityRef;
use crate::model::grant::{GrantId, User};
use crate::model::panel::{Panel, PanelUpdate};
use crate::policy::{Action, GrantRoleLookup, PolicyEngine, Resource};
use crate::repo::panel_repo::PanelStore;

pub struct PanelService<S: PanelStore, L: GrantRoleLookup> {
    store: S,
    roles: L,
    hooks: Hooks,
}

impl<S: PanelStore, L: GrantRoleLookup> PanelService<S, L> {
    pub fn new(store: S, roles: L, hooks: Hooks) -> Self {
        Self { store, roles, hooks }
    }

    pub fn get_panel(&self, actor: &User, grant_uuid: GrantId) -> CoreResult<Panel> {
        self.policy()
            .require(actor, Action::Show, &Resource::Panel(grant_uuid))?;
        self.store
            .get_panel(grant_uuid)?
            .ok_or(CoreError::NotFound(EntityRef::Panel(grant_uuid)))
    }

    /// Rejects the whole update on the first failed constraint; the stored
    /// panel is then untouched.
    pub fn update_panel(
        &self,
        actor: &User,
        grant_uuid: GrantId,
        update: &PanelUpdate,
    ) -> CoreResult<Panel> {
        self.policy()
            .require(actor, Action::Update, &Resource::Panel(grant_uuid))?;
        let change = self.store.update_panel(grant_uuid, update, actor.uuid)?;
        self.hooks.audit(AuditEntry::now(
            actor.uuid,
            EntityRef::Panel(grant_uuid),
            Some(&change.before),
            Some(&change.after),
        ));
        Ok(change.after)
    }

    fn policy(&self) -> PolicyEngine<'_, L> {
        PolicyEngine::new(&self.roles)
    }
}
