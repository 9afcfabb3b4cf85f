//! Policy engine: (actor, action, resource) -> allow | deny.
//!
//! # Responsibility
//! - Map every (resource kind, action) pair to exactly one rule.
//! - Resolve the actor's grant role only when the rule needs it.
//!
//! # Invariants
//! - The actor is always passed explicitly; there is no ambient session.
//! - A deny is reported as `CoreError::NotAuthorized` and nothing else.
//! - Organization membership is not compared with the grant's organization:
//!   any organization admin may create a grant for any organization.

use crate::error::{CoreError, CoreResult};
use crate::model::grant::{GrantId, GrantReviewerId, GrantUserId, OrganizationId, User, UserId};
use crate::model::review::ReviewId;
use crate::model::role::{GrantRole, OrganizationRole};
use log::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Index,
    Show,
    New,
    Create,
    Edit,
    Update,
    Destroy,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Index => "index",
            Self::Show => "show",
            Self::New => "new",
            Self::Create => "create",
            Self::Edit => "edit",
            Self::Update => "update",
            Self::Destroy => "destroy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Grant,
    Panel,
    Review,
    GrantReviewer,
    GrantUser,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grant => "grant",
            Self::Panel => "panel",
            Self::Review => "review",
            Self::GrantReviewer => "grant_reviewer",
            Self::GrantUser => "grant_user",
        }
    }
}

/// Target of an authorization check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    /// A grant that does not exist yet.
    NewGrant { organization_uuid: OrganizationId },
    Grant(GrantId),
    Panel(GrantId),
    Review {
        grant_uuid: GrantId,
        review_uuid: Option<ReviewId>,
    },
    GrantReviewer {
        grant_uuid: GrantId,
        grant_reviewer_uuid: Option<GrantReviewerId>,
    },
    GrantUser {
        grant_uuid: GrantId,
        grant_user_uuid: Option<GrantUserId>,
    },
}

impl Resource {
    pub fn kind(&self) -> &'static str {
        self.resource_kind().as_str()
    }

    pub fn resource_kind(&self) -> ResourceKind {
        match self {
            Self::NewGrant { .. } | Self::Grant(_) => ResourceKind::Grant,
            Self::Panel(_) => ResourceKind::Panel,
            Self::Review { .. } => ResourceKind::Review,
            Self::GrantReviewer { .. } => ResourceKind::GrantReviewer,
            Self::GrantUser { .. } => ResourceKind::GrantUser,
        }
    }

    /// Grant whose role assignments decide grant-scoped rules.
    pub fn grant_uuid(&self) -> Option<GrantId> {
        match self {
            Self::NewGrant { .. } => None,
            Self::Grant(grant_uuid) | Self::Panel(grant_uuid) => Some(*grant_uuid),
            Self::Review { grant_uuid, .. }
            | Self::GrantReviewer { grant_uuid, .. }
            | Self::GrantUser { grant_uuid, .. } => Some(*grant_uuid),
        }
    }
}

/// Rule selected for one (resource kind, action) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    /// Any authenticated actor.
    AnyActor,
    /// Actor's organization role is `admin`.
    OrganizationAdmin,
    /// Actor holds `admin` or `editor` on the resource's grant.
    GrantEditor,
    Deny,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Self::Allow
    }
}

/// Dispatch table for every supported (resource, action) pair.
pub fn rule_for(resource: &Resource, action: Action) -> Rule {
    use Action::*;

    match (resource, action) {
        (Resource::NewGrant { .. }, New | Create) => Rule::OrganizationAdmin,
        (Resource::NewGrant { .. }, _) => Rule::Deny,
        (Resource::Grant(_), Index | Show) => Rule::AnyActor,
        (Resource::Grant(_), New | Create) => Rule::OrganizationAdmin,
        (Resource::Grant(_), Edit | Update | Destroy) => Rule::GrantEditor,
        (Resource::Panel(_) | Resource::Review { .. }, Index | Show) => Rule::AnyActor,
        (Resource::Panel(_) | Resource::Review { .. }, _) => Rule::GrantEditor,
        (Resource::GrantReviewer { .. } | Resource::GrantUser { .. }, _) => Rule::GrantEditor,
    }
}

/// Pure decision over an already resolved grant role.
pub fn decide(actor: &User, rule: Rule, grant_role: Option<GrantRole>) -> Decision {
    let allowed = match rule {
        Rule::AnyActor => true,
        Rule::OrganizationAdmin => actor.organization_role == OrganizationRole::Admin,
        Rule::GrantEditor => grant_role.is_some_and(GrantRole::can_edit),
        Rule::Deny => false,
    };
    if allowed {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// Source of per-grant role assignments consulted by the policy engine.
pub trait GrantRoleLookup {
    fn grant_role(&self, grant_uuid: GrantId, user_uuid: UserId) -> CoreResult<Option<GrantRole>>;
}

/// Authorization front door used by every service before it mutates.
pub struct PolicyEngine<'a, L: GrantRoleLookup + ?Sized> {
    roles: &'a L,
}

impl<'a, L: GrantRoleLookup + ?Sized> PolicyEngine<'a, L> {
    pub fn new(roles: &'a L) -> Self {
        Self { roles }
    }

    /// Evaluates the rule for `(resource, action)` against `actor`.
    pub fn authorize(&self, actor: &User, action: Action, resource: &Resource) -> CoreResult<Decision> {
        let rule = rule_for(resource, action);
        let grant_role = match (rule, resource.grant_uuid()) {
            (Rule::GrantEditor, Some(grant_uuid)) => {
                self.roles.grant_role(grant_uuid, actor.uuid)?
            }
            _ => None,
        };
        Ok(decide(actor, rule, grant_role))
    }

    /// Like [`Self::authorize`], turning a deny into `NotAuthorized`.
    pub fn require(&self, actor: &User, action: Action, resource: &Resource) -> CoreResult<()> {
        if self.authorize(actor, action, resource)?.is_allowed() {
            return Ok(());
        }
        warn!(
            "event=authorize module=policy status=denied actor_uuid={} action={} resource={} grant_uuid={}",
            actor.uuid,
            action.as_str(),
            resource.kind(),
            resource
                .grant_uuid()
                .map(|id| id.to_string())
                .unwrap_or_else(|| "none".to_string())
        );
        Err(CoreError::NotAuthorized {
            actor_uuid: actor.uuid,
            action,
            resource: *resource,
        })
    }
}
