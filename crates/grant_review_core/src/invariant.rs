//! Invariant guard for the "a grant keeps at least one admin" rule.
//!
//! # Responsibility
//! - Decide, over one consistent snapshot of a grant's role assignments,
//!   whether a role change or removal would drop the last admin.
//!
//! # Invariants
//! - Callers load the snapshot inside the same transaction that performs the
//!   mutation, so no concurrent writer can change it between check and act.
//! - Grants that never had an admin are not constrained.

use crate::error::{CoreError, CoreResult};
use crate::model::grant::{GrantId, GrantUser};
use crate::model::role::GrantRole;

/// Returns true iff `grant_user` is an admin and no other assignment in
/// `grant_users` holds the admin role.
pub fn is_last_admin(grant_users: &[GrantUser], grant_user: &GrantUser) -> bool {
    grant_user.is_admin()
        && !grant_users
            .iter()
            .any(|other| other.uuid != grant_user.uuid && other.is_admin())
}

/// Role assignments of one grant as seen by the current transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSnapshot {
    pub grant_uuid: GrantId,
    pub has_had_admin: bool,
    pub grant_users: Vec<GrantUser>,
}

impl AdminSnapshot {
    pub fn admin_count(&self) -> usize {
        self.grant_users.iter().filter(|item| item.is_admin()).count()
    }

    /// Checks moving `grant_user` to `next_role`; `None` means removal.
    pub fn check_change(
        &self,
        grant_user: &GrantUser,
        next_role: Option<GrantRole>,
    ) -> CoreResult<()> {
        if next_role == Some(GrantRole::Admin) {
            return Ok(());
        }
        if is_last_admin(&self.grant_users, grant_user) {
            return Err(CoreError::InvariantViolation {
                grant_uuid: self.grant_uuid,
                grant_user_uuid: Some(grant_user.uuid),
            });
        }
        Ok(())
    }

    /// Re-verifies the committed shape of the grant before a commit.
    pub fn verify(&self) -> CoreResult<()> {
        if self.has_had_admin && self.admin_count() == 0 {
            return Err(CoreError::InvariantViolation {
                grant_uuid: self.grant_uuid,
                grant_user_uuid: None,
            });
        }
        Ok(())
    }
}
