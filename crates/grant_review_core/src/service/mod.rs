//! Core use-case services.
//!
//! # Responsibility
//! - Authorize the explicit actor, then delegate the mutation to a store.
//! - Emit notifications and audit entries only after the store committed.
//!
//! # Invariants
//! - `NotAuthorized` is returned before any store mutation is attempted.
//! - Collaborator failures never change a service result.

pub mod grant_service;
pub mod panel_service;
pub mod review_service;
pub mod reviewer_service;
pub mod role_service;
