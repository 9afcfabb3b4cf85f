//! Domain model for the grant review core.
//!
//! # Responsibility
//! - Define the records the role, review and panel stores persist.
//! - Keep field-level validation next to the data it constrains.
//!
//! # Invariants
//! - Every record is identified by a stable UUID that is never reused.
//! - Grant is the aggregate root for GrantUser, GrantReviewer, Submission,
//!   Review and Panel.

pub mod entity;
pub mod grant;
pub mod panel;
pub mod review;
pub mod role;
pub mod validation;
