//! Read-only kinds
//!
//! Data sources read in lookup mode: a missing parent object is an error,
//! never an empty result.

pub mod current_user;
pub mod group_variables;
pub mod milestones;
