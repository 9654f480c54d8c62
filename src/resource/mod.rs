//! Managed kinds
//!
//! Each module wraps one remote object type in a [`reconcile::ManagedKind`]:
//! - Desired fields as they appear in a document
//! - Observed state as it is persisted between runs
//! - The raw create, get, update and delete calls against [`labapi::Api`]
//!
//! Natural-key fields (the ones packed into the identifier) never change in
//! place. A desired value that moves one of them is a document error.

pub mod group_membership;
pub mod group_variable;
pub mod project_badge;
pub mod protected_branch;
pub mod release;
pub mod release_link;

use reconcile::{Error, Result};
use std::fmt;

/// Fail when a natural-key field of the desired value differs from the
/// observed object.
pub fn ensure_unchanged<T: PartialEq + fmt::Debug + ?Sized>(
    kind: &str,
    field: &str,
    observed: &T,
    desired: &T,
) -> Result<()> {
    if observed == desired {
        return Ok(());
    }
    Err(Error::document(
        kind,
        format!("{field} cannot change from {observed:?} to {desired:?}; replace the object instead"),
    ))
}
