//! Existence verification after destroy
//!
//! A destroy is only trusted once a follow-up read says the object is gone.
//! The verifier inverts normal read semantics: not-found is the good outcome.

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::reconciler::{ManagedKind, Observation, Reconciler};
use log::debug;

/// Check whether a tracked object is now absent remotely.
///
/// Returns `Ok(true)` when the remote reports not-found and `Ok(false)` when
/// the object is still there with the tracked values. An object that is
/// present but no longer matches what was tracked fails with `Drifted`, since
/// that usually means something else recreated or changed it.
pub fn confirm_absent<K: ManagedKind>(
    reconciler: &Reconciler<K>,
    tracked: &Observation<K::Observed>,
    cancel: &CancelToken,
) -> Result<bool> {
    let key = reconciler.decode(tracked.id())?;
    match reconciler.probe(&key, cancel)? {
        None => {
            debug!("{} {} confirmed absent", reconciler.name(), key);
            Ok(true)
        }
        Some(current) if reconciler.kind().matches_tracked(tracked.state(), &current) => {
            debug!("{} {} still present", reconciler.name(), key);
            Ok(false)
        }
        Some(current) => Err(Error::Drifted {
            kind: reconciler.name().to_string(),
            key: key.to_string(),
            detail: format!("tracked {:?}, found {:?}", tracked.state(), current),
        }),
    }
}

/// Like [`confirm_absent`], but an object that is still present is an error.
pub fn ensure_absent<K: ManagedKind>(
    reconciler: &Reconciler<K>,
    tracked: &Observation<K::Observed>,
    cancel: &CancelToken,
) -> Result<()> {
    if confirm_absent(reconciler, tracked, cancel)? {
        Ok(())
    } else {
        Err(Error::DeleteFailed {
            kind: reconciler.name().to_string(),
            key: tracked.id().to_string(),
            reason: "object still exists after destroy".to_string(),
        })
    }
}
