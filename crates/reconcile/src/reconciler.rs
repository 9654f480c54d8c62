//! Remote object reconciler
//!
//! A [`ManagedKind`] describes the raw remote calls for one object kind.
//! [`Reconciler`] wraps it with the shared mechanics every kind relies on:
//! identifier encoding and decoding, not-found semantics for drift detection
//! versus lookups, field-level updates, and destroy with proof of prior
//! existence.
//!
//! The reconciler keeps no mutable state between calls. Each operation takes
//! the identifier and desired state as input and returns the new observation,
//! so distinct objects can be reconciled concurrently without locking.

use crate::cancel::CancelToken;
use crate::error::{CallResult, Error, Operation, Result};
use crate::id::{CompositeKey, IdFormat, IdPart, RemoteObjectRef};
use crate::retry::{RetryConfig, with_backoff};
use log::{debug, info, warn};
use std::fmt;

/// Raw remote calls for one managed object kind.
pub trait ManagedKind: Send + Sync {
    /// Desired state as declared by the host.
    type Desired: Clone + fmt::Debug + Send + Sync;
    /// Canonical snapshot built from a remote response.
    type Observed: Clone + fmt::Debug + PartialEq + Send + Sync;
    /// One remote call needed to move observed state toward desired state.
    type Change: fmt::Debug;

    /// Kind name, e.g. `gitlab_project_badge`.
    fn kind(&self) -> &'static str;

    /// Identifier layout.
    fn id_format(&self) -> IdFormat;

    /// Short description of a not-yet-created object for error messages.
    fn label(&self, desired: &Self::Desired) -> String;

    /// Issue the creation call.
    fn create(&self, desired: &Self::Desired, cancel: &CancelToken) -> CallResult<Self::Observed>;

    /// Natural keys of an observed object, in [`ManagedKind::id_format`] order.
    fn key_of(&self, observed: &Self::Observed) -> Vec<IdPart>;

    /// Fetch by natural keys.
    fn fetch(&self, key: &CompositeKey, cancel: &CancelToken) -> CallResult<Self::Observed>;

    /// Field-level diff: the remote calls needed, in order. Empty when in sync.
    fn diff(&self, observed: &Self::Observed, desired: &Self::Desired) -> Result<Vec<Self::Change>>;

    /// Issue one update call.
    fn apply(&self, key: &CompositeKey, change: &Self::Change) -> CallResult<()>;

    /// Issue the deletion call.
    fn remove(&self, key: &CompositeKey) -> CallResult<()>;

    /// Whether `current` is still the object that was tracked.
    ///
    /// The existence verifier uses this to tell "destroy failed" apart from
    /// "something else recreated it". Kinds usually compare access-level
    /// fields only.
    fn matches_tracked(&self, tracked: &Self::Observed, current: &Self::Observed) -> bool {
        tracked == current
    }
}

/// Lifecycle of one remote object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Absent,
    Creating,
    Present,
    Updating,
    Deleting,
}

impl Lifecycle {
    /// Whether `self -> next` is a legal step.
    #[must_use]
    pub fn can_become(self, next: Lifecycle) -> bool {
        use Lifecycle::*;
        matches!(
            (self, next),
            (Absent, Creating)
                | (Creating, Present)
                | (Creating, Absent)
                | (Present, Updating)
                | (Updating, Present)
                | (Present, Deleting)
                | (Deleting, Absent)
                | (Deleting, Present)
                | (Present, Absent)
        )
    }
}

/// How a read treats a remote not-found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Drift detection: a vanished object is dropped from tracking.
    Refresh,
    /// Import or targeted lookup: a missing object is an error.
    Lookup,
}

/// An object seen present remotely, with the identifier it was read by.
///
/// Holding one is the proof [`Reconciler::delete`] needs to treat a later
/// not-found as "already gone".
#[derive(Debug, Clone, PartialEq)]
pub struct Observation<O> {
    id: RemoteObjectRef,
    state: O,
}

impl<O> Observation<O> {
    /// Rebuild an observation from state the host tracked after an earlier read.
    pub fn from_tracked(id: RemoteObjectRef, state: O) -> Self {
        Self { id, state }
    }

    #[must_use]
    pub fn id(&self) -> &RemoteObjectRef {
        &self.id
    }

    #[must_use]
    pub fn state(&self) -> &O {
        &self.state
    }

    pub fn into_parts(self) -> (RemoteObjectRef, O) {
        (self.id, self.state)
    }
}

/// Result of an update.
#[derive(Debug, Clone, PartialEq)]
pub struct Updated<O> {
    pub observation: Observation<O>,
    /// Number of remote calls issued; zero when already in sync.
    pub changes: usize,
}

/// Result of a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deleted {
    /// The deletion call succeeded.
    Removed,
    /// The object was observed before but is gone now.
    AlreadyGone,
}

/// CRUD orchestration for one managed kind.
pub struct Reconciler<K> {
    kind: K,
    read_retry: RetryConfig,
}

impl<K: ManagedKind> Reconciler<K> {
    /// Create a reconciler with the default read-after-write backoff.
    pub fn new(kind: K) -> Self {
        Self {
            kind,
            read_retry: RetryConfig::default(),
        }
    }

    /// Set the backoff used to re-read an object after updating it.
    pub fn with_read_retry(mut self, config: RetryConfig) -> Self {
        self.read_retry = config;
        self
    }

    /// The wrapped kind.
    pub fn kind(&self) -> &K {
        &self.kind
    }

    /// Kind name.
    pub fn name(&self) -> &'static str {
        self.kind.kind()
    }

    /// Decode an identifier against this kind's format.
    pub fn decode(&self, id: &RemoteObjectRef) -> Result<CompositeKey> {
        id.decode(&self.kind.id_format())
    }

    /// Create the object and return its identifier with the state built
    /// from the creation response.
    pub fn create(
        &self,
        desired: &K::Desired,
        cancel: &CancelToken,
    ) -> Result<Observation<K::Observed>> {
        let label = self.kind.label(desired);
        cancel.check(format!("create {} {}", self.name(), label))?;

        self.transition(&label, Lifecycle::Absent, Lifecycle::Creating);
        let state = match self.kind.create(desired, cancel) {
            Ok(state) => state,
            Err(err) => {
                self.transition(&label, Lifecycle::Creating, Lifecycle::Absent);
                return Err(err.into_error(self.name(), &label, Operation::Create));
            }
        };

        let key = CompositeKey::new(self.kind.key_of(&state))?;
        let id = key.to_ref();
        let decoded = self.decode(&id)?;
        if decoded.parts() != key.parts() {
            return Err(Error::malformed(
                id.as_str(),
                self.kind.id_format().to_string(),
                format!("created object keys {:?} do not round-trip", key.parts()),
            ));
        }

        self.transition(&id, Lifecycle::Creating, Lifecycle::Present);
        info!("created {} {}", self.name(), id);
        Ok(Observation { id, state })
    }

    /// Read the object addressed by `id`.
    ///
    /// A remote not-found yields `Ok(None)` in [`ReadMode::Refresh`] and a
    /// `NotFound` error in [`ReadMode::Lookup`].
    pub fn read(
        &self,
        id: &RemoteObjectRef,
        mode: ReadMode,
        cancel: &CancelToken,
    ) -> Result<Option<Observation<K::Observed>>> {
        let key = self.decode(id)?;
        match self.probe(&key, cancel)? {
            Some(state) => Ok(Some(Observation {
                id: id.clone(),
                state,
            })),
            None => match mode {
                ReadMode::Refresh => {
                    self.transition(id, Lifecycle::Present, Lifecycle::Absent);
                    warn!(
                        "{} {} no longer exists remotely, dropping it from tracking",
                        self.name(),
                        id
                    );
                    Ok(None)
                }
                ReadMode::Lookup => Err(Error::not_found(self.name(), key.to_string())),
            },
        }
    }

    /// Read in lookup mode: not-found is an error.
    pub fn lookup(
        &self,
        id: &RemoteObjectRef,
        cancel: &CancelToken,
    ) -> Result<Observation<K::Observed>> {
        self.read(id, ReadMode::Lookup, cancel)?
            .ok_or_else(|| Error::not_found(self.name(), id.as_str()))
    }

    /// Import an object by user-typed identifier text.
    pub fn import(&self, text: &str, cancel: &CancelToken) -> Result<Observation<K::Observed>> {
        self.lookup(&RemoteObjectRef::new(text), cancel)
    }

    /// Lookup that tolerates a mutation not yet being visible.
    ///
    /// Retries only on `NotFound`, with the configured backoff.
    pub fn read_after_write(
        &self,
        id: &RemoteObjectRef,
        cancel: &CancelToken,
    ) -> Result<Observation<K::Observed>> {
        with_backoff(&self.read_retry, None, || self.lookup(id, cancel))
    }

    /// Move the object toward `desired` with the minimal set of remote calls,
    /// then re-read it.
    pub fn update(
        &self,
        id: &RemoteObjectRef,
        desired: &K::Desired,
        cancel: &CancelToken,
    ) -> Result<Updated<K::Observed>> {
        let current = self.lookup(id, cancel)?;
        let key = self.decode(id)?;
        let changes = self.kind.diff(current.state(), desired)?;
        if changes.is_empty() {
            debug!("{} {} already matches desired state", self.name(), id);
            return Ok(Updated {
                observation: current,
                changes: 0,
            });
        }

        self.transition(id, Lifecycle::Present, Lifecycle::Updating);
        let total = changes.len();
        for (index, change) in changes.iter().enumerate() {
            cancel.check(format!("update {} {}", self.name(), id))?;
            debug!(
                "{} {}: change {}/{}: {:?}",
                self.name(),
                id,
                index + 1,
                total,
                change
            );
            self.kind.apply(&key, change).map_err(|err| {
                with_change_context(
                    err.into_error(self.name(), &key.to_string(), Operation::Update),
                    index,
                    total,
                )
            })?;
        }
        self.transition(id, Lifecycle::Updating, Lifecycle::Present);

        let observation = self.read_after_write(id, cancel)?;
        info!("updated {} {} ({} call(s))", self.name(), id, total);
        Ok(Updated {
            observation,
            changes: total,
        })
    }

    /// Delete the object.
    ///
    /// `prior` is an observation of this object from earlier in the same
    /// operation. Without one, the object is read first; if that read finds
    /// nothing the delete fails with `DeleteFailed`, since a not-found on
    /// first contact may mean the identifier is wrong rather than the object
    /// gone. Once the object is known to have existed, a not-found from the
    /// deletion call counts as success.
    pub fn delete(
        &self,
        id: &RemoteObjectRef,
        prior: Option<&Observation<K::Observed>>,
        cancel: &CancelToken,
    ) -> Result<Deleted> {
        let key = self.decode(id)?;
        match prior {
            Some(observation) if observation.id() != id => {
                return Err(Error::DeleteFailed {
                    kind: self.name().to_string(),
                    key: key.to_string(),
                    reason: format!("tracked observation belongs to {}", observation.id()),
                });
            }
            Some(_) => {}
            None => {
                if self.probe(&key, cancel)?.is_none() {
                    return Err(Error::DeleteFailed {
                        kind: self.name().to_string(),
                        key: key.to_string(),
                        reason: "not found on first contact; the identifier may not address \
                                 an existing object"
                            .to_string(),
                    });
                }
            }
        }

        cancel.check(format!("delete {} {}", self.name(), id))?;
        self.transition(id, Lifecycle::Present, Lifecycle::Deleting);
        match self.kind.remove(&key) {
            Ok(()) => {
                self.transition(id, Lifecycle::Deleting, Lifecycle::Absent);
                info!("deleted {} {}", self.name(), id);
                Ok(Deleted::Removed)
            }
            Err(err) if err.is_not_found() => {
                self.transition(id, Lifecycle::Deleting, Lifecycle::Absent);
                info!("{} {} was already gone", self.name(), id);
                Ok(Deleted::AlreadyGone)
            }
            Err(err) => {
                self.transition(id, Lifecycle::Deleting, Lifecycle::Present);
                Err(err.into_error(self.name(), &key.to_string(), Operation::Delete))
            }
        }
    }

    /// Fetch by key, mapping a remote not-found to `None`.
    pub(crate) fn probe(
        &self,
        key: &CompositeKey,
        cancel: &CancelToken,
    ) -> Result<Option<K::Observed>> {
        cancel.check(format!("read {} {}", self.name(), key))?;
        match self.kind.fetch(key, cancel) {
            Ok(state) => Ok(Some(state)),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into_error(self.name(), &key.to_string(), Operation::Read)),
        }
    }

    fn transition(&self, subject: &dyn fmt::Display, from: Lifecycle, to: Lifecycle) {
        debug_assert!(from.can_become(to), "illegal lifecycle step {from:?} -> {to:?}");
        debug!("{} {}: {:?} -> {:?}", self.name(), subject, from, to);
    }
}

/// Say which of several update calls failed.
fn with_change_context(err: Error, index: usize, total: usize) -> Error {
    let prefix = format!("call {}/{}", index + 1, total);
    match err {
        Error::RemoteRejected {
            kind,
            key,
            operation,
            status,
            message,
        } => Error::RemoteRejected {
            kind,
            key,
            operation,
            status,
            message: format!("{prefix}: {message}"),
        },
        Error::Transport {
            kind,
            key,
            operation,
            status,
            message,
        } => Error::Transport {
            kind,
            key,
            operation,
            status,
            message: format!("{prefix}: {message}"),
        },
        other => other,
    }
}
