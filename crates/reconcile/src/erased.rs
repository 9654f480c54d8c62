//! Type-erased host boundary
//!
//! The host exchanges desired and observed state as JSON values. These traits
//! let a registry hold every kind behind one object-safe interface while each
//! kind keeps its own strongly-typed `Desired` and `Observed` types.

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::id::{IdFormat, RemoteObjectRef};
use crate::reconciler::{Deleted, ManagedKind, Observation, ReadMode, Reconciler};
use crate::verify;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier plus observed state, as the host stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    pub id: RemoteObjectRef,
    pub state: Value,
}

/// A managed resource kind with JSON in and out.
pub trait ErasedResource: Send + Sync {
    fn kind(&self) -> &'static str;
    fn id_format(&self) -> IdFormat;
    /// Natural-key description of an object not yet created.
    fn label(&self, desired: &Value) -> Result<String>;
    fn create(&self, desired: &Value, cancel: &CancelToken) -> Result<TrackedObject>;
    fn read(
        &self,
        id: &RemoteObjectRef,
        mode: ReadMode,
        cancel: &CancelToken,
    ) -> Result<Option<TrackedObject>>;
    /// Returns the re-read object and the number of remote calls issued.
    fn update(
        &self,
        id: &RemoteObjectRef,
        desired: &Value,
        cancel: &CancelToken,
    ) -> Result<(TrackedObject, usize)>;
    fn delete(
        &self,
        id: &RemoteObjectRef,
        tracked: Option<&Value>,
        cancel: &CancelToken,
    ) -> Result<Deleted>;
    fn confirm_absent(
        &self,
        id: &RemoteObjectRef,
        tracked: &Value,
        cancel: &CancelToken,
    ) -> Result<bool>;
}

impl<K> ErasedResource for Reconciler<K>
where
    K: ManagedKind,
    K::Desired: DeserializeOwned,
    K::Observed: Serialize + DeserializeOwned,
{
    fn kind(&self) -> &'static str {
        self.name()
    }

    fn id_format(&self) -> IdFormat {
        ManagedKind::id_format(Reconciler::kind(self))
    }

    fn label(&self, desired: &Value) -> Result<String> {
        let desired: K::Desired = from_value(self.name(), desired)?;
        Ok(ManagedKind::label(Reconciler::kind(self), &desired))
    }

    fn create(&self, desired: &Value, cancel: &CancelToken) -> Result<TrackedObject> {
        let desired: K::Desired = from_value(self.name(), desired)?;
        let observation = Reconciler::create(self, &desired, cancel)?;
        tracked(self.name(), observation)
    }

    fn read(
        &self,
        id: &RemoteObjectRef,
        mode: ReadMode,
        cancel: &CancelToken,
    ) -> Result<Option<TrackedObject>> {
        Reconciler::read(self, id, mode, cancel)?
            .map(|observation| tracked(self.name(), observation))
            .transpose()
    }

    fn update(
        &self,
        id: &RemoteObjectRef,
        desired: &Value,
        cancel: &CancelToken,
    ) -> Result<(TrackedObject, usize)> {
        let desired: K::Desired = from_value(self.name(), desired)?;
        let updated = Reconciler::update(self, id, &desired, cancel)?;
        Ok((tracked(self.name(), updated.observation)?, updated.changes))
    }

    fn delete(
        &self,
        id: &RemoteObjectRef,
        tracked: Option<&Value>,
        cancel: &CancelToken,
    ) -> Result<Deleted> {
        let prior = tracked
            .map(|state| observation::<K>(self.name(), id, state))
            .transpose()?;
        Reconciler::delete(self, id, prior.as_ref(), cancel)
    }

    fn confirm_absent(
        &self,
        id: &RemoteObjectRef,
        tracked: &Value,
        cancel: &CancelToken,
    ) -> Result<bool> {
        let prior = observation::<K>(self.name(), id, tracked)?;
        verify::confirm_absent(self, &prior, cancel)
    }
}

/// A read-only data source.
pub trait DataSource: Send + Sync {
    type Query: DeserializeOwned;
    type Output: Serialize;

    fn kind(&self) -> &'static str;

    /// Read in lookup mode: a missing parent is an error.
    fn read(&self, query: &Self::Query, cancel: &CancelToken) -> Result<Self::Output>;
}

/// A data source with JSON in and out.
pub trait ErasedDataSource: Send + Sync {
    fn kind(&self) -> &'static str;
    fn read(&self, query: &Value, cancel: &CancelToken) -> Result<Value>;
}

impl<D: DataSource> ErasedDataSource for D {
    fn kind(&self) -> &'static str {
        DataSource::kind(self)
    }

    fn read(&self, query: &Value, cancel: &CancelToken) -> Result<Value> {
        let query: D::Query = from_value(DataSource::kind(self), query)?;
        let output = DataSource::read(self, &query, cancel)?;
        serde_json::to_value(output).map_err(|e| Error::document(DataSource::kind(self), e))
    }
}

/// A constructed kind, ready to serve host requests.
pub enum Handler {
    Resource(Box<dyn ErasedResource>),
    DataSource(Box<dyn ErasedDataSource>),
}

impl Handler {
    /// Wrap a reconciler.
    pub fn resource<K>(reconciler: Reconciler<K>) -> Self
    where
        K: ManagedKind + 'static,
        K::Desired: DeserializeOwned,
        K::Observed: Serialize + DeserializeOwned,
    {
        Self::Resource(Box::new(reconciler))
    }

    /// Wrap a data source.
    pub fn data_source<D: DataSource + 'static>(source: D) -> Self {
        Self::DataSource(Box::new(source))
    }

    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Resource(r) => r.kind(),
            Self::DataSource(d) => d.kind(),
        }
    }

    #[must_use]
    pub fn as_resource(&self) -> Option<&dyn ErasedResource> {
        match self {
            Self::Resource(r) => Some(r.as_ref()),
            Self::DataSource(_) => None,
        }
    }

    #[must_use]
    pub fn as_data_source(&self) -> Option<&dyn ErasedDataSource> {
        match self {
            Self::Resource(_) => None,
            Self::DataSource(d) => Some(d.as_ref()),
        }
    }
}

fn from_value<T: DeserializeOwned>(kind: &str, value: &Value) -> Result<T> {
    T::deserialize(value).map_err(|e| Error::document(kind, e))
}

fn tracked<O: Serialize>(kind: &str, observation: Observation<O>) -> Result<TrackedObject> {
    let (id, state) = observation.into_parts();
    let state = serde_json::to_value(state).map_err(|e| Error::document(kind, e))?;
    Ok(TrackedObject { id, state })
}

fn observation<K>(
    kind: &str,
    id: &RemoteObjectRef,
    state: &Value,
) -> Result<Observation<K::Observed>>
where
    K: ManagedKind,
    K::Observed: DeserializeOwned,
{
    let state: K::Observed = from_value(kind, state)?;
    Ok(Observation::from_tracked(id.clone(), state))
}
