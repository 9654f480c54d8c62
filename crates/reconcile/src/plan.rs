//! Desired-state documents and execution plans
//!
//! A document lists objects by kind with an optional identifier and the
//! desired state. Planning validates every entry against the registry and
//! turns it into one action, before any remote call is made.

use crate::error::{Error, Result};
use crate::id::RemoteObjectRef;
use crate::registry::{KindClass, Registry};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Whether an object should exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    #[default]
    Present,
    Absent,
}

/// One `[[object]]` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentEntry {
    pub kind: String,
    /// Identifier of an existing object. Omitted for objects to create.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RemoteObjectRef>,
    #[serde(default)]
    pub ensure: Ensure,
    #[serde(default)]
    pub desired: Value,
    /// Last observed state of the object, as the host tracked it. Lets an
    /// `absent` entry treat an object that is already gone as done.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracked: Option<Value>,
}

/// A desired-state document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, rename = "object")]
    pub objects: Vec<DocumentEntry>,
}

/// What to do with one object.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Create,
    Update(RemoteObjectRef),
    Delete(RemoteObjectRef),
}

/// One validated document entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOp {
    /// Position in the document, 1-based.
    pub index: usize,
    pub kind: &'static str,
    pub action: Action,
    pub desired: Value,
    pub tracked: Option<Value>,
}

impl fmt::Display for PlannedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.action {
            Action::Create => write!(f, "create {} (object {})", self.kind, self.index),
            Action::Update(id) => write!(f, "update {} {}", self.kind, id),
            Action::Delete(id) => write!(f, "delete {} {}", self.kind, id),
        }
    }
}

/// Validated actions, in document order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionPlan {
    pub ops: Vec<PlannedOp>,
}

impl ExecutionPlan {
    /// Validate `document` against `registry`.
    ///
    /// Fails on unknown kinds, data sources, identifiers that do not decode,
    /// `absent` entries without an identifier, and two entries addressing
    /// the same object.
    pub fn from_document<C: ?Sized + 'static>(
        document: &Document,
        registry: &Registry<C>,
    ) -> Result<Self> {
        let mut seen: HashSet<(&'static str, &RemoteObjectRef)> = HashSet::new();
        let mut ops = Vec::with_capacity(document.objects.len());

        for (i, entry) in document.objects.iter().enumerate() {
            let index = i + 1;
            let descriptor = match registry.get(KindClass::Resource, &entry.kind) {
                Ok(descriptor) => descriptor,
                Err(_) if registry.contains(KindClass::DataSource, &entry.kind) => {
                    return Err(Error::document(
                        entry.kind.as_str(),
                        format!("object {index}: {} is a data source", entry.kind),
                    ));
                }
                Err(err) => return Err(err),
            };
            let kind = descriptor.name;

            if let Some(id) = &entry.id {
                if let Some(format) = descriptor.id_format {
                    id.decode(&format)?;
                }
                if !seen.insert((kind, id)) {
                    return Err(Error::document(
                        kind,
                        format!("object {index}: {id} appears more than once"),
                    ));
                }
            }

            let action = match (entry.ensure, &entry.id) {
                (Ensure::Present, None) => Action::Create,
                (Ensure::Present, Some(id)) => Action::Update(id.clone()),
                (Ensure::Absent, Some(id)) => Action::Delete(id.clone()),
                (Ensure::Absent, None) => {
                    return Err(Error::document(
                        kind,
                        format!("object {index}: ensure = \"absent\" needs an id"),
                    ));
                }
            };

            ops.push(PlannedOp {
                index,
                kind,
                action,
                desired: entry.desired.clone(),
                tracked: entry.tracked.clone(),
            });
        }

        Ok(Self { ops })
    }

    /// Keep only ops whose kind equals `kind` or starts with it.
    pub fn filter_by_kind(self, kind: Option<&str>) -> Self {
        match kind {
            None => self,
            Some(k) => Self {
                ops: self
                    .ops
                    .into_iter()
                    .filter(|op| op.kind == k || op.kind.starts_with(k))
                    .collect(),
            },
        }
    }

    /// Distinct kinds referenced by the plan.
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<&'static str> = self.ops.iter().map(|op| op.kind).collect();
        kinds.sort_unstable();
        kinds.dedup();
        kinds
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
