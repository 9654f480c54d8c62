//! Kind registry
//!
//! Kinds are listed in a static table of descriptor and constructor pairs.
//! The registry is built from that table once at startup; nothing registers
//! itself as a side effect of being linked in.
//!
//! Resources and data sources live in separate namespaces, so a data source
//! may share its name with the resource it reads.

use crate::erased::Handler;
use crate::error::{Error, Result};
use crate::id::IdFormat;
use std::collections::BTreeMap;
use std::fmt;

/// Whether a kind manages objects or only reads them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KindClass {
    Resource,
    DataSource,
}

impl fmt::Display for KindClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Resource => write!(f, "resource"),
            Self::DataSource => write!(f, "data source"),
        }
    }
}

/// Static facts about one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindDescriptor {
    pub name: &'static str,
    pub class: KindClass,
    /// Identifier layout; data sources have none.
    pub id_format: Option<IdFormat>,
    pub summary: &'static str,
}

impl KindDescriptor {
    /// Number of identifier components, zero for data sources.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.id_format.map_or(0, |f| f.arity())
    }
}

/// One row of the kind table: a descriptor and the function that builds the
/// kind from a client `C`.
pub struct KindEntry<C: ?Sized> {
    pub descriptor: KindDescriptor,
    pub build: fn(&C) -> Handler,
}

/// Lookup of kinds by class and name, in name order.
pub struct Registry<C: ?Sized + 'static> {
    classes: BTreeMap<KindClass, BTreeMap<&'static str, &'static KindEntry<C>>>,
}

impl<C: ?Sized + 'static> Registry<C> {
    /// Build from a static table, rejecting duplicate class and name pairs.
    pub fn from_table(table: &'static [KindEntry<C>]) -> Result<Self> {
        let mut classes: BTreeMap<KindClass, BTreeMap<&'static str, &'static KindEntry<C>>> =
            BTreeMap::new();
        for entry in table {
            let descriptor = &entry.descriptor;
            if classes
                .entry(descriptor.class)
                .or_default()
                .insert(descriptor.name, entry)
                .is_some()
            {
                return Err(Error::DuplicateKind {
                    class: descriptor.class.to_string(),
                    name: descriptor.name.to_string(),
                });
            }
        }
        Ok(Self { classes })
    }

    /// Descriptor for the `class` kind called `name`.
    pub fn get(&self, class: KindClass, name: &str) -> Result<&KindDescriptor> {
        self.entry(class, name).map(|entry| &entry.descriptor)
    }

    /// Whether a `class` kind called `name` is registered.
    #[must_use]
    pub fn contains(&self, class: KindClass, name: &str) -> bool {
        self.entry(class, name).is_ok()
    }

    /// Construct the `class` kind called `name` against `client`.
    pub fn instantiate(&self, class: KindClass, name: &str, client: &C) -> Result<Handler> {
        let entry = self.entry(class, name)?;
        let handler = (entry.build)(client);
        debug_assert_eq!(handler.kind(), entry.descriptor.name);
        Ok(handler)
    }

    /// All descriptors, ordered by name. A resource sorts before the data
    /// source of the same name.
    pub fn descriptors(&self) -> impl Iterator<Item = &KindDescriptor> {
        let mut all: Vec<&KindDescriptor> = self
            .classes
            .values()
            .flat_map(BTreeMap::values)
            .map(|entry| &entry.descriptor)
            .collect();
        all.sort_by_key(|descriptor| (descriptor.name, descriptor.class));
        all.into_iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.classes.values().map(BTreeMap::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, class: KindClass, name: &str) -> Result<&'static KindEntry<C>> {
        self.classes
            .get(&class)
            .and_then(|kinds| kinds.get(name))
            .copied()
            .ok_or_else(|| Error::UnknownKind {
                class: class.to_string(),
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconciler::tests::reconciler;

    fn build_labels(_: &()) -> Handler {
        Handler::resource(reconciler())
    }

    static TABLE: &[KindEntry<()>] = &[KindEntry {
        descriptor: KindDescriptor {
            name: "test_label",
            class: KindClass::Resource,
            id_format: Some(IdFormat::new(&["project", "label_id"])),
            summary: "Project label",
        },
        build: build_labels,
    }];

    static DUPLICATED: &[KindEntry<()>] = &[
        KindEntry {
            descriptor: KindDescriptor {
                name: "test_label",
                class: KindClass::Resource,
                id_format: None,
                summary: "",
            },
            build: build_labels,
        },
        KindEntry {
            descriptor: KindDescriptor {
                name: "test_label",
                class: KindClass::Resource,
                id_format: None,
                summary: "",
            },
            build: build_labels,
        },
    ];

    #[test]
    fn test_lookup_and_instantiate() {
        let registry = Registry::from_table(TABLE).unwrap();
        assert_eq!(registry.len(), 1);

        let descriptor = registry.get(KindClass::Resource, "test_label").unwrap();
        assert_eq!(descriptor.arity(), 2);
        assert_eq!(descriptor.class.to_string(), "resource");
        assert!(!registry.contains(KindClass::DataSource, "test_label"));

        let handler = registry
            .instantiate(KindClass::Resource, "test_label", &())
            .unwrap();
        assert!(handler.as_resource().is_some());
    }

    #[test]
    fn test_unknown_kind() {
        let registry = Registry::from_table(TABLE).unwrap();
        let err = registry.get(KindClass::Resource, "gitlab_nope").unwrap_err();
        assert!(matches!(err, Error::UnknownKind { .. }));
        assert_eq!(err.to_string(), "unknown resource kind \"gitlab_nope\"");
        assert!(
            registry
                .instantiate(KindClass::DataSource, "test_label", &())
                .is_err()
        );
    }

    static SHARED_NAME: &[KindEntry<()>] = &[
        KindEntry {
            descriptor: KindDescriptor {
                name: "test_label",
                class: KindClass::Resource,
                id_format: Some(IdFormat::new(&["project", "label_id"])),
                summary: "Project label",
            },
            build: build_labels,
        },
        KindEntry {
            descriptor: KindDescriptor {
                name: "test_label",
                class: KindClass::DataSource,
                id_format: None,
                summary: "Project label lookup",
            },
            build: build_labels,
        },
    ];

    #[test]
    fn test_resource_and_data_source_share_name() {
        let registry = Registry::from_table(SHARED_NAME).unwrap();
        assert_eq!(registry.len(), 2);
        let data_source = registry.get(KindClass::DataSource, "test_label").unwrap();
        assert_eq!(data_source.summary, "Project label lookup");
        assert_eq!(data_source.arity(), 0);

        let classes: Vec<KindClass> = registry.descriptors().map(|d| d.class).collect();
        assert_eq!(classes, vec![KindClass::Resource, KindClass::DataSource]);
    }

    #[test]
    fn test_duplicate_rejected() {
        let err = Registry::from_table(DUPLICATED).err().unwrap();
        assert!(matches!(err, Error::DuplicateKind { .. }));
    }
}
