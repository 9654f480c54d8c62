//! Enum translation between human-readable names and wire codes
//!
//! The remote API stores levels as small integers; desired-state documents
//! and observed state use names. [`WireEnum`] gives any enumeration backed by
//! a static `(variant, name, code)` table both directions of the mapping.
//! Unknown codes never panic: they fail with `UnknownEnumValue` and the
//! caller decides whether that is a read error or a pass-through.

use crate::error::{Error, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

/// An enumeration with a fixed bijection between names and integer codes.
pub trait WireEnum: Sized + Copy + PartialEq + 'static {
    /// Enumeration name used in error messages.
    const ENUM_NAME: &'static str;

    /// Every supported variant with its canonical name and wire code.
    const TABLE: &'static [(Self, &'static str, i64)];

    /// Look up a variant by name.
    fn from_name(name: &str) -> Result<Self> {
        Self::TABLE
            .iter()
            .find(|(_, n, _)| *n == name)
            .map(|(v, _, _)| *v)
            .ok_or_else(|| Error::unknown_enum(Self::ENUM_NAME, format!("{name:?}")))
    }

    /// Look up a variant by wire code.
    fn from_code(code: i64) -> Result<Self> {
        Self::TABLE
            .iter()
            .find(|(_, _, c)| *c == code)
            .map(|(v, _, _)| *v)
            .ok_or_else(|| Error::unknown_enum(Self::ENUM_NAME, code))
    }

    /// Canonical name.
    fn name(self) -> &'static str {
        Self::TABLE
            .iter()
            .find(|(v, _, _)| *v == self)
            .map_or("", |(_, n, _)| *n)
    }

    /// Wire code.
    fn code(self) -> i64 {
        Self::TABLE
            .iter()
            .find(|(v, _, _)| *v == self)
            .map_or(0, |(_, _, c)| *c)
    }

    /// All canonical names, in table order.
    fn names() -> Vec<&'static str> {
        Self::TABLE.iter().map(|(_, n, _)| *n).collect()
    }
}

/// Translate a name to its wire code.
pub fn name_to_code<E: WireEnum>(name: &str) -> Result<i64> {
    E::from_name(name).map(WireEnum::code)
}

/// Translate a wire code to its canonical name.
pub fn code_to_name<E: WireEnum>(code: i64) -> Result<&'static str> {
    E::from_code(code).map(WireEnum::name)
}

/// Role levels used by memberships, protected branches and tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessLevel {
    #[serde(rename = "no one")]
    NoOne,
    Minimal,
    Guest,
    Planner,
    Reporter,
    Developer,
    Maintainer,
    Owner,
    Admin,
}

impl WireEnum for AccessLevel {
    const ENUM_NAME: &'static str = "access level";

    const TABLE: &'static [(Self, &'static str, i64)] = &[
        (Self::NoOne, "no one", 0),
        (Self::Minimal, "minimal", 5),
        (Self::Guest, "guest", 10),
        (Self::Planner, "planner", 15),
        (Self::Reporter, "reporter", 20),
        (Self::Developer, "developer", 30),
        (Self::Maintainer, "maintainer", 40),
        (Self::Owner, "owner", 50),
        (Self::Admin, "admin", 60),
    ];
}

/// Levels accepted for protected branch and tag push/merge/unprotect rules.
pub const PROTECTED_REF_LEVELS: &[AccessLevel] = &[
    AccessLevel::NoOne,
    AccessLevel::Developer,
    AccessLevel::Maintainer,
    AccessLevel::Admin,
];

impl AccessLevel {
    /// Generic description rendered when no principal is attached.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::NoOne => "No one",
            Self::Minimal => "Minimal access",
            Self::Guest => "Guests",
            Self::Planner => "Planners",
            Self::Reporter => "Reporters",
            Self::Developer => "Developers + Maintainers",
            Self::Maintainer => "Maintainers",
            Self::Owner => "Owners",
            Self::Admin => "Administrators",
        }
    }

    /// Fail unless this level is one of `allowed`.
    pub fn ensure_one_of(self, allowed: &[AccessLevel]) -> Result<Self> {
        if allowed.contains(&self) {
            Ok(self)
        } else {
            Err(Error::unknown_enum(
                Self::ENUM_NAME,
                format!(
                    "{:?} (valid values: {})",
                    self.name(),
                    allowed
                        .iter()
                        .map(|l| l.name())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
            ))
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A level granted to a user, a group, or a plain role, as returned remotely.
///
/// Zero means "not attached" for both principal references.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AccessGrant {
    pub access_level: i64,
    /// Remote description: the principal's display name when one is attached.
    pub access_level_description: String,
    pub user_id: i64,
    pub group_id: i64,
}

/// Who a grant is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    User(i64),
    Group(i64),
    Role,
}

impl AccessGrant {
    /// Resolve the principal.
    ///
    /// Upstream never sets both references. If it does, the user wins and the
    /// group reference is ignored.
    #[must_use]
    pub fn principal(&self) -> Principal {
        if self.user_id != 0 {
            Principal::User(self.user_id)
        } else if self.group_id != 0 {
            Principal::Group(self.group_id)
        } else {
            Principal::Role
        }
    }
}

/// What to do with a grant whose level code is not in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownCodePolicy {
    /// Fail the read with `UnknownEnumValue`.
    #[default]
    Strict,
    /// Render the raw number as the level name.
    PassThrough,
}

/// One flattened grant in observed state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatGrant {
    pub access_level: String,
    pub access_level_description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<i64>,
}

/// Flatten remote grants into observed-state records, preserving order.
pub fn flatten_grants(grants: &[AccessGrant], policy: UnknownCodePolicy) -> Result<Vec<FlatGrant>> {
    grants.iter().map(|g| flatten_grant(g, policy)).collect()
}

fn flatten_grant(grant: &AccessGrant, policy: UnknownCodePolicy) -> Result<FlatGrant> {
    let level = match (AccessLevel::from_code(grant.access_level), policy) {
        (Ok(level), _) => Some(level),
        (Err(err), UnknownCodePolicy::Strict) => return Err(err),
        (Err(_), UnknownCodePolicy::PassThrough) => {
            warn!(
                "passing through unknown access level code {}",
                grant.access_level
            );
            None
        }
    };
    let access_level = level.map_or_else(|| grant.access_level.to_string(), |l| l.name().to_string());

    let flat = match grant.principal() {
        Principal::User(id) => FlatGrant {
            access_level,
            access_level_description: grant.access_level_description.clone(),
            user_id: Some(id),
            group_id: None,
        },
        Principal::Group(id) => FlatGrant {
            access_level,
            access_level_description: grant.access_level_description.clone(),
            user_id: None,
            group_id: Some(id),
        },
        Principal::Role => FlatGrant {
            access_level,
            access_level_description: level.map_or_else(
                || grant.access_level_description.clone(),
                |l| l.description().to_string(),
            ),
            user_id: None,
            group_id: None,
        },
    };
    Ok(flat)
}
