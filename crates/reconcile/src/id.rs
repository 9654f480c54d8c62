//! Composite identifier codec
//!
//! A remote object is usually addressed by several natural keys (a parent
//! project plus a badge id, a group plus a variable key plus an environment
//! scope). The codec packs those keys into one opaque string that the host
//! stores, and unpacks it again on every read and on import.
//!
//! The textual format `<component>[:<component>...]` is persisted in host
//! state, so the separator and component order are a compatibility contract.
//! Only the final component may contain the separator; decoding splits at
//! most `arity - 1` times so a free-form trailing component survives intact.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reserved component separator.
pub const SEPARATOR: char = ':';

/// One typed component of a composite key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IdPart {
    Str(String),
    Int(i64),
}

impl fmt::Display for IdPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(n) => write!(f, "{n}"),
        }
    }
}

impl From<&str> for IdPart {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for IdPart {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<&String> for IdPart {
    fn from(s: &String) -> Self {
        Self::Str(s.clone())
    }
}

impl From<i64> for IdPart {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

/// Join components with the separator.
///
/// This does not validate; use [`CompositeKey::new`] when the components come
/// from remote responses or user input.
pub fn encode(parts: &[IdPart]) -> String {
    parts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(&SEPARATOR.to_string())
}

/// Split an identifier into exactly `arity` components.
///
/// The final component keeps any further separators. Fails with
/// `MalformedIdentifier` if there are fewer than `arity` components or any
/// component is empty.
pub fn decode(id: &str, arity: usize) -> Result<Vec<String>> {
    let expected = format!("{arity} '{SEPARATOR}'-separated components");
    if arity == 0 {
        return Err(Error::malformed(id, expected, "arity must be at least 1"));
    }

    let parts: Vec<String> = id.splitn(arity, SEPARATOR).map(str::to_string).collect();
    if parts.len() < arity {
        return Err(Error::malformed(
            id,
            expected,
            format!("expected {} components, found {}", arity, parts.len()),
        ));
    }
    if let Some(pos) = parts.iter().position(String::is_empty) {
        return Err(Error::malformed(
            id,
            expected,
            format!("component {} is empty", pos + 1),
        ));
    }

    Ok(parts)
}

/// Per-kind identifier layout, e.g. `<project>:<badge_id>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdFormat {
    components: &'static [&'static str],
}

impl IdFormat {
    /// Create a format from component names, in order.
    pub const fn new(components: &'static [&'static str]) -> Self {
        Self { components }
    }

    /// Number of components.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.components.len()
    }

    /// Component names.
    #[must_use]
    pub fn components(&self) -> &'static [&'static str] {
        self.components
    }

    /// Decode untrusted text into a key of this format.
    pub fn decode(&self, id: &str) -> Result<CompositeKey> {
        let parts = decode(id, self.arity()).map_err(|err| match err {
            Error::MalformedIdentifier { id, reason, .. } => {
                Error::malformed(id, self.to_string(), reason)
            }
            other => other,
        })?;
        Ok(CompositeKey {
            parts,
            format: Some(*self),
        })
    }
}

impl fmt::Display for IdFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.components.iter().map(|c| format!("<{c}>")).collect();
        write!(f, "{}", rendered.join(&SEPARATOR.to_string()))
    }
}

/// Decoded natural keys of one remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositeKey {
    parts: Vec<String>,
    format: Option<IdFormat>,
}

impl CompositeKey {
    /// Build a key from typed components, validating them.
    ///
    /// Every component must be non-empty and only the last one may contain
    /// the separator, so that `decode(encode(parts))` returns `parts`.
    pub fn new<I, P>(parts: I) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<IdPart>,
    {
        let parts: Vec<IdPart> = parts.into_iter().map(Into::into).collect();
        let encoded = encode(&parts);
        let expected = format!("{} '{SEPARATOR}'-separated components", parts.len());

        if parts.is_empty() {
            return Err(Error::malformed(encoded, expected, "no components"));
        }

        let rendered: Vec<String> = parts.iter().map(ToString::to_string).collect();
        let last = rendered.len() - 1;
        for (i, part) in rendered.iter().enumerate() {
            if part.is_empty() {
                return Err(Error::malformed(
                    &encoded,
                    &expected,
                    format!("component {} is empty", i + 1),
                ));
            }
            if i < last && part.contains(SEPARATOR) {
                return Err(Error::malformed(
                    &encoded,
                    &expected,
                    format!("component {} contains '{SEPARATOR}'", i + 1),
                ));
            }
        }

        Ok(Self {
            parts: rendered,
            format: None,
        })
    }

    /// Decode untrusted text into a key with `arity` components.
    pub fn decode(id: &str, arity: usize) -> Result<Self> {
        Ok(Self {
            parts: decode(id, arity)?,
            format: None,
        })
    }

    /// Number of components.
    #[must_use]
    pub fn arity(&self) -> usize {
        self.parts.len()
    }

    /// All components, in order.
    #[must_use]
    pub fn parts(&self) -> &[String] {
        &self.parts
    }

    /// Component `index` as text.
    pub fn str(&self, index: usize) -> Result<&str> {
        self.parts
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| self.malformed(format!("missing component {}", index + 1)))
    }

    /// Component `index` parsed as an integer.
    pub fn int(&self, index: usize) -> Result<i64> {
        let raw = self.str(index)?;
        raw.parse::<i64>().map_err(|_| {
            self.malformed(format!(
                "component {} ({raw:?}) is not an integer",
                index + 1
            ))
        })
    }

    /// Encode back into an opaque reference.
    #[must_use]
    pub fn to_ref(&self) -> RemoteObjectRef {
        RemoteObjectRef(self.to_string())
    }

    fn malformed(&self, reason: String) -> Error {
        let expected = match self.format {
            Some(format) => format.to_string(),
            None => format!("{} '{SEPARATOR}'-separated components", self.arity()),
        };
        Error::malformed(self.to_string(), expected, reason)
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.parts.join(&SEPARATOR.to_string()))
    }
}

/// Opaque, provider-assigned identifier of one remote object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteObjectRef(String);

impl RemoteObjectRef {
    /// Wrap identifier text, e.g. typed by a user for import.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identifier text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode against a kind's format.
    pub fn decode(&self, format: &IdFormat) -> Result<CompositeKey> {
        format.decode(&self.0)
    }
}

impl fmt::Display for RemoteObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
