//! Error types for reconciliation operations.
//!
//! Every failure the core can produce is one variant of [`Error`]. Variants are
//! grouped into an [`ErrorCategory`] so callers can decide how to surface them:
//! identifier and schema mismatches are always surfaced, while `NotFound` is
//! contextual (drift during a refresh, fatal during a lookup or import).

use std::fmt;

/// Result type alias for reconciliation operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The remote operation an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    List,
}

impl Operation {
    /// Lowercase verb used in messages.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::List => "list",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Categories of reconciliation errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Composite identifier text could not be decoded.
    Identifier,
    /// The remote returned a value the schema does not know.
    Schema,
    /// The object does not exist remotely.
    NotFound,
    /// The remote refused the request (validation, conflict, permission).
    Rejected,
    /// A destroy or verification did not converge.
    Convergence,
    /// A listing could not be driven to completion.
    Pagination,
    /// The caller cancelled the operation.
    Cancelled,
    /// The client collaborator failed below the API level.
    Transport,
    /// A desired-state value could not be interpreted.
    Document,
}

impl ErrorCategory {
    /// Whether errors of this category depend on the calling context.
    ///
    /// Only `NotFound` is contextual; everything else is surfaced as-is.
    #[must_use]
    pub fn is_contextual(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Identifier => "Malformed identifier",
            Self::Schema => "Unknown enumeration value",
            Self::NotFound => "Object not found",
            Self::Rejected => "Rejected by the remote API",
            Self::Convergence => "State did not converge",
            Self::Pagination => "Listing could not complete",
            Self::Cancelled => "Cancelled",
            Self::Transport => "Remote call failed",
            Self::Document => "Invalid desired state",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during reconciliation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Composite identifier text does not match the kind's format.
    #[error("malformed identifier {id:?}: {reason} (expected {expected})")]
    MalformedIdentifier {
        /// The text that failed to decode.
        id: String,
        /// Expected format, e.g. `<project>:<badge_id>`.
        expected: String,
        /// What was wrong with it.
        reason: String,
    },

    /// The remote returned a code outside the supported enumeration.
    #[error("unknown {enum_name} value {value}")]
    UnknownEnumValue {
        /// Name of the enumeration.
        enum_name: &'static str,
        /// The offending name or code, as text.
        value: String,
    },

    /// The object is absent remotely.
    #[error("{kind} {key} not found")]
    NotFound {
        /// Managed kind name.
        kind: String,
        /// Natural key of the object.
        key: String,
    },

    /// The remote refused the request.
    #[error("{operation} {kind} {key} rejected: {message}")]
    RemoteRejected {
        kind: String,
        key: String,
        operation: Operation,
        /// HTTP status if the client reported one.
        status: Option<u16>,
        message: String,
    },

    /// Destroy did not converge.
    #[error("delete {kind} {key} failed: {reason}")]
    DeleteFailed {
        kind: String,
        key: String,
        reason: String,
    },

    /// The object diverged from its tracked history during verification.
    #[error("{kind} {key} drifted: {detail}")]
    Drifted {
        kind: String,
        key: String,
        detail: String,
    },

    /// Stuck or inconsistent cursor.
    #[error("pagination error: {detail}")]
    PaginationError { detail: String },

    /// The caller's cancellation signal fired.
    #[error("{operation} cancelled")]
    Cancelled { operation: String },

    /// The client collaborator failed for a reason other than not-found or rejection.
    #[error("{operation} {kind} {key} failed: {message}")]
    Transport {
        kind: String,
        key: String,
        operation: Operation,
        status: Option<u16>,
        message: String,
    },

    /// A desired-state value could not be interpreted for a kind.
    #[error("invalid desired state for {kind}: {message}")]
    Document { kind: String, message: String },

    /// No kind of this class is registered under this name.
    #[error("unknown {class} kind {name:?}")]
    UnknownKind { class: String, name: String },

    /// The executor's worker pool could not start.
    #[error("failed to create thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Two registry entries share a class and name.
    #[error("{class} kind {name:?} is registered twice")]
    DuplicateKind { class: String, name: String },
}

impl Error {
    /// Create a malformed identifier error.
    pub fn malformed(
        id: impl Into<String>,
        expected: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedIdentifier {
            id: id.into(),
            expected: expected.into(),
            reason: reason.into(),
        }
    }

    /// Create an unknown enumeration value error.
    pub fn unknown_enum(enum_name: &'static str, value: impl fmt::Display) -> Self {
        Self::UnknownEnumValue {
            enum_name,
            value: value.to_string(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            key: key.into(),
        }
    }

    /// Create a document error.
    pub fn document(kind: impl Into<String>, message: impl fmt::Display) -> Self {
        Self::Document {
            kind: kind.into(),
            message: message.to_string(),
        }
    }

    /// Classify a failure reported by the client collaborator.
    ///
    /// 404 becomes `NotFound`, any other 4xx becomes `RemoteRejected`, and
    /// everything else (5xx, no status) is a `Transport` failure.
    pub fn from_remote(
        kind: impl Into<String>,
        key: impl Into<String>,
        operation: Operation,
        failure: RemoteFailure,
    ) -> Self {
        let kind = kind.into();
        let key = key.into();
        if failure.is_not_found() {
            return Self::NotFound { kind, key };
        }
        if failure.is_rejection() {
            return Self::RemoteRejected {
                kind,
                key,
                operation,
                status: failure.status,
                message: failure.message,
            };
        }
        Self::Transport {
            kind,
            key,
            operation,
            status: failure.status,
            message: failure.message,
        }
    }

    /// Get the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::MalformedIdentifier { .. } => ErrorCategory::Identifier,
            Error::UnknownEnumValue { .. } => ErrorCategory::Schema,
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::RemoteRejected { .. } => ErrorCategory::Rejected,
            Error::DeleteFailed { .. } | Error::Drifted { .. } => ErrorCategory::Convergence,
            Error::PaginationError { .. } => ErrorCategory::Pagination,
            Error::Cancelled { .. } => ErrorCategory::Cancelled,
            Error::Transport { .. } | Error::ThreadPool(_) => ErrorCategory::Transport,
            Error::Document { .. } | Error::UnknownKind { .. } | Error::DuplicateKind { .. } => {
                ErrorCategory::Document
            }
        }
    }

    /// Whether this error means the object is absent remotely.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// A failure reported by the remote API client, stripped of transport details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    /// HTTP status code, if the failure came with one.
    pub status: Option<u16>,
    /// Message from the client.
    pub message: String,
}

impl RemoteFailure {
    /// Create a failure with an optional status code.
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Whether the remote reported the object as absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }

    /// Whether the remote refused the request (any 4xx other than 404).
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self.status, Some(s) if (400..500).contains(&s) && s != 404)
    }
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {})", self.message, status),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Error returned by a managed kind's remote calls.
///
/// Kinds mix raw client failures with core errors (unknown enum codes, a
/// listing that fails to paginate). The reconciler attaches kind, key and
/// operation context to the `Remote` side.
#[derive(Debug)]
pub enum CallError {
    Remote(RemoteFailure),
    Core(Error),
}

/// Result type for a managed kind's remote calls.
pub type CallResult<T> = std::result::Result<T, CallError>;

impl From<RemoteFailure> for CallError {
    fn from(failure: RemoteFailure) -> Self {
        Self::Remote(failure)
    }
}

impl From<Error> for CallError {
    fn from(err: Error) -> Self {
        Self::Core(err)
    }
}

impl CallError {
    /// Whether this is a remote not-found.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Remote(failure) => failure.is_not_found(),
            Self::Core(err) => err.is_not_found(),
        }
    }

    /// Attach context and convert into a core error.
    pub fn into_error(self, kind: &str, key: &str, operation: Operation) -> Error {
        match self {
            Self::Remote(failure) => Error::from_remote(kind, key, operation, failure),
            Self::Core(err) => err,
        }
    }
}
