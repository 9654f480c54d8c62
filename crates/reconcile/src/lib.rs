//! # Reconcile
//!
//! Core of a declarative provider for a remote management API: the pieces
//! that turn "this object should exist with these fields" into the right
//! sequence of remote create, read, update and delete calls.
//!
//! ## Core Concepts
//!
//! - **Composite identifier** ([`id`]): several natural keys packed into one
//!   opaque, persisted string
//! - **Wire enums** ([`access`]): name/code translation and grant flattening
//! - **Paginated collector** ([`paginate`]): drives a listing to completion
//! - **Reconciler** ([`reconciler`]): CRUD with not-found semantics per mode
//! - **Existence verifier** ([`verify`]): confirms a destroy converged
//! - **Registry** ([`registry`]) and **plans** ([`plan`], [`executor`]):
//!   apply a desired-state document across many kinds in parallel
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{CancelToken, ReadMode, Reconciler, RemoteObjectRef};
//!
//! let badges = Reconciler::new(ProjectBadges::new(client));
//! let cancel = CancelToken::new();
//!
//! let created = badges.create(&desired, &cancel)?;
//! match badges.read(created.id(), ReadMode::Refresh, &cancel)? {
//!     Some(current) => println!("{:?}", current.state()),
//!     None => println!("drifted away"),
//! }
//! badges.delete(created.id(), Some(&created), &cancel)?;
//! ```
//!
//! ## Provider Traits
//!
//! - [`ManagedKind`]: raw remote calls for one object kind
//! - [`DataSource`]: read-only lookups
//! - [`ProgressCallback`]: receives execution progress
//!
//! The crate never talks to the network itself; kinds wrap whatever client
//! they are given.

pub mod access;
pub mod cancel;
pub mod erased;
pub mod error;
pub mod executor;
pub mod id;
pub mod paginate;
pub mod plan;
pub mod reconciler;
pub mod registry;
pub mod retry;
pub mod types;
pub mod verify;

// Re-export main types at crate root
pub use access::{
    AccessGrant, AccessLevel, FlatGrant, PROTECTED_REF_LEVELS, Principal, UnknownCodePolicy,
    WireEnum, flatten_grants,
};
pub use cancel::CancelToken;
pub use erased::{DataSource, ErasedDataSource, ErasedResource, Handler, TrackedObject};
pub use error::{CallError, CallResult, Error, ErrorCategory, Operation, RemoteFailure, Result};
pub use executor::{ExecuteReport, NoProgress, OpOutcome, ProgressCallback, execute};
pub use id::{CompositeKey, IdFormat, IdPart, RemoteObjectRef};
pub use paginate::{Cursor, Incomplete, Page, collect, collect_all};
pub use plan::{Action, Document, DocumentEntry, Ensure, ExecutionPlan, PlannedOp};
pub use reconciler::{
    Deleted, Lifecycle, ManagedKind, Observation, ReadMode, Reconciler, Updated,
};
pub use registry::{KindClass, KindDescriptor, KindEntry, Registry};
pub use retry::{RetryCallback, RetryConfig, with_backoff};
pub use types::{ApplyResult, ExecuteOptions, ExecuteSummary};
pub use verify::{confirm_absent, ensure_absent};
