//! Minimal GitLab REST client for the managed kinds.
//!
//! # Example
//!
//! ```no_run
//! use labapi::{Api, HttpApi, DEFAULT_BASE_URL};
//! use std::time::Duration;
//!
//! let api = HttpApi::new(DEFAULT_BASE_URL, Some("glpat-xxxx".into()), Duration::from_secs(30));
//! let me = api.current_user()?;
//! println!("{} ({})", me.name, me.username);
//! # Ok::<(), labapi::Error>(())
//! ```

pub mod backend;
pub mod error;
pub mod types;

pub use backend::http::DEFAULT_BASE_URL;
pub use backend::{Api, HttpApi, MockApi};
pub use error::{Error, Result};
pub use types::{
    AllowedTo, Badge, BadgeOptions, BranchAccess, GroupMember, ListOptions, MemberOptions,
    Milestone, ProtectBranchOptions, ProtectedBranch, Release, ReleaseLink, ReleaseLinkOptions,
    ReleaseOptions, UpdateProtectedBranchOptions, UpdateReleaseOptions, User, Variable,
    VariableOptions,
};
