//! Shared handle the managed kinds are built from.

use labapi::{Api, ListOptions};
use reconcile::{Cursor, Error, Operation, Page, RetryConfig};
use std::sync::Arc;

/// API handle plus the settings every kind needs.
#[derive(Clone)]
pub struct Client {
    api: Arc<dyn Api>,
    per_page: u32,
    read_retry: RetryConfig,
}

impl Client {
    pub fn new(api: Arc<dyn Api>, per_page: u32, read_retry: RetryConfig) -> Self {
        Self {
            api,
            per_page: per_page.clamp(1, 100),
            read_retry,
        }
    }

    pub fn api(&self) -> &dyn Api {
        self.api.as_ref()
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn read_retry(&self) -> &RetryConfig {
        &self.read_retry
    }

    /// List options for the page a collector cursor points at.
    pub fn list_options(&self, cursor: &Cursor) -> reconcile::Result<ListOptions> {
        match cursor {
            Cursor::Page(page) => Ok(ListOptions::new(*page, self.per_page)),
            Cursor::Token(token) => Err(Error::PaginationError {
                detail: format!("unexpected keyset token {token:?} from an offset listing"),
            }),
        }
    }
}

/// Attach kind and key context to a client failure from a list call.
pub fn list_error(kind: &str, key: &str, err: labapi::Error) -> Error {
    Error::from_remote(kind, key, Operation::List, err.into())
}

/// Attach kind and key context to a client failure from a single read.
pub fn read_error(kind: &str, key: &str, err: labapi::Error) -> Error {
    Error::from_remote(kind, key, Operation::Read, err.into())
}

/// Fetch one page of a listing, mapping client failures to core errors.
pub fn fetch_page<T>(
    client: &Client,
    kind: &str,
    key: &str,
    cursor: &Cursor,
    fetch: impl FnOnce(&ListOptions) -> labapi::Result<Page<T>>,
) -> reconcile::Result<Page<T>> {
    let options = client.list_options(cursor)?;
    fetch(&options).map_err(|err| list_error(kind, key, err))
}
