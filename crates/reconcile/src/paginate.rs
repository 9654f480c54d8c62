//! Paginated collector
//!
//! Drives a page-by-page listing to completion. Pages are fetched strictly
//! one after another and their items appended in response order; the
//! collector never reorders. Callers that need a different order apply a
//! stable sort to the returned vector.

use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use log::debug;
use std::fmt;

/// Continuation point of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Cursor {
    /// 1-based page number.
    Page(u32),
    /// Opaque next-page token.
    Token(String),
}

impl Cursor {
    /// The first page of a page-numbered listing.
    #[must_use]
    pub fn first_page() -> Self {
        Self::Page(1)
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Page(n) => write!(f, "page {n}"),
            Self::Token(t) => write!(f, "token {t:?}"),
        }
    }
}

/// One fetched slice of a list response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Where to continue, or `None` on the last page.
    pub next: Option<Cursor>,
}

impl<T> Page<T> {
    /// A page followed by `next`.
    pub fn new(items: Vec<T>, next: Option<Cursor>) -> Self {
        Self { items, next }
    }

    /// The final page of a listing.
    pub fn last(items: Vec<T>) -> Self {
        Self { items, next: None }
    }

    /// Convert the items, keeping the cursor.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            next: self.next,
        }
    }
}

/// A listing that stopped early, with everything gathered before it did.
#[derive(Debug)]
pub struct Incomplete<T> {
    /// Items from the pages fetched successfully.
    pub partial: Vec<T>,
    /// Why collection stopped.
    pub error: Error,
}

impl<T> From<Incomplete<T>> for Error {
    fn from(incomplete: Incomplete<T>) -> Self {
        incomplete.error
    }
}

/// Fetch every page starting at `start` and concatenate the items.
///
/// Stops when a page reports no further cursor or comes back empty. Fails
/// with `PaginationError` if a page names the cursor it was fetched with as
/// its successor, and with `Cancelled` if `cancel` fires between pages; in
/// both cases the items gathered so far are returned in [`Incomplete`].
pub fn collect<T, F>(
    start: Cursor,
    cancel: &CancelToken,
    mut fetch_page: F,
) -> std::result::Result<Vec<T>, Incomplete<T>>
where
    F: FnMut(&Cursor) -> Result<Page<T>>,
{
    let mut items = Vec::new();
    let mut cursor = start;
    let mut fetches = 0usize;

    loop {
        if let Err(error) = cancel.check(format!("listing at {cursor}")) {
            return Err(Incomplete {
                partial: items,
                error,
            });
        }

        let page = match fetch_page(&cursor) {
            Ok(page) => page,
            Err(error) => {
                return Err(Incomplete {
                    partial: items,
                    error,
                });
            }
        };
        fetches += 1;

        let exhausted = page.items.is_empty();
        debug!(
            "fetched {} item(s) at {} (fetch {})",
            page.items.len(),
            cursor,
            fetches
        );
        items.extend(page.items);

        match page.next {
            None => break,
            Some(_) if exhausted => break,
            Some(next) if next == cursor => {
                return Err(Incomplete {
                    partial: items,
                    error: Error::PaginationError {
                        detail: format!(
                            "remote returned {cursor} again after {fetches} fetch(es)"
                        ),
                    },
                });
            }
            Some(next) => cursor = next,
        }
    }

    Ok(items)
}

/// [`collect`] from the first page, discarding partial results on failure.
pub fn collect_all<T, F>(cancel: &CancelToken, fetch_page: F) -> Result<Vec<T>>
where
    F: FnMut(&Cursor) -> Result<Page<T>>,
{
    collect(Cursor::first_page(), cancel, fetch_page).map_err(Error::from)
}
