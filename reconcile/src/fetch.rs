//! Paginated collection fetching with an offset cursor.
//!
//! The backend's list endpoints report `total_num` unreliably: it can be
//! stale, absent, or smaller than what the pages actually hold. The only
//! trustworthy termination signal is an empty page, so the loop always
//! runs until one arrives or the advertised total is met, whichever comes
//! first. A hard page cap guards against a backend that never drains.

use crate::document::Record;
use crate::errors::ReconcileError;
use crate::metrics_defs::{FETCH_PAGES, FETCH_RECORDS};
use std::future::Future;
use transport::{counter, histogram};

/// Upper bound on page requests per fetch. A well-behaved backend drains
/// in a handful of pages; hitting this means the offset cursor is not
/// advancing server-side.
pub const MAX_PAGE_FETCHES: u32 = 1000;

/// One page of a list response, already decoded.
#[derive(Clone, Debug, Default)]
pub struct CollectionPage {
    pub records: Vec<Record>,
    /// The backend's advertised total; treated as a hint, not a contract.
    pub total: Option<u64>,
    /// The offset this page was requested at.
    pub offset: u64,
}

struct FetchCursor {
    offset: u64,
    accumulated: Vec<Record>,
}

impl FetchCursor {
    fn new() -> Self {
        FetchCursor {
            offset: 0,
            accumulated: Vec::new(),
        }
    }

    /// Advances by the number of records actually received, not by the
    /// requested page size. Short pages move the cursor short.
    fn absorb(&mut self, page: CollectionPage) {
        self.offset += page.records.len() as u64;
        self.accumulated.extend(page.records);
    }
}

/// Drains a paginated collection by calling `fetch_page` with successive
/// offsets until the backend returns an empty page or the advertised
/// total is reached.
pub async fn fetch_all<F, Fut>(
    operation: &str,
    mut fetch_page: F,
) -> Result<Vec<Record>, ReconcileError>
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<CollectionPage, ReconcileError>>,
{
    let mut cursor = FetchCursor::new();

    for _ in 0..MAX_PAGE_FETCHES {
        let page = fetch_page(cursor.offset).await?;
        counter!(FETCH_PAGES).increment(1);

        if page.records.is_empty() {
            tracing::debug!(
                operation,
                records = cursor.accumulated.len(),
                "collection drained on empty page"
            );
            histogram!(FETCH_RECORDS).record(cursor.accumulated.len() as f64);
            return Ok(cursor.accumulated);
        }

        let total = page.total;
        cursor.absorb(page);

        if let Some(total) = total
            && cursor.accumulated.len() as u64 >= total
        {
            tracing::debug!(
                operation,
                records = cursor.accumulated.len(),
                total,
                "collection drained at advertised total"
            );
            histogram!(FETCH_RECORDS).record(cursor.accumulated.len() as f64);
            return Ok(cursor.accumulated);
        }
    }

    Err(ReconcileError::PaginationDiverged {
        operation: operation.to_string(),
        pages: MAX_PAGE_FETCHES,
    })
}
