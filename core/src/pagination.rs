//! Multi-page result collection.
//!
//! The server reports record and page totals alongside a listing. Given the
//! rows of the first page, [`TableClient::collect_range`] replays the listing
//! request for each following page and concatenates the rows.

use serde_json::Value;

use crate::client::TableClient;
use crate::error::ApiError;
use crate::filter::Operator;
use crate::response::Pagination;
use crate::transport::Transport;

/// Filter the server reads the page number from.
pub const PAGE_FILTER: &str = "page";

/// Totals reported by the last listing call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaginationState {
    pub total_records: u64,
    pub total_pages: u64,
}

impl PaginationState {
    pub fn update(&mut self, reported: Pagination) {
        self.total_records = reported.total_records;
        self.total_pages = reported.total_pages;
    }
}

impl<T: Transport> TableClient<T> {
    /// Append the rows of pages `start_page + 1 ..= end_page` to `first_page`.
    ///
    /// `first_page` must come from the listing call made just before; that
    /// call's request is replayed with the `page` filter overridden, and its
    /// page total bounds `end_page`. On success the record total is set to the
    /// number of collected rows.
    pub fn collect_range(
        &mut self,
        first_page: Vec<Value>,
        start_page: u64,
        end_page: u64,
    ) -> Result<Vec<Value>, ApiError> {
        let start = start_page.max(1);
        let end = end_page.min(self.pagination.total_pages);
        let listing = self.pending.clone();
        // Replays carry the listing's own sort, not directives queued since.
        self.ordering.take_header();

        let mut rows = first_page;
        if let Some(listing) = listing {
            for page in start.saturating_add(1)..=end {
                let mut request = listing.clone();
                request.filters.set(PAGE_FILTER, Operator::Eq, page);
                tracing::debug!(endpoint = %request.endpoint, page, last = end, "fetching page");

                match self.send(request)? {
                    Value::Array(more) => rows.extend(more),
                    Value::Null => {}
                    other => rows.push(other),
                }
            }
        }

        self.pagination.total_records = rows.len() as u64;
        Ok(rows)
    }
}
