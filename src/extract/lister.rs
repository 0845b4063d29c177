//! Paginated, glob-filtered object listing
//!
//! Pages are fetched lazily, one at a time, only once the previous page has
//! been fully consumed, so a caller that stops asking stops the listing.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::backend::{ListRequest, ListedObject, RemoteStore};
use crate::config::GlobLimits;
use crate::error::{ExtractError, Result};

use super::glob::KeyMatcher;

/// Why the listing stopped forwarding objects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingEnd {
    /// Still open
    Open,
    /// The store returned its last page
    Exhausted,
    /// `max_objects_matched` was reached
    MatchLimit,
    /// The next object would have exceeded `max_total_size`
    SizeLimit,
}

impl ListingEnd {
    pub fn is_truncated(&self) -> bool {
        matches!(self, ListingEnd::MatchLimit | ListingEnd::SizeLimit)
    }
}

/// Lazy, single-pass sequence of objects whose keys match a glob
pub struct ObjectLister {
    store: Arc<dyn RemoteStore>,
    matcher: KeyMatcher,
    limits: GlobLimits,
    request: ListRequest,
    cancel: CancellationToken,

    buffer: VecDeque<ListedObject>,
    next_token: Option<String>,
    end: ListingEnd,

    pages: usize,
    listed: u64,
    matched: usize,
    total_size: u64,
}

impl ObjectLister {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        matcher: KeyMatcher,
        limits: GlobLimits,
        cancel: CancellationToken,
    ) -> Self {
        let limits = limits.effective();
        let request = ListRequest::new(matcher.listing_prefix(), limits.page_size);
        Self {
            store,
            matcher,
            limits,
            request,
            cancel,
            buffer: VecDeque::new(),
            next_token: None,
            end: ListingEnd::Open,
            pages: 0,
            listed: 0,
            matched: 0,
            total_size: 0,
        }
    }

    /// Next matching object, or `None` once the listing ended or was truncated
    ///
    /// # Errors
    ///
    /// Returns `ExtractError::ResourceExhausted` when more than
    /// `max_objects_listed` keys have been enumerated, and
    /// `ExtractError::Cancelled` if the token fires while a page is in flight.
    pub async fn next_object(&mut self) -> Result<Option<ListedObject>> {
        loop {
            if self.end != ListingEnd::Open {
                return Ok(None);
            }
            if self.matched >= self.limits.max_objects_matched {
                return Ok(self.finish(ListingEnd::MatchLimit));
            }

            let Some(object) = self.buffer.pop_front() else {
                if self.pages > 0 && self.next_token.is_none() {
                    return Ok(self.finish(ListingEnd::Exhausted));
                }
                self.fetch_page().await?;
                continue;
            };

            if !self.matcher.matches(&object.key) {
                continue;
            }
            if self.total_size.saturating_add(object.size) > self.limits.max_total_size {
                tracing::debug!(
                    key = %object.key,
                    size = object.size,
                    total_size = self.total_size,
                    "Listing truncated at size limit"
                );
                return Ok(self.finish(ListingEnd::SizeLimit));
            }

            self.matched += 1;
            self.total_size += object.size;
            return Ok(Some(object));
        }
    }

    async fn fetch_page(&mut self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }

        let page = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(ExtractError::Cancelled),
            page = self.store.list_page(&self.request, self.next_token.as_deref()) => page?,
        };

        self.pages += 1;
        self.listed += page.objects.len() as u64;
        tracing::debug!(
            page = self.pages,
            objects = page.objects.len(),
            listed = self.listed,
            more = page.next_token.is_some(),
            "Listed page"
        );

        if self.listed > self.limits.max_objects_listed {
            return Err(ExtractError::ResourceExhausted {
                limit: self.limits.max_objects_listed,
                message: format!(
                    "pattern '{}' enumerated more than {} objects",
                    self.matcher.pattern(),
                    self.limits.max_objects_listed
                ),
            });
        }

        self.buffer.extend(page.objects);
        self.next_token = page.next_token;
        Ok(())
    }

    fn finish(&mut self, end: ListingEnd) -> Option<ListedObject> {
        self.end = end;
        self.buffer.clear();
        None
    }

    /// How the listing ended; `Open` while objects may still follow
    pub fn end(&self) -> ListingEnd {
        self.end
    }

    /// Pages requested from the store
    pub fn pages(&self) -> usize {
        self.pages
    }

    /// Objects enumerated, matched or not
    pub fn listed_count(&self) -> u64 {
        self.listed
    }

    /// Objects forwarded to the caller
    pub fn matched_count(&self) -> usize {
        self.matched
    }

    /// Cumulative size of forwarded objects
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn pattern(&self) -> &str {
        self.matcher.pattern()
    }
}
