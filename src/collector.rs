use log::{info, warn};
use tokio_util::sync::CancellationToken;

use crate::{
    error::FetchError,
    listing_parser::{ListingParser, MemberRecord, ParsedPage},
    requests::PageFetcher,
};

/// Page numbers `start..=max_pages`, in order.
///
/// The listing itself signals its end with an empty page; the cap only exists
/// so a change in that signal cannot make collection run forever. A cursor can
/// be restarted from any page with [`PageCursor::starting_at`].
#[derive(Debug, Clone)]
pub struct PageCursor {
    next: u32,
    max_pages: u32,
}

impl PageCursor {
    pub fn new(max_pages: u32) -> Self {
        Self::starting_at(1, max_pages)
    }

    pub fn starting_at(page: u32, max_pages: u32) -> Self {
        Self {
            next: page.max(1),
            max_pages,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.next > self.max_pages
    }
}

impl Iterator for PageCursor {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.is_exhausted() {
            return None;
        }
        let page = self.next;
        self.next += 1;
        Some(page)
    }
}

/// Why collection of a source stopped.
#[derive(Debug)]
pub enum Termination {
    /// `last_page` had no member entries.
    Exhausted { last_page: u32 },
    /// The hard page cap was reached before an empty page was seen.
    PageCap { max_pages: u32 },
    /// The run was cancelled before the listing ended.
    Interrupted { next_page: u32 },
    Failed(FetchError),
}

/// Everything collected for one source, in page-then-appearance order.
#[derive(Debug)]
pub struct CollectionResult {
    pub source: String,
    pub records: Vec<MemberRecord>,
    pub pages_fetched: u32,
    pub nameless_entries: usize,
    pub termination: Termination,
}

impl CollectionResult {
    pub fn error(&self) -> Option<&FetchError> {
        match &self.termination {
            Termination::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error().is_some()
    }
}

/// Collection knobs that are fixed for the whole run.
#[derive(Debug, Clone, Copy)]
pub struct CollectorSettings {
    pub max_pages: u32,
    /// Fetch an empty page a second time when the previous page had members.
    pub recheck_empty_pages: bool,
}

enum PageOutcome {
    Members(ParsedPage),
    Empty,
}

pub struct PaginatedCollector<'a, F: PageFetcher> {
    fetcher: &'a F,
    parser: &'a ListingParser,
    settings: CollectorSettings,
}

impl<'a, F: PageFetcher> PaginatedCollector<'a, F> {
    pub fn new(fetcher: &'a F, parser: &'a ListingParser, settings: CollectorSettings) -> Self {
        Self {
            fetcher,
            parser,
            settings,
        }
    }

    /// Walks the source's pages from 1 until an empty page, a fetch failure,
    /// the page cap or cancellation. Records gathered before a failure or
    /// cancellation are kept in the result.
    pub async fn collect(&self, source: &str, cancel: &CancellationToken) -> CollectionResult {
        info!("Scraping members from {source}");
        let mut result = CollectionResult {
            source: source.to_string(),
            records: Vec::new(),
            pages_fetched: 0,
            nameless_entries: 0,
            termination: Termination::PageCap {
                max_pages: self.settings.max_pages,
            },
        };

        for page in PageCursor::new(self.settings.max_pages) {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    warn!("Interrupted {source} before page {page}");
                    result.termination = Termination::Interrupted { next_page: page };
                    break;
                }
                outcome = self.fetch_and_parse(source, page, &mut result.pages_fetched) => outcome,
            };

            match outcome {
                Ok(PageOutcome::Members(parsed)) => {
                    info!("Found {} members on page {page}", parsed.records.len());
                    result.nameless_entries += parsed.nameless_entries;
                    result.records.extend(parsed.records);
                }
                Ok(PageOutcome::Empty) => {
                    info!("No members found on page {page}. Ending pagination for {source}.");
                    result.termination = Termination::Exhausted { last_page: page };
                    break;
                }
                Err(error) => {
                    warn!("Aborting {source}: {error}");
                    result.termination = Termination::Failed(error);
                    break;
                }
            }
        }

        if let Termination::PageCap { max_pages } = result.termination {
            warn!("Stopped {source} at the page cap of {max_pages}; the listing may continue");
        }
        info!(
            "Collected {} members from {source} over {} page(s)",
            result.records.len(),
            result.pages_fetched
        );
        result
    }

    async fn fetch_and_parse(
        &self,
        source: &str,
        page: u32,
        pages_fetched: &mut u32,
    ) -> Result<PageOutcome, FetchError> {
        let fetched = self.fetcher.fetch_page(source, page).await?;
        *pages_fetched += 1;
        let parsed = self.parser.parse_page(&fetched.body);
        if parsed.entry_count() > 0 {
            return Ok(PageOutcome::Members(parsed));
        }

        // An empty page straight after a full one may be a proxy hiccup
        // rather than the end of the listing.
        if self.settings.recheck_empty_pages && page > 1 {
            warn!("Page {page} of {source} came back empty, fetching it once more");
            let refetched = self.fetcher.fetch_page(source, page).await?;
            *pages_fetched += 1;
            let parsed = self.parser.parse_page(&refetched.body);
            if parsed.entry_count() > 0 {
                return Ok(PageOutcome::Members(parsed));
            }
        }
        Ok(PageOutcome::Empty)
    }
}
