use std::fmt;

use futures::stream::{self, StreamExt};
use log::{error, info};
use tokio_util::sync::CancellationToken;

use crate::{
    collector::{CollectionResult, CollectorSettings, PaginatedCollector, Termination},
    config::ScrapingConfig,
    error::SinkError,
    listing_parser::{ListingParser, MemberRecord},
    requests::{FetchClient, PageFetcher},
    session::CredentialStore,
    sink::AggregationSink,
};

/// Everything one run needs, built from an explicit config.
pub struct ScrapingContext<F: PageFetcher> {
    pub fetcher: F,
    pub parser: ListingParser,
    pub collector_settings: CollectorSettings,
    pub concurrency: usize,
}

impl ScrapingContext<FetchClient> {
    /// Loads the stored session and wires it into a proxy client. A missing
    /// or broken session store stops the run here.
    pub fn from_config(config: &ScrapingConfig) -> anyhow::Result<Self> {
        let session = CredentialStore::new(&config.session_path).load()?;
        let fetcher = FetchClient::new(config.proxy.clone(), session)?;
        Self::new(fetcher, config.collector, config.concurrency)
    }
}

impl<F: PageFetcher> ScrapingContext<F> {
    pub fn new(
        fetcher: F,
        collector_settings: CollectorSettings,
        concurrency: usize,
    ) -> anyhow::Result<Self> {
        let parser = ListingParser::new()?;
        Ok(ScrapingContext {
            fetcher,
            parser,
            collector_settings,
            concurrency: concurrency.max(1),
        })
    }

    /// Collects every source. With a concurrency of one the sources are
    /// walked strictly one after another; otherwise up to `concurrency`
    /// sources run at once. Results always come back in source order and a
    /// failing source never affects the others.
    pub async fn collect_all(
        &self,
        sources: &[String],
        cancel: &CancellationToken,
    ) -> Vec<CollectionResult> {
        let collector = PaginatedCollector::new(&self.fetcher, &self.parser, self.collector_settings);
        stream::iter(sources)
            .map(|source| collector.collect(source, cancel))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// Collects all sources, then hands everything gathered (including
    /// partial results of failed or interrupted sources) to the sink once.
    pub async fn run(
        &self,
        sources: &[String],
        sink: &AggregationSink,
        cancel: &CancellationToken,
    ) -> RunReport {
        let results = self.collect_all(sources, cancel).await;
        let total: usize = results.iter().map(|r| r.records.len()).sum();
        info!("Total number of researchers extracted: {total}");

        let write = sink.write(results.iter().map(|r| r.records.as_slice()));
        match &write {
            Ok(rows) => info!("Data saved to {} ({rows} rows)", sink.destination().display()),
            Err(e) => error!("{e}"),
        }

        RunReport {
            sources: results.into_iter().map(SourceSummary::from).collect(),
            write,
        }
    }
}

#[derive(Debug)]
pub enum SourceStatus {
    Complete,
    PageCap,
    Interrupted,
    Failed(String),
}

#[derive(Debug)]
pub struct SourceSummary {
    pub source: String,
    pub records: Vec<MemberRecord>,
    pub pages_fetched: u32,
    pub nameless_entries: usize,
    pub status: SourceStatus,
}

impl From<CollectionResult> for SourceSummary {
    fn from(result: CollectionResult) -> Self {
        let status = match result.termination {
            Termination::Exhausted { .. } => SourceStatus::Complete,
            Termination::PageCap { .. } => SourceStatus::PageCap,
            Termination::Interrupted { .. } => SourceStatus::Interrupted,
            Termination::Failed(error) => SourceStatus::Failed(error.to_string()),
        };
        SourceSummary {
            source: result.source,
            records: result.records,
            pages_fetched: result.pages_fetched,
            nameless_entries: result.nameless_entries,
            status,
        }
    }
}

/// What the operator sees at the end of a run.
#[derive(Debug)]
pub struct RunReport {
    pub sources: Vec<SourceSummary>,
    pub write: Result<usize, SinkError>,
}

impl RunReport {
    pub fn failed_sources(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| matches!(s.status, SourceStatus::Failed(_)))
            .count()
    }

    pub fn total_records(&self) -> usize {
        self.sources.iter().map(|s| s.records.len()).sum()
    }

    pub fn write_succeeded(&self) -> bool {
        self.write.is_ok()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for summary in &self.sources {
            let status = match &summary.status {
                SourceStatus::Complete => "ok".to_string(),
                SourceStatus::PageCap => "stopped at page cap".to_string(),
                SourceStatus::Interrupted => "interrupted".to_string(),
                SourceStatus::Failed(error) => format!("FAILED: {error}"),
            };
            write!(
                f,
                "{}: {} records, {} pages",
                summary.source,
                summary.records.len(),
                summary.pages_fetched
            )?;
            if summary.nameless_entries > 0 {
                write!(f, ", {} nameless entries skipped", summary.nameless_entries)?;
            }
            writeln!(f, " [{status}]")?;
        }
        writeln!(
            f,
            "{} records from {} sources, {} failed",
            self.total_records(),
            self.sources.len(),
            self.failed_sources()
        )?;
        match &self.write {
            Ok(rows) => write!(f, "write ok: {rows} rows"),
            Err(e) => write!(f, "write FAILED: {e}"),
        }
    }
}
