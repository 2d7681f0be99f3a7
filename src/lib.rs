mod collector;
mod config;
mod error;
mod listing_parser;
mod ratelimit;
mod requests;
mod scraping_context;
mod session;
mod sink;
mod text_manipulators;

pub use collector::{CollectionResult, CollectorSettings, PageCursor, PaginatedCollector, Termination};
pub use config::{LoadFromEnv, Overrides, ScrapingConfig, ScrapingEnv, SessionEnv};
pub use error::{ConfigError, FetchError, PersistenceError, SinkError};
pub use listing_parser::{FieldLookup, ListingParser, MemberRecord, ParsedPage};
pub use requests::{FetchClient, PageFetcher, PageResult, ProxySettings};
pub use scraping_context::{RunReport, ScrapingContext, SourceStatus, SourceSummary};
pub use session::{CredentialStore, SessionToken};
pub use sink::{AggregationSink, COLUMNS, read_dataset};
