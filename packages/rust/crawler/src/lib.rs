//! Crawl-and-extract engine for documentation sites.
//!
//! This crate provides:
//! - [`frontier`]: FIFO pending queue and visited set, optionally shared by workers
//! - [`fetch`]: HTTP fetching of frontier URLs
//! - [`extract`]: dual-path content extraction (Markdown, HTML fallback)
//! - [`harvest`]: same-origin link selection feeding the frontier
//! - [`filter`]: persistence filter for low-content records
//! - [`engine`]: the [`Crawler`] itself, single-flow or multi-worker

pub mod engine;
pub mod extract;
pub mod fetch;
pub mod filter;
pub mod frontier;
pub mod harvest;

pub use engine::{CrawlOutput, Crawler};
pub use extract::{ExtractOptions, FetchedBody, classify, extract};
pub use fetch::{Fetcher, RawDocument};
pub use filter::PersistenceFilter;
pub use frontier::{FrontierState, Lease, SharedFrontier};
pub use harvest::LinkHarvester;
