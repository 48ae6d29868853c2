//! Scrapes a sectioned, JavaScript-rendered product catalog into an xlsx
//! spreadsheet.
//!
//! The pipeline is linear: launch Chrome, open the catalog, walk every
//! section tab and its result pages ([`navigator`]), parse each rendered
//! snapshot ([`extract`]), and write everything once at the end
//! ([`export`]).

pub mod browser;
pub mod config;
pub mod export;
pub mod extract;
pub mod navigator;
pub mod record;

pub use browser::{BrowserError, ChromeSession, Driver};
pub use config::{ScrapeConfig, Selectors, SettleDelay, Timing};
pub use export::ResultTable;
pub use extract::{Field, PageExtraction, PageExtractor};
pub use navigator::{CrawlReport, Navigator};
pub use record::ProductRecord;
