use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_URL: &str = "https://www.kingpower.com/en/collection/duty-free";
pub const DEFAULT_OUTPUT: &str = "data/products.xlsx";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid start url {url:?}: {source}")]
    Url {
        url: String,
        source: url::ParseError,
    },
    #[error("cannot read selector file {path}: {source}")]
    SelectorFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse selector file {path}: {source}")]
    SelectorJson {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// CSS selectors describing the catalog markup.
///
/// Any subset can be overridden from a JSON file; missing keys keep the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selectors {
    pub section_tabs: String,
    pub sub_sections: String,
    pub product_card: String,
    pub title: String,
    pub image: String,
    pub original_price: String,
    pub discounted_price: String,
    pub offer: String,
    pub brand: String,
    pub options: String,
    pub next_page: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            section_tabs: "nav.tw-kp-container-navigation ul.tw-list-none li a".into(),
            sub_sections: "ul.sub-section-nav li a".into(),
            product_card: "div.product-item".into(),
            title: "a.product-title".into(),
            image: "img".into(),
            original_price: "span.original-price".into(),
            discounted_price: "span.discounted-price".into(),
            offer: "div.offer".into(),
            brand: "span.brand-name".into(),
            options: "ul.options li".into(),
            next_page: "a.pagination-next".into(),
        }
    }
}

impl Selectors {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let bytes = std::fs::read(path).map_err(|source| ConfigError::SelectorFile {
            path: path.to_path_buf(),
            source,
        })?;
        let selectors = serde_json::from_slice(&bytes).map_err(|source| ConfigError::SelectorJson {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded selector overrides");
        Ok(selectors)
    }
}

/// An unconditional pause for client-side rendering that has no observable
/// completion signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleDelay(pub Duration);

impl SettleDelay {
    pub const fn secs(secs: u64) -> Self {
        Self(Duration::from_secs(secs))
    }

    pub const fn none() -> Self {
        Self(Duration::ZERO)
    }

    pub fn settle(self) {
        if !self.0.is_zero() {
            std::thread::sleep(self.0);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// After the first navigation, before looking for section tabs.
    pub initial_load: SettleDelay,
    pub after_subsection: SettleDelay,
    /// After the half-page scroll that follows the readiness gate.
    pub after_scroll: SettleDelay,
    pub before_snapshot: SettleDelay,
    /// Between scrolling the next-page control into view and clicking it.
    pub before_page_click: SettleDelay,
    pub after_page_turn: SettleDelay,
    /// Ceiling for condition waits (card presence, next-control detach).
    pub wait_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            initial_load: SettleDelay::secs(3),
            after_subsection: SettleDelay::secs(2),
            after_scroll: SettleDelay::secs(2),
            before_snapshot: SettleDelay::secs(2),
            before_page_click: SettleDelay::secs(1),
            after_page_turn: SettleDelay::secs(2),
            wait_timeout: Duration::from_secs(20),
        }
    }
}

impl Timing {
    /// Zero settle delays, keeping the given wait ceiling.
    pub fn without_settle(wait_timeout: Duration) -> Self {
        Self {
            initial_load: SettleDelay::none(),
            after_subsection: SettleDelay::none(),
            after_scroll: SettleDelay::none(),
            before_snapshot: SettleDelay::none(),
            before_page_click: SettleDelay::none(),
            after_page_turn: SettleDelay::none(),
            wait_timeout,
        }
    }

    pub fn immediate() -> Self {
        Self::without_settle(Duration::ZERO)
    }
}

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    pub headless: bool,
    pub window_size: (u32, u32),
    pub user_agent: Option<String>,
    pub idle_timeout: Duration,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: false,
            window_size: (1920, 1080),
            user_agent: None,
            idle_timeout: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub start_url: Url,
    pub output: PathBuf,
    pub selectors: Selectors,
    pub timing: Timing,
    pub browser: BrowserOptions,
}

impl ScrapeConfig {
    pub fn new(start_url: &str) -> Result<Self, ConfigError> {
        let start_url = Url::parse(start_url).map_err(|source| ConfigError::Url {
            url: start_url.to_string(),
            source,
        })?;
        Ok(Self {
            start_url,
            output: PathBuf::from(DEFAULT_OUTPUT),
            selectors: Selectors::default(),
            timing: Timing::default(),
            browser: BrowserOptions::default(),
        })
    }
}
