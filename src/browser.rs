//! Browser control over the Chrome DevTools Protocol.
//!
//! The navigator only talks to the [`Driver`] trait; [`ChromeSession`] is the
//! real implementation on top of `headless_chrome`.

use crate::config::BrowserOptions;
use headless_chrome::{Browser, Element, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info};

const DETACH_POLL: Duration = Duration::from_millis(100);

/// DevTools errors meaning the node, or the document that held it, no
/// longer exists.
const NODE_GONE: [&str; 5] = [
    "Cannot find context with specified id",
    "Could not find object with given id",
    "No node with given id found",
    "Execution context was destroyed",
    "Inspected target navigated or closed",
];

fn is_node_gone(message: &str) -> bool {
    NODE_GONE.iter().any(|needle| message.contains(needle))
}

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("no element matches {selector:?}")]
    NotFound { selector: String },
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },
    #[error("{action} failed: {message}")]
    Protocol {
        action: &'static str,
        message: String,
    },
}

impl BrowserError {
    fn protocol(action: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Protocol {
            action,
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BrowserError>;

/// A live, scriptable document.
///
/// Handles are only valid until the next navigation that replaces the nodes
/// they point at; callers re-query instead of holding them across clicks.
pub trait Driver {
    type Handle<'a>
    where
        Self: 'a;

    fn navigate(&self, url: &str) -> Result<()>;

    /// Every element matching `selector`; empty when nothing matches.
    fn find_all(&self, selector: &str) -> Result<Vec<Self::Handle<'_>>>;

    /// First element matching `selector`, or [`BrowserError::NotFound`].
    fn find(&self, selector: &str) -> Result<Self::Handle<'_>>;

    fn text(&self, handle: &Self::Handle<'_>) -> Result<String>;

    fn click(&self, handle: &Self::Handle<'_>) -> Result<()>;

    fn scroll_into_view(&self, handle: &Self::Handle<'_>) -> Result<()>;

    /// Scroll the window to `fraction` of the document height.
    fn scroll_to_fraction(&self, fraction: f64) -> Result<()>;

    /// Block until an element matching `selector` exists.
    fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Block until `handle` is no longer attached to the document.
    fn wait_until_detached(&self, handle: &Self::Handle<'_>, timeout: Duration) -> Result<()>;

    /// Fully rendered markup of the current document.
    fn content(&self) -> Result<String>;
}

pub struct ChromeSession {
    browser: Browser,
    tab: Arc<Tab>,
}

impl ChromeSession {
    pub fn launch(opts: &BrowserOptions) -> Result<Self> {
        info!(
            headless = opts.headless,
            width = opts.window_size.0,
            height = opts.window_size.1,
            "launching chrome"
        );

        let args: Vec<&OsStr> = vec![
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--no-first-run"),
            OsStr::new("--no-default-browser-check"),
        ];
        let launch_opts = LaunchOptions::default_builder()
            .headless(opts.headless)
            .window_size(Some(opts.window_size))
            .idle_browser_timeout(opts.idle_timeout)
            .args(args)
            .build()
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let browser = Browser::new(launch_opts).map_err(|e| BrowserError::Launch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| BrowserError::protocol("open tab", e))?;

        if let Some(ua) = &opts.user_agent {
            tab.set_user_agent(ua, None, None)
                .map_err(|e| BrowserError::protocol("set user agent", e))?;
        }

        Ok(Self { browser, tab })
    }

    pub fn close(self) {
        info!("closing browser");
        drop(self.tab);
        drop(self.browser);
    }

    fn count(&self, selector: &str) -> Result<u64> {
        let literal = serde_json::to_string(selector).map_err(|e| BrowserError::protocol("encode selector", e))?;
        let script = format!("document.querySelectorAll({}).length", literal);
        let value = self
            .tab
            .evaluate(&script, false)
            .map_err(|e| BrowserError::protocol("count elements", e))?
            .value;
        Ok(value.and_then(|v| v.as_u64()).unwrap_or(0))
    }
}

impl Driver for ChromeSession {
    type Handle<'a> = Element<'a>;

    fn navigate(&self, url: &str) -> Result<()> {
        debug!(url, "navigating");
        self.tab
            .navigate_to(url)
            .map_err(|e| BrowserError::protocol("navigate", e))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| BrowserError::protocol("wait for navigation", e))?;
        Ok(())
    }

    fn find_all(&self, selector: &str) -> Result<Vec<Element<'_>>> {
        if self.count(selector)? == 0 {
            return Ok(Vec::new());
        }
        // The nodes may vanish between the count and the query.
        match self.tab.find_elements(selector) {
            Ok(elements) => Ok(elements),
            Err(e) => {
                debug!(selector, error = %e, "elements disappeared before lookup");
                Ok(Vec::new())
            }
        }
    }

    fn find(&self, selector: &str) -> Result<Element<'_>> {
        self.tab.find_element(selector).map_err(|_| BrowserError::NotFound {
            selector: selector.to_string(),
        })
    }

    fn text(&self, handle: &Element<'_>) -> Result<String> {
        handle
            .get_inner_text()
            .map_err(|e| BrowserError::protocol("read element text", e))
    }

    fn click(&self, handle: &Element<'_>) -> Result<()> {
        handle
            .click()
            .map(|_| ())
            .map_err(|e| BrowserError::protocol("click", e))
    }

    fn scroll_into_view(&self, handle: &Element<'_>) -> Result<()> {
        handle
            .scroll_into_view()
            .map(|_| ())
            .map_err(|e| BrowserError::protocol("scroll into view", e))
    }

    fn scroll_to_fraction(&self, fraction: f64) -> Result<()> {
        let script = format!(
            "window.scrollTo(0, document.body.scrollHeight * {});",
            fraction
        );
        self.tab
            .evaluate(&script, false)
            .map(|_| ())
            .map_err(|e| BrowserError::protocol("scroll window", e))
    }

    fn wait_for(&self, selector: &str, timeout: Duration) -> Result<()> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map(|_| ())
            .map_err(|_| BrowserError::Timeout {
                what: format!("element {:?}", selector),
                after: timeout,
            })
    }

    fn wait_until_detached(&self, handle: &Element<'_>, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            let connected = match handle.call_js_fn("function() { return this.isConnected; }", vec![], false) {
                Ok(obj) => match obj.value.as_ref().and_then(|v| v.as_bool()) {
                    Some(connected) => connected,
                    None => {
                        return Err(BrowserError::protocol(
                            "check element attachment",
                            format!("isConnected returned {:?}", obj.value),
                        ))
                    }
                },
                Err(e) => {
                    let message = format!("{:#}", e);
                    if !is_node_gone(&message) {
                        return Err(BrowserError::protocol("check element attachment", message));
                    }
                    debug!(reason = %message, "clicked element's context is gone");
                    false
                }
            };
            if !connected {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout {
                    what: "clicked element to detach".to_string(),
                    after: timeout,
                });
            }
            std::thread::sleep(DETACH_POLL);
        }
    }

    fn content(&self) -> Result<String> {
        self.tab
            .get_content()
            .map_err(|e| BrowserError::protocol("read page content", e))
    }
}
