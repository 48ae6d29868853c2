//! Walks catalog sections and their result pages.

use crate::browser::{BrowserError, Driver};
use crate::config::{Selectors, Timing};
use crate::export::ResultTable;
use crate::extract::PageExtractor;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ClickFailed,
    NotReady,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSection {
    pub section: String,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CrawlReport {
    pub sections_found: usize,
    pub sections_scraped: usize,
    pub sections_skipped: Vec<SkippedSection>,
    pub pages_scraped: usize,
    pub records: usize,
    /// Fields whose node was present but unusable; they are null in the table.
    pub malformed_fields: usize,
}

pub struct Navigator<'a, D: Driver> {
    driver: &'a D,
    selectors: &'a Selectors,
    timing: &'a Timing,
    extractor: &'a PageExtractor,
}

impl<'a, D: Driver> Navigator<'a, D> {
    pub fn new(driver: &'a D, selectors: &'a Selectors, timing: &'a Timing, extractor: &'a PageExtractor) -> Self {
        Self {
            driver,
            selectors,
            timing,
            extractor,
        }
    }

    /// Visit every section, appending what each yields to `table`.
    ///
    /// Only a failure to enumerate sections or to snapshot a page aborts the
    /// crawl; everything else skips the affected unit of work.
    pub fn run(&self, table: &mut ResultTable) -> Result<CrawlReport, BrowserError> {
        let mut report = CrawlReport {
            sections_found: self.driver.find_all(&self.selectors.section_tabs)?.len(),
            ..CrawlReport::default()
        };
        info!(count = report.sections_found, "found section tabs");
        if report.sections_found == 0 {
            warn!(
                selector = %self.selectors.section_tabs,
                "no section tabs found; inspect the nav element and update the selector"
            );
        }

        for index in 0..report.sections_found {
            // Clicking a tab replaces the nav, so earlier handles are dead.
            let tabs = self.driver.find_all(&self.selectors.section_tabs)?;
            let Some(tab) = tabs.get(index) else {
                info!(index, live = tabs.len(), "section list shrank, stopping");
                break;
            };
            let section = self.driver.text(tab).map(|t| t.trim().to_string()).unwrap_or_default();
            info!(section = %section, "processing section");

            if let Err(e) = self.driver.click(tab) {
                warn!(section = %section, error = %e, "error clicking section");
                report.sections_skipped.push(SkippedSection {
                    section,
                    reason: SkipReason::ClickFailed,
                });
                continue;
            }
            drop(tabs);

            self.enter_first_sub_section();

            if let Err(e) = self.driver.wait_for(&self.selectors.product_card, self.timing.wait_timeout) {
                warn!(section = %section, error = %e, "product list not loaded");
                report.sections_skipped.push(SkippedSection {
                    section,
                    reason: SkipReason::NotReady,
                });
                continue;
            }

            if let Err(e) = self.driver.scroll_to_fraction(0.5) {
                warn!(section = %section, error = %e, "could not scroll product list");
            }
            self.timing.after_scroll.settle();

            let pages = self.scrape_pages(&section, table, &mut report)?;
            report.pages_scraped += pages;
            report.sections_scraped += 1;
        }

        info!(
            scraped = report.sections_scraped,
            skipped = report.sections_skipped.len(),
            records = report.records,
            malformed = report.malformed_fields,
            "crawl finished"
        );
        Ok(report)
    }

    fn enter_first_sub_section(&self) {
        let subs = match self.driver.find_all(&self.selectors.sub_sections) {
            Ok(subs) => subs,
            Err(e) => {
                warn!(error = %e, "sub-section lookup failed");
                return;
            }
        };
        let Some(first) = subs.first() else {
            return;
        };
        info!(count = subs.len(), "found sub-sections, clicking the first one");
        match self.driver.click(first) {
            Ok(()) => self.timing.after_subsection.settle(),
            Err(e) => warn!(error = %e, "error clicking sub-section"),
        }
    }

    /// Snapshot, extract, advance; returns the number of pages that yielded
    /// products.
    fn scrape_pages(
        &self,
        section: &str,
        table: &mut ResultTable,
        report: &mut CrawlReport,
    ) -> Result<usize, BrowserError> {
        let mut pages = 0;
        loop {
            self.timing.before_snapshot.settle();
            let html = self.driver.content()?;

            let page = self.extractor.extract(&html, section);
            if page.is_empty() {
                info!(section, "no products found on this page");
                break;
            }
            info!(section, count = page.records.len(), "found products on this page");
            pages += 1;
            report.records += page.records.len();
            report.malformed_fields += page.malformed.len();
            table.extend(page.records);

            if let Err(e) = self.turn_page() {
                info!(section, reason = %e, "no further pages, moving on");
                break;
            }
        }
        Ok(pages)
    }

    fn turn_page(&self) -> Result<(), BrowserError> {
        let next = self.driver.find(&self.selectors.next_page)?;
        self.driver.scroll_into_view(&next)?;
        self.timing.before_page_click.settle();
        self.driver.click(&next)?;
        self.driver.wait_until_detached(&next, self.timing.wait_timeout)?;
        self.timing.after_page_turn.settle();
        Ok(())
    }
}
