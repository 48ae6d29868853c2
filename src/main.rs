use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use shelfscrape::{
    config::{DEFAULT_OUTPUT, DEFAULT_URL},
    ChromeSession, CrawlReport, Driver, Navigator, PageExtractor, ResultTable, ScrapeConfig,
    Selectors, Timing,
};
use std::{path::PathBuf, time::Duration};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about = "Scrape a sectioned product catalog into a spreadsheet")]
struct Cli {
    /// Catalog page to start from
    #[arg(default_value = DEFAULT_URL)]
    url: String,
    /// Where to write the spreadsheet (overwritten)
    #[arg(long, short, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,
    /// JSON file overriding some or all CSS selectors
    #[arg(long)]
    selectors: Option<PathBuf>,
    /// Run Chrome without a visible window
    #[arg(long)]
    headless: bool,
    /// Seconds to wait for products to appear or a page turn to finish
    #[arg(long, default_value_t = 20)]
    wait_timeout_secs: u64,
    /// Skip the fixed render pauses between steps
    #[arg(long)]
    no_settle: bool,
    /// Send a randomized desktop user agent
    #[arg(long)]
    spoof_ua: bool,
}

impl Cli {
    fn into_config(self) -> Result<ScrapeConfig> {
        let mut config = ScrapeConfig::new(&self.url)?;
        config.output = self.output;
        if let Some(path) = &self.selectors {
            config.selectors = Selectors::from_json_file(path)?;
        }
        let wait_timeout = Duration::from_secs(self.wait_timeout_secs);
        config.timing = if self.no_settle {
            Timing::without_settle(wait_timeout)
        } else {
            Timing {
                wait_timeout,
                ..Timing::default()
            }
        };
        config.browser.headless = self.headless;
        if self.spoof_ua {
            config.browser.user_agent = Some(ua_generator::ua::spoof_ua().to_string());
        }
        Ok(config)
    }
}

#[derive(Serialize)]
struct RunSummary {
    input_url: String,
    output_path: String,
    started_at: String,
    elapsed_ms: u64,
    rows_written: usize,
    #[serde(flatten)]
    crawl: CrawlReport,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let config = Cli::parse().into_config()?;

    // headless_chrome blocks; keep it off the runtime's worker threads.
    let summary = tokio::task::spawn_blocking(move || scrape(&config))
        .await
        .context("scrape task panicked")??;

    print_json(summary)
}

fn scrape(config: &ScrapeConfig) -> Result<RunSummary> {
    let started_at = chrono::Local::now();
    let start = std::time::Instant::now();

    let extractor = PageExtractor::new(&config.selectors)?;

    let session = ChromeSession::launch(&config.browser).context("headless-chrome launch failed")?;
    session
        .navigate(config.start_url.as_str())
        .with_context(|| format!("cannot open {}", config.start_url))?;
    config.timing.initial_load.settle();

    let mut table = ResultTable::new();
    let crawl = Navigator::new(&session, &config.selectors, &config.timing, &extractor)
        .run(&mut table)
        .context("crawl aborted")?;
    session.close();

    let rows_written = table
        .export(&config.output)
        .context("failed to save collected products")?;
    info!(path = %config.output.display(), rows_written, "scraping completed");

    Ok(RunSummary {
        input_url: config.start_url.to_string(),
        output_path: config.output.display().to_string(),
        started_at: started_at.to_rfc3339(),
        elapsed_ms: start.elapsed().as_millis() as u64,
        rows_written,
        crawl,
    })
}

fn print_json<T: Serialize>(v: T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&v)?);
    Ok(())
}
