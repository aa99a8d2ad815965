use chrono::NaiveDate;
use futures::future::join_all;
use std::sync::Arc;
use tracing::{Instrument, info, info_span, warn};
use url::Url;

use super::excel_parser::parse_excel_file;
use super::html_parser::{LinkSelector, RawLink, find_excel_links};
use super::http_client::PageFetcher;
use crate::config::Config;
use crate::db::repository::TradeRepository;
use crate::error::SpimexError;

const TRADE_DATE_FORMAT: &str = "%d.%m.%Y";

/// Totals for one crawl run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub pages_visited: u32,
    pub files_parsed: usize,
    pub rows_inserted: u64,
}

/// Walks the trading-results listing from the newest page backwards and stores
/// every spreadsheet dated on or after the configured start date.
pub struct Crawler {
    config: Arc<Config>,
    fetcher: Arc<dyn PageFetcher>,
    repo: Arc<dyn TradeRepository>,
    selector: LinkSelector,
}

/// A discovered spreadsheet that passed the date check.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ExcelLink {
    url: String,
    trade_date: NaiveDate,
}

/// What a single listing page contributed to the crawl.
#[derive(Debug, Default, PartialEq, Eq)]
struct PagePlan {
    links: Vec<ExcelLink>,
    reached_start_date: bool,
}

impl Crawler {
    pub fn new(
        config: Arc<Config>,
        fetcher: Arc<dyn PageFetcher>,
        repo: Arc<dyn TradeRepository>,
    ) -> Result<Self, SpimexError> {
        let selector = LinkSelector::parse(&config.css_path_to_excel_links)?;
        Ok(Self { config, fetcher, repo, selector })
    }

    pub async fn run(&self) -> Result<CrawlSummary, SpimexError> {
        let mut summary = CrawlSummary::default();

        if self.repo.has_trades().await? {
            warn!("Trading results already stored, skipping crawl");
            return Ok(summary);
        }

        let mut page_number: u32 = 1;
        loop {
            let span = info_span!("crawl_page", page_number, timed = true);
            let (links_found, reached_start_date) = self
                .crawl_page(page_number, &mut summary)
                .instrument(span)
                .await?;
            summary.pages_visited += 1;

            if reached_start_date {
                info!(page_number, start_date = %self.config.start_date, "Reached start date");
                break;
            }
            if links_found == 0 {
                info!(page_number, "Listing page has no links, stopping");
                break;
            }
            page_number += 1;
        }

        info!(
            pages_visited = summary.pages_visited,
            files_parsed = summary.files_parsed,
            rows_inserted = summary.rows_inserted,
            "Crawl finished"
        );
        Ok(summary)
    }

    /// Returns the number of raw links on the page and whether the start date was reached.
    async fn crawl_page(
        &self,
        page_number: u32,
        summary: &mut CrawlSummary,
    ) -> Result<(usize, bool), SpimexError> {
        let page_url = page_url(&self.config.start_url, page_number)?;
        let html = self.fetcher.fetch_text(page_url.as_str()).await?;
        let raw_links = find_excel_links(&html, &self.selector);

        let plan = plan_page(&raw_links, &self.config.domain, self.config.start_date)?;

        let parses = plan.links.iter().map(|link| {
            parse_excel_file(
                self.fetcher.as_ref(),
                &link.url,
                link.trade_date,
                self.config.rows_to_skip,
            )
        });
        let tables = join_all(parses).await;

        for table in tables {
            let trades = table?;
            summary.files_parsed += 1;
            if trades.is_empty() {
                continue;
            }
            summary.rows_inserted += self.repo.insert_trades(&trades).await?;
        }

        Ok((raw_links.len(), plan.reached_start_date))
    }
}

/// Listing URL for a 1-based page number, e.g. `...?page=page-2`.
pub fn page_url(start_url: &str, page_number: u32) -> Result<Url, SpimexError> {
    let mut url = Url::parse(start_url)?;
    url.query_pairs_mut()
        .append_pair("page", &format!("page-{page_number}"));
    Ok(url)
}

pub fn parse_trade_date(text: &str) -> Result<NaiveDate, SpimexError> {
    NaiveDate::parse_from_str(text.trim(), TRADE_DATE_FORMAT)
        .map_err(|_| SpimexError::InvalidTradeDate(text.to_string()))
}

/// Relative hrefs land under the domain's path even when DOMAIN lacks a
/// trailing slash; absolute ones still resolve from the host root.
fn domain_base(domain: &str) -> Result<Url, SpimexError> {
    if domain.ends_with('/') {
        Ok(Url::parse(domain)?)
    } else {
        Ok(Url::parse(&format!("{domain}/"))?)
    }
}

/// Keep links up to the first one dated before `start_date`; the listing is
/// ordered newest first, so everything after it is older still.
fn plan_page(
    raw_links: &[RawLink],
    domain: &str,
    start_date: NaiveDate,
) -> Result<PagePlan, SpimexError> {
    let base = domain_base(domain)?;
    let mut plan = PagePlan::default();

    for raw in raw_links {
        let trade_date = parse_trade_date(&raw.date_text)?;
        if trade_date < start_date {
            plan.reached_start_date = true;
            break;
        }
        let url = base.join(&raw.href)?;
        plan.links.push(ExcelLink { url: url.into(), trade_date });
    }
    Ok(plan)
}
