use scraper::{ElementRef, Html, Selector};
use tracing::{debug, info};

use crate::error::SpimexError;

/// A download link found on a listing page, before date parsing and URL resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLink {
    pub href: String,
    pub date_text: String,
}

/// Compiled selectors for one listing-page layout.
#[derive(Debug)]
pub struct LinkSelector {
    blocks: Selector,
    anchor: Selector,
    date: Selector,
}

impl LinkSelector {
    /// `blocks_css` selects the repeated blocks that each hold one link and one date.
    pub fn parse(blocks_css: &str) -> Result<Self, SpimexError> {
        let blocks = Selector::parse(blocks_css)
            .map_err(|_| SpimexError::InvalidSelector(blocks_css.to_string()))?;
        let anchor = Selector::parse("a").map_err(|_| SpimexError::InvalidSelector("a".to_string()))?;
        let date = Selector::parse("span").map_err(|_| SpimexError::InvalidSelector("span".to_string()))?;
        Ok(Self { blocks, anchor, date })
    }
}

/// Extract every (href, date text) pair from a listing page.
///
/// Blocks without an anchor href or a date span are skipped. Input that is not
/// HTML simply has no matching blocks.
pub fn find_excel_links(html: &str, selector: &LinkSelector) -> Vec<RawLink> {
    let document = Html::parse_document(html);

    let links: Vec<RawLink> = document
        .select(&selector.blocks)
        .filter_map(|block| {
            let link = extract_link(block, selector);
            if link.is_none() {
                debug!(block = %block.html(), "Skipping block without link or date");
            }
            link
        })
        .collect();

    info!(link_count = links.len(), "Found excel links");
    links
}

fn extract_link(block: ElementRef<'_>, selector: &LinkSelector) -> Option<RawLink> {
    let href = block
        .select(&selector.anchor)
        .find_map(|a| a.value().attr("href"))?
        .trim()
        .to_string();
    let date_text = block
        .select(&selector.date)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    if href.is_empty() || date_text.is_empty() {
        return None;
    }
    Some(RawLink { href, date_text })
}
