//! Result extraction from a search result page.

use scraper::{ElementRef, Html, Selector};

use crate::search::config::ExtractorSelectors;
use crate::search::error::{SearchError, SearchResult};
use crate::search::normalize::normalize_href;
use crate::search::types::ResultRow;

/// Compiled selectors for one result page layout.
pub struct ResultExtractor {
    container: Selector,
    heading: Selector,
    link: Selector,
    snippet: Selector,
}

/// A result block that passed every check, before it is ranked.
#[derive(Debug, PartialEq, Eq)]
struct Candidate {
    title: String,
    summary: Option<String>,
    url: String,
}

impl ResultExtractor {
    /// Compile the configured selectors.
    ///
    /// # Errors
    /// Returns an error if a selector is not valid CSS.
    pub fn new(selectors: &ExtractorSelectors) -> SearchResult<Self> {
        Ok(Self {
            container: parse_selector(&selectors.container)?,
            heading: parse_selector(&selectors.heading)?,
            link: parse_selector(&selectors.link)?,
            snippet: parse_selector(&selectors.snippet)?,
        })
    }

    /// Extract at most `n` ranked results from the page markup.
    ///
    /// Blocks without a heading, title, link or usable URL are dropped and do
    /// not consume a rank. Blocks after the `n`th accepted one are not read.
    #[must_use]
    pub fn extract(&self, n: usize, html: &str) -> Vec<ResultRow> {
        let document = Html::parse_document(html);

        let rows: Vec<ResultRow> = document
            .select(&self.container)
            .filter_map(|container| self.candidate(container))
            .take(n)
            .enumerate()
            .map(|(i, c)| ResultRow {
                rank: i + 1,
                title: c.title,
                summary: c.summary,
                url: c.url,
            })
            .collect();

        if rows.is_empty() && n > 0 {
            tracing::warn!("No results found in search response");
        }

        rows
    }

    fn candidate(&self, container: ElementRef<'_>) -> Option<Candidate> {
        let heading = container.select(&self.heading).next()?;

        let title: String = heading.text().collect();
        let href = heading
            .select(&self.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .unwrap_or_default();

        if title.is_empty() || href.is_empty() {
            return None;
        }

        let summary = container
            .select(&self.snippet)
            .next()
            .map(|s| s.text().collect::<String>().replace('\n', " "));

        let url = normalize_href(href)?;

        Some(Candidate {
            title,
            summary,
            url,
        })
    }
}

/// Extract at most `n` results using the default result-page layout.
///
/// # Errors
/// Returns an error if the default selectors fail to compile.
pub fn extract_results(n: usize, html: &str) -> SearchResult<Vec<ResultRow>> {
    let extractor = ResultExtractor::new(&ExtractorSelectors::default())?;
    Ok(extractor.extract(n, html))
}

fn parse_selector(css: &str) -> SearchResult<Selector> {
    Selector::parse(css).map_err(|e| SearchError::HtmlParse(format!("Invalid selector {css}: {e:?}")))
}
