//! Batch web search and result recording.
//!
//! This module provides the whole search pipeline:
//! - Search-term construction and oversampling
//! - HTTP fetching with rotating headers
//! - Result extraction from result pages
//! - Redirect-link normalization
//! - Append-only CSV persistence
//! - Randomized pauses between queries

pub mod client;
pub mod config;
pub mod error;
pub mod extract;
pub mod normalize;
pub mod query;
pub mod rate_limit;
pub mod sink;
pub mod types;

pub use client::{PageFetcher, SearchClient};
pub use config::{ExtractorSelectors, SearchConfig};
pub use error::{SearchError, SearchResult};
pub use extract::{ResultExtractor, extract_results};
pub use normalize::{checked_url, normalize_href};
pub use query::{format_search_term, safe_n};
pub use rate_limit::{Pause, RateLimiter};
pub use sink::{CsvResultSink, ResultSink};
pub use types::{DateSelection, QueryRecord, ResultRow};

use std::path::Path;

use chrono::{Local, NaiveDate};

/// Decides what happens when the output record is locked by another program.
pub trait LockHandler: Send {
    /// Called each time an append finds `path` locked.
    ///
    /// Returning `Ok` retries the append; returning an error aborts the run.
    ///
    /// # Errors
    /// Returns an error to give up on the locked record.
    fn on_locked(&mut self, path: &Path) -> SearchResult<()>;
}

/// Totals for one finished batch.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RunSummary {
    /// Number of queries searched.
    pub queries: usize,
    /// Number of result rows written.
    pub rows: usize,
}

/// Runs query terms through fetch, extraction and persistence, one at a time.
pub struct SearchService<F, S> {
    config: SearchConfig,
    fetcher: F,
    sink: S,
    extractor: ResultExtractor,
    pause: Box<dyn Pause>,
}

impl SearchService<SearchClient, CsvResultSink> {
    /// Create a service talking HTTP and writing the configured CSV file.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the HTTP client cannot be built.
    pub fn from_config(config: SearchConfig) -> SearchResult<Self> {
        let fetcher = SearchClient::new(&config)?;
        let sink = CsvResultSink::new(config.output_path.clone(), config.max_url_len);
        Self::new(config, fetcher, sink)
    }
}

impl<F: PageFetcher, S: ResultSink> SearchService<F, S> {
    /// Create a service from its collaborators.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: SearchConfig, fetcher: F, sink: S) -> SearchResult<Self> {
        config.validate()?;
        let extractor = ResultExtractor::new(&config.selectors)?;
        let pause: Box<dyn Pause> = Box::new(RateLimiter::new(config.min_wait, config.max_wait));

        Ok(Self {
            config,
            fetcher,
            sink,
            extractor,
            pause,
        })
    }

    /// Replace the randomized pause taken between queries.
    #[must_use]
    pub fn with_pause(mut self, pause: impl Pause + 'static) -> Self {
        self.pause = Box::new(pause);
        self
    }

    /// The sink results are written to.
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Search and save every query, pausing between consecutive queries.
    ///
    /// A transport failure stops the batch; rows of finished queries stay saved.
    ///
    /// # Errors
    /// Returns the first fetch, persistence or lock-handler error.
    pub async fn run(
        &mut self,
        queries: &[String],
        query_date: NaiveDate,
        locks: &mut dyn LockHandler,
    ) -> SearchResult<RunSummary> {
        let mut summary = RunSummary::default();

        for (i, query) in queries.iter().enumerate() {
            if i > 0 {
                tracing::info!("Waiting a few seconds...");
                self.pause.wait().await;
            }
            summary.rows += self.search_and_save(query, query_date, locks).await?;
            summary.queries += 1;
        }

        Ok(summary)
    }

    /// Search one query term and append its results.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    /// Returns an error if fetching or persisting fails.
    pub async fn search_and_save(
        &mut self,
        query: &str,
        query_date: NaiveDate,
        locks: &mut dyn LockHandler,
    ) -> SearchResult<usize> {
        let queried_on = Local::now().date_naive();
        let record = self.search(query, query_date, queried_on).await?;

        tracing::info!("Saving results");
        self.save(&record, locks)
    }

    /// Fetch and extract results for one query term.
    ///
    /// # Errors
    /// Returns an error if the page cannot be fetched.
    pub async fn search(
        &self,
        query: &str,
        query_date: NaiveDate,
        queried_on: NaiveDate,
    ) -> SearchResult<QueryRecord> {
        let search_term = format_search_term(query, query_date);
        let results = self.first_n_results(&search_term).await?;

        Ok(QueryRecord {
            search_term,
            query_date,
            queried_on,
            results,
        })
    }

    /// Fetch an oversampled page and keep the first configured number of results.
    async fn first_n_results(&self, search_term: &str) -> SearchResult<Vec<ResultRow>> {
        let n = self.config.results_per_query;
        let params = query::build_params(safe_n(n), search_term);

        tracing::info!("Searching for: {search_term}");
        let html = self.fetcher.fetch(&self.config.endpoint, &params).await?;

        let results = self.extractor.extract(n, &html);
        tracing::debug!("Extracted {} of {n} results", results.len());
        Ok(results)
    }

    /// Append a record, asking `locks` what to do while the sink is locked.
    fn save(&mut self, record: &QueryRecord, locks: &mut dyn LockHandler) -> SearchResult<usize> {
        loop {
            match self.sink.append(record) {
                Err(SearchError::ResourceLocked { path }) => {
                    tracing::warn!(
                        "Cannot open {} as it is in use by another process",
                        path.display()
                    );
                    locks.on_locked(&path)?;
                }
                other => return other,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    /// Serves canned pages and records every request.
    struct FakeFetcher {
        pages: Mutex<VecDeque<SearchResult<String>>>,
        requests: Mutex<Vec<Vec<(String, String)>>>,
    }

    impl FakeFetcher {
        fn new(pages: Vec<SearchResult<String>>) -> Self {
            Self {
                pages: Mutex::new(pages.into()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl PageFetcher for FakeFetcher {
        async fn fetch(&self, _endpoint: &str, params: &[(&str, String)]) -> SearchResult<String> {
            self.requests.lock().unwrap().push(
                params
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), v.clone()))
                    .collect(),
            );
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        }
    }

    /// Reports the sink as locked a fixed number of times.
    struct FlakySink {
        locked_attempts: usize,
        records: Vec<QueryRecord>,
    }

    impl ResultSink for FlakySink {
        fn append(&mut self, record: &QueryRecord) -> SearchResult<usize> {
            if self.locked_attempts > 0 {
                self.locked_attempts -= 1;
                return Err(SearchError::ResourceLocked {
                    path: PathBuf::from("Results.csv"),
                });
            }
            self.records.push(record.clone());
            Ok(record.results.len())
        }
    }

    #[derive(Default)]
    struct CountingLocks {
        calls: usize,
        give_up: bool,
    }

    impl LockHandler for CountingLocks {
        fn on_locked(&mut self, _path: &Path) -> SearchResult<()> {
            self.calls += 1;
            if self.give_up {
                return Err(SearchError::Prompt("operator gave up".to_string()));
            }
            Ok(())
        }
    }

    /// Counts pauses instead of sleeping.
    struct CountingPause(Arc<AtomicUsize>);

    #[async_trait]
    impl Pause for CountingPause {
        async fn wait(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn block(title: &str, href: &str) -> String {
        format!(
            r#"<div class="g"><h3 class="r"><a href="{href}">{title}</a></h3><span class="st">{title} snippet</span></div>"#
        )
    }

    fn acme_page() -> String {
        [
            block("Acme RFP", "/url?url=https://acme.example/rfp&sa=U"),
            r#"<div class="g"><span class="st">no heading</span></div>"#.to_string(),
            block("Acme bids", "https://bids.example/acme"),
            r#"<div class="g"><div>also no heading</div></div>"#.to_string(),
            block("Acme notice", "https://notice.example/"),
        ]
        .concat()
    }

    fn test_config(dir: &Path) -> SearchConfig {
        SearchConfig::new()
            .with_endpoint("http://127.0.0.1:9/search")
            .with_results_per_query(10)
            .with_wait(Duration::ZERO, Duration::ZERO)
            .with_output_path(dir.join("Results.csv"))
    }

    fn march_2024() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
    }

    #[tokio::test]
    async fn test_acme_scenario_writes_three_rows() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let path = config.output_path.clone();
        let sink = CsvResultSink::new(&path, config.max_url_len);
        let fetcher = FakeFetcher::new(vec![Ok(acme_page())]);
        let mut service = SearchService::new(config, fetcher, sink).unwrap();

        let summary = service
            .run(&["Acme Corp".to_string()], march_2024(), &mut CountingLocks::default())
            .await
            .unwrap();
        assert_eq!(summary, RunSummary { queries: 1, rows: 3 });

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], sink::CSV_HEADER);
        for (i, line) in lines[1..].iter().enumerate() {
            assert!(line.starts_with("Acme Corp March 2024,2024 03,"), "{line}");
            let cells: Vec<&str> = line.splitn(5, ',').collect();
            assert_eq!(cells[3], (i + 1).to_string());
        }
        assert!(lines[1].ends_with("\"=HYPERLINK(\"\"https://acme.example/rfp\"\")\""));
    }

    async fn pauses_for(query_count: usize) -> usize {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let sink = CsvResultSink::new(&config.output_path, config.max_url_len);
        let pages = (0..query_count).map(|_| Ok(acme_page())).collect();
        let pauses = Arc::new(AtomicUsize::new(0));
        let mut service = SearchService::new(config, FakeFetcher::new(pages), sink)
            .unwrap()
            .with_pause(CountingPause(Arc::clone(&pauses)));

        let queries: Vec<String> = (0..query_count).map(|i| format!("query {i}")).collect();
        let summary = service
            .run(&queries, march_2024(), &mut CountingLocks::default())
            .await
            .unwrap();
        assert_eq!(summary.queries, query_count);
        pauses.load(Ordering::SeqCst)
    }

    #[tokio::test]
    async fn test_pauses_only_between_queries() {
        assert_eq!(pauses_for(3).await, 2);
        assert_eq!(pauses_for(2).await, 1);
    }

    #[tokio::test]
    async fn test_single_query_never_pauses() {
        assert_eq!(pauses_for(1).await, 0);
        assert_eq!(pauses_for(0).await, 0);
    }

    #[tokio::test]
    async fn test_requests_oversampled_count_and_term() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path()).with_results_per_query(9);
        let sink = CsvResultSink::new(&config.output_path, config.max_url_len);
        let fetcher = FakeFetcher::new(vec![Ok(acme_page())]);
        let service = SearchService::new(config, fetcher, sink).unwrap();

        let record = service
            .search("Acme Corp", march_2024(), march_2024())
            .await
            .unwrap();
        assert_eq!(record.search_term, "Acme Corp March 2024");

        let requests = service.fetcher.requests.lock().unwrap();
        assert_eq!(
            requests[0],
            vec![
                ("num".to_string(), "17".to_string()),
                ("q".to_string(), "Acme Corp March 2024".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_results_capped_at_configured_count() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path()).with_results_per_query(2);
        let sink = CsvResultSink::new(&config.output_path, config.max_url_len);
        let fetcher = FakeFetcher::new(vec![Ok(acme_page())]);
        let service = SearchService::new(config, fetcher, sink).unwrap();

        let record = service
            .search("Acme Corp", march_2024(), march_2024())
            .await
            .unwrap();
        let ranks: Vec<usize> = record.results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_transport_error_stops_remaining_queries() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let path = config.output_path.clone();
        let sink = CsvResultSink::new(&path, config.max_url_len);
        let fetcher = FakeFetcher::new(vec![
            Ok(acme_page()),
            Err(SearchError::HttpStatus {
                status: 503,
                url: "http://127.0.0.1:9/search".to_string(),
            }),
            Ok(acme_page()),
        ]);
        let mut service = SearchService::new(config, fetcher, sink).unwrap();

        let queries = vec!["one".to_string(), "two".to_string(), "three".to_string()];
        let err = service
            .run(&queries, march_2024(), &mut CountingLocks::default())
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert_eq!(service.fetcher.requests.lock().unwrap().len(), 2);

        // Rows of the first query were already saved.
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 1 + 3);
        assert!(!content.contains("three March 2024"));
    }

    #[tokio::test]
    async fn test_locked_sink_is_retried_until_free() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FlakySink {
            locked_attempts: 3,
            records: Vec::new(),
        };
        let fetcher = FakeFetcher::new(vec![Ok(acme_page())]);
        let mut service = SearchService::new(test_config(dir.path()), fetcher, sink).unwrap();
        let mut locks = CountingLocks::default();

        let rows = service
            .search_and_save("Acme Corp", march_2024(), &mut locks)
            .await
            .unwrap();
        assert_eq!(rows, 3);
        assert_eq!(locks.calls, 3);
        assert_eq!(service.sink().records.len(), 1);
        assert_eq!(
            service.sink().records[0].queried_on,
            Local::now().date_naive()
        );
    }

    #[tokio::test]
    async fn test_lock_handler_can_abort() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FlakySink {
            locked_attempts: usize::MAX,
            records: Vec::new(),
        };
        let fetcher = FakeFetcher::new(vec![Ok(acme_page())]);
        let mut service = SearchService::new(test_config(dir.path()), fetcher, sink).unwrap();
        let mut locks = CountingLocks {
            calls: 0,
            give_up: true,
        };

        let err = service
            .search_and_save("Acme Corp", march_2024(), &mut locks)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::Prompt(_)));
        assert_eq!(locks.calls, 1);
    }

    #[tokio::test]
    async fn test_empty_query_list_does_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let path = config.output_path.clone();
        let sink = CsvResultSink::new(&path, config.max_url_len);
        let mut service = SearchService::new(config, FakeFetcher::new(Vec::new()), sink).unwrap();

        let summary = service
            .run(&[], march_2024(), &mut CountingLocks::default())
            .await
            .unwrap();
        assert_eq!(summary, RunSummary::default());
        assert!(!path.exists());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path()).with_results_per_query(0);
        let sink = CsvResultSink::new(&config.output_path, config.max_url_len);
        assert!(SearchService::new(config, FakeFetcher::new(Vec::new()), sink).is_err());
    }
}
