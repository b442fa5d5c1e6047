//! Configuration for the search pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use url::Url;

use super::error::{SearchError, SearchResult};

/// Search endpoint used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "https://www.google.com/search";

/// Prefix of the environment variables read by [`SearchConfig::apply_env`].
const ENV_PREFIX: &str = "AUTO_SEARCH_";

/// Configuration for a batch search run.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Search endpoint receiving the GET requests.
    pub endpoint: String,
    /// Number of results to keep per query.
    pub results_per_query: usize,
    /// Lower bound of the pause between two queries.
    #[serde(with = "duration_serde")]
    pub min_wait: Duration,
    /// Upper bound (exclusive) of the pause between two queries.
    #[serde(with = "duration_serde")]
    pub max_wait: Duration,
    /// File holding one query term per line.
    pub input_path: PathBuf,
    /// CSV file the results are appended to.
    pub output_path: PathBuf,
    /// Request timeout.
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,
    /// Connection timeout.
    #[serde(with = "duration_serde")]
    pub connect_timeout: Duration,
    /// User agents to rotate.
    pub user_agents: Vec<String>,
    /// URLs longer than this are written as the error marker.
    pub max_url_len: usize,
    /// Markup markers used by the result extractor.
    pub selectors: ExtractorSelectors,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            results_per_query: 50,
            min_wait: Duration::from_secs(10),
            max_wait: Duration::from_secs(15),
            input_path: PathBuf::from("Queries.txt"),
            output_path: PathBuf::from("Results.csv"),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agents: default_user_agents(),
            max_url_len: 255,
            selectors: ExtractorSelectors::default(),
        }
    }
}

impl SearchConfig {
    /// Create a new config with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a config from an optional JSON file, then apply environment overrides.
    ///
    /// Missing fields in the file keep their defaults.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> SearchResult<Self> {
        let config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path)?;
                serde_json::from_str(&raw)?
            }
            None => Self::default(),
        };
        config.apply_env()
    }

    /// Override fields from `AUTO_SEARCH_*` environment variables.
    ///
    /// # Errors
    /// Returns an error if a numeric variable does not parse.
    pub fn apply_env(self) -> SearchResult<Self> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Override fields from the `AUTO_SEARCH_*` values returned by `lookup`.
    ///
    /// Blank values are ignored.
    fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> SearchResult<Self> {
        let var = |name: &str| {
            lookup(&format!("{ENV_PREFIX}{name}")).filter(|v| !v.trim().is_empty())
        };

        if let Some(endpoint) = var("ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(input) = var("INPUT") {
            self.input_path = PathBuf::from(input);
        }
        if let Some(output) = var("OUTPUT") {
            self.output_path = PathBuf::from(output);
        }
        if let Some(results) = var("RESULTS") {
            self.results_per_query = parse_env("RESULTS", &results)?;
        }
        if let Some(min) = var("MIN_WAIT") {
            self.min_wait = Duration::from_secs(parse_env("MIN_WAIT", &min)?);
        }
        if let Some(max) = var("MAX_WAIT") {
            self.max_wait = Duration::from_secs(parse_env("MAX_WAIT", &max)?);
        }
        Ok(self)
    }

    /// Set the search endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Set the number of results kept per query.
    #[must_use]
    pub const fn with_results_per_query(mut self, n: usize) -> Self {
        self.results_per_query = n;
        self
    }

    /// Set the bounds of the pause between queries.
    #[must_use]
    pub const fn with_wait(mut self, min: Duration, max: Duration) -> Self {
        self.min_wait = min;
        self.max_wait = max;
        self
    }

    /// Set the query list file.
    #[must_use]
    pub fn with_input_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.input_path = path.into();
        self
    }

    /// Set the results file.
    #[must_use]
    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = path.into();
        self
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    /// Returns an error if any values are out of range or invalid.
    pub fn validate(&self) -> SearchResult<()> {
        Url::parse(&self.endpoint)?;

        if self.results_per_query == 0 {
            return Err(SearchError::Config(
                "results_per_query must be > 0".to_string(),
            ));
        }

        if self.min_wait > self.max_wait {
            return Err(SearchError::Config(format!(
                "min_wait ({}s) must not exceed max_wait ({}s)",
                self.min_wait.as_secs_f64(),
                self.max_wait.as_secs_f64()
            )));
        }

        if self.max_url_len == 0 {
            return Err(SearchError::Config("max_url_len must be > 0".to_string()));
        }

        self.selectors.validate()
    }

    /// Get a random user agent from the rotation list.
    #[must_use]
    pub fn random_user_agent(&self) -> String {
        if self.user_agents.is_empty() {
            return default_user_agents()[0].clone();
        }
        let mut rng = rand::thread_rng();
        let idx = rng.gen_range(0..self.user_agents.len());
        self.user_agents[idx].clone()
    }
}

/// CSS selectors locating the parts of one organic result.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorSelectors {
    /// One result block.
    pub container: String,
    /// Heading inside a result block.
    pub heading: String,
    /// Link inside the heading.
    pub link: String,
    /// Snippet inside a result block.
    pub snippet: String,
}

impl Default for ExtractorSelectors {
    fn default() -> Self {
        Self {
            container: ".g".to_string(),
            heading: "h3.r".to_string(),
            link: "a".to_string(),
            snippet: ".st".to_string(),
        }
    }
}

impl ExtractorSelectors {
    fn validate(&self) -> SearchResult<()> {
        for (name, value) in [
            ("container", &self.container),
            ("heading", &self.heading),
            ("link", &self.link),
            ("snippet", &self.snippet),
        ] {
            if value.trim().is_empty() {
                return Err(SearchError::Config(format!(
                    "selectors.{name} must not be empty"
                )));
            }
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> SearchResult<T> {
    value.trim().parse().map_err(|_| {
        SearchError::Config(format!("{ENV_PREFIX}{name} is not a number: {value}"))
    })
}

/// Default user agents for rotation.
fn default_user_agents() -> Vec<String> {
    vec![
        // Chrome on Windows
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
        // Edge on Windows
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36 Edg/124.0.0.0".to_string(),
        // Internet Explorer 11
        "Mozilla/5.0 (Windows NT 10.0; WOW64; Trident/7.0; rv:11.0) like Gecko".to_string(),
        // Firefox on Windows
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
        // Safari on macOS
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15".to_string(),
        // Chrome on macOS
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36".to_string(),
        // Firefox on Linux
        "Mozilla/5.0 (X11; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0".to_string(),
    ]
}

/// Serde module for Duration serialization.
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
