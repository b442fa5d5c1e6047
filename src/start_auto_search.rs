//! Startup helpers for the batch search binary.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use crate::operator::{self, ConsoleLockHandler};
use crate::search::{DateSelection, SearchConfig, SearchService};

/// Search the web for every query in a list and append the results to a CSV file.
#[derive(Debug, Parser)]
#[command(name = "auto-search", version, about)]
pub struct Cli {
    /// JSON configuration file.
    #[arg(long, env = "AUTO_SEARCH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Query list, one term per line.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// CSV file the results are appended to.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Results kept per query.
    #[arg(long)]
    pub results: Option<usize>,

    /// Search endpoint.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Month the searches target, as YYYY-MM.
    #[arg(long, conflicts_with = "today")]
    pub date: Option<String>,

    /// Target the current date without prompting.
    #[arg(long)]
    pub today: bool,
}

impl Cli {
    /// Layer the command-line flags over the loaded configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration file cannot be loaded.
    pub fn resolve_config(&self) -> anyhow::Result<SearchConfig> {
        let mut config = SearchConfig::load(self.config.as_deref())
            .context("Failed to load configuration")?;

        if let Some(input) = &self.input {
            config = config.with_input_path(input);
        }
        if let Some(output) = &self.output {
            config = config.with_output_path(output);
        }
        if let Some(results) = self.results {
            config = config.with_results_per_query(results);
        }
        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoint(endpoint);
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// Date selection from the flags, prompting when none was given.
    ///
    /// # Errors
    /// Returns an error if the flag is malformed or the prompt fails.
    pub fn date_selection(&self) -> anyhow::Result<DateSelection> {
        if self.today {
            return Ok(DateSelection::Current);
        }
        match &self.date {
            Some(text) => Ok(DateSelection::parse_month(text)?),
            None => Ok(operator::prompt_date_selection()?),
        }
    }
}

/// Run the batch search.
///
/// # Returns
/// `ExitCode::SUCCESS` when every query was processed, `1` on failure.
#[must_use]
pub fn run() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match execute(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

fn execute(cli: &Cli) -> anyhow::Result<()> {
    tracing::info!("Automated Search v{}", env!("CARGO_PKG_VERSION"));

    let config = cli.resolve_config()?;
    let query_date = cli.date_selection()?.resolve_now()?;

    let queries = operator::read_queries(&config.input_path).with_context(|| {
        format!("Failed to read queries from {}", config.input_path.display())
    })?;
    tracing::info!("Found {} queries", queries.len());
    tracing::debug!("{queries:?}");

    let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
    let mut service = SearchService::from_config(config)?;
    let mut locks = ConsoleLockHandler;

    let summary = rt.block_on(service.run(&queries, query_date, &mut locks))?;

    tracing::info!(
        "Searching complete! {} queries, {} rows saved",
        summary.queries,
        summary.rows
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let cli = Cli::try_parse_from([
            "auto-search",
            "--input",
            "in.txt",
            "--output",
            "out.csv",
            "--results",
            "20",
            "--date",
            "2024-03",
        ])
        .unwrap();

        let config = cli.resolve_config().unwrap();
        assert_eq!(config.input_path, PathBuf::from("in.txt"));
        assert_eq!(config.output_path, PathBuf::from("out.csv"));
        assert_eq!(config.results_per_query, 20);
        assert_eq!(
            cli.date_selection().unwrap(),
            DateSelection::Manual { month: 3, year: 2024 }
        );
    }

    #[test]
    fn test_today_flag_skips_prompt() {
        let cli = Cli::try_parse_from(["auto-search", "--today"]).unwrap();
        assert_eq!(cli.date_selection().unwrap(), DateSelection::Current);
    }

    #[test]
    fn test_date_and_today_conflict() {
        assert!(Cli::try_parse_from(["auto-search", "--today", "--date", "2024-03"]).is_err());
    }

    #[test]
    fn test_bad_date_flag() {
        let cli = Cli::try_parse_from(["auto-search", "--date", "03/2024"]).unwrap();
        assert!(cli.date_selection().is_err());
    }

    #[test]
    fn test_zero_results_rejected() {
        let cli = Cli::try_parse_from(["auto-search", "--results", "0"]).unwrap();
        assert!(cli.resolve_config().is_err());
    }
}
