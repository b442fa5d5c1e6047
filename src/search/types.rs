//! Core types for extracted results.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use super::error::{SearchError, SearchResult};

/// Format used for the `QueryDate` and `QueriedOn` columns.
pub const RECORD_DATE_FORMAT: &str = "%Y %m";

/// A single accepted search result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRow {
    /// 1-based position among accepted results.
    pub rank: usize,
    /// Heading text of the result.
    pub title: String,
    /// Snippet, when the engine rendered one.
    pub summary: Option<String>,
    /// Normalized target URL.
    pub url: String,
}

/// One executed query and everything extracted for it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueryRecord {
    /// Exact string submitted to the engine.
    pub search_term: String,
    /// Date the results pertain to.
    pub query_date: NaiveDate,
    /// Date the request was issued.
    pub queried_on: NaiveDate,
    /// Accepted results in ascending rank order.
    pub results: Vec<ResultRow>,
}

impl QueryRecord {
    /// `QueryDate` column value, e.g. `2024 03`.
    #[must_use]
    pub fn query_date_label(&self) -> String {
        self.query_date.format(RECORD_DATE_FORMAT).to_string()
    }

    /// `QueriedOn` column value.
    #[must_use]
    pub fn queried_on_label(&self) -> String {
        self.queried_on.format(RECORD_DATE_FORMAT).to_string()
    }
}

/// How the run date was chosen by the operator.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum DateSelection {
    /// Use the date the run starts on.
    Current,
    /// Use the first day of the given month.
    Manual {
        /// Month number, 1 to 12.
        month: u32,
        /// Calendar year.
        year: i32,
    },
}

impl DateSelection {
    /// Resolve the selection against `today`.
    ///
    /// # Errors
    /// Returns an error if the month/year pair is not a calendar date.
    pub fn resolve(self, today: NaiveDate) -> SearchResult<NaiveDate> {
        match self {
            Self::Current => Ok(today),
            Self::Manual { month, year } => NaiveDate::from_ymd_opt(year, month, 1)
                .ok_or_else(|| SearchError::InvalidDate(format!("{year}-{month:02}"))),
        }
    }

    /// Resolve against the local clock.
    ///
    /// # Errors
    /// Returns an error if the month/year pair is not a calendar date.
    pub fn resolve_now(self) -> SearchResult<NaiveDate> {
        self.resolve(Local::now().date_naive())
    }

    /// Parse a `YYYY-MM` month selection.
    ///
    /// # Errors
    /// Returns an error if the text is not a valid year and month.
    pub fn parse_month(text: &str) -> SearchResult<Self> {
        let invalid = || SearchError::InvalidDate(text.to_string());
        let (year, month) = text.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        let selection = Self::Manual { month, year };
        selection.resolve(NaiveDate::MIN)?;
        Ok(selection)
    }
}
