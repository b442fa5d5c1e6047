//! Search-term construction and request parameters.

use chrono::NaiveDate;

/// Combine a query term with the month and year it targets.
///
/// `("Acme Corp", 2024-03-01)` becomes `"Acme Corp March 2024"`.
#[must_use]
pub fn format_search_term(query: &str, date: NaiveDate) -> String {
    format!("{query} {}", date.format("%B %Y"))
}

/// Inflate the wanted result count, since some returned blocks are unusable.
///
/// Adds 5 below 10, then takes the ceiling of 1.2 times the count.
#[must_use]
pub const fn safe_n(n: usize) -> usize {
    let base = if n < 10 { n + 5 } else { n };
    (base * 6).div_ceil(5)
}

/// Query-string parameters for one search, in submission order.
#[must_use]
pub fn build_params(count: usize, search_term: &str) -> Vec<(&'static str, String)> {
    vec![("num", count.to_string()), ("q", search_term.to_string())]
}
