//! Operator-facing input: the query list, the run date and lock recovery.

use std::path::Path;

use dialoguer::{Confirm, Input, Select};

use crate::search::{DateSelection, LockHandler, SearchError, SearchResult};

/// Month names in calendar order, used by the month picker.
const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Read one query term per line, trimmed, skipping blank lines.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn read_queries(path: &Path) -> SearchResult<Vec<String>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(parse_queries(&raw))
}

fn parse_queries(raw: &str) -> Vec<String> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Ask the operator whether to use today's date or a chosen month.
///
/// Out-of-range answers are re-asked by the prompts themselves.
///
/// # Errors
/// Returns an error if the terminal cannot be read.
pub fn prompt_date_selection() -> SearchResult<DateSelection> {
    let mode = Select::new()
        .with_prompt("How would you like to choose a date?")
        .items(&["Current date", "Manual selection"])
        .default(0)
        .interact()
        .map_err(|e| prompt_error(&e))?;

    if mode == 0 {
        return Ok(DateSelection::Current);
    }

    let month = Select::new()
        .with_prompt("Choose a month")
        .items(&MONTHS)
        .default(0)
        .interact()
        .map_err(|e| prompt_error(&e))?;

    let year: i32 = Input::new()
        .with_prompt("Enter a year")
        .validate_with(|year: &i32| -> Result<(), &str> {
            if (1..=9999).contains(year) {
                Ok(())
            } else {
                Err("Year must be between 1 and 9999")
            }
        })
        .interact_text()
        .map_err(|e| prompt_error(&e))?;

    // Select indexes are 0-based.
    let month = u32::try_from(month + 1).map_err(|e| SearchError::Prompt(e.to_string()))?;
    Ok(DateSelection::Manual { month, year })
}

/// Blocks on the terminal until the operator has closed the locked file.
#[derive(Debug, Default)]
pub struct ConsoleLockHandler;

impl LockHandler for ConsoleLockHandler {
    fn on_locked(&mut self, path: &Path) -> SearchResult<()> {
        let retry = Confirm::new()
            .with_prompt(format!(
                "{} is open in another program. Close it, then retry?",
                path.display()
            ))
            .default(true)
            .interact()
            .map_err(|e| prompt_error(&e))?;

        if retry {
            Ok(())
        } else {
            Err(SearchError::ResourceLocked {
                path: path.to_path_buf(),
            })
        }
    }
}

fn prompt_error(err: &dialoguer::Error) -> SearchError {
    SearchError::Prompt(err.to_string())
}
