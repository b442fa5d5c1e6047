//! Binary entrypoint for the batch search run.

use std::process::ExitCode;

use auto_search::start_auto_search;

/// Search every query of the list and append the results.
fn main() -> ExitCode {
    start_auto_search::run()
}
