//! Append-only CSV record of extracted results.

use std::fmt::Write as _;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::search::error::{SearchError, SearchResult};
use crate::search::normalize::checked_url;
use crate::search::types::QueryRecord;

/// Header line written when the record is created.
pub const CSV_HEADER: &str = "QueryTotal,QueryDate,QueriedOn,Rank,Title,Summary,Url";

/// Destination for finished query records.
pub trait ResultSink: Send + Sync {
    /// Append every row of `record` as one contiguous block.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    /// Returns [`SearchError::ResourceLocked`] if another process holds the
    /// destination; nothing has been written in that case and the call can be
    /// retried. Other I/O failures are returned as-is.
    fn append(&mut self, record: &QueryRecord) -> SearchResult<usize>;
}

/// CSV file sink that only ever appends.
#[derive(Clone, Debug)]
pub struct CsvResultSink {
    path: PathBuf,
    max_url_len: usize,
}

impl CsvResultSink {
    /// Create a sink writing to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, max_url_len: usize) -> Self {
        Self {
            path: path.into(),
            max_url_len,
        }
    }

    /// Path of the record.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the record with its header unless it already exists.
    fn ensure_created(&self) -> SearchResult<()> {
        let file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(()),
            Err(e) => return Err(self.classify(e)),
        };

        tracing::info!("Creating results file {}", self.path.display());
        let mut writer = BufWriter::new(file);
        writeln!(writer, "{CSV_HEADER}")?;
        writer.flush()?;
        Ok(())
    }

    fn open_for_append(&self) -> SearchResult<File> {
        OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(|e| self.classify(e))
    }

    fn classify(&self, err: io::Error) -> SearchError {
        if is_lock_error(&err) {
            SearchError::ResourceLocked {
                path: self.path.clone(),
            }
        } else {
            SearchError::Io(err)
        }
    }

    /// Render one CSV line per result of `record`.
    #[must_use]
    pub fn render(&self, record: &QueryRecord) -> String {
        let term = csv_field(&record.search_term);
        let query_date = record.query_date_label();
        let queried_on = record.queried_on_label();

        let mut out = String::new();
        for row in &record.results {
            let url = checked_url(&row.url, self.max_url_len);
            // Writing into a String cannot fail.
            let _ = writeln!(
                out,
                "{term},{query_date},{queried_on},{},{},{},{}",
                row.rank,
                quoted(&row.title),
                quoted(row.summary.as_deref().unwrap_or_default()),
                quoted(&hyperlink(url)),
            );
        }
        out
    }
}

impl ResultSink for CsvResultSink {
    fn append(&mut self, record: &QueryRecord) -> SearchResult<usize> {
        self.ensure_created()?;
        let file = self.open_for_append()?;

        let mut writer = BufWriter::new(file);
        writer.write_all(self.render(record).as_bytes())?;
        writer.flush()?;

        tracing::debug!(
            "Appended {} rows for {} to {}",
            record.results.len(),
            record.search_term,
            self.path.display()
        );
        Ok(record.results.len())
    }
}

/// Sharing or permission failures raised while another program has the file open.
fn is_lock_error(err: &io::Error) -> bool {
    // 32 and 33 are the Windows sharing and lock violations.
    let sharing_violation = cfg!(windows) && matches!(err.raw_os_error(), Some(32 | 33));
    sharing_violation
        || matches!(
            err.kind(),
            io::ErrorKind::PermissionDenied | io::ErrorKind::ResourceBusy
        )
}

/// Always-quoted cell with embedded quotes doubled.
fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Quote a cell only when it would otherwise split the line.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        quoted(value)
    } else {
        value.to_string()
    }
}

/// Spreadsheet formula turning the URL into a clickable link.
fn hyperlink(url: &str) -> String {
    format!("=HYPERLINK(\"{}\")", url.replace('"', "\"\""))
}
