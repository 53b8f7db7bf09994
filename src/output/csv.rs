//! CSV dataset output
//!
//! One header line, then one line per package. Fields follow RFC 4180:
//! a field containing a comma, quote or line break is wrapped in double
//! quotes with inner quotes doubled.

use crate::dataset::DatasetRow;
use crate::output::traits::{OutputResult, RowSink};
use crate::verifier::UrlRole;
use chrono::{DateTime, SecondsFormat, Utc};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Metadata columns preceding the per-role verdict columns
const LEADING_COLUMNS: [&str; 20] = [
    "name",
    "version",
    "summary",
    "author",
    "author_email",
    "maintainer",
    "license",
    "requires_python",
    "keywords",
    "description_content_type",
    "classifier_count",
    "requires_dist_count",
    "yanked",
    "yanked_reason",
    "fetched_at",
    "checked_at",
    "url_count",
    "reachable_count",
    "unreachable_count",
    "error_count",
];

/// Column listing the URLs that did not resolve, space separated
const DEAD_URLS_COLUMN: &str = "dead_urls";

/// Writes dataset rows as CSV
pub struct CsvRowWriter<W: Write> {
    writer: W,
    header_written: bool,
    rows_written: u64,
}

impl CsvRowWriter<BufWriter<File>> {
    /// Creates (or truncates) the file at `path`
    pub fn create(path: &Path) -> OutputResult<Self> {
        let file = File::create(path)?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> CsvRowWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            header_written: false,
            rows_written: 0,
        }
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    fn ensure_header(&mut self) -> OutputResult<()> {
        if !self.header_written {
            let header = header_fields().join(",");
            writeln!(self.writer, "{}", header)?;
            self.header_written = true;
        }
        Ok(())
    }
}

impl<W: Write> RowSink for CsvRowWriter<W> {
    fn write_row(&mut self, row: &DatasetRow) -> OutputResult<()> {
        self.ensure_header()?;
        writeln!(self.writer, "{}", format_row(row))?;
        self.rows_written += 1;
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        self.ensure_header()?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Column names in output order
pub fn header_fields() -> Vec<&'static str> {
    let mut fields = LEADING_COLUMNS.to_vec();
    fields.extend(UrlRole::CATEGORIES);
    fields.push(DEAD_URLS_COLUMN);
    fields
}

/// Formats one row as a CSV line without the line terminator
pub fn format_row(row: &DatasetRow) -> String {
    let optional = |value: &Option<String>| value.clone().unwrap_or_default();

    let mut fields = vec![
        row.name.clone(),
        optional(&row.version),
        optional(&row.summary),
        optional(&row.author),
        optional(&row.author_email),
        optional(&row.maintainer),
        optional(&row.license),
        optional(&row.requires_python),
        optional(&row.keywords),
        optional(&row.description_content_type),
        row.classifier_count.to_string(),
        row.requires_dist_count.to_string(),
        row.yanked.to_string(),
        optional(&row.yanked_reason),
        format_time(&row.fetched_at),
        format_time(&row.checked_at),
        row.links.len().to_string(),
        row.reachable_count().to_string(),
        row.unreachable_count().to_string(),
        row.error_count().to_string(),
    ];

    for category in UrlRole::CATEGORIES {
        fields.push(row.role_verdict(category).as_str().to_string());
    }

    fields.push(row.dead_urls().collect::<Vec<_>>().join(" "));

    fields
        .iter()
        .map(|f| escape_field(f))
        .collect::<Vec<_>>()
        .join(",")
}

/// Quotes a field if it needs quoting
pub fn escape_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

fn format_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}
