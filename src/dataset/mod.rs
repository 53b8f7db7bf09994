//! Dataset compilation
//!
//! A dataset build is one finite pass over the metadata cache. Every stored
//! package becomes one [`DatasetRow`]: a flattened projection of its metadata
//! plus a freshly computed liveness verdict for every URL it references.

mod builder;

pub use builder::DatasetBuilder;

use crate::storage::MetadataRecord;
use crate::verifier::{LivenessVerdict, UrlReference, UrlRole};
use chrono::{DateTime, Utc};
use serde_json::Value;

/// A URL reference together with its verdict
#[derive(Debug, Clone, PartialEq)]
pub struct CheckedLink {
    pub reference: UrlReference,
    pub verdict: LivenessVerdict,
}

/// Aggregated liveness of all URLs sharing a role category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleVerdict {
    /// Every URL in the category is reachable
    Alive,
    /// No URL in the category is reachable
    Dead,
    /// Some are reachable, some are not
    Partial,
    /// The package has no URL in this category
    Absent,
}

impl RoleVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alive => "alive",
            Self::Dead => "dead",
            Self::Partial => "partial",
            Self::Absent => "absent",
        }
    }
}

/// One output row: a package's metadata projection and its URL verdicts
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRow {
    pub name: String,
    pub version: Option<String>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub author_email: Option<String>,
    pub maintainer: Option<String>,
    pub license: Option<String>,
    pub requires_python: Option<String>,

    /// Keywords as published (list forms are joined with `, `)
    pub keywords: Option<String>,
    pub description_content_type: Option<String>,
    pub classifier_count: usize,
    pub requires_dist_count: usize,

    /// Whether the current release was yanked from the index
    pub yanked: bool,
    pub yanked_reason: Option<String>,

    /// When the metadata was harvested
    pub fetched_at: DateTime<Utc>,

    /// When this row's URLs were checked
    pub checked_at: DateTime<Utc>,

    pub links: Vec<CheckedLink>,
}

impl DatasetRow {
    /// Projects a stored record and its checked links into a row
    pub fn from_record(
        record: &MetadataRecord,
        links: Vec<CheckedLink>,
        checked_at: DateTime<Utc>,
    ) -> Self {
        let document = &record.document;
        Self {
            name: record.name.clone(),
            version: info_field(document, "version"),
            summary: info_field(document, "summary"),
            author: info_field(document, "author"),
            author_email: info_field(document, "author_email"),
            maintainer: info_field(document, "maintainer"),
            license: info_field(document, "license"),
            requires_python: info_field(document, "requires_python"),
            keywords: info_field(document, "keywords"),
            description_content_type: info_field(document, "description_content_type"),
            classifier_count: info_list_len(document, "classifiers"),
            requires_dist_count: info_list_len(document, "requires_dist"),
            yanked: info_value(document, "yanked")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            yanked_reason: info_field(document, "yanked_reason"),
            fetched_at: record.fetched_at,
            checked_at,
            links,
        }
    }

    pub fn reachable_count(&self) -> usize {
        self.links.iter().filter(|l| l.verdict.reachable).count()
    }

    pub fn unreachable_count(&self) -> usize {
        self.links.len() - self.reachable_count()
    }

    /// Links whose probe could not complete at all
    pub fn error_count(&self) -> usize {
        self.links
            .iter()
            .filter(|l| l.verdict.error.is_some())
            .count()
    }

    /// Aggregated verdict for one role category (see [`UrlRole::CATEGORIES`])
    pub fn role_verdict(&self, category: &str) -> RoleVerdict {
        let mut total = 0;
        let mut reachable = 0;
        for link in &self.links {
            if link.reference.role.category() == category {
                total += 1;
                if link.verdict.reachable {
                    reachable += 1;
                }
            }
        }

        match (total, reachable) {
            (0, _) => RoleVerdict::Absent,
            (t, r) if t == r => RoleVerdict::Alive,
            (_, 0) => RoleVerdict::Dead,
            _ => RoleVerdict::Partial,
        }
    }

    /// URLs that did not resolve
    pub fn dead_urls(&self) -> impl Iterator<Item = &str> {
        self.links
            .iter()
            .filter(|l| !l.verdict.reachable)
            .map(|l| l.reference.url.as_str())
    }

    /// Verdict for the first link with the given role
    pub fn verdict_for(&self, role: &UrlRole) -> Option<&LivenessVerdict> {
        self.links
            .iter()
            .find(|l| &l.reference.role == role)
            .map(|l| &l.verdict)
    }
}

/// Totals of one dataset build
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Rows emitted
    pub packages: u64,
    pub urls_checked: u64,
    pub reachable: u64,
    pub unreachable: u64,

    /// Probes that could not complete (subset of `unreachable`)
    pub probe_errors: u64,

    /// Stored records that could not be read
    pub unreadable_records: u64,

    /// Whether the build stopped early on request
    pub interrupted: bool,
}

impl BuildSummary {
    pub fn record_row(&mut self, row: &DatasetRow) {
        self.packages += 1;
        self.urls_checked += row.links.len() as u64;
        self.reachable += row.reachable_count() as u64;
        self.unreachable += row.unreachable_count() as u64;
        self.probe_errors += row.error_count() as u64;
    }
}

/// Looks a field up in `info`, falling back to the top level
fn info_value<'a>(document: &'a Value, key: &str) -> Option<&'a Value> {
    document
        .get("info")
        .and_then(|info| info.get(key))
        .or_else(|| document.get(key))
}

/// Reads a non-empty text field; a list of strings is joined with `, `
fn info_field(document: &Value, key: &str) -> Option<String> {
    let text = match info_value(document, key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => return None,
    };

    Some(text).filter(|s| !s.is_empty())
}

fn info_list_len(document: &Value, key: &str) -> usize {
    info_value(document, key)
        .and_then(Value::as_array)
        .map_or(0, Vec::len)
}
