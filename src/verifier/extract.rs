//! URL extraction from metadata documents

use crate::verifier::{UrlReference, UrlRole};
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

/// Top-level key holding the per-version file history
const RELEASES_KEY: &str = "releases";

/// Key holding the labelled project links
const PROJECT_URLS_KEY: &str = "project_urls";

/// Extracts every URL referenced by a metadata document
///
/// Only string values that are an absolute http(s) URL in their entirety
/// count; URLs embedded in free text are ignored. Each reference is tagged
/// with a role derived from the key it was found under. The same URL found
/// under several keys is reported once, with the role of its first
/// occurrence.
///
/// # Arguments
///
/// * `document` - A metadata document as returned by the index
/// * `include_release_history` - Also walk the top-level `releases` object
///
/// # Examples
///
/// ```
/// use pypi_rot::verifier::{extract_urls, UrlRole};
/// use serde_json::json;
///
/// let doc = json!({"info": {"home_page": "https://example.com"}});
/// let refs = extract_urls(&doc, false);
/// assert_eq!(refs[0].role, UrlRole::Homepage);
/// ```
pub fn extract_urls(document: &Value, include_release_history: bool) -> Vec<UrlReference> {
    let mut found = Vec::new();

    match document {
        Value::Object(map) => {
            for (key, value) in map {
                if key == RELEASES_KEY && !include_release_history {
                    continue;
                }
                walk(value, Some(key), false, &mut found);
            }
        }
        other => walk(other, None, false, &mut found),
    }

    let mut seen = HashSet::new();
    found.retain(|reference: &UrlReference| seen.insert(reference.url.clone()));
    found
}

fn walk(value: &Value, key: Option<&str>, in_project_urls: bool, found: &mut Vec<UrlReference>) {
    match value {
        Value::String(s) => {
            if let Some(url) = as_http_url(s) {
                found.push(UrlReference {
                    url,
                    role: role_for(key, in_project_urls),
                });
            }
        }
        Value::Array(items) => {
            // Array elements inherit the key of the array
            for item in items {
                walk(item, key, in_project_urls, found);
            }
        }
        Value::Object(map) => {
            let children_in_project_urls = key == Some(PROJECT_URLS_KEY);
            for (child_key, child) in map {
                walk(child, Some(child_key), children_in_project_urls, found);
            }
        }
        _ => {}
    }
}

/// Maps the key a URL was found under to its role
fn role_for(key: Option<&str>, in_project_urls: bool) -> UrlRole {
    let Some(key) = key else {
        return UrlRole::Other(String::new());
    };

    if in_project_urls {
        return UrlRole::ProjectUrl(key.to_string());
    }

    match key {
        "home_page" | "homepage" => UrlRole::Homepage,
        "download_url" | "url" => UrlRole::Download,
        "project_url" | "package_url" | "release_url" => UrlRole::ProjectPage,
        "docs_url" | "documentation" => UrlRole::Documentation,
        "bugtrack_url" | "issue_tracker" => UrlRole::IssueTracker,
        other => UrlRole::Other(other.to_string()),
    }
}

/// Returns the canonical form of `s` if the whole string is an http(s) URL
fn as_http_url(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() || s.contains(char::is_whitespace) {
        return None;
    }

    let url = Url::parse(s).ok()?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return None;
    }

    Some(url.into())
}
