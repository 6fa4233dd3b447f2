//! Request parameters consumed by the lens.

use crate::error::{LensError, LensResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Lens defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensConfig {
    /// Page size when the request does not give one.
    pub default_per_page: usize,
    /// Upper bound applied to requested page sizes.
    pub max_per_page: usize,
    /// Query parameter carrying the cursor token in cursor links.
    pub cursor_name: String,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            default_per_page: 15,
            max_per_page: 100,
            cursor_name: "id".to_string(),
        }
    }
}

/// Pagination strategy selected by the `pagination` parameter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaginationStrategy {
    /// Page data, total count, last page and navigation links.
    #[default]
    #[serde(rename = "paginate")]
    Full,
    /// Page data and prev/next links, no total.
    #[serde(rename = "simplePaginate")]
    Simple,
    /// Page data and opaque forward/backward cursors.
    #[serde(rename = "cursorPaginate")]
    Cursor,
}

impl PaginationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaginationStrategy::Full => "paginate",
            PaginationStrategy::Simple => "simplePaginate",
            PaginationStrategy::Cursor => "cursorPaginate",
        }
    }
}

impl FromStr for PaginationStrategy {
    type Err = LensError;

    fn from_str(s: &str) -> LensResult<Self> {
        match s {
            "paginate" => Ok(PaginationStrategy::Full),
            "simplePaginate" => Ok(PaginationStrategy::Simple),
            "cursorPaginate" => Ok(PaginationStrategy::Cursor),
            other => Err(LensError::InvalidPagination(other.to_string())),
        }
    }
}

/// The request surface a lens reads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LensRequest {
    /// Requested columns and relations, in request order.
    pub lens_fields: Vec<String>,
    pub per_page: Option<usize>,
    pub page: Option<u64>,
    /// Raw `pagination` value; validated when the lens runs.
    pub pagination: Option<String>,
    /// Cursor token (the `id` parameter).
    pub cursor: Option<String>,
    pub search: Option<String>,
    /// `filter[column]` → value, or `filter[column][op]` → value keyed `column:op`.
    pub filters: BTreeMap<String, String>,
    /// Comma-separated columns, `-` prefix for descending.
    pub sort: Option<String>,
    /// Base URL used in pagination links.
    pub path: String,
}

impl LensRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lens_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn per_page(mut self, per_page: usize) -> Self {
        self.per_page = Some(per_page);
        self
    }

    pub fn page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    pub fn pagination(mut self, strategy: &str) -> Self {
        self.pagination = Some(strategy.to_string());
        self
    }

    pub fn cursor(mut self, token: impl Into<String>) -> Self {
        self.cursor = Some(token.into());
        self
    }

    pub fn search(mut self, term: impl Into<String>) -> Self {
        self.search = Some(term.into());
        self
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Builds a request from decoded query-string pairs.
    ///
    /// `lens_fields` may be a comma list or repeated as `lens_fields[]`.
    /// Unparseable `per_page`/`page` values fall back to their defaults.
    pub fn from_params<I, K, V>(path: impl Into<String>, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut request = Self::new(path);
        for (key, value) in params {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "lens_fields" => request.lens_fields.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from),
                ),
                k if k.starts_with("lens_fields[") => {
                    let v = value.trim();
                    if !v.is_empty() {
                        request.lens_fields.push(v.to_string());
                    }
                }
                "per_page" => request.per_page = value.trim().parse().ok(),
                "page" => request.page = value.trim().parse().ok(),
                "pagination" => request.pagination = Some(value.to_string()),
                "id" => request.cursor = Some(value.to_string()).filter(|v| !v.is_empty()),
                "search" => request.search = Some(value.to_string()).filter(|v| !v.trim().is_empty()),
                "sort" => request.sort = Some(value.to_string()),
                k => {
                    if let Some(filter_key) = parse_filter_key(k) {
                        request.filters.insert(filter_key, value.to_string());
                    }
                }
            }
        }
        request
    }

    /// Pagination strategy, defaulting to full pagination.
    pub fn strategy(&self) -> LensResult<PaginationStrategy> {
        match self.pagination.as_deref().map(str::trim) {
            None | Some("") => Ok(PaginationStrategy::default()),
            Some(s) => s.parse(),
        }
    }

    /// Page size clamped to `1..=max_per_page`.
    pub fn resolved_per_page(&self, config: &LensConfig) -> usize {
        self.per_page
            .unwrap_or(config.default_per_page)
            .clamp(1, config.max_per_page.max(1))
    }

    pub fn resolved_page(&self) -> u64 {
        self.page.unwrap_or(1).max(1)
    }
}

/// `filter[name]` → `name`, `filter[name][op]` → `name:op`.
fn parse_filter_key(key: &str) -> Option<String> {
    let rest = key.strip_prefix("filter[")?;
    let (field, rest) = rest.split_once(']')?;
    if field.is_empty() {
        return None;
    }
    if rest.is_empty() {
        return Some(field.to_string());
    }
    let op = rest.strip_prefix('[')?.strip_suffix(']')?;
    if op.is_empty() {
        return None;
    }
    Some(format!("{field}:{op}"))
}
