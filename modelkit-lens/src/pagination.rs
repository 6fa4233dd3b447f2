//! Paginator results and their wire metadata.
//!
//! [`Page`] is what a lens returns. [`meta`] and [`links`] normalize it into
//! the fixed `meta`/`links` shapes clients read; a page that carries no
//! pagination state ([`Page::Unpaged`]) normalizes to `null` for both.

use crate::cursor::Cursor;
use crate::error::LensResult;
use modelkit_model::RecordId;
use modelkit_store::{Direction, FilterOp, Query, Row, Store};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Offset pagination with a total count.
#[derive(Debug, Clone, PartialEq)]
pub struct LengthAwarePage {
    pub data: Vec<Row>,
    pub total: u64,
    pub per_page: usize,
    pub current_page: u64,
    pub path: String,
}

impl LengthAwarePage {
    /// `max(1, ceil(total / per_page))`.
    pub fn last_page(&self) -> u64 {
        let per_page = self.per_page.max(1) as u64;
        self.total.div_ceil(per_page).max(1)
    }

    pub fn from(&self) -> Option<u64> {
        first_item(self.current_page, self.per_page, self.data.len())
    }

    pub fn to(&self) -> Option<u64> {
        last_item(self.current_page, self.per_page, self.data.len())
    }

    pub fn has_more_pages(&self) -> bool {
        self.current_page < self.last_page()
    }
}

/// Offset pagination that only knows whether another page follows.
#[derive(Debug, Clone, PartialEq)]
pub struct SimplePage {
    pub data: Vec<Row>,
    pub per_page: usize,
    pub current_page: u64,
    pub has_more: bool,
    pub path: String,
}

impl SimplePage {
    pub fn from(&self) -> Option<u64> {
        first_item(self.current_page, self.per_page, self.data.len())
    }

    pub fn to(&self) -> Option<u64> {
        last_item(self.current_page, self.per_page, self.data.len())
    }
}

/// Keyset pagination over record ids.
#[derive(Debug, Clone, PartialEq)]
pub struct CursorPage {
    pub data: Vec<Row>,
    pub per_page: usize,
    pub path: String,
    /// Query parameter the cursor token is sent back in.
    pub cursor_name: String,
    pub next_cursor: Option<Cursor>,
    pub prev_cursor: Option<Cursor>,
}

impl CursorPage {
    fn url(&self, cursor: &Cursor) -> String {
        format!(
            "{}{}{}={}",
            self.path,
            separator(&self.path),
            self.cursor_name,
            cursor.encode()
        )
    }
}

/// A paginator result.
#[derive(Debug, Clone, PartialEq)]
pub enum Page {
    Full(LengthAwarePage),
    Simple(SimplePage),
    Cursor(CursorPage),
    /// Rows without pagination state.
    Unpaged(Vec<Row>),
}

impl Page {
    pub fn data(&self) -> &[Row] {
        match self {
            Page::Full(p) => &p.data,
            Page::Simple(p) => &p.data,
            Page::Cursor(p) => &p.data,
            Page::Unpaged(rows) => rows,
        }
    }

    pub fn into_data(self) -> Vec<Row> {
        match self {
            Page::Full(p) => p.data,
            Page::Simple(p) => p.data,
            Page::Cursor(p) => p.data,
            Page::Unpaged(rows) => rows,
        }
    }
}

/// The `meta` object of a paginated response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PaginationMeta {
    Full {
        last_page: u64,
        total: u64,
        current_page: u64,
        from: Option<u64>,
        to: Option<u64>,
        per_page: usize,
        path: String,
    },
    Simple {
        current_page: u64,
        from: Option<u64>,
        to: Option<u64>,
        per_page: usize,
        path: String,
    },
    Cursor {
        path: String,
        per_page: usize,
        next_cursor: Option<String>,
        prev_cursor: Option<String>,
    },
}

/// The `links` object of a paginated response.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PaginationLinks {
    Full {
        first: String,
        last: String,
        prev: Option<String>,
        next: Option<String>,
    },
    Nav {
        prev: Option<String>,
        next: Option<String>,
    },
}

pub fn meta(page: &Page) -> Option<PaginationMeta> {
    match page {
        Page::Full(p) => Some(PaginationMeta::Full {
            last_page: p.last_page(),
            total: p.total,
            current_page: p.current_page,
            from: p.from(),
            to: p.to(),
            per_page: p.per_page,
            path: p.path.clone(),
        }),
        Page::Simple(p) => Some(PaginationMeta::Simple {
            current_page: p.current_page,
            from: p.from(),
            to: p.to(),
            per_page: p.per_page,
            path: p.path.clone(),
        }),
        Page::Cursor(p) => Some(PaginationMeta::Cursor {
            path: p.path.clone(),
            per_page: p.per_page,
            next_cursor: p.next_cursor.as_ref().map(Cursor::encode),
            prev_cursor: p.prev_cursor.as_ref().map(Cursor::encode),
        }),
        Page::Unpaged(_) => None,
    }
}

pub fn links(page: &Page) -> Option<PaginationLinks> {
    match page {
        Page::Full(p) => {
            let last_page = p.last_page();
            Some(PaginationLinks::Full {
                first: page_url(&p.path, 1),
                last: page_url(&p.path, last_page),
                prev: (p.current_page > 1).then(|| page_url(&p.path, p.current_page - 1)),
                next: (p.current_page < last_page).then(|| page_url(&p.path, p.current_page + 1)),
            })
        }
        Page::Simple(p) => Some(PaginationLinks::Nav {
            prev: (p.current_page > 1).then(|| page_url(&p.path, p.current_page - 1)),
            next: p.has_more.then(|| page_url(&p.path, p.current_page + 1)),
        }),
        Page::Cursor(p) => Some(PaginationLinks::Nav {
            prev: p.prev_cursor.as_ref().map(|c| p.url(c)),
            next: p.next_cursor.as_ref().map(|c| p.url(c)),
        }),
        Page::Unpaged(_) => None,
    }
}

/// `{ data, meta, links }` response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageEnvelope {
    pub data: Vec<Row>,
    pub meta: Option<PaginationMeta>,
    pub links: Option<PaginationLinks>,
}

impl From<Page> for PageEnvelope {
    fn from(page: Page) -> Self {
        let meta = meta(&page);
        let links = links(&page);
        Self {
            data: page.into_data(),
            meta,
            links,
        }
    }
}

fn separator(path: &str) -> char {
    if path.contains('?') { '&' } else { '?' }
}

fn page_url(path: &str, page: u64) -> String {
    format!("{path}{}page={page}", separator(path))
}

fn first_item(current_page: u64, per_page: usize, len: usize) -> Option<u64> {
    (len > 0).then(|| (current_page - 1) * per_page as u64 + 1)
}

fn last_item(current_page: u64, per_page: usize, len: usize) -> Option<u64> {
    first_item(current_page, per_page, len).map(|from| from + len as u64 - 1)
}

fn offset_for(page: u64, per_page: usize) -> usize {
    usize::try_from(page.saturating_sub(1))
        .unwrap_or(usize::MAX)
        .saturating_mul(per_page)
}

// ── Execution ────────────────────────────────────────────────────

pub(crate) fn paginate<S: Store + ?Sized>(
    store: &S,
    query: Query,
    per_page: usize,
    page: u64,
    path: &str,
) -> LensResult<Page> {
    let total = store.count(&query.for_count())?;
    let data = store.fetch(&query.offset(offset_for(page, per_page)).limit(per_page))?;
    Ok(Page::Full(LengthAwarePage {
        data,
        total,
        per_page,
        current_page: page,
        path: path.to_string(),
    }))
}

pub(crate) fn simple_paginate<S: Store + ?Sized>(
    store: &S,
    query: Query,
    per_page: usize,
    page: u64,
    path: &str,
) -> LensResult<Page> {
    let mut data = store.fetch(&query.offset(offset_for(page, per_page)).limit(per_page + 1))?;
    let has_more = data.len() > per_page;
    data.truncate(per_page);
    Ok(Page::Simple(SimplePage {
        data,
        per_page,
        current_page: page,
        has_more,
        path: path.to_string(),
    }))
}

/// Reads `per_page` rows on the cursor's side of its id, ordered by id.
///
/// Any requested sort order is replaced by id order; keyset positions are
/// only stable over the key they are taken from.
pub(crate) fn cursor_paginate<S: Store + ?Sized>(
    store: &S,
    mut query: Query,
    per_page: usize,
    cursor: Option<Cursor>,
    path: &str,
    cursor_name: &str,
) -> LensResult<Page> {
    let forward = cursor.is_none_or(|c| c.points_to_next);
    query.order.clear();
    query.offset = 0;

    let base = query.for_count();
    let mut window = match cursor {
        Some(c) if forward => query.filter("id", FilterOp::Gt, id_value(c.id)),
        Some(c) => query.filter("id", FilterOp::Lt, id_value(c.id)),
        None => query,
    };
    window = window
        .order_by("id", if forward { Direction::Asc } else { Direction::Desc })
        .limit(per_page + 1);

    let mut data = store.fetch(&window)?;
    let more_ahead = data.len() > per_page;
    data.truncate(per_page);
    if !forward {
        data.reverse();
    }

    let (first, last) = match (data.first(), data.last()) {
        (Some(first), Some(last)) => (first.id, last.id),
        _ => {
            debug!("cursor page on `{}` is empty", base.collection);
            return Ok(Page::Cursor(CursorPage {
                data,
                per_page,
                path: path.to_string(),
                cursor_name: cursor_name.to_string(),
                next_cursor: None,
                prev_cursor: None,
            }));
        }
    };

    let (next_cursor, prev_cursor) = if forward {
        let prev = match cursor {
            Some(_) => exists(store, &base, FilterOp::Lt, first)?,
            None => false,
        };
        (
            more_ahead.then(|| Cursor::next(last)),
            prev.then(|| Cursor::prev(first)),
        )
    } else {
        let next = exists(store, &base, FilterOp::Gt, last)?;
        (
            next.then(|| Cursor::next(last)),
            more_ahead.then(|| Cursor::prev(first)),
        )
    };

    Ok(Page::Cursor(CursorPage {
        data,
        per_page,
        path: path.to_string(),
        cursor_name: cursor_name.to_string(),
        next_cursor,
        prev_cursor,
    }))
}

fn exists<S: Store + ?Sized>(store: &S, base: &Query, op: FilterOp, id: RecordId) -> LensResult<bool> {
    let beyond = base.clone().filter("id", op, id_value(id));
    Ok(store.count(&beyond)? > 0)
}

fn id_value(id: RecordId) -> Value {
    Value::from(id.get())
}
