use std::collections::BTreeMap;

use serde_json::Value;

use crate::payload::{PageMeta, Row};

/// Per-column search substrings plus one global substring. All comparisons
/// are case-insensitive containment; empty strings match everything.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterState {
    pub global: String,
    pub columns: BTreeMap<String, String>,
}

impl FilterState {
    pub fn is_empty(&self) -> bool {
        self.global.trim().is_empty() && self.columns.values().all(|v| v.trim().is_empty())
    }
}

/// The rows visible for one (page, page_size) window plus derived counts.
#[derive(Clone, Debug, PartialEq)]
pub struct PageView {
    pub rows: Vec<Row>,
    pub page: usize,
    pub page_size: usize,
    pub total_rows: usize,
    pub total_pages: usize,
}

/// A row field rendered for matching. Missing and null fields compare as
/// empty strings; everything else compares by its JSON text.
fn field_text(row: &Row, key: &str) -> String {
    match row.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

pub fn row_matches(row: &Row, searchable: &[String], filters: &FilterState) -> bool {
    let global = filters.global.trim();
    if !global.is_empty() {
        let hit = searchable
            .iter()
            .any(|key| contains_ci(&field_text(row, key), global));
        if !hit {
            return false;
        }
    }
    for (key, needle) in filters.columns.iter() {
        let needle = needle.trim();
        if needle.is_empty() {
            continue;
        }
        if !contains_ci(&field_text(row, key), needle) {
            return false;
        }
    }
    true
}

/// Filters and slices a full in-memory row set into the visible page.
/// Insertion order is preserved; `total_pages` never drops below 1; a page
/// past the end yields an empty slice rather than an error.
pub fn page_view(
    rows: &[Row],
    searchable: &[String],
    filters: &FilterState,
    page: usize,
    page_size: usize,
) -> PageView {
    let page = page.max(1);
    let page_size = page_size.max(1);

    let filtered: Vec<&Row> = rows
        .iter()
        .filter(|row| row_matches(row, searchable, filters))
        .collect();

    let total_rows = filtered.len();
    let total_pages = (total_rows.div_ceil(page_size)).max(1);

    let start = (page - 1).saturating_mul(page_size);
    let visible: Vec<Row> = filtered
        .into_iter()
        .skip(start)
        .take(page_size)
        .cloned()
        .collect();

    PageView {
        rows: visible,
        page,
        page_size,
        total_rows,
        total_pages,
    }
}

/// Where a table's rows come from. The two modes are mutually exclusive per
/// screen: a server-paginated slice is trusted as-is and never re-filtered
/// or re-sliced locally.
#[derive(Clone, Debug)]
pub enum TableSource {
    Local(Vec<Row>),
    Server { rows: Vec<Row>, meta: PageMeta },
}

#[derive(Clone, Debug)]
pub struct TableState {
    source: TableSource,
    searchable: Vec<String>,
    filters: FilterState,
    page: usize,
    page_size: usize,
}

impl TableState {
    pub fn local(rows: Vec<Row>, searchable: Vec<String>, page_size: usize) -> Self {
        Self {
            source: TableSource::Local(rows),
            searchable,
            filters: FilterState::default(),
            page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn server(rows: Vec<Row>, meta: PageMeta) -> Self {
        Self {
            source: TableSource::Server { rows, meta },
            searchable: Vec::new(),
            filters: FilterState::default(),
            page: meta.page.max(1) as usize,
            page_size: meta.page_size.max(1) as usize,
        }
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn page(&self) -> usize {
        self.page
    }

    /// Any filter change resets the page, so a shrunken result set can
    /// never leave the view stranded past the last page.
    pub fn set_global_filter(&mut self, needle: impl Into<String>) {
        self.filters.global = needle.into();
        self.page = 1;
    }

    pub fn set_column_filter(&mut self, column: impl Into<String>, needle: impl Into<String>) {
        self.filters.columns.insert(column.into(), needle.into());
        self.page = 1;
    }

    pub fn clear_filters(&mut self) {
        self.filters = FilterState::default();
        self.page = 1;
    }

    pub fn set_page(&mut self, page: usize) {
        self.page = page.max(1);
    }

    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page = 1;
    }

    /// Result sets are replaced wholesale on every fetch, never merged.
    pub fn replace(&mut self, source: TableSource) {
        if let TableSource::Server { meta, .. } = &source {
            self.page = meta.page.max(1) as usize;
            self.page_size = meta.page_size.max(1) as usize;
        }
        self.source = source;
    }

    pub fn view(&self) -> PageView {
        match &self.source {
            TableSource::Local(rows) => page_view(
                rows,
                &self.searchable,
                &self.filters,
                self.page,
                self.page_size,
            ),
            TableSource::Server { rows, meta } => PageView {
                rows: rows.clone(),
                page: meta.page.max(1) as usize,
                page_size: meta.page_size.max(1) as usize,
                total_rows: meta.total as usize,
                total_pages: meta.last_page.max(1) as usize,
            },
        }
    }
}
