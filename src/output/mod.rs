use colored::Colorize;
use itertools::Itertools;
use serde_json::Value;

use crate::payload::Row;
use crate::table::PageView;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".txt") {
        return Some(OutputFormat::Text);
    }
    None
}

fn cell_text(row: &Row, key: &str) -> String {
    match row.get(key) {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Column keys in first-seen order across the rows, id-ish keys first to
/// keep the table stable regardless of per-row field ordering.
pub fn column_keys(rows: &[Row]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.clone());
            }
        }
    }
    if let Some(pos) = keys.iter().position(|k| k == "id") {
        let id = keys.remove(pos);
        keys.insert(0, id);
    }
    keys
}

pub fn render_text(view: &PageView, no_color: bool) -> Vec<u8> {
    let keys = column_keys(&view.rows);
    let mut out = String::new();

    if keys.is_empty() {
        out.push_str("(no rows)\n");
        return out.into_bytes();
    }

    let widths: Vec<usize> = keys
        .iter()
        .map(|key| {
            view.rows
                .iter()
                .map(|row| cell_text(row, key).chars().count())
                .chain(std::iter::once(key.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header = keys
        .iter()
        .zip(widths.iter())
        .map(|(key, &w)| format!("{key:<w$}"))
        .join("  ");
    if no_color {
        out.push_str(&header);
    } else {
        out.push_str(&header.bold().to_string());
    }
    out.push('\n');

    for row in view.rows.iter() {
        let line = keys
            .iter()
            .zip(widths.iter())
            .map(|(key, &w)| {
                let cell = cell_text(row, key);
                format!("{cell:<w$}")
            })
            .join("  ");
        out.push_str(line.trim_end());
        out.push('\n');
    }

    out.push_str(&format!(
        "page {}/{} :: {} row(s) total\n",
        view.page, view.total_pages, view.total_rows
    ));
    out.into_bytes()
}

pub fn render_json(view: &PageView) -> Vec<u8> {
    let doc = serde_json::json!({
        "rows": view.rows,
        "page": view.page,
        "page_size": view.page_size,
        "total_rows": view.total_rows,
        "total_pages": view.total_pages,
    });
    let mut out = serde_json::to_vec_pretty(&doc).unwrap_or_else(|_| b"{}".to_vec());
    out.push(b'\n');
    out
}
