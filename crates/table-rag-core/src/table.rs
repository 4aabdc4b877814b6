//! HTML table extraction.
//!
//! Each HTML page member of an archive describes one table: an `<h1>` title,
//! a leading `<p>` description, and the `<table>` itself. Extraction keeps the
//! raw table markup for later re-rendering and flattens the cell text into a
//! form suitable for embedding.
//!
//! Cells whose whole text is a plain number (`42`, `-3.5`) are treated as
//! row indices or ids and dropped. Text that merely contains digits
//! (`Room 42`, `1.2kg`) is kept.
//!
//! # Example
//!
//! ```rust
//! use table_rag_core::table::{extract_table, CellJoin};
//!
//! let html = "<h1>Specs</h1><p>Device specs</p>\
//!             <table><tr><td>42</td><td>Weight</td></tr></table>";
//! let t = extract_table(html, CellJoin::Flatten).unwrap();
//! assert_eq!(t.title, "Specs");
//! assert_eq!(t.core_text, "Weight");
//! ```

use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

static TITLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1").expect("static selector"));
static DESCRIPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p").expect("static selector"));
static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table").expect("static selector"));
static ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr").expect("static selector"));

static NUMERIC_CELL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("static regex"));

/// Per-page extraction failure. The caller skips the page's table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExtractError {
    #[error("malformed page: {0}")]
    MalformedPage(String),

    #[error("no <table> element found")]
    NoTableFound,
}

/// How retained cell texts are joined into `core_text`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellJoin {
    /// One line of text, cells separated by a single space.
    #[default]
    Flatten,
    /// One cell per line.
    Lines,
}

impl CellJoin {
    fn separator(&self) -> &'static str {
        match self {
            CellJoin::Flatten => " ",
            CellJoin::Lines => "\n",
        }
    }

    fn join(&self, cells: &[String]) -> String {
        let sep = self.separator();
        let doubled = sep.repeat(2);
        let mut out = cells.join(sep);
        while out.contains(&doubled) {
            out = out.replace(&doubled, sep);
        }
        out
    }
}

/// Result of [`extract_table`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableExtraction {
    pub title: String,
    pub description: String,
    pub core_text: String,
    /// Serialized markup of the first `<table>` element.
    pub table_html: String,
}

/// Extract title, description, and flattened cell text from one HTML page.
///
/// The first `<h1>`, first `<p>`, and first `<table>` in document order are
/// used. A missing or empty title/description is [`ExtractError::MalformedPage`];
/// a missing table is [`ExtractError::NoTableFound`].
pub fn extract_table(html: &str, join: CellJoin) -> Result<TableExtraction, ExtractError> {
    let document = Html::parse_document(html);

    let title = first_text(&document, &TITLE, "h1")?;
    let description = first_text(&document, &DESCRIPTION, "p")?;

    let table = document
        .select(&TABLE)
        .next()
        .ok_or(ExtractError::NoTableFound)?;

    let cells: Vec<String> = table
        .select(&ROW)
        .flat_map(row_cells)
        .map(|cell| normalize_whitespace(&cell.text().collect::<String>()))
        .filter(|text| !text.is_empty() && !is_numeric_cell(text))
        .collect();

    Ok(TableExtraction {
        title,
        description,
        core_text: join.join(&cells),
        table_html: table.html(),
    })
}

fn first_text(document: &Html, selector: &Selector, tag: &str) -> Result<String, ExtractError> {
    let element = document
        .select(selector)
        .next()
        .ok_or_else(|| ExtractError::MalformedPage(format!("missing <{}> element", tag)))?;
    let text = element.text().collect::<String>();
    let text = text.trim();
    if text.is_empty() {
        return Err(ExtractError::MalformedPage(format!("empty <{}> element", tag)));
    }
    Ok(text.to_string())
}

/// Direct `td`/`th` children of a row, in column order.
fn row_cells(row: ElementRef<'_>) -> impl Iterator<Item = ElementRef<'_>> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "td" | "th"))
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// True when the whole cell is a signed integer or decimal.
pub fn is_numeric_cell(text: &str) -> bool {
    NUMERIC_CELL.is_match(text)
}
