//! Reads cutoff tables from spreadsheets, CSV exports, HTML pages and URLs
//! into one in-memory shape the importer understands.

use crate::error::{RankError, Result};
use calamine::{open_workbook_auto, open_workbook_auto_from_rs, Data, Reader};
use scraper::{ElementRef, Html, Selector};
use std::fmt;
use std::io::{Cursor, Read, Seek};
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl Cell {
    /// Text cells coming from CSV or HTML are kept as text; numeric coercion
    /// happens in the importer.
    pub fn from_text(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Float(f) => f.is_nan(),
            _ => false,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Int(n) => write!(f, "{}", n),
            Cell::Float(x) if x.fract() == 0.0 && x.is_finite() => write!(f, "{}", *x as i64),
            Cell::Float(x) => write!(f, "{}", x),
            Cell::Text(s) => f.write_str(s.trim()),
            Cell::Bool(b) => write!(f, "{}", b),
        }
    }
}

impl From<&Data> for Cell {
    fn from(data: &Data) -> Self {
        match data {
            Data::Int(n) => Cell::Int(*n),
            Data::Float(x) => Cell::Float(*x),
            Data::String(s) => Cell::from_text(s),
            Data::Bool(b) => Cell::Bool(*b),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from_text(s),
            _ => Cell::Empty,
        }
    }
}

/// Header row plus data rows, in source order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl RawTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn from_cells(source: &str, mut rows: Vec<Vec<Cell>>) -> Self {
        // Leading blank lines are common in hand-made sheets.
        let header_at = rows
            .iter()
            .position(|row| row.iter().any(|cell| !cell.is_empty()));
        let Some(header_at) = header_at else {
            return Self {
                source: source.to_string(),
                ..Default::default()
            };
        };

        let data_rows = rows.split_off(header_at + 1);
        let headers = rows
            .pop()
            .unwrap_or_default()
            .iter()
            .map(|cell| cell.to_string())
            .collect();

        Self {
            source: source.to_string(),
            headers,
            rows: data_rows
                .into_iter()
                .filter(|row| row.iter().any(|cell| !cell.is_empty()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Spreadsheet,
    Csv,
    Html,
}

impl SourceFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(SourceFormat::Spreadsheet),
            "csv" => Some(SourceFormat::Csv),
            "html" | "htm" => Some(SourceFormat::Html),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

pub struct TableScraper {
    client: reqwest::Client,
}

impl Default for TableScraper {
    fn default() -> Self {
        Self::new()
    }
}

impl TableScraper {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn scrape_file(&self, file_path: &Path) -> Result<RawTable> {
        let source = file_path.display().to_string();
        let format = SourceFormat::from_path(file_path).ok_or_else(|| {
            RankError::UnsupportedSource(format!(
                "{} (expected .xlsx, .xls, .ods, .csv or .html)",
                source
            ))
        })?;

        info!(source = %source, ?format, "reading cutoff table");
        let table = match format {
            SourceFormat::Spreadsheet => {
                let mut workbook = open_workbook_auto(file_path)?;
                read_first_sheet(&mut workbook, &source)?
            }
            SourceFormat::Csv => {
                let reader = csv::ReaderBuilder::new()
                    .has_headers(false)
                    .flexible(true)
                    .from_path(file_path)?;
                read_csv(reader, &source)?
            }
            SourceFormat::Html => {
                let content = std::fs::read_to_string(file_path)?;
                parse_html_table(&content, &source)
            }
        };

        if table.is_empty() {
            warn!(source = %source, "no data rows found");
        }
        Ok(table)
    }

    pub async fn scrape_url(&self, url: &str) -> Result<RawTable> {
        info!(url, "fetching cutoff table");

        let response = self
            .client
            .get(url)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await?
            .error_for_status()?;

        let path_part = url.split(['?', '#']).next().unwrap_or(url);
        let format = Path::new(path_part)
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(SourceFormat::from_extension)
            .unwrap_or(SourceFormat::Html);

        let bytes = response.bytes().await?;
        debug!(url, bytes = bytes.len(), ?format, "downloaded cutoff table");

        match format {
            SourceFormat::Spreadsheet => {
                let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;
                read_first_sheet(&mut workbook, url)
            }
            SourceFormat::Csv => {
                let reader = csv::ReaderBuilder::new()
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(bytes.as_ref());
                read_csv(reader, url)
            }
            SourceFormat::Html => {
                let content = String::from_utf8_lossy(&bytes);
                Ok(parse_html_table(&content, url))
            }
        }
    }
}

fn read_first_sheet<RS>(workbook: &mut calamine::Sheets<RS>, source: &str) -> Result<RawTable>
where
    RS: Read + Seek,
{
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| RankError::ImportValidation(format!("{} has no worksheets", source)))??;

    let rows = range
        .rows()
        .map(|row| row.iter().map(Cell::from).collect())
        .collect();
    Ok(RawTable::from_cells(source, rows))
}

fn read_csv<R: Read>(mut reader: csv::Reader<R>, source: &str) -> Result<RawTable> {
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(Cell::from_text).collect());
    }
    Ok(RawTable::from_cells(source, rows))
}

fn cell_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Picks the first table whose header mentions an institute code, else the
/// first table on the page.
pub fn parse_html_table(content: &str, source: &str) -> RawTable {
    let document = Html::parse_document(content);
    let (Ok(table_selector), Ok(row_selector), Ok(cell_selector)) = (
        Selector::parse("table"),
        Selector::parse("tr"),
        Selector::parse("th, td"),
    ) else {
        return RawTable::default();
    };

    let tables: Vec<Vec<Vec<Cell>>> = document
        .select(&table_selector)
        .map(|table| {
            table
                .select(&row_selector)
                .map(|row| {
                    row.select(&cell_selector)
                        .map(|cell| Cell::from_text(&cell_text(&cell)))
                        .collect()
                })
                .collect()
        })
        .collect();

    if tables.is_empty() {
        warn!(source, "no <table> element found");
        return RawTable {
            source: source.to_string(),
            ..Default::default()
        };
    }

    let mentions_inst_code = |rows: &Vec<Vec<Cell>>| {
        rows.iter()
            .take(3)
            .flatten()
            .any(|cell| cell.to_string().eq_ignore_ascii_case("inst code"))
    };
    let chosen = tables
        .iter()
        .position(mentions_inst_code)
        .unwrap_or(0);

    RawTable::from_cells(source, tables.into_iter().nth(chosen).unwrap_or_default())
}
