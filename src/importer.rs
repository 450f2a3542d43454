//! Turns tabular cutoff imports into the nested institute/branch data set.

use crate::categories::CutoffKey;
use crate::dataset::DatasetStore;
use crate::error::{RankError, Result};
use crate::models::{Branch, Config, CutoffCell, DataSourceMode, Institute};
use crate::scraper::{Cell, RawTable, SourceFormat, TableScraper};
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info, warn};

pub const INST_CODE: &str = "inst_code";
pub const INSTITUTE_NAME: &str = "institute_name";
pub const PLACE: &str = "place";
pub const DIST_CODE: &str = "dist_code";
pub const CO_ED: &str = "co_ed";
pub const COLLEGE_TYPE: &str = "college_type";
pub const YEAR_ESTABLISHED: &str = "year_established";
pub const BRANCH_CODE: &str = "branch_code";
pub const BRANCH_NAME: &str = "branch_name";
pub const TUITION_FEE: &str = "tuition_fee";
pub const AFFILIATED_TO: &str = "affiliated_to";

/// Spreadsheet header -> internal column, before the cutoff block.
pub const LEADING_COLUMNS: [(&str, &str); 9] = [
    ("Inst Code", INST_CODE),
    ("Institute Name", INSTITUTE_NAME),
    ("Place", PLACE),
    ("Dist Code", DIST_CODE),
    ("Co Education", CO_ED),
    ("College Type", COLLEGE_TYPE),
    ("Year of Estab", YEAR_ESTABLISHED),
    ("Branch Code", BRANCH_CODE),
    ("Branch Name", BRANCH_NAME),
];

/// Spreadsheet header -> internal column, after the cutoff block.
pub const TRAILING_COLUMNS: [(&str, &str); 2] =
    [("Tuition Fee", TUITION_FEE), ("Affiliated To", AFFILIATED_TO)];

pub const REQUIRED_COLUMNS: [&str; 9] = [
    INST_CODE,
    INSTITUTE_NAME,
    PLACE,
    DIST_CODE,
    CO_ED,
    COLLEGE_TYPE,
    BRANCH_CODE,
    BRANCH_NAME,
    TUITION_FEE,
];

/// Full import layout in column order: leading fields, 18 cutoffs, trailing fields.
pub fn import_columns() -> Vec<(&'static str, &'static str)> {
    LEADING_COLUMNS
        .iter()
        .copied()
        .chain(CutoffKey::ALL.iter().map(|key| (key.column_label(), key.as_str())))
        .chain(TRAILING_COLUMNS.iter().copied())
        .collect()
}

fn whitespace() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").expect("static regex"))
}

/// Maps a header to its internal column name. Accepts the spreadsheet label
/// (any run of whitespace counts as one space) or the internal name itself.
pub fn map_header(header: &str) -> Option<&'static str> {
    let normalized = whitespace().replace_all(header.trim(), " ");
    import_columns()
        .into_iter()
        .find(|(label, internal)| {
            label.eq_ignore_ascii_case(&normalized) || *internal == normalized
        })
        .map(|(_, internal)| internal)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub institutes: usize,
    pub branches: usize,
    pub skipped_rows: usize,
    pub dropped_cutoffs: usize,
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Successfully processed {} institutes with {} branches",
            self.institutes, self.branches
        )
    }
}

/// Integer view of a cell: whole numbers, floats (truncated) and numeric
/// text such as "26588" or "26588.0". Blank and "nan" cells are `None`.
pub fn cell_to_int(cell: &Cell) -> Option<i64> {
    match cell {
        Cell::Int(n) => Some(*n),
        Cell::Float(x) if x.is_finite() => Some(x.trunc() as i64),
        Cell::Text(s) => {
            let s = s.trim();
            if s.is_empty() || s.eq_ignore_ascii_case("nan") {
                return None;
            }
            s.parse::<i64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|x| x.is_finite())
                    .map(|x| x.trunc() as i64)
            })
        }
        _ => None,
    }
}

fn cell_to_string(cell: &Cell) -> Option<String> {
    if cell.is_empty() {
        None
    } else {
        Some(cell.to_string())
    }
}

struct ColumnIndex {
    positions: HashMap<&'static str, usize>,
}

impl ColumnIndex {
    fn new(table: &RawTable) -> Result<Self> {
        let mut positions = HashMap::new();
        for (i, header) in table.headers.iter().enumerate() {
            match map_header(header) {
                // First occurrence wins if a sheet repeats a header.
                Some(internal) => {
                    positions.entry(internal).or_insert(i);
                }
                None if !header.trim().is_empty() => {
                    debug!(source = %table.source, header = %header, "ignoring unknown column");
                }
                None => {}
            }
        }

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|column| !positions.contains_key(column))
            .collect();
        if !missing.is_empty() {
            return Err(RankError::ImportValidation(format!(
                "Missing required columns in {}: {}",
                table.source,
                missing.join(", ")
            )));
        }

        Ok(Self { positions })
    }

    fn get<'r>(&self, row: &'r [Cell], column: &str) -> Option<&'r Cell> {
        self.positions.get(column).and_then(|&i| row.get(i))
    }

    fn text(&self, row: &[Cell], column: &str) -> Option<String> {
        self.get(row, column).and_then(cell_to_string)
    }

    fn int(&self, row: &[Cell], column: &str) -> Option<i64> {
        self.get(row, column).and_then(cell_to_int)
    }
}

pub struct DatasetBuilder {
    default_affiliation: Option<String>,
}

impl DatasetBuilder {
    pub fn new(default_affiliation: Option<String>) -> Self {
        Self {
            default_affiliation,
        }
    }

    /// Validates every table before converting any of them, so one bad
    /// source rejects the whole import.
    pub fn build(&self, tables: &[RawTable]) -> Result<(Vec<Institute>, ImportSummary)> {
        let indexes = tables
            .iter()
            .map(ColumnIndex::new)
            .collect::<Result<Vec<_>>>()?;

        let mut summary = ImportSummary::default();
        // Ordered by institute code; each entry keeps the first row's institute fields.
        let mut institutes: BTreeMap<String, Institute> = BTreeMap::new();

        for (table, index) in tables.iter().zip(&indexes) {
            for (row_number, row) in table.rows.iter().enumerate() {
                let Some(inst_code) = index.text(row, INST_CODE) else {
                    warn!(source = %table.source, row = row_number + 2, "skipping row without institute code");
                    summary.skipped_rows += 1;
                    continue;
                };

                let branch = self.build_branch(index, row, &mut summary);
                institutes
                    .entry(inst_code.clone())
                    .or_insert_with(|| self.build_institute(index, row, inst_code))
                    .branches
                    .push(branch);
            }
        }

        let institutes: Vec<Institute> = institutes.into_values().collect();
        summary.institutes = institutes.len();
        summary.branches = institutes.iter().map(|i| i.branches.len()).sum();

        for institute in &institutes {
            debug!(inst_code = %institute.inst_code, branches = institute.branches.len(), "built institute");
        }
        info!(
            institutes = summary.institutes,
            branches = summary.branches,
            skipped_rows = summary.skipped_rows,
            dropped_cutoffs = summary.dropped_cutoffs,
            "built dataset from import"
        );

        Ok((institutes, summary))
    }

    fn build_institute(&self, index: &ColumnIndex, row: &[Cell], inst_code: String) -> Institute {
        Institute {
            inst_code,
            name: index.text(row, INSTITUTE_NAME).unwrap_or_default(),
            place: index.text(row, PLACE).unwrap_or_default(),
            dist_code: index.text(row, DIST_CODE).unwrap_or_default(),
            co_ed: index.text(row, CO_ED).unwrap_or_default(),
            college_type: index.text(row, COLLEGE_TYPE).unwrap_or_default(),
            year_established: index.int(row, YEAR_ESTABLISHED).unwrap_or(0),
            website: String::new(),
            facilities: Vec::new(),
            branches: Vec::new(),
        }
    }

    fn build_branch(&self, index: &ColumnIndex, row: &[Cell], summary: &mut ImportSummary) -> Branch {
        let mut cutoffs = BTreeMap::new();
        for key in CutoffKey::ALL {
            let Some(cell) = index.get(row, key.as_str()) else {
                continue;
            };
            if cell.is_empty() || cell_to_string(cell).is_some_and(|s| s.eq_ignore_ascii_case("nan")) {
                continue;
            }
            match cell_to_int(cell).and_then(|n| u32::try_from(n).ok()).filter(|n| *n > 0) {
                Some(rank) => {
                    cutoffs.insert(key.as_str().to_string(), CutoffCell::from(rank));
                }
                None => {
                    // Recorded as absent, never as rank 0.
                    warn!(column = key.as_str(), value = %cell, "dropping unparsable cutoff");
                    summary.dropped_cutoffs += 1;
                }
            }
        }

        Branch {
            branch_code: index.text(row, BRANCH_CODE).unwrap_or_default(),
            name: index.text(row, BRANCH_NAME).unwrap_or_default(),
            tuition_fee: index
                .int(row, TUITION_FEE)
                .and_then(|fee| u64::try_from(fee).ok())
                .unwrap_or(0),
            affiliated_to: index
                .text(row, AFFILIATED_TO)
                .or_else(|| self.default_affiliation.clone()),
            seats: None,
            duration: None,
            cutoffs,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportSource {
    File(PathBuf),
    Url(String),
}

impl ImportSource {
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            ImportSource::Url(raw.to_string())
        } else {
            ImportSource::File(PathBuf::from(raw))
        }
    }
}

impl fmt::Display for ImportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportSource::File(path) => write!(f, "{}", path.display()),
            ImportSource::Url(url) => f.write_str(url),
        }
    }
}

/// Every readable table file directly inside `dir`, in name order.
pub fn table_files_in(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && SourceFormat::from_path(&path).is_some() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Expands command-line sources (directories become their table files). With
/// nothing given, falls back to the configured data directory and/or URLs.
pub fn resolve_sources(raw: &[String], config: &Config) -> Result<Vec<ImportSource>> {
    let mut sources = Vec::new();

    if raw.is_empty() {
        let use_local = matches!(config.data_source_mode, DataSourceMode::Local | DataSourceMode::Both);
        let use_internet = matches!(config.data_source_mode, DataSourceMode::Internet | DataSourceMode::Both);

        if use_local {
            let dir = Path::new(config.data_directory.as_deref().unwrap_or("data-source"));
            if dir.is_dir() {
                sources.extend(table_files_in(dir)?.into_iter().map(ImportSource::File));
            } else {
                warn!(dir = %dir.display(), "data directory not found");
            }
        }
        if use_internet {
            sources.extend(
                config
                    .internet_urls
                    .iter()
                    .flatten()
                    .map(|url| ImportSource::Url(url.clone())),
            );
        }
    } else {
        for item in raw {
            match ImportSource::parse(item) {
                ImportSource::File(path) if path.is_dir() => {
                    sources.extend(table_files_in(&path)?.into_iter().map(ImportSource::File));
                }
                source => sources.push(source),
            }
        }
    }

    if sources.is_empty() {
        return Err(RankError::ImportValidation(
            "No import sources found. Pass a spreadsheet, CSV, HTML file or URL".to_string(),
        ));
    }
    Ok(sources)
}

/// Reads every source, builds the institute set and replaces the store's
/// dataset. Nothing is committed unless every source reads and validates.
pub async fn import_sources(
    store: &DatasetStore,
    scraper: &TableScraper,
    builder: &DatasetBuilder,
    sources: &[ImportSource],
) -> Result<ImportSummary> {
    let mut tables = Vec::with_capacity(sources.len());
    for source in sources {
        let table = match source {
            ImportSource::File(path) => scraper.scrape_file(path)?,
            ImportSource::Url(url) => scraper.scrape_url(url).await?,
        };
        info!(source = %source, rows = table.rows.len(), "read import source");
        tables.push(table);
    }

    let (institutes, summary) = builder.build(&tables)?;
    store.replace(institutes)?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Cell {
        Cell::from_text(s)
    }

    fn table(headers: &[&str], rows: Vec<Vec<Cell>>) -> RawTable {
        RawTable {
            source: "test.xlsx".to_string(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    const HEADERS: [&str; 14] = [
        "Inst Code",
        "Institute Name",
        "Place",
        "Dist Code",
        "Co Education",
        "College Type",
        "Year of Estab",
        "Branch Code",
        "Branch Name",
        "OC BOYS",
        "OC GIRLS",
        "SC  BOYS",
        "Tuition Fee",
        "Affiliated To",
    ];

    fn row(code: &str, name: &str, branch: &str, oc_boys: Cell, oc_girls: Cell, fee: Cell) -> Vec<Cell> {
        vec![
            text(code),
            text(name),
            text("HYDERABAD"),
            text("HYD"),
            text("COED"),
            text("PVT"),
            Cell::Float(2010.0),
            text(branch),
            text(&format!("{} ENGINEERING", branch)),
            oc_boys,
            oc_girls,
            Cell::Empty,
            fee,
            Cell::Empty,
        ]
    }

    #[test]
    fn test_header_mapping() {
        assert_eq!(map_header("Inst Code"), Some(INST_CODE));
        assert_eq!(map_header("  inst   code "), Some(INST_CODE));
        assert_eq!(map_header("BC_A GIRLS"), Some("BC_A_GIRLS"));
        assert_eq!(map_header("EWS_GEN_OU"), Some("EWS_GEN_OU"));
        assert_eq!(map_header("tuition_fee"), Some(TUITION_FEE));
        assert_eq!(map_header("Remarks"), None);
        assert_eq!(import_columns().len(), 29);
    }

    #[test]
    fn test_cell_coercion() {
        assert_eq!(cell_to_int(&Cell::Int(5)), Some(5));
        assert_eq!(cell_to_int(&Cell::Float(26588.9)), Some(26588));
        assert_eq!(cell_to_int(&text("26588.0")), Some(26588));
        assert_eq!(cell_to_int(&text("nan")), None);
        assert_eq!(cell_to_int(&text("--")), None);
        assert_eq!(cell_to_int(&Cell::Float(f64::NAN)), None);
        assert_eq!(cell_to_int(&Cell::Empty), None);
    }

    #[test]
    fn test_groups_rows_by_institute_first_row_wins() {
        let rows = vec![
            row("ZETA", "ZETA COLLEGE", "CSE", Cell::Int(15000), Cell::Int(18000), Cell::Int(50000)),
            row("AARM", "AAR MAHAVEER", "CSE", Cell::Int(26588), Cell::Float(29938.0), Cell::Int(60000)),
            row("AARM", "RENAMED LATER", "ECE", Cell::Int(54242), Cell::Empty, text("")),
        ];
        let (institutes, summary) = DatasetBuilder::new(None)
            .build(&[table(&HEADERS, rows)])
            .unwrap();

        assert_eq!(summary.institutes, 2);
        assert_eq!(summary.branches, 3);
        assert_eq!(summary.to_string(), "Successfully processed 2 institutes with 3 branches");

        // Sorted by code.
        assert_eq!(institutes[0].inst_code, "AARM");
        assert_eq!(institutes[1].inst_code, "ZETA");

        let aarm = &institutes[0];
        assert_eq!(aarm.name, "AAR MAHAVEER");
        assert_eq!(aarm.year_established, 2010);
        assert_eq!(aarm.branches.len(), 2);
        assert_eq!(aarm.branches[0].branch_code, "CSE");
        assert_eq!(aarm.branches[0].tuition_fee, 60000);
        assert_eq!(
            aarm.branches[0].cutoff(CutoffKey::OcGirls),
            Some(&CutoffCell::Rank(29938))
        );

        let ece = &aarm.branches[1];
        assert_eq!(ece.tuition_fee, 0);
        assert_eq!(ece.cutoff(CutoffKey::OcGirls), None);
        assert_eq!(ece.cutoff(CutoffKey::ScBoys), None);
        assert_eq!(ece.affiliated_to, None);
    }

    #[test]
    fn test_unparsable_cutoffs_are_absent_not_zero() {
        let rows = vec![row("AARM", "AAR", "CSE", text("N/A"), text("0"), Cell::Int(1))];
        let (institutes, summary) = DatasetBuilder::new(None)
            .build(&[table(&HEADERS, rows)])
            .unwrap();

        assert!(institutes[0].branches[0].cutoffs.is_empty());
        assert_eq!(summary.dropped_cutoffs, 2);
    }

    #[test]
    fn test_missing_required_columns_rejects_everything() {
        let good = table(&HEADERS, vec![row("AARM", "AAR", "CSE", Cell::Int(1), Cell::Int(2), Cell::Int(3))]);
        let bad = table(&["Inst Code", "Institute Name", "Branch Name"], vec![vec![text("X"), text("Y"), text("Z")]]);

        let err = DatasetBuilder::new(None).build(&[good, bad]).unwrap_err();
        match err {
            RankError::ImportValidation(message) => {
                assert!(message.contains("place"));
                assert!(message.contains("tuition_fee"));
                assert!(!message.contains("institute_name"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rows_without_code_are_skipped() {
        let rows = vec![
            row("", "ORPHAN", "CSE", Cell::Int(1), Cell::Int(2), Cell::Int(3)),
            row("AARM", "AAR", "CSE", Cell::Int(1), Cell::Int(2), Cell::Int(3)),
        ];
        let (institutes, summary) = DatasetBuilder::new(Some("JNTUH".into()))
            .build(&[table(&HEADERS, rows)])
            .unwrap();
        assert_eq!(institutes.len(), 1);
        assert_eq!(summary.skipped_rows, 1);
        assert_eq!(institutes[0].branches[0].affiliated_to.as_deref(), Some("JNTUH"));
    }

    #[test]
    fn test_multiple_sources_merge() {
        let first = table(&HEADERS, vec![row("AARM", "AAR", "CSE", Cell::Int(1), Cell::Int(2), Cell::Int(3))]);
        let second = table(&HEADERS, vec![row("AARM", "AAR", "IT", Cell::Int(4), Cell::Int(5), Cell::Int(6))]);
        let (institutes, summary) = DatasetBuilder::new(None).build(&[first, second]).unwrap();
        assert_eq!(institutes.len(), 1);
        assert_eq!(summary.branches, 2);
        assert_eq!(institutes[0].branches[1].branch_code, "IT");
    }
}
