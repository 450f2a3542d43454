use crate::categories::{Category, CutoffKey, Gender};
use crate::error::RankError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data_file: String,
    pub credentials_file: String,
    pub output_directory: Option<String>,
    // Where `admin import` looks when no source is given on the command line
    pub data_source_mode: DataSourceMode,
    pub data_directory: Option<String>,
    pub internet_urls: Option<Vec<String>>,
    pub default_affiliation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataSourceMode {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "internet")]
    Internet,
    #[serde(rename = "both")]
    Both,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: "colleges_data.json".to_string(),
            credentials_file: "admin_credentials.json".to_string(),
            output_directory: Some("output".to_string()),
            data_source_mode: DataSourceMode::Local,
            data_directory: Some("data-source".to_string()),
            internet_urls: Some(Vec::new()),
            default_affiliation: None,
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(file_path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: impl AsRef<Path>) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(file_path, content)?;
        Ok(())
    }

    pub fn output_dir(&self) -> &str {
        self.output_directory.as_deref().unwrap_or("output")
    }
}

/// The persisted document: a single top-level list of institutes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollegesData {
    #[serde(default)]
    pub institutes: Vec<Institute>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Institute {
    pub inst_code: String,
    pub name: String,
    #[serde(default)]
    pub place: String,
    #[serde(default)]
    pub dist_code: String,
    #[serde(default)]
    pub co_ed: String,
    #[serde(default)]
    pub college_type: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub year_established: i64,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub facilities: Vec<String>,
    #[serde(default)]
    pub branches: Vec<Branch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub branch_code: String,
    pub name: String,
    #[serde(default, deserialize_with = "lenient::int")]
    pub tuition_fee: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliated_to: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::optional_int"
    )]
    pub seats: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default)]
    pub cutoffs: BTreeMap<String, CutoffCell>,
}

/// A cutoff as it sits in the data file. Imports always write integers, but
/// hand-edited files may carry floats, text such as "N/A", or nulls. Any of
/// these must load; only the cell itself is unusable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CutoffCell {
    Rank(i64),
    Float(f64),
    Text(String),
    Other(serde_json::Value),
}

impl CutoffCell {
    pub fn rank(&self, key: CutoffKey) -> Result<u32, RankError> {
        let malformed = || RankError::MalformedCutoffValue {
            key: key.to_string(),
            value: match self {
                CutoffCell::Rank(n) => n.to_string(),
                CutoffCell::Float(f) => f.to_string(),
                CutoffCell::Text(s) => s.clone(),
                CutoffCell::Other(v) => v.to_string(),
            },
        };

        let value = match self {
            CutoffCell::Rank(n) => *n,
            // Truncated toward zero, like an integer cast of the float.
            CutoffCell::Float(f) => float_to_i64(*f).ok_or_else(malformed)?,
            CutoffCell::Text(s) => s.trim().parse::<i64>().map_err(|_| malformed())?,
            CutoffCell::Other(_) => return Err(malformed()),
        };

        u32::try_from(value)
            .ok()
            .filter(|rank| *rank > 0)
            .ok_or_else(malformed)
    }
}

pub(crate) fn float_to_i64(value: f64) -> Option<i64> {
    let truncated = value.trunc();
    (truncated.is_finite() && truncated >= i64::MIN as f64 && truncated <= i64::MAX as f64)
        .then_some(truncated as i64)
}

/// Numeric fields in hand-edited data files fall back to their default
/// instead of rejecting the whole document.
mod lenient {
    use super::float_to_i64;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn to_i64(value: &Value) -> Option<i64> {
        match value {
            Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(float_to_i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn int<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<i64> + Default,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(to_i64(&value)
            .and_then(|n| T::try_from(n).ok())
            .unwrap_or_default())
    }

    pub fn optional_int<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<i64>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(to_i64(&value).and_then(|n| T::try_from(n).ok()))
    }
}

impl From<u32> for CutoffCell {
    fn from(rank: u32) -> Self {
        CutoffCell::Rank(i64::from(rank))
    }
}

impl Branch {
    pub fn cutoff(&self, key: CutoffKey) -> Option<&CutoffCell> {
        self.cutoffs.get(key.as_str())
    }
}

/// One (institute, branch) pair with institute-level attributes merged in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlattenedRecord {
    pub name: String,
    pub inst_code: String,
    pub place: String,
    pub branch: String,
    pub branch_code: String,
    pub tuition_fee: u64,
    pub affiliated_to: String,
    pub cutoffs: BTreeMap<String, CutoffCell>,
    pub college_type: String,
    pub co_ed: String,
    pub year_established: i64,
    pub website: String,
    pub facilities: String,
    pub seats: Option<u32>,
    pub duration: Option<String>,
}

pub const DEFAULT_AFFILIATION: &str = "Not Specified";

impl FlattenedRecord {
    pub fn new(institute: &Institute, branch: &Branch) -> Self {
        Self {
            name: institute.name.clone(),
            inst_code: institute.inst_code.clone(),
            place: institute.place.clone(),
            branch: branch.name.clone(),
            branch_code: branch.branch_code.clone(),
            tuition_fee: branch.tuition_fee,
            affiliated_to: branch
                .affiliated_to
                .clone()
                .unwrap_or_else(|| DEFAULT_AFFILIATION.to_string()),
            cutoffs: branch.cutoffs.clone(),
            college_type: institute.college_type.clone(),
            co_ed: institute.co_ed.clone(),
            year_established: institute.year_established,
            website: institute.website.clone(),
            facilities: institute.facilities.join(", "),
            seats: branch.seats,
            duration: branch.duration.clone(),
        }
    }

    pub fn cutoff(&self, key: CutoffKey) -> Option<&CutoffCell> {
        self.cutoffs.get(key.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub name: String,
    pub inst_code: String,
    pub branch: String,
    pub branch_code: String,
    pub cutoff_rank: u32,
    pub category: Category,
    pub gender: Gender,
    pub tuition_fee: u64,
    pub affiliated_to: String,
    pub college_type: String,
    pub co_ed: String,
    pub place: String,
    pub year_established: i64,
    pub website: String,
    pub facilities: String,
    pub seats: Option<u32>,
    pub duration: Option<String>,
}

impl SearchResult {
    pub fn from_match(record: &FlattenedRecord, key: CutoffKey, cutoff_rank: u32) -> Self {
        Self {
            name: record.name.clone(),
            inst_code: record.inst_code.clone(),
            branch: record.branch.clone(),
            branch_code: record.branch_code.clone(),
            cutoff_rank,
            category: key.category(),
            gender: key.gender(),
            tuition_fee: record.tuition_fee,
            affiliated_to: record.affiliated_to.clone(),
            college_type: record.college_type.clone(),
            co_ed: record.co_ed.clone(),
            place: record.place.clone(),
            year_established: record.year_established,
            website: record.website.clone(),
            facilities: record.facilities.clone(),
            seats: record.seats,
            duration: record.duration.clone(),
        }
    }
}
