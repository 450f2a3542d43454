use crate::categories::{Category, CutoffKey};
use crate::error::{RankError, Result};
use crate::models::{float_to_i64, FlattenedRecord, SearchResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

/// Window half-width never drops below this many ranks.
pub const MIN_THRESHOLD: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToleranceWindow {
    pub threshold: u64,
    pub lower_bound: u64,
    pub upper_bound: u64,
}

impl ToleranceWindow {
    /// `threshold = max(1000, floor(rank * 0.1))`, lower bound clamped to 1.
    pub fn for_rank(rank: u32) -> Self {
        let rank = u64::from(rank);
        let threshold = (rank / 10).max(MIN_THRESHOLD);
        Self {
            threshold,
            lower_bound: rank.saturating_sub(threshold).max(1),
            upper_bound: rank + threshold,
        }
    }

    pub fn contains(&self, cutoff: u32) -> bool {
        (self.lower_bound..=self.upper_bound).contains(&u64::from(cutoff))
    }
}

/// A validated search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    pub rank: u32,
    pub category: Option<Category>,
    pub branch: Option<String>,
    pub college_type: Option<String>,
}

impl SearchQuery {
    pub fn new(rank: u32) -> Result<Self> {
        if rank == 0 {
            return Err(RankError::InvalidInput(
                "Rank must be a positive integer".to_string(),
            ));
        }
        Ok(Self {
            rank,
            ..Default::default()
        })
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_college_type(mut self, college_type: impl Into<String>) -> Self {
        self.college_type = Some(college_type.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RankInput {
    Number(i64),
    Float(f64),
    Text(String),
}

/// A search as it arrives from outside: rank as string or number, filters as
/// free text where an empty string means "no filter".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub rank: Option<RankInput>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default)]
    pub college_type: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

pub fn parse_rank(input: &str) -> Result<u32> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(RankError::InvalidInput(
            "Rank parameter is required".to_string(),
        ));
    }
    let rank: i64 = trimmed
        .parse()
        .map_err(|_| RankError::InvalidInput("Rank must be a valid integer".to_string()))?;
    rank_from_i64(rank)
}

fn rank_from_i64(rank: i64) -> Result<u32> {
    if rank <= 0 {
        return Err(RankError::InvalidInput(
            "Rank must be a positive integer".to_string(),
        ));
    }
    u32::try_from(rank)
        .map_err(|_| RankError::InvalidInput("Rank is out of range".to_string()))
}

impl SearchRequest {
    pub fn validate(&self) -> Result<SearchQuery> {
        let rank = match &self.rank {
            None => {
                return Err(RankError::InvalidInput(
                    "Rank parameter is required".to_string(),
                ))
            }
            Some(RankInput::Number(n)) => rank_from_i64(*n)?,
            Some(RankInput::Float(f)) => rank_from_i64(float_to_i64(*f).ok_or_else(|| {
                RankError::InvalidInput("Rank must be a valid integer".to_string())
            })?)?,
            Some(RankInput::Text(s)) => parse_rank(s)?,
        };

        let mut query = SearchQuery::new(rank)?;
        if let Some(category) = non_empty(&self.category) {
            query = query.with_category(category.parse()?);
        }
        if let Some(branch) = non_empty(&self.branch) {
            query = query.with_branch(branch);
        }
        if let Some(college_type) = non_empty(&self.college_type) {
            query = query.with_college_type(college_type);
        }
        Ok(query)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub window: Window,
    pub count: usize,
    pub results: Vec<SearchResult>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub lower_bound: u64,
    pub upper_bound: u64,
}

/// Wire shape of a search answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SearchResponse {
    Success {
        success: bool,
        count: usize,
        results: Vec<SearchResult>,
    },
    Failure {
        success: bool,
        error: &'static str,
        message: String,
    },
}

impl SearchResponse {
    pub fn from_result(result: Result<SearchOutcome>) -> Self {
        match result {
            Ok(outcome) => SearchResponse::Success {
                success: true,
                count: outcome.count,
                results: outcome.results,
            },
            Err(e) => SearchResponse::Failure {
                success: false,
                error: e.kind().as_str(),
                message: e.public_message(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SearchResponse::Success { .. })
    }
}

pub struct RankMatcher<'a> {
    pub records: &'a [FlattenedRecord],
}

impl<'a> RankMatcher<'a> {
    pub fn new(records: &'a [FlattenedRecord]) -> Self {
        Self { records }
    }

    /// Finds every (record, cutoff key) whose cutoff sits inside the tolerance
    /// window, closest to the searched rank first.
    pub fn search(&self, query: &SearchQuery) -> SearchOutcome {
        let window = ToleranceWindow::for_rank(query.rank);
        let categories: &[Category] = match &query.category {
            Some(category) => std::slice::from_ref(category),
            None => &Category::ALL,
        };

        let mut results = Vec::new();
        for record in self.records {
            if !self.passes_filters(record, query) {
                continue;
            }

            for category in categories {
                for key in category.keys() {
                    if let Some(cutoff_rank) = self.cutoff_in_window(record, key, &window) {
                        results.push(SearchResult::from_match(record, key, cutoff_rank));
                    }
                }
            }
        }

        // Vec::sort_by_key is stable, so ties keep discovery order.
        let rank = u64::from(query.rank);
        results.sort_by_key(|result| u64::from(result.cutoff_rank).abs_diff(rank));

        debug!(
            rank = query.rank,
            lower_bound = window.lower_bound,
            upper_bound = window.upper_bound,
            matches = results.len(),
            "rank search complete"
        );

        SearchOutcome {
            window: Window {
                lower_bound: window.lower_bound,
                upper_bound: window.upper_bound,
            },
            count: results.len(),
            results,
        }
    }

    fn passes_filters(&self, record: &FlattenedRecord, query: &SearchQuery) -> bool {
        if let Some(branch) = &query.branch {
            if record.branch != *branch {
                return false;
            }
        }
        if let Some(college_type) = &query.college_type {
            if record.college_type != *college_type {
                return false;
            }
        }
        true
    }

    fn cutoff_in_window(
        &self,
        record: &FlattenedRecord,
        key: CutoffKey,
        window: &ToleranceWindow,
    ) -> Option<u32> {
        let cell = record.cutoff(key)?;
        match cell.rank(key) {
            Ok(cutoff_rank) if window.contains(cutoff_rank) => Some(cutoff_rank),
            Ok(_) => None,
            Err(e) => {
                trace!(inst_code = %record.inst_code, branch = %record.branch_code, error = %e, "skipping cutoff");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::Gender;
    use crate::models::{Branch, CutoffCell, Institute};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn record(inst_code: &str, branch: &str, college_type: &str, cutoffs: &[(&str, CutoffCell)]) -> FlattenedRecord {
        let institute = Institute {
            inst_code: inst_code.to_string(),
            name: format!("{} COLLEGE", inst_code),
            college_type: college_type.to_string(),
            ..Default::default()
        };
        let branch = Branch {
            branch_code: branch.chars().take(3).collect(),
            name: branch.to_string(),
            cutoffs: cutoffs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect::<BTreeMap<_, _>>(),
            ..Default::default()
        };
        FlattenedRecord::new(&institute, &branch)
    }

    fn sample_records() -> Vec<FlattenedRecord> {
        vec![
            record(
                "AARM",
                "CSE",
                "PVT",
                &[
                    ("OC_BOYS", CutoffCell::Rank(26588)),
                    ("OC_GIRLS", CutoffCell::Rank(29938)),
                    ("BC_C_BOYS", CutoffCell::Rank(26588)),
                    ("SC_BOYS", CutoffCell::Rank(70513)),
                ],
            ),
            record(
                "AARM",
                "ECE",
                "PVT",
                &[
                    ("OC_BOYS", CutoffCell::Rank(54242)),
                    ("EWS_GIRLS_OU", CutoffCell::Rank(25100)),
                ],
            ),
            record(
                "JNTH",
                "CSE",
                "UNIV",
                &[
                    ("OC_BOYS", CutoffCell::Rank(24000)),
                    ("OC_GIRLS", CutoffCell::Text("N/A".into())),
                    ("ST_GIRLS", CutoffCell::Rank(26000)),
                ],
            ),
        ]
    }

    #[test]
    fn test_window_small_ranks_use_floor() {
        let w = ToleranceWindow::for_rank(1);
        assert_eq!((w.threshold, w.lower_bound, w.upper_bound), (1000, 1, 1001));

        let w = ToleranceWindow::for_rank(5000);
        assert_eq!((w.threshold, w.lower_bound, w.upper_bound), (1000, 4000, 6000));
    }

    #[test]
    fn test_window_large_ranks_scale() {
        let w = ToleranceWindow::for_rank(26000);
        assert_eq!((w.threshold, w.lower_bound, w.upper_bound), (2600, 23400, 28600));

        let w = ToleranceWindow::for_rank(12345);
        assert_eq!(w.threshold, 1234);
        assert!(w.contains(11111));
        assert!(!w.contains(11110));
        assert!(w.contains(13579));
        assert!(!w.contains(13580));
    }

    #[test]
    fn test_scenario_single_branch_match() {
        let records = vec![record("AARM", "CSE", "PVT", &[("OC_BOYS", CutoffCell::Rank(26588))])];
        let outcome = RankMatcher::new(&records).search(&SearchQuery::new(26000).unwrap());

        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.window, Window { lower_bound: 23400, upper_bound: 28600 });
        let hit = &outcome.results[0];
        assert_eq!(hit.cutoff_rank, 26588);
        assert_eq!(hit.category, Category::Oc);
        assert_eq!(hit.gender, Gender::Boys);
        assert_eq!(hit.inst_code, "AARM");
    }

    #[test]
    fn test_results_sorted_by_distance_with_stable_ties() {
        let records = sample_records();
        let outcome = RankMatcher::new(&records).search(&SearchQuery::new(26000).unwrap());

        let found: Vec<(&str, &str, u32, Category, Gender)> = outcome
            .results
            .iter()
            .map(|r| (r.inst_code.as_str(), r.branch.as_str(), r.cutoff_rank, r.category, r.gender))
            .collect();

        assert_eq!(
            found,
            vec![
                ("JNTH", "CSE", 26000, Category::St, Gender::Girls),
                ("AARM", "CSE", 26588, Category::Oc, Gender::Boys),
                ("AARM", "CSE", 26588, Category::BcC, Gender::Boys),
                ("AARM", "ECE", 25100, Category::Ews, Gender::Girls),
                ("JNTH", "CSE", 24000, Category::Oc, Gender::Boys),
            ]
        );
        assert_eq!(outcome.count, 5);
    }

    #[test]
    fn test_category_filter_restricts_keys() {
        let records = vec![record("AARM", "CSE", "PVT", &[("OC_BOYS", CutoffCell::Rank(26588))])];
        let query = SearchQuery::new(26000).unwrap().with_category(Category::Sc);
        let outcome = RankMatcher::new(&records).search(&query);
        assert_eq!(outcome.count, 0);
        assert!(outcome.results.is_empty());
    }

    #[test]
    fn test_branch_and_type_filters_are_exact() {
        let records = sample_records();
        let matcher = RankMatcher::new(&records);

        let by_branch = matcher.search(&SearchQuery::new(26000).unwrap().with_branch("CSE"));
        assert!(by_branch.results.iter().all(|r| r.branch == "CSE"));
        assert_eq!(by_branch.count, 4);

        let by_type = matcher.search(&SearchQuery::new(26000).unwrap().with_college_type("UNIV"));
        assert!(by_type.results.iter().all(|r| r.inst_code == "JNTH"));
        assert_eq!(by_type.count, 2);

        let partial = matcher.search(&SearchQuery::new(26000).unwrap().with_branch("CS"));
        assert_eq!(partial.count, 0);
    }

    #[test]
    fn test_malformed_cutoffs_are_skipped() {
        let records = vec![record(
            "JNTH",
            "CSE",
            "UNIV",
            &[
                ("OC_GIRLS", CutoffCell::Text("N/A".into())),
                ("OC_BOYS", CutoffCell::Text("1500".into())),
                ("SC_BOYS", CutoffCell::Rank(0)),
            ],
        )];
        let outcome = RankMatcher::new(&records).search(&SearchQuery::new(1000).unwrap());
        assert_eq!(outcome.count, 1);
        assert_eq!(outcome.results[0].cutoff_rank, 1500);
    }

    #[test]
    fn test_rank_zero_is_invalid() {
        let err = SearchQuery::new(0).unwrap_err();
        assert!(matches!(err, RankError::InvalidInput(_)));
    }

    #[test]
    fn test_request_validation() {
        let request: SearchRequest =
            serde_json::from_str(r#"{"rank": " 26000 ", "category": "", "branch": "CSE"}"#).unwrap();
        let query = request.validate().unwrap();
        assert_eq!(query.rank, 26000);
        assert_eq!(query.category, None);
        assert_eq!(query.branch.as_deref(), Some("CSE"));

        let request: SearchRequest =
            serde_json::from_str(r#"{"rank": 1500, "category": "BC-A"}"#).unwrap();
        assert_eq!(request.validate().unwrap().category, Some(Category::BcA));

        let request: SearchRequest = serde_json::from_str(r#"{"rank": 26000.0}"#).unwrap();
        assert_eq!(request.validate().unwrap().rank, 26000);
        let request: SearchRequest = serde_json::from_str(r#"{"rank": 26000.9}"#).unwrap();
        assert_eq!(request.validate().unwrap().rank, 26000);

        for bad in [r#"{}"#, r#"{"rank": ""}"#, r#"{"rank": "abc"}"#, r#"{"rank": 0}"#, r#"{"rank": "-3"}"#, r#"{"rank": 0.5}"#, r#"{"rank": -2.0}"#, r#"{"rank": 4294967296}"#, r#"{"rank": 10, "category": "GEN"}"#] {
            let request: SearchRequest = serde_json::from_str(bad).unwrap();
            let err = request.validate().unwrap_err();
            assert!(matches!(err, RankError::InvalidInput(_)), "{bad}");
        }
    }

    #[test]
    fn test_response_shapes() {
        let records = sample_records();
        let outcome = RankMatcher::new(&records).search(&SearchQuery::new(26000).unwrap());
        let ok = serde_json::to_value(SearchResponse::from_result(Ok(outcome))).unwrap();
        assert_eq!(ok["success"], true);
        assert_eq!(ok["count"], 5);
        assert_eq!(ok["results"][0]["category"], "ST");
        assert_eq!(ok["results"][0]["gender"], "GIRLS");
        assert_eq!(ok["results"][0]["affiliated_to"], "Not Specified");

        let failed = SearchResponse::from_result(Err(RankError::InvalidInput(
            "Rank must be a positive integer".into(),
        )));
        assert!(!failed.is_success());
        let failed = serde_json::to_value(failed).unwrap();
        assert_eq!(failed["success"], false);
        assert_eq!(failed["error"], "InvalidInput");
        assert!(failed.get("results").is_none());
    }

    proptest! {
        #[test]
        fn test_window_below_ten_thousand(rank in 1u32..10_000) {
            let w = ToleranceWindow::for_rank(rank);
            prop_assert_eq!(w.threshold, 1000);
            prop_assert_eq!(w.lower_bound, u64::from(rank).saturating_sub(1000).max(1));
            prop_assert_eq!(w.upper_bound, u64::from(rank) + 1000);
        }

        #[test]
        fn test_window_from_ten_thousand(rank in 10_000u32..=u32::MAX) {
            let w = ToleranceWindow::for_rank(rank);
            prop_assert_eq!(w.threshold, u64::from(rank) / 10);
            prop_assert_eq!(w.upper_bound - w.lower_bound, 2 * w.threshold);
        }

        #[test]
        fn test_search_sorted_and_idempotent(rank in 1u32..80_000) {
            let records = sample_records();
            let matcher = RankMatcher::new(&records);
            let query = SearchQuery::new(rank).unwrap();

            let first = matcher.search(&query);
            let second = matcher.search(&query);
            prop_assert_eq!(&first, &second);

            let r = u64::from(rank);
            for pair in first.results.windows(2) {
                let a = u64::from(pair[0].cutoff_rank).abs_diff(r);
                let b = u64::from(pair[1].cutoff_rank).abs_diff(r);
                prop_assert!(a <= b);
            }
        }

        #[test]
        fn test_category_filter_matches_post_filter(rank in 1u32..80_000, idx in 0usize..9) {
            let records = sample_records();
            let matcher = RankMatcher::new(&records);
            let category = Category::ALL[idx];

            let filtered = matcher.search(&SearchQuery::new(rank).unwrap().with_category(category));
            let post: Vec<SearchResult> = matcher
                .search(&SearchQuery::new(rank).unwrap())
                .results
                .into_iter()
                .filter(|r| r.category == category)
                .collect();
            prop_assert_eq!(filtered.results, post);
        }
    }
}
