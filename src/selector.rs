//! Recommendation Selector - turns (sector, risk level, ESG table) into a short list
//!
//! The selector always normalizes what it is handed, filters by sector, then applies
//! the risk policy:
//! - Low: highest ESG scores first, capped at `top_n`
//! - Medium: highest ESG scores first, the upper half of the filtered pool
//! - High and anything unrecognised: a seeded random sample of `top_n`
//!
//! Low and Medium fall back to the random sample when no filtered row has a score.

use crate::config::GenieConfig;
use crate::error::{GenieError, Result};
use crate::loader::MarketData;
use crate::schema::{normalize, CanonicalEsgTable, EsgRow, SECTOR};
use polars::prelude::*;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    /// Empty or unrecognised input.
    Unspecified,
}

impl RiskLevel {
    /// Case-insensitive; anything other than low/medium/high is `Unspecified`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "low" => RiskLevel::Low,
            "medium" => RiskLevel::Medium,
            "high" => RiskLevel::High,
            _ => RiskLevel::Unspecified,
        }
    }

    /// Low and Medium tolerance lean on ESG scores when they exist.
    pub fn prefers_esg(self) -> bool {
        matches!(self, RiskLevel::Low | RiskLevel::Medium)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            RiskLevel::Low => "Low",
            RiskLevel::Medium => "Medium",
            RiskLevel::High => "High",
            RiskLevel::Unspecified => "Unspecified",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionOptions {
    pub top_n: usize,
    pub random_seed: u64,
}

impl Default for SelectionOptions {
    fn default() -> Self {
        Self {
            top_n: 5,
            random_seed: 42,
        }
    }
}

impl From<&GenieConfig> for SelectionOptions {
    fn from(config: &GenieConfig) -> Self {
        Self {
            top_n: config.top_n,
            random_seed: config.random_seed,
        }
    }
}

/// The concrete rule applied to a filtered pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionPolicy {
    /// Best `limit` rows by descending score.
    TopRanked { limit: usize },
    /// Best `size` rows by descending score, `size = max(1, count / 2)`.
    UpperHalf { size: usize },
    /// `size` rows drawn without replacement from a generator seeded with `seed`.
    RandomSample { size: usize, seed: u64 },
}

impl SelectionPolicy {
    /// Choose the policy for a filtered pool of `count` rows.
    pub fn plan(
        risk: RiskLevel,
        any_scored: bool,
        count: usize,
        options: &SelectionOptions,
    ) -> Self {
        match risk {
            RiskLevel::Low if any_scored => SelectionPolicy::TopRanked {
                limit: options.top_n,
            },
            RiskLevel::Medium if any_scored => SelectionPolicy::UpperHalf {
                size: (count / 2).max(1),
            },
            _ => SelectionPolicy::RandomSample {
                size: options.top_n.min(count),
                seed: options.random_seed,
            },
        }
    }

    /// Row positions to keep, in output order.
    pub fn pick(&self, scores: &[Option<f64>]) -> Vec<usize> {
        match *self {
            SelectionPolicy::TopRanked { limit } => {
                rank_by_score(scores).into_iter().take(limit).collect()
            }
            SelectionPolicy::UpperHalf { size } => {
                rank_by_score(scores).into_iter().take(size).collect()
            }
            SelectionPolicy::RandomSample { size, seed } => {
                let mut rng = StdRng::seed_from_u64(seed);
                index::sample(&mut rng, scores.len(), size.min(scores.len())).into_vec()
            }
        }
    }
}

/// Positions ordered by descending score. Unscored rows go last; ties keep input order.
pub fn rank_by_score(scores: &[Option<f64>]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| match (scores[a], scores[b]) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    order
}

/// The rows picked for one request, positioned 0..len in policy order.
#[derive(Debug, Clone)]
pub struct Recommendation {
    table: CanonicalEsgTable,
    risk: RiskLevel,
    /// Risk tolerance exactly as the investor gave it.
    risk_label: String,
    policy: SelectionPolicy,
}

impl Recommendation {
    pub fn frame(&self) -> &DataFrame {
        self.table.frame()
    }

    pub fn into_frame(self) -> DataFrame {
        self.table.into_frame()
    }

    pub fn rows(&self) -> Result<Vec<EsgRow>> {
        self.table.rows()
    }

    pub fn companies(&self) -> Result<Vec<String>> {
        self.table.companies()
    }

    /// Whether the source carried an ESG score column.
    pub fn has_esg_score(&self) -> bool {
        self.table.has_score_column()
    }

    pub fn len(&self) -> usize {
        self.table.height()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn risk(&self) -> RiskLevel {
        self.risk
    }

    pub fn risk_label(&self) -> &str {
        &self.risk_label
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.policy
    }
}

#[derive(Debug, Clone)]
pub enum SelectionOutcome {
    /// The sector filter left nothing to choose from.
    NoMatches,
    Recommended(Recommendation),
}

impl SelectionOutcome {
    pub fn is_no_matches(&self) -> bool {
        matches!(self, SelectionOutcome::NoMatches)
    }

    pub fn recommendation(&self) -> Option<&Recommendation> {
        match self {
            SelectionOutcome::NoMatches => None,
            SelectionOutcome::Recommended(rec) => Some(rec),
        }
    }
}

/// `None`, a blank string or any casing of "all" keeps every row.
pub fn is_all_sectors(sector: Option<&str>) -> bool {
    match sector {
        None => true,
        Some(s) => s.trim().is_empty() || s.eq_ignore_ascii_case("all"),
    }
}

/// Select recommendations from a raw ESG table.
///
/// A missing table is a hard failure (`GenieError::MissingDataset`); an empty or
/// non-matching one yields `SelectionOutcome::NoMatches`.
pub fn select(
    sector: Option<&str>,
    risk: &str,
    esg: Option<&DataFrame>,
    options: &SelectionOptions,
) -> Result<SelectionOutcome> {
    let raw = esg.ok_or(GenieError::MissingDataset)?;
    let table = normalize(raw)?;
    select_canonical(sector, risk, &table, options)
}

/// Select recommendations from a table that has already been normalized.
pub fn select_canonical(
    sector: Option<&str>,
    risk: &str,
    table: &CanonicalEsgTable,
    options: &SelectionOptions,
) -> Result<SelectionOutcome> {
    let filtered = filter_by_sector(table, sector)?;
    if filtered.is_empty() {
        debug!("No rows left after sector filter {:?}", sector);
        return Ok(SelectionOutcome::NoMatches);
    }

    let risk_label = risk.trim().to_string();
    let risk = RiskLevel::parse(risk);
    let scores = filtered.scores()?;
    let any_scored = scores.iter().any(Option::is_some);
    let policy = SelectionPolicy::plan(risk, any_scored, filtered.height(), options);
    debug!(
        "Applying {:?} for risk {} over {} candidate(s)",
        policy,
        risk,
        filtered.height()
    );

    let picks: Vec<IdxSize> = policy
        .pick(&scores)
        .into_iter()
        .map(|pos| pos as IdxSize)
        .collect();
    let frame = filtered.frame().take(&IdxCa::from_vec("pick", picks))?;

    Ok(SelectionOutcome::Recommended(Recommendation {
        table: CanonicalEsgTable::from_canonical_frame(frame),
        risk,
        risk_label,
        policy,
    }))
}

/// Entry point taking all three datasets. Only the ESG rankings drive selection.
pub fn generate_recommendation(
    sector: Option<&str>,
    risk: &str,
    data: &MarketData,
    options: &SelectionOptions,
) -> Result<SelectionOutcome> {
    debug!(
        "Recommending from {} ESG row(s); {} price row(s) and {} balance sheet row(s) not consulted",
        data.esg_rankings.height(),
        data.prices.height(),
        data.balance_sheets.height()
    );
    select(sector, risk, Some(&data.esg_rankings), options)
}

fn filter_by_sector(table: &CanonicalEsgTable, sector: Option<&str>) -> Result<CanonicalEsgTable> {
    let sector = match sector {
        Some(s) if !is_all_sectors(Some(s)) => s,
        _ => return Ok(table.clone()),
    };

    let frame = table
        .frame()
        .clone()
        .lazy()
        .filter(col(SECTOR).eq(lit(sector)))
        .collect()?;
    Ok(CanonicalEsgTable::from_canonical_frame(frame))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored_frame() -> DataFrame {
        df![
            "Company" => ["A", "B", "C", "D", "E", "F"],
            "Sector" => ["Energy", "Energy", "Banking", "Energy", "Banking", "Energy"],
            "ESG Score" => [Some(50.0), Some(90.0), Some(70.0), None, Some(90.0), Some(10.0)]
        ]
        .unwrap()
    }

    fn companies(outcome: &SelectionOutcome) -> Vec<String> {
        outcome.recommendation().unwrap().companies().unwrap()
    }

    #[test]
    fn test_risk_level_parse() {
        assert_eq!(RiskLevel::parse("LOW"), RiskLevel::Low);
        assert_eq!(RiskLevel::parse("Medium"), RiskLevel::Medium);
        assert_eq!(RiskLevel::parse("high"), RiskLevel::High);
        assert_eq!(RiskLevel::parse(""), RiskLevel::Unspecified);
        assert_eq!(RiskLevel::parse("aggressive"), RiskLevel::Unspecified);
    }

    #[test]
    fn test_plan_branches() {
        let opts = SelectionOptions::default();
        assert_eq!(
            SelectionPolicy::plan(RiskLevel::Low, true, 10, &opts),
            SelectionPolicy::TopRanked { limit: 5 }
        );
        assert_eq!(
            SelectionPolicy::plan(RiskLevel::Medium, true, 7, &opts),
            SelectionPolicy::UpperHalf { size: 3 }
        );
        assert_eq!(
            SelectionPolicy::plan(RiskLevel::Medium, true, 1, &opts),
            SelectionPolicy::UpperHalf { size: 1 }
        );
        assert_eq!(
            SelectionPolicy::plan(RiskLevel::Low, false, 10, &opts),
            SelectionPolicy::RandomSample { size: 5, seed: 42 }
        );
        assert_eq!(
            SelectionPolicy::plan(RiskLevel::High, true, 3, &opts),
            SelectionPolicy::RandomSample { size: 3, seed: 42 }
        );
        assert_eq!(
            SelectionPolicy::plan(RiskLevel::Unspecified, true, 9, &opts),
            SelectionPolicy::RandomSample { size: 5, seed: 42 }
        );
    }

    #[test]
    fn test_rank_by_score_ties_and_missing() {
        let scores = [Some(1.0), None, Some(3.0), Some(3.0), None, Some(2.0)];
        assert_eq!(rank_by_score(&scores), vec![2, 3, 5, 0, 1, 4]);
    }

    #[test]
    fn test_low_risk_ranks_descending() {
        let outcome = select(None, "low", Some(&scored_frame()), &SelectionOptions::default()).unwrap();
        let rec = outcome.recommendation().unwrap();

        assert_eq!(rec.policy(), SelectionPolicy::TopRanked { limit: 5 });
        assert_eq!(companies(&outcome), vec!["B", "E", "C", "A", "F"]);
        assert!(rec.has_esg_score());
    }

    #[test]
    fn test_sector_filter_is_exact() {
        let frame = scored_frame();
        let opts = SelectionOptions::default();

        let outcome = select(Some("Banking"), "Low", Some(&frame), &opts).unwrap();
        assert_eq!(companies(&outcome), vec!["E", "C"]);

        let outcome = select(Some("banking"), "Low", Some(&frame), &opts).unwrap();
        assert!(outcome.is_no_matches());
    }

    #[test]
    fn test_medium_takes_upper_half_of_filtered_pool() {
        let outcome = select(
            Some("Energy"),
            "MEDIUM",
            Some(&scored_frame()),
            &SelectionOptions::default(),
        )
        .unwrap();
        // Energy pool is A, B, D, F: four rows, two kept
        assert_eq!(companies(&outcome), vec!["B", "A"]);
    }

    #[test]
    fn test_unscored_pool_falls_back_to_sampling() {
        let frame = df![
            "Ticker" => ["A", "B", "C"],
            "score" => ["n/a", "", "-"]
        ]
        .unwrap();

        let outcome = select(None, "Low", Some(&frame), &SelectionOptions::default()).unwrap();
        let rec = outcome.recommendation().unwrap();
        assert_eq!(rec.policy(), SelectionPolicy::RandomSample { size: 3, seed: 42 });
        assert_eq!(rec.len(), 3);
    }

    #[test]
    fn test_random_sample_is_reproducible() {
        let frame = scored_frame();
        let opts = SelectionOptions {
            top_n: 3,
            random_seed: 7,
        };

        let first = select(None, "High", Some(&frame), &opts).unwrap();
        let second = select(None, "High", Some(&frame), &opts).unwrap();
        assert_eq!(companies(&first), companies(&second));
        assert_eq!(companies(&first).len(), 3);
    }

    #[test]
    fn test_missing_dataset_is_an_error() {
        let err = select(None, "Low", None, &SelectionOptions::default()).unwrap_err();
        assert!(matches!(err, GenieError::MissingDataset));
    }

    #[test]
    fn test_empty_table_is_no_matches() {
        let frame = DataFrame::new(vec![Series::new("Company", Vec::<String>::new())]).unwrap();
        let outcome = select(None, "Low", Some(&frame), &SelectionOptions::default()).unwrap();
        assert!(outcome.is_no_matches());
    }

    #[test]
    fn test_all_sectors() {
        assert!(is_all_sectors(None));
        assert!(is_all_sectors(Some("ALL")));
        assert!(is_all_sectors(Some("all")));
        assert!(is_all_sectors(Some("")));
        assert!(is_all_sectors(Some("  ")));
        assert!(!is_all_sectors(Some("Energy")));
    }
}
