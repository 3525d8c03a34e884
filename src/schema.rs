//! Schema Normalizer - maps heterogeneous ESG tables onto fixed column names
//!
//! Source files disagree on what they call things: one ships `Ticker`, another
//! `Company Name`, a third has no identifier column at all. Each canonical field
//! has an ordered list of candidate column names; the first candidate present in
//! the table becomes the source for that field and is renamed onto the canonical
//! name. Missing fields are synthesized (`company`, `sector`) or left out
//! (`esg_score`). Rows are never dropped or reordered.

use crate::error::Result;
use itertools::Itertools;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const COMPANY: &str = "company";
pub const SECTOR: &str = "sector";
pub const ESG_SCORE: &str = "esg_score";

/// Sector given to rows whose source has no sector information.
pub const UNKNOWN_SECTOR: &str = "Unknown";

pub const COMPANY_CANDIDATES: [&str; 6] =
    ["Company", "Company Name", "Stock", "Ticker", "Symbol", "Name"];
pub const SECTOR_CANDIDATES: [&str; 4] = ["Sector", "sector", "Industry", "industry"];
pub const ESG_SCORE_CANDIDATES: [&str; 4] = ["ESG Score", "esg_score", "esg", "score"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanonicalField {
    Company,
    Sector,
    EsgScore,
}

impl CanonicalField {
    pub fn column_name(self) -> &'static str {
        match self {
            CanonicalField::Company => COMPANY,
            CanonicalField::Sector => SECTOR,
            CanonicalField::EsgScore => ESG_SCORE,
        }
    }

    /// Candidate source column names, highest priority first.
    pub fn candidates(self) -> &'static [&'static str] {
        match self {
            CanonicalField::Company => &COMPANY_CANDIDATES,
            CanonicalField::Sector => &SECTOR_CANDIDATES,
            CanonicalField::EsgScore => &ESG_SCORE_CANDIDATES,
        }
    }
}

/// Find the source column for `field`: the first candidate present in `frame`.
///
/// Matching is exact and case-sensitive. When no candidate matches, a column that
/// already carries the canonical name is accepted.
pub fn resolve_column(frame: &DataFrame, field: CanonicalField) -> Option<String> {
    let names = frame.get_column_names();
    let canonical = field.column_name();
    field
        .candidates()
        .iter()
        .copied()
        .chain(std::iter::once(canonical))
        .find(|candidate| names.contains(candidate))
        .map(str::to_string)
}

/// One company as the selector sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsgRow {
    pub company: String,
    pub sector: String,
    pub esg_score: Option<f64>,
}

/// A table guaranteed to carry non-null `company` and `sector` columns and, when the
/// source had one, a Float64 `esg_score` column. Other source columns ride along.
#[derive(Debug, Clone)]
pub struct CanonicalEsgTable {
    frame: DataFrame,
}

impl CanonicalEsgTable {
    /// Wrap a frame that is already known to be canonical (a row subset of one).
    pub(crate) fn from_canonical_frame(frame: DataFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Whether a score column was resolved from the source at all.
    pub fn has_score_column(&self) -> bool {
        self.frame.get_column_index(ESG_SCORE).is_some()
    }

    pub fn companies(&self) -> Result<Vec<String>> {
        self.text_column(COMPANY)
    }

    pub fn sectors(&self) -> Result<Vec<String>> {
        self.text_column(SECTOR)
    }

    /// Per-row scores; all `None` when the table has no score column.
    pub fn scores(&self) -> Result<Vec<Option<f64>>> {
        if !self.has_score_column() {
            return Ok(vec![None; self.height()]);
        }
        Ok(self.frame.column(ESG_SCORE)?.f64()?.into_iter().collect())
    }

    pub fn rows(&self) -> Result<Vec<EsgRow>> {
        let rows = self
            .companies()?
            .into_iter()
            .zip(self.sectors()?)
            .zip(self.scores()?)
            .map(|((company, sector), esg_score)| EsgRow {
                company,
                sector,
                esg_score,
            })
            .collect();
        Ok(rows)
    }

    fn text_column(&self, name: &str) -> Result<Vec<String>> {
        Ok(self
            .frame
            .column(name)?
            .str()?
            .into_iter()
            .map(|v| v.unwrap_or_default().to_string())
            .collect())
    }
}

/// Normalize an arbitrary ESG table into canonical form.
///
/// Total over any input: missing columns and unparseable scores degrade to
/// synthesized values or absent scores, never to an error. The only failures
/// surfaced are internal polars errors.
pub fn normalize(raw: &DataFrame) -> Result<CanonicalEsgTable> {
    let mut frame = raw.clone();
    let height = frame.height();

    match resolve_column(&frame, CanonicalField::Company) {
        Some(source) => {
            claim_canonical(&mut frame, &source, COMPANY)?;
            let companies: Vec<String> = text_values(frame.column(COMPANY)?)?
                .into_iter()
                .enumerate()
                .map(|(idx, value)| value.unwrap_or_else(|| idx.to_string()))
                .collect();
            frame.with_column(Series::new(COMPANY, companies))?;
        }
        None => {
            debug!("No company column found; synthesizing from row position");
            let ordinals: Vec<String> = (0..height).map(|idx| idx.to_string()).collect();
            frame.insert_column(0, Series::new(COMPANY, ordinals))?;
        }
    }

    match resolve_column(&frame, CanonicalField::Sector) {
        Some(source) => {
            claim_canonical(&mut frame, &source, SECTOR)?;
            let sectors: Vec<String> = text_values(frame.column(SECTOR)?)?
                .into_iter()
                .map(|value| value.unwrap_or_else(|| UNKNOWN_SECTOR.to_string()))
                .collect();
            frame.with_column(Series::new(SECTOR, sectors))?;
        }
        None => {
            debug!("No sector column found; defaulting every row to '{}'", UNKNOWN_SECTOR);
            frame.with_column(Series::new(SECTOR, vec![UNKNOWN_SECTOR; height]))?;
        }
    }

    if let Some(source) = resolve_column(&frame, CanonicalField::EsgScore) {
        claim_canonical(&mut frame, &source, ESG_SCORE)?;
        let scores = coerce_scores(frame.column(ESG_SCORE)?)?;
        frame.with_column(scores)?;
    }

    Ok(CanonicalEsgTable::from_canonical_frame(frame))
}

/// Parse one score cell. Anything that is not a finite number is absent.
pub fn parse_score(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// The sector choices to offer: "All" followed by the distinct sectors present in
/// the table, or the configured fallback list when the table has no sector column.
pub fn sector_options(raw: &DataFrame, fallback: &[String]) -> Result<Vec<String>> {
    let sectors: Vec<String> = match resolve_column(raw, CanonicalField::Sector) {
        Some(source) => text_values(raw.column(&source)?)?
            .into_iter()
            .flatten()
            .unique()
            .sorted()
            .collect(),
        None => fallback.iter().cloned().unique().sorted().collect(),
    };

    let mut options = Vec::with_capacity(sectors.len() + 1);
    options.push("All".to_string());
    options.extend(sectors);
    Ok(options)
}

/// Rename `source` onto `canonical`, evicting any other column that already holds
/// the canonical name.
fn claim_canonical(frame: &mut DataFrame, source: &str, canonical: &str) -> Result<()> {
    if source == canonical {
        return Ok(());
    }
    if frame.get_column_index(canonical).is_some() {
        debug!(
            "Dropping pre-existing '{}' column in favour of '{}'",
            canonical, source
        );
        frame.drop_in_place(canonical)?;
    }
    frame.rename(source, canonical)?;
    Ok(())
}

fn text_values(series: &Series) -> Result<Vec<Option<String>>> {
    let text = series.cast(&DataType::String)?;
    let values = text
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect();
    Ok(values)
}

fn coerce_scores(series: &Series) -> Result<Series> {
    let scores: Vec<Option<f64>> = if series.dtype().is_numeric() {
        series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| v.filter(|x| x.is_finite()))
            .collect()
    } else {
        text_values(series)?
            .into_iter()
            .map(|v| v.as_deref().and_then(parse_score))
            .collect()
    };
    Ok(Series::new(ESG_SCORE, scores))
}
