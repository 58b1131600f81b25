use std::fmt;

use super::{
    aggregate::{stats, IndexedCollection, StatsResult},
    error::HeatError,
    feature::Boundary,
};

/// Statistics of one collection within one boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct AreaStats {
    pub boundary: String,
    pub collection: String,
    pub result: StatsResult,
}

/// Statistics of every (boundary, collection) pair, boundary major.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AreaReport {
    pub entries: Vec<AreaStats>,
}

/// Evaluate every collection against every boundary. The report is only returned once all pairs
/// succeeded.
pub fn build_report(
    boundaries: &[Boundary],
    collections: &[IndexedCollection],
) -> Result<AreaReport, HeatError> {
    let mut entries = Vec::with_capacity(boundaries.len() * collections.len());
    for boundary in boundaries {
        for indexed in collections {
            entries.push(AreaStats {
                boundary: boundary.name.clone(),
                collection: indexed.collection().name.clone(),
                result: stats(boundary, indexed)?,
            });
        }
    }
    Ok(AreaReport { entries })
}

impl fmt::Display for AreaStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}:", self.boundary, self.collection)?;
        match self.result {
            StatsResult::Summary(summary) => {
                writeln!(f, " Mean: {}", summary.mean)?;
                writeln!(f, " Min: {}", summary.min)?;
                write!(f, " Max: {}", summary.max)
            }
            StatsResult::NoData => write!(f, " No data: no features intersect the boundary"),
        }
    }
}

impl fmt::Display for AreaReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, entry) in self.entries.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}

/// Lowercase name with every run of non alphanumeric characters replaced by one underscore.
/// Used to derive file and property names.
pub fn slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}
