//! Ballistic firing tables: rows, per-ring index, loading.
//!
//! A table is indexed once as `faction -> shell -> charge ring -> rows` with
//! rows ordered by strictly increasing range, and is never mutated afterwards.

mod builtin;
mod load;

pub use builtin::{builtin_rows, builtin_table, BUILTIN_FACTION, BUILTIN_SHELL};
pub use load::{load_table_file, parse_table_str, TableDefaults};

use crate::util::normalize_id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One measured point for a (faction, shell, charge ring) configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BallisticRow {
    pub faction: String,
    pub shell_type: String,
    pub charge_ring: u32,
    /// Horizontal distance this row was measured at.
    pub range_m: f64,
    /// Barrel elevation needed to hit `range_m` on flat ground.
    pub elevation_mils: f64,
    pub time_of_flight_s: f64,
    pub dispersion_m: f64,
}

/// A row that was dropped (or a ring that cannot be used) during indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowIssue {
    /// 1-based line in the source file (built-in rows: 1-based row index);
    /// 0 for ring-level issues.
    pub line: usize,
    pub reason: String,
}

impl std::fmt::Display for RowIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line == 0 {
            write!(f, "{}", self.reason)
        } else {
            write!(f, "line {}: {}", self.line, self.reason)
        }
    }
}

/// Valid table plus everything the indexer refused.
#[derive(Debug, Clone)]
pub struct LoadReport {
    pub table: BallisticTable,
    pub issues: Vec<RowIssue>,
}

/// Errors that make a whole table file unusable.
#[derive(Debug, Clone, PartialEq)]
pub enum TableError {
    Io(String),
    TooLarge { bytes: u64, max: usize },
    Csv(String),
    MissingColumn(&'static str),
    Empty,
}

impl std::fmt::Display for TableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TableError::Io(e) => write!(f, "reading table: {}", e),
            TableError::TooLarge { bytes, max } => {
                write!(f, "table file too large: {} bytes (max {})", bytes, max)
            }
            TableError::Csv(e) => write!(f, "malformed table: {}", e),
            TableError::MissingColumn(c) => write!(f, "table header has no {} column", c),
            TableError::Empty => write!(f, "table contains no usable rows"),
        }
    }
}

impl std::error::Error for TableError {}

/// Per-ring summary used for range envelopes and table listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RingCoverage {
    pub charge_ring: u32,
    pub rows: usize,
    pub min_range_m: f64,
    pub max_range_m: f64,
    pub min_elevation_mils: f64,
    pub max_elevation_mils: f64,
    pub min_dispersion_m: f64,
    pub max_dispersion_m: f64,
}

/// Charge ring -> rows ordered by range, for one (faction, shell).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RingTable {
    rings: BTreeMap<u32, Vec<BallisticRow>>,
}

impl RingTable {
    /// Rings in ascending order with their rows.
    pub fn rings(&self) -> impl Iterator<Item = (u32, &[BallisticRow])> + '_ {
        self.rings.iter().map(|(r, rows)| (*r, rows.as_slice()))
    }

    pub fn rows(&self, ring: u32) -> Option<&[BallisticRow]> {
        self.rings.get(&ring).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rings.values().map(Vec::len).sum()
    }

    /// Longest tabulated range over all rings.
    pub fn max_range_m(&self) -> Option<f64> {
        self.all_rows().map(|r| r.range_m).reduce(f64::max)
    }

    /// Lowest tabulated elevation over all rings; the boundary between a
    /// high-angle solution and a grazing one.
    pub fn min_elevation_mils(&self) -> Option<f64> {
        self.all_rows().map(|r| r.elevation_mils).reduce(f64::min)
    }

    pub fn coverage(&self) -> Vec<RingCoverage> {
        self.rings
            .iter()
            .filter_map(|(ring, rows)| {
                let first = rows.first()?;
                let last = rows.last()?;
                let elev = rows.iter().map(|r| r.elevation_mils);
                let disp = rows.iter().map(|r| r.dispersion_m);
                Some(RingCoverage {
                    charge_ring: *ring,
                    rows: rows.len(),
                    min_range_m: first.range_m,
                    max_range_m: last.range_m,
                    min_elevation_mils: elev.clone().fold(f64::INFINITY, f64::min),
                    max_elevation_mils: elev.fold(f64::NEG_INFINITY, f64::max),
                    min_dispersion_m: disp.clone().fold(f64::INFINITY, f64::min),
                    max_dispersion_m: disp.fold(f64::NEG_INFINITY, f64::max),
                })
            })
            .collect()
    }

    fn all_rows(&self) -> impl Iterator<Item = &BallisticRow> + '_ {
        self.rings.values().flatten()
    }
}

/// Faction -> shell type -> ring table. Keys are normalized on insert and lookup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BallisticTable {
    factions: BTreeMap<String, BTreeMap<String, RingTable>>,
}

impl BallisticTable {
    pub fn get(&self, faction: &str, shell: &str) -> Option<&RingTable> {
        self.factions
            .get(&normalize_id(faction))?
            .get(&normalize_id(shell))
    }

    pub fn factions(&self) -> impl Iterator<Item = &str> + '_ {
        self.factions.keys().map(String::as_str)
    }

    pub fn shells(&self, faction: &str) -> Vec<&str> {
        self.factions
            .get(&normalize_id(faction))
            .map(|s| s.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Every (faction, shell, ring table), in key order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &RingTable)> + '_ {
        self.factions.iter().flat_map(|(f, shells)| {
            shells
                .iter()
                .map(move |(s, rt)| (f.as_str(), s.as_str(), rt))
        })
    }

    pub fn row_count(&self) -> usize {
        self.entries().map(|(_, _, rt)| rt.row_count()).sum()
    }
}

/// Group rows by faction/shell/ring, order each ring by range and drop
/// duplicate ranges (first occurrence wins, later ones are reported).
/// Rows arrive tagged with their source line for reporting.
pub fn index_rows<I>(rows: I) -> LoadReport
where
    I: IntoIterator<Item = (usize, BallisticRow)>,
{
    let mut grouped: BTreeMap<String, BTreeMap<String, BTreeMap<u32, Vec<(usize, BallisticRow)>>>> =
        BTreeMap::new();
    for (line, row) in rows {
        grouped
            .entry(normalize_id(&row.faction))
            .or_default()
            .entry(normalize_id(&row.shell_type))
            .or_default()
            .entry(row.charge_ring)
            .or_default()
            .push((line, row));
    }

    let mut issues = Vec::new();
    let mut factions = BTreeMap::new();
    for (faction, shells) in grouped {
        let mut shell_tables = BTreeMap::new();
        for (shell, rings) in shells {
            let mut ring_map = BTreeMap::new();
            for (ring, mut tagged) in rings {
                // Stable sort keeps input order among equal ranges.
                tagged.sort_by(|a, b| a.1.range_m.total_cmp(&b.1.range_m));
                let mut ordered: Vec<BallisticRow> = Vec::with_capacity(tagged.len());
                for (line, row) in tagged {
                    if let Some(prev) = ordered.last() {
                        if prev.range_m == row.range_m {
                            tracing::warn!(
                                "dropping duplicate row: {}/{} ring {} range {} (line {})",
                                faction,
                                shell,
                                ring,
                                row.range_m,
                                line
                            );
                            issues.push(RowIssue {
                                line,
                                reason: format!(
                                    "duplicate range {} m for {}/{} ring {}",
                                    row.range_m, faction, shell, ring
                                ),
                            });
                            continue;
                        }
                    }
                    ordered.push(row);
                }
                if ordered.len() < 2 {
                    issues.push(RowIssue {
                        line: 0,
                        reason: format!(
                            "{}/{} ring {} has a single row and cannot be interpolated",
                            faction, shell, ring
                        ),
                    });
                }
                ring_map.insert(ring, ordered);
            }
            shell_tables.insert(shell, RingTable { rings: ring_map });
        }
        factions.insert(faction, shell_tables);
    }
    LoadReport {
        table: BallisticTable { factions },
        issues,
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::row;
    use super::*;

    fn tagged(rows: Vec<BallisticRow>) -> Vec<(usize, BallisticRow)> {
        rows.into_iter().enumerate().map(|(i, r)| (i + 1, r)).collect()
    }

    #[test]
    fn index_sorts_each_ring_by_range() {
        let report = index_rows(tagged(vec![
            row(1, 300.0, 1335.0, 19.2, 13.0),
            row(0, 100.0, 1411.0, 15.0, 8.0),
            row(1, 100.0, 1446.0, 19.5, 13.0),
            row(0, 50.0, 1455.0, 15.0, 8.0),
            row(1, 200.0, 1392.0, 19.4, 13.0),
        ]));
        assert!(report.issues.is_empty());
        let rt = report.table.get("USSR", " he ").unwrap();
        let ranges: Vec<f64> = rt.rows(1).unwrap().iter().map(|r| r.range_m).collect();
        assert_eq!(ranges, vec![100.0, 200.0, 300.0]);
        assert_eq!(rt.rows(0).unwrap()[0].range_m, 50.0);
        assert_eq!(rt.row_count(), 5);
    }

    #[test]
    fn duplicate_ranges_keep_first_and_report_rest() {
        let report = index_rows(tagged(vec![
            row(2, 200.0, 1432.0, 24.8, 19.0),
            row(2, 300.0, 1397.0, 24.7, 19.0),
            row(2, 200.0, 9999.0, 1.0, 1.0),
        ]));
        let rt = report.table.get("ussr", "HE").unwrap();
        let rows = rt.rows(2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].elevation_mils, 1432.0);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].line, 3);
    }

    #[test]
    fn single_row_ring_is_reported() {
        let report = index_rows(tagged(vec![row(7, 500.0, 1000.0, 20.0, 5.0)]));
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].line, 0);
        assert!(report.issues[0].reason.contains("ring 7"));
    }

    #[test]
    fn factions_and_shells_are_separate() {
        let mut us = row(0, 100.0, 1400.0, 14.0, 10.0);
        us.faction = "US".to_string();
        let mut smoke = row(0, 100.0, 1410.0, 14.0, 10.0);
        smoke.shell_type = "SMOKE".to_string();
        let report = index_rows(tagged(vec![row(0, 100.0, 1411.0, 15.0, 8.0), us, smoke]));
        let t = &report.table;
        assert_eq!(t.factions().collect::<Vec<_>>(), vec!["us", "ussr"]);
        assert_eq!(t.shells("ussr"), vec!["he", "smoke"]);
        assert!(t.get("us", "smoke").is_none());
        assert_eq!(t.entries().count(), 3);
    }

    #[test]
    fn coverage_and_envelope() {
        let rt = test_support::ring_table(vec![
            row(0, 50.0, 1455.0, 15.0, 8.0),
            row(0, 500.0, 922.0, 12.4, 8.0),
            row(1, 100.0, 1446.0, 19.5, 13.0),
            row(1, 800.0, 952.0, 16.4, 13.0),
        ]);
        assert_eq!(rt.max_range_m(), Some(800.0));
        assert_eq!(rt.min_elevation_mils(), Some(922.0));
        let cov = rt.coverage();
        assert_eq!(cov.len(), 2);
        assert_eq!(cov[1].charge_ring, 1);
        assert_eq!(cov[1].min_range_m, 100.0);
        assert_eq!(cov[1].max_range_m, 800.0);
        assert_eq!(cov[1].max_elevation_mils, 1446.0);
        assert_eq!(cov[0].max_dispersion_m, 8.0);
    }

    #[test]
    fn empty_ring_table_has_no_envelope() {
        let rt = RingTable::default();
        assert!(rt.is_empty());
        assert_eq!(rt.max_range_m(), None);
        assert_eq!(rt.min_elevation_mils(), None);
    }
}
