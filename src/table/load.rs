//! Delimited-text table loading. The header names the columns; bad rows are
//! collected as issues instead of failing the whole file.

use super::{index_rows, BallisticRow, LoadReport, RowIssue, TableError};
use crate::config::MAX_TABLE_FILE_BYTES;
use std::fs;
use std::path::Path;

/// Faction and shell used when the file has no such columns.
#[derive(Debug, Clone)]
pub struct TableDefaults {
    pub faction: String,
    pub shell_type: String,
}

impl TableDefaults {
    pub fn new(faction: &str, shell_type: &str) -> Self {
        Self {
            faction: faction.to_string(),
            shell_type: shell_type.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Column {
    Faction,
    Shell,
    Ring,
    Range,
    Elevation,
    TimeOfFlight,
    Dispersion,
}

fn column_for_header(name: &str) -> Option<Column> {
    let key: String = name
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    let key = key.trim_matches('_');
    match key {
        "faction" | "side" => Some(Column::Faction),
        "shell" | "shell_type" | "shelltype" | "ammo" => Some(Column::Shell),
        "ring" | "rings" | "charge_ring" | "charge" | "charges" => Some(Column::Ring),
        "range" | "range_m" | "range__m" | "distance" | "distance_m" => Some(Column::Range),
        "elevation" | "elev" | "elevation_mils" | "elevation_mil" | "elev__mil"
        | "elev_mil" => Some(Column::Elevation),
        "tof" | "tof_s" | "time_of_flight" | "time_of_flight_s" | "time_of_flight__sec"
        | "time_of_flight_sec" => Some(Column::TimeOfFlight),
        "dispersion" | "dispersion_m" | "dispersion__m" | "dispersion_radius"
        | "dispersion_radius_m" => Some(Column::Dispersion),
        _ => None,
    }
}

#[derive(Debug, Default)]
struct ColumnMap {
    faction: Option<usize>,
    shell: Option<usize>,
    ring: Option<usize>,
    range: Option<usize>,
    elevation: Option<usize>,
    tof: Option<usize>,
    dispersion: Option<usize>,
}

impl ColumnMap {
    fn from_header(header: &csv::StringRecord) -> Result<Self, TableError> {
        let mut map = ColumnMap::default();
        for (i, name) in header.iter().enumerate() {
            let slot = match column_for_header(name) {
                Some(Column::Faction) => &mut map.faction,
                Some(Column::Shell) => &mut map.shell,
                Some(Column::Ring) => &mut map.ring,
                Some(Column::Range) => &mut map.range,
                Some(Column::Elevation) => &mut map.elevation,
                Some(Column::TimeOfFlight) => &mut map.tof,
                Some(Column::Dispersion) => &mut map.dispersion,
                None => continue,
            };
            if slot.is_none() {
                *slot = Some(i);
            }
        }
        if map.ring.is_none() {
            return Err(TableError::MissingColumn("charge ring"));
        }
        if map.range.is_none() {
            return Err(TableError::MissingColumn("range"));
        }
        if map.elevation.is_none() {
            return Err(TableError::MissingColumn("elevation"));
        }
        if map.tof.is_none() {
            return Err(TableError::MissingColumn("time of flight"));
        }
        if map.dispersion.is_none() {
            return Err(TableError::MissingColumn("dispersion"));
        }
        Ok(map)
    }
}

/// Guess the delimiter from the header, i.e. the first line that is neither
/// blank nor a `#` comment.
fn detect_delimiter(content: &str) -> u8 {
    let header = content
        .lines()
        .find(|l| !l.trim().is_empty() && !l.starts_with('#'))
        .unwrap_or("");
    if header.contains('\t') {
        b'\t'
    } else if header.contains(';') {
        b';'
    } else {
        b','
    }
}

/// 1-based file line of a record. The reader positions a record where the
/// previous one ended, so skip the comment and empty lines in between.
fn record_line(content: &str, pos: &csv::Position) -> usize {
    let mut line = pos.line() as usize;
    let rest = content.get(pos.byte() as usize..).unwrap_or("");
    for l in rest.lines() {
        if l.starts_with('#') || l.trim_end_matches('\r').is_empty() {
            line += 1;
        } else {
            break;
        }
    }
    line
}

fn field<'r>(record: &'r csv::StringRecord, idx: Option<usize>) -> Option<&'r str> {
    idx.and_then(|i| record.get(i)).map(str::trim)
}

fn parse_num(record: &csv::StringRecord, idx: Option<usize>, what: &str) -> Result<f64, String> {
    let raw = field(record, idx).ok_or_else(|| format!("missing {}", what))?;
    let v: f64 = raw
        .parse()
        .map_err(|_| format!("{} is not a number: {:?}", what, raw))?;
    if !v.is_finite() {
        return Err(format!("{} is not finite: {:?}", what, raw));
    }
    if v < 0.0 {
        return Err(format!("{} is negative: {}", what, v));
    }
    Ok(v)
}

fn row_from_record(
    record: &csv::StringRecord,
    cols: &ColumnMap,
    defaults: &TableDefaults,
) -> Result<BallisticRow, String> {
    let faction = field(record, cols.faction)
        .filter(|s| !s.is_empty())
        .unwrap_or(defaults.faction.as_str())
        .to_string();
    let shell_type = field(record, cols.shell)
        .filter(|s| !s.is_empty())
        .unwrap_or(defaults.shell_type.as_str())
        .to_string();
    let ring_raw = field(record, cols.ring).ok_or("missing charge ring")?;
    let charge_ring: u32 = ring_raw
        .parse()
        .map_err(|_| format!("charge ring is not a non-negative integer: {:?}", ring_raw))?;
    Ok(BallisticRow {
        faction,
        shell_type,
        charge_ring,
        range_m: parse_num(record, cols.range, "range")?,
        elevation_mils: parse_num(record, cols.elevation, "elevation")?,
        time_of_flight_s: parse_num(record, cols.tof, "time of flight")?,
        dispersion_m: parse_num(record, cols.dispersion, "dispersion")?,
    })
}

/// Parse table text. Malformed rows are dropped and listed in the report.
pub fn parse_table_str(content: &str, defaults: &TableDefaults) -> Result<LoadReport, TableError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(detect_delimiter(content))
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(content.as_bytes());
    let header = reader
        .headers()
        .map_err(|e| TableError::Csv(e.to_string()))?
        .clone();
    let cols = ColumnMap::from_header(&header)?;

    let mut rows = Vec::new();
    let mut issues = Vec::new();
    let mut last_line = 1;
    for result in reader.records() {
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                let line = e
                    .position()
                    .map(|p| record_line(content, p))
                    .unwrap_or(last_line + 1);
                last_line = line;
                issues.push(RowIssue {
                    line,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let line = record
            .position()
            .map(|p| record_line(content, p))
            .unwrap_or(last_line + 1);
        last_line = line;
        if record.iter().all(|f| f.trim().is_empty()) {
            continue;
        }
        match row_from_record(&record, &cols, defaults) {
            Ok(row) => rows.push((line, row)),
            Err(reason) => {
                tracing::warn!("dropping table row {}: {}", line, reason);
                issues.push(RowIssue { line, reason });
            }
        }
    }
    if rows.is_empty() {
        return Err(TableError::Empty);
    }

    let mut report = index_rows(rows);
    issues.append(&mut report.issues);
    report.issues = issues;
    tracing::debug!(
        "indexed {} rows ({} issues)",
        report.table.row_count(),
        report.issues.len()
    );
    Ok(report)
}

/// Load a table file from disk.
pub fn load_table_file(path: &Path, defaults: &TableDefaults) -> Result<LoadReport, TableError> {
    let meta = fs::metadata(path).map_err(|e| TableError::Io(format!("{}: {}", path.display(), e)))?;
    if meta.len() > MAX_TABLE_FILE_BYTES as u64 {
        return Err(TableError::TooLarge {
            bytes: meta.len(),
            max: MAX_TABLE_FILE_BYTES,
        });
    }
    let content =
        fs::read_to_string(path).map_err(|e| TableError::Io(format!("{}: {}", path.display(), e)))?;
    let report = parse_table_str(&content, defaults)?;
    tracing::info!(
        "loaded {} ballistic row(s) from {}",
        report.table.row_count(),
        path.display()
    );
    Ok(report)
}
