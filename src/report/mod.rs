//! Text and JSON report generation.

use crate::mission::MissionReport;
use crate::solver::Outcome;
use crate::table::{RingCoverage, RingTable, RowIssue};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// JSON envelope written for `--format json` and `--out`.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub generated_at: String,
    #[serde(flatten)]
    pub mission: &'a MissionReport,
}

impl<'a> JsonReport<'a> {
    pub fn new(mission: &'a MissionReport) -> Self {
        Self {
            generated_at: chrono::Utc::now().to_rfc3339(),
            mission,
        }
    }
}

pub fn render_json(mission: &MissionReport) -> Result<String, String> {
    serde_json::to_string_pretty(&JsonReport::new(mission)).map_err(|e| e.to_string())
}

pub fn write_json_report(mission: &MissionReport, path: &Path) -> Result<(), String> {
    let json = render_json(mission)?;
    fs::write(path, json).map_err(|e| e.to_string())?;
    Ok(())
}

pub fn write_text_report(mission: &MissionReport, path: &Path) -> Result<(), String> {
    fs::write(path, render_text(mission)).map_err(|e| e.to_string())
}

/// Firing data box as shown to the gunner.
pub fn render_text(m: &MissionReport) -> String {
    let mut lines = vec![
        format!(
            "Mortar: X={:.0} Z={:.0}   Target: X={:.0} Z={:.0}",
            m.mortar_grid_m[0], m.mortar_grid_m[1], m.target_grid_m[0], m.target_grid_m[1]
        ),
        format!("Table: {} {}", m.faction, m.shell),
    ];
    match &m.outcome {
        Outcome::Solution(s) => {
            lines.push(format!("RANGE (M): {:.0}", m.distance_m));
            lines.push(format!(
                "AZIMUTH: {:.0} mils ({:.1} deg, {:.0}-mil circle)",
                m.azimuth_mils, m.azimuth_deg, m.mils_per_circle
            ));
            lines.push(format!("CHARGE RING: {}", s.charge_ring));
            lines.push(format!("ELEV (MIL): {:.0}", s.elevation_mils));
            lines.push(format!("TIME OF FLIGHT (SEC): {:.2}", s.time_of_flight_s));
            lines.push(format!("DISPERSION (M): {:.0}", s.dispersion_m));
            lines.extend(terrain_lines(m));
        }
        Outcome::NoSolution {
            max_range_m,
            min_elevation_mils,
        } => {
            lines.push(format!(
                "No valid firing solution found above {:.0} mils.",
                min_elevation_mils
            ));
            lines.push(format!("Max table range: {:.0}m.", max_range_m));
            lines.push(format!("RANGE (M): {:.0}", m.distance_m));
        }
        Outcome::ElevationOutOfRange {
            charge_ring,
            raw_elevation_mils,
            corrected_elevation_mils,
        } => {
            lines.push(format!(
                "Elevation out of range: {:.0} mils",
                corrected_elevation_mils
            ));
            lines.push("Try a different ring or check elevation difference.".to_string());
            lines.push(format!(
                "Raw elev: {:.0} mils (ring {})",
                raw_elevation_mils, charge_ring
            ));
            lines.extend(terrain_lines(m));
        }
    }
    to_block(lines)
}

fn terrain_lines(m: &MissionReport) -> [String; 4] {
    [
        format!("Mortar Elevation: {:.1} m", m.mortar_elevation_m),
        format!("Target Elevation: {:.1} m", m.target_elevation_m),
        format!("Elevation Delta: {:.1} m", m.dz_m),
        format!("dz Correction: {:+.1} mils", m.correction_mils),
    ]
}

/// Newline-terminated block of lines.
fn to_block(lines: Vec<String>) -> String {
    lines.into_iter().map(|l| l + "\n").collect()
}

/// Per-ring range, elevation and dispersion bands plus the range envelope.
pub fn render_coverage(faction: &str, shell: &str, table: &RingTable) -> String {
    let coverage = table.coverage();
    let mut lines = vec![
        format!(
            "{} {}: {} ring(s), {} row(s)",
            faction,
            shell,
            coverage.len(),
            table.row_count()
        ),
        format!(
            "{:<6}{:>6}{:>16}{:>16}{:>14}",
            "RING", "ROWS", "RANGE (M)", "ELEV (MIL)", "DISP (M)"
        ),
    ];
    lines.extend(coverage.iter().map(coverage_line));
    if let Some(max) = table.max_range_m() {
        lines.push(format!("Max range: {:.0} m", max));
    }
    if let Some(min) = table.min_elevation_mils() {
        lines.push(format!("Min elevation: {:.0} mils", min));
    }
    to_block(lines)
}

/// Rows the loader dropped; empty string when there were none.
pub fn render_issues(issues: &[RowIssue]) -> String {
    if issues.is_empty() {
        return String::new();
    }
    let header = format!("Issues ({}):\n", issues.len());
    let body: String = issues.iter().map(|i| format!("  {}\n", i)).collect();
    header + &body
}

fn coverage_line(c: &RingCoverage) -> String {
    let disp = if c.min_dispersion_m == c.max_dispersion_m {
        format!("{:.0}", c.min_dispersion_m)
    } else {
        format!("{:.0}-{:.0}", c.min_dispersion_m, c.max_dispersion_m)
    };
    format!(
        "{:<6}{:>6}{:>16}{:>16}{:>14}",
        c.charge_ring,
        c.rows,
        format!("{:.0}-{:.0}", c.min_range_m, c.max_range_m),
        format!("{:.0}-{:.0}", c.min_elevation_mils, c.max_elevation_mils),
        disp
    )
}
