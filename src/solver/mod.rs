//! Firing-solution search: range-bracket interpolation and charge-ring selection.

use crate::config::{
    DEFAULT_DZ_CORRECTION_MILS_PER_M, DEFAULT_MAX_VALID_ELEVATION_MILS,
    DEFAULT_MIN_VALID_ELEVATION_MILS,
};
use crate::table::{BallisticRow, RingTable};
use serde::{Deserialize, Serialize};

/// Values interpolated between two bracketing rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interpolated {
    pub elevation_mils: f64,
    pub time_of_flight_s: f64,
    pub dispersion_m: f64,
}

/// Weighted form is exact at both ends of the bracket.
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    (1.0 - t) * a + t * b
}

/// First consecutive pair with `a.range <= distance <= b.range`.
pub fn bracket(rows: &[BallisticRow], distance_m: f64) -> Option<(&BallisticRow, &BallisticRow)> {
    rows.windows(2)
        .find(|w| w[0].range_m <= distance_m && distance_m <= w[1].range_m)
        .map(|w| (&w[0], &w[1]))
}

/// Interpolate between two rows. `a.range_m < b.range_m` must hold, which
/// the table indexer guarantees.
pub fn interpolate_between(a: &BallisticRow, b: &BallisticRow, distance_m: f64) -> Interpolated {
    let ratio = (distance_m - a.range_m) / (b.range_m - a.range_m);
    Interpolated {
        elevation_mils: lerp(a.elevation_mils, b.elevation_mils, ratio),
        time_of_flight_s: lerp(a.time_of_flight_s, b.time_of_flight_s, ratio),
        dispersion_m: lerp(a.dispersion_m, b.dispersion_m, ratio),
    }
}

/// Interpolate one ring's rows at `distance_m`; `None` outside the covered range.
pub fn interpolate(rows: &[BallisticRow], distance_m: f64) -> Option<Interpolated> {
    bracket(rows, distance_m).map(|(a, b)| interpolate_between(a, b, distance_m))
}

/// Selected ring and the two rows that bracket the requested distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RingBracket<'a> {
    pub charge_ring: u32,
    pub lower: &'a BallisticRow,
    pub upper: &'a BallisticRow,
}

impl RingBracket<'_> {
    pub fn interpolate(&self, distance_m: f64) -> Interpolated {
        interpolate_between(self.lower, self.upper, distance_m)
    }
}

/// Lowest ring that brackets `distance_m` and whose elevation, corrected by
/// `dz_m * correction_mils_per_m`, is at least `min_elevation_mils`.
pub fn select_ring(
    table: &RingTable,
    distance_m: f64,
    dz_m: f64,
    correction_mils_per_m: f64,
    min_elevation_mils: f64,
) -> Option<RingBracket<'_>> {
    for (ring, rows) in table.rings() {
        let Some((lower, upper)) = bracket(rows, distance_m) else {
            continue;
        };
        let elev = interpolate_between(lower, upper, distance_m).elevation_mils;
        let corrected = elev + dz_m * correction_mils_per_m;
        tracing::debug!(
            "ring {}: elev {:.1} corrected {:.1} (min {:.1})",
            ring,
            elev,
            corrected,
            min_elevation_mils
        );
        if corrected >= min_elevation_mils {
            return Some(RingBracket {
                charge_ring: ring,
                lower,
                upper,
            });
        }
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverParams {
    pub dz_correction_mils_per_m: f64,
    /// When `None`, the ring table's lowest tabulated elevation.
    pub min_elevation_mils: Option<f64>,
    pub min_valid_elevation_mils: f64,
    pub max_valid_elevation_mils: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            dz_correction_mils_per_m: DEFAULT_DZ_CORRECTION_MILS_PER_M,
            min_elevation_mils: None,
            min_valid_elevation_mils: DEFAULT_MIN_VALID_ELEVATION_MILS,
            max_valid_elevation_mils: DEFAULT_MAX_VALID_ELEVATION_MILS,
        }
    }
}

impl SolverParams {
    pub fn from_config(cfg: &crate::config::CalcConfig) -> Self {
        Self {
            dz_correction_mils_per_m: cfg.dz_correction_mils_per_m,
            min_elevation_mils: cfg.min_elevation_mils,
            min_valid_elevation_mils: cfg.min_valid_elevation_mils,
            max_valid_elevation_mils: cfg.max_valid_elevation_mils,
        }
    }

    pub fn min_elevation_for(&self, table: &RingTable) -> f64 {
        self.min_elevation_mils
            .or_else(|| table.min_elevation_mils())
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FiringSolution {
    pub charge_ring: u32,
    pub distance_m: f64,
    pub dz_m: f64,
    /// Mils added for the height difference (`dz_m * factor`).
    pub correction_mils: f64,
    pub raw_elevation_mils: f64,
    pub elevation_mils: f64,
    pub time_of_flight_s: f64,
    pub dispersion_m: f64,
}

/// Result of one query. Only `Solution` is fireable; the other two are
/// normal answers, not errors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Solution(FiringSolution),
    NoSolution {
        max_range_m: f64,
        min_elevation_mils: f64,
    },
    ElevationOutOfRange {
        charge_ring: u32,
        raw_elevation_mils: f64,
        corrected_elevation_mils: f64,
    },
}

impl Outcome {
    pub fn solution(&self) -> Option<&FiringSolution> {
        match self {
            Outcome::Solution(s) => Some(s),
            _ => None,
        }
    }
}

/// Full query: ring selection, interpolation, height correction and band check.
pub fn solve(table: &RingTable, params: &SolverParams, distance_m: f64, dz_m: f64) -> Outcome {
    let min_elevation = params.min_elevation_for(table);
    let Some(chosen) = select_ring(
        table,
        distance_m,
        dz_m,
        params.dz_correction_mils_per_m,
        min_elevation,
    ) else {
        return Outcome::NoSolution {
            max_range_m: table.max_range_m().unwrap_or(0.0),
            min_elevation_mils: min_elevation,
        };
    };

    let values = chosen.interpolate(distance_m);
    let correction = dz_m * params.dz_correction_mils_per_m;
    let corrected = values.elevation_mils + correction;
    if corrected < params.min_valid_elevation_mils || corrected > params.max_valid_elevation_mils {
        return Outcome::ElevationOutOfRange {
            charge_ring: chosen.charge_ring,
            raw_elevation_mils: values.elevation_mils,
            corrected_elevation_mils: corrected,
        };
    }
    Outcome::Solution(FiringSolution {
        charge_ring: chosen.charge_ring,
        distance_m,
        dz_m,
        correction_mils: correction,
        raw_elevation_mils: values.elevation_mils,
        elevation_mils: corrected,
        time_of_flight_s: values.time_of_flight_s,
        dispersion_m: values.dispersion_m,
    })
}
