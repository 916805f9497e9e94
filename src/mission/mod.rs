//! Fire mission: geometry + terrain + solver for one mortar/target pair.
//!
//! All inputs are passed in explicitly; nothing here keeps state between
//! requests.

use crate::geometry::{bearing, AngularUnit, MapPoint, MapScale};
use crate::heightmap::{elevation_or_zero, Heightmap};
use crate::solver::{solve, Outcome, SolverParams};
use crate::table::RingTable;
use serde::Serialize;

/// Everything a request needs besides the two points.
#[derive(Debug, Clone, Copy)]
pub struct MissionContext<'a> {
    pub faction: &'a str,
    pub shell: &'a str,
    pub table: &'a RingTable,
    pub scale: MapScale,
    pub heightmap: Option<&'a Heightmap>,
    pub unit: AngularUnit,
    pub params: SolverParams,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissionReport {
    pub faction: String,
    pub shell: String,
    pub mortar_px: MapPoint,
    pub target_px: MapPoint,
    /// Grid position (X, Z) in meters.
    pub mortar_grid_m: [f64; 2],
    pub target_grid_m: [f64; 2],
    pub distance_m: f64,
    pub azimuth_deg: f64,
    pub azimuth_mils: f64,
    pub mils_per_circle: f64,
    pub mortar_elevation_m: f64,
    pub target_elevation_m: f64,
    pub dz_m: f64,
    pub correction_mils: f64,
    pub outcome: Outcome,
}

pub fn compute_mission(ctx: &MissionContext<'_>, mortar: MapPoint, target: MapPoint) -> MissionReport {
    let b = bearing(&ctx.scale, mortar, target, ctx.unit);
    let mortar_z = elevation_or_zero(ctx.heightmap, mortar, &ctx.scale);
    let target_z = elevation_or_zero(ctx.heightmap, target, &ctx.scale);
    let dz = target_z - mortar_z;
    let outcome = solve(ctx.table, &ctx.params, b.distance_m, dz);
    match &outcome {
        Outcome::Solution(s) => tracing::info!(
            "solution: ring {} elev {:.0} mils tof {:.2} s at {:.0} m",
            s.charge_ring,
            s.elevation_mils,
            s.time_of_flight_s,
            s.distance_m
        ),
        Outcome::NoSolution { .. } => {
            tracing::info!("no firing solution at {:.0} m", b.distance_m)
        }
        Outcome::ElevationOutOfRange {
            corrected_elevation_mils,
            ..
        } => tracing::info!(
            "corrected elevation {:.0} mils outside valid band",
            corrected_elevation_mils
        ),
    }
    let (mx, mz) = ctx.scale.pixel_to_world(mortar);
    let (tx, tz) = ctx.scale.pixel_to_world(target);
    MissionReport {
        faction: ctx.faction.to_string(),
        shell: ctx.shell.to_string(),
        mortar_px: mortar,
        target_px: target,
        mortar_grid_m: [mx, mz],
        target_grid_m: [tx, tz],
        distance_m: b.distance_m,
        azimuth_deg: b.azimuth_deg,
        azimuth_mils: b.azimuth_mils,
        mils_per_circle: ctx.unit.per_circle(),
        mortar_elevation_m: mortar_z,
        target_elevation_m: target_z,
        dz_m: dz,
        correction_mils: dz * ctx.params.dz_correction_mils_per_m,
        outcome,
    }
}
