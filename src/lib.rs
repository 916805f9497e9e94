//! Mortar firing-solution calculator: library entry point.
//!
//! Exposes config, table, solver, geometry, heightmap, layer, project,
//! mission, and report for use by the CLI and tests.

pub mod config;
pub mod geometry;
pub mod heightmap;
pub mod layer;
pub mod mission;
pub mod project;
pub mod report;
pub mod solver;
pub mod table;
pub mod util;
