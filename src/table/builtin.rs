//! Built-in HE firing table for the 82 mm mortar (6000-mil faction).

use super::{index_rows, BallisticRow, LoadReport};

pub const BUILTIN_FACTION: &str = "ussr";
pub const BUILTIN_SHELL: &str = "HE";

/// (ring, range m, elevation mil, time of flight s)
const HE_ROWS: &[(u32, f64, f64, f64)] = &[
    // 0 charges
    (0, 50.0, 1455.0, 15.0),
    (0, 100.0, 1411.0, 15.0),
    (0, 150.0, 1365.0, 14.9),
    (0, 200.0, 1318.0, 14.8),
    (0, 250.0, 1268.0, 14.6),
    (0, 300.0, 1217.0, 14.4),
    (0, 350.0, 1159.0, 14.1),
    (0, 400.0, 1095.0, 13.7),
    (0, 450.0, 1023.0, 13.2),
    (0, 500.0, 922.0, 12.4),
    // 1 charge
    (1, 100.0, 1446.0, 19.5),
    (1, 200.0, 1392.0, 19.4),
    (1, 300.0, 1335.0, 19.2),
    (1, 400.0, 1275.0, 18.9),
    (1, 500.0, 1212.0, 18.6),
    (1, 600.0, 1141.0, 18.1),
    (1, 700.0, 1058.0, 17.4),
    (1, 800.0, 952.0, 16.4),
    // 2 charges
    (2, 200.0, 1432.0, 24.8),
    (2, 300.0, 1397.0, 24.7),
    (2, 400.0, 1362.0, 24.6),
    (2, 500.0, 1325.0, 24.4),
    (2, 600.0, 1288.0, 24.2),
    (2, 700.0, 1248.0, 24.0),
    (2, 800.0, 1207.0, 23.7),
    (2, 900.0, 1162.0, 23.3),
    (2, 1000.0, 1114.0, 22.9),
    (2, 1100.0, 1060.0, 22.3),
    (2, 1200.0, 997.0, 21.5),
    (2, 1300.0, 914.0, 20.4),
    (2, 1400.0, 755.0, 17.8),
    // 3 charges
    (3, 300.0, 1423.0, 28.9),
    (3, 400.0, 1397.0, 28.8),
    (3, 500.0, 1370.0, 28.6),
    (3, 600.0, 1343.0, 28.5),
    (3, 700.0, 1315.0, 28.5),
    (3, 800.0, 1286.0, 28.3),
    (3, 900.0, 1257.0, 28.1),
    (3, 1000.0, 1226.0, 27.9),
    (3, 1100.0, 1193.0, 27.6),
    (3, 1200.0, 1159.0, 27.2),
    (3, 1300.0, 1123.0, 26.8),
    (3, 1400.0, 1084.0, 26.4),
    (3, 1500.0, 1040.0, 25.8),
    (3, 1600.0, 991.0, 25.1),
    (3, 1700.0, 932.0, 24.2),
    (3, 1800.0, 851.0, 22.8),
    // 4 charges
    (4, 400.0, 1418.0, 32.9),
    (4, 500.0, 1398.0, 32.9),
    (4, 600.0, 1376.0, 32.8),
    (4, 700.0, 1355.0, 32.7),
    (4, 800.0, 1333.0, 32.6),
    (4, 900.0, 1311.0, 32.4),
    (4, 1000.0, 1288.0, 32.2),
    (4, 1100.0, 1264.0, 32.1),
    (4, 1200.0, 1240.0, 31.8),
    (4, 1300.0, 1215.0, 31.6),
    (4, 1400.0, 1189.0, 31.3),
    (4, 1500.0, 1161.0, 31.0),
    (4, 1600.0, 1133.0, 30.7),
    (4, 1700.0, 1102.0, 30.3),
    (4, 1800.0, 1069.0, 29.8),
    (4, 1900.0, 1034.0, 29.3),
    (4, 2000.0, 995.0, 28.7),
    (4, 2100.0, 950.0, 27.9),
    (4, 2200.0, 896.0, 26.9),
    (4, 2300.0, 820.0, 25.3),
];

/// Impact scatter radius per ring; the HE table measures it per charge, not per range.
fn he_dispersion_m(ring: u32) -> f64 {
    match ring {
        0 => 8.0,
        1 => 13.0,
        2 => 19.0,
        3 => 27.0,
        4 => 34.0,
        _ => 0.0,
    }
}

pub fn builtin_rows() -> Vec<BallisticRow> {
    HE_ROWS
        .iter()
        .map(|&(ring, range, elev, tof)| BallisticRow {
            faction: BUILTIN_FACTION.to_string(),
            shell_type: BUILTIN_SHELL.to_string(),
            charge_ring: ring,
            range_m: range,
            elevation_mils: elev,
            time_of_flight_s: tof,
            dispersion_m: he_dispersion_m(ring),
        })
        .collect()
}

/// Index the built-in rows. The data is clean, so the report carries no issues.
pub fn builtin_table() -> LoadReport {
    index_rows(builtin_rows().into_iter().enumerate().map(|(i, r)| (i + 1, r)))
}
