//! Map geometry: pixel/grid conversion, slant distance, azimuth in mils.
//!
//! Pixel space has its origin at the top-left of the map image with y growing
//! downwards. Grid coordinates are in-game meters with Z growing north, i.e.
//! up the image.

use serde::{Deserialize, Serialize};

/// A position on the map image, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapPoint {
    pub x: f64,
    pub y: f64,
}

impl MapPoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoordError {
    /// Not exactly two whitespace-separated tokens.
    Format(String),
    NotNumeric(String),
    OutOfBounds {
        x_m: f64,
        z_m: f64,
        width_m: f64,
        height_m: f64,
    },
    InvalidScale(String),
}

impl std::fmt::Display for CoordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CoordError::Format(s) => write!(
                f,
                "invalid coordinate format {:?}: use e.g. \"6500 3400\" or \"02480 03659\"",
                s
            ),
            CoordError::NotNumeric(s) => write!(f, "coordinates must be numeric: {:?}", s),
            CoordError::OutOfBounds {
                x_m,
                z_m,
                width_m,
                height_m,
            } => write!(
                f,
                "coordinates out of map bounds: X={} Z={} (map size: {}x{} m)",
                x_m, z_m, width_m, height_m
            ),
            CoordError::InvalidScale(s) => write!(f, "invalid map scale: {}", s),
        }
    }
}

impl std::error::Error for CoordError {}

/// Map extent in meters and in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapScale {
    pub width_m: f64,
    pub height_m: f64,
    pub width_px: u32,
    pub height_px: u32,
}

impl MapScale {
    pub fn new(width_m: f64, height_m: f64, width_px: u32, height_px: u32) -> Result<Self, CoordError> {
        if !(width_m > 0.0 && height_m > 0.0 && width_m.is_finite() && height_m.is_finite()) {
            return Err(CoordError::InvalidScale(format!(
                "map size {}x{} m",
                width_m, height_m
            )));
        }
        if width_px == 0 || height_px == 0 {
            return Err(CoordError::InvalidScale(format!(
                "image size {}x{} px",
                width_px, height_px
            )));
        }
        Ok(Self {
            width_m,
            height_m,
            width_px,
            height_px,
        })
    }

    /// One pixel per meter; used when no map image is loaded.
    pub fn unscaled(width_m: f64, height_m: f64) -> Result<Self, CoordError> {
        let px = |m: f64| m.round().clamp(1.0, u32::MAX as f64) as u32;
        Self::new(width_m, height_m, px(width_m), px(height_m))
    }

    pub fn mpp_x(&self) -> f64 {
        self.width_m / self.width_px as f64
    }

    pub fn mpp_y(&self) -> f64 {
        self.height_m / self.height_px as f64
    }

    /// Single meters-per-pixel factor: the mean of the two axes.
    pub fn meters_per_pixel(&self) -> f64 {
        (self.mpp_x() + self.mpp_y()) / 2.0
    }

    /// Grid meters to pixel without bounds checks (Z flipped).
    pub fn world_to_pixel(&self, x_m: f64, z_m: f64) -> MapPoint {
        MapPoint::new(x_m / self.mpp_x(), self.height_px as f64 - z_m / self.mpp_y())
    }

    pub fn pixel_to_world(&self, p: MapPoint) -> (f64, f64) {
        (p.x * self.mpp_x(), (self.height_px as f64 - p.y) * self.mpp_y())
    }

    /// Grid meters to a whole pixel on the image. Rejects points off the map
    /// and clamps the result to the last row/column.
    pub fn grid_to_pixel(&self, x_m: f64, z_m: f64) -> Result<MapPoint, CoordError> {
        if !(0.0..=self.width_m).contains(&x_m) || !(0.0..=self.height_m).contains(&z_m) {
            return Err(CoordError::OutOfBounds {
                x_m,
                z_m,
                width_m: self.width_m,
                height_m: self.height_m,
            });
        }
        let p = self.world_to_pixel(x_m, z_m);
        let max_x = (self.width_px - 1) as f64;
        let max_y = (self.height_px - 1) as f64;
        Ok(MapPoint::new(
            p.x.clamp(0.0, max_x).floor(),
            p.y.clamp(0.0, max_y).floor(),
        ))
    }
}

/// Mils per full circle. Both divide the same 360 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AngularUnit {
    Mils6000,
    Mils6400,
}

impl AngularUnit {
    pub fn from_mils(per_circle: u32) -> Option<Self> {
        match per_circle {
            6000 => Some(AngularUnit::Mils6000),
            6400 => Some(AngularUnit::Mils6400),
            _ => None,
        }
    }

    pub fn per_circle(self) -> f64 {
        match self {
            AngularUnit::Mils6000 => 6000.0,
            AngularUnit::Mils6400 => 6400.0,
        }
    }

    pub fn degrees_to_mils(self, degrees: f64) -> f64 {
        degrees / 360.0 * self.per_circle()
    }
}

/// Compass bearing in degrees [0, 360) for a meter offset in screen axes
/// (y down). Straight up the map is 0, right is 90.
pub fn azimuth_degrees(dx_m: f64, dy_m: f64) -> f64 {
    (dx_m.atan2(-dy_m).to_degrees() + 360.0) % 360.0
}

/// Distance and direction from the mortar to the target.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bearing {
    pub distance_m: f64,
    pub azimuth_deg: f64,
    pub azimuth_mils: f64,
    pub unit: AngularUnit,
}

pub fn bearing(scale: &MapScale, from: MapPoint, to: MapPoint, unit: AngularUnit) -> Bearing {
    let mpp = scale.meters_per_pixel();
    let dx = (to.x - from.x) * mpp;
    let dy = (to.y - from.y) * mpp;
    let azimuth_deg = azimuth_degrees(dx, dy);
    Bearing {
        distance_m: dx.hypot(dy),
        azimuth_deg,
        azimuth_mils: unit.degrees_to_mils(azimuth_deg),
        unit,
    }
}

/// Parse grid entry "X Z" in whole meters, e.g. "6500 3400" or "02480 03659".
pub fn parse_grid_coords(text: &str) -> Result<(f64, f64), CoordError> {
    let parts: Vec<&str> = text.split_whitespace().collect();
    if parts.len() != 2 {
        return Err(CoordError::Format(text.to_string()));
    }
    let numeric = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !(numeric(parts[0]) && numeric(parts[1])) {
        return Err(CoordError::NotNumeric(text.to_string()));
    }
    let x: u64 = parts[0]
        .parse()
        .map_err(|_| CoordError::NotNumeric(text.to_string()))?;
    let z: u64 = parts[1]
        .parse()
        .map_err(|_| CoordError::NotNumeric(text.to_string()))?;
    Ok((x as f64, z as f64))
}

/// Parse a pixel position "x,y" (or "x y").
pub fn parse_pixel_point(text: &str) -> Result<MapPoint, CoordError> {
    let parts: Vec<&str> = text
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();
    if parts.len() != 2 {
        return Err(CoordError::Format(text.to_string()));
    }
    let x: f64 = parts[0]
        .parse()
        .map_err(|_| CoordError::NotNumeric(text.to_string()))?;
    let y: f64 = parts[1]
        .parse()
        .map_err(|_| CoordError::NotNumeric(text.to_string()))?;
    if !(x.is_finite() && y.is_finite()) {
        return Err(CoordError::NotNumeric(text.to_string()));
    }
    Ok(MapPoint::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn north_is_zero_east_is_quarter() {
        let scale = MapScale::unscaled(5120.0, 5120.0).unwrap();
        let mortar = MapPoint::new(1000.0, 1000.0);
        for unit in [AngularUnit::Mils6000, AngularUnit::Mils6400] {
            let north = bearing(&scale, mortar, MapPoint::new(1000.0, 400.0), unit);
            assert!(close(north.azimuth_mils, 0.0));
            let east = bearing(&scale, mortar, MapPoint::new(1600.0, 1000.0), unit);
            assert!(close(east.azimuth_mils, unit.per_circle() / 4.0));
        }
        let east = bearing(&scale, mortar, MapPoint::new(1600.0, 1000.0), AngularUnit::Mils6000);
        assert!(close(east.azimuth_mils, 1500.0));
        let east = bearing(&scale, mortar, MapPoint::new(1600.0, 1000.0), AngularUnit::Mils6400);
        assert!(close(east.azimuth_mils, 1600.0));
    }

    #[test]
    fn south_and_west() {
        assert!(close(azimuth_degrees(0.0, 10.0), 180.0));
        assert!(close(azimuth_degrees(-10.0, 0.0), 270.0));
        let a = azimuth_degrees(-1e-12, -10.0);
        assert!((0.0..360.0).contains(&a));
    }

    #[test]
    fn distance_uses_averaged_scale() {
        // 2 m/px on X, 4 m/px on Y -> 3 m/px.
        let scale = MapScale::new(2000.0, 4000.0, 1000, 1000).unwrap();
        assert!(close(scale.meters_per_pixel(), 3.0));
        let b = bearing(
            &scale,
            MapPoint::new(0.0, 0.0),
            MapPoint::new(30.0, 40.0),
            AngularUnit::Mils6400,
        );
        assert!(close(b.distance_m, 150.0));
    }

    #[test]
    fn grid_entry_to_pixel() {
        let scale = MapScale::unscaled(5120.0, 5120.0).unwrap();
        let (x, z) = parse_grid_coords("02480 03659").unwrap();
        assert_eq!((x, z), (2480.0, 3659.0));
        let p = scale.grid_to_pixel(x, z).unwrap();
        assert_eq!(p, MapPoint::new(2480.0, 1461.0));
        // Corners clamp onto the image.
        let p = scale.grid_to_pixel(5120.0, 0.0).unwrap();
        assert_eq!(p, MapPoint::new(5119.0, 5119.0));
    }

    #[test]
    fn grid_entry_on_scaled_map() {
        // 12800 m rendered on a 4096 px image.
        let scale = MapScale::new(12800.0, 12800.0, 4096, 4096).unwrap();
        let p = scale.grid_to_pixel(6400.0, 6400.0).unwrap();
        assert_eq!(p, MapPoint::new(2048.0, 2048.0));
        let (x, z) = scale.pixel_to_world(p);
        assert!(close(x, 6400.0) && close(z, 6400.0));
    }

    #[test]
    fn grid_entry_errors() {
        let scale = MapScale::unscaled(5120.0, 5120.0).unwrap();
        assert!(matches!(parse_grid_coords("6500"), Err(CoordError::Format(_))));
        assert!(matches!(parse_grid_coords("1 2 3"), Err(CoordError::Format(_))));
        assert!(matches!(parse_grid_coords("65a0 3400"), Err(CoordError::NotNumeric(_))));
        assert!(matches!(parse_grid_coords("-10 3400"), Err(CoordError::NotNumeric(_))));
        let (x, z) = parse_grid_coords("6500 3400").unwrap();
        assert!(matches!(
            scale.grid_to_pixel(x, z),
            Err(CoordError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn pixel_point_parsing() {
        assert_eq!(parse_pixel_point("120,340").unwrap(), MapPoint::new(120.0, 340.0));
        assert_eq!(parse_pixel_point(" 12.5 7 ").unwrap(), MapPoint::new(12.5, 7.0));
        assert!(parse_pixel_point("12").is_err());
        assert!(parse_pixel_point("a,b").is_err());
    }

    #[test]
    fn degrees_convert_per_circle() {
        assert!(close(AngularUnit::Mils6000.degrees_to_mils(90.0), 1500.0));
        assert!(close(AngularUnit::Mils6400.degrees_to_mils(90.0), 1600.0));
        assert!(close(AngularUnit::Mils6400.degrees_to_mils(225.0), 4000.0));
    }

    #[test]
    fn invalid_scale_rejected() {
        assert!(MapScale::new(0.0, 100.0, 10, 10).is_err());
        assert!(MapScale::new(100.0, 100.0, 0, 10).is_err());
        assert!(AngularUnit::from_mils(360).is_none());
        assert_eq!(AngularUnit::from_mils(6000), Some(AngularUnit::Mils6000));
    }
}
