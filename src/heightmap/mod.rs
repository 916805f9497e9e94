//! Grayscale elevation surface sampled at map pixels.

use crate::geometry::{MapPoint, MapScale};
use image::GrayImage;
use std::path::Path;

/// 8-bit luma image where 0 is sea level and 255 is `max_elevation_m`.
/// The heightmap may have a different resolution than the map image; samples
/// are taken at the proportionally matching pixel.
#[derive(Debug, Clone)]
pub struct Heightmap {
    image: GrayImage,
    max_elevation_m: f64,
}

impl Heightmap {
    pub fn new(image: GrayImage, max_elevation_m: f64) -> Result<Self, String> {
        if image.width() == 0 || image.height() == 0 {
            return Err("heightmap image is empty".to_string());
        }
        Ok(Self {
            image,
            max_elevation_m,
        })
    }

    pub fn open(path: &Path, max_elevation_m: f64) -> Result<Self, String> {
        let img = image::open(path).map_err(|e| format!("{}: {}", path.display(), e))?;
        tracing::info!(
            "loaded heightmap {} ({}x{})",
            path.display(),
            img.width(),
            img.height()
        );
        Self::new(img.to_luma8(), max_elevation_m)
    }

    pub fn from_bytes(bytes: &[u8], max_elevation_m: f64) -> Result<Self, String> {
        let img = image::load_from_memory(bytes).map_err(|e| e.to_string())?;
        Self::new(img.to_luma8(), max_elevation_m)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn max_elevation_m(&self) -> f64 {
        self.max_elevation_m
    }

    /// Terrain height in meters under a map pixel.
    pub fn elevation_at(&self, p: MapPoint, scale: &MapScale) -> f64 {
        let hx = sample_index(p.x, scale.width_px, self.image.width());
        let hy = sample_index(p.y, scale.height_px, self.image.height());
        let value = self.image.get_pixel(hx, hy).0[0];
        value as f64 / 255.0 * self.max_elevation_m
    }
}

fn sample_index(map_coord: f64, map_len: u32, hm_len: u32) -> u32 {
    let i = (map_coord / map_len as f64 * hm_len as f64) as i64;
    i.clamp(0, hm_len as i64 - 1) as u32
}

/// Elevation under `p`, or 0 when no heightmap is loaded.
pub fn elevation_or_zero(heightmap: Option<&Heightmap>, p: MapPoint, scale: &MapScale) -> f64 {
    heightmap.map(|h| h.elevation_at(p, scale)).unwrap_or(0.0)
}
