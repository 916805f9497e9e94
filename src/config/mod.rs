//! Configuration loading and defaults.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum size in bytes for a ballistic table file.
pub const MAX_TABLE_FILE_BYTES: usize = 4 * 1024 * 1024;

/// Maximum size in bytes for a single `.layer` file.
pub const MAX_LAYER_FILE_BYTES: usize = 16 * 1024 * 1024;

/// Maximum number of entities kept from all layer files of a project.
pub const MAX_LAYER_ENTITIES: usize = 100_000;

/// Maximum size in bytes for an image (map or heightmap) read from a project archive.
pub const MAX_IMAGE_FILE_BYTES: usize = 64 * 1024 * 1024;

/// Mils added to the interpolated elevation per meter the target sits above the mortar.
pub const DEFAULT_DZ_CORRECTION_MILS_PER_M: f64 = 1.5;

/// Lower edge of the absolute elevation band a corrected solution must fall in.
pub const DEFAULT_MIN_VALID_ELEVATION_MILS: f64 = 100.0;

/// Upper edge of the absolute elevation band a corrected solution must fall in.
pub const DEFAULT_MAX_VALID_ELEVATION_MILS: f64 = 1600.0;

/// Terrain height represented by a full-white heightmap pixel.
pub const DEFAULT_MAX_ELEVATION_M: f64 = 512.0;

pub const DEFAULT_MAP_WIDTH_M: f64 = 5120.0;
pub const DEFAULT_MAP_HEIGHT_M: f64 = 5120.0;

pub const DEFAULT_FACTION: &str = "ussr";
pub const DEFAULT_SHELL: &str = "HE";

/// Mil count used when a faction has no configured convention.
pub const DEFAULT_MILS_PER_CIRCLE: u32 = 6400;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalcConfig {
    #[serde(default = "default_faction")]
    pub faction: String,
    #[serde(default = "default_shell")]
    pub shell: String,
    #[serde(default = "default_dz_correction")]
    pub dz_correction_mils_per_m: f64,
    /// Override for the minimum acceptable corrected elevation. When unset the
    /// lowest tabulated elevation of the active ring table is used.
    #[serde(default)]
    pub min_elevation_mils: Option<f64>,
    #[serde(default = "default_min_valid_elevation")]
    pub min_valid_elevation_mils: f64,
    #[serde(default = "default_max_valid_elevation")]
    pub max_valid_elevation_mils: f64,
    #[serde(default = "default_max_elevation_m")]
    pub max_elevation_m: f64,
    #[serde(default = "default_map_width_m")]
    pub map_width_m: f64,
    #[serde(default = "default_map_height_m")]
    pub map_height_m: f64,
    /// Ballistic table file; the built-in HE table is used when unset.
    #[serde(default)]
    pub table: Option<PathBuf>,
    /// Faction name -> mils per full circle (6000 or 6400).
    #[serde(default = "default_mils")]
    pub mils: BTreeMap<String, u32>,
}

fn default_faction() -> String {
    DEFAULT_FACTION.to_string()
}

fn default_shell() -> String {
    DEFAULT_SHELL.to_string()
}

fn default_dz_correction() -> f64 {
    DEFAULT_DZ_CORRECTION_MILS_PER_M
}

fn default_min_valid_elevation() -> f64 {
    DEFAULT_MIN_VALID_ELEVATION_MILS
}

fn default_max_valid_elevation() -> f64 {
    DEFAULT_MAX_VALID_ELEVATION_MILS
}

fn default_max_elevation_m() -> f64 {
    DEFAULT_MAX_ELEVATION_M
}

fn default_map_width_m() -> f64 {
    DEFAULT_MAP_WIDTH_M
}

fn default_map_height_m() -> f64 {
    DEFAULT_MAP_HEIGHT_M
}

fn default_mils() -> BTreeMap<String, u32> {
    let mut m = BTreeMap::new();
    m.insert("ussr".to_string(), 6000);
    m.insert("us".to_string(), 6400);
    m
}

impl Default for CalcConfig {
    fn default() -> Self {
        Self {
            faction: default_faction(),
            shell: default_shell(),
            dz_correction_mils_per_m: DEFAULT_DZ_CORRECTION_MILS_PER_M,
            min_elevation_mils: None,
            min_valid_elevation_mils: DEFAULT_MIN_VALID_ELEVATION_MILS,
            max_valid_elevation_mils: DEFAULT_MAX_VALID_ELEVATION_MILS,
            max_elevation_m: DEFAULT_MAX_ELEVATION_M,
            map_width_m: DEFAULT_MAP_WIDTH_M,
            map_height_m: DEFAULT_MAP_HEIGHT_M,
            table: None,
            mils: default_mils(),
        }
    }
}

impl CalcConfig {
    /// Parse a TOML config. Missing keys take their defaults.
    pub fn from_toml_str(s: &str) -> Result<Self, String> {
        let cfg: CalcConfig = toml::from_str(s).map_err(|e| e.to_string())?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        let s = fs::read_to_string(path)
            .map_err(|e| format!("reading config {}: {}", path.display(), e))?;
        Self::from_toml_str(&s)
    }

    pub fn validate(&self) -> Result<(), String> {
        if !(self.map_width_m > 0.0 && self.map_height_m > 0.0) {
            return Err("map size must be positive".to_string());
        }
        if self.min_valid_elevation_mils >= self.max_valid_elevation_mils {
            return Err(format!(
                "invalid elevation band: {} >= {}",
                self.min_valid_elevation_mils, self.max_valid_elevation_mils
            ));
        }
        if !self.dz_correction_mils_per_m.is_finite() || !self.max_elevation_m.is_finite() {
            return Err("correction factor and max elevation must be finite".to_string());
        }
        for (faction, mils) in &self.mils {
            if *mils != 6000 && *mils != 6400 {
                return Err(format!(
                    "faction {}: mils per circle must be 6000 or 6400, got {}",
                    faction, mils
                ));
            }
        }
        Ok(())
    }

    /// Mils per full circle for a faction, falling back to 6400.
    pub fn mils_for_faction(&self, faction: &str) -> u32 {
        let key = crate::util::normalize_id(faction);
        self.mils
            .iter()
            .find(|(k, _)| crate::util::normalize_id(k) == key)
            .map(|(_, v)| *v)
            .unwrap_or(DEFAULT_MILS_PER_CIRCLE)
    }
}
