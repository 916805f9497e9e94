//! Scanner for world-editor `.layer` files. Does not parse the full format;
//! it picks up point entities (a `coords` line inside an entity block) and
//! their `name = "..."` property.

use crate::config::{MAX_LAYER_ENTITIES, MAX_LAYER_FILE_BYTES};
use crate::geometry::{MapPoint, MapScale};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Points closer than this to the origin on every axis are placeholders.
const ZERO_EPS: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerEntity {
    pub name: String,
    /// World position (X, Y height, Z) in meters.
    pub coords: [f64; 3],
}

impl LayerEntity {
    pub fn x_m(&self) -> f64 {
        self.coords[0]
    }

    pub fn z_m(&self) -> f64 {
        self.coords[2]
    }

    pub fn to_pixel(&self, scale: &MapScale) -> MapPoint {
        scale.world_to_pixel(self.x_m(), self.z_m())
    }
}

/// Leading identifier of a line (`[A-Za-z0-9_]+`, Unicode letters allowed).
fn leading_word(line: &str) -> &str {
    let end = line
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(line.len());
    &line[..end]
}

/// Entity blocks open with a class name like `genericentity` or
/// `spawnpointentity`: an identifier containing `entity` after its first char.
fn opens_entity_block(line: &str) -> bool {
    let word = leading_word(line);
    let mut chars = word.char_indices();
    match chars.nth(1) {
        Some((i, _)) => word[i..].contains("entity"),
        None => false,
    }
}

/// Value of a `name = "..."` property anywhere on the line.
fn name_property(line: &str) -> Option<&str> {
    let mut search = line;
    while let Some(pos) = search.find("name") {
        let after = search[pos + 4..].trim_start();
        if let Some(rest) = after.strip_prefix('=') {
            let rest = rest.trim_start();
            if let Some(quoted) = rest.strip_prefix('"') {
                if let Some(close) = quoted.find('"') {
                    if close > 0 {
                        return Some(&quoted[..close]);
                    }
                }
            }
        }
        search = &search[pos + 4..];
    }
    None
}

fn is_number_token(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '.' | 'e' | 'E'))
}

/// Three numbers following `coords` on the line. `None` when the keyword is
/// absent or the tokens do not parse.
fn coords_property(line: &str) -> Option<[f64; 3]> {
    let mut search = line;
    while let Some(pos) = search.find("coords") {
        let rest = &search[pos + 6..];
        if rest.starts_with(char::is_whitespace) {
            let tokens: Vec<&str> = rest.split_whitespace().take(3).collect();
            if tokens.len() == 3 && tokens.iter().all(|t| is_number_token(t)) {
                let mut out = [0.0; 3];
                for (slot, tok) in out.iter_mut().zip(&tokens) {
                    *slot = tok.parse().ok()?;
                }
                return Some(out);
            }
        }
        search = rest;
    }
    None
}

fn is_zero_point(p: &[f64; 3]) -> bool {
    p.iter().all(|v| v.abs() < ZERO_EPS)
}

/// Scan layer text for point entities, in file order.
pub fn parse_layer_str(content: &str) -> Vec<LayerEntity> {
    let mut entities = Vec::new();
    let mut in_block = false;
    let mut current_name = String::new();
    for raw in content.lines() {
        let line = raw.trim();
        if opens_entity_block(line) {
            in_block = true;
            current_name.clear();
        }
        if !in_block {
            continue;
        }
        if let Some(name) = name_property(line) {
            current_name = name.trim().to_string();
        }
        if line.contains("coords") {
            let Some(coords) = coords_property(line) else {
                continue;
            };
            if !is_zero_point(&coords) {
                let name = if current_name.is_empty() {
                    "unnamed".to_string()
                } else {
                    current_name.clone()
                };
                entities.push(LayerEntity { name, coords });
                if entities.len() >= MAX_LAYER_ENTITIES {
                    break;
                }
            }
            in_block = false;
        }
    }
    entities
}

/// Scan raw layer bytes. Editors sometimes write Latin-1 names, so invalid
/// UTF-8 is replaced rather than rejected.
pub fn parse_layer_bytes(bytes: &[u8]) -> Vec<LayerEntity> {
    parse_layer_str(&String::from_utf8_lossy(bytes))
}

pub fn load_layer_file(path: &Path) -> Result<Vec<LayerEntity>, String> {
    crate::util::check_file_size(path, MAX_LAYER_FILE_BYTES)?;
    let bytes = fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    let entities = parse_layer_bytes(&bytes);
    tracing::debug!(
        "parsed {} point entities from {}",
        entities.len(),
        path.display()
    );
    Ok(entities)
}

/// Case-insensitive lookup by entity name; first match wins.
pub fn find_entity<'a>(entities: &'a [LayerEntity], name: &str) -> Option<&'a LayerEntity> {
    let key = crate::util::normalize_id(name);
    entities
        .iter()
        .find(|e| crate::util::normalize_id(&e.name) == key)
}
