//! Load a map project from a folder or a .zip archive: `map.png` (for its
//! pixel size), `heightmap.png`, and every `*.layer` file.

use crate::config::{MAX_IMAGE_FILE_BYTES, MAX_LAYER_ENTITIES, MAX_LAYER_FILE_BYTES};
use crate::geometry::{CoordError, MapScale};
use crate::heightmap::Heightmap;
use crate::layer::{load_layer_file, parse_layer_bytes, LayerEntity};
use std::fs;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

const MAP_FILE: &str = "map.png";
const HEIGHTMAP_FILE: &str = "heightmap.png";
const LAYER_EXT: &str = "layer";

#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    /// Pixel size of `map.png`, when present.
    pub map_size_px: Option<(u32, u32)>,
    pub heightmap: Option<Heightmap>,
    pub entities: Vec<LayerEntity>,
    /// Layer file names that contributed entities, in load order.
    pub layer_files: Vec<String>,
}

impl Project {
    fn empty(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            map_size_px: None,
            heightmap: None,
            entities: Vec::new(),
            layer_files: Vec::new(),
        }
    }

    /// Map scale for the given real-world size; 1 m/px when there is no map image.
    pub fn scale(&self, width_m: f64, height_m: f64) -> Result<MapScale, CoordError> {
        match self.map_size_px {
            Some((w, h)) => MapScale::new(width_m, height_m, w, h),
            None => MapScale::unscaled(width_m, height_m),
        }
    }

    fn push_entities(&mut self, file: String, mut entities: Vec<LayerEntity>) {
        let room = MAX_LAYER_ENTITIES.saturating_sub(self.entities.len());
        entities.truncate(room);
        self.entities.append(&mut entities);
        self.layer_files.push(file);
    }
}

fn is_layer_name(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(LAYER_EXT))
        .unwrap_or(false)
}

/// Load a project directory or `.zip` archive.
pub fn load_project(path: &Path, max_elevation_m: f64) -> Result<Project, String> {
    if path.is_dir() {
        return load_from_dir(path, max_elevation_m);
    }
    if path.is_file() {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        if ext == "zip" {
            return load_from_zip(path, max_elevation_m);
        }
        return Err(format!(
            "project path is a file but not a .zip: {}",
            path.display()
        ));
    }
    Err(format!("project path does not exist: {}", path.display()))
}

/// Find a file in `dir` by case-insensitive name.
fn find_file(dir: &Path, wanted: &str) -> Result<Option<PathBuf>, String> {
    for e in fs::read_dir(dir).map_err(|e| e.to_string())? {
        let path = e.map_err(|e| e.to_string())?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.eq_ignore_ascii_case(wanted))
            .unwrap_or(false);
        if matches && path.is_file() {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

fn load_from_dir(dir: &Path, max_elevation_m: f64) -> Result<Project, String> {
    let mut project = Project::empty(dir);

    if let Some(map) = find_file(dir, MAP_FILE)? {
        crate::util::check_file_size(&map, MAX_IMAGE_FILE_BYTES)?;
        let dims = image::image_dimensions(&map).map_err(|e| format!("{}: {}", map.display(), e))?;
        tracing::info!("map image {} is {}x{} px", map.display(), dims.0, dims.1);
        project.map_size_px = Some(dims);
    }
    if let Some(hm) = find_file(dir, HEIGHTMAP_FILE)? {
        crate::util::check_file_size(&hm, MAX_IMAGE_FILE_BYTES)?;
        project.heightmap = Some(Heightmap::open(&hm, max_elevation_m)?);
    }

    let mut layers = Vec::new();
    for e in fs::read_dir(dir).map_err(|e| e.to_string())? {
        let path = e.map_err(|e| e.to_string())?.path();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();
        if path.is_file() && is_layer_name(&name) {
            layers.push((name, path));
        }
    }
    layers.sort();
    for (name, path) in layers {
        let entities = load_layer_file(&path)?;
        project.push_entities(name, entities);
    }
    tracing::info!(
        "loaded project {}: {} layer file(s), {} entities",
        dir.display(),
        project.layer_files.len(),
        project.entities.len()
    );
    Ok(project)
}

fn read_entry<R: Read>(entry: R, name: &str, size: u64, max_bytes: usize) -> Result<Vec<u8>, String> {
    if size > max_bytes as u64 {
        return Err(format!(
            "archive entry too large: {} ({} bytes, max {})",
            name, size, max_bytes
        ));
    }
    let mut buf = Vec::with_capacity(size as usize);
    entry
        .take(max_bytes as u64 + 1)
        .read_to_end(&mut buf)
        .map_err(|e| e.to_string())?;
    if buf.len() > max_bytes {
        return Err(format!("archive entry too large: {}", name));
    }
    Ok(buf)
}

fn image_dimensions_from_bytes(bytes: &[u8]) -> Result<(u32, u32), String> {
    image::io::Reader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| e.to_string())?
        .into_dimensions()
        .map_err(|e| e.to_string())
}

fn load_from_zip(zip_path: &Path, max_elevation_m: f64) -> Result<Project, String> {
    let file = fs::File::open(zip_path).map_err(|e| e.to_string())?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| e.to_string())?;
    let mut project = Project::empty(zip_path);
    let mut layers = Vec::new();

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i).map_err(|e| e.to_string())?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let size = entry.size();
        if name.contains("__MACOSX") {
            continue;
        }
        let filename = Path::new(&name)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("")
            .to_string();
        if filename.eq_ignore_ascii_case(MAP_FILE) {
            let buf = read_entry(&mut entry, &name, size, MAX_IMAGE_FILE_BYTES)?;
            project.map_size_px = Some(image_dimensions_from_bytes(&buf)?);
        } else if filename.eq_ignore_ascii_case(HEIGHTMAP_FILE) {
            let buf = read_entry(&mut entry, &name, size, MAX_IMAGE_FILE_BYTES)?;
            project.heightmap = Some(Heightmap::from_bytes(&buf, max_elevation_m)?);
        } else if is_layer_name(&filename) {
            let buf = read_entry(&mut entry, &name, size, MAX_LAYER_FILE_BYTES)?;
            layers.push((filename, buf));
        }
    }

    layers.sort();
    for (name, bytes) in layers {
        let entities = parse_layer_bytes(&bytes);
        project.push_entities(name, entities);
    }
    tracing::info!(
        "loaded project archive {}: {} layer file(s), {} entities",
        zip_path.display(),
        project.layer_files.len(),
        project.entities.len()
    );
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageBuffer, Luma};
    use std::io::Write;

    const LAYER_A: &str = "genericentity : \"x\" {\n name = \"Alpha\"\n coords 100 5 200\n}\n";
    const LAYER_B: &str = "genericentity : \"y\" {\n name = \"Bravo\"\n coords 300 5 400\n}\n";

    fn png_bytes(w: u32, h: u32, v: u8) -> Vec<u8> {
        let img: GrayImage = ImageBuffer::from_pixel(w, h, Luma([v]));
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageLuma8(img)
            .write_to(&mut out, image::ImageOutputFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[test]
    fn loads_directory_project() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("map.png"), png_bytes(64, 32, 0)).unwrap();
        fs::write(dir.path().join("heightmap.png"), png_bytes(8, 8, 255)).unwrap();
        fs::write(dir.path().join("b.layer"), LAYER_B).unwrap();
        fs::write(dir.path().join("a.LAYER"), LAYER_A).unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let p = load_project(dir.path(), 512.0).unwrap();
        assert_eq!(p.map_size_px, Some((64, 32)));
        assert_eq!(p.layer_files, vec!["a.LAYER", "b.layer"]);
        let names: Vec<&str> = p.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Bravo"]);
        let scale = p.scale(6400.0, 3200.0).unwrap();
        assert_eq!(scale.mpp_x(), 100.0);
        let hm = p.heightmap.as_ref().unwrap();
        assert_eq!(hm.elevation_at(crate::geometry::MapPoint::new(1.0, 1.0), &scale), 512.0);
    }

    #[test]
    fn non_utf8_layer_loads_from_directory_and_zip() {
        let mut layer = LAYER_A.replace("Alpha", "Al\u{1}pha").into_bytes();
        let pos = layer.iter().position(|&b| b == 1).unwrap();
        layer[pos] = 0xe9;
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("proj");
        fs::create_dir(&folder).unwrap();
        fs::write(folder.join("world.layer"), &layer).unwrap();
        let from_dir = load_project(&folder, 512.0).unwrap();

        let zip_path = dir.path().join("proj.zip");
        let mut zw = zip::ZipWriter::new(fs::File::create(&zip_path).unwrap());
        zw.start_file("proj/world.layer", zip::write::SimpleFileOptions::default())
            .unwrap();
        zw.write_all(&layer).unwrap();
        zw.finish().unwrap();
        let from_zip = load_project(&zip_path, 512.0).unwrap();

        assert_eq!(from_dir.entities.len(), 1);
        assert_eq!(from_dir.entities, from_zip.entities);
        assert_eq!(from_dir.entities[0].name, "Al\u{fffd}pha");
    }

    #[test]
    fn empty_directory_is_unscaled() {
        let dir = tempfile::tempdir().unwrap();
        let p = load_project(dir.path(), 512.0).unwrap();
        assert!(p.map_size_px.is_none());
        assert!(p.heightmap.is_none());
        assert!(p.entities.is_empty());
        let scale = p.scale(5120.0, 5120.0).unwrap();
        assert_eq!(scale.meters_per_pixel(), 1.0);
    }

    #[test]
    fn loads_zip_project() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("everon.zip");
        let file = fs::File::create(&zip_path).unwrap();
        let mut zw = zip::ZipWriter::new(file);
        let opts = zip::write::SimpleFileOptions::default();
        zw.start_file("everon/map.png", opts).unwrap();
        zw.write_all(&png_bytes(128, 128, 0)).unwrap();
        zw.start_file("everon/heightmap.png", opts).unwrap();
        zw.write_all(&png_bytes(4, 4, 51)).unwrap();
        zw.start_file("everon/world.layer", opts).unwrap();
        zw.write_all(LAYER_A.as_bytes()).unwrap();
        zw.start_file("__MACOSX/everon/._world.layer", opts).unwrap();
        zw.write_all(b"junk").unwrap();
        zw.finish().unwrap();

        let p = load_project(&zip_path, 100.0).unwrap();
        assert_eq!(p.map_size_px, Some((128, 128)));
        assert_eq!(p.entities.len(), 1);
        assert_eq!(p.entities[0].name, "Alpha");
        let scale = p.scale(1280.0, 1280.0).unwrap();
        let hm = p.heightmap.as_ref().unwrap();
        let z = hm.elevation_at(crate::geometry::MapPoint::new(64.0, 64.0), &scale);
        assert!((z - 20.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_other_files_and_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("map.png");
        fs::write(&f, png_bytes(2, 2, 0)).unwrap();
        assert!(load_project(&f, 512.0).is_err());
        assert!(load_project(&dir.path().join("missing"), 512.0).is_err());
    }
}
