//! Mortar firing-solution calculator CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};
use mortar_calc::config::CalcConfig;
use mortar_calc::geometry::{
    parse_grid_coords, parse_pixel_point, AngularUnit, MapPoint, MapScale,
};
use mortar_calc::heightmap::Heightmap;
use mortar_calc::layer::{find_entity, load_layer_file, LayerEntity};
use mortar_calc::mission::{compute_mission, MissionContext};
use mortar_calc::project::{load_project, Project};
use mortar_calc::report::{
    render_coverage, render_issues, render_json, render_text, write_json_report,
    write_text_report,
};
use mortar_calc::solver::SolverParams;
use mortar_calc::table::{
    builtin_table, load_table_file, BallisticTable, LoadReport, RingTable, TableDefaults,
};
use mortar_calc::util::init_logging;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mortar-calc")]
#[command(about = "Mortar firing-solution calculator (ballistic tables, charge rings, map geometry)")]
struct Cli {
    #[arg(short, long, global = true)]
    verbose: bool,

    #[arg(long, global = true, value_name = "TOML")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct TableArgs {
    #[arg(long, value_name = "CSV", help = "Ballistic table file; built-in HE table when omitted")]
    table: Option<PathBuf>,
    #[arg(long)]
    faction: Option<String>,
    #[arg(long)]
    shell: Option<String>,
}

#[derive(Args)]
struct MapArgs {
    #[arg(
        long,
        value_name = "PATH",
        help = "Project folder or .zip with map.png, heightmap.png and *.layer files"
    )]
    project: Option<PathBuf>,
    #[arg(long)]
    map_width_m: Option<f64>,
    #[arg(long)]
    map_height_m: Option<f64>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a firing solution from mortar to target.
    Solve {
        #[command(flatten)]
        table: TableArgs,
        #[command(flatten)]
        map: MapArgs,
        #[arg(long, value_name = "PNG", help = "Grayscale heightmap; overrides the project's")]
        heightmap: Option<PathBuf>,
        #[arg(long, value_name = "X Z", help = "Mortar grid position in meters, e.g. \"02480 03659\"")]
        mortar: Option<String>,
        #[arg(long, value_name = "x,y")]
        mortar_px: Option<String>,
        #[arg(long, value_name = "X Z")]
        target: Option<String>,
        #[arg(long, value_name = "x,y")]
        target_px: Option<String>,
        #[arg(long, value_name = "NAME", help = "Target a named entity from the project's layer files")]
        target_entity: Option<String>,
        #[arg(long, help = "Mils per circle (6000 or 6400); defaults to the faction's")]
        mils: Option<u32>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
    },
    /// Print per-ring coverage of a ballistic table.
    Table {
        #[command(flatten)]
        table: TableArgs,
        #[arg(long, help = "Fail when the loader dropped any rows")]
        strict: bool,
    },
    /// List point entities from layer files or a project with their map positions.
    Layer {
        #[arg(value_name = "LAYER")]
        files: Vec<PathBuf>,
        #[command(flatten)]
        map: MapArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

fn main() -> Result<(), String> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let cfg = match &cli.config {
        Some(path) => CalcConfig::load(path)?,
        None => CalcConfig::default(),
    };

    match cli.command {
        Commands::Solve {
            table,
            map,
            heightmap,
            mortar,
            mortar_px,
            target,
            target_px,
            target_entity,
            mils,
            format,
            out,
        } => {
            let cfg = apply_overrides(cfg, Some(&table), Some(&map))?;
            let points = PointArgs {
                mortar,
                mortar_px,
                target,
                target_px,
                target_entity,
            };
            run_solve(&cfg, &map, heightmap, points, mils, format, out)
        }
        Commands::Table { table, strict } => {
            let cfg = apply_overrides(cfg, Some(&table), None)?;
            run_table(&cfg, table.faction.is_some() || table.shell.is_some(), strict)
        }
        Commands::Layer { files, map, format } => {
            let cfg = apply_overrides(cfg, None, Some(&map))?;
            run_layer(&cfg, &map, &files, format)
        }
    }
}

/// CLI flags win over the config file.
fn apply_overrides(
    mut cfg: CalcConfig,
    table: Option<&TableArgs>,
    map: Option<&MapArgs>,
) -> Result<CalcConfig, String> {
    if let Some(t) = table {
        if let Some(path) = &t.table {
            cfg.table = Some(path.clone());
        }
        if let Some(f) = &t.faction {
            cfg.faction = f.clone();
        }
        if let Some(s) = &t.shell {
            cfg.shell = s.clone();
        }
    }
    if let Some(m) = map {
        if let Some(w) = m.map_width_m {
            cfg.map_width_m = w;
        }
        if let Some(h) = m.map_height_m {
            cfg.map_height_m = h;
        }
    }
    cfg.validate()?;
    Ok(cfg)
}

fn load_tables(cfg: &CalcConfig) -> Result<LoadReport, String> {
    let report = match &cfg.table {
        Some(path) => load_table_file(path, &TableDefaults::new(&cfg.faction, &cfg.shell))
            .map_err(|e| e.to_string())?,
        None => builtin_table(),
    };
    if !report.issues.is_empty() {
        tracing::warn!("table loader dropped {} row(s)", report.issues.len());
    }
    Ok(report)
}

/// Names the configured faction/shell and what the table does cover,
/// e.g. `ussr (he), us (he, smoke)`.
fn missing_table(cfg: &CalcConfig, table: &BallisticTable) -> String {
    let available: Vec<String> = table
        .factions()
        .map(|f| format!("{} ({})", f, table.shells(f).join(", ")))
        .collect();
    format!(
        "no table for faction {:?} shell {:?}; available: {}",
        cfg.faction,
        cfg.shell,
        available.join(", ")
    )
}

/// Project (if any) and the map scale it implies.
fn load_map(cfg: &CalcConfig, map: &MapArgs) -> Result<(Option<Project>, MapScale), String> {
    let project = map
        .project
        .as_deref()
        .map(|p| load_project(p, cfg.max_elevation_m))
        .transpose()?;
    let scale = match &project {
        Some(p) => p.scale(cfg.map_width_m, cfg.map_height_m),
        None => MapScale::unscaled(cfg.map_width_m, cfg.map_height_m),
    }
    .map_err(|e| e.to_string())?;
    tracing::debug!(
        "map scale {}x{} m over {}x{} px ({:.3} m/px)",
        scale.width_m,
        scale.height_m,
        scale.width_px,
        scale.height_px,
        scale.meters_per_pixel()
    );
    Ok((project, scale))
}

struct PointArgs {
    mortar: Option<String>,
    mortar_px: Option<String>,
    target: Option<String>,
    target_px: Option<String>,
    target_entity: Option<String>,
}

/// Exactly one of grid, pixel or entity must be given for each point.
fn resolve_point(
    label: &str,
    grid: Option<&str>,
    px: Option<&str>,
    entity: Option<&str>,
    scale: &MapScale,
    entities: &[LayerEntity],
) -> Result<MapPoint, String> {
    match (grid, px, entity) {
        (Some(g), None, None) => {
            let (x, z) = parse_grid_coords(g).map_err(|e| format!("{}: {}", label, e))?;
            scale
                .grid_to_pixel(x, z)
                .map_err(|e| format!("{}: {}", label, e))
        }
        (None, Some(p), None) => parse_pixel_point(p).map_err(|e| format!("{}: {}", label, e)),
        (None, None, Some(name)) => find_entity(entities, name)
            .map(|e| e.to_pixel(scale))
            .ok_or_else(|| format!("{}: no entity named {:?}", label, name)),
        (None, None, None) => Err(format!("{} position is required", label)),
        _ => Err(format!("give only one {} position", label)),
    }
}

fn run_solve(
    cfg: &CalcConfig,
    map: &MapArgs,
    heightmap: Option<PathBuf>,
    points: PointArgs,
    mils: Option<u32>,
    format: OutputFormat,
    out: Option<PathBuf>,
) -> Result<(), String> {
    let tables = load_tables(cfg)?;
    let ring_table = tables
        .table
        .get(&cfg.faction, &cfg.shell)
        .ok_or_else(|| missing_table(cfg, &tables.table))?;

    let per_circle = mils.unwrap_or_else(|| cfg.mils_for_faction(&cfg.faction));
    let unit = AngularUnit::from_mils(per_circle)
        .ok_or_else(|| format!("mils per circle must be 6000 or 6400, got {}", per_circle))?;

    let (project, scale) = load_map(cfg, map)?;
    let standalone = heightmap
        .as_deref()
        .map(|p| Heightmap::open(p, cfg.max_elevation_m))
        .transpose()?;
    let heightmap = standalone
        .as_ref()
        .or_else(|| project.as_ref().and_then(|p| p.heightmap.as_ref()));
    if heightmap.is_none() {
        tracing::info!("no heightmap loaded; assuming flat terrain");
    }
    let entities = project.as_ref().map(|p| p.entities.as_slice()).unwrap_or(&[]);

    let mortar = resolve_point(
        "mortar",
        points.mortar.as_deref(),
        points.mortar_px.as_deref(),
        None,
        &scale,
        entities,
    )?;
    let target = resolve_point(
        "target",
        points.target.as_deref(),
        points.target_px.as_deref(),
        points.target_entity.as_deref(),
        &scale,
        entities,
    )?;

    let ctx = MissionContext {
        faction: &cfg.faction,
        shell: &cfg.shell,
        table: ring_table,
        scale,
        heightmap,
        unit,
        params: SolverParams::from_config(cfg),
    };
    let mission = compute_mission(&ctx, mortar, target);

    match (out, format) {
        (Some(path), OutputFormat::Json) => {
            write_json_report(&mission, &path)?;
            tracing::info!("wrote {}", path.display());
        }
        (Some(path), OutputFormat::Text) => {
            write_text_report(&mission, &path)?;
            tracing::info!("wrote {}", path.display());
        }
        (None, OutputFormat::Json) => println!("{}", render_json(&mission)?),
        (None, OutputFormat::Text) => print!("{}", render_text(&mission)),
    }
    Ok(())
}

/// With no faction/shell flags every table in the source is listed.
fn run_table(cfg: &CalcConfig, filtered: bool, strict: bool) -> Result<(), String> {
    let tables = load_tables(cfg)?;
    let selected: Vec<(&str, &str, &RingTable)> = if filtered {
        tables
            .table
            .get(&cfg.faction, &cfg.shell)
            .map(|rt| vec![(cfg.faction.as_str(), cfg.shell.as_str(), rt)])
            .unwrap_or_default()
    } else {
        tables.table.entries().collect()
    };
    if selected.is_empty() {
        return Err(missing_table(cfg, &tables.table));
    }
    for (i, (faction, shell, ring_table)) in selected.iter().enumerate() {
        if i > 0 {
            println!();
        }
        print!("{}", render_coverage(faction, shell, ring_table));
    }
    let issues = render_issues(&tables.issues);
    if !issues.is_empty() {
        println!();
        print!("{}", issues);
        if strict {
            return Err(format!("table has {} issue(s)", tables.issues.len()));
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct EntityRow<'a> {
    name: &'a str,
    x_m: f64,
    z_m: f64,
    pixel: MapPoint,
}

fn run_layer(
    cfg: &CalcConfig,
    map: &MapArgs,
    files: &[PathBuf],
    format: OutputFormat,
) -> Result<(), String> {
    if files.is_empty() && map.project.is_none() {
        return Err("give one or more .layer files or --project".to_string());
    }
    let (project, scale) = load_map(cfg, map)?;
    let mut entities: Vec<LayerEntity> = project.map(|p| p.entities).unwrap_or_default();
    for f in files {
        entities.extend(load_layer_file(f)?);
    }
    let rows: Vec<EntityRow> = entities
        .iter()
        .map(|e| EntityRow {
            name: &e.name,
            x_m: e.x_m(),
            z_m: e.z_m(),
            pixel: e.to_pixel(&scale),
        })
        .collect();
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&rows).map_err(|e| e.to_string())?;
            println!("{}", json);
        }
        OutputFormat::Text => {
            for r in &rows {
                println!(
                    "{}\tX={:.0} Z={:.0}\tpx {:.0},{:.0}",
                    r.name, r.x_m, r.z_m, r.pixel.x, r.pixel.y
                );
            }
            tracing::info!("{} entities", rows.len());
        }
    }
    Ok(())
}
