use anyhow::{Context, Result, bail};
use env_logger::Builder;
use log::{LevelFilter, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use signal_mapper::common::config::SimulationConfig;
use signal_mapper::common::heatmap::{BuildingMap, DbmRange, RunReport, TransmitterReport, render_grayscale, render_heatmap};
use signal_mapper::common::scene::load_scene;
use signal_mapper::simulation::simulate_batch;

const USAGE: &str = "usage: signal-mapper <scene.json> [output-dir]";

fn main() -> Result<()> {
    // Logging setup
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("signal_mapper"), LevelFilter::Debug)
        .parse_default_env()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (scene_path, output_dir) = match args.as_slice() {
        [scene] => (scene.clone(), PathBuf::from(".")),
        [scene, output] => (scene.clone(), PathBuf::from(output)),
        _ => bail!(USAGE),
    };

    run(&scene_path, &output_dir)
}

fn run(scene_path: &str, output_dir: &Path) -> Result<()> {
    let started = Instant::now();
    info!("Starting up");

    let scene = load_scene(scene_path).with_context(|| format!("Failed to load scene {}", scene_path))?;
    let config_path = SimulationConfig::config_path_from_scene(scene_path);
    let config = SimulationConfig::load_or_default(&config_path)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    info!(
        "Scene {}: {} obstacles, {} transmitters, engine {:?}",
        scene_path,
        scene.obstacles.len(),
        scene.transmitters.len(),
        config.engine
    );

    let space = Arc::new(scene.build_space().context("Failed to discretize scene")?);
    let building = BuildingMap::new(&space);
    let simulation = config
        .build_simulation(space.clone())
        .context("Invalid engine configuration")?;

    let positions: Vec<_> = scene.transmitters.iter().map(|t| t.position).collect();
    let maps = simulate_batch(simulation.as_ref(), &positions);

    fs::create_dir_all(output_dir).with_context(|| format!("Failed to create output directory {}", output_dir.display()))?;

    let receiver = scene.receiver();
    let range = DbmRange {
        min: config.output.min_dbm,
        max: config.output.max_dbm,
    };
    let mut reports = Vec::with_capacity(maps.len());

    for (definition, map) in scene.transmitters.iter().zip(&maps) {
        let transmitter = definition.transmitter();

        if map.covered_cells() == 0 {
            warn!("Transmitter {} did not reach any cell", definition.name);
        }

        let png_path = output_dir.join(format!("{}.png", definition.name));
        render_heatmap(map, &building, &transmitter, &receiver, range)
            .save(&png_path)
            .with_context(|| format!("Failed to write {}", png_path.display()))?;
        info!("Wrote {}", png_path.display());

        if config.output.pgm {
            let pgm_path = output_dir.join(format!("{}.pgm", definition.name));
            render_grayscale(map, &transmitter, &receiver, range)
                .save(&pgm_path)
                .with_context(|| format!("Failed to write {}", pgm_path.display()))?;
            info!("Wrote {}", pgm_path.display());
        }

        reports.push(TransmitterReport::new(&definition.name, definition.position, map, &transmitter, &receiver, range));
    }

    let frame = space.frame();
    let report = RunReport {
        generated_at: chrono::Utc::now(),
        scene: scene_path.to_string(),
        engine: format!("{:?}", config.engine).to_lowercase(),
        grid_width: frame.width(),
        grid_height: frame.height(),
        precision: frame.precision(),
        transmitters: reports,
    };
    let report_path = output_dir.join("report.json");
    let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
    fs::write(&report_path, json).with_context(|| format!("Failed to write {}", report_path.display()))?;

    info!("Finished {} transmitters in {} ms", maps.len(), started.elapsed().as_millis());

    Ok(())
}
