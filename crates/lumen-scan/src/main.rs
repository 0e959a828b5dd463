//! Headless range scan.
//!
//! Builds a scene from a JSON description (or the built-in demo room), runs
//! the ray sensor for a number of frames and prints or exports the last scan.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use lumen_engine::RenderEngineManager;
use lumen_engine::logging::{LoggingConfig, init_logging};

mod report;
mod scene;

use report::ScanReport;
use scene::SceneDesc;

#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Engine {
    /// CPU ray casting
    Raycast,
    /// Hardware rasterisation through wgpu
    Wgpu,
}

impl Engine {
    fn name(self) -> &'static str {
        match self {
            Engine::Raycast => "raycast",
            Engine::Wgpu => "wgpu",
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "lumen-scan", version, about = "Run a simulated range sensor headless")]
struct Cli {
    /// Scene description (JSON); the demo room when omitted
    #[arg(long, value_name = "FILE")]
    scene: Option<PathBuf>,

    /// Render engine
    #[arg(long, value_enum, default_value = "raycast")]
    engine: Engine,

    /// Number of frames to render
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    frames: u32,

    /// Write the last scan as JSON
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Log filter, env_logger syntax
    #[arg(long, env = "LUMEN_LOG")]
    log: Option<String>,

    /// Engine parameter, repeatable (`key=value`)
    #[arg(long = "param", value_name = "KEY=VALUE", value_parser = parse_param)]
    params: Vec<(String, String)>,
}

fn parse_param(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got `{s}`"))?;
    Ok((key.trim().to_owned(), value.trim().to_owned()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LoggingConfig {
        env_filter: cli.log.clone(),
        ..LoggingConfig::default()
    });

    let desc = match &cli.scene {
        Some(path) => SceneDesc::load(path)?,
        None => SceneDesc::demo(),
    };

    let mut params: HashMap<String, String> = cli.params.iter().cloned().collect();
    params.entry("headless".to_owned()).or_insert_with(|| "true".to_owned());

    let mut manager = RenderEngineManager::with_default_plugins();
    let engine_name = cli.engine.name();
    let engine = manager.engine(engine_name, &params)?;

    let scene_id = engine.create_scene("scan")?;
    let scene = engine
        .scene_mut(scene_id)
        .context("scene vanished right after creation")?;
    let mut rays = desc.populate(scene)?;

    let mut total = Duration::ZERO;
    for frame in 0..cli.frames {
        let (scene, backend) = engine.split(scene_id)?;
        rays.update(scene, backend)?;
        total += rays.last_render_duration();
        log::debug!("frame {frame}: {:?}", rays.render_timing());
    }

    let scan = rays
        .laser_scan()
        .context("sensor produced no frame")?;
    let report = ScanReport::new(engine_name, cli.frames, total, &scan);
    print!("{}", report.summary());
    if let Some(path) = &cli.output {
        report.write_json(path)?;
        log::info!("wrote scan to {}", path.display());
    }

    rays.destroy(engine.backend_mut());
    engine.destroy();
    Ok(())
}
