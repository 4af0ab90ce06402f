//! Demo binary that generates one planet in the background and reports on it.
//!
//! Configuration is loaded from `config.ron` and can be overridden via CLI flags.
//! Run with `cargo run -p nebula-demo -- --chunks 6 --flat-shading true`.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use nebula_config::{CliArgs, Config, ConfigError, ConfigOrigin};
use nebula_mesh::{ChunkMesh, Shading};
use nebula_planet::{
    AsyncPlanetGenerator, ChunkMeshConsumer, GeneratedPlanet, GenerationStatus, PlanetTask,
    PropSettings,
};
use nebula_terrain::{ChunkAttributes, PlanetAttributes, PlanetNoiseDensity};
use tracing::{debug, error, info, warn};

/// Stand-in for the renderer and collider builder.
#[derive(Default)]
struct MeshSink {
    meshes: usize,
    colliders: usize,
}

impl ChunkMeshConsumer for MeshSink {
    fn consume(&mut self, chunk: &ChunkAttributes, mesh: &ChunkMesh) {
        self.meshes += 1;
        if let Some((min, max)) = mesh.bounds() {
            self.colliders += 1;
            debug!("Chunk {} collider bounds {min} .. {max}", chunk.id);
        }
    }
}

fn report(planet: &GeneratedPlanet) {
    let mut sink = MeshSink::default();
    planet.hand_off(&mut sink);

    info!(
        "Planet ready: {} chunks ({} empty), {} vertices, {} triangles, {} props",
        planet.chunks.len(),
        planet.empty_chunk_count(),
        planet.vertex_count(),
        planet.triangle_count(),
        planet.props.len()
    );
    info!(
        "Handed {} meshes to the renderer and {} to the collider builder",
        sink.meshes, sink.colliders
    );
}

/// Load `config.ron`, falling back to defaults. The outcome is returned so it
/// can be logged once the subscriber is installed.
fn load_config(config_dir: &Path) -> (Config, Result<ConfigOrigin, ConfigError>) {
    match Config::load_or_create_with_origin(config_dir) {
        Ok((config, origin)) => (config, Ok(origin)),
        Err(e) => (Config::default(), Err(e)),
    }
}

fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config_dir = args.config.clone().unwrap_or_else(Config::default_dir);

    // Load or create config, then apply CLI overrides
    let (mut config, origin) = load_config(&config_dir);
    config.apply_cli_overrides(&args);

    let log_dir = config_dir.join("logs");
    nebula_log::init_logging(Some(&log_dir), cfg!(debug_assertions), Some(&config));
    match origin {
        Ok(origin) => info!("{origin}"),
        Err(e) => warn!("Failed to load config: {e}, using defaults"),
    }

    let planet = &config.planet;
    info!(
        "Generating world '{}': {} chunks per axis, {} points per axis",
        planet.world_name, planet.num_chunks_per_axis, planet.points_per_axis
    );

    let task = PlanetTask {
        name: planet.world_name.clone(),
        attributes: PlanetAttributes::from(planet),
        shading: Shading::from(planet.flat_shading),
        props: PropSettings::from_config(&config.props, planet.seed),
        source: Arc::new(PlanetNoiseDensity {
            seed: planet.seed,
            octaves: planet.octaves,
        }),
    };
    let name = task.name.clone();

    let generator = AsyncPlanetGenerator::from_config(&config.generation);
    if let Err(task) = generator.submit(task) {
        error!("Generation queue rejected planet '{}'", task.name);
        return ExitCode::FAILURE;
    }

    // Scene-readiness gate: wait until the planet leaves the queue.
    while matches!(
        generator.status(&name),
        Some(GenerationStatus::Queued | GenerationStatus::Running)
    ) {
        std::thread::sleep(Duration::from_millis(10));
    }

    let mut code = ExitCode::FAILURE;
    for result in generator.drain_results() {
        match result.outcome {
            Ok(planet) => {
                info!(
                    "Planet '{}' generated in {:.2} ms",
                    result.name,
                    result.generation_time_us as f64 / 1000.0
                );
                report(&planet);
                code = ExitCode::SUCCESS;
            }
            Err(err) => error!("Planet '{}' failed: {err}", result.name),
        }
    }
    code
}
