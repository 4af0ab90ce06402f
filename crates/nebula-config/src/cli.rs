//! Command-line argument parsing for Nebula terrain generation.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Nebula command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "nebula", about = "Nebula planet terrain generator")]
pub struct CliArgs {
    /// World name.
    #[arg(long)]
    pub world: Option<String>,

    /// Terrain edge length in world units.
    #[arg(long)]
    pub terrain_size: Option<f32>,

    /// Chunks per axis.
    #[arg(long)]
    pub chunks: Option<u32>,

    /// Density samples per chunk edge.
    #[arg(long)]
    pub points_per_axis: Option<u32>,

    /// Surface threshold.
    #[arg(long)]
    pub iso_level: Option<f32>,

    /// Overall scale of the surface noise.
    #[arg(long)]
    pub noise_scale: Option<f32>,

    /// Scale of the surface noise height.
    #[arg(long)]
    pub noise_height_multiplier: Option<f32>,

    /// Noise octaves composited into the surface.
    #[arg(long)]
    pub octaves: Option<u32>,

    /// Use flat shading.
    #[arg(long)]
    pub flat_shading: Option<bool>,

    /// Noise seed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Worker thread count (0 = auto).
    #[arg(long)]
    pub threads: Option<usize>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref world) = args.world {
            self.planet.world_name = world.clone();
        }
        if let Some(size) = args.terrain_size {
            self.planet.terrain_size = size;
        }
        if let Some(chunks) = args.chunks {
            self.planet.num_chunks_per_axis = chunks;
        }
        if let Some(points) = args.points_per_axis {
            self.planet.points_per_axis = points;
        }
        if let Some(iso) = args.iso_level {
            self.planet.iso_level = iso;
        }
        if let Some(scale) = args.noise_scale {
            self.planet.noise_scale = scale;
        }
        if let Some(multiplier) = args.noise_height_multiplier {
            self.planet.noise_height_multiplier = multiplier;
        }
        if let Some(octaves) = args.octaves {
            self.planet.octaves = octaves;
        }
        if let Some(flat) = args.flat_shading {
            self.planet.flat_shading = flat;
        }
        if let Some(seed) = args.seed {
            self.planet.seed = seed;
        }
        if let Some(threads) = args.threads {
            self.generation.worker_threads = threads;
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
    }
}
