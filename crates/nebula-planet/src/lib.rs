//! Planet orchestration: chunk grid partition, the whole-planet generation
//! pass, prop placement, and the background generation pool.

pub mod async_generation;
pub mod generator;
pub mod grid;
pub mod props;

pub use async_generation::{AsyncPlanetGenerator, GenerationStatus, PlanetResult, PlanetTask};
pub use generator::{
    ChunkMeshConsumer, GeneratedChunk, GeneratedPlanet, PlanetError, PlanetGenerator,
};
pub use grid::{chunk_centre, chunk_grid};
pub use props::{PropPlacement, PropSettings, place_props};
