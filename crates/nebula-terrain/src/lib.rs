//! Planet terrain inputs: planet/chunk attributes, the scalar density field
//! sampled by the marcher, and the producers that fill it.

mod attributes;
mod density;
mod fbm;
mod source;

pub use attributes::{AttributeError, ChunkAttributes, PlanetAttributes};
pub use density::{DensityError, DensityField};
pub use fbm::{FbmParams, FbmSampler};
pub use source::{DensitySource, PlanetNoiseDensity, SphereDensity};
