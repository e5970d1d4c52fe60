mod chroma_key;
mod config;
mod error;
mod utils;

#[cfg(test)]
mod test_utils;

use image::{ImageBuffer, Pixel};

pub use chroma_key::backend::{dilate, erode, InProcessBackend, MagickBackend, Morphology, RasterBackend};
pub use chroma_key::composite::{alpha_bounds, composite, trim, ApplyAlphaMask, BoundingBox, Composite};
pub use chroma_key::engine::{
    encode_png, load_image, save_png, ChromaKeyEngine, KeyedImage, ProcessingMode,
};
pub use chroma_key::fallback::{binary_matte, colorkey, fallback, FALLBACK_EROSION_RADIUS};
pub use chroma_key::key_color::{Channel, KeyColor};
pub use chroma_key::matte::{
    constrain, minimum_alpha, ExtractAlpha, HardThreshold, MatteBounds, SoftDifference,
};
pub use chroma_key::refine::refine;
pub use chroma_key::sampler::sample_key_color;
pub use chroma_key::unmix::{despill_pixel, unmix, unmix_channel, unmix_pixel, Despill};
pub use chroma_key::Matte;
pub use config::{
    ChromaKeyConfig, ColorkeyConfig, KeyingStrategy, RefineConfig, SamplerConfig,
    SoftMatteConfig, UnmixConfig,
};
pub use error::{BackendError, ChromaKeyError, KeyColorError, Stage};

pub type Image<P> = ImageBuffer<P, Vec<<P as Pixel>::Subpixel>>;
