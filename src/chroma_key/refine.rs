use tracing::debug;

use crate::chroma_key::backend::{Morphology, RasterBackend};
use crate::chroma_key::Matte;
use crate::config::RefineConfig;
use crate::error::{ChromaKeyError, Stage};

/// Cleans a raw matte: closing, opening, then a light feather.
///
/// Closing with the diamond fills pinholes in the foreground, opening removes
/// isolated specks, and the feather anti-aliases the transition band. Pixels
/// further than the element radius plus the feather reach from a boundary
/// keep their value.
pub fn refine<B: RasterBackend + ?Sized>(
    matte: &Matte,
    config: &RefineConfig,
    backend: &B,
) -> Result<Matte, ChromaKeyError> {
    let to_error = ChromaKeyError::backend(Stage::Refine);
    let radius = config.radius;

    let closed = backend
        .morphology(matte, Morphology::Close(radius))
        .map_err(to_error)?;
    let opened = backend
        .morphology(&closed, Morphology::Open(radius))
        .map_err(to_error)?;
    let feathered = backend
        .gaussian_blur(&opened, config.feather_sigma)
        .map_err(to_error)?;

    debug!(
        backend = backend.name(),
        radius,
        feather = config.feather_sigma,
        "matte refined"
    );
    Ok(feathered)
}
