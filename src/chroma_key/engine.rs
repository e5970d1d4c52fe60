//! Pipeline driver.
//!
//! [`ChromaKeyEngine`] runs sampler, matte, refine, unmix and composite in
//! order. Input errors abort the run. Any other failure is logged and the
//! whole image is redone once by [`fallback`](crate::chroma_key::fallback::fallback),
//! which runs in process and cannot fail for a non-empty raster.

use std::any::Any;
use std::io::Cursor;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use tracing::{debug, info, instrument, span, warn, Level};

use crate::chroma_key::backend::{InProcessBackend, RasterBackend};
use crate::chroma_key::composite::{alpha_bounds, composite, Composite};
use crate::chroma_key::fallback::{colorkey, fallback};
use crate::chroma_key::key_color::KeyColor;
use crate::chroma_key::matte::{constrain, ExtractAlpha, MatteBounds, SoftDifference};
use crate::chroma_key::refine::refine;
use crate::chroma_key::sampler::sample_key_color;
use crate::chroma_key::unmix::unmix;
use crate::config::{ChromaKeyConfig, KeyingStrategy};
use crate::error::{ChromaKeyError, Stage};
use crate::utils::validate_non_empty_image;

/// Path that produced a [`KeyedImage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingMode {
    /// Soft matte, refinement, unmix and despill
    Soft,
    /// Single-pass colorkey with despill
    Colorkey,
    /// Hard threshold and erosion after a failed primary run
    Fallback,
}

impl std::fmt::Display for ProcessingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Soft => write!(f, "soft"),
            Self::Colorkey => write!(f, "colorkey"),
            Self::Fallback => write!(f, "fallback"),
        }
    }
}

/// Output of one engine run
#[derive(Debug, Clone)]
pub struct KeyedImage {
    pub image: RgbaImage,
    /// Key color the run used, detected or configured
    pub key_color: KeyColor,
    pub mode: ProcessingMode,
    /// Error that sent the run to the fallback path
    pub fallback_reason: Option<String>,
    /// `false` when the result was fully transparent and left uncropped
    pub trimmed: bool,
}

impl KeyedImage {
    /// `true` when the primary strategy failed and the fallback produced the image
    pub fn is_degraded(&self) -> bool {
        self.mode == ProcessingMode::Fallback
    }

    /// Encodes the image as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, ChromaKeyError> {
        encode_png(&self.image)
    }
}

/// Chroma-key engine over a raster backend
///
/// The engine holds no per-image state; one instance may process any number
/// of images, including concurrently.
#[derive(Debug, Clone)]
pub struct ChromaKeyEngine<B: RasterBackend = InProcessBackend> {
    config: ChromaKeyConfig,
    backend: B,
}

impl ChromaKeyEngine<InProcessBackend> {
    /// Engine using the in-process backend.
    ///
    /// # Errors
    ///
    /// * `ChromaKeyError::InvalidParameter` - When the configuration is invalid
    pub fn new(config: ChromaKeyConfig) -> Result<Self, ChromaKeyError> {
        Self::with_backend(config, InProcessBackend)
    }
}

impl Default for ChromaKeyEngine<InProcessBackend> {
    fn default() -> Self {
        Self {
            config: ChromaKeyConfig::default(),
            backend: InProcessBackend,
        }
    }
}

impl<B: RasterBackend> ChromaKeyEngine<B> {
    /// Engine delegating blur and morphology to `backend`.
    ///
    /// # Errors
    ///
    /// * `ChromaKeyError::InvalidParameter` - When the configuration is invalid
    pub fn with_backend(config: ChromaKeyConfig, backend: B) -> Result<Self, ChromaKeyError> {
        config.validate()?;
        Ok(Self { config, backend })
    }

    pub fn config(&self) -> &ChromaKeyConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Removes the key-colored background of `image`.
    ///
    /// # Errors
    ///
    /// * `ChromaKeyError::EmptyImage` - When the image has no pixels
    ///
    /// Backend and stage failures do not surface here; they downgrade the
    /// result to [`ProcessingMode::Fallback`].
    ///
    /// # Examples
    ///
    /// ```
    /// use chroma_matte::{ChromaKeyEngine, KeyColor, ProcessingMode};
    /// use image::{DynamicImage, Rgb, RgbImage};
    ///
    /// # fn example() -> Result<(), chroma_matte::ChromaKeyError> {
    /// let render = RgbImage::from_fn(64, 64, |x, y| {
    ///     if (16..48).contains(&x) && (16..48).contains(&y) {
    ///         Rgb([0, 0, 255])
    ///     } else {
    ///         Rgb([0, 255, 0])
    ///     }
    /// });
    ///
    /// let keyed = ChromaKeyEngine::default().remove_background(&DynamicImage::ImageRgb8(render))?;
    /// assert_eq!(keyed.mode, ProcessingMode::Soft);
    /// assert_eq!(keyed.key_color, KeyColor::GREEN);
    /// assert_eq!(keyed.image.dimensions(), (32, 32));
    /// # Ok(())
    /// # }
    /// # example().unwrap();
    /// ```
    #[instrument(
        skip_all,
        fields(
            strategy = %self.config.strategy,
            backend = self.backend.name(),
            dimensions = %format!("{}x{}", image.width(), image.height())
        )
    )]
    pub fn remove_background(&self, image: &DynamicImage) -> Result<KeyedImage, ChromaKeyError> {
        validate_non_empty_image(image.width(), image.height())?;
        let rgb = image.to_rgb8();
        let key = self.resolve_key(&rgb);

        let primary = match self.config.strategy {
            KeyingStrategy::Soft => guard(Stage::Composite, || self.soft_pipeline(&rgb, key))
                .map(|result| (result, ProcessingMode::Soft)),
            KeyingStrategy::Colorkey => guard(Stage::Matte, || {
                colorkey(&rgb, key, self.config.colorkey, self.config.tolerance)
            })
            .map(|result| (result, ProcessingMode::Colorkey)),
        };

        match primary {
            Ok((Composite { image, bounds }, mode)) => {
                info!(%key, %mode, width = image.width(), height = image.height(), "background removed");
                Ok(KeyedImage {
                    image,
                    key_color: key,
                    mode,
                    fallback_reason: None,
                    trimmed: bounds.is_some(),
                })
            }
            Err(e) if e.is_input_error() => Err(e),
            Err(e) => {
                warn!(error = %e, "primary keying failed, downgrading to fallback");
                let image = fallback(&rgb, key, self.config.tolerance);
                let trimmed = alpha_bounds(&image).is_some();
                Ok(KeyedImage {
                    image,
                    key_color: key,
                    mode: ProcessingMode::Fallback,
                    fallback_reason: Some(e.to_string()),
                    trimmed,
                })
            }
        }
    }

    /// Key color for `rgb`: detected from the corner when enabled, otherwise
    /// the configured color.
    pub fn resolve_key(&self, rgb: &RgbImage) -> KeyColor {
        let default = self.config.default_key();
        if self.config.detect_key {
            sample_key_color(rgb, &self.config.sampler, default)
        } else {
            default
        }
    }

    fn soft_pipeline(&self, rgb: &RgbImage, key: KeyColor) -> Result<Composite, ChromaKeyError> {
        let config = &self.config;

        let raw = {
            let _span = span!(Level::DEBUG, "matte").entered();
            let builder = SoftDifference::new(config.soft_matte, config.tolerance, &self.backend);
            guard(Stage::Matte, || builder.extract_alpha(rgb, key))?
        };

        let refined = {
            let _span = span!(Level::DEBUG, "refine").entered();
            let refined = guard(Stage::Refine, || refine(&raw, &config.refine, &self.backend))?;
            let bounds = MatteBounds::from_source(rgb, key, config.tolerance);
            constrain(&refined, &bounds)?
        };
        drop(raw);

        let foreground = {
            let _span = span!(Level::DEBUG, "unmix").entered();
            guard(Stage::Unmix, || unmix(rgb, &refined, key, &config.unmix))?
        };

        let _span = span!(Level::DEBUG, "composite").entered();
        guard(Stage::Composite, || composite(&foreground, &refined))
    }

    /// Decodes `input`, removes its background and writes an RGBA PNG to `output`.
    ///
    /// # Errors
    ///
    /// * `ChromaKeyError::Io` / `Decode` / `EmptyImage` - When the input is unusable
    /// * `ChromaKeyError::Io` / `Encode` - When the output cannot be written
    #[instrument(skip_all, fields(input = %input.as_ref().display()))]
    pub fn process_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        output: Q,
    ) -> Result<KeyedImage, ChromaKeyError> {
        let image = load_image(input)?;
        let keyed = self.remove_background(&image)?;
        save_png(&keyed.image, output)?;
        Ok(keyed)
    }

    /// Runs every image independently, in parallel with the `rayon` feature.
    pub fn process_batch(&self, images: &[DynamicImage]) -> Vec<Result<KeyedImage, ChromaKeyError>> {
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            images
                .par_iter()
                .map(|image| self.remove_background(image))
                .collect()
        }
        #[cfg(not(feature = "rayon"))]
        {
            images
                .iter()
                .map(|image| self.remove_background(image))
                .collect()
        }
    }
}

/// Runs a stage, turning a panic inside it into a [`ChromaKeyError::Stage`].
fn guard<T>(
    stage: Stage,
    f: impl FnOnce() -> Result<T, ChromaKeyError>,
) -> Result<T, ChromaKeyError> {
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|payload| {
        Err(ChromaKeyError::Stage {
            stage,
            reason: panic_message(payload.as_ref()),
        })
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "stage panicked".to_string())
}

/// Reads and decodes a raster, guessing the format from its content.
///
/// # Errors
///
/// * `ChromaKeyError::Io` - When the file cannot be read
/// * `ChromaKeyError::Decode` - When the bytes are not a supported raster
/// * `ChromaKeyError::EmptyImage` - When the raster has no pixels
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage, ChromaKeyError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| ChromaKeyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let image = image::load_from_memory(&bytes).map_err(ChromaKeyError::Decode)?;
    validate_non_empty_image(image.width(), image.height())?;
    debug!(path = %path.display(), width = image.width(), height = image.height(), "image loaded");
    Ok(image)
}

/// Encodes an RGBA raster as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, ChromaKeyError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(ChromaKeyError::Encode)?;
    Ok(buffer.into_inner())
}

/// Writes an RGBA raster to `path` as PNG regardless of its extension.
pub fn save_png<P: AsRef<Path>>(image: &RgbaImage, path: P) -> Result<(), ChromaKeyError> {
    let path = path.as_ref();
    let bytes = encode_png(image)?;
    std::fs::write(path, bytes).map_err(|source| ChromaKeyError::Io {
        path: path.to_path_buf(),
        source,
    })
}
