//! Raster backends for the numeric matte operations.
//!
//! The pipeline never filters a matte directly; it asks a [`RasterBackend`]
//! to blur or to apply morphology. [`InProcessBackend`] does the work with
//! `imageproc`, [`MagickBackend`] shells out to ImageMagick through a
//! temporary directory that is removed when the call returns.

use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;

use image::{ImageBuffer, ImageFormat, Luma};
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology::{
    grayscale_close, grayscale_dilate, grayscale_erode, grayscale_open, Mask,
};
use tracing::{debug, trace};

use crate::chroma_key::Matte;
use crate::error::BackendError;
use crate::utils::round_to_u8;

/// Grayscale morphology with a diamond (L1 ball) structuring element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Morphology {
    /// Minimum over the diamond
    Erode(u8),
    /// Maximum over the diamond
    Dilate(u8),
    /// Dilate then erode: fills holes smaller than the element
    Close(u8),
    /// Erode then dilate: removes specks smaller than the element
    Open(u8),
}

impl Morphology {
    pub fn radius(self) -> u8 {
        match self {
            Self::Erode(r) | Self::Dilate(r) | Self::Close(r) | Self::Open(r) => r,
        }
    }

    /// ImageMagick `-morphology` method name
    fn magick_method(self) -> &'static str {
        match self {
            Self::Erode(_) => "Erode",
            Self::Dilate(_) => "Dilate",
            Self::Close(_) => "Close",
            Self::Open(_) => "Open",
        }
    }
}

/// Capability required from whatever executes the matte arithmetic
pub trait RasterBackend: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Gaussian blur; `sigma <= 0` returns the matte unchanged
    fn gaussian_blur(&self, matte: &Matte, sigma: f32) -> Result<Matte, BackendError>;

    /// Grayscale morphology with a diamond structuring element
    fn morphology(&self, matte: &Matte, op: Morphology) -> Result<Matte, BackendError>;
}

/// Backend running everything in the current process
#[derive(Debug, Clone, Copy, Default)]
pub struct InProcessBackend;

impl RasterBackend for InProcessBackend {
    fn name(&self) -> &str {
        "in-process"
    }

    fn gaussian_blur(&self, matte: &Matte, sigma: f32) -> Result<Matte, BackendError> {
        if !sigma.is_finite() {
            return Err(BackendError::InvalidParameter(format!(
                "blur sigma must be finite, got {sigma}"
            )));
        }
        if sigma <= 0.0 || matte.width() == 0 || matte.height() == 0 {
            return Ok(matte.clone());
        }

        // Blur at 16-bit precision; blurring u8 directly truncates a uniform
        // 255 field to 254.
        let widened: ImageBuffer<Luma<u16>, Vec<u16>> = ImageBuffer::from_raw(
            matte.width(),
            matte.height(),
            matte.iter().map(|&v| u16::from(v) * 257).collect(),
        )
        .ok_or_else(|| BackendError::InvalidParameter("matte buffer size mismatch".into()))?;
        let blurred = gaussian_blur_f32(&widened, sigma);

        Ok(Matte::from_fn(matte.width(), matte.height(), |x, y| {
            Luma([round_to_u8(f32::from(blurred.get_pixel(x, y)[0]) / 257.0)])
        }))
    }

    fn morphology(&self, matte: &Matte, op: Morphology) -> Result<Matte, BackendError> {
        if op.radius() == 0 {
            return Ok(matte.clone());
        }
        let mask = Mask::diamond(op.radius());
        Ok(match op {
            Morphology::Erode(_) => grayscale_erode(matte, &mask),
            Morphology::Dilate(_) => grayscale_dilate(matte, &mask),
            Morphology::Close(_) => grayscale_close(matte, &mask),
            Morphology::Open(_) => grayscale_open(matte, &mask),
        })
    }
}

/// Grayscale erosion (minimum) with a diamond of `radius`.
///
/// Pixels outside the image are ignored, so the image border is not eroded.
pub fn erode(matte: &Matte, radius: u8) -> Matte {
    if radius == 0 {
        return matte.clone();
    }
    grayscale_erode(matte, &Mask::diamond(radius))
}

/// Grayscale dilation (maximum) with a diamond of `radius`.
pub fn dilate(matte: &Matte, radius: u8) -> Matte {
    if radius == 0 {
        return matte.clone();
    }
    grayscale_dilate(matte, &Mask::diamond(radius))
}

/// Backend delegating to the ImageMagick command-line tool
///
/// Each call writes the matte into a fresh temporary directory, runs the
/// tool once and reads the result back. The directory is dropped (and
/// deleted) on every return path.
#[derive(Debug, Clone)]
pub struct MagickBackend {
    program: OsString,
}

impl Default for MagickBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MagickBackend {
    /// Backend invoking `magick` from `PATH`
    pub fn new() -> Self {
        Self::with_program("magick")
    }

    /// Backend invoking a specific executable
    pub fn with_program<S: Into<OsString>>(program: S) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// Runs `<program> in.png <args...> out.png` on `matte`.
    fn run(&self, matte: &Matte, args: &[String]) -> Result<Matte, BackendError> {
        let workdir = tempfile::Builder::new().prefix("chroma-matte-").tempdir()?;
        let input = workdir.path().join("in.png");
        let output = workdir.path().join("out.png");
        matte.save_with_format(&input, ImageFormat::Png)?;

        trace!(program = %self.program_name(), ?args, dir = %workdir.path().display(), "spawning raster tool");
        let result = Command::new(&self.program)
            .arg(&input)
            .args(args)
            .arg(&output)
            .output();

        let output_status = match result {
            Ok(out) => out,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(BackendError::Unavailable {
                    program: self.program_name(),
                });
            }
            Err(e) => return Err(BackendError::Io(e)),
        };

        if !output_status.status.success() {
            return Err(BackendError::Rejected {
                program: self.program_name(),
                status: output_status.status.code(),
                stderr: String::from_utf8_lossy(&output_status.stderr).trim().to_string(),
            });
        }

        read_matte(&output, matte.dimensions())
    }
}

fn read_matte(path: &Path, expected: (u32, u32)) -> Result<Matte, BackendError> {
    let matte = image::open(path)?.into_luma8();
    if matte.dimensions() != expected {
        return Err(BackendError::InvalidParameter(format!(
            "tool returned {:?}, expected {expected:?}",
            matte.dimensions()
        )));
    }
    Ok(matte)
}

impl RasterBackend for MagickBackend {
    fn name(&self) -> &str {
        "imagemagick"
    }

    fn gaussian_blur(&self, matte: &Matte, sigma: f32) -> Result<Matte, BackendError> {
        if !sigma.is_finite() {
            return Err(BackendError::InvalidParameter(format!(
                "blur sigma must be finite, got {sigma}"
            )));
        }
        if sigma <= 0.0 {
            return Ok(matte.clone());
        }
        debug!(sigma, "delegating blur to ImageMagick");
        self.run(matte, &["-blur".to_string(), format!("0x{sigma}")])
    }

    fn morphology(&self, matte: &Matte, op: Morphology) -> Result<Matte, BackendError> {
        if op.radius() == 0 {
            return Ok(matte.clone());
        }
        debug!(?op, "delegating morphology to ImageMagick");
        self.run(
            matte,
            &[
                "-morphology".to_string(),
                op.magick_method().to_string(),
                format!("Diamond:{}", op.radius()),
            ],
        )
    }
}
