use image::Luma;

use crate::Image;

pub mod backend;
pub mod composite;
pub mod engine;
pub mod fallback;
pub mod key_color;
pub mod matte;
pub mod refine;
pub mod sampler;
pub mod unmix;

/// Single-channel alpha matte: 0 is background, 255 is foreground
pub type Matte = Image<Luma<u8>>;
