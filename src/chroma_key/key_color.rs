use std::fmt;
use std::str::FromStr;

use image::Rgb;
use serde::{Deserialize, Serialize};

use crate::error::KeyColorError;

/// Largest Euclidean distance between two 8-bit RGB colors.
const MAX_RGB_DISTANCE: f32 = 441.672_96; // 255 * sqrt(3)

/// The background color a chroma-key run removes.
///
/// Always a concrete opaque color; [`KeyColor::default`] is pure green.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyColor(pub Rgb<u8>);

/// A single RGB channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Red = 0,
    Green = 1,
    Blue = 2,
}

impl Channel {
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The two channels that are not `self`.
    #[inline]
    pub fn others(self) -> [Channel; 2] {
        match self {
            Self::Red => [Self::Green, Self::Blue],
            Self::Green => [Self::Red, Self::Blue],
            Self::Blue => [Self::Red, Self::Green],
        }
    }
}

impl KeyColor {
    pub const GREEN: KeyColor = KeyColor(Rgb([0, 255, 0]));
    pub const BLUE: KeyColor = KeyColor(Rgb([0, 0, 255]));

    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self(Rgb([red, green, blue]))
    }

    #[inline]
    pub fn rgb(&self) -> Rgb<u8> {
        self.0
    }

    /// Channel in which the key is strictly brightest, if any.
    ///
    /// Grey keys and keys with two equal maxima (yellow, cyan, magenta)
    /// have no dominant hue and return `None`.
    pub fn dominant_channel(&self) -> Option<Channel> {
        let Rgb([r, g, b]) = self.0;
        if g > r && g > b {
            Some(Channel::Green)
        } else if b > r && b > g {
            Some(Channel::Blue)
        } else if r > g && r > b {
            Some(Channel::Red)
        } else {
            None
        }
    }

    /// Euclidean distance to `pixel`, normalized to `[0, 1]`.
    #[inline]
    pub fn distance(&self, pixel: Rgb<u8>) -> f32 {
        let Rgb(key) = self.0;
        let squared: f32 = key
            .iter()
            .zip(pixel.0.iter())
            .map(|(&k, &p)| {
                let d = f32::from(k) - f32::from(p);
                d * d
            })
            .sum();
        squared.sqrt() / MAX_RGB_DISTANCE
    }

    /// Whether `pixel` lies within `tolerance` percent of the key.
    #[inline]
    pub fn matches(&self, pixel: Rgb<u8>, tolerance: f32) -> bool {
        self.distance(pixel) * 100.0 <= tolerance
    }

    /// Largest per-channel absolute difference to `pixel`.
    #[inline]
    pub fn max_channel_difference(&self, pixel: Rgb<u8>) -> u8 {
        let Rgb(key) = self.0;
        key.iter()
            .zip(pixel.0.iter())
            .map(|(&k, &p)| k.abs_diff(p))
            .max()
            .unwrap_or(0)
    }
}

impl Default for KeyColor {
    fn default() -> Self {
        Self::GREEN
    }
}

impl From<Rgb<u8>> for KeyColor {
    fn from(value: Rgb<u8>) -> Self {
        Self(value)
    }
}

impl fmt::Display for KeyColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Rgb([r, g, b]) = self.0;
        write!(f, "#{r:02X}{g:02X}{b:02X}")
    }
}

impl FromStr for KeyColor {
    type Err = KeyColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let hex = trimmed
            .strip_prefix('#')
            .or_else(|| trimmed.strip_prefix("0x"))
            .unwrap_or(trimmed);
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(KeyColorError::InvalidHex(s.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| KeyColorError::InvalidHex(s.to_string()))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl TryFrom<String> for KeyColor {
    type Error = KeyColorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyColor> for String {
    fn from(value: KeyColor) -> Self {
        value.to_string()
    }
}
