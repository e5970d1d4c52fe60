//! Key color estimation from the image corner.
//!
//! The corner patch is assumed to be pure background. Estimation degrades
//! through clustering, the histogram mode and the corner pixel, and finally
//! returns the caller's default, so it never fails outward.

use image::{GenericImageView, Rgb, RgbImage};
use itertools::Itertools;
use tracing::debug;

use crate::chroma_key::key_color::KeyColor;
use crate::config::SamplerConfig;

/// Reason a sampling tier produced no color
#[derive(Debug, Clone, PartialEq, Eq)]
enum SampleError {
    EmptyPatch,
    NoClusters,
}

/// Estimates the key color of `image`.
///
/// # Arguments
///
/// * `image` - Source raster
/// * `config` - Patch geometry and clustering parameters
/// * `default` - Returned unchanged when every estimator fails
pub fn sample_key_color(image: &RgbImage, config: &SamplerConfig, default: KeyColor) -> KeyColor {
    let patch = corner_patch(image, config);

    match dominant_cluster(&patch, config) {
        Ok(color) => {
            debug!(%color, samples = patch.len(), "key color from k-means");
            return color;
        }
        Err(e) => debug!(?e, "k-means sampling failed, trying histogram"),
    }

    match histogram_mode(&patch) {
        Ok(color) => {
            debug!(%color, "key color from histogram mode");
            return color;
        }
        Err(e) => debug!(?e, "histogram sampling failed, trying corner pixel"),
    }

    if let Some(pixel) = image.get_pixel_checked(0, 0) {
        let color = KeyColor(*pixel);
        debug!(%color, "key color from top-left pixel");
        return color;
    }

    debug!(color = %default, "key color detection failed, using default");
    default
}

/// Pixels of the top-left corner patch.
fn corner_patch(image: &RgbImage, config: &SamplerConfig) -> Vec<Rgb<u8>> {
    let (width, height) = image.dimensions();
    let side = |dim: u32| {
        let scaled = (dim as f32 * config.patch_fraction).ceil() as u32;
        scaled.max(config.min_patch_size).min(dim)
    };
    let (patch_w, patch_h) = (side(width), side(height));

    let view = image.view(0, 0, patch_w, patch_h);
    view.pixels().map(|(_, _, pixel)| pixel).collect()
}

fn squared_distance(a: [f32; 3], b: [f32; 3]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

fn nearest(point: [f32; 3], centroids: &[[f32; 3]]) -> usize {
    centroids
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| {
            squared_distance(point, **a).total_cmp(&squared_distance(point, **b))
        })
        .map_or(0, |(i, _)| i)
}

/// Centroid of the most populated k-means cluster.
///
/// Seeding is farthest-point from the middle sample, so results are
/// deterministic for a given patch.
fn dominant_cluster(patch: &[Rgb<u8>], config: &SamplerConfig) -> Result<KeyColor, SampleError> {
    if patch.is_empty() {
        return Err(SampleError::EmptyPatch);
    }
    let points: Vec<[f32; 3]> = patch
        .iter()
        .map(|Rgb([r, g, b])| [f32::from(*r), f32::from(*g), f32::from(*b)])
        .collect();
    let k = config.clusters.min(points.len());
    if k == 0 {
        return Err(SampleError::NoClusters);
    }

    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[points.len() / 2]);
    while centroids.len() < k {
        let (farthest, _) = points
            .iter()
            .enumerate()
            .map(|(i, p)| {
                let d = centroids
                    .iter()
                    .map(|c| squared_distance(*p, *c))
                    .fold(f32::MAX, f32::min);
                (i, d)
            })
            .max_by(|(_, a), (_, b)| a.total_cmp(b))
            .ok_or(SampleError::EmptyPatch)?;
        centroids.push(points[farthest]);
    }

    let mut counts = vec![0usize; k];
    for _ in 0..config.max_iterations.max(1) {
        let mut sums = vec![[0f32; 3]; k];
        counts.fill(0);
        for p in &points {
            let c = nearest(*p, &centroids);
            counts[c] += 1;
            for (s, v) in sums[c].iter_mut().zip(p.iter()) {
                *s += v;
            }
        }

        let mut moved = false;
        for ((centroid, sum), &count) in centroids.iter_mut().zip(sums.iter()).zip(counts.iter()) {
            if count == 0 {
                continue;
            }
            let updated = sum.map(|s| s / count as f32);
            moved |= squared_distance(*centroid, updated) > 1e-3;
            *centroid = updated;
        }
        if !moved {
            break;
        }
    }

    let (dominant, _) = counts
        .iter()
        .enumerate()
        .max_by_key(|(_, count)| **count)
        .ok_or(SampleError::NoClusters)?;
    let [r, g, b] = centroids[dominant].map(crate::utils::round_to_u8);
    Ok(KeyColor::new(r, g, b))
}

/// Most frequent exact color in the patch.
fn histogram_mode(patch: &[Rgb<u8>]) -> Result<KeyColor, SampleError> {
    patch
        .iter()
        .map(|pixel| pixel.0)
        .counts()
        .into_iter()
        .max_by_key(|(color, count)| (*count, std::cmp::Reverse(*color)))
        .map(|(color, _)| KeyColor(Rgb(color)))
        .ok_or(SampleError::EmptyPatch)
}
