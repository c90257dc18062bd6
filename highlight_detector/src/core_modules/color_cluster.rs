// THEORY:
// The `color_cluster` module is the Dominant-Color Extractor. It reduces a
// screenshot to the handful of colors that cover most of it, so the matcher only
// has to compare ~10 centers against the palette instead of millions of pixels.
//
// Key architectural principles:
// 1.  **Histogram First**: Terminal screenshots contain few distinct colors. The
//     pixels are pooled into a histogram of distinct RGB triples and k-means runs
//     over the weighted histogram. Identical pixels always land in the same
//     cluster, so this is exactly k-means over the flattened pixel list, at a
//     fraction of the cost.
// 2.  **Reproducible Seeding**: Initial centers are drawn with k-means++ from a
//     `StdRng` seeded by `ClusteringConfig::seed`. The histogram is ordered
//     (`BTreeMap`), so the same image and seed always give the same clusters.
// 3.  **Clamped k**: Asking for more clusters than distinct colors is not an error;
//     k is clamped to the number of distinct colors.
// 4.  **Background Filtering**: Near-black and near-white centers (page background,
//     text ink) are dropped after sorting. The result may legitimately be empty.

use crate::config::ClusteringConfig;
use crate::core_modules::color_space::Rgb;
use crate::error::{DetectorError, Result};
use image::RgbImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use tracing::{debug, trace};

/// A cluster center and the number of pixels assigned to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DominantColor {
    pub center: Rgb,
    pub weight: usize,
}

/// One distinct color of the image and how many pixels carry it.
#[derive(Debug, Clone, Copy)]
struct ColorBin {
    color: Rgb,
    count: usize,
}

/// Extracts dominant colors, most dominant first, with near-black/near-white centers removed.
pub fn extract_dominant_colors(
    image: &RgbImage,
    config: &ClusteringConfig,
) -> Result<Vec<DominantColor>> {
    let clusters = cluster_colors(image, config)?;
    let total = clusters.len();
    let filtered: Vec<DominantColor> = clusters
        .into_iter()
        .filter(|c| !c.center.is_black_or_white(config.black_white_threshold))
        .collect();
    debug!(
        clusters = total,
        kept = filtered.len(),
        threshold = config.black_white_threshold,
        "dominant colors extracted"
    );
    Ok(filtered)
}

/// Runs k-means over the image colors and returns every non-empty cluster,
/// sorted by weight descending (stable by cluster index). No black/white filtering.
pub fn cluster_colors(image: &RgbImage, config: &ClusteringConfig) -> Result<Vec<DominantColor>> {
    config.validate()?;
    if image.width() == 0 || image.height() == 0 {
        return Err(DetectorError::invalid_image(format!(
            "image has zero pixels ({}x{})",
            image.width(),
            image.height()
        )));
    }

    // --- 1. Histogram ---
    let mut histogram: BTreeMap<[u8; 3], usize> = BTreeMap::new();
    for pixel in image.pixels() {
        *histogram.entry(pixel.0).or_insert(0) += 1;
    }
    let bins: Vec<ColorBin> = histogram
        .into_iter()
        .map(|(bytes, count)| ColorBin {
            color: Rgb::from_bytes(bytes),
            count,
        })
        .collect();

    let k = config.cluster_count.min(bins.len());
    trace!(
        distinct_colors = bins.len(),
        requested = config.cluster_count,
        k,
        "clustering"
    );

    // --- 2. Seeding ---
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut centers = kmeans_plus_plus(&bins, k, &mut rng);

    // --- 3. Lloyd Iterations ---
    let mut assignments = vec![0usize; bins.len()];
    for iteration in 0..config.max_iterations {
        assign(&bins, &centers, &mut assignments);
        let updated = recompute_centers(&bins, &assignments, &centers);
        let shift = centers
            .iter()
            .zip(&updated)
            .map(|(old, new)| old.distance_squared(new))
            .fold(0.0f32, f32::max);
        centers = updated;
        if shift <= config.convergence_tolerance {
            trace!(iteration, "k-means converged");
            break;
        }
    }

    // --- 4. Final Assignment & Ranking ---
    assign(&bins, &centers, &mut assignments);
    let mut weights = vec![0usize; k];
    for (bin, &cluster) in bins.iter().zip(&assignments) {
        weights[cluster] += bin.count;
    }

    let mut clusters: Vec<DominantColor> = centers
        .into_iter()
        .zip(weights)
        .filter(|(_, weight)| *weight > 0)
        .map(|(center, weight)| DominantColor { center, weight })
        .collect();
    // `sort_by` is stable, so equal weights keep cluster-index order.
    clusters.sort_by(|a, b| b.weight.cmp(&a.weight));
    Ok(clusters)
}

/// k-means++ initialization over weighted bins. Requires `k <= bins.len()`.
fn kmeans_plus_plus(bins: &[ColorBin], k: usize, rng: &mut StdRng) -> Vec<Rgb> {
    let mut centers = Vec::with_capacity(k);
    if k == 0 {
        return centers;
    }

    let first = pick_weighted(rng, bins.iter().map(|b| b.count as f64)).unwrap_or(0);
    centers.push(bins[first].color);

    let mut nearest_distance: Vec<f64> = bins
        .iter()
        .map(|b| b.color.distance_squared(&bins[first].color) as f64)
        .collect();

    while centers.len() < k {
        let weights = bins
            .iter()
            .zip(&nearest_distance)
            .map(|(b, &d)| b.count as f64 * d);
        let chosen = match pick_weighted(rng, weights) {
            Some(index) => index,
            // Every remaining bin coincides with a center; take the first unused one.
            None => match nearest_distance.iter().position(|&d| d > 0.0) {
                Some(index) => index,
                None => break,
            },
        };
        let center = bins[chosen].color;
        centers.push(center);
        for (distance, bin) in nearest_distance.iter_mut().zip(bins) {
            *distance = distance.min(bin.color.distance_squared(&center) as f64);
        }
    }
    centers
}

/// Draws an index with probability proportional to its weight. `None` if all weights are zero.
fn pick_weighted(rng: &mut StdRng, weights: impl Iterator<Item = f64> + Clone) -> Option<usize> {
    let total: f64 = weights.clone().sum();
    if total <= 0.0 {
        return None;
    }
    let target = rng.r#gen::<f64>() * total;
    let mut cumulative = 0.0;
    let mut last_positive = None;
    for (index, weight) in weights.enumerate() {
        if weight <= 0.0 {
            continue;
        }
        cumulative += weight;
        last_positive = Some(index);
        if cumulative > target {
            return Some(index);
        }
    }
    last_positive
}

/// Assigns each bin to its nearest center; ties go to the lower center index.
fn assign(bins: &[ColorBin], centers: &[Rgb], assignments: &mut [usize]) {
    for (bin, slot) in bins.iter().zip(assignments.iter_mut()) {
        let mut best = 0;
        let mut best_distance = f32::INFINITY;
        for (index, center) in centers.iter().enumerate() {
            let distance = bin.color.distance_squared(center);
            if distance < best_distance {
                best_distance = distance;
                best = index;
            }
        }
        *slot = best;
    }
}

/// Weighted mean of each cluster; an empty cluster keeps its previous center.
fn recompute_centers(bins: &[ColorBin], assignments: &[usize], previous: &[Rgb]) -> Vec<Rgb> {
    let mut sums = vec![[0f64; 3]; previous.len()];
    let mut counts = vec![0usize; previous.len()];
    for (bin, &cluster) in bins.iter().zip(assignments) {
        let weight = bin.count as f64;
        sums[cluster][0] += bin.color.red as f64 * weight;
        sums[cluster][1] += bin.color.green as f64 * weight;
        sums[cluster][2] += bin.color.blue as f64 * weight;
        counts[cluster] += bin.count;
    }
    previous
        .iter()
        .enumerate()
        .map(|(index, old)| {
            if counts[index] == 0 {
                return *old;
            }
            let n = counts[index] as f64;
            Rgb::new(
                (sums[index][0] / n) as f32,
                (sums[index][1] / n) as f32,
                (sums[index][2] / n) as f32,
            )
        })
        .collect()
}
