// THEORY:
// The `RegionDetector` is the engine of the Region Isolator. Given a binary mask of
// "pixels that look like this highlight color", it finds the contiguous patches
// and picks the largest one, whose vertical span becomes the crop.
//
// Key architectural principles & algorithm steps:
// 1.  **Outside Flood**: Background pixels reachable from the image border (through
//     4-connected non-mask pixels) are "outside". Every other pixel is either a mask
//     pixel or sits in a hole enclosed by mask pixels.
// 2.  **Filled Components**: Mask pixels and their holes are grouped into
//     8-connected components by an iterative stack-based region grow. A patch that
//     lies inside another patch's hole is swallowed by the enclosing patch, so only
//     external outlines are ever reported.
// 3.  **Area Ranking**: A region's area is everything its outline encloses (holes
//     included). The largest area wins; ties go to the region discovered first in
//     raster order, which keeps results deterministic.
// 4.  **Stateless Utility**: Every function takes a mask (or an image) and returns
//     fresh values. Nothing is remembered between calls.

use crate::config::HueMode;
use crate::core_modules::color_space::Rgb;
use crate::core_modules::mask::{HsvImage, HsvRange, Mask, build_mask};
use crate::core_modules::region::{BoundingBox, Point, Region};

pub mod region_detector {
    use super::*; // Make structs from parent module available.
    use tracing::trace;

    const FOUR_NEIGHBOURS: [(i64, i64); 4] = [(0, 1), (0, -1), (1, 0), (-1, 0)];
    const EIGHT_NEIGHBOURS: [(i64, i64); 8] = [
        (-1, -1),
        (0, -1),
        (1, -1),
        (-1, 0),
        (1, 0),
        (-1, 1),
        (0, 1),
        (1, 1),
    ];

    /// Finds every external region of the mask, in raster order of discovery.
    pub fn find_regions(mask: &Mask) -> Vec<Region> {
        let width = mask.width as usize;
        let height = mask.height as usize;
        if width == 0 || height == 0 {
            return Vec::new();
        }
        let bits = mask.bits();

        // --- 1. Outside Flood ---
        // Seed with every border pixel that is not part of the mask.
        let mut outside = vec![false; width * height];
        let mut stack: Vec<usize> = Vec::new();
        for x in 0..width {
            for y in [0, height - 1] {
                let index = y * width + x;
                if !bits[index] && !outside[index] {
                    outside[index] = true;
                    stack.push(index);
                }
            }
        }
        for y in 0..height {
            for x in [0, width - 1] {
                let index = y * width + x;
                if !bits[index] && !outside[index] {
                    outside[index] = true;
                    stack.push(index);
                }
            }
        }
        while let Some(index) = stack.pop() {
            for neighbour in neighbours(index, width, height, &FOUR_NEIGHBOURS) {
                if !bits[neighbour] && !outside[neighbour] {
                    outside[neighbour] = true;
                    stack.push(neighbour);
                }
            }
        }

        // --- 2. Filled Components ---
        let mut visited = vec![false; width * height];
        let mut regions: Vec<Region> = Vec::new();
        let mut region_id_counter = 0;

        for start in 0..width * height {
            if outside[start] || visited[start] {
                continue;
            }
            let region = grow_region(start, bits, &outside, &mut visited, width, height, region_id_counter);
            regions.push(region);
            region_id_counter += 1;
        }

        trace!(regions = regions.len(), "mask regions found");
        regions
    }

    /// Region with the largest enclosed area; the earliest one wins ties.
    pub fn largest_region(mask: &Mask) -> Option<Region> {
        let mut best: Option<Region> = None;
        for region in find_regions(mask) {
            match &best {
                Some(current) if region.area <= current.area => {}
                _ => best = Some(region),
            }
        }
        best
    }

    /// Masks `hsv` around `target` and returns the mask with its largest region, if any.
    pub fn isolate_in(
        hsv: &HsvImage,
        target: Rgb,
        tolerance: u8,
        hue_mode: HueMode,
    ) -> (Mask, Option<Region>) {
        let mask = build_mask(hsv, &HsvRange::around(target, tolerance, hue_mode));
        let region = largest_region(&mask);
        (mask, region)
    }

    /// One-shot form of [`isolate_in`] for a single RGB image.
    pub fn isolate(
        image: &image::RgbImage,
        target: Rgb,
        tolerance: u8,
        hue_mode: HueMode,
    ) -> (Mask, Option<BoundingBox>) {
        let (mask, region) = isolate_in(&HsvImage::from_rgb(image), target, tolerance, hue_mode);
        (mask, region.map(|r| r.bounding_box))
    }

    /// Depth-first grow over 8-connected non-outside pixels, aggregating the region summary.
    fn grow_region(
        start: usize,
        bits: &[bool],
        outside: &[bool],
        visited: &mut [bool],
        width: usize,
        height: usize,
        region_id: u64,
    ) -> Region {
        let mut stack = vec![start];
        visited[start] = true;

        let mut min = Point { x: u32::MAX, y: u32::MAX };
        let mut max = Point { x: 0, y: 0 };
        let mut area = 0usize;
        let mut pixel_count = 0usize;

        while let Some(index) = stack.pop() {
            let x = (index % width) as u32;
            let y = (index / width) as u32;
            min.x = min.x.min(x);
            min.y = min.y.min(y);
            max.x = max.x.max(x);
            max.y = max.y.max(y);
            area += 1;
            if bits[index] {
                pixel_count += 1;
            }

            for neighbour in neighbours(index, width, height, &EIGHT_NEIGHBOURS) {
                if !outside[neighbour] && !visited[neighbour] {
                    visited[neighbour] = true;
                    stack.push(neighbour);
                }
            }
        }

        Region {
            id: region_id,
            bounding_box: BoundingBox::from_corners(min, max),
            area,
            pixel_count,
        }
    }

    fn neighbours<'a>(
        index: usize,
        width: usize,
        height: usize,
        offsets: &'a [(i64, i64)],
    ) -> impl Iterator<Item = usize> + 'a {
        let x = (index % width) as i64;
        let y = (index / width) as i64;
        offsets.iter().filter_map(move |(dx, dy)| {
            let nx = x + dx;
            let ny = y + dy;
            if nx >= 0 && nx < width as i64 && ny >= 0 && ny < height as i64 {
                Some(ny as usize * width + nx as usize)
            } else {
                None
            }
        })
    }
}
