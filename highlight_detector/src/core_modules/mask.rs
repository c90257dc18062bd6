// THEORY:
// The `mask` module turns "where is this highlight color?" into a binary image.
// Matching happens in HSV rather than RGB because a highlight rendered under
// slightly different gamma or anti-aliasing keeps its hue and saturation while
// its raw channels drift.
//
// Key architectural principles:
// 1.  **Convert Once**: `HsvImage` converts a screenshot to HSV a single time; each
//     matched palette color then only costs one comparison pass.
// 2.  **Tolerance Box**: A pixel is in the mask when hue, saturation and value are
//     each within `tolerance` of the target (inclusive). Saturation and value are
//     clamped to 0..=255.
// 3.  **Hue Wraparound**: Hue is an angle. In `HueMode::Circular` the band continues
//     across 0/180; in `HueMode::Linear` it is cut off at the ends. Either way a
//     wider tolerance never removes a pixel from the mask.

use crate::config::HueMode;
use crate::core_modules::color_space::{ColorSample, HUE_RANGE, Hsv, Rgb};
use image::{RgbImage, Rgb as Pixel};

/// A screenshot converted to 8-bit HSV, row-major.
#[derive(Debug, Clone)]
pub struct HsvImage {
    pub width: u32,
    pub height: u32,
    pixels: Vec<Hsv>,
}

/// Inclusive HSV band around a target color.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HsvRange {
    pub center: Hsv,
    pub tolerance: u8,
    pub hue_mode: HueMode,
}

/// Binary image, same dimensions as its source; `true` marks a matching pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    pub width: u32,
    pub height: u32,
    bits: Vec<bool>,
}

impl HsvImage {
    pub fn from_rgb(image: &RgbImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            pixels: image.pixels().map(|p| Hsv::from_rgb8(p.0)).collect(),
        }
    }
}

impl HsvRange {
    pub fn around(target: impl Into<ColorSample>, tolerance: u8, hue_mode: HueMode) -> Self {
        Self {
            center: target.into().to_hsv(),
            tolerance,
            hue_mode,
        }
    }

    pub fn contains(&self, hsv: &Hsv) -> bool {
        let tol = self.tolerance as i32;
        let within = |value: u8, center: u8| (value as i32 - center as i32).abs() <= tol;
        within(hsv.saturation, self.center.saturation)
            && within(hsv.value, self.center.value)
            && self.hue_contains(hsv.hue)
    }

    fn hue_contains(&self, hue: u8) -> bool {
        // Hues outside 0..180 are folded back onto the wheel.
        let hue = hue as i32 % HUE_RANGE;
        let center = self.center.hue as i32 % HUE_RANGE;
        let delta = (hue - center).abs();
        let tol = self.tolerance as i32;
        match self.hue_mode {
            HueMode::Linear => delta <= tol,
            HueMode::Circular => delta.min(HUE_RANGE - delta) <= tol,
        }
    }
}

impl Mask {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            bits: vec![false; (width as usize) * (height as usize)],
        }
    }

    pub fn from_fn(width: u32, height: u32, mut f: impl FnMut(u32, u32) -> bool) -> Self {
        let mut mask = Self::new(width, height);
        for y in 0..height {
            for x in 0..width {
                mask.set(x, y, f(x, y));
            }
        }
        mask
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        self.bits[(y * self.width + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, value: bool) {
        let index = (y * self.width + x) as usize;
        self.bits[index] = value;
    }

    pub fn bits(&self) -> &[bool] {
        &self.bits
    }

    /// Number of `true` pixels.
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|&&b| b).count()
    }

    pub fn is_empty(&self) -> bool {
        !self.bits.iter().any(|&b| b)
    }

    pub fn is_subset_of(&self, other: &Mask) -> bool {
        self.width == other.width
            && self.height == other.height
            && self.bits.iter().zip(&other.bits).all(|(&a, &b)| !a || b)
    }

    /// Copy of `image` with every pixel outside the mask painted black.
    pub fn apply(&self, image: &RgbImage) -> RgbImage {
        RgbImage::from_fn(image.width(), image.height(), |x, y| {
            if x < self.width && y < self.height && self.contains(x, y) {
                *image.get_pixel(x, y)
            } else {
                Pixel([0, 0, 0])
            }
        })
    }

    /// The mask as a black/white (0/255) image, one gray level replicated on three channels.
    pub fn to_image(&self) -> RgbImage {
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let level = if self.contains(x, y) { 255 } else { 0 };
            Pixel([level, level, level])
        })
    }
}

/// Builds the mask of pixels whose HSV value lies in `range`.
pub fn build_mask(hsv: &HsvImage, range: &HsvRange) -> Mask {
    Mask {
        width: hsv.width,
        height: hsv.height,
        bits: hsv.pixels.iter().map(|p| range.contains(p)).collect(),
    }
}

/// Mask of `image` pixels within `tolerance` of `target` in HSV space.
pub fn color_mask(image: &RgbImage, target: Rgb, tolerance: u8, hue_mode: HueMode) -> Mask {
    build_mask(
        &HsvImage::from_rgb(image),
        &HsvRange::around(target, tolerance, hue_mode),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn striped() -> RgbImage {
        // Column x has a distinct hue-ish color, so tolerance sweeps grow the mask gradually.
        RgbImage::from_fn(64, 4, |x, _| Pixel([(x * 4) as u8, 200, 255 - (x * 2) as u8]))
    }

    #[test]
    fn exact_color_is_in_its_own_mask() {
        let image = RgbImage::from_pixel(3, 3, Pixel([179, 215, 255]));
        let mask = color_mask(&image, Rgb::new(179.0, 215.0, 255.0), 0, HueMode::Circular);
        assert_eq!(mask.count(), 9);
    }

    #[test]
    fn white_background_is_outside_highlight_mask() {
        let image = RgbImage::from_pixel(3, 3, Pixel([255, 255, 255]));
        let mask = color_mask(&image, Rgb::new(179.0, 215.0, 255.0), 20, HueMode::Circular);
        assert!(mask.is_empty());
    }

    #[test]
    fn mask_grows_monotonically_with_tolerance() {
        let image = striped();
        let target = Rgb::new(100.0, 200.0, 205.0);
        for hue_mode in [HueMode::Circular, HueMode::Linear] {
            let mut previous = color_mask(&image, target, 0, hue_mode);
            for tolerance in 1..=40u8 {
                let current = color_mask(&image, target, tolerance, hue_mode);
                assert!(previous.is_subset_of(&current), "tolerance {tolerance}");
                previous = current;
            }
        }
    }

    #[test]
    fn circular_hue_band_crosses_zero() {
        let range_circular = HsvRange {
            center: Hsv::new(2, 200, 200),
            tolerance: 5,
            hue_mode: HueMode::Circular,
        };
        let range_linear = HsvRange {
            hue_mode: HueMode::Linear,
            ..range_circular
        };
        let across = Hsv::new(178, 200, 200);
        assert!(range_circular.contains(&across));
        assert!(!range_linear.contains(&across));
        assert!(range_linear.contains(&Hsv::new(0, 200, 200)));
    }

    #[test]
    fn out_of_range_hue_center_is_folded_onto_the_wheel() {
        let range = HsvRange::around(Hsv::new(250, 100, 100), 5, HueMode::Circular);
        assert!(!range.contains(&Hsv::new(0, 100, 100)));
        assert!(!range.contains(&Hsv::new(120, 100, 100)));
        assert!(range.contains(&Hsv::new(70, 100, 100)));
        assert!(range.contains(&Hsv::new(74, 100, 100)));
    }

    #[test]
    fn apply_blacks_out_unmasked_pixels() {
        let image = RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 { Pixel([179, 215, 255]) } else { Pixel([255, 255, 255]) }
        });
        let mask = color_mask(&image, Rgb::new(179.0, 215.0, 255.0), 20, HueMode::Circular);
        let result = mask.apply(&image);
        assert_eq!(result.get_pixel(0, 0), &Pixel([179, 215, 255]));
        assert_eq!(result.get_pixel(1, 0), &Pixel([0, 0, 0]));
        assert_eq!(mask.to_image().get_pixel(0, 0), &Pixel([255, 255, 255]));
    }
}
