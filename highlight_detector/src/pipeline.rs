// THEORY:
// The `pipeline` module is the top-level API of the detector. It runs the four
// stages in order for one screenshot and turns their output into a single
// `DetectionOutcome`: the cropped band and a "highlight present" flag.
//
// Stage flow (strictly forward, no stage revisits an earlier one):
//   image -> dominant colors -> matched palette entries -> mask/region -> crop
//
// The choice of which region to report is a named `SelectionPolicy`. The default
// reports the first matched palette entry (registry order) that has any region at
// all and stops there; `LargestArea` collects every candidate first. "Nothing
// found" is an ordinary outcome, never an error.

use crate::config::{DetectorConfig, SelectionPolicy};
use crate::core_modules::color_cluster::{DominantColor, extract_dominant_colors};
use crate::core_modules::highlight_matcher::{MatchedHighlight, match_dominant_colors};
use crate::core_modules::mask::HsvImage;
use crate::core_modules::palette_registry::{PaletteEntry, PaletteRegistry};
use crate::core_modules::region::Region;
use crate::core_modules::region_detector::region_detector;
use crate::error::{DetectorError, Result};
use image::RgbImage;
use image::imageops;
use std::sync::Arc;
use tracing::{debug, instrument};

/// A highlight color that produced a region in the image.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightRegion {
    pub theme: String,
    pub entry: PaletteEntry,
    pub region: Region,
}

/// The result of one detection run.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionOutcome {
    /// Rows `y..y+height` of the source, full width; `None` when nothing was found.
    pub cropped_image: Option<RgbImage>,
    pub highlight_present: bool,
    /// The palette entry and region behind the crop.
    pub highlight: Option<HighlightRegion>,
}

impl DetectionOutcome {
    pub fn not_found() -> Self {
        Self {
            cropped_image: None,
            highlight_present: false,
            highlight: None,
        }
    }

    fn found(image: &RgbImage, highlight: HighlightRegion) -> Self {
        Self {
            cropped_image: Some(crop_to_band(image, &highlight.region)),
            highlight_present: true,
            highlight: Some(highlight),
        }
    }

    pub fn into_parts(self) -> (Option<RgbImage>, bool) {
        (self.cropped_image, self.highlight_present)
    }
}

/// Crops `image` to the rows spanned by `region`, keeping every column.
///
/// The band is clamped to the image, so a region from a same-sized mask never
/// panics.
pub fn crop_to_band(image: &RgbImage, region: &Region) -> RgbImage {
    let bbox = region.bounding_box;
    if bbox.fits_within(image.width(), image.height()) {
        return imageops::crop_imm(image, 0, bbox.y, image.width(), bbox.height).to_image();
    }
    let y = bbox.y.min(image.height());
    let height = bbox.height.min(image.height() - y);
    imageops::crop_imm(image, 0, y, image.width(), height).to_image()
}

/// The detector: configuration plus a shared, read-only palette registry.
#[derive(Debug, Clone)]
pub struct HighlightDetector {
    config: DetectorConfig,
    registry: Arc<PaletteRegistry>,
}

impl Default for HighlightDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

impl HighlightDetector {
    /// Detector over the built-in palette.
    pub fn new(config: DetectorConfig) -> Self {
        Self::with_registry(config, PaletteRegistry::builtin())
    }

    pub fn with_registry(config: DetectorConfig, registry: Arc<PaletteRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn registry(&self) -> &PaletteRegistry {
        &self.registry
    }

    /// Stage 1 and 2 only: dominant colors and the palette entries they match.
    pub fn matched_highlights(&self, image: &RgbImage) -> Result<Vec<MatchedHighlight<'_>>> {
        let dominant = self.dominant_colors(image)?;
        Ok(match_dominant_colors(
            &dominant,
            &self.registry,
            self.config.tolerance,
        ))
    }

    pub fn dominant_colors(&self, image: &RgbImage) -> Result<Vec<DominantColor>> {
        validate_image(image)?;
        self.config.validate()?;
        extract_dominant_colors(image, &self.config.clustering)
    }

    /// Runs the full pipeline and applies the configured selection policy.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn process(&self, image: &RgbImage) -> Result<DetectionOutcome> {
        let matches = self.matched_highlights(image)?;
        if matches.is_empty() {
            debug!("no palette color among dominant colors");
            return Ok(DetectionOutcome::not_found());
        }

        // Stage 3 & 4: mask, region, crop.
        let hsv = HsvImage::from_rgb(image);
        let selected = match self.config.selection {
            SelectionPolicy::FirstInPaletteOrder => matches
                .iter()
                .find_map(|m| self.region_for(&hsv, m)),
            SelectionPolicy::LargestArea => {
                let mut best: Option<HighlightRegion> = None;
                for candidate in matches.iter().filter_map(|m| self.region_for(&hsv, m)) {
                    match &best {
                        Some(current) if candidate.region.area <= current.region.area => {}
                        _ => best = Some(candidate),
                    }
                }
                best
            }
        };

        Ok(match selected {
            Some(highlight) => {
                debug!(
                    theme = %highlight.theme,
                    color = %highlight.entry.name,
                    y = highlight.region.bounding_box.y,
                    height = highlight.region.bounding_box.height,
                    "highlight region selected"
                );
                DetectionOutcome::found(image, highlight)
            }
            None => {
                debug!(matches = matches.len(), "matched colors produced no region");
                DetectionOutcome::not_found()
            }
        })
    }

    /// Every matched palette entry that yields a region, in registry order.
    pub fn detect_all(&self, image: &RgbImage) -> Result<Vec<HighlightRegion>> {
        let matches = self.matched_highlights(image)?;
        if matches.is_empty() {
            return Ok(Vec::new());
        }
        let hsv = HsvImage::from_rgb(image);
        Ok(matches
            .iter()
            .filter_map(|m| self.region_for(&hsv, m))
            .collect())
    }

    fn region_for(&self, hsv: &HsvImage, matched: &MatchedHighlight<'_>) -> Option<HighlightRegion> {
        let (_, region) = region_detector::isolate_in(
            hsv,
            matched.entry.color(),
            self.config.tolerance,
            self.config.hue_mode,
        );
        region.map(|region| HighlightRegion {
            theme: matched.theme.to_string(),
            entry: matched.entry.clone(),
            region,
        })
    }
}

fn validate_image(image: &RgbImage) -> Result<()> {
    if image.width() == 0 || image.height() == 0 {
        return Err(DetectorError::invalid_image(format!(
            "image has zero pixels ({}x{})",
            image.width(),
            image.height()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::region::BoundingBox;
    use image::Rgb as Pixel;

    fn canvas(width: u32, height: u32, background: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(width, height, Pixel(background))
    }

    fn fill(image: &mut RgbImage, rect: (u32, u32, u32, u32), color: [u8; 3]) {
        let (x0, y0, w, h) = rect;
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                image.put_pixel(x, y, Pixel(color));
            }
        }
    }

    #[test]
    fn crop_to_band_keeps_full_width() {
        let image = canvas(40, 30, [1, 2, 3]);
        let region = Region {
            id: 0,
            bounding_box: BoundingBox {
                x: 5,
                y: 10,
                width: 3,
                height: 7,
            },
            area: 21,
            pixel_count: 21,
        };
        let band = crop_to_band(&image, &region);
        assert_eq!(band.dimensions(), (40, 7));
    }

    #[test]
    fn crop_to_band_clamps_region_past_the_bottom() {
        let image = canvas(40, 30, [1, 2, 3]);
        let region = Region {
            id: 0,
            bounding_box: BoundingBox {
                x: 0,
                y: 25,
                width: 40,
                height: 10,
            },
            area: 400,
            pixel_count: 400,
        };
        assert!(!region.bounding_box.fits_within(40, 30));
        assert_eq!(crop_to_band(&image, &region).dimensions(), (40, 5));
    }

    #[test]
    fn zero_sized_image_is_an_error() {
        let err = HighlightDetector::default()
            .process(&RgbImage::new(0, 5))
            .unwrap_err();
        assert!(matches!(err, DetectorError::InvalidImage { .. }));
    }

    #[test]
    fn white_highlight_is_cropped() {
        let mut image = canvas(100, 100, [255, 255, 255]);
        fill(&mut image, (10, 40, 20, 10), [179, 215, 255]);
        let outcome = HighlightDetector::default().process(&image).unwrap();
        assert!(outcome.highlight_present);
        let highlight = outcome.highlight.as_ref().unwrap();
        assert_eq!(highlight.entry.name, "color1");
        assert_eq!(highlight.theme, "white_background");
        assert_eq!(outcome.cropped_image.unwrap().dimensions(), (100, 10));
    }

    #[test]
    fn dark_theme_highlight_with_text_ink() {
        let mut image = canvas(80, 60, [0, 0, 0]);
        fill(&mut image, (0, 20, 80, 12), [63, 99, 139]);
        // Some white glyph strokes on top of the highlight.
        fill(&mut image, (5, 24, 2, 4), [255, 255, 255]);
        fill(&mut image, (20, 24, 2, 4), [255, 255, 255]);
        let outcome = HighlightDetector::default().process(&image).unwrap();
        assert!(outcome.highlight_present);
        let highlight = outcome.highlight.unwrap();
        assert_eq!(highlight.theme, "dark_background");
        assert_eq!(highlight.region.bounding_box.y, 20);
        assert_eq!(outcome.cropped_image.unwrap().height(), 12);
    }

    #[test]
    fn gray_screen_is_not_found() {
        let outcome = HighlightDetector::default()
            .process(&canvas(50, 50, [250, 250, 250]))
            .unwrap();
        assert_eq!(outcome, DetectionOutcome::not_found());
        assert_eq!(outcome.into_parts(), (None, false));
    }

    #[test]
    fn unmatched_color_is_not_found() {
        let mut image = canvas(50, 50, [255, 255, 255]);
        fill(&mut image, (0, 0, 50, 10), [20, 200, 20]);
        let outcome = HighlightDetector::default().process(&image).unwrap();
        assert!(!outcome.highlight_present);
        assert!(outcome.cropped_image.is_none());
    }

    #[test]
    fn selection_policies_differ_on_two_highlights() {
        // dark color1 comes first in palette order but covers less area than white color1.
        let mut image = canvas(120, 120, [255, 255, 255]);
        fill(&mut image, (0, 5, 120, 6), [63, 99, 139]);
        fill(&mut image, (0, 60, 120, 30), [179, 215, 255]);

        let first = HighlightDetector::default().process(&image).unwrap();
        assert_eq!(first.highlight.unwrap().entry.rgb, [63, 99, 139]);

        let largest = HighlightDetector::new(
            DetectorConfig::default().with_selection(SelectionPolicy::LargestArea),
        )
        .process(&image)
        .unwrap();
        let highlight = largest.highlight.unwrap();
        assert_eq!(highlight.entry.rgb, [179, 215, 255]);
        assert_eq!(largest.cropped_image.unwrap().height(), 30);

        let all = HighlightDetector::default().detect_all(&image).unwrap();
        let colors: Vec<[u8; 3]> = all.iter().map(|h| h.entry.rgb).collect();
        assert_eq!(colors, vec![[63, 99, 139], [179, 215, 255]]);
    }
}
