// THEORY:
// This file is the main entry point for the `highlight_detector` library crate.
// It answers one question about a terminal screenshot: has any text been marked
// with a known highlighter color, and if so, which horizontal band holds it?
//
// The pipeline has four ordered stages, each in its own core module:
// 1.  `palette_registry`: the fixed table of known highlight colors per theme.
// 2.  `color_cluster`: seeded k-means reduces the image to its dominant colors.
// 3.  `highlight_matcher`: dominant colors are compared against the palette.
// 4.  `mask` + `region_detector`: an HSV mask per matched color, its largest
//     connected region, and the crop to that region's rows.
//
// `HighlightDetector` (in `pipeline`) is the clean, high-level interface over all
// of it; `DetectorPool` (in `parallel_pipeline`) runs many detections at once.
// Capturing screenshots, OCR, and shipping images over a network are the
// caller's business.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod parallel_pipeline;
pub mod pipeline;

pub use config::{ClusteringConfig, DetectorConfig, HueMode, SelectionPolicy};
pub use core_modules::color_cluster::{DominantColor, extract_dominant_colors};
pub use core_modules::color_space::{Bgr, ChannelOrder, ColorSample, Hsv, Rgb, is_black_or_white};
pub use core_modules::highlight_matcher::{DEFAULT_MATCH_TOLERANCE, MatchedHighlight, match_highlights};
pub use core_modules::mask::Mask;
pub use core_modules::palette_registry::{PaletteEntry, PaletteRegistry, Theme};
pub use core_modules::region::{BoundingBox, Region};
pub use core_modules::region_detector::region_detector::isolate;
pub use core_modules::utils::image_helper::image_helper;
pub use error::{DetectorError, Result};
pub use parallel_pipeline::DetectorPool;
pub use pipeline::{DetectionOutcome, HighlightDetector, HighlightRegion, crop_to_band};
