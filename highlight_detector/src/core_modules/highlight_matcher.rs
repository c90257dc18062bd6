// THEORY:
// The `highlight_matcher` decides which known highlighter colors are actually
// present, by comparing the dominant colors of an image against every palette
// entry. It is a pure comparison layer: it knows nothing about pixels or regions.
//
// Key architectural principles:
// 1.  **Per-Channel Tolerance**: A center matches an entry when every channel
//     differs by at most `tolerance` (L-infinity distance), not by Euclidean
//     distance.
// 2.  **Registry Order**: Output follows the registry (themes, then entries), never
//     the order of the centers. The orchestrator relies on this for determinism.
// 3.  **Short-Circuit per Entry**: Once one center matches an entry, the remaining
//     centers are not checked for that entry. One center may still match several
//     entries.
// 4.  **Provenance over Deduplication**: An rgb value registered under two themes is
//     reported twice, once per theme.

use crate::core_modules::color_cluster::DominantColor;
use crate::core_modules::color_space::Rgb;
use crate::core_modules::palette_registry::{PaletteEntry, PaletteRegistry};
use tracing::debug;

/// Tolerance applied by the matcher when the caller has no opinion.
pub const DEFAULT_MATCH_TOLERANCE: u8 = 5;

/// A palette entry found among the dominant colors, with the theme it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchedHighlight<'a> {
    pub theme: &'a str,
    pub entry: &'a PaletteEntry,
}

/// True when `sample` lies within `tolerance` of `entry` on every channel.
pub fn within_tolerance(sample: &Rgb, entry: &PaletteEntry, tolerance: u8) -> bool {
    sample.max_channel_difference(&entry.color()) <= tolerance as f32
}

/// Palette entries present among `centers`, in registry order.
pub fn match_highlights<'a>(
    centers: &[Rgb],
    registry: &'a PaletteRegistry,
    tolerance: u8,
) -> Vec<MatchedHighlight<'a>> {
    let matches: Vec<MatchedHighlight<'a>> = registry
        .all_entries()
        .into_iter()
        .filter(|(_, entry)| centers.iter().any(|c| within_tolerance(c, entry, tolerance)))
        .map(|(theme, entry)| MatchedHighlight { theme, entry })
        .collect();
    debug!(
        centers = centers.len(),
        matches = matches.len(),
        tolerance,
        "palette matched"
    );
    matches
}

/// Convenience wrapper taking extractor output directly.
pub fn match_dominant_colors<'a>(
    dominant: &[DominantColor],
    registry: &'a PaletteRegistry,
    tolerance: u8,
) -> Vec<MatchedHighlight<'a>> {
    let centers: Vec<Rgb> = dominant.iter().map(|d| d.center).collect();
    match_highlights(&centers, registry, tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::palette_registry::{DARK_BACKGROUND, WHITE_BACKGROUND};

    fn names<'a>(matches: &[MatchedHighlight<'a>]) -> Vec<(&'a str, &'a str)> {
        matches
            .iter()
            .map(|m| (m.theme, m.entry.name.as_str()))
            .collect()
    }

    #[test]
    fn empty_centers_match_nothing() {
        let registry = PaletteRegistry::builtin();
        assert!(match_highlights(&[], &registry, 20).is_empty());
    }

    #[test]
    fn exact_center_matches_its_entry() {
        let registry = PaletteRegistry::builtin();
        let matches = match_highlights(&[Rgb::new(179.0, 215.0, 255.0)], &registry, 20);
        assert_eq!(names(&matches), vec![(WHITE_BACKGROUND, "color1")]);
    }

    #[test]
    fn tolerance_is_inclusive_and_per_channel() {
        let entry = PaletteEntry::new("c", [100, 100, 100]);
        assert!(within_tolerance(&Rgb::new(105.0, 95.0, 100.0), &entry, 5));
        assert!(!within_tolerance(&Rgb::new(105.5, 100.0, 100.0), &entry, 5));
        // L-infinity, not Euclidean: all three channels off by 5 still matches.
        assert!(within_tolerance(&Rgb::new(105.0, 105.0, 105.0), &entry, 5));
    }

    #[test]
    fn tolerance_symmetry_over_offsets() {
        let registry = PaletteRegistry::empty()
            .with_theme("t", vec![PaletteEntry::new("c", [120, 60, 200])]);
        for offset in [-21i32, -20, -6, -5, 0, 5, 6, 20, 21] {
            let center = Rgb::new(120.0 + offset as f32, 60.0, 200.0);
            let expected = offset.unsigned_abs() <= DEFAULT_MATCH_TOLERANCE as u32;
            let matched = !match_highlights(&[center], &registry, DEFAULT_MATCH_TOLERANCE).is_empty();
            assert_eq!(matched, expected, "offset {offset}");
        }
    }

    #[test]
    fn output_follows_registry_order_not_center_order() {
        let registry = PaletteRegistry::builtin();
        let centers = [
            Rgb::new(208.0, 234.0, 200.0), // white color7
            Rgb::new(63.0, 99.0, 139.0),   // dark color1
        ];
        let matches = match_highlights(&centers, &registry, 5);
        assert_eq!(
            names(&matches),
            vec![(DARK_BACKGROUND, "color1"), (WHITE_BACKGROUND, "color7")]
        );
    }

    #[test]
    fn one_center_can_match_neighbouring_entries() {
        // dark color3 (137,87,110) and color4 (139,87,89) are 21 apart on blue.
        let registry = PaletteRegistry::builtin();
        let matches = match_highlights(&[Rgb::new(138.0, 87.0, 100.0)], &registry, 11);
        assert_eq!(
            names(&matches),
            vec![(DARK_BACKGROUND, "color3"), (DARK_BACKGROUND, "color4")]
        );
    }

    #[test]
    fn duplicated_value_is_reported_per_theme() {
        let registry = PaletteRegistry::empty()
            .with_theme("first", vec![PaletteEntry::new("dup", [10, 200, 30])])
            .with_theme("second", vec![PaletteEntry::new("dup", [10, 200, 30])]);
        let matches = match_highlights(&[Rgb::new(12.0, 198.0, 30.0)], &registry, 5);
        assert_eq!(names(&matches), vec![("first", "dup"), ("second", "dup")]);
    }
}
