// THEORY:
// The `PaletteRegistry` is the leaf of the detector: a fixed, versioned table of
// the highlighter colors a terminal paints behind selected text, grouped by the
// background theme they appear against. Everything downstream is measured
// relative to these exact byte values, so the built-in table is a set of constants
// and never changes at runtime.
//
// Key architectural principles:
// 1.  **Ordered Themes**: Themes are an ordered `Vec`, not a map. Matching walks
//     themes in registry order and entries in stored order, which is what makes
//     the detector's "first match wins" policy deterministic.
// 2.  **Shared, Immutable Built-in**: `PaletteRegistry::builtin()` hands out a
//     process-wide `Arc` created once through `OnceLock`. Concurrent detections
//     share it read-only.
// 3.  **Custom Registries**: Callers can build or deserialize their own registry
//     (for other terminals or for tests); `validate` keeps hex and rgb in sync.

use crate::error::{DetectorError, Result};
use crate::core_modules::color_space::Rgb;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, OnceLock};

pub const BUILTIN_PALETTE_VERSION: u32 = 1;
pub const DARK_BACKGROUND: &str = "dark_background";
pub const WHITE_BACKGROUND: &str = "white_background";

const DARK_BACKGROUND_COLORS: [(&str, [u8; 3], &str); 7] = [
    ("color1", [63, 99, 139], "#3F638B"),
    ("color2", [112, 87, 113], "#705771"),
    ("color3", [137, 87, 110], "#89576E"),
    ("color4", [139, 87, 89], "#8B5759"),
    ("color5", [137, 102, 71], "#896647"),
    ("color6", [139, 122, 63], "#8B7A3F"),
    ("color7", [92, 118, 84], "#5C7654"),
];

const WHITE_BACKGROUND_COLORS: [(&str, [u8; 3], &str); 7] = [
    ("color1", [179, 215, 255], "#B3D7FF"),
    ("color2", [223, 197, 224], "#DFC5E0"),
    ("color3", [253, 203, 226], "#FDCBE2"),
    ("color4", [246, 196, 197], "#F6C4C5"),
    ("color5", [253, 218, 187], "#FDDABB"),
    ("color6", [255, 238, 190], "#FFEEBE"),
    ("color7", [208, 234, 200], "#D0EAC8"),
];

static BUILTIN_REGISTRY: OnceLock<Arc<PaletteRegistry>> = OnceLock::new();

/// A single known highlighter color.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub name: String,
    pub rgb: [u8; 3],
    pub hex: String,
}

/// A named group of highlight colors expected against one background.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    pub entries: Vec<PaletteEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaletteRegistry {
    pub version: u32,
    pub themes: Vec<Theme>,
}

impl PaletteEntry {
    /// Builds an entry whose hex string is derived from `rgb`.
    pub fn new(name: impl Into<String>, rgb: [u8; 3]) -> Self {
        Self {
            name: name.into(),
            rgb,
            hex: hex_string(rgb),
        }
    }

    pub fn color(&self) -> Rgb {
        Rgb::from_bytes(self.rgb)
    }
}

/// Uppercase `#RRGGBB` form of an RGB triple.
pub fn hex_string(rgb: [u8; 3]) -> String {
    format!("#{:02X}{:02X}{:02X}", rgb[0], rgb[1], rgb[2])
}

impl PaletteRegistry {
    pub fn empty() -> Self {
        Self {
            version: BUILTIN_PALETTE_VERSION,
            themes: Vec::new(),
        }
    }

    /// The shared built-in registry (dark background first, then white background).
    pub fn builtin() -> Arc<PaletteRegistry> {
        BUILTIN_REGISTRY
            .get_or_init(|| {
                let theme = |name: &str, colors: &[(&str, [u8; 3], &str)]| Theme {
                    name: name.to_string(),
                    entries: colors
                        .iter()
                        .map(|(entry_name, rgb, hex)| PaletteEntry {
                            name: entry_name.to_string(),
                            rgb: *rgb,
                            hex: hex.to_string(),
                        })
                        .collect(),
                };
                Arc::new(PaletteRegistry {
                    version: BUILTIN_PALETTE_VERSION,
                    themes: vec![
                        theme(DARK_BACKGROUND, &DARK_BACKGROUND_COLORS),
                        theme(WHITE_BACKGROUND, &WHITE_BACKGROUND_COLORS),
                    ],
                })
            })
            .clone()
    }

    /// Appends a theme, keeping registry order equal to insertion order.
    pub fn with_theme(mut self, name: impl Into<String>, entries: Vec<PaletteEntry>) -> Self {
        self.themes.push(Theme {
            name: name.into(),
            entries,
        });
        self
    }

    /// Entries of `theme` in stored order; empty when the theme is unknown.
    pub fn lookup(&self, theme: &str) -> &[PaletteEntry] {
        self.themes
            .iter()
            .find(|t| t.name == theme)
            .map(|t| t.entries.as_slice())
            .unwrap_or(&[])
    }

    /// Every `(theme, entry)` pair, themes in registry order, entries in stored order.
    pub fn all_entries(&self) -> Vec<(&str, &PaletteEntry)> {
        self.themes
            .iter()
            .flat_map(|t| t.entries.iter().map(move |e| (t.name.as_str(), e)))
            .collect()
    }

    pub fn themes(&self) -> impl Iterator<Item = &str> {
        self.themes.iter().map(|t| t.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.themes.iter().map(|t| t.entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn validate(&self) -> Result<()> {
        for theme in &self.themes {
            if theme.name.trim().is_empty() {
                return Err(DetectorError::invalid_palette("theme name is empty"));
            }
            for entry in &theme.entries {
                let expected = hex_string(entry.rgb);
                if entry.hex != expected {
                    return Err(DetectorError::invalid_palette(format!(
                        "{}/{}: hex {} does not match rgb {:?} ({})",
                        theme.name, entry.name, entry.hex, entry.rgb, expected
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let registry: Self = serde_json::from_str(json)?;
        registry.validate()?;
        Ok(registry)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_theme_order() {
        let registry = PaletteRegistry::builtin();
        let themes: Vec<&str> = registry.themes().collect();
        assert_eq!(themes, vec![DARK_BACKGROUND, WHITE_BACKGROUND]);
        assert_eq!(registry.len(), 14);
        assert_eq!(registry.version, BUILTIN_PALETTE_VERSION);
    }

    #[test]
    fn builtin_values_are_exact() {
        let registry = PaletteRegistry::builtin();
        let dark = registry.lookup(DARK_BACKGROUND);
        assert_eq!(dark[0], PaletteEntry::new("color1", [63, 99, 139]));
        assert_eq!(dark[0].hex, "#3F638B");
        assert_eq!(dark[6].rgb, [92, 118, 84]);
        assert_eq!(dark[6].hex, "#5C7654");

        let white = registry.lookup(WHITE_BACKGROUND);
        assert_eq!(white[0].rgb, [179, 215, 255]);
        assert_eq!(white[0].hex, "#B3D7FF");
        assert_eq!(white[5].rgb, [255, 238, 190]);
        assert_eq!(white[5].hex, "#FFEEBE");
    }

    #[test]
    fn every_builtin_hex_matches_its_rgb() {
        let registry = PaletteRegistry::builtin();
        for (_, entry) in registry.all_entries() {
            assert_eq!(entry.hex, hex_string(entry.rgb), "{}", entry.name);
        }
        assert!(registry.validate().is_ok());
    }

    #[test]
    fn builtin_is_shared() {
        let a = PaletteRegistry::builtin();
        let b = PaletteRegistry::builtin();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn unknown_theme_is_empty_not_an_error() {
        assert!(PaletteRegistry::builtin().lookup("solarized").is_empty());
    }

    #[test]
    fn all_entries_follow_registry_order() {
        let registry = PaletteRegistry::empty()
            .with_theme("b", vec![PaletteEntry::new("x", [1, 2, 3])])
            .with_theme(
                "a",
                vec![PaletteEntry::new("y", [4, 5, 6]), PaletteEntry::new("z", [7, 8, 9])],
            );
        let names: Vec<(&str, &str)> = registry
            .all_entries()
            .into_iter()
            .map(|(theme, entry)| (theme, entry.name.as_str()))
            .collect();
        assert_eq!(names, vec![("b", "x"), ("a", "y"), ("a", "z")]);
    }

    #[test]
    fn json_round_trip_and_validation() {
        let json = serde_json::to_string(&*PaletteRegistry::builtin()).unwrap();
        let parsed = PaletteRegistry::from_json_str(&json).unwrap();
        assert_eq!(parsed, *PaletteRegistry::builtin());

        let bad = r##"{"version":1,"themes":[{"name":"t","entries":[{"name":"c","rgb":[1,2,3],"hex":"#FFFFFF"}]}]}"##;
        let err = PaletteRegistry::from_json_str(bad).unwrap_err();
        assert!(matches!(err, DetectorError::InvalidPalette { .. }));

        // Hex must be the exact uppercase form of rgb.
        let lowercase = r##"{"version":1,"themes":[{"name":"t","entries":[{"name":"c","rgb":[179,215,255],"hex":"#b3d7ff"}]}]}"##;
        let err = PaletteRegistry::from_json_str(lowercase).unwrap_err();
        assert!(matches!(err, DetectorError::InvalidPalette { .. }));
    }
}
