// THEORY:
// The `color_space` module is the single place where the detector reasons about
// which color space a triple lives in. Every other module receives a typed value
// (`Rgb`, `Bgr`, `Hsv`) instead of a bare `[u8; 3]`, so a BGR buffer can never be
// clustered as if it were RGB and a palette color can never be compared against
// an HSV pixel by accident.
//
// Key architectural principles:
// 1.  **Typed Samples**: `Rgb` is the working space of clustering and palette
//     matching. Channels are `f32` in the 0..255 range so cluster centers (which
//     are means) and pixels (which are integers) share one type.
// 2.  **8-bit HSV**: `Hsv` uses the conventional 8-bit image-library scale: hue is
//     stored in half-degrees (0..180) and saturation/value in 0..255. The masking
//     tolerances of the detector are calibrated against this exact scale.
// 3.  **Fixed-Point Conversion**: RGB -> HSV uses integer arithmetic with two
//     256-entry reciprocal tables initialised once through `OnceLock`. The hot path
//     is two lookups, two multiplies and two shifts per pixel; rounding is half-up
//     and negative hues wrap by +180.
// 4.  **Tagged Variant**: `ColorSample` is the type-erased form used at module
//     seams. Converting it to RGB or HSV is explicit and total.

use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub type Channel = f32;
pub type Byte = u8;

/// Number of hue steps in 8-bit HSV (half-degrees).
pub const HUE_RANGE: i32 = 180;
const HSV_SHIFT: i32 = 12;

static SATURATION_DIV_LUT: OnceLock<[i32; 256]> = OnceLock::new();
static HUE_DIV_LUT: OnceLock<[i32; 256]> = OnceLock::new();

fn saturation_div_table() -> &'static [i32; 256] {
    SATURATION_DIV_LUT.get_or_init(|| {
        let mut table = [0i32; 256];
        for (i, slot) in table.iter_mut().enumerate().skip(1) {
            *slot = ((255 << HSV_SHIFT) as f64 / i as f64).round() as i32;
        }
        table
    })
}

fn hue_div_table() -> &'static [i32; 256] {
    HUE_DIV_LUT.get_or_init(|| {
        let mut table = [0i32; 256];
        for (i, slot) in table.iter_mut().enumerate().skip(1) {
            *slot = ((HUE_RANGE << HSV_SHIFT) as f64 / (6.0 * i as f64)).round() as i32;
        }
        table
    })
}

/// Byte layout of an interleaved 3-channel pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelOrder {
    Rgb,
    Bgr,
}

/// An RGB color sample. Channels are in 0.0..=255.0.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rgb {
    pub red: Channel,
    pub green: Channel,
    pub blue: Channel,
}

/// A BGR color sample, as produced by capture and decode paths that store blue first.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bgr {
    pub blue: Channel,
    pub green: Channel,
    pub red: Channel,
}

/// An 8-bit HSV sample: hue in half-degrees (0..180), saturation and value in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Hsv {
    pub hue: u8,
    pub saturation: u8,
    pub value: u8,
}

/// A color triple tagged with the space it is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "space", rename_all = "snake_case")]
pub enum ColorSample {
    Rgb(Rgb),
    Bgr(Bgr),
    Hsv(Hsv),
}

impl Rgb {
    pub fn new(red: Channel, green: Channel, blue: Channel) -> Self {
        Self { red, green, blue }
    }

    pub fn from_bytes(bytes: [Byte; 3]) -> Self {
        Self::new(bytes[0] as Channel, bytes[1] as Channel, bytes[2] as Channel)
    }

    /// Rounds each channel to the nearest byte, saturating at 0 and 255.
    pub fn to_bytes(&self) -> [Byte; 3] {
        let quantize = |c: Channel| c.round().clamp(0.0, 255.0) as Byte;
        [quantize(self.red), quantize(self.green), quantize(self.blue)]
    }

    pub fn channels(&self) -> [Channel; 3] {
        [self.red, self.green, self.blue]
    }

    /// Largest absolute per-channel difference (L-infinity distance).
    pub fn max_channel_difference(&self, other: &Rgb) -> Channel {
        (self.red - other.red)
            .abs()
            .max((self.green - other.green).abs())
            .max((self.blue - other.blue).abs())
    }

    /// Squared Euclidean distance, used as the clustering metric.
    pub fn distance_squared(&self, other: &Rgb) -> Channel {
        let dr = self.red - other.red;
        let dg = self.green - other.green;
        let db = self.blue - other.blue;
        dr * dr + dg * dg + db * db
    }

    /// True when every channel is `<= threshold` or every channel is `>= 255 - threshold`.
    pub fn is_black_or_white(&self, threshold: u8) -> bool {
        let low = threshold as Channel;
        let high = 255.0 - threshold as Channel;
        let channels = self.channels();
        channels.iter().all(|&c| c <= low) || channels.iter().all(|&c| c >= high)
    }

    pub fn to_hsv(&self) -> Hsv {
        Hsv::from_rgb8(self.to_bytes())
    }
}

impl Bgr {
    pub fn new(blue: Channel, green: Channel, red: Channel) -> Self {
        Self { blue, green, red }
    }

    pub fn to_rgb(&self) -> Rgb {
        Rgb::new(self.red, self.green, self.blue)
    }
}

impl Hsv {
    pub fn new(hue: u8, saturation: u8, value: u8) -> Self {
        Self {
            hue,
            saturation,
            value,
        }
    }

    /// Converts an 8-bit RGB triple to 8-bit HSV.
    pub fn from_rgb8(rgb: [Byte; 3]) -> Self {
        let (r, g, b) = (rgb[0] as i32, rgb[1] as i32, rgb[2] as i32);
        let value = r.max(g).max(b);
        let minimum = r.min(g).min(b);
        let chroma = value - minimum;

        let half = 1 << (HSV_SHIFT - 1);
        let saturation = (chroma * saturation_div_table()[value as usize] + half) >> HSV_SHIFT;

        let sector_delta = if value == r {
            g - b
        } else if value == g {
            b - r + 2 * chroma
        } else {
            r - g + 4 * chroma
        };
        let mut hue = (sector_delta * hue_div_table()[chroma as usize] + half) >> HSV_SHIFT;
        if hue < 0 {
            hue += HUE_RANGE;
        }

        Self {
            hue: hue as u8,
            saturation: saturation as u8,
            value: value as u8,
        }
    }

    /// Inverse conversion. Lossy: 8-bit HSV cannot represent every RGB triple.
    pub fn to_rgb(&self) -> Rgb {
        let value = self.value as Channel / 255.0;
        let saturation = self.saturation as Channel / 255.0;
        let hue_degrees = (self.hue as Channel * 2.0) % 360.0;

        let chroma = value * saturation;
        let sector = hue_degrees / 60.0;
        let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
        let (r1, g1, b1) = match sector as u32 {
            0 => (chroma, x, 0.0),
            1 => (x, chroma, 0.0),
            2 => (0.0, chroma, x),
            3 => (0.0, x, chroma),
            4 => (x, 0.0, chroma),
            _ => (chroma, 0.0, x),
        };
        let m = value - chroma;
        let scale = |c: Channel| ((c + m) * 255.0).round();
        Rgb::new(scale(r1), scale(g1), scale(b1))
    }
}

impl ColorSample {
    pub fn to_rgb(&self) -> Rgb {
        match self {
            ColorSample::Rgb(rgb) => *rgb,
            ColorSample::Bgr(bgr) => bgr.to_rgb(),
            ColorSample::Hsv(hsv) => hsv.to_rgb(),
        }
    }

    pub fn to_hsv(&self) -> Hsv {
        match self {
            ColorSample::Hsv(hsv) => *hsv,
            other => other.to_rgb().to_hsv(),
        }
    }
}

impl From<Rgb> for ColorSample {
    fn from(rgb: Rgb) -> Self {
        ColorSample::Rgb(rgb)
    }
}

impl From<Bgr> for ColorSample {
    fn from(bgr: Bgr) -> Self {
        ColorSample::Bgr(bgr)
    }
}

impl From<Hsv> for ColorSample {
    fn from(hsv: Hsv) -> Self {
        ColorSample::Hsv(hsv)
    }
}

impl From<image::Rgb<u8>> for Rgb {
    fn from(pixel: image::Rgb<u8>) -> Self {
        Rgb::from_bytes(pixel.0)
    }
}

/// Free-function form of [`Rgb::is_black_or_white`].
pub fn is_black_or_white(sample: &Rgb, threshold: u8) -> bool {
    sample.is_black_or_white(threshold)
}
