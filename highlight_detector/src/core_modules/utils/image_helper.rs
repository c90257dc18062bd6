// Boundary helpers between the detector and whatever supplies or consumes image
// bytes. Everything that enters the pipeline is normalized to an RGB `RgbImage`
// here; a BGR capture buffer is channel-swapped before it can reach clustering.

pub mod image_helper {
    use crate::core_modules::color_space::ChannelOrder;
    use crate::error::{DetectorError, Result};
    use image::{ImageEncoder, RgbImage};
    use std::io::BufWriter;
    use std::path::Path;

    const CHANNELS: usize = 3;

    /// Builds an RGB image from interleaved 3-channel bytes.
    pub fn rgb_from_raw(width: u32, height: u32, bytes: &[u8], order: ChannelOrder) -> Result<RgbImage> {
        if width == 0 || height == 0 {
            return Err(DetectorError::invalid_image(format!(
                "image has zero pixels ({width}x{height})"
            )));
        }
        let expected = width as usize * height as usize * CHANNELS;
        if bytes.len() != expected {
            return Err(DetectorError::invalid_image(format!(
                "expected {expected} bytes for {width}x{height} pixels, got {}",
                bytes.len()
            )));
        }

        let mut buffer = bytes.to_vec();
        if order == ChannelOrder::Bgr {
            for pixel in buffer.chunks_mut(CHANNELS) {
                pixel.swap(0, 2);
            }
        }
        RgbImage::from_raw(width, height, buffer)
            .ok_or_else(|| DetectorError::invalid_image("buffer does not fit image dimensions"))
    }

    /// Decodes an encoded image (PNG, JPEG, ...) and normalizes it to RGB.
    pub fn decode(bytes: &[u8]) -> Result<RgbImage> {
        let image = image::load_from_memory(bytes)?.to_rgb8();
        non_empty(image)
    }

    pub fn load(path: &Path) -> Result<RgbImage> {
        let image = image::open(path)?.to_rgb8();
        non_empty(image)
    }

    pub fn save_png(path: &Path, image: &RgbImage) -> Result<()> {
        let output = BufWriter::new(std::fs::File::create(path)?);
        let encoder = image::codecs::png::PngEncoder::new(output);
        encoder.write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )?;
        Ok(())
    }

    /// PNG bytes of `image`, for transports that ship the crop in memory.
    pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        image::codecs::png::PngEncoder::new(&mut bytes).write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgb8,
        )?;
        Ok(bytes)
    }

    fn non_empty(image: RgbImage) -> Result<RgbImage> {
        if image.width() == 0 || image.height() == 0 {
            return Err(DetectorError::invalid_image("decoded image has zero pixels"));
        }
        Ok(image)
    }
}

#[cfg(test)]
mod tests {

    use super::image_helper::*;
    use crate::core_modules::color_space::ChannelOrder;
    use crate::error::DetectorError;
    use image::{Rgb, RgbImage};

    #[test]
    fn bgr_buffer_is_swapped() {
        let bytes = [255u8, 215, 179, 0, 0, 255];
        let image = rgb_from_raw(2, 1, &bytes, ChannelOrder::Bgr).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgb([179, 215, 255]));
        assert_eq!(image.get_pixel(1, 0), &Rgb([255, 0, 0]));
    }

    #[test]
    fn rgb_buffer_is_kept() {
        let bytes = [179u8, 215, 255];
        let image = rgb_from_raw(1, 1, &bytes, ChannelOrder::Rgb).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgb([179, 215, 255]));
    }

    #[test]
    fn wrong_length_and_zero_size_are_invalid() {
        let err = rgb_from_raw(2, 2, &[0u8; 11], ChannelOrder::Rgb).unwrap_err();
        assert!(matches!(err, DetectorError::InvalidImage { .. }));
        let err = rgb_from_raw(0, 2, &[], ChannelOrder::Rgb).unwrap_err();
        assert!(matches!(err, DetectorError::InvalidImage { .. }));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let err = decode(b"definitely not an image").unwrap_err();
        assert!(err.is_input_error());
    }

    #[test]
    fn png_encode_then_decode() {
        let image = RgbImage::from_fn(7, 3, |x, y| Rgb([x as u8 * 30, y as u8 * 80, 200]));
        let bytes = encode_png(&image).unwrap();
        assert_eq!(decode(&bytes).unwrap(), image);
    }

    #[test]
    fn save_then_load_png() {
        let path = std::env::temp_dir().join(format!("highlight_helper_{}.png", std::process::id()));
        let image = RgbImage::from_pixel(5, 4, Rgb([63, 99, 139]));
        save_png(&path, &image).expect("Error Saving File.");
        let loaded = load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, image);
    }
}
