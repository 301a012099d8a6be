use std::{fmt, io::Cursor};

use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat};

/// A texture image. It keeps the encoded bytes it was decoded from, if any, so that they can be
/// written back without being re-encoded.
#[derive(Clone)]
pub struct Image {
    pixels: DynamicImage,
    format: Option<ImageFormat>,
    source: Option<Vec<u8>>,
}

impl Image {
    pub fn new(pixels: DynamicImage) -> Self {
        Self {
            pixels,
            format: None,
            source: None,
        }
    }

    /// Creates an image that remembers the encoding it was decoded from.
    pub fn with_source(pixels: DynamicImage, format: ImageFormat, source: Vec<u8>) -> Self {
        Self {
            pixels,
            format: Some(format),
            source: Some(source),
        }
    }

    pub fn pixels(&self) -> &DynamicImage {
        &self.pixels
    }

    /// The format the image reports itself as, if it was decoded from a file.
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    pub fn source(&self) -> Option<&[u8]> {
        self.source.as_deref()
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }
}

impl PartialEq for Image {
    fn eq(&self, other: &Self) -> bool {
        self.format == other.format
            && self.width() == other.width()
            && self.height() == other.height()
            && self.pixels.color() == other.pixels.color()
            && self.pixels.as_bytes() == other.pixels.as_bytes()
    }
}

impl fmt::Debug for Image {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("format", &self.format)
            .finish()
    }
}

/// Decodes and encodes texture images. It's an optional capability of the glTF codec: without
/// it, textures can be neither imported nor re-encoded on export.
pub trait ImageCodec: Send + Sync {
    /// Decodes an encoded image, e.g. the contents of a PNG file.
    fn decode(&self, bytes: &[u8]) -> Result<Image>;
    /// Encodes an image as PNG, the lossless format used when the original encoding can't be
    /// reused.
    fn encode_png(&self, image: &Image) -> Result<Vec<u8>>;
}

/// An [`ImageCodec`] backed by the `image` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct RasterCodec;

impl ImageCodec for RasterCodec {
    fn decode(&self, bytes: &[u8]) -> Result<Image> {
        let format = image::guess_format(bytes).context("Unrecognized image format")?;
        let pixels = image::load_from_memory_with_format(bytes, format)
            .with_context(|| format!("Failed to decode the {:?} image", format))?;
        Ok(Image::with_source(pixels, format, bytes.to_vec()))
    }

    fn encode_png(&self, image: &Image) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        image
            .pixels()
            .write_to(&mut cursor, ImageFormat::Png)
            .context("Failed to encode the image as PNG")?;
        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn png_round_trip() {
        let pixels = RgbaImage::from_pixel(2, 3, Rgba([10, 20, 30, 255]));
        let image = Image::new(DynamicImage::ImageRgba8(pixels));

        let bytes = RasterCodec.encode_png(&image).unwrap();
        let decoded = RasterCodec.decode(&bytes).unwrap();

        assert_eq!(Some(ImageFormat::Png), decoded.format());
        assert_eq!(Some(&bytes[..]), decoded.source());
        assert_eq!((2, 3), (decoded.width(), decoded.height()));
        assert_eq!(image.pixels().as_bytes(), decoded.pixels().as_bytes());
    }

    #[test]
    fn garbage() {
        assert!(RasterCodec.decode(b"definitely not an image").is_err());
    }
}
