use std::io::Cursor;
use std::path::Path;

use image::{
    DynamicImage, ImageError, ImageResult, RgbImage,
    codecs::{
        jpeg::JpegEncoder,
        png::{CompressionType, FilterType as PngFilter, PngEncoder},
    },
    error::{DecodingError, ImageFormatHint},
    imageops::{self, FilterType},
};
use tracing::debug;

/// Quality used when the caller asks for a plain JPEG re-encode.
pub const DEFAULT_JPEG_QUALITY: u8 = 95;
/// Default PNG compression level on the 0-9 scale.
pub const DEFAULT_PNG_COMPRESSION: u8 = 6;

/// Fixed parameters of the compressor.
pub const COMPRESSED_JPEG_QUALITY: u8 = 50;
pub const COMPRESSED_PNG_COMPRESSION: u8 = 5;

/// The two raster formats the service accepts and produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    /// Exact match on a declared MIME type; parameters are not stripped.
    pub fn from_declared_mime(value: &str) -> Option<Self> {
        match value {
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let extension = Path::new(file_name).extension()?.to_str()?;
        match extension.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn mime(self) -> mime::Mime {
        match self {
            Self::Jpeg => mime::IMAGE_JPEG,
            Self::Png => mime::IMAGE_PNG,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
        }
    }
}

/// Encoder selection plus its tuning knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Png { compression: u8 },
    Jpeg { quality: u8 },
}

impl OutputFormat {
    /// Plain re-encode with library defaults.
    pub fn standard(kind: ImageKind) -> Self {
        match kind {
            ImageKind::Jpeg => Self::Jpeg {
                quality: DEFAULT_JPEG_QUALITY,
            },
            ImageKind::Png => Self::Png {
                compression: DEFAULT_PNG_COMPRESSION,
            },
        }
    }

    /// Lossy re-encode used by the compressor.
    pub fn compressed(kind: ImageKind) -> Self {
        match kind {
            ImageKind::Jpeg => Self::Jpeg {
                quality: COMPRESSED_JPEG_QUALITY,
            },
            ImageKind::Png => Self::Png {
                compression: COMPRESSED_PNG_COMPRESSION,
            },
        }
    }

    pub fn kind(self) -> ImageKind {
        match self {
            Self::Jpeg { .. } => ImageKind::Jpeg,
            Self::Png { .. } => ImageKind::Png,
        }
    }
}

/// Maps a 0-9 zlib-style level onto the presets the PNG encoder exposes.
fn png_compression_type(level: u8) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Decodes any supported format into a 3-channel colour buffer. Alpha is
/// dropped.
pub fn decode_color_image(data: &[u8]) -> ImageResult<RgbImage> {
    let decoded = image::load_from_memory(data)?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err(ImageError::Decoding(DecodingError::new(
            ImageFormatHint::Unknown,
            "decoded image has no pixels",
        )));
    }

    debug!(
        "Decoded {}x{} image ({:?})",
        decoded.width(),
        decoded.height(),
        decoded.color()
    );

    Ok(decoded.to_rgb8())
}

/// Resizes to exactly `width` x `height` with bilinear filtering.
pub fn resize_exact(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    imageops::resize(image, width, height, FilterType::Triangle)
}

pub fn encode_image(image: RgbImage, format: OutputFormat) -> ImageResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    let image = DynamicImage::ImageRgb8(image);

    match format {
        OutputFormat::Jpeg { quality } => {
            debug!("Encoding output as JPEG (quality {}).", quality);
            let encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
            image.write_with_encoder(encoder)?;
        }
        OutputFormat::Png { compression } => {
            debug!("Encoding output as PNG (compression {}).", compression);
            let encoder = PngEncoder::new_with_quality(
                &mut buffer,
                png_compression_type(compression),
                PngFilter::Adaptive,
            );
            image.write_with_encoder(encoder)?;
        }
    }

    Ok(buffer.into_inner())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::Rgb;
    use tokio_test::{assert_err, assert_ok};

    /// Smooth gradient, compresses well.
    pub fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    /// Deterministic noise, the worst case for a lossy encoder.
    pub fn noise(width: u32, height: u32) -> RgbImage {
        let mut state: u32 = 0x2545_f491;
        RgbImage::from_fn(width, height, |_, _| {
            let mut next = || {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state >> 24) as u8
            };
            Rgb([next(), next(), next()])
        })
    }

    pub fn encode_png_fast(image: RgbImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        let encoder =
            PngEncoder::new_with_quality(&mut buffer, CompressionType::Fast, PngFilter::NoFilter);
        DynamicImage::ImageRgb8(image)
            .write_with_encoder(encoder)
            .unwrap();
        buffer.into_inner()
    }

    pub fn encode_jpeg(image: RgbImage, quality: u8) -> Vec<u8> {
        encode_image(image, OutputFormat::Jpeg { quality }).unwrap()
    }

    #[test]
    fn test_kind_from_declared_mime_is_exact() {
        assert_eq!(ImageKind::from_declared_mime("image/png"), Some(ImageKind::Png));
        assert_eq!(ImageKind::from_declared_mime("image/jpeg"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_declared_mime("image/jpg"), None);
        assert_eq!(ImageKind::from_declared_mime("image/png; q=1"), None);
        assert_eq!(ImageKind::from_declared_mime("IMAGE/PNG"), None);
        assert_eq!(ImageKind::from_declared_mime("image/svg+xml"), None);
    }

    #[test]
    fn test_kind_from_file_name() {
        assert_eq!(ImageKind::from_file_name("a.jpg"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_file_name("a.JPEG"), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::from_file_name("dir/a.b.png"), Some(ImageKind::Png));
        assert_eq!(ImageKind::from_file_name("a.svg"), None);
        assert_eq!(ImageKind::from_file_name("png"), None);
    }

    #[test]
    fn test_mime_round_trips_through_declared_mime() {
        for kind in [ImageKind::Jpeg, ImageKind::Png] {
            assert_eq!(ImageKind::from_declared_mime(kind.mime().as_ref()), Some(kind));
        }
    }

    #[test]
    fn test_png_compression_presets() {
        assert!(matches!(png_compression_type(0), CompressionType::Fast));
        assert!(matches!(png_compression_type(5), CompressionType::Default));
        assert!(matches!(png_compression_type(9), CompressionType::Best));
    }

    #[test]
    fn test_decode_drops_alpha() {
        let rgba = image::RgbaImage::from_pixel(4, 3, image::Rgba([10, 20, 30, 0]));
        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(rgba)
            .write_to(&mut buffer, image::ImageFormat::Png)
            .unwrap();

        let decoded = assert_ok!(decode_color_image(buffer.get_ref()));
        assert_eq!(decoded.dimensions(), (4, 3));
        assert_eq!(decoded.get_pixel(0, 0), &Rgb([10, 20, 30]));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert_err!(decode_color_image(b"definitely not an image"));
        assert_err!(decode_color_image(&[]));
    }

    #[test]
    fn test_encode_magic_numbers() {
        let jpeg = assert_ok!(encode_image(gradient(8, 8), OutputFormat::standard(ImageKind::Jpeg)));
        assert_eq!(&jpeg[0..2], &[0xFF, 0xD8]);

        let png = assert_ok!(encode_image(gradient(8, 8), OutputFormat::standard(ImageKind::Png)));
        assert_eq!(&png[0..8], &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
    }

    #[test]
    fn test_resize_exact_ignores_aspect_ratio() {
        let resized = resize_exact(&gradient(60, 40), 100, 100);
        assert_eq!(resized.dimensions(), (100, 100));
    }

    #[test]
    fn test_compressed_jpeg_is_smaller() {
        let original = encode_jpeg(noise(64, 64), 100);
        let decoded = decode_color_image(&original).unwrap();
        let compressed = encode_image(decoded, OutputFormat::compressed(ImageKind::Jpeg)).unwrap();
        assert!(compressed.len() < original.len());
    }
}
