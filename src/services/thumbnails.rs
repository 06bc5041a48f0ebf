//! Derivative images generated next to local uploads.
//!
//! | Variant | Name | Operation |
//! |---|---|---|
//! | thumbnail | `{stem}-thumb.jpg` | 400x300 cover fit, center crop, JPEG q80 |
//! | medium | `{stem}-med.jpg` | width capped at 1200, never enlarged, JPEG q86 |

use std::{
    fs::File,
    io::BufWriter,
    path::Path,
};

use image::{
    DynamicImage, ImageDecoder, ImageFormat, ImageReader, codecs::jpeg::JpegEncoder,
    imageops::FilterType,
};

use crate::{
    error::{AppError, Result},
    validation::names::{medium_name, thumb_name},
};

/// Parameters of the generated variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSpec {
    pub thumb_width: u32,
    pub thumb_height: u32,
    pub thumb_quality: u8,
    pub medium_max_width: u32,
    pub medium_quality: u8,
}

impl Default for ThumbnailSpec {
    fn default() -> Self {
        Self {
            thumb_width: 400,
            thumb_height: 300,
            thumb_quality: 80,
            medium_max_width: 1200,
            medium_quality: 86,
        }
    }
}

/// File names of the variants written for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivatives {
    pub thumb: String,
    pub medium: String,
}

/// The thumbnail capability, present only when image encoding is usable.
#[derive(Debug, Clone, Copy)]
pub struct Thumbnailer {
    spec: ThumbnailSpec,
}

impl Thumbnailer {
    /// Resolves the capability once at startup.
    pub fn probe(enabled: bool) -> Option<Self> {
        if !enabled {
            tracing::info!("Thumbnail generation disabled by configuration");
            return None;
        }
        if !ImageFormat::Jpeg.writing_enabled() {
            tracing::info!("JPEG encoder not available; thumbnail generation disabled");
            return None;
        }
        Some(Self::new(ThumbnailSpec::default()))
    }

    pub fn new(spec: ThumbnailSpec) -> Self {
        Self { spec }
    }

    /// Writes both variants next to `source` on the blocking pool.
    pub async fn generate(&self, source: &Path) -> Result<Derivatives> {
        let spec = self.spec;
        let source = source.to_path_buf();
        tokio::task::spawn_blocking(move || generate_blocking(&spec, &source))
            .await
            .map_err(|e| AppError::Internal(format!("thumbnail task failed: {}", e)))?
    }
}

fn generate_blocking(spec: &ThumbnailSpec, source: &Path) -> Result<Derivatives> {
    let name = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| AppError::Internal(format!("bad upload path {}", source.display())))?;
    let dir = source.parent().unwrap_or_else(|| Path::new("."));

    let image = load_oriented(source)?;

    let derivatives = Derivatives {
        thumb: thumb_name(name),
        medium: medium_name(name),
    };

    let thumb = image.resize_to_fill(spec.thumb_width, spec.thumb_height, FilterType::Lanczos3);
    write_jpeg(&thumb, &dir.join(&derivatives.thumb), spec.thumb_quality)?;

    let medium = if image.width() > spec.medium_max_width {
        let height = scaled_height(image.width(), image.height(), spec.medium_max_width);
        image.resize_exact(spec.medium_max_width, height, FilterType::Lanczos3)
    } else {
        image
    };
    write_jpeg(&medium, &dir.join(&derivatives.medium), spec.medium_quality)?;

    Ok(derivatives)
}

/// Height preserving the aspect ratio when `width` is scaled to `target_width`.
fn scaled_height(width: u32, height: u32, target_width: u32) -> u32 {
    let scaled = (height as f64 * target_width as f64 / width as f64).round() as u32;
    scaled.max(1)
}

/// Decodes `path` and applies its EXIF orientation.
fn load_oriented(path: &Path) -> Result<DynamicImage> {
    let decode_error =
        |e: image::ImageError| AppError::Internal(format!("decode {}: {}", path.display(), e));

    let mut decoder = ImageReader::open(path)?
        .with_guessed_format()?
        .into_decoder()
        .map_err(decode_error)?;
    let orientation = decoder.orientation().map_err(decode_error)?;
    let mut image = DynamicImage::from_decoder(decoder).map_err(decode_error)?;
    image.apply_orientation(orientation);
    Ok(image)
}

fn write_jpeg(image: &DynamicImage, path: &Path, quality: u8) -> Result<()> {
    let writer = BufWriter::new(File::create(path)?);
    let encoder = JpegEncoder::new_with_quality(writer, quality);
    image
        .to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| AppError::Internal(format!("encode {}: {}", path.display(), e)))
}
