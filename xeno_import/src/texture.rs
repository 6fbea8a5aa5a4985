use std::{fs, io, path::Path};

use image::{ImageFormat, RgbaImage};
use thiserror::Error;
use tracing::{debug, warn};

use xeno_mxmd::{Texture, TextureFormat};

/// Options of a texture extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExtractParams {
    /// Rebuild the blue channel of two channel normal maps.
    pub alternate_channel_packing: bool,
    /// Decode DDS payloads to PNG.
    pub force_uncompressed: bool,
}

/// Writes embedded textures to disk.
///
/// Runs on a worker thread while the scene is built.
pub trait TextureExtractor: Sync {
    /// Writes every texture to `dir` as `<name>.png` or `<name>.dds`.
    ///
    /// # Errors
    ///
    /// Returns `Err` only if nothing can be written, failures of single textures are
    /// logged and skipped.
    fn extract_all(
        &self,
        textures: &[Texture],
        dir: &Path,
        params: ExtractParams,
    ) -> Result<(), TextureError>;
}

#[derive(Debug, Error, Clone, Hash, PartialEq, Eq)]
#[error("texture `{path}`: {error}")]
pub struct TextureError {
    path: String,
    error: TextureErrorInner,
}

impl TextureError {
    pub fn new(path: &Path, error: impl Into<TextureErrorInner>) -> Self {
        Self {
            path: path.display().to_string(),
            error: error.into(),
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn error(&self) -> &TextureErrorInner {
        &self.error
    }
}

#[derive(Debug, Error, Clone, Hash, PartialEq, Eq)]
pub enum TextureErrorInner {
    #[error("io error: {0}")]
    Io(String),
    #[error("image error: {0}")]
    Image(String),
    #[error("{format:?} payload of {len} bytes doesn't fit {width}x{height}")]
    InvalidSize {
        format: TextureFormat,
        len: usize,
        width: u32,
        height: u32,
    },
    #[error("unsupported texture format {0:?}")]
    UnsupportedFormat(TextureFormat),
}

impl From<io::Error> for TextureErrorInner {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<image::ImageError> for TextureErrorInner {
    fn from(err: image::ImageError) -> Self {
        Self::Image(err.to_string())
    }
}

/// Writes textures to the file system with the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsTextureExtractor;

impl TextureExtractor for FsTextureExtractor {
    fn extract_all(
        &self,
        textures: &[Texture],
        dir: &Path,
        params: ExtractParams,
    ) -> Result<(), TextureError> {
        fs::create_dir_all(dir).map_err(|err| TextureError::new(dir, err))?;

        let mut written = 0;
        for texture in textures {
            match extract(texture, dir, params) {
                Ok(()) => written += 1,
                Err(err) => warn!("{}", err),
            }
        }

        debug!(
            "extracted {} of {} textures to `{}`",
            written,
            textures.len(),
            dir.display()
        );

        Ok(())
    }
}

fn invalid_size(texture: &Texture) -> TextureErrorInner {
    TextureErrorInner::InvalidSize {
        format: texture.format,
        len: texture.data.len(),
        width: texture.width,
        height: texture.height,
    }
}

fn unorm_to_snorm(value: u8) -> f32 {
    f32::from(value) / 255.0 * 2.0 - 1.0
}

fn snorm_to_unorm(value: f32) -> u8 {
    ((value + 1.0) * 0.5 * 255.0).round().clamp(0.0, 255.0) as u8
}

/// Expands a two channel texture to RGBA, with blue set to the normal's Z if `rebuild_z`.
fn expand_rg8(texture: &Texture, rebuild_z: bool) -> Result<RgbaImage, TextureErrorInner> {
    let pixels = texture.width as usize * texture.height as usize;
    if texture.data.len() < pixels * 2 {
        return Err(invalid_size(texture));
    }

    let data = texture.data[..pixels * 2]
        .chunks_exact(2)
        .flat_map(|rg| {
            let blue = if rebuild_z {
                let x = unorm_to_snorm(rg[0]);
                let y = unorm_to_snorm(rg[1]);
                snorm_to_unorm((1.0 - x * x - y * y).max(0.0).sqrt())
            } else {
                0
            };
            [rg[0], rg[1], blue, u8::MAX]
        })
        .collect();

    RgbaImage::from_raw(texture.width, texture.height, data).ok_or_else(|| invalid_size(texture))
}

fn rgba8(texture: &Texture) -> Result<RgbaImage, TextureErrorInner> {
    let len = texture.width as usize * texture.height as usize * 4;
    let data = texture
        .data
        .get(..len)
        .ok_or_else(|| invalid_size(texture))?;

    RgbaImage::from_raw(texture.width, texture.height, data.to_vec())
        .ok_or_else(|| invalid_size(texture))
}

fn extract(texture: &Texture, dir: &Path, params: ExtractParams) -> Result<(), TextureError> {
    let png_path = dir.join(format!("{}.png", texture.name));
    let dds_path = dir.join(format!("{}.dds", texture.name));

    let image = match texture.format {
        TextureFormat::Rgba8 => rgba8(texture),
        TextureFormat::Rg8 => expand_rg8(texture, params.alternate_channel_packing),
        TextureFormat::Dds if params.force_uncompressed => {
            match image::load_from_memory_with_format(texture.data, ImageFormat::Dds) {
                Ok(image) => Ok(image.to_rgba8()),
                Err(err) => {
                    debug!(
                        "couldn't decode `{}`, writing dds instead: {}",
                        texture.name, err
                    );
                    return fs::write(&dds_path, texture.data)
                        .map_err(|err| TextureError::new(&dds_path, err));
                }
            }
        }
        TextureFormat::Dds => {
            return fs::write(&dds_path, texture.data)
                .map_err(|err| TextureError::new(&dds_path, err));
        }
        format @ TextureFormat::Unknown(_) => Err(TextureErrorInner::UnsupportedFormat(format)),
    }
    .map_err(|err| TextureError::new(&png_path, err))?;

    image
        .save_with_format(&png_path, ImageFormat::Png)
        .map_err(|err| TextureError::new(&png_path, err))
}
