use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::ColorType;
use tracing::debug;

use crate::api::{PendingRelease, ReleaseQueue, RendererApi, RowOrder, TextureHandle};
use crate::command::RenderCommand;
use crate::error::ResourceError;
use crate::types::{TextureFormat, TextureSpecification};

/// A 2D texture owned by the renderer.
#[derive(Debug)]
pub struct Texture2D {
    handle: TextureHandle,
    spec: TextureSpecification,
    path: Option<PathBuf>,
    releases: ReleaseQueue,
}

impl Texture2D {
    /// Allocates an uninitialised texture.
    pub fn new<B: RendererApi>(
        command: &mut RenderCommand<B>,
        spec: TextureSpecification,
    ) -> Result<Self> {
        if spec.generate_mips {
            debug!("mipmap generation requested; only the base level is allocated");
        }
        let handle = command.api_mut().create_texture(&spec)?;
        Ok(Self {
            handle,
            spec,
            path: None,
            releases: command.releases().clone(),
        })
    }

    /// Decodes an image file and uploads it.
    ///
    /// Grey, RGB and RGBA 8-bit images keep their channel layout; other
    /// 8/16-bit and float images are converted to RGBA8. Grey+alpha images are
    /// rejected. Rows are flipped for backends whose origin is bottom-left.
    /// Size and format of `template` are replaced by the image's.
    pub fn from_file<B: RendererApi>(
        command: &mut RenderCommand<B>,
        path: &Path,
        template: TextureSpecification,
    ) -> Result<Self> {
        let mut decoded =
            image::open(path).with_context(|| format!("failed to load texture {}", path.display()))?;
        if command.api().row_order() == RowOrder::BottomUp {
            image::imageops::flip_vertical_in_place(&mut decoded);
        }

        let (width, height) = (decoded.width(), decoded.height());
        let (format, pixels) = match decoded.color() {
            ColorType::L8 => (TextureFormat::R8, decoded.into_luma8().into_raw()),
            ColorType::La8 | ColorType::La16 => {
                return Err(ResourceError::UnsupportedChannels(2))
                    .with_context(|| format!("cannot upload {}", path.display()));
            }
            ColorType::Rgb8 => (TextureFormat::Rgb8, decoded.into_rgb8().into_raw()),
            ColorType::Rgba8 => (TextureFormat::Rgba8, decoded.into_rgba8().into_raw()),
            other => {
                debug!(?other, path = %path.display(), "converting texture to RGBA8");
                (TextureFormat::Rgba8, decoded.into_rgba8().into_raw())
            }
        };

        let spec = TextureSpecification {
            width,
            height,
            format,
            ..template
        };
        let mut texture = Self::new(command, spec)?;
        texture.set_data(command, &pixels)?;
        texture.path = Some(path.to_path_buf());
        debug!(path = %path.display(), width, height, ?format, "texture loaded");
        Ok(texture)
    }

    /// Replaces the full texture contents. `pixels` must match width × height × bytes per pixel.
    pub fn set_data<B: RendererApi>(
        &mut self,
        command: &mut RenderCommand<B>,
        pixels: &[u8],
    ) -> Result<()> {
        let expected = self.spec.byte_len();
        if pixels.len() != expected {
            return Err(ResourceError::SizeMismatch {
                expected,
                actual: pixels.len(),
            }
            .into());
        }
        command.api_mut().write_texture(self.handle, pixels)
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub fn specification(&self) -> &TextureSpecification {
        &self.spec
    }

    pub fn width(&self) -> u32 {
        self.spec.width
    }

    pub fn height(&self) -> u32 {
        self.spec.height
    }

    pub fn format(&self) -> TextureFormat {
        self.spec.format
    }

    /// Source file, for textures created with [`Texture2D::from_file`].
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Drop for Texture2D {
    fn drop(&mut self) {
        self.releases.push(PendingRelease::Texture(self.handle));
    }
}
