use std::path::{Path, PathBuf};

use tracing::error;

/// A decoded RGBA8 image. Loading never fails outward: a file that cannot be
/// read or decoded yields an empty image with [`Image::is_loaded`] false.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    path: PathBuf,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl Image {
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match image::open(path) {
            Ok(decoded) => {
                let rgba = decoded.into_rgba8();
                Self {
                    path: path.to_path_buf(),
                    width: rgba.width(),
                    height: rgba.height(),
                    pixels: rgba.into_raw(),
                }
            }
            Err(err) => {
                error!(path = %path.display(), "failed to load image: {err}");
                Self {
                    path: path.to_path_buf(),
                    width: 0,
                    height: 0,
                    pixels: Vec::new(),
                }
            }
        }
    }

    pub fn is_loaded(&self) -> bool {
        !self.pixels.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Rows top to bottom, four bytes per pixel.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}
