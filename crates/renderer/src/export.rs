//! PNG export of read-back frames.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};

use crate::api::{Readback, RowOrder};

/// `Mandelbrot-YYYYMMDD-HHMMSS.png` for the given local time.
pub fn timestamped_file_name(now: DateTime<Local>) -> String {
    now.format("Mandelbrot-%Y%m%d-%H%M%S.png").to_string()
}

/// RGBA8 pixels with the top row first, whatever order the backend returned.
pub fn top_down_pixels(readback: Readback) -> Vec<u8> {
    match readback.rows {
        RowOrder::TopDown => readback.pixels,
        RowOrder::BottomUp => {
            let row_len = readback.width as usize * 4;
            if row_len == 0 {
                return readback.pixels;
            }
            readback
                .pixels
                .chunks_exact(row_len)
                .rev()
                .flatten()
                .copied()
                .collect()
        }
    }
}

/// Writes a readback as PNG, creating parent directories as needed.
pub fn write_png(path: &Path, readback: Readback) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create export directory {}", parent.display()))?;
    }
    let (width, height) = (readback.width, readback.height);
    let pixels = top_down_pixels(readback);
    image::save_buffer_with_format(
        path,
        &pixels,
        width,
        height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn file_name_uses_local_timestamp() {
        let now = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(timestamped_file_name(now), "Mandelbrot-20240309-070501.png");
    }

    #[test]
    fn bottom_up_rows_are_reversed() {
        let readback = Readback {
            width: 1,
            height: 3,
            rows: RowOrder::BottomUp,
            pixels: vec![1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3],
        };
        assert_eq!(
            top_down_pixels(readback),
            vec![3, 3, 3, 3, 2, 2, 2, 2, 1, 1, 1, 1]
        );
    }

    #[test]
    fn png_round_trips_through_the_decoder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/frame.png");
        let readback = Readback {
            width: 2,
            height: 2,
            rows: RowOrder::BottomUp,
            pixels: vec![
                255, 0, 0, 255, 255, 0, 0, 255, // bottom
                0, 0, 255, 255, 0, 0, 255, 255, // top
            ],
        };
        write_png(&path, readback).unwrap();

        let decoded = image::open(&path).unwrap().into_rgba8();
        assert_eq!(decoded.dimensions(), (2, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(decoded.get_pixel(1, 1).0, [255, 0, 0, 255]);
    }
}
