//! Cheap face-area estimate for close-up detection.
//!
//! Counts skin-tone pixels (YCbCr box classifier) inside the central region
//! of a frame. A face close-up fills most of the centre with skin tones,
//! while product and scene shots rarely do. The close-up check treats it as
//! one vote among several.

use image::RgbImage;
use std::path::{Path, PathBuf};

use crate::error::{MediaError, MediaResult};

/// Fraction of each axis treated as the central region.
const CENTER_FRACTION: f64 = 0.6;

/// Whether an RGB pixel falls inside the skin-tone chroma box.
fn is_skin(r: u8, g: u8, b: u8) -> bool {
    let (r, g, b) = (r as f64, g as f64, b as f64);
    let y = 0.299 * r + 0.587 * g + 0.114 * b;
    let cb = 128.0 - 0.168_736 * r - 0.331_264 * g + 0.5 * b;
    let cr = 128.0 + 0.5 * r - 0.418_688 * g - 0.081_312 * b;
    y > 40.0 && (77.0..=127.0).contains(&cb) && (133.0..=173.0).contains(&cr)
}

/// Share of skin-tone pixels in the central region of `image`.
pub fn skin_ratio(image: &RgbImage) -> f64 {
    let (w, h) = image.dimensions();
    if w == 0 || h == 0 {
        return 0.0;
    }

    let cw = ((w as f64 * CENTER_FRACTION) as u32).max(1);
    let ch = ((h as f64 * CENTER_FRACTION) as u32).max(1);
    let x0 = (w - cw) / 2;
    let y0 = (h - ch) / 2;

    let mut skin = 0u64;
    for y in y0..y0 + ch {
        for x in x0..x0 + cw {
            let p = image.get_pixel(x, y);
            if is_skin(p[0], p[1], p[2]) {
                skin += 1;
            }
        }
    }

    skin as f64 / (cw as u64 * ch as u64) as f64
}

/// Estimate the face-area ratio of a frame image on disk.
pub async fn estimate_face_area_ratio(frame_path: impl AsRef<Path>) -> MediaResult<f64> {
    let path: PathBuf = frame_path.as_ref().to_path_buf();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path));
    }

    tokio::task::spawn_blocking(move || -> MediaResult<f64> {
        let image = image::open(&path)?.to_rgb8();
        Ok(skin_ratio(&image))
    })
    .await
    .map_err(|e| MediaError::internal(format!("face estimate task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_skin_classifier() {
        assert!(is_skin(224, 172, 150));
        assert!(!is_skin(30, 90, 200));
        assert!(!is_skin(10, 10, 10));
    }

    #[test]
    fn test_skin_ratio_full_skin() {
        let image = RgbImage::from_pixel(100, 100, Rgb([224, 172, 150]));
        assert!((skin_ratio(&image) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_skin_ratio_ignores_border() {
        let mut image = RgbImage::from_pixel(100, 100, Rgb([30, 90, 200]));
        for x in 0..10 {
            for y in 0..100 {
                image.put_pixel(x, y, Rgb([224, 172, 150]));
            }
        }
        assert_eq!(skin_ratio(&image), 0.0);
    }

    #[tokio::test]
    async fn test_estimate_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("frame.png");
        RgbImage::from_pixel(40, 40, Rgb([224, 172, 150])).save(&path).unwrap();
        let ratio = estimate_face_area_ratio(&path).await.unwrap();
        assert!(ratio > 0.9);
    }
}
