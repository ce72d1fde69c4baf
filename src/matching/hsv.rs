//! HSV colour range masking
//!
//! Uses the 8-bit OpenCV convention (hue 0..=179, saturation and value 0..=255) so
//! ranges authored with the usual colour-picker tooling can be pasted unchanged.

use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Closed HSV range, checked per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HsvRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HsvRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| self.lower[c] <= hsv[c] && hsv[c] <= self.upper[c])
    }

    /// Green town-name text.
    pub const TOWN_NAME_GREEN: HsvRange = HsvRange::new([53, 53, 8], [71, 255, 255]);
}

impl Default for HsvRange {
    fn default() -> Self {
        Self::TOWN_NAME_GREEN
    }
}

/// Convert one RGB pixel to 8-bit HSV.
pub fn rgb_to_hsv(rgb: Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = rgb.0.map(f32::from);
    let v = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = v - min;

    let s = if v > 0.0 { delta * 255.0 / v } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if v == r {
        60.0 * (g - b) / delta
    } else if v == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    let h = (h / 2.0).round().min(179.0) as u8;
    [h, s.round() as u8, v as u8]
}

/// Zero every pixel whose HSV value falls outside `range`; keep the rest untouched.
///
/// Applying the same range twice gives the same image as applying it once.
pub fn mask_image(image: &RgbImage, range: &HsvRange) -> RgbImage {
    let mut masked = image.clone();
    for pixel in masked.pixels_mut() {
        if !range.contains(rgb_to_hsv(*pixel)) {
            *pixel = Rgb([0, 0, 0]);
        }
    }
    masked
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_colors() {
        assert_eq!(rgb_to_hsv(Rgb([255, 0, 0])), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(Rgb([0, 255, 0])), [60, 255, 255]);
        assert_eq!(rgb_to_hsv(Rgb([0, 0, 255])), [120, 255, 255]);
        assert_eq!(rgb_to_hsv(Rgb([0, 0, 0])), [0, 0, 0]);
        assert_eq!(rgb_to_hsv(Rgb([128, 128, 128])), [0, 0, 128]);
    }

    #[test]
    fn test_mask_keeps_green_and_drops_the_rest() {
        let mut img = RgbImage::from_pixel(3, 1, Rgb([200, 30, 30]));
        img.put_pixel(1, 0, Rgb([20, 220, 40]));
        let masked = mask_image(&img, &HsvRange::TOWN_NAME_GREEN);

        assert_eq!(masked.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(masked.get_pixel(1, 0), &Rgb([20, 220, 40]));
        assert_eq!(masked.get_pixel(2, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_mask_is_idempotent() {
        let img = RgbImage::from_fn(32, 32, |x, y| {
            Rgb([(x * 8) as u8, (y * 8) as u8, ((x + y) * 4) as u8])
        });
        for range in [
            HsvRange::TOWN_NAME_GREEN,
            HsvRange::new([0, 0, 0], [179, 255, 255]),
            HsvRange::new([0, 0, 0], [30, 120, 200]),
        ] {
            let once = mask_image(&img, &range);
            assert_eq!(mask_image(&once, &range), once);
        }
    }
}
