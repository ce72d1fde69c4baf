//! Fixed-point pixel colour checks
//!
//! A pixel pattern is a short list of window-relative coordinates with the colour
//! each one is expected to have. It identifies dialogs and tab fingerprints that
//! never move, which makes it far cheaper than template matching.

use super::error::{MatchError, MatchResult};
use image::{Rgb, RgbImage};
use serde::{Deserialize, Serialize};

/// Default tolerance for scenario pixel patterns.
pub const DEFAULT_TOLERANCE: u8 = 7;

/// One window-relative coordinate and the colour expected there.
///
/// Serialized as `[x, y, r, g, b]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(u32, u32, u8, u8, u8)", into = "(u32, u32, u8, u8, u8)")]
pub struct PatternPoint {
    pub x: u32,
    pub y: u32,
    pub rgb: [u8; 3],
}

impl PatternPoint {
    pub const fn new(x: u32, y: u32, r: u8, g: u8, b: u8) -> Self {
        Self { x, y, rgb: [r, g, b] }
    }

    pub fn position(&self) -> (u32, u32) {
        (self.x, self.y)
    }
}

impl From<(u32, u32, u8, u8, u8)> for PatternPoint {
    fn from((x, y, r, g, b): (u32, u32, u8, u8, u8)) -> Self {
        Self::new(x, y, r, g, b)
    }
}

impl From<PatternPoint> for (u32, u32, u8, u8, u8) {
    fn from(p: PatternPoint) -> Self {
        (p.x, p.y, p.rgb[0], p.rgb[1], p.rgb[2])
    }
}

/// Ordered list of points that must all match.
pub type PixelPattern = Vec<PatternPoint>;

/// Channel-wise colour comparison: every channel within `tolerance`.
pub fn is_color_match(actual: Rgb<u8>, expected: [u8; 3], tolerance: u8) -> bool {
    actual
        .0
        .iter()
        .zip(expected.iter())
        .all(|(a, e)| a.abs_diff(*e) <= tolerance)
}

/// Check every point of `points` against `screenshot`.
///
/// Stops at the first mismatching point. An empty pattern matches. A point
/// outside the screenshot is a configuration error and is returned as such.
pub fn check_pixel_pattern(
    screenshot: &RgbImage,
    points: &[PatternPoint],
    tolerance: u8,
) -> MatchResult<bool> {
    for point in points {
        let actual = screenshot.get_pixel_checked(point.x, point.y).ok_or(
            MatchError::PointOutOfBounds {
                x: point.x,
                y: point.y,
                width: screenshot.width(),
                height: screenshot.height(),
            },
        )?;

        if !is_color_match(*actual, point.rgb, tolerance) {
            log::trace!(
                "Pixel mismatch at ({}, {}): expected {:?}, got {:?}",
                point.x,
                point.y,
                point.rgb,
                actual.0
            );
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb(rgb))
    }

    #[test]
    fn test_color_match_within_tolerance() {
        let expected = [100, 150, 200];
        for t in [0u8, 1, 5, 7, 20] {
            assert!(is_color_match(Rgb(expected), expected, t));
            let shifted = Rgb([100 + t, 150 - t, 200 + t / 2]);
            assert!(is_color_match(shifted, expected, t), "tolerance {t}");
        }
    }

    #[test]
    fn test_color_mismatch_one_past_tolerance() {
        let expected = [100, 150, 200];
        for t in [0u8, 3, 7] {
            assert!(!is_color_match(Rgb([100 + t + 1, 150, 200]), expected, t));
            assert!(!is_color_match(Rgb([100, 150 - t - 1, 200]), expected, t));
            assert!(!is_color_match(Rgb([100, 150, 200 + t + 1]), expected, t));
        }
    }

    #[test]
    fn test_exact_match_at_zero_tolerance_for_extremes() {
        for c in [[0, 0, 0], [255, 255, 255], [0, 255, 7]] {
            assert!(is_color_match(Rgb(c), c, 0));
        }
    }

    #[test]
    fn test_empty_pattern_matches() {
        let img = solid(4, 4, [1, 2, 3]);
        assert_eq!(check_pixel_pattern(&img, &[], 0), Ok(true));
    }

    #[test]
    fn test_pattern_fails_if_any_point_fails() {
        let mut img = solid(10, 10, [10, 20, 30]);
        img.put_pixel(3, 4, Rgb([200, 0, 0]));

        let good = vec![
            PatternPoint::new(0, 0, 10, 20, 30),
            PatternPoint::new(3, 4, 198, 2, 0),
        ];
        assert_eq!(check_pixel_pattern(&img, &good, 5), Ok(true));

        let bad = vec![
            PatternPoint::new(0, 0, 10, 20, 30),
            PatternPoint::new(3, 4, 10, 20, 30),
            PatternPoint::new(9, 9, 10, 20, 30),
        ];
        assert_eq!(check_pixel_pattern(&img, &bad, 5), Ok(false));
    }

    #[test]
    fn test_out_of_bounds_point_is_an_error() {
        let img = solid(10, 10, [0, 0, 0]);
        let points = vec![PatternPoint::new(10, 2, 0, 0, 0)];
        assert_eq!(
            check_pixel_pattern(&img, &points, 5),
            Err(MatchError::PointOutOfBounds {
                x: 10,
                y: 2,
                width: 10,
                height: 10
            })
        );
    }

    #[test]
    fn test_mismatch_short_circuits_before_out_of_bounds_point() {
        let img = solid(10, 10, [0, 0, 0]);
        let points = vec![
            PatternPoint::new(1, 1, 255, 255, 255),
            PatternPoint::new(50, 50, 0, 0, 0),
        ];
        assert_eq!(check_pixel_pattern(&img, &points, 5), Ok(false));
    }

    #[test]
    fn test_pattern_point_deserializes_from_array() {
        let points: PixelPattern = serde_json::from_str("[[5, 6, 1, 2, 3], [7, 8, 4, 5, 6]]").unwrap();
        assert_eq!(points[0], PatternPoint::new(5, 6, 1, 2, 3));
        assert_eq!(points[1].position(), (7, 8));
    }
}
