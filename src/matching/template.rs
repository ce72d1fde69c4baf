//! Colour-masked template matching
//!
//! Both the template and the screenshot are reduced to the pixels inside an HSV
//! range (everything else becomes black) before the zero-mean normalized
//! correlation coefficient is taken.
//! That isolates a coloured feature such as town-name text from whatever scenery
//! happens to be behind it.

use super::error::{MatchError, MatchResult};
use super::hsv::{HsvRange, mask_image};
use super::region::SearchRegion;
use image::{DynamicImage, GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::definitions::Image;
use imageproc::integral_image::{integral_image, integral_squared_image, sum_image_pixels};
use imageproc::template_matching::find_extremes;
use std::borrow::Cow;
use std::path::Path;

/// How many times a scenario re-runs a template check before giving up.
pub const DETECT_RETRY: u32 = 3;

/// Channel count of every screenshot handed to the matchers.
const SCREENSHOT_CHANNELS: u8 = 3;

/// A reference image, masked once when it is loaded.
#[derive(Debug, Clone)]
pub struct TemplateImage {
    pub name: String,
    masked: RgbImage,
}

impl TemplateImage {
    /// Load a template from disk and mask it with `range` unless the file was
    /// already saved masked.
    pub fn load(path: &Path, range: &HsvRange, already_masked: bool) -> MatchResult<Self> {
        let image = image::open(path).map_err(|e| MatchError::TemplateLoadFailed {
            path: path.display().to_string(),
            description: e.to_string(),
        })?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();
        Self::from_dynamic(name, image, range, already_masked)
    }

    /// Build a template from a decoded image. Only colour images can be masked
    /// against an RGB screenshot; an alpha channel is dropped.
    pub fn from_dynamic(
        name: String,
        image: DynamicImage,
        range: &HsvRange,
        already_masked: bool,
    ) -> MatchResult<Self> {
        let channels = image.color().channel_count();
        if channels < SCREENSHOT_CHANNELS {
            return Err(MatchError::ChannelMismatch {
                template: channels,
                screenshot: SCREENSHOT_CHANNELS,
            });
        }
        Self::from_rgb(name, image.to_rgb8(), range, already_masked)
    }

    pub fn from_rgb(
        name: String,
        image: RgbImage,
        range: &HsvRange,
        already_masked: bool,
    ) -> MatchResult<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(MatchError::EmptyTemplate { name });
        }
        let masked = if already_masked {
            image
        } else {
            mask_image(&image, range)
        };
        Ok(Self { name, masked })
    }

    pub fn width(&self) -> u32 {
        self.masked.width()
    }

    pub fn height(&self) -> u32 {
        self.masked.height()
    }

    pub fn masked_image(&self) -> &RgbImage {
        &self.masked
    }
}

/// Location of a template match, relative to the window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub score: f32,
}

impl MatchRegion {
    /// A point inside the match box, given as fractions of its width and height.
    pub fn point_at_fraction(&self, fx: f32, fy: f32) -> (u32, u32) {
        (
            self.x + (self.width as f32 * fx) as u32,
            self.y + (self.height as f32 * fy) as u32,
        )
    }
}

/// Masking and threshold settings for one template check.
#[derive(Debug, Clone, Copy)]
pub struct MatchOptions<'a> {
    pub range: &'a HsvRange,
    pub threshold: f32,
    pub screenshot_is_masked: bool,
    pub search_region: Option<SearchRegion>,
}

/// Find the best position of `template` in `screenshot`.
///
/// Inputs that are not masked yet are masked with `range`. Returns the best
/// top-left position when its correlation coefficient reaches `threshold`,
/// otherwise `None`.
pub fn detect_pattern(
    template: &RgbImage,
    screenshot: &RgbImage,
    range: &HsvRange,
    template_is_masked: bool,
    screenshot_is_masked: bool,
    threshold: f32,
) -> MatchResult<Option<MatchRegion>> {
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 {
        return Err(MatchError::EmptyTemplate {
            name: "inline".to_string(),
        });
    }
    let (sw, sh) = screenshot.dimensions();
    if tw > sw || th > sh {
        return Err(MatchError::TemplateTooLarge {
            template_width: tw,
            template_height: th,
            image_width: sw,
            image_height: sh,
        });
    }

    let template_masked = masked(template, range, template_is_masked);
    let screenshot_masked = masked(screenshot, range, screenshot_is_masked);

    let template_gray: GrayImage = image::imageops::grayscale(template_masked.as_ref());
    let screenshot_gray: GrayImage = image::imageops::grayscale(screenshot_masked.as_ref());

    let scores = correlation_coefficients(&screenshot_gray, &template_gray);
    let extremes = find_extremes(&scores);
    let (x, y) = extremes.max_value_location;
    let score = extremes.max_value;
    log::trace!("Best template score {score:.3} at ({x}, {y}), threshold {threshold:.2}");

    Ok((score >= threshold).then_some(MatchRegion {
        x,
        y,
        width: tw,
        height: th,
        score,
    }))
}

/// Zero-mean normalized correlation of `template` at every position in `image`,
/// in -1.0..=1.0. A flat window or a flat template scores 0.
fn correlation_coefficients(image: &GrayImage, template: &GrayImage) -> Image<Luma<f32>> {
    let (tw, th) = template.dimensions();
    let n = u64::from(tw) * u64::from(th);
    let template_mean = template.pixels().map(|p| f64::from(p[0])).sum::<f64>() / n as f64;
    let centered: Vec<f64> = template
        .pixels()
        .map(|p| f64::from(p[0]) - template_mean)
        .collect();
    let template_energy: f64 = centered.iter().map(|v| v * v).sum();

    let sums = integral_image::<_, u64>(image);
    let squares = integral_squared_image::<_, u64>(image);

    ImageBuffer::from_fn(image.width() - tw + 1, image.height() - th + 1, |x, y| {
        let (right, bottom) = (x + tw - 1, y + th - 1);
        let sum = u128::from(sum_image_pixels(&sums, x, y, right, bottom)[0]);
        let square_sum = u128::from(sum_image_pixels(&squares, x, y, right, bottom)[0]);
        // n * window variance, kept in integers so a flat window is exactly zero
        let spread = u128::from(n) * square_sum - sum * sum;
        if spread == 0 || template_energy <= f64::EPSILON {
            return Luma([0.0]);
        }
        let window_energy = spread as f64 / n as f64;

        let mut cross = 0.0;
        for (dy, row) in centered.chunks(tw as usize).enumerate() {
            for (dx, t) in row.iter().enumerate() {
                cross += t * f64::from(image.get_pixel(x + dx as u32, y + dy as u32)[0]);
            }
        }
        let coefficient = cross / (template_energy * window_energy).sqrt();
        Luma([coefficient.clamp(-1.0, 1.0) as f32])
    })
}

fn masked<'a>(image: &'a RgbImage, range: &HsvRange, is_masked: bool) -> Cow<'a, RgbImage> {
    if is_masked {
        Cow::Borrowed(image)
    } else {
        Cow::Owned(mask_image(image, range))
    }
}

/// Match a loaded template, optionally inside a search region, retrying up to
/// `retries` times. The first success wins; there is no delay between attempts.
pub fn detect_with_retry(
    template: &TemplateImage,
    screenshot: &RgbImage,
    options: &MatchOptions<'_>,
    retries: u32,
) -> MatchResult<Option<MatchRegion>> {
    let region = options
        .search_region
        .unwrap_or_else(|| SearchRegion::full(screenshot.width(), screenshot.height()))
        .clip_to(screenshot.width(), screenshot.height());

    let cropped;
    let haystack = if region == SearchRegion::full(screenshot.width(), screenshot.height()) {
        screenshot
    } else {
        cropped = image::imageops::crop_imm(screenshot, region.x, region.y, region.width, region.height)
            .to_image();
        &cropped
    };

    for attempt in 1..=retries.max(1) {
        let found = detect_pattern(
            template.masked_image(),
            haystack,
            options.range,
            true,
            options.screenshot_is_masked,
            options.threshold,
        )?;
        if let Some(mut m) = found {
            log::debug!(
                "Template '{}' matched at ({}, {}) score {:.3} on attempt {attempt}",
                template.name,
                m.x + region.x,
                m.y + region.y,
                m.score
            );
            m.x += region.x;
            m.y += region.y;
            return Ok(Some(m));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    const GREEN: Rgb<u8> = Rgb([20, 220, 40]);

    /// Irregular green glyph on black, so shifted overlaps never correlate perfectly.
    fn glyph(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            if (x * 7 + y * 13 + x * y) % 5 < 2 || (x < 4 && y < height / 2) {
                GREEN
            } else {
                Rgb([0, 0, 0])
            }
        })
    }

    /// Noisy red/blue background with `patch` pasted at (px, py).
    fn scene(width: u32, height: u32, patch: &RgbImage, px: u32, py: u32) -> RgbImage {
        let mut img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([((x * 31 + y * 17) % 200) as u8 + 40, 10, ((x + y) % 90) as u8 + 100])
        });
        image::imageops::replace(&mut img, patch, px as i64, py as i64);
        img
    }

    #[test]
    fn test_finds_pasted_glyph() {
        let template = glyph(24, 16);
        let screenshot = scene(120, 90, &template, 50, 30);
        let found = detect_pattern(&template, &screenshot, &HsvRange::TOWN_NAME_GREEN, false, false, 0.9)
            .unwrap()
            .expect("glyph should match");

        assert_eq!((found.x, found.y), (50, 30));
        assert_eq!((found.width, found.height), (24, 16));
        assert!(found.score > 0.99, "score {}", found.score);
    }

    #[test]
    fn test_no_match_when_feature_absent() {
        let template = glyph(24, 16);
        let screenshot = scene(120, 90, &RgbImage::new(1, 1), 0, 0);
        let found =
            detect_pattern(&template, &screenshot, &HsvRange::TOWN_NAME_GREEN, false, false, 0.7).unwrap();
        assert!(found.is_none());
    }

    #[test]
    fn test_uniform_in_range_field_does_not_match() {
        let checker = RgbImage::from_fn(20, 10, |x, y| {
            if (x + y) % 2 == 0 { GREEN } else { Rgb([0, 0, 0]) }
        });
        let grass = RgbImage::from_pixel(100, 60, Rgb([30, 160, 40]));

        let found =
            detect_pattern(&checker, &grass, &HsvRange::TOWN_NAME_GREEN, false, false, 0.7).unwrap();
        assert!(found.is_none(), "matched {found:?}");

        let best = detect_pattern(&checker, &grass, &HsvRange::TOWN_NAME_GREEN, false, false, -1.0)
            .unwrap()
            .unwrap();
        assert_eq!(best.score, 0.0);
    }

    #[test]
    fn test_glyph_found_on_in_range_background() {
        let template = glyph(24, 16);
        let mut screenshot = RgbImage::from_pixel(120, 90, Rgb([30, 160, 40]));
        image::imageops::replace(&mut screenshot, &template, 40, 50);

        let found = detect_pattern(&template, &screenshot, &HsvRange::TOWN_NAME_GREEN, false, false, 0.9)
            .unwrap()
            .expect("glyph should match");
        assert_eq!((found.x, found.y), (40, 50));
    }

    #[test]
    fn test_threshold_is_monotonic() {
        let template = glyph(20, 12);
        let mut screenshot = scene(100, 60, &template, 10, 20);
        // Damage part of the glyph so the best score sits below 1.0
        for x in 10..16 {
            for y in 20..26 {
                screenshot.put_pixel(x, y, Rgb([0, 0, 0]));
            }
        }
        let score = detect_pattern(&template, &screenshot, &HsvRange::TOWN_NAME_GREEN, false, false, 0.0)
            .unwrap()
            .expect("some best position always exists")
            .score;

        for theta in [score, score - 0.1, score - 0.3, 0.0] {
            let found =
                detect_pattern(&template, &screenshot, &HsvRange::TOWN_NAME_GREEN, false, false, theta)
                    .unwrap();
            assert!(found.is_some(), "should match at threshold {theta}");
        }
        let above = detect_pattern(
            &template,
            &screenshot,
            &HsvRange::TOWN_NAME_GREEN,
            false,
            false,
            score + 0.01,
        )
        .unwrap();
        assert!(above.is_none());
    }

    #[test]
    fn test_template_larger_than_screenshot_is_an_error() {
        let template = glyph(50, 50);
        let screenshot = RgbImage::new(40, 40);
        let err = detect_pattern(&template, &screenshot, &HsvRange::TOWN_NAME_GREEN, false, false, 0.7)
            .unwrap_err();
        assert!(matches!(err, MatchError::TemplateTooLarge { .. }));
    }

    #[test]
    fn test_grayscale_template_is_rejected() {
        let gray = DynamicImage::ImageLuma8(GrayImage::new(8, 8));
        let err = TemplateImage::from_dynamic("gray".into(), gray, &HsvRange::TOWN_NAME_GREEN, false)
            .unwrap_err();
        assert_eq!(
            err,
            MatchError::ChannelMismatch {
                template: 1,
                screenshot: 3
            }
        );
    }

    #[test]
    fn test_rgba_template_is_accepted() {
        let rgba = DynamicImage::ImageRgba8(image::RgbaImage::new(8, 8));
        let template =
            TemplateImage::from_dynamic("rgba".into(), rgba, &HsvRange::TOWN_NAME_GREEN, false).unwrap();
        assert_eq!((template.width(), template.height()), (8, 8));
    }

    #[test]
    fn test_retry_reports_window_coordinates_inside_search_region() {
        let raw = glyph(24, 16);
        let template =
            TemplateImage::from_rgb("town".into(), raw.clone(), &HsvRange::TOWN_NAME_GREEN, false).unwrap();
        let screenshot = scene(160, 100, &raw, 90, 60);
        let options = MatchOptions {
            range: &HsvRange::TOWN_NAME_GREEN,
            threshold: 0.9,
            screenshot_is_masked: false,
            search_region: Some(SearchRegion::new(80, 50, 60, 40)),
        };
        let found = detect_with_retry(&template, &screenshot, &options, DETECT_RETRY)
            .unwrap()
            .unwrap();
        assert_eq!((found.x, found.y), (90, 60));
    }

    #[test]
    fn test_match_region_fraction_point() {
        let region = MatchRegion {
            x: 120,
            y: 80,
            width: 40,
            height: 30,
            score: 1.0,
        };
        assert_eq!(region.point_at_fraction(0.25, 0.5), (130, 95));
        assert_eq!(region.point_at_fraction(0.75, 0.5), (150, 95));
    }
}
