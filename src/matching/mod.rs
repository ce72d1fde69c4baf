//! Screenshot matchers
//!
//! Two stateless checks are used by every scenario: fixed-point pixel colour
//! patterns and colour-masked template matching.

pub mod error;
pub mod hsv;
pub mod pixel;
pub mod region;
pub mod template;

pub use error::{MatchError, MatchResult};
pub use hsv::{HsvRange, mask_image};
pub use pixel::{PatternPoint, PixelPattern, check_pixel_pattern, is_color_match};
pub use region::SearchRegion;
pub use template::{
    DETECT_RETRY, MatchOptions, MatchRegion, TemplateImage, detect_pattern, detect_with_retry,
};
