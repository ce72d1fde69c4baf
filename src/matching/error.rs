use thiserror::Error;

/// A specialized `Result` type for matcher operations.
pub type MatchResult<T> = Result<T, MatchError>;

/// Precondition violations raised by the matchers.
///
/// None of these mean "no match": they indicate a pattern or template that does
/// not fit the captured image and must be fixed in the configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MatchError {
    #[error("Pattern point ({x}, {y}) lies outside the {width}x{height} screenshot")]
    PointOutOfBounds { x: u32, y: u32, width: u32, height: u32 },

    #[error("Template {template_width}x{template_height} does not fit in the {image_width}x{image_height} screenshot")]
    TemplateTooLarge {
        template_width: u32,
        template_height: u32,
        image_width: u32,
        image_height: u32,
    },

    #[error("Template '{name}' has zero width or height")]
    EmptyTemplate { name: String },

    #[error("Channel mismatch: template has {template} channels, screenshot has {screenshot}")]
    ChannelMismatch { template: u8, screenshot: u8 },

    #[error("Failed to load template image {path}: {description}")]
    TemplateLoadFailed { path: String, description: String },
}
