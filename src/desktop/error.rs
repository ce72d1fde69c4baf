use thiserror::Error;

/// A specialized `Result` type for desktop operations.
pub type DesktopResult<T> = Result<T, DesktopError>;

/// Failures of the OS-facing collaborators.
///
/// All of these are transient from the engine's point of view: the window or
/// tab is skipped for this tick and retried on the next one.
#[derive(Debug, Error)]
pub enum DesktopError {
    #[error("Window enumeration failed: {description}")]
    EnumerationFailed { description: String },

    #[error("Window '{title}' is no longer available")]
    WindowGone { title: String },

    #[error("Failed to focus window '{title}': {description}")]
    FocusFailed { title: String, description: String },

    #[error("Screenshot of window '{title}' failed: {description}")]
    CaptureFailed { title: String, description: String },

    #[error("Input synthesis failed: {description}")]
    InputFailed { description: String },

    #[error("This operation is not supported on this platform: {operation}")]
    Unsupported { operation: String },
}
