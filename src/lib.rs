//! dock-peek - Dock window previews for macOS
//!
//! Clicking (or hovering) an application's Dock icon shows thumbnails of all
//! of that application's windows; picking one activates, closes or snaps it.
//! The crate owns the global pointer-event tap and its permission watchdog,
//! the Dock icon hit tester, the window registry and the dispatch state
//! machine. Rendering of the preview itself is left to a [`ui::PreviewSurface`].

pub mod cli;
pub mod clock;
pub mod config;
pub mod logging;
pub mod macos;
pub mod models;
pub mod permissions;
pub mod services;
pub mod ui;

pub use models::*;
pub use services::*;

/// Result type alias for dock-peek operations
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to dock-peek operations
#[derive(thiserror::Error, Debug)]
pub enum DockPeekError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Window not found: {0}")]
    WindowNotFound(u32),

    #[error("Accessibility error: {0}")]
    AccessibilityError(String),

    #[error("macOS API error: {0}")]
    MacOSAPIError(String),

    #[error("Event tap unavailable: {0}")]
    TapUnavailable(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}
