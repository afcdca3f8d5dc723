//! Fixed timing and sizing policy for the core services

use std::time::Duration;

/// Cache lifetimes and bounds used by the window registry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegistryConfig {
    /// Lifetime of a per-pid window list snapshot
    pub window_list_ttl: Duration,
    /// Lifetime of a per-pid AX window list
    pub accessibility_ttl: Duration,
    pub thumbnail_ttl: Duration,
    /// Thumbnail lifetime while the preview surface is on screen
    pub thumbnail_visible_ttl: Duration,
    pub thumbnail_capacity: usize,
    /// Per-axis tolerance for frame matching, in points
    pub frame_tolerance: f64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            window_list_ttl: Duration::from_millis(400),
            accessibility_ttl: Duration::from_millis(400),
            thumbnail_ttl: Duration::from_secs(5),
            thumbnail_visible_ttl: Duration::from_secs(30),
            thumbnail_capacity: 30,
            frame_tolerance: 5.0,
        }
    }
}

/// Click and hover handling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispatchConfig {
    /// Minimum spacing between accepted clicks
    pub debounce: Duration,
    /// Time allowed for the pointer to cross from the icon to the preview
    pub hover_grace: Duration,
    /// Pointer sampling period for the hover trigger
    pub hover_poll_interval: Duration,
    /// Ancestors visited when looking for the Dock tile of a hit element
    pub max_ancestor_hops: usize,
    /// Band along the screen edges treated as the icon strip when no
    /// display reserves space for the Dock (auto-hide)
    pub hidden_strip_band: f64,
    /// Thumbnails captured per main loop iteration while a preview is being
    /// populated; the event tap is serviced between iterations
    pub thumbnails_per_pump: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            hover_grace: Duration::from_millis(300),
            hover_poll_interval: Duration::from_millis(50),
            max_ancestor_hops: 5,
            hidden_strip_band: 100.0,
            thumbnails_per_pump: 1,
        }
    }
}

/// Event tap supervision
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterConfig {
    /// Permission re-check period of the watchdog thread
    pub watchdog_period: Duration,
    /// How often the main loop retries installing the tap while inactive
    pub reinstall_interval: Duration,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            watchdog_period: Duration::from_millis(250),
            reinstall_interval: Duration::from_secs(2),
        }
    }
}
