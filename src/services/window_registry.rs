//! Window enumeration, AX handle resolution, thumbnails, and the three
//! window actions (activate, close, snap).
//!
//! Every public operation degrades instead of failing: a missing permission,
//! a vanished window or a refused AX call turns into an empty list, `None`,
//! or an outcome value, and is logged.

use crate::clock::{Clock, SystemClock};
use crate::config::RegistryConfig;
use crate::macos::{
    AccessibilityProvider, AxWindow, DisplayProvider, ProcessProvider, SystemAccessibility,
    SystemDisplayProvider, SystemProcesses, SystemWindowServer, WindowServer, WindowServerEntry,
    NORMAL_WINDOW_LAYER,
};
use crate::models::{Pid, Point, SnapPosition, Thumbnail, WindowId, WindowRecord};
use crate::services::thumbnail_cache::ThumbnailCache;
use crate::services::ttl_cache::TtlCache;
use crate::services::window_matcher::{match_window, MatchPolicy, MatchTier, ResolvedWindow};
use crate::trace_performance;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of [`WindowRegistry::activate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationOutcome {
    /// A specific window was brought forward, resolved at `tier`
    Window(MatchTier),
    /// No window could be resolved; the application was activated instead
    AppOnly,
    Failed,
}

/// Counters for registry activity
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct RegistryMetrics {
    pub window_list_fetches: u64,
    pub accessibility_fetches: u64,
    pub thumbnail_hits: u64,
    pub thumbnail_captures: u64,
    pub capture_failures: u64,
    pub activations: u64,
    pub closes: u64,
    pub snaps: u64,
    pub error_count: u64,
}

pub struct WindowRegistry {
    window_server: Box<dyn WindowServer>,
    accessibility: Box<dyn AccessibilityProvider>,
    processes: Arc<dyn ProcessProvider>,
    displays: Arc<dyn DisplayProvider>,
    clock: Arc<dyn Clock>,
    config: RegistryConfig,
    window_lists: TtlCache<Pid, Vec<WindowServerEntry>>,
    ax_windows: TtlCache<Pid, Vec<AxWindow>>,
    thumbnails: ThumbnailCache,
    metrics: RegistryMetrics,
}

impl WindowRegistry {
    pub fn new(
        window_server: Box<dyn WindowServer>,
        accessibility: Box<dyn AccessibilityProvider>,
        processes: Arc<dyn ProcessProvider>,
        displays: Arc<dyn DisplayProvider>,
        clock: Arc<dyn Clock>,
        config: RegistryConfig,
    ) -> Self {
        Self {
            window_server,
            accessibility,
            processes,
            displays,
            clock,
            thumbnails: ThumbnailCache::new(
                config.thumbnail_ttl,
                config.thumbnail_visible_ttl,
                config.thumbnail_capacity,
            ),
            config,
            window_lists: TtlCache::new(),
            ax_windows: TtlCache::new(),
            metrics: RegistryMetrics::default(),
        }
    }

    /// Registry wired to the live window server and accessibility API
    pub fn with_system_providers(config: RegistryConfig) -> Self {
        Self::new(
            Box::new(SystemWindowServer::new()),
            Box::new(SystemAccessibility::new()),
            Arc::new(SystemProcesses::new()),
            Arc::new(SystemDisplayProvider::new()),
            Arc::new(SystemClock),
            config,
        )
    }

    /// User-facing windows of `pid`, front to back.
    ///
    /// Normal-layer windows larger than 1x1 with non-zero alpha, restricted to
    /// on-screen ones unless `include_minimized`. When the AX standard-window
    /// list reports window ids, only windows present in it are kept; an empty
    /// AX list is treated as unavailable rather than as "no windows".
    pub fn windows_for_app(&mut self, pid: Pid, include_minimized: bool) -> Vec<WindowRecord> {
        let entries = self.window_entries(pid);
        let standard_ids: Vec<WindowId> = self
            .accessibility_windows(pid)
            .iter()
            .filter(|window| window.is_standard())
            .filter_map(|window| window.window_id)
            .collect();

        let records: Vec<WindowRecord> = entries
            .into_iter()
            .filter(|entry| {
                entry.layer == NORMAL_WINDOW_LAYER
                    && entry.bounds.size.width > 1.0
                    && entry.bounds.size.height > 1.0
                    && entry.alpha > 0.0
                    && (include_minimized || entry.is_on_screen)
            })
            .filter(|entry| standard_ids.is_empty() || standard_ids.contains(&entry.id))
            .map(|entry| WindowRecord {
                id: entry.id,
                title: entry.title.unwrap_or_default(),
                bounds: entry.bounds,
                pid: entry.pid,
                owner_name: entry.owner_name,
                is_on_screen: entry.is_on_screen,
                thumbnail: None,
            })
            .collect();

        debug!(
            event = "core.registry.enumerated",
            pid,
            include_minimized,
            count = records.len(),
            ax_filtered = !standard_ids.is_empty(),
        );
        records
    }

    /// Resolve the AX handle for `window_id` through the tiered matcher
    pub fn find_accessibility_handle(&mut self, window_id: WindowId, pid: Pid) -> Option<ResolvedWindow> {
        self.resolve(window_id, pid, MatchPolicy::Tiered)
    }

    fn resolve(&mut self, window_id: WindowId, pid: Pid, policy: MatchPolicy) -> Option<ResolvedWindow> {
        let candidates = self.accessibility_windows(pid);
        let target = self
            .window_entries(pid)
            .into_iter()
            .find(|entry| entry.id == window_id);

        let resolved = match_window(
            window_id,
            target.as_ref(),
            &candidates,
            policy,
            self.config.frame_tolerance,
        );
        match resolved {
            Some(resolved) => debug!(
                event = "core.registry.resolved",
                window_id,
                pid,
                tier = ?resolved.tier,
            ),
            None => debug!(event = "core.registry.unresolved", window_id, pid, ?policy),
        }
        resolved
    }

    /// Scaled capture of `window_id`, longer edge at most `max_size`.
    /// `None` when capture fails.
    pub fn thumbnail(&mut self, window_id: WindowId, max_size: u32) -> Option<Thumbnail> {
        let now = self.clock.now();
        if let Some(thumbnail) = self.thumbnails.get(window_id, now) {
            self.metrics.thumbnail_hits += 1;
            return Some(thumbnail);
        }

        let captured = trace_performance!("thumbnail_capture", {
            self.window_server.capture_window(window_id)
        });
        let Some(image) = captured else {
            self.metrics.capture_failures += 1;
            debug!(event = "core.registry.capture_failed", window_id);
            return None;
        };

        self.metrics.thumbnail_captures += 1;
        let thumbnail = Thumbnail::new(scale_to_fit(image, max_size));
        self.thumbnails.insert(window_id, thumbnail.clone(), now);
        Some(thumbnail)
    }

    /// Bring `window_id` forward, falling back to activating the application
    pub fn activate(&mut self, window_id: WindowId, pid: Pid) -> ActivationOutcome {
        self.metrics.activations += 1;

        let Some(resolved) = self.find_accessibility_handle(window_id, pid) else {
            return match self.processes.activate_app(pid) {
                Ok(()) => {
                    info!(event = "core.registry.activated_app", window_id, pid);
                    ActivationOutcome::AppOnly
                }
                Err(err) => {
                    self.metrics.error_count += 1;
                    warn!(event = "core.registry.activation_failed", window_id, pid, "{err:#}");
                    ActivationOutcome::Failed
                }
            };
        };

        if let Err(err) = self.processes.activate_with_window(pid, window_id) {
            debug!(window_id, pid, "window-aware activation refused, activating app: {err:#}");
            if let Err(err) = self.processes.activate_app(pid) {
                self.metrics.error_count += 1;
                warn!(pid, "application activation failed: {err:#}");
            }
        }
        if let Err(err) = self.accessibility.raise(resolved.key) {
            debug!(window_id, "raise failed: {err:#}");
        }
        if let Err(err) = self.accessibility.set_focused_window(pid, resolved.key) {
            debug!(window_id, "setting focused window failed: {err:#}");
        }

        info!(event = "core.registry.activated", window_id, pid, tier = ?resolved.tier);
        ActivationOutcome::Window(resolved.tier)
    }

    /// Press the window's close button. Only an exact identity match is
    /// acted on; anything else is a silent no-op. Returns whether the close
    /// button was pressed.
    pub fn close(&mut self, window_id: WindowId, pid: Pid) -> bool {
        let Some(resolved) = self.resolve(window_id, pid, MatchPolicy::IdentityOnly) else {
            return false;
        };

        match self.accessibility.press_close_button(resolved.key) {
            Ok(()) => {
                self.metrics.closes += 1;
                self.invalidate(pid);
                self.thumbnails.remove(window_id);
                info!(event = "core.registry.closed", window_id, pid);
                true
            }
            Err(err) => {
                debug!(event = "core.registry.close_failed", window_id, pid, "{err:#}");
                false
            }
        }
    }

    /// Move and resize the window to a half (or all) of the usable area of
    /// the display it is on, then activate it
    pub fn snap(&mut self, window_id: WindowId, pid: Pid, position: SnapPosition) -> bool {
        let Some(resolved) = self.find_accessibility_handle(window_id, pid) else {
            return false;
        };

        let origin = self
            .accessibility
            .frame(resolved.key)
            .map(|frame| frame.origin)
            .or_else(|| {
                self.window_entries(pid)
                    .into_iter()
                    .find(|entry| entry.id == window_id)
                    .map(|entry| entry.bounds.origin)
            })
            .unwrap_or(Point::new(0.0, 0.0));

        let Some(display) = self.displays.display_containing(origin) else {
            warn!(event = "core.registry.snap_failed", window_id, "no displays available");
            return false;
        };
        let target = position.target_in(display.visible_frame);

        if let Err(err) = self.accessibility.set_frame(resolved.key, target) {
            self.metrics.error_count += 1;
            warn!(event = "core.registry.snap_failed", window_id, pid, "{err:#}");
            return false;
        }

        self.metrics.snaps += 1;
        self.invalidate(pid);
        let display_id = display.id;
        info!(event = "core.registry.snapped", window_id, pid, %position, display_id);
        self.activate(window_id, pid);
        true
    }

    /// Thumbnails live longer while a preview is on screen
    pub fn set_preview_visible(&mut self, visible: bool) {
        self.thumbnails.set_preview_visible(visible);
    }

    /// Drop cached window and AX lists for `pid`
    pub fn invalidate(&mut self, pid: Pid) {
        self.window_lists.remove(&pid);
        self.ax_windows.remove(&pid);
    }

    pub fn metrics(&self) -> &RegistryMetrics {
        &self.metrics
    }

    pub fn cached_thumbnails(&self) -> usize {
        self.thumbnails.len()
    }

    fn window_entries(&mut self, pid: Pid) -> Vec<WindowServerEntry> {
        let now = self.clock.now();
        if let Some(entries) = self.window_lists.get(&pid, now, self.config.window_list_ttl) {
            return entries.clone();
        }

        self.metrics.window_list_fetches += 1;
        let list = trace_performance!("window_list", { self.window_server.window_list() });
        match list {
            Ok(list) => {
                let entries: Vec<WindowServerEntry> =
                    list.into_iter().filter(|entry| entry.pid == pid).collect();
                self.window_lists.prune_expired(now, self.config.window_list_ttl);
                self.window_lists.insert(pid, entries.clone(), now);
                entries
            }
            Err(err) => {
                self.metrics.error_count += 1;
                warn!(event = "core.registry.window_list_failed", pid, "{err:#}");
                Vec::new()
            }
        }
    }

    fn accessibility_windows(&mut self, pid: Pid) -> Vec<AxWindow> {
        let now = self.clock.now();
        if let Some(windows) = self.ax_windows.get(&pid, now, self.config.accessibility_ttl) {
            return windows.clone();
        }

        self.metrics.accessibility_fetches += 1;
        match self.accessibility.windows(pid) {
            Ok(windows) => {
                self.ax_windows.prune_expired(now, self.config.accessibility_ttl);
                self.ax_windows.insert(pid, windows.clone(), now);
                windows
            }
            Err(err) => {
                debug!(event = "core.registry.ax_unavailable", pid, "{err:#}");
                Vec::new()
            }
        }
    }
}

/// Shrink `image` so its longer edge is at most `max_size`, preserving the
/// aspect ratio. Images already small enough are returned as is.
pub fn scale_to_fit(image: RgbaImage, max_size: u32) -> RgbaImage {
    let (width, height) = image.dimensions();
    let longer = width.max(height);
    if max_size == 0 || longer <= max_size {
        return image;
    }

    let scale = max_size as f64 / longer as f64;
    let target_width = ((width as f64 * scale).round() as u32).max(1);
    let target_height = ((height as f64 * scale).round() as u32).max(1);
    imageops::resize(&image, target_width, target_height, FilterType::Triangle)
}
