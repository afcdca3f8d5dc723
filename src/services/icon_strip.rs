//! Cheap geometric pre-filter for Dock clicks.
//!
//! The Dock reserves an edge of one display: the gap between that display's
//! full frame and its visible frame on the bottom, left or right side. Only
//! points inside such a gap are worth an accessibility hit test. The top gap
//! is the menu bar and never counts.
//!
//! An auto-hidden Dock reserves nothing, so when no display shows a side gap
//! a fixed band along the bottom, left and right edges of every display is
//! used instead.

use crate::macos::{DisplayGeometry, DisplayProvider};
use crate::models::{Point, Rect};
use std::sync::Arc;

/// Gaps narrower than this are rounding noise, not a Dock
const MIN_GAP: f64 = 1.0;

/// Screen regions that may host Dock icons
pub fn strip_regions(displays: &[DisplayGeometry], hidden_band: f64) -> Vec<Rect> {
    let reserved: Vec<Rect> = displays.iter().flat_map(reserved_gaps).collect();
    if !reserved.is_empty() {
        return reserved;
    }
    displays
        .iter()
        .flat_map(|display| edge_bands(display.frame, hidden_band))
        .collect()
}

pub fn in_icon_strip(displays: &[DisplayGeometry], point: Point, hidden_band: f64) -> bool {
    strip_regions(displays, hidden_band)
        .iter()
        .any(|region| region.contains(point))
}

fn reserved_gaps(display: &DisplayGeometry) -> Vec<Rect> {
    let frame = display.frame;
    let visible = display.visible_frame;
    let mut gaps = Vec::new();

    let bottom = frame.max_y() - visible.max_y();
    if bottom >= MIN_GAP {
        gaps.push(Rect::new(frame.min_x(), visible.max_y(), frame.size.width, bottom));
    }
    let left = visible.min_x() - frame.min_x();
    if left >= MIN_GAP {
        gaps.push(Rect::new(frame.min_x(), frame.min_y(), left, frame.size.height));
    }
    let right = frame.max_x() - visible.max_x();
    if right >= MIN_GAP {
        gaps.push(Rect::new(visible.max_x(), frame.min_y(), right, frame.size.height));
    }
    gaps
}

fn edge_bands(frame: Rect, band: f64) -> [Rect; 3] {
    let band_x = band.min(frame.size.width);
    let band_y = band.min(frame.size.height);
    [
        Rect::new(frame.min_x(), frame.max_y() - band_y, frame.size.width, band_y),
        Rect::new(frame.min_x(), frame.min_y(), band_x, frame.size.height),
        Rect::new(frame.max_x() - band_x, frame.min_y(), band_x, frame.size.height),
    ]
}

/// [`in_icon_strip`] against live display geometry
pub struct IconStripFilter {
    displays: Arc<dyn DisplayProvider>,
    hidden_band: f64,
}

impl IconStripFilter {
    pub fn new(displays: Arc<dyn DisplayProvider>, hidden_band: f64) -> Self {
        Self {
            displays,
            hidden_band,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        in_icon_strip(&self.displays.displays(), point, self.hidden_band)
    }
}
