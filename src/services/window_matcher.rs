//! Maps a window server id onto one of the owning process's AX windows.
//!
//! The tiers are tried strictly in order; the first that produces a
//! candidate wins:
//!
//! 1. identity: the AX element reports the same window id
//! 2. title: exact, non-empty title equality
//! 3. geometry: position and size each within a per-axis tolerance
//! 4. first window: the process's first AX window, a last resort

use crate::macos::{AxWindow, ElementKey, WindowServerEntry};
use crate::models::WindowId;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Identity,
    Title,
    Geometry,
    FirstWindow,
}

/// Which tiers a caller accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPolicy {
    /// Destructive operations: only an authoritative id match will do
    IdentityOnly,
    Tiered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub key: ElementKey,
    pub tier: MatchTier,
}

pub fn match_window(
    window_id: WindowId,
    target: Option<&WindowServerEntry>,
    candidates: &[AxWindow],
    policy: MatchPolicy,
    tolerance: f64,
) -> Option<ResolvedWindow> {
    let resolved = |window: &AxWindow, tier| ResolvedWindow {
        key: window.key,
        tier,
    };

    if let Some(window) = candidates.iter().find(|w| w.window_id == Some(window_id)) {
        return Some(resolved(window, MatchTier::Identity));
    }
    if policy == MatchPolicy::IdentityOnly {
        return None;
    }

    if let Some(target) = target {
        if let Some(title) = target.title.as_deref().filter(|t| !t.is_empty()) {
            if let Some(window) = candidates
                .iter()
                .find(|w| w.title.as_deref() == Some(title))
            {
                return Some(resolved(window, MatchTier::Title));
            }
        }

        if let Some(window) = candidates.iter().find(|w| {
            w.frame
                .is_some_and(|frame| frame.approx_eq(&target.bounds, tolerance))
        }) {
            return Some(resolved(window, MatchTier::Geometry));
        }
    }

    candidates
        .first()
        .map(|window| resolved(window, MatchTier::FirstWindow))
}
