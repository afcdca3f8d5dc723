//! macOS permission state for dock-peek
//!
//! Accessibility access is required: without it neither the event tap nor
//! the Dock hit test work. Screen recording is optional; without it
//! thumbnails are simply absent.

use crate::macos::permissions::{self as os, PrivacyPane};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Answers "is this process trusted right now?". Implementations must be
/// cheap and callable from any thread; the event callback and the
/// permission watchdog both poll it.
pub trait PermissionProvider: Send + Sync {
    fn accessibility_granted(&self) -> bool;

    fn screen_recording_granted(&self) -> bool {
        true
    }
}

/// Live permission state from the OS
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPermissions;

impl PermissionProvider for SystemPermissions {
    fn accessibility_granted(&self) -> bool {
        os::is_accessibility_permission_granted()
    }

    fn screen_recording_granted(&self) -> bool {
        os::is_screen_recording_permission_granted()
    }
}

/// Permission state that can be flipped at runtime, from any thread
#[derive(Debug)]
pub struct PermissionFlag {
    accessibility: AtomicBool,
    screen_recording: AtomicBool,
}

impl PermissionFlag {
    pub fn new(accessibility: bool) -> Self {
        Self {
            accessibility: AtomicBool::new(accessibility),
            screen_recording: AtomicBool::new(true),
        }
    }

    pub fn granted() -> Arc<Self> {
        Arc::new(Self::new(true))
    }

    pub fn set_accessibility(&self, granted: bool) {
        self.accessibility.store(granted, Ordering::SeqCst);
    }

    pub fn set_screen_recording(&self, granted: bool) {
        self.screen_recording.store(granted, Ordering::SeqCst);
    }

    pub fn revoke(&self) {
        self.set_accessibility(false);
    }
}

impl PermissionProvider for PermissionFlag {
    fn accessibility_granted(&self) -> bool {
        self.accessibility.load(Ordering::SeqCst)
    }

    fn screen_recording_granted(&self) -> bool {
        self.screen_recording.load(Ordering::SeqCst)
    }
}

/// Permissions dock-peek asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionType {
    /// Event interception and Dock / window accessibility
    Accessibility,
    /// Window thumbnails (optional)
    ScreenRecording,
}

impl PermissionType {
    pub fn is_required(self) -> bool {
        matches!(self, PermissionType::Accessibility)
    }

    fn pane(self) -> PrivacyPane {
        match self {
            PermissionType::Accessibility => PrivacyPane::Accessibility,
            PermissionType::ScreenRecording => PrivacyPane::ScreenRecording,
        }
    }
}

impl std::fmt::Display for PermissionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PermissionType::Accessibility => write!(f, "Accessibility"),
            PermissionType::ScreenRecording => write!(f, "Screen Recording"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
}

impl From<bool> for PermissionStatus {
    fn from(granted: bool) -> Self {
        if granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        }
    }
}

/// Checks and requests permissions through a [`PermissionProvider`]
pub struct PermissionChecker {
    provider: Arc<dyn PermissionProvider>,
}

impl PermissionChecker {
    pub fn new(provider: Arc<dyn PermissionProvider>) -> Self {
        Self { provider }
    }

    pub fn check(&self, permission: PermissionType) -> PermissionStatus {
        let status = match permission {
            PermissionType::Accessibility => self.provider.accessibility_granted(),
            PermissionType::ScreenRecording => self.provider.screen_recording_granted(),
        }
        .into();
        debug!(%permission, ?status, "permission checked");
        status
    }

    pub fn summary(&self) -> PermissionSummary {
        let statuses = [PermissionType::Accessibility, PermissionType::ScreenRecording]
            .into_iter()
            .map(|permission| (permission, self.check(permission)))
            .collect();
        PermissionSummary { statuses }
    }

    /// Show the system prompt for `permission`, falling back to opening the
    /// matching System Settings pane. Returns whether access is now granted.
    pub fn request(&self, permission: PermissionType) -> bool {
        info!(%permission, "requesting permission");
        let granted = match permission {
            PermissionType::Accessibility => os::prompt_accessibility_permission(),
            PermissionType::ScreenRecording => os::prompt_screen_recording_permission(),
        };

        if !granted {
            warn!(%permission, "permission not granted after prompt");
            if let Err(err) = os::open_privacy_pane(permission.pane()) {
                error!(%permission, "failed to open privacy pane: {err}");
            }
        }
        granted
    }

    /// User-facing steps for enabling `permission`
    pub fn instructions(permission: PermissionType) -> String {
        let (pane, purpose) = match permission {
            PermissionType::Accessibility => ("Accessibility", "show Dock previews"),
            PermissionType::ScreenRecording => ("Screen Recording", "show window thumbnails (optional)"),
        };
        format!(
            "To let dock-peek {purpose}:\n\
             1. Open System Settings > Privacy & Security\n\
             2. Select '{pane}'\n\
             3. Enable the switch next to 'dock-peek'\n\
             4. dock-peek picks the change up automatically"
        )
    }
}

/// Snapshot of every permission dock-peek uses
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionSummary {
    pub statuses: BTreeMap<PermissionType, PermissionStatus>,
}

impl PermissionSummary {
    /// Whether previews can be shown at all
    pub fn can_function(&self) -> bool {
        self.missing_required().is_empty()
    }

    pub fn missing_required(&self) -> Vec<PermissionType> {
        self.missing().into_iter().filter(|p| p.is_required()).collect()
    }

    pub fn missing(&self) -> Vec<PermissionType> {
        self.statuses
            .iter()
            .filter(|(_, status)| **status != PermissionStatus::Granted)
            .map(|(permission, _)| *permission)
            .collect()
    }

    pub fn description(&self) -> String {
        let missing = self.missing();
        if missing.is_empty() {
            "All permissions granted".to_string()
        } else if self.can_function() {
            format!(
                "Running with reduced features; missing optional: {}",
                join(&missing)
            )
        } else {
            format!("Previews disabled; missing required: {}", join(&self.missing_required()))
        }
    }
}

fn join(permissions: &[PermissionType]) -> String {
    permissions
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_reflects_flag_state() {
        let flag = Arc::new(PermissionFlag::new(true));
        let checker = PermissionChecker::new(flag.clone());

        let summary = checker.summary();
        assert!(summary.can_function());
        assert!(summary.missing().is_empty());

        flag.set_screen_recording(false);
        let summary = checker.summary();
        assert!(summary.can_function());
        assert_eq!(summary.missing(), vec![PermissionType::ScreenRecording]);

        flag.revoke();
        let summary = checker.summary();
        assert!(!summary.can_function());
        assert_eq!(summary.missing_required(), vec![PermissionType::Accessibility]);
        assert!(summary.description().starts_with("Previews disabled"));
    }

    #[test]
    fn instructions_name_the_pane() {
        let text = PermissionChecker::instructions(PermissionType::ScreenRecording);
        assert!(text.contains("'Screen Recording'"));
    }

    #[test]
    fn summary_serializes_as_snake_case() {
        let checker = PermissionChecker::new(PermissionFlag::granted());
        let json = serde_json::to_string(&checker.summary()).unwrap();
        assert!(json.contains("\"accessibility\":\"granted\""));
    }
}
