use crate::Result;
use anyhow::{anyhow, Context};
use std::process::Command;

/// System Settings privacy panes dock-peek may send the user to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivacyPane {
    Accessibility,
    ScreenRecording,
}

impl PrivacyPane {
    fn url(self) -> &'static str {
        match self {
            PrivacyPane::Accessibility => {
                "x-apple.systempreferences:com.apple.preference.security?Privacy_Accessibility"
            }
            PrivacyPane::ScreenRecording => {
                "x-apple.systempreferences:com.apple.preference.security?Privacy_ScreenCapture"
            }
        }
    }
}

/// Open a System Settings privacy pane so the user can grant access.
pub fn open_privacy_pane(pane: PrivacyPane) -> Result<()> {
    if !cfg!(target_os = "macos") {
        return Err(anyhow!("opening System Settings is not supported on this platform"));
    }

    let status = Command::new("open")
        .arg(pane.url())
        .status()
        .context("failed to open System Settings")?;

    if status.success() {
        Ok(())
    } else {
        Err(anyhow!("open command returned non-zero status: {status}"))
    }
}

#[cfg(target_os = "macos")]
mod platform {
    use core_foundation::base::TCFType;
    use core_foundation::boolean::CFBoolean;
    use core_foundation::dictionary::CFMutableDictionary;
    use core_foundation::string::CFString;
    use core_foundation_sys::dictionary::CFDictionaryRef;
    use core_foundation_sys::string::CFStringRef;

    #[link(name = "ApplicationServices", kind = "framework")]
    extern "C" {
        fn AXIsProcessTrusted() -> bool;
        fn AXIsProcessTrustedWithOptions(options: CFDictionaryRef) -> bool;
        static kAXTrustedCheckOptionPrompt: CFStringRef;
        fn CGPreflightScreenCaptureAccess() -> bool;
        fn CGRequestScreenCaptureAccess() -> bool;
    }

    /// Cheap enough to call from the event callback and the watchdog.
    pub fn is_accessibility_permission_granted() -> bool {
        unsafe { AXIsProcessTrusted() }
    }

    pub fn prompt_accessibility_permission() -> bool {
        unsafe {
            let mut options = CFMutableDictionary::new();
            let key = CFString::wrap_under_get_rule(kAXTrustedCheckOptionPrompt);
            options.set(key, CFBoolean::true_value());
            AXIsProcessTrustedWithOptions(options.as_concrete_TypeRef())
        }
    }

    pub fn is_screen_recording_permission_granted() -> bool {
        unsafe { CGPreflightScreenCaptureAccess() }
    }

    pub fn prompt_screen_recording_permission() -> bool {
        unsafe { CGRequestScreenCaptureAccess() }
    }
}

#[cfg(not(target_os = "macos"))]
mod platform {
    fn env_flag(name: &str) -> bool {
        std::env::var(name)
            .map(|value| value.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    pub fn is_accessibility_permission_granted() -> bool {
        env_flag("DOCKPEEK_PERMISSION_ACCESSIBILITY")
    }

    pub fn prompt_accessibility_permission() -> bool {
        is_accessibility_permission_granted()
    }

    pub fn is_screen_recording_permission_granted() -> bool {
        env_flag("DOCKPEEK_PERMISSION_SCREEN_RECORDING")
    }

    pub fn prompt_screen_recording_permission() -> bool {
        is_screen_recording_permission_granted()
    }
}

pub use platform::{
    is_accessibility_permission_granted, is_screen_recording_permission_granted,
    prompt_accessibility_permission, prompt_screen_recording_permission,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn privacy_pane_urls_target_security_preferences() {
        for pane in [PrivacyPane::Accessibility, PrivacyPane::ScreenRecording] {
            assert!(pane.url().starts_with("x-apple.systempreferences:com.apple.preference.security"));
        }
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn open_privacy_pane_is_unsupported_off_macos() {
        assert!(open_privacy_pane(PrivacyPane::Accessibility).is_err());
    }
}
