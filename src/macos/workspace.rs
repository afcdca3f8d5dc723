//! Running applications and process activation (`NSWorkspace`,
//! `NSRunningApplication` and the SkyLight front-process call).

use crate::models::{Pid, WindowId};
use crate::{DockPeekError, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

/// A running, user-visible application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningApp {
    pub pid: Pid,
    pub bundle_id: Option<String>,
    pub name: String,
    pub bundle_path: Option<PathBuf>,
}

pub trait ProcessProvider: Send + Sync {
    fn running_apps(&self) -> Vec<RunningApp>;

    /// Bundle identifier of the application bundle at `path`
    fn bundle_identifier(&self, path: &Path) -> Option<String>;

    /// Bring `pid` to the front with `window_id` as its key window
    fn activate_with_window(&self, pid: Pid, window_id: WindowId) -> Result<()>;

    /// Plain application activation, no particular window
    fn activate_app(&self, pid: Pid) -> Result<()>;
}

/// Process id of the first running instance of `bundle_id`
pub fn running_pid_for_bundle(bundle_id: &str) -> Option<Pid> {
    platform::running_pid_for_bundle(bundle_id)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProcesses;

impl SystemProcesses {
    pub fn new() -> Self {
        Self
    }
}

impl ProcessProvider for SystemProcesses {
    fn running_apps(&self) -> Vec<RunningApp> {
        platform::running_apps()
    }

    fn bundle_identifier(&self, path: &Path) -> Option<String> {
        platform::bundle_identifier(path)
    }

    fn activate_with_window(&self, pid: Pid, window_id: WindowId) -> Result<()> {
        platform::activate_with_window(pid, window_id)
    }

    fn activate_app(&self, pid: Pid) -> Result<()> {
        platform::activate_app(pid)
    }
}

#[cfg(target_os = "macos")]
mod platform {
    use super::RunningApp;
    use crate::models::{Pid, WindowId};
    use crate::{DockPeekError, Result};
    use cocoa::base::{id, nil, BOOL, NO};
    use cocoa::foundation::{NSAutoreleasePool, NSString};
    use objc::{class, msg_send, sel, sel_impl};
    use std::ffi::CStr;
    use std::os::raw::c_char;
    use std::path::{Path, PathBuf};

    /// `NSApplicationActivateIgnoringOtherApps`
    const ACTIVATE_IGNORING_OTHER_APPS: usize = 1 << 1;
    /// `kCPSUserGenerated`
    const FRONT_PROCESS_USER_GENERATED: u32 = 0x200;

    #[repr(C)]
    #[derive(Default)]
    struct ProcessSerialNumber {
        high: u32,
        low: u32,
    }

    #[link(name = "ApplicationServices", kind = "framework")]
    extern "C" {
        fn GetProcessForPID(pid: Pid, psn: *mut ProcessSerialNumber) -> i32;
    }

    #[link(name = "SkyLight", kind = "framework")]
    extern "C" {
        fn _SLPSSetFrontProcessWithOptions(
            psn: *const ProcessSerialNumber,
            window_id: u32,
            mode: u32,
        ) -> i32;
    }

    unsafe fn to_string(ns: id) -> Option<String> {
        if ns == nil {
            return None;
        }
        let utf8: *const c_char = msg_send![ns, UTF8String];
        if utf8.is_null() {
            return None;
        }
        Some(CStr::from_ptr(utf8).to_string_lossy().into_owned())
    }

    unsafe fn describe(app: id) -> RunningApp {
        let pid: Pid = msg_send![app, processIdentifier];
        let bundle_id: id = msg_send![app, bundleIdentifier];
        let name: id = msg_send![app, localizedName];
        let url: id = msg_send![app, bundleURL];
        let path: id = if url == nil { nil } else { msg_send![url, path] };
        RunningApp {
            pid,
            bundle_id: to_string(bundle_id),
            name: to_string(name).unwrap_or_default(),
            bundle_path: to_string(path).map(PathBuf::from),
        }
    }

    pub fn running_apps() -> Vec<RunningApp> {
        unsafe {
            let pool = NSAutoreleasePool::new(nil);
            let workspace: id = msg_send![class!(NSWorkspace), sharedWorkspace];
            let apps: id = msg_send![workspace, runningApplications];
            let count: usize = msg_send![apps, count];
            let result = (0..count)
                .map(|index| {
                    let app: id = msg_send![apps, objectAtIndex: index];
                    describe(app)
                })
                .collect();
            pool.drain();
            result
        }
    }

    pub fn running_pid_for_bundle(bundle_id: &str) -> Option<Pid> {
        unsafe {
            let pool = NSAutoreleasePool::new(nil);
            let identifier = NSString::alloc(nil).init_str(bundle_id).autorelease();
            let apps: id = msg_send![
                class!(NSRunningApplication),
                runningApplicationsWithBundleIdentifier: identifier
            ];
            let count: usize = msg_send![apps, count];
            let pid = if count == 0 {
                None
            } else {
                let app: id = msg_send![apps, objectAtIndex: 0usize];
                let pid: Pid = msg_send![app, processIdentifier];
                Some(pid)
            };
            pool.drain();
            pid
        }
    }

    pub fn bundle_identifier(path: &Path) -> Option<String> {
        let path = path.to_str()?;
        unsafe {
            let pool = NSAutoreleasePool::new(nil);
            let ns_path = NSString::alloc(nil).init_str(path).autorelease();
            let bundle: id = msg_send![class!(NSBundle), bundleWithPath: ns_path];
            let identifier = if bundle == nil {
                None
            } else {
                let identifier: id = msg_send![bundle, bundleIdentifier];
                to_string(identifier)
            };
            pool.drain();
            identifier
        }
    }

    pub fn activate_with_window(pid: Pid, window_id: WindowId) -> Result<()> {
        let mut psn = ProcessSerialNumber::default();
        let status = unsafe { GetProcessForPID(pid, &mut psn) };
        if status != 0 {
            return Err(DockPeekError::MacOSAPIError(format!(
                "GetProcessForPID({pid}) returned {status}"
            ))
            .into());
        }

        let status = unsafe {
            _SLPSSetFrontProcessWithOptions(&psn, window_id, FRONT_PROCESS_USER_GENERATED)
        };
        if status != 0 {
            return Err(DockPeekError::MacOSAPIError(format!(
                "_SLPSSetFrontProcessWithOptions({pid}, {window_id}) returned {status}"
            ))
            .into());
        }
        Ok(())
    }

    pub fn activate_app(pid: Pid) -> Result<()> {
        unsafe {
            let app: id = msg_send![
                class!(NSRunningApplication),
                runningApplicationWithProcessIdentifier: pid
            ];
            if app == nil {
                return Err(DockPeekError::MacOSAPIError(format!("no running application with pid {pid}")).into());
            }
            let activated: BOOL = msg_send![app, activateWithOptions: ACTIVATE_IGNORING_OTHER_APPS];
            if activated == NO {
                return Err(DockPeekError::MacOSAPIError(format!("activation of pid {pid} was refused")).into());
            }
        }
        Ok(())
    }
}

#[cfg(not(target_os = "macos"))]
mod platform {
    use super::RunningApp;
    use crate::models::{Pid, WindowId};
    use crate::{DockPeekError, Result};
    use std::path::Path;

    pub fn running_apps() -> Vec<RunningApp> {
        Vec::new()
    }

    pub fn running_pid_for_bundle(_bundle_id: &str) -> Option<Pid> {
        None
    }

    pub fn bundle_identifier(_path: &Path) -> Option<String> {
        None
    }

    pub fn activate_with_window(_pid: Pid, _window_id: WindowId) -> Result<()> {
        Err(DockPeekError::MacOSAPIError("process activation is not available on this platform".into()).into())
    }

    pub fn activate_app(_pid: Pid) -> Result<()> {
        Err(DockPeekError::MacOSAPIError("process activation is not available on this platform".into()).into())
    }
}

/// Activation recorded by [`InMemoryProcesses`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Window(Pid, WindowId),
    App(Pid),
}

#[derive(Debug, Default)]
struct InMemoryProcessState {
    apps: Vec<RunningApp>,
    bundles: HashMap<PathBuf, String>,
    activations: Vec<Activation>,
    refuse_window_activation: bool,
}

/// In-memory process table. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProcesses {
    state: Arc<RwLock<InMemoryProcessState>>,
}

impl InMemoryProcesses {
    pub fn new_with(apps: Vec<RunningApp>) -> Self {
        let processes = Self::default();
        {
            let mut state = processes.state.write().unwrap_or_else(|e| e.into_inner());
            for app in &apps {
                if let (Some(path), Some(bundle_id)) = (&app.bundle_path, &app.bundle_id) {
                    state.bundles.insert(path.clone(), bundle_id.clone());
                }
            }
            state.apps = apps;
        }
        processes
    }

    pub fn register_bundle(&self, path: impl Into<PathBuf>, bundle_id: impl Into<String>) {
        self.state
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .bundles
            .insert(path.into(), bundle_id.into());
    }

    /// Make window-aware activation fail so the plain fallback is exercised
    pub fn refuse_window_activation(&self, refuse: bool) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).refuse_window_activation = refuse;
    }

    pub fn activations(&self) -> Vec<Activation> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).activations.clone()
    }
}

impl ProcessProvider for InMemoryProcesses {
    fn running_apps(&self) -> Vec<RunningApp> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).apps.clone()
    }

    fn bundle_identifier(&self, path: &Path) -> Option<String> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).bundles.get(path).cloned()
    }

    fn activate_with_window(&self, pid: Pid, window_id: WindowId) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.refuse_window_activation {
            return Err(DockPeekError::MacOSAPIError("window activation refused".into()).into());
        }
        state.activations.push(Activation::Window(pid, window_id));
        Ok(())
    }

    fn activate_app(&self, pid: Pid) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if !state.apps.iter().any(|app| app.pid == pid) {
            return Err(DockPeekError::MacOSAPIError(format!("no running application with pid {pid}")).into());
        }
        state.activations.push(Activation::App(pid));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_processes_resolve_registered_bundles() {
        let processes = InMemoryProcesses::new_with(vec![RunningApp {
            pid: 42,
            bundle_id: Some("com.apple.Safari".into()),
            name: "Safari".into(),
            bundle_path: Some(PathBuf::from("/Applications/Safari.app")),
        }]);

        assert_eq!(
            processes.bundle_identifier(Path::new("/Applications/Safari.app")).as_deref(),
            Some("com.apple.Safari")
        );
        assert!(processes.bundle_identifier(Path::new("/Applications/Mail.app")).is_none());
    }

    #[test]
    fn in_memory_activation_records_calls() {
        let processes = InMemoryProcesses::new_with(vec![RunningApp {
            pid: 42,
            bundle_id: None,
            name: "Editor".into(),
            bundle_path: None,
        }]);

        processes.activate_with_window(42, 7).unwrap();
        processes.refuse_window_activation(true);
        assert!(processes.activate_with_window(42, 7).is_err());
        processes.activate_app(42).unwrap();
        assert!(processes.activate_app(99).is_err());

        assert_eq!(
            processes.activations(),
            vec![Activation::Window(42, 7), Activation::App(42)]
        );
    }
}
