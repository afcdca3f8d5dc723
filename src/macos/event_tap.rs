//! Session-level event tap for primary-button-down events.
//!
//! Installation and removal touch the run loop and must happen on the main
//! thread; enabling, disabling and invalidating an installed tap go through
//! [`TapControl`], which any thread may call.

use crate::models::Point;
use crate::{DockPeekError, Result};
use std::cell::RefCell;
use std::num::NonZeroUsize;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

/// Identifies one installed tap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TapHandle(NonZeroUsize);

impl TapHandle {
    pub fn from_raw(raw: usize) -> Option<Self> {
        NonZeroUsize::new(raw).map(Self)
    }

    pub fn as_raw(self) -> usize {
        self.0.get()
    }
}

/// Event delivered to the tap callback
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TapEvent {
    MouseDown { location: Point },
    /// The OS disabled the tap because a callback was too slow
    DisabledByTimeout,
    /// The OS disabled the tap on behalf of secure input
    DisabledByUserInput,
}

/// Whether an intercepted event continues to its destination
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    Pass,
    Suppress,
}

pub type TapCallback = Box<dyn FnMut(TapEvent) -> EventDisposition>;

/// Thread-safe control over installed taps
pub trait TapControl: Send + Sync {
    fn set_enabled(&self, handle: TapHandle, enabled: bool);

    /// Permanently stop delivery. The handle stays allocated until removed.
    fn invalidate(&self, handle: TapHandle);
}

/// Main-thread half of the event tap
pub trait EventTapBackend {
    fn control(&self) -> Arc<dyn TapControl>;

    /// Create the tap, attach it to the current run loop and enable it
    fn install(&mut self, callback: TapCallback) -> Result<TapHandle>;

    /// Detach and release a tap. Unknown handles are ignored.
    fn remove(&mut self, handle: TapHandle);
}

/// Current pointer position in global top-left coordinates
pub fn pointer_location() -> Option<Point> {
    platform::pointer_location()
}

/// Event tap backed by `CGEventTapCreate`
pub struct SystemEventTap {
    installed: platform::InstalledTaps,
}

impl SystemEventTap {
    pub fn new() -> Self {
        Self {
            installed: platform::InstalledTaps::default(),
        }
    }
}

impl Default for SystemEventTap {
    fn default() -> Self {
        Self::new()
    }
}

impl EventTapBackend for SystemEventTap {
    fn control(&self) -> Arc<dyn TapControl> {
        Arc::new(platform::SystemTapControl)
    }

    fn install(&mut self, callback: TapCallback) -> Result<TapHandle> {
        self.installed.install(callback)
    }

    fn remove(&mut self, handle: TapHandle) {
        self.installed.remove(handle);
    }
}

#[cfg(target_os = "macos")]
mod platform {
    use super::{EventDisposition, TapCallback, TapControl, TapEvent, TapHandle};
    use crate::models::Point;
    use crate::{DockPeekError, Result};
    use core_foundation::base::TCFType;
    use core_foundation::runloop::{kCFRunLoopCommonModes, CFRunLoop};
    use core_foundation_sys::runloop::{CFRunLoopAddSource, CFRunLoopRemoveSource, CFRunLoopSourceRef};
    use core_graphics::geometry::CGPoint;
    use std::collections::HashMap;
    use std::ffi::c_void;
    use std::panic::{self, AssertUnwindSafe};
    use std::ptr;

    /// `kCGSessionEventTap`
    const SESSION_EVENT_TAP: u32 = 1;
    /// `kCGHeadInsertEventTap`
    const HEAD_INSERT_EVENT_TAP: u32 = 0;
    /// `kCGEventTapOptionDefault`, i.e. listen and intercept
    const TAP_OPTION_DEFAULT: u32 = 0;
    const LEFT_MOUSE_DOWN: u32 = 1;
    const TAP_DISABLED_BY_TIMEOUT: u32 = 0xFFFF_FFFE;
    const TAP_DISABLED_BY_USER_INPUT: u32 = 0xFFFF_FFFF;

    type TapCallbackFn = extern "C" fn(
        proxy: *mut c_void,
        event_type: u32,
        event: *mut c_void,
        user_info: *mut c_void,
    ) -> *mut c_void;

    #[link(name = "CoreGraphics", kind = "framework")]
    extern "C" {
        fn CGEventTapCreate(
            tap: u32,
            place: u32,
            options: u32,
            events_of_interest: u64,
            callback: TapCallbackFn,
            user_info: *mut c_void,
        ) -> *mut c_void;
        fn CGEventTapEnable(tap: *mut c_void, enable: bool);
        fn CGEventGetLocation(event: *mut c_void) -> CGPoint;
        fn CGEventCreate(source: *const c_void) -> *mut c_void;
    }

    #[link(name = "CoreFoundation", kind = "framework")]
    extern "C" {
        fn CFMachPortCreateRunLoopSource(
            allocator: *const c_void,
            port: *mut c_void,
            order: isize,
        ) -> CFRunLoopSourceRef;
        fn CFMachPortInvalidate(port: *mut c_void);
        fn CFRelease(cf: *const c_void);
    }

    struct TapContext {
        callback: TapCallback,
    }

    extern "C" fn tap_trampoline(
        _proxy: *mut c_void,
        event_type: u32,
        event: *mut c_void,
        user_info: *mut c_void,
    ) -> *mut c_void {
        if user_info.is_null() {
            return event;
        }

        let tap_event = match event_type {
            TAP_DISABLED_BY_TIMEOUT => TapEvent::DisabledByTimeout,
            TAP_DISABLED_BY_USER_INPUT => TapEvent::DisabledByUserInput,
            LEFT_MOUSE_DOWN => {
                let location = unsafe { CGEventGetLocation(event) };
                TapEvent::MouseDown {
                    location: Point::new(location.x, location.y),
                }
            }
            _ => return event,
        };

        let context = unsafe { &mut *(user_info as *mut TapContext) };
        // A panic must not unwind into the window server.
        let disposition = panic::catch_unwind(AssertUnwindSafe(|| (context.callback)(tap_event)))
            .unwrap_or(EventDisposition::Pass);

        match disposition {
            EventDisposition::Suppress => ptr::null_mut(),
            EventDisposition::Pass => event,
        }
    }

    struct Installed {
        port: *mut c_void,
        source: CFRunLoopSourceRef,
        context: *mut TapContext,
    }

    #[derive(Default)]
    pub struct InstalledTaps {
        taps: HashMap<TapHandle, Installed>,
    }

    impl InstalledTaps {
        pub fn install(&mut self, callback: TapCallback) -> Result<TapHandle> {
            let context = Box::into_raw(Box::new(TapContext { callback }));
            let mask = 1u64 << LEFT_MOUSE_DOWN;

            let port = unsafe {
                CGEventTapCreate(
                    SESSION_EVENT_TAP,
                    HEAD_INSERT_EVENT_TAP,
                    TAP_OPTION_DEFAULT,
                    mask,
                    tap_trampoline,
                    context.cast(),
                )
            };
            let Some(handle) = TapHandle::from_raw(port as usize) else {
                drop(unsafe { Box::from_raw(context) });
                return Err(DockPeekError::TapUnavailable(
                    "CGEventTapCreate returned null; accessibility access is required".into(),
                )
                .into());
            };

            let source = unsafe { CFMachPortCreateRunLoopSource(ptr::null(), port, 0) };
            if source.is_null() {
                unsafe {
                    CFMachPortInvalidate(port);
                    CFRelease(port as *const c_void);
                    drop(Box::from_raw(context));
                }
                return Err(DockPeekError::TapUnavailable(
                    "could not create a run loop source for the event tap".into(),
                )
                .into());
            }

            unsafe {
                CFRunLoopAddSource(
                    CFRunLoop::get_current().as_concrete_TypeRef(),
                    source,
                    kCFRunLoopCommonModes,
                );
                CGEventTapEnable(port, true);
            }

            self.taps.insert(handle, Installed { port, source, context });
            Ok(handle)
        }

        pub fn remove(&mut self, handle: TapHandle) {
            let Some(installed) = self.taps.remove(&handle) else {
                return;
            };
            unsafe {
                CGEventTapEnable(installed.port, false);
                CFRunLoopRemoveSource(
                    CFRunLoop::get_current().as_concrete_TypeRef(),
                    installed.source,
                    kCFRunLoopCommonModes,
                );
                CFMachPortInvalidate(installed.port);
                CFRelease(installed.source as *const c_void);
                CFRelease(installed.port as *const c_void);
                drop(Box::from_raw(installed.context));
            }
        }
    }

    impl Drop for InstalledTaps {
        fn drop(&mut self) {
            let handles: Vec<TapHandle> = self.taps.keys().copied().collect();
            for handle in handles {
                self.remove(handle);
            }
        }
    }

    pub fn pointer_location() -> Option<Point> {
        let event = unsafe { CGEventCreate(ptr::null()) };
        if event.is_null() {
            return None;
        }
        let location = unsafe { CGEventGetLocation(event) };
        unsafe { CFRelease(event as *const c_void) };
        Some(Point::new(location.x, location.y))
    }

    pub struct SystemTapControl;

    impl TapControl for SystemTapControl {
        fn set_enabled(&self, handle: TapHandle, enabled: bool) {
            unsafe { CGEventTapEnable(handle.as_raw() as *mut c_void, enabled) };
        }

        fn invalidate(&self, handle: TapHandle) {
            unsafe { CFMachPortInvalidate(handle.as_raw() as *mut c_void) };
        }
    }
}

#[cfg(not(target_os = "macos"))]
mod platform {
    use super::{TapCallback, TapControl, TapHandle};
    use crate::models::Point;
    use crate::{DockPeekError, Result};

    #[derive(Default)]
    pub struct InstalledTaps;

    impl InstalledTaps {
        pub fn install(&mut self, _callback: TapCallback) -> Result<TapHandle> {
            Err(DockPeekError::TapUnavailable("event taps are not available on this platform".into()).into())
        }

        pub fn remove(&mut self, _handle: TapHandle) {}
    }

    pub fn pointer_location() -> Option<Point> {
        None
    }

    pub struct SystemTapControl;

    impl TapControl for SystemTapControl {
        fn set_enabled(&self, _handle: TapHandle, _enabled: bool) {}

        fn invalidate(&self, _handle: TapHandle) {}
    }
}

#[derive(Debug, Default)]
struct InMemoryTapState {
    next_handle: usize,
    installed: Option<TapHandle>,
    enabled: bool,
    invalidated: bool,
    installs: usize,
    removals: usize,
    reenables: usize,
    fail_install: bool,
}

type SharedCallback = Rc<RefCell<Option<TapCallback>>>;

/// Event tap that delivers only what a test fires through its
/// [`InMemoryTapDriver`]
pub struct InMemoryEventTap {
    state: Arc<Mutex<InMemoryTapState>>,
    callback: SharedCallback,
}

impl InMemoryEventTap {
    pub fn new() -> (Self, InMemoryTapDriver) {
        let state = Arc::new(Mutex::new(InMemoryTapState::default()));
        let callback: SharedCallback = Rc::new(RefCell::new(None));
        let driver = InMemoryTapDriver {
            state: Arc::clone(&state),
            callback: Rc::clone(&callback),
        };
        (Self { state, callback }, driver)
    }
}

impl EventTapBackend for InMemoryEventTap {
    fn control(&self) -> Arc<dyn TapControl> {
        Arc::new(InMemoryTapControl {
            state: Arc::clone(&self.state),
        })
    }

    fn install(&mut self, callback: TapCallback) -> Result<TapHandle> {
        let mut state = lock(&self.state);
        if state.fail_install {
            return Err(DockPeekError::TapUnavailable("tap creation refused".into()).into());
        }
        state.next_handle += 1;
        let handle = TapHandle::from_raw(state.next_handle)
            .ok_or_else(|| DockPeekError::TapUnavailable("handle space exhausted".into()))?;
        state.installed = Some(handle);
        state.enabled = true;
        state.invalidated = false;
        state.installs += 1;
        *self.callback.borrow_mut() = Some(callback);
        Ok(handle)
    }

    fn remove(&mut self, handle: TapHandle) {
        let mut state = lock(&self.state);
        if state.installed != Some(handle) {
            return;
        }
        state.installed = None;
        state.enabled = false;
        state.removals += 1;
        self.callback.borrow_mut().take();
    }
}

fn lock(state: &Mutex<InMemoryTapState>) -> std::sync::MutexGuard<'_, InMemoryTapState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

struct InMemoryTapControl {
    state: Arc<Mutex<InMemoryTapState>>,
}

impl TapControl for InMemoryTapControl {
    fn set_enabled(&self, handle: TapHandle, enabled: bool) {
        let mut state = lock(&self.state);
        if state.installed != Some(handle) || state.invalidated {
            return;
        }
        if enabled && !state.enabled {
            state.reenables += 1;
        }
        state.enabled = enabled;
    }

    fn invalidate(&self, handle: TapHandle) {
        let mut state = lock(&self.state);
        if state.installed == Some(handle) {
            state.invalidated = true;
            state.enabled = false;
        }
    }
}

/// Test-side view of an [`InMemoryEventTap`]
pub struct InMemoryTapDriver {
    state: Arc<Mutex<InMemoryTapState>>,
    callback: SharedCallback,
}

impl InMemoryTapDriver {
    /// Deliver `event` the way the OS would. `None` when nothing is listening:
    /// no tap, an invalidated tap, or a disabled tap for pointer events.
    pub fn fire(&self, event: TapEvent) -> Option<EventDisposition> {
        {
            let state = lock(&self.state);
            state.installed?;
            if state.invalidated {
                return None;
            }
            if matches!(event, TapEvent::MouseDown { .. }) && !state.enabled {
                return None;
            }
        }
        let mut callback = self.callback.borrow_mut();
        let callback = callback.as_mut()?;
        Some(callback(event))
    }

    pub fn mouse_down(&self, x: f64, y: f64) -> Option<EventDisposition> {
        self.fire(TapEvent::MouseDown {
            location: Point::new(x, y),
        })
    }

    /// Disable the tap the way the OS does after a slow callback, then
    /// deliver the notification
    pub fn simulate_timeout(&self) -> Option<EventDisposition> {
        lock(&self.state).enabled = false;
        self.fire(TapEvent::DisabledByTimeout)
    }

    pub fn fail_next_install(&self, fail: bool) {
        lock(&self.state).fail_install = fail;
    }

    pub fn is_installed(&self) -> bool {
        lock(&self.state).installed.is_some()
    }

    pub fn is_enabled(&self) -> bool {
        lock(&self.state).enabled
    }

    pub fn is_invalidated(&self) -> bool {
        lock(&self.state).invalidated
    }

    pub fn install_count(&self) -> usize {
        lock(&self.state).installs
    }

    pub fn removal_count(&self) -> usize {
        lock(&self.state).removals
    }

    pub fn reenable_count(&self) -> usize {
        lock(&self.state).reenables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_tap_delivers_until_invalidated() {
        let (mut tap, driver) = InMemoryEventTap::new();
        assert!(driver.mouse_down(1.0, 1.0).is_none());

        let handle = tap
            .install(Box::new(|_| EventDisposition::Suppress))
            .unwrap();
        assert_eq!(driver.mouse_down(1.0, 1.0), Some(EventDisposition::Suppress));

        tap.control().invalidate(handle);
        assert!(driver.is_invalidated());
        assert!(driver.mouse_down(1.0, 1.0).is_none());

        tap.remove(handle);
        assert!(!driver.is_installed());
        assert_eq!(driver.removal_count(), 1);
    }

    #[test]
    fn disabled_tap_still_reports_timeout() {
        let (mut tap, driver) = InMemoryEventTap::new();
        let handle = tap.install(Box::new(|_| EventDisposition::Pass)).unwrap();

        assert_eq!(driver.simulate_timeout(), Some(EventDisposition::Pass));
        assert!(driver.mouse_down(0.0, 0.0).is_none());

        tap.control().set_enabled(handle, true);
        assert_eq!(driver.reenable_count(), 1);
        assert_eq!(driver.mouse_down(0.0, 0.0), Some(EventDisposition::Pass));
    }

    #[test]
    fn failed_install_reports_tap_unavailable() {
        let (mut tap, driver) = InMemoryEventTap::new();
        driver.fail_next_install(true);

        let err = tap.install(Box::new(|_| EventDisposition::Pass)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<DockPeekError>(),
            Some(DockPeekError::TapUnavailable(_))
        ));
    }
}
