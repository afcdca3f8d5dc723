//! Accessibility (AX) access for application windows and for the Dock's
//! own element tree.
//!
//! AX element references are only meaningful inside this process and must be
//! released, so providers hand out [`ElementKey`]s and keep the retained
//! elements to themselves. Providers are main-thread objects.

use crate::models::{Pid, Point, Rect, WindowId};
use crate::{DockPeekError, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// AX subrole carried by ordinary document windows
pub const STANDARD_WINDOW_SUBROLE: &str = "AXStandardWindow";
/// AX role of every Dock tile
pub const DOCK_ITEM_ROLE: &str = "AXDockItem";
/// AX subrole of Dock tiles representing applications
pub const APPLICATION_DOCK_ITEM_SUBROLE: &str = "AXApplicationDockItem";

/// Opaque handle to an AX element retained by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKey(pub u64);

/// Snapshot of one AX window element
#[derive(Debug, Clone, PartialEq)]
pub struct AxWindow {
    pub key: ElementKey,
    /// Window server id, when the private id lookup succeeds
    pub window_id: Option<WindowId>,
    pub title: Option<String>,
    pub frame: Option<Rect>,
    pub subrole: Option<String>,
}

impl AxWindow {
    pub fn is_standard(&self) -> bool {
        self.subrole.as_deref() == Some(STANDARD_WINDOW_SUBROLE)
    }
}

/// Window-level accessibility operations
pub trait AccessibilityProvider {
    /// All AX windows of `pid`. Replaces any keys previously handed out for
    /// the same process.
    fn windows(&self, pid: Pid) -> Result<Vec<AxWindow>>;

    /// Current frame of a window, top-left origin
    fn frame(&self, key: ElementKey) -> Option<Rect>;

    fn set_frame(&self, key: ElementKey, frame: Rect) -> Result<()>;

    /// `AXRaise` followed by marking the window main
    fn raise(&self, key: ElementKey) -> Result<()>;

    /// Set the application's focused window
    fn set_focused_window(&self, pid: Pid, key: ElementKey) -> Result<()>;

    fn press_close_button(&self, key: ElementKey) -> Result<()>;
}

/// Snapshot of one element of the Dock's AX tree
#[derive(Debug, Clone, PartialEq)]
pub struct DockElement {
    pub key: ElementKey,
    pub role: Option<String>,
    pub subrole: Option<String>,
    pub title: Option<String>,
    /// `AXURL` of the tile, the application bundle for app tiles
    pub url: Option<PathBuf>,
    /// `AXIsApplicationRunning`
    pub is_running: Option<bool>,
}

impl DockElement {
    pub fn is_dock_item(&self) -> bool {
        self.role.as_deref() == Some(DOCK_ITEM_ROLE)
    }

    pub fn is_application_item(&self) -> bool {
        self.subrole.as_deref() == Some(APPLICATION_DOCK_ITEM_SUBROLE)
    }
}

/// Read-only access to the Dock process's AX tree
pub trait DockAccessibility {
    /// Deepest element under `point`. Starts a new hit test; keys from an
    /// earlier hit test are no longer valid.
    fn element_at(&self, point: Point) -> Option<DockElement>;

    fn parent(&self, element: &DockElement) -> Option<DockElement>;
}

/// AX provider backed by the ApplicationServices framework
pub struct SystemAccessibility {
    inner: platform::WindowElements,
}

impl SystemAccessibility {
    pub fn new() -> Self {
        Self {
            inner: platform::WindowElements::default(),
        }
    }
}

impl Default for SystemAccessibility {
    fn default() -> Self {
        Self::new()
    }
}

impl AccessibilityProvider for SystemAccessibility {
    fn windows(&self, pid: Pid) -> Result<Vec<AxWindow>> {
        self.inner.windows(pid)
    }

    fn frame(&self, key: ElementKey) -> Option<Rect> {
        self.inner.frame(key)
    }

    fn set_frame(&self, key: ElementKey, frame: Rect) -> Result<()> {
        self.inner.set_frame(key, frame)
    }

    fn raise(&self, key: ElementKey) -> Result<()> {
        self.inner.raise(key)
    }

    fn set_focused_window(&self, pid: Pid, key: ElementKey) -> Result<()> {
        self.inner.set_focused_window(pid, key)
    }

    fn press_close_button(&self, key: ElementKey) -> Result<()> {
        self.inner.press_close_button(key)
    }
}

/// Dock AX tree accessed through the Dock process
pub struct SystemDockAccessibility {
    inner: platform::DockElements,
}

impl SystemDockAccessibility {
    pub fn new() -> Self {
        Self {
            inner: platform::DockElements::default(),
        }
    }
}

impl Default for SystemDockAccessibility {
    fn default() -> Self {
        Self::new()
    }
}

impl DockAccessibility for SystemDockAccessibility {
    fn element_at(&self, point: Point) -> Option<DockElement> {
        self.inner.element_at(point)
    }

    fn parent(&self, element: &DockElement) -> Option<DockElement> {
        self.inner.parent(element.key)
    }
}

#[cfg(target_os = "macos")]
mod platform {
    use super::{AxWindow, DockElement, ElementKey};
    use crate::macos::workspace;
    use crate::models::{Pid, Point, Rect};
    use crate::{DockPeekError, Result};
    use core_foundation::base::{CFType, CFTypeRef, TCFType};
    use core_foundation::boolean::CFBoolean;
    use core_foundation::string::CFString;
    use core_foundation::url::{CFURLRef, CFURL};
    use core_graphics::geometry::{CGPoint, CGSize};
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::ffi::c_void;
    use std::ptr;

    type AXUIElementRef = *mut c_void;
    type AXError = i32;

    const AX_SUCCESS: AXError = 0;
    const AX_VALUE_CG_POINT: i32 = 1;
    const AX_VALUE_CG_SIZE: i32 = 2;
    const DOCK_BUNDLE_ID: &str = "com.apple.dock";

    #[link(name = "ApplicationServices", kind = "framework")]
    extern "C" {
        fn AXUIElementCreateApplication(pid: i32) -> AXUIElementRef;
        fn AXUIElementCopyAttributeValue(
            element: AXUIElementRef,
            attribute: CFTypeRef,
            value: *mut CFTypeRef,
        ) -> AXError;
        fn AXUIElementSetAttributeValue(
            element: AXUIElementRef,
            attribute: CFTypeRef,
            value: CFTypeRef,
        ) -> AXError;
        fn AXUIElementPerformAction(element: AXUIElementRef, action: CFTypeRef) -> AXError;
        fn AXUIElementCopyElementAtPosition(
            application: AXUIElementRef,
            x: f32,
            y: f32,
            element: *mut AXUIElementRef,
        ) -> AXError;
        fn AXValueCreate(value_type: i32, value: *const c_void) -> CFTypeRef;
        fn AXValueGetValue(value: CFTypeRef, value_type: i32, out: *mut c_void) -> bool;
        fn _AXUIElementGetWindow(element: AXUIElementRef, window_id: *mut u32) -> AXError;
    }

    #[link(name = "CoreFoundation", kind = "framework")]
    extern "C" {
        fn CFArrayGetCount(array: CFTypeRef) -> isize;
        fn CFArrayGetValueAtIndex(array: CFTypeRef, index: isize) -> CFTypeRef;
        fn CFRetain(cf: CFTypeRef) -> CFTypeRef;
        fn CFRelease(cf: CFTypeRef);
    }

    /// Owned (+1) reference to an AX element
    struct AxElement(AXUIElementRef);

    impl Drop for AxElement {
        fn drop(&mut self) {
            unsafe { CFRelease(self.0 as CFTypeRef) };
        }
    }

    fn ax_failure(what: &str, code: AXError) -> anyhow::Error {
        DockPeekError::AccessibilityError(format!("{what} failed with AXError {code}")).into()
    }

    impl AxElement {
        fn from_create(raw: AXUIElementRef) -> Option<Self> {
            (!raw.is_null()).then_some(Self(raw))
        }

        fn application(pid: Pid) -> Option<Self> {
            Self::from_create(unsafe { AXUIElementCreateApplication(pid) })
        }

        fn copy(&self, attribute: &str) -> Option<CFType> {
            let name = CFString::new(attribute);
            let mut value: CFTypeRef = ptr::null();
            let code = unsafe {
                AXUIElementCopyAttributeValue(self.0, name.as_CFTypeRef(), &mut value)
            };
            if code != AX_SUCCESS || value.is_null() {
                return None;
            }
            Some(unsafe { CFType::wrap_under_create_rule(value) })
        }

        fn string(&self, attribute: &str) -> Option<String> {
            self.copy(attribute)?
                .downcast::<CFString>()
                .map(|s| s.to_string())
        }

        fn boolean(&self, attribute: &str) -> Option<bool> {
            self.copy(attribute)?.downcast::<CFBoolean>().map(bool::from)
        }

        fn element(&self, attribute: &str) -> Option<AxElement> {
            let value = self.copy(attribute)?;
            let raw = value.as_CFTypeRef();
            Self::from_create(unsafe { CFRetain(raw) } as AXUIElementRef)
        }

        fn elements(&self, attribute: &str) -> Vec<AxElement> {
            let Some(array) = self.copy(attribute) else {
                return Vec::new();
            };
            let raw = array.as_CFTypeRef();
            let count = unsafe { CFArrayGetCount(raw) };
            (0..count)
                .filter_map(|index| {
                    let item = unsafe { CFArrayGetValueAtIndex(raw, index) };
                    if item.is_null() {
                        None
                    } else {
                        Self::from_create(unsafe { CFRetain(item) } as AXUIElementRef)
                    }
                })
                .collect()
        }

        fn url(&self, attribute: &str) -> Option<std::path::PathBuf> {
            let value = self.copy(attribute)?;
            let url = unsafe { CFURL::wrap_under_get_rule(value.as_CFTypeRef() as CFURLRef) };
            url.to_path()
        }

        fn frame(&self) -> Option<Rect> {
            let position = self.copy("AXPosition")?;
            let size = self.copy("AXSize")?;
            let mut origin = CGPoint::new(0.0, 0.0);
            let mut extent = CGSize::new(0.0, 0.0);
            let ok = unsafe {
                AXValueGetValue(
                    position.as_CFTypeRef(),
                    AX_VALUE_CG_POINT,
                    (&mut origin as *mut CGPoint).cast(),
                ) && AXValueGetValue(
                    size.as_CFTypeRef(),
                    AX_VALUE_CG_SIZE,
                    (&mut extent as *mut CGSize).cast(),
                )
            };
            ok.then(|| Rect::new(origin.x, origin.y, extent.width, extent.height))
        }

        fn set_raw(&self, attribute: &str, value: CFTypeRef) -> Result<()> {
            let name = CFString::new(attribute);
            let code = unsafe { AXUIElementSetAttributeValue(self.0, name.as_CFTypeRef(), value) };
            if code == AX_SUCCESS {
                Ok(())
            } else {
                Err(ax_failure(&format!("setting {attribute}"), code))
            }
        }

        fn set_ax_value(&self, attribute: &str, value_type: i32, data: *const c_void) -> Result<()> {
            let value = unsafe { AXValueCreate(value_type, data) };
            if value.is_null() {
                return Err(ax_failure("AXValueCreate", -1));
            }
            let result = self.set_raw(attribute, value);
            unsafe { CFRelease(value) };
            result
        }

        fn set_frame(&self, frame: Rect) -> Result<()> {
            let origin = CGPoint::new(frame.origin.x, frame.origin.y);
            let size = CGSize::new(frame.size.width, frame.size.height);
            // Size is applied on both sides of the move so a window crossing
            // onto a smaller display ends at the requested size.
            let _ = self.set_ax_value("AXSize", AX_VALUE_CG_SIZE, (&size as *const CGSize).cast());
            self.set_ax_value("AXPosition", AX_VALUE_CG_POINT, (&origin as *const CGPoint).cast())?;
            self.set_ax_value("AXSize", AX_VALUE_CG_SIZE, (&size as *const CGSize).cast())
        }

        fn perform(&self, action: &str) -> Result<()> {
            let name = CFString::new(action);
            let code = unsafe { AXUIElementPerformAction(self.0, name.as_CFTypeRef()) };
            if code == AX_SUCCESS {
                Ok(())
            } else {
                Err(ax_failure(action, code))
            }
        }

        fn window_id(&self) -> Option<u32> {
            let mut id = 0u32;
            let code = unsafe { _AXUIElementGetWindow(self.0, &mut id) };
            (code == AX_SUCCESS && id != 0).then_some(id)
        }
    }

    #[derive(Default)]
    pub struct WindowElements {
        next_key: Cell<u64>,
        elements: RefCell<HashMap<ElementKey, (Pid, AxElement)>>,
    }

    impl WindowElements {
        fn allocate(&self) -> ElementKey {
            let key = self.next_key.get() + 1;
            self.next_key.set(key);
            ElementKey(key)
        }

        fn with_element<T>(&self, key: ElementKey, f: impl FnOnce(&AxElement) -> Result<T>) -> Result<T> {
            let elements = self.elements.borrow();
            let (_, element) = elements.get(&key).ok_or_else(|| {
                DockPeekError::AccessibilityError(format!("stale element handle {}", key.0))
            })?;
            f(element)
        }

        pub fn windows(&self, pid: Pid) -> Result<Vec<AxWindow>> {
            let app = AxElement::application(pid).ok_or_else(|| {
                DockPeekError::AccessibilityError(format!("no AX application for pid {pid}"))
            })?;

            let mut elements = self.elements.borrow_mut();
            elements.retain(|_, (owner, _)| *owner != pid);

            let mut windows = Vec::new();
            for element in app.elements("AXWindows") {
                let key = self.allocate();
                windows.push(AxWindow {
                    key,
                    window_id: element.window_id(),
                    title: element.string("AXTitle"),
                    frame: element.frame(),
                    subrole: element.string("AXSubrole"),
                });
                elements.insert(key, (pid, element));
            }
            Ok(windows)
        }

        pub fn frame(&self, key: ElementKey) -> Option<Rect> {
            self.elements.borrow().get(&key).and_then(|(_, e)| e.frame())
        }

        pub fn set_frame(&self, key: ElementKey, frame: Rect) -> Result<()> {
            self.with_element(key, |element| element.set_frame(frame))
        }

        pub fn raise(&self, key: ElementKey) -> Result<()> {
            self.with_element(key, |element| {
                element.perform("AXRaise")?;
                element.set_raw("AXMain", CFBoolean::true_value().as_CFTypeRef())
            })
        }

        pub fn set_focused_window(&self, pid: Pid, key: ElementKey) -> Result<()> {
            let app = AxElement::application(pid).ok_or_else(|| {
                DockPeekError::AccessibilityError(format!("no AX application for pid {pid}"))
            })?;
            self.with_element(key, |element| {
                app.set_raw("AXFocusedWindow", element.0 as CFTypeRef)
            })
        }

        pub fn press_close_button(&self, key: ElementKey) -> Result<()> {
            self.with_element(key, |element| {
                let button = element.element("AXCloseButton").ok_or_else(|| {
                    DockPeekError::AccessibilityError("window has no close button".into())
                })?;
                button.perform("AXPress")
            })
        }
    }

    #[derive(Default)]
    pub struct DockElements {
        next_key: Cell<u64>,
        elements: RefCell<HashMap<ElementKey, AxElement>>,
    }

    impl DockElements {
        fn describe(&self, element: AxElement) -> DockElement {
            let key = ElementKey(self.next_key.get() + 1);
            self.next_key.set(key.0);
            let snapshot = DockElement {
                key,
                role: element.string("AXRole"),
                subrole: element.string("AXSubrole"),
                title: element.string("AXTitle"),
                url: element.url("AXURL"),
                is_running: element.boolean("AXIsApplicationRunning"),
            };
            self.elements.borrow_mut().insert(key, element);
            snapshot
        }

        pub fn element_at(&self, point: Point) -> Option<DockElement> {
            self.elements.borrow_mut().clear();

            let dock_pid = workspace::running_pid_for_bundle(DOCK_BUNDLE_ID)?;
            let dock = AxElement::application(dock_pid)?;
            let mut raw: AXUIElementRef = ptr::null_mut();
            let code = unsafe {
                AXUIElementCopyElementAtPosition(dock.0, point.x as f32, point.y as f32, &mut raw)
            };
            if code != AX_SUCCESS {
                return None;
            }
            AxElement::from_create(raw).map(|element| self.describe(element))
        }

        pub fn parent(&self, key: ElementKey) -> Option<DockElement> {
            let parent = self.elements.borrow().get(&key)?.element("AXParent")?;
            Some(self.describe(parent))
        }
    }
}

#[cfg(not(target_os = "macos"))]
mod platform {
    use super::{AxWindow, DockElement, ElementKey};
    use crate::models::{Pid, Point, Rect};
    use crate::{DockPeekError, Result};

    fn unavailable<T>() -> Result<T> {
        Err(DockPeekError::AccessibilityError(
            "the accessibility API is not available on this platform".into(),
        )
        .into())
    }

    #[derive(Default)]
    pub struct WindowElements;

    impl WindowElements {
        pub fn windows(&self, _pid: Pid) -> Result<Vec<AxWindow>> {
            unavailable()
        }

        pub fn frame(&self, _key: ElementKey) -> Option<Rect> {
            None
        }

        pub fn set_frame(&self, _key: ElementKey, _frame: Rect) -> Result<()> {
            unavailable()
        }

        pub fn raise(&self, _key: ElementKey) -> Result<()> {
            unavailable()
        }

        pub fn set_focused_window(&self, _pid: Pid, _key: ElementKey) -> Result<()> {
            unavailable()
        }

        pub fn press_close_button(&self, _key: ElementKey) -> Result<()> {
            unavailable()
        }
    }

    #[derive(Default)]
    pub struct DockElements;

    impl DockElements {
        pub fn element_at(&self, _point: Point) -> Option<DockElement> {
            None
        }

        pub fn parent(&self, _key: ElementKey) -> Option<DockElement> {
            None
        }
    }
}

/// Operation recorded by [`InMemoryAccessibility`]
#[derive(Debug, Clone, PartialEq)]
pub enum AxCall {
    SetFrame(ElementKey, Rect),
    Raise(ElementKey),
    Focus(Pid, ElementKey),
    Close(ElementKey),
}

#[derive(Debug, Default)]
struct InMemoryAxState {
    windows: HashMap<Pid, Vec<AxWindow>>,
    calls: Vec<AxCall>,
    list_calls: usize,
}

/// In-memory window AX tree. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccessibility {
    state: Arc<RwLock<InMemoryAxState>>,
}

impl InMemoryAccessibility {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_windows(&self, pid: Pid, windows: Vec<AxWindow>) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).windows.insert(pid, windows);
    }

    pub fn calls(&self) -> Vec<AxCall> {
        self.state.read().unwrap_or_else(|e| e.into_inner()).calls.clone()
    }

    pub fn list_calls(&self) -> usize {
        self.state.read().unwrap_or_else(|e| e.into_inner()).list_calls
    }

    fn find(&self, key: ElementKey) -> Option<AxWindow> {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .windows
            .values()
            .flatten()
            .find(|window| window.key == key)
            .cloned()
    }

    fn require(&self, key: ElementKey) -> Result<AxWindow> {
        self.find(key).ok_or_else(|| {
            DockPeekError::AccessibilityError(format!("stale element handle {}", key.0)).into()
        })
    }
}

impl AccessibilityProvider for InMemoryAccessibility {
    fn windows(&self, pid: Pid) -> Result<Vec<AxWindow>> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.list_calls += 1;
        Ok(state.windows.get(&pid).cloned().unwrap_or_default())
    }

    fn frame(&self, key: ElementKey) -> Option<Rect> {
        self.find(key).and_then(|window| window.frame)
    }

    fn set_frame(&self, key: ElementKey, frame: Rect) -> Result<()> {
        self.require(key)?;
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        for window in state.windows.values_mut().flatten() {
            if window.key == key {
                window.frame = Some(frame);
            }
        }
        state.calls.push(AxCall::SetFrame(key, frame));
        Ok(())
    }

    fn raise(&self, key: ElementKey) -> Result<()> {
        self.require(key)?;
        self.state.write().unwrap_or_else(|e| e.into_inner()).calls.push(AxCall::Raise(key));
        Ok(())
    }

    fn set_focused_window(&self, pid: Pid, key: ElementKey) -> Result<()> {
        self.require(key)?;
        self.state.write().unwrap_or_else(|e| e.into_inner()).calls.push(AxCall::Focus(pid, key));
        Ok(())
    }

    fn press_close_button(&self, key: ElementKey) -> Result<()> {
        self.require(key)?;
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        for windows in state.windows.values_mut() {
            windows.retain(|window| window.key != key);
        }
        state.calls.push(AxCall::Close(key));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryDockState {
    elements: HashMap<ElementKey, DockElement>,
    parents: HashMap<ElementKey, ElementKey>,
    hits: Vec<(Rect, ElementKey)>,
}

/// In-memory Dock AX tree. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDockAccessibility {
    state: Arc<RwLock<InMemoryDockState>>,
}

impl InMemoryDockAccessibility {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an element, optionally below `parent`
    pub fn insert(&self, element: DockElement, parent: Option<ElementKey>) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if let Some(parent) = parent {
            state.parents.insert(element.key, parent);
        }
        state.elements.insert(element.key, element);
    }

    /// Make `key` the deepest element for points inside `area`
    pub fn map_area(&self, area: Rect, key: ElementKey) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).hits.push((area, key));
    }
}

impl DockAccessibility for InMemoryDockAccessibility {
    fn element_at(&self, point: Point) -> Option<DockElement> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let (_, key) = state.hits.iter().find(|(area, _)| area.contains(point))?;
        state.elements.get(key).cloned()
    }

    fn parent(&self, element: &DockElement) -> Option<DockElement> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let parent = state.parents.get(&element.key)?;
        state.elements.get(parent).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ax_window(key: u64, subrole: &str) -> AxWindow {
        AxWindow {
            key: ElementKey(key),
            window_id: Some(key as u32),
            title: Some(format!("Window {key}")),
            frame: Some(Rect::new(0.0, 0.0, 800.0, 600.0)),
            subrole: Some(subrole.to_string()),
        }
    }

    #[test]
    fn standard_window_detection() {
        assert!(ax_window(1, STANDARD_WINDOW_SUBROLE).is_standard());
        assert!(!ax_window(2, "AXFloatingWindow").is_standard());
    }

    #[test]
    fn in_memory_close_removes_window_and_records_call() {
        let ax = InMemoryAccessibility::new();
        ax.set_windows(7, vec![ax_window(1, STANDARD_WINDOW_SUBROLE), ax_window(2, STANDARD_WINDOW_SUBROLE)]);

        ax.press_close_button(ElementKey(1)).unwrap();
        assert_eq!(ax.windows(7).unwrap().len(), 1);
        assert_eq!(ax.calls(), vec![AxCall::Close(ElementKey(1))]);
        assert!(ax.raise(ElementKey(1)).is_err());
    }

    #[test]
    fn in_memory_dock_walks_parents() {
        let dock = InMemoryDockAccessibility::new();
        let item = DockElement {
            key: ElementKey(1),
            role: Some(DOCK_ITEM_ROLE.to_string()),
            subrole: Some(APPLICATION_DOCK_ITEM_SUBROLE.to_string()),
            title: Some("Safari".to_string()),
            url: None,
            is_running: Some(true),
        };
        let label = DockElement {
            key: ElementKey(2),
            role: Some("AXStaticText".to_string()),
            subrole: None,
            title: None,
            url: None,
            is_running: None,
        };
        dock.insert(item.clone(), None);
        dock.insert(label, Some(ElementKey(1)));
        dock.map_area(Rect::new(100.0, 850.0, 50.0, 50.0), ElementKey(2));

        let hit = dock.element_at(Point::new(120.0, 870.0)).unwrap();
        assert!(!hit.is_dock_item());
        let parent = dock.parent(&hit).unwrap();
        assert!(parent.is_dock_item() && parent.is_application_item());
        assert!(dock.element_at(Point::new(10.0, 10.0)).is_none());
    }
}
