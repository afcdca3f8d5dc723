//! Window server access: the on-screen window list, per-window capture and
//! display geometry.

use crate::models::{Pid, Point, Rect, WindowId};
use crate::Result;
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// Window stacking layer used by ordinary application windows
pub const NORMAL_WINDOW_LAYER: i32 = 0;

/// One entry of the window server's window list
#[derive(Debug, Clone, PartialEq)]
pub struct WindowServerEntry {
    pub id: WindowId,
    pub pid: Pid,
    pub owner_name: String,
    pub title: Option<String>,
    pub bounds: Rect,
    pub layer: i32,
    pub alpha: f64,
    pub is_on_screen: bool,
}

/// Abstraction over `CGWindowListCopyWindowInfo` and window capture
pub trait WindowServer: Send + Sync {
    /// Every window known to the window server, desktop elements excluded
    fn window_list(&self) -> Result<Vec<WindowServerEntry>>;

    /// Current contents of a single window, framing ignored. `None` when the
    /// window is gone or screen recording is not permitted.
    fn capture_window(&self, window_id: WindowId) -> Option<RgbaImage>;
}

/// Geometry of one physical display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayGeometry {
    pub id: u32,
    /// Full bounds of the display
    pub frame: Rect,
    /// Bounds minus the menu bar and the Dock
    pub visible_frame: Rect,
    pub is_primary: bool,
}

impl DisplayGeometry {
    pub fn contains(&self, point: Point) -> bool {
        self.frame.contains(point)
    }
}

/// Abstraction over display enumeration
pub trait DisplayProvider: Send + Sync {
    fn displays(&self) -> Vec<DisplayGeometry>;

    /// Display containing `point`, falling back to the primary display
    fn display_containing(&self, point: Point) -> Option<DisplayGeometry> {
        let displays = self.displays();
        displays
            .iter()
            .find(|display| display.contains(point))
            .or_else(|| displays.iter().find(|display| display.is_primary))
            .or_else(|| displays.first())
            .copied()
    }
}

/// System window server backed by Core Graphics
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemWindowServer;

impl SystemWindowServer {
    pub fn new() -> Self {
        Self
    }
}

impl WindowServer for SystemWindowServer {
    fn window_list(&self) -> Result<Vec<WindowServerEntry>> {
        platform::window_list()
    }

    fn capture_window(&self, window_id: WindowId) -> Option<RgbaImage> {
        platform::capture_window(window_id)
    }
}

/// System display provider backed by `NSScreen`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDisplayProvider;

impl SystemDisplayProvider {
    pub fn new() -> Self {
        Self
    }
}

impl DisplayProvider for SystemDisplayProvider {
    fn displays(&self) -> Vec<DisplayGeometry> {
        platform::displays()
    }
}

#[cfg(target_os = "macos")]
mod platform {
    use super::{DisplayGeometry, WindowServerEntry};
    use crate::models::Rect;
    use crate::{DockPeekError, Result};
    use core_foundation::array::CFArray;
    use core_foundation::base::{CFType, TCFType};
    use core_foundation::boolean::CFBoolean;
    use core_foundation::dictionary::{CFDictionary, CFDictionaryRef};
    use core_foundation::number::CFNumber;
    use core_foundation::string::CFString;
    use core_graphics::geometry::{CGPoint, CGRect, CGSize};
    use core_graphics::window::{
        create_image, kCGNullWindowID, kCGWindowImageBoundsIgnoreFraming,
        kCGWindowImageNominalResolution, kCGWindowListExcludeDesktopElements,
        kCGWindowListOptionAll, kCGWindowListOptionIncludingWindow, CGWindowListCopyWindowInfo,
    };
    use image::RgbaImage;
    use std::ffi::c_void;

    const WINDOW_NUMBER: &str = "kCGWindowNumber";
    const WINDOW_OWNER_PID: &str = "kCGWindowOwnerPID";
    const WINDOW_OWNER_NAME: &str = "kCGWindowOwnerName";
    const WINDOW_NAME: &str = "kCGWindowName";
    const WINDOW_BOUNDS: &str = "kCGWindowBounds";
    const WINDOW_LAYER: &str = "kCGWindowLayer";
    const WINDOW_ALPHA: &str = "kCGWindowAlpha";
    const WINDOW_IS_ONSCREEN: &str = "kCGWindowIsOnscreen";

    #[link(name = "CoreGraphics", kind = "framework")]
    extern "C" {
        static CGRectNull: CGRect;
        fn CGRectMakeWithDictionaryRepresentation(dict: *const c_void, rect: *mut CGRect) -> bool;
    }

    pub fn window_list() -> Result<Vec<WindowServerEntry>> {
        let options = kCGWindowListOptionAll | kCGWindowListExcludeDesktopElements;
        let list = unsafe { CGWindowListCopyWindowInfo(options, kCGNullWindowID) };
        if list.is_null() {
            return Err(DockPeekError::MacOSAPIError("CGWindowListCopyWindowInfo returned null".into()).into());
        }

        let windows: CFArray<CFDictionary<CFString, CFType>> =
            unsafe { CFArray::wrap_under_create_rule(list) };

        Ok(windows
            .iter()
            .filter_map(|dict| parse_entry(&dict))
            .collect())
    }

    fn parse_entry(dict: &CFDictionary<CFString, CFType>) -> Option<WindowServerEntry> {
        let id = number(dict, WINDOW_NUMBER)?.to_i64()? as u32;
        let pid = number(dict, WINDOW_OWNER_PID)?.to_i64()? as i32;
        let layer = number(dict, WINDOW_LAYER).and_then(|n| n.to_i64()).unwrap_or(0) as i32;
        let alpha = number(dict, WINDOW_ALPHA).and_then(|n| n.to_f64()).unwrap_or(1.0);
        let is_on_screen = dict
            .find(&CFString::new(WINDOW_IS_ONSCREEN))
            .and_then(|value| value.downcast::<CFBoolean>())
            .map(bool::from)
            .unwrap_or(false);

        Some(WindowServerEntry {
            id,
            pid,
            owner_name: string(dict, WINDOW_OWNER_NAME).unwrap_or_default(),
            title: string(dict, WINDOW_NAME),
            bounds: bounds(dict)?,
            layer,
            alpha,
            is_on_screen,
        })
    }

    fn number(dict: &CFDictionary<CFString, CFType>, key: &str) -> Option<CFNumber> {
        dict.find(&CFString::new(key))
            .and_then(|value| value.downcast::<CFNumber>())
    }

    fn string(dict: &CFDictionary<CFString, CFType>, key: &str) -> Option<String> {
        dict.find(&CFString::new(key))
            .and_then(|value| value.downcast::<CFString>())
            .map(|s| s.to_string())
    }

    fn bounds(dict: &CFDictionary<CFString, CFType>) -> Option<Rect> {
        let value = dict.find(&CFString::new(WINDOW_BOUNDS))?;
        let dict_ref = value.as_CFTypeRef() as CFDictionaryRef;
        let mut rect = CGRect::new(&CGPoint::new(0.0, 0.0), &CGSize::new(0.0, 0.0));
        let ok = unsafe { CGRectMakeWithDictionaryRepresentation(dict_ref.cast(), &mut rect) };
        ok.then(|| Rect::new(rect.origin.x, rect.origin.y, rect.size.width, rect.size.height))
    }

    pub fn capture_window(window_id: u32) -> Option<RgbaImage> {
        let image = create_image(
            unsafe { CGRectNull },
            kCGWindowListOptionIncludingWindow,
            window_id,
            kCGWindowImageBoundsIgnoreFraming | kCGWindowImageNominalResolution,
        )?;

        let width = image.width();
        let height = image.height();
        let bytes_per_row = image.bytes_per_row();
        if width == 0 || height == 0 || image.bits_per_pixel() != 32 {
            return None;
        }

        // Window captures are 32-bit BGRA, little endian, premultiplied.
        let data = image.data();
        let bytes = data.bytes();
        let mut rgba = Vec::with_capacity(width * height * 4);
        for row in 0..height {
            let start = row * bytes_per_row;
            let line = bytes.get(start..start + width * 4)?;
            for px in line.chunks_exact(4) {
                rgba.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
            }
        }

        RgbaImage::from_raw(width as u32, height as u32, rgba)
    }

    pub fn displays() -> Vec<DisplayGeometry> {
        use cocoa::appkit::NSScreen;
        use cocoa::base::nil;
        use cocoa::foundation::{NSArray, NSAutoreleasePool, NSRect};

        unsafe {
            let pool = NSAutoreleasePool::new(nil);
            let screens = NSScreen::screens(nil);
            let count = NSArray::count(screens);
            let mut result = Vec::with_capacity(count as usize);

            // Cocoa uses a bottom-left origin anchored at the primary screen.
            let mut primary_height = 0.0;
            for index in 0..count {
                let screen = NSArray::objectAtIndex(screens, index);
                let frame: NSRect = NSScreen::frame(screen);
                let visible: NSRect = NSScreen::visibleFrame(screen);
                if index == 0 {
                    primary_height = frame.size.height;
                }
                let flip = |r: NSRect| {
                    Rect::new(
                        r.origin.x,
                        primary_height - (r.origin.y + r.size.height),
                        r.size.width,
                        r.size.height,
                    )
                };
                result.push(DisplayGeometry {
                    id: index as u32,
                    frame: flip(frame),
                    visible_frame: flip(visible),
                    is_primary: index == 0,
                });
            }

            pool.drain();
            result
        }
    }
}

#[cfg(not(target_os = "macos"))]
mod platform {
    use super::{DisplayGeometry, WindowServerEntry};
    use crate::{DockPeekError, Result};
    use image::RgbaImage;

    pub fn window_list() -> Result<Vec<WindowServerEntry>> {
        Err(DockPeekError::MacOSAPIError(
            "the window server is not available on this platform".into(),
        )
        .into())
    }

    pub fn capture_window(_window_id: u32) -> Option<RgbaImage> {
        None
    }

    pub fn displays() -> Vec<DisplayGeometry> {
        Vec::new()
    }
}

#[derive(Debug, Default)]
struct InMemoryWindowServerState {
    entries: Vec<WindowServerEntry>,
    images: HashMap<WindowId, RgbaImage>,
}

/// In-memory window server for tests and benchmarks.
///
/// Clones share state, so a test can keep a handle after moving one into the
/// registry.
#[derive(Debug, Clone, Default)]
pub struct InMemoryWindowServer {
    state: Arc<RwLock<InMemoryWindowServerState>>,
    list_calls: Arc<AtomicUsize>,
    capture_calls: Arc<AtomicUsize>,
}

impl InMemoryWindowServer {
    pub fn new_with(entries: Vec<WindowServerEntry>) -> Self {
        let server = Self::default();
        server.set_entries(entries);
        server
    }

    pub fn set_entries(&self, entries: Vec<WindowServerEntry>) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).entries = entries;
    }

    pub fn remove_window(&self, window_id: WindowId) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.entries.retain(|entry| entry.id != window_id);
        state.images.remove(&window_id);
    }

    pub fn set_image(&self, window_id: WindowId, image: RgbaImage) {
        self.state.write().unwrap_or_else(|e| e.into_inner()).images.insert(window_id, image);
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn capture_calls(&self) -> usize {
        self.capture_calls.load(Ordering::SeqCst)
    }
}

impl WindowServer for InMemoryWindowServer {
    fn window_list(&self) -> Result<Vec<WindowServerEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.read().unwrap_or_else(|e| e.into_inner()).entries.clone())
    }

    fn capture_window(&self, window_id: WindowId) -> Option<RgbaImage> {
        self.capture_calls.fetch_add(1, Ordering::SeqCst);
        self.state.read().unwrap_or_else(|e| e.into_inner()).images.get(&window_id).cloned()
    }
}

/// Fixed display layout for tests
#[derive(Debug, Clone, Default)]
pub struct InMemoryDisplayProvider {
    displays: Vec<DisplayGeometry>,
}

impl InMemoryDisplayProvider {
    pub fn new_with(displays: Vec<DisplayGeometry>) -> Self {
        Self { displays }
    }

    /// A single 1440x900 display with a 25pt menu bar and a 70pt bottom Dock
    pub fn single_bottom_dock() -> Self {
        Self::new_with(vec![DisplayGeometry {
            id: 1,
            frame: Rect::new(0.0, 0.0, 1440.0, 900.0),
            visible_frame: Rect::new(0.0, 25.0, 1440.0, 805.0),
            is_primary: true,
        }])
    }
}

impl DisplayProvider for InMemoryDisplayProvider {
    fn displays(&self) -> Vec<DisplayGeometry> {
        self.displays.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: WindowId) -> WindowServerEntry {
        WindowServerEntry {
            id,
            pid: 100,
            owner_name: "App".to_string(),
            title: Some(format!("Window {id}")),
            bounds: Rect::new(0.0, 0.0, 640.0, 480.0),
            layer: NORMAL_WINDOW_LAYER,
            alpha: 1.0,
            is_on_screen: true,
        }
    }

    #[test]
    fn in_memory_server_counts_calls_and_shares_state() {
        let server = InMemoryWindowServer::new_with(vec![entry(1), entry(2)]);
        let handle = server.clone();

        assert_eq!(server.window_list().unwrap().len(), 2);
        handle.remove_window(1);
        assert_eq!(server.window_list().unwrap().len(), 1);
        assert_eq!(handle.list_calls(), 2);

        assert!(server.capture_window(2).is_none());
        handle.set_image(2, RgbaImage::new(10, 10));
        assert!(server.capture_window(2).is_some());
        assert_eq!(handle.capture_calls(), 2);
    }

    #[test]
    fn display_containing_falls_back_to_primary() {
        let displays = InMemoryDisplayProvider::new_with(vec![
            DisplayGeometry {
                id: 1,
                frame: Rect::new(0.0, 0.0, 1440.0, 900.0),
                visible_frame: Rect::new(0.0, 25.0, 1440.0, 805.0),
                is_primary: true,
            },
            DisplayGeometry {
                id: 2,
                frame: Rect::new(1440.0, 0.0, 1920.0, 1080.0),
                visible_frame: Rect::new(1440.0, 25.0, 1920.0, 1055.0),
                is_primary: false,
            },
        ]);

        assert_eq!(displays.display_containing(Point::new(2000.0, 500.0)).unwrap().id, 2);
        assert_eq!(displays.display_containing(Point::new(-50.0, -50.0)).unwrap().id, 1);
    }
}
