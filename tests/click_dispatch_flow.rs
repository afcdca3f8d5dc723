//! Click-to-preview flows driven against a mocked preview surface

use dock_peek::clock::ManualClock;
use dock_peek::config::{DispatchConfig, RegistryConfig, StaticSettings};
use dock_peek::macos::{
    Activation, AxCall, AxWindow, DockElement, ElementKey, EventDisposition,
    InMemoryAccessibility, InMemoryDisplayProvider, InMemoryDockAccessibility, InMemoryProcesses,
    InMemoryWindowServer, RunningApp, WindowServerEntry, APPLICATION_DOCK_ITEM_SUBROLE,
    DOCK_ITEM_ROLE, STANDARD_WINDOW_SUBROLE,
};
use dock_peek::models::{Pid, Point, Rect, SnapPosition, WindowRecord};
use dock_peek::services::{
    ClickDispatcher, DispatchPhase, DispatchServices, IconHitTester, IconStripFilter,
    WindowRegistry,
};
use dock_peek::ui::{PreviewActions, PreviewContent, PreviewSurface};
use image::RgbaImage;
use mockall::mock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

mock! {
    pub Surface {}

    impl PreviewSurface for Surface {
        fn present(&mut self, content: &PreviewContent, actions: PreviewActions);
        fn update(&mut self, content: &PreviewContent);
        fn hide(&mut self);
        fn frame(&self) -> Option<Rect>;
        fn is_visible(&self) -> bool;
    }
}

const PID: Pid = 311;
const ICON: Rect = Rect::new(400.0, 835.0, 64.0, 64.0);
const ON_ICON: Point = Point::new(430.0, 860.0);
const SURFACE: Rect = Rect::new(200.0, 480.0, 900.0, 320.0);

/// What the mocked surface has been handed so far
#[derive(Default)]
struct Seen {
    presented: Vec<PreviewContent>,
    updated: Vec<PreviewContent>,
    actions: Option<PreviewActions>,
}

struct Flow {
    dispatcher: ClickDispatcher,
    server: InMemoryWindowServer,
    accessibility: InMemoryAccessibility,
    processes: InMemoryProcesses,
    clock: Arc<ManualClock>,
    seen: Arc<Mutex<Seen>>,
    /// What the surface answers to `is_visible`
    visible: Arc<AtomicBool>,
}

impl Flow {
    fn settle(&mut self) {
        while self.dispatcher.pump() {}
    }

    fn actions(&self) -> PreviewActions {
        self.seen.lock().unwrap().actions.clone().expect("preview was presented")
    }

    fn record(&self, id: u32) -> WindowRecord {
        self.seen.lock().unwrap().presented[0]
            .windows
            .iter()
            .find(|window| window.id == id)
            .cloned()
            .expect("window was presented")
    }

    /// Make a close stick: the window server forgets the window too
    fn forget(&self, id: u32) {
        self.server.remove_window(id);
    }
}

fn entry(id: u32) -> WindowServerEntry {
    WindowServerEntry {
        id,
        pid: PID,
        owner_name: "Terminal".into(),
        title: Some(format!("shell {id}")),
        bounds: Rect::new(60.0 * id as f64, 80.0, 700.0, 450.0),
        layer: 0,
        alpha: 1.0,
        is_on_screen: true,
    }
}

fn ax(id: u32) -> AxWindow {
    AxWindow {
        key: ElementKey(1000 + id as u64),
        window_id: Some(id),
        title: Some(format!("shell {id}")),
        frame: Some(Rect::new(60.0 * id as f64, 80.0, 700.0, 450.0)),
        subrole: Some(STANDARD_WINDOW_SUBROLE.into()),
    }
}

fn surface(
    seen: &Arc<Mutex<Seen>>,
    visible: &Arc<AtomicBool>,
    updates: usize,
    hides: usize,
) -> MockSurface {
    let mut surface = MockSurface::new();
    let on_present = Arc::clone(seen);
    surface
        .expect_present()
        .times(1)
        .returning(move |content, actions| {
            let mut seen = on_present.lock().unwrap();
            seen.presented.push(content.clone());
            seen.actions = Some(actions);
        });
    let on_update = Arc::clone(seen);
    surface
        .expect_update()
        .times(updates)
        .returning(move |content| on_update.lock().unwrap().updated.push(content.clone()));
    surface.expect_hide().times(hides).return_const(());
    surface.expect_frame().return_const(Some(SURFACE));
    let visible = Arc::clone(visible);
    surface
        .expect_is_visible()
        .returning(move || visible.load(Ordering::SeqCst));
    surface
}

fn flow(window_count: u32, surface_updates: usize, surface_hides: usize) -> Flow {
    let ids: Vec<u32> = (1..=window_count).collect();
    let server = InMemoryWindowServer::new_with(ids.iter().map(|id| entry(*id)).collect());
    let accessibility = InMemoryAccessibility::new();
    accessibility.set_windows(PID, ids.iter().map(|id| ax(*id)).collect());

    let processes = InMemoryProcesses::new_with(vec![RunningApp {
        pid: PID,
        bundle_id: Some("com.example.terminal".into()),
        name: "Terminal".into(),
        bundle_path: Some("/System/Applications/Utilities/Terminal.app".into()),
    }]);
    let dock = InMemoryDockAccessibility::new();
    dock.insert(
        DockElement {
            key: ElementKey(1),
            role: Some(DOCK_ITEM_ROLE.into()),
            subrole: Some(APPLICATION_DOCK_ITEM_SUBROLE.into()),
            title: Some("Terminal".into()),
            url: Some("/System/Applications/Utilities/Terminal.app".into()),
            is_running: Some(true),
        },
        None,
    );
    // The hit lands on the icon image, one level below the tile.
    dock.insert(
        DockElement {
            key: ElementKey(2),
            role: Some("AXImage".into()),
            subrole: None,
            title: None,
            url: None,
            is_running: None,
        },
        Some(ElementKey(1)),
    );
    dock.map_area(ICON, ElementKey(2));

    let displays = Arc::new(InMemoryDisplayProvider::single_bottom_dock());
    let clock = Arc::new(ManualClock::new());
    let seen = Arc::new(Mutex::new(Seen::default()));
    let visible = Arc::new(AtomicBool::new(true));
    let registry = WindowRegistry::new(
        Box::new(server.clone()),
        Box::new(accessibility.clone()),
        Arc::new(processes.clone()),
        displays.clone(),
        clock.clone(),
        RegistryConfig::default(),
    );
    let dispatcher = ClickDispatcher::new(
        DispatchServices {
            hit_tester: IconHitTester::new(Box::new(dock), Arc::new(processes.clone()), 5),
            strip: IconStripFilter::new(displays, 100.0),
            registry,
            surface: Box::new(surface(&seen, &visible, surface_updates, surface_hides)),
            settings: Arc::new(StaticSettings::default()),
            clock: clock.clone(),
        },
        DispatchConfig::default(),
    );

    Flow {
        dispatcher,
        server,
        accessibility,
        processes,
        clock,
        seen,
        visible,
    }
}

fn open_preview(flow: &mut Flow) {
    assert_eq!(flow.dispatcher.on_mouse_down(ON_ICON), EventDisposition::Suppress);
    flow.settle();
    assert_eq!(flow.dispatcher.phase(), DispatchPhase::PreviewVisible);
}

#[test]
fn presents_windows_in_order_with_thumbnails() {
    let mut flow = flow(3, 0, 0);
    flow.server.set_image(1, RgbaImage::new(1400, 900));
    flow.server.set_image(3, RgbaImage::new(700, 450));
    open_preview(&mut flow);

    let seen = flow.seen.lock().unwrap();
    let content = &seen.presented[0];
    assert_eq!(content.generation, flow.dispatcher.generation());
    assert_eq!(content.app.bundle_id.as_deref(), Some("com.example.terminal"));
    assert_eq!(content.app.pid, Some(PID));
    assert!(content.show_titles);

    let ids: Vec<u32> = content.windows.iter().map(|w| w.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    let first = content.windows[0].thumbnail.as_ref().unwrap();
    assert_eq!((first.width(), first.height()), (300, 193));
    assert!(content.windows[1].thumbnail.is_none());
    assert!(content.windows[2].thumbnail.is_some());
}

#[test]
fn closing_windows_refreshes_until_none_remain() {
    let mut flow = flow(3, 2, 1);
    open_preview(&mut flow);
    let actions = flow.actions();

    actions.close(&flow.record(2));
    flow.forget(2);
    flow.settle();
    {
        let seen = flow.seen.lock().unwrap();
        let ids: Vec<u32> = seen.updated[0].windows.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![1, 3]);
    }
    assert_eq!(flow.dispatcher.phase(), DispatchPhase::PreviewVisible);

    actions.close(&flow.record(1));
    flow.forget(1);
    flow.settle();
    {
        let seen = flow.seen.lock().unwrap();
        let ids: Vec<u32> = seen.updated[1].windows.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![3]);
    }

    actions.close(&flow.record(3));
    flow.forget(3);
    flow.settle();
    assert_eq!(flow.dispatcher.phase(), DispatchPhase::Idle);
    assert_eq!(
        flow.accessibility.calls(),
        vec![
            AxCall::Close(ElementKey(1002)),
            AxCall::Close(ElementKey(1001)),
            AxCall::Close(ElementKey(1003)),
        ]
    );
}

#[test]
fn snap_moves_activates_and_dismisses() {
    let mut flow = flow(2, 0, 1);
    open_preview(&mut flow);

    flow.actions().snap(&flow.record(2), SnapPosition::Right);
    flow.settle();

    assert_eq!(flow.dispatcher.phase(), DispatchPhase::Idle);
    assert_eq!(
        flow.accessibility.calls()[0],
        AxCall::SetFrame(ElementKey(1002), Rect::new(720.0, 25.0, 720.0, 805.0))
    );
    assert_eq!(flow.processes.activations(), vec![Activation::Window(PID, 2)]);
}

#[test]
fn actions_from_a_dismissed_preview_are_ignored() {
    let mut flow = flow(2, 0, 1);
    open_preview(&mut flow);
    let stale = flow.actions();

    assert_eq!(flow.dispatcher.on_mouse_down(Point::new(5.0, 5.0)), EventDisposition::Suppress);
    assert_eq!(flow.dispatcher.phase(), DispatchPhase::Idle);

    stale.select(&flow.record(1));
    stale.close(&flow.record(2));
    flow.settle();

    assert!(flow.processes.activations().is_empty());
    assert!(flow.accessibility.calls().is_empty());
}

#[test]
fn click_inside_surface_reaches_the_surface() {
    let mut flow = flow(2, 0, 0);
    open_preview(&mut flow);

    flow.clock.advance(Duration::from_secs(1));
    assert_eq!(flow.dispatcher.on_mouse_down(Point::new(500.0, 600.0)), EventDisposition::Pass);
    assert_eq!(flow.dispatcher.phase(), DispatchPhase::PreviewVisible);
}

#[test]
fn surface_dismiss_hides_once() {
    let mut flow = flow(2, 0, 1);
    open_preview(&mut flow);

    let actions = flow.actions();
    actions.dismiss();
    actions.dismiss();
    flow.settle();
    assert_eq!(flow.dispatcher.phase(), DispatchPhase::Idle);
}

#[test]
fn thumbnails_are_captured_one_per_pump() {
    let mut flow = flow(3, 0, 0);
    for id in 1..=3 {
        flow.server.set_image(id, RgbaImage::new(700, 450));
    }
    assert_eq!(flow.dispatcher.on_mouse_down(ON_ICON), EventDisposition::Suppress);
    assert_eq!(flow.server.capture_calls(), 0);

    for captured in 1..=3 {
        assert_eq!(flow.seen.lock().unwrap().presented.len(), 0);
        flow.dispatcher.pump();
        assert_eq!(flow.server.capture_calls(), captured);
    }
    assert_eq!(flow.dispatcher.phase(), DispatchPhase::PreviewVisible);
    assert_eq!(flow.seen.lock().unwrap().presented[0].windows.len(), 3);
}

#[test]
fn surface_closed_on_its_own_returns_to_idle() {
    // The surface hid itself, so the dispatcher must not hide it again.
    let mut flow = flow(2, 0, 0);
    open_preview(&mut flow);
    let stale = flow.actions();

    flow.visible.store(false, Ordering::SeqCst);
    flow.clock.advance(Duration::from_secs(1));
    // Outside the icon strip: no preview left to dismiss, so the click passes.
    assert_eq!(flow.dispatcher.on_mouse_down(Point::new(5.0, 5.0)), EventDisposition::Pass);
    assert_eq!(flow.dispatcher.phase(), DispatchPhase::Idle);

    stale.select(&flow.record(1));
    flow.settle();
    assert!(flow.processes.activations().is_empty());
}

#[test]
fn pump_notices_a_vanished_surface() {
    let mut flow = flow(2, 0, 0);
    open_preview(&mut flow);
    let generation = flow.dispatcher.generation();

    flow.visible.store(false, Ordering::SeqCst);
    assert!(!flow.dispatcher.pump());
    assert_eq!(flow.dispatcher.phase(), DispatchPhase::Idle);
    assert_eq!(flow.dispatcher.generation(), generation + 1);
}
