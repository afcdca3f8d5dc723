//! Click and hover orchestration.
//!
//! [`ClickDispatcher::on_mouse_down`] runs inside the event tap callback and
//! must answer quickly; anything slower than one enumeration (thumbnail
//! capture, presenting the surface, re-enumeration after a close) is queued
//! as a continuation and run from [`ClickDispatcher::pump`]. Each pump
//! captures at most [`DispatchConfig::thumbnails_per_pump`] thumbnails so the
//! run loop, and with it the tap, is serviced between captures.
//!
//! Every continuation and every surface action carries the generation it was
//! created for and is dropped once a newer interaction has started.

use crate::clock::Clock;
use crate::config::{DispatchConfig, Settings, SettingsProvider};
use crate::macos::{EventDisposition, MainQueue};
use crate::models::{AppIdentity, Pid, Point, WindowRecord};
use crate::services::icon_hit_tester::IconHitTester;
use crate::services::icon_strip::IconStripFilter;
use crate::services::window_registry::WindowRegistry;
use crate::ui::{PreviewAction, PreviewActions, PreviewContent, PreviewSurface};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace};

/// How the current preview was opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Click,
    Hover,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPhase {
    Idle,
    PreviewVisible,
}

#[derive(Debug)]
struct VisiblePreview {
    app: AppIdentity,
    pid: Pid,
    trigger: Trigger,
    /// Window under the pointer inside the surface
    hovered: Option<u32>,
    /// When the pointer left both the icon and the surface
    left_at: Option<Instant>,
}

#[derive(Debug)]
enum DispatchState {
    Idle,
    PreviewVisible(VisiblePreview),
}

#[derive(Debug)]
struct HoverTrack {
    app: AppIdentity,
    since: Instant,
    /// Already acted on; re-arms once the pointer leaves the icon
    fired: bool,
}

/// Per-user-interaction bookkeeping
#[derive(Debug, Default)]
pub struct ClickSession {
    last_click: Option<Instant>,
    hover: Option<HoverTrack>,
    generation: u64,
}

impl ClickSession {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }
}

/// What happens once every window of a population has its thumbnail
#[derive(Debug)]
enum Populated {
    Present {
        app: AppIdentity,
        pid: Pid,
        trigger: Trigger,
    },
    Update,
}

#[derive(Debug)]
enum Continuation {
    /// `windows[..next]` already carry their thumbnails
    PopulateThumbnails {
        generation: u64,
        windows: Vec<WindowRecord>,
        next: usize,
        then: Populated,
    },
    Refresh {
        generation: u64,
        pid: Pid,
    },
}

impl Continuation {
    fn generation(&self) -> u64 {
        match self {
            Continuation::PopulateThumbnails { generation, .. }
            | Continuation::Refresh { generation, .. } => *generation,
        }
    }
}

/// Collaborators the dispatcher drives
pub struct DispatchServices {
    pub hit_tester: IconHitTester,
    pub strip: IconStripFilter,
    pub registry: WindowRegistry,
    pub surface: Box<dyn PreviewSurface>,
    pub settings: Arc<dyn SettingsProvider>,
    pub clock: Arc<dyn Clock>,
}

pub struct ClickDispatcher {
    hit_tester: IconHitTester,
    strip: IconStripFilter,
    registry: WindowRegistry,
    surface: Box<dyn PreviewSurface>,
    settings: Arc<dyn SettingsProvider>,
    clock: Arc<dyn Clock>,
    config: DispatchConfig,
    state: DispatchState,
    session: ClickSession,
    continuations: VecDeque<Continuation>,
    actions: MainQueue<PreviewAction>,
}

impl ClickDispatcher {
    pub fn new(services: DispatchServices, config: DispatchConfig) -> Self {
        Self {
            hit_tester: services.hit_tester,
            strip: services.strip,
            registry: services.registry,
            surface: services.surface,
            settings: services.settings,
            clock: services.clock,
            config,
            state: DispatchState::Idle,
            session: ClickSession::default(),
            continuations: VecDeque::new(),
            actions: MainQueue::new("preview-actions"),
        }
    }

    pub fn phase(&self) -> DispatchPhase {
        match self.state {
            DispatchState::Idle => DispatchPhase::Idle,
            DispatchState::PreviewVisible(_) => DispatchPhase::PreviewVisible,
        }
    }

    pub fn generation(&self) -> u64 {
        self.session.generation()
    }

    pub fn pending_continuations(&self) -> usize {
        self.continuations.len()
    }

    pub fn registry(&self) -> &WindowRegistry {
        &self.registry
    }

    /// Decide the fate of one primary-button-down
    pub fn on_mouse_down(&mut self, point: Point) -> EventDisposition {
        self.sync_surface_visibility();
        if let DispatchState::PreviewVisible(_) = self.state {
            if self.surface.frame().is_some_and(|frame| frame.contains(point)) {
                return EventDisposition::Pass;
            }
            self.dismiss("click_outside");
            return EventDisposition::Suppress;
        }

        let settings = self.settings.settings();
        if !settings.enabled {
            return EventDisposition::Pass;
        }

        let now = self.clock.now();
        if let Some(last) = self.session.last_click {
            if now.saturating_duration_since(last) < self.config.debounce {
                debug!(event = "core.dispatch.debounced");
                return EventDisposition::Pass;
            }
        }

        if !self.strip.contains(point) {
            trace!(event = "core.dispatch.outside_strip", x = point.x, y = point.y);
            return EventDisposition::Pass;
        }
        self.session.last_click = Some(now);

        let Some((app, pid)) = self.previewable_app(point, &settings) else {
            return EventDisposition::Pass;
        };
        if self.begin_preview(app, pid, Trigger::Click, &settings) {
            EventDisposition::Suppress
        } else {
            EventDisposition::Pass
        }
    }

    /// Feed one pointer sample for the hover trigger
    pub fn on_hover_sample(&mut self, point: Point) {
        self.sync_surface_visibility();
        let settings = self.settings.settings();
        if !settings.enabled || !settings.hover_enabled {
            self.session.hover = None;
            return;
        }
        let now = self.clock.now();

        if let DispatchState::PreviewVisible(preview) = &self.state {
            let over_surface = preview.hovered.is_some()
                || self.surface.frame().is_some_and(|frame| frame.contains(point));
            let over_icon = !over_surface
                && self.strip.contains(point)
                && self
                    .hit_tester
                    .resolve(point)
                    .is_some_and(|app| app.same_app(&preview.app));
            let trigger = preview.trigger;
            let left_at = preview.left_at;

            if over_surface || over_icon {
                self.set_left_at(None);
                return;
            }
            // Click-opened previews stay until a click lands elsewhere.
            if trigger == Trigger::Click {
                return;
            }
            match left_at {
                None => self.set_left_at(Some(now)),
                Some(left) if now.saturating_duration_since(left) >= self.config.hover_grace => {
                    self.dismiss("hover_left");
                }
                Some(_) => {}
            }
            return;
        }

        if !self.strip.contains(point) {
            self.session.hover = None;
            return;
        }
        let Some((app, pid)) = self.previewable_app(point, &settings) else {
            self.session.hover = None;
            return;
        };

        let delay = Duration::from_millis(settings.hover_delay_ms);
        let fire = match self.session.hover.as_mut() {
            Some(track) if track.app.same_app(&app) => {
                let due = !track.fired && now.saturating_duration_since(track.since) >= delay;
                track.fired |= due;
                due
            }
            _ => {
                self.session.hover = Some(HoverTrack {
                    app: app.clone(),
                    since: now,
                    fired: false,
                });
                false
            }
        };
        if fire {
            self.begin_preview(app, pid, Trigger::Hover, &settings);
        }
    }

    /// Run queued surface actions and continuations. Main thread only.
    ///
    /// Returns true while continuations remain; the caller should come back
    /// after servicing its run loop instead of sleeping.
    pub fn pump(&mut self) -> bool {
        self.sync_surface_visibility();
        for action in self.actions.drain() {
            self.handle_action(action);
        }

        let mut captures_left = self.config.thumbnails_per_pump.max(1);
        while let Some(continuation) = self.continuations.pop_front() {
            if continuation.generation() != self.session.generation {
                debug!(
                    event = "core.dispatch.stale_continuation",
                    generation = continuation.generation(),
                    current = self.session.generation,
                );
                continue;
            }
            if let Continuation::PopulateThumbnails { .. } = continuation {
                if captures_left == 0 {
                    self.continuations.push_front(continuation);
                    break;
                }
                captures_left -= 1;
            }
            self.run_continuation(continuation);
        }
        !self.continuations.is_empty()
    }

    /// Hide any preview and cancel everything in flight
    pub fn dismiss(&mut self, reason: &str) {
        let generation = self.session.next_generation();
        self.session.hover = None;
        if let DispatchState::PreviewVisible(preview) =
            std::mem::replace(&mut self.state, DispatchState::Idle)
        {
            self.surface.hide();
            self.registry.set_preview_visible(false);
            info!(event = "core.dispatch.dismissed", reason, app = %preview.app.name, generation);
        }
    }

    /// Follow a surface that went away on its own (closed by the user, lost
    /// its display) back to idle without hiding it again.
    fn sync_surface_visibility(&mut self) {
        if !matches!(self.state, DispatchState::PreviewVisible(_)) || self.surface.is_visible() {
            return;
        }
        let generation = self.session.next_generation();
        self.session.hover = None;
        self.state = DispatchState::Idle;
        self.registry.set_preview_visible(false);
        info!(event = "core.dispatch.surface_gone", generation);
    }

    fn previewable_app(&self, point: Point, settings: &Settings) -> Option<(AppIdentity, Pid)> {
        let app = self.hit_tester.resolve(point)?;
        if !app.is_running {
            debug!(event = "core.dispatch.not_running", app = %app.name);
            return None;
        }
        if app.is_excluded_by(&settings.excluded_bundle_ids) {
            debug!(event = "core.dispatch.excluded", app = %app.name);
            return None;
        }
        let pid = app.pid?;
        Some((app, pid))
    }

    /// Enumerate and queue presentation. False when the app has fewer than
    /// two windows and the OS should handle the click itself.
    fn begin_preview(
        &mut self,
        app: AppIdentity,
        pid: Pid,
        trigger: Trigger,
        settings: &Settings,
    ) -> bool {
        let windows = self
            .registry
            .windows_for_app(pid, settings.include_minimized);
        if windows.len() < 2 {
            debug!(event = "core.dispatch.too_few_windows", app = %app.name, count = windows.len());
            return false;
        }

        let generation = self.session.next_generation();
        info!(
            event = "core.dispatch.preview_requested",
            app = %app.name,
            pid,
            windows = windows.len(),
            ?trigger,
            generation,
        );
        self.continuations.push_back(Continuation::PopulateThumbnails {
            generation,
            windows,
            next: 0,
            then: Populated::Present { app, pid, trigger },
        });
        true
    }

    fn run_continuation(&mut self, continuation: Continuation) {
        let settings = self.settings.settings();
        match continuation {
            Continuation::PopulateThumbnails {
                generation,
                mut windows,
                next,
                then,
            } => {
                if let Some(window) = windows.get_mut(next) {
                    window.thumbnail =
                        self.registry.thumbnail(window.id, settings.thumbnail_max_size);
                }
                if next + 1 < windows.len() {
                    self.continuations.push_front(Continuation::PopulateThumbnails {
                        generation,
                        windows,
                        next: next + 1,
                        then,
                    });
                } else {
                    self.finish_population(generation, windows, then, &settings);
                }
            }
            Continuation::Refresh { generation, pid } => {
                let DispatchState::PreviewVisible(preview) = &self.state else {
                    return;
                };
                if preview.pid != pid {
                    return;
                }
                let windows = self
                    .registry
                    .windows_for_app(pid, settings.include_minimized);
                if windows.is_empty() {
                    self.dismiss("no_windows_left");
                    return;
                }
                self.continuations.push_front(Continuation::PopulateThumbnails {
                    generation,
                    windows,
                    next: 0,
                    then: Populated::Update,
                });
            }
        }
    }

    fn finish_population(
        &mut self,
        generation: u64,
        windows: Vec<WindowRecord>,
        then: Populated,
        settings: &Settings,
    ) {
        match then {
            Populated::Present { app, pid, trigger } => {
                let content = PreviewContent {
                    generation,
                    app: app.clone(),
                    windows,
                    show_titles: settings.show_titles,
                };
                self.registry.set_preview_visible(true);
                self.surface
                    .present(&content, PreviewActions::new(generation, self.actions.sender()));
                self.state = DispatchState::PreviewVisible(VisiblePreview {
                    app,
                    pid,
                    trigger,
                    hovered: None,
                    left_at: None,
                });
            }
            Populated::Update => {
                let DispatchState::PreviewVisible(preview) = &self.state else {
                    return;
                };
                self.surface.update(&PreviewContent {
                    generation,
                    app: preview.app.clone(),
                    windows,
                    show_titles: settings.show_titles,
                });
            }
        }
    }

    fn handle_action(&mut self, action: PreviewAction) {
        if action.generation() != self.session.generation {
            debug!(
                event = "core.dispatch.stale_action",
                generation = action.generation(),
                current = self.session.generation,
            );
            return;
        }

        match action {
            PreviewAction::Select { window, pid, .. } => {
                let outcome = self.registry.activate(window, pid);
                debug!(event = "core.dispatch.selected", window, ?outcome);
                self.dismiss("selected");
            }
            PreviewAction::Close {
                generation,
                window,
                pid,
            } => {
                if self.registry.close(window, pid) {
                    self.continuations
                        .push_back(Continuation::Refresh { generation, pid });
                }
            }
            PreviewAction::Snap {
                window,
                pid,
                position,
                ..
            } => {
                self.registry.snap(window, pid, position);
                self.dismiss("snapped");
            }
            PreviewAction::Dismiss { .. } => self.dismiss("surface"),
            PreviewAction::HoverChanged { window, .. } => {
                if let DispatchState::PreviewVisible(preview) = &mut self.state {
                    preview.hovered = window;
                    if window.is_some() {
                        preview.left_at = None;
                    }
                }
            }
        }
    }

    fn set_left_at(&mut self, left_at: Option<Instant>) {
        if let DispatchState::PreviewVisible(preview) = &mut self.state {
            preview.left_at = left_at;
        }
    }
}
