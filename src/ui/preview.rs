//! The seam between the dispatcher and whatever draws the preview.
//!
//! A surface receives the ordered window list with thumbnails attached and a
//! [`PreviewActions`] handle to report what the user did. Everything the
//! handle sends is queued and handled by the dispatcher on the main thread.

use crate::macos::MainSender;
use crate::models::{AppIdentity, Pid, Rect, SnapPosition, WindowId, WindowRecord};
use serde::Serialize;
use tracing::{debug, info};

/// What a surface shows for one interaction
#[derive(Debug, Clone, Serialize)]
pub struct PreviewContent {
    /// Interaction this content belongs to
    pub generation: u64,
    pub app: AppIdentity,
    /// Front-to-back window server order
    pub windows: Vec<WindowRecord>,
    pub show_titles: bool,
}

/// Renders previews. Main-thread only.
pub trait PreviewSurface {
    fn present(&mut self, content: &PreviewContent, actions: PreviewActions);

    /// Replace the windows of an already presented preview
    fn update(&mut self, content: &PreviewContent);

    fn hide(&mut self);

    /// Screen bounds while visible
    fn frame(&self) -> Option<Rect>;

    fn is_visible(&self) -> bool;
}

/// User intent reported by a surface
#[derive(Debug, Clone, PartialEq)]
pub enum PreviewAction {
    Select {
        generation: u64,
        window: WindowId,
        pid: Pid,
    },
    Close {
        generation: u64,
        window: WindowId,
        pid: Pid,
    },
    Snap {
        generation: u64,
        window: WindowId,
        pid: Pid,
        position: SnapPosition,
    },
    Dismiss {
        generation: u64,
    },
    HoverChanged {
        generation: u64,
        window: Option<WindowId>,
    },
}

impl PreviewAction {
    pub fn generation(&self) -> u64 {
        match self {
            PreviewAction::Select { generation, .. }
            | PreviewAction::Close { generation, .. }
            | PreviewAction::Snap { generation, .. }
            | PreviewAction::Dismiss { generation }
            | PreviewAction::HoverChanged { generation, .. } => *generation,
        }
    }
}

/// Callbacks handed to a surface with each presentation. Cheap to clone and
/// safe to keep around: actions from a superseded interaction are dropped.
#[derive(Debug, Clone)]
pub struct PreviewActions {
    generation: u64,
    sender: MainSender<PreviewAction>,
}

impl PreviewActions {
    pub fn new(generation: u64, sender: MainSender<PreviewAction>) -> Self {
        Self { generation, sender }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn select(&self, window: &WindowRecord) {
        self.send(PreviewAction::Select {
            generation: self.generation,
            window: window.id,
            pid: window.pid,
        });
    }

    pub fn close(&self, window: &WindowRecord) {
        self.send(PreviewAction::Close {
            generation: self.generation,
            window: window.id,
            pid: window.pid,
        });
    }

    pub fn snap(&self, window: &WindowRecord, position: SnapPosition) {
        self.send(PreviewAction::Snap {
            generation: self.generation,
            window: window.id,
            pid: window.pid,
            position,
        });
    }

    pub fn dismiss(&self) {
        self.send(PreviewAction::Dismiss {
            generation: self.generation,
        });
    }

    pub fn hover_changed(&self, window: Option<&WindowRecord>) {
        self.send(PreviewAction::HoverChanged {
            generation: self.generation,
            window: window.map(|w| w.id),
        });
    }

    fn send(&self, action: PreviewAction) {
        if let Err(err) = self.sender.send(action) {
            debug!(event = "ui.preview.action_dropped", error = %err);
        }
    }
}

/// Surface that draws nothing and logs what it would show. Used when no
/// renderer is attached, e.g. from the command line.
#[derive(Debug)]
pub struct HeadlessPreviewSurface {
    frame: Rect,
    visible: bool,
    content: Option<PreviewContent>,
    actions: Option<PreviewActions>,
}

impl HeadlessPreviewSurface {
    /// `frame` is reported as the surface bounds while visible
    pub fn new(frame: Rect) -> Self {
        Self {
            frame,
            visible: false,
            content: None,
            actions: None,
        }
    }

    pub fn content(&self) -> Option<&PreviewContent> {
        self.content.as_ref()
    }

    pub fn actions(&self) -> Option<&PreviewActions> {
        self.actions.as_ref()
    }
}

impl PreviewSurface for HeadlessPreviewSurface {
    fn present(&mut self, content: &PreviewContent, actions: PreviewActions) {
        info!(
            event = "ui.preview.presented",
            app = %content.app.name,
            generation = content.generation,
            windows = content.windows.len(),
        );
        for window in &content.windows {
            debug!(
                event = "ui.preview.window",
                id = window.id,
                title = %window.title,
                minimized = window.is_minimized(),
                has_thumbnail = window.thumbnail.is_some(),
            );
        }
        self.content = Some(content.clone());
        self.actions = Some(actions);
        self.visible = true;
    }

    fn update(&mut self, content: &PreviewContent) {
        debug!(
            event = "ui.preview.updated",
            generation = content.generation,
            windows = content.windows.len(),
        );
        self.content = Some(content.clone());
    }

    fn hide(&mut self) {
        if self.visible {
            debug!(event = "ui.preview.hidden");
        }
        self.visible = false;
        self.content = None;
        self.actions = None;
    }

    fn frame(&self) -> Option<Rect> {
        self.visible.then_some(self.frame)
    }

    fn is_visible(&self) -> bool {
        self.visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macos::MainQueue;

    fn record(id: WindowId) -> WindowRecord {
        WindowRecord {
            id,
            title: format!("Window {id}"),
            bounds: Rect::new(0.0, 0.0, 800.0, 600.0),
            pid: 42,
            owner_name: "Editor".into(),
            is_on_screen: true,
            thumbnail: None,
        }
    }

    #[test]
    fn actions_carry_their_generation() {
        let queue = MainQueue::new("preview-test");
        let actions = PreviewActions::new(7, queue.sender());

        actions.select(&record(1));
        actions.snap(&record(2), SnapPosition::Left);
        actions.hover_changed(None);

        let sent = queue.drain();
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|action| action.generation() == 7));
        assert_eq!(
            sent[1],
            PreviewAction::Snap {
                generation: 7,
                window: 2,
                pid: 42,
                position: SnapPosition::Left
            }
        );
    }

    #[test]
    fn actions_outliving_the_queue_are_dropped_quietly() {
        let queue = MainQueue::new("gone");
        let actions = PreviewActions::new(1, queue.sender());
        drop(queue);
        actions.dismiss();
    }

    #[test]
    fn headless_surface_reports_frame_only_while_visible() {
        let frame = Rect::new(400.0, 600.0, 640.0, 240.0);
        let mut surface = HeadlessPreviewSurface::new(frame);
        assert_eq!(surface.frame(), None);

        let queue = MainQueue::new("headless");
        let content = PreviewContent {
            generation: 1,
            app: AppIdentity {
                bundle_id: None,
                name: "Editor".into(),
                bundle_path: None,
                pid: Some(42),
                is_running: true,
            },
            windows: vec![record(1), record(2)],
            show_titles: true,
        };
        surface.present(&content, PreviewActions::new(1, queue.sender()));
        assert_eq!(surface.frame(), Some(frame));
        assert_eq!(surface.content().map(|c| c.windows.len()), Some(2));

        surface.hide();
        assert!(!surface.is_visible());
        assert!(surface.actions().is_none());
    }
}
