use crate::macos::{DockAccessibility, DockElement, ProcessProvider, RunningApp};
use crate::models::{AppIdentity, Point};
use std::sync::Arc;
use tracing::debug;

/// Resolves a screen point to the application whose Dock tile is under it.
///
/// Read-only; nothing is cached between calls.
pub struct IconHitTester {
    dock: Box<dyn DockAccessibility>,
    processes: Arc<dyn ProcessProvider>,
    max_ancestor_hops: usize,
}

impl IconHitTester {
    pub fn new(
        dock: Box<dyn DockAccessibility>,
        processes: Arc<dyn ProcessProvider>,
        max_ancestor_hops: usize,
    ) -> Self {
        Self {
            dock,
            processes,
            max_ancestor_hops,
        }
    }

    pub fn resolve(&self, point: Point) -> Option<AppIdentity> {
        let item = self.dock_item_at(point)?;
        if !item.is_application_item() {
            debug!(event = "core.hit_test.not_application", subrole = ?item.subrole);
            return None;
        }

        let running = self.processes.running_apps();
        let identity = self
            .by_bundle_url(&item, &running)
            .or_else(|| by_title(&item, &running))
            .unwrap_or_else(|| AppIdentity {
                bundle_id: None,
                name: item.title.clone().unwrap_or_default(),
                bundle_path: item.url.clone(),
                pid: None,
                is_running: item.is_running.unwrap_or(false),
            });

        debug!(
            event = "core.hit_test.resolved",
            name = %identity.name,
            bundle_id = ?identity.bundle_id,
            pid = ?identity.pid,
            is_running = identity.is_running,
        );
        Some(identity)
    }

    /// The hit element itself or the nearest `AXDockItem` ancestor
    fn dock_item_at(&self, point: Point) -> Option<DockElement> {
        let mut element = self.dock.element_at(point)?;
        let mut hops = 0;
        while !element.is_dock_item() {
            if hops == self.max_ancestor_hops {
                debug!(event = "core.hit_test.no_dock_item", hops);
                return None;
            }
            element = self.dock.parent(&element)?;
            hops += 1;
        }
        Some(element)
    }

    fn by_bundle_url(&self, item: &DockElement, running: &[RunningApp]) -> Option<AppIdentity> {
        let url = item.url.as_ref()?;
        let bundle_id = self.processes.bundle_identifier(url)?;
        // No running process for the bundle: leave it to the later tiers.
        let app = running
            .iter()
            .find(|app| app.bundle_id.as_deref() == Some(bundle_id.as_str()))?;

        Some(AppIdentity {
            name: app.name.clone(),
            bundle_id: Some(bundle_id),
            bundle_path: Some(url.clone()),
            pid: Some(app.pid),
            is_running: true,
        })
    }
}

fn by_title(item: &DockElement, running: &[RunningApp]) -> Option<AppIdentity> {
    let title = item.title.as_deref()?;
    let app = running.iter().find(|app| app.name == title)?;
    Some(AppIdentity {
        bundle_id: app.bundle_id.clone(),
        name: app.name.clone(),
        bundle_path: app.bundle_path.clone().or_else(|| item.url.clone()),
        pid: Some(app.pid),
        is_running: true,
    })
}
