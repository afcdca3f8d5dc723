//! Process-wide pointer hook with a permission-loss kill switch.
//!
//! A session event tap that outlives the accessibility grant can stall all
//! pointer input on the machine. Three independent paths therefore tear the
//! tap down the moment permission disappears:
//!
//! - the watchdog thread polls the grant on a short period
//! - the delivery callback re-checks it before every pointer event
//! - OS auto-disable notifications re-enable only while still trusted
//!
//! All three funnel into [`HookShared::invalidate`], a compare-and-swap on
//! the hook state that disables and invalidates the handle without taking a
//! lock. Releasing the run-loop source and the mach port is left to
//! [`InputInterceptionFilter::service`] on the main thread.

use crate::config::FilterConfig;
use crate::macos::{EventDisposition, EventTapBackend, TapControl, TapEvent, TapHandle};
use crate::models::Point;
use crate::permissions::PermissionProvider;
use crate::{DockPeekError, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, error, info, warn};

const IDLE: u8 = 0;
const ACTIVE: u8 = 1;
const INVALIDATING: u8 = 2;
const INVALIDATED: u8 = 3;

/// Lifecycle of the hook handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HookState {
    Idle,
    Active,
    /// Being disabled and invalidated by some thread
    Invalidating,
    /// Dead, waiting for main-thread teardown
    Invalidated,
}

impl HookState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            ACTIVE => HookState::Active,
            INVALIDATING => HookState::Invalidating,
            INVALIDATED => HookState::Invalidated,
            _ => HookState::Idle,
        }
    }
}

/// Why a live hook was invalidated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationReason {
    Stop,
    WatchdogPermissionLoss,
    CallbackPermissionLoss,
    AutoDisabledWithoutPermission,
    External,
}

#[derive(Debug, Default)]
struct FilterStats {
    installs: AtomicU64,
    emergency_invalidations: AtomicU64,
    reenables: AtomicU64,
    events_decided: AtomicU64,
}

/// Counters for the hook's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilterStatsSnapshot {
    pub installs: u64,
    pub emergency_invalidations: u64,
    pub reenables: u64,
    pub events_decided: u64,
}

/// State shared by the main thread, the tap callback and the watchdog
struct HookShared {
    state: AtomicU8,
    /// Raw [`TapHandle`], 0 when none is installed
    handle: AtomicUsize,
    control: Arc<dyn TapControl>,
    permissions: Arc<dyn PermissionProvider>,
    stats: FilterStats,
}

impl HookShared {
    fn state(&self) -> HookState {
        HookState::from_raw(self.state.load(Ordering::SeqCst))
    }

    fn is_active(&self) -> bool {
        self.state.load(Ordering::SeqCst) == ACTIVE
    }

    fn handle(&self) -> Option<TapHandle> {
        TapHandle::from_raw(self.handle.load(Ordering::SeqCst))
    }

    fn permitted(&self) -> bool {
        self.permissions.accessibility_granted()
    }

    /// Disable and invalidate the live handle. Only the caller that wins the
    /// `Active -> Invalidating` exchange touches the handle; everyone else
    /// returns `false` immediately.
    fn invalidate(&self, reason: InvalidationReason) -> bool {
        if self
            .state
            .compare_exchange(ACTIVE, INVALIDATING, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }

        if let Some(handle) = self.handle() {
            self.control.set_enabled(handle, false);
            self.control.invalidate(handle);
        }
        self.state.store(INVALIDATED, Ordering::SeqCst);

        if reason == InvalidationReason::Stop {
            debug!(event = "core.filter.invalidated", ?reason);
        } else {
            self.stats
                .emergency_invalidations
                .fetch_add(1, Ordering::Relaxed);
            warn!(event = "core.filter.emergency_invalidated", ?reason);
        }
        true
    }

    fn on_event<F>(&self, event: TapEvent, decide: &mut F) -> EventDisposition
    where
        F: FnMut(Point) -> EventDisposition,
    {
        match event {
            TapEvent::MouseDown { location } => {
                if !self.is_active() {
                    return EventDisposition::Pass;
                }
                if !self.permitted() {
                    self.invalidate(InvalidationReason::CallbackPermissionLoss);
                    return EventDisposition::Pass;
                }
                self.stats.events_decided.fetch_add(1, Ordering::Relaxed);
                decide(location)
            }
            TapEvent::DisabledByTimeout | TapEvent::DisabledByUserInput => {
                match self.handle() {
                    Some(handle) if self.is_active() && self.permitted() => {
                        self.control.set_enabled(handle, true);
                        self.stats.reenables.fetch_add(1, Ordering::Relaxed);
                        info!(event = "core.filter.reenabled", ?event);
                    }
                    _ => {
                        self.invalidate(InvalidationReason::AutoDisabledWithoutPermission);
                    }
                }
                EventDisposition::Pass
            }
        }
    }
}

/// Thread-safe handle that can kill the hook from anywhere
#[derive(Clone)]
pub struct EmergencyInvalidator {
    shared: Arc<HookShared>,
}

impl EmergencyInvalidator {
    /// Idempotent; returns whether this call did the invalidation
    pub fn invalidate(&self) -> bool {
        self.shared.invalidate(InvalidationReason::External)
    }
}

struct Watchdog {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl Watchdog {
    fn spawn(shared: Weak<HookShared>, config: FilterConfig) -> Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("dock-peek-permission-watchdog".into())
            .spawn(move || {
                debug!(event = "core.filter.watchdog_started");
                while !stop_flag.load(Ordering::SeqCst) {
                    let Some(shared) = shared.upgrade() else {
                        break;
                    };
                    if !shared.is_active() {
                        break;
                    }
                    if !shared.permitted() {
                        shared.invalidate(InvalidationReason::WatchdogPermissionLoss);
                        break;
                    }
                    drop(shared);
                    thread::park_timeout(config.watchdog_period);
                }
                debug!(event = "core.filter.watchdog_exited");
            })?;
        Ok(Self { stop, thread })
    }

    fn shutdown(self) {
        self.stop.store(true, Ordering::SeqCst);
        self.thread.thread().unpark();
        if self.thread.join().is_err() {
            error!(event = "core.filter.watchdog_panicked");
        }
    }
}

/// Owner of the pointer hook. Lives on the main thread.
pub struct InputInterceptionFilter {
    backend: Box<dyn EventTapBackend>,
    shared: Arc<HookShared>,
    config: FilterConfig,
    watchdog: Option<Watchdog>,
    last_start_attempt: Option<Instant>,
}

impl InputInterceptionFilter {
    pub fn new(
        backend: Box<dyn EventTapBackend>,
        permissions: Arc<dyn PermissionProvider>,
        config: FilterConfig,
    ) -> Self {
        let shared = Arc::new(HookShared {
            state: AtomicU8::new(IDLE),
            handle: AtomicUsize::new(0),
            control: backend.control(),
            permissions,
            stats: FilterStats::default(),
        });
        Self {
            backend,
            shared,
            config,
            watchdog: None,
            last_start_attempt: None,
        }
    }

    /// Install the tap and route every primary-button-down through `decide`.
    ///
    /// Returns once the tap is live. Already being active is not an error.
    pub fn start<F>(&mut self, mut decide: F) -> Result<()>
    where
        F: FnMut(Point) -> EventDisposition + 'static,
    {
        self.service();
        match self.shared.state() {
            HookState::Idle => {}
            HookState::Active => return Ok(()),
            state => {
                return Err(DockPeekError::TapUnavailable(format!(
                    "hook is still tearing down ({state:?})"
                ))
                .into())
            }
        }

        if !self.shared.permitted() {
            return Err(DockPeekError::PermissionDenied(
                "accessibility access is required to intercept Dock clicks".into(),
            )
            .into());
        }

        let shared = Arc::clone(&self.shared);
        let handle = self
            .backend
            .install(Box::new(move |event| shared.on_event(event, &mut decide)))?;
        self.shared.handle.store(handle.as_raw(), Ordering::SeqCst);
        self.shared.state.store(ACTIVE, Ordering::SeqCst);

        match Watchdog::spawn(Arc::downgrade(&self.shared), self.config) {
            Ok(watchdog) => self.watchdog = Some(watchdog),
            Err(err) => {
                // Never leave a tap running unsupervised.
                self.shared.invalidate(InvalidationReason::Stop);
                self.service();
                return Err(err.context("failed to spawn permission watchdog"));
            }
        }

        self.shared.stats.installs.fetch_add(1, Ordering::Relaxed);
        info!(event = "core.filter.started", handle = handle.as_raw());
        Ok(())
    }

    /// Remove the tap. Safe to call in any state, any number of times.
    pub fn stop(&mut self) {
        if self.shared.state() == HookState::Idle {
            debug!(event = "core.filter.stop_ignored");
            return;
        }
        self.shared.invalidate(InvalidationReason::Stop);
        self.service();
        info!(event = "core.filter.stopped");
    }

    /// Main-thread housekeeping: finish tearing down an invalidated hook.
    /// Returns whether a teardown happened.
    pub fn service(&mut self) -> bool {
        // Invalidation is a short fixed sequence of non-blocking calls.
        while self.shared.state() == HookState::Invalidating {
            thread::yield_now();
        }
        if self.shared.state() != HookState::Invalidated {
            return false;
        }

        if let Some(handle) = self.shared.handle() {
            self.backend.remove(handle);
        }
        self.shared.handle.store(0, Ordering::SeqCst);
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.shutdown();
        }
        self.shared.state.store(IDLE, Ordering::SeqCst);
        info!(event = "core.filter.torn_down");
        true
    }

    /// True when the main loop should try [`start`](Self::start) again:
    /// the hook is idle and the retry interval has passed since the last
    /// attempt. Records `now` as the new attempt.
    pub fn reinstall_due(&mut self, now: Instant) -> bool {
        if self.shared.state() != HookState::Idle {
            return false;
        }
        let due = self
            .last_start_attempt
            .map_or(true, |last| now.saturating_duration_since(last) >= self.config.reinstall_interval);
        if due {
            self.last_start_attempt = Some(now);
        }
        due
    }

    pub fn emergency_invalidate(&self) -> bool {
        self.shared.invalidate(InvalidationReason::External)
    }

    pub fn invalidator(&self) -> EmergencyInvalidator {
        EmergencyInvalidator {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn is_active(&self) -> bool {
        self.shared.is_active()
    }

    pub fn state(&self) -> HookState {
        self.shared.state()
    }

    pub fn stats(&self) -> FilterStatsSnapshot {
        let stats = &self.shared.stats;
        FilterStatsSnapshot {
            installs: stats.installs.load(Ordering::Relaxed),
            emergency_invalidations: stats.emergency_invalidations.load(Ordering::Relaxed),
            reenables: stats.reenables.load(Ordering::Relaxed),
            events_decided: stats.events_decided.load(Ordering::Relaxed),
        }
    }
}

impl Drop for InputInterceptionFilter {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::macos::{InMemoryEventTap, InMemoryTapDriver};
    use crate::permissions::PermissionFlag;
    use std::time::Duration;

    fn filter() -> (InputInterceptionFilter, InMemoryTapDriver, Arc<PermissionFlag>) {
        let (tap, driver) = InMemoryEventTap::new();
        let permissions = PermissionFlag::granted();
        let filter = InputInterceptionFilter::new(
            Box::new(tap),
            permissions.clone(),
            FilterConfig {
                watchdog_period: Duration::from_millis(10),
                reinstall_interval: Duration::from_secs(2),
            },
        );
        (filter, driver, permissions)
    }

    #[test]
    fn routes_mouse_down_through_decide() {
        let (mut filter, driver, _) = filter();
        filter
            .start(|point| {
                if point.y > 800.0 {
                    EventDisposition::Suppress
                } else {
                    EventDisposition::Pass
                }
            })
            .unwrap();

        assert!(filter.is_active());
        assert_eq!(driver.mouse_down(10.0, 850.0), Some(EventDisposition::Suppress));
        assert_eq!(driver.mouse_down(10.0, 10.0), Some(EventDisposition::Pass));
        assert_eq!(filter.stats().events_decided, 2);
    }

    #[test]
    fn refuses_to_start_without_permission() {
        let (mut filter, driver, permissions) = filter();
        permissions.revoke();

        let err = filter.start(|_| EventDisposition::Suppress).unwrap_err();
        assert!(err.to_string().contains("Permission denied"));
        assert!(!driver.is_installed());
        assert_eq!(filter.state(), HookState::Idle);
    }

    #[test]
    fn callback_detects_revocation_and_passes() {
        let (mut filter, driver, permissions) = filter();
        filter.start(|_| EventDisposition::Suppress).unwrap();
        // Keep the watchdog from getting there first.
        if let Some(watchdog) = filter.watchdog.take() {
            watchdog.shutdown();
        }

        permissions.revoke();
        assert_eq!(driver.mouse_down(1.0, 1.0), Some(EventDisposition::Pass));
        assert!(driver.is_invalidated());
        assert_eq!(filter.state(), HookState::Invalidated);

        assert!(filter.service());
        assert_eq!(filter.state(), HookState::Idle);
        assert!(!driver.is_installed());
    }

    #[test]
    fn auto_disable_reenables_in_place() {
        let (mut filter, driver, _) = filter();
        filter.start(|_| EventDisposition::Pass).unwrap();

        assert_eq!(driver.simulate_timeout(), Some(EventDisposition::Pass));
        assert!(driver.is_enabled());
        assert!(filter.is_active());
        assert_eq!(driver.reenable_count(), 1);
        assert_eq!(driver.install_count(), 1);
    }

    #[test]
    fn stop_and_invalidate_are_idempotent() {
        let (mut filter, driver, _) = filter();
        filter.stop();
        filter.start(|_| EventDisposition::Pass).unwrap();

        assert!(filter.emergency_invalidate());
        assert!(!filter.emergency_invalidate());
        assert!(!filter.invalidator().invalidate());

        filter.stop();
        filter.stop();
        assert_eq!(driver.removal_count(), 1);
        assert_eq!(filter.state(), HookState::Idle);
    }

    #[test]
    fn reinstall_is_rate_limited() {
        let (mut filter, _, _) = filter();
        let now = Instant::now();
        assert!(filter.reinstall_due(now));
        assert!(!filter.reinstall_due(now + Duration::from_secs(1)));
        assert!(filter.reinstall_due(now + Duration::from_secs(2)));
    }
}
