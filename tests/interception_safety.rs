//! The pointer hook must never swallow input once accessibility access is
//! gone, and its teardown must be safe from any thread.

use dock_peek::config::FilterConfig;
use dock_peek::macos::{EventDisposition, InMemoryEventTap, InMemoryTapDriver};
use dock_peek::permissions::PermissionFlag;
use dock_peek::services::{HookState, InputInterceptionFilter};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn filter(watchdog_period: Duration) -> (InputInterceptionFilter, InMemoryTapDriver, Arc<PermissionFlag>) {
    let (tap, driver) = InMemoryEventTap::new();
    let permissions = PermissionFlag::granted();
    let filter = InputInterceptionFilter::new(
        Box::new(tap),
        permissions.clone(),
        FilterConfig {
            watchdog_period,
            reinstall_interval: Duration::from_secs(2),
        },
    );
    (filter, driver, permissions)
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    condition()
}

#[test]
fn watchdog_invalidates_after_revocation() {
    let (mut filter, driver, permissions) = filter(Duration::from_millis(10));
    let decided = Rc::new(Cell::new(0));
    let counter = Rc::clone(&decided);
    filter
        .start(move |_| {
            counter.set(counter.get() + 1);
            EventDisposition::Suppress
        })
        .unwrap();

    assert_eq!(driver.mouse_down(700.0, 880.0), Some(EventDisposition::Suppress));
    assert_eq!(decided.get(), 1);

    permissions.revoke();
    assert!(wait_until(Duration::from_secs(2), || !filter.is_active()));
    assert!(driver.is_invalidated());

    // Nothing reaches the decision closure any more.
    for _ in 0..5 {
        assert_eq!(driver.mouse_down(700.0, 880.0), None);
    }
    assert_eq!(decided.get(), 1);
    assert_eq!(filter.stats().emergency_invalidations, 1);

    assert!(filter.service());
    assert_eq!(filter.state(), HookState::Idle);
    assert!(!driver.is_installed());
}

#[test]
fn restarts_once_permission_returns() {
    let (mut filter, driver, permissions) = filter(Duration::from_millis(10));
    filter.start(|_| EventDisposition::Suppress).unwrap();

    permissions.revoke();
    assert!(wait_until(Duration::from_secs(2), || !filter.is_active()));
    filter.service();
    assert!(filter.start(|_| EventDisposition::Suppress).is_err());

    permissions.set_accessibility(true);
    filter.start(|_| EventDisposition::Suppress).unwrap();
    assert!(filter.is_active());
    assert_eq!(driver.install_count(), 2);
    assert_eq!(driver.mouse_down(1.0, 1.0), Some(EventDisposition::Suppress));
}

#[test]
fn auto_disabled_tap_without_permission_is_invalidated() {
    // Long watchdog period so the callback path is what notices.
    let (mut filter, driver, permissions) = filter(Duration::from_secs(60));
    filter.start(|_| EventDisposition::Suppress).unwrap();

    permissions.revoke();
    assert_eq!(driver.simulate_timeout(), Some(EventDisposition::Pass));
    assert!(driver.is_invalidated());
    assert!(!driver.is_enabled());
    assert_eq!(driver.reenable_count(), 0);
    assert_eq!(filter.state(), HookState::Invalidated);
    filter.stop();
    assert_eq!(filter.state(), HookState::Idle);
}

#[test]
fn auto_disabled_tap_is_reenabled_in_place() {
    let (mut filter, driver, _) = filter(Duration::from_secs(60));
    filter.start(|_| EventDisposition::Pass).unwrap();

    driver.simulate_timeout();
    driver.simulate_timeout();
    assert!(driver.is_enabled());
    assert_eq!(driver.reenable_count(), 2);
    assert_eq!(driver.install_count(), 1);
    assert_eq!(filter.stats().reenables, 2);
}

#[test]
fn invalidation_from_other_threads_happens_once() {
    let (mut filter, driver, _) = filter(Duration::from_secs(60));
    filter.start(|_| EventDisposition::Suppress).unwrap();

    let winners: usize = (0..8)
        .map(|_| {
            let invalidator = filter.invalidator();
            thread::spawn(move || invalidator.invalidate())
        })
        .collect::<Vec<_>>()
        .into_iter()
        .map(|handle| handle.join().unwrap() as usize)
        .sum();

    assert_eq!(winners, 1);
    assert!(driver.is_invalidated());
    assert_eq!(driver.mouse_down(1.0, 1.0), None);

    assert!(filter.service());
    assert!(!filter.service());
    assert_eq!(driver.removal_count(), 1);
}

#[test]
fn stop_is_idempotent_in_every_state() {
    let (mut filter, driver, _) = filter(Duration::from_millis(10));
    filter.stop();
    assert_eq!(filter.state(), HookState::Idle);

    filter.start(|_| EventDisposition::Pass).unwrap();
    filter.stop();
    filter.stop();
    assert_eq!(driver.removal_count(), 1);

    filter.start(|_| EventDisposition::Pass).unwrap();
    filter.emergency_invalidate();
    filter.stop();
    filter.stop();
    assert_eq!(driver.removal_count(), 2);
    assert_eq!(filter.state(), HookState::Idle);
}

#[test]
fn dropping_the_filter_removes_the_tap() {
    let (mut filter, driver, _) = filter(Duration::from_millis(10));
    filter.start(|_| EventDisposition::Suppress).unwrap();
    drop(filter);

    assert!(!driver.is_installed());
    assert_eq!(driver.mouse_down(1.0, 1.0), None);
}
