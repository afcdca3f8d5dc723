//! macOS integration layer for dock-peek
//!
//! Every OS seam is a trait with a `System*` implementation over the
//! Accessibility, Core Graphics, AppKit and SkyLight APIs and an `InMemory*`
//! implementation for tests. Off macOS the system implementations compile to
//! stubs that report the platform as unavailable.

pub mod accessibility;
pub mod core_graphics;
pub mod event_tap;
pub mod permissions;
pub mod run_loop;
pub mod workspace;

pub use accessibility::*;
pub use core_graphics::*;
pub use event_tap::*;
pub use permissions::*;
pub use run_loop::*;
pub use workspace::*;
