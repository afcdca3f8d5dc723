//! Preview presentation for dock-peek
//!
//! Rendering itself lives outside this crate; this module defines the
//! surface contract and a headless implementation.

pub mod preview;

pub use preview::*;
