//! Data models shared by the registry, hit tester and dispatcher

pub mod app_identity;
pub mod geometry;
pub mod window;

pub use app_identity::*;
pub use geometry::*;
pub use window::*;
