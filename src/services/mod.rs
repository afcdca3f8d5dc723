//! Core services for dock-peek

pub mod click_dispatch;
pub mod icon_hit_tester;
pub mod icon_strip;
pub mod input_filter;
pub mod thumbnail_cache;
pub mod ttl_cache;
pub mod window_matcher;
pub mod window_registry;

pub use click_dispatch::*;
pub use icon_hit_tester::*;
pub use icon_strip::*;
pub use input_filter::*;
pub use thumbnail_cache::*;
pub use ttl_cache::*;
pub use window_matcher::*;
pub use window_registry::*;
