use crate::models::geometry::Rect;
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Window server identifier, unique within a login session
pub type WindowId = u32;

/// Process identifier
pub type Pid = libc::pid_t;

/// Scaled window capture shared between the cache and preview consumers.
///
/// Cloning a `Thumbnail` is cheap and yields the same underlying image; two
/// handles compare identical with [`Thumbnail::same_image`].
#[derive(Clone)]
pub struct Thumbnail(Arc<RgbaImage>);

impl Thumbnail {
    pub fn new(image: RgbaImage) -> Self {
        Self(Arc::new(image))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.0
    }

    pub fn same_image(&self, other: &Thumbnail) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Thumbnail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thumbnail")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}

/// One application window as reported by the window server
#[derive(Debug, Clone, Serialize)]
pub struct WindowRecord {
    pub id: WindowId,
    pub title: String,
    pub bounds: Rect,
    pub pid: Pid,
    pub owner_name: String,
    pub is_on_screen: bool,
    #[serde(skip)]
    pub thumbnail: Option<Thumbnail>,
}

impl WindowRecord {
    /// Off-screen windows are treated as minimized (or on another space).
    pub fn is_minimized(&self) -> bool {
        !self.is_on_screen
    }
}

/// Target region when snapping a window on its current display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapPosition {
    Left,
    Right,
    Fill,
}

impl SnapPosition {
    /// Region of `usable` (a display's visible frame) the window should occupy
    pub fn target_in(self, usable: Rect) -> Rect {
        match self {
            SnapPosition::Left => usable.left_half(),
            SnapPosition::Right => usable.right_half(),
            SnapPosition::Fill => usable,
        }
    }
}

impl FromStr for SnapPosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "left" => Ok(SnapPosition::Left),
            "right" => Ok(SnapPosition::Right),
            "fill" | "full" => Ok(SnapPosition::Fill),
            _ => Err(format!("Invalid snap position: {}", s)),
        }
    }
}

impl fmt::Display for SnapPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SnapPosition::Left => write!(f, "left"),
            SnapPosition::Right => write!(f, "right"),
            SnapPosition::Fill => write!(f, "fill"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimized_is_derived_from_on_screen() {
        let record = WindowRecord {
            id: 7,
            title: "Inbox".to_string(),
            bounds: Rect::new(0.0, 0.0, 400.0, 300.0),
            pid: 42,
            owner_name: "Mail".to_string(),
            is_on_screen: false,
            thumbnail: None,
        };
        assert!(record.is_minimized());
    }

    #[test]
    fn thumbnail_clones_share_image() {
        let thumb = Thumbnail::new(RgbaImage::new(4, 3));
        let copy = thumb.clone();
        let other = Thumbnail::new(RgbaImage::new(4, 3));
        assert!(thumb.same_image(&copy));
        assert!(!thumb.same_image(&other));
    }

    #[test]
    fn snap_position_parsing_and_targets() {
        assert_eq!("LEFT".parse::<SnapPosition>().unwrap(), SnapPosition::Left);
        assert_eq!("full".parse::<SnapPosition>().unwrap(), SnapPosition::Fill);
        assert!("top".parse::<SnapPosition>().is_err());

        let usable = Rect::new(0.0, 25.0, 1440.0, 800.0);
        assert_eq!(SnapPosition::Fill.target_in(usable), usable);
        assert_eq!(
            SnapPosition::Right.target_in(usable),
            Rect::new(720.0, 25.0, 720.0, 800.0)
        );
    }
}
