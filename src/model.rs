//! Data types shared by capture, matching, restore and the preset store.
//!
//! All geometry lives in one *unified* coordinate space: top-left origin,
//! spanning every connected display.  A [`WindowDescriptor`] captured on a
//! secondary monitor simply carries coordinates beyond the primary
//! monitor's bounds.

use crate::launch_item::LaunchItem;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A point in the unified coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// An axis-aligned rectangle in the unified coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rectangle from a separately-read origin and size.
    pub fn from_parts(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.width, size.height)
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Whether both dimensions reach `min` pixels.
    ///
    /// Windows failing this test are toolbars, palettes or other chrome and
    /// are never captured or matched.
    pub fn is_at_least(&self, min: f64) -> bool {
        self.width >= min && self.height >= min
    }

    /// Smallest rectangle containing both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.max_x().max(other.max_x()) - x,
            self.max_y().max(other.max_y()) - y,
        )
    }
}

/// One captured window: its owning application and its geometry.
///
/// The serialized form is flat (`x`, `y`, `width`, `height` sit next to the
/// identity fields) and `windowIndex` is optional so records written before
/// multi-window capture existed still decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowDescriptor {
    id: Uuid,
    pub bundle_identifier: String,
    pub app_name: String,
    #[serde(flatten)]
    pub frame: Rect,
    /// Position within the application's window list at capture time.
    /// Only a hint for matching; `0` for legacy records.
    #[serde(default)]
    pub window_index: usize,
}

impl WindowDescriptor {
    pub fn new(
        bundle_identifier: impl Into<String>,
        app_name: impl Into<String>,
        frame: Rect,
        window_index: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            bundle_identifier: bundle_identifier.into(),
            app_name: app_name.into(),
            frame,
            window_index,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

/// A named, ordered snapshot of windows plus the items to open with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    id: Uuid,
    pub name: String,
    #[serde(default)]
    pub windows: Vec<WindowDescriptor>,
    #[serde(default)]
    pub launch_items: Vec<LaunchItem>,
}

impl Preset {
    pub fn new(
        name: impl Into<String>,
        windows: Vec<WindowDescriptor>,
        launch_items: Vec<LaunchItem>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            windows,
            launch_items,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Distinct bundle identifiers in the order they first appear.
    pub fn bundle_identifiers(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        for w in &self.windows {
            if !seen.contains(&w.bundle_identifier.as_str()) {
                seen.push(&w.bundle_identifier);
            }
        }
        seen
    }
}

/// A live process as reported by the process-control capability.
///
/// Rebuilt from scratch on every refresh and never persisted;
/// `is_selected` only lives as long as one capture selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningApplication {
    pub pid: u32,
    pub name: String,
    pub bundle_id: Option<String>,
    /// Icon name or path, when the platform provides one.
    pub icon: Option<String>,
    pub is_selected: bool,
}

impl RunningApplication {
    /// Handle used to address this application through the capability
    /// traits.  Applications without a bundle identifier cannot be
    /// captured (there is nothing stable to restore them by).
    pub fn handle(&self) -> Option<AppHandle> {
        self.bundle_id.as_ref().map(|bundle_id| AppHandle {
            bundle_id: bundle_id.clone(),
            name: self.name.clone(),
            pid: Some(self.pid),
        })
    }
}

/// Identifies an application towards the platform backends.
///
/// `pid` is `None` right after a launch on platforms that cannot report
/// the spawned process; backends then resolve by `bundle_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppHandle {
    pub bundle_id: String,
    pub name: String,
    pub pid: Option<u32>,
}

impl AppHandle {
    pub fn new(bundle_id: impl Into<String>, name: impl Into<String>, pid: Option<u32>) -> Self {
        Self {
            bundle_id: bundle_id.into(),
            name: name.into(),
            pid,
        }
    }
}

/// One connected display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Screen {
    /// Full bounds of the display.
    pub frame: Rect,
    /// Area not covered by bars, docks or other reserved regions.
    pub visible: Rect,
    pub is_main: bool,
}

/// The set of displays connected right now.
///
/// Recomputed on demand; never cached across display changes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreenConfiguration {
    pub screens: Vec<Screen>,
}

impl ScreenConfiguration {
    pub fn new(screens: Vec<Screen>) -> Self {
        Self { screens }
    }

    /// The designated main display, or the first one if none is flagged.
    pub fn main(&self) -> Option<&Screen> {
        self.screens
            .iter()
            .find(|s| s.is_main)
            .or_else(|| self.screens.first())
    }

    /// Bounding box of all displays.
    pub fn bounds(&self) -> Option<Rect> {
        let mut iter = self.screens.iter().map(|s| s.frame);
        let first = iter.next()?;
        Some(iter.fold(first, |acc, r| acc.union(&r)))
    }

    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }
}

/// A window observed in a single enumeration pass.
///
/// `index` is the window's position in the raw enumeration (before any
/// size filtering), which is what [`WindowDescriptor::window_index`] is
/// compared against.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveWindow<W> {
    pub handle: W,
    pub index: usize,
    pub frame: Rect,
    pub is_main: bool,
}
