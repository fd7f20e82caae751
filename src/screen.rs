//! Screen geometry: keep restored windows reachable on the displays that
//! are connected *now*, which may differ from those present at capture.

use crate::config::ScreenConfig;
use crate::model::{Rect, ScreenConfiguration};

/// Return a frame for `frame` that is usably visible on `screens`.
///
/// A frame is kept as-is when its origin lies on some screen with at least
/// `visible_margin` pixels to spare towards that screen's right and bottom
/// edges.  Otherwise it is moved to the main screen's usable top-left
/// (plus `relocate_inset`) and shrunk, never grown, to fit that usable area
/// minus `relocate_margin`.
///
/// With no screens known the frame is returned unchanged.
pub fn adjust_to_screens(frame: Rect, screens: &ScreenConfiguration, config: &ScreenConfig) -> Rect {
    let margin = config.visible_margin;
    let on_some_screen = screens.screens.iter().any(|s| {
        let f = s.frame;
        frame.x >= f.x
            && frame.x <= f.max_x() - margin
            && frame.y >= f.y
            && frame.y <= f.max_y() - margin
    });
    if on_some_screen {
        return frame;
    }

    let Some(target) = screens.main().map(|s| s.visible) else {
        return frame;
    };
    let max_w = (target.width - config.relocate_margin).max(0.0);
    let max_h = (target.height - config.relocate_margin).max(0.0);
    Rect::new(
        target.x + config.relocate_inset,
        target.y + config.relocate_inset,
        frame.width.min(max_w),
        frame.height.min(max_h),
    )
}

/// Whether `frame` exactly covers one of the screens (within `tolerance`),
/// which is how a full-screen window looks when the platform does not
/// report the state directly.
pub fn is_full_screen_frame(frame: Rect, screens: &ScreenConfiguration, tolerance: f64) -> bool {
    screens.screens.iter().any(|s| {
        let f = s.frame;
        (frame.x - f.x).abs() <= tolerance
            && (frame.y - f.y).abs() <= tolerance
            && (frame.width - f.width).abs() <= tolerance
            && (frame.height - f.height).abs() <= tolerance
    })
}
