//! Window capture: turn an application's live windows into
//! [`WindowDescriptor`]s.
//!
//! Capture is read-only and never fails.  Anything the platform cannot
//! report (no application element, no windows, an unreadable frame) simply
//! yields fewer descriptors.

use crate::config::MatchConfig;
use crate::model::{AppHandle, LiveWindow, Rect, RunningApplication, WindowDescriptor};
use crate::traits::WindowManager;
use log::debug;

/// Enumerate every window of `app` together with its current frame.
///
/// Nothing is filtered here: `index` is the raw enumeration position so it
/// lines up with what capture stored in `window_index`.  A frame that
/// cannot be read becomes a zero rectangle and is therefore excluded by
/// any size threshold downstream.
pub fn live_windows<W: WindowManager + ?Sized>(
    wm: &W,
    app: &AppHandle,
) -> Vec<LiveWindow<W::Window>> {
    let handles = match wm.windows(app) {
        Ok(h) => h,
        Err(e) => {
            debug!("no windows for {}: {}", app.bundle_id, e);
            return Vec::new();
        }
    };

    handles
        .into_iter()
        .enumerate()
        .map(|(index, handle)| {
            let frame = match (wm.position(&handle), wm.size(&handle)) {
                (Ok(origin), Ok(size)) => Rect::from_parts(origin, size),
                (origin, size) => {
                    debug!(
                        "{} window {} frame unreadable (position ok: {}, size ok: {})",
                        app.bundle_id,
                        index,
                        origin.is_ok(),
                        size.is_ok()
                    );
                    Rect::default()
                }
            };
            let is_main = wm.is_main(&handle).unwrap_or(false);
            LiveWindow {
                handle,
                index,
                frame,
                is_main,
            }
        })
        .collect()
}

/// Number of windows large enough to count as user content.
pub fn real_window_count<W>(windows: &[LiveWindow<W>], config: &MatchConfig) -> usize {
    windows
        .iter()
        .filter(|w| w.frame.is_at_least(config.min_window_size))
        .count()
}

/// Capture every non-trivial window of `app`.
pub fn capture_app<W: WindowManager + ?Sized>(
    wm: &W,
    app: &AppHandle,
    config: &MatchConfig,
) -> Vec<WindowDescriptor> {
    let descriptors: Vec<WindowDescriptor> = live_windows(wm, app)
        .into_iter()
        .filter(|w| w.frame.is_at_least(config.min_window_size))
        .map(|w| WindowDescriptor::new(&app.bundle_id, &app.name, w.frame, w.index))
        .collect();
    debug!("captured {} window(s) of {}", descriptors.len(), app.bundle_id);
    descriptors
}

/// Capture all windows of every selected application, in selection order.
///
/// Applications without a bundle identifier are skipped.
pub fn capture_selection<W: WindowManager + ?Sized>(
    wm: &W,
    apps: &[RunningApplication],
    config: &MatchConfig,
) -> Vec<WindowDescriptor> {
    apps.iter()
        .filter(|a| a.is_selected)
        .filter_map(RunningApplication::handle)
        .flat_map(|handle| capture_app(wm, &handle, config))
        .collect()
}

/// Capture only the main window of `app`.
///
/// Prefers the window the platform flags as main; otherwise the
/// largest-area window taller than the size threshold.
pub fn capture_main_window<W: WindowManager + ?Sized>(
    wm: &W,
    app: &AppHandle,
    config: &MatchConfig,
) -> Option<WindowDescriptor> {
    let windows = live_windows(wm, app);
    let chosen = windows.iter().find(|w| w.is_main).or_else(|| {
        windows
            .iter()
            .filter(|w| w.frame.height > config.min_window_size)
            .max_by(|a, b| {
                a.frame
                    .area()
                    .partial_cmp(&b.frame.area())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    })?;
    Some(WindowDescriptor::new(
        &app.bundle_id,
        &app.name,
        chosen.frame,
        chosen.index,
    ))
}
