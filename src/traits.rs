//! Core traits that decouple hyprpreset from any specific desktop
//! environment or transport mechanism.
//!
//! Every concrete backend (Hyprland, a Unix-socket listener, a test
//! harness, …) implements one of these traits.  Capture, matching, restore
//! and the preset store only depend on these abstractions.
//!
//! Every capability method is fallible.  Callers in this crate never
//! propagate those errors: a failed read is treated as "no value" and a
//! failed write as "did not happen", after being logged.

use crate::command::Command;
use crate::model::{AppHandle, Point, RunningApplication, Screen, Size};
use std::fmt;
use std::path::Path;
use tokio::sync::mpsc::UnboundedSender;

/// Window enumeration, inspection and mutation, plus display enumeration.
///
/// `Window` is an opaque handle.  Handles are only guaranteed to stay valid
/// for as long as the underlying window exists.
pub trait WindowManager {
    /// The error type produced by this backend.
    type Error: std::error::Error + Send + 'static;

    /// Opaque window handle.
    type Window: Clone + fmt::Debug;

    /// List the windows of `app`, in the platform's enumeration order.
    ///
    /// An application that is not running or exposes no windows yields an
    /// empty list rather than an error.
    fn windows(&self, app: &AppHandle) -> Result<Vec<Self::Window>, Self::Error>;

    fn position(&self, window: &Self::Window) -> Result<Point, Self::Error>;

    fn size(&self, window: &Self::Window) -> Result<Size, Self::Error>;

    fn set_position(&self, window: &Self::Window, position: Point) -> Result<(), Self::Error>;

    fn set_size(&self, window: &Self::Window, size: Size) -> Result<(), Self::Error>;

    fn is_minimized(&self, window: &Self::Window) -> Result<bool, Self::Error>;

    fn set_minimized(&self, window: &Self::Window, minimized: bool) -> Result<(), Self::Error>;

    /// Whether the platform designates `window` as its application's main
    /// window.
    fn is_main(&self, window: &Self::Window) -> Result<bool, Self::Error>;

    /// Whether `window` is in the platform's dedicated full-screen mode.
    fn is_full_screen(&self, window: &Self::Window) -> Result<bool, Self::Error>;

    /// Connected displays in the unified coordinate space.
    fn screens(&self) -> Result<Vec<Screen>, Self::Error>;
}

/// Structured requests that some platforms can only satisfy by synthesizing
/// keyboard accelerators.
///
/// Kept apart from [`WindowManager`] so a backend with a real API for these
/// can substitute it without touching the read/write primitives.
pub trait WindowRequests: WindowManager {
    /// Ask `app` (already activated) to open one more window.
    fn request_new_window(&self, app: &AppHandle) -> Result<(), Self::Error>;

    /// Ask `window` of `app` to leave full-screen mode.
    fn request_exit_full_screen(
        &self,
        app: &AppHandle,
        window: &Self::Window,
    ) -> Result<(), Self::Error>;
}

/// Process discovery, launch and activation.
pub trait ProcessControl {
    /// The error type produced by this backend.
    type Error: std::error::Error + Send + 'static;

    fn running_apps(&self) -> Result<Vec<RunningApplication>, Self::Error>;

    /// Launch the application identified by `bundle_id`.
    ///
    /// Returns the new process id when the platform can report it.
    fn launch(&self, bundle_id: &str, activate: bool) -> Result<Option<u32>, Self::Error>;

    fn activate(&self, app: &AppHandle) -> Result<(), Self::Error>;

    fn unhide(&self, app: &AppHandle) -> Result<(), Self::Error>;

    /// Best-effort "reopen" request, the last resort when an application
    /// is running but shows no windows.
    fn reopen(&self, app: &AppHandle) -> Result<(), Self::Error>;
}

/// Opening URLs and files with the user's default handlers.
pub trait Shell {
    /// The error type produced by this backend.
    type Error: std::error::Error + Send + 'static;

    fn open_url(&self, url: &str) -> Result<(), Self::Error>;

    fn open_file(&self, path: &Path) -> Result<(), Self::Error>;

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

/// Everything the restore orchestrator needs from a platform.
pub trait Desktop: WindowRequests + ProcessControl + Shell {}

impl<T: WindowRequests + ProcessControl + Shell> Desktop for T {}

//  Events

/// Change notifications emitted by the preset store and the restorer.
///
/// Emitters hold an `Option<mpsc::Sender<Event>>`.  Any listener (a UI,
/// the daemon's log consumer, a test) can receive these without being
/// owned by the emitter.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The preset list changed and was persisted.
    PresetsChanged { count: usize },

    /// A launch or open step failed.  The surrounding operation continued.
    Warning { title: String, message: String },

    /// A preset apply finished.  Emitted exactly once per apply, no matter
    /// how many individual placements silently failed.
    PresetApplied {
        preset: String,
        windows: usize,
        launch_items: usize,
        positioned: usize,
    },

    /// The running-application list was rebuilt.
    RunningAppsRefreshed { count: usize },
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::PresetsChanged { count } => write!(f, "presets changed ({} total)", count),
            Event::Warning { title, message } => write!(f, "{}: {}", title, message),
            Event::PresetApplied {
                preset,
                windows,
                launch_items,
                positioned,
            } => write!(
                f,
                "applied \"{}\": {} window{}, {} item{} ({} positioned)",
                preset,
                windows,
                if *windows == 1 { "" } else { "s" },
                launch_items,
                if *launch_items == 1 { "" } else { "s" },
                positioned
            ),
            Event::RunningAppsRefreshed { count } => {
                write!(f, "{} running application(s)", count)
            }
        }
    }
}

//  Command Source

/// A source of [`Command`]s.
///
/// Implementations listen on some transport (a Unix socket, a test
/// harness, …) and forward parsed commands into the provided sink.
///
/// # Contract
///
/// * [`run`](CommandSource::run) **blocks** until the source is exhausted or
///   an unrecoverable error occurs.
/// * Each received command must be sent through `sink` exactly once.
/// * Implementations must be [`Send`] so they can run on a dedicated thread.
pub trait CommandSource: Send {
    /// The error type produced by this source.
    type Error: std::error::Error + Send + 'static;

    /// Start listening and forward every incoming [`Command`] into `sink`.
    ///
    /// This method blocks the calling thread.
    fn run(&mut self, sink: UnboundedSender<Command>) -> Result<(), Self::Error>;
}
