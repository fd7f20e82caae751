//! Scriptable in-memory desktop used by the unit tests.
//!
//! Records every mutating call in order so tests can assert on the exact
//! sequence the restorer drove.

use crate::model::{AppHandle, Point, Rect, RunningApplication, Screen, Size};
use crate::traits::{ProcessControl, Shell, WindowManager, WindowRequests};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Every mutating call made against the fake, in order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Launch(String),
    Activate(String),
    Unhide(String),
    Reopen(String),
    NewWindow(String),
    ExitFullScreen(u64),
    SetMinimized(u64, bool),
    SetPosition(u64, Point),
    SetSize(u64, Size),
    OpenUrl(String),
    OpenFile(PathBuf),
}

#[derive(Debug, Clone)]
pub(crate) struct FakeWindow {
    pub id: u64,
    pub bundle: String,
    pub frame: Rect,
    pub minimized: bool,
    pub main: bool,
    pub full_screen: bool,
}

#[derive(Debug, Clone)]
struct FakeApp {
    pid: u32,
    bundle: String,
    name: String,
}

#[derive(Debug, thiserror::Error)]
#[error("fake desktop: {0}")]
pub(crate) struct FakeError(pub String);

#[derive(Debug)]
pub(crate) struct FakeDesktop {
    apps: RefCell<Vec<FakeApp>>,
    pub windows: RefCell<Vec<FakeWindow>>,
    pub screens: RefCell<Vec<Screen>>,
    pub calls: RefCell<Vec<Call>>,
    /// Windows a bundle opens when launched (absent = not installed).
    installed: RefCell<HashMap<String, Vec<Rect>>>,
    /// Bundles that honour new-window requests.
    new_window_support: RefCell<HashSet<String>>,
    /// Bundles that open a window on the Nth reopen-style request.
    wake_on_reopen: RefCell<HashMap<String, Rect>>,
    unreadable: RefCell<HashSet<u64>>,
    pub existing_paths: RefCell<HashSet<PathBuf>>,
    pub failing_urls: RefCell<HashSet<String>>,
    next_id: Cell<u64>,
}

impl FakeDesktop {
    pub fn new() -> Self {
        Self {
            apps: RefCell::new(Vec::new()),
            windows: RefCell::new(Vec::new()),
            screens: RefCell::new(vec![Screen {
                frame: Rect::new(0.0, 0.0, 2560.0, 1440.0),
                visible: Rect::new(0.0, 30.0, 2560.0, 1410.0),
                is_main: true,
            }]),
            calls: RefCell::new(Vec::new()),
            installed: RefCell::new(HashMap::new()),
            new_window_support: RefCell::new(HashSet::new()),
            wake_on_reopen: RefCell::new(HashMap::new()),
            unreadable: RefCell::new(HashSet::new()),
            existing_paths: RefCell::new(HashSet::new()),
            failing_urls: RefCell::new(HashSet::new()),
            next_id: Cell::new(1),
        }
    }

    fn next(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// Start an application with no windows.
    pub fn add_app(&self, bundle: &str, name: &str) -> AppHandle {
        let pid = 1000 + self.next() as u32;
        self.apps.borrow_mut().push(FakeApp {
            pid,
            bundle: bundle.into(),
            name: name.into(),
        });
        AppHandle::new(bundle, name, Some(pid))
    }

    pub fn add_window(&self, bundle: &str, frame: Rect) -> u64 {
        let id = self.next();
        self.windows.borrow_mut().push(FakeWindow {
            id,
            bundle: bundle.into(),
            frame,
            minimized: false,
            main: false,
            full_screen: false,
        });
        id
    }

    /// Make `bundle` launchable; launching it opens `windows`.
    pub fn install(&self, bundle: &str, windows: Vec<Rect>) {
        self.installed.borrow_mut().insert(bundle.into(), windows);
    }

    pub fn support_new_window(&self, bundle: &str) {
        self.new_window_support.borrow_mut().insert(bundle.into());
    }

    /// `bundle` opens a window in response to the platform reopen request.
    pub fn wake_on_reopen(&self, bundle: &str, frame: Rect) {
        self.wake_on_reopen.borrow_mut().insert(bundle.into(), frame);
    }

    pub fn set_main(&self, id: u64) {
        let _ = self.with_window(id, |w| w.main = true);
    }

    pub fn set_minimized_state(&self, id: u64) {
        let _ = self.with_window(id, |w| w.minimized = true);
    }

    pub fn set_full_screen(&self, id: u64) {
        let _ = self.with_window(id, |w| w.full_screen = true);
    }

    pub fn fail_reads_for(&self, id: u64) {
        self.unreadable.borrow_mut().insert(id);
    }

    pub fn frame_of(&self, id: u64) -> Rect {
        self.windows
            .borrow()
            .iter()
            .find(|w| w.id == id)
            .map(|w| w.frame)
            .unwrap_or_default()
    }

    pub fn window(&self, id: u64) -> FakeWindow {
        self.windows
            .borrow()
            .iter()
            .find(|w| w.id == id)
            .cloned()
            .unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn with_window<T>(&self, id: u64, f: impl FnOnce(&mut FakeWindow) -> T) -> Result<T, FakeError> {
        self.windows
            .borrow_mut()
            .iter_mut()
            .find(|w| w.id == id)
            .map(f)
            .ok_or_else(|| FakeError(format!("no window {}", id)))
    }

    fn is_running(&self, bundle: &str) -> bool {
        self.apps.borrow().iter().any(|a| a.bundle == bundle)
    }
}

impl WindowManager for FakeDesktop {
    type Error = FakeError;
    type Window = u64;

    fn windows(&self, app: &AppHandle) -> Result<Vec<u64>, FakeError> {
        if !self.is_running(&app.bundle_id) {
            return Err(FakeError(format!("{} not running", app.bundle_id)));
        }
        Ok(self
            .windows
            .borrow()
            .iter()
            .filter(|w| w.bundle == app.bundle_id)
            .map(|w| w.id)
            .collect())
    }

    fn position(&self, window: &u64) -> Result<Point, FakeError> {
        if self.unreadable.borrow().contains(window) {
            return Err(FakeError("unreadable".into()));
        }
        self.with_window(*window, |w| w.frame.origin())
    }

    fn size(&self, window: &u64) -> Result<Size, FakeError> {
        if self.unreadable.borrow().contains(window) {
            return Err(FakeError("unreadable".into()));
        }
        self.with_window(*window, |w| w.frame.size())
    }

    fn set_position(&self, window: &u64, position: Point) -> Result<(), FakeError> {
        self.record(Call::SetPosition(*window, position));
        self.with_window(*window, |w| {
            w.frame.x = position.x;
            w.frame.y = position.y;
        })
    }

    fn set_size(&self, window: &u64, size: Size) -> Result<(), FakeError> {
        self.record(Call::SetSize(*window, size));
        self.with_window(*window, |w| {
            w.frame.width = size.width;
            w.frame.height = size.height;
        })
    }

    fn is_minimized(&self, window: &u64) -> Result<bool, FakeError> {
        self.with_window(*window, |w| w.minimized)
    }

    fn set_minimized(&self, window: &u64, minimized: bool) -> Result<(), FakeError> {
        self.record(Call::SetMinimized(*window, minimized));
        self.with_window(*window, |w| w.minimized = minimized)
    }

    fn is_main(&self, window: &u64) -> Result<bool, FakeError> {
        self.with_window(*window, |w| w.main)
    }

    fn is_full_screen(&self, window: &u64) -> Result<bool, FakeError> {
        self.with_window(*window, |w| w.full_screen)
    }

    fn screens(&self) -> Result<Vec<Screen>, FakeError> {
        Ok(self.screens.borrow().clone())
    }
}

impl WindowRequests for FakeDesktop {
    fn request_new_window(&self, app: &AppHandle) -> Result<(), FakeError> {
        self.record(Call::NewWindow(app.bundle_id.clone()));
        if !self.new_window_support.borrow().contains(&app.bundle_id) {
            return Err(FakeError("new window unsupported".into()));
        }
        let n = self
            .windows
            .borrow()
            .iter()
            .filter(|w| w.bundle == app.bundle_id)
            .count() as f64;
        self.add_window(&app.bundle_id, Rect::new(40.0 * n, 40.0 * n, 800.0, 600.0));
        Ok(())
    }

    fn request_exit_full_screen(&self, _app: &AppHandle, window: &u64) -> Result<(), FakeError> {
        self.record(Call::ExitFullScreen(*window));
        self.with_window(*window, |w| {
            w.full_screen = false;
            w.frame = Rect::new(100.0, 100.0, 1200.0, 800.0);
        })
    }
}

impl ProcessControl for FakeDesktop {
    type Error = FakeError;

    fn running_apps(&self) -> Result<Vec<RunningApplication>, FakeError> {
        Ok(self
            .apps
            .borrow()
            .iter()
            .map(|a| RunningApplication {
                pid: a.pid,
                name: a.name.clone(),
                bundle_id: Some(a.bundle.clone()),
                icon: None,
                is_selected: false,
            })
            .collect())
    }

    fn launch(&self, bundle_id: &str, _activate: bool) -> Result<Option<u32>, FakeError> {
        self.record(Call::Launch(bundle_id.into()));
        let frames = self
            .installed
            .borrow()
            .get(bundle_id)
            .cloned()
            .ok_or_else(|| FakeError(format!("{} not installed", bundle_id)))?;
        if self.is_running(bundle_id) {
            return Ok(None);
        }
        let handle = self.add_app(bundle_id, bundle_id);
        for f in frames {
            self.add_window(bundle_id, f);
        }
        Ok(handle.pid)
    }

    fn activate(&self, app: &AppHandle) -> Result<(), FakeError> {
        self.record(Call::Activate(app.bundle_id.clone()));
        Ok(())
    }

    fn unhide(&self, app: &AppHandle) -> Result<(), FakeError> {
        self.record(Call::Unhide(app.bundle_id.clone()));
        Ok(())
    }

    fn reopen(&self, app: &AppHandle) -> Result<(), FakeError> {
        self.record(Call::Reopen(app.bundle_id.clone()));
        if let Some(frame) = self.wake_on_reopen.borrow_mut().remove(&app.bundle_id) {
            self.add_window(&app.bundle_id, frame);
        }
        Ok(())
    }
}

impl Shell for FakeDesktop {
    type Error = FakeError;

    fn open_url(&self, url: &str) -> Result<(), FakeError> {
        self.record(Call::OpenUrl(url.into()));
        if self.failing_urls.borrow().contains(url) {
            return Err(FakeError(format!("cannot open {}", url)));
        }
        Ok(())
    }

    fn open_file(&self, path: &Path) -> Result<(), FakeError> {
        self.record(Call::OpenFile(path.to_path_buf()));
        Ok(())
    }

    fn path_exists(&self, path: &Path) -> bool {
        self.existing_paths.borrow().contains(path)
    }
}
