//! The restore orchestrator: make live windows match a [`Preset`].
//!
//! Each application in a preset runs its own chain:
//!
//! ```text
//! not running → launch → wait for a window ─┐
//! running     → activate → settle ──────────┤
//!                                           ▼
//!              enumerate ── empty ──► retry ladder (3 steps) ── still empty ──► give up
//!                  │
//!                  ▼
//!              ensure count (request new windows) → match → position each
//! ```
//!
//! Chains for different applications run concurrently on the current
//! thread.  Two applies that touch the same application are serialised by
//! a per-application lock; nothing is ever cancelled.
//!
//! Failures are local.  A window that cannot be read, matched or moved is
//! left alone and the rest of the preset carries on.

use crate::capture::{live_windows, real_window_count};
use crate::config::{ms, Config, MatchConfig, RestoreConfig, ScreenConfig};
use crate::launch_item::{expand_tilde, url_host, LaunchItem};
use crate::matcher::match_batch;
use crate::model::{AppHandle, LiveWindow, Preset, Rect, ScreenConfiguration, WindowDescriptor};
use crate::screen::{adjust_to_screens, is_full_screen_frame};
use crate::traits::{Desktop, Event};
use futures::future::join_all;
use log::{debug, info, warn};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::mpsc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// Counts reported once an apply finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApplySummary {
    /// Window descriptors in the preset.
    pub windows: usize,
    /// Launch items in the preset.
    pub launch_items: usize,
    /// Descriptors whose window was actually moved.
    pub positioned: usize,
}

/// Escalating recovery for an application that is running but shows no
/// windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryStep {
    /// Unhide and activate.
    Activate,
    /// Open the application again, which most apps answer with a window.
    Reopen,
    /// Ask the platform to deliver a "reopen" request.
    ScriptReopen,
}

impl RetryStep {
    const LADDER: [RetryStep; 3] = [RetryStep::Activate, RetryStep::Reopen, RetryStep::ScriptReopen];

    fn wait(self, config: &RestoreConfig) -> Duration {
        ms(match self {
            RetryStep::Activate => config.retry_activate_wait_ms,
            RetryStep::Reopen => config.retry_reopen_wait_ms,
            RetryStep::ScriptReopen => config.retry_script_wait_ms,
        })
    }
}

/// Drives presets onto a [`Desktop`].
pub struct Restorer<D: Desktop> {
    desktop: Rc<D>,
    matching: MatchConfig,
    restore: RestoreConfig,
    screen: ScreenConfig,
    // One entry per bundle ever restored; never pruned.
    app_locks: RefCell<HashMap<String, Rc<Mutex<()>>>>,
    events: Option<mpsc::Sender<Event>>,
}

impl<D: Desktop> Restorer<D> {
    pub fn new(desktop: Rc<D>, config: &Config) -> Self {
        Self {
            desktop,
            matching: config.matching.clone(),
            restore: config.restore.clone(),
            screen: config.screen.clone(),
            app_locks: RefCell::new(HashMap::new()),
            events: None,
        }
    }

    /// Attach an event channel.
    ///
    /// The restorer sends [`Event::Warning`] for every launch or open
    /// failure and exactly one [`Event::PresetApplied`] per apply.
    pub fn set_listener(&mut self, tx: mpsc::Sender<Event>) {
        self.events = Some(tx);
    }

    /// Apply `preset`: open its launch items, then restore every
    /// application it mentions.
    pub async fn apply(&self, preset: &Preset) -> ApplySummary {
        info!(
            "applying preset \"{}\" ({} windows, {} launch items)",
            preset.name,
            preset.windows.len(),
            preset.launch_items.len()
        );

        self.open_launch_items(&preset.launch_items);
        if !preset.launch_items.is_empty() {
            sleep(ms(self.restore.launch_items_delay_ms)).await;
        }

        let chains = preset.bundle_identifiers().into_iter().map(|bundle| {
            let targets: Vec<WindowDescriptor> = preset
                .windows
                .iter()
                .filter(|w| w.bundle_identifier == bundle)
                .cloned()
                .collect();
            self.restore_app(bundle, targets)
        });
        let positioned: usize = join_all(chains).await.into_iter().sum();

        let summary = ApplySummary {
            windows: preset.windows.len(),
            launch_items: preset.launch_items.len(),
            positioned,
        };
        info!(
            "preset \"{}\" applied: {}/{} windows positioned",
            preset.name, summary.positioned, summary.windows
        );
        self.emit(Event::PresetApplied {
            preset: preset.name.clone(),
            windows: summary.windows,
            launch_items: summary.launch_items,
            positioned: summary.positioned,
        });
        summary
    }

    //  Launch items

    fn open_launch_items(&self, items: &[LaunchItem]) {
        for item in items {
            let target = item.path();
            if item.is_url() {
                let needs_host = !target.to_ascii_lowercase().starts_with("file://");
                if needs_host && target.contains("://") && url_host(target).is_none() {
                    self.warn("Invalid URL", format!("{} has no host", target));
                    continue;
                }
                debug!("opening url {}", target);
                if let Err(e) = self.desktop.open_url(target) {
                    self.warn("Could not open URL", format!("{}: {}", target, e));
                }
                continue;
            }

            let path = expand_tilde(target);
            if !self.desktop.path_exists(&path) {
                self.warn("File not found", path.display().to_string());
                continue;
            }
            debug!("opening {}", path.display());
            if let Err(e) = self.desktop.open_file(&path) {
                self.warn("Could not open file", format!("{}: {}", path.display(), e));
            }
        }
    }

    //  Per-application chain

    fn lock_for(&self, bundle: &str) -> Rc<Mutex<()>> {
        self.app_locks
            .borrow_mut()
            .entry(bundle.to_string())
            .or_insert_with(|| Rc::new(Mutex::new(())))
            .clone()
    }

    /// Restore one application's windows.  Returns how many were positioned.
    async fn restore_app(&self, bundle: &str, targets: Vec<WindowDescriptor>) -> usize {
        let lock = self.lock_for(bundle);
        let _guard = lock.lock().await;

        let name = targets
            .first()
            .map(|t| t.app_name.clone())
            .unwrap_or_else(|| bundle.to_string());
        let Some((app, windows)) = self.bring_up(bundle, &name).await else {
            return 0;
        };
        let windows = self.ensure_count(&app, windows, targets.len()).await;

        let picks = match_batch(&targets, &windows, &self.matching);
        let mut positioned = 0;
        for (target, pick) in targets.iter().zip(picks) {
            match pick {
                Some(i) => {
                    if self.position_one(&app, &windows[i], target).await {
                        positioned += 1;
                    }
                }
                None => debug!(
                    "{}: no live window for descriptor {} (index {})",
                    bundle,
                    target.id(),
                    target.window_index
                ),
            }
        }
        positioned
    }

    /// Get `bundle` running, frontmost and showing at least one window.
    async fn bring_up(&self, bundle: &str, name: &str) -> Option<(AppHandle, Vec<LiveWindow<D::Window>>)> {
        let (app, mut windows) = match self.find_running(bundle) {
            Some(app) => {
                debug!("{} is running, activating", bundle);
                self.activate(&app);
                sleep(ms(self.restore.activate_wait_ms)).await;
                let windows = live_windows(&*self.desktop, &app);
                (app, windows)
            }
            None => {
                info!("launching {}", bundle);
                let pid = match self.desktop.launch(bundle, true) {
                    Ok(pid) => pid,
                    Err(e) => {
                        warn!("failed to launch {}: {}", bundle, e);
                        self.warn(&format!("Could not launch {}", name), e.to_string());
                        return None;
                    }
                };
                let app = self
                    .find_running(bundle)
                    .unwrap_or_else(|| AppHandle::new(bundle, name, pid));
                let windows = self
                    .poll_windows(&app, ms(self.restore.launch_wait_ms), |w| !w.is_empty())
                    .await;
                (app, windows)
            }
        };
        debug!("{}: {} window(s) after startup", bundle, windows.len());

        for (attempt, step) in RetryStep::LADDER.iter().enumerate() {
            if !windows.is_empty() {
                break;
            }
            debug!("{}: no windows, retry {} ({:?})", bundle, attempt, step);
            self.retry(&app, *step);
            windows = self
                .poll_windows(&app, step.wait(&self.restore), |w| !w.is_empty())
                .await;
        }

        if windows.is_empty() {
            info!("{}: still no windows after retries, giving up", bundle);
            return None;
        }
        Some((app, windows))
    }

    fn retry(&self, app: &AppHandle, step: RetryStep) {
        let result = match step {
            RetryStep::Activate => {
                if let Err(e) = self.desktop.unhide(app) {
                    debug!("unhide {} failed: {}", app.bundle_id, e);
                }
                self.desktop.activate(app)
            }
            RetryStep::Reopen => self.desktop.launch(&app.bundle_id, true).map(|_| ()),
            RetryStep::ScriptReopen => self.desktop.reopen(app),
        };
        if let Err(e) = result {
            debug!("{:?} for {} failed: {}", step, app.bundle_id, e);
        }
    }

    /// Request new windows until `needed` real windows exist, the app stops
    /// producing them, or the per-apply cap is hit.
    async fn ensure_count(
        &self,
        app: &AppHandle,
        mut windows: Vec<LiveWindow<D::Window>>,
        needed: usize,
    ) -> Vec<LiveWindow<D::Window>> {
        let mut requested = 0;
        while requested < self.restore.max_new_windows {
            let have = real_window_count(&windows, &self.matching);
            if have >= needed {
                break;
            }
            debug!("{}: {} of {} windows, requesting another", app.bundle_id, have, needed);
            requested += 1;
            if let Err(e) = self.desktop.request_new_window(app) {
                debug!("new window for {} failed: {}", app.bundle_id, e);
                break;
            }
            windows = self
                .poll_windows(app, ms(self.restore.new_window_settle_ms), |w| {
                    real_window_count(w, &self.matching) > have
                })
                .await;
            if real_window_count(&windows, &self.matching) <= have {
                debug!("{} did not open a new window", app.bundle_id);
                break;
            }
        }
        windows
    }

    /// Move one matched window into place.  Returns whether both the
    /// position and the size were written.
    async fn position_one(&self, app: &AppHandle, live: &LiveWindow<D::Window>, target: &WindowDescriptor) -> bool {
        let window = &live.handle;
        let screens = self.screens();

        let flagged = self.desktop.is_full_screen(window).unwrap_or_else(|e| {
            debug!("full-screen state of {:?} unreadable: {}", window, e);
            false
        });
        let current = self.read_frame(window).unwrap_or(live.frame);
        if flagged || is_full_screen_frame(current, &screens, self.screen.full_screen_tolerance) {
            debug!("{}: leaving full screen for {:?}", app.bundle_id, window);
            self.activate(app);
            sleep(ms(self.restore.full_screen_activate_ms)).await;
            if let Err(e) = self.desktop.request_exit_full_screen(app, window) {
                debug!("exit full screen for {:?} failed: {}", window, e);
            }
            sleep(ms(self.restore.full_screen_exit_ms)).await;
        }

        if self.desktop.is_minimized(window).unwrap_or(false) {
            debug!("{}: unminimizing {:?}", app.bundle_id, window);
            if let Err(e) = self.desktop.set_minimized(window, false) {
                debug!("unminimize {:?} failed: {}", window, e);
            }
            sleep(ms(self.restore.unminimize_ms)).await;
        }

        self.set_frame(window, target.frame)
    }

    fn set_frame(&self, window: &D::Window, frame: Rect) -> bool {
        // Screens may have changed during the waits above.
        let frame = adjust_to_screens(frame, &self.screens(), &self.screen);
        let moved = self.desktop.set_position(window, frame.origin());
        let sized = self.desktop.set_size(window, frame.size());
        if let Err(e) = &moved {
            debug!("set position of {:?} failed: {}", window, e);
        }
        if let Err(e) = &sized {
            debug!("set size of {:?} failed: {}", window, e);
        }
        debug!("{:?} -> {:?}", window, frame);
        moved.is_ok() && sized.is_ok()
    }

    //  Helpers

    /// Enumerate `app`'s windows every poll interval until `ready` holds or
    /// `timeout` elapses.  Returns the last enumeration either way.
    async fn poll_windows(
        &self,
        app: &AppHandle,
        timeout: Duration,
        ready: impl Fn(&[LiveWindow<D::Window>]) -> bool,
    ) -> Vec<LiveWindow<D::Window>> {
        let deadline = Instant::now() + timeout;
        let interval = ms(self.restore.poll_interval_ms.max(1));
        loop {
            let windows = live_windows(&*self.desktop, app);
            let now = Instant::now();
            if ready(windows.as_slice()) || now >= deadline {
                return windows;
            }
            sleep(interval.min(deadline - now)).await;
        }
    }

    fn find_running(&self, bundle: &str) -> Option<AppHandle> {
        match self.desktop.running_apps() {
            Ok(apps) => apps
                .iter()
                .find(|a| a.bundle_id.as_deref() == Some(bundle))
                .and_then(|a| a.handle()),
            Err(e) => {
                debug!("running applications unavailable: {}", e);
                None
            }
        }
    }

    fn activate(&self, app: &AppHandle) {
        if let Err(e) = self.desktop.activate(app) {
            debug!("activate {} failed: {}", app.bundle_id, e);
        }
    }

    fn read_frame(&self, window: &D::Window) -> Option<Rect> {
        let origin = self.desktop.position(window).ok()?;
        let size = self.desktop.size(window).ok()?;
        Some(Rect::from_parts(origin, size))
    }

    fn screens(&self) -> ScreenConfiguration {
        match self.desktop.screens() {
            Ok(screens) => ScreenConfiguration::new(screens),
            Err(e) => {
                debug!("screens unavailable: {}", e);
                ScreenConfiguration::default()
            }
        }
    }

    fn warn(&self, title: &str, message: String) {
        warn!("{}: {}", title, message);
        self.emit(Event::Warning {
            title: title.to_string(),
            message,
        });
    }

    fn emit(&self, event: Event) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}
