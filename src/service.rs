//! Binds the preset store, the restorer and a [`Desktop`] together and
//! executes [`Command`]s against them.
//!
//! [`PresetService`] is generic over any [`Desktop`] implementation, so the
//! daemon runs it against Hyprland and the tests run it against an
//! in-memory fake.

use crate::capture::{capture_main_window, capture_selection};
use crate::command::{Command, PresetSelector};
use crate::config::Config;
use crate::launch_item::LaunchItem;
use crate::model::{AppHandle, Preset, RunningApplication};
use crate::restore::{ApplySummary, Restorer};
use crate::store::PresetStore;
use crate::traits::{Desktop, Event};
use log::{debug, info, warn};
use std::fmt;
use std::rc::Rc;
use std::sync::mpsc;
use uuid::Uuid;

/// Possible errors from handling a command.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("no preset matches {0}")]
    UnknownPreset(PresetSelector),

    #[error("application {0} is not running")]
    AppNotRunning(String),
}

/// What the caller still has to do after [`PresetService::handle`].
#[derive(Debug)]
pub enum Outcome<D: Desktop> {
    /// The command completed.
    Done,
    /// An apply is ready to run.  The caller decides where it is driven
    /// (the daemon spawns it on its local task set).
    Apply(ApplyTask<D>),
}

/// A preset snapshot bound to the restorer that will apply it.
pub struct ApplyTask<D: Desktop> {
    restorer: Rc<Restorer<D>>,
    preset: Preset,
}

impl<D: Desktop> ApplyTask<D> {
    pub fn preset(&self) -> &Preset {
        &self.preset
    }

    pub async fn run(self) -> ApplySummary {
        self.restorer.apply(&self.preset).await
    }
}

impl<D: Desktop> fmt::Debug for ApplyTask<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApplyTask")
            .field("preset", &self.preset.name)
            .finish()
    }
}

/// Executes commands against the preset store and the desktop.
pub struct PresetService<D: Desktop> {
    desktop: Rc<D>,
    store: PresetStore,
    restorer: Rc<Restorer<D>>,
    config: Config,
    running: Vec<RunningApplication>,
    events: Option<mpsc::Sender<Event>>,
}

impl<D: Desktop> PresetService<D> {
    pub fn new(desktop: Rc<D>, store: PresetStore, config: Config) -> Self {
        let restorer = Rc::new(Restorer::new(Rc::clone(&desktop), &config));
        Self {
            desktop,
            store,
            restorer,
            config,
            running: Vec::new(),
            events: None,
        }
    }

    /// Attach an event channel shared by the service, its store and its
    /// restorer.
    ///
    /// Call this before handling commands: the restorer is rebuilt, so
    /// applies already in flight keep reporting to the previous listener.
    pub fn set_listener(&mut self, tx: mpsc::Sender<Event>) {
        self.store.set_listener(tx.clone());
        let mut restorer = Restorer::new(Rc::clone(&self.desktop), &self.config);
        restorer.set_listener(tx.clone());
        self.restorer = Rc::new(restorer);
        self.events = Some(tx);
    }

    pub fn presets(&self) -> &[Preset] {
        self.store.presets()
    }

    pub fn running_apps(&self) -> &[RunningApplication] {
        &self.running
    }

    /// Rebuild the running-application list from scratch.  Selection flags
    /// do not survive a refresh.
    pub fn refresh_running_apps(&mut self) -> &[RunningApplication] {
        self.running = match self.desktop.running_apps() {
            Ok(mut apps) => {
                apps.sort_by_key(|a| a.name.to_lowercase());
                apps
            }
            Err(e) => {
                warn!("failed to list running applications: {}", e);
                Vec::new()
            }
        };
        debug!("{} running application(s)", self.running.len());
        if let Some(tx) = &self.events {
            let _ = tx.send(Event::RunningAppsRefreshed {
                count: self.running.len(),
            });
        }
        &self.running
    }

    /// Resolve `selector` to a preset identifier.
    pub fn resolve(&self, selector: &PresetSelector) -> Result<Uuid, ServiceError> {
        let presets = self.store.presets();
        let found = match selector {
            PresetSelector::Index(i) => presets.get(*i),
            PresetSelector::Id(id) => presets.iter().find(|p| p.id() == *id),
            PresetSelector::Name(name) => presets.iter().find(|p| &p.name == name),
        };
        found
            .map(Preset::id)
            .ok_or_else(|| ServiceError::UnknownPreset(selector.clone()))
    }

    fn running_handle(&self, bundle: &str) -> Result<AppHandle, ServiceError> {
        self.running
            .iter()
            .find(|a| a.bundle_id.as_deref() == Some(bundle))
            .and_then(RunningApplication::handle)
            .ok_or_else(|| ServiceError::AppNotRunning(bundle.to_string()))
    }

    /// Execute one command.
    pub fn handle(&mut self, cmd: Command) -> Result<Outcome<D>, ServiceError> {
        debug!("handling {:?}", cmd);
        match cmd {
            Command::Capture {
                name,
                apps,
                launch_items,
                main_only,
            } => {
                self.capture(&name, &apps, &launch_items, main_only);
            }

            Command::Apply(selector) => {
                let id = self.resolve(&selector)?;
                let Some(preset) = self.store.get(id).cloned() else {
                    return Err(ServiceError::UnknownPreset(selector));
                };
                return Ok(Outcome::Apply(ApplyTask {
                    restorer: Rc::clone(&self.restorer),
                    preset,
                }));
            }

            Command::Delete(selector) => {
                let id = self.resolve(&selector)?;
                self.store.delete(id);
                info!("deleted preset {}", selector);
            }

            Command::Rename { preset, name } => {
                let id = self.resolve(&preset)?;
                self.store.rename(id, &name);
            }

            Command::Reorder { from, to } => self.store.reorder(from, to),

            Command::AddWindow { preset, app } => {
                let id = self.resolve(&preset)?;
                self.refresh_running_apps();
                let handle = self.running_handle(&app)?;
                let added = self
                    .store
                    .add_window(id, &handle, &*self.desktop, &self.config.matching);
                info!("added {} window(s) of {} to {}", added, app, preset);
            }

            Command::RemoveWindow { preset, window } => {
                let id = self.resolve(&preset)?;
                self.store.remove_window(id, window);
            }

            Command::AddLaunchItem { preset, path } => {
                let id = self.resolve(&preset)?;
                self.store.add_launch_item(id, LaunchItem::new(&path));
            }

            Command::RemoveLaunchItem { preset, item } => {
                let id = self.resolve(&preset)?;
                self.store.remove_launch_item(id, item);
            }

            Command::RefreshPositions(selector) => {
                let id = self.resolve(&selector)?;
                self.refresh_running_apps();
                self.store
                    .refresh_positions(id, &*self.desktop, &self.running, &self.config.matching);
            }

            Command::RefreshApps => {
                self.refresh_running_apps();
            }
        }
        Ok(Outcome::Done)
    }

    fn capture(&mut self, name: &str, apps: &[String], launch_items: &[String], main_only: bool) {
        self.refresh_running_apps();
        for app in &mut self.running {
            app.is_selected = app
                .bundle_id
                .as_ref()
                .is_some_and(|b| apps.contains(b));
        }
        for wanted in apps {
            if !self.running.iter().any(|a| a.bundle_id.as_ref() == Some(wanted)) {
                warn!("{} is not running, skipping", wanted);
            }
        }

        let windows = if main_only {
            self.running
                .iter()
                .filter(|a| a.is_selected)
                .filter_map(RunningApplication::handle)
                .filter_map(|h| capture_main_window(&*self.desktop, &h, &self.config.matching))
                .collect()
        } else {
            capture_selection(&*self.desktop, &self.running, &self.config.matching)
        };
        for app in &mut self.running {
            app.is_selected = false;
        }

        let items = launch_items.iter().map(|p| LaunchItem::new(p)).collect();
        if self.store.save(name, windows, items).is_none() {
            info!("nothing captured for \"{}\", preset not saved", name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{Call, FakeDesktop};
    use crate::model::Rect;
    use crate::store::MemoryStore;

    fn service() -> (Rc<FakeDesktop>, PresetService<FakeDesktop>) {
        let desktop = Rc::new(FakeDesktop::new());
        let store = PresetStore::open(Box::new(MemoryStore::new()));
        let svc = PresetService::new(Rc::clone(&desktop), store, Config::default());
        (desktop, svc)
    }

    fn capture(name: &str, apps: &[&str]) -> Command {
        Command::Capture {
            name: name.into(),
            apps: apps.iter().map(|a| a.to_string()).collect(),
            launch_items: vec!["github.com".into()],
            main_only: false,
        }
    }

    #[test]
    fn capture_saves_only_requested_apps() {
        let (desktop, mut svc) = service();
        desktop.add_app("kitty", "kitty");
        desktop.add_app("firefox", "Firefox");
        desktop.add_window("kitty", Rect::new(0.0, 30.0, 1280.0, 1400.0));
        desktop.add_window("kitty", Rect::new(1280.0, 30.0, 1280.0, 1400.0));
        desktop.add_window("firefox", Rect::new(0.0, 30.0, 2560.0, 1400.0));

        svc.handle(capture("Dev", &["kitty"])).unwrap();

        let preset = &svc.presets()[0];
        assert_eq!(preset.name, "Dev");
        assert_eq!(preset.windows.len(), 2);
        assert!(preset.windows.iter().all(|w| w.bundle_identifier == "kitty"));
        assert_eq!(preset.launch_items[0].path(), "https://github.com");
        assert!(svc.running_apps().iter().all(|a| !a.is_selected));
    }

    #[test]
    fn capture_main_only_takes_one_window_per_app() {
        let (desktop, mut svc) = service();
        desktop.add_app("kitty", "kitty");
        desktop.add_window("kitty", Rect::new(0.0, 30.0, 400.0, 300.0));
        desktop.add_window("kitty", Rect::new(0.0, 30.0, 1280.0, 1400.0));

        svc.handle(Command::Capture {
            name: "main".into(),
            apps: vec!["kitty".into()],
            launch_items: vec![],
            main_only: true,
        })
        .unwrap();

        let windows = &svc.presets()[0].windows;
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].window_index, 1);
    }

    #[test]
    fn empty_capture_saves_nothing() {
        let (desktop, mut svc) = service();
        desktop.add_app("kitty", "kitty");
        svc.handle(capture("nothing", &["kitty", "ghost"])).unwrap();
        assert!(svc.presets().is_empty());
    }

    #[test]
    fn selectors_resolve_by_index_id_and_name() {
        let (desktop, mut svc) = service();
        desktop.add_app("kitty", "kitty");
        desktop.add_window("kitty", Rect::new(0.0, 30.0, 800.0, 600.0));
        svc.handle(capture("a", &["kitty"])).unwrap();
        svc.handle(capture("b", &["kitty"])).unwrap();
        let b = svc.presets()[1].id();

        assert_eq!(svc.resolve(&PresetSelector::Index(1)).unwrap(), b);
        assert_eq!(svc.resolve(&PresetSelector::Id(b)).unwrap(), b);
        assert_eq!(svc.resolve(&PresetSelector::Name("b".into())).unwrap(), b);
        assert!(matches!(
            svc.resolve(&PresetSelector::Index(9)),
            Err(ServiceError::UnknownPreset(PresetSelector::Index(9)))
        ));
    }

    #[test]
    fn rename_reorder_and_delete() {
        let (desktop, mut svc) = service();
        desktop.add_app("kitty", "kitty");
        desktop.add_window("kitty", Rect::new(0.0, 30.0, 800.0, 600.0));
        for name in ["a", "b", "c"] {
            svc.handle(capture(name, &["kitty"])).unwrap();
        }

        svc.handle(Command::Rename {
            preset: PresetSelector::Name("b".into()),
            name: "B".into(),
        })
        .unwrap();
        svc.handle(Command::Reorder { from: 2, to: 0 }).unwrap();
        svc.handle(Command::Delete(PresetSelector::Name("a".into())))
            .unwrap();

        let names: Vec<&str> = svc.presets().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["c", "B"]);
    }

    #[test]
    fn add_window_requires_a_running_app() {
        let (desktop, mut svc) = service();
        desktop.add_app("kitty", "kitty");
        desktop.add_window("kitty", Rect::new(0.0, 30.0, 800.0, 600.0));
        svc.handle(capture("a", &["kitty"])).unwrap();

        let err = svc
            .handle(Command::AddWindow {
                preset: PresetSelector::Index(0),
                app: "firefox".into(),
            })
            .unwrap_err();
        assert!(matches!(err, ServiceError::AppNotRunning(ref b) if b == "firefox"));

        desktop.add_app("firefox", "Firefox");
        desktop.add_window("firefox", Rect::new(900.0, 30.0, 800.0, 600.0));
        svc.handle(Command::AddWindow {
            preset: PresetSelector::Index(0),
            app: "firefox".into(),
        })
        .unwrap();
        assert_eq!(svc.presets()[0].windows.len(), 2);
    }

    #[test]
    fn launch_items_added_and_removed_through_commands() {
        let (desktop, mut svc) = service();
        desktop.add_app("kitty", "kitty");
        desktop.add_window("kitty", Rect::new(0.0, 30.0, 800.0, 600.0));
        svc.handle(capture("a", &["kitty"])).unwrap();

        svc.handle(Command::AddLaunchItem {
            preset: PresetSelector::Index(0),
            path: "docs.rust-lang.org".into(),
        })
        .unwrap();
        let items = &svc.presets()[0].launch_items;
        assert_eq!(items[1].path(), "https://docs.rust-lang.org");

        let item = items[0].id();
        svc.handle(Command::RemoveLaunchItem {
            preset: PresetSelector::Index(0),
            item,
        })
        .unwrap();
        assert_eq!(svc.presets()[0].launch_items.len(), 1);
    }

    #[test]
    fn refresh_apps_reports_count() {
        let (desktop, mut svc) = service();
        let (tx, rx) = mpsc::channel();
        svc.set_listener(tx);
        desktop.add_app("b", "Beta");
        desktop.add_app("a", "alpha");

        svc.handle(Command::RefreshApps).unwrap();

        assert_eq!(rx.try_recv().unwrap(), Event::RunningAppsRefreshed { count: 2 });
        let names: Vec<&str> = svc.running_apps().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "Beta"]);
    }

    #[test]
    fn refresh_positions_picks_up_moved_windows() {
        let (desktop, mut svc) = service();
        desktop.add_app("kitty", "kitty");
        let w = desktop.add_window("kitty", Rect::new(0.0, 30.0, 800.0, 600.0));
        svc.handle(capture("a", &["kitty"])).unwrap();

        desktop.windows.borrow_mut()[0].frame = Rect::new(700.0, 200.0, 900.0, 650.0);
        svc.handle(Command::RefreshPositions(PresetSelector::Index(0)))
            .unwrap();

        assert_eq!(svc.presets()[0].windows[0].frame, desktop.frame_of(w));
    }

    #[tokio::test(start_paused = true)]
    async fn apply_returns_a_task_that_restores() {
        let (desktop, mut svc) = service();
        let (tx, rx) = mpsc::channel();
        svc.set_listener(tx);
        desktop.add_app("kitty", "kitty");
        let w = desktop.add_window("kitty", Rect::new(0.0, 30.0, 800.0, 600.0));
        svc.handle(Command::Capture {
            name: "Dev".into(),
            apps: vec!["kitty".into()],
            launch_items: vec![],
            main_only: false,
        })
        .unwrap();
        desktop.windows.borrow_mut()[0].frame = Rect::new(900.0, 500.0, 300.0, 300.0);

        let Outcome::Apply(task) = svc.handle(Command::Apply(PresetSelector::Name("Dev".into()))).unwrap() else {
            panic!("expected an apply task");
        };
        assert_eq!(task.preset().name, "Dev");
        let summary = task.run().await;

        assert_eq!(summary.positioned, 1);
        assert_eq!(desktop.frame_of(w), Rect::new(0.0, 30.0, 800.0, 600.0));
        assert!(desktop.calls().contains(&Call::Activate("kitty".into())));
        assert!(rx
            .try_iter()
            .any(|e| matches!(e, Event::PresetApplied { ref preset, .. } if preset == "Dev")));
    }

    #[test]
    fn unknown_preset_is_an_error() {
        let (_desktop, mut svc) = service();
        let err = svc
            .handle(Command::Apply(PresetSelector::Name("nope".into())))
            .unwrap_err();
        assert_eq!(err.to_string(), "no preset matches \"nope\"");
    }
}
