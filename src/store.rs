//! The preset store: an ordered list of [`Preset`]s persisted as one JSON
//! blob after every mutation.
//!
//! # Blob format
//!
//! ```json
//! [ { "id": "…", "name": "Dev",
//!     "windows": [ { "id": "…", "bundleIdentifier": "kitty", "appName": "kitty",
//!                    "x": 0, "y": 30, "width": 1280, "height": 1410, "windowIndex": 0 } ],
//!     "launchItems": [ { "id": "…", "path": "https://github.com" } ] } ]
//! ```
//!
//! Missing optional fields take their defaults and unknown fields are
//! ignored.  A blob that does not decode at all is treated as "no presets".

use crate::capture::capture_app;
use crate::config::MatchConfig;
use crate::launch_item::LaunchItem;
use crate::matcher::resync_descriptors;
use crate::model::{AppHandle, Preset, RunningApplication, WindowDescriptor};
use crate::traits::{Event, WindowManager};
use log::{debug, info, warn};
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::mpsc;
use uuid::Uuid;

/// Errors produced by a [`BlobStore`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Somewhere to keep the serialized preset list.
pub trait BlobStore {
    /// The stored blob, or `None` if nothing was ever saved.
    fn load(&self) -> Result<Option<String>, StoreError>;

    fn save(&self, blob: &str) -> Result<(), StoreError>;
}

/// A [`BlobStore`] backed by one JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlobStore for JsonFileStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write through a sibling temp file so a crash never leaves a
    /// half-written blob behind.
    fn save(&self, blob: &str) -> Result<(), StoreError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, blob)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// An in-memory [`BlobStore`].  Clones share the same blob.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blob: Rc<RefCell<Option<String>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_blob(blob: impl Into<String>) -> Self {
        Self {
            blob: Rc::new(RefCell::new(Some(blob.into()))),
        }
    }

    pub fn contents(&self) -> Option<String> {
        self.blob.borrow().clone()
    }
}

impl BlobStore for MemoryStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.contents())
    }

    fn save(&self, blob: &str) -> Result<(), StoreError> {
        *self.blob.borrow_mut() = Some(blob.to_string());
        Ok(())
    }
}

pub fn encode_presets(presets: &[Preset]) -> Result<String, StoreError> {
    Ok(serde_json::to_string_pretty(presets)?)
}

/// Decode a stored blob.  Anything that fails to decode yields an empty
/// list; individual records are never salvaged.
pub fn decode_presets(blob: &str) -> Vec<Preset> {
    match serde_json::from_str(blob) {
        Ok(presets) => presets,
        Err(e) => {
            warn!("stored presets could not be decoded, starting empty: {}", e);
            Vec::new()
        }
    }
}

/// The ordered preset list and its persistence.
///
/// The in-memory list is authoritative.  A failed write is logged and the
/// change is kept; the next successful write carries it.
pub struct PresetStore {
    presets: Vec<Preset>,
    backend: Box<dyn BlobStore>,
    events: Option<mpsc::Sender<Event>>,
}

impl PresetStore {
    /// Load the preset list from `backend`.
    pub fn open(backend: Box<dyn BlobStore>) -> Self {
        let presets = match backend.load() {
            Ok(Some(blob)) => decode_presets(&blob),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("failed to load presets: {}", e);
                Vec::new()
            }
        };
        info!("loaded {} preset(s)", presets.len());
        Self {
            presets,
            backend,
            events: None,
        }
    }

    /// Attach an event channel that receives [`Event::PresetsChanged`]
    /// after every mutation.
    pub fn set_listener(&mut self, tx: mpsc::Sender<Event>) {
        self.events = Some(tx);
    }

    pub fn presets(&self) -> &[Preset] {
        &self.presets
    }

    pub fn get(&self, id: Uuid) -> Option<&Preset> {
        self.presets.iter().find(|p| p.id() == id)
    }

    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.presets.iter().position(|p| p.id() == id)
    }

    fn get_mut(&mut self, id: Uuid) -> Option<&mut Preset> {
        self.presets.iter_mut().find(|p| p.id() == id)
    }

    /// Append a new preset.  An empty capture is rejected and nothing
    /// changes.
    pub fn save(
        &mut self,
        name: &str,
        windows: Vec<WindowDescriptor>,
        launch_items: Vec<LaunchItem>,
    ) -> Option<Uuid> {
        if windows.is_empty() {
            debug!("not saving \"{}\": no windows captured", name);
            return None;
        }
        let preset = Preset::new(name, windows, launch_items);
        let id = preset.id();
        info!("saved preset \"{}\" ({} windows)", name, preset.windows.len());
        self.presets.push(preset);
        self.persist();
        Some(id)
    }

    pub fn delete(&mut self, id: Uuid) {
        let before = self.presets.len();
        self.presets.retain(|p| p.id() != id);
        if self.presets.len() != before {
            self.persist();
        }
    }

    pub fn rename(&mut self, id: Uuid, name: &str) {
        if let Some(p) = self.get_mut(id) {
            p.name = name.to_string();
            self.persist();
        }
    }

    /// Move the preset at `from` so it ends up at index `to`; everything
    /// else keeps its relative order.  `to` past the end means "last".
    /// An out-of-range `from` does nothing.
    pub fn reorder(&mut self, from: usize, to: usize) {
        if from >= self.presets.len() {
            return;
        }
        let preset = self.presets.remove(from);
        let to = to.min(self.presets.len());
        self.presets.insert(to, preset);
        self.persist();
    }

    /// Capture every current window of `app` into preset `id`, skipping
    /// windows already present.  Returns how many were added.
    pub fn add_window<W: WindowManager + ?Sized>(
        &mut self,
        id: Uuid,
        app: &AppHandle,
        wm: &W,
        config: &MatchConfig,
    ) -> usize {
        let Some(preset) = self.get_mut(id) else {
            return 0;
        };
        let mut added = 0;
        for fresh in capture_app(wm, app, config) {
            let duplicate = preset
                .windows
                .iter()
                .any(|w| is_same_window(w, &fresh, config.duplicate_tolerance));
            if !duplicate {
                preset.windows.push(fresh);
                added += 1;
            }
        }
        if added > 0 {
            self.persist();
        }
        added
    }

    pub fn remove_window(&mut self, id: Uuid, window_id: Uuid) {
        let Some(preset) = self.get_mut(id) else {
            return;
        };
        let before = preset.windows.len();
        preset.windows.retain(|w| w.id() != window_id);
        if preset.windows.len() != before {
            self.persist();
        }
    }

    pub fn add_launch_item(&mut self, id: Uuid, item: LaunchItem) {
        if let Some(preset) = self.get_mut(id) {
            preset.launch_items.push(item);
            self.persist();
        }
    }

    pub fn remove_launch_item(&mut self, id: Uuid, item_id: Uuid) {
        let Some(preset) = self.get_mut(id) else {
            return;
        };
        let before = preset.launch_items.len();
        preset.launch_items.retain(|i| i.id() != item_id);
        if preset.launch_items.len() != before {
            self.persist();
        }
    }

    /// Re-read the live geometry of every application in preset `id` and
    /// fold it into the stored descriptors.
    ///
    /// Applications missing from `running` are left untouched.  Returns
    /// how many descriptors were updated.
    pub fn refresh_positions<W: WindowManager + ?Sized>(
        &mut self,
        id: Uuid,
        wm: &W,
        running: &[RunningApplication],
        config: &MatchConfig,
    ) -> usize {
        let Some(preset) = self.get_mut(id) else {
            return 0;
        };
        let bundles: Vec<String> = preset
            .bundle_identifiers()
            .into_iter()
            .map(str::to_string)
            .collect();

        let mut updated = 0;
        for bundle in bundles {
            let Some(app) = running
                .iter()
                .find(|a| a.bundle_id.as_deref() == Some(bundle.as_str()))
                .and_then(RunningApplication::handle)
            else {
                debug!("{} not running, keeping stored positions", bundle);
                continue;
            };
            let fresh = capture_app(wm, &app, config);

            let slots: Vec<usize> = preset
                .windows
                .iter()
                .enumerate()
                .filter(|(_, w)| w.bundle_identifier == bundle)
                .map(|(i, _)| i)
                .collect();
            let mut stored: Vec<WindowDescriptor> =
                slots.iter().map(|&i| preset.windows[i].clone()).collect();
            updated += resync_descriptors(&mut stored, &fresh);
            for (slot, desc) in slots.into_iter().zip(stored) {
                preset.windows[slot] = desc;
            }
        }
        info!("refreshed {} window position(s) in \"{}\"", updated, preset.name);
        self.persist();
        updated
    }

    fn persist(&self) {
        match encode_presets(&self.presets).and_then(|blob| self.backend.save(&blob)) {
            Ok(()) => debug!("persisted {} preset(s)", self.presets.len()),
            Err(e) => warn!("failed to persist presets: {}", e),
        }
        if let Some(tx) = &self.events {
            let _ = tx.send(Event::PresetsChanged {
                count: self.presets.len(),
            });
        }
    }
}

/// Same owning application and origins within `tolerance` on both axes.
fn is_same_window(a: &WindowDescriptor, b: &WindowDescriptor, tolerance: f64) -> bool {
    a.bundle_identifier == b.bundle_identifier
        && (a.frame.x - b.frame.x).abs() <= tolerance
        && (a.frame.y - b.frame.y).abs() <= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeDesktop;
    use crate::model::Rect;
    use crate::traits::ProcessControl;

    fn window(bundle: &str, x: f64, index: usize) -> WindowDescriptor {
        WindowDescriptor::new(bundle, bundle, Rect::new(x, 30.0, 800.0, 600.0), index)
    }

    fn store_with(names: &[&str]) -> (PresetStore, MemoryStore) {
        let mem = MemoryStore::new();
        let mut store = PresetStore::open(Box::new(mem.clone()));
        for name in names {
            store.save(name, vec![window("kitty", 0.0, 0)], vec![]);
        }
        (store, mem)
    }

    fn names(store: &PresetStore) -> Vec<&str> {
        store.presets().iter().map(|p| p.name.as_str()).collect()
    }

    #[test]
    fn save_rejects_empty_capture() {
        let (mut store, mem) = store_with(&["a"]);
        let before = mem.contents();
        assert_eq!(store.save("empty", vec![], vec![LaunchItem::new("github.com")]), None);
        assert_eq!(names(&store), vec!["a"]);
        assert_eq!(mem.contents(), before);
    }

    #[test]
    fn save_persists_and_notifies() {
        let mem = MemoryStore::new();
        let mut store = PresetStore::open(Box::new(mem.clone()));
        let (tx, rx) = mpsc::channel();
        store.set_listener(tx);
        let id = store.save("Dev", vec![window("kitty", 0.0, 0)], vec![]).unwrap();

        assert_eq!(rx.try_recv().unwrap(), Event::PresetsChanged { count: 1 });
        let reloaded = PresetStore::open(Box::new(mem));
        assert_eq!(reloaded.presets().len(), 1);
        assert_eq!(reloaded.get(id).unwrap().name, "Dev");
    }

    #[test]
    fn reorder_moves_one_item_and_keeps_the_rest() {
        let (mut store, _) = store_with(&["a", "b", "c", "d"]);
        let mut ids: Vec<Uuid> = store.presets().iter().map(|p| p.id()).collect();

        store.reorder(0, 2);
        assert_eq!(names(&store), vec!["b", "c", "a", "d"]);
        store.reorder(3, 0);
        assert_eq!(names(&store), vec!["d", "b", "c", "a"]);
        store.reorder(1, 99);
        assert_eq!(names(&store), vec!["d", "c", "a", "b"]);

        let mut after: Vec<Uuid> = store.presets().iter().map(|p| p.id()).collect();
        ids.sort();
        after.sort();
        assert_eq!(ids, after);
    }

    #[test]
    fn reorder_out_of_range_is_a_no_op() {
        let (mut store, _) = store_with(&["a", "b"]);
        store.reorder(5, 0);
        assert_eq!(names(&store), vec!["a", "b"]);
    }

    #[test]
    fn delete_and_rename_ignore_unknown_ids() {
        let (mut store, _) = store_with(&["a", "b"]);
        store.delete(Uuid::new_v4());
        store.rename(Uuid::new_v4(), "zzz");
        assert_eq!(names(&store), vec!["a", "b"]);

        let id = store.presets()[0].id();
        store.rename(id, "renamed");
        store.delete(store.presets()[1].id());
        assert_eq!(names(&store), vec!["renamed"]);
    }

    #[test]
    fn round_trip_defaults_missing_window_index() {
        let legacy = r#"[{
            "id": "0b7c3c39-3c55-4c1f-b5e2-6f0c1b2d3e4f",
            "name": "Old",
            "windows": [{
                "id": "9d0d7d5e-1a2b-4c3d-8e9f-0a1b2c3d4e5f",
                "bundleIdentifier": "kitty",
                "appName": "kitty",
                "x": 10, "y": 20, "width": 800, "height": 600
            }]
        }]"#;
        let decoded = decode_presets(legacy);
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].windows[0].window_index, 0);
        assert!(decoded[0].launch_items.is_empty());

        let again = decode_presets(&encode_presets(&decoded).unwrap());
        assert_eq!(again, decoded);
    }

    #[test]
    fn corrupted_blob_means_no_presets() {
        let store = PresetStore::open(Box::new(MemoryStore::with_blob("{ definitely not")));
        assert!(store.presets().is_empty());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("presets.json");
        let file = JsonFileStore::new(&path);
        assert!(file.load().unwrap().is_none());

        let mut store = PresetStore::open(Box::new(file.clone()));
        store.save("Dev", vec![window("kitty", 0.0, 0)], vec![LaunchItem::new("~/notes")]);
        assert!(path.exists());

        let reopened = PresetStore::open(Box::new(JsonFileStore::new(&path)));
        assert_eq!(reopened.presets(), store.presets());
    }

    #[test]
    fn launch_items_and_windows_can_be_removed() {
        let (mut store, _) = store_with(&["a"]);
        let id = store.presets()[0].id();
        let item = LaunchItem::new("github.com");
        let item_id = item.id();
        store.add_launch_item(id, item);
        assert_eq!(store.get(id).unwrap().launch_items.len(), 1);
        store.remove_launch_item(id, item_id);
        assert!(store.get(id).unwrap().launch_items.is_empty());

        let window_id = store.get(id).unwrap().windows[0].id();
        store.remove_window(id, window_id);
        assert!(store.get(id).unwrap().windows.is_empty());
    }

    #[test]
    fn add_window_skips_duplicates() {
        let desktop = FakeDesktop::new();
        let app = desktop.add_app("kitty", "kitty");
        desktop.add_window("kitty", Rect::new(5.0, 35.0, 800.0, 600.0));
        desktop.add_window("kitty", Rect::new(900.0, 30.0, 800.0, 600.0));

        let (mut store, _) = store_with(&["a"]);
        let id = store.presets()[0].id();
        let added = store.add_window(id, &app, &desktop, &MatchConfig::default());

        assert_eq!(added, 1);
        let xs: Vec<f64> = store.get(id).unwrap().windows.iter().map(|w| w.frame.x).collect();
        assert_eq!(xs, vec![0.0, 900.0]);
        // A second pass adds nothing.
        assert_eq!(store.add_window(id, &app, &desktop, &MatchConfig::default()), 0);
    }

    #[test]
    fn refresh_positions_updates_running_apps_only() {
        let desktop = FakeDesktop::new();
        desktop.add_app("kitty", "kitty");
        desktop.add_window("kitty", Rect::new(111.0, 222.0, 700.0, 500.0));

        let (mut store, _) = store_with(&[]);
        let id = store
            .save(
                "mixed",
                vec![window("kitty", 0.0, 0), window("firefox", 50.0, 0), window("kitty", 900.0, 1)],
                vec![],
            )
            .unwrap();
        let ids: Vec<Uuid> = store.get(id).unwrap().windows.iter().map(|w| w.id()).collect();

        let running = desktop.running_apps().unwrap();
        let updated = store.refresh_positions(id, &desktop, &running, &MatchConfig::default());

        assert_eq!(updated, 1);
        let windows = &store.get(id).unwrap().windows;
        assert_eq!(windows[0].frame, Rect::new(111.0, 222.0, 700.0, 500.0));
        assert_eq!(windows[1].frame.x, 50.0);
        assert_eq!(windows[2].frame.x, 900.0);
        assert_eq!(windows.iter().map(|w| w.id()).collect::<Vec<_>>(), ids);
    }
}
