//! Entry point for the **hyprpreset** daemon.
//!
//! Spawns the Unix-socket [`CommandSource`](hyprpreset::traits::CommandSource)
//! on a background thread and processes incoming commands on the main
//! thread, inside a single-threaded tokio runtime.  Preset applies are
//! spawned as local tasks so their waits never block other commands.

use hyprpreset::command::Command;
use hyprpreset::config::Config;
use hyprpreset::hyprland::HyprlandDesktop;
use hyprpreset::ipc::UnixSocketListener;
use hyprpreset::service::{Outcome, PresetService};
use hyprpreset::store::{JsonFileStore, PresetStore};
use hyprpreset::traits::{CommandSource, Event};
use log::{error, info, warn};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::mpsc;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::LocalSet;

/// Resolve the config directory (`$XDG_CONFIG_HOME/hyprpreset`).
fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("hyprpreset")
}

/// Try to load the config from `$XDG_CONFIG_HOME/hyprpreset/config.json`,
/// falling back to compiled-in defaults.
fn load_config() -> Config {
    let path = config_dir().join("config.json");
    match Config::load(&path) {
        Ok(cfg) => {
            info!("loaded config from {}", path.display());
            cfg
        }
        Err(e) => {
            info!("no config file ({}), using defaults", e);
            Config::default()
        }
    }
}

//  Main

fn main() {
    env_logger::init();

    let config = load_config();
    let store_path = config.storage.resolve();
    info!("presets file: {}", store_path.display());
    let store = PresetStore::open(Box::new(JsonFileStore::new(&store_path)));

    let mut service = PresetService::new(Rc::new(HyprlandDesktop::new()), store, config);
    service.set_listener(spawn_event_logger());
    service.refresh_running_apps();

    let (cmd_tx, cmd_rx) = unbounded_channel::<Command>();
    spawn_command_sources(cmd_tx);

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };
    let local = LocalSet::new();
    local.block_on(&rt, run_command_loop(service, cmd_rx));
}

//  Event loop

async fn run_command_loop(
    mut service: PresetService<HyprlandDesktop>,
    mut cmd_rx: UnboundedReceiver<Command>,
) {
    info!("hyprpreset running");
    while let Some(cmd) = cmd_rx.recv().await {
        match service.handle(cmd) {
            Ok(Outcome::Done) => {}
            Ok(Outcome::Apply(task)) => {
                info!("starting apply of \"{}\"", task.preset().name);
                tokio::task::spawn_local(async move {
                    task.run().await;
                });
            }
            Err(e) => error!("command error: {}", e),
        }
    }
    info!("all command sources closed, exiting");
}

//  Helpers

/// Log every emitted [`Event`] from a dedicated thread.
fn spawn_event_logger() -> mpsc::Sender<Event> {
    let (tx, rx) = mpsc::channel::<Event>();
    std::thread::spawn(move || {
        for event in rx {
            match event {
                Event::Warning { .. } => warn!("{}", event),
                _ => info!("{}", event),
            }
        }
    });
    tx
}

fn spawn_command_sources(tx: UnboundedSender<Command>) {
    let path = UnixSocketListener::default_path();
    std::thread::spawn(move || {
        let mut source = UnixSocketListener::new(&path);
        if let Err(e) = source.run(tx) {
            error!("socket listener error: {}", e);
        }
    });
}
