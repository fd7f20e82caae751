//! [`Desktop`](crate::traits::Desktop) implementation backed by Hyprland IPC.
//!
//! Communicates directly with Hyprland through its Unix socket at
//! `$XDG_RUNTIME_DIR/hypr/$HYPRLAND_INSTANCE_SIGNATURE/.socket.sock`,
//! avoiding any shell command invocation or third-party crate for socket
//! discovery.
//!
//! # Mapping
//!
//! | Concept            | Hyprland                                              |
//! |--------------------|-------------------------------------------------------|
//! | bundle identifier  | client `class`                                        |
//! | window handle      | client `address`                                      |
//! | main window        | lowest non-negative `focusHistoryID` of the class     |
//! | minimized          | client sits on a `special:` workspace                 |
//! | full screen        | non-zero `fullscreen`                                 |
//! | screen             | monitor, in logical (scaled) pixels                   |
//! | usable area        | monitor minus its `reserved` edges (bars)             |
//!
//! Hyprland has no notion of launching "an application": `launch`,
//! `reopen` and new-window requests all `exec` the class name, which holds
//! for the common case where the binary and the class agree.

use crate::model::{AppHandle, Point, Rect, RunningApplication, Screen, Size};
use crate::traits::{ProcessControl, Shell, WindowManager, WindowRequests};
use log::debug;
use serde::Deserialize;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

/// Hyprland-backed desktop.
///
/// All communication happens over Hyprland's IPC socket.  Every call opens
/// a short-lived request; nothing is cached, so handles and geometry are
/// always current.
#[derive(Debug, Default)]
pub struct HyprlandDesktop;

/// Errors that can occur when talking to Hyprland.
#[derive(Debug, thiserror::Error)]
#[error("hyprland IPC error: {0}")]
pub struct HyprlandError(String);

impl HyprlandDesktop {
    /// Create a new handle.
    ///
    /// No connection is opened eagerly.
    pub fn new() -> Self {
        Self
    }

    fn clients(&self) -> Result<Vec<ClientJson>, HyprlandError> {
        parse(&ipc_json("clients")?)
    }

    fn client(&self, window: &WindowAddress) -> Result<ClientJson, HyprlandError> {
        self.clients()?
            .into_iter()
            .find(|c| c.address == window.0)
            .ok_or_else(|| HyprlandError(format!("no client {}", window.0)))
    }

    fn active_workspace(&self) -> Result<i64, HyprlandError> {
        let ws: WorkspaceJson = parse(&ipc_json("activeworkspace")?)?;
        Ok(ws.id)
    }
}

/// A Hyprland client address such as `0x55d0c2a4e310`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowAddress(pub String);

//  Direct Hyprland IPC helpers

/// Resolve the Hyprland command socket path.
///
/// Hyprland ≥ 0.40 stores its sockets at
/// `$XDG_RUNTIME_DIR/hypr/$HYPRLAND_INSTANCE_SIGNATURE/.socket.sock`.
fn socket_path() -> Result<PathBuf, HyprlandError> {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR")
        .map_err(|_| HyprlandError("XDG_RUNTIME_DIR not set".into()))?;
    let his = std::env::var("HYPRLAND_INSTANCE_SIGNATURE")
        .map_err(|_| HyprlandError("HYPRLAND_INSTANCE_SIGNATURE not set".into()))?;
    Ok(PathBuf::from(format!("{}/hypr/{}/.socket.sock", runtime_dir, his)))
}

/// Send a raw command to the Hyprland command socket and return the
/// response as a string.
fn ipc_request(command: &str) -> Result<String, HyprlandError> {
    let path = socket_path()?;
    let mut stream = UnixStream::connect(&path)
        .map_err(|e| HyprlandError(format!("connect to {}: {}", path.display(), e)))?;

    stream
        .write_all(command.as_bytes())
        .map_err(|e| HyprlandError(format!("write: {}", e)))?;

    let mut response = Vec::new();
    stream
        .read_to_end(&mut response)
        .map_err(|e| HyprlandError(format!("read: {}", e)))?;

    String::from_utf8(response).map_err(|e| HyprlandError(format!("utf-8: {}", e)))
}

/// Send a JSON data query (`j/<command>`) and return the raw JSON string.
fn ipc_json(data_command: &str) -> Result<String, HyprlandError> {
    ipc_request(&format!("j/{}", data_command))
}

/// Send a dispatch command and check for `"ok"`.
fn ipc_dispatch(args: &str) -> Result<(), HyprlandError> {
    debug!("dispatch {}", args);
    let response = ipc_request(&format!("/dispatch {}", args))?;
    if response.trim() == "ok" {
        Ok(())
    } else {
        Err(HyprlandError(format!("dispatch {}: {}", args, response.trim())))
    }
}

fn parse<T: for<'de> Deserialize<'de>>(json: &str) -> Result<T, HyprlandError> {
    serde_json::from_str(json).map_err(|e| HyprlandError(format!("parse: {}", e)))
}

//  Minimal serde structs for the JSON we care about

#[derive(Debug, Clone, Deserialize)]
struct WorkspaceJson {
    id: i64,
    #[serde(default)]
    name: String,
}

/// Subset of one object returned by `j/clients`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientJson {
    address: String,
    #[serde(default = "yes")]
    mapped: bool,
    at: [f64; 2],
    size: [f64; 2],
    workspace: WorkspaceJson,
    #[serde(default)]
    class: String,
    #[serde(default)]
    pid: i64,
    /// `bool` before Hyprland 0.41, a fullscreen mode number after.
    #[serde(default)]
    fullscreen: serde_json::Value,
    #[serde(default = "unfocused", rename = "focusHistoryID")]
    focus_history_id: i64,
}

fn yes() -> bool {
    true
}

fn unfocused() -> i64 {
    -1
}

impl ClientJson {
    fn frame(&self) -> Rect {
        Rect::new(self.at[0], self.at[1], self.size[0], self.size[1])
    }

    fn is_minimized(&self) -> bool {
        self.workspace.name.starts_with("special")
    }

    fn is_full_screen(&self) -> bool {
        match &self.fullscreen {
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::Number(n) => n.as_i64().is_some_and(|v| v != 0),
            _ => false,
        }
    }
}

/// Subset of one object returned by `j/monitors`.
#[derive(Debug, Clone, Deserialize)]
struct MonitorJson {
    width: f64,
    height: f64,
    x: f64,
    y: f64,
    #[serde(default = "unit_scale")]
    scale: f64,
    #[serde(default)]
    transform: u8,
    /// Left, top, right, bottom.
    #[serde(default)]
    reserved: [f64; 4],
    #[serde(default)]
    focused: bool,
}

fn unit_scale() -> f64 {
    1.0
}

/// Monitor geometry in the layout (logical) coordinate space.
fn monitor_to_screen(m: &MonitorJson) -> Screen {
    let scale = if m.scale > 0.0 { m.scale } else { 1.0 };
    let (mut w, mut h) = (m.width / scale, m.height / scale);
    // Odd transforms are 90° / 270° rotations.
    if m.transform % 2 == 1 {
        std::mem::swap(&mut w, &mut h);
    }
    let frame = Rect::new(m.x, m.y, w, h);
    let [left, top, right, bottom] = m.reserved;
    let visible = Rect::new(
        frame.x + left,
        frame.y + top,
        (frame.width - left - right).max(0.0),
        (frame.height - top - bottom).max(0.0),
    );
    Screen {
        frame,
        visible,
        is_main: m.focused,
    }
}

/// Address of the most recently focused mapped client of `class`.
fn main_address<'a>(clients: &'a [ClientJson], class: &str) -> Option<&'a str> {
    clients
        .iter()
        .filter(|c| c.mapped && c.class == class && c.focus_history_id >= 0)
        .min_by_key(|c| c.focus_history_id)
        .map(|c| c.address.as_str())
}

/// One entry per distinct class, in first-seen order.
fn running_from_clients(clients: &[ClientJson]) -> Vec<RunningApplication> {
    let mut apps: Vec<RunningApplication> = Vec::new();
    for c in clients {
        if c.class.is_empty() || apps.iter().any(|a| a.bundle_id.as_deref() == Some(c.class.as_str())) {
            continue;
        }
        apps.push(RunningApplication {
            pid: u32::try_from(c.pid).unwrap_or(0),
            name: c.class.clone(),
            bundle_id: Some(c.class.clone()),
            icon: Some(c.class.to_lowercase()),
            is_selected: false,
        });
    }
    apps
}

/// Escape regex metacharacters for Hyprland's `class:` window rules.
fn regex_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Single-quote `s` for `/bin/sh`, which is what `exec` runs through.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

fn exec(command: &str) -> Result<(), HyprlandError> {
    ipc_dispatch(&format!("exec {}", command))
}

//  Trait implementations

impl WindowManager for HyprlandDesktop {
    type Error = HyprlandError;
    type Window = WindowAddress;

    fn windows(&self, app: &AppHandle) -> Result<Vec<WindowAddress>, HyprlandError> {
        Ok(self
            .clients()?
            .into_iter()
            .filter(|c| c.mapped && c.class == app.bundle_id)
            .map(|c| WindowAddress(c.address))
            .collect())
    }

    fn position(&self, window: &WindowAddress) -> Result<Point, HyprlandError> {
        Ok(self.client(window)?.frame().origin())
    }

    fn size(&self, window: &WindowAddress) -> Result<Size, HyprlandError> {
        Ok(self.client(window)?.frame().size())
    }

    fn set_position(&self, window: &WindowAddress, position: Point) -> Result<(), HyprlandError> {
        // Tiled windows ignore pixel moves.
        ipc_dispatch(&format!("setfloating address:{}", window.0))?;
        ipc_dispatch(&format!(
            "movewindowpixel exact {} {},address:{}",
            position.x.round() as i64,
            position.y.round() as i64,
            window.0
        ))
    }

    fn set_size(&self, window: &WindowAddress, size: Size) -> Result<(), HyprlandError> {
        ipc_dispatch(&format!("setfloating address:{}", window.0))?;
        ipc_dispatch(&format!(
            "resizewindowpixel exact {} {},address:{}",
            size.width.round() as i64,
            size.height.round() as i64,
            window.0
        ))
    }

    fn is_minimized(&self, window: &WindowAddress) -> Result<bool, HyprlandError> {
        Ok(self.client(window)?.is_minimized())
    }

    fn set_minimized(&self, window: &WindowAddress, minimized: bool) -> Result<(), HyprlandError> {
        let target = if minimized {
            "special:minimized".to_string()
        } else {
            self.active_workspace()?.to_string()
        };
        ipc_dispatch(&format!("movetoworkspacesilent {},address:{}", target, window.0))
    }

    fn is_main(&self, window: &WindowAddress) -> Result<bool, HyprlandError> {
        let clients = self.clients()?;
        let class = clients
            .iter()
            .find(|c| c.address == window.0)
            .map(|c| c.class.clone())
            .ok_or_else(|| HyprlandError(format!("no client {}", window.0)))?;
        Ok(main_address(&clients, &class) == Some(window.0.as_str()))
    }

    fn is_full_screen(&self, window: &WindowAddress) -> Result<bool, HyprlandError> {
        Ok(self.client(window)?.is_full_screen())
    }

    fn screens(&self) -> Result<Vec<Screen>, HyprlandError> {
        let monitors: Vec<MonitorJson> = parse(&ipc_json("monitors")?)?;
        Ok(monitors.iter().map(monitor_to_screen).collect())
    }
}

impl WindowRequests for HyprlandDesktop {
    fn request_new_window(&self, app: &AppHandle) -> Result<(), HyprlandError> {
        exec(&shell_quote(&app.bundle_id))
    }

    fn request_exit_full_screen(
        &self,
        _app: &AppHandle,
        window: &WindowAddress,
    ) -> Result<(), HyprlandError> {
        ipc_dispatch(&format!("focuswindow address:{}", window.0))?;
        ipc_dispatch("fullscreenstate 0 0")
    }
}

impl ProcessControl for HyprlandDesktop {
    type Error = HyprlandError;

    fn running_apps(&self) -> Result<Vec<RunningApplication>, HyprlandError> {
        Ok(running_from_clients(&self.clients()?))
    }

    /// `exec` does not report the spawned pid, so this always yields `None`.
    fn launch(&self, bundle_id: &str, _activate: bool) -> Result<Option<u32>, HyprlandError> {
        exec(&shell_quote(bundle_id))?;
        Ok(None)
    }

    fn activate(&self, app: &AppHandle) -> Result<(), HyprlandError> {
        ipc_dispatch(&format!("focuswindow class:^({})$", regex_escape(&app.bundle_id)))
    }

    fn unhide(&self, app: &AppHandle) -> Result<(), HyprlandError> {
        let hidden: Vec<ClientJson> = self
            .clients()?
            .into_iter()
            .filter(|c| c.class == app.bundle_id && c.is_minimized())
            .collect();
        if hidden.is_empty() {
            return Ok(());
        }
        let ws = self.active_workspace()?;
        for c in hidden {
            ipc_dispatch(&format!("movetoworkspacesilent {},address:{}", ws, c.address))?;
        }
        Ok(())
    }

    fn reopen(&self, app: &AppHandle) -> Result<(), HyprlandError> {
        exec(&shell_quote(&app.bundle_id))
    }
}

impl Shell for HyprlandDesktop {
    type Error = HyprlandError;

    fn open_url(&self, url: &str) -> Result<(), HyprlandError> {
        exec(&format!("xdg-open {}", shell_quote(url)))
    }

    fn open_file(&self, path: &Path) -> Result<(), HyprlandError> {
        exec(&format!("xdg-open {}", shell_quote(&path.to_string_lossy())))
    }
}
