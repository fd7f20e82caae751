//! **hyprpreset**: capture and restore multi-window layout presets.
//!
//! A preset is a named snapshot of application windows (which app, which
//! of its windows, where and how large) plus URLs and files to open with
//! it.  Applying a preset launches or wakes each application, makes sure
//! it has enough windows, pairs saved windows with live ones and moves them
//! back into place, relocating anything that would land off-screen.
//!
//! # Architecture
//!
//! The crate is organised around capability traits in [`traits`]:
//!
//! * [`traits::WindowManager`], [`traits::WindowRequests`],
//!   [`traits::ProcessControl`] and [`traits::Shell`] abstract the
//!   desktop, so capture, matching and restore are not coupled to any
//!   specific compositor.
//! * [`traits::CommandSource`] abstracts the transport that delivers
//!   user intent, so the daemon loop is not coupled to any specific IPC
//!   mechanism.
//!
//! The platform-independent pieces are [`capture`], [`matcher`],
//! [`screen`], [`restore`] and [`store`], bound together by [`service`].
//! Concrete implementations live in [`hyprland`] (Hyprland IPC) and
//! [`ipc`] (Unix-socket command listener).

pub mod capture;
pub mod command;
pub mod config;
pub mod hyprland;
pub mod ipc;
pub mod launch_item;
pub mod matcher;
pub mod model;
pub mod restore;
pub mod screen;
pub mod service;
pub mod store;
pub mod traits;

#[cfg(test)]
mod fake;
