//! Hyprland-specific implementations.
//!
//! This module provides the concrete backend for the capability traits in
//! [`traits`](crate::traits), powered by Hyprland's IPC socket.
//!
//! Nothing outside this module should reference Hyprland directly.

pub mod wm;

pub use wm::{HyprlandDesktop, HyprlandError, WindowAddress};
