//! IPC listener that accepts commands over a Unix socket.
//!
//! External tools (scripts, key-bind helpers, a launcher menu) can connect
//! to the socket and send newline-delimited JSON commands.

pub mod listener;

pub use listener::UnixSocketListener;
