//! Libris application library
//!
//! Wires the application modules into the kernel, the store and the HTTP
//! stack. Both the `libris-app` server binary and the `libris` CLI drive
//! an [`Application`].

mod app;
pub mod modules;

pub use app::{Application, APP_INFO};
pub use modules::register_all;
