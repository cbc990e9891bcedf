//! Terminal log viewer for diaglog
//!
//! This crate provides the interactive viewer over a [`diaglog_store::LogStore`]:
//! viewer state, keybindings, terminal event handling and rendering.

pub mod app;
pub mod config;
pub mod tui;
pub mod ui;

pub use app::{Action, LevelView, ViewerState};
pub use config::{KeyBinding, KeyBindings, KeyContext};
pub use tui::{Event, EventHandler, Tui};
pub use ui::components::{HelpOverlay, StatusBar, viewer_hints};
pub use ui::screens::{LogViewerScreen, truncate_to_width};
pub use ui::{Layout, Theme, ViewerAreas};
