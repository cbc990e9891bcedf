//! Viewer state and actions

mod action;
mod state;

pub use action::Action;
pub use state::{FilterCache, LevelView, ViewerState, data_lines, entry_rows};
