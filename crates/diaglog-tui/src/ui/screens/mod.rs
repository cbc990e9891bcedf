mod log_viewer;

pub use log_viewer::{LogViewerScreen, truncate_to_width};
