use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::BufReader;

use diaglog_store::{DiagnosticCapture, LogStore, export};
use diaglog_tui::{
    Action, Event, EventHandler, KeyBindings, KeyContext, LogViewerScreen, Tui, ViewerState,
};

use crate::ingest::ingest_lines;

/// How often the viewer polls the store
const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct ViewOptions {
    pub import: Option<PathBuf>,
    pub stdin: bool,
    pub export_dir: PathBuf,
}

/// Load a downloaded artifact into the store without mirroring it again
pub fn import_artifact(store: &LogStore, path: &Path) -> Result<usize> {
    let entries = export::read_artifact(path)
        .with_context(|| format!("Failed to import {}", path.display()))?;
    let count = entries.len();
    store.restore(entries);
    Ok(count)
}

/// `diaglog view`: run the interactive viewer until the user quits
pub async fn run(
    store: &LogStore,
    capture: &DiagnosticCapture,
    options: ViewOptions,
) -> Result<()> {
    if let Some(path) = &options.import {
        let count = import_artifact(store, path)?;
        tracing::info!(count, path = %path.display(), "Imported log artifact");
    }

    if options.stdin {
        let stdin = BufReader::new(tokio::io::stdin());
        capture.spawn("stdin-ingest", ingest_lines(stdin, store.clone()));
    }

    let mut tui = Tui::new().context("Failed to initialize terminal")?;
    let mut events = EventHandler::new(POLL_INTERVAL);
    let keybindings = KeyBindings::new();

    let mut state = ViewerState::new(options.export_dir);
    state.refresh(store);

    let result = event_loop(&mut tui, &mut events, &keybindings, &mut state, store).await;

    events.shutdown().await;
    tui.restore().context("Failed to restore terminal")?;
    result
}

async fn event_loop(
    tui: &mut Tui,
    events: &mut EventHandler,
    keybindings: &KeyBindings,
    state: &mut ViewerState,
    store: &LogStore,
) -> Result<()> {
    while !state.should_quit {
        tui.draw(|frame| LogViewerScreen::render(frame, state, store))?;

        let Some(event) = events.next().await else {
            break;
        };

        match event {
            Event::Tick => state.handle(Action::Tick, store),
            Event::Key(key) => {
                let action = if state.filter_editing {
                    keybindings.get_filter_input_action(&key)
                } else {
                    keybindings.get_action(KeyContext::LogViewer, &key)
                };
                if let Some(action) = action {
                    state.handle(action, store);
                }
            }
            // Next draw picks up the new size
            Event::Resize(_, _) => {}
            Event::Error(e) => {
                tracing::warn!(error = %e, "Terminal event error");
                state.status_message = Some(format!("Input error: {}", e));
            }
        }
    }

    Ok(())
}
