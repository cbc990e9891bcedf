use std::path::PathBuf;

use diaglog_store::{ArcLogEntry, CompiledFilter, FilterPresets, LogEntry, LogStore};

use super::Action;

/// Level preset applied on top of the text filter
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LevelView {
    #[default]
    All,
    WarningsAndAbove,
    ErrorsOnly,
}

impl LevelView {
    pub fn next(self) -> Self {
        match self {
            Self::All => Self::WarningsAndAbove,
            Self::WarningsAndAbove => Self::ErrorsOnly,
            Self::ErrorsOnly => Self::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::All => "all levels",
            Self::WarningsAndAbove => "warn+",
            Self::ErrorsOnly => "errors",
        }
    }

    fn filter(self) -> Option<CompiledFilter> {
        match self {
            Self::All => None,
            Self::WarningsAndAbove => Some(FilterPresets::warnings_and_above()),
            Self::ErrorsOnly => Some(FilterPresets::errors_only()),
        }
    }
}

/// Data payload pretty-printed with 2-space indentation, one row per line
pub fn data_lines(entry: &LogEntry) -> Vec<String> {
    entry
        .data
        .as_ref()
        .and_then(|data| serde_json::to_string_pretty(data).ok())
        .map(|pretty| pretty.lines().map(str::to_string).collect())
        .unwrap_or_default()
}

/// Screen rows an entry takes: its header, then data and trace when shown
pub fn entry_rows(entry: &LogEntry, show_data: bool) -> usize {
    if !show_data {
        return 1;
    }
    let trace_rows = entry.trace.as_deref().map_or(0, |t| t.lines().count());
    1 + data_lines(entry).len() + trace_rows
}

/// Cache for filtered log results to avoid re-filtering on every render
#[derive(Default)]
pub struct FilterCache {
    /// Filter pattern the cache was built with (None = no filter)
    cached_filter_pattern: Option<String>,
    cached_case_insensitive: bool,
    cached_regex: bool,
    cached_level_view: LevelView,
    /// Snapshot revision the cache was built from
    cached_revision: u64,
    /// The cached filtered entries
    pub cached_entries: Vec<ArcLogEntry>,
    /// Whether cache is valid
    pub is_valid: bool,
}

impl FilterCache {
    /// Check if cache needs to be invalidated based on current state
    pub fn needs_refresh(
        &self,
        filter: Option<&CompiledFilter>,
        level_view: LevelView,
        revision: u64,
    ) -> bool {
        if !self.is_valid
            || self.cached_revision != revision
            || self.cached_level_view != level_view
        {
            return true;
        }

        let current_pattern = filter.map(|f| f.pattern().to_string());
        if self.cached_filter_pattern != current_pattern {
            return true;
        }

        filter.is_some_and(|f| {
            f.is_case_insensitive() != self.cached_case_insensitive
                || f.is_regex() != self.cached_regex
        })
    }

    /// Update the cache with new filtered results
    pub fn update(
        &mut self,
        filter: Option<&CompiledFilter>,
        level_view: LevelView,
        revision: u64,
        entries: Vec<ArcLogEntry>,
    ) {
        self.cached_level_view = level_view;
        self.cached_filter_pattern = filter.map(|f| f.pattern().to_string());
        self.cached_case_insensitive = filter.is_some_and(|f| f.is_case_insensitive());
        self.cached_regex = filter.is_some_and(|f| f.is_regex());
        self.cached_revision = revision;
        self.cached_entries = entries;
        self.is_valid = true;
    }

    pub fn invalidate(&mut self) {
        self.is_valid = false;
    }
}

/// State of the log viewer
pub struct ViewerState {
    /// Entries from the last poll of the store
    pub entries: Vec<ArcLogEntry>,

    /// Bumped on every poll
    pub revision: u64,

    /// Poll the store on every tick?
    pub auto_refresh: bool,

    /// Keep the view pinned to the newest entry?
    pub follow: bool,

    /// First visible row of the filtered list
    pub scroll: usize,

    /// Rows available in the log pane at the last render
    pub viewport_height: usize,

    /// Show data payloads and traces under messages?
    pub show_data: bool,

    /// Level preset, cycled with a key
    pub level_view: LevelView,

    level_filter: Option<CompiledFilter>,

    pub stats_visible: bool,

    pub help_visible: bool,

    /// Is the filter input open?
    pub filter_editing: bool,

    /// Current filter input text
    pub filter_input: String,

    /// Currently active filter (None = show all)
    pub active_filter: Option<CompiledFilter>,

    /// Filter input error message (e.g., invalid regex)
    pub filter_error: Option<String>,

    pub filter_case_insensitive: bool,

    /// Interpret the filter as a regex instead of literal text
    pub filter_regex: bool,

    /// Transient message for the status bar
    pub status_message: Option<String>,

    /// Directory for downloaded artifacts
    pub export_dir: PathBuf,

    pub should_quit: bool,

    pub filter_cache: FilterCache,
}

impl ViewerState {
    pub fn new(export_dir: PathBuf) -> Self {
        Self {
            entries: Vec::new(),
            revision: 0,
            auto_refresh: true,
            follow: true,
            scroll: 0,
            viewport_height: 0,
            show_data: true,
            level_view: LevelView::All,
            level_filter: None,
            stats_visible: false,
            help_visible: false,
            filter_editing: false,
            filter_input: String::new(),
            active_filter: None,
            filter_error: None,
            filter_case_insensitive: true,
            filter_regex: false,
            status_message: None,
            export_dir,
            should_quit: false,
            filter_cache: FilterCache::default(),
        }
    }

    /// Apply an action against the store
    pub fn handle(&mut self, action: Action, store: &LogStore) {
        match action {
            Action::Quit => self.should_quit = true,

            Action::ToggleHelp => self.help_visible = !self.help_visible,
            Action::ToggleStats => self.stats_visible = !self.stats_visible,
            Action::ToggleData => {
                self.show_data = !self.show_data;
                self.clamp_scroll();
            }
            Action::CycleLevelFilter => {
                self.level_view = self.level_view.next();
                self.level_filter = self.level_view.filter();
                self.clamp_scroll();
            }
            Action::ToggleFollow => {
                self.follow = !self.follow;
                if self.follow {
                    self.scroll_to_bottom();
                }
            }
            Action::ToggleAutoRefresh => {
                self.auto_refresh = !self.auto_refresh;
                if self.auto_refresh {
                    self.refresh(store);
                }
            }

            Action::OpenFilter => self.start_filter(),
            Action::FilterInput(c) => self.filter_input.push(c),
            Action::FilterBackspace => {
                self.filter_input.pop();
            }
            Action::FilterClearInput => self.filter_input.clear(),
            Action::ApplyFilter => self.apply_filter(),
            Action::CancelFilter => self.cancel_filter(),
            Action::ClearFilter => self.clear_filter(),
            Action::ToggleCaseSensitive => {
                self.filter_case_insensitive = !self.filter_case_insensitive;
                self.recompile_filter();
            }
            Action::ToggleRegex => {
                self.filter_regex = !self.filter_regex;
                self.recompile_filter();
            }

            Action::ScrollUp(n) => {
                self.follow = false;
                self.scroll = self.scroll.saturating_sub(n);
            }
            Action::ScrollDown(n) => {
                self.scroll = (self.scroll + n).min(self.max_scroll());
                self.follow = self.scroll == self.max_scroll();
            }
            Action::PageUp => {
                let page = self.viewport_height.max(1);
                self.handle(Action::ScrollUp(page), store);
            }
            Action::PageDown => {
                let page = self.viewport_height.max(1);
                self.handle(Action::ScrollDown(page), store);
            }
            Action::ScrollToTop => {
                self.follow = false;
                self.scroll = 0;
            }
            Action::ScrollToBottom => {
                self.follow = true;
                self.scroll_to_bottom();
            }

            Action::Refresh => self.refresh(store),
            Action::ClearLogs => {
                store.clear_logs();
                self.refresh(store);
                self.scroll = 0;
            }
            Action::DownloadLogs => match store.download_logs(&self.export_dir) {
                Ok(path) => {
                    self.status_message = Some(format!(
                        "Exported {} logs to {}",
                        store.len(),
                        path.display()
                    ));
                }
                Err(e) => {
                    let dir = self.export_dir.display();
                    tracing::warn!(error = %e, dir = %dir, "Log export failed");
                    self.status_message = Some(format!("Export failed: {}", e));
                }
            },

            Action::DismissMessage => {
                if self.help_visible {
                    self.help_visible = false;
                } else {
                    self.status_message = None;
                }
            }

            Action::Tick => {
                if self.auto_refresh {
                    self.refresh(store);
                }
            }
        }
    }

    /// Take a fresh snapshot of the store
    pub fn refresh(&mut self, store: &LogStore) {
        self.entries = store.snapshot();
        self.revision += 1;
        if self.follow {
            self.scroll_to_bottom();
        }
    }

    /// Entries passing the level preset and the active filter, in store order
    pub fn visible_entries(&mut self) -> &[ArcLogEntry] {
        let filter = self.active_filter.as_ref();
        if self
            .filter_cache
            .needs_refresh(filter, self.level_view, self.revision)
        {
            let filtered: Vec<ArcLogEntry> = self
                .entries
                .iter()
                .filter(|e| self.level_filter.as_ref().is_none_or(|f| f.matches(e)))
                .filter(|e| filter.is_none_or(|f| f.matches(e)))
                .cloned()
                .collect();
            self.filter_cache
                .update(filter, self.level_view, self.revision, filtered);
        }
        &self.filter_cache.cached_entries
    }

    /// Largest scroll offset (in entries) that still fills the viewport
    ///
    /// Entries showing their data take more than one row.
    pub fn max_scroll(&mut self) -> usize {
        let height = self.viewport_height;
        let show_data = self.show_data;
        let entries = self.visible_entries();

        let mut rows = 0;
        for (idx, entry) in entries.iter().enumerate().rev() {
            rows += entry_rows(entry, show_data);
            if rows > height {
                return (idx + 1).min(entries.len() - 1);
            }
        }
        0
    }

    /// Clamp the scroll offset after the content or viewport changed
    pub fn clamp_scroll(&mut self) {
        if self.follow {
            self.scroll_to_bottom();
        } else {
            self.scroll = self.scroll.min(self.max_scroll());
        }
    }

    fn scroll_to_bottom(&mut self) {
        self.scroll = self.max_scroll();
    }

    /// Start filter input mode
    pub fn start_filter(&mut self) {
        self.filter_editing = true;
        self.filter_input = self
            .active_filter
            .as_ref()
            .map(|f| f.pattern().to_string())
            .unwrap_or_default();
        self.filter_error = None;
    }

    /// Cancel filter input, keeping the previous filter
    pub fn cancel_filter(&mut self) {
        self.filter_editing = false;
        self.filter_input.clear();
        self.filter_error = None;
    }

    /// Apply the current input as a filter
    pub fn apply_filter(&mut self) {
        self.filter_editing = false;
        self.filter_error = None;

        if self.filter_input.is_empty() {
            self.active_filter = None;
        } else {
            match self.compile(&self.filter_input) {
                Ok(filter) => self.active_filter = Some(filter),
                Err(e) => {
                    self.filter_error = Some(e);
                    // Keep input open to fix
                    self.filter_editing = true;
                }
            }
        }
        self.clamp_scroll();
    }

    /// Clear the active filter
    pub fn clear_filter(&mut self) {
        self.active_filter = None;
        self.filter_input.clear();
        self.filter_error = None;
        self.clamp_scroll();
    }

    fn recompile_filter(&mut self) {
        let Some(pattern) = self.active_filter.as_ref().map(|f| f.pattern().to_string()) else {
            return;
        };
        match self.compile(&pattern) {
            Ok(filter) => self.active_filter = Some(filter),
            Err(e) => {
                self.filter_error = Some(e);
                self.active_filter = None;
            }
        }
        self.clamp_scroll();
    }

    fn compile(&self, pattern: &str) -> Result<CompiledFilter, String> {
        if self.filter_regex {
            CompiledFilter::regex(pattern, self.filter_case_insensitive)
                .map_err(|e| format!("Invalid regex: {}", e))
        } else {
            Ok(CompiledFilter::text(pattern, self.filter_case_insensitive))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diaglog_store::LogLevel;
    use serde_json::json;

    fn setup() -> (ViewerState, LogStore) {
        let store = LogStore::in_memory(100);
        let mut state = ViewerState::new(std::env::temp_dir());
        state.viewport_height = 2;
        state.refresh(&store);
        (state, store)
    }

    fn visible_messages(state: &mut ViewerState) -> Vec<String> {
        state
            .visible_entries()
            .iter()
            .map(|e| e.message.clone())
            .collect()
    }

    #[test]
    fn test_tick_polls_only_with_auto_refresh() {
        let (mut state, store) = setup();
        store.info("first");
        state.handle(Action::Tick, &store);
        assert_eq!(visible_messages(&mut state), vec!["first"]);

        state.handle(Action::ToggleAutoRefresh, &store);
        store.info("second");
        state.handle(Action::Tick, &store);
        assert_eq!(visible_messages(&mut state), vec!["first"]);

        state.handle(Action::Refresh, &store);
        assert_eq!(visible_messages(&mut state), vec!["first", "second"]);
    }

    #[test]
    fn test_filter_matches_message_and_data() {
        let (mut state, store) = setup();
        store.info("Model started");
        store.error_with("request failed", json!({"reason": "model timeout"}));
        store.debug("heartbeat");
        state.refresh(&store);

        state.handle(Action::OpenFilter, &store);
        for c in "MODEL".chars() {
            state.handle(Action::FilterInput(c), &store);
        }
        state.handle(Action::ApplyFilter, &store);

        assert!(!state.filter_editing);
        assert_eq!(visible_messages(&mut state), vec!["Model started", "request failed"]);

        state.handle(Action::ToggleCaseSensitive, &store);
        assert!(visible_messages(&mut state).is_empty());

        state.handle(Action::ClearFilter, &store);
        assert_eq!(visible_messages(&mut state).len(), 3);
    }

    #[test]
    fn test_invalid_regex_keeps_input_open() {
        let (mut state, store) = setup();
        state.handle(Action::ToggleRegex, &store);
        state.handle(Action::OpenFilter, &store);
        state.handle(Action::FilterInput('('), &store);
        state.handle(Action::ApplyFilter, &store);

        assert!(state.filter_editing);
        assert!(state.filter_error.as_deref().unwrap().starts_with("Invalid regex"));
        assert!(state.active_filter.is_none());
    }

    #[test]
    fn test_clear_logs_empties_store_and_view() {
        let (mut state, store) = setup();
        store.info("a");
        state.refresh(&store);
        state.handle(Action::ClearLogs, &store);

        assert!(store.is_empty());
        assert!(visible_messages(&mut state).is_empty());
    }

    #[test]
    fn test_scrolling_and_follow() {
        let (mut state, store) = setup();
        for m in ["a", "b", "c", "d", "e"] {
            store.info(m);
        }
        state.refresh(&store);
        assert_eq!(state.scroll, 3);

        state.handle(Action::ScrollUp(2), &store);
        assert_eq!(state.scroll, 1);
        assert!(!state.follow);

        // New entries do not move a detached view
        store.info("f");
        state.handle(Action::Tick, &store);
        assert_eq!(state.scroll, 1);

        state.handle(Action::ScrollToBottom, &store);
        assert_eq!(state.scroll, 4);
        assert!(state.follow);

        state.handle(Action::ScrollToTop, &store);
        state.handle(Action::PageDown, &store);
        assert_eq!(state.scroll, 2);
    }

    #[test]
    fn test_scroll_counts_data_rows() {
        let (mut state, store) = setup();
        state.viewport_height = 3;
        let data = diaglog_types::into_log_data(json!({"k": 1}));
        store.append(LogEntry::new(LogLevel::Info, "a", data));
        store.append(LogEntry::new(LogLevel::Info, "b", None));
        store.append(LogEntry::new(LogLevel::Info, "c", None));
        state.refresh(&store);

        // "a" takes four rows, so only "b" and "c" fit at the bottom
        assert_eq!(entry_rows(&state.entries[0], true), 4);
        assert_eq!(state.scroll, 1);

        state.handle(Action::ToggleData, &store);
        assert_eq!(state.scroll, 0);
    }

    #[test]
    fn test_level_view_cycles_and_combines_with_filter() {
        let (mut state, store) = setup();
        store.info("disk ok");
        store.warn("disk slow");
        store.error("disk failed");
        store.error("network down");
        state.refresh(&store);

        state.handle(Action::CycleLevelFilter, &store);
        assert_eq!(state.level_view, LevelView::WarningsAndAbove);
        assert_eq!(
            visible_messages(&mut state),
            vec!["disk slow", "disk failed", "network down"]
        );

        state.handle(Action::OpenFilter, &store);
        for c in "disk".chars() {
            state.handle(Action::FilterInput(c), &store);
        }
        state.handle(Action::ApplyFilter, &store);
        state.handle(Action::CycleLevelFilter, &store);
        assert_eq!(state.level_view, LevelView::ErrorsOnly);
        assert_eq!(visible_messages(&mut state), vec!["disk failed"]);

        state.handle(Action::CycleLevelFilter, &store);
        assert_eq!(state.level_view, LevelView::All);
        assert_eq!(visible_messages(&mut state).len(), 3);
    }

    #[test]
    fn test_download_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = LogStore::in_memory(10);
        let mut state = ViewerState::new(dir.path().to_path_buf());
        store.warn("w");

        state.handle(Action::DownloadLogs, &store);
        let message = state.status_message.clone().unwrap();
        assert!(message.starts_with("Exported 1 logs to"));
        assert_eq!(store.len(), 1);

        state.handle(Action::DismissMessage, &store);
        assert!(state.status_message.is_none());
    }
}
