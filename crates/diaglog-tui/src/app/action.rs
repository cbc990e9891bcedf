/// All possible actions in the viewer (command pattern)
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Quit,

    // UI toggles
    ToggleHelp,
    ToggleStats,
    ToggleData,
    ToggleFollow,
    ToggleAutoRefresh,
    CycleLevelFilter,

    // Filter
    OpenFilter,
    FilterInput(char),
    FilterBackspace,
    FilterClearInput,
    ApplyFilter,
    CancelFilter,
    ClearFilter,
    ToggleCaseSensitive,
    ToggleRegex,

    // Scrolling
    ScrollUp(usize),
    ScrollDown(usize),
    ScrollToTop,
    ScrollToBottom,
    PageUp,
    PageDown,

    // Store actions
    Refresh,
    ClearLogs,
    DownloadLogs,

    DismissMessage,

    // Tick (periodic poll)
    Tick,
}
