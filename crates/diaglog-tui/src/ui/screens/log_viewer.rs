use std::borrow::Cow;

use chrono::Local;
use diaglog_store::{LogEntry, LogLevel, LogStore};
use ratatui::{
    Frame,
    layout::{Margin, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::{LevelView, ViewerState, data_lines};
use crate::ui::components::{HelpOverlay, StatusBar, viewer_hints};
use crate::ui::{Layout, Theme};

/// Log viewer screen
pub struct LogViewerScreen;

/// "HH:MM:SS.mmm" + " LEVEL" + " │ "
const PREFIX_WIDTH: usize = 12 + 6 + 3;

/// Cut `s` to at most `max_width` display columns, marking the cut with "..."
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if s.width() <= max_width {
        return Cow::Borrowed(s);
    }
    let budget = max_width.saturating_sub(3);
    let mut width = 0;
    let mut end = 0;
    for (idx, c) in s.char_indices() {
        let cw = c.width().unwrap_or(0);
        if width + cw > budget {
            break;
        }
        width += cw;
        end = idx + c.len_utf8();
    }
    let dots = &"..."[..max_width.min(3)];
    Cow::Owned(format!("{}{}", &s[..end], dots))
}

impl LogViewerScreen {
    pub fn render(frame: &mut Frame, state: &mut ViewerState, store: &LogStore) {
        let show_filter_bar = state.filter_editing
            || state.active_filter.is_some()
            || state.filter_error.is_some();

        let areas = Layout::viewer(frame.area(), state.stats_visible, show_filter_bar);

        Self::render_header(frame, areas.header, state, store);
        if let Some(area) = areas.stats {
            Self::render_stats_bar(frame, area, store);
        }
        if let Some(area) = areas.filter {
            Self::render_filter_bar(frame, area, state);
        }
        Self::render_logs(frame, areas.logs, state);
        Self::render_status_bar(frame, areas.status, state, store);

        if state.help_visible {
            HelpOverlay::render(frame);
        }
    }

    fn render_header(frame: &mut Frame, area: Rect, state: &ViewerState, store: &LogStore) {
        let flag = |on: bool| if on { Theme::flag_on() } else { Theme::text_dim() };

        let mut spans = vec![
            Span::styled(" diaglog", Theme::title()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(store.environment().as_str(), Theme::text_highlight()),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(
                format!("{}/{} entries", store.len(), store.capacity()),
                Theme::text(),
            ),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled(
                if state.auto_refresh { "auto-refresh" } else { "paused" },
                flag(state.auto_refresh),
            ),
            Span::styled(" │ ", Theme::text_dim()),
            Span::styled("follow", flag(state.follow)),
        ];

        if state.level_view != LevelView::All {
            spans.push(Span::styled(" │ ", Theme::text_dim()));
            spans.push(Span::styled(state.level_view.label(), Theme::flag_on()));
        }

        if let Some(stats) = store.remote_stats() {
            spans.push(Span::styled(" │ ", Theme::text_dim()));
            spans.push(Span::styled(
                format!("remote {} sent", stats.sent),
                Theme::text(),
            ));
            if stats.failed > 0 {
                spans.push(Span::styled(
                    format!(" {} failed", stats.failed),
                    Style::default().fg(Theme::ERROR),
                ));
            }
        }

        let header = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border()),
        );

        frame.render_widget(header, area);
    }

    fn render_stats_bar(frame: &mut Frame, area: Rect, store: &LogStore) {
        let counts = store.level_counts();

        let mut spans = vec![Span::styled(" ", Theme::text())];
        for (level, count) in [
            (LogLevel::Error, counts.error),
            (LogLevel::Warn, counts.warn),
            (LogLevel::Info, counts.info),
            (LogLevel::Debug, counts.debug),
        ] {
            spans.push(Span::styled(format!("{}:", level.label()), Theme::level(level)));
            spans.push(Span::styled(format!("{} ", count), Theme::text()));
        }

        spans.push(Span::styled("│ ", Theme::text_dim()));
        spans.push(Span::styled("Total:", Theme::text_dim()));
        spans.push(Span::styled(
            format!("{}/{}", counts.total(), store.capacity()),
            Theme::text(),
        ));

        let stats_widget = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border())
                .title(Span::styled(" Stats ", Theme::title())),
        );

        frame.render_widget(stats_widget, area);
    }

    fn render_filter_bar(frame: &mut Frame, area: Rect, state: &ViewerState) {
        let mut spans = vec![];

        if state.filter_editing {
            spans.push(Span::styled(" /", Theme::text_highlight()));
        } else {
            spans.push(Span::styled(" Filter: ", Theme::text_dim()));
        }

        let pattern = if state.filter_editing {
            state.filter_input.as_str()
        } else if let Some(filter) = &state.active_filter {
            filter.pattern()
        } else {
            ""
        };
        spans.push(Span::styled(pattern.to_string(), Theme::text_highlight()));

        if state.filter_editing {
            spans.push(Span::styled(
                "█",
                Theme::text_highlight().add_modifier(Modifier::SLOW_BLINK),
            ));
        }

        if let Some(err) = &state.filter_error {
            spans.push(Span::styled(" ", Theme::text()));
            spans.push(Span::styled(
                format!("⚠ {}", err),
                Style::default().fg(Theme::ERROR),
            ));
        }

        spans.push(Span::styled("  ", Theme::text()));
        spans.push(Span::styled(
            if state.filter_case_insensitive {
                "[i] case-insensitive"
            } else {
                "[i] case-sensitive"
            },
            Theme::text_dim(),
        ));
        spans.push(Span::styled(
            if state.filter_regex { "  [x] regex" } else { "  [x] text" },
            Theme::text_dim(),
        ));

        if state.filter_editing {
            spans.push(Span::styled("  [Enter] Apply  [Esc] Cancel", Theme::text_dim()));
        } else if state.active_filter.is_some() {
            spans.push(Span::styled("  [n] Clear  [/] Edit", Theme::text_dim()));
        }

        let border_style = if state.filter_editing {
            Theme::border_active()
        } else if state.filter_error.is_some() {
            Theme::border_error()
        } else {
            Theme::border()
        };

        let filter_bar = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border_style)
                .title(Span::styled(" Filter ", Theme::title())),
        );

        frame.render_widget(filter_bar, area);
    }

    fn render_logs(frame: &mut Frame, area: Rect, state: &mut ViewerState) {
        // Border takes a row top and bottom
        state.viewport_height = area.height.saturating_sub(2) as usize;
        state.clamp_scroll();

        let scroll = state.scroll;
        let height = state.viewport_height;
        let max_scroll = state.max_scroll();
        // Borders and scrollbar
        let inner_width = area.width.saturating_sub(4) as usize;

        let total = state.visible_entries().len();
        let state: &ViewerState = state;
        let lines: Vec<Line> = state
            .filter_cache
            .cached_entries
            .iter()
            .skip(scroll)
            .flat_map(|entry| {
                let mut rows = vec![Self::format_line(entry, state, inner_width)];
                if state.show_data {
                    rows.extend(Self::detail_rows(entry, inner_width));
                }
                rows
            })
            .take(height)
            .collect();

        let title = if state.active_filter.is_some() {
            format!(" Logs ({} matching) ", total)
        } else {
            format!(" Logs ({}) ", total)
        };

        let logs_widget = Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Theme::border())
                .title(Span::styled(title, Theme::title())),
        );

        frame.render_widget(logs_widget, area);

        if max_scroll > 0 {
            let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .begin_symbol(Some("▲"))
                .end_symbol(Some("▼"));

            let mut scrollbar_state = ScrollbarState::default()
                .content_length(max_scroll)
                .position(scroll.min(max_scroll));

            frame.render_stateful_widget(
                scrollbar,
                area.inner(Margin {
                    vertical: 1,
                    horizontal: 0,
                }),
                &mut scrollbar_state,
            );
        }
    }

    /// One display line: time, level badge and message
    fn format_line(entry: &LogEntry, state: &ViewerState, available_width: usize) -> Line<'static> {
        let mut spans = vec![
            Span::styled(
                entry
                    .timestamp
                    .with_timezone(&Local)
                    .format("%H:%M:%S%.3f")
                    .to_string(),
                Theme::text_dim(),
            ),
            Span::styled(format!(" {:<5}", entry.level.label()), Theme::level(entry.level)),
            Span::styled(" │ ", Theme::text_dim()),
        ];

        let message_width = available_width.saturating_sub(PREFIX_WIDTH);
        let message = truncate_to_width(&entry.message, message_width).into_owned();
        let base_style = Theme::level_text(entry.level);

        match &state.active_filter {
            Some(filter) => {
                let mut last_end = 0;
                for (start, end) in filter.find_matches(&message) {
                    if start > last_end {
                        spans.push(Span::styled(message[last_end..start].to_string(), base_style));
                    }
                    spans.push(Span::styled(
                        message[start..end].to_string(),
                        Theme::match_highlight(),
                    ));
                    last_end = end;
                }
                if last_end < message.len() {
                    spans.push(Span::styled(message[last_end..].to_string(), base_style));
                }
            }
            None => spans.push(Span::styled(message, base_style)),
        }

        Line::from(spans)
    }

    /// Pretty data payload and trace, indented under the message
    fn detail_rows(entry: &LogEntry, available_width: usize) -> Vec<Line<'static>> {
        let indent = " ".repeat(PREFIX_WIDTH);
        let width = available_width.saturating_sub(PREFIX_WIDTH);
        let row = |text: &str, style| {
            Line::from(vec![
                Span::raw(indent.clone()),
                Span::styled(truncate_to_width(text, width).into_owned(), style),
            ])
        };

        let mut rows: Vec<Line> = data_lines(entry)
            .iter()
            .map(|text| row(text, Theme::data()))
            .collect();
        if let Some(trace) = &entry.trace {
            rows.extend(trace.lines().map(|text| row(text, Theme::text_dim())));
        }
        rows
    }

    fn render_status_bar(frame: &mut Frame, area: Rect, state: &ViewerState, store: &LogStore) {
        let counts = store.level_counts();
        let right = format!(
            "E:{} W:{} I:{} D:{} | {} logs {}",
            counts.error,
            counts.warn,
            counts.info,
            counts.debug,
            counts.total(),
            if state.follow { "▼" } else { " " }
        );

        let bar = StatusBar::new()
            .hints(viewer_hints())
            .message(state.status_message.as_deref())
            .right(right);

        frame.render_widget(bar, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Action;
    use ratatui::{Terminal, backend::TestBackend};
    use serde_json::json;

    fn screen_rows(state: &mut ViewerState, store: &LogStore) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();
        terminal
            .draw(|frame| LogViewerScreen::render(frame, state, store))
            .unwrap();
        let buffer = terminal.backend().buffer();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|c| c.symbol()).collect())
            .collect()
    }

    fn screen_text(state: &mut ViewerState, store: &LogStore) -> String {
        screen_rows(state, store).concat()
    }

    /// Entry without a trace, whatever the backtrace environment
    fn entry(level: LogLevel, message: &str, data: serde_json::Value) -> LogEntry {
        LogEntry::new(level, message, diaglog_types::into_log_data(data))
    }

    #[test]
    fn test_truncate_to_width() {
        assert_eq!(truncate_to_width("short", 10), "short");
        assert_eq!(truncate_to_width("abcdefghij", 8), "abcde...");
        // Wide characters count two columns
        assert_eq!(truncate_to_width("日本語テキスト", 9), "日本語...");
        assert_eq!(truncate_to_width("abcdef", 2), "..");
    }

    #[test]
    fn test_renders_entries_and_counts() {
        let store = LogStore::in_memory(50);
        store.append(entry(LogLevel::Info, "service ready", json!(null)));
        store.append(entry(LogLevel::Error, "save failed", json!({"code": 507})));
        let mut state = ViewerState::new(std::env::temp_dir());
        state.refresh(&store);

        let text = screen_text(&mut state, &store);
        assert!(text.contains("service ready"));
        assert!(text.contains("save failed"));
        assert!(text.contains(r#""code": 507"#));
        assert!(text.contains("Logs (2)"));
        assert!(text.contains("2/50 entries"));
        assert_eq!(state.viewport_height, 14);
    }

    #[test]
    fn test_data_rows_under_entry() {
        let store = LogStore::in_memory(50);
        let data = json!({"request": {"id": 7}});
        store.append(entry(LogLevel::Warn, "slow request", data));
        store.append(entry(LogLevel::Info, "after", json!(null)));
        let mut state = ViewerState::new(std::env::temp_dir());
        state.refresh(&store);

        let rows = screen_rows(&mut state, &store);
        let find = |needle: &str| rows.iter().position(|r| r.contains(needle)).unwrap();
        let header = find("slow request");
        let nested = find(r#""id": 7"#);

        assert!(!rows[nested].contains("slow request"));
        assert_eq!(find(r#""request": {"#), header + 2);
        assert_eq!(nested, header + 3);
        // "{", "request", "id", "}", "}" then the next entry
        assert_eq!(find("after"), header + 6);

        state.handle(Action::ToggleData, &store);
        let text = screen_text(&mut state, &store);
        assert!(!text.contains(r#""id""#));
        assert!(text.contains("slow request"));
    }

    #[test]
    fn test_follow_keeps_last_entry_visible_with_data() {
        let store = LogStore::in_memory(50);
        let big: serde_json::Map<_, _> = (0..8).map(|i| (format!("k{}", i), json!(i))).collect();
        for i in 0..3 {
            let data = serde_json::Value::Object(big.clone());
            store.append(entry(LogLevel::Info, &format!("entry {}", i), data));
        }
        let mut state = ViewerState::new(std::env::temp_dir());
        state.refresh(&store);

        let text = screen_text(&mut state, &store);
        assert!(text.contains("entry 2"));
        assert!(text.contains(r#""k7": 7"#));
        assert!(!text.contains("entry 0"));
        assert_eq!(state.scroll, 2);
    }

    #[test]
    fn test_hides_data_and_shows_filter_bar() {
        let store = LogStore::in_memory(50);
        store.info_with("alpha", json!({"k": "v"}));
        store.info("beta");
        let mut state = ViewerState::new(std::env::temp_dir());
        state.refresh(&store);

        state.handle(Action::ToggleData, &store);
        state.handle(Action::OpenFilter, &store);
        state.handle(Action::FilterInput('b'), &store);
        state.handle(Action::ApplyFilter, &store);

        let text = screen_text(&mut state, &store);
        assert!(text.contains("Filter: b"));
        assert!(text.contains("Logs (1 matching)"));
        assert!(!text.contains("alpha"));
        assert!(!text.contains(r#""k""#));
    }

    #[test]
    fn test_help_overlay_and_status_message() {
        let store = LogStore::in_memory(10);
        let mut state = ViewerState::new(std::env::temp_dir());
        state.status_message = Some("Exported 0 logs".to_string());
        assert!(screen_text(&mut state, &store).contains("Exported 0 logs"));

        state.handle(Action::ToggleHelp, &store);
        assert!(screen_text(&mut state, &store).contains("Keybindings"));
    }
}
