use ratatui::layout::{Constraint, Direction, Layout as RatatuiLayout, Rect};

/// Areas of the log viewer screen, top to bottom
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewerAreas {
    pub header: Rect,
    pub stats: Option<Rect>,
    pub filter: Option<Rect>,
    pub logs: Rect,
    pub status: Rect,
}

/// Layout helper for consistent screen layouts
pub struct Layout;

impl Layout {
    /// Split the screen into header, optional stats and filter bars, logs and status bar
    pub fn viewer(area: Rect, show_stats: bool, show_filter: bool) -> ViewerAreas {
        let mut constraints = vec![Constraint::Length(3)]; // Header
        if show_stats {
            constraints.push(Constraint::Length(3));
        }
        if show_filter {
            constraints.push(Constraint::Length(3));
        }
        constraints.push(Constraint::Min(1)); // Logs
        constraints.push(Constraint::Length(1)); // Status bar

        let chunks = RatatuiLayout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        let mut idx = 1;
        let mut next = |show: bool| {
            if !show {
                return None;
            }
            idx += 1;
            Some(chunks[idx - 1])
        };
        let stats = next(show_stats);
        let filter = next(show_filter);

        ViewerAreas {
            header: chunks[0],
            stats,
            filter,
            logs: chunks[idx],
            status: chunks[idx + 1],
        }
    }

    /// Centered popup of at most `width` x `height`, keeping a 2 cell margin
    pub fn centered_popup(area: Rect, width: u16, height: u16) -> Rect {
        let popup_width = width.min(area.width.saturating_sub(4));
        let popup_height = height.min(area.height.saturating_sub(4));

        let x = area.x + (area.width.saturating_sub(popup_width)) / 2;
        let y = area.y + (area.height.saturating_sub(popup_height)) / 2;
        Rect::new(x, y, popup_width, popup_height)
    }
}
