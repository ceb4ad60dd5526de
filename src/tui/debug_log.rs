//! Log overlay showing captured tracing output inside the TUI.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use super::log_capture::LogBuffer;

/// State for the log overlay. The lines live in the shared [`LogBuffer`];
/// this only tracks visibility and scroll position.
pub struct DebugLogState {
    buffer: LogBuffer,
    pub visible: bool,
    /// 0 = pinned to the newest line; N = scrolled back N lines.
    scroll_offset: usize,
}

impl DebugLogState {
    pub fn new(buffer: LogBuffer) -> Self {
        Self {
            buffer,
            visible: false,
            scroll_offset: 0,
        }
    }

    /// Toggle the overlay, rejoining the tail when it opens.
    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        if self.visible {
            self.scroll_offset = 0;
        }
    }

    /// Scroll toward older lines, clamped to the buffered history.
    pub fn scroll_up(&mut self, n: usize) {
        let max_offset = self.buffer.len().saturating_sub(1);
        self.scroll_offset = self.scroll_offset.saturating_add(n).min(max_offset);
    }

    /// Scroll toward newer lines.
    pub fn scroll_down(&mut self, n: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(n);
    }
}

/// Render the log overlay into `area`.
pub fn render(area: Rect, buf: &mut Buffer, state: &DebugLogState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(Span::styled(
            " Log ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))
        .title_bottom(Line::from(Span::styled(
            " Up/Down scroll, F12 close ",
            Style::default().fg(Color::Gray),
        )));

    let inner = block.inner(area);
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let lines = state.buffer.snapshot();
    let visible = inner.height as usize;

    let end = lines.len().saturating_sub(state.scroll_offset);
    let start = end.saturating_sub(visible);

    let shown: Vec<Line> = lines[start..end].iter().map(|l| colorize(l)).collect();
    Paragraph::new(shown).render(inner, buf);
}

/// Color a formatted subscriber line by its level token.
fn colorize(line: &str) -> Line<'static> {
    let color = if line.contains(" ERROR ") {
        Color::Red
    } else if line.contains(" WARN ") {
        Color::Yellow
    } else if line.contains(" INFO ") {
        Color::Green
    } else if line.contains(" DEBUG ") || line.contains(" TRACE ") {
        Color::DarkGray
    } else {
        Color::White
    };
    Line::from(Span::styled(line.to_owned(), Style::default().fg(color)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_resets_scroll() {
        let buffer = LogBuffer::new();
        let mut state = DebugLogState::new(buffer);
        state.scroll_offset = 7;

        state.toggle();
        assert!(state.visible);
        assert_eq!(state.scroll_offset, 0);

        state.toggle();
        assert!(!state.visible);
    }

    #[test]
    fn test_scroll_clamps_to_history() {
        let buffer = LogBuffer::new();
        for i in 0..5 {
            buffer.push(format!("line {}", i));
        }
        let mut state = DebugLogState::new(buffer);

        state.scroll_up(100);
        assert_eq!(state.scroll_offset, 4);

        state.scroll_down(2);
        assert_eq!(state.scroll_offset, 2);

        state.scroll_down(50);
        assert_eq!(state.scroll_offset, 0);
    }
}
