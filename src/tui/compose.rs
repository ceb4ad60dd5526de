//! Compose box: the message input at the bottom of the chat view.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
    Frame,
};

use crate::sync::TYPING_REFRESH_MS;
use crate::util::now_ms;

/// State for the compose box.
#[derive(Default)]
pub struct ComposeState {
    /// Current input text.
    pub input: String,
    /// Cursor position (character offset into `input`).
    pub cursor_pos: usize,
    /// Id of the message being edited, if the box is in edit mode.
    pub editing: Option<String>,
    /// When the typing indicator was last refreshed.
    last_typing_ms: i64,
}

impl ComposeState {
    /// Insert a character at the current cursor position.
    pub fn insert_char(&mut self, c: char) {
        let byte_pos = self.char_to_byte(self.cursor_pos);
        self.input.insert(byte_pos, c);
        self.cursor_pos += 1;
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor_pos > 0 {
            let byte_pos = self.char_to_byte(self.cursor_pos);
            let prev_byte_pos = self.char_to_byte(self.cursor_pos - 1);
            self.input.drain(prev_byte_pos..byte_pos);
            self.cursor_pos -= 1;
        }
    }

    /// Delete the character at the cursor.
    pub fn delete(&mut self) {
        let char_count = self.input.chars().count();
        if self.cursor_pos < char_count {
            let byte_pos = self.char_to_byte(self.cursor_pos);
            let next_byte_pos = self.char_to_byte(self.cursor_pos + 1);
            self.input.drain(byte_pos..next_byte_pos);
        }
    }

    pub fn move_left(&mut self) {
        if self.cursor_pos > 0 {
            self.cursor_pos -= 1;
        }
    }

    pub fn move_right(&mut self) {
        let char_count = self.input.chars().count();
        if self.cursor_pos < char_count {
            self.cursor_pos += 1;
        }
    }

    pub fn move_home(&mut self) {
        self.cursor_pos = 0;
    }

    pub fn move_end(&mut self) {
        self.cursor_pos = self.input.chars().count();
    }

    /// Clear the input text, keeping edit mode if active.
    pub fn clear(&mut self) {
        self.input.clear();
        self.cursor_pos = 0;
    }

    /// Load a message into the box for editing.
    pub fn begin_edit(&mut self, message_id: &str, content: &str) {
        self.editing = Some(message_id.to_string());
        self.input = content.to_string();
        self.cursor_pos = self.input.chars().count();
    }

    /// Leave edit mode and empty the box.
    pub fn cancel_edit(&mut self) {
        self.editing = None;
        self.clear();
    }

    /// Take the trimmed text and reset the box. Returns the edited
    /// message id (when in edit mode) and the text; None when there is
    /// nothing to send.
    pub fn take(&mut self) -> Option<(Option<String>, String)> {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return None;
        }
        self.clear();
        Some((self.editing.take(), text))
    }

    /// True when the typing indicator is due for a refresh. Called on
    /// every inserted character; throttles to [`TYPING_REFRESH_MS`].
    pub fn typing_refresh_due(&mut self) -> bool {
        let now = now_ms();
        if now - self.last_typing_ms >= TYPING_REFRESH_MS {
            self.last_typing_ms = now;
            true
        } else {
            false
        }
    }

    /// Forget the throttle, so the next keystroke refreshes immediately.
    pub fn reset_typing(&mut self) {
        self.last_typing_ms = 0;
    }

    /// Convert a char-based cursor position to a byte offset.
    fn char_to_byte(&self, char_pos: usize) -> usize {
        self.input
            .char_indices()
            .nth(char_pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Height of the compose box: border + hint line + input line + border.
pub const COMPOSE_HEIGHT: u16 = 4;

/// Render the compose box into the given area.
///
/// Uses `Frame` directly so we can both write to the buffer and set the
/// cursor.
pub fn render(area: Rect, frame: &mut Frame, state: &ComposeState, chat_name: &str, focused: bool) {
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let border_type = if focused {
        BorderType::Double
    } else {
        BorderType::Plain
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(border_type)
        .border_style(border_style);

    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let hint_area = Rect::new(inner.x, inner.y, inner.width, 1);
    render_hint(hint_area, frame.buffer_mut(), state, focused);

    if inner.height >= 2 {
        let input_area = Rect::new(inner.x, inner.y + 1, inner.width, 1);

        // Cursor position is computed before rendering borrows the buffer.
        let cursor = compute_cursor_position(input_area, state, focused);

        render_input(input_area, frame.buffer_mut(), state, chat_name);

        if let Some((cx, cy)) = cursor {
            frame.set_cursor_position((cx, cy));
        }
    }
}

fn compute_cursor_position(
    input_area: Rect,
    state: &ComposeState,
    focused: bool,
) -> Option<(u16, u16)> {
    if !focused {
        return None;
    }

    if state.input.is_empty() {
        Some((input_area.x + 1, input_area.y))
    } else {
        let w = input_area.width as usize;
        let display = compose_display_text(&state.input, state.cursor_pos, w);
        Some((input_area.x + 1 + display.cursor_offset as u16, input_area.y))
    }
}

/// The line above the input: edit banner or key hints.
fn render_hint(area: Rect, buf: &mut Buffer, state: &ComposeState, focused: bool) {
    let line = if state.editing.is_some() {
        Line::from(Span::styled(
            " Editing message (Esc cancels)",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ))
    } else {
        let style = if focused {
            Style::default().fg(Color::Gray)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        Line::from(Span::styled(" Enter send | Alt+Enter newline", style))
    };
    Paragraph::new(line).render(area, buf);
}

/// The input line itself: placeholder or typed text.
fn render_input(area: Rect, buf: &mut Buffer, state: &ComposeState, chat_name: &str) {
    let w = area.width as usize;

    if state.input.is_empty() {
        let placeholder = format!(" Message {}...", chat_name);
        let truncated: String = placeholder.chars().take(w).collect();
        let line = Line::from(Span::styled(
            truncated,
            Style::default().fg(Color::DarkGray),
        ));
        Paragraph::new(line).render(area, buf);
    } else {
        let display = compose_display_text(&state.input, state.cursor_pos, w);
        let line = Line::from(Span::styled(
            format!(" {}", display.visible),
            Style::default().fg(Color::White),
        ));
        Paragraph::new(line).render(area, buf);
    }
}

struct DisplayText {
    visible: String,
    cursor_offset: usize,
}

/// Flatten the input to one display line (newlines show as " | ") and
/// scroll horizontally to keep the cursor visible.
fn compose_display_text(input: &str, cursor_pos: usize, width: usize) -> DisplayText {
    let flat: String = input.replace('\n', " | ");

    // Cursor offset in the flattened string; a newline expands to 3 cells.
    let mut flat_cursor: usize = 0;
    for (char_idx, ch) in input.chars().enumerate() {
        if char_idx == cursor_pos {
            break;
        }
        flat_cursor += if ch == '\n' { 3 } else { 1 };
    }

    let avail = width.saturating_sub(1);
    if avail == 0 {
        return DisplayText {
            visible: String::new(),
            cursor_offset: 0,
        };
    }

    let flat_chars: Vec<char> = flat.chars().collect();
    if flat_chars.len() <= avail {
        DisplayText {
            visible: flat,
            cursor_offset: flat_cursor,
        }
    } else {
        let scroll_start = if flat_cursor < avail {
            0
        } else {
            flat_cursor - avail + 1
        };
        let end = (scroll_start + avail).min(flat_chars.len());
        DisplayText {
            visible: flat_chars[scroll_start..end].iter().collect(),
            cursor_offset: flat_cursor - scroll_start,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_trims_and_resets() {
        let mut state = ComposeState::default();
        for c in "  hi there  ".chars() {
            state.insert_char(c);
        }

        let (editing, text) = state.take().unwrap();
        assert_eq!(editing, None);
        assert_eq!(text, "hi there");
        assert!(state.input.is_empty());

        // Whitespace-only input sends nothing.
        state.insert_char(' ');
        assert!(state.take().is_none());
    }

    #[test]
    fn test_edit_mode_roundtrip() {
        let mut state = ComposeState::default();
        state.begin_edit("m1", "old text");
        assert_eq!(state.cursor_pos, 8);

        state.insert_char('!');
        let (editing, text) = state.take().unwrap();
        assert_eq!(editing.as_deref(), Some("m1"));
        assert_eq!(text, "old text!");
        assert!(state.editing.is_none());
    }

    #[test]
    fn test_cancel_edit_clears_box() {
        let mut state = ComposeState::default();
        state.begin_edit("m1", "old text");
        state.cancel_edit();
        assert!(state.editing.is_none());
        assert!(state.input.is_empty());
    }

    #[test]
    fn test_typing_refresh_throttles() {
        let mut state = ComposeState::default();
        assert!(state.typing_refresh_due());
        assert!(!state.typing_refresh_due());

        state.reset_typing();
        assert!(state.typing_refresh_due());
    }

    #[test]
    fn test_multibyte_cursor_editing() {
        let mut state = ComposeState::default();
        for c in "héllo".chars() {
            state.insert_char(c);
        }
        state.move_left();
        state.move_left();
        state.backspace();
        assert_eq!(state.input, "hélo");

        state.move_home();
        state.delete();
        assert_eq!(state.input, "élo");
    }
}
