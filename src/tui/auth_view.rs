//! Sign-in and registration form, shown when the profile has no session.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

const FORM_WIDTH: u16 = 56;
const LABEL_WIDTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Register,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthField {
    Name,
    Email,
    Password,
}

/// Form state. Editing is append and backspace only; that is plenty for
/// three short fields.
pub struct AuthState {
    pub mode: AuthMode,
    pub focus: AuthField,
    pub name: String,
    pub email: String,
    pub password: String,
    pub error: Option<String>,
    /// Submitted and waiting on the backend.
    pub busy: bool,
}

impl Default for AuthState {
    fn default() -> Self {
        Self {
            mode: AuthMode::Login,
            focus: AuthField::Email,
            name: String::new(),
            email: String::new(),
            password: String::new(),
            error: None,
            busy: false,
        }
    }
}

impl AuthState {
    fn fields(&self) -> &'static [AuthField] {
        match self.mode {
            AuthMode::Login => &[AuthField::Email, AuthField::Password],
            AuthMode::Register => &[AuthField::Name, AuthField::Email, AuthField::Password],
        }
    }

    /// Switch between sign-in and registration, keeping typed values.
    pub fn toggle_mode(&mut self) {
        self.mode = match self.mode {
            AuthMode::Login => AuthMode::Register,
            AuthMode::Register => AuthMode::Login,
        };
        self.focus = self.fields()[0];
        self.error = None;
    }

    pub fn focus_next(&mut self) {
        let fields = self.fields();
        let pos = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = fields[(pos + 1) % fields.len()];
    }

    pub fn focus_previous(&mut self) {
        let fields = self.fields();
        let pos = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        self.focus = fields[(pos + fields.len() - 1) % fields.len()];
    }

    fn field_mut(&mut self) -> &mut String {
        match self.focus {
            AuthField::Name => &mut self.name,
            AuthField::Email => &mut self.email,
            AuthField::Password => &mut self.password,
        }
    }

    pub fn insert_char(&mut self, c: char) {
        if !c.is_control() {
            self.field_mut().push(c);
            self.error = None;
        }
    }

    pub fn backspace(&mut self) {
        self.field_mut().pop();
    }
}

/// Render the form centered in `area`.
pub fn render(frame: &mut Frame, area: Rect, state: &AuthState) {
    let field_rows = state.fields().len() as u16;
    let height = (field_rows + 6).min(area.height);
    let width = FORM_WIDTH.min(area.width.saturating_sub(2));

    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    let form_area = Rect::new(x, y, width, height);

    let title = match state.mode {
        AuthMode::Login => " Sign in ",
        AuthMode::Register => " Create account ",
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            title,
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ));

    let inner = block.inner(form_area);
    frame.render_widget(block, form_area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let mut cursor: Option<(u16, u16)> = None;

    for (row, field) in state.fields().iter().enumerate() {
        let row_y = inner.y + 1 + row as u16;
        if row_y >= inner.y + inner.height {
            break;
        }

        let (label, value) = match field {
            AuthField::Name => ("Name", state.name.clone()),
            AuthField::Email => ("Email", state.email.clone()),
            AuthField::Password => ("Password", "*".repeat(state.password.chars().count())),
        };
        let focused = *field == state.focus;

        let label_style = if focused {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };

        // Keep the tail visible; the caret sits at the end of the value.
        let avail = (inner.width as usize).saturating_sub(LABEL_WIDTH + 2);
        let shown: String = value
            .chars()
            .rev()
            .take(avail)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        let line = Line::from(vec![
            Span::styled(format!(" {:<width$}", label, width = LABEL_WIDTH), label_style),
            Span::styled(shown.clone(), Style::default().fg(Color::White)),
        ]);
        frame.render_widget(
            Paragraph::new(line),
            Rect::new(inner.x, row_y, inner.width, 1),
        );

        if focused && !state.busy {
            cursor = Some((inner.x + 1 + LABEL_WIDTH as u16 + shown.chars().count() as u16, row_y));
        }
    }

    // Status line: error, progress, or nothing.
    let msg_y = inner.y + 2 + field_rows;
    if msg_y < inner.y + inner.height {
        let msg_line = if let Some(err) = &state.error {
            Line::from(Span::styled(
                format!(" {}", err),
                Style::default().fg(Color::Red),
            ))
        } else if state.busy {
            Line::from(Span::styled(
                " Working...",
                Style::default().fg(Color::DarkGray),
            ))
        } else {
            Line::from("")
        };
        frame.render_widget(
            Paragraph::new(msg_line),
            Rect::new(inner.x, msg_y, inner.width, 1),
        );
    }

    // Key hints on the last inner row.
    let hint_y = inner.y + inner.height.saturating_sub(1);
    let other_mode = match state.mode {
        AuthMode::Login => "register",
        AuthMode::Register => "sign in",
    };
    let hint = Line::from(Span::styled(
        format!(" Enter submit | Tab next | F2 {} | Esc quit", other_mode),
        Style::default().fg(Color::DarkGray),
    ));
    frame.render_widget(
        Paragraph::new(hint),
        Rect::new(inner.x, hint_y, inner.width, 1),
    );

    if let Some((cx, cy)) = cursor {
        frame.set_cursor_position((cx, cy));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_focus_cycles_per_mode() {
        let mut state = AuthState::default();
        assert_eq!(state.focus, AuthField::Email);

        state.focus_next();
        assert_eq!(state.focus, AuthField::Password);
        state.focus_next();
        assert_eq!(state.focus, AuthField::Email);

        state.toggle_mode();
        assert_eq!(state.mode, AuthMode::Register);
        assert_eq!(state.focus, AuthField::Name);
        state.focus_previous();
        assert_eq!(state.focus, AuthField::Password);
    }

    #[test]
    fn test_typing_goes_to_focused_field() {
        let mut state = AuthState::default();
        state.insert_char('a');
        state.insert_char('@');
        state.insert_char('b');
        assert_eq!(state.email, "a@b");

        state.focus_next();
        state.insert_char('x');
        assert_eq!(state.password, "x");

        state.backspace();
        assert_eq!(state.password, "");
    }

    #[test]
    fn test_typing_clears_stale_error() {
        let mut state = AuthState::default();
        state.error = Some("Invalid email or password".to_string());
        state.insert_char('a');
        assert!(state.error.is_none());
    }
}
