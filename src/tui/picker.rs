//! Picker overlay: a centered list the user chooses one entry from.
//!
//! Used for the reaction set and for forward targets. The overlay is
//! modal; keys go to it until a choice is made or it is dismissed.

use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

/// Reaction labels offered by the picker. ASCII stand-ins so every
/// terminal renders them.
pub const REACTIONS: [&str; 6] = ["+1", "<3", "haha", "wow", "sad", "eyes"];

const POPUP_WIDTH: u16 = 44;
const MAX_VISIBLE_ITEMS: usize = 10;

/// What the chosen entry will be applied to.
pub enum PickerAction {
    React { message_id: String },
    Forward { message_id: String },
}

/// One selectable row.
pub struct PickerItem {
    /// Value handed back to the app (emoji label or chat id).
    pub id: String,
    pub label: String,
    /// Dim context text after the label, may be empty.
    pub hint: String,
}

/// State for an open picker.
pub struct PickerState {
    pub title: String,
    pub action: PickerAction,
    pub items: Vec<PickerItem>,
    pub selected: usize,
}

impl PickerState {
    pub fn new(title: impl Into<String>, action: PickerAction, items: Vec<PickerItem>) -> Self {
        Self {
            title: title.into(),
            action,
            items,
            selected: 0,
        }
    }

    /// Reaction picker for a message.
    pub fn reactions(message_id: &str) -> Self {
        let items = REACTIONS
            .iter()
            .map(|label| PickerItem {
                id: label.to_string(),
                label: label.to_string(),
                hint: String::new(),
            })
            .collect();
        Self::new(
            " React ",
            PickerAction::React {
                message_id: message_id.to_string(),
            },
            items,
        )
    }

    pub fn select_previous(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.items.len() {
            self.selected += 1;
        }
    }

    pub fn selected_item(&self) -> Option<&PickerItem> {
        self.items.get(self.selected)
    }
}

/// Render the picker centered on the screen.
pub fn render(frame: &mut Frame, state: &PickerState) {
    let area = frame.area();

    let rows = state.items.len().clamp(1, MAX_VISIBLE_ITEMS) as u16;
    let width = POPUP_WIDTH.min(area.width.saturating_sub(2));
    let height = (rows + 2).min(area.height.saturating_sub(2));
    let popup = centered_rect(width, height, area);

    frame.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Span::styled(
            state.title.clone(),
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ))
        .title_bottom(Line::from(Span::styled(
            " Enter choose, Esc close ",
            Style::default().fg(Color::Gray),
        )));

    let inner = block.inner(popup);
    frame.render_widget(block, popup);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    if state.items.is_empty() {
        let line = Line::from(Span::styled(
            " Nothing to choose from",
            Style::default().fg(Color::DarkGray),
        ));
        frame.render_widget(Paragraph::new(line), inner);
        return;
    }

    let visible = inner.height as usize;
    let scroll = if state.selected < visible {
        0
    } else {
        state.selected - visible + 1
    };

    for (row, idx) in (scroll..state.items.len()).take(visible).enumerate() {
        let item = &state.items[idx];
        let selected = idx == state.selected;

        let bg = if selected { Color::DarkGray } else { Color::Reset };
        let marker = if selected { ">" } else { " " };
        let label_style = if selected {
            Style::default()
                .fg(Color::White)
                .bg(bg)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::White)
        };

        let mut spans = vec![
            Span::styled(format!(" {} ", marker), label_style),
            Span::styled(item.label.clone(), label_style),
        ];
        if !item.hint.is_empty() {
            spans.push(Span::styled(
                format!("  {}", item.hint),
                Style::default().fg(Color::DarkGray).bg(bg),
            ));
        }
        // Pad the row so the selection background spans the full width.
        let used: usize = 3 + item.label.chars().count()
            + if item.hint.is_empty() {
                0
            } else {
                2 + item.hint.chars().count()
            };
        let pad = (inner.width as usize).saturating_sub(used);
        spans.push(Span::styled(" ".repeat(pad), Style::default().bg(bg)));

        let row_area = Rect::new(inner.x, inner.y + row as u16, inner.width, 1);
        frame.render_widget(Paragraph::new(Line::from(spans)), row_area);
    }
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reaction_picker_lists_full_set() {
        let picker = PickerState::reactions("m1");
        assert_eq!(picker.items.len(), REACTIONS.len());
        assert_eq!(picker.selected_item().unwrap().id, "+1");
    }

    #[test]
    fn test_selection_clamps_at_ends() {
        let mut picker = PickerState::reactions("m1");
        picker.select_previous();
        assert_eq!(picker.selected, 0);

        for _ in 0..20 {
            picker.select_next();
        }
        assert_eq!(picker.selected, REACTIONS.len() - 1);
    }
}
