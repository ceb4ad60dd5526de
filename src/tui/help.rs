//! Help popup overlay: keyboard shortcuts organized by category.

use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

const POPUP_WIDTH: u16 = 76;
const POPUP_HEIGHT: u16 = 24;

struct Shortcut {
    key: &'static str,
    desc: &'static str,
}

struct Category {
    title: &'static str,
    shortcuts: &'static [Shortcut],
}

const NAVIGATION: Category = Category {
    title: "NAVIGATION",
    shortcuts: &[
        Shortcut {
            key: "Up/Down",
            desc: "Move within pane",
        },
        Shortcut {
            key: "Tab",
            desc: "Cycle focus forward",
        },
        Shortcut {
            key: "Shift+Tab",
            desc: "Cycle focus backward",
        },
        Shortcut {
            key: "Home/End",
            desc: "Oldest/newest message",
        },
        Shortcut {
            key: "Esc",
            desc: "Back / close popup",
        },
    ],
};

const SIDEBAR: Category = Category {
    title: "SIDEBAR",
    shortcuts: &[
        Shortcut {
            key: "Enter",
            desc: "Open chat / message friend",
        },
        Shortcut {
            key: "a",
            desc: "Accept friend request",
        },
        Shortcut {
            key: "d",
            desc: "Decline friend request",
        },
    ],
};

const MESSAGES: Category = Category {
    title: "MESSAGES",
    shortcuts: &[
        Shortcut {
            key: "r",
            desc: "React to message",
        },
        Shortcut {
            key: "p",
            desc: "Pin / unpin message",
        },
        Shortcut {
            key: "e",
            desc: "Edit your message",
        },
        Shortcut {
            key: "f",
            desc: "Forward message",
        },
        Shortcut {
            key: "Enter",
            desc: "Jump to compose",
        },
    ],
};

const COMPOSE: Category = Category {
    title: "COMPOSE",
    shortcuts: &[
        Shortcut {
            key: "Enter",
            desc: "Send message",
        },
        Shortcut {
            key: "Alt+Enter",
            desc: "Insert newline",
        },
        Shortcut {
            key: "Ctrl+U",
            desc: "Clear input",
        },
        Shortcut {
            key: "Esc",
            desc: "Cancel edit / leave compose",
        },
    ],
};

const MISC: Category = Category {
    title: "MISC",
    shortcuts: &[
        Shortcut {
            key: "F3",
            desc: "Cycle presence",
        },
        Shortcut {
            key: "F12",
            desc: "Toggle log overlay",
        },
        Shortcut {
            key: "?",
            desc: "Toggle this help",
        },
        Shortcut {
            key: "q",
            desc: "Quit",
        },
    ],
};

/// Render the help popup centered on screen.
pub fn render_help_popup(frame: &mut Frame) {
    let area = frame.area();

    let popup_w = POPUP_WIDTH.min(area.width.saturating_sub(2));
    let popup_h = POPUP_HEIGHT.min(area.height.saturating_sub(2));
    let popup_area = centered_rect(popup_w, popup_h, area);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(vec![
            Span::styled(
                " HELP ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled("(? to close) ", Style::default().fg(Color::Gray)),
        ]))
        .title_bottom(Line::from(Span::styled(
            " Press any key to close ",
            Style::default().fg(Color::Gray),
        )));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    let [left_col, right_col] =
        Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(inner);

    let left = Paragraph::new(build_column_lines(&[&NAVIGATION, &SIDEBAR]));
    frame.render_widget(left, inset(left_col, 1, 1));

    let right = Paragraph::new(build_column_lines(&[&MESSAGES, &COMPOSE, &MISC]));
    frame.render_widget(right, inset(right_col, 1, 1));
}

fn build_column_lines<'a>(categories: &[&Category]) -> Vec<Line<'a>> {
    let mut lines: Vec<Line<'a>> = Vec::new();

    for (cat_idx, cat) in categories.iter().enumerate() {
        if cat_idx > 0 {
            lines.push(Line::from(""));
        }

        lines.push(Line::from(Span::styled(
            cat.title,
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled(
            "\u{2500}".repeat(32),
            Style::default().fg(Color::DarkGray),
        )));

        for sc in cat.shortcuts.iter() {
            lines.push(Line::from(vec![
                Span::styled(format!("{:<12}", sc.key), Style::default().fg(Color::Yellow)),
                Span::styled(sc.desc, Style::default().fg(Color::Gray)),
            ]));
        }
    }

    lines
}

fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(x, y, width, height)
}

fn inset(area: Rect, h: u16, v: u16) -> Rect {
    Rect::new(
        area.x + h,
        area.y + v,
        area.width.saturating_sub(h * 2),
        area.height.saturating_sub(v * 2),
    )
}
