//! Top-level frame layout and chrome

use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Clear, Paragraph, Widget},
    Frame,
};

use crate::models::UserStatus;

use super::app::{App, Pane, View};
use super::auth_view;
use super::compose;
use super::debug_log;
use super::help;
use super::messages;
use super::picker;
use super::sidebar;

/// Sidebar width in columns.
const SIDEBAR_WIDTH: u16 = 24;

/// Presence symbol and color for the chrome.
fn status_indicator(status: UserStatus) -> (&'static str, Color) {
    match status {
        UserStatus::Online => ("*", Color::Green),
        UserStatus::Away => ("~", Color::Yellow),
        UserStatus::Offline => ("o", Color::DarkGray),
    }
}

/// Main render function.
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let [header_area, main_area, status_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Fill(1),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(header_area, frame.buffer_mut(), app);

    match app.view {
        View::Loading => render_loading(main_area, frame.buffer_mut()),
        View::Auth => auth_view::render(frame, main_area, &app.auth),
        View::Main => render_main(main_area, frame, app),
    }

    render_status(status_area, frame.buffer_mut(), app);

    // Overlays, bottom to top.
    if let Some(ref picker) = app.picker {
        picker::render(frame, picker);
    }
    if app.debug_log.visible {
        let log_area = bottom_half(main_area);
        Clear.render(log_area, frame.buffer_mut());
        debug_log::render(log_area, frame.buffer_mut(), &app.debug_log);
    }
    if app.show_help {
        help::render_help_popup(frame);
    }
}

fn render_main(area: Rect, frame: &mut Frame, app: &App) {
    let [sidebar_area, content_area] =
        Layout::horizontal([Constraint::Length(SIDEBAR_WIDTH), Constraint::Fill(1)]).areas(area);

    sidebar::render(
        sidebar_area,
        frame.buffer_mut(),
        &app.sidebar,
        app.active_pane == Pane::Sidebar,
    );

    let [messages_area, compose_area] = Layout::vertical([
        Constraint::Fill(1),
        Constraint::Length(compose::COMPOSE_HEIGHT),
    ])
    .areas(content_area);

    messages::render(
        messages_area,
        frame.buffer_mut(),
        &app.messages,
        app.active_pane == Pane::Messages,
    );

    compose::render(
        compose_area,
        frame,
        &app.compose,
        &app.messages.header,
        app.active_pane == Pane::Compose,
    );
}

fn render_loading(area: Rect, buf: &mut Buffer) {
    if area.height == 0 {
        return;
    }
    let y = area.y + area.height / 2;
    let line_area = Rect::new(area.x, y, area.width, 1);
    let line = Line::from(Span::styled(
        " Opening store...",
        Style::default().fg(Color::DarkGray),
    ));
    Paragraph::new(line).render(line_area, buf);
}

/// Bottom half of an area, for the log overlay.
fn bottom_half(area: Rect) -> Rect {
    let height = (area.height / 2).max(3).min(area.height);
    Rect::new(
        area.x,
        area.y + area.height.saturating_sub(height),
        area.width,
        height,
    )
}

/// Render the header bar.
fn render_header(area: Rect, buf: &mut Buffer, app: &App) {
    let title = Span::styled(
        " palaver",
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    );

    let Some(ref user) = app.user else {
        Paragraph::new(Line::from(title))
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    };

    let help_indicator = Span::styled(" [?] Help ", Style::default().fg(Color::Gray));

    let (status_symbol, status_color) = status_indicator(user.status);
    let presence = Span::styled(
        format!(" {} {} ", status_symbol, user.status.as_str()),
        Style::default().fg(status_color),
    );

    let user_name = Span::styled(format!(" {} ", user.name), Style::default().fg(Color::Cyan));

    // Right-align the right-side elements.
    let left_width = " palaver".len();
    let right_width = format!(
        " [?] Help  {} {}  {} ",
        status_symbol,
        user.status.as_str(),
        user.name
    )
    .chars()
    .count();
    let padding_width = (area.width as usize).saturating_sub(left_width + right_width);
    let padding = Span::raw(" ".repeat(padding_width));

    let header_line = Line::from(vec![title, padding, help_indicator, presence, user_name]);

    Paragraph::new(header_line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

/// Render the status bar.
fn render_status(area: Rect, buf: &mut Buffer, app: &App) {
    // A toast takes over the whole bar until it expires.
    if let Some(ref toast) = app.toast {
        let style = if toast.is_error {
            Style::default().fg(Color::Red).bg(Color::DarkGray)
        } else {
            Style::default().fg(Color::Green).bg(Color::DarkGray)
        };
        let line = Line::from(Span::styled(format!(" {} ", toast.text), style));
        Paragraph::new(line)
            .style(Style::default().bg(Color::DarkGray))
            .render(area, buf);
        return;
    }

    if app.view != View::Main {
        let hint = match app.view {
            View::Auth => " Enter submit | Tab next field | F2 switch mode | Esc quit",
            _ => " Please wait...",
        };
        Paragraph::new(Line::from(Span::styled(
            hint,
            Style::default().fg(Color::Gray),
        )))
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
        return;
    }

    let sep_style = Style::default().fg(Color::DarkGray);

    let presence = match app.user {
        Some(ref user) => {
            let (symbol, color) = status_indicator(user.status);
            Span::styled(
                format!(" {} {} ", symbol, user.status.as_str()),
                Style::default().fg(color),
            )
        }
        None => Span::raw(" "),
    };

    let chat_display = if app.messages.chat_id.is_some() {
        app.messages.header.clone()
    } else {
        "(no chat)".to_string()
    };
    let chat = Span::styled(chat_display, Style::default().fg(Color::Yellow));

    let pane = Span::styled(
        format!("Tab: {} ", app.active_pane.as_str()),
        Style::default().fg(Color::Cyan),
    );

    let help_hint = Span::styled("?: help", Style::default().fg(Color::Gray));
    let log_hint = Span::styled("F12: log", Style::default().fg(Color::Gray));

    let status_line = Line::from(vec![
        presence,
        Span::styled(" | ", sep_style),
        chat,
        Span::styled(" | ", sep_style),
        pane,
        Span::styled(" | ", sep_style),
        help_hint,
        Span::styled(" | ", sep_style),
        log_hint,
    ]);

    Paragraph::new(status_line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}
