//! Messages pane: the open chat's history with reactions, pins, and ticks.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::api::MessageInfo;
use crate::models::MessageStatus;
use crate::util::fmt_time;

/// State for the messages pane.
pub struct MessagesState {
    /// The chat currently shown, if any.
    pub chat_id: Option<String>,
    /// Pane header (the chat's display name).
    pub header: String,
    /// Messages in chronological order.
    pub messages: Vec<MessageInfo>,
    /// Index of the selected message.
    pub selected: usize,
    /// Manual scroll base; auto-scroll adjusts from here.
    pub scroll_offset: usize,
    /// Names currently typing in this chat.
    pub typing: Vec<String>,
    pub loading: bool,
}

impl Default for MessagesState {
    fn default() -> Self {
        Self {
            chat_id: None,
            header: String::new(),
            messages: Vec::new(),
            selected: 0,
            scroll_offset: 0,
            typing: Vec::new(),
            loading: false,
        }
    }
}

impl MessagesState {
    /// Switch the pane to a chat and wait for its rows.
    pub fn open_chat(&mut self, chat_id: &str, name: &str) {
        self.chat_id = Some(chat_id.to_string());
        self.header = name.to_string();
        self.messages.clear();
        self.typing.clear();
        self.selected = 0;
        self.scroll_offset = 0;
        self.loading = true;
    }

    /// Replace the rows. Responses for a chat that is no longer open are
    /// dropped. The cursor sticks to the newest message unless the user
    /// has scrolled up, in which case it stays on the same message id.
    pub fn update_messages(&mut self, chat_id: &str, messages: Vec<MessageInfo>) {
        if self.chat_id.as_deref() != Some(chat_id) {
            return;
        }
        let at_end = self.messages.is_empty() || self.selected + 1 >= self.messages.len();
        if at_end {
            self.selected = messages.len().saturating_sub(1);
        } else {
            let keep = self.messages.get(self.selected).map(|m| m.id.clone());
            self.selected = keep
                .and_then(|id| messages.iter().position(|m| m.id == id))
                .unwrap_or_else(|| messages.len().saturating_sub(1));
        }
        self.messages = messages;
        self.loading = false;
    }

    /// Update the typing roster if it belongs to the open chat.
    pub fn set_typing(&mut self, chat_id: &str, users: Vec<String>) {
        if self.chat_id.as_deref() == Some(chat_id) {
            self.typing = users;
        }
    }

    pub fn selected_message(&self) -> Option<&MessageInfo> {
        self.messages.get(self.selected)
    }

    pub fn select_previous(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
        }
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.messages.len() {
            self.selected += 1;
        }
    }

    pub fn select_first(&mut self) {
        self.selected = 0;
    }

    pub fn select_last(&mut self) {
        self.selected = self.messages.len().saturating_sub(1);
    }

    /// "Ada is typing..." line for the pane footer.
    pub fn typing_line(&self) -> Option<String> {
        match self.typing.as_slice() {
            [] => None,
            [one] => Some(format!("{} is typing...", one)),
            [a, b] => Some(format!("{} and {} are typing...", a, b)),
            many => Some(format!("{} people are typing...", many.len())),
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render the messages pane into the given area.
pub fn render(area: Rect, buf: &mut Buffer, state: &MessagesState, focused: bool) {
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
    block.render(area, buf);

    if inner.height == 0 || inner.width == 0 {
        return;
    }

    if state.chat_id.is_none() {
        render_hint(inner, buf, "Select a chat to start");
        return;
    }

    // First line is the chat header.
    let header_area = Rect::new(inner.x, inner.y, inner.width, 1);
    render_chat_header(header_area, buf, &state.header);

    let mut messages_area = Rect::new(
        inner.x,
        inner.y + 1,
        inner.width,
        inner.height.saturating_sub(1),
    );

    // The typing line owns the bottom row while anyone is typing.
    let typing = state.typing_line();
    if typing.is_some() {
        messages_area.height = messages_area.height.saturating_sub(1);
    }

    if messages_area.height > 0 {
        if state.loading {
            render_hint(messages_area, buf, "Loading...");
        } else if state.messages.is_empty() {
            render_hint(messages_area, buf, "(no messages yet)");
        } else {
            render_cards(messages_area, buf, state);
        }
    }

    if let Some(text) = typing {
        let y = inner.y + inner.height - 1;
        let typing_area = Rect::new(inner.x, y, inner.width, 1);
        let line = Line::from(Span::styled(
            format!(" {}", text),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::DIM),
        ));
        Paragraph::new(line).render(typing_area, buf);
    }
}

fn render_hint(area: Rect, buf: &mut Buffer, text: &str) {
    let y = area.y + area.height / 2;
    let hint_area = Rect::new(area.x, y, area.width, 1);
    let line = Line::from(Span::styled(
        format!(" {}", text),
        Style::default().fg(Color::DarkGray),
    ));
    Paragraph::new(line).render(hint_area, buf);
}

fn render_chat_header(area: Rect, buf: &mut Buffer, header: &str) {
    let line = Line::from(Span::styled(
        format!(" {} ", header),
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD),
    ));
    Paragraph::new(line)
        .style(Style::default().bg(Color::DarkGray))
        .render(area, buf);
}

fn render_cards(area: Rect, buf: &mut Buffer, state: &MessagesState) {
    let (all_lines, ranges) = build_message_lines(state, area.width as usize);
    let total_lines = all_lines.len();
    let visible_height = area.height as usize;

    let scroll = compute_auto_scroll(
        state.scroll_offset,
        state.selected,
        &ranges,
        visible_height,
        total_lines,
    );

    for (row, line_idx) in (scroll..total_lines).take(visible_height).enumerate() {
        let line_area = Rect::new(area.x, area.y + row as u16, area.width, 1);
        Paragraph::new(all_lines[line_idx].clone()).render(line_area, buf);
    }

    // Scroll indicators at the right edge.
    if total_lines > visible_height {
        let indicator_x = area.x + area.width.saturating_sub(1);
        if scroll > 0 {
            let cell = &mut buf[(indicator_x, area.y)];
            cell.set_char('^');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
        if scroll + visible_height < total_lines {
            let bottom_y = area.y + area.height.saturating_sub(1);
            let cell = &mut buf[(indicator_x, bottom_y)];
            cell.set_char('v');
            cell.set_style(Style::default().fg(Color::DarkGray));
        }
    }
}

/// Delivery ticks shown next to my own messages.
fn status_ticks(status: MessageStatus) -> &'static str {
    match status {
        MessageStatus::Sent => "-",
        MessageStatus::Delivered => "v",
        MessageStatus::Read => "vv",
    }
}

/// Build the flat line buffer and per-message line ranges in a single pass.
fn build_message_lines(
    state: &MessagesState,
    width: usize,
) -> (Vec<Line<'static>>, Vec<(usize, usize)>) {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut ranges: Vec<(usize, usize)> = Vec::new();

    for (msg_idx, msg) in state.messages.iter().enumerate() {
        let start = lines.len();
        render_message_card(&mut lines, msg, width, msg_idx == state.selected);
        // Blank line between cards.
        lines.push(Line::from(""));
        ranges.push((start, lines.len()));
    }

    (lines, ranges)
}

/// Render a single message card into the line buffer.
fn render_message_card(
    lines: &mut Vec<Line<'static>>,
    msg: &MessageInfo,
    width: usize,
    is_selected: bool,
) {
    // "| " + body + " |"
    let body_width = width.saturating_sub(4);
    if body_width < 10 {
        return;
    }

    let border_style = if is_selected {
        Style::default().fg(Color::Yellow)
    } else if msg.mine {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Gray)
    };

    let sender_style = if msg.mine {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::BOLD)
    };

    let meta_style = Style::default().fg(Color::DarkGray);

    let top_border = format!("+-{}-+", "-".repeat(body_width));
    lines.push(Line::from(Span::styled(top_border, border_style)));

    // Sender line: "| sender [pinned] (edited)      10:30 vv |"
    let sender_text = msg.sender.clone();
    let mut flag_text = String::new();
    if msg.pinned {
        flag_text.push_str(" [pinned]");
    }
    if msg.edited {
        flag_text.push_str(" (edited)");
    }
    if msg.forwarded {
        flag_text.push_str(" (fwd)");
    }
    let right_text = if msg.mine {
        format!("{} {}", fmt_time(msg.timestamp), status_ticks(msg.status))
    } else {
        fmt_time(msg.timestamp)
    };

    let used = sender_text.width() + flag_text.width() + right_text.width();
    let pad = body_width.saturating_sub(used);

    lines.push(Line::from(vec![
        Span::styled("| ".to_string(), border_style),
        Span::styled(sender_text, sender_style),
        Span::styled(flag_text, Style::default().fg(Color::Yellow)),
        Span::raw(" ".repeat(pad)),
        Span::styled(right_text, meta_style),
        Span::styled(" |".to_string(), border_style),
    ]));

    // Content lines, word-wrapped to the body width.
    for cl in wrap_text(&msg.content, body_width) {
        let pad = body_width.saturating_sub(cl.width());
        lines.push(Line::from(vec![
            Span::styled("| ".to_string(), border_style),
            Span::raw(format!("{}{}", cl, " ".repeat(pad))),
            Span::styled(" |".to_string(), border_style),
        ]));
    }

    // Reactions line: "+1 2   <3 1"
    if !msg.reactions.is_empty() {
        let mut spans: Vec<Span<'static>> = vec![Span::styled("| ".to_string(), border_style)];
        let mut text_len = 0usize;
        for (i, r) in msg.reactions.iter().enumerate() {
            let text = format!("{} {}", r.emoji, r.user_ids.len());
            text_len += text.width();
            spans.push(Span::styled(text, Style::default().fg(Color::Yellow)));
            if i + 1 < msg.reactions.len() {
                spans.push(Span::raw("   "));
                text_len += 3;
            }
        }
        spans.push(Span::raw(" ".repeat(body_width.saturating_sub(text_len))));
        spans.push(Span::styled(" |".to_string(), border_style));
        lines.push(Line::from(spans));
    }

    let bottom_border = format!("+-{}-+", "-".repeat(body_width));
    lines.push(Line::from(Span::styled(bottom_border, border_style)));
}

/// Word-wrap to display columns: split on newlines first, then wrap long
/// lines. Words wider than the limit are broken so card borders stay
/// aligned, which matters for double-width characters.
fn wrap_text(text: &str, max_width: usize) -> Vec<String> {
    if max_width == 0 {
        return vec![];
    }
    let mut result = Vec::new();
    for line in text.lines() {
        if line.width() <= max_width {
            result.push(line.to_string());
            continue;
        }
        let mut current = String::new();
        let mut current_w = 0usize;
        for word in line.split_whitespace() {
            let mut word = word.to_string();
            let mut word_w = word.width();
            while word_w > max_width {
                if current_w > 0 {
                    result.push(std::mem::take(&mut current));
                    current_w = 0;
                }
                let head = take_columns(&word, max_width);
                word = word[head.len()..].to_string();
                word_w = word.width();
                result.push(head);
            }
            if word_w == 0 {
                continue;
            }
            if current_w == 0 {
                current = word;
                current_w = word_w;
            } else if current_w + 1 + word_w <= max_width {
                current.push(' ');
                current.push_str(&word);
                current_w += 1 + word_w;
            } else {
                result.push(std::mem::take(&mut current));
                current = word;
                current_w = word_w;
            }
        }
        if current_w > 0 {
            result.push(current);
        }
    }
    result
}

/// Longest prefix of `s` that fits in `max` display columns. Always takes
/// at least one character so callers shrink their input.
fn take_columns(s: &str, max: usize) -> String {
    let mut out = String::new();
    let mut used = 0usize;
    for ch in s.chars() {
        let w = ch.width().unwrap_or(0);
        if !out.is_empty() && used + w > max {
            break;
        }
        out.push(ch);
        used += w;
    }
    out
}

/// Compute a scroll offset that keeps the selected message visible.
fn compute_auto_scroll(
    current_scroll: usize,
    selected: usize,
    ranges: &[(usize, usize)],
    visible_height: usize,
    total_lines: usize,
) -> usize {
    if ranges.is_empty() || total_lines <= visible_height {
        return 0;
    }

    let (sel_start, sel_end) = if selected < ranges.len() {
        ranges[selected]
    } else {
        return current_scroll;
    };

    let mut scroll = current_scroll;

    // A message taller than the viewport shows from its start.
    let msg_height = sel_end.saturating_sub(sel_start);
    if msg_height >= visible_height {
        scroll = sel_start;
    } else {
        if sel_start < scroll {
            scroll = sel_start;
        }
        if sel_end > scroll + visible_height {
            scroll = sel_end.saturating_sub(visible_height);
        }
    }

    let max_scroll = total_lines.saturating_sub(visible_height);
    scroll.min(max_scroll)
}
