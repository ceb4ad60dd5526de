//! Sidebar widget: chats, friends, and pending friend requests.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Paragraph, Widget},
};

use crate::api::{ChatInfo, FriendInfo, RequestDirection, RequestInfo, UserInfo};
use crate::models::UserStatus;

// ---------------------------------------------------------------------------
// Data model
// ---------------------------------------------------------------------------

/// A chat row.
pub struct ChatRow {
    pub id: String,
    pub name: String,
    pub is_group: bool,
    pub unread: usize,
    /// The other side's presence for direct chats; None for groups.
    pub presence: Option<UserStatus>,
}

/// A friend row.
pub struct FriendRow {
    pub user_id: String,
    pub name: String,
    pub status: UserStatus,
}

/// A pending friend request row.
pub struct RequestRow {
    pub id: String,
    pub incoming: bool,
    pub name: String,
}

/// Sidebar state: owns the rows and tracks navigation.
pub struct SidebarState {
    pub chats: Vec<ChatRow>,
    pub friends: Vec<FriendRow>,
    pub requests: Vec<RequestRow>,
    /// Index into the flat item list.
    pub selected: usize,
    pub loading: bool,
}

impl Default for SidebarState {
    fn default() -> Self {
        Self {
            chats: Vec::new(),
            friends: Vec::new(),
            requests: Vec::new(),
            selected: 0,
            loading: true,
        }
    }
}

impl SidebarState {
    /// Rebuild the chat rows. `me` is needed to find the other side of a
    /// direct chat for its presence dot.
    pub fn update_chats(&mut self, chats: Vec<ChatInfo>, users: &[UserInfo], me: &str) {
        self.chats = chats
            .into_iter()
            .map(|c| {
                let presence = if c.is_group {
                    None
                } else {
                    c.participants
                        .iter()
                        .find(|p| p.as_str() != me)
                        .and_then(|other| users.iter().find(|u| &u.id == other))
                        .map(|u| u.status)
                };
                ChatRow {
                    id: c.id,
                    name: c.name,
                    is_group: c.is_group,
                    unread: c.unread_count,
                    presence,
                }
            })
            .collect();
        self.loading = false;
        self.clamp_selection();
    }

    pub fn update_friends(&mut self, friends: Vec<FriendInfo>) {
        self.friends = friends
            .into_iter()
            .map(|f| FriendRow {
                user_id: f.user_id,
                name: f.name,
                status: f.status,
            })
            .collect();
        self.clamp_selection();
    }

    pub fn update_requests(&mut self, requests: Vec<RequestInfo>) {
        self.requests = requests
            .into_iter()
            .map(|r| RequestRow {
                id: r.id,
                incoming: r.direction == RequestDirection::Incoming,
                name: r.other_name,
            })
            .collect();
        self.clamp_selection();
    }

    /// The selected item, if the selection is on one.
    pub fn selected_item(&self) -> Option<SidebarItem> {
        self.flat_items().get(self.selected).copied()
    }

    /// The chat id under the cursor, if a chat row is selected.
    pub fn selected_chat_id(&self) -> Option<String> {
        match self.selected_item()? {
            SidebarItem::Chat(ci) => Some(self.chats[ci].id.clone()),
            _ => None,
        }
    }

    /// Move the cursor onto a chat row by id (used after opening a chat
    /// from the friends list).
    pub fn select_chat(&mut self, chat_id: &str) {
        let items = self.flat_items();
        if let Some(pos) = items.iter().position(
            |item| matches!(item, SidebarItem::Chat(ci) if self.chats[*ci].id == chat_id),
        ) {
            self.selected = pos;
        }
    }
}

// ---------------------------------------------------------------------------
// Flat item enumeration
// ---------------------------------------------------------------------------

/// One row in the sidebar's flat list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidebarItem {
    /// "CHATS" section header (not selectable, occupies a row)
    ChatsHeader,
    Chat(usize),
    /// "FRIENDS" separator
    FriendsHeader,
    Friend(usize),
    /// "REQUESTS" separator, only present when there are requests
    RequestsHeader,
    Request(usize),
}

impl SidebarItem {
    fn is_header(&self) -> bool {
        matches!(
            self,
            SidebarItem::ChatsHeader | SidebarItem::FriendsHeader | SidebarItem::RequestsHeader
        )
    }
}

impl SidebarState {
    /// Build the flat list of items in display order.
    pub fn flat_items(&self) -> Vec<SidebarItem> {
        let mut items = Vec::new();

        items.push(SidebarItem::ChatsHeader);
        for ci in 0..self.chats.len() {
            items.push(SidebarItem::Chat(ci));
        }

        items.push(SidebarItem::FriendsHeader);
        for fi in 0..self.friends.len() {
            items.push(SidebarItem::Friend(fi));
        }

        if !self.requests.is_empty() {
            items.push(SidebarItem::RequestsHeader);
            for ri in 0..self.requests.len() {
                items.push(SidebarItem::Request(ri));
            }
        }

        items
    }

    pub fn move_up(&mut self) {
        if self.selected > 0 {
            self.selected -= 1;
            self.skip_headers_up();
        }
    }

    pub fn move_down(&mut self) {
        let count = self.flat_items().len();
        if count == 0 {
            return;
        }
        if self.selected < count - 1 {
            self.selected += 1;
            self.skip_headers_down();
        }
    }

    fn skip_headers_up(&mut self) {
        let items = self.flat_items();
        while self.selected > 0 {
            match items.get(self.selected) {
                Some(item) if item.is_header() => self.selected -= 1,
                _ => break,
            }
        }
        // Landed on the top header; go down to the first real row instead.
        if items.get(self.selected).is_some_and(|i| i.is_header()) {
            self.skip_headers_down();
        }
    }

    fn skip_headers_down(&mut self) {
        let items = self.flat_items();
        let count = items.len();
        while self.selected < count - 1 {
            match items.get(self.selected) {
                Some(item) if item.is_header() => self.selected += 1,
                _ => break,
            }
        }
    }

    /// Clamp the selection after structural changes. If the clamped position
    /// is a header, snap to the nearest real row below, else above.
    pub fn clamp_selection(&mut self) {
        let items = self.flat_items();
        if items.is_empty() {
            self.selected = 0;
            return;
        }
        if self.selected >= items.len() {
            self.selected = items.len() - 1;
        }
        if items[self.selected].is_header() {
            if let Some(below) = (self.selected..items.len()).find(|&i| !items[i].is_header()) {
                self.selected = below;
            } else if let Some(above) = (0..self.selected).rev().find(|&i| !items[i].is_header()) {
                self.selected = above;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Presence dot and color for a status.
pub fn presence_dot(status: UserStatus) -> (&'static str, Color) {
    match status {
        UserStatus::Online => ("*", Color::Green),
        UserStatus::Away => ("~", Color::Yellow),
        UserStatus::Offline => ("o", Color::DarkGray),
    }
}

/// Render the sidebar into the given area.
pub fn render(area: Rect, buf: &mut Buffer, state: &SidebarState, focused: bool) {
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

    if state.loading {
        if inner.height > 0 && inner.width > 0 {
            let loading_area = Rect::new(inner.x, inner.y, inner.width, 1);
            let line = Line::from(Span::styled(
                " Loading...",
                Style::default().fg(Color::DarkGray),
            ));
            Paragraph::new(line).render(loading_area, buf);
        }
        return;
    }

    let items = state.flat_items();
    let available_height = inner.height as usize;

    if available_height == 0 || items.is_empty() {
        return;
    }

    let scroll_offset = compute_scroll_offset(state.selected, available_height, items.len());

    for (row_idx, item_idx) in (scroll_offset..items.len())
        .take(available_height)
        .enumerate()
    {
        let item = &items[item_idx];
        let ctx = RowCtx {
            area: Rect::new(inner.x, inner.y + row_idx as u16, inner.width, 1),
            selected: item_idx == state.selected,
            pane_focused: focused,
        };

        render_item(buf, &ctx, item, state);
    }
}

/// Keep the selected item visible.
fn compute_scroll_offset(selected: usize, height: usize, total: usize) -> usize {
    if total <= height || selected < height {
        return 0;
    }
    let max_offset = total.saturating_sub(height);
    selected.saturating_sub(height - 1).min(max_offset)
}

struct RowCtx {
    area: Rect,
    selected: bool,
    pane_focused: bool,
}

fn item_style(selected: bool, has_unread: bool) -> Style {
    if selected {
        Style::default()
            .fg(Color::White)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    } else if has_unread {
        Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::Gray)
    }
}

fn badge_style(selected: bool) -> Style {
    if selected {
        Style::default()
            .fg(Color::Yellow)
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD)
    }
}

fn separator_row(buf: &mut Buffer, area: Rect, label: &str) {
    let w = area.width as usize;
    let prefix = format!(" -- {} ", label);
    let dashes = w.saturating_sub(prefix.len());
    let text = format!("{}{}", prefix, "-".repeat(dashes));
    let style = Style::default().fg(Color::DarkGray);
    render_row(buf, area, &text, "", style, style);
}

fn render_item(buf: &mut Buffer, ctx: &RowCtx, item: &SidebarItem, state: &SidebarState) {
    match item {
        SidebarItem::ChatsHeader => {
            let label = if ctx.pane_focused {
                ">> CHATS"
            } else {
                "   CHATS"
            };
            let style = Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD);
            render_row(buf, ctx.area, label, "", style, style);
        }

        SidebarItem::Chat(ci) => {
            let chat = &state.chats[*ci];
            let icon = if chat.is_group { "+" } else { "*" };
            let cursor = if ctx.selected { "\u{25BA}" } else { " " };
            let label = format!("{}{} {}", cursor, icon, chat.name);

            let (badge, bstyle) = if chat.unread > 0 {
                (format!("{}", chat.unread), badge_style(ctx.selected))
            } else if let Some(status) = chat.presence {
                let (dot, color) = presence_dot(status);
                (dot.to_string(), Style::default().fg(color))
            } else {
                (String::new(), item_style(ctx.selected, false))
            };

            let style = item_style(ctx.selected, chat.unread > 0);
            render_row(buf, ctx.area, &label, &badge, style, bstyle);
        }

        SidebarItem::FriendsHeader => separator_row(buf, ctx.area, "FRIENDS"),

        SidebarItem::Friend(fi) => {
            let friend = &state.friends[*fi];
            let cursor = if ctx.selected { "\u{25BA}" } else { " " };
            let label = format!("{} {}", cursor, friend.name);

            let (dot, color) = presence_dot(friend.status);
            let style = item_style(ctx.selected, false);
            render_row(buf, ctx.area, &label, dot, style, Style::default().fg(color));
        }

        SidebarItem::RequestsHeader => {
            separator_row(buf, ctx.area, &format!("REQUESTS ({})", state.requests.len()));
        }

        SidebarItem::Request(ri) => {
            let request = &state.requests[*ri];
            let arrow = if request.incoming { "<-" } else { "->" };
            let cursor = if ctx.selected { "\u{25BA}" } else { " " };
            let label = format!("{}{} {}", cursor, arrow, request.name);

            // Incoming requests are actionable; flag them.
            let badge = if request.incoming { "!" } else { "" };
            let style = item_style(ctx.selected, request.incoming);
            render_row(buf, ctx.area, &label, badge, style, badge_style(ctx.selected));
        }
    }
}

/// Render a row with left-aligned text and an optional right-aligned badge.
fn render_row(
    buf: &mut Buffer,
    area: Rect,
    left: &str,
    badge: &str,
    text_style: Style,
    badge_style: Style,
) {
    let width = area.width as usize;
    if width == 0 {
        return;
    }

    let badge_len = badge.chars().count();
    let max_left = if badge_len > 0 {
        width.saturating_sub(badge_len + 1)
    } else {
        width
    };

    let left_truncated: String = left.chars().take(max_left).collect();
    let left_len = left_truncated.chars().count();

    let pad = width.saturating_sub(left_len + badge_len);

    let line = Line::from(vec![
        Span::styled(left_truncated, text_style),
        Span::styled(" ".repeat(pad), text_style),
        Span::styled(badge.to_string(), badge_style),
    ]);

    Paragraph::new(line).render(area, buf);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(chats: usize, friends: usize, requests: usize) -> SidebarState {
        let mut state = SidebarState::default();
        state.loading = false;
        state.chats = (0..chats)
            .map(|i| ChatRow {
                id: format!("c{}", i),
                name: format!("chat {}", i),
                is_group: false,
                unread: 0,
                presence: None,
            })
            .collect();
        state.friends = (0..friends)
            .map(|i| FriendRow {
                user_id: format!("u{}", i),
                name: format!("friend {}", i),
                status: UserStatus::Online,
            })
            .collect();
        state.requests = (0..requests)
            .map(|i| RequestRow {
                id: format!("r{}", i),
                incoming: true,
                name: format!("requester {}", i),
            })
            .collect();
        state.clamp_selection();
        state
    }

    #[test]
    fn test_requests_section_hidden_when_empty() {
        let state = state_with(1, 1, 0);
        let items = state.flat_items();
        assert!(!items.contains(&SidebarItem::RequestsHeader));

        let state = state_with(1, 1, 2);
        let items = state.flat_items();
        assert!(items.contains(&SidebarItem::RequestsHeader));
        assert_eq!(items.len(), 1 + 1 + 1 + 1 + 1 + 2);
    }

    #[test]
    fn test_navigation_skips_headers() {
        let mut state = state_with(2, 1, 1);
        // Clamp lands on the first chat, past the CHATS header.
        assert_eq!(state.selected_item(), Some(SidebarItem::Chat(0)));

        state.move_down();
        assert_eq!(state.selected_item(), Some(SidebarItem::Chat(1)));
        // Next step crosses the FRIENDS separator.
        state.move_down();
        assert_eq!(state.selected_item(), Some(SidebarItem::Friend(0)));
        state.move_down();
        assert_eq!(state.selected_item(), Some(SidebarItem::Request(0)));

        state.move_up();
        assert_eq!(state.selected_item(), Some(SidebarItem::Friend(0)));
        state.move_up();
        assert_eq!(state.selected_item(), Some(SidebarItem::Chat(1)));
    }

    #[test]
    fn test_selection_clamps_when_rows_disappear() {
        let mut state = state_with(3, 0, 0);
        state.selected = 3; // last chat
        state.chats.truncate(1);
        state.clamp_selection();
        assert_eq!(state.selected_item(), Some(SidebarItem::Chat(0)));
    }

    #[test]
    fn test_select_chat_moves_cursor() {
        let mut state = state_with(3, 1, 0);
        state.select_chat("c2");
        assert_eq!(state.selected_chat_id().as_deref(), Some("c2"));
    }
}
