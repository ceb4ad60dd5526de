//! TUI application state and main event loop

use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyModifiers};
use futures::FutureExt;
use ratatui::DefaultTerminal;
use tokio_stream::StreamExt;

use crate::api::{ChatInfo, ClientOpts, UserInfo};
use crate::models::UserStatus;
use crate::sync::ChangeEvent;

use super::auth_view::{AuthField, AuthMode, AuthState};
use super::backend::{Backend, BackendCommand, BackendResponse};
use super::compose::ComposeState;
use super::debug_log::DebugLogState;
use super::log_capture::LogBuffer;
use super::messages::MessagesState;
use super::picker::{PickerAction, PickerItem, PickerState};
use super::sidebar::{SidebarItem, SidebarState};
use super::ui;

/// Target frame rate for UI updates (~30 fps)
const FRAME_DURATION_MS: u64 = 33;

/// How long a status bar toast stays up.
const TOAST_TTL: Duration = Duration::from_secs(4);

/// Which screen the TUI is showing.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Waiting for the backend to open the store.
    Loading,
    Auth,
    Main,
}

/// Active pane in the main view.
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    #[default]
    Sidebar,
    Messages,
    Compose,
}

impl Pane {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pane::Sidebar => "sidebar",
            Pane::Messages => "messages",
            Pane::Compose => "compose",
        }
    }

    fn next(self) -> Self {
        match self {
            Pane::Sidebar => Pane::Messages,
            Pane::Messages => Pane::Compose,
            Pane::Compose => Pane::Sidebar,
        }
    }

    fn previous(self) -> Self {
        match self {
            Pane::Sidebar => Pane::Compose,
            Pane::Messages => Pane::Sidebar,
            Pane::Compose => Pane::Messages,
        }
    }
}

/// A transient status bar message.
pub struct Toast {
    pub text: String,
    pub is_error: bool,
    expires_at: Instant,
}

/// Application state
pub struct App {
    pub should_exit: bool,
    pub view: View,
    /// The signed-in user, once known.
    pub user: Option<UserInfo>,
    pub active_pane: Pane,
    pub auth: AuthState,
    pub sidebar: SidebarState,
    pub messages: MessagesState,
    pub compose: ComposeState,
    pub picker: Option<PickerState>,
    pub show_help: bool,
    pub debug_log: DebugLogState,
    pub toast: Option<Toast>,
    /// Full user roster, for name lookups and presence dots.
    users: Vec<UserInfo>,
    /// Raw chat rows as last loaded; the sidebar keeps a derived copy.
    chats: Vec<ChatInfo>,
    fatal: Option<String>,
}

impl App {
    fn new(log_buffer: LogBuffer) -> Self {
        Self {
            should_exit: false,
            view: View::Loading,
            user: None,
            active_pane: Pane::default(),
            auth: AuthState::default(),
            sidebar: SidebarState::default(),
            messages: MessagesState::default(),
            compose: ComposeState::default(),
            picker: None,
            show_help: false,
            debug_log: DebugLogState::new(log_buffer),
            toast: None,
            users: Vec::new(),
            chats: Vec::new(),
            fatal: None,
        }
    }

    /// Housekeeping before each draw.
    fn tick(&mut self) {
        if self
            .toast
            .as_ref()
            .is_some_and(|t| t.expires_at <= Instant::now())
        {
            self.toast = None;
        }
    }

    fn show_toast(&mut self, text: impl Into<String>, is_error: bool) {
        self.toast = Some(Toast {
            text: text.into(),
            is_error,
            expires_at: Instant::now() + TOAST_TTL,
        });
    }

    fn toast_info(&mut self, text: impl Into<String>) {
        self.show_toast(text, false);
    }

    fn toast_error(&mut self, text: impl Into<String>) {
        self.show_toast(text, true);
    }

    fn lookup_name(&self, user_id: &str) -> String {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .map(|u| u.name.clone())
            .unwrap_or_else(|| "someone".to_string())
    }

    fn my_id(&self) -> String {
        self.user.as_ref().map(|u| u.id.clone()).unwrap_or_default()
    }

    // -----------------------------------------------------------------
    // Key handling
    // -----------------------------------------------------------------

    fn handle_key(&mut self, key: KeyEvent, backend: &Backend) {
        // Ctrl-C always quits.
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_exit = true;
            return;
        }

        // Overlays swallow input, top to bottom.
        if self.show_help {
            self.show_help = false;
            return;
        }
        if self.picker.is_some() {
            self.handle_picker_key(key, backend);
            return;
        }
        if self.debug_log.visible {
            match key.code {
                KeyCode::Up => self.debug_log.scroll_up(1),
                KeyCode::Down => self.debug_log.scroll_down(1),
                KeyCode::PageUp => self.debug_log.scroll_up(10),
                KeyCode::PageDown => self.debug_log.scroll_down(10),
                KeyCode::F(12) | KeyCode::Esc => self.debug_log.toggle(),
                _ => {}
            }
            return;
        }
        if key.code == KeyCode::F(12) {
            self.debug_log.toggle();
            return;
        }

        match self.view {
            View::Loading => {}
            View::Auth => self.handle_auth_key(key, backend),
            View::Main => self.handle_main_key(key, backend),
        }
    }

    fn handle_picker_key(&mut self, key: KeyEvent, backend: &Backend) {
        match key.code {
            KeyCode::Up => {
                if let Some(picker) = self.picker.as_mut() {
                    picker.select_previous();
                }
            }
            KeyCode::Down => {
                if let Some(picker) = self.picker.as_mut() {
                    picker.select_next();
                }
            }
            KeyCode::Esc => self.picker = None,
            KeyCode::Enter => {
                if let Some(picker) = self.picker.take() {
                    if let Some(item) = picker.selected_item() {
                        let cmd = match &picker.action {
                            PickerAction::React { message_id } => BackendCommand::ToggleReaction {
                                message_id: message_id.clone(),
                                emoji: item.id.clone(),
                            },
                            PickerAction::Forward { message_id } => {
                                BackendCommand::ForwardMessage {
                                    message_id: message_id.clone(),
                                    to_chat_id: item.id.clone(),
                                }
                            }
                        };
                        backend.send(cmd);
                    }
                }
            }
            _ => {}
        }
    }

    fn handle_auth_key(&mut self, key: KeyEvent, backend: &Backend) {
        if self.auth.busy {
            // One submission at a time.
            if key.code == KeyCode::Esc {
                self.should_exit = true;
            }
            return;
        }
        match key.code {
            KeyCode::Esc => self.should_exit = true,
            KeyCode::Tab | KeyCode::Down => self.auth.focus_next(),
            KeyCode::BackTab | KeyCode::Up => self.auth.focus_previous(),
            KeyCode::F(2) => self.auth.toggle_mode(),
            KeyCode::Backspace => self.auth.backspace(),
            KeyCode::Enter => self.submit_auth(backend),
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.auth.insert_char(c);
            }
            _ => {}
        }
    }

    fn submit_auth(&mut self, backend: &Backend) {
        // The backend validates too; these checks just save a round trip
        // for obviously empty fields.
        if self.auth.mode == AuthMode::Register && self.auth.name.trim().is_empty() {
            self.auth.error = Some("Enter your name".to_string());
            self.auth.focus = AuthField::Name;
            return;
        }
        if self.auth.email.trim().is_empty() {
            self.auth.error = Some("Enter your email".to_string());
            self.auth.focus = AuthField::Email;
            return;
        }
        if self.auth.password.is_empty() {
            self.auth.error = Some("Enter a password".to_string());
            self.auth.focus = AuthField::Password;
            return;
        }

        self.auth.busy = true;
        self.auth.error = None;
        let cmd = match self.auth.mode {
            AuthMode::Login => BackendCommand::SignIn {
                email: self.auth.email.clone(),
                password: self.auth.password.clone(),
            },
            AuthMode::Register => BackendCommand::Register {
                name: self.auth.name.clone(),
                email: self.auth.email.clone(),
                password: self.auth.password.clone(),
            },
        };
        backend.send(cmd);
    }

    fn handle_main_key(&mut self, key: KeyEvent, backend: &Backend) {
        match key.code {
            KeyCode::Tab => {
                self.active_pane = self.active_pane.next();
                return;
            }
            KeyCode::BackTab => {
                self.active_pane = self.active_pane.previous();
                return;
            }
            KeyCode::F(3) => {
                self.cycle_presence(backend);
                return;
            }
            KeyCode::Char('?') if self.active_pane != Pane::Compose => {
                self.show_help = true;
                return;
            }
            KeyCode::Char('q') if self.active_pane != Pane::Compose => {
                self.should_exit = true;
                return;
            }
            _ => {}
        }

        match self.active_pane {
            Pane::Sidebar => self.handle_sidebar_key(key, backend),
            Pane::Messages => self.handle_messages_key(key, backend),
            Pane::Compose => self.handle_compose_key(key, backend),
        }
    }

    fn cycle_presence(&mut self, backend: &Backend) {
        let Some(user) = self.user.as_ref() else {
            return;
        };
        let next = match user.status {
            UserStatus::Online => UserStatus::Away,
            UserStatus::Away => UserStatus::Offline,
            UserStatus::Offline => UserStatus::Online,
        };
        backend.send(BackendCommand::SetPresence { status: next });
    }

    fn handle_sidebar_key(&mut self, key: KeyEvent, backend: &Backend) {
        match key.code {
            KeyCode::Up => self.sidebar.move_up(),
            KeyCode::Down => self.sidebar.move_down(),
            KeyCode::Enter => self.open_selected(backend),
            KeyCode::Char('a') => self.resolve_selected_request(backend, true),
            KeyCode::Char('d') => self.resolve_selected_request(backend, false),
            _ => {}
        }
    }

    fn open_selected(&mut self, backend: &Backend) {
        match self.sidebar.selected_item() {
            Some(SidebarItem::Chat(ci)) => {
                let (id, name) = {
                    let row = &self.sidebar.chats[ci];
                    (row.id.clone(), row.name.clone())
                };
                self.open_chat(&id, &name, backend);
            }
            Some(SidebarItem::Friend(fi)) => {
                let user_id = self.sidebar.friends[fi].user_id.clone();
                backend.send(BackendCommand::OpenDirectChat { user_id });
            }
            Some(SidebarItem::Request(_)) => {
                self.toast_info("Press a to accept or d to decline");
            }
            _ => {}
        }
    }

    fn resolve_selected_request(&mut self, backend: &Backend, accept: bool) {
        let Some(SidebarItem::Request(ri)) = self.sidebar.selected_item() else {
            return;
        };
        let (incoming, request_id) = {
            let row = &self.sidebar.requests[ri];
            (row.incoming, row.id.clone())
        };
        if !incoming {
            self.toast_error("Only the recipient can act on this request");
            return;
        }
        backend.send(if accept {
            BackendCommand::AcceptRequest { request_id }
        } else {
            BackendCommand::DeclineRequest { request_id }
        });
    }

    /// Show a chat and jump to the compose box.
    fn open_chat(&mut self, chat_id: &str, name: &str, backend: &Backend) {
        // Leaving a chat mid-draft drops the typing indicator there.
        self.clear_typing_if_open(backend);
        self.messages.open_chat(chat_id, name);
        self.compose = ComposeState::default();
        self.sidebar.select_chat(chat_id);
        backend.send(BackendCommand::LoadMessages {
            chat_id: chat_id.to_string(),
        });
        backend.send(BackendCommand::MarkRead {
            chat_id: chat_id.to_string(),
        });
        self.active_pane = Pane::Compose;
    }

    fn clear_typing_if_open(&self, backend: &Backend) {
        if let Some(ref chat_id) = self.messages.chat_id {
            backend.send(BackendCommand::ClearTyping {
                chat_id: chat_id.clone(),
            });
        }
    }

    fn handle_messages_key(&mut self, key: KeyEvent, backend: &Backend) {
        match key.code {
            KeyCode::Up => self.messages.select_previous(),
            KeyCode::Down => self.messages.select_next(),
            KeyCode::Home => self.messages.select_first(),
            KeyCode::End => self.messages.select_last(),
            KeyCode::Esc => self.active_pane = Pane::Sidebar,
            KeyCode::Enter => {
                if self.messages.chat_id.is_some() {
                    self.active_pane = Pane::Compose;
                }
            }
            KeyCode::Char('r') => {
                if let Some(msg) = self.messages.selected_message() {
                    self.picker = Some(PickerState::reactions(&msg.id));
                }
            }
            KeyCode::Char('p') => {
                if let Some(msg) = self.messages.selected_message() {
                    backend.send(BackendCommand::TogglePin {
                        message_id: msg.id.clone(),
                    });
                }
            }
            KeyCode::Char('e') => self.edit_selected(),
            KeyCode::Char('f') => self.forward_selected(),
            _ => {}
        }
    }

    fn edit_selected(&mut self) {
        let Some((mine, id, content)) = self
            .messages
            .selected_message()
            .map(|m| (m.mine, m.id.clone(), m.content.clone()))
        else {
            return;
        };
        if !mine {
            self.toast_error("You can only edit your own messages");
            return;
        }
        self.compose.begin_edit(&id, &content);
        self.active_pane = Pane::Compose;
    }

    fn forward_selected(&mut self) {
        let Some(message_id) = self.messages.selected_message().map(|m| m.id.clone()) else {
            return;
        };
        let current = self.messages.chat_id.clone();
        let items: Vec<PickerItem> = self
            .sidebar
            .chats
            .iter()
            .filter(|c| Some(&c.id) != current.as_ref())
            .map(|c| PickerItem {
                id: c.id.clone(),
                label: c.name.clone(),
                hint: if c.is_group {
                    "group".to_string()
                } else {
                    "dm".to_string()
                },
            })
            .collect();
        if items.is_empty() {
            self.toast_error("No other chat to forward to");
            return;
        }
        self.picker = Some(PickerState::new(
            " Forward to ",
            PickerAction::Forward { message_id },
            items,
        ));
    }

    fn handle_compose_key(&mut self, key: KeyEvent, backend: &Backend) {
        match key.code {
            KeyCode::Esc => {
                if self.compose.editing.is_some() {
                    self.compose.cancel_edit();
                } else {
                    self.clear_typing_if_open(backend);
                    self.compose.reset_typing();
                    self.active_pane = Pane::Messages;
                }
            }
            KeyCode::Enter if key.modifiers.contains(KeyModifiers::ALT) => {
                self.compose.insert_newline();
            }
            KeyCode::Enter => self.submit_compose(backend),
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.compose.clear();
            }
            KeyCode::Backspace => self.compose.backspace(),
            KeyCode::Delete => self.compose.delete(),
            KeyCode::Left => self.compose.move_left(),
            KeyCode::Right => self.compose.move_right(),
            KeyCode::Home => self.compose.move_home(),
            KeyCode::End => self.compose.move_end(),
            KeyCode::Char(c)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                self.compose.insert_char(c);
                if let Some(chat_id) = self.messages.chat_id.clone() {
                    if self.compose.typing_refresh_due() {
                        backend.send(BackendCommand::SetTyping { chat_id });
                    }
                }
            }
            _ => {}
        }
    }

    fn submit_compose(&mut self, backend: &Backend) {
        let Some(chat_id) = self.messages.chat_id.clone() else {
            self.toast_error("Open a chat first");
            return;
        };
        let Some((editing, content)) = self.compose.take() else {
            return;
        };
        match editing {
            Some(message_id) => backend.send(BackendCommand::EditMessage {
                message_id,
                content,
            }),
            None => backend.send(BackendCommand::SendMessage { chat_id, content }),
        }
        self.compose.reset_typing();
    }

    // -----------------------------------------------------------------
    // Backend responses
    // -----------------------------------------------------------------

    fn handle_response(&mut self, resp: BackendResponse, backend: &Backend) {
        match resp {
            BackendResponse::Ready { user } => match user {
                Some(user) => {
                    self.user = Some(user);
                    self.view = View::Main;
                    backend.send(BackendCommand::LoadAll);
                }
                None => self.view = View::Auth,
            },

            BackendResponse::SignedIn(result) => match result {
                Ok(user) => {
                    let name = user.name.clone();
                    self.user = Some(user);
                    self.auth = AuthState::default();
                    self.view = View::Main;
                    backend.send(BackendCommand::LoadAll);
                    self.toast_info(format!("Signed in as {}", name));
                }
                Err(e) => {
                    self.auth.busy = false;
                    self.auth.error = Some(format!("{:#}", e));
                }
            },

            BackendResponse::Users(result) => match result {
                Ok(rows) => {
                    let me = self.my_id();
                    if let Some(mine) = rows.iter().find(|u| u.id == me) {
                        self.user = Some(mine.clone());
                    }
                    self.users = rows;
                    // Presence dots in the sidebar derive from the roster.
                    if !self.chats.is_empty() {
                        self.sidebar
                            .update_chats(self.chats.clone(), &self.users, &me);
                    }
                }
                Err(e) => self.toast_error(format!("{:#}", e)),
            },

            BackendResponse::Chats(result) => match result {
                Ok(rows) => {
                    self.chats = rows;
                    let me = self.my_id();
                    self.sidebar
                        .update_chats(self.chats.clone(), &self.users, &me);
                    // Keep the open chat's header fresh.
                    if let Some(open) = self.messages.chat_id.clone() {
                        if let Some(chat) = self.chats.iter().find(|c| c.id == open) {
                            self.messages.header = chat.name.clone();
                        }
                    }
                }
                Err(e) => self.toast_error(format!("{:#}", e)),
            },

            BackendResponse::Friends(result) => match result {
                Ok(rows) => self.sidebar.update_friends(rows),
                Err(e) => self.toast_error(format!("{:#}", e)),
            },

            BackendResponse::Requests(result) => match result {
                Ok(rows) => self.sidebar.update_requests(rows),
                Err(e) => self.toast_error(format!("{:#}", e)),
            },

            BackendResponse::Messages { chat_id, result } => match result {
                Ok(rows) => self.messages.update_messages(&chat_id, rows),
                Err(e) => self.toast_error(format!("{:#}", e)),
            },

            BackendResponse::MessageSent { chat_id, result } => match result {
                Ok(()) => {
                    backend.send(BackendCommand::LoadMessages { chat_id });
                    backend.send(BackendCommand::LoadChats);
                }
                Err(e) => self.toast_error(format!("{:#}", e)),
            },

            BackendResponse::ChatOpened(result) => match result {
                Ok((chat_id, name)) => self.open_chat(&chat_id, &name, backend),
                Err(e) => self.toast_error(format!("{:#}", e)),
            },

            BackendResponse::ActionDone(result) => match result {
                Ok(text) => {
                    self.toast_info(text);
                    // Reactions, pins, edits, and forwards all touch rows
                    // the open chat may be showing.
                    if let Some(chat_id) = self.messages.chat_id.clone() {
                        backend.send(BackendCommand::LoadMessages { chat_id });
                    }
                }
                Err(e) => self.toast_error(format!("{:#}", e)),
            },

            BackendResponse::PresenceSet(status) => {
                if let Some(user) = self.user.as_mut() {
                    user.status = status;
                }
                self.toast_info(format!("Presence: {}", status.as_str()));
            }

            BackendResponse::Typing { chat_id, users } => {
                self.messages.set_typing(&chat_id, users);
            }

            BackendResponse::Change(event) => self.handle_change(event, backend),

            BackendResponse::Fatal(message) => {
                self.fatal = Some(message);
                self.should_exit = true;
            }
        }
    }

    /// React to a foreign change: reload what it touches, toast when the
    /// user should notice even with another chat open.
    fn handle_change(&mut self, event: ChangeEvent, backend: &Backend) {
        match event {
            ChangeEvent::MessageNew {
                chat_id,
                sender_id,
                preview,
                ..
            } => {
                if self.messages.chat_id.as_deref() == Some(chat_id.as_str()) {
                    // Viewing the chat counts as reading it.
                    backend.send(BackendCommand::LoadMessages {
                        chat_id: chat_id.clone(),
                    });
                    backend.send(BackendCommand::MarkRead { chat_id });
                } else {
                    backend.send(BackendCommand::LoadChats);
                    let name = self.lookup_name(&sender_id);
                    self.toast_info(format!("{}: {}", name, preview));
                }
            }

            ChangeEvent::MessageUpdated { chat_id, .. } => {
                if self.messages.chat_id.as_deref() == Some(chat_id.as_str()) {
                    backend.send(BackendCommand::LoadMessages { chat_id });
                } else {
                    backend.send(BackendCommand::LoadChats);
                }
            }

            ChangeEvent::ChatNew { .. } => {
                backend.send(BackendCommand::LoadChats);
                self.toast_info("Added to a new chat");
            }

            ChangeEvent::FriendRequestNew { from_user_id, .. } => {
                backend.send(BackendCommand::LoadAll);
                let name = self.lookup_name(&from_user_id);
                self.toast_info(format!("Friend request from {}", name));
            }

            ChangeEvent::FriendRequestResolved { accepted, .. } => {
                backend.send(BackendCommand::LoadAll);
                if accepted {
                    self.toast_info("Your friend request was accepted");
                } else {
                    self.toast_info("Your friend request was declined");
                }
            }

            ChangeEvent::FriendshipNew { user_id } => {
                backend.send(BackendCommand::LoadAll);
                let name = self.lookup_name(&user_id);
                self.toast_info(format!("You are now friends with {}", name));
            }

            ChangeEvent::PresenceChanged { .. } => {
                backend.send(BackendCommand::LoadAll);
            }

            // The backend resolves typing deltas into Typing responses.
            ChangeEvent::TypingStarted { .. } | ChangeEvent::TypingStopped { .. } => {}
        }
    }
}

/// Run the TUI with panic-safe terminal restore.
pub async fn run(opts: &ClientOpts, log_buffer: LogBuffer) -> Result<()> {
    let mut terminal = ratatui::init();
    let result = AssertUnwindSafe(run_app(&mut terminal, opts, log_buffer))
        .catch_unwind()
        .await;
    ratatui::restore();

    match result {
        Ok(r) => r,
        Err(e) => std::panic::resume_unwind(e),
    }
}

async fn run_app(
    terminal: &mut DefaultTerminal,
    opts: &ClientOpts,
    log_buffer: LogBuffer,
) -> Result<()> {
    let mut backend = Backend::start(opts.clone());
    let mut app = App::new(log_buffer);
    let mut events = EventStream::new();
    let mut redraw = tokio::time::interval(Duration::from_millis(FRAME_DURATION_MS));

    while !app.should_exit {
        app.tick();
        terminal.draw(|frame| ui::render(frame, &app))?;

        tokio::select! {
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) if key.kind == crossterm::event::KeyEventKind::Press => {
                        app.handle_key(key, &backend);
                    }
                    // Resizes redraw on the next pass; other events are noise.
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                    None => break,
                }
            }
            maybe_resp = backend.recv() => {
                match maybe_resp {
                    Some(resp) => app.handle_response(resp, &backend),
                    None => bail!("backend task ended unexpectedly"),
                }
            }
            _ = redraw.tick() => {}
        }
    }

    if let Some(message) = app.fatal.take() {
        bail!("{message}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageStatus;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn test_user(id: &str, name: &str) -> UserInfo {
        UserInfo {
            id: id.to_string(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            avatar: "XX".to_string(),
            status: UserStatus::Online,
            last_seen_at: 0,
            is_friend: false,
            is_self: true,
        }
    }

    fn app_and_backend() -> (App, Backend, tokio::sync::mpsc::UnboundedReceiver<BackendCommand>)
    {
        let (backend, cmd_rx) = Backend::disconnected();
        (App::new(LogBuffer::new()), backend, cmd_rx)
    }

    #[test]
    fn test_ready_without_session_shows_auth() {
        let (mut app, backend, _cmd_rx) = app_and_backend();
        app.handle_response(BackendResponse::Ready { user: None }, &backend);
        assert!(app.view == View::Auth);
    }

    #[test]
    fn test_ready_with_session_loads_everything() {
        let (mut app, backend, mut cmd_rx) = app_and_backend();
        app.handle_response(
            BackendResponse::Ready {
                user: Some(test_user("u1", "Ada")),
            },
            &backend,
        );
        assert!(app.view == View::Main);
        assert!(matches!(cmd_rx.try_recv(), Ok(BackendCommand::LoadAll)));
    }

    #[test]
    fn test_sign_in_submission_and_error() {
        let (mut app, backend, mut cmd_rx) = app_and_backend();
        app.view = View::Auth;

        // Empty form never reaches the backend.
        app.handle_key(key(KeyCode::Enter), &backend);
        assert!(app.auth.error.is_some());
        assert!(cmd_rx.try_recv().is_err());

        for c in "ada@example.com".chars() {
            app.handle_key(key(KeyCode::Char(c)), &backend);
        }
        app.handle_key(key(KeyCode::Tab), &backend);
        for c in "secret99".chars() {
            app.handle_key(key(KeyCode::Char(c)), &backend);
        }
        app.handle_key(key(KeyCode::Enter), &backend);

        assert!(app.auth.busy);
        match cmd_rx.try_recv() {
            Ok(BackendCommand::SignIn { email, password }) => {
                assert_eq!(email, "ada@example.com");
                assert_eq!(password, "secret99");
            }
            _ => panic!("expected a SignIn command"),
        }

        // A rejected sign-in reopens the form with the error.
        app.handle_response(
            BackendResponse::SignedIn(Err(anyhow::anyhow!("Invalid email or password"))),
            &backend,
        );
        assert!(!app.auth.busy);
        assert_eq!(app.auth.error.as_deref(), Some("Invalid email or password"));
    }

    #[test]
    fn test_send_message_clears_input() {
        let (mut app, backend, mut cmd_rx) = app_and_backend();
        app.view = View::Main;
        app.user = Some(test_user("u1", "Ada"));
        app.messages.open_chat("c1", "Bob");
        app.active_pane = Pane::Compose;

        for c in "hello".chars() {
            app.handle_key(key(KeyCode::Char(c)), &backend);
        }
        app.handle_key(key(KeyCode::Enter), &backend);

        assert_eq!(app.compose.input, "");
        // The first keystroke refreshed the typing indicator.
        assert!(matches!(
            cmd_rx.try_recv(),
            Ok(BackendCommand::SetTyping { .. })
        ));
        match cmd_rx.try_recv() {
            Ok(BackendCommand::SendMessage { chat_id, content }) => {
                assert_eq!(chat_id, "c1");
                assert_eq!(content, "hello");
            }
            _ => panic!("expected a SendMessage command"),
        }
    }

    #[test]
    fn test_edit_rejected_for_foreign_messages() {
        let (mut app, backend, _cmd_rx) = app_and_backend();
        app.view = View::Main;
        app.messages.open_chat("c1", "Bob");
        app.messages.update_messages(
            "c1",
            vec![crate::api::MessageInfo {
                id: "m1".to_string(),
                sender_id: "u2".to_string(),
                sender: "Bob".to_string(),
                timestamp: 0,
                content: "not yours".to_string(),
                status: MessageStatus::Sent,
                reactions: Vec::new(),
                pinned: false,
                edited: false,
                forwarded: false,
                mine: false,
            }],
        );
        app.active_pane = Pane::Messages;

        app.handle_key(key(KeyCode::Char('e')), &backend);
        assert!(app.compose.editing.is_none());
        assert!(app.toast.as_ref().is_some_and(|t| t.is_error));
    }

    #[test]
    fn test_accept_key_on_incoming_request() {
        let (mut app, backend, mut cmd_rx) = app_and_backend();
        app.view = View::Main;
        app.sidebar.loading = false;
        app.sidebar.requests.push(crate::tui::sidebar::RequestRow {
            id: "r1".to_string(),
            incoming: true,
            name: "Bob".to_string(),
        });
        app.sidebar.clamp_selection();

        // Selection starts on the request because nothing else exists.
        app.handle_key(key(KeyCode::Char('a')), &backend);
        match cmd_rx.try_recv() {
            Ok(BackendCommand::AcceptRequest { request_id }) => assert_eq!(request_id, "r1"),
            _ => panic!("expected an AcceptRequest command"),
        }
    }

    #[test]
    fn test_help_overlay_swallows_keys() {
        let (mut app, backend, mut cmd_rx) = app_and_backend();
        app.view = View::Main;
        app.show_help = true;

        app.handle_key(key(KeyCode::Char('q')), &backend);
        assert!(!app.should_exit);
        assert!(!app.show_help);
        assert!(cmd_rx.try_recv().is_err());
    }

    #[test]
    fn test_q_quits_only_outside_compose() {
        let (mut app, backend, _cmd_rx) = app_and_backend();
        app.view = View::Main;
        app.messages.open_chat("c1", "Bob");
        app.active_pane = Pane::Compose;

        app.handle_key(key(KeyCode::Char('q')), &backend);
        assert!(!app.should_exit);
        assert_eq!(app.compose.input, "q");

        app.active_pane = Pane::Sidebar;
        app.handle_key(key(KeyCode::Char('q')), &backend);
        assert!(app.should_exit);
    }

    #[test]
    fn test_new_message_event_for_open_chat_reloads_and_marks_read() {
        let (mut app, backend, mut cmd_rx) = app_and_backend();
        app.view = View::Main;
        app.messages.open_chat("c1", "Bob");

        app.handle_response(
            BackendResponse::Change(ChangeEvent::MessageNew {
                chat_id: "c1".to_string(),
                message_id: "m1".to_string(),
                sender_id: "u2".to_string(),
                preview: "hi".to_string(),
            }),
            &backend,
        );

        assert!(matches!(
            cmd_rx.try_recv(),
            Ok(BackendCommand::LoadMessages { .. })
        ));
        assert!(matches!(
            cmd_rx.try_recv(),
            Ok(BackendCommand::MarkRead { .. })
        ));
        // No toast while the chat is on screen.
        assert!(app.toast.is_none());
    }

    #[test]
    fn test_new_message_event_elsewhere_toasts() {
        let (mut app, backend, mut cmd_rx) = app_and_backend();
        app.view = View::Main;
        app.users.push(test_user("u2", "Bob"));

        app.handle_response(
            BackendResponse::Change(ChangeEvent::MessageNew {
                chat_id: "c9".to_string(),
                message_id: "m1".to_string(),
                sender_id: "u2".to_string(),
                preview: "hi".to_string(),
            }),
            &backend,
        );

        assert!(matches!(cmd_rx.try_recv(), Ok(BackendCommand::LoadChats)));
        assert_eq!(app.toast.as_ref().unwrap().text, "Bob: hi");
    }

    #[test]
    fn test_fatal_stops_the_loop() {
        let (mut app, backend, _cmd_rx) = app_and_backend();
        app.handle_response(BackendResponse::Fatal("store gone".to_string()), &backend);
        assert!(app.should_exit);
    }
}
