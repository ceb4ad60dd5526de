//! Async backend: bridges the TUI event loop with store operations.
//!
//! An mpsc channel pair. The TUI sends `BackendCommand` values; a background
//! tokio task runs them against the shared store and sends `BackendResponse`
//! values back, interleaved with change events from the polling watcher.

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use crate::api::users::{list_users_data, whoami_data};
use crate::api::{
    self, ChatClient, ChatInfo, ClientOpts, FriendInfo, MessageInfo, RequestInfo, UserInfo,
};
use crate::auth::{self, Session, SessionStore};
use crate::config::Config;
use crate::models::{User, UserStatus};
use crate::store::{keys, seed, Store};
use crate::sync::{self, ChangeEvent, Watcher};
use crate::util::now_ms;

/// How many messages the pane asks for per chat.
const MESSAGE_LIMIT: usize = 200;

/// Commands sent from the TUI event loop to the async backend.
pub enum BackendCommand {
    SignIn {
        email: String,
        password: String,
    },
    Register {
        name: String,
        email: String,
        password: String,
    },
    /// Reload users, chats, friends, and requests in one round.
    LoadAll,
    LoadChats,
    LoadMessages {
        chat_id: String,
    },
    /// Sending also drops my typing row for that chat.
    SendMessage {
        chat_id: String,
        content: String,
    },
    EditMessage {
        message_id: String,
        content: String,
    },
    ToggleReaction {
        message_id: String,
        emoji: String,
    },
    TogglePin {
        message_id: String,
    },
    ForwardMessage {
        message_id: String,
        to_chat_id: String,
    },
    MarkRead {
        chat_id: String,
    },
    AcceptRequest {
        request_id: String,
    },
    DeclineRequest {
        request_id: String,
    },
    OpenDirectChat {
        user_id: String,
    },
    SetPresence {
        status: UserStatus,
    },
    SetTyping {
        chat_id: String,
    },
    ClearTyping {
        chat_id: String,
    },
}

/// Responses from the async backend to the TUI.
pub enum BackendResponse {
    /// Sent once at startup: the resumed session user, if any.
    Ready { user: Option<UserInfo> },
    SignedIn(Result<UserInfo>),
    Users(Result<Vec<UserInfo>>),
    Chats(Result<Vec<ChatInfo>>),
    Friends(Result<Vec<FriendInfo>>),
    Requests(Result<Vec<RequestInfo>>),
    Messages {
        chat_id: String,
        result: Result<Vec<MessageInfo>>,
    },
    MessageSent {
        chat_id: String,
        result: Result<()>,
    },
    /// A direct chat was opened or found: (chat id, display name).
    ChatOpened(Result<(String, String)>),
    /// A one-off action finished; the string is a toast-ready summary.
    ActionDone(Result<String>),
    /// My own presence was written to the store.
    PresenceSet(UserStatus),
    /// Names currently typing in a chat, already resolved.
    Typing {
        chat_id: String,
        users: Vec<String>,
    },
    /// The watcher saw a foreign change.
    Change(ChangeEvent),
    /// The store or config is unusable; the TUI should exit.
    Fatal(String),
}

/// Handle for interacting with the backend from the TUI side.
pub struct Backend {
    cmd_tx: mpsc::UnboundedSender<BackendCommand>,
    resp_rx: mpsc::UnboundedReceiver<BackendResponse>,
}

impl Backend {
    /// Start the backend task for a profile.
    pub fn start(opts: ClientOpts) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (resp_tx, resp_rx) = mpsc::unbounded_channel();

        tokio::spawn(backend_loop(opts, cmd_rx, resp_tx));

        Self { cmd_tx, resp_rx }
    }

    /// Send a command to the backend (non-blocking).
    pub fn send(&self, cmd: BackendCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            tracing::error!("backend channel closed, command dropped");
        }
    }

    /// Receive a response. Suspends until one is available; returns `None`
    /// only when the backend task is gone. Meant for `tokio::select!`.
    pub async fn recv(&mut self) -> Option<BackendResponse> {
        self.resp_rx.recv().await
    }

    /// Backend with no task behind it. Tests inspect the command side
    /// through the returned receiver.
    #[cfg(test)]
    pub(crate) fn disconnected() -> (Self, mpsc::UnboundedReceiver<BackendCommand>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (_resp_tx, resp_rx) = mpsc::unbounded_channel();
        (Self { cmd_tx, resp_rx }, cmd_rx)
    }
}

/// Background loop. Opens the store once, resumes the stored session when
/// it still resolves to an account, and then alternates between commands
/// and watcher polls.
async fn backend_loop(
    opts: ClientOpts,
    mut cmd_rx: mpsc::UnboundedReceiver<BackendCommand>,
    resp_tx: mpsc::UnboundedSender<BackendResponse>,
) {
    let mut config = match Config::load(&opts.profile) {
        Ok(config) => config,
        Err(e) => {
            let _ = resp_tx.send(BackendResponse::Fatal(format!("{:#}", e)));
            return;
        }
    };
    let store = match config
        .store_root(opts.data_dir.as_deref())
        .and_then(|root| Ok(Store::open(root)?))
    {
        Ok(store) => store,
        Err(e) => {
            let _ = resp_tx.send(BackendResponse::Fatal(format!("{:#}", e)));
            return;
        }
    };
    if let Err(e) = seed::ensure(&store) {
        let _ = resp_tx.send(BackendResponse::Fatal(format!("{:#}", e)));
        return;
    }

    let mut client: Option<ChatClient> = config.get_session().and_then(|session| {
        match ChatClient::with_session(store.clone(), session) {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!("stored session unusable: {:#}", e);
                None
            }
        }
    });
    let mut watcher = client
        .as_ref()
        .map(|c| Watcher::new(store.clone(), c.user_id()));

    let _ = resp_tx.send(BackendResponse::Ready {
        user: client.as_ref().map(whoami_data),
    });

    let mut ticker = time::interval(config.poll_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                // The TUI side dropped its handle; we are done.
                let Some(cmd) = cmd else { return };
                handle_command(
                    cmd,
                    &opts,
                    &mut config,
                    &store,
                    &mut client,
                    &mut watcher,
                    &resp_tx,
                );
            }
            _ = ticker.tick(), if watcher.is_some() => {
                let me = client.as_ref().map(|c| c.user_id().to_string());
                if let (Some(watcher), Some(me)) = (watcher.as_mut(), me) {
                    for event in watcher.poll() {
                        forward_event(event, &store, &me, &resp_tx);
                    }
                }
            }
        }
    }
}

/// Typing events arrive as deltas; the pane wants the full roster, so
/// resolve it here. Everything else passes through.
fn forward_event(
    event: ChangeEvent,
    store: &Store,
    me: &str,
    resp_tx: &mpsc::UnboundedSender<BackendResponse>,
) {
    match event {
        ChangeEvent::TypingStarted { chat_id, .. } | ChangeEvent::TypingStopped { chat_id, .. } => {
            let users = typing_roster(store, &chat_id, me);
            let _ = resp_tx.send(BackendResponse::Typing { chat_id, users });
        }
        other => {
            let _ = resp_tx.send(BackendResponse::Change(other));
        }
    }
}

/// Names (not ids) of everyone typing in a chat besides me.
fn typing_roster(store: &Store, chat_id: &str, me: &str) -> Vec<String> {
    let users: Vec<User> = store.read(keys::USERS);
    sync::typing_users(store, chat_id, me)
        .iter()
        .map(|id| api::users::display_name(&users, id))
        .collect()
}

fn push_users(client: &ChatClient, resp_tx: &mpsc::UnboundedSender<BackendResponse>) {
    let _ = resp_tx.send(BackendResponse::Users(list_users_data(client)));
}

fn push_chats(client: &ChatClient, resp_tx: &mpsc::UnboundedSender<BackendResponse>) {
    let _ = resp_tx.send(BackendResponse::Chats(api::chats::list_chats_data(client)));
}

fn push_friends(client: &ChatClient, resp_tx: &mpsc::UnboundedSender<BackendResponse>) {
    let _ = resp_tx.send(BackendResponse::Friends(api::friends::list_friends_data(
        client,
    )));
}

fn push_requests(client: &ChatClient, resp_tx: &mpsc::UnboundedSender<BackendResponse>) {
    let _ = resp_tx.send(BackendResponse::Requests(api::friends::list_requests_data(
        client,
    )));
}

/// Run one command inline. Every operation is a handful of small local
/// file reads and writes, so nothing here is worth a spawn.
fn handle_command(
    cmd: BackendCommand,
    opts: &ClientOpts,
    config: &mut Config,
    store: &Store,
    client: &mut Option<ChatClient>,
    watcher: &mut Option<Watcher>,
    resp_tx: &mpsc::UnboundedSender<BackendResponse>,
) {
    let cmd = match cmd {
        BackendCommand::SignIn { email, password } => {
            let result = auth::login_user(store, &email, &password).and_then(|user| {
                let session = Session {
                    user_id: user.id.clone(),
                    email: user.email.clone(),
                    logged_in_at: now_ms(),
                };
                config.set_session(session.clone());
                config.save(&opts.profile)?;
                ChatClient::with_session(store.clone(), session)
            });
            finish_sign_in(result, store, client, watcher, resp_tx);
            return;
        }
        BackendCommand::Register {
            name,
            email,
            password,
        } => {
            let result = auth::register_user(store, &name, &email, &password).and_then(|user| {
                let session = Session {
                    user_id: user.id.clone(),
                    email: user.email.clone(),
                    logged_in_at: now_ms(),
                };
                config.set_session(session.clone());
                config.save(&opts.profile)?;
                ChatClient::with_session(store.clone(), session)
            });
            finish_sign_in(result, store, client, watcher, resp_tx);
            return;
        }
        other => other,
    };

    // Everything below needs a signed-in client. The TUI only sends these
    // from the main view, so a stray command is a bug worth logging.
    let Some(client) = client.as_ref() else {
        tracing::debug!("command ignored: not signed in");
        return;
    };

    match cmd {
        BackendCommand::SignIn { .. } | BackendCommand::Register { .. } => unreachable!(),

        BackendCommand::LoadAll => {
            push_users(client, resp_tx);
            push_chats(client, resp_tx);
            push_friends(client, resp_tx);
            push_requests(client, resp_tx);
        }

        BackendCommand::LoadChats => push_chats(client, resp_tx),

        BackendCommand::LoadMessages { chat_id } => {
            let result = api::chats::read_messages_data(client, &chat_id, MESSAGE_LIMIT);
            let users = typing_roster(store, &chat_id, client.user_id());
            let _ = resp_tx.send(BackendResponse::Messages {
                chat_id: chat_id.clone(),
                result,
            });
            let _ = resp_tx.send(BackendResponse::Typing { chat_id, users });
        }

        BackendCommand::SendMessage { chat_id, content } => {
            let result = api::messages::send_message_data(client, &chat_id, &content).map(|_| ());
            if result.is_ok() {
                if let Err(e) = sync::clear_typing(store, &chat_id, client.user_id()) {
                    tracing::warn!("could not clear typing row: {}", e);
                }
            }
            let _ = resp_tx.send(BackendResponse::MessageSent { chat_id, result });
        }

        BackendCommand::EditMessage {
            message_id,
            content,
        } => {
            let result = api::messages::edit_message_data(client, &message_id, &content)
                .map(|_| "Message edited".to_string());
            let _ = resp_tx.send(BackendResponse::ActionDone(result));
        }

        BackendCommand::ToggleReaction { message_id, emoji } => {
            let result =
                api::messages::toggle_reaction_data(client, &message_id, &emoji).map(|added| {
                    if added {
                        format!("Reacted with {}", emoji)
                    } else {
                        "Reaction removed".to_string()
                    }
                });
            let _ = resp_tx.send(BackendResponse::ActionDone(result));
        }

        BackendCommand::TogglePin { message_id } => {
            let result = api::messages::toggle_pin_data(client, &message_id).map(|pinned| {
                if pinned {
                    "Message pinned".to_string()
                } else {
                    "Message unpinned".to_string()
                }
            });
            let _ = resp_tx.send(BackendResponse::ActionDone(result));
        }

        BackendCommand::ForwardMessage {
            message_id,
            to_chat_id,
        } => {
            let result = api::messages::forward_message_data(client, &message_id, &to_chat_id)
                .map(|_| "Message forwarded".to_string());
            let _ = resp_tx.send(BackendResponse::ActionDone(result));
            push_chats(client, resp_tx);
        }

        BackendCommand::MarkRead { chat_id } => {
            match api::chats::mark_chat_read_data(client, &chat_id) {
                // Unread badges changed for this viewer.
                Ok(_) => push_chats(client, resp_tx),
                Err(e) => tracing::warn!("mark read failed: {:#}", e),
            }
        }

        BackendCommand::AcceptRequest { request_id } => {
            let result = api::friends::accept_friend_request_data(client, &request_id)
                .map(|_| "Friend request accepted".to_string());
            let _ = resp_tx.send(BackendResponse::ActionDone(result));
            push_requests(client, resp_tx);
            push_friends(client, resp_tx);
            push_users(client, resp_tx);
        }

        BackendCommand::DeclineRequest { request_id } => {
            let result = api::friends::decline_friend_request_data(client, &request_id)
                .map(|_| "Friend request declined".to_string());
            let _ = resp_tx.send(BackendResponse::ActionDone(result));
            push_requests(client, resp_tx);
        }

        BackendCommand::OpenDirectChat { user_id } => {
            let result = api::chats::open_direct_chat_data(client, &user_id).map(|(chat, _)| {
                let users: Vec<User> = client.store().read(keys::USERS);
                let name = api::chats::chat_display_name(&chat, &users, client.user_id());
                (chat.id, name)
            });
            // Chats first so the sidebar already has the row when the app
            // moves its cursor to the opened chat.
            push_chats(client, resp_tx);
            let _ = resp_tx.send(BackendResponse::ChatOpened(result));
        }

        BackendCommand::SetPresence { status } => {
            match api::users::set_presence_data(client, status) {
                Ok(()) => {
                    let _ = resp_tx.send(BackendResponse::PresenceSet(status));
                    push_users(client, resp_tx);
                }
                Err(e) => {
                    let _ = resp_tx.send(BackendResponse::ActionDone(Err(e)));
                }
            }
        }

        // Typing rows are best effort; losing one costs an indicator at
        // worst.
        BackendCommand::SetTyping { chat_id } => {
            if let Err(e) = sync::set_typing(store, &chat_id, client.user_id()) {
                tracing::warn!("could not write typing row: {}", e);
            }
        }

        BackendCommand::ClearTyping { chat_id } => {
            if let Err(e) = sync::clear_typing(store, &chat_id, client.user_id()) {
                tracing::warn!("could not clear typing row: {}", e);
            }
        }
    }
}

/// Install the signed-in client and its watcher, then report back.
fn finish_sign_in(
    result: Result<ChatClient>,
    store: &Store,
    client: &mut Option<ChatClient>,
    watcher: &mut Option<Watcher>,
    resp_tx: &mpsc::UnboundedSender<BackendResponse>,
) {
    match result {
        Ok(new_client) => {
            let user = whoami_data(&new_client);
            *watcher = Some(Watcher::new(store.clone(), new_client.user_id()));
            *client = Some(new_client);
            let _ = resp_tx.send(BackendResponse::SignedIn(Ok(user)));
        }
        Err(e) => {
            let _ = resp_tx.send(BackendResponse::SignedIn(Err(e)));
        }
    }
}
