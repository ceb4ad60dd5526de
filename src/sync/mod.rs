//! Polling sync watcher
//!
//! The app fakes realtime by re-reading the store every second or so and
//! diffing against an in-memory snapshot; this module is that loop,
//! factored into typed change events. Each pass fingerprints the store
//! files first so unchanged keys cost a stat and nothing more. The
//! snapshot is replaced wholesale on every re-read: last write wins and
//! there is no retry, which is exactly the consistency the store offers.

use anyhow::Result;
use chrono::Local;
use tokio::time::{self, MissedTickBehavior};

use crate::api::chats::chat_display_name;
use crate::api::client::{ChatClient, ClientOpts};
use crate::api::users::display_name;
use crate::config::Config;
use crate::models::{
    Chat, FriendRequest, FriendRequestStatus, Friendship, Message, MessageStatus, TypingEvent,
    User, UserStatus,
};
use crate::store::{keys, Fingerprint, Store, StoreError};
use crate::util::{now_ms, truncate_chars};

/// A typing row counts as live for this long after its last refresh.
pub const TYPING_TTL_MS: i64 = 4_000;
/// Writers refresh their typing row at most this often.
pub const TYPING_REFRESH_MS: i64 = 2_000;

/// Something another process changed in the store
#[derive(Debug, Clone)]
pub enum ChangeEvent {
    MessageNew {
        chat_id: String,
        message_id: String,
        sender_id: String,
        preview: String,
    },
    MessageUpdated {
        chat_id: String,
        message_id: String,
    },
    ChatNew {
        chat_id: String,
    },
    FriendRequestNew {
        request_id: String,
        from_user_id: String,
    },
    FriendRequestResolved {
        request_id: String,
        accepted: bool,
    },
    FriendshipNew {
        user_id: String,
    },
    PresenceChanged {
        user_id: String,
        status: UserStatus,
    },
    TypingStarted {
        chat_id: String,
        user_id: String,
    },
    TypingStopped {
        chat_id: String,
        user_id: String,
    },
}

/// In-memory copy of the store the differ compares against
#[derive(Default)]
struct Snapshot {
    users: Vec<User>,
    chats: Vec<Chat>,
    messages: Vec<Message>,
    requests: Vec<FriendRequest>,
    friendships: Vec<Friendship>,
    /// (chat_id, user_id) typing rows currently considered live.
    typing_live: Vec<(String, String)>,
}

impl Snapshot {
    fn load(store: &Store) -> Self {
        Self {
            users: store.read(keys::USERS),
            chats: store.read(keys::CHATS),
            messages: store.read(keys::MESSAGES),
            requests: store.read(keys::FRIEND_REQUESTS),
            friendships: store.read(keys::FRIENDSHIPS),
            typing_live: Vec::new(),
        }
    }
}

/// Store differ for one signed-in user. Call [`Watcher::poll`] on a timer;
/// each call returns the events since the previous one.
pub struct Watcher {
    store: Store,
    me: String,
    snapshot: Snapshot,
    fingerprint: Fingerprint,
}

impl Watcher {
    /// Prime the snapshot so the first poll reports nothing but changes
    /// made after this moment.
    pub fn new(store: Store, me: impl Into<String>) -> Self {
        let snapshot = Snapshot::load(&store);
        let fingerprint = store.fingerprint();
        Self {
            store,
            me: me.into(),
            snapshot,
            fingerprint,
        }
    }

    /// One polling pass.
    pub fn poll(&mut self) -> Vec<ChangeEvent> {
        let current = self.store.fingerprint();
        let changed = current.changed_keys(&self.fingerprint);
        self.fingerprint = current;

        let mut events = Vec::new();

        if changed.contains(&keys::USERS) {
            let users: Vec<User> = self.store.read(keys::USERS);
            self.diff_users(&users, &mut events);
            self.snapshot.users = users;
        }
        if changed.contains(&keys::CHATS) {
            let chats: Vec<Chat> = self.store.read(keys::CHATS);
            self.diff_chats(&chats, &mut events);
            self.snapshot.chats = chats;
        }
        if changed.contains(&keys::MESSAGES) {
            let messages: Vec<Message> = self.store.read(keys::MESSAGES);
            self.diff_messages(&messages, &mut events);
            self.snapshot.messages = messages;
            self.deliver_incoming();
        }
        if changed.contains(&keys::FRIEND_REQUESTS) {
            let requests: Vec<FriendRequest> = self.store.read(keys::FRIEND_REQUESTS);
            self.diff_requests(&requests, &mut events);
            self.snapshot.requests = requests;
        }
        if changed.contains(&keys::FRIENDSHIPS) {
            let friendships: Vec<Friendship> = self.store.read(keys::FRIENDSHIPS);
            self.diff_friendships(&friendships, &mut events);
            self.snapshot.friendships = friendships;
        }

        // Typing liveness also depends on wall time, so rows must be
        // re-aged even when the blob is untouched.
        if changed.contains(&keys::TYPING) || !self.snapshot.typing_live.is_empty() {
            self.diff_typing(&mut events);
        }

        events
    }

    fn in_my_chats(&self, chat_id: &str) -> bool {
        self.snapshot
            .chats
            .iter()
            .any(|c| c.id == chat_id && c.is_participant(&self.me))
    }

    fn diff_users(&self, new: &[User], events: &mut Vec<ChangeEvent>) {
        for user in new {
            if user.id == self.me {
                continue;
            }
            let old = self.snapshot.users.iter().find(|u| u.id == user.id);
            if old.is_some_and(|u| u.status != user.status) {
                events.push(ChangeEvent::PresenceChanged {
                    user_id: user.id.clone(),
                    status: user.status,
                });
            }
        }
    }

    fn diff_chats(&self, new: &[Chat], events: &mut Vec<ChangeEvent>) {
        for chat in new {
            if chat.created_by == self.me || !chat.is_participant(&self.me) {
                continue;
            }
            if !self.snapshot.chats.iter().any(|c| c.id == chat.id) {
                events.push(ChangeEvent::ChatNew {
                    chat_id: chat.id.clone(),
                });
            }
        }
    }

    fn diff_messages(&self, new: &[Message], events: &mut Vec<ChangeEvent>) {
        for message in new {
            if !self.in_my_chats(&message.chat_id) {
                continue;
            }
            match self.snapshot.messages.iter().find(|m| m.id == message.id) {
                None => {
                    // Own sends are not echoed; the sender already knows.
                    if message.sender_id != self.me {
                        events.push(ChangeEvent::MessageNew {
                            chat_id: message.chat_id.clone(),
                            message_id: message.id.clone(),
                            sender_id: message.sender_id.clone(),
                            preview: truncate_chars(&message.content, 60),
                        });
                    }
                }
                Some(old) => {
                    if old != message {
                        events.push(ChangeEvent::MessageUpdated {
                            chat_id: message.chat_id.clone(),
                            message_id: message.id.clone(),
                        });
                    }
                }
            }
        }
    }

    /// Write-back for delivery receipts: messages addressed to me that are
    /// still `sent` flip to `delivered` now that this client has seen
    /// them. The snapshot absorbs the write so the flip is not echoed
    /// back as an update; the fingerprint is left stale on purpose, so
    /// the next poll re-reads the blob and still catches anything a
    /// concurrent writer slipped in behind us.
    fn deliver_incoming(&mut self) {
        let mut messages = self.snapshot.messages.clone();
        let mut dirty = false;
        for m in messages.iter_mut() {
            if m.sender_id != self.me
                && m.status == MessageStatus::Sent
                && self
                    .snapshot
                    .chats
                    .iter()
                    .any(|c| c.id == m.chat_id && c.is_participant(&self.me))
            {
                m.status = MessageStatus::Delivered;
                dirty = true;
            }
        }
        if !dirty {
            return;
        }
        if let Err(e) = self.store.write(keys::MESSAGES, &messages) {
            tracing::warn!("delivery write-back failed: {}", e);
            return;
        }
        self.snapshot.messages = messages;
    }

    fn diff_requests(&self, new: &[FriendRequest], events: &mut Vec<ChangeEvent>) {
        for request in new {
            let old = self.snapshot.requests.iter().find(|r| r.id == request.id);
            match old {
                None => {
                    if request.status == FriendRequestStatus::Pending
                        && request.to_user_id == self.me
                    {
                        events.push(ChangeEvent::FriendRequestNew {
                            request_id: request.id.clone(),
                            from_user_id: request.from_user_id.clone(),
                        });
                    } else if request.status != FriendRequestStatus::Pending
                        && request.from_user_id == self.me
                    {
                        // Sent and resolved between two of our polls.
                        events.push(ChangeEvent::FriendRequestResolved {
                            request_id: request.id.clone(),
                            accepted: request.status == FriendRequestStatus::Accepted,
                        });
                    }
                }
                Some(old) => {
                    if old.status == FriendRequestStatus::Pending
                        && request.status != FriendRequestStatus::Pending
                        && request.from_user_id == self.me
                    {
                        events.push(ChangeEvent::FriendRequestResolved {
                            request_id: request.id.clone(),
                            accepted: request.status == FriendRequestStatus::Accepted,
                        });
                    }
                }
            }
        }
    }

    fn diff_friendships(&self, new: &[Friendship], events: &mut Vec<ChangeEvent>) {
        for friendship in new {
            if !friendship.involves(&self.me) {
                continue;
            }
            if !self.snapshot.friendships.iter().any(|f| f.id == friendship.id) {
                events.push(ChangeEvent::FriendshipNew {
                    user_id: friendship.other(&self.me).to_string(),
                });
            }
        }
    }

    fn diff_typing(&mut self, events: &mut Vec<ChangeEvent>) {
        let now = now_ms();
        let rows: Vec<TypingEvent> = self.store.read(keys::TYPING);
        let live: Vec<(String, String)> = rows
            .iter()
            .filter(|t| t.user_id != self.me && now - t.updated_at < TYPING_TTL_MS)
            .filter(|t| self.in_my_chats(&t.chat_id))
            .map(|t| (t.chat_id.clone(), t.user_id.clone()))
            .collect();

        for (chat_id, user_id) in &live {
            let known = self
                .snapshot
                .typing_live
                .iter()
                .any(|(c, u)| c == chat_id && u == user_id);
            if !known {
                events.push(ChangeEvent::TypingStarted {
                    chat_id: chat_id.clone(),
                    user_id: user_id.clone(),
                });
            }
        }
        for (chat_id, user_id) in &self.snapshot.typing_live {
            let still = live.iter().any(|(c, u)| c == chat_id && u == user_id);
            if !still {
                events.push(ChangeEvent::TypingStopped {
                    chat_id: chat_id.clone(),
                    user_id: user_id.clone(),
                });
            }
        }
        self.snapshot.typing_live = live;
    }
}

/// Refresh my typing row for a chat, pruning stale rows in the same
/// write. Callers throttle to [`TYPING_REFRESH_MS`].
pub fn set_typing(store: &Store, chat_id: &str, user_id: &str) -> Result<(), StoreError> {
    let now = now_ms();
    let mut rows: Vec<TypingEvent> = store.read(keys::TYPING);
    rows.retain(|t| {
        now - t.updated_at < TYPING_TTL_MS && !(t.chat_id == chat_id && t.user_id == user_id)
    });
    rows.push(TypingEvent {
        chat_id: chat_id.to_string(),
        user_id: user_id.to_string(),
        updated_at: now,
    });
    store.write(keys::TYPING, &rows)
}

/// Drop my typing row immediately (message sent or compose abandoned).
pub fn clear_typing(store: &Store, chat_id: &str, user_id: &str) -> Result<(), StoreError> {
    let rows: Vec<TypingEvent> = store.read(keys::TYPING);
    let kept: Vec<&TypingEvent> = rows
        .iter()
        .filter(|t| !(t.chat_id == chat_id && t.user_id == user_id))
        .collect();
    if kept.len() == rows.len() {
        return Ok(());
    }
    store.write(keys::TYPING, &kept)
}

/// Users currently typing in a chat, excluding `me`.
pub fn typing_users(store: &Store, chat_id: &str, me: &str) -> Vec<String> {
    let now = now_ms();
    let rows: Vec<TypingEvent> = store.read(keys::TYPING);
    rows.into_iter()
        .filter(|t| t.chat_id == chat_id && t.user_id != me && now - t.updated_at < TYPING_TTL_MS)
        .map(|t| t.user_id)
        .collect()
}

fn describe_event(event: &ChangeEvent, users: &[User], chats: &[Chat], me: &str) -> String {
    let chat_name = |chat_id: &str| match chats.iter().find(|c| c.id == chat_id) {
        Some(chat) => chat_display_name(chat, users, me),
        None => "(unknown chat)".to_string(),
    };
    match event {
        ChangeEvent::MessageNew {
            chat_id,
            sender_id,
            preview,
            ..
        } => format!(
            "message from {} in {}: {}",
            display_name(users, sender_id),
            chat_name(chat_id),
            preview
        ),
        ChangeEvent::MessageUpdated { chat_id, .. } => {
            format!("message updated in {}", chat_name(chat_id))
        }
        ChangeEvent::ChatNew { chat_id } => format!("new chat: {}", chat_name(chat_id)),
        ChangeEvent::FriendRequestNew { from_user_id, .. } => {
            format!("friend request from {}", display_name(users, from_user_id))
        }
        ChangeEvent::FriendRequestResolved { accepted, .. } => {
            if *accepted {
                "your friend request was accepted".to_string()
            } else {
                "your friend request was declined".to_string()
            }
        }
        ChangeEvent::FriendshipNew { user_id } => {
            format!("you are now friends with {}", display_name(users, user_id))
        }
        ChangeEvent::PresenceChanged { user_id, status } => {
            format!("{} is {}", display_name(users, user_id), status.as_str())
        }
        ChangeEvent::TypingStarted { chat_id, user_id } => format!(
            "{} is typing in {}",
            display_name(users, user_id),
            chat_name(chat_id)
        ),
        ChangeEvent::TypingStopped { chat_id, user_id } => format!(
            "{} stopped typing in {}",
            display_name(users, user_id),
            chat_name(chat_id)
        ),
    }
}

/// `watch` command: print change events until Ctrl-C. The polling stand-in
/// for a push notification listener.
pub async fn watch(opts: &ClientOpts) -> Result<()> {
    let client = ChatClient::new(opts)?;
    let config = Config::load(&opts.profile)?;
    let interval = config.poll_interval();

    let mut watcher = Watcher::new(client.store().clone(), client.user_id());
    println!(
        "Watching {} every {} ms. Ctrl-C to stop.",
        client.store().root().display(),
        interval.as_millis()
    );

    let mut ticker = time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let events = watcher.poll();
                if events.is_empty() {
                    continue;
                }
                let users: Vec<User> = client.store().read(keys::USERS);
                let chats: Vec<Chat> = client.store().read(keys::CHATS);
                for event in &events {
                    println!(
                        "{} {}",
                        Local::now().format("%H:%M:%S"),
                        describe_event(event, &users, &chats, client.user_id())
                    );
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopped.");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::chats::open_direct_chat_data;
    use crate::api::friends::send_friend_request_data;
    use crate::api::messages::send_message_data;
    use crate::api::testutil::{befriend, clients_for};
    use crate::api::users::set_presence_data;

    #[test]
    fn test_new_message_event_for_recipient_only() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let (ada, bob) = (&clients[0], &clients[1]);
        befriend(ada, bob);
        let (chat, _) = open_direct_chat_data(ada, "bob@example.com").unwrap();

        let mut ada_watch = Watcher::new(ada.store().clone(), ada.user_id());
        let mut bob_watch = Watcher::new(bob.store().clone(), bob.user_id());

        send_message_data(ada, &chat.id, "hello bob").unwrap();

        // The sender's own send is absorbed quietly.
        assert!(ada_watch.poll().is_empty());

        let events = bob_watch.poll();
        assert!(events.iter().any(|e| matches!(
            e,
            ChangeEvent::MessageNew { chat_id, preview, .. }
                if *chat_id == chat.id && preview == "hello bob"
        )));

        // The recipient's delivery write-back flips the status, and that
        // flip is an update the sender does see.
        let events = ada_watch.poll();
        assert!(events
            .iter()
            .any(|e| matches!(e, ChangeEvent::MessageUpdated { .. })));
        assert!(!events
            .iter()
            .any(|e| matches!(e, ChangeEvent::MessageNew { .. })));
    }

    #[test]
    fn test_delivery_write_back() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let (ada, bob) = (&clients[0], &clients[1]);
        befriend(ada, bob);
        let (chat, _) = open_direct_chat_data(ada, "bob@example.com").unwrap();

        let mut bob_watch = Watcher::new(bob.store().clone(), bob.user_id());
        send_message_data(ada, &chat.id, "are you there").unwrap();

        bob_watch.poll();

        let messages: Vec<Message> = bob.store().read(keys::MESSAGES);
        assert_eq!(messages[0].status, MessageStatus::Delivered);

        // The write-back is absorbed; the next poll is quiet.
        assert!(bob_watch.poll().is_empty());
    }

    #[test]
    fn test_presence_event_skips_self() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let (ada, bob) = (&clients[0], &clients[1]);

        let mut ada_watch = Watcher::new(ada.store().clone(), ada.user_id());

        set_presence_data(bob, UserStatus::Away).unwrap();
        let events = ada_watch.poll();
        assert!(events.iter().any(|e| matches!(
            e,
            ChangeEvent::PresenceChanged { user_id, status: UserStatus::Away }
                if user_id == bob.user_id()
        )));

        set_presence_data(ada, UserStatus::Away).unwrap();
        assert!(ada_watch.poll().is_empty());
    }

    #[test]
    fn test_friend_request_lifecycle_events() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let (ada, bob) = (&clients[0], &clients[1]);

        let mut ada_watch = Watcher::new(ada.store().clone(), ada.user_id());
        let mut bob_watch = Watcher::new(bob.store().clone(), bob.user_id());

        let request = send_friend_request_data(ada, "bob@example.com").unwrap();

        let events = bob_watch.poll();
        assert!(events.iter().any(|e| matches!(
            e,
            ChangeEvent::FriendRequestNew { from_user_id, .. } if from_user_id == ada.user_id()
        )));
        // The sender gets no event for their own request.
        assert!(ada_watch.poll().is_empty());

        crate::api::friends::accept_friend_request_data(bob, &request.id).unwrap();

        let events = ada_watch.poll();
        assert!(events
            .iter()
            .any(|e| matches!(e, ChangeEvent::FriendRequestResolved { accepted: true, .. })));
        assert!(events.iter().any(|e| matches!(
            e,
            ChangeEvent::FriendshipNew { user_id } if user_id == bob.user_id()
        )));
    }

    #[test]
    fn test_chat_new_only_for_other_side() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let (ada, bob) = (&clients[0], &clients[1]);
        befriend(ada, bob);

        let mut ada_watch = Watcher::new(ada.store().clone(), ada.user_id());
        let mut bob_watch = Watcher::new(bob.store().clone(), bob.user_id());

        let (chat, _) = open_direct_chat_data(ada, "bob@example.com").unwrap();

        let events = bob_watch.poll();
        assert!(events.iter().any(|e| matches!(
            e,
            ChangeEvent::ChatNew { chat_id } if *chat_id == chat.id
        )));
        assert!(ada_watch.poll().is_empty());
    }

    #[test]
    fn test_typing_started_and_stopped() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let (ada, bob) = (&clients[0], &clients[1]);
        befriend(ada, bob);
        let (chat, _) = open_direct_chat_data(ada, "bob@example.com").unwrap();

        let mut bob_watch = Watcher::new(bob.store().clone(), bob.user_id());

        set_typing(ada.store(), &chat.id, ada.user_id()).unwrap();
        let events = bob_watch.poll();
        assert!(events.iter().any(|e| matches!(
            e,
            ChangeEvent::TypingStarted { user_id, .. } if user_id == ada.user_id()
        )));

        assert_eq!(typing_users(bob.store(), &chat.id, bob.user_id()), vec![ada.user_id()]);
        // The typist never sees their own indicator.
        assert!(typing_users(ada.store(), &chat.id, ada.user_id()).is_empty());

        // Age the row past the TTL instead of sleeping through it.
        let stale = vec![TypingEvent {
            chat_id: chat.id.clone(),
            user_id: ada.user_id().to_string(),
            updated_at: now_ms() - TYPING_TTL_MS - 1,
        }];
        bob.store().write(keys::TYPING, &stale).unwrap();

        let events = bob_watch.poll();
        assert!(events.iter().any(|e| matches!(
            e,
            ChangeEvent::TypingStopped { user_id, .. } if user_id == ada.user_id()
        )));
    }

    #[test]
    fn test_clear_typing_removes_row() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let (ada, bob) = (&clients[0], &clients[1]);
        befriend(ada, bob);
        let (chat, _) = open_direct_chat_data(ada, "bob@example.com").unwrap();

        set_typing(ada.store(), &chat.id, ada.user_id()).unwrap();
        clear_typing(ada.store(), &chat.id, ada.user_id()).unwrap();
        assert!(typing_users(bob.store(), &chat.id, bob.user_id()).is_empty());
    }

    #[test]
    fn test_corrupt_blob_does_not_break_polling() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let (ada, bob) = (&clients[0], &clients[1]);
        befriend(ada, bob);
        let (chat, _) = open_direct_chat_data(ada, "bob@example.com").unwrap();

        let mut bob_watch = Watcher::new(bob.store().clone(), bob.user_id());

        // Clobber the messages blob with garbage; the watcher reads it as
        // empty and keeps going.
        std::fs::write(bob.store().root().join("messages.json"), "{oops").unwrap();
        bob_watch.poll();

        send_message_data(ada, &chat.id, "recovered").unwrap();
        let events = bob_watch.poll();
        assert!(events.iter().any(|e| matches!(
            e,
            ChangeEvent::MessageNew { preview, .. } if preview == "recovered"
        )));
    }
}
