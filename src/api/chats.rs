//! Chat listing, creation, and reads

use anyhow::{bail, Context, Result};

use super::client::{ChatClient, ClientOpts};
use super::users::{display_name, find_user};
use crate::models::{
    Chat, ChatType, Friendship, Message, MessageStatus, Reaction, User,
};
use crate::store::keys;
use crate::util::{fmt_time, now_ms};

/// Chat previews are clipped to this many characters.
pub const PREVIEW_LEN: usize = 80;

/// Chat metadata for display
#[derive(Debug, Clone)]
pub struct ChatInfo {
    pub id: String,
    pub name: String,
    pub is_group: bool,
    pub participants: Vec<String>,
    pub created_at: i64,
    pub last_message_time: Option<i64>,
    pub last_message_sender: Option<String>,
    pub last_message_preview: Option<String>,
    pub unread_count: usize,
}

/// A single message for display
#[derive(Debug, Clone)]
pub struct MessageInfo {
    pub id: String,
    pub sender_id: String,
    pub sender: String,
    pub timestamp: i64,
    pub content: String,
    pub status: MessageStatus,
    pub reactions: Vec<Reaction>,
    pub pinned: bool,
    pub edited: bool,
    pub forwarded: bool,
    pub mine: bool,
}

/// Display name for a chat from `me`'s point of view.
pub(crate) fn chat_display_name(chat: &Chat, users: &[User], me: &str) -> String {
    match chat.chat_type {
        ChatType::Group => chat
            .name
            .clone()
            .unwrap_or_else(|| "(unnamed group)".to_string()),
        ChatType::Direct => match chat.other_participant(me) {
            Some(other) => display_name(users, other),
            None => "(unknown)".to_string(),
        },
    }
}

pub(crate) fn require_participant(chat: &Chat, me: &str) -> Result<()> {
    if !chat.is_participant(me) {
        bail!("You are not a participant of this chat");
    }
    Ok(())
}

/// Unread = messages from others newer than my read mark.
fn unread_count(chat: &Chat, messages: &[Message], me: &str) -> usize {
    let read_up_to = chat.read_up_to(me);
    messages
        .iter()
        .filter(|m| m.chat_id == chat.id && m.sender_id != me && m.timestamp > read_up_to)
        .count()
}

/// Resolve a chat argument: exact id, unique id prefix, or (for chats I am
/// in) a case-insensitive group name or direct partner name/email.
pub(crate) fn resolve_chat_id(client: &ChatClient, needle: &str) -> Result<String> {
    let chats: Vec<Chat> = client.store().read(keys::CHATS);
    if let Some(chat) = chats.iter().find(|c| c.id == needle) {
        return Ok(chat.id.clone());
    }

    let me = client.user_id();
    let users: Vec<User> = client.store().read(keys::USERS);
    let lowered = needle.to_lowercase();

    let candidates: Vec<&Chat> = chats
        .iter()
        .filter(|c| {
            if needle.len() >= 4 && c.id.starts_with(needle) {
                return true;
            }
            c.is_participant(me) && chat_display_name(c, &users, me).to_lowercase() == lowered
        })
        .collect();

    match candidates.as_slice() {
        [chat] => Ok(chat.id.clone()),
        [] => bail!("No chat matching '{}'", needle),
        _ => bail!("Multiple chats match '{}'", needle),
    }
}

/// My chats, newest activity first.
pub fn list_chats_data(client: &ChatClient) -> Result<Vec<ChatInfo>> {
    let users: Vec<User> = client.store().read(keys::USERS);
    let chats: Vec<Chat> = client.store().read(keys::CHATS);
    let messages: Vec<Message> = client.store().read(keys::MESSAGES);
    let me = client.user_id();

    let mut rows: Vec<ChatInfo> = chats
        .iter()
        .filter(|c| c.is_participant(me))
        .map(|c| ChatInfo {
            id: c.id.clone(),
            name: chat_display_name(c, &users, me),
            is_group: c.chat_type == ChatType::Group,
            participants: c.participants.clone(),
            created_at: c.created_at,
            last_message_time: c.last_message.as_ref().map(|m| m.timestamp),
            last_message_sender: c
                .last_message
                .as_ref()
                .map(|m| display_name(&users, &m.sender_id)),
            last_message_preview: c.last_message.as_ref().map(|m| m.preview.clone()),
            unread_count: unread_count(c, &messages, me),
        })
        .collect();
    rows.sort_by_key(|c| std::cmp::Reverse(c.last_message_time.unwrap_or(c.created_at)));
    Ok(rows)
}

/// Open (or find) the direct chat with another user. Requires an existing
/// friendship; at most one direct chat exists per pair.
pub fn open_direct_chat_data(client: &ChatClient, target: &str) -> Result<(Chat, bool)> {
    let users: Vec<User> = client.store().read(keys::USERS);
    let me = client.user_id();

    let other = find_user(&users, target)
        .with_context(|| format!("No user matching '{}'", target))?;
    if other.id == me {
        bail!("You cannot open a direct chat with yourself");
    }

    let friendships: Vec<Friendship> = client.store().read(keys::FRIENDSHIPS);
    if !friendships.iter().any(|f| f.links(me, &other.id)) {
        bail!(
            "You can only start a direct chat with a friend. Send {} a friend request first.",
            other.name
        );
    }

    let mut chats: Vec<Chat> = client.store().read(keys::CHATS);
    if let Some(existing) = chats.iter().find(|c| {
        c.chat_type == ChatType::Direct && c.is_participant(me) && c.is_participant(&other.id)
    }) {
        return Ok((existing.clone(), false));
    }

    let chat = Chat {
        id: uuid::Uuid::new_v4().to_string(),
        chat_type: ChatType::Direct,
        name: None,
        participants: vec![me.to_string(), other.id.clone()],
        created_by: me.to_string(),
        created_at: now_ms(),
        last_message: None,
        last_read: Default::default(),
    };
    chats.push(chat.clone());
    client.store().write(keys::CHATS, &chats)?;
    tracing::debug!("created direct chat {} with {}", chat.id, other.id);
    Ok((chat, true))
}

/// Create a group chat with me plus at least two other members.
pub fn create_group_chat_data(client: &ChatClient, name: &str, members: &[String]) -> Result<Chat> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Group name cannot be empty");
    }

    let users: Vec<User> = client.store().read(keys::USERS);
    let me = client.user_id();

    let mut participants = vec![me.to_string()];
    for member in members {
        let user =
            find_user(&users, member).with_context(|| format!("No user matching '{}'", member))?;
        if user.id != me && !participants.contains(&user.id) {
            participants.push(user.id.clone());
        }
    }
    if participants.len() < 3 {
        bail!("A group chat needs at least 2 other members");
    }

    let chat = Chat {
        id: uuid::Uuid::new_v4().to_string(),
        chat_type: ChatType::Group,
        name: Some(name.to_string()),
        participants,
        created_by: me.to_string(),
        created_at: now_ms(),
        last_message: None,
        last_read: Default::default(),
    };

    let mut chats: Vec<Chat> = client.store().read(keys::CHATS);
    chats.push(chat.clone());
    client.store().write(keys::CHATS, &chats)?;
    tracing::debug!("created group chat '{}' ({} members)", name, chat.participants.len());
    Ok(chat)
}

/// Messages of a chat in chronological order, capped to the last `limit`.
pub fn read_messages_data(
    client: &ChatClient,
    chat_id: &str,
    limit: usize,
) -> Result<Vec<MessageInfo>> {
    let chats: Vec<Chat> = client.store().read(keys::CHATS);
    let chat = chats
        .iter()
        .find(|c| c.id == chat_id)
        .with_context(|| format!("No chat with id '{}'", chat_id))?;
    let me = client.user_id();
    require_participant(chat, me)?;

    let users: Vec<User> = client.store().read(keys::USERS);
    let messages: Vec<Message> = client.store().read(keys::MESSAGES);

    let mut rows: Vec<&Message> = messages.iter().filter(|m| m.chat_id == chat_id).collect();
    // Ties on the millisecond clock break by id so every reader agrees.
    rows.sort_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)));
    let skip = rows.len().saturating_sub(limit);

    Ok(rows
        .into_iter()
        .skip(skip)
        .map(|m| MessageInfo {
            id: m.id.clone(),
            sender_id: m.sender_id.clone(),
            sender: display_name(&users, &m.sender_id),
            timestamp: m.timestamp,
            content: m.content.clone(),
            status: m.status,
            reactions: m.reactions.clone(),
            pinned: m.pinned,
            edited: m.edited,
            forwarded: m.forwarded,
            mine: m.sender_id == me,
        })
        .collect())
}

/// Move my read mark to the newest message and flip the others' messages
/// to read. Returns how many messages flipped.
pub fn mark_chat_read_data(client: &ChatClient, chat_id: &str) -> Result<usize> {
    let me = client.user_id();
    let mut chats: Vec<Chat> = client.store().read(keys::CHATS);
    let Some(chat) = chats.iter_mut().find(|c| c.id == chat_id) else {
        bail!("No chat with id '{}'", chat_id);
    };
    require_participant(chat, me)?;

    let mut messages: Vec<Message> = client.store().read(keys::MESSAGES);
    let newest = messages
        .iter()
        .filter(|m| m.chat_id == chat_id)
        .map(|m| m.timestamp)
        .max();

    let mark = newest.unwrap_or_else(now_ms);
    if chat.read_up_to(me) < mark {
        chat.last_read.insert(me.to_string(), mark);
        client.store().write(keys::CHATS, &chats)?;
    }

    // Read receipts: the sender sees the flip on their next poll.
    let mut flipped = 0;
    for m in messages.iter_mut() {
        if m.chat_id == chat_id && m.sender_id != me && m.status != MessageStatus::Read {
            m.status = MessageStatus::Read;
            flipped += 1;
        }
    }
    if flipped > 0 {
        client.store().write(keys::MESSAGES, &messages)?;
    }
    Ok(flipped)
}

/// List my chats (prints to stdout).
pub fn list_chats(opts: &ClientOpts, limit: usize) -> Result<()> {
    let client = ChatClient::new(opts)?;
    let chats = list_chats_data(&client)?;

    println!("\nChats:");
    println!("{:-<60}", "");
    if chats.is_empty() {
        println!("  (no chats; open one with `palaver dm <email>`)");
        return Ok(());
    }

    for chat in chats.iter().take(limit) {
        let kind = if chat.is_group { "group" } else { "dm" };
        let unread = if chat.unread_count > 0 {
            format!("  ({} unread)", chat.unread_count)
        } else {
            String::new()
        };
        println!("{} [{}]{}", chat.name, kind, unread);
        println!("  ID: {}", chat.id);
        if let (Some(time), Some(sender), Some(preview)) = (
            chat.last_message_time,
            chat.last_message_sender.as_deref(),
            chat.last_message_preview.as_deref(),
        ) {
            println!("  {} [{}]: {}", fmt_time(time), sender, preview);
        }
        println!();
    }
    Ok(())
}

/// Open a direct chat (prints to stdout).
pub fn open_direct_chat(opts: &ClientOpts, target: &str) -> Result<()> {
    let client = ChatClient::new(opts)?;
    let (chat, created) = open_direct_chat_data(&client, target)?;

    let users: Vec<User> = client.store().read(keys::USERS);
    let name = chat_display_name(&chat, &users, client.user_id());
    if created {
        println!("Direct chat with {} created.", name);
    } else {
        println!("Direct chat with {} already exists.", name);
    }
    println!("ID: {}", chat.id);
    Ok(())
}

/// Create a group chat (prints to stdout).
pub fn create_group_chat(opts: &ClientOpts, name: &str, members: &[String]) -> Result<()> {
    let client = ChatClient::new(opts)?;
    let chat = create_group_chat_data(&client, name, members)?;
    println!(
        "Group '{}' created with {} members.",
        name.trim(),
        chat.participants.len()
    );
    println!("ID: {}", chat.id);
    Ok(())
}

/// Read a chat and mark it read (prints to stdout).
pub fn read_chat(opts: &ClientOpts, chat: &str, limit: usize) -> Result<()> {
    let client = ChatClient::new(opts)?;
    let chat_id = resolve_chat_id(&client, chat)?;
    let msgs = read_messages_data(&client, &chat_id, limit)?;
    mark_chat_read_data(&client, &chat_id)?;

    if msgs.is_empty() {
        println!("(no messages)");
        return Ok(());
    }

    for msg in &msgs {
        let mut flags = String::new();
        if msg.pinned {
            flags.push_str(" [pinned]");
        }
        if msg.edited {
            flags.push_str(" (edited)");
        }
        if msg.forwarded {
            flags.push_str(" (fwd)");
        }
        let short: String = msg.id.chars().take(6).collect();
        println!(
            "[{}] {} {}: {}{}",
            short,
            fmt_time(msg.timestamp),
            msg.sender,
            msg.content,
            flags
        );
        if !msg.reactions.is_empty() {
            let line = msg
                .reactions
                .iter()
                .map(|r| format!("{} x{}", r.emoji, r.user_ids.len()))
                .collect::<Vec<_>>()
                .join("  ");
            println!("         {}", line);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::friends::{accept_friend_request_data, send_friend_request_data};
    use crate::api::messages::send_message_data;
    use crate::api::testutil::{befriend, clients_for};

    #[test]
    fn test_direct_chat_requires_friendship() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let (ada, bob) = (&clients[0], &clients[1]);

        let err = open_direct_chat_data(ada, "bob@example.com").unwrap_err();
        assert!(err.to_string().contains("friend request first"));

        let request = send_friend_request_data(ada, "bob@example.com").unwrap();
        accept_friend_request_data(bob, &request.id).unwrap();

        assert!(open_direct_chat_data(ada, "bob@example.com").is_ok());
    }

    #[test]
    fn test_one_direct_chat_per_pair() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let (ada, bob) = (&clients[0], &clients[1]);
        befriend(ada, bob);

        let (first, created) = open_direct_chat_data(ada, "bob@example.com").unwrap();
        assert!(created);

        // Same chat from either side, no second row.
        let (again, created) = open_direct_chat_data(bob, "ada@example.com").unwrap();
        assert!(!created);
        assert_eq!(first.id, again.id);

        let chats: Vec<Chat> = ada.store().read(keys::CHATS);
        assert_eq!(chats.len(), 1);
    }

    #[test]
    fn test_group_chat_validation() {
        let (_dir, clients) = clients_for(&["Ada", "Bob", "Cleo"]);
        let ada = &clients[0];

        let err = create_group_chat_data(ada, "   ", &["bob@example.com".to_string()]).unwrap_err();
        assert_eq!(err.to_string(), "Group name cannot be empty");

        let err = create_group_chat_data(ada, "plans", &["bob@example.com".to_string()]).unwrap_err();
        assert!(err.to_string().contains("at least 2 other members"));

        // Duplicates and self-references collapse.
        let err = create_group_chat_data(
            ada,
            "plans",
            &[
                "bob@example.com".to_string(),
                "bob@example.com".to_string(),
                "ada@example.com".to_string(),
            ],
        )
        .unwrap_err();
        assert!(err.to_string().contains("at least 2 other members"));

        let chat = create_group_chat_data(
            ada,
            "plans",
            &["bob@example.com".to_string(), "cleo@example.com".to_string()],
        )
        .unwrap();
        assert_eq!(chat.participants.len(), 3);
    }

    #[test]
    fn test_unread_counts_per_viewer() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let (ada, bob) = (&clients[0], &clients[1]);
        befriend(ada, bob);

        let (chat, _) = open_direct_chat_data(ada, "bob@example.com").unwrap();
        send_message_data(ada, &chat.id, "one").unwrap();
        send_message_data(ada, &chat.id, "two").unwrap();

        // The sender has nothing unread; the recipient has two.
        assert_eq!(list_chats_data(ada).unwrap()[0].unread_count, 0);
        assert_eq!(list_chats_data(bob).unwrap()[0].unread_count, 2);

        mark_chat_read_data(bob, &chat.id).unwrap();
        assert_eq!(list_chats_data(bob).unwrap()[0].unread_count, 0);
    }

    #[test]
    fn test_mark_read_flips_sender_ticks() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let (ada, bob) = (&clients[0], &clients[1]);
        befriend(ada, bob);

        let (chat, _) = open_direct_chat_data(ada, "bob@example.com").unwrap();
        send_message_data(ada, &chat.id, "hello").unwrap();

        assert_eq!(mark_chat_read_data(bob, &chat.id).unwrap(), 1);

        let rows = read_messages_data(ada, &chat.id, 50).unwrap();
        assert_eq!(rows[0].status, MessageStatus::Read);

        // Marking again is a no-op.
        assert_eq!(mark_chat_read_data(bob, &chat.id).unwrap(), 0);
    }

    #[test]
    fn test_read_messages_requires_participation() {
        let (_dir, clients) = clients_for(&["Ada", "Bob", "Eve"]);
        let (ada, bob, eve) = (&clients[0], &clients[1], &clients[2]);
        befriend(ada, bob);

        let (chat, _) = open_direct_chat_data(ada, "bob@example.com").unwrap();
        send_message_data(ada, &chat.id, "private").unwrap();

        let err = read_messages_data(eve, &chat.id, 50).unwrap_err();
        assert!(err.to_string().contains("not a participant"));
        assert!(mark_chat_read_data(eve, &chat.id).is_err());
    }

    #[test]
    fn test_messages_chronological_and_limited() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let (ada, bob) = (&clients[0], &clients[1]);
        befriend(ada, bob);

        let (chat, _) = open_direct_chat_data(ada, "bob@example.com").unwrap();
        for i in 0..5 {
            send_message_data(ada, &chat.id, &format!("msg {}", i)).unwrap();
        }

        let rows = read_messages_data(bob, &chat.id, 3).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].content, "msg 2");
        assert_eq!(rows[2].content, "msg 4");
        assert!(rows.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_list_chats_sorted_by_activity() {
        let (_dir, clients) = clients_for(&["Ada", "Bob", "Cleo"]);
        let ada = &clients[0];
        befriend(ada, &clients[1]);
        befriend(ada, &clients[2]);

        let (with_bob, _) = open_direct_chat_data(ada, "bob@example.com").unwrap();
        let (with_cleo, _) = open_direct_chat_data(ada, "cleo@example.com").unwrap();
        send_message_data(ada, &with_bob.id, "old").unwrap();
        send_message_data(ada, &with_cleo.id, "new").unwrap();

        let rows = list_chats_data(ada).unwrap();
        assert_eq!(rows[0].id, with_cleo.id);
        assert_eq!(rows[1].id, with_bob.id);
    }

    #[test]
    fn test_resolve_chat_by_name_and_prefix() {
        let (_dir, clients) = clients_for(&["Ada", "Bob", "Cleo"]);
        let ada = &clients[0];

        let chat = create_group_chat_data(
            ada,
            "Design Crit",
            &["bob@example.com".to_string(), "cleo@example.com".to_string()],
        )
        .unwrap();

        assert_eq!(resolve_chat_id(ada, &chat.id).unwrap(), chat.id);
        assert_eq!(resolve_chat_id(ada, "design crit").unwrap(), chat.id);
        assert_eq!(resolve_chat_id(ada, &chat.id[..8]).unwrap(), chat.id);
        assert!(resolve_chat_id(ada, "nope").is_err());
    }
}
