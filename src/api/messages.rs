//! Message operations: send, react, pin, edit, forward

use anyhow::{bail, Context, Result};

use super::chats::{require_participant, resolve_chat_id, MessageInfo, PREVIEW_LEN};
use super::client::{ChatClient, ClientOpts};
use crate::models::{Chat, LastMessage, Message, MessageStatus, User};
use crate::store::keys;
use crate::util::{fmt_time, now_ms, truncate_chars};

/// Recompute a chat's denormalized preview from the messages blob.
pub(super) fn refresh_last_message(chat: &mut Chat, messages: &[Message]) {
    chat.last_message = messages
        .iter()
        .filter(|m| m.chat_id == chat.id)
        .max_by(|a, b| (a.timestamp, &a.id).cmp(&(b.timestamp, &b.id)))
        .map(|m| LastMessage {
            sender_id: m.sender_id.clone(),
            preview: truncate_chars(&m.content, PREVIEW_LEN),
            timestamp: m.timestamp,
        });
}

/// Timestamp for a new message. Quick successive sends can land on the
/// same millisecond, so the stamp is bumped past the newest stored one;
/// ordering by timestamp then stays consistent with send order.
fn next_timestamp(messages: &[Message]) -> i64 {
    let newest = messages.iter().map(|m| m.timestamp).max().unwrap_or(0);
    now_ms().max(newest + 1)
}

/// Resolve a message argument: exact id or unique id prefix.
fn find_message_index(messages: &[Message], needle: &str) -> Result<usize> {
    if let Some(i) = messages.iter().position(|m| m.id == needle) {
        return Ok(i);
    }
    if needle.len() >= 4 {
        let matches: Vec<usize> = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.id.starts_with(needle))
            .map(|(i, _)| i)
            .collect();
        match matches.as_slice() {
            [i] => return Ok(*i),
            [] => {}
            _ => bail!("Multiple messages match '{}'", needle),
        }
    }
    bail!("No message matching '{}'", needle)
}

fn touch_last_seen(client: &ChatClient) -> Result<()> {
    let mut users: Vec<User> = client.store().read(keys::USERS);
    if let Some(user) = users.iter_mut().find(|u| u.id == client.user_id()) {
        user.last_seen_at = now_ms();
        client.store().write(keys::USERS, &users)?;
    }
    Ok(())
}

/// Append a message to a chat I participate in. Updates the chat preview
/// and my own read mark in the same pass.
pub fn send_message_data(client: &ChatClient, chat_id: &str, content: &str) -> Result<Message> {
    let content = content.trim();
    if content.is_empty() {
        bail!("Cannot send an empty message");
    }

    let me = client.user_id();
    let mut chats: Vec<Chat> = client.store().read(keys::CHATS);
    let Some(chat) = chats.iter_mut().find(|c| c.id == chat_id) else {
        bail!("No chat with id '{}'", chat_id);
    };
    require_participant(chat, me)?;

    let mut messages: Vec<Message> = client.store().read(keys::MESSAGES);
    let message = Message {
        id: uuid::Uuid::new_v4().to_string(),
        chat_id: chat_id.to_string(),
        sender_id: me.to_string(),
        content: content.to_string(),
        timestamp: next_timestamp(&messages),
        status: MessageStatus::Sent,
        reactions: Vec::new(),
        pinned: false,
        edited: false,
        edited_at: None,
        forwarded: false,
    };
    messages.push(message.clone());

    chat.last_message = Some(LastMessage {
        sender_id: me.to_string(),
        preview: truncate_chars(content, PREVIEW_LEN),
        timestamp: message.timestamp,
    });
    // Your own sends never count as unread for you.
    chat.last_read.insert(me.to_string(), message.timestamp);

    client.store().write(keys::MESSAGES, &messages)?;
    client.store().write(keys::CHATS, &chats)?;
    touch_last_seen(client)?;
    tracing::debug!("sent message {} to chat {}", message.id, chat_id);
    Ok(message)
}

/// Toggle my reaction on a message in a chat I participate in. Returns
/// true when the reaction is present afterwards.
pub fn toggle_reaction_data(client: &ChatClient, message: &str, emoji: &str) -> Result<bool> {
    let emoji = emoji.trim();
    if emoji.is_empty() || emoji.chars().count() > 8 {
        bail!("Reaction label must be 1 to 8 characters");
    }

    let me = client.user_id();
    let mut messages: Vec<Message> = client.store().read(keys::MESSAGES);
    let idx = find_message_index(&messages, message)?;

    let chats: Vec<Chat> = client.store().read(keys::CHATS);
    let chat = chats
        .iter()
        .find(|c| c.id == messages[idx].chat_id)
        .context("This message belongs to a chat that no longer exists")?;
    require_participant(chat, me)?;

    let added = messages[idx].toggle_reaction(emoji, me);
    client.store().write(keys::MESSAGES, &messages)?;
    Ok(added)
}

/// Toggle the pin flag on a message. Any participant may pin or unpin.
pub fn toggle_pin_data(client: &ChatClient, message: &str) -> Result<bool> {
    let me = client.user_id();
    let mut messages: Vec<Message> = client.store().read(keys::MESSAGES);
    let idx = find_message_index(&messages, message)?;

    let chats: Vec<Chat> = client.store().read(keys::CHATS);
    let chat = chats
        .iter()
        .find(|c| c.id == messages[idx].chat_id)
        .context("This message belongs to a chat that no longer exists")?;
    require_participant(chat, me)?;

    messages[idx].pinned = !messages[idx].pinned;
    let pinned = messages[idx].pinned;
    client.store().write(keys::MESSAGES, &messages)?;
    Ok(pinned)
}

/// Replace the content of one of my own messages.
pub fn edit_message_data(client: &ChatClient, message: &str, content: &str) -> Result<Message> {
    let content = content.trim();
    if content.is_empty() {
        bail!("Cannot edit a message to be empty");
    }

    let me = client.user_id();
    let mut messages: Vec<Message> = client.store().read(keys::MESSAGES);
    let idx = find_message_index(&messages, message)?;
    if messages[idx].sender_id != me {
        bail!("You can only edit your own messages");
    }

    messages[idx].content = content.to_string();
    messages[idx].edited = true;
    messages[idx].edited_at = Some(now_ms());
    let edited = messages[idx].clone();
    client.store().write(keys::MESSAGES, &messages)?;

    // Keep the chat preview honest when the newest message changed.
    let mut chats: Vec<Chat> = client.store().read(keys::CHATS);
    if let Some(chat) = chats.iter_mut().find(|c| c.id == edited.chat_id) {
        refresh_last_message(chat, &messages);
        client.store().write(keys::CHATS, &chats)?;
    }
    Ok(edited)
}

/// Copy a message I can see into another chat I participate in.
pub fn forward_message_data(
    client: &ChatClient,
    message: &str,
    to_chat_id: &str,
) -> Result<Message> {
    let me = client.user_id();
    let mut messages: Vec<Message> = client.store().read(keys::MESSAGES);
    let idx = find_message_index(&messages, message)?;
    let source_chat_id = messages[idx].chat_id.clone();
    let content = messages[idx].content.clone();

    let mut chats: Vec<Chat> = client.store().read(keys::CHATS);
    let source = chats
        .iter()
        .find(|c| c.id == source_chat_id)
        .context("The source chat no longer exists")?;
    require_participant(source, me)?;

    let Some(target) = chats.iter_mut().find(|c| c.id == to_chat_id) else {
        bail!("No chat with id '{}'", to_chat_id);
    };
    require_participant(target, me)?;

    let forwarded = Message {
        id: uuid::Uuid::new_v4().to_string(),
        chat_id: to_chat_id.to_string(),
        sender_id: me.to_string(),
        content,
        timestamp: next_timestamp(&messages),
        status: MessageStatus::Sent,
        reactions: Vec::new(),
        pinned: false,
        edited: false,
        edited_at: None,
        forwarded: true,
    };
    messages.push(forwarded.clone());

    target.last_message = Some(LastMessage {
        sender_id: me.to_string(),
        preview: truncate_chars(&forwarded.content, PREVIEW_LEN),
        timestamp: forwarded.timestamp,
    });
    target.last_read.insert(me.to_string(), forwarded.timestamp);

    client.store().write(keys::MESSAGES, &messages)?;
    client.store().write(keys::CHATS, &chats)?;
    touch_last_seen(client)?;
    tracing::debug!("forwarded message {} to chat {}", forwarded.id, to_chat_id);
    Ok(forwarded)
}

/// Pinned messages of a chat, chronological.
pub fn list_pinned_data(client: &ChatClient, chat_id: &str) -> Result<Vec<MessageInfo>> {
    let rows = super::chats::read_messages_data(client, chat_id, usize::MAX)?;
    Ok(rows.into_iter().filter(|m| m.pinned).collect())
}

/// Send a message (prints to stdout).
pub fn send_message(opts: &ClientOpts, to: &str, content: &str) -> Result<()> {
    let client = ChatClient::new(opts)?;
    let chat_id = resolve_chat_id(&client, to)?;
    send_message_data(&client, &chat_id, content)?;
    println!("Message sent.");
    Ok(())
}

/// Toggle a reaction (prints to stdout).
pub fn toggle_reaction(opts: &ClientOpts, message: &str, emoji: &str) -> Result<()> {
    let client = ChatClient::new(opts)?;
    if toggle_reaction_data(&client, message, emoji)? {
        println!("Reacted with {}.", emoji.trim());
    } else {
        println!("Reaction removed.");
    }
    Ok(())
}

/// Toggle a pin (prints to stdout).
pub fn toggle_pin(opts: &ClientOpts, message: &str) -> Result<()> {
    let client = ChatClient::new(opts)?;
    if toggle_pin_data(&client, message)? {
        println!("Message pinned.");
    } else {
        println!("Message unpinned.");
    }
    Ok(())
}

/// Edit a message (prints to stdout).
pub fn edit_message(opts: &ClientOpts, message: &str, content: &str) -> Result<()> {
    let client = ChatClient::new(opts)?;
    edit_message_data(&client, message, content)?;
    println!("Message edited.");
    Ok(())
}

/// Forward a message (prints to stdout).
pub fn forward_message(opts: &ClientOpts, message: &str, to: &str) -> Result<()> {
    let client = ChatClient::new(opts)?;
    let chat_id = resolve_chat_id(&client, to)?;
    forward_message_data(&client, message, &chat_id)?;
    println!("Message forwarded.");
    Ok(())
}

/// List pinned messages (prints to stdout).
pub fn list_pinned(opts: &ClientOpts, chat: &str) -> Result<()> {
    let client = ChatClient::new(opts)?;
    let chat_id = resolve_chat_id(&client, chat)?;
    let pinned = list_pinned_data(&client, &chat_id)?;

    if pinned.is_empty() {
        println!("(no pinned messages)");
        return Ok(());
    }
    for msg in &pinned {
        let short: String = msg.id.chars().take(6).collect();
        println!(
            "[{}] {} {}: {}",
            short,
            fmt_time(msg.timestamp),
            msg.sender,
            msg.content
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::chats::{
        list_chats_data, open_direct_chat_data, read_messages_data,
    };
    use crate::api::testutil::{befriend, clients_for};

    fn direct_chat(
        ada: &ChatClient,
        bob: &ChatClient,
    ) -> Chat {
        befriend(ada, bob);
        let (chat, _) = open_direct_chat_data(ada, "bob@example.com").unwrap();
        chat
    }

    #[test]
    fn test_send_appends_and_updates_preview() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let chat = direct_chat(&clients[0], &clients[1]);

        let sent = send_message_data(&clients[0], &chat.id, "  hello there  ").unwrap();
        assert_eq!(sent.content, "hello there");
        assert_eq!(sent.status, MessageStatus::Sent);

        let rows = list_chats_data(&clients[0]).unwrap();
        assert_eq!(rows[0].last_message_preview.as_deref(), Some("hello there"));
        assert_eq!(rows[0].last_message_time, Some(sent.timestamp));
    }

    #[test]
    fn test_send_rejects_blank_and_foreign_chats() {
        let (_dir, clients) = clients_for(&["Ada", "Bob", "Eve"]);
        let chat = direct_chat(&clients[0], &clients[1]);

        assert!(send_message_data(&clients[0], &chat.id, "   ").is_err());
        let err = send_message_data(&clients[2], &chat.id, "hi").unwrap_err();
        assert!(err.to_string().contains("not a participant"));
    }

    #[test]
    fn test_long_content_clipped_in_preview_only() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let chat = direct_chat(&clients[0], &clients[1]);

        let long = "x".repeat(200);
        send_message_data(&clients[0], &chat.id, &long).unwrap();

        let preview = list_chats_data(&clients[0]).unwrap()[0]
            .last_message_preview
            .clone()
            .unwrap();
        assert_eq!(preview.chars().count(), PREVIEW_LEN);
        assert!(preview.ends_with("..."));

        let rows = read_messages_data(&clients[0], &chat.id, 10).unwrap();
        assert_eq!(rows[0].content.len(), 200);
    }

    #[test]
    fn test_reaction_toggle_roundtrip() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let chat = direct_chat(&clients[0], &clients[1]);
        let sent = send_message_data(&clients[0], &chat.id, "react to me").unwrap();

        assert!(toggle_reaction_data(&clients[1], &sent.id, "+1").unwrap());
        let rows = read_messages_data(&clients[0], &chat.id, 10).unwrap();
        assert_eq!(rows[0].reactions.len(), 1);

        assert!(!toggle_reaction_data(&clients[1], &sent.id, "+1").unwrap());
        let rows = read_messages_data(&clients[0], &chat.id, 10).unwrap();
        assert!(rows[0].reactions.is_empty());

        assert!(toggle_reaction_data(&clients[1], &sent.id, "").is_err());
    }

    #[test]
    fn test_pin_and_pinned_listing() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let chat = direct_chat(&clients[0], &clients[1]);

        let first = send_message_data(&clients[0], &chat.id, "pin me").unwrap();
        send_message_data(&clients[0], &chat.id, "not me").unwrap();

        assert!(toggle_pin_data(&clients[1], &first.id).unwrap());
        let pinned = list_pinned_data(&clients[0], &chat.id).unwrap();
        assert_eq!(pinned.len(), 1);
        assert_eq!(pinned[0].content, "pin me");

        assert!(!toggle_pin_data(&clients[0], &first.id).unwrap());
        assert!(list_pinned_data(&clients[0], &chat.id).unwrap().is_empty());
    }

    #[test]
    fn test_edit_own_messages_only() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let chat = direct_chat(&clients[0], &clients[1]);
        let sent = send_message_data(&clients[0], &chat.id, "tpyo").unwrap();

        let err = edit_message_data(&clients[1], &sent.id, "fixed").unwrap_err();
        assert_eq!(err.to_string(), "You can only edit your own messages");

        let edited = edit_message_data(&clients[0], &sent.id, "typo").unwrap();
        assert!(edited.edited);
        assert!(edited.edited_at.is_some());

        // The newest message changed, so the preview follows.
        let rows = list_chats_data(&clients[0]).unwrap();
        assert_eq!(rows[0].last_message_preview.as_deref(), Some("typo"));
    }

    #[test]
    fn test_edit_older_message_keeps_newest_preview() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let chat = direct_chat(&clients[0], &clients[1]);

        let old = send_message_data(&clients[0], &chat.id, "first").unwrap();
        send_message_data(&clients[0], &chat.id, "second").unwrap();
        edit_message_data(&clients[0], &old.id, "first, edited").unwrap();

        let rows = list_chats_data(&clients[0]).unwrap();
        assert_eq!(rows[0].last_message_preview.as_deref(), Some("second"));
    }

    #[test]
    fn test_forward_requires_membership_of_both() {
        let (_dir, clients) = clients_for(&["Ada", "Bob", "Cleo"]);
        let (ada, bob, cleo) = (&clients[0], &clients[1], &clients[2]);
        let ab = direct_chat(ada, bob);
        befriend(ada, cleo);
        let (ac, _) = open_direct_chat_data(ada, "cleo@example.com").unwrap();

        let sent = send_message_data(bob, &ab.id, "worth sharing").unwrap();

        // Bob is not in the ada/cleo chat.
        assert!(forward_message_data(bob, &sent.id, &ac.id).is_err());

        let forwarded = forward_message_data(ada, &sent.id, &ac.id).unwrap();
        assert!(forwarded.forwarded);
        assert_eq!(forwarded.content, "worth sharing");
        assert_eq!(forwarded.chat_id, ac.id);
        assert_eq!(forwarded.sender_id, ada.user_id());

        let rows = read_messages_data(cleo, &ac.id, 10).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].forwarded);
    }

    #[test]
    fn test_message_prefix_resolution() {
        let (_dir, clients) = clients_for(&["Ada", "Bob"]);
        let chat = direct_chat(&clients[0], &clients[1]);
        let sent = send_message_data(&clients[0], &chat.id, "target").unwrap();

        // Unique prefix works, short or unknown needles fail.
        assert!(toggle_pin_data(&clients[0], &sent.id[..8]).unwrap());
        assert!(toggle_pin_data(&clients[0], "zz").is_err());
        assert!(toggle_pin_data(&clients[0], "zzzz-nope").is_err());
    }
}
