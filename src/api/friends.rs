//! Friend requests and friendships
//!
//! The request lifecycle is where the data model has actual rules: no
//! self-requests, no new request while one is pending in either direction,
//! none between existing friends, and accepting a request also resolves a
//! crossing one from the other side so a pair can never mint two
//! friendships.

use anyhow::{bail, Context, Result};

use super::client::{ChatClient, ClientOpts};
use super::users::{display_name, find_user};
use crate::models::{FriendRequest, FriendRequestStatus, Friendship, User, UserStatus};
use crate::store::keys;
use crate::util::{fmt_ago, now_ms};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDirection {
    Incoming,
    Outgoing,
}

/// A pending request row for display
#[derive(Debug, Clone)]
pub struct RequestInfo {
    pub id: String,
    pub direction: RequestDirection,
    pub other_user_id: String,
    pub other_name: String,
    pub other_email: String,
    pub created_at: i64,
}

/// A friend row for display
#[derive(Debug, Clone)]
pub struct FriendInfo {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub status: UserStatus,
    pub last_seen_at: i64,
    pub friends_since: i64,
}

/// Create a pending request to another user (by id or email).
pub fn send_friend_request_data(client: &ChatClient, target: &str) -> Result<FriendRequest> {
    let users: Vec<User> = client.store().read(keys::USERS);
    let me = client.user_id();

    let other = find_user(&users, target)
        .with_context(|| format!("No user matching '{}'", target))?;
    if other.id == me {
        bail!("You cannot send a friend request to yourself");
    }

    let friendships: Vec<Friendship> = client.store().read(keys::FRIENDSHIPS);
    if friendships.iter().any(|f| f.links(me, &other.id)) {
        bail!("You are already friends with {}", other.name);
    }

    let mut requests: Vec<FriendRequest> = client.store().read(keys::FRIEND_REQUESTS);
    for r in &requests {
        if r.status != FriendRequestStatus::Pending {
            continue;
        }
        if r.from_user_id == me && r.to_user_id == other.id {
            bail!("A friend request to {} is already pending", other.name);
        }
        if r.from_user_id == other.id && r.to_user_id == me {
            bail!("{} already sent you a request; accept it instead", other.name);
        }
    }

    let request = FriendRequest {
        id: uuid::Uuid::new_v4().to_string(),
        from_user_id: me.to_string(),
        to_user_id: other.id.clone(),
        status: FriendRequestStatus::Pending,
        created_at: now_ms(),
    };
    requests.push(request.clone());
    client.store().write(keys::FRIEND_REQUESTS, &requests)?;
    tracing::debug!("friend request {} -> {}", me, other.id);
    Ok(request)
}

/// Resolve a request argument: exact id, unique id prefix, or the other
/// user's email/id on a pending request involving me.
fn find_request_index(requests: &[FriendRequest], users: &[User], me: &str, needle: &str) -> Result<usize> {
    if let Some(i) = requests.iter().position(|r| r.id == needle) {
        return Ok(i);
    }

    let candidates: Vec<usize> = requests
        .iter()
        .enumerate()
        .filter(|(_, r)| r.status == FriendRequestStatus::Pending)
        .filter(|(_, r)| r.from_user_id == me || r.to_user_id == me)
        .filter(|(_, r)| {
            if needle.len() >= 4 && r.id.starts_with(needle) {
                return true;
            }
            let other_id = if r.from_user_id == me {
                &r.to_user_id
            } else {
                &r.from_user_id
            };
            find_user(users, needle).is_some_and(|u| u.id == *other_id)
        })
        .map(|(i, _)| i)
        .collect();

    match candidates.as_slice() {
        [i] => Ok(*i),
        [] => bail!("No pending friend request matching '{}'", needle),
        _ => bail!("Multiple friend requests match '{}'", needle),
    }
}

/// Accept a pending request addressed to me. Returns the friendship,
/// creating it unless a concurrent accept already has.
pub fn accept_friend_request_data(client: &ChatClient, request: &str) -> Result<Friendship> {
    let me = client.user_id();
    let users: Vec<User> = client.store().read(keys::USERS);
    let mut requests: Vec<FriendRequest> = client.store().read(keys::FRIEND_REQUESTS);

    let idx = find_request_index(&requests, &users, me, request)?;
    if requests[idx].to_user_id != me {
        bail!("Only the recipient can accept a friend request");
    }
    if requests[idx].status != FriendRequestStatus::Pending {
        bail!("This request was already {}", requests[idx].status.as_str());
    }

    requests[idx].status = FriendRequestStatus::Accepted;
    let from_id = requests[idx].from_user_id.clone();

    // A crossing request from me may exist if both sides sent one before
    // either polled. Resolve it too instead of leaving a pending row.
    for r in requests.iter_mut() {
        if r.status == FriendRequestStatus::Pending
            && r.from_user_id == me
            && r.to_user_id == from_id
        {
            r.status = FriendRequestStatus::Accepted;
        }
    }

    let mut friendships: Vec<Friendship> = client.store().read(keys::FRIENDSHIPS);
    let friendship = match friendships.iter().find(|f| f.links(me, &from_id)) {
        Some(existing) => existing.clone(),
        None => {
            let f = Friendship {
                id: uuid::Uuid::new_v4().to_string(),
                user_a_id: from_id.clone(),
                user_b_id: me.to_string(),
                created_at: now_ms(),
            };
            friendships.push(f.clone());
            client.store().write(keys::FRIENDSHIPS, &friendships)?;
            f
        }
    };
    client.store().write(keys::FRIEND_REQUESTS, &requests)?;
    tracing::debug!("accepted friend request from {}", from_id);
    Ok(friendship)
}

/// Decline a pending request addressed to me. The sender may try again
/// later; declined rows do not block new requests.
pub fn decline_friend_request_data(client: &ChatClient, request: &str) -> Result<FriendRequest> {
    let me = client.user_id();
    let users: Vec<User> = client.store().read(keys::USERS);
    let mut requests: Vec<FriendRequest> = client.store().read(keys::FRIEND_REQUESTS);

    let idx = find_request_index(&requests, &users, me, request)?;
    if requests[idx].to_user_id != me {
        bail!("Only the recipient can decline a friend request");
    }
    if requests[idx].status != FriendRequestStatus::Pending {
        bail!("This request was already {}", requests[idx].status.as_str());
    }

    requests[idx].status = FriendRequestStatus::Declined;
    let declined = requests[idx].clone();
    client.store().write(keys::FRIEND_REQUESTS, &requests)?;
    Ok(declined)
}

/// Pending requests involving me, newest first.
pub fn list_requests_data(client: &ChatClient) -> Result<Vec<RequestInfo>> {
    let users: Vec<User> = client.store().read(keys::USERS);
    let requests: Vec<FriendRequest> = client.store().read(keys::FRIEND_REQUESTS);
    let me = client.user_id();

    let mut rows: Vec<RequestInfo> = requests
        .iter()
        .filter(|r| r.status == FriendRequestStatus::Pending)
        .filter_map(|r| {
            let (direction, other_id) = if r.to_user_id == me {
                (RequestDirection::Incoming, r.from_user_id.as_str())
            } else if r.from_user_id == me {
                (RequestDirection::Outgoing, r.to_user_id.as_str())
            } else {
                return None;
            };
            let (other_name, other_email) = match users.iter().find(|u| u.id == other_id) {
                Some(u) => (u.name.clone(), u.email.clone()),
                None => ("(unknown)".to_string(), String::new()),
            };
            Some(RequestInfo {
                id: r.id.clone(),
                direction,
                other_user_id: other_id.to_string(),
                other_name,
                other_email,
                created_at: r.created_at,
            })
        })
        .collect();
    rows.sort_by_key(|r| std::cmp::Reverse(r.created_at));
    Ok(rows)
}

/// My friends, sorted by name.
pub fn list_friends_data(client: &ChatClient) -> Result<Vec<FriendInfo>> {
    let users: Vec<User> = client.store().read(keys::USERS);
    let friendships: Vec<Friendship> = client.store().read(keys::FRIENDSHIPS);
    let me = client.user_id();

    let mut rows: Vec<FriendInfo> = friendships
        .iter()
        .filter(|f| f.involves(me))
        .map(|f| {
            let other_id = f.other(me);
            match users.iter().find(|u| u.id == other_id) {
                Some(u) => FriendInfo {
                    user_id: u.id.clone(),
                    name: u.name.clone(),
                    email: u.email.clone(),
                    status: u.status,
                    last_seen_at: u.last_seen_at,
                    friends_since: f.created_at,
                },
                None => FriendInfo {
                    user_id: other_id.to_string(),
                    name: "(unknown)".to_string(),
                    email: String::new(),
                    status: UserStatus::Offline,
                    last_seen_at: 0,
                    friends_since: f.created_at,
                },
            }
        })
        .collect();
    rows.sort_by(|a, b| {
        (a.name.to_lowercase(), &a.user_id).cmp(&(b.name.to_lowercase(), &b.user_id))
    });
    // Duplicate rows can appear when both sides accepted in a race.
    rows.dedup_by(|a, b| a.user_id == b.user_id);
    Ok(rows)
}

/// Send a friend request (prints to stdout).
pub fn send_friend_request(opts: &ClientOpts, target: &str) -> Result<()> {
    let client = ChatClient::new(opts)?;
    let request = send_friend_request_data(&client, target)?;

    let users: Vec<User> = client.store().read(keys::USERS);
    println!("Friend request sent to {}.", display_name(&users, &request.to_user_id));
    Ok(())
}

/// Accept a friend request (prints to stdout).
pub fn accept_friend_request(opts: &ClientOpts, request: &str) -> Result<()> {
    let client = ChatClient::new(opts)?;
    let friendship = accept_friend_request_data(&client, request)?;

    let users: Vec<User> = client.store().read(keys::USERS);
    let other = friendship.other(client.user_id());
    println!("You are now friends with {}.", display_name(&users, other));
    Ok(())
}

/// Decline a friend request (prints to stdout).
pub fn decline_friend_request(opts: &ClientOpts, request: &str) -> Result<()> {
    let client = ChatClient::new(opts)?;
    let declined = decline_friend_request_data(&client, request)?;

    let users: Vec<User> = client.store().read(keys::USERS);
    println!("Declined the request from {}.", display_name(&users, &declined.from_user_id));
    Ok(())
}

/// List pending requests (prints to stdout), optionally filtered to one
/// direction ("incoming" or "outgoing").
pub fn list_requests(opts: &ClientOpts, direction: Option<&str>) -> Result<()> {
    let filter = match direction {
        None => None,
        Some("incoming") => Some(RequestDirection::Incoming),
        Some("outgoing") => Some(RequestDirection::Outgoing),
        Some(other) => bail!("Unknown direction '{}'. Use: incoming, outgoing", other),
    };

    let client = ChatClient::new(opts)?;
    let mut requests = list_requests_data(&client)?;
    if let Some(direction) = filter {
        requests.retain(|r| r.direction == direction);
    }

    println!("\nFriend Requests:");
    println!("{:-<60}", "");
    if requests.is_empty() {
        println!("  (none pending)");
        return Ok(());
    }
    for r in &requests {
        let arrow = match r.direction {
            RequestDirection::Incoming => "from",
            RequestDirection::Outgoing => "to  ",
        };
        println!("{} {} <{}>  {}", arrow, r.other_name, r.other_email, fmt_ago(r.created_at));
        println!("  ID: {}", r.id);
        println!();
    }
    Ok(())
}

/// List friends (prints to stdout).
pub fn list_friends(opts: &ClientOpts) -> Result<()> {
    let client = ChatClient::new(opts)?;
    let friends = list_friends_data(&client)?;

    println!("\nFriends:");
    println!("{:-<60}", "");
    if friends.is_empty() {
        println!("  (no friends yet; send a request with `palaver request <email>`)");
        return Ok(());
    }
    for f in &friends {
        println!("[{}] {} <{}>", f.status.as_str(), f.name, f.email);
        println!("  last seen {}", fmt_ago(f.last_seen_at));
        println!();
    }
    Ok(())
}
