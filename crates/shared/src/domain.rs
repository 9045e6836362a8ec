use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

const LOCAL_ID_PREFIX: &str = "local:";

/// Opaque message identifier assigned by the remote service.
///
/// Messages appended before the service has confirmed them carry a
/// client-generated id with a `local:` prefix until the confirmed copy
/// replaces them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn local() -> Self {
        Self(format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4()))
    }

    pub fn is_local(&self) -> bool {
        self.0.starts_with(LOCAL_ID_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Direction of a single vote click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    Upvote,
    Downvote,
}

/// The local user's standing vote on a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserVote {
    #[default]
    None,
    Upvote,
    Downvote,
}

impl From<VoteDirection> for UserVote {
    fn from(value: VoteDirection) -> Self {
        match value {
            VoteDirection::Upvote => UserVote::Upvote,
            VoteDirection::Downvote => UserVote::Downvote,
        }
    }
}

impl UserVote {
    pub fn direction(self) -> Option<VoteDirection> {
        match self {
            UserVote::None => None,
            UserVote::Upvote => Some(VoteDirection::Upvote),
            UserVote::Downvote => Some(VoteDirection::Downvote),
        }
    }
}

/// Counters and vote state of one message, moved around as a unit so a
/// partial update is never observable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteTally {
    pub upvotes: u32,
    pub downvotes: u32,
    pub user_vote: UserVote,
}

impl VoteTally {
    pub fn new(upvotes: u32, downvotes: u32, user_vote: UserVote) -> Self {
        Self {
            upvotes,
            downvotes,
            user_vote,
        }
    }
}

/// A feed message as the remote service reports it.
///
/// The service names its fields `_id` and `username`; `id` and `author` are
/// accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "_id", alias = "id")]
    pub id: MessageId,
    #[serde(rename = "username", alias = "author")]
    pub author: String,
    pub content: String,
    #[serde(default, deserialize_with = "non_negative_count")]
    pub upvotes: u32,
    #[serde(default, deserialize_with = "non_negative_count")]
    pub downvotes: u32,
    #[serde(rename = "userVote", default, deserialize_with = "user_vote_or_none")]
    pub user_vote: UserVote,
    #[serde(
        rename = "createdAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl Message {
    pub fn tally(&self) -> VoteTally {
        VoteTally {
            upvotes: self.upvotes,
            downvotes: self.downvotes,
            user_vote: self.user_vote,
        }
    }

    pub fn set_tally(&mut self, tally: VoteTally) {
        self.upvotes = tally.upvotes;
        self.downvotes = tally.downvotes;
        self.user_vote = tally.user_vote;
    }
}

// The service applies unchecked increments, so a counter can come back negative.
fn non_negative_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(raw.clamp(0, i64::from(u32::MAX)) as u32)
}

fn user_vote_or_none<'de, D>(deserializer: D) -> Result<UserVote, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<UserVote>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
#[path = "tests/domain_tests.rs"]
mod tests;
