//! Messaging platform port used by the vote engine.
//!
//! The engine never talks to Discord directly: everything it reads (pins,
//! reactions, message text) and writes (replies, reactions, pins) goes through
//! [`VotePlatform`], so the whole state machine can run against a fake.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::meeting_vote::error::PlatformError;

/// What kind of message was posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// An ordinary user message.
    Plain,
    /// Replies, joins, pin notices and every other system message.
    Other,
}

/// A user as seen on a message or reaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub user_id: u64,
    pub name: String,
    pub is_bot: bool,
}

/// Snapshot of a message in the vote channel.
#[derive(Debug, Clone)]
pub struct ProposalMessage {
    pub message_id: u64,
    pub channel_id: u64,
    pub guild_id: Option<u64>,
    pub author: Member,
    pub kind: MessageKind,
    pub created_at: DateTime<Utc>,
    pub content: String,
    pub pinned: bool,
    /// Jump link back to the message.
    pub link: String,
}

/// A reaction that was just added to a message.
#[derive(Debug, Clone)]
pub struct ReactionEvent {
    pub channel_id: u64,
    pub message_id: u64,
    pub guild_id: Option<u64>,
    pub user: Member,
    pub emoji: String,
}

/// A reply posted by the bot.
///
/// Rendered by the adapter as message content plus a single embed.
#[derive(Debug, Clone, PartialEq)]
pub struct Announcement {
    /// Plain content outside the embed, used for mentions.
    pub content: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub fields: Vec<EmbedField>,
    pub footer: Option<String>,
    pub colour: u32,
    /// Post without triggering push notifications.
    pub silent: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
}

impl EmbedField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self { name: name.into(), value: value.into() }
    }
}

impl Announcement {
    /// Find a field value by name.
    #[cfg(test)]
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.value.as_str())
    }
}

/// Platform operations the vote engine depends on.
#[async_trait]
pub trait VotePlatform: Send + Sync {
    /// The bot's own user id.
    fn bot_user_id(&self) -> u64;

    async fn fetch_message(&self, channel_id: u64, message_id: u64) -> Result<ProposalMessage, PlatformError>;

    async fn pinned_messages(&self, channel_id: u64) -> Result<Vec<ProposalMessage>, PlatformError>;

    async fn pin(&self, channel_id: u64, message_id: u64) -> Result<(), PlatformError>;

    async fn unpin(&self, channel_id: u64, message_id: u64) -> Result<(), PlatformError>;

    /// React to a message as the bot.
    async fn add_reaction(&self, channel_id: u64, message_id: u64, emoji: &str) -> Result<(), PlatformError>;

    async fn remove_reaction(
        &self,
        channel_id: u64,
        message_id: u64,
        user_id: u64,
        emoji: &str,
    ) -> Result<(), PlatformError>;

    /// Everyone currently holding `emoji` on the message, bots included.
    async fn reaction_users(&self, channel_id: u64, message_id: u64, emoji: &str) -> Result<Vec<Member>, PlatformError>;

    /// Post `announcement` as a reply to `reply_to`. Returns the new message id.
    async fn send_reply(
        &self,
        channel_id: u64,
        reply_to: u64,
        announcement: &Announcement,
    ) -> Result<u64, PlatformError>;

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<(), PlatformError>;
}
