//! Discord client using serenity.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::builder::{CreateEmbed, CreateEmbedFooter, CreateMessage};
use serenity::http::Http;
use serenity::model::channel::{Message, MessageFlags, MessageType, Reaction, ReactionType};
use serenity::model::id::{ChannelId, MessageId, UserId};
use serenity::model::user::User;
use serenity::model::{Colour, Timestamp};
use tracing::{info, warn};

use crate::meeting_vote::error::PlatformError;
use crate::meeting_vote::platform::{
    Announcement, Member, MessageKind, ProposalMessage, ReactionEvent, VotePlatform,
};

/// Reactions are read in one page; the roster is far smaller than this.
const REACTION_PAGE: u8 = 100;

/// Discord API client.
pub struct DiscordClient {
    http: Arc<Http>,
    bot_user_id: u64,
}

impl DiscordClient {
    pub fn new(http: Arc<Http>, bot_user_id: u64) -> Self {
        Self { http, bot_user_id }
    }
}

fn failed(action: &'static str, e: serenity::Error) -> PlatformError {
    let err = PlatformError::new(action, e.to_string());
    warn!("{}", err);
    err
}

fn reaction_type(emoji: &str) -> ReactionType {
    ReactionType::Unicode(emoji.to_string())
}

pub fn member_from_user(user: &User) -> Member {
    Member {
        user_id: user.id.get(),
        name: user.name.clone(),
        is_bot: user.bot,
    }
}

fn timestamp_to_utc(ts: Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp(ts.unix_timestamp(), 0).unwrap_or_default()
}

pub fn proposal_from_message(msg: &Message) -> ProposalMessage {
    ProposalMessage {
        message_id: msg.id.get(),
        channel_id: msg.channel_id.get(),
        guild_id: msg.guild_id.map(|g| g.get()),
        author: member_from_user(&msg.author),
        kind: if msg.kind == MessageType::Regular { MessageKind::Plain } else { MessageKind::Other },
        created_at: timestamp_to_utc(msg.timestamp),
        content: msg.content.clone(),
        pinned: msg.pinned,
        link: msg.link(),
    }
}

/// Emoji text for a gateway reaction. Custom emoji never match a ballot.
pub fn emoji_text(emoji: &ReactionType) -> String {
    match emoji {
        ReactionType::Unicode(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn reaction_event(reaction: &Reaction, user: &User) -> ReactionEvent {
    ReactionEvent {
        channel_id: reaction.channel_id.get(),
        message_id: reaction.message_id.get(),
        guild_id: reaction.guild_id.map(|g| g.get()),
        user: member_from_user(user),
        emoji: emoji_text(&reaction.emoji),
    }
}

fn build_message(announcement: &Announcement, reply_to: (ChannelId, MessageId)) -> CreateMessage {
    let mut embed = CreateEmbed::new()
        .colour(Colour::new(announcement.colour))
        .timestamp(Timestamp::now());
    if let Some(title) = &announcement.title {
        embed = embed.title(title);
    }
    if let Some(description) = &announcement.description {
        embed = embed.description(description);
    }
    for field in &announcement.fields {
        embed = embed.field(&field.name, &field.value, false);
    }
    if let Some(footer) = &announcement.footer {
        embed = embed.footer(CreateEmbedFooter::new(footer));
    }

    let mut message = CreateMessage::new().embed(embed).reference_message(reply_to);
    if let Some(content) = &announcement.content {
        message = message.content(content);
    }
    if announcement.silent {
        message = message.flags(MessageFlags::SUPPRESS_NOTIFICATIONS);
    }
    message
}

#[async_trait]
impl VotePlatform for DiscordClient {
    fn bot_user_id(&self) -> u64 {
        self.bot_user_id
    }

    async fn fetch_message(&self, channel_id: u64, message_id: u64) -> Result<ProposalMessage, PlatformError> {
        let http = &self.http;
        ChannelId::new(channel_id)
            .message(http, MessageId::new(message_id))
            .await
            .map(|msg| proposal_from_message(&msg))
            .map_err(|e| failed("fetch message", e))
    }

    async fn pinned_messages(&self, channel_id: u64) -> Result<Vec<ProposalMessage>, PlatformError> {
        let http = &self.http;
        let pins = ChannelId::new(channel_id)
            .pins(http)
            .await
            .map_err(|e| failed("fetch pinned messages", e))?;
        Ok(pins.iter().map(proposal_from_message).collect())
    }

    async fn pin(&self, channel_id: u64, message_id: u64) -> Result<(), PlatformError> {
        info!("📌 Pinning message {} in channel {}", message_id, channel_id);
        let http = &self.http;
        ChannelId::new(channel_id)
            .pin(http, MessageId::new(message_id))
            .await
            .map_err(|e| failed("pin message", e))
    }

    async fn unpin(&self, channel_id: u64, message_id: u64) -> Result<(), PlatformError> {
        info!("Unpinning message {} in channel {}", message_id, channel_id);
        let http = &self.http;
        ChannelId::new(channel_id)
            .unpin(http, MessageId::new(message_id))
            .await
            .map_err(|e| failed("unpin message", e))
    }

    async fn add_reaction(&self, channel_id: u64, message_id: u64, emoji: &str) -> Result<(), PlatformError> {
        info!("Adding reaction {} to msg {} in channel {}", emoji, message_id, channel_id);
        let http = &self.http;
        ChannelId::new(channel_id)
            .create_reaction(http, MessageId::new(message_id), reaction_type(emoji))
            .await
            .map_err(|e| failed("add reaction", e))
    }

    async fn remove_reaction(
        &self,
        channel_id: u64,
        message_id: u64,
        user_id: u64,
        emoji: &str,
    ) -> Result<(), PlatformError> {
        info!("🗑️ Removing reaction {} of user {} from msg {}", emoji, user_id, message_id);
        let http = &self.http;
        ChannelId::new(channel_id)
            .delete_reaction(http, MessageId::new(message_id), Some(UserId::new(user_id)), reaction_type(emoji))
            .await
            .map_err(|e| failed("remove reaction", e))
    }

    async fn reaction_users(&self, channel_id: u64, message_id: u64, emoji: &str) -> Result<Vec<Member>, PlatformError> {
        let http = &self.http;
        let users = ChannelId::new(channel_id)
            .reaction_users(http, MessageId::new(message_id), reaction_type(emoji), Some(REACTION_PAGE), None::<UserId>)
            .await
            .map_err(|e| failed("read reactions", e))?;
        Ok(users.iter().map(member_from_user).collect())
    }

    async fn send_reply(
        &self,
        channel_id: u64,
        reply_to: u64,
        announcement: &Announcement,
    ) -> Result<u64, PlatformError> {
        let channel = ChannelId::new(channel_id);
        let builder = build_message(announcement, (channel, MessageId::new(reply_to)));
        let http = &self.http;
        channel
            .send_message(http, builder)
            .await
            .map(|msg| msg.id.get())
            .map_err(|e| failed("send message", e))
    }

    async fn delete_message(&self, channel_id: u64, message_id: u64) -> Result<(), PlatformError> {
        info!("🗑️ Deleting message {} in channel {}", message_id, channel_id);
        let http = &self.http;
        ChannelId::new(channel_id)
            .delete_message(http, MessageId::new(message_id))
            .await
            .map_err(|e| failed("delete message", e))
    }
}
