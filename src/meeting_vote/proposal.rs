//! Promoting a fresh message to an active proposal.

use chrono::{DateTime, Duration, Utc};
use tracing::{info, warn};

use crate::meeting_vote::ballot::VoteReaction;
use crate::meeting_vote::border::border;
use crate::meeting_vote::error::{InvalidProposal, VoteError};
use crate::meeting_vote::notifier;
use crate::meeting_vote::platform::{MessageKind, ProposalMessage, VotePlatform};
use crate::meeting_vote::MeetingVote;

/// Days after creation when electors who have not voted get a reminder.
pub const REMIND_AFTER_DAYS: i64 = 7;

/// Days after creation when an unresolved proposal is rejected.
pub const EXPIRE_AFTER_DAYS: i64 = 14;

pub fn remind_at(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::days(REMIND_AFTER_DAYS)
}

pub fn expire_at(created_at: DateTime<Utc>) -> DateTime<Utc> {
    created_at + Duration::days(EXPIRE_AFTER_DAYS)
}

impl<P: VotePlatform + 'static> MeetingVote<P> {
    /// Check that `message` may become a proposal.
    pub fn validate_new(&self, message: &ProposalMessage) -> Result<(), InvalidProposal> {
        if message.channel_id != self.settings.channel_id {
            return Err(InvalidProposal::WrongChannel);
        }
        if message.kind != MessageKind::Plain {
            return Err(InvalidProposal::NotPlainMessage);
        }
        if message.author.is_bot {
            return Err(InvalidProposal::BotAuthor);
        }
        if message.pinned {
            return Err(InvalidProposal::AlreadyPinned);
        }
        Ok(())
    }

    /// Open a vote on `message`: pin it, seed the ballot reactions and post
    /// the instructions panel.
    ///
    /// Re-invoking on the same message fails with `AlreadyPinned`.
    pub async fn open_proposal(&self, message: &ProposalMessage) -> Result<(), VoteError> {
        self.validate_new(message)?;

        let channel_id = message.channel_id;
        self.platform.pin(channel_id, message.message_id).await?;
        info!("🗳️ New proposal {} from {}", message.message_id, message.author.name);

        for reaction in VoteReaction::BALLOTS {
            self.platform
                .add_reaction(channel_id, message.message_id, reaction.emoji())
                .await?;
        }

        // Nobody has abstained yet
        let border = border(&message.content, self.settings.roster.len(), 0);
        let expires = expire_at(message.created_at);
        let panel = notifier::instructions(message, border, expires, self.settings.timezone);

        if let Err(e) = self.platform.send_reply(channel_id, message.message_id, &panel).await {
            warn!("Proposal {} is open but the instructions panel failed: {e}", message.message_id);
            return Err(e.into());
        }

        info!(
            "Proposal {} open (border {}, remind at {}, expires at {})",
            message.message_id,
            border,
            remind_at(message.created_at),
            expire_at(message.created_at)
        );
        Ok(())
    }
}
