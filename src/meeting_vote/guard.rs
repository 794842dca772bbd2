//! Eligibility guard for ballot reactions.

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::meeting_vote::ballot::{read_ballots, VoteReaction};
use crate::meeting_vote::engine::Evaluation;
use crate::meeting_vote::error::VoteError;
use crate::meeting_vote::notifier;
use crate::meeting_vote::platform::{Announcement, ReactionEvent, VotePlatform};
use crate::meeting_vote::MeetingVote;

/// What the guard did with a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    /// Not a reaction on an active proposal.
    Ignored,
    /// The reactor is not an elector; the reaction was removed.
    NotElector,
    /// The elector already held another ballot; the new reaction was removed.
    MultipleChoice,
    /// Valid ballot, handed to the resolution engine.
    Accepted(Evaluation),
}

impl<P: VotePlatform + 'static> MeetingVote<P> {
    /// Gate a freshly added reaction before it reaches the resolution engine.
    pub async fn handle_reaction(
        &self,
        reaction: &ReactionEvent,
        now: DateTime<Utc>,
    ) -> Result<GuardDecision, VoteError> {
        if reaction.channel_id != self.settings.channel_id || reaction.user.is_bot {
            return Ok(GuardDecision::Ignored);
        }

        let message = self
            .platform
            .fetch_message(reaction.channel_id, reaction.message_id)
            .await?;
        if !message.pinned {
            debug!("Reaction on unpinned message {} ignored", reaction.message_id);
            return Ok(GuardDecision::Ignored);
        }

        let user = &reaction.user;
        if !self.settings.roster.contains(user.user_id) {
            info!("🚫 {} ({}) has no voting right on {}", user.name, user.user_id, reaction.message_id);
            self.reject_reaction(reaction, notifier::no_voting_right(user.user_id)).await;
            return Ok(GuardDecision::NotElector);
        }

        let is_ballot = matches!(
            VoteReaction::from_emoji(&reaction.emoji),
            Some(VoteReaction::Approve | VoteReaction::Reject | VoteReaction::Abstain)
        );
        if is_ballot {
            let ballots = read_ballots(&*self.platform, &message, &self.settings.roster).await?;
            if ballots.choices_of(user.user_id) > 1 {
                info!(
                    "🚫 {} ({}) tried to cast a second ballot on {}",
                    user.name, user.user_id, reaction.message_id
                );
                self.reject_reaction(reaction, notifier::multiple_choice(user.user_id)).await;
                return Ok(GuardDecision::MultipleChoice);
            }
        }

        let evaluation = self.evaluate(reaction.message_id, now).await?;
        Ok(GuardDecision::Accepted(evaluation))
    }

    /// Remove the reaction and post a notice that deletes itself later.
    ///
    /// Failures are logged only, so the event loop is never blocked.
    async fn reject_reaction(&self, reaction: &ReactionEvent, notice: Announcement) {
        if let Err(e) = self
            .platform
            .remove_reaction(reaction.channel_id, reaction.message_id, reaction.user.user_id, &reaction.emoji)
            .await
        {
            warn!("{e}");
        }

        let notice_id = match self
            .platform
            .send_reply(reaction.channel_id, reaction.message_id, &notice)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!("{e}");
                return;
            }
        };

        let platform = self.platform.clone();
        let channel_id = reaction.channel_id;
        let ttl = self.settings.notice_ttl;
        tokio::spawn(async move {
            tokio::time::sleep(ttl).await;
            if let Err(e) = platform.delete_message(channel_id, notice_id).await {
                warn!("{e}");
            }
        });
    }
}
