//! Event listeners and the periodic sweep that drive the vote engine.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use crate::events::{BotEvent, EventKind, Listener, ListenerError};
use crate::meeting_vote::error::VoteError;
use crate::meeting_vote::platform::VotePlatform;
use crate::meeting_vote::MeetingVote;
use crate::tasks::Task;

/// Opens a proposal for each new message in the vote channel.
pub struct NewProposalListener<P> {
    vote: Arc<MeetingVote<P>>,
}

impl<P> NewProposalListener<P> {
    pub fn new(vote: Arc<MeetingVote<P>>) -> Self {
        Self { vote }
    }
}

#[async_trait]
impl<P: VotePlatform + 'static> Listener for NewProposalListener<P> {
    fn name(&self) -> &'static str {
        "meeting-vote-new"
    }

    fn kind(&self) -> EventKind {
        EventKind::MessageCreate
    }

    async fn handle(&self, event: &BotEvent) -> Result<(), ListenerError> {
        let BotEvent::MessageCreate(message) = event else {
            return Ok(());
        };
        // Ignore chatter outside the channel and our own panels
        if message.channel_id != self.vote.settings().channel_id || message.author.is_bot {
            return Ok(());
        }

        match self.vote.open_proposal(message).await {
            Ok(()) => Ok(()),
            Err(VoteError::InvalidProposal(reason)) => {
                debug!("Message {} not opened: {}", message.message_id, reason);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Passes reactions in the vote channel through the eligibility guard.
pub struct BallotListener<P> {
    vote: Arc<MeetingVote<P>>,
}

impl<P> BallotListener<P> {
    pub fn new(vote: Arc<MeetingVote<P>>) -> Self {
        Self { vote }
    }
}

#[async_trait]
impl<P: VotePlatform + 'static> Listener for BallotListener<P> {
    fn name(&self) -> &'static str {
        "meeting-vote-reaction"
    }

    fn kind(&self) -> EventKind {
        EventKind::ReactionAdd
    }

    async fn handle(&self, event: &BotEvent) -> Result<(), ListenerError> {
        let BotEvent::ReactionAdd(reaction) = event else {
            return Ok(());
        };
        if reaction.channel_id != self.vote.settings().channel_id || reaction.user.is_bot {
            return Ok(());
        }

        let decision = self.vote.handle_reaction(reaction, Utc::now()).await?;
        debug!("Reaction {} on {} -> {:?}", reaction.emoji, reaction.message_id, decision);
        Ok(())
    }
}

/// Re-evaluates every pinned proposal on a fixed interval.
pub struct MeetingVoteTask<P> {
    vote: Arc<MeetingVote<P>>,
    interval: Duration,
}

impl<P> MeetingVoteTask<P> {
    pub fn new(vote: Arc<MeetingVote<P>>, interval: Duration) -> Self {
        Self { vote, interval }
    }
}

#[async_trait]
impl<P: VotePlatform + 'static> Task for MeetingVoteTask<P> {
    fn name(&self) -> &'static str {
        "meeting-vote-sweep"
    }

    fn interval(&self) -> Duration {
        self.interval
    }

    async fn execute(&self) -> Result<(), ListenerError> {
        let summary = self.vote.sweep(Utc::now()).await?;
        if summary.resolved > 0 || summary.reminded > 0 || summary.failed > 0 {
            info!(
                "Sweep checked {} proposal(s): {} resolved, {} reminded, {} failed",
                summary.checked, summary.resolved, summary.reminded, summary.failed
            );
        } else {
            debug!("Sweep checked {} proposal(s)", summary.checked);
        }
        Ok(())
    }
}
