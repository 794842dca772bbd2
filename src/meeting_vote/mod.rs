//! Meeting vote - turns messages in the vote channel into proposals that the
//! elector roster approves or rejects with reactions.
//!
//! No vote state is stored by the bot. A proposal is active while its message
//! is pinned, ballots are the ballot reactions electors hold on it, and the
//! bot's own reminder reaction marks that a reminder already went out. Every
//! evaluation re-derives all of this from the live message.

pub mod ballot;
pub mod border;
pub mod discord;
pub mod engine;
pub mod error;
pub mod guard;
pub mod notifier;
pub mod platform;
pub mod proposal;
pub mod triggers;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;

pub use ballot::Roster;
pub use discord::DiscordClient;
pub use triggers::{BallotListener, MeetingVoteTask, NewProposalListener};

use engine::ProposalLocks;
use platform::VotePlatform;

/// How long "no voting right" / "choose one" notices stay up.
pub const NOTICE_TTL: Duration = Duration::from_secs(60);

/// Vote engine settings.
#[derive(Debug, Clone)]
pub struct VoteSettings {
    /// The only channel whose messages become proposals.
    pub channel_id: u64,
    pub roster: Roster,
    /// Zone used when rendering dates in announcements.
    pub timezone: Tz,
    pub notice_ttl: Duration,
}

impl VoteSettings {
    pub fn new(channel_id: u64, roster: Roster, timezone: Tz) -> Self {
        Self { channel_id, roster, timezone, notice_ttl: NOTICE_TTL }
    }
}

/// The vote engine for one vote channel.
pub struct MeetingVote<P> {
    platform: Arc<P>,
    settings: VoteSettings,
    locks: ProposalLocks,
}

impl<P: VotePlatform + 'static> MeetingVote<P> {
    pub fn new(platform: Arc<P>, settings: VoteSettings) -> Self {
        Self { platform, settings, locks: ProposalLocks::default() }
    }

    pub fn settings(&self) -> &VoteSettings {
        &self.settings
    }

    #[cfg(test)]
    pub fn platform(&self) -> &Arc<P> {
        &self.platform
    }
}
