//! Ballot reactions and reading the current ballots off a proposal.

use crate::meeting_vote::error::PlatformError;
use crate::meeting_vote::platform::{Member, ProposalMessage, VotePlatform};

/// The reactions the vote engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VoteReaction {
    Approve,
    Reject,
    Abstain,
    /// Added by the bot once a reminder went out. Never a ballot.
    Remind,
}

impl VoteReaction {
    /// Ballot reactions, in the order they are seeded on a new proposal.
    pub const BALLOTS: [VoteReaction; 3] = [Self::Approve, Self::Reject, Self::Abstain];

    pub fn emoji(self) -> &'static str {
        match self {
            Self::Approve => "\u{1F44D}",
            Self::Reject => "\u{1F44E}",
            Self::Abstain => "\u{1F3F3}",
            Self::Remind => "\u{1F4F3}",
        }
    }

    pub fn from_emoji(emoji: &str) -> Option<Self> {
        // Clients may append a variation selector to the white flag
        let emoji = emoji.trim_end_matches('\u{FE0F}');
        [Self::Approve, Self::Reject, Self::Abstain, Self::Remind]
            .into_iter()
            .find(|r| r.emoji() == emoji)
    }
}

/// The fixed list of users allowed to vote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    electors: Vec<u64>,
}

impl Roster {
    pub fn new(electors: Vec<u64>) -> Self {
        Self { electors }
    }

    pub fn contains(&self, user_id: u64) -> bool {
        self.electors.contains(&user_id)
    }

    pub fn len(&self) -> usize {
        self.electors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.electors.iter().copied()
    }
}

/// Electors holding each ballot reaction at the time of reading.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ballots {
    pub approve: Vec<Member>,
    pub reject: Vec<Member>,
    pub abstain: Vec<Member>,
}

impl Ballots {
    pub fn approve_count(&self) -> usize {
        self.approve.len()
    }

    pub fn reject_count(&self) -> usize {
        self.reject.len()
    }

    pub fn abstain_count(&self) -> usize {
        self.abstain.len()
    }

    /// How many of the three ballot reactions `user_id` currently holds.
    pub fn choices_of(&self, user_id: u64) -> usize {
        [&self.approve, &self.reject, &self.abstain]
            .into_iter()
            .filter(|voters| voters.iter().any(|m| m.user_id == user_id))
            .count()
    }

    pub fn has_voted(&self, user_id: u64) -> bool {
        self.choices_of(user_id) > 0
    }

    /// Split off electors holding more than one ballot.
    ///
    /// They are left out of every collection so no one is counted twice.
    /// Returns the remaining ballots and the ids that were left out.
    pub fn without_conflicts(self) -> (Ballots, Vec<u64>) {
        let mut conflicted: Vec<u64> = Vec::new();
        for m in self.approve.iter().chain(&self.reject).chain(&self.abstain) {
            if self.choices_of(m.user_id) > 1 && !conflicted.contains(&m.user_id) {
                conflicted.push(m.user_id);
            }
        }
        if conflicted.is_empty() {
            return (self, conflicted);
        }

        let keep = |voters: Vec<Member>| -> Vec<Member> {
            voters.into_iter().filter(|m| !conflicted.contains(&m.user_id)).collect()
        };
        let ballots = Ballots {
            approve: keep(self.approve),
            reject: keep(self.reject),
            abstain: keep(self.abstain),
        };
        (ballots, conflicted)
    }

    /// Electors who have not cast any ballot, in roster order.
    pub fn unvoted(&self, roster: &Roster) -> Vec<u64> {
        roster.iter().filter(|&id| !self.has_voted(id)).collect()
    }
}

/// Read the three ballot collections of `message`.
///
/// Bots and users outside the roster are dropped, so every tally only ever
/// counts electors.
pub async fn read_ballots<P: VotePlatform + ?Sized>(
    platform: &P,
    message: &ProposalMessage,
    roster: &Roster,
) -> Result<Ballots, PlatformError> {
    let mut ballots = Ballots::default();
    for reaction in VoteReaction::BALLOTS {
        let users = platform
            .reaction_users(message.channel_id, message.message_id, reaction.emoji())
            .await?;
        let voters: Vec<Member> = users
            .into_iter()
            .filter(|m| !m.is_bot && roster.contains(m.user_id))
            .collect();
        match reaction {
            VoteReaction::Approve => ballots.approve = voters,
            VoteReaction::Reject => ballots.reject = voters,
            VoteReaction::Abstain => ballots.abstain = voters,
            VoteReaction::Remind => {}
        }
    }
    Ok(ballots)
}

/// Whether the bot itself holds the reminder marker on `message`.
pub async fn is_reminded<P: VotePlatform + ?Sized>(
    platform: &P,
    message: &ProposalMessage,
) -> Result<bool, PlatformError> {
    let bot_id = platform.bot_user_id();
    let users = platform
        .reaction_users(message.channel_id, message.message_id, VoteReaction::Remind.emoji())
        .await?;
    Ok(users.iter().any(|m| m.user_id == bot_id))
}
