//! Resolution engine - decides what happens to a pinned proposal.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::meeting_vote::ballot::{is_reminded, read_ballots, Ballots, VoteReaction};
use crate::meeting_vote::border::border;
use crate::meeting_vote::error::VoteError;
use crate::meeting_vote::notifier;
use crate::meeting_vote::platform::{ProposalMessage, VotePlatform};
use crate::meeting_vote::proposal::{expire_at, remind_at};
use crate::meeting_vote::MeetingVote;

/// Why a proposal was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    MajorityAgainst,
    UnanimousAbstain,
    DeadlineExpired,
}

/// Result of judging a tally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Approved,
    Rejected(RejectReason),
    /// Unresolved. `remind_due` is set once the reminder window has opened.
    Pending { remind_due: bool },
}

/// A final outcome, the only kind that gets announced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Rejected(RejectReason),
}

/// Ballot counts plus the Border they are judged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tally {
    pub approve: usize,
    pub reject: usize,
    pub abstain: usize,
    pub border: usize,
}

impl Tally {
    pub fn new(ballots: &Ballots, text: &str, electors: usize) -> Self {
        let abstain = ballots.abstain_count();
        Self {
            approve: ballots.approve_count(),
            reject: ballots.reject_count(),
            abstain,
            border: border(text, electors, abstain),
        }
    }
}

/// Judge a tally. Approval is checked before rejection, so an override low
/// enough for both sides to reach the Border approves.
pub fn judge(
    tally: &Tally,
    electors: usize,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Outcome {
    if tally.approve >= tally.border {
        return Outcome::Approved;
    }
    if tally.reject >= tally.border {
        return Outcome::Rejected(RejectReason::MajorityAgainst);
    }
    if tally.abstain == electors {
        return Outcome::Rejected(RejectReason::UnanimousAbstain);
    }
    if now >= expire_at(created_at) {
        return Outcome::Rejected(RejectReason::DeadlineExpired);
    }
    Outcome::Pending { remind_due: now >= remind_at(created_at) }
}

/// What one evaluation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// The message is not pinned (never opened, or already resolved).
    Inactive,
    Approved,
    Rejected(RejectReason),
    Reminded,
    Pending,
}

/// Counts from one sweep over the pinned proposals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub checked: usize,
    pub resolved: usize,
    pub reminded: usize,
    pub failed: usize,
}

/// Per-proposal locks so the reaction path and the sweep never evaluate the
/// same proposal at once.
#[derive(Default)]
pub struct ProposalLocks {
    locks: Mutex<HashMap<u64, Arc<AsyncMutex<()>>>>,
}

impl ProposalLocks {
    pub async fn acquire(&self, message_id: u64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(message_id).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drop the lock of a proposal that can no longer become active.
    pub fn forget(&self, message_id: u64) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.remove(&message_id);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl<P: VotePlatform + 'static> MeetingVote<P> {
    /// Evaluate one proposal and act on the outcome.
    ///
    /// The message is re-fetched under the proposal's lock, so a trigger that
    /// loses the race to a resolving evaluation sees it unpinned.
    pub async fn evaluate(
        &self,
        message_id: u64,
        now: DateTime<Utc>,
    ) -> Result<Evaluation, VoteError> {
        let _guard = self.locks.acquire(message_id).await;

        let message = self
            .platform
            .fetch_message(self.settings.channel_id, message_id)
            .await?;
        if !message.pinned {
            debug!("Message {} is not an active proposal", message_id);
            self.locks.forget(message_id);
            return Ok(Evaluation::Inactive);
        }

        let roster = &self.settings.roster;
        let (ballots, conflicted) = read_ballots(&*self.platform, &message, roster)
            .await?
            .without_conflicts();
        if !conflicted.is_empty() {
            warn!(
                "Proposal {}: elector(s) {:?} hold more than one ballot, not counted",
                message_id, conflicted
            );
        }
        let tally = Tally::new(&ballots, &message.content, roster.len());

        let evaluation = match judge(&tally, roster.len(), message.created_at, now) {
            Outcome::Approved => {
                self.resolve(&message, &ballots, &tally, Verdict::Approved).await?;
                Evaluation::Approved
            }
            Outcome::Rejected(reason) => {
                self.resolve(&message, &ballots, &tally, Verdict::Rejected(reason)).await?;
                Evaluation::Rejected(reason)
            }
            Outcome::Pending { remind_due: true } => {
                if is_reminded(&*self.platform, &message).await? {
                    Evaluation::Pending
                } else {
                    self.remind(&message, &ballots).await?;
                    Evaluation::Reminded
                }
            }
            Outcome::Pending { remind_due: false } => Evaluation::Pending,
        };

        debug!(
            "Proposal {}: {}/{}/{} border {} -> {:?}",
            message_id, tally.approve, tally.reject, tally.abstain, tally.border, evaluation
        );
        Ok(evaluation)
    }

    /// Evaluate every pinned message in the vote channel.
    ///
    /// A failing proposal is logged and skipped; the next trigger retries it.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<SweepSummary, VoteError> {
        let pinned = self.platform.pinned_messages(self.settings.channel_id).await?;
        let mut summary = SweepSummary::default();

        for message in pinned {
            summary.checked += 1;
            match self.evaluate(message.message_id, now).await {
                Ok(Evaluation::Approved | Evaluation::Rejected(_)) => summary.resolved += 1,
                Ok(Evaluation::Reminded) => summary.reminded += 1,
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to evaluate proposal {}: {e}", message.message_id);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Announce a final outcome, then unpin.
    async fn resolve(
        &self,
        message: &ProposalMessage,
        ballots: &Ballots,
        tally: &Tally,
        verdict: Verdict,
    ) -> Result<(), VoteError> {
        let announcement = notifier::outcome(message, ballots, tally, verdict, self.settings.timezone);
        // Unpin only after the announcement is out
        self.platform
            .send_reply(message.channel_id, message.message_id, &announcement)
            .await?;
        self.platform.unpin(message.channel_id, message.message_id).await?;
        self.locks.forget(message.message_id);

        info!(
            "✅ Proposal {} resolved: {:?} ({}/{}/{}, border {})",
            message.message_id, verdict, tally.approve, tally.reject, tally.abstain, tally.border
        );
        Ok(())
    }

    /// Remind electors who have not voted, then set the reminder marker.
    async fn remind(&self, message: &ProposalMessage, ballots: &Ballots) -> Result<(), VoteError> {
        let unvoted = ballots.unvoted(&self.settings.roster);
        let expires = expire_at(message.created_at);
        let announcement = notifier::reminder(message, &unvoted, expires, self.settings.timezone);
        self.platform
            .send_reply(message.channel_id, message.message_id, &announcement)
            .await?;
        self.platform
            .add_reaction(message.channel_id, message.message_id, VoteReaction::Remind.emoji())
            .await?;

        info!("🔔 Reminded {} elector(s) about proposal {}", unvoted.len(), message.message_id);
        Ok(())
    }
}
