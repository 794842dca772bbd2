//! Scenario tests for the meeting vote engine, run against an in-memory
//! platform.
//!
//! Run with: cargo test meeting_vote

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use super::*;
use crate::events::{BotEvent, Listener};
use crate::meeting_vote::engine::{Evaluation, RejectReason, SweepSummary};
use crate::meeting_vote::error::{InvalidProposal, PlatformError, VoteError};
use crate::meeting_vote::guard::GuardDecision;
use crate::meeting_vote::notifier::{
    BLUE, FIELD_BORDER, FIELD_CONTENT, FIELD_ELECTORS, FIELD_TALLY, GREEN, RED, YELLOW,
};
use crate::meeting_vote::platform::{
    Announcement, Member, MessageKind, ProposalMessage, ReactionEvent, VotePlatform,
};
use crate::tasks::Task;

const CHANNEL: u64 = 100;
const GUILD: u64 = 1;
const BOT: u64 = 999;
const ELECTORS: [u64; 5] = [1, 2, 3, 4, 5];
const OUTSIDER: u64 = 42;

const APPROVE: &str = "\u{1F44D}";
const REJECT: &str = "\u{1F44E}";
const ABSTAIN: &str = "\u{1F3F3}";
const REMIND: &str = "\u{1F4F3}";

// =============================================================================
// FAKE PLATFORM
// =============================================================================

#[derive(Debug, Clone)]
struct Sent {
    id: u64,
    reply_to: u64,
    announcement: Announcement,
}

#[derive(Default)]
struct State {
    messages: HashMap<u64, ProposalMessage>,
    reactions: HashMap<(u64, String), Vec<Member>>,
    sent: Vec<Sent>,
    deleted: Vec<u64>,
    next_id: u64,
    fail_send: bool,
    fail_fetch: HashSet<u64>,
    fail_pins: bool,
}

struct FakePlatform {
    state: Mutex<State>,
}

impl FakePlatform {
    fn new() -> Self {
        Self { state: Mutex::new(State { next_id: 10_000, ..State::default() }) }
    }

    fn bot() -> Member {
        Member { user_id: BOT, name: "meetingbot".to_string(), is_bot: true }
    }

    fn insert(&self, message: ProposalMessage) {
        self.state.lock().unwrap().messages.insert(message.message_id, message);
    }

    /// A user adds a reaction (the platform side of a reaction event).
    fn react(&self, message_id: u64, emoji: &str, member: Member) {
        let mut state = self.state.lock().unwrap();
        let users = state.reactions.entry((message_id, emoji.to_string())).or_default();
        if !users.iter().any(|m| m.user_id == member.user_id) {
            users.push(member);
        }
    }

    fn reactors(&self, message_id: u64, emoji: &str) -> Vec<u64> {
        let state = self.state.lock().unwrap();
        state
            .reactions
            .get(&(message_id, emoji.to_string()))
            .map(|users| users.iter().map(|m| m.user_id).collect())
            .unwrap_or_default()
    }

    fn is_pinned(&self, message_id: u64) -> bool {
        self.state.lock().unwrap().messages[&message_id].pinned
    }

    fn sent(&self) -> Vec<Sent> {
        self.state.lock().unwrap().sent.clone()
    }

    fn deleted(&self) -> Vec<u64> {
        self.state.lock().unwrap().deleted.clone()
    }

    fn set_fail_send(&self, fail: bool) {
        self.state.lock().unwrap().fail_send = fail;
    }

    fn fail_fetch(&self, message_id: u64) {
        self.state.lock().unwrap().fail_fetch.insert(message_id);
    }

    fn set_fail_pins(&self, fail: bool) {
        self.state.lock().unwrap().fail_pins = fail;
    }
}

#[async_trait]
impl VotePlatform for FakePlatform {
    fn bot_user_id(&self) -> u64 {
        BOT
    }

    async fn fetch_message(&self, _channel_id: u64, message_id: u64) -> Result<ProposalMessage, PlatformError> {
        let state = self.state.lock().unwrap();
        if state.fail_fetch.contains(&message_id) {
            return Err(PlatformError::new("fetch message", "503 Service Unavailable"));
        }
        state
            .messages
            .get(&message_id)
            .cloned()
            .ok_or_else(|| PlatformError::new("fetch message", "Unknown Message"))
    }

    async fn pinned_messages(&self, channel_id: u64) -> Result<Vec<ProposalMessage>, PlatformError> {
        let state = self.state.lock().unwrap();
        if state.fail_pins {
            return Err(PlatformError::new("fetch pinned messages", "502 Bad Gateway"));
        }
        let mut pinned: Vec<_> = state
            .messages
            .values()
            .filter(|m| m.channel_id == channel_id && m.pinned)
            .cloned()
            .collect();
        pinned.sort_by_key(|m| m.message_id);
        Ok(pinned)
    }

    async fn pin(&self, _channel_id: u64, message_id: u64) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        let message = state
            .messages
            .get_mut(&message_id)
            .ok_or_else(|| PlatformError::new("pin message", "Unknown Message"))?;
        message.pinned = true;
        Ok(())
    }

    async fn unpin(&self, _channel_id: u64, message_id: u64) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        let message = state
            .messages
            .get_mut(&message_id)
            .ok_or_else(|| PlatformError::new("unpin message", "Unknown Message"))?;
        message.pinned = false;
        Ok(())
    }

    async fn add_reaction(&self, _channel_id: u64, message_id: u64, emoji: &str) -> Result<(), PlatformError> {
        self.react(message_id, emoji, Self::bot());
        Ok(())
    }

    async fn remove_reaction(
        &self,
        _channel_id: u64,
        message_id: u64,
        user_id: u64,
        emoji: &str,
    ) -> Result<(), PlatformError> {
        let mut state = self.state.lock().unwrap();
        if let Some(users) = state.reactions.get_mut(&(message_id, emoji.to_string())) {
            users.retain(|m| m.user_id != user_id);
        }
        Ok(())
    }

    async fn reaction_users(&self, _channel_id: u64, message_id: u64, emoji: &str) -> Result<Vec<Member>, PlatformError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .reactions
            .get(&(message_id, emoji.to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn send_reply(
        &self,
        _channel_id: u64,
        reply_to: u64,
        announcement: &Announcement,
    ) -> Result<u64, PlatformError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_send {
            return Err(PlatformError::new("send message", "Missing Permissions"));
        }
        state.next_id += 1;
        let id = state.next_id;
        state.sent.push(Sent { id, reply_to, announcement: announcement.clone() });
        Ok(id)
    }

    async fn delete_message(&self, _channel_id: u64, message_id: u64) -> Result<(), PlatformError> {
        self.state.lock().unwrap().deleted.push(message_id);
        Ok(())
    }
}

// =============================================================================
// HELPERS
// =============================================================================

fn created() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()
}

fn member(user_id: u64) -> Member {
    let name = match user_id {
        1 => "zakuro",
        2 => "hiratake",
        3 => "tomachi",
        4 => "omelet",
        5 => "yuua",
        _ => "visitor",
    };
    Member { user_id, name: name.to_string(), is_bot: false }
}

fn setup() -> (Arc<FakePlatform>, Arc<MeetingVote<FakePlatform>>) {
    let platform = Arc::new(FakePlatform::new());
    let mut settings = VoteSettings::new(CHANNEL, Roster::new(ELECTORS.to_vec()), chrono_tz::UTC);
    settings.notice_ttl = StdDuration::from_millis(10);
    let vote = Arc::new(MeetingVote::new(platform.clone(), settings));
    (platform, vote)
}

fn message(message_id: u64, content: &str, created_at: DateTime<Utc>) -> ProposalMessage {
    ProposalMessage {
        message_id,
        channel_id: CHANNEL,
        guild_id: Some(GUILD),
        author: member(1),
        kind: MessageKind::Plain,
        created_at,
        content: content.to_string(),
        pinned: false,
        link: format!("https://discord.com/channels/{GUILD}/{CHANNEL}/{message_id}"),
    }
}

/// Post a message and open it as a proposal.
async fn open(
    platform: &FakePlatform,
    vote: &MeetingVote<FakePlatform>,
    message_id: u64,
    content: &str,
    created_at: DateTime<Utc>,
) {
    let msg = message(message_id, content, created_at);
    platform.insert(msg.clone());
    vote.open_proposal(&msg).await.expect("proposal should open");
}

fn reaction(message_id: u64, user_id: u64, emoji: &str) -> ReactionEvent {
    ReactionEvent {
        channel_id: CHANNEL,
        message_id,
        guild_id: Some(GUILD),
        user: member(user_id),
        emoji: emoji.to_string(),
    }
}

/// Add a reaction on the platform, then deliver the event to the guard.
async fn vote_with(
    platform: &FakePlatform,
    vote: &MeetingVote<FakePlatform>,
    message_id: u64,
    user_id: u64,
    emoji: &str,
    now: DateTime<Utc>,
) -> GuardDecision {
    platform.react(message_id, emoji, member(user_id));
    vote.handle_reaction(&reaction(message_id, user_id, emoji), now)
        .await
        .expect("guard should not fail")
}

fn last_announcement(platform: &FakePlatform) -> Announcement {
    platform.sent().last().expect("something was posted").announcement.clone()
}

// =============================================================================
// NEW PROPOSAL
// =============================================================================

mod new_proposal {
    use super::*;

    #[tokio::test]
    async fn test_opens_pins_and_seeds_ballots() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "Let's buy a microphone", created()).await;

        assert!(platform.is_pinned(1));
        for emoji in [APPROVE, REJECT, ABSTAIN] {
            assert_eq!(platform.reactors(1, emoji), vec![BOT]);
        }

        let sent = platform.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].reply_to, 1);
        let panel = &sent[0].announcement;
        assert_eq!(panel.colour, YELLOW);
        assert!(panel.silent);
        assert!(panel.description.as_deref().unwrap().contains("<@1>"));
        assert!(panel.field(FIELD_BORDER).unwrap().contains('3'));
        assert!(panel.field("Deadline").unwrap().contains("2026/04/15 09:00:00"));
    }

    #[tokio::test]
    async fn test_panel_uses_override() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "Small thing [Border:2]", created()).await;

        let panel = last_announcement(&platform);
        assert!(panel.field(FIELD_BORDER).unwrap().contains("at 2 votes"));
    }

    #[tokio::test]
    async fn test_reopen_is_rejected_without_side_effects() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;

        let pinned = vote.platform().fetch_message(CHANNEL, 1).await.unwrap();
        let err = vote.open_proposal(&pinned).await.unwrap_err();
        assert!(matches!(err, VoteError::InvalidProposal(InvalidProposal::AlreadyPinned)));
        assert_eq!(platform.sent().len(), 1);
        assert_eq!(platform.reactors(1, APPROVE), vec![BOT]);
    }

    #[tokio::test]
    async fn test_invalid_messages() {
        let (platform, vote) = setup();

        let mut wrong_channel = message(1, "x", created());
        wrong_channel.channel_id = CHANNEL + 1;
        let mut bot_author = message(2, "x", created());
        bot_author.author = FakePlatform::bot();
        let mut system = message(3, "x", created());
        system.kind = MessageKind::Other;

        let cases = [
            (wrong_channel, InvalidProposal::WrongChannel),
            (bot_author, InvalidProposal::BotAuthor),
            (system, InvalidProposal::NotPlainMessage),
        ];
        for (msg, expected) in cases {
            platform.insert(msg.clone());
            match vote.open_proposal(&msg).await {
                Err(VoteError::InvalidProposal(reason)) => assert_eq!(reason, expected),
                other => panic!("expected {expected:?}, got {other:?}"),
            }
            assert!(!platform.is_pinned(msg.message_id));
        }
        assert!(platform.sent().is_empty());
    }
}

// =============================================================================
// ELIGIBILITY GUARD
// =============================================================================

mod guard {
    use super::*;

    #[tokio::test]
    async fn test_outsider_reaction_removed_with_notice() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;

        let decision = vote_with(&platform, &vote, 1, OUTSIDER, APPROVE, created()).await;
        assert_eq!(decision, GuardDecision::NotElector);
        assert_eq!(platform.reactors(1, APPROVE), vec![BOT]);

        let notice = platform.sent().last().cloned().unwrap();
        assert_eq!(notice.announcement.content.as_deref(), Some("<@42>"));
        assert_eq!(notice.announcement.colour, RED);

        tokio::time::sleep(StdDuration::from_millis(60)).await;
        assert_eq!(platform.deleted(), vec![notice.id]);
    }

    #[tokio::test]
    async fn test_second_ballot_removed_first_kept() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;

        let first = vote_with(&platform, &vote, 1, 2, APPROVE, created()).await;
        assert_eq!(first, GuardDecision::Accepted(Evaluation::Pending));

        let second = vote_with(&platform, &vote, 1, 2, REJECT, created()).await;
        assert_eq!(second, GuardDecision::MultipleChoice);
        assert_eq!(platform.reactors(1, APPROVE), vec![BOT, 2]);
        assert_eq!(platform.reactors(1, REJECT), vec![BOT]);

        let notice = last_announcement(&platform);
        assert_eq!(notice.content.as_deref(), Some("<@2>"));
        assert!(notice.description.unwrap().contains("only one"));
    }

    #[tokio::test]
    async fn test_no_elector_ever_counted_twice() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;

        let sequence = [(1, APPROVE), (1, ABSTAIN), (2, REJECT), (2, APPROVE), (2, ABSTAIN), (3, ABSTAIN), (3, REJECT)];
        for (user, emoji) in sequence {
            vote_with(&platform, &vote, 1, user, emoji, created()).await;
        }

        let msg = vote.platform().fetch_message(CHANNEL, 1).await.unwrap();
        let ballots = ballot::read_ballots(&*platform, &msg, &vote.settings().roster).await.unwrap();
        for id in ELECTORS {
            assert!(ballots.choices_of(id) <= 1, "elector {id} counted twice");
        }
        assert_eq!(ballots.approve_count(), 1);
        assert_eq!(ballots.reject_count(), 1);
        assert_eq!(ballots.abstain_count(), 1);
    }

    #[tokio::test]
    async fn test_reaction_on_unpinned_message_ignored() {
        let (platform, vote) = setup();
        platform.insert(message(7, "just chatting", created()));

        let decision = vote_with(&platform, &vote, 7, OUTSIDER, APPROVE, created()).await;
        assert_eq!(decision, GuardDecision::Ignored);
        assert_eq!(platform.reactors(7, APPROVE), vec![OUTSIDER]);
        assert!(platform.sent().is_empty());
    }

    #[tokio::test]
    async fn test_other_channel_and_bots_ignored() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;

        let mut elsewhere = reaction(1, OUTSIDER, APPROVE);
        elsewhere.channel_id = CHANNEL + 1;
        assert_eq!(vote.handle_reaction(&elsewhere, created()).await.unwrap(), GuardDecision::Ignored);

        let mut from_bot = reaction(1, BOT, REMIND);
        from_bot.user = FakePlatform::bot();
        assert_eq!(vote.handle_reaction(&from_bot, created()).await.unwrap(), GuardDecision::Ignored);
        assert_eq!(platform.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_notice_failure_does_not_fail_guard() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;
        platform.set_fail_send(true);

        let decision = vote_with(&platform, &vote, 1, OUTSIDER, REJECT, created()).await;
        assert_eq!(decision, GuardDecision::NotElector);
        assert_eq!(platform.reactors(1, REJECT), vec![BOT]);
    }
}

// =============================================================================
// RESOLUTION
// =============================================================================

mod resolution {
    use super::*;

    #[tokio::test]
    async fn test_scenario_a_three_approvals() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;
        let now = created() + Duration::hours(1);

        assert_eq!(vote_with(&platform, &vote, 1, 1, APPROVE, now).await, GuardDecision::Accepted(Evaluation::Pending));
        assert_eq!(vote_with(&platform, &vote, 1, 2, APPROVE, now).await, GuardDecision::Accepted(Evaluation::Pending));
        assert_eq!(
            vote_with(&platform, &vote, 1, 3, APPROVE, now).await,
            GuardDecision::Accepted(Evaluation::Approved)
        );

        assert!(!platform.is_pinned(1));
        let a = last_announcement(&platform);
        assert_eq!(a.colour, GREEN);
        assert!(a.silent);
        assert_eq!(a.field(FIELD_TALLY), Some("3 / 0 / 0"));
        assert_eq!(a.field(FIELD_BORDER), Some("3"));
        assert!(a.field(FIELD_ELECTORS).unwrap().starts_with("Approve: zakuro, hiratake, tomachi\n"));
    }

    #[tokio::test]
    async fn test_scenario_b_abstention_keeps_border() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;

        platform.react(1, ABSTAIN, member(5));
        platform.react(1, REJECT, member(1));
        platform.react(1, REJECT, member(2));

        let evaluation = vote.evaluate(1, created() + Duration::hours(1)).await.unwrap();
        assert_eq!(evaluation, Evaluation::Pending);
        assert!(platform.is_pinned(1));
        assert_eq!(platform.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_abstentions_lower_border() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;

        // Two abstain: border ceil((5-2+1)/2) = 2
        platform.react(1, ABSTAIN, member(4));
        platform.react(1, ABSTAIN, member(5));
        platform.react(1, REJECT, member(1));
        platform.react(1, REJECT, member(2));

        let evaluation = vote.evaluate(1, created()).await.unwrap();
        assert_eq!(evaluation, Evaluation::Rejected(RejectReason::MajorityAgainst));
        let a = last_announcement(&platform);
        assert_eq!(a.colour, RED);
        assert_eq!(a.field(FIELD_BORDER), Some("2"));
        assert_eq!(a.field(FIELD_TALLY), Some("0 / 2 / 2"));
    }

    #[tokio::test]
    async fn test_scenario_c_unanimous_abstain() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;

        for id in ELECTORS {
            platform.react(1, ABSTAIN, member(id));
        }

        let evaluation = vote.evaluate(1, created()).await.unwrap();
        assert_eq!(evaluation, Evaluation::Rejected(RejectReason::UnanimousAbstain));
        assert!(!platform.is_pinned(1));
        assert!(last_announcement(&platform).description.unwrap().contains("abstained"));
    }

    #[tokio::test]
    async fn test_scenario_d_deadline() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;
        platform.react(1, APPROVE, member(1));

        let summary = vote.sweep(created() + Duration::days(14)).await.unwrap();
        assert_eq!(summary, SweepSummary { checked: 1, resolved: 1, reminded: 0, failed: 0 });
        assert!(!platform.is_pinned(1));
        assert!(last_announcement(&platform).description.unwrap().contains("deadline"));
    }

    #[tokio::test]
    async fn test_scenario_e_single_reminder() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;
        platform.react(1, APPROVE, member(1));
        platform.react(1, ABSTAIN, member(3));

        let now = created() + Duration::days(8);
        let first = vote.sweep(now).await.unwrap();
        assert_eq!(first.reminded, 1);
        assert_eq!(platform.reactors(1, REMIND), vec![BOT]);

        let reminder = last_announcement(&platform);
        assert_eq!(reminder.colour, BLUE);
        assert_eq!(reminder.content.as_deref(), Some("<@2> <@4> <@5>"));

        let second = vote.sweep(now + Duration::minutes(1)).await.unwrap();
        assert_eq!(second.reminded, 0);
        assert_eq!(platform.sent().len(), 2);
        assert!(platform.is_pinned(1));
    }

    #[tokio::test]
    async fn test_no_reminder_before_a_week() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;

        let evaluation = vote.evaluate(1, created() + Duration::days(7) - Duration::seconds(1)).await.unwrap();
        assert_eq!(evaluation, Evaluation::Pending);
        assert!(platform.reactors(1, REMIND).is_empty());
    }

    #[tokio::test]
    async fn test_human_remind_reaction_is_not_the_marker() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;
        platform.react(1, REMIND, member(2));

        let evaluation = vote.evaluate(1, created() + Duration::days(8)).await.unwrap();
        assert_eq!(evaluation, Evaluation::Reminded);
    }

    #[tokio::test]
    async fn test_override_tie_approves() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "[Border:1] tiny change", created()).await;
        platform.react(1, REJECT, member(2));
        platform.react(1, APPROVE, member(1));

        let evaluation = vote.evaluate(1, created()).await.unwrap();
        assert_eq!(evaluation, Evaluation::Approved);
    }

    #[tokio::test]
    async fn test_outsiders_never_counted() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;
        // Reactions that slipped in while the bot was offline
        for id in [40, 41, 42] {
            platform.react(1, APPROVE, member(id));
        }

        assert_eq!(vote.evaluate(1, created()).await.unwrap(), Evaluation::Pending);
        assert!(platform.is_pinned(1));
    }

    #[tokio::test]
    async fn test_double_ballot_counted_nowhere() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;
        // Both ballots landed while the bot was offline
        platform.react(1, APPROVE, member(1));
        platform.react(1, REJECT, member(1));
        platform.react(1, REJECT, member(2));
        platform.react(1, REJECT, member(3));

        let summary = vote.sweep(created() + Duration::hours(1)).await.unwrap();
        assert_eq!(summary, SweepSummary { checked: 1, resolved: 0, reminded: 0, failed: 0 });
        assert!(platform.is_pinned(1));
        assert_eq!(platform.sent().len(), 1);

        // Once the extra ballot is gone the elector counts again
        platform
            .remove_reaction(CHANNEL, 1, 1, APPROVE)
            .await
            .unwrap();
        let summary = vote.sweep(created() + Duration::hours(2)).await.unwrap();
        assert_eq!(summary.resolved, 1);
        let a = last_announcement(&platform);
        assert_eq!(a.colour, RED);
        assert_eq!(a.field(FIELD_TALLY), Some("0 / 3 / 0"));
    }

    #[tokio::test]
    async fn test_double_ballot_left_out_of_announcement() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;
        platform.react(1, APPROVE, member(1));
        platform.react(1, ABSTAIN, member(1));
        for id in [2, 3, 4] {
            platform.react(1, APPROVE, member(id));
        }

        assert_eq!(vote.evaluate(1, created()).await.unwrap(), Evaluation::Approved);
        let a = last_announcement(&platform);
        assert_eq!(a.field(FIELD_TALLY), Some("3 / 0 / 0"));
        assert!(!a.field(FIELD_ELECTORS).unwrap().contains("zakuro"));
    }

    #[tokio::test]
    async fn test_inactive_message_holds_no_lock() {
        let (platform, vote) = setup();
        platform.insert(message(7, "never opened", created()));

        for _ in 0..3 {
            assert_eq!(vote.evaluate(7, created()).await.unwrap(), Evaluation::Inactive);
        }
        assert_eq!(vote.locks.len(), 0);
    }

    #[tokio::test]
    async fn test_long_text_truncated_in_announcement() {
        let (platform, vote) = setup();
        let text = "p".repeat(1200);
        open(&platform, &vote, 1, &text, created()).await;
        for id in [1, 2, 3] {
            platform.react(1, APPROVE, member(id));
        }

        vote.evaluate(1, created()).await.unwrap();
        let content = last_announcement(&platform).field(FIELD_CONTENT).unwrap().to_string();
        assert_eq!(content, format!("{}...", "p".repeat(1021)));
    }

    #[tokio::test]
    async fn test_resolved_proposal_is_inert() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;
        for id in [1, 2, 3] {
            platform.react(1, REJECT, member(id));
        }
        vote.evaluate(1, created()).await.unwrap();
        let posted = platform.sent().len();

        let late = vote_with(&platform, &vote, 1, 4, APPROVE, created()).await;
        assert_eq!(late, GuardDecision::Ignored);
        assert_eq!(vote.evaluate(1, created()).await.unwrap(), Evaluation::Inactive);
        let summary = vote.sweep(created() + Duration::days(20)).await.unwrap();
        assert_eq!(summary.checked, 0);
        assert_eq!(platform.sent().len(), posted);
    }

    #[tokio::test]
    async fn test_failed_announcement_keeps_pin() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;
        for id in [1, 2, 3] {
            platform.react(1, APPROVE, member(id));
        }
        platform.set_fail_send(true);

        let err = vote.evaluate(1, created()).await.unwrap_err();
        assert!(matches!(err, VoteError::Platform(_)));
        assert!(platform.is_pinned(1));

        // Next trigger picks it up again
        platform.set_fail_send(false);
        assert_eq!(vote.evaluate(1, created()).await.unwrap(), Evaluation::Approved);
        assert!(!platform.is_pinned(1));
    }

    #[tokio::test]
    async fn test_failed_reminder_leaves_no_marker() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;
        platform.set_fail_send(true);

        assert!(vote.evaluate(1, created() + Duration::days(8)).await.is_err());
        assert!(platform.reactors(1, REMIND).is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_triggers_announce_once() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", created()).await;
        for id in [1, 2, 3] {
            platform.react(1, APPROVE, member(id));
        }

        let (a, b) = tokio::join!(vote.evaluate(1, created()), vote.sweep(created()));
        let a = a.unwrap();
        let b = b.unwrap();
        let resolved = usize::from(a == Evaluation::Approved) + b.resolved;
        assert_eq!(resolved, 1);
        // instructions panel + one announcement
        assert_eq!(platform.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_skips_failing_proposal() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "broken", created()).await;
        open(&platform, &vote, 2, "fine", created()).await;
        for id in [1, 2, 3] {
            platform.react(2, APPROVE, member(id));
        }
        platform.fail_fetch(1);

        let summary = vote.sweep(created()).await.unwrap();
        assert_eq!(summary, SweepSummary { checked: 2, resolved: 1, reminded: 0, failed: 1 });
        assert!(!platform.is_pinned(2));
    }
}

// =============================================================================
// TRIGGERS
// =============================================================================

mod triggers {
    use super::*;

    #[tokio::test]
    async fn test_new_proposal_listener() {
        let (platform, vote) = setup();
        let listener = NewProposalListener::new(vote.clone());

        let msg = message(1, "proposal", created());
        platform.insert(msg.clone());
        listener.handle(&BotEvent::MessageCreate(msg)).await.unwrap();
        assert!(platform.is_pinned(1));

        // Already pinned now: not an error for the dispatcher
        let pinned = vote.platform().fetch_message(CHANNEL, 1).await.unwrap();
        listener.handle(&BotEvent::MessageCreate(pinned)).await.unwrap();
        assert_eq!(platform.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_new_proposal_listener_ignores_bot_panels() {
        let (platform, vote) = setup();
        let listener = NewProposalListener::new(vote);

        let mut msg = message(1, "panel", created());
        msg.author = FakePlatform::bot();
        platform.insert(msg.clone());
        listener.handle(&BotEvent::MessageCreate(msg)).await.unwrap();
        assert!(!platform.is_pinned(1));
    }

    #[tokio::test]
    async fn test_ballot_listener_resolves() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", Utc::now()).await;
        let listener = BallotListener::new(vote);

        for id in [1, 2, 3] {
            platform.react(1, APPROVE, member(id));
            listener.handle(&BotEvent::ReactionAdd(reaction(1, id, APPROVE))).await.unwrap();
        }
        assert!(!platform.is_pinned(1));
    }

    #[tokio::test]
    async fn test_sweep_task_resolves_expired() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", Utc::now() - Duration::days(15)).await;
        let task = MeetingVoteTask::new(vote, StdDuration::from_secs(1800));

        assert_eq!(task.interval(), StdDuration::from_secs(1800));
        task.execute().await.unwrap();
        assert!(!platform.is_pinned(1));
    }

    #[tokio::test]
    async fn test_sweep_task_surfaces_listing_errors() {
        let (platform, vote) = setup();
        open(&platform, &vote, 1, "proposal", Utc::now() - Duration::days(15)).await;
        let task = MeetingVoteTask::new(vote, StdDuration::from_secs(1800));
        platform.set_fail_pins(true);

        let err = task.execute().await.unwrap_err();
        assert!(err.to_string().contains("fetch pinned messages"));
        assert!(platform.is_pinned(1));
    }
}
