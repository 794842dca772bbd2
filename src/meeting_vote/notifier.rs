//! Rendering of every message the vote engine posts.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::meeting_vote::ballot::Ballots;
use crate::meeting_vote::engine::{RejectReason, Tally, Verdict};
use crate::meeting_vote::platform::{Announcement, EmbedField, Member, ProposalMessage};

pub const YELLOW: u32 = 0xFEE75C;
pub const GREEN: u32 = 0x57F287;
pub const RED: u32 = 0xED4245;
pub const BLUE: u32 = 0x3498DB;

/// Longest proposal text quoted verbatim in an announcement.
const MAX_QUOTED_CHARS: usize = 1024;
/// Kept characters when the text has to be cut.
const TRUNCATED_CHARS: usize = 1021;

pub const FIELD_TALLY: &str = "Approve / Reject / Abstain";
pub const FIELD_BORDER: &str = "Border";
pub const FIELD_ELECTORS: &str = "Electors";
pub const FIELD_CONTENT: &str = "Proposal";
pub const FIELD_LINK: &str = "Vote message";
pub const FIELD_OPENED: &str = "Opened at";
pub const FIELD_DEADLINE: &str = "Deadline";

const NOTICE_FOOTER: &str = "This message will be deleted in 1 minute.";

pub fn format_datetime(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%Y/%m/%d %H:%M:%S").to_string()
}

/// Cut proposal text to fit an embed field.
pub fn truncate_content(text: &str) -> String {
    if text.chars().count() > MAX_QUOTED_CHARS {
        let kept: String = text.chars().take(TRUNCATED_CHARS).collect();
        format!("{kept}...")
    } else {
        text.to_string()
    }
}

fn mention(user_id: u64) -> String {
    format!("<@{user_id}>")
}

fn names(voters: &[Member]) -> String {
    voters.iter().map(|m| m.name.as_str()).collect::<Vec<_>>().join(", ")
}

/// Panel posted under a freshly opened proposal.
pub fn instructions(
    message: &ProposalMessage,
    border: usize,
    expire_at: DateTime<Utc>,
    tz: Tz,
) -> Announcement {
    Announcement {
        content: None,
        title: Some(":new: New proposal".to_string()),
        description: Some(format!("New proposal from {}.", mention(message.author.user_id))),
        fields: vec![
            EmbedField::new(
                "To approve",
                "React to **the proposal message** with :thumbsup:.",
            ),
            EmbedField::new(
                "To reject",
                "React to **the proposal message** with :thumbsdown:.\nPlease always write down why you are against it.",
            ),
            EmbedField::new(
                "To abstain",
                "React to **the proposal message** with :flag_white:.\n(You give up your vote and leave the decision to the others.)",
            ),
            EmbedField::new(
                FIELD_DEADLINE,
                format!("The vote is open for 2 weeks (until {}).", format_datetime(expire_at, tz)),
            ),
            EmbedField::new(FIELD_BORDER, format!("This proposal is decided at {border} votes.")),
        ],
        footer: None,
        colour: YELLOW,
        silent: true,
    }
}

/// Final announcement for an approved or rejected proposal.
pub fn outcome(
    message: &ProposalMessage,
    ballots: &Ballots,
    tally: &Tally,
    verdict: Verdict,
    tz: Tz,
) -> Announcement {
    let (title, description, colour) = match verdict {
        Verdict::Approved => (
            "Proposal approved",
            ":+1: A majority approved, so the proposal is accepted.",
            GREEN,
        ),
        Verdict::Rejected(RejectReason::MajorityAgainst) => (
            "Proposal rejected",
            ":-1: A majority voted against, so the proposal is rejected.",
            RED,
        ),
        Verdict::Rejected(RejectReason::UnanimousAbstain) => (
            "Proposal rejected",
            ":-1: Every elector abstained, so the proposal is rejected.",
            RED,
        ),
        Verdict::Rejected(RejectReason::DeadlineExpired) => (
            "Proposal rejected",
            ":-1: The deadline passed without a decision, so the proposal is rejected.",
            RED,
        ),
    };

    Announcement {
        content: None,
        title: Some(title.to_string()),
        description: Some(description.to_string()),
        fields: vec![
            EmbedField::new(FIELD_TALLY, format!("{} / {} / {}", tally.approve, tally.reject, tally.abstain)),
            EmbedField::new(FIELD_BORDER, tally.border.to_string()),
            EmbedField::new(
                FIELD_ELECTORS,
                format!(
                    "Approve: {}\nReject: {}\nAbstain: {}",
                    names(&ballots.approve),
                    names(&ballots.reject),
                    names(&ballots.abstain)
                ),
            ),
            EmbedField::new(FIELD_CONTENT, truncate_content(&message.content)),
            EmbedField::new(FIELD_LINK, message.link.clone()),
            EmbedField::new(FIELD_OPENED, format_datetime(message.created_at, tz)),
        ],
        footer: None,
        colour,
        silent: true,
    }
}

/// Reminder mentioning only the electors who have not voted yet.
pub fn reminder(
    message: &ProposalMessage,
    unvoted: &[u64],
    expire_at: DateTime<Utc>,
    tz: Tz,
) -> Announcement {
    let mentions = unvoted.iter().map(|&id| mention(id)).collect::<Vec<_>>().join(" ");
    Announcement {
        content: (!mentions.is_empty()).then_some(mentions),
        title: Some(":bangbang: Vote deadline approaching".to_string()),
        description: Some("A proposal closes in less than a week! Please cast your vote.".to_string()),
        fields: vec![
            EmbedField::new(FIELD_DEADLINE, format_datetime(expire_at, tz)),
            EmbedField::new(FIELD_LINK, message.link.clone()),
        ],
        footer: None,
        colour: BLUE,
        silent: true,
    }
}

pub fn no_voting_right(user_id: u64) -> Announcement {
    notice(user_id, "You do not have the right to vote.")
}

pub fn multiple_choice(user_id: u64) -> Announcement {
    notice(
        user_id,
        "React with only one of approve, reject or abstain! To change your vote, remove your current reaction first.",
    )
}

fn notice(user_id: u64, text: &str) -> Announcement {
    Announcement {
        content: Some(mention(user_id)),
        title: None,
        description: Some(text.to_string()),
        fields: Vec::new(),
        footer: Some(NOTICE_FOOTER.to_string()),
        colour: RED,
        silent: false,
    }
}
