use std::fmt;

/// Why a message cannot become a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidProposal {
    WrongChannel,
    NotPlainMessage,
    BotAuthor,
    AlreadyPinned,
}

impl fmt::Display for InvalidProposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::WrongChannel => "message is not in the vote channel",
            Self::NotPlainMessage => "message is not a plain user message",
            Self::BotAuthor => "message was posted by a bot",
            Self::AlreadyPinned => "message is already pinned",
        };
        f.write_str(reason)
    }
}

/// A failed read or write against the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformError {
    /// What the bot was trying to do, e.g. "unpin message".
    pub action: &'static str,
    pub message: String,
}

impl PlatformError {
    pub fn new(action: &'static str, message: impl Into<String>) -> Self {
        Self { action, message: message.into() }
    }
}

impl fmt::Display for PlatformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to {}: {}", self.action, self.message)
    }
}

impl std::error::Error for PlatformError {}

/// Errors surfaced by the vote engine.
#[derive(Debug)]
pub enum VoteError {
    /// The message does not qualify as a new proposal. Nothing was changed.
    InvalidProposal(InvalidProposal),
    /// A platform call failed; the current evaluation was abandoned.
    Platform(PlatformError),
}

impl fmt::Display for VoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidProposal(reason) => write!(f, "invalid proposal: {}", reason),
            Self::Platform(e) => write!(f, "platform error: {}", e),
        }
    }
}

impl std::error::Error for VoteError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::InvalidProposal(_) => None,
            Self::Platform(e) => Some(e),
        }
    }
}

impl From<PlatformError> for VoteError {
    fn from(e: PlatformError) -> Self {
        Self::Platform(e)
    }
}

impl From<InvalidProposal> for VoteError {
    fn from(reason: InvalidProposal) -> Self {
        Self::InvalidProposal(reason)
    }
}
