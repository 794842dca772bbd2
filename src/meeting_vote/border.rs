//! Quorum threshold ("Border") arithmetic.

use regex::Regex;
use std::sync::LazyLock;

static BORDER_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[Border:(\d+)\]").unwrap());

/// Border forced by a `[Border:K]` tag in the proposal text.
///
/// A tag whose number does not fit is treated as absent.
pub fn border_override(text: &str) -> Option<usize> {
    BORDER_TAG
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// `ceil((electors - abstained + 1) / 2)`.
pub fn computed_border(electors: usize, abstained: usize) -> usize {
    (electors.saturating_sub(abstained) + 2) / 2
}

/// The Border in effect for a proposal with the given text and abstain count.
pub fn border(text: &str, electors: usize, abstained: usize) -> usize {
    border_override(text).unwrap_or_else(|| computed_border(electors, abstained))
}
