//! License gate for the free tier.

use serde::{Deserialize, Serialize};

/// Number of prior messages allowed in a conversation before a valid
/// license is required. Counted over both sides of the exchange, so this is
/// seven question/answer pairs.
pub const FREE_MESSAGE_LIMIT: usize = 14;

/// Dialog text shown when the free-tier limit is reached. Surfaced as a
/// blocking dialog, never as a chat message.
pub const LICENSE_REQUIRED_TEXT: &str =
    "7 messages are allowed per conversation for free users.";

/// Validity of the user's license, consulted synchronously from
/// already-fetched state. This subsystem never fetches it itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseState {
    pub valid: bool,
}

impl LicenseState {
    /// Whether a submission may proceed given the number of prior messages
    /// in the active conversation.
    pub fn allows_submission(&self, prior_messages: usize) -> bool {
        self.valid || prior_messages < FREE_MESSAGE_LIMIT
    }
}
