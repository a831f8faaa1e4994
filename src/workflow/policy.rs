//! What happens when a pending approval expires.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Action taken on a calculation whose pending approval has expired.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryPolicy {
    /// Reject the calculation as the system actor.
    #[default]
    AutoReject,
    /// Open the next level (or the plan's escalation approver).
    Escalate,
    /// Reopen the same level for the same approver with a fresh deadline.
    Renotify,
}

impl ExpiryPolicy {
    /// Returns the string representation of the policy.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::AutoReject => "auto_reject",
            Self::Escalate => "escalate",
            Self::Renotify => "renotify",
        }
    }
}

impl fmt::Display for ExpiryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
