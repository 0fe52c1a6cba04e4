use serde::{Deserialize, Serialize};

/// State of a link request: pending is the only non-terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestState {
    Pending,
    Accepted,
    Rejected,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::Pending => "pending",
            RequestState::Accepted => "accepted",
            RequestState::Rejected => "rejected",
        }
    }
}

/// A directed link proposal from one account to another, stored in redb
///
/// Keyed by the directed pair ("<from>:<to>"), so at most one request exists
/// per ordered pair. Re-creating a request over a terminal one resets it to
/// pending (upsert semantics).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRequestRecord {
    pub from: String,
    pub to: String,
    pub state: RequestState,
    /// When the request was (last) created (Unix timestamp)
    pub created_at: i64,
    /// When the request last changed state (Unix timestamp)
    pub updated_at: i64,
}

impl LinkRequestRecord {
    /// Directed key for a (from, to) request
    pub fn request_key(from: &str, to: &str) -> String {
        format!("{}:{}", from, to)
    }
}

/// An accepted, symmetric connection between two accounts, stored in redb
///
/// Keyed by the canonical pair key (lexicographically smaller id first), so a
/// pair can hold at most one link row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkRecord {
    pub account_a: String,
    pub account_b: String,
    /// When the link was created (Unix timestamp)
    pub created_at: i64,
}

impl LinkRecord {
    /// Canonical key for an unordered account pair
    pub fn pair_key(a: &str, b: &str) -> String {
        if a <= b {
            format!("{}:{}", a, b)
        } else {
            format!("{}:{}", b, a)
        }
    }
}
