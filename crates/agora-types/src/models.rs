use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// -- Communities --

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyType {
    #[default]
    Public,
    Restricted,
    Private,
}

#[derive(Debug, Error)]
#[error("\"{0}\" is not a valid privacy type")]
pub struct InvalidPrivacyType(pub String);

impl PrivacyType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Restricted => "restricted",
            Self::Private => "private",
        }
    }
}

impl fmt::Display for PrivacyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyType {
    type Err = InvalidPrivacyType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "public" => Ok(Self::Public),
            "restricted" => Ok(Self::Restricted),
            "private" => Ok(Self::Private),
            other => Err(InvalidPrivacyType(other.to_string())),
        }
    }
}

// -- Votes --

/// A single user's vote on a post. Serialized as `1` / `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum VoteValue {
    Up,
    Down,
}

#[derive(Debug, Error)]
#[error("Invalid vote value")]
pub struct InvalidVoteValue(pub i64);

impl VoteValue {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::Up => 1,
            Self::Down => -1,
        }
    }

    /// Resolves what submitting `submitted` does when the user currently
    /// holds `current` on the same post.
    pub fn transition(current: Option<VoteValue>, submitted: VoteValue) -> VoteTransition {
        match current {
            None => VoteTransition::Added(submitted),
            Some(existing) if existing == submitted => VoteTransition::Removed(existing),
            Some(existing) => VoteTransition::Changed {
                from: existing,
                to: submitted,
            },
        }
    }
}

impl From<VoteValue> for i64 {
    fn from(value: VoteValue) -> Self {
        value.as_i64()
    }
}

impl TryFrom<i64> for VoteValue {
    type Error = InvalidVoteValue;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Up),
            -1 => Ok(Self::Down),
            other => Err(InvalidVoteValue(other)),
        }
    }
}

/// Edge of the per-(user, post) vote state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteTransition {
    /// no-vote -> voted
    Added(VoteValue),
    /// Same value submitted twice: the vote is withdrawn.
    Removed(VoteValue),
    /// Up -> down or down -> up.
    Changed { from: VoteValue, to: VoteValue },
}

impl VoteTransition {
    /// Amount the post's vote sum moves by.
    pub fn delta(self) -> i64 {
        match self {
            Self::Added(v) => v.as_i64(),
            Self::Removed(v) => -v.as_i64(),
            Self::Changed { from, to } => to.as_i64() - from.as_i64(),
        }
    }

    /// The vote the user holds after the transition.
    pub fn resulting(self) -> Option<VoteValue> {
        match self {
            Self::Added(v) => Some(v),
            Self::Removed(_) => None,
            Self::Changed { to, .. } => Some(to),
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Added(_) => "Vote added",
            Self::Removed(_) => "Vote removed",
            Self::Changed { .. } => "Vote changed",
        }
    }
}

// -- Users --

/// Username if set, otherwise the local part of the email address.
pub fn display_name(username: &str, email: &str) -> String {
    if !username.is_empty() {
        return username.to_string();
    }
    email.split('@').next().unwrap_or_default().to_string()
}
