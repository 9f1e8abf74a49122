// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Attempt-level failure of a group switch.
///
/// Ordered by priority: when several causes are recorded in one attempt,
/// the greatest one is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SwitchError {
    Failed,
    SpaceFull,
    NoAccess,
    NotReady,
}

impl SwitchError {
    pub fn priority(&self) -> u8 {
        match self {
            Self::Failed => 0,
            Self::SpaceFull => 1,
            Self::NoAccess => 2,
            Self::NotReady => 3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Failed => "failed",
            Self::SpaceFull => "spaceFull",
            Self::NoAccess => "noAccess",
            Self::NotReady => "notReady",
        }
    }
}

impl Ord for SwitchError {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority().cmp(&other.priority())
    }
}

impl PartialOrd for SwitchError {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SwitchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::error::Error for SwitchError {}

/// Admission answer of a space for one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AllowEnter {
    Ok,
    NoAccess,
    InvalidInvite,
    SpaceFull,
}

impl AllowEnter {
    /// Attempt-level error for a denial; `None` when entry is allowed.
    pub fn denial(self) -> Option<SwitchError> {
        match self {
            Self::Ok => None,
            Self::NoAccess => Some(SwitchError::NoAccess),
            Self::InvalidInvite => Some(SwitchError::Failed),
            Self::SpaceFull => Some(SwitchError::SpaceFull),
        }
    }
}

/// Settlement of one character's own leave/enter execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CharacterSwitchOutcome {
    Ok,
    InvalidInvite,
    InRoomDevice,
    Restricted,
    NoAccess,
    SpaceFull,
    Failed,
}

impl CharacterSwitchOutcome {
    /// Fold into the attempt-level error set; `None` for success.
    pub fn fold(self) -> Option<SwitchError> {
        match self {
            Self::Ok => None,
            Self::InvalidInvite => Some(SwitchError::Failed),
            Self::InRoomDevice | Self::Restricted => Some(SwitchError::NotReady),
            Self::NoAccess => Some(SwitchError::NoAccess),
            Self::SpaceFull => Some(SwitchError::SpaceFull),
            Self::Failed => Some(SwitchError::Failed),
        }
    }
}

impl From<AllowEnter> for CharacterSwitchOutcome {
    fn from(value: AllowEnter) -> Self {
        match value {
            AllowEnter::Ok => Self::Ok,
            AllowEnter::NoAccess => Self::NoAccess,
            AllowEnter::InvalidInvite => Self::InvalidInvite,
            AllowEnter::SpaceFull => Self::SpaceFull,
        }
    }
}

/// Rejected coordinator construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    EmptyGroup,
    InitiatorNotInGroup,
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyGroup => f.write_str("switch group has no characters"),
            Self::InitiatorNotInGroup => f.write_str("initiator is not part of the switch group"),
        }
    }
}

impl std::error::Error for SetupError {}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
