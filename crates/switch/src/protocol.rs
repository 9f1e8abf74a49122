// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client ↔ directory ↔ shard messages for requesting, executing, and
//! steering a group switch.

use serde::{Deserialize, Serialize};

use crate::error::SwitchError;
use crate::ids::{CharacterId, SpaceId};

/// Start a switch to space `id`, inviting `characters` along.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchRequest {
    pub id: SpaceId,
    #[serde(default)]
    pub characters: Vec<CharacterId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum RequestSwitchResult {
    Ok,
    Failed,
    PendingSwitchExists,
    NotFound,
    NoAccess {
        #[serde(rename = "problematicCharacter")]
        problematic_character: CharacterId,
    },
    NotAllowed {
        #[serde(rename = "problematicCharacter")]
        problematic_character: CharacterId,
    },
}

/// Result of executing a pending, ready switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum ExecuteSwitchResult {
    Ok,
    Failed,
    NotFound,
    NoAccess,
    SpaceFull,
    NotReady,
}

impl From<Result<(), SwitchError>> for ExecuteSwitchResult {
    fn from(value: Result<(), SwitchError>) -> Self {
        match value {
            Ok(()) => Self::Ok,
            Err(SwitchError::Failed) => Self::Failed,
            Err(SwitchError::SpaceFull) => Self::SpaceFull,
            Err(SwitchError::NoAccess) => Self::NoAccess,
            Err(SwitchError::NotReady) => Self::NotReady,
        }
    }
}

/// Command against an active switch group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum SwitchCommand {
    /// Abort the switch; initiator only.
    Abort,
    /// Drop a member from the group; initiator only.
    RemoveCharacter { character: CharacterId },
    /// Set own acceptance; members whose permission is `prompt` or `accept`.
    SetAccepted { accepted: bool },
    /// Leave the group; anyone but the initiator.
    Reject,
}

/// A command addressed to the group identified by `initiator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchCommandRequest {
    pub initiator: CharacterId,
    pub command: SwitchCommand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum CommandResult {
    Ok,
    Failed,
    NotFound,
    NotAllowed,
    Restricted,
}

/// Answer to a shard status push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "camelCase")]
pub enum ShardUpdateResult {
    Ok,
    NotFound,
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
