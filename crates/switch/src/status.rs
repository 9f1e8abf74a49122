// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-character switch status as seen by servers, and its client-visible
//! resolution.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ids::{CharacterId, SpaceId};

/// Resolution of the initiator's permission to bring this character along.
///
/// Can change over the life of a switch, e.g. when the initiator gets
/// blocked after the switch started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwitchPermission {
    /// Permission retracted, or the initiator is blocked.
    Rejected,
    /// The character must be asked first.
    Prompt,
    /// Pre-agreed, but the character may still withdraw.
    Accept,
    /// Agreement enforced by a character modifier.
    AcceptEnforce,
}

/// Resolution of the character's ability to leave its current space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SwitchRestriction {
    Ok,
    Restricted,
    InRoomDevice,
}

/// Server view of one character in a switch group.
///
/// `permission` and `restriction` are `None` until the shard resolves them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterSwitchStatus {
    /// Set by the client.
    pub accepted: bool,
    pub permission: Option<SwitchPermission>,
    pub restriction: Option<SwitchRestriction>,
}

/// Client-visible status of one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClientStatus {
    Loading,
    LeaveRestricted,
    InRoomDevice,
    Rejected,
    Wait,
    Ready,
}

/// Resolve the server view into what the client displays.
///
/// Leave restriction is checked before permission: a character that cannot
/// leave is reported as such even when it is otherwise ready.
pub fn resolve_client_status(status: &CharacterSwitchStatus) -> ClientStatus {
    match status.restriction {
        None => return ClientStatus::Loading,
        Some(SwitchRestriction::Restricted) => return ClientStatus::LeaveRestricted,
        Some(SwitchRestriction::InRoomDevice) => return ClientStatus::InRoomDevice,
        Some(SwitchRestriction::Ok) => {}
    }

    match status.permission {
        None => ClientStatus::Loading,
        Some(SwitchPermission::Rejected) => ClientStatus::Rejected,
        Some(SwitchPermission::Prompt | SwitchPermission::Accept) if !status.accepted => {
            ClientStatus::Wait
        }
        Some(SwitchPermission::Prompt | SwitchPermission::Accept) => ClientStatus::Ready,
        Some(SwitchPermission::AcceptEnforce) => ClientStatus::Ready,
    }
}

/// Summary of a switch group, as seen by servers and clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchStatus {
    /// Destination; fixed for the life of the group.
    pub target_space: SpaceId,
    /// Started the switch; also identifies the group.
    pub initiator: CharacterId,
    /// Every member, initiator included, in group order.
    pub characters: IndexMap<CharacterId, CharacterSwitchStatus>,
}

/// Shard-resolved part of a character status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedCharacterStatus {
    pub permission: Option<SwitchPermission>,
    pub restriction: Option<SwitchRestriction>,
}

/// Shard-to-directory push; only characters whose status changed are listed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStatusUpdate {
    pub initiator: CharacterId,
    pub characters: IndexMap<CharacterId, ResolvedCharacterStatus>,
}

impl ShardStatusUpdate {
    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

impl SwitchStatus {
    /// A fresh group: the initiator has accepted, nothing is resolved yet.
    pub fn new(target_space: SpaceId, initiator: CharacterId, members: &[CharacterId]) -> Self {
        let mut characters = IndexMap::with_capacity(members.len() + 1);
        characters.insert(initiator, CharacterSwitchStatus { accepted: true, ..Default::default() });
        for &member in members {
            characters.entry(member).or_insert_with(CharacterSwitchStatus::default);
        }
        Self { target_space, initiator, characters }
    }

    pub fn contains(&self, character: &CharacterId) -> bool {
        self.characters.contains_key(character)
    }

    /// Resolved client view of every member, in group order.
    pub fn client_statuses(&self) -> IndexMap<CharacterId, ClientStatus> {
        self.characters.iter().map(|(id, st)| (*id, resolve_client_status(st))).collect()
    }

    /// Whether every member resolves to [`ClientStatus::Ready`].
    pub fn is_ready(&self) -> bool {
        self.characters.values().all(|st| resolve_client_status(st) == ClientStatus::Ready)
    }

    /// Merge a sparse shard update. Unknown characters are ignored.
    ///
    /// Returns the part of the update that actually changed something.
    pub fn apply_update(&mut self, update: &ShardStatusUpdate) -> ShardStatusUpdate {
        let mut applied = IndexMap::new();
        for (id, resolved) in &update.characters {
            let Some(entry) = self.characters.get_mut(id) else {
                continue;
            };
            if entry.permission != resolved.permission || entry.restriction != resolved.restriction
            {
                entry.permission = resolved.permission;
                entry.restriction = resolved.restriction;
                applied.insert(*id, *resolved);
            }
        }
        ShardStatusUpdate { initiator: self.initiator, characters: applied }
    }

    /// Sparse update that would turn `self` into `resolved`.
    ///
    /// Only members of `self` whose permission or restriction differ are listed.
    pub fn diff(
        &self,
        resolved: &IndexMap<CharacterId, ResolvedCharacterStatus>,
    ) -> ShardStatusUpdate {
        let characters = resolved
            .iter()
            .filter(|(id, next)| {
                self.characters.get(*id).is_some_and(|cur| {
                    cur.permission != next.permission || cur.restriction != next.restriction
                })
            })
            .map(|(id, next)| (*id, *next))
            .collect();
        ShardStatusUpdate { initiator: self.initiator, characters }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
