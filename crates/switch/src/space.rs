// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use crate::character::Character;
use crate::error::AllowEnter;
use crate::ids::{AccountId, SpaceId};

/// Kind of invitation a character may be able to issue for a space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InviteKind {
    /// Invite others to join the inviter in this space.
    JoinMe,
    /// Invite carrying space-level rights, issued by admins.
    SpaceBound,
}

/// What the switch coordinator needs from a space.
///
/// Object-safe for use as `Arc<dyn Space>`.
pub trait Space: Send + Sync + 'static {
    fn id(&self) -> SpaceId;

    /// Admission policy for one character.
    ///
    /// `assume_invite` admits characters brought along by someone who could
    /// have invited them.
    fn check_allow_enter(&self, character: &dyn Character, assume_invite: bool) -> AllowEnter;

    /// Whether `character` may issue an invite of `kind` for this space.
    fn can_create_invite(&self, character: &dyn Character, kind: InviteKind) -> bool;

    fn is_admin(&self, account: AccountId) -> bool;

    /// Configured occupant limit.
    fn max_users(&self) -> usize;

    /// Current number of occupants.
    fn character_count(&self) -> usize;
}
