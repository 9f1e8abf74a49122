// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Group space switching: moves an initiator and its followers from one
//! space to another as a single attempt, synchronized through staged barriers.

pub mod barrier;
pub mod character;
pub mod coordinator;
pub mod error;
pub mod ids;
pub mod protocol;
pub mod space;
pub mod status;

#[cfg(test)]
pub(crate) mod test_support;

pub use barrier::{Latch, SwitchStage};
pub use character::{Character, SwitchFuture};
pub use coordinator::{CoordinatorOptions, SwitchCoordinator};
pub use error::{AllowEnter, CharacterSwitchOutcome, SetupError, SwitchError};
pub use ids::{AccountId, CharacterId, SpaceId};
pub use space::{InviteKind, Space};
pub use status::{resolve_client_status, CharacterSwitchStatus, ClientStatus, SwitchStatus};
