// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::coordinator::SwitchCoordinator;
use crate::error::CharacterSwitchOutcome;
use crate::ids::{AccountId, CharacterId};
use crate::space::Space;

/// Boxed future of one character's own leave/enter execution.
pub type SwitchFuture = Pin<Box<dyn Future<Output = CharacterSwitchOutcome> + Send + 'static>>;

/// A participant of a group switch.
///
/// Object-safe for use as `Arc<dyn Character>`.
pub trait Character: Send + Sync + 'static {
    fn id(&self) -> CharacterId;

    fn account(&self) -> AccountId;

    /// Leave the current space and enter `target`.
    ///
    /// The execution must call [`SwitchCoordinator::switch_synchronize`] once
    /// at each stage boundary, in stage order, and must check
    /// [`SwitchCoordinator::canceled`] after every release before doing
    /// anything irreversible. It must always settle.
    fn switch_space(
        &self,
        target: Arc<dyn Space>,
        coordinator: Arc<SwitchCoordinator>,
    ) -> SwitchFuture;
}
