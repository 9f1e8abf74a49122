// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stage names and the release signal characters park on between stages.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Named synchronization points of a group switch, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SwitchStage {
    SyncLock,
    EnterPrecheck,
    BeforeLeave,
    Left,
    BeforeEnter,
}

impl SwitchStage {
    pub const ALL: [SwitchStage; 5] =
        [Self::SyncLock, Self::EnterPrecheck, Self::BeforeLeave, Self::Left, Self::BeforeEnter];

    /// Stage following this one; `None` after the last.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::SyncLock => Some(Self::EnterPrecheck),
            Self::EnterPrecheck => Some(Self::BeforeLeave),
            Self::BeforeLeave => Some(Self::Left),
            Self::Left => Some(Self::BeforeEnter),
            Self::BeforeEnter => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SyncLock => "syncLock",
            Self::EnterPrecheck => "enterPrecheck",
            Self::BeforeLeave => "beforeLeave",
            Self::Left => "left",
            Self::BeforeEnter => "beforeEnter",
        }
    }
}

impl fmt::Display for SwitchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-shot release signal.
///
/// Clones share the same state. Once released, every pending and future
/// [`Latch::wait`] resolves immediately; release cannot be undone.
#[derive(Debug, Clone)]
pub struct Latch {
    tx: Arc<watch::Sender<bool>>,
}

impl Latch {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Release all waiters. Returns `false` if already released.
    pub fn release(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_released(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until released.
    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns on release.
        let _ = rx.wait_for(|released| *released).await;
    }
}

impl Default for Latch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "barrier_tests.rs"]
mod tests;
