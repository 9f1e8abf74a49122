// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Switch group events and the hub fanning them out to feed clients.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use spaceswitch::protocol::ExecuteSwitchResult;
use spaceswitch::{CharacterId, SwitchStatus};

/// Lifecycle events of switch groups, keyed by initiator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SwitchEvent {
    /// A group was created or its status changed; carries the full status.
    Status { status: SwitchStatus },
    /// The initiator aborted the group.
    Aborted { initiator: CharacterId },
    /// An execution finished. The group is gone on `ok`.
    Completed { initiator: CharacterId, result: ExecuteSwitchResult },
}

impl SwitchEvent {
    pub fn initiator(&self) -> CharacterId {
        match self {
            Self::Status { status } => status.initiator,
            Self::Aborted { initiator } | Self::Completed { initiator, .. } => *initiator,
        }
    }
}

/// Fans switch events out to feed clients via broadcast.
#[derive(Debug)]
pub struct EventHub {
    pub event_tx: broadcast::Sender<SwitchEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self { event_tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SwitchEvent> {
        self.event_tx.subscribe()
    }

    /// Send to current subscribers; dropped when nobody listens.
    pub fn publish(&self, event: SwitchEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Which groups a feed client follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    All,
    Initiators(HashSet<CharacterId>),
}

impl EventFilter {
    /// Parse `all` or a comma-separated list of initiators. Unparseable
    /// entries are skipped.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().is_empty() || raw.trim() == "all" {
            return Self::All;
        }
        Self::Initiators(raw.split(',').filter_map(|s| s.trim().parse().ok()).collect())
    }

    pub fn wants(&self, initiator: &CharacterId) -> bool {
        match self {
            Self::All => true,
            Self::Initiators(set) => set.contains(initiator),
        }
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
