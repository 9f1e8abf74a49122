// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending switch groups, keyed by initiator.

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use spaceswitch::protocol::{
    CommandResult, ExecuteSwitchResult, RequestSwitchResult, ShardUpdateResult, SwitchCommand,
    SwitchCommandRequest, SwitchRequest,
};
use spaceswitch::status::{ShardStatusUpdate, SwitchPermission};
use spaceswitch::{
    AllowEnter, Character, CharacterId, CoordinatorOptions, InviteKind, Space, SpaceId,
    SwitchCoordinator, SwitchStatus,
};

use crate::events::{EventHub, SwitchEvent};
use crate::world::World;

/// A pending group and whether it is being executed right now.
#[derive(Debug, Clone)]
pub struct SwitchGroup {
    pub status: SwitchStatus,
    pub executing: bool,
    /// Members who accepted with an explicit `setAccepted`.
    pub consented: IndexSet<CharacterId>,
}

/// Every pending switch group this directory knows about.
pub struct SwitchRegistry {
    world: Arc<World>,
    groups: RwLock<IndexMap<CharacterId, SwitchGroup>>,
    options: CoordinatorOptions,
    pub events: EventHub,
}

impl SwitchRegistry {
    pub fn new(world: Arc<World>, options: CoordinatorOptions) -> Self {
        Self { world, groups: RwLock::new(IndexMap::new()), options, events: EventHub::new() }
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    pub async fn len(&self) -> usize {
        self.groups.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.groups.read().await.is_empty()
    }

    pub async fn status(&self, initiator: &CharacterId) -> Option<SwitchStatus> {
        self.groups.read().await.get(initiator).map(|g| g.status.clone())
    }

    pub async fn statuses(&self) -> Vec<SwitchStatus> {
        self.groups.read().await.values().map(|g| g.status.clone()).collect()
    }

    /// Groups whose initiator currently stands in `space`.
    pub async fn statuses_in_space(&self, space: &SpaceId) -> Vec<SwitchStatus> {
        let groups = self.groups.read().await;
        groups
            .values()
            .filter(|g| {
                self.world
                    .character(&g.status.initiator)
                    .is_some_and(|c| c.space().as_ref() == Some(space))
            })
            .map(|g| g.status.clone())
            .collect()
    }

    /// Create a group led by `initiator`.
    pub async fn request(&self, initiator: CharacterId, req: SwitchRequest) -> RequestSwitchResult {
        let status = {
            let mut groups = self.groups.write().await;
            if groups.contains_key(&initiator)
                || groups.values().any(|g| g.status.contains(&initiator))
            {
                return RequestSwitchResult::PendingSwitchExists;
            }

            let Some(leader) = self.world.character(&initiator) else {
                return RequestSwitchResult::NotFound;
            };
            let Some(target) = self.world.space(&req.id) else {
                return RequestSwitchResult::NotFound;
            };
            let Some(origin) = leader.space() else {
                warn!(%initiator, "switch requested by a character outside any space");
                return RequestSwitchResult::Failed;
            };
            if origin == req.id {
                return RequestSwitchResult::Failed;
            }

            let mut members = IndexSet::new();
            let mut followers = Vec::new();
            for id in req.characters {
                if id == initiator || !members.insert(id) {
                    continue;
                }
                let Some(follower) = self.world.character(&id) else {
                    return RequestSwitchResult::NotFound;
                };
                if follower.space().as_ref() != Some(&origin)
                    || groups.values().any(|g| g.status.contains(&id))
                {
                    return RequestSwitchResult::NotAllowed { problematic_character: id };
                }
                followers.push(follower);
            }

            // Capacity is checked at execution time; only access matters here.
            match target.check_allow_enter(&leader, false) {
                AllowEnter::Ok | AllowEnter::SpaceFull => {}
                AllowEnter::NoAccess => {
                    return RequestSwitchResult::NoAccess { problematic_character: initiator }
                }
                AllowEnter::InvalidInvite => return RequestSwitchResult::Failed,
            }
            let assume_invite = target.can_create_invite(&leader, InviteKind::JoinMe);
            for follower in &followers {
                if target.check_allow_enter(follower, assume_invite) == AllowEnter::NoAccess {
                    return RequestSwitchResult::NoAccess { problematic_character: follower.id() };
                }
            }

            let members: Vec<_> = members.into_iter().collect();
            let status = SwitchStatus::new(req.id, initiator, &members);
            groups.insert(
                initiator,
                SwitchGroup { status: status.clone(), executing: false, consented: IndexSet::new() },
            );
            status
        };

        info!(
            %initiator,
            target = %status.target_space,
            characters = status.characters.len(),
            "switch group created"
        );
        self.events.publish(SwitchEvent::Status { status });
        self.refresh(&initiator).await;
        RequestSwitchResult::Ok
    }

    /// Merge a sparse shard push into the group.
    pub async fn apply_shard_update(&self, update: ShardStatusUpdate) -> ShardUpdateResult {
        let status = {
            let mut groups = self.groups.write().await;
            let Some(group) = groups.get_mut(&update.initiator) else {
                return ShardUpdateResult::NotFound;
            };
            if !merge_update(group, &update) {
                return ShardUpdateResult::Ok;
            }
            group.status.clone()
        };
        debug!(initiator = %update.initiator, changed = update.characters.len(), "switch status updated");
        self.events.publish(SwitchEvent::Status { status });
        ShardUpdateResult::Ok
    }

    /// Re-resolve every member against the world and push what changed.
    pub async fn refresh(&self, initiator: &CharacterId) -> ShardUpdateResult {
        let Some(status) = self.status(initiator).await else {
            return ShardUpdateResult::NotFound;
        };
        let Some(leader) = self.world.character(initiator) else {
            return ShardUpdateResult::NotFound;
        };
        let resolved: IndexMap<_, _> = status
            .characters
            .keys()
            .filter_map(|id| self.world.character(id).map(|c| (*id, c.resolve(&leader))))
            .collect();
        let update = status.diff(&resolved);
        if update.is_empty() {
            return ShardUpdateResult::Ok;
        }
        self.apply_shard_update(update).await
    }

    /// Apply a command from `actor` to the group named in `req`.
    pub async fn command(&self, actor: CharacterId, req: SwitchCommandRequest) -> CommandResult {
        let initiator = req.initiator;
        let event = {
            let mut groups = self.groups.write().await;
            let Some(group) = groups.get_mut(&initiator) else {
                return CommandResult::NotFound;
            };
            if !group.status.contains(&actor) {
                return CommandResult::NotFound;
            }
            if group.executing {
                return CommandResult::Failed;
            }
            let is_initiator = actor == initiator;

            match req.command {
                SwitchCommand::Abort => {
                    if !is_initiator {
                        return CommandResult::NotAllowed;
                    }
                    groups.shift_remove(&initiator);
                    info!(%initiator, "switch group aborted");
                    SwitchEvent::Aborted { initiator }
                }
                SwitchCommand::RemoveCharacter { character } => {
                    if !is_initiator || character == initiator {
                        return CommandResult::NotAllowed;
                    }
                    if group.status.characters.shift_remove(&character).is_none() {
                        return CommandResult::NotFound;
                    }
                    group.consented.shift_remove(&character);
                    SwitchEvent::Status { status: group.status.clone() }
                }
                SwitchCommand::SetAccepted { accepted } => {
                    if is_initiator {
                        return CommandResult::NotAllowed;
                    }
                    let Some(member) = group.status.characters.get_mut(&actor) else {
                        return CommandResult::NotFound;
                    };
                    match member.permission {
                        Some(SwitchPermission::Prompt | SwitchPermission::Accept) => {
                            member.accepted = accepted;
                            if accepted {
                                group.consented.insert(actor);
                            } else {
                                group.consented.shift_remove(&actor);
                            }
                        }
                        Some(SwitchPermission::AcceptEnforce) => return CommandResult::Restricted,
                        Some(SwitchPermission::Rejected) | None => {
                            return CommandResult::NotAllowed
                        }
                    }
                    SwitchEvent::Status { status: group.status.clone() }
                }
                SwitchCommand::Reject => {
                    if is_initiator {
                        return CommandResult::NotAllowed;
                    }
                    let enforced = group
                        .status
                        .characters
                        .get(&actor)
                        .is_some_and(|m| m.permission == Some(SwitchPermission::AcceptEnforce));
                    if enforced {
                        return CommandResult::Restricted;
                    }
                    group.status.characters.shift_remove(&actor);
                    group.consented.shift_remove(&actor);
                    SwitchEvent::Status { status: group.status.clone() }
                }
            }
        };

        debug!(%initiator, %actor, command = ?req.command, "switch command applied");
        self.events.publish(event);
        CommandResult::Ok
    }

    /// Run the group led by `initiator` through a coordinator.
    pub async fn execute(&self, initiator: CharacterId) -> ExecuteSwitchResult {
        let status = {
            let mut groups = self.groups.write().await;
            let Some(group) = groups.get_mut(&initiator) else {
                return ExecuteSwitchResult::NotFound;
            };
            if group.executing {
                return ExecuteSwitchResult::Failed;
            }
            if !group.status.is_ready() {
                return ExecuteSwitchResult::NotReady;
            }
            group.executing = true;
            group.status.clone()
        };

        let result = match self.coordinator_for(&status) {
            Ok(coordinator) => ExecuteSwitchResult::from(coordinator.run().await),
            Err(result) => result,
        };

        {
            let mut groups = self.groups.write().await;
            if result == ExecuteSwitchResult::Ok {
                groups.shift_remove(&initiator);
            } else if let Some(group) = groups.get_mut(&initiator) {
                group.executing = false;
            }
        }

        info!(%initiator, ?result, "switch group executed");
        self.events.publish(SwitchEvent::Completed { initiator, result });
        if result != ExecuteSwitchResult::Ok {
            self.refresh(&initiator).await;
        }
        result
    }

    fn coordinator_for(
        &self,
        status: &SwitchStatus,
    ) -> Result<Arc<SwitchCoordinator>, ExecuteSwitchResult> {
        let initiator = status.initiator;
        let mut characters: Vec<Arc<dyn Character>> = Vec::with_capacity(status.characters.len());
        let mut leader = None;
        for id in status.characters.keys() {
            let Some(character) = self.world.character(id) else {
                warn!(%initiator, character = %id, "switch member vanished");
                return Err(ExecuteSwitchResult::NotFound);
            };
            if *id == initiator {
                leader = Some(character.clone());
            }
            characters.push(Arc::new(character));
        }
        let Some(leader) = leader else {
            return Err(ExecuteSwitchResult::NotFound);
        };
        let Some(origin) = leader.current_space() else {
            warn!(%initiator, "initiator is not in any space");
            return Err(ExecuteSwitchResult::Failed);
        };
        let Some(target) = self.world.space(&status.target_space) else {
            return Err(ExecuteSwitchResult::NotFound);
        };

        SwitchCoordinator::new(
            characters,
            Arc::new(leader),
            origin as Arc<dyn Space>,
            target as Arc<dyn Space>,
            self.options.clone(),
        )
        .map_err(|e| {
            error!(%initiator, err = %e, "failed to set up switch coordinator");
            ExecuteSwitchResult::Failed
        })
    }
}

/// Merge `update` into `group`. A permission that turns into `accept`
/// pre-accepts the character; one that falls back to `prompt` withdraws that
/// acceptance unless the character gave it explicitly. Returns whether
/// anything changed.
fn merge_update(group: &mut SwitchGroup, update: &ShardStatusUpdate) -> bool {
    let mut granted = Vec::new();
    let mut withdrawn = Vec::new();
    for (id, next) in &update.characters {
        let Some(current) = group.status.characters.get(id) else {
            continue;
        };
        match (current.permission, next.permission) {
            (prev, Some(SwitchPermission::Accept)) if prev != Some(SwitchPermission::Accept) => {
                granted.push(*id);
            }
            (
                Some(SwitchPermission::Accept | SwitchPermission::AcceptEnforce),
                Some(SwitchPermission::Prompt),
            ) if !group.consented.contains(id) => withdrawn.push(*id),
            _ => {}
        }
    }

    let applied = group.status.apply_update(update);
    let mut changed = !applied.is_empty();
    for (ids, accepted) in [(granted, true), (withdrawn, false)] {
        for id in ids {
            if let Some(member) = group.status.characters.get_mut(&id) {
                changed |= member.accepted != accepted;
                member.accepted = accepted;
            }
        }
    }
    changed
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
