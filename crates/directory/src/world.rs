// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process world: hosted spaces, characters, and the leave/enter
//! execution each character runs under a switch coordinator.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use spaceswitch::status::{ResolvedCharacterStatus, SwitchPermission, SwitchRestriction};
use spaceswitch::{
    AccountId, AllowEnter, Character, CharacterId, CharacterSwitchOutcome, InviteKind, Space,
    SpaceId, SwitchCoordinator, SwitchFuture, SwitchStage,
};

fn default_max_users() -> usize {
    16
}

/// Access policy and limits of a hosted space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceConfig {
    pub name: String,
    #[serde(default = "default_max_users")]
    pub max_users: usize,
    /// Anyone not banned may enter.
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub admins: Vec<AccountId>,
    #[serde(default)]
    pub allow: Vec<AccountId>,
    #[serde(default)]
    pub ban: Vec<AccountId>,
}

impl SpaceConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_users: default_max_users(),
            public: false,
            admins: vec![],
            allow: vec![],
            ban: vec![],
        }
    }
}

/// A space hosted by this directory.
#[derive(Debug)]
pub struct LocalSpace {
    id: SpaceId,
    config: RwLock<SpaceConfig>,
    occupants: Mutex<IndexSet<CharacterId>>,
}

impl LocalSpace {
    pub fn new(id: SpaceId, config: SpaceConfig) -> Self {
        Self { id, config: RwLock::new(config), occupants: Mutex::new(IndexSet::new()) }
    }

    pub fn config(&self) -> SpaceConfig {
        self.config.read().clone()
    }

    pub fn update_config(&self, f: impl FnOnce(&mut SpaceConfig)) {
        f(&mut self.config.write());
    }

    pub fn occupants(&self) -> Vec<CharacterId> {
        self.occupants.lock().iter().copied().collect()
    }

    /// Add `character` unless the space is full.
    fn try_admit(&self, character: CharacterId, ignore_limit: bool) -> bool {
        let max_users = self.config.read().max_users;
        let mut occupants = self.occupants.lock();
        if !ignore_limit && !occupants.contains(&character) && occupants.len() >= max_users {
            return false;
        }
        occupants.insert(character);
        true
    }

    fn admit(&self, character: CharacterId) {
        self.occupants.lock().insert(character);
    }

    fn release(&self, character: CharacterId) -> bool {
        self.occupants.lock().shift_remove(&character)
    }
}

impl Space for LocalSpace {
    fn id(&self) -> SpaceId {
        self.id.clone()
    }

    fn check_allow_enter(&self, character: &dyn Character, assume_invite: bool) -> AllowEnter {
        let account = character.account();
        let config = self.config.read();
        let admin = config.admins.contains(&account);
        if admin {
            return AllowEnter::Ok;
        }
        if config.ban.contains(&account) {
            return AllowEnter::NoAccess;
        }
        if self.character_count() >= config.max_users {
            return AllowEnter::SpaceFull;
        }
        if config.public || config.allow.contains(&account) || assume_invite {
            AllowEnter::Ok
        } else {
            AllowEnter::NoAccess
        }
    }

    fn can_create_invite(&self, character: &dyn Character, kind: InviteKind) -> bool {
        let account = character.account();
        let config = self.config.read();
        if config.admins.contains(&account) {
            return true;
        }
        if config.ban.contains(&account) {
            return false;
        }
        match kind {
            InviteKind::JoinMe => config.public || config.allow.contains(&account),
            InviteKind::SpaceBound => false,
        }
    }

    fn is_admin(&self, account: AccountId) -> bool {
        self.config.read().admins.contains(&account)
    }

    fn max_users(&self) -> usize {
        self.config.read().max_users
    }

    fn character_count(&self) -> usize {
        self.occupants.lock().len()
    }
}

/// Conditions that keep a character in its current space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveState {
    /// Seated in an in-room device (vehicle, seat).
    #[serde(default)]
    pub in_room_device: bool,
    /// Held by a space rule.
    #[serde(default)]
    pub restricted: bool,
}

/// Character modifier that agrees to switches ahead of time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoApprove {
    /// Initiators covered by the modifier; empty covers everyone.
    #[serde(default)]
    pub characters: Vec<CharacterId>,
    /// The character cannot withdraw.
    #[serde(default)]
    pub enforce: bool,
}

impl AutoApprove {
    fn covers(&self, initiator: CharacterId) -> bool {
        self.characters.is_empty() || self.characters.contains(&initiator)
    }
}

type SpaceTable = RwLock<HashMap<SpaceId, Arc<LocalSpace>>>;

#[derive(Debug)]
struct CharacterEntry {
    id: CharacterId,
    account: AccountId,
    name: String,
    space: Mutex<Option<SpaceId>>,
    leave: Mutex<LeaveState>,
    blocked: Mutex<Vec<AccountId>>,
    auto_approve: Mutex<Option<AutoApprove>>,
    spaces: Arc<SpaceTable>,
}

/// Handle to a character hosted by this directory. Cheap to clone.
#[derive(Debug, Clone)]
pub struct LocalCharacter(Arc<CharacterEntry>);

impl LocalCharacter {
    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn space(&self) -> Option<SpaceId> {
        self.0.space.lock().clone()
    }

    pub fn current_space(&self) -> Option<Arc<LocalSpace>> {
        self.space().and_then(|id| self.lookup_space(&id))
    }

    pub fn leave_state(&self) -> LeaveState {
        *self.0.leave.lock()
    }

    pub fn set_leave_state(&self, state: LeaveState) {
        *self.0.leave.lock() = state;
    }

    pub fn set_blocked(&self, accounts: Vec<AccountId>) {
        *self.0.blocked.lock() = accounts;
    }

    pub fn set_auto_approve(&self, modifier: Option<AutoApprove>) {
        *self.0.auto_approve.lock() = modifier;
    }

    /// Whether `initiator` may bring this character along.
    pub fn switch_permission(&self, initiator: &LocalCharacter) -> SwitchPermission {
        if initiator.id() == self.id() {
            return SwitchPermission::AcceptEnforce;
        }
        if self.0.blocked.lock().contains(&initiator.account()) {
            return SwitchPermission::Rejected;
        }
        match self.0.auto_approve.lock().as_ref() {
            Some(auto) if auto.covers(initiator.id()) && auto.enforce => {
                SwitchPermission::AcceptEnforce
            }
            Some(auto) if auto.covers(initiator.id()) => SwitchPermission::Accept,
            _ => SwitchPermission::Prompt,
        }
    }

    /// Whether this character may leave its current space right now.
    pub fn leave_restriction(&self) -> SwitchRestriction {
        let leave = self.leave_state();
        if leave.in_room_device {
            SwitchRestriction::InRoomDevice
        } else if leave.restricted {
            SwitchRestriction::Restricted
        } else {
            SwitchRestriction::Ok
        }
    }

    /// Shard-side resolution of this character within `initiator`'s group.
    pub fn resolve(&self, initiator: &LocalCharacter) -> ResolvedCharacterStatus {
        ResolvedCharacterStatus {
            permission: Some(self.switch_permission(initiator)),
            restriction: Some(self.leave_restriction()),
        }
    }

    fn lookup_space(&self, id: &SpaceId) -> Option<Arc<LocalSpace>> {
        self.0.spaces.read().get(id).cloned()
    }

    fn set_space(&self, space: Option<SpaceId>) {
        *self.0.space.lock() = space;
    }

    /// Move into `space` unconditionally, leaving the current one.
    fn place(&self, space: &Arc<LocalSpace>) {
        if let Some(current) = self.current_space() {
            current.release(self.id());
        }
        space.admit(self.id());
        self.set_space(Some(space.id()));
    }

    fn return_to(&self, original: &Arc<LocalSpace>, initiator: CharacterId) {
        self.place(original);
        warn!(%initiator, character = %self.id(), space = %original.id(), "returned to original space");
    }

    async fn execute_switch(
        &self,
        target: Arc<dyn Space>,
        coordinator: Arc<SwitchCoordinator>,
    ) -> CharacterSwitchOutcome {
        let id = self.id();
        let initiator = coordinator.initiator().id();

        coordinator.switch_synchronize(id, SwitchStage::SyncLock).await;
        if coordinator.canceled() {
            return CharacterSwitchOutcome::Failed;
        }

        let origin = coordinator.original_space().id();
        let Some(from) = self.current_space().filter(|s| s.id() == origin) else {
            warn!(%initiator, character = %id, %origin, "character is not in the original space");
            return CharacterSwitchOutcome::Failed;
        };
        let Some(to) = self.lookup_space(&target.id()) else {
            warn!(%initiator, character = %id, target = %target.id(), "target space is not hosted here");
            return CharacterSwitchOutcome::Failed;
        };

        match self.leave_restriction() {
            SwitchRestriction::InRoomDevice => return CharacterSwitchOutcome::InRoomDevice,
            SwitchRestriction::Restricted => return CharacterSwitchOutcome::Restricted,
            SwitchRestriction::Ok => {}
        }
        match target.check_allow_enter(self, coordinator.assume_invite()) {
            AllowEnter::Ok => {}
            AllowEnter::SpaceFull if coordinator.ignore_character_limit() => {}
            denied => {
                debug!(%initiator, character = %id, ?denied, "enter precheck failed");
                return denied.into();
            }
        }

        for stage in [SwitchStage::EnterPrecheck, SwitchStage::BeforeLeave] {
            coordinator.switch_synchronize(id, stage).await;
            if coordinator.canceled() {
                return CharacterSwitchOutcome::Failed;
            }
        }

        from.release(id);
        self.set_space(None);

        for stage in [SwitchStage::Left, SwitchStage::BeforeEnter] {
            coordinator.switch_synchronize(id, stage).await;
            if coordinator.canceled() {
                self.return_to(&from, initiator);
                return CharacterSwitchOutcome::Failed;
            }
        }

        // The group fit at `left`; someone else may have joined since.
        if !to.try_admit(id, coordinator.ignore_character_limit()) {
            self.return_to(&from, initiator);
            return CharacterSwitchOutcome::SpaceFull;
        }
        self.set_space(Some(to.id()));
        info!(%initiator, character = %id, from = %from.id(), to = %to.id(), "character switched space");
        CharacterSwitchOutcome::Ok
    }
}

impl Character for LocalCharacter {
    fn id(&self) -> CharacterId {
        self.0.id
    }

    fn account(&self) -> AccountId {
        self.0.account
    }

    fn switch_space(
        &self,
        target: Arc<dyn Space>,
        coordinator: Arc<SwitchCoordinator>,
    ) -> SwitchFuture {
        let me = self.clone();
        Box::pin(async move { me.execute_switch(target, coordinator).await })
    }
}

// -- Seed file -----------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldSeed {
    #[serde(default)]
    pub spaces: Vec<SpaceSeed>,
    #[serde(default)]
    pub characters: Vec<CharacterSeed>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpaceSeed {
    pub id: SpaceId,
    #[serde(flatten)]
    pub config: SpaceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterSeed {
    pub id: CharacterId,
    pub account: AccountId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub space: Option<SpaceId>,
    #[serde(flatten)]
    pub leave: LeaveState,
    #[serde(default)]
    pub blocked_accounts: Vec<AccountId>,
    #[serde(default)]
    pub auto_approve: Option<AutoApprove>,
}

// -- World ---------------------------------------------------------------------

/// Every space and character this directory hosts.
#[derive(Debug, Default)]
pub struct World {
    spaces: Arc<SpaceTable>,
    characters: RwLock<HashMap<CharacterId, LocalCharacter>>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read and build a world from a JSON seed file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let seed: WorldSeed = serde_json::from_str(&contents)?;
        Self::from_seed(seed)
    }

    pub fn from_seed(seed: WorldSeed) -> anyhow::Result<Self> {
        let world = Self::new();
        for space in seed.spaces {
            if world.space(&space.id).is_some() {
                anyhow::bail!("duplicate space: {}", space.id);
            }
            world.add_space(space.id, space.config);
        }
        for c in seed.characters {
            if world.character(&c.id).is_some() {
                anyhow::bail!("duplicate character: {}", c.id);
            }
            let character = world.add_character(c.id, c.account, c.name);
            character.set_leave_state(c.leave);
            character.set_blocked(c.blocked_accounts);
            character.set_auto_approve(c.auto_approve);
            if let Some(space) = c.space {
                if !world.place(&c.id, &space) {
                    anyhow::bail!("character {} placed in unknown space {space}", c.id);
                }
            }
        }
        Ok(world)
    }

    pub fn add_space(&self, id: SpaceId, config: SpaceConfig) -> Arc<LocalSpace> {
        let space = Arc::new(LocalSpace::new(id.clone(), config));
        self.spaces.write().insert(id, Arc::clone(&space));
        space
    }

    pub fn add_character(
        &self,
        id: CharacterId,
        account: AccountId,
        name: impl Into<String>,
    ) -> LocalCharacter {
        let character = LocalCharacter(Arc::new(CharacterEntry {
            id,
            account,
            name: name.into(),
            space: Mutex::new(None),
            leave: Mutex::new(LeaveState::default()),
            blocked: Mutex::new(vec![]),
            auto_approve: Mutex::new(None),
            spaces: Arc::clone(&self.spaces),
        }));
        self.characters.write().insert(id, character.clone());
        character
    }

    /// Put `character` into `space`; false if either is unknown.
    pub fn place(&self, character: &CharacterId, space: &SpaceId) -> bool {
        match (self.character(character), self.space(space)) {
            (Some(character), Some(space)) => {
                character.place(&space);
                true
            }
            _ => false,
        }
    }

    pub fn space(&self, id: &SpaceId) -> Option<Arc<LocalSpace>> {
        self.spaces.read().get(id).cloned()
    }

    pub fn character(&self, id: &CharacterId) -> Option<LocalCharacter> {
        self.characters.read().get(id).cloned()
    }

    pub fn space_count(&self) -> usize {
        self.spaces.read().len()
    }

    pub fn character_count(&self) -> usize {
        self.characters.read().len()
    }
}

#[cfg(test)]
#[path = "world_tests.rs"]
mod tests;
