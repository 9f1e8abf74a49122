// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test infrastructure: stub spaces and scripted characters.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::barrier::SwitchStage;
use crate::character::{Character, SwitchFuture};
use crate::coordinator::SwitchCoordinator;
use crate::error::{AllowEnter, CharacterSwitchOutcome};
use crate::ids::{AccountId, CharacterId, SpaceId};
use crate::space::{InviteKind, Space};

pub fn space_id(text: &str) -> anyhow::Result<SpaceId> {
    Ok(text.parse()?)
}

/// Space with fixed answers and a counter on occupancy reads.
pub struct StubSpace {
    id: SpaceId,
    max_users: usize,
    occupants: usize,
    invites: bool,
    admins: HashSet<AccountId>,
    denials: HashMap<CharacterId, AllowEnter>,
    count_reads: AtomicUsize,
}

impl StubSpace {
    pub fn new(id: SpaceId, max_users: usize, occupants: usize) -> Self {
        Self {
            id,
            max_users,
            occupants,
            invites: false,
            admins: HashSet::new(),
            denials: HashMap::new(),
            count_reads: AtomicUsize::new(0),
        }
    }

    pub fn admin(mut self, account: AccountId) -> Self {
        self.admins.insert(account);
        self
    }

    pub fn invites(mut self) -> Self {
        self.invites = true;
        self
    }

    pub fn deny(mut self, character: CharacterId, answer: AllowEnter) -> Self {
        self.denials.insert(character, answer);
        self
    }

    /// How often `character_count` was read.
    pub fn count_reads(&self) -> usize {
        self.count_reads.load(Ordering::SeqCst)
    }
}

impl Space for StubSpace {
    fn id(&self) -> SpaceId {
        self.id.clone()
    }

    fn check_allow_enter(&self, character: &dyn Character, _assume_invite: bool) -> AllowEnter {
        self.denials.get(&character.id()).copied().unwrap_or(AllowEnter::Ok)
    }

    fn can_create_invite(&self, _character: &dyn Character, _kind: InviteKind) -> bool {
        self.invites
    }

    fn is_admin(&self, account: AccountId) -> bool {
        self.admins.contains(&account)
    }

    fn max_users(&self) -> usize {
        self.max_users
    }

    fn character_count(&self) -> usize {
        self.count_reads.fetch_add(1, Ordering::SeqCst);
        self.occupants
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    Arrived,
    Released,
}

/// Ordered record of barrier arrivals and releases across characters.
#[derive(Debug, Clone, Default)]
pub struct StageLog(Arc<Mutex<Vec<(CharacterId, SwitchStage, Mark)>>>);

impl StageLog {
    fn push(&self, character: CharacterId, stage: SwitchStage, mark: Mark) {
        self.0.lock().push((character, stage, mark));
    }

    pub fn entries(&self) -> Vec<(CharacterId, SwitchStage, Mark)> {
        self.0.lock().clone()
    }

    pub fn reached(&self, character: CharacterId, stage: SwitchStage, mark: Mark) -> bool {
        self.0.lock().iter().any(|e| *e == (character, stage, mark))
    }

    pub fn anyone_reached(&self, stage: SwitchStage) -> bool {
        self.0.lock().iter().any(|(_, s, _)| *s == stage)
    }
}

/// What a scripted character does during its execution.
#[derive(Debug, Clone, Copy)]
pub enum Plan {
    /// Synchronize at every stage and succeed.
    Complete,
    /// Settle with `outcome` instead of synchronizing at `stage`.
    SettleAt(SwitchStage, CharacterSwitchOutcome),
    /// Sleep before synchronizing at `stage`.
    StallAt(SwitchStage, Duration),
    /// Skip every stage before the given one.
    SkipTo(SwitchStage),
    /// Never get past `stage`.
    HangAt(SwitchStage),
}

pub struct ScriptedCharacter {
    id: CharacterId,
    account: AccountId,
    plan: Plan,
    log: StageLog,
}

impl ScriptedCharacter {
    pub fn new(id: u64, plan: Plan, log: &StageLog) -> Arc<Self> {
        Arc::new(Self { id: CharacterId::new(id), account: AccountId(id), plan, log: log.clone() })
    }
}

impl Character for ScriptedCharacter {
    fn id(&self) -> CharacterId {
        self.id
    }

    fn account(&self) -> AccountId {
        self.account
    }

    fn switch_space(
        &self,
        _target: Arc<dyn Space>,
        coordinator: Arc<SwitchCoordinator>,
    ) -> SwitchFuture {
        let (id, plan, log) = (self.id, self.plan, self.log.clone());
        Box::pin(async move {
            for stage in SwitchStage::ALL {
                match plan {
                    Plan::SettleAt(at, outcome) if at == stage => return outcome,
                    Plan::StallAt(at, delay) if at == stage => tokio::time::sleep(delay).await,
                    Plan::HangAt(at) if at == stage => std::future::pending::<()>().await,
                    Plan::SkipTo(at) if stage < at => continue,
                    _ => {}
                }
                log.push(id, stage, Mark::Arrived);
                coordinator.switch_synchronize(id, stage).await;
                log.push(id, stage, Mark::Released);
                if coordinator.canceled() {
                    return CharacterSwitchOutcome::Failed;
                }
            }
            CharacterSwitchOutcome::Ok
        })
    }
}

/// Upcast helper for building groups.
pub fn group(characters: &[&Arc<ScriptedCharacter>]) -> Vec<Arc<dyn Character>> {
    characters.iter().map(|c| Arc::clone(*c) as Arc<dyn Character>).collect()
}
