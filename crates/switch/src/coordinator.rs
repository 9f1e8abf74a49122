// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Group switch coordinator.
//!
//! One [`SwitchCoordinator`] drives one attempt: every character runs its own
//! leave/enter execution as a separate task and rendezvous with the others at
//! each [`SwitchStage`]. A stage completes when every unfinished character has
//! arrived, or as soon as any error is recorded. Completion installs the next
//! stage before releasing the parked characters, so released characters always
//! find the stage they are about to synchronize on.
//!
//! The capacity of the target space is checked exactly once, between
//! `beforeLeave` and `left`.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexSet;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::barrier::{Latch, SwitchStage};
use crate::character::Character;
use crate::error::{CharacterSwitchOutcome, SetupError, SwitchError};
use crate::ids::CharacterId;
use crate::space::{InviteKind, Space};

/// Tunables for a single attempt.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorOptions {
    /// Abort with `failed` when one stage stays open longer than this.
    pub stage_timeout: Option<Duration>,
}

struct ActiveStage {
    stage: SwitchStage,
    epoch: u64,
    release: Latch,
    waiting: IndexSet<CharacterId>,
}

#[derive(Default)]
struct AttemptState {
    started: bool,
    assume_invite: bool,
    ignore_character_limit: bool,
    canceled: bool,
    errors: BTreeSet<SwitchError>,
    stage: Option<ActiveStage>,
    unfinished: IndexSet<CharacterId>,
    epoch: u64,
}

/// Coordinates one group switch attempt.
pub struct SwitchCoordinator {
    characters: Vec<Arc<dyn Character>>,
    initiator: Arc<dyn Character>,
    original_space: Arc<dyn Space>,
    target_space: Arc<dyn Space>,
    options: CoordinatorOptions,
    /// Released once no further stage will be opened.
    sequence_done: Latch,
    stage_epoch: watch::Sender<u64>,
    state: Mutex<AttemptState>,
}

impl std::fmt::Debug for SwitchCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwitchCoordinator")
            .field("initiator", &self.initiator.id())
            .field("target_space", &self.target_space.id())
            .finish()
    }
}

impl SwitchCoordinator {
    /// Create a pristine attempt. Duplicate characters are dropped, keeping the
    /// first occurrence.
    pub fn new(
        characters: Vec<Arc<dyn Character>>,
        initiator: Arc<dyn Character>,
        original_space: Arc<dyn Space>,
        target_space: Arc<dyn Space>,
        options: CoordinatorOptions,
    ) -> Result<Arc<Self>, SetupError> {
        if characters.is_empty() {
            return Err(SetupError::EmptyGroup);
        }
        let initiator_id = initiator.id();
        if !characters.iter().any(|c| c.id() == initiator_id) {
            return Err(SetupError::InitiatorNotInGroup);
        }

        let mut seen = IndexSet::with_capacity(characters.len());
        let characters: Vec<_> = characters.into_iter().filter(|c| seen.insert(c.id())).collect();

        let (stage_epoch, _) = watch::channel(0);
        Ok(Arc::new(Self {
            characters,
            initiator,
            original_space,
            target_space,
            options,
            sequence_done: Latch::new(),
            stage_epoch,
            state: Mutex::new(AttemptState { unfinished: seen, ..Default::default() }),
        }))
    }

    pub fn initiator(&self) -> &Arc<dyn Character> {
        &self.initiator
    }

    pub fn characters(&self) -> &[Arc<dyn Character>] {
        &self.characters
    }

    pub fn original_space(&self) -> &Arc<dyn Space> {
        &self.original_space
    }

    pub fn target_space(&self) -> &Arc<dyn Space> {
        &self.target_space
    }

    /// Whether the initiator could invite others into the target space.
    pub fn assume_invite(&self) -> bool {
        self.state.lock().assume_invite
    }

    /// Whether the initiator administers the target space.
    pub fn ignore_character_limit(&self) -> bool {
        self.state.lock().ignore_character_limit
    }

    /// Latched once any error is recorded.
    pub fn canceled(&self) -> bool {
        self.state.lock().canceled
    }

    /// Recorded causes, highest priority first.
    pub fn errors(&self) -> Vec<SwitchError> {
        self.state.lock().errors.iter().rev().copied().collect()
    }

    pub fn current_stage(&self) -> Option<SwitchStage> {
        self.state.lock().stage.as_ref().map(|s| s.stage)
    }

    /// Drive the attempt to its single terminal outcome.
    pub async fn run(self: &Arc<Self>) -> Result<(), SwitchError> {
        let initiator = self.initiator.id();
        {
            let mut st = self.state.lock();
            if st.started {
                error!(%initiator, "switch attempt run more than once");
                return Err(SwitchError::Failed);
            }
            st.started = true;
        }

        if let Some(denied) = self.target_space.check_allow_enter(self.initiator.as_ref(), false).denial() {
            info!(%initiator, target = %self.target_space.id(), result = %denied, "initiator may not enter target space");
            return Err(denied);
        }

        let assume_invite = self.target_space.can_create_invite(self.initiator.as_ref(), InviteKind::JoinMe);
        // Admins could raise the limit after joining anyway.
        let ignore_character_limit = self.target_space.is_admin(self.initiator.account());

        {
            let mut st = self.state.lock();
            st.assume_invite = assume_invite;
            st.ignore_character_limit = ignore_character_limit;
            info!(
                %initiator,
                from = %self.original_space.id(),
                target = %self.target_space.id(),
                characters = self.characters.len(),
                assume_invite,
                ignore_character_limit,
                "space switch started"
            );
            let first = (!st.canceled).then_some(SwitchStage::SyncLock);
            self.enter_stage(&mut st, first);
        }

        let mut aborts = Vec::with_capacity(self.characters.len());
        let mut executions = Vec::with_capacity(self.characters.len());
        for c in &self.characters {
            let id = c.id();
            let handle = tokio::spawn(c.switch_space(Arc::clone(&self.target_space), Arc::clone(self)));
            aborts.push(handle.abort_handle());
            let this = Arc::clone(self);
            executions.push(async move {
                let outcome = match handle.await {
                    Ok(outcome) => outcome,
                    Err(e) if e.is_cancelled() => {
                        warn!(%initiator, character = %id, "character switch abandoned");
                        CharacterSwitchOutcome::Failed
                    }
                    Err(e) => {
                        error!(%initiator, character = %id, err = %e, "character switch task failed");
                        CharacterSwitchOutcome::Failed
                    }
                };
                this.character_settled(id, outcome);
            });
        }

        let watchdog = async {
            if let Some(timeout) = self.options.stage_timeout {
                self.watch_stages(timeout).await;
            }
        };
        let settled = async {
            let all = futures_util::future::join_all(executions);
            match self.options.stage_timeout {
                Some(timeout) => {
                    tokio::select! {
                        _ = all => {}
                        _ = self.reap_stragglers(timeout, &aborts) => {}
                    }
                }
                None => {
                    all.await;
                }
            }
        };

        tokio::join!(settled, self.sequence_done.wait(), watchdog);

        let st = self.state.lock();
        let result = match st.errors.iter().max() {
            Some(err) => Err(*err),
            None if st.canceled => Err(SwitchError::Failed),
            None => Ok(()),
        };
        match result {
            Ok(()) => info!(%initiator, "space switch finished"),
            Err(err) => info!(%initiator, result = %err, errors = ?st.errors, "space switch failed"),
        }
        result
    }

    /// Rendezvous point for character executions.
    ///
    /// Marks `character` as arrived at `stage` and returns a future that
    /// resolves once the stage completes. Resolves immediately if the attempt
    /// is already canceled, or if `stage` is not the active stage (which is
    /// recorded as `failed`).
    pub fn switch_synchronize(
        &self,
        character: CharacterId,
        stage: SwitchStage,
    ) -> impl std::future::Future<Output = ()> + Send + 'static {
        let release = {
            let mut st = self.state.lock();
            if st.canceled {
                None
            } else {
                let active = st.stage.as_ref().map(|a| (a.stage, a.release.clone()));
                match active {
                    Some((current, release)) if current == stage => {
                        self.mark_arrived(&mut st, character);
                        Some(release)
                    }
                    other => {
                        error!(
                            initiator = %self.initiator.id(),
                            %character,
                            %stage,
                            current = ?other.map(|(s, _)| s),
                            "character synchronized at wrong stage"
                        );
                        self.record_error(&mut st, SwitchError::Failed);
                        None
                    }
                }
            }
        };

        async move {
            if let Some(release) = release {
                release.wait().await;
            }
        }
    }

    fn character_settled(&self, character: CharacterId, outcome: CharacterSwitchOutcome) {
        let mut st = self.state.lock();
        st.unfinished.shift_remove(&character);
        match outcome.fold() {
            None => self.mark_arrived(&mut st, character),
            Some(err) => {
                debug!(initiator = %self.initiator.id(), %character, ?outcome, "character switch failed");
                self.record_error(&mut st, err);
            }
        }
    }

    fn mark_arrived(&self, st: &mut AttemptState, character: CharacterId) {
        let Some(active) = st.stage.as_mut() else {
            return;
        };
        active.waiting.shift_remove(&character);
        if active.waiting.is_empty() {
            self.complete_stage(st);
        }
    }

    fn record_error(&self, st: &mut AttemptState, cause: SwitchError) {
        st.errors.insert(cause);
        if !st.canceled {
            debug!(initiator = %self.initiator.id(), %cause, "switch canceled");
        }
        st.canceled = true;
        self.complete_stage(st);
    }

    /// Close the active stage, open whatever follows, then release the
    /// characters parked on the closed stage.
    fn complete_stage(&self, st: &mut AttemptState) {
        let Some(done) = st.stage.take() else {
            return;
        };
        debug!(initiator = %self.initiator.id(), stage = %done.stage, canceled = st.canceled, "stage complete");
        let next = self.after_stage(st, done.stage);
        self.enter_stage(st, next);
        done.release.release();
    }

    /// Stage to open after `done`; runs the capacity check after `beforeLeave`.
    fn after_stage(&self, st: &mut AttemptState, done: SwitchStage) -> Option<SwitchStage> {
        if st.canceled {
            return None;
        }
        if done == SwitchStage::BeforeLeave {
            let limit = if st.ignore_character_limit {
                usize::MAX
            } else {
                self.target_space.max_users()
            };
            let occupants = self.target_space.character_count();
            if occupants.saturating_add(st.unfinished.len()) > limit {
                info!(
                    initiator = %self.initiator.id(),
                    occupants,
                    arriving = st.unfinished.len(),
                    limit,
                    "target space cannot fit the group"
                );
                self.record_error(st, SwitchError::SpaceFull);
                return None;
            }
        }
        done.next()
    }

    /// Install `next` (skipping stages nobody is left to wait for); release
    /// `sequence_done` when there is nothing left to open.
    fn enter_stage(&self, st: &mut AttemptState, mut next: Option<SwitchStage>) {
        while let Some(stage) = next {
            if !st.unfinished.is_empty() {
                st.epoch += 1;
                st.stage = Some(ActiveStage {
                    stage,
                    epoch: st.epoch,
                    release: Latch::new(),
                    waiting: st.unfinished.clone(),
                });
                self.stage_epoch.send_replace(st.epoch);
                return;
            }
            next = self.after_stage(st, stage);
        }
        self.sequence_done.release();
    }

    async fn watch_stages(&self, timeout: Duration) {
        let mut epochs = self.stage_epoch.subscribe();
        loop {
            let epoch = *epochs.borrow_and_update();
            tokio::select! {
                _ = self.sequence_done.wait() => return,
                changed = epochs.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
                _ = tokio::time::sleep(timeout) => self.expire_stage(epoch),
            }
        }
    }

    /// Once no stage is left to open, give executions one more `timeout` to
    /// settle, then abort the rest. Never returns; the aborted tasks settle
    /// through their `JoinError`.
    async fn reap_stragglers(&self, timeout: Duration, aborts: &[tokio::task::AbortHandle]) {
        self.sequence_done.wait().await;
        tokio::time::sleep(timeout).await;
        let stragglers: Vec<_> = self.state.lock().unfinished.iter().copied().collect();
        if !stragglers.is_empty() {
            warn!(initiator = %self.initiator.id(), ?stragglers, "aborting character switches that did not settle");
        }
        for abort in aborts {
            abort.abort();
        }
        std::future::pending::<()>().await
    }

    fn expire_stage(&self, epoch: u64) {
        let mut st = self.state.lock();
        let Some(active) = st.stage.as_ref().filter(|a| a.epoch == epoch) else {
            return;
        };
        warn!(
            initiator = %self.initiator.id(),
            stage = %active.stage,
            missing = ?active.waiting,
            "switch stage timed out"
        );
        self.record_error(&mut st, SwitchError::Failed);
    }
}

#[cfg(test)]
#[path = "coordinator_tests.rs"]
mod tests;
