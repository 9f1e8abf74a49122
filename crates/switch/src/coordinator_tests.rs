// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;

use super::*;
use crate::error::AllowEnter;
use crate::ids::AccountId;
use crate::test_support::{group, space_id, Mark, Plan, ScriptedCharacter, StageLog, StubSpace};

const LIMIT: Duration = Duration::from_secs(5);

fn origin() -> anyhow::Result<Arc<dyn Space>> {
    Ok(Arc::new(StubSpace::new(space_id("s/origin")?, 50, 10)))
}

async fn run_switch(coordinator: &Arc<SwitchCoordinator>) -> anyhow::Result<Result<(), SwitchError>> {
    Ok(tokio::time::timeout(LIMIT, coordinator.run()).await?)
}

fn coordinator(
    characters: Vec<Arc<dyn Character>>,
    initiator: &Arc<ScriptedCharacter>,
    target: Arc<dyn Space>,
    options: CoordinatorOptions,
) -> anyhow::Result<Arc<SwitchCoordinator>> {
    let initiator: Arc<dyn Character> = Arc::clone(initiator) as Arc<dyn Character>;
    Ok(SwitchCoordinator::new(characters, initiator, origin()?, target, options)?)
}

#[test]
fn construction_requires_initiator_in_group() -> anyhow::Result<()> {
    let log = StageLog::default();
    let a = ScriptedCharacter::new(1, Plan::Complete, &log);
    let b = ScriptedCharacter::new(2, Plan::Complete, &log);
    let target: Arc<dyn Space> = Arc::new(StubSpace::new(space_id("s/target")?, 10, 0));

    let result = SwitchCoordinator::new(
        group(&[&b]),
        a.clone() as Arc<dyn Character>,
        origin()?,
        Arc::clone(&target),
        CoordinatorOptions::default(),
    );
    assert_eq!(result.err(), Some(SetupError::InitiatorNotInGroup));

    let result = SwitchCoordinator::new(
        Vec::new(),
        a as Arc<dyn Character>,
        origin()?,
        target,
        CoordinatorOptions::default(),
    );
    assert_eq!(result.err(), Some(SetupError::EmptyGroup));
    Ok(())
}

#[test]
fn construction_is_pristine_and_dedupes() -> anyhow::Result<()> {
    let log = StageLog::default();
    let a = ScriptedCharacter::new(1, Plan::Complete, &log);
    let b = ScriptedCharacter::new(2, Plan::Complete, &log);
    let target = Arc::new(StubSpace::new(space_id("s/target")?, 10, 0));
    let c = coordinator(group(&[&a, &b, &a]), &a, target, CoordinatorOptions::default())?;

    assert_eq!(c.characters().len(), 2);
    assert!(!c.canceled());
    assert!(c.errors().is_empty());
    assert_eq!(c.current_stage(), None);
    Ok(())
}

#[tokio::test]
async fn group_switch_succeeds_in_stage_order() -> anyhow::Result<()> {
    let log = StageLog::default();
    let a = ScriptedCharacter::new(1, Plan::Complete, &log);
    let b = ScriptedCharacter::new(2, Plan::StallAt(SwitchStage::EnterPrecheck, Duration::from_millis(20)), &log);
    let c = ScriptedCharacter::new(3, Plan::Complete, &log);
    let target = Arc::new(StubSpace::new(space_id("s/target")?, 10, 2));
    let coord = coordinator(group(&[&a, &b, &c]), &a, target.clone(), CoordinatorOptions::default())?;

    assert_eq!(run_switch(&coord).await?, Ok(()));
    assert!(!coord.canceled());
    assert_eq!(coord.current_stage(), None);
    assert_eq!(target.count_reads(), 1, "capacity is checked exactly once");

    // Nobody arrives at a stage before everyone arrived at every earlier one.
    let entries = log.entries();
    let ids = [a.id(), b.id(), c.id()];
    for (pos, (_, stage, mark)) in entries.iter().enumerate() {
        if *mark != Mark::Arrived {
            continue;
        }
        for earlier in SwitchStage::ALL.iter().filter(|s| *s < stage) {
            for id in ids {
                assert!(
                    entries[..pos].contains(&(id, *earlier, Mark::Arrived)),
                    "{id} had not reached {earlier} before someone reached {stage}"
                );
            }
        }
    }
    for id in ids {
        assert!(log.reached(id, SwitchStage::BeforeEnter, Mark::Released));
    }
    Ok(())
}

#[tokio::test]
async fn capacity_check_rejects_group_that_does_not_fit() -> anyhow::Result<()> {
    let log = StageLog::default();
    let a = ScriptedCharacter::new(1, Plan::Complete, &log);
    let b = ScriptedCharacter::new(2, Plan::Complete, &log);
    let c = ScriptedCharacter::new(3, Plan::Complete, &log);
    // Room for two more.
    let target = Arc::new(StubSpace::new(space_id("s/target")?, 5, 3));
    let coord = coordinator(group(&[&a, &b, &c]), &a, target.clone(), CoordinatorOptions::default())?;

    assert_eq!(run_switch(&coord).await?, Err(SwitchError::SpaceFull));
    assert!(coord.canceled());
    assert!(!log.anyone_reached(SwitchStage::Left), "nobody may pass the capacity check");
    assert!(log.reached(a.id(), SwitchStage::BeforeLeave, Mark::Released));
    assert_eq!(target.count_reads(), 1);
    // Released characters tear down and report `failed`, which ranks below.
    assert_eq!(coord.errors(), vec![SwitchError::SpaceFull, SwitchError::Failed]);
    Ok(())
}

#[tokio::test]
async fn admin_initiator_ignores_character_limit() -> anyhow::Result<()> {
    let log = StageLog::default();
    let a = ScriptedCharacter::new(1, Plan::Complete, &log);
    let b = ScriptedCharacter::new(2, Plan::Complete, &log);
    let c = ScriptedCharacter::new(3, Plan::Complete, &log);
    let target = Arc::new(StubSpace::new(space_id("s/target")?, 5, 3).admin(AccountId(1)));
    let coord = coordinator(group(&[&a, &b, &c]), &a, target, CoordinatorOptions::default())?;

    assert_eq!(run_switch(&coord).await?, Ok(()));
    assert!(coord.ignore_character_limit());
    Ok(())
}

#[tokio::test]
async fn exact_fit_succeeds_without_admin() -> anyhow::Result<()> {
    let log = StageLog::default();
    let a = ScriptedCharacter::new(1, Plan::Complete, &log);
    let b = ScriptedCharacter::new(2, Plan::Complete, &log);
    let c = ScriptedCharacter::new(3, Plan::Complete, &log);
    let target = Arc::new(StubSpace::new(space_id("s/target")?, 5, 2).invites());
    let coord = coordinator(group(&[&a, &b, &c]), &a, target, CoordinatorOptions::default())?;

    assert_eq!(run_switch(&coord).await?, Ok(()));
    assert!(coord.assume_invite());
    assert!(!coord.ignore_character_limit());
    Ok(())
}

#[tokio::test]
async fn leave_blocker_reports_not_ready() -> anyhow::Result<()> {
    for blocker in [CharacterSwitchOutcome::InRoomDevice, CharacterSwitchOutcome::Restricted] {
        let log = StageLog::default();
        let a = ScriptedCharacter::new(1, Plan::Complete, &log);
        let b = ScriptedCharacter::new(
            2,
            Plan::SettleAt(SwitchStage::EnterPrecheck, CharacterSwitchOutcome::NoAccess),
            &log,
        );
        let c = ScriptedCharacter::new(3, Plan::SettleAt(SwitchStage::EnterPrecheck, blocker), &log);
        let target = Arc::new(StubSpace::new(space_id("s/target")?, 10, 0));
        let coord = coordinator(group(&[&a, &b, &c]), &a, target, CoordinatorOptions::default())?;

        assert_eq!(run_switch(&coord).await?, Err(SwitchError::NotReady), "{blocker:?}");
        assert!(coord.errors().contains(&SwitchError::NoAccess));
    }
    Ok(())
}

#[tokio::test]
async fn invalid_invite_folds_to_failed() -> anyhow::Result<()> {
    let log = StageLog::default();
    let a = ScriptedCharacter::new(1, Plan::Complete, &log);
    let b = ScriptedCharacter::new(2, Plan::SettleAt(SwitchStage::Left, CharacterSwitchOutcome::InvalidInvite), &log);
    let target = Arc::new(StubSpace::new(space_id("s/target")?, 10, 0));
    let coord = coordinator(group(&[&a, &b]), &a, target, CoordinatorOptions::default())?;

    assert_eq!(run_switch(&coord).await?, Err(SwitchError::Failed));
    assert!(!log.anyone_reached(SwitchStage::BeforeEnter));
    Ok(())
}

#[tokio::test]
async fn initiator_admission_denial_short_circuits() -> anyhow::Result<()> {
    let cases = [
        (AllowEnter::NoAccess, SwitchError::NoAccess),
        (AllowEnter::SpaceFull, SwitchError::SpaceFull),
        (AllowEnter::InvalidInvite, SwitchError::Failed),
    ];
    for (answer, expected) in cases {
        let log = StageLog::default();
        let a = ScriptedCharacter::new(1, Plan::Complete, &log);
        let b = ScriptedCharacter::new(2, Plan::Complete, &log);
        let target = Arc::new(StubSpace::new(space_id("s/target")?, 10, 0).deny(a.id(), answer));
        let coord =
            coordinator(group(&[&a, &b]), &a, target.clone(), CoordinatorOptions::default())?;

        assert_eq!(run_switch(&coord).await?, Err(expected), "{answer:?}");
        assert!(log.entries().is_empty(), "no character may be touched");
        assert_eq!(target.count_reads(), 0);
    }
    Ok(())
}

#[tokio::test]
async fn wrong_stage_is_a_protocol_violation() -> anyhow::Result<()> {
    let log = StageLog::default();
    let a = ScriptedCharacter::new(1, Plan::Complete, &log);
    let b = ScriptedCharacter::new(2, Plan::SkipTo(SwitchStage::BeforeLeave), &log);
    let target = Arc::new(StubSpace::new(space_id("s/target")?, 10, 0));
    let coord = coordinator(group(&[&a, &b]), &a, target, CoordinatorOptions::default())?;

    assert_eq!(run_switch(&coord).await?, Err(SwitchError::Failed));
    assert!(coord.canceled());
    assert!(!log.anyone_reached(SwitchStage::Left));
    Ok(())
}

#[tokio::test]
async fn error_releases_every_parked_character() -> anyhow::Result<()> {
    let log = StageLog::default();
    let a = ScriptedCharacter::new(1, Plan::Complete, &log);
    let b = ScriptedCharacter::new(2, Plan::Complete, &log);
    let c = ScriptedCharacter::new(3, Plan::Complete, &log);
    let target = Arc::new(StubSpace::new(space_id("s/target")?, 10, 0));
    let coord = coordinator(group(&[&a, &b, &c]), &a, target, CoordinatorOptions::default())?;

    {
        let mut st = coord.state.lock();
        coord.enter_stage(&mut st, Some(SwitchStage::SyncLock));
    }

    // One of three arrives and parks.
    let mut parked = Box::pin(coord.switch_synchronize(a.id(), SwitchStage::SyncLock));
    assert!(parked.as_mut().now_or_never().is_none());
    assert_eq!(coord.current_stage(), Some(SwitchStage::SyncLock));

    {
        let mut st = coord.state.lock();
        coord.record_error(&mut st, SwitchError::NoAccess);
    }

    assert!(parked.now_or_never().is_some(), "parked character is released");
    assert_eq!(coord.current_stage(), None);
    // The two stragglers pass straight through.
    assert!(coord.switch_synchronize(b.id(), SwitchStage::SyncLock).now_or_never().is_some());
    assert!(coord.switch_synchronize(c.id(), SwitchStage::EnterPrecheck).now_or_never().is_some());
    assert_eq!(coord.errors(), vec![SwitchError::NoAccess]);
    Ok(())
}

#[tokio::test]
async fn early_failure_unblocks_waiting_characters() -> anyhow::Result<()> {
    let log = StageLog::default();
    let a = ScriptedCharacter::new(1, Plan::Complete, &log);
    let b = ScriptedCharacter::new(2, Plan::SettleAt(SwitchStage::SyncLock, CharacterSwitchOutcome::NoAccess), &log);
    let c = ScriptedCharacter::new(3, Plan::StallAt(SwitchStage::SyncLock, Duration::from_millis(20)), &log);
    let target = Arc::new(StubSpace::new(space_id("s/target")?, 10, 0));
    let coord = coordinator(group(&[&a, &b, &c]), &a, target, CoordinatorOptions::default())?;

    assert_eq!(run_switch(&coord).await?, Err(SwitchError::NoAccess));
    assert!(!log.anyone_reached(SwitchStage::EnterPrecheck));
    Ok(())
}

#[tokio::test]
async fn stalled_stage_times_out() -> anyhow::Result<()> {
    let log = StageLog::default();
    let a = ScriptedCharacter::new(1, Plan::Complete, &log);
    let b = ScriptedCharacter::new(2, Plan::StallAt(SwitchStage::BeforeLeave, Duration::from_millis(500)), &log);
    let target = Arc::new(StubSpace::new(space_id("s/target")?, 10, 0));
    let options = CoordinatorOptions { stage_timeout: Some(Duration::from_millis(50)) };
    let coord = coordinator(group(&[&a, &b]), &a, target, options)?;

    assert_eq!(run_switch(&coord).await?, Err(SwitchError::Failed));
    assert!(log.reached(a.id(), SwitchStage::BeforeLeave, Mark::Released));
    assert!(!log.anyone_reached(SwitchStage::Left));
    Ok(())
}

#[tokio::test]
async fn execution_that_never_settles_is_abandoned() -> anyhow::Result<()> {
    let log = StageLog::default();
    let a = ScriptedCharacter::new(1, Plan::Complete, &log);
    let b = ScriptedCharacter::new(2, Plan::HangAt(SwitchStage::SyncLock), &log);
    let target = Arc::new(StubSpace::new(space_id("s/target")?, 10, 0));
    let options = CoordinatorOptions { stage_timeout: Some(Duration::from_millis(50)) };
    let coord = coordinator(group(&[&a, &b]), &a, target, options)?;

    assert_eq!(run_switch(&coord).await?, Err(SwitchError::Failed));
    assert!(coord.canceled());
    assert!(!log.reached(b.id(), SwitchStage::SyncLock, Mark::Arrived));
    assert!(!log.anyone_reached(SwitchStage::EnterPrecheck));
    Ok(())
}

#[tokio::test]
async fn healthy_attempt_survives_stage_timeout() -> anyhow::Result<()> {
    let log = StageLog::default();
    let a = ScriptedCharacter::new(1, Plan::Complete, &log);
    let b = ScriptedCharacter::new(2, Plan::StallAt(SwitchStage::Left, Duration::from_millis(10)), &log);
    let target = Arc::new(StubSpace::new(space_id("s/target")?, 10, 0));
    let options = CoordinatorOptions { stage_timeout: Some(Duration::from_millis(200)) };
    let coord = coordinator(group(&[&a, &b]), &a, target, options)?;

    assert_eq!(run_switch(&coord).await?, Ok(()));
    assert!(log.reached(b.id(), SwitchStage::BeforeEnter, Mark::Released));
    Ok(())
}

#[tokio::test]
async fn run_only_once() -> anyhow::Result<()> {
    let log = StageLog::default();
    let a = ScriptedCharacter::new(1, Plan::Complete, &log);
    let target = Arc::new(StubSpace::new(space_id("s/target")?, 10, 0));
    let coord = coordinator(group(&[&a]), &a, target, CoordinatorOptions::default())?;

    assert_eq!(run_switch(&coord).await?, Ok(()));
    assert_eq!(run_switch(&coord).await?, Err(SwitchError::Failed));
    Ok(())
}
