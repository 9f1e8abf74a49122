// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use super::*;

#[test]
fn command_wire_shapes() -> anyhow::Result<()> {
    let cases = [
        (json!({ "command": "abort" }), SwitchCommand::Abort),
        (
            json!({ "command": "removeCharacter", "character": "c7" }),
            SwitchCommand::RemoveCharacter { character: CharacterId::new(7) },
        ),
        (json!({ "command": "setAccepted", "accepted": true }), SwitchCommand::SetAccepted { accepted: true }),
        (json!({ "command": "reject" }), SwitchCommand::Reject),
    ];
    for (wire, expected) in cases {
        let parsed: SwitchCommand = serde_json::from_value(wire.clone())?;
        assert_eq!(parsed, expected);
        assert_eq!(serde_json::to_value(parsed)?, wire);
    }
    assert!(serde_json::from_value::<SwitchCommand>(json!({ "command": "explode" })).is_err());
    assert!(serde_json::from_value::<SwitchCommand>(json!({ "command": "setAccepted" })).is_err());
    Ok(())
}

#[test]
fn command_request_nests_command() -> anyhow::Result<()> {
    let req: SwitchCommandRequest = serde_json::from_value(json!({
        "initiator": "c1",
        "command": { "command": "setAccepted", "accepted": false },
    }))?;
    assert_eq!(req.initiator, CharacterId::new(1));
    assert_eq!(req.command, SwitchCommand::SetAccepted { accepted: false });
    Ok(())
}

#[test]
fn request_result_carries_problematic_character() -> anyhow::Result<()> {
    let value = serde_json::to_value(RequestSwitchResult::NoAccess {
        problematic_character: CharacterId::new(3),
    })?;
    assert_eq!(value, json!({ "result": "noAccess", "problematicCharacter": "c3" }));

    let value = serde_json::to_value(RequestSwitchResult::PendingSwitchExists)?;
    assert_eq!(value, json!({ "result": "pendingSwitchExists" }));
    Ok(())
}

#[test]
fn switch_request_defaults_to_no_followers() -> anyhow::Result<()> {
    let req: SwitchRequest = serde_json::from_value(json!({ "id": "s/park" }))?;
    assert!(req.characters.is_empty());
    assert_eq!(req.id.as_str(), "s/park");
    Ok(())
}

#[yare::parameterized(
    ok = { Ok(()), ExecuteSwitchResult::Ok },
    failed = { Err(SwitchError::Failed), ExecuteSwitchResult::Failed },
    space_full = { Err(SwitchError::SpaceFull), ExecuteSwitchResult::SpaceFull },
    no_access = { Err(SwitchError::NoAccess), ExecuteSwitchResult::NoAccess },
    not_ready = { Err(SwitchError::NotReady), ExecuteSwitchResult::NotReady },
)]
fn execute_result_from_outcome(outcome: Result<(), SwitchError>, expected: ExecuteSwitchResult) {
    assert_eq!(ExecuteSwitchResult::from(outcome), expected);
}

#[test]
fn execute_result_wire_name() -> anyhow::Result<()> {
    assert_eq!(serde_json::to_value(ExecuteSwitchResult::SpaceFull)?, json!({ "result": "spaceFull" }));
    Ok(())
}
