use quest_runtime::{
    CallbackRegistry, ClickableId, HandlerFault, Sequence, Step, Verb, World, GLOBAL_SCRIPT,
};

use crate::scenario::{Scenario, ScenarioAction, TimedInput};

/// The built-in demo stage: one office, a locked door, a note, a key and a
/// crowbar, plus a doormat trigger region.
pub fn demo_world() -> World {
    let mut world = World::new();
    world.add_room("office");
    world.set_current_room("office");
    world.add_actor("player", Some("office".to_string()));
    world.add_region("doormat", "office");
    world.add_clickable(ClickableId::hotspot("door"), Some("office".to_string()));
    world.add_clickable(ClickableId::prop("note"), Some("office".to_string()));
    world.add_clickable(ClickableId::inventory("key"), None);
    world.add_clickable(ClickableId::inventory("crowbar"), None);
    world
}

/// Registers every script handler the demo stage responds to.
pub fn demo_registry() -> CallbackRegistry {
    let mut registry = CallbackRegistry::new();

    // The room overrides the door's own interact handler: walk over
    // (interruptible), then open or complain depending on the lock.
    registry.register("room.office", "OnInteractHotspotDoor", 1, |_| {
        Ok(Sequence::build("office.door.interact")
            .run(|cx| cx.enable_cancel())
            .walk_to("player", "door")
            .branch(|cx| {
                let line = if cx.occurrence_count("door_unlocked") > 0 {
                    cx.occurrence_add("door_opened");
                    "It swings open with a tired groan."
                } else {
                    "Locked. The mechanism wants a key."
                };
                let ticks = cx.say("player", line);
                vec![Step::WaitTicks(ticks)]
            })
            .finish())
    });

    // Shadowed by the room override; kept so the fallback order is visible
    // when the override is removed.
    registry.register("hotspot.door", "OnInteract", 1, |_| {
        Ok(Sequence::build("office.door.rattle")
            .say("player", "The handle refuses to turn.")
            .finish())
    });

    registry.register("hotspot.door", "OnLookAt", 1, |_| {
        Ok(Sequence::build("office.door.look")
            .say("player", "Heavy oak, older than the office.")
            .finish())
    });

    registry.register("room.office", "OnUseInvHotspotDoor", 2, |args| {
        let item = args.get(1).and_then(|arg| arg.as_clickable()).cloned();
        if item == Some(ClickableId::inventory("key")) {
            Ok(Sequence::build("office.door.unlock")
                .run(|cx| {
                    cx.occurrence_add("door_unlocked");
                })
                .say("player", "The lock clicks over.")
                .finish())
        } else {
            Err(HandlerFault::new("only the key fits the lock"))
        }
    });

    registry.register("prop.note", "OnLookAt", 1, |_| {
        Ok(Sequence::build("office.note.read")
            .run(|cx| cx.begin_cutscene())
            .say(
                "player",
                "Dear occupant: the rent is due, the door is locked, and the key is wherever you left it.",
            )
            .say("player", "Management regrets everything.")
            .run(|cx| {
                cx.occurrence_add("note_read");
                cx.end_cutscene();
            })
            .finish())
    });

    registry.register("prop.note", "OnInteract", 1, |_| {
        Ok(Sequence::build("office.note.take")
            .say("player", "Better read it first.")
            .run(|cx| cx.queue_interaction(Verb::Look, ClickableId::prop("note"), None))
            .finish())
    });

    registry.register(GLOBAL_SCRIPT, "UnhandledInteract", 1, |_| {
        Ok(Sequence::build("global.shrug")
            .say("player", "That does nothing useful.")
            .finish())
    });

    registry.register(GLOBAL_SCRIPT, "UnhandledLookAt", 1, |_| {
        Ok(Sequence::build("global.glance")
            .say("player", "Nothing remarkable.")
            .finish())
    });

    registry.register("room.office", "UnhandledUseInv", 2, |_| {
        Ok(Sequence::build("office.bad_combo")
            .say("player", "Those parts refuse to cooperate.")
            .finish())
    });

    registry.register(GLOBAL_SCRIPT, "UnhandledUseInvInv", 2, |_| {
        Ok(Sequence::build("global.pocket_combo")
            .say("player", "Carrying both is combination enough.")
            .finish())
    });

    registry.register("room.office", "OnEnterRegionDoormat", 2, |_| {
        Ok(Sequence::build("office.doormat.enter")
            .say("player", "The mat reads UNWELCOME.")
            .finish())
    });

    registry.register("room.office", "OnExitRegionBGDoormat", 2, |_| {
        Ok(Sequence::build("office.doormat.exit")
            .run(|cx| {
                cx.occurrence_add("left_mat");
            })
            .finish())
    });

    registry
}

/// The scripted input that exercises the whole runtime: a skipped cutscene,
/// a canceled walk, the key unlocking the door, a faulting combination, and
/// both region trigger variants.
pub fn demo_scenario() -> Scenario {
    let input = |frame: u32, action: ScenarioAction| TimedInput { frame, action };
    let click = |verb: Verb, name: &str| ScenarioAction::Click {
        verb,
        kind: quest_runtime::ClickableKind::Hotspot,
        name: name.to_string(),
    };

    Scenario {
        name: "office_demo".to_string(),
        frames: 60,
        inputs: vec![
            input(
                1,
                ScenarioAction::Click {
                    verb: Verb::Look,
                    kind: quest_runtime::ClickableKind::Prop,
                    name: "note".to_string(),
                },
            ),
            input(3, ScenarioAction::Skip),
            input(6, click(Verb::Use, "door")),
            input(9, ScenarioAction::Cancel),
            input(
                12,
                ScenarioAction::SelectItem {
                    name: "key".to_string(),
                },
            ),
            input(13, click(Verb::Use, "door")),
            input(20, ScenarioAction::DeselectItem),
            input(21, click(Verb::Use, "door")),
            input(
                38,
                ScenarioAction::SelectItem {
                    name: "crowbar".to_string(),
                },
            ),
            input(39, click(Verb::Use, "door")),
            input(44, ScenarioAction::DeselectItem),
            input(
                45,
                ScenarioAction::PlaceActor {
                    actor: "player".to_string(),
                    regions: vec!["doormat".to_string()],
                },
            ),
            input(
                52,
                ScenarioAction::PlaceActor {
                    actor: "player".to_string(),
                    regions: Vec::new(),
                },
            ),
        ],
    }
}
