use crate::context::GameContext;
use crate::registry::{CallbackRegistry, InvokeOutcome, ScriptArg};
use crate::scope::InteractionRecord;
use crate::sequence::Sequence;
use crate::world::{room_script, ClickableId, ClickableKind, Verb, GLOBAL_SCRIPT};

/// One interaction to resolve: a verb on a target, plus the carried item for
/// inventory verbs.
#[derive(Debug, Clone)]
pub(crate) struct InteractionRequest {
    pub verb: Verb,
    pub target: ClickableId,
    pub item: Option<ClickableId>,
}

impl InteractionRequest {
    pub(crate) fn describe(&self) -> String {
        match &self.item {
            Some(item) => format!("{} {} + {}", self.verb.label(), self.target, item),
            None => format!("{} {}", self.verb.label(), self.target),
        }
    }
}

struct Candidate {
    owner: String,
    name: String,
    args: Vec<ScriptArg>,
}

/// Resolves the handler chain for a request and returns the sequence of the
/// first handler that ran. Records the (target, verb) pair and bumps the
/// target's counter before trying the chain; if nothing runs, both are
/// rolled back so a total miss leaves no trace.
pub(crate) fn dispatch_interaction(
    registry: &CallbackRegistry,
    cx: &mut GameContext,
    request: &InteractionRequest,
) -> Option<Sequence> {
    match cx.world().clickable(&request.target) {
        None => {
            cx.log_event(format!("interaction.unknown {}", request.describe()));
            return None;
        }
        Some(record) if !record.enabled => {
            cx.log_event(format!("interaction.blocked {}", request.describe()));
            return None;
        }
        Some(_) => {}
    }

    let record = InteractionRecord::new(request.target.clone(), request.verb);
    cx.push_in_progress(record.clone());
    if let Some(clickable) = cx.world_mut().clickable_mut(&request.target) {
        clickable.on_interaction(request.verb);
    }
    cx.log_event(format!("interaction.start {}", request.describe()));

    for candidate in candidates(cx, request) {
        match registry.invoke(&candidate.owner, &candidate.name, &candidate.args) {
            InvokeOutcome::Missing => continue,
            InvokeOutcome::Fault(fault) => {
                cx.log_event(format!(
                    "handler.fault {}.{}: {}",
                    candidate.owner, candidate.name, fault
                ));
            }
            InvokeOutcome::Ran(mut sequence) => {
                sequence.set_interaction(record);
                cx.log_event(format!(
                    "interaction.dispatch {}.{}",
                    candidate.owner, candidate.name
                ));
                return Some(sequence);
            }
        }
    }

    cx.remove_in_progress(&record);
    if let Some(clickable) = cx.world_mut().clickable_mut(&request.target) {
        clickable.on_cancel_interaction(request.verb);
    }
    cx.log_event(format!("interaction.unhandled {}", request.describe()));
    None
}

/// Builds the priority-ordered candidate chain: room-scoped type-qualified
/// override, the target's own default, then the room and global unhandled
/// fallbacks. Inventory verbs try both combination directions first.
fn candidates(cx: &GameContext, request: &InteractionRequest) -> Vec<Candidate> {
    let room_owner = cx.world().current_room().map(room_script);
    let target = &request.target;
    let mut chain = Vec::new();

    match request.verb {
        Verb::Use | Verb::Look => {
            let stem = request.verb.handler_stem();
            let args = vec![ScriptArg::Clickable(target.clone())];
            if let Some(room) = room_owner.as_ref() {
                chain.push(Candidate {
                    owner: room.clone(),
                    name: format!("{stem}{}", target.handler_suffix()),
                    args: args.clone(),
                });
            }
            chain.push(Candidate {
                owner: target.script_owner(),
                name: stem.to_string(),
                args: args.clone(),
            });
            let unhandled = request.verb.unhandled_name();
            if let Some(room) = room_owner.as_ref() {
                chain.push(Candidate {
                    owner: room.clone(),
                    name: unhandled.to_string(),
                    args: args.clone(),
                });
            }
            chain.push(Candidate {
                owner: GLOBAL_SCRIPT.to_string(),
                name: unhandled.to_string(),
                args,
            });
        }
        Verb::Inventory => {
            let Some(item) = request.item.as_ref() else {
                return chain;
            };
            let stem = Verb::Inventory.handler_stem();
            let on_target = vec![
                ScriptArg::Clickable(target.clone()),
                ScriptArg::Clickable(item.clone()),
            ];
            let on_item = vec![
                ScriptArg::Clickable(item.clone()),
                ScriptArg::Clickable(target.clone()),
            ];

            if let Some(room) = room_owner.as_ref() {
                chain.push(Candidate {
                    owner: room.clone(),
                    name: format!("{stem}{}", target.handler_suffix()),
                    args: on_target.clone(),
                });
            }
            chain.push(Candidate {
                owner: target.script_owner(),
                name: stem.to_string(),
                args: on_target.clone(),
            });
            if let Some(room) = room_owner.as_ref() {
                chain.push(Candidate {
                    owner: room.clone(),
                    name: format!("{stem}{}", item.handler_suffix()),
                    args: on_item.clone(),
                });
            }
            chain.push(Candidate {
                owner: item.script_owner(),
                name: stem.to_string(),
                args: on_item.clone(),
            });

            let unhandled = Verb::Inventory.unhandled_name();
            if let Some(room) = room_owner.as_ref() {
                chain.push(Candidate {
                    owner: room.clone(),
                    name: unhandled.to_string(),
                    args: on_target.clone(),
                });
            }
            if target.kind == ClickableKind::Inventory && item.kind == ClickableKind::Inventory {
                chain.push(Candidate {
                    owner: GLOBAL_SCRIPT.to_string(),
                    name: "UnhandledUseInvInv".to_string(),
                    args: on_item,
                });
            }
            chain.push(Candidate {
                owner: GLOBAL_SCRIPT.to_string(),
                name: unhandled.to_string(),
                args: on_target,
            });
        }
    }

    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequence::HandlerFault;
    use crate::world::World;

    fn office_context() -> GameContext {
        let mut world = World::new();
        world.add_room("office");
        world.set_current_room("office");
        world.add_clickable(ClickableId::hotspot("door"), Some("office".to_string()));
        world.add_clickable(ClickableId::inventory("key"), None);
        world.add_clickable(ClickableId::inventory("crowbar"), None);
        GameContext::new(world)
    }

    fn use_door() -> InteractionRequest {
        InteractionRequest {
            verb: Verb::Use,
            target: ClickableId::hotspot("door"),
            item: None,
        }
    }

    #[test]
    fn room_override_beats_object_default() {
        let mut registry = CallbackRegistry::new();
        registry.register("room.office", "OnInteractHotspotDoor", 1, |_| {
            Ok(Sequence::empty("room_override"))
        });
        registry.register("hotspot.door", "OnInteract", 1, |_| {
            Ok(Sequence::empty("object_default"))
        });

        let mut cx = office_context();
        let sequence =
            dispatch_interaction(&registry, &mut cx, &use_door()).expect("handler found");
        assert_eq!(sequence.label(), "room_override");
    }

    #[test]
    fn object_default_runs_when_no_override_exists() {
        let mut registry = CallbackRegistry::new();
        registry.register("hotspot.door", "OnInteract", 1, |_| {
            Ok(Sequence::empty("object_default"))
        });
        registry.register("global", "UnhandledInteract", 1, |_| {
            Ok(Sequence::empty("unhandled"))
        });

        let mut cx = office_context();
        let sequence =
            dispatch_interaction(&registry, &mut cx, &use_door()).expect("handler found");
        assert_eq!(sequence.label(), "object_default");
    }

    #[test]
    fn total_miss_rolls_back_record_and_counter() {
        let registry = CallbackRegistry::new();
        let mut cx = office_context();
        let door = ClickableId::hotspot("door");

        assert!(dispatch_interaction(&registry, &mut cx, &use_door()).is_none());
        assert!(!cx.interaction_in_progress(&door, Verb::Use));
        assert_eq!(cx.world().clickable(&door).unwrap().use_count(), 0);
        assert!(cx
            .event_labels()
            .iter()
            .any(|label| *label == "interaction.unhandled use hotspot.door"));
    }

    #[test]
    fn fault_falls_through_to_next_candidate() {
        let mut registry = CallbackRegistry::new();
        registry.register("room.office", "OnInteractHotspotDoor", 1, |_| {
            Err(HandlerFault::new("room script broke"))
        });
        registry.register("hotspot.door", "OnInteract", 1, |_| {
            Ok(Sequence::empty("object_default"))
        });

        let mut cx = office_context();
        let sequence =
            dispatch_interaction(&registry, &mut cx, &use_door()).expect("fallback found");
        assert_eq!(sequence.label(), "object_default");
        assert!(cx
            .event_labels()
            .iter()
            .any(|label| label.starts_with("handler.fault room.office.OnInteractHotspotDoor")));
    }

    #[test]
    fn inventory_combination_tries_item_on_target_first() {
        let mut registry = CallbackRegistry::new();
        registry.register("inventory.key", "OnUseInv", 2, |_| {
            Ok(Sequence::empty("target_on_item"))
        });
        registry.register("hotspot.door", "OnUseInv", 2, |_| {
            Ok(Sequence::empty("item_on_target"))
        });

        let mut cx = office_context();
        let request = InteractionRequest {
            verb: Verb::Inventory,
            target: ClickableId::hotspot("door"),
            item: Some(ClickableId::inventory("key")),
        };
        let sequence =
            dispatch_interaction(&registry, &mut cx, &request).expect("handler found");
        assert_eq!(sequence.label(), "item_on_target");
    }

    #[test]
    fn reversed_direction_receives_reversed_arguments() {
        let mut registry = CallbackRegistry::new();
        registry.register("inventory.key", "OnUseInv", 2, |args| {
            assert_eq!(
                args[0].as_clickable(),
                Some(&ClickableId::inventory("key"))
            );
            assert_eq!(args[1].as_clickable(), Some(&ClickableId::hotspot("door")));
            Ok(Sequence::empty("target_on_item"))
        });

        let mut cx = office_context();
        let request = InteractionRequest {
            verb: Verb::Inventory,
            target: ClickableId::hotspot("door"),
            item: Some(ClickableId::inventory("key")),
        };
        let sequence =
            dispatch_interaction(&registry, &mut cx, &request).expect("handler found");
        assert_eq!(sequence.label(), "target_on_item");
    }

    #[test]
    fn inventory_on_inventory_reaches_the_inv_inv_fallback() {
        let mut registry = CallbackRegistry::new();
        registry.register("global", "UnhandledUseInvInv", 2, |_| {
            Ok(Sequence::empty("inv_inv"))
        });
        registry.register("global", "UnhandledUseInv", 2, |_| {
            Ok(Sequence::empty("generic"))
        });

        let mut cx = office_context();
        let request = InteractionRequest {
            verb: Verb::Inventory,
            target: ClickableId::inventory("crowbar"),
            item: Some(ClickableId::inventory("key")),
        };
        let sequence =
            dispatch_interaction(&registry, &mut cx, &request).expect("handler found");
        assert_eq!(sequence.label(), "inv_inv");
    }

    #[test]
    fn disabled_clickables_never_dispatch() {
        let mut registry = CallbackRegistry::new();
        registry.register("hotspot.door", "OnInteract", 1, |_| {
            Ok(Sequence::empty("object_default"))
        });

        let mut cx = office_context();
        cx.set_clickable_enabled(&ClickableId::hotspot("door"), false);
        assert!(dispatch_interaction(&registry, &mut cx, &use_door()).is_none());
        assert_eq!(
            cx.world()
                .clickable(&ClickableId::hotspot("door"))
                .unwrap()
                .use_count(),
            0
        );
    }
}
