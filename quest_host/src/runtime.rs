use std::fs;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;

use quest_runtime::{
    ClickInput, ClickableId, EventRecord, FrameDriver, FrameInput, GameContext,
};

use crate::cli::RunArgs;
use crate::demo;
use crate::scenario::{Scenario, ScenarioAction};

pub fn execute(args: RunArgs) -> Result<()> {
    let RunArgs {
        script,
        frames,
        event_log_json,
        save_json,
        filter,
        list_events,
        verbose,
    } = args;

    let scenario = match script.as_ref() {
        Some(path) => {
            eprintln!("[quest_host] info: loading scenario from {}", path.display());
            Scenario::load(path)?
        }
        None => demo::demo_scenario(),
    };

    let filter = match filter.as_deref() {
        Some(pattern) => Some(Regex::new(pattern).context("compiling --filter regex")?),
        None => None,
    };

    let total_frames = frames.unwrap_or(scenario.frames);
    let mut driver = FrameDriver::new(GameContext::new(demo::demo_world()), demo::demo_registry());

    for frame in 1..=total_frames {
        let mut input = FrameInput::idle();
        for action in scenario.actions_for(frame) {
            if verbose {
                eprintln!("[quest_host] frame {frame}: {action:?}");
            }
            apply_action(&mut driver, &mut input, action);
        }
        driver.tick(&input);
    }

    println!(
        "Scenario {} ran {} frames and captured {} events",
        scenario.name,
        total_frames,
        driver.context().events().len()
    );

    let snapshot = driver.context().save_snapshot();
    if !snapshot.occurrences.is_empty() {
        println!("\nOccurrence ledger:");
        for (key, count) in &snapshot.occurrences {
            println!("  {key}: {count}");
        }
    }
    if !snapshot.disabled_clickables.is_empty() {
        println!("\nDisabled by script:");
        for name in &snapshot.disabled_clickables {
            println!("  {name}");
        }
    }

    let events = filtered_events(driver.context().events(), filter.as_ref());
    if list_events {
        println!("\nEvent log:");
        for event in &events {
            println!("  {:>4} {}", event.frame, event.label);
        }
    }

    if let Some(path) = event_log_json.as_ref() {
        let log = EventLog { events };
        let json =
            serde_json::to_string_pretty(&log).context("serializing event log to JSON")?;
        fs::write(path, &json)
            .with_context(|| format!("writing event log to {}", path.display()))?;
        println!("Saved event log to {}", path.display());
    }

    if let Some(path) = save_json.as_ref() {
        let json = snapshot
            .to_json_string()
            .context("serializing save snapshot to JSON")?;
        fs::write(path, &json)
            .with_context(|| format!("writing save snapshot to {}", path.display()))?;
        println!("Saved snapshot to {}", path.display());
    }

    Ok(())
}

fn apply_action(driver: &mut FrameDriver, input: &mut FrameInput, action: &ScenarioAction) {
    match action {
        ScenarioAction::Click { verb, kind, name } => {
            input.click = Some(ClickInput {
                verb: *verb,
                target: ClickableId::new(*kind, name.clone()),
            });
        }
        ScenarioAction::Skip => input.skip = true,
        ScenarioAction::Cancel => driver.cancel_current_interaction(),
        ScenarioAction::Pause => driver.set_paused(true),
        ScenarioAction::Resume => driver.set_paused(false),
        ScenarioAction::SelectItem { name } => {
            if !driver
                .context_mut()
                .select_item(ClickableId::inventory(name.clone()))
            {
                eprintln!("[quest_host] warning: unknown inventory item {name}");
            }
        }
        ScenarioAction::DeselectItem => driver.context_mut().clear_selected_item(),
        ScenarioAction::PlaceActor { actor, regions } => {
            let membership = regions.iter().cloned().collect();
            if !driver.context_mut().world_mut().place_actor(actor, membership) {
                eprintln!("[quest_host] warning: unknown actor {actor}");
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct EventLog {
    events: Vec<EventRecord>,
}

fn filtered_events(events: &[EventRecord], filter: Option<&Regex>) -> Vec<EventRecord> {
    events
        .iter()
        .filter(|event| {
            filter
                .map(|regex| regex.is_match(&event.label))
                .unwrap_or(true)
        })
        .cloned()
        .collect()
}
