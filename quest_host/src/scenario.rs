use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use quest_runtime::{ClickableKind, Verb};

/// A deterministic input script for the frame loop: how many frames to run
/// and which inputs arrive on which frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub frames: u32,
    pub inputs: Vec<TimedInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimedInput {
    pub frame: u32,
    pub action: ScenarioAction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScenarioAction {
    Click {
        verb: Verb,
        kind: ClickableKind,
        name: String,
    },
    Skip,
    Cancel,
    Pause,
    Resume,
    SelectItem {
        name: String,
    },
    DeselectItem,
    PlaceActor {
        actor: String,
        regions: Vec<String>,
    },
}

impl Scenario {
    pub fn load(path: &Path) -> Result<Scenario> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading scenario from {}", path.display()))?;
        let scenario: Scenario = serde_json::from_str(&data)
            .with_context(|| format!("parsing scenario from {}", path.display()))?;
        Ok(scenario)
    }

    /// Actions scheduled for `frame`, in file order.
    pub fn actions_for(&self, frame: u32) -> impl Iterator<Item = &ScenarioAction> {
        self.inputs
            .iter()
            .filter(move |input| input.frame == frame)
            .map(|input| &input.action)
    }
}
