use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    about = "Prototype host that drives the interaction scheduler demo game",
    version
)]
pub struct Args {
    /// Path to a scenario JSON file (defaults to the built-in demo script)
    #[arg(long)]
    pub script: Option<PathBuf>,

    /// Override the number of frames to simulate
    #[arg(long)]
    pub frames: Option<u32>,

    /// Path to write the captured event log as JSON
    #[arg(long)]
    pub event_log_json: Option<PathBuf>,

    /// Path to write the save snapshot (occurrence ledger + disabled clickables) as JSON
    #[arg(long)]
    pub save_json: Option<PathBuf>,

    /// Regex applied to event labels before listing or export
    #[arg(long)]
    pub filter: Option<String>,

    /// Print every captured event to stdout after the run
    #[arg(long)]
    pub list_events: bool,

    /// Print scenario actions as they are applied
    #[arg(long)]
    pub verbose: bool,
}

#[derive(Debug)]
pub struct RunArgs {
    pub script: Option<PathBuf>,
    pub frames: Option<u32>,
    pub event_log_json: Option<PathBuf>,
    pub save_json: Option<PathBuf>,
    pub filter: Option<String>,
    pub list_events: bool,
    pub verbose: bool,
}

pub fn parse() -> Result<RunArgs> {
    let args = Args::parse();
    args.into_run()
}

impl Args {
    fn into_run(self) -> Result<RunArgs> {
        if self.filter.is_some() && self.event_log_json.is_none() && !self.list_events {
            bail!("--filter requires --event-log-json or --list-events");
        }

        Ok(RunArgs {
            script: self.script,
            frames: self.frames,
            event_log_json: self.event_log_json,
            save_json: self.save_json,
            filter: self.filter,
            list_events: self.list_events,
            verbose: self.verbose,
        })
    }
}
