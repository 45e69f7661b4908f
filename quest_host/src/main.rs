use anyhow::Result;

mod cli;
mod demo;
mod runtime;
mod scenario;

fn main() -> Result<()> {
    let args = cli::parse()?;
    runtime::execute(args)
}
