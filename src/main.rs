mod cli;
mod commands;
mod model;
mod query;
mod storage;
mod ui;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let command = args.command.unwrap_or(cli::Command::Tui);
    match command {
        cli::Command::Init => commands::init(),
        cli::Command::Add { name, url } => commands::add(name, url),
        cli::Command::List { all } => commands::list(all),
        cli::Command::Start { target } => commands::start(target),
        cli::Command::Stop => commands::stop(),
        cli::Command::Unstop { target } => commands::unstop(target),
        cli::Command::Rename { target, name } => commands::rename(target, name),
        cli::Command::Tui => commands::tui(),
    }
}
