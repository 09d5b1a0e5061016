use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "taskclock", version, about = "Track working time on tasks from the terminal")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initialize a project-local task store in the current directory
    Init,
    /// Add a task without starting the clock
    Add {
        /// Task name
        name: String,
        /// Optional URL annotation (ticket, document, ...)
        #[arg(long)]
        url: Option<String>,
    },
    /// List tasks with their tracked time
    List {
        /// Include stopped tasks
        #[arg(long)]
        all: bool,
    },
    /// Start a task by name or id; with no target, resume the last active one
    Start {
        /// Task name or id; an unknown name creates the task
        target: Option<String>,
    },
    /// Pause the currently running task
    Stop,
    /// Bring a stopped task back to paused
    Unstop {
        /// Task name or id
        target: String,
    },
    /// Rename a task
    Rename {
        /// Task name or id
        target: String,
        /// New name
        name: String,
    },
    /// Launch the interactive view (the default)
    Tui,
}
