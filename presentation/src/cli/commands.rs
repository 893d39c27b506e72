//! CLI command definitions

use clap::{Args, Parser, Subcommand};
use roundtable_domain::{AgentRole, DiscussionMode};
use std::path::PathBuf;

/// CLI arguments for roundtable
#[derive(Parser, Debug)]
#[command(name = "roundtable")]
#[command(author, version, about = "Round table - a host, panelists and a critic discuss your topic")]
#[command(long_about = r#"
Roundtable runs a moderated discussion between LLM personas.

Each round has four steps:
1. Planning: the host picks panelists and gives each a task
2. Discussion: the chosen panelists answer in parallel
3. Review: the critic (if any) challenges the round
4. Summary: the host condenses the round

After each round the discussion waits for your input; `run` it again to
continue. When the round limit is reached the host writes a final report.

Configuration files are loaded from (in priority order):
1. ROUNDTABLE_* environment variables
2. --config <path>     Explicit config file
3. ./roundtable.toml   Project-level config
4. ~/.config/roundtable/config.toml   Global config

Example:
  roundtable new "Should cities ban cars from downtown?" --mode debate
  roundtable run 1
  roundtable input 1 "Focus on small businesses"
  roundtable run 1
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Show configuration sources and the merged configuration, then exit
    #[arg(long)]
    pub show_config: bool,

    /// Also write diagnostic logs to this file
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a discussion
    New(NewArgs),

    /// Run the next round (or rounds) of a discussion
    Run(RunArgs),

    /// Add your own message to a discussion
    Input {
        id: u64,
        /// Message text
        text: String,
    },

    /// Close a discussion; the next input opens a new cycle
    Complete { id: u64 },

    /// Mark an interrupted run as failed
    Stop { id: u64 },

    /// Delete the transcript and start over from the topic
    Reset { id: u64 },

    /// Print a discussion's transcript
    Show {
        id: u64,
        /// Print the discussion as JSON
        #[arg(long)]
        json: bool,
    },

    /// List discussions
    List,

    /// Delete messages after a given message
    Truncate {
        id: u64,
        /// Keep messages up to and including this id; omit to delete all
        #[arg(long, value_name = "MESSAGE_ID")]
        after: Option<u64>,
    },

    /// Generate a short title for a discussion
    Title { id: u64 },
}

#[derive(Args, Debug)]
pub struct NewArgs {
    /// Topic to discuss
    pub topic: String,

    /// How the panel is formed
    #[arg(short, long, default_value = "auto", value_parser = parse_mode)]
    pub mode: DiscussionMode,

    /// Maximum number of rounds (defaults to `engine.default_max_rounds`)
    #[arg(long, value_name = "N")]
    pub max_rounds: Option<u32>,

    /// Seat an agent: `role:name:persona` (implies `--mode custom`)
    #[arg(short, long = "agent", value_name = "ROLE:NAME:PERSONA", value_parser = parse_agent_spec)]
    pub agents: Vec<AgentSpec>,

    /// Attach a text file as reference material
    #[arg(long = "material", value_name = "PATH")]
    pub materials: Vec<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    pub id: u64,

    /// Run exactly one round and stop after its summary
    #[arg(long, conflicts_with = "full")]
    pub single_round: bool,

    /// Run rounds until the round limit and write the final report
    #[arg(long)]
    pub full: bool,
}

impl RunArgs {
    /// `None` lets the discussion's history decide.
    pub fn force_single_round(&self) -> Option<bool> {
        match (self.single_round, self.full) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

/// An agent given on the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSpec {
    pub role: AgentRole,
    pub name: String,
    pub persona: String,
}

fn parse_mode(s: &str) -> Result<DiscussionMode, String> {
    s.parse().map_err(|e: roundtable_domain::DomainError| e.to_string())
}

/// Parse `role:name:persona`; the persona may itself contain colons.
pub fn parse_agent_spec(s: &str) -> Result<AgentSpec, String> {
    let mut parts = s.splitn(3, ':');
    let role = parts.next().unwrap_or_default();
    let name = parts.next().map(str::trim).unwrap_or_default();
    let persona = parts.next().map(str::trim).unwrap_or_default();

    let role: AgentRole = role.parse().map_err(|e: roundtable_domain::DomainError| e.to_string())?;
    if role == AgentRole::User {
        return Err("agents cannot take the user role".to_string());
    }
    if name.is_empty() {
        return Err(format!("missing agent name in '{s}' (expected role:name:persona)"));
    }
    Ok(AgentSpec {
        role,
        name: name.to_string(),
        persona: persona.to_string(),
    })
}
