use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod error;
mod prompt;
mod registry;
mod skill;
mod state;

use cli::OutputFormat;
use config::Config;
use prompt::SkillAssignment;
use registry::SkillRegistry;
use state::{Phase, StateStore, Status};

#[derive(Parser)]
#[command(name = "forensics")]
#[command(about = "Prompt builders and bookkeeping for architectural forensics of agent frameworks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Project root (defaults to the current directory)
    #[arg(long, global = true, env = "FORENSICS_ROOT")]
    root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the orchestrator prompt
    Orchestrator,

    /// Print the framework agent prompt
    Framework {
        framework_name: String,
        source_path: String,
        output_dir: String,
    },

    /// Print the skill agent prompt
    Skill {
        skill_name: String,
        framework_name: String,
        codebase_map_path: String,
        output_path: String,
    },

    /// Print the synthesis agent prompt
    Synthesis {
        /// Frameworks to compare
        #[arg(required = true)]
        frameworks: Vec<String>,
    },

    /// Track analysis progress per framework
    State {
        #[command(subcommand)]
        command: StateCommands,
    },

    /// List skill definitions
    Skills {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Manage the project configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Check the project layout
    Doctor,
}

#[derive(Subcommand)]
enum StateCommands {
    /// Initialize or update state from the repos directory
    Init,

    /// Print the next batch of pending frameworks
    Next {
        /// Batch size
        #[arg(long, default_value_t = 1)]
        limit: usize,
    },

    /// Mark framework status
    Mark {
        framework: String,

        /// pending, in_progress, completed or failed
        #[arg(value_parser = Status::parse_known)]
        status: Status,
    },

    /// Show status table
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Reset in-progress frameworks to pending and remove their partial output
    ResetRunning,

    /// Record a completed protocol phase for a framework
    Phase {
        framework: String,
        #[arg(value_enum)]
        phase: Phase,
    },

    /// Show status and recorded phases of a framework
    Show { framework: String },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Write the default configuration to the project root
    Init {
        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries prompts
    let log_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("forensics={log_level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let root = match cli.root {
        Some(root) => root,
        None => std::env::current_dir().context("cannot determine current directory")?,
    };

    // Must work even when the existing config does not parse
    if let Commands::Config {
        command: ConfigCommands::Init { force },
    } = cli.command
    {
        return cli::config_init(&root, force).await;
    }

    let config = Config::load(&root, cli.config.as_deref()).await?;
    if !config.output.colors {
        colored::control::set_override(false);
    }
    let store = StateStore::new(&config);

    match cli.command {
        Commands::Orchestrator => {
            cli::orchestrator_prompt(&config).await?;
        }

        Commands::Framework {
            framework_name,
            source_path,
            output_dir,
        } => {
            cli::framework_prompt(&config, &framework_name, &source_path, &output_dir).await?;
        }

        Commands::Skill {
            skill_name,
            framework_name,
            codebase_map_path,
            output_path,
        } => {
            let assignment = SkillAssignment {
                skill_name: &skill_name,
                framework_name: &framework_name,
                codebase_map_path: &codebase_map_path,
                output_path: &output_path,
            };
            cli::skill_prompt(&config, &assignment).await?;
        }

        Commands::Synthesis { frameworks } => {
            cli::synthesis_prompt(&config, &frameworks).await?;
        }

        Commands::State { command } => match command {
            StateCommands::Init => cli::state_init(&store).await?,
            StateCommands::Next { limit } => cli::state_next(&store, limit).await?,
            StateCommands::Mark { framework, status } => {
                cli::state_mark(&store, &framework, status).await?
            }
            StateCommands::Status { format } => cli::state_status(&store, format).await?,
            StateCommands::ResetRunning => cli::state_reset(&store).await?,
            StateCommands::Phase { framework, phase } => {
                cli::state_phase(&store, &framework, phase).await?
            }
            StateCommands::Show { framework } => cli::state_show(&store, &framework).await?,
        },

        Commands::Skills { format } => {
            let (registry, report) = SkillRegistry::load(&config).await;
            cli::list_skills(&registry, &report, format)?;
        }

        Commands::Config { command } => match command {
            ConfigCommands::Show => cli::config_show(&config)?,
            ConfigCommands::Init { force } => cli::config_init(&root, force).await?,
        },

        Commands::Doctor => {
            cli::check_health(&config, &store).await?;
        }
    }

    Ok(())
}
