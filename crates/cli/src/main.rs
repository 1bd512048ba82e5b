//! mwctl - command-line client for the memwatch agent
//!
//! Inspects engine status, alerts, recommendations and learned patterns,
//! and steers sampling on a running agent.

mod client;
mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::alerts::AlertAction;
use commands::{alerts, control, recommendations, status};

/// memwatch agent CLI
#[derive(Parser)]
#[command(name = "mwctl")]
#[command(author, version, about = "CLI for the memwatch memory health agent", long_about = None)]
pub struct Cli {
    /// Agent API URL (can also be set via MEMWATCH_API_URL env var)
    #[arg(long, env = "MEMWATCH_API_URL")]
    pub api_url: Option<String>,

    /// Output format (defaults to the configured format, then table)
    #[arg(long, short)]
    pub format: Option<output::OutputFormat>,

    /// Enable verbose output
    #[arg(long, short)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the engine status summary
    Status,

    /// List alerts
    Alerts {
        /// Only unresolved alerts
        #[arg(long)]
        active: bool,
    },

    /// Acknowledge an alert
    Ack {
        /// Alert ID
        id: String,

        /// Name recorded on the alert
        #[arg(long)]
        actor: Option<String>,
    },

    /// Resolve an alert
    Resolve {
        /// Alert ID
        id: String,

        /// Name recorded on the alert
        #[arg(long)]
        actor: Option<String>,
    },

    /// Show recommendations
    Recommendations {
        /// Maximum number of recommendations
        #[arg(long, short, default_value_t = 20)]
        limit: usize,

        /// Minimum priority (low, medium, high, critical)
        #[arg(long)]
        min_priority: Option<String>,
    },

    /// Show learned remediation patterns
    Patterns,

    /// Start or stop sampling
    #[command(subcommand)]
    Sampling(SamplingCommands),

    /// Set the efficiency baseline (omit the value to clear it)
    Baseline {
        /// Efficiency between 0 and 1
        efficiency: Option<f64>,
    },

    /// Attribute samples to a session (omit the ID to clear it)
    Session {
        /// Session ID
        id: Option<String>,
    },

    /// Manage CLI configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum SamplingCommands {
    /// Resume periodic sampling
    Start,
    /// Pause periodic sampling
    Stop,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Store defaults in the configuration file
    Set {
        /// Agent API URL
        #[arg(long)]
        api_url: Option<String>,

        /// Default output format
        #[arg(long)]
        format: Option<output::OutputFormat>,

        /// Name recorded when acknowledging or resolving alerts
        #[arg(long)]
        actor: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run(Cli::parse()).await {
        output::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = config::Config::load()?;
    let format = cli
        .format
        .unwrap_or_else(|| output::OutputFormat::from_config(config.default_format.as_deref()));
    let api_url = config.resolve_api_url(cli.api_url);
    if cli.verbose {
        output::print_info(&format!("Using agent at {}", api_url));
    }

    // Initialize client
    let client = client::ApiClient::new(&api_url)?;

    // Execute command
    match cli.command {
        Commands::Status => status::show_status(&client, format).await?,
        Commands::Alerts { active } => alerts::list_alerts(&client, active, format).await?,
        Commands::Ack { id, actor } => {
            let actor = config.resolve_actor(actor);
            alerts::update_alert(&client, &id, AlertAction::Acknowledge, &actor).await?;
        }
        Commands::Resolve { id, actor } => {
            let actor = config.resolve_actor(actor);
            alerts::update_alert(&client, &id, AlertAction::Resolve, &actor).await?;
        }
        Commands::Recommendations {
            limit,
            min_priority,
        } => {
            recommendations::get_recommendations(&client, limit, min_priority, format).await?;
        }
        Commands::Patterns => recommendations::get_patterns(&client, format).await?,
        Commands::Sampling(SamplingCommands::Start) => control::set_sampling(&client, true).await?,
        Commands::Sampling(SamplingCommands::Stop) => control::set_sampling(&client, false).await?,
        Commands::Baseline { efficiency } => control::set_baseline(&client, efficiency).await?,
        Commands::Session { id } => control::set_session(&client, id.as_deref()).await?,
        Commands::Config(ConfigCommands::Show) => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            output::print_info(&format!(
                "Config file: {}",
                config::Config::config_path()?.display()
            ));
        }
        Commands::Config(ConfigCommands::Set {
            api_url,
            format,
            actor,
        }) => {
            let mut updated = config;
            if let Some(url) = api_url {
                url::Url::parse(&url).map_err(|e| anyhow::anyhow!("Invalid API URL: {}", e))?;
                updated.api_url = Some(url);
            }
            if let Some(format) = format {
                updated.default_format = Some(
                    match format {
                        output::OutputFormat::Table => "table",
                        output::OutputFormat::Json => "json",
                    }
                    .to_string(),
                );
            }
            if let Some(actor) = actor {
                updated.actor = Some(actor);
            }
            let path = updated.save()?;
            output::print_success(&format!("Configuration saved to {}", path.display()));
        }
    }

    Ok(())
}
