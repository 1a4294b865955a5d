use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use a3s_conversation::{
    AgentConfig, AgentScript, ConversationApi, ConversationConfig, ConversationProperties,
    ProvisioningClient, ProvisioningConfig,
};

/// A3S Conversation - Provision and embed remote conversation sessions
#[derive(Debug, Parser)]
#[command(name = "a3s-conversation", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a conversation session and print it as JSON
    Create {
        /// Replica (avatar) to converse with
        #[arg(long)]
        replica: String,

        /// Persona driving the replica's behavior
        #[arg(long)]
        persona: Option<String>,

        /// Display name of the session
        #[arg(long)]
        name: Option<String>,

        /// Conversational context given to the replica
        #[arg(long)]
        context: Option<String>,

        /// First utterance of the replica
        #[arg(long)]
        greeting: Option<String>,

        /// Webhook for backend session events
        #[arg(long)]
        callback_url: Option<String>,

        /// Hard cap on call length, in seconds
        #[arg(long)]
        max_duration: Option<u64>,

        /// Conversation language
        #[arg(long)]
        language: Option<String>,
    },

    /// Fetch a session by id
    Get {
        /// Session id
        id: String,
    },

    /// End a session
    End {
        /// Session id
        id: String,
    },

    /// Print the guest agent script
    AgentScript {
        /// TOML file overriding the default agent vocabulary
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Create {
            replica,
            persona,
            name,
            context,
            greeting,
            callback_url,
            max_duration,
            language,
        } => {
            let mut config = ConversationConfig::new(replica).with_properties(
                ConversationProperties {
                    max_call_duration: max_duration,
                    language,
                    ..Default::default()
                },
            );
            if let Some(persona) = persona {
                config = config.with_persona(persona);
            }
            if let Some(name) = name {
                config = config.with_name(name);
            }
            if let Some(context) = context {
                config = config.with_context(context);
            }
            if let Some(greeting) = greeting {
                config = config.with_greeting(greeting);
            }
            if let Some(url) = callback_url {
                config = config.with_callback_url(url);
            }

            let session = client()?.create_session(&config).await?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        Commands::Get { id } => {
            let session = client()?.get_session(&id).await?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        Commands::End { id } => {
            client()?.end_session(&id).await?;
            tracing::info!(session_id = %id, "Session ended");
        }
        Commands::AgentScript { config } => {
            let agent_config = match config {
                Some(path) => {
                    let raw = std::fs::read_to_string(&path)
                        .with_context(|| format!("Failed to read {}", path.display()))?;
                    AgentConfig::from_toml_str(&raw)?
                }
                None => AgentConfig::default(),
            };
            let script = AgentScript::render(&agent_config)?;
            println!("{}", script.source());
        }
    }

    Ok(())
}

fn client() -> anyhow::Result<ProvisioningClient> {
    let config = ProvisioningConfig::from_env()?;
    Ok(ProvisioningClient::new(config)?)
}
