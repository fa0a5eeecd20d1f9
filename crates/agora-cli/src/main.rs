mod config;
mod debate_cmd;
mod serve_cmd;
#[cfg(test)]
mod test_util;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use config::{AgoraConfig, CliOverrides};

#[derive(Parser)]
#[command(name = "agora", about = "Multi-persona LLM debate engine")]
struct Cli {
    /// Persona file (overrides AGORA_PERSONAS env var)
    #[arg(long, global = true)]
    personas: Option<PathBuf>,

    /// Number of debate rounds (overrides AGORA_ROUNDS env var)
    #[arg(long, global = true)]
    rounds: Option<u32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write an agora config file
    Init {
        /// Gemini API key to store in the config file
        #[arg(long)]
        api_key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Run the HTTP debate API
    Serve {
        /// Address to bind (overrides AGORA_BIND env var)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides PORT env var)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Run a single debate and print it
    Debate {
        /// The question to debate
        question: String,
        /// Print raw NDJSON events instead of formatted text
        #[arg(long)]
        ndjson: bool,
    },
    /// List the debate cast
    Personas,
}

/// Execute the `agora init` command: write a starter config file.
fn cmd_init(api_key: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let has_key = api_key.is_some();
    let mut cfg = config::ConfigFile::default();
    cfg.gemini.api_key = api_key;
    config::save_config(&cfg, &path)?;

    println!("Config written to {}", path.display());
    if has_key {
        println!("  gemini.api_key = (set)");
    } else {
        println!("  gemini.api_key is empty; set GOOGLE_API_KEY or edit the file.");
    }
    println!();
    println!("Next: run `agora serve` or `agora debate \"<question>\"`.");

    Ok(())
}

/// Execute the `agora personas` command: print the cast in speaking order.
fn cmd_personas(resolved: &AgoraConfig) -> anyhow::Result<()> {
    let registry = resolved.registry()?;

    println!("Debaters (speaking order):");
    for (i, persona) in registry.debaters().iter().enumerate() {
        println!(
            "  {}. {:<14} {:<6} {}  [{}]",
            i + 1,
            persona.name,
            persona.stance(),
            persona.focus(),
            persona.model,
        );
    }
    println!("Summarizer: {} [{}]", registry.summarizer().name, registry.summarizer().model);
    println!("Judge:      {} [{}]", registry.judge().name, registry.judge().model);
    println!("Rounds:     {}", resolved.debate.rounds.max(1));

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut overrides = CliOverrides {
        personas: cli.personas,
        rounds: cli.rounds,
        ..CliOverrides::default()
    };

    match cli.command {
        Commands::Init { api_key, force } => {
            cmd_init(api_key, force)?;
        }
        Commands::Serve { bind, port } => {
            overrides.bind = bind;
            overrides.port = port;
            let resolved = AgoraConfig::resolve(&overrides)?;
            let state = serve_cmd::AppState {
                orchestrator: resolved.orchestrator()?,
                speech: resolved.speech()?,
            };
            serve_cmd::run_serve(state, &resolved.bind, resolved.port).await?;
        }
        Commands::Debate { question, ndjson } => {
            let resolved = AgoraConfig::resolve(&overrides)?;
            let orchestrator = resolved.orchestrator()?;
            let mut stdout = std::io::stdout().lock();
            debate_cmd::run_debate(&orchestrator, &question, ndjson, &mut stdout).await?;
        }
        Commands::Personas => {
            let resolved = AgoraConfig::resolve(&overrides)?;
            cmd_personas(&resolved)?;
        }
    }

    Ok(())
}
