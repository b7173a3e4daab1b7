use std::path::PathBuf;

use clap::{Parser, Subcommand};
use report_qa::Result;
use report_qa::commands::{SourceFormat, ask, build_index, chat, delete_index, list_indexes};
use report_qa::config::{Config, run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "report-qa")]
#[command(about = "Question answering over an indexed report")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the indexes (default: ~/.report-qa)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding and generation services
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Build the index for a report
    Build {
        /// PDF or form-feed separated text file
        path: PathBuf,
        /// Index name (default: derived from the file name)
        #[arg(long)]
        id: Option<String>,
        /// Source format (default: chosen by file extension)
        #[arg(long, value_enum)]
        format: Option<SourceFormat>,
    },
    /// List stored indexes
    List,
    /// Ask one question
    Ask {
        question: String,
        /// Index to query (default: the only stored index)
        #[arg(long)]
        index: Option<String>,
        /// Number of passages to retrieve
        #[arg(short, long)]
        k: Option<usize>,
        /// Print the passages the answer was based on
        #[arg(long)]
        sources: bool,
    },
    /// Ask questions interactively
    Chat {
        /// Index to query (default: the only stored index)
        #[arg(long)]
        index: Option<String>,
        /// Number of passages to retrieve
        #[arg(short, long)]
        k: Option<usize>,
    },
    /// Delete a stored index
    Delete {
        /// Index name
        id: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base_dir = match cli.config_dir {
        Some(dir) => dir,
        None => Config::config_dir()?,
    };

    if let Commands::Config { show } = cli.command {
        if show {
            show_config(&Config::load(&base_dir)?);
        } else {
            run_interactive_config(&base_dir)?;
        }
        return Ok(());
    }

    let config = Config::load(&base_dir)?;
    match cli.command {
        Commands::Config { .. } => {}
        Commands::Build { path, id, format } => {
            build_index(&config, &path, id.as_deref(), format)?;
        }
        Commands::List => {
            list_indexes(&config)?;
        }
        Commands::Ask {
            question,
            index,
            k,
            sources,
        } => {
            ask(&config, &question, index.as_deref(), k, sources)?;
        }
        Commands::Chat { index, k } => {
            chat(&config, index.as_deref(), k)?;
        }
        Commands::Delete { id } => {
            delete_index(&config, &id)?;
        }
    }

    Ok(())
}
