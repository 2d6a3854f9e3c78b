//! CLI parser and command dispatch.

mod convert_post;
mod helpers;
mod import;
mod init;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use forumport::config::load_settings;
use forumport::PostFilter;

#[derive(Parser)]
#[command(name = "forumport")]
#[command(about = "Migrate a PunBB forum into a Discourse-style database")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding the target database (overrides config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Create and initialize the target database
    Init,

    /// Import the legacy board into the target database
    Import {
        /// Only import posts of this topic
        #[arg(long)]
        topic_id: Option<i64>,
        /// Only import topics whose first post id is at least this
        #[arg(long)]
        min_first_post_id: Option<i64>,
        /// Comma-separated stages to run (groups,users,categories,posts,bans,redirects)
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,
        /// Records fetched per page (overrides config file)
        #[arg(short, long)]
        batch_size: Option<usize>,
    },

    /// Show imported entity counts
    Status,

    /// Write the raw, prepared and Markdown text of one legacy post to a directory
    ConvertPost {
        /// Legacy post id
        id: i64,
        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (mut settings, _config) = load_settings(cli.config.as_deref()).await?;
    if let Some(data_dir) = cli.data_dir {
        settings.data_dir = data_dir;
    }

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::Import {
            topic_id,
            min_first_post_id,
            only,
            batch_size,
        } => {
            let filter = PostFilter {
                topic_id,
                min_first_post_id,
            };
            import::cmd_import(&settings, filter, &only, batch_size).await
        }
        Commands::Status => status::cmd_status(&settings).await,
        Commands::ConvertPost { id, output } => {
            convert_post::cmd_convert_post(&settings, id, &output).await
        }
    }
}
