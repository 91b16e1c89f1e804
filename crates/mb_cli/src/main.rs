use clap::{Args, Parser, Subcommand};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod commands;
mod setup;

#[derive(Parser, Debug)]
#[command(name = "mb", author, version, about = "Argentine news digest bot", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    settings: Settings,
    #[command(subcommand)]
    command: Commands,
}

/// Credentials and pipeline tunables shared by every command.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Storage backend: sqlite or memory
    #[arg(long, env = "MB_STORAGE", default_value = "sqlite", global = true)]
    pub storage: String,
    /// SQLite database path (`sqlite:` prefix accepted)
    #[arg(long, env = "DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    #[arg(long, env = "NEWSDATA_API_KEY", hide_env_values = true, global = true)]
    pub newsdata_key: Option<String>,

    /// Analyzer to use: openai or dummy
    #[arg(long, default_value = "openai", global = true)]
    pub analyzer: String,
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub openai_key: Option<String>,
    #[arg(long, env = "OPENAI_MODEL", global = true)]
    pub model: Option<String>,
    #[arg(long, env = "OPENAI_BASE_URL", global = true)]
    pub openai_base_url: Option<String>,

    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true, global = true)]
    pub telegram_token: Option<String>,
    /// Target channel, e.g. @my_channel. Falls back to TELEGRAM_CHAT_ID.
    #[arg(long, env = "TELEGRAM_CHANNEL_ID", global = true)]
    pub channel: Option<String>,

    #[arg(long, default_value_t = 6, global = true)]
    pub score_threshold: u8,
    #[arg(long, default_value_t = 2, global = true)]
    pub extract_concurrency: usize,
    #[arg(long, default_value_t = 80, global = true)]
    pub min_text_chars: usize,
    #[arg(long, default_value = "1s", value_parser = humantime::parse_duration, global = true)]
    pub analysis_delay: Duration,
    #[arg(long, default_value = "2s", value_parser = humantime::parse_duration, global = true)]
    pub publish_delay: Duration,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Pull new articles from the feed and store them
    Fetch {
        #[arg(long, default_value_t = 10)]
        size: usize,
        /// Store feed results without downloading the pages
        #[arg(long)]
        no_extract: bool,
    },
    /// Extract text for stored articles that have none
    Extract { limit: Option<usize> },
    /// Analyze stored articles that have no analysis yet
    Analyze { limit: Option<usize> },
    /// Post the best analyzed articles
    Publish { limit: Option<usize> },
    /// Fetch, extract, analyze and publish in one run
    FullCycle {
        #[arg(long, default_value_t = 10)]
        size: usize,
    },
    /// Run full cycles on an interval
    Schedule {
        /// Interval between cycles (e.g. 5m, 1h30m)
        #[arg(long, default_value = "5m", value_parser = humantime::parse_duration)]
        every: Duration,
        #[arg(long, default_value_t = 10)]
        size: usize,
        /// Also serve the status API on this address
        #[arg(long)]
        listen: Option<String>,
    },
    /// Serve the status API
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        listen: String,
    },
    /// Show article counters for today
    Stats {
        /// Count every stored article instead of today's
        #[arg(long)]
        all: bool,
        /// Also post the counters to the channel
        #[arg(long)]
        send: bool,
    },
    /// List the most recently stored articles
    Recent {
        #[arg(default_value_t = 10)]
        limit: usize,
    },
    /// Drop the analysis of an unpublished article so it is analyzed again
    Reanalyze { url: String },
    /// Show which credentials are configured
    CheckEnv,
    /// Verify the Telegram bot token
    CheckPublisher,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_logging();
    let cli = Cli::parse();
    let settings = cli.settings;

    let outcome = match cli.command {
        Commands::Fetch { size, no_extract } => commands::fetch(&settings, size, !no_extract).await,
        Commands::Extract { limit } => commands::extract(&settings, limit).await,
        Commands::Analyze { limit } => commands::analyze(&settings, limit).await,
        Commands::Publish { limit } => commands::publish(&settings, limit).await,
        Commands::FullCycle { size } => commands::full_cycle(&settings, size).await,
        Commands::Schedule { every, size, listen } => commands::schedule(&settings, every, size, listen).await,
        Commands::Serve { listen } => commands::serve(&settings, &listen).await,
        Commands::Stats { all, send } => commands::stats(&settings, all, send).await,
        Commands::Recent { limit } => commands::recent(&settings, limit).await,
        Commands::Reanalyze { url } => commands::reanalyze(&settings, &url).await,
        Commands::CheckEnv => commands::check_env(&settings),
        Commands::CheckPublisher => commands::check_publisher(&settings).await,
    };
    Ok(outcome?)
}
