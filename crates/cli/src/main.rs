mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use digest_core::{init_logging, LoggingConfig, Settings};
use std::path::PathBuf;

use commands::migrate;

#[derive(Parser)]
#[command(name = "digest-migrate")]
#[command(version, about = "Versioned SQL migrations for PostgreSQL")]
struct Cli {
    /// Directory holding the migration files (overrides MIGRATIONS_DIR)
    #[arg(long, global = true)]
    migrations_dir: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply every pending migration in order
    RunMigrations,

    /// Show the applied migrations recorded in the ledger
    ShowStatus {
        /// Also list migration files that have not been applied
        #[arg(long)]
        pending: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Compare migration files with the ledger without applying anything
    Validate {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create the next migration file
    Create {
        /// Short description, e.g. "add user email"
        description: String,
    },
}

impl Cli {
    fn logging_config(&self) -> LoggingConfig {
        let config = if self.verbose {
            LoggingConfig::verbose()
        } else if self.quiet {
            LoggingConfig::quiet()
        } else {
            LoggingConfig::default()
        };

        match self.log_format {
            LogFormat::Json => config.with_json(),
            LogFormat::Text => config,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env file is normal
    let dotenv = dotenvy::dotenv();

    init_logging(&cli.logging_config()).map_err(|e| anyhow::anyhow!(e))?;
    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded environment file");
    }

    let mut settings = Settings::from_env()?;
    if let Some(dir) = cli.migrations_dir.clone() {
        settings = settings.with_migrations_dir(dir);
    }
    for (key, source) in settings.config_sources() {
        tracing::debug!(key = %key, source = %source, "Configuration value");
    }

    match cli.command {
        Commands::RunMigrations => migrate::run(&settings).await?,
        Commands::ShowStatus { pending, json } => migrate::status(&settings, pending, json).await?,
        Commands::Validate { json } => migrate::validate(&settings, json).await?,
        Commands::Create { description } => migrate::create(&settings, &description)?,
    }

    Ok(())
}
