#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

mod commands;

use clap::{Parser, Subcommand};
use nerd_core::config::Config;

/// nerd CLI -- workspace initialisation and upstream-account management
/// for the coding-assistant backend.
#[derive(Parser)]
#[command(name = "nerd", version, about)]
struct Cli {
    /// Emit machine-readable JSON instead of human-readable text.
    #[arg(short = 'j', long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan a workspace, derive a project profile, and bootstrap its
    /// `.nerd/` directory with recommended agents and knowledge stores.
    Init {
        /// Workspace root to initialise. Defaults to the current directory.
        #[arg(default_value = ".")]
        workspace: String,
    },

    /// Manage upstream provider accounts.
    Accounts {
        #[command(subcommand)]
        command: AccountsCommands,
    },
}

#[derive(Subcommand)]
enum AccountsCommands {
    /// List all configured accounts.
    List,
    /// Add a new account by email.
    Add {
        /// Account email address.
        email: String,
    },
    /// Remove an account by email.
    Remove {
        /// Account email address.
        email: String,
    },
    /// Show one account's full record.
    Show {
        /// Account email address.
        email: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("warning: failed to load config, using defaults: {e}");
        Config::default()
    });

    if cli.json {
        nerd_telemetry::init_logging_json("nerd-cli", &config.general.log_level);
    } else {
        nerd_telemetry::init_logging("nerd-cli", &config.general.log_level);
    }

    match cli.command {
        Commands::Init { workspace } => {
            commands::init::run(&config, &workspace, cli.json).await?;
        }
        Commands::Accounts { command } => match command {
            AccountsCommands::List => commands::accounts::list(&config, cli.json).await?,
            AccountsCommands::Add { email } => commands::accounts::add(&config, &email).await?,
            AccountsCommands::Remove { email } => commands::accounts::remove(&config, &email).await?,
            AccountsCommands::Show { email } => commands::accounts::show(&config, &email, cli.json).await?,
        },
    }

    Ok(())
}
