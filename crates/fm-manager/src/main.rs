//! Fault manager daemon and operator commands.

mod app;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fm_config_and_utils::{init_logging, Config, Paths};

/// Fault manager command-line interface.
#[derive(Parser, Debug)]
#[command(name = "fm-manager")]
#[command(about = "Alarm broker: raises, clears and reports faults")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Base directory for config, logs and the default database. Defaults to ~/.fm
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Run the fault manager in the foreground
    Start {
        /// Host name to resolve and bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
        /// SQLite database path
        #[arg(long)]
        database: Option<PathBuf>,
    },
    /// Check whether the fault manager is accepting connections
    Status,
    /// Suppress traps for an alarm id
    Suppress { alarm_id: String },
    /// Resume traps for an alarm id
    Unsuppress { alarm_id: String },
    /// List active, unsuppressed alarms
    List {
        /// Entity instance id prefix
        #[arg(long, default_value = "")]
        entity: String,
    },
    /// Show the most recent event history
    Events {
        /// Number of rows to show
        #[arg(short = 'n', long, default_value_t = 50)]
        limit: usize,
    },
    /// Show the suppression policy of every alarm id
    SuppressionList,
}

impl Commands {
    fn default_start() -> Self {
        Commands::Start {
            host: None,
            port: None,
            database: None,
        }
    }
}

/// Apply command-line values on top of file and environment config.
fn apply_cli(config: &mut Config, cli: &Cli) {
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(Commands::Start {
        host,
        port,
        database,
    }) = &cli.command
    {
        if let Some(host) = host {
            config.controller_host = host.clone();
        }
        if let Some(port) = port {
            config.listen_port = *port;
        }
        if let Some(database) = database {
            config.database_path = Some(database.clone());
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let paths = match &cli.base_dir {
        Some(base) => Paths::with_base_dir(base.clone()),
        None => Paths::new()?,
    };
    let mut config = Config::load(&paths)?;
    apply_cli(&mut config, &cli);
    config.validate()?;

    let command = cli.command.unwrap_or_else(Commands::default_start);
    if !matches!(command, Commands::Start { .. }) {
        init_logging(&config.log_level, None)?;
    }

    match command {
        Commands::Start { .. } => app::run_server(config, paths).await?,
        Commands::Status => app::check_status(&config).await?,
        Commands::Suppress { alarm_id } => app::set_suppression(&config, &paths, &alarm_id, true)?,
        Commands::Unsuppress { alarm_id } => {
            app::set_suppression(&config, &paths, &alarm_id, false)?
        }
        Commands::List { entity } => app::list_alarms(&config, &entity).await?,
        Commands::Events { limit } => app::list_events(&config, &paths, limit)?,
        Commands::SuppressionList => app::list_suppressions(&config, &paths)?,
    }

    Ok(())
}
