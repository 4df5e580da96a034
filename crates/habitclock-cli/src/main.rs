use clap::{Parser, Subcommand};

mod commands;
mod logging;
mod presenter;

#[derive(Parser)]
#[command(name = "habitclock", version, about = "Daily reset reminders for tracked habits")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tracked target management
    Target {
        #[command(subcommand)]
        action: commands::target::TargetAction,
    },
    /// Alerts and lead time
    Settings {
        #[command(subcommand)]
        action: commands::settings::SettingsAction,
    },
    /// Status board of every tracked target
    Status {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run the reminder daemon in the foreground
    Daemon {
        /// Print engine events as JSON lines
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init();

    let result = match cli.command {
        Commands::Target { action } => commands::target::run(action),
        Commands::Settings { action } => commands::settings::run(action),
        Commands::Status { json } => commands::status::run(json),
        Commands::Config { action } => commands::config::run(action),
        Commands::Daemon { json } => commands::daemon::run(json),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
