use clap::{Subcommand, ValueEnum};
use habitclock_core::{lead_time_phrase, transitions, Settings, StateStore};

use super::{open_store, print_json, CmdResult};

#[derive(Clone, Copy, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Print the current settings
    Show {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Turn reminders on or off
    Alerts {
        #[arg(value_enum)]
        state: Switch,
    },
    /// Minutes before the reset to remind (1-1440)
    Lead {
        #[arg(value_parser = clap::value_parser!(u32).range(1..=1440))]
        minutes: u32,
    },
}

pub fn run(action: SettingsAction) -> CmdResult {
    let store = open_store()?;
    let current = store.load_settings()?;

    match action {
        SettingsAction::Show { json } => {
            if json {
                print_json(&current)?;
            } else {
                print_settings(&current);
            }
        }
        SettingsAction::Alerts { state } => {
            let enabled = matches!(state, Switch::On);
            transitions::apply_settings(&store, &current.with_alerts(enabled))?;
            println!("alerts {}", if enabled { "on" } else { "off" });
        }
        SettingsAction::Lead { minutes } => {
            let saved = transitions::apply_settings(&store, &current.with_lead_minutes(minutes))?;
            println!("reminding {} before reset", lead_time_phrase(saved.lead_minutes));
        }
    }
    Ok(())
}

fn print_settings(settings: &Settings) {
    println!("alerts:  {}", if settings.alerts_enabled { "on" } else { "off" });
    println!(
        "lead:    {} ({})",
        settings.lead_minutes,
        lead_time_phrase(settings.lead_minutes)
    );
    println!("tracked: {}", settings.tracked.len());
}
