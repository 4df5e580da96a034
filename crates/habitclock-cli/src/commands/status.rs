use chrono::Local;
use habitclock_core::{board, Config, StateStore, StaticDirectory};

use super::{open_store, print_json, CmdResult};

pub fn run(json: bool) -> CmdResult {
    let store = open_store()?;
    let directory = StaticDirectory::from_config(&Config::load_or_default());
    let settings = store.load_settings()?;
    let records = store.load_all_targets()?;
    let entries = board::build(&Local::now(), &settings, &records, &directory);

    if json {
        return print_json(&entries);
    }
    if !settings.alerts_enabled {
        println!("alerts are off");
    }
    if entries.is_empty() {
        println!("no tracked targets");
    }
    for entry in entries {
        let flag = if entry.urgent { "!" } else { " " };
        println!(
            "{flag} {:<24} {}  {}",
            entry.label, entry.reset_time, entry.remaining_text
        );
    }
    Ok(())
}
