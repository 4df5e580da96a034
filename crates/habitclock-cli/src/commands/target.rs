//! Tracked target commands.
//!
//! These write straight to the store. A running daemon notices the commit
//! on its next poll and reconciles its timers.

use chrono::Local;
use clap::Subcommand;
use habitclock_core::{
    cycle_id, format_remaining, next_deadline, remaining, transitions, Config, CycleId, ResetTime,
    StateStore, TargetId,
};
use serde::Serialize;

use super::{open_store, parse_target, print_json, require_tracked, CmdResult};

#[derive(Subcommand)]
pub enum TargetAction {
    /// Start tracking a target
    Add {
        #[arg(value_parser = parse_target)]
        id: TargetId,
        /// Daily reset time (HH:MM, local)
        #[arg(long)]
        reset: Option<ResetTime>,
        /// Display label used in reminders
        #[arg(long)]
        label: Option<String>,
    },
    /// Stop tracking a target and drop its state
    Remove {
        #[arg(value_parser = parse_target)]
        id: TargetId,
    },
    /// List tracked targets
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Mark a target done for the current cycle
    Done {
        #[arg(value_parser = parse_target)]
        id: TargetId,
        /// Also change the reset time
        #[arg(long)]
        reset: Option<ResetTime>,
    },
    /// Undo a completion
    Undo {
        #[arg(value_parser = parse_target)]
        id: TargetId,
        /// Also change the reset time
        #[arg(long)]
        reset: Option<ResetTime>,
    },
    /// Show the current cycle and next deadline of a target
    Cycle {
        #[arg(value_parser = parse_target)]
        id: TargetId,
    },
}

#[derive(Serialize)]
struct TargetRow {
    id: TargetId,
    label: Option<String>,
    reset_time: ResetTime,
    cycle: CycleId,
    done: bool,
    notified: bool,
}

pub fn run(action: TargetAction) -> CmdResult {
    let store = open_store()?;

    match action {
        TargetAction::Add { id, reset, label } => {
            transitions::track(&store, &id, reset)?;
            if label.is_some() {
                let mut config = Config::load()?;
                config.set_label(&id, label.as_deref());
                config.save()?;
            }
            let record = store.load_target(&id)?;
            println!("tracking {id} (resets at {})", record.reset_time);
        }
        TargetAction::Remove { id } => {
            require_tracked(&store, &id)?;
            transitions::untrack(&store, &id)?;
            let mut config = Config::load()?;
            if config.labels.contains_key(id.as_str()) {
                config.set_label(&id, None);
                config.save()?;
            }
            println!("stopped tracking {id}");
        }
        TargetAction::List { json } => {
            let now = Local::now();
            let config = Config::load_or_default();
            let settings = store.load_settings()?;
            let records = store.load_all_targets()?;
            let rows: Vec<TargetRow> = settings
                .tracked
                .iter()
                .map(|id| {
                    let record = records.get(id).cloned().unwrap_or_default();
                    let cycle = cycle_id(&now, record.reset_time);
                    TargetRow {
                        id: id.clone(),
                        label: config.labels.get(id.as_str()).cloned(),
                        reset_time: record.reset_time,
                        cycle,
                        done: record.is_completed_in(cycle),
                        notified: record.is_notified_in(cycle),
                    }
                })
                .collect();

            if json {
                print_json(&rows)?;
            } else if rows.is_empty() {
                println!("no tracked targets");
            } else {
                for row in rows {
                    let mark = if row.done { "done" } else { "pending" };
                    match row.label {
                        Some(label) => {
                            println!("{}  {}  {mark}  ({label})", row.id, row.reset_time)
                        }
                        None => println!("{}  {}  {mark}", row.id, row.reset_time),
                    }
                }
            }
        }
        TargetAction::Done { id, reset } => {
            require_tracked(&store, &id)?;
            let done = transitions::complete(&store, &id, reset, &Local::now())?;
            println!("{id} done for cycle {}", done.cycle);
            if done.reset_changed {
                println!("reset time is now {}", done.record.reset_time);
            }
        }
        TargetAction::Undo { id, reset } => {
            require_tracked(&store, &id)?;
            let reopened = transitions::reopen(&store, &id, reset, &Local::now())?;
            println!("{id} reopened for cycle {}", reopened.cycle);
            if reopened.reset_changed {
                println!("reset time is now {}", reopened.record.reset_time);
            }
        }
        TargetAction::Cycle { id } => {
            let now = Local::now();
            let record = store.load_target(&id)?;
            let deadline = next_deadline(record.reset_time, &now);
            println!("cycle:     {}", cycle_id(&now, record.reset_time));
            println!("deadline:  {}", deadline.format("%Y-%m-%d %H:%M %Z"));
            println!("remaining: {}", format_remaining(remaining(record.reset_time, &now)));
        }
    }
    Ok(())
}
