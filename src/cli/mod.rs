use crate::global;
use crate::rotation::EventStatus;
use crate::snapshot::SnapshotStore;
use anyhow::Result;
use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rollcall")]
#[command(about = "Boss attendance tracking service", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Print version information
    Version,
    /// List the event rotation from the last snapshot
    Events(EventsCliArgs),
    /// List finalized voice sessions from the last snapshot
    History(HistoryCliArgs),
}

#[derive(ClapArgs, Debug)]
pub struct EventsCliArgs {
    /// Only show entries with this status (pending, active, done)
    #[arg(short, long)]
    pub status: Option<String>,
}

#[derive(ClapArgs, Debug)]
pub struct HistoryCliArgs {
    /// Maximum number of records to show, newest first
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

/// Inspect the rotation offline, straight from the snapshot file.
pub fn handle_events_command(args: EventsCliArgs) -> Result<()> {
    let snapshot = SnapshotStore::new(global::snapshot_file()?).load()?;

    let wanted: Option<EventStatus> = match args.status.as_deref() {
        Some("pending") => Some(EventStatus::Pending),
        Some("active") => Some(EventStatus::Active),
        Some("done") => Some(EventStatus::Done),
        Some(other) => anyhow::bail!("unknown status filter '{other}'"),
        None => None,
    };

    let mut shown = 0;
    for event in &snapshot.events {
        if wanted.is_some_and(|w| event.status != w) {
            continue;
        }
        println!(
            "{}  {:<8} {}  (spawns {})",
            event.id,
            event.status.as_str(),
            event.name,
            event.spawn_at.format("%Y-%m-%d %H:%M UTC")
        );
        shown += 1;
    }
    if shown == 0 {
        println!("No events in snapshot");
    }
    Ok(())
}

pub fn handle_history_command(args: HistoryCliArgs) -> Result<()> {
    let snapshot = SnapshotStore::new(global::snapshot_file()?).load()?;

    let records = snapshot
        .session_history
        .iter()
        .rev()
        .take(args.limit);

    let mut shown = 0;
    for record in records {
        let duration = record
            .duration_secs
            .map(|s| format!("{}m {}s", s / 60, s % 60))
            .unwrap_or_else(|| "unknown (no tracked join)".to_string());
        println!(
            "{}  {}  left {}  duration {}",
            record.identity,
            record.display_name,
            record.left_at.format("%Y-%m-%d %H:%M:%S UTC"),
            duration
        );
        shown += 1;
    }
    if shown == 0 {
        println!("No session history in snapshot");
    }
    Ok(())
}
