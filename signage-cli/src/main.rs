use anyhow::Result;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use signage_core::DayOfWeek;

mod config;
mod schedule_cmd;
mod state;
mod sync_cmd;
mod telemetry;
mod ws;

#[derive(Parser, Debug)]
#[command(name = "signage", version, about = "Digital signage schedule console")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage ~/.signage/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Check a candidate without changing anything
    Validate {
        /// Candidate JSON file
        #[arg(long)]
        candidate: PathBuf,
    },

    /// Validate a candidate and add its blocks as pending
    Add {
        #[arg(long)]
        candidate: PathBuf,
    },

    /// Replace a stored block with a candidate (the block stays if the candidate is rejected)
    Edit {
        #[arg(long)]
        screen: String,
        /// Block JSON file identifying the block to replace
        #[arg(long)]
        block: PathBuf,
        #[arg(long)]
        candidate: PathBuf,
    },

    /// Remove one block from a screen
    Remove {
        #[arg(long)]
        screen: String,
        /// Block JSON file identifying the block to remove
        #[arg(long)]
        block: PathBuf,
    },

    /// Remove every block on a date or weekday
    Clear {
        #[command(flatten)]
        day: DayArgs,
        /// Only these screens (default: all)
        #[arg(long = "screen")]
        screens: Vec<String>,
    },

    /// Show side-by-side columns of a screen's blocks for a day
    Layout {
        #[arg(long)]
        screen: String,
        #[command(flatten)]
        day: DayArgs,
        /// Today in the configured timezone (both its date and its weekday)
        #[arg(long, conflicts_with_all = ["date", "weekday"])]
        today: bool,
    },

    /// Zone draft of a screen
    Zones {
        #[command(subcommand)]
        command: ZonesCommand,
    },

    /// Merge a saved server snapshot (JSON) into the local store
    Import {
        #[arg(long)]
        snapshot: PathBuf,
    },

    /// Send the whole schedule to the server in chunks
    Push,

    /// Resend the chunks the server rejected in the last push
    Retry,

    /// Fetch the schedule of the configured branches and merge it
    Pull,

    /// Sync state counts and schedule id
    Status,
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config if none exists
    Init,
    /// Print the effective config
    Show,
}

#[derive(Subcommand, Debug)]
enum ZonesCommand {
    /// Print split, zones and active zone
    Show {
        #[arg(long)]
        screen: String,
    },
    /// Split the screen into 1, 2 or 4 zones
    Split {
        #[arg(long)]
        screen: String,
        #[arg(long)]
        count: u8,
    },
    /// Assign a playlist to a zone (omit --playlist to clear it)
    Assign {
        #[arg(long)]
        screen: String,
        #[arg(long)]
        zone: u8,
        #[arg(long)]
        playlist: Option<String>,
    },
    /// Make other screens mirror a base screen's zones
    Bulk {
        #[arg(long)]
        base: String,
        #[arg(long = "target", required = true)]
        targets: Vec<String>,
    },
    /// Stop mirroring
    Unbulk,
}

#[derive(Args, Debug, Clone)]
pub struct DayArgs {
    /// Calendar date (YYYY-MM-DD)
    #[arg(long, conflicts_with = "weekday")]
    pub date: Option<NaiveDate>,
    /// Weekday (MONDAY, mon, ...)
    #[arg(long)]
    pub weekday: Option<DayOfWeek>,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Config { command } => match command {
            ConfigCommand::Init => config::init_config()?,
            ConfigCommand::Show => {
                let cfg = config::load_config()?;
                print!("{}", toml::to_string_pretty(&cfg)?);
            }
        },

        Command::Validate { candidate } => schedule_cmd::validate(&candidate)?,
        Command::Add { candidate } => schedule_cmd::add(&candidate)?,
        Command::Edit {
            screen,
            block,
            candidate,
        } => schedule_cmd::edit(&screen, &block, &candidate)?,
        Command::Remove { screen, block } => schedule_cmd::remove(&screen, &block)?,
        Command::Clear { day, screens } => schedule_cmd::clear(&day, screens)?,
        Command::Layout { screen, day, today } => {
            let cfg = config::load_config()?;
            schedule_cmd::layout(&cfg, &screen, &day, today)?
        }

        Command::Zones { command } => match command {
            ZonesCommand::Show { screen } => schedule_cmd::zones_show(&screen)?,
            ZonesCommand::Split { screen, count } => schedule_cmd::zones_split(&screen, count)?,
            ZonesCommand::Assign {
                screen,
                zone,
                playlist,
            } => schedule_cmd::zones_assign(&screen, zone, playlist)?,
            ZonesCommand::Bulk { base, targets } => schedule_cmd::zones_bulk(&base, targets)?,
            ZonesCommand::Unbulk => schedule_cmd::zones_unbulk()?,
        },

        Command::Import { snapshot } => schedule_cmd::import(&snapshot)?,

        Command::Push => sync_cmd::push(&config::load_config()?).await?,
        Command::Retry => sync_cmd::retry(&config::load_config()?).await?,
        Command::Pull => sync_cmd::pull(&config::load_config()?).await?,
        Command::Status => sync_cmd::status()?,
    }

    Ok(())
}
