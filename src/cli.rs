// CLI definitions using clap

use clap::{Parser, Subcommand};
#[cfg(feature = "dbus")]
use clap::ValueEnum;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xmastree")]
#[command(author, version, about = "APA102 Christmas tree controller")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (default: $XMASTREE_CONFIG or ~/.config/xmastree/config.json)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    // === Daemon ===
    /// Run the controller daemon (reconcile loop + D-Bus interface)
    Daemon {
        /// SPI device to drive
        #[arg(long, value_name = "DEV", default_value = xmastree_apa102::DEFAULT_SPIDEV)]
        spi: String,
        /// Render the tree in the terminal instead of SPI hardware
        #[arg(long)]
        term: bool,
    },

    // === Query Commands ===
    /// Show daemon status (mode, program, schedule, countdown)
    #[cfg(feature = "dbus")]
    #[command(visible_aliases = ["st", "s"])]
    Status {
        /// Print the raw status document instead of the summary
        #[arg(long)]
        json: bool,
    },

    /// List available programs
    #[command(visible_aliases = ["prog", "ls"])]
    Programs,

    // === Set Commands ===
    /// Set the power mode
    #[cfg(feature = "dbus")]
    #[command(visible_alias = "mode")]
    SetMode {
        /// on = always on, off = always off, auto = follow the schedule
        #[arg(value_enum)]
        mode: ModeArg,
    },

    /// Select the animation program
    #[cfg(feature = "dbus")]
    #[command(visible_aliases = ["program", "sp"])]
    SetProgram {
        /// Program id (see `programs`)
        id: String,
        /// Also set the speed multiplier
        #[arg(long)]
        speed: Option<f64>,
    },

    /// Set the animation speed multiplier
    #[cfg(feature = "dbus")]
    #[command(visible_alias = "speed")]
    SetSpeed {
        /// Speed multiplier (0.1-200, 1.0 = normal)
        speed: f64,
    },

    /// Nudge the animation speed up
    #[cfg(feature = "dbus")]
    Faster {
        /// Amount to add
        #[arg(long, default_value = "0.5")]
        step: f64,
    },

    /// Nudge the animation speed down
    #[cfg(feature = "dbus")]
    Slower {
        /// Amount to subtract
        #[arg(long, default_value = "0.5")]
        step: f64,
    },

    /// Set LED brightness percent
    #[cfg(feature = "dbus")]
    #[command(visible_aliases = ["brightness", "sb"])]
    SetBrightness {
        /// Brightness percent (0-100)
        #[arg(value_parser = clap::value_parser!(u8).range(0..101))]
        pct: u8,
        /// Which brightness channel to set
        #[arg(value_enum, long, default_value = "both")]
        channel: ChannelArg,
    },

    // === Schedule Commands ===
    /// Inspect or edit the on/off schedule
    #[cfg(feature = "dbus")]
    #[command(subcommand, visible_alias = "sched")]
    Schedule(ScheduleCommands),

    /// Force the tree on for a while (overrides the schedule in auto mode)
    #[cfg(feature = "dbus")]
    #[command(visible_alias = "cd")]
    Countdown {
        /// Minutes to stay on (1-1440)
        minutes: Option<u32>,
        /// Clear an active countdown instead
        #[arg(long, conflicts_with = "minutes")]
        clear: bool,
    },

    // === Local Commands ===
    /// Render a program in the terminal, no daemon or hardware needed
    Preview {
        /// Program id (see `programs`)
        id: String,
        /// Speed multiplier
        #[arg(long, default_value = "1.0")]
        speed: f64,
        /// Stop after this many seconds (0 = run until Ctrl-C)
        #[arg(long, default_value = "0")]
        duration: f64,
    },

    /// Ask a running daemon to exit
    #[cfg(feature = "dbus")]
    #[command(visible_alias = "quit")]
    StopDaemon,
}

/// Schedule commands
#[cfg(feature = "dbus")]
#[derive(Subcommand)]
pub enum ScheduleCommands {
    /// Show the configured blocks and whether one matches right now
    Show,

    /// Replace the whole schedule with a JSON array of blocks
    Set {
        /// e.g. '[{"start_hhmm":"16:00","end_hhmm":"23:30"}]'
        blocks_json: String,
    },

    /// Add one block to the schedule
    Add {
        /// Start time, 24h HH:MM
        start: String,
        /// End time, 24h HH:MM (end before start wraps past midnight)
        end: String,
        /// Restrict to days: mon,tue,... (default: every day)
        #[arg(long, value_delimiter = ',')]
        days: Vec<String>,
        /// Add the block disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Remove a block by index (as printed by `schedule show`)
    #[command(visible_alias = "rm")]
    Remove {
        /// Block index, starting at 0
        index: usize,
    },
}

#[cfg(feature = "dbus")]
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// Always on, schedule ignored
    On,
    /// Always off, schedule ignored
    Off,
    /// Follow the schedule and countdown
    #[value(alias = "schedule")]
    Auto,
}

#[cfg(feature = "dbus")]
impl ModeArg {
    /// The config-file tag the daemon expects.
    pub fn as_tag(&self) -> &'static str {
        match self {
            ModeArg::On => "manual_on",
            ModeArg::Off => "manual_off",
            ModeArg::Auto => "auto",
        }
    }
}

#[cfg(feature = "dbus")]
#[derive(Copy, Clone, PartialEq, Eq, ValueEnum, Default)]
pub enum ChannelArg {
    /// Body and star together
    #[default]
    Both,
    /// The 24 body pixels
    Body,
    /// The star on top
    Star,
}

#[cfg(feature = "dbus")]
impl ChannelArg {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelArg::Both => "both",
            ChannelArg::Body => "body",
            ChannelArg::Star => "star",
        }
    }
}
