//! APA102 Christmas tree CLI
//!
//! A command-line interface and daemon for the 25-pixel 3D tree.

use clap::Parser;

// CLI definitions
mod cli;
#[cfg(feature = "dbus")]
use cli::ScheduleCommands;
use cli::{Cli, Commands};

// Command handlers (split from main.rs)
mod commands;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        None => {
            // Default: show daemon status
            #[cfg(feature = "dbus")]
            commands::remote::status(false).await?;
            #[cfg(not(feature = "dbus"))]
            return Err("built without D-Bus support; see `xmastree --help`".into());
        }

        // === Daemon ===
        Some(Commands::Daemon { spi, term }) => {
            commands::daemon::run(cli.config, spi, term).await?;
        }

        // === Query Commands ===
        #[cfg(feature = "dbus")]
        Some(Commands::Status { json }) => {
            commands::remote::status(json).await?;
        }
        Some(Commands::Programs) => {
            commands::programs()?;
        }

        // === Set Commands ===
        #[cfg(feature = "dbus")]
        Some(Commands::SetMode { mode }) => {
            commands::remote::set_mode(mode.as_tag()).await?;
        }
        #[cfg(feature = "dbus")]
        Some(Commands::SetProgram { id, speed }) => {
            commands::remote::set_program(&id, speed).await?;
        }
        #[cfg(feature = "dbus")]
        Some(Commands::SetSpeed { speed }) => {
            commands::remote::set_speed(speed).await?;
        }
        #[cfg(feature = "dbus")]
        Some(Commands::Faster { step }) => {
            commands::remote::adjust_speed(step).await?;
        }
        #[cfg(feature = "dbus")]
        Some(Commands::Slower { step }) => {
            commands::remote::adjust_speed(-step).await?;
        }
        #[cfg(feature = "dbus")]
        Some(Commands::SetBrightness { pct, channel }) => {
            commands::remote::set_brightness(channel.as_str(), pct).await?;
        }

        // === Schedule Commands ===
        #[cfg(feature = "dbus")]
        Some(Commands::Schedule(sched)) => match sched {
            ScheduleCommands::Show => {
                commands::remote::schedule_show().await?;
            }
            ScheduleCommands::Set { blocks_json } => {
                commands::remote::schedule_set(&blocks_json).await?;
            }
            ScheduleCommands::Add {
                start,
                end,
                days,
                disabled,
            } => {
                commands::remote::schedule_add(&start, &end, &days, disabled).await?;
            }
            ScheduleCommands::Remove { index } => {
                commands::remote::schedule_remove(index).await?;
            }
        },
        #[cfg(feature = "dbus")]
        Some(Commands::Countdown { minutes, clear }) => {
            commands::remote::countdown(minutes, clear).await?;
        }

        // === Local Commands ===
        Some(Commands::Preview {
            id,
            speed,
            duration,
        }) => {
            commands::preview::preview(&id, speed, duration).await?;
        }
        #[cfg(feature = "dbus")]
        Some(Commands::StopDaemon) => {
            commands::remote::stop_daemon().await?;
        }
    }

    Ok(())
}
