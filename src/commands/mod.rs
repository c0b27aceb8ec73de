//! Command handlers for the CLI application.
//!
//! This module organizes command handlers by category:
//! - `daemon`: daemon bootstrap (config, driver selection, supervision)
//! - `remote`: commands that talk to a running daemon over D-Bus
//! - `preview`: local terminal preview, no daemon involved

pub mod daemon;
pub mod preview;
#[cfg(feature = "dbus")]
pub mod remote;

/// Result type for command handlers
pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// List the program registry. Works offline; the daemon ships the same
/// table in its status document.
pub fn programs() -> CommandResult {
    println!("{:<18} {}", "ID", "Name");
    println!("{}", "-".repeat(40));
    for program in xmastree::program::PROGRAMS {
        println!("{:<18} {}", program.id(), program.name());
    }
    Ok(())
}
