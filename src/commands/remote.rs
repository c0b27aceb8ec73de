//! CLI command handlers that talk to the daemon over D-Bus.
//!
//! Every mutation returns the updated config, so each handler can echo
//! the daemon's view of the result instead of assuming the call stuck.

use super::CommandResult;
use chrono::NaiveTime;
use xmastree::config::{AppConfig, ScheduleBlock, MAX_SCHEDULE_BLOCKS};
use xmastree::dbus::{Status, BUS_NAME, INTERFACE, OBJECT_PATH};

const DAY_NAMES: [&str; 7] = ["mon", "tue", "wed", "thu", "fri", "sat", "sun"];

/// Helper to create a D-Bus proxy for the tree daemon.
async fn tree_proxy() -> Result<zbus::Proxy<'static>, Box<dyn std::error::Error>> {
    let conn = zbus::Connection::session().await?;
    let proxy = zbus::Proxy::new_owned(conn, BUS_NAME, OBJECT_PATH, INTERFACE).await?;
    Ok(proxy)
}

/// Turn a failed call into something actionable. A missing bus name means
/// there is no daemon; daemon-side validation errors come back verbatim.
fn explain(e: zbus::Error) -> Box<dyn std::error::Error> {
    if let zbus::Error::MethodError(ref name, ref message, _) = e {
        if name.as_str() == "org.freedesktop.DBus.Error.ServiceUnknown" {
            return "no daemon on the session bus (start one with `xmastree daemon`)".into();
        }
        if let Some(message) = message {
            return message.clone().into();
        }
    }
    e.into()
}

/// Call a mutation method and decode the config it returns.
async fn call_for_config<B>(method: &str, body: &B) -> Result<AppConfig, Box<dyn std::error::Error>>
where
    B: serde::ser::Serialize + zbus::zvariant::DynamicType,
{
    let proxy = tree_proxy().await?;
    let reply = proxy.call_method(method, body).await.map_err(explain)?;
    let json: String = reply.body().deserialize()?;
    Ok(serde_json::from_str(&json)?)
}

async fn fetch_status() -> Result<(String, Status), Box<dyn std::error::Error>> {
    let proxy = tree_proxy().await?;
    let reply = proxy.call_method("Status", &()).await.map_err(explain)?;
    let raw: String = reply.body().deserialize()?;
    let status = serde_json::from_str(&raw)?;
    Ok((raw, status))
}

/// Show daemon status.
pub async fn status(json: bool) -> CommandResult {
    let (raw, status) = fetch_status().await?;
    if json {
        println!("{raw}");
        return Ok(());
    }

    let config = &status.config;
    let tree = if status.running { "on" } else { "off" };
    println!("Tree:       {tree} ({} mode)", config.mode.as_str());
    if let (Some(id), Some(speed)) = (&status.active_program, status.active_speed) {
        println!("Running:    {id} at {speed}x");
    }
    println!(
        "Program:    {} at {}x",
        config.program_id, config.program_speed
    );
    println!(
        "Brightness: body {}%, star {}%",
        config.body_brightness_pct, config.star_brightness_pct
    );
    for (index, block) in config.schedule_blocks.iter().enumerate() {
        let label = if index == 0 { "Schedule:  " } else { "           " };
        println!("{label} [{index}] {}", format_block(block));
    }
    let window = if status.in_schedule_window {
        "inside a schedule block"
    } else {
        "outside the schedule"
    };
    println!("Window:     {window}");
    if let Some(until) = config.countdown_until {
        let left = until.signed_duration_since(status.now);
        if left > chrono::Duration::zero() {
            println!(
                "Countdown:  until {} ({} min left)",
                until.format("%Y-%m-%d %H:%M"),
                left.num_minutes().max(1)
            );
        } else {
            println!("Countdown:  expired ({until})");
        }
    }
    println!("Clock:      {}", status.now.format("%Y-%m-%d %H:%M:%S"));
    Ok(())
}

/// Set the power mode.
pub async fn set_mode(tag: &str) -> CommandResult {
    let config = call_for_config("SetMode", &(tag,)).await?;
    println!("Mode: {}", config.mode.as_str());
    Ok(())
}

/// Select a program, optionally changing the speed with it.
pub async fn set_program(id: &str, speed: Option<f64>) -> CommandResult {
    // 0 tells the daemon to keep the current speed.
    let config = call_for_config("SetProgram", &(id, speed.unwrap_or(0.0))).await?;
    println!("Program: {} at {}x", config.program_id, config.program_speed);
    Ok(())
}

/// Set the speed multiplier.
pub async fn set_speed(speed: f64) -> CommandResult {
    let config = call_for_config("SetSpeed", &(speed,)).await?;
    println!("Speed: {}x", config.program_speed);
    Ok(())
}

/// Nudge the speed by a signed delta.
pub async fn adjust_speed(delta: f64) -> CommandResult {
    let config = call_for_config("AdjustSpeed", &(delta,)).await?;
    println!("Speed: {}x", config.program_speed);
    Ok(())
}

/// Set brightness percent on one channel or both.
pub async fn set_brightness(channel: &str, pct: u8) -> CommandResult {
    let config = call_for_config("SetBrightness", &(channel, pct)).await?;
    println!(
        "Brightness: body {}%, star {}%",
        config.body_brightness_pct, config.star_brightness_pct
    );
    Ok(())
}

/// Show the configured schedule blocks.
pub async fn schedule_show() -> CommandResult {
    let (_, status) = fetch_status().await?;
    for (index, block) in status.config.schedule_blocks.iter().enumerate() {
        println!("[{index}] {}", format_block(block));
    }
    let window = if status.in_schedule_window {
        "inside a block"
    } else {
        "outside all blocks"
    };
    println!("Now {window} ({})", status.now.format("%a %H:%M"));
    Ok(())
}

/// Replace the whole schedule from a JSON array.
pub async fn schedule_set(blocks_json: &str) -> CommandResult {
    let config = call_for_config("SetSchedule", &(blocks_json,)).await?;
    print_blocks(&config);
    Ok(())
}

/// Append one block to the current schedule.
pub async fn schedule_add(start: &str, end: &str, days: &[String], disabled: bool) -> CommandResult {
    let block = ScheduleBlock {
        start: parse_hhmm(start)?,
        end: parse_hhmm(end)?,
        days: parse_days(days)?,
        enabled: !disabled,
    };

    let (_, status) = fetch_status().await?;
    let mut blocks = status.config.schedule_blocks;
    if blocks.len() >= MAX_SCHEDULE_BLOCKS {
        return Err(format!("schedule is full ({MAX_SCHEDULE_BLOCKS} blocks)").into());
    }
    blocks.push(block);

    let config = call_for_config("SetSchedule", &(serde_json::to_string(&blocks)?,)).await?;
    print_blocks(&config);
    Ok(())
}

/// Remove one block by index.
pub async fn schedule_remove(index: usize) -> CommandResult {
    let (_, status) = fetch_status().await?;
    let mut blocks = status.config.schedule_blocks;
    if index >= blocks.len() {
        return Err(format!("no block [{index}] ({} configured)", blocks.len()).into());
    }
    blocks.remove(index);

    let config = call_for_config("SetSchedule", &(serde_json::to_string(&blocks)?,)).await?;
    print_blocks(&config);
    Ok(())
}

/// Start or clear the countdown override.
pub async fn countdown(minutes: Option<u32>, clear: bool) -> CommandResult {
    if clear {
        call_for_config("ClearCountdown", &()).await?;
        println!("Countdown cleared.");
        return Ok(());
    }
    let Some(minutes) = minutes else {
        eprintln!("Specify minutes (1-1440) or --clear");
        return Ok(());
    };
    let config = call_for_config("SetCountdown", &(minutes,)).await?;
    match config.countdown_until {
        Some(until) => println!("On until {}", until.format("%Y-%m-%d %H:%M:%S")),
        None => println!("Countdown not set."),
    }
    Ok(())
}

/// Ask the daemon to exit.
pub async fn stop_daemon() -> CommandResult {
    let proxy = tree_proxy().await?;
    proxy.call_method("Shutdown", &()).await.map_err(explain)?;
    println!("Daemon asked to exit.");
    Ok(())
}

fn print_blocks(config: &AppConfig) {
    for (index, block) in config.schedule_blocks.iter().enumerate() {
        println!("[{index}] {}", format_block(block));
    }
}

fn format_block(block: &ScheduleBlock) -> String {
    let days = match &block.days {
        None => "every day".to_string(),
        Some(days) if days.is_empty() => "never".to_string(),
        Some(days) => days
            .iter()
            .filter_map(|&d| DAY_NAMES.get(d as usize).copied())
            .collect::<Vec<_>>()
            .join(","),
    };
    let overnight = match block.end.cmp(&block.start) {
        std::cmp::Ordering::Less => " (overnight)",
        std::cmp::Ordering::Equal => " (empty)",
        std::cmp::Ordering::Greater => "",
    };
    let disabled = if block.enabled { "" } else { " [disabled]" };
    format!(
        "{}-{} {days}{overnight}{disabled}",
        block.start.format("%H:%M"),
        block.end.format("%H:%M")
    )
}

fn parse_hhmm(s: &str) -> Result<NaiveTime, Box<dyn std::error::Error>> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| format!("bad time {s:?} (expected 24h HH:MM)").into())
}

fn parse_days(days: &[String]) -> Result<Option<Vec<u8>>, Box<dyn std::error::Error>> {
    if days.is_empty() {
        return Ok(None);
    }
    let mut out = Vec::with_capacity(days.len());
    for day in days {
        let prefix = day.trim().to_ascii_lowercase();
        let index = DAY_NAMES
            .iter()
            .position(|name| prefix.starts_with(name))
            .ok_or_else(|| format!("unknown day {day:?} (use mon..sun)"))?;
        out.push(index as u8);
    }
    out.sort_unstable();
    out.dedup();
    Ok(Some(out))
}
