//! Typed configuration with atomic persistence.
//!
//! The config is a single JSON document, human-editable while the daemon is
//! stopped. Loading is fail-soft at field granularity: a damaged field (or a
//! damaged schedule block) falls back to its default instead of discarding
//! the whole file. Every mutation goes through [`ConfigStore::update`],
//! which clones, patches, normalizes, persists via tmp-file-and-rename, and
//! only then swaps the in-memory value. The store lock is held across
//! persistence, so concurrent updates are linearizable and read-modify-write
//! patches like [`ConfigPatch::AdjustSpeed`] never lose increments.

use crate::program::DEFAULT_PROGRAM_ID;
use chrono::{NaiveDateTime, NaiveTime};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const SPEED_MIN: f64 = 0.1;
pub const SPEED_MAX: f64 = 200.0;
pub const DEFAULT_SPEED: f64 = 1.0;

/// Most schedule blocks a config may hold; excess blocks are dropped.
pub const MAX_SCHEDULE_BLOCKS: usize = 5;

/// Countdown override bounds, in minutes.
pub const COUNTDOWN_MIN_MINUTES: u32 = 1;
pub const COUNTDOWN_MAX_MINUTES: u32 = 1440;

/// Errors from config persistence
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Filesystem write or rename failed
    #[error("failed to persist config at {path}: {source}")]
    Persist {
        path: PathBuf,
        source: io::Error,
    },

    /// Serialization failed
    #[error("failed to encode config: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Power policy for the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Always on, schedule ignored.
    ManualOn,
    /// Always off, schedule ignored.
    ManualOff,
    /// Follow the schedule blocks and the countdown override.
    #[default]
    Auto,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::ManualOn => "manual_on",
            Mode::ManualOff => "manual_off",
            Mode::Auto => "auto",
        }
    }

    /// Parse the JSON tag form (`"auto"`, `"manual_on"`, `"manual_off"`).
    pub fn from_tag(tag: &str) -> Option<Mode> {
        match tag {
            "manual_on" => Some(Mode::ManualOn),
            "manual_off" => Some(Mode::ManualOff),
            "auto" => Some(Mode::Auto),
            _ => None,
        }
    }
}

/// One daily on-window.
///
/// Times are wall-clock; `start > end` wraps past midnight and `start ==
/// end` never matches. `days` restricts the window to a set of weekdays
/// (Monday = 0); `None` means every day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleBlock {
    #[serde(rename = "start_hhmm", with = "hhmm")]
    pub start: NaiveTime,
    #[serde(rename = "end_hhmm", with = "hhmm")]
    pub end: NaiveTime,
    #[serde(default)]
    pub days: Option<Vec<u8>>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ScheduleBlock {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            end: NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            days: None,
            enabled: true,
        }
    }
}

/// The whole persisted configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    pub mode: Mode,
    pub program_id: String,
    pub program_speed: f64,
    pub body_brightness_pct: u8,
    pub star_brightness_pct: u8,
    pub schedule_blocks: Vec<ScheduleBlock>,
    /// Forced-on override while `now < countdown_until` (Auto mode only).
    pub countdown_until: Option<NaiveDateTime>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Auto,
            program_id: DEFAULT_PROGRAM_ID.to_string(),
            program_speed: DEFAULT_SPEED,
            body_brightness_pct: 50,
            star_brightness_pct: 50,
            schedule_blocks: vec![ScheduleBlock::default()],
            countdown_until: None,
        }
    }
}

impl AppConfig {
    /// Clamp every field into its valid range. Runs after load and after
    /// every patch, so the rest of the system never sees an out-of-range
    /// config.
    pub fn normalize(&mut self) {
        if !self.program_speed.is_finite() {
            self.program_speed = DEFAULT_SPEED;
        }
        self.program_speed = self.program_speed.clamp(SPEED_MIN, SPEED_MAX);
        self.body_brightness_pct = self.body_brightness_pct.min(100);
        self.star_brightness_pct = self.star_brightness_pct.min(100);
        self.schedule_blocks.truncate(MAX_SCHEDULE_BLOCKS);
        if self.schedule_blocks.is_empty() {
            self.schedule_blocks.push(ScheduleBlock::default());
        }
        for block in &mut self.schedule_blocks {
            if let Some(days) = &mut block.days {
                days.retain(|day| *day < 7);
            }
        }
    }

    fn from_raw(raw: RawConfig) -> Self {
        let defaults = Self::default();
        let schedule_blocks = match raw.schedule_blocks {
            Value::Null => defaults.schedule_blocks,
            Value::Array(items) => items
                .into_iter()
                .filter_map(|item| match serde_json::from_value::<ScheduleBlock>(item) {
                    Ok(block) => Some(block),
                    Err(e) => {
                        warn!("dropping malformed schedule block: {e}");
                        None
                    }
                })
                .collect(),
            _ => {
                warn!("schedule_blocks is not an array, using default schedule");
                defaults.schedule_blocks
            }
        };
        Self {
            mode: field_or(raw.mode, "mode", defaults.mode),
            program_id: field_or(raw.program_id, "program_id", defaults.program_id),
            program_speed: field_or(raw.program_speed, "program_speed", defaults.program_speed),
            body_brightness_pct: field_or(
                raw.body_brightness_pct,
                "body_brightness_pct",
                defaults.body_brightness_pct,
            ),
            star_brightness_pct: field_or(
                raw.star_brightness_pct,
                "star_brightness_pct",
                defaults.star_brightness_pct,
            ),
            schedule_blocks,
            countdown_until: field_or(raw.countdown_until, "countdown_until", None),
        }
    }
}

/// Untyped first parse stage; lets one bad field default without taking the
/// rest of the document down with it.
#[derive(Deserialize, Default)]
#[serde(default)]
struct RawConfig {
    mode: Value,
    program_id: Value,
    program_speed: Value,
    body_brightness_pct: Value,
    star_brightness_pct: Value,
    schedule_blocks: Value,
    countdown_until: Value,
}

fn field_or<T: serde::de::DeserializeOwned>(value: Value, name: &str, default: T) -> T {
    if value.is_null() {
        return default;
    }
    match serde_json::from_value(value) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!("config field {name} malformed, using default: {e}");
            default
        }
    }
}

/// Value-typed config mutation. One variant per field group; applying a
/// patch can never fail, invalid values are clamped by normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigPatch {
    SetMode(Mode),
    SetProgram { id: String, speed: Option<f64> },
    SetSpeed(f64),
    AdjustSpeed { delta: f64 },
    SetBrightness { body_pct: Option<u8>, star_pct: Option<u8> },
    ReplaceSchedule(Vec<ScheduleBlock>),
    SetCountdown(NaiveDateTime),
    ClearCountdown,
}

impl ConfigPatch {
    pub fn apply(&self, config: &mut AppConfig) {
        match self {
            Self::SetMode(mode) => config.mode = *mode,
            Self::SetProgram { id, speed } => {
                config.program_id = id.clone();
                if let Some(speed) = speed {
                    config.program_speed = *speed;
                }
            }
            Self::SetSpeed(speed) => config.program_speed = *speed,
            Self::AdjustSpeed { delta } => config.program_speed += delta,
            Self::SetBrightness { body_pct, star_pct } => {
                if let Some(pct) = body_pct {
                    config.body_brightness_pct = *pct;
                }
                if let Some(pct) = star_pct {
                    config.star_brightness_pct = *pct;
                }
            }
            Self::ReplaceSchedule(blocks) => config.schedule_blocks = blocks.clone(),
            Self::SetCountdown(until) => config.countdown_until = Some(*until),
            Self::ClearCountdown => config.countdown_until = None,
        }
    }
}

/// Owns the config path and the current in-memory value.
pub struct ConfigStore {
    path: PathBuf,
    current: Mutex<AppConfig>,
}

impl ConfigStore {
    /// Load the config at `path`, or start from defaults when the file is
    /// missing or damaged. Never fails; the first successful update creates
    /// the file.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let config = load_or_default(&path);
        Self {
            path,
            current: Mutex::new(config),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> AppConfig {
        self.current.lock().clone()
    }

    /// Apply a patch: clone, patch, normalize, persist, swap. On a persist
    /// failure the in-memory config is left untouched and the error is
    /// returned.
    pub fn update(&self, patch: ConfigPatch) -> Result<AppConfig, ConfigError> {
        let mut current = self.current.lock();
        let mut next = current.clone();
        patch.apply(&mut next);
        next.normalize();
        self.persist(&next)?;
        *current = next.clone();
        Ok(next)
    }

    fn persist(&self, config: &AppConfig) -> Result<(), ConfigError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).map_err(|source| ConfigError::Persist {
                    path: dir.to_path_buf(),
                    source,
                })?;
            }
        }
        let mut data = serde_json::to_vec_pretty(config)?;
        data.push(b'\n');
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &data).map_err(|source| ConfigError::Persist {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| ConfigError::Persist {
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }
}

fn load_or_default(path: &Path) -> AppConfig {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no config file, starting from defaults");
            return AppConfig::default();
        }
        Err(e) => {
            warn!(path = %path.display(), "config unreadable, using defaults: {e}");
            return AppConfig::default();
        }
    };
    let mut config = match serde_json::from_str::<RawConfig>(&text) {
        Ok(raw) => AppConfig::from_raw(raw),
        Err(e) => {
            warn!(path = %path.display(), "config is not valid JSON, using defaults: {e}");
            AppConfig::default()
        }
    };
    config.normalize();
    config
}

mod hhmm {
    //! `"HH:MM"` wire format for schedule times. Accepts a single-digit
    //! hour on input, always writes two digits.

    use chrono::NaiveTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format("%H:%M"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&text, "%H:%M")
            .map_err(|_| de::Error::custom(format!("invalid HH:MM time: {text:?}")))
    }
}
