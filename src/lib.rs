// APA102 Christmas tree controller - Shared Library
// Config store, schedule evaluation, animation programs, reconcile loop

pub mod clock;
pub mod config;
pub mod controller;
#[cfg(feature = "dbus")]
pub mod dbus;
pub mod program;
pub mod runner;
pub mod schedule;

pub use clock::{Clock, SystemClock};
pub use config::{AppConfig, ConfigPatch, ConfigStore, Mode, ScheduleBlock};
pub use controller::{desired_on, DriverFactory, RuntimeState, TreeController};
pub use program::{Program, DEFAULT_PROGRAM_ID, PROGRAMS};
pub use runner::ProgramRunner;
pub use schedule::{is_within_block, is_within_schedule};
