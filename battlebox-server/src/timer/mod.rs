//! Countdown Timers
//!
//! - `registry`: keyed countdowns with exactly-once completion
//! - `display`: what audience members see while a countdown runs

pub mod registry;
pub mod display;

pub use registry::{TimerRegistry, TimerSnapshot};
pub use display::{DisplayUpdate, Urgency, format_clock};
