//! Idle behavior driver for Puppet characters
//!
//! Schedules blinks and glances on overlay tracks and occasionally runs a
//! longer episode on the primary track:
//! - [`driver`]: the frame-stepped state machine
//! - [`state`]: behavior states and their timer table
//! - [`config`]: timer ranges, clip names, track indices
//! - [`rng`]: random source abstraction

pub mod config;
pub mod driver;
pub mod rng;
pub mod state;

pub use config::{IdleClips, IdleConfig, TimerRange, FACE_TRACK, GAZE_TRACK, PRIMARY_TRACK};
pub use driver::{IdleCounters, IdleDriver, Timer};
pub use rng::IdleRng;
pub use state::{ActiveTimers, Behavior, BehaviorState, ExtendedPhase};
