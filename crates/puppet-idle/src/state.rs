//! Behavior states and the timers each one allows

use std::fmt;
use std::str::FromStr;

use puppet_rig::EntryId;

/// Episode an external caller can force from Idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Behavior {
    /// One look-around clip, then back to the idle loop
    Glance,
    /// Prepare, hold with variations, put away
    Extended,
}

impl FromStr for Behavior {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "glance" | "lookaround" | "look_around" => Ok(Self::Glance),
            "extended" | "read" | "reading" => Ok(Self::Extended),
            other => Err(format!("unknown behavior '{}'", other)),
        }
    }
}

impl fmt::Display for Behavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Glance => f.write_str("glance"),
            Self::Extended => f.write_str("extended"),
        }
    }
}

/// Sub-phase of the extended episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExtendedPhase {
    Enter {
        entry: EntryId,
        /// Hold length drawn when the episode began
        hold: f32,
    },
    Hold {
        /// Seconds left in the hold loop
        remaining: f32,
        /// Seconds until the next variation one-shot
        until_variation: f32,
        /// Variation currently playing, if any
        variation: Option<EntryId>,
    },
    Exit {
        entry: EntryId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum BehaviorState {
    #[default]
    Idle,
    GlanceEpisode {
        entry: EntryId,
    },
    ExtendedEpisode(ExtendedPhase),
}

/// Which scheduling timers advance in a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveTimers {
    pub blink: bool,
    pub glance: bool,
    pub episode: bool,
}

impl BehaviorState {
    pub fn active_timers(&self) -> ActiveTimers {
        match self {
            Self::Idle => ActiveTimers {
                blink: true,
                glance: true,
                episode: true,
            },
            Self::GlanceEpisode { .. } | Self::ExtendedEpisode(ExtendedPhase::Enter { .. }) => {
                ActiveTimers {
                    blink: true,
                    glance: false,
                    episode: false,
                }
            }
            Self::ExtendedEpisode(_) => ActiveTimers {
                blink: false,
                glance: false,
                episode: false,
            },
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn behavior(&self) -> Option<Behavior> {
        match self {
            Self::Idle => None,
            Self::GlanceEpisode { .. } => Some(Behavior::Glance),
            Self::ExtendedEpisode(_) => Some(Behavior::Extended),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::GlanceEpisode { .. } => "glance",
            Self::ExtendedEpisode(ExtendedPhase::Enter { .. }) => "extended/enter",
            Self::ExtendedEpisode(ExtendedPhase::Hold { .. }) => "extended/hold",
            Self::ExtendedEpisode(ExtendedPhase::Exit { .. }) => "extended/exit",
        }
    }
}
