//! Idle driver tuning

use serde::{Deserialize, Serialize};

/// Track holding the base loop and episode clips.
pub const PRIMARY_TRACK: usize = 0;
/// Face overlay track (blinks).
pub const FACE_TRACK: usize = 1;
/// Gaze overlay track (glances).
pub const GAZE_TRACK: usize = 2;

/// Half-open `[min, max)` range in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimerRange {
    pub min: f32,
    pub max: f32,
}

impl TimerRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Non-negative bounds with `min <= max`.
    pub fn sanitized(self) -> Self {
        let min = self.min.max(0.0);
        let max = self.max.max(0.0);
        if max < min {
            log::warn!("Timer range [{}, {}) is inverted, swapping", self.min, self.max);
            Self { min: max, max: min }
        } else {
            Self { min, max }
        }
    }

    pub fn mean(&self) -> f32 {
        (self.min + self.max) * 0.5
    }
}

/// Clip names the driver plays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleClips {
    pub idle: String,
    pub blink: String,
    /// Directional glances, one picked at random per fire
    pub looks: Vec<String>,
    pub look_around: String,
    pub prepare: String,
    pub hold: String,
    pub variation: String,
    pub put_away: String,
}

impl Default for IdleClips {
    fn default() -> Self {
        Self {
            idle: "Idle/Idle".to_string(),
            blink: "Eyes/Blink".to_string(),
            looks: vec![
                "Eyes/LookDirection/LookUp".to_string(),
                "Eyes/LookDirection/LookDown".to_string(),
                "Eyes/LookDirection/LookLeft".to_string(),
                "Eyes/LookDirection/LookRight".to_string(),
            ],
            look_around: "Idle/LookAround".to_string(),
            prepare: "Read/Prepare".to_string(),
            hold: "Read/Loop".to_string(),
            variation: "Read/PageTurn".to_string(),
            put_away: "Read/PutAway".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleConfig {
    pub blink: TimerRange,
    pub glance: TimerRange,
    /// Time spent in Idle before an episode starts
    pub episode: TimerRange,
    /// Length of the extended episode's hold loop
    pub hold: TimerRange,
    /// Gap between variation one-shots during the hold
    pub variation: TimerRange,
    /// Probability that an episode is a glance rather than an extended one
    pub glance_episode_weight: f32,
    /// Delay overlays until the primary clip's next loop boundary
    pub snap_to_boundary: bool,
    pub clips: IdleClips,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            blink: TimerRange::new(2.0, 6.0),
            glance: TimerRange::new(3.0, 8.0),
            episode: TimerRange::new(20.0, 45.0),
            hold: TimerRange::new(30.0, 40.0),
            variation: TimerRange::new(3.0, 7.0),
            glance_episode_weight: 0.7,
            snap_to_boundary: true,
            clips: IdleClips::default(),
        }
    }
}

impl IdleConfig {
    pub fn sanitized(mut self) -> Self {
        self.blink = self.blink.sanitized();
        self.glance = self.glance.sanitized();
        self.episode = self.episode.sanitized();
        self.hold = self.hold.sanitized();
        self.variation = self.variation.sanitized();
        self.glance_episode_weight = self.glance_episode_weight.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inverted_range_is_swapped() {
        let r = TimerRange::new(6.0, 2.0).sanitized();
        assert_eq!(r, TimerRange::new(2.0, 6.0));
        assert_eq!(r.mean(), 4.0);
    }

    #[test]
    fn test_negative_bounds_clamp() {
        assert_eq!(TimerRange::new(-1.0, 3.0).sanitized(), TimerRange::new(0.0, 3.0));
    }

    #[test]
    fn test_partial_ron_keeps_defaults() {
        let config: IdleConfig =
            ron::from_str("(blink: (min: 1.0, max: 2.0), snap_to_boundary: false)").unwrap();
        assert_eq!(config.blink, TimerRange::new(1.0, 2.0));
        assert!(!config.snap_to_boundary);
        assert_eq!(config.glance, TimerRange::new(3.0, 8.0));
        assert_eq!(config.clips.looks.len(), 4);
    }
}
