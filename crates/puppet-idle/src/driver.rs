//! Idle behavior driver
//!
//! A frame-stepped state machine over [`AnimationTracks`]. The base loop
//! plays on the primary track; blinks and glances are one-shots on their own
//! overlay tracks; episodes take over the primary track for a while and then
//! hand it back to the loop. Every transition is a hard cut.

use puppet_rig::AnimationTracks;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::config::{IdleConfig, TimerRange, FACE_TRACK, GAZE_TRACK, PRIMARY_TRACK};
use crate::rng::IdleRng;
use crate::state::{Behavior, BehaviorState, ExtendedPhase};

/// Accumulator against a randomly drawn threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Timer {
    pub elapsed: f32,
    pub next_fire: f32,
}

impl Timer {
    fn armed(rng: &mut impl IdleRng, range: TimerRange) -> Self {
        Self {
            elapsed: 0.0,
            next_fire: rng.draw(range),
        }
    }

    /// Returns true once the accumulator reaches the threshold.
    fn advance(&mut self, dt: f32) -> bool {
        self.elapsed += dt;
        self.elapsed >= self.next_fire
    }

    fn rearm(&mut self, rng: &mut impl IdleRng, range: TimerRange) {
        *self = Self::armed(rng, range);
    }
}

/// Running totals, mostly for diagnostics and tests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdleCounters {
    pub blinks: u32,
    pub glances: u32,
    /// Overlay fires skipped because the track was still busy
    pub skipped: u32,
    pub episodes: u32,
    pub variations: u32,
}

pub struct IdleDriver<R = Xoshiro256PlusPlus> {
    config: IdleConfig,
    rng: R,
    state: BehaviorState,
    blink: Timer,
    glance: Timer,
    episode: Timer,
    started: bool,
    counters: IdleCounters,
}

impl IdleDriver<Xoshiro256PlusPlus> {
    pub fn with_seed(config: IdleConfig, seed: u64) -> Self {
        Self::new(config, Xoshiro256PlusPlus::seed_from_u64(seed))
    }

    /// Seeded from the thread RNG.
    pub fn from_entropy(config: IdleConfig) -> Self {
        Self::with_seed(config, rand::random())
    }
}

impl<R: IdleRng> IdleDriver<R> {
    pub fn new(config: IdleConfig, mut rng: R) -> Self {
        let config = config.sanitized();
        let blink = Timer::armed(&mut rng, config.blink);
        let glance = Timer::armed(&mut rng, config.glance);
        let episode = Timer::armed(&mut rng, config.episode);
        Self {
            config,
            rng,
            state: BehaviorState::Idle,
            blink,
            glance,
            episode,
            started: false,
            counters: IdleCounters::default(),
        }
    }

    /// Put the base loop on the primary track.
    pub fn start(&mut self, tracks: &mut dyn AnimationTracks) {
        if tracks
            .set_animation(PRIMARY_TRACK, &self.config.clips.idle, true)
            .is_none()
        {
            log::warn!("Idle loop '{}' is missing", self.config.clips.idle);
        }
        self.state = BehaviorState::Idle;
        self.started = true;
    }

    pub fn state(&self) -> &BehaviorState {
        &self.state
    }

    pub fn config(&self) -> &IdleConfig {
        &self.config
    }

    pub fn counters(&self) -> IdleCounters {
        self.counters
    }

    pub fn blink_timer(&self) -> Timer {
        self.blink
    }

    pub fn glance_timer(&self) -> Timer {
        self.glance
    }

    pub fn episode_timer(&self) -> Timer {
        self.episode
    }

    pub fn set_blink_range(&mut self, min: f32, max: f32) {
        self.config.blink = TimerRange::new(min, max).sanitized();
    }

    pub fn set_glance_range(&mut self, min: f32, max: f32) {
        self.config.glance = TimerRange::new(min, max).sanitized();
    }

    pub fn set_episode_range(&mut self, min: f32, max: f32) {
        self.config.episode = TimerRange::new(min, max).sanitized();
    }

    pub fn set_snap_to_boundary(&mut self, snap: bool) {
        self.config.snap_to_boundary = snap;
    }

    /// Advance the tracks by `dt` seconds, then run the schedule.
    pub fn update(&mut self, dt: f32, tracks: &mut dyn AnimationTracks) {
        if !self.started {
            self.start(tracks);
        }
        tracks.update(dt);

        let active = self.state.active_timers();
        if active.blink && self.blink.advance(dt) {
            self.fire_blink(tracks);
        }
        if active.glance && self.glance.advance(dt) {
            self.fire_glance(tracks);
        }

        match self.state {
            BehaviorState::Idle => {
                if active.episode && self.episode.advance(dt) {
                    self.episode.rearm(&mut self.rng, self.config.episode);
                    let behavior = if self.rng.next_f32() < self.config.glance_episode_weight {
                        Behavior::Glance
                    } else {
                        Behavior::Extended
                    };
                    self.begin(behavior, tracks);
                }
            }
            BehaviorState::GlanceEpisode { entry } => {
                if tracks.is_entry_complete(PRIMARY_TRACK, entry) {
                    self.return_to_idle();
                }
            }
            BehaviorState::ExtendedEpisode(phase) => self.step_extended(phase, dt, tracks),
        }
    }

    /// Interrupt Idle with an episode. Returns false (and logs) when
    /// something other than Idle is running or the clips are missing.
    pub fn force_behavior(&mut self, behavior: Behavior, tracks: &mut dyn AnimationTracks) -> bool {
        if !self.state.is_idle() {
            log::warn!(
                "Cannot force '{}' while in '{}'",
                behavior,
                self.state.name()
            );
            return false;
        }
        if !self.started {
            self.start(tracks);
        }
        self.episode.rearm(&mut self.rng, self.config.episode);
        self.begin(behavior, tracks)
    }

    /// Drop whatever episode is running and restart the base loop.
    pub fn force_idle(&mut self, tracks: &mut dyn AnimationTracks) {
        log::debug!("Forcing idle from '{}'", self.state.name());
        tracks.clear_track(GAZE_TRACK);
        self.start(tracks);
        self.episode.rearm(&mut self.rng, self.config.episode);
        self.glance.rearm(&mut self.rng, self.config.glance);
    }

    /// Seconds until the next idle-loop boundary. One-shot episode clips on
    /// the primary track are measured against the idle period instead.
    fn snap_delay(&self, tracks: &dyn AnimationTracks) -> f32 {
        if !self.config.snap_to_boundary {
            return 0.0;
        }
        let Some(current) = tracks.current(PRIMARY_TRACK) else {
            return 0.0;
        };
        if current.looping {
            return current.time_to_loop_boundary();
        }
        match tracks.animation_duration(&self.config.clips.idle) {
            Some(period) if period > 0.0 => period - current.track_time.rem_euclid(period),
            _ => 0.0,
        }
    }

    /// Queue a one-shot on an overlay track unless one is still playing.
    fn play_overlay(&mut self, track: usize, clip: &str, tracks: &mut dyn AnimationTracks) -> bool {
        if tracks.is_busy(track) {
            self.counters.skipped += 1;
            return false;
        }
        let delay = self.snap_delay(tracks);
        tracks.add_animation(track, clip, false, delay).is_some()
    }

    fn fire_blink(&mut self, tracks: &mut dyn AnimationTracks) {
        let clip = self.config.clips.blink.clone();
        if self.play_overlay(FACE_TRACK, &clip, tracks) {
            self.counters.blinks += 1;
        }
        self.blink.rearm(&mut self.rng, self.config.blink);
    }

    fn fire_glance(&mut self, tracks: &mut dyn AnimationTracks) {
        let looks = &self.config.clips.looks;
        if !looks.is_empty() {
            let clip = looks[self.rng.pick(looks.len())].clone();
            if self.play_overlay(GAZE_TRACK, &clip, tracks) {
                self.counters.glances += 1;
            }
        }
        self.glance.rearm(&mut self.rng, self.config.glance);
    }

    fn begin(&mut self, behavior: Behavior, tracks: &mut dyn AnimationTracks) -> bool {
        let clips = &self.config.clips;
        let (first, then) = match behavior {
            Behavior::Glance => (&clips.look_around, &clips.idle),
            Behavior::Extended => (&clips.prepare, &clips.hold),
        };
        // Episode clips own the gaze while they play
        tracks.clear_track(GAZE_TRACK);
        let Some(entry) = tracks.set_animation(PRIMARY_TRACK, first, false) else {
            log::warn!("Episode '{}' has no clip '{}', staying idle", behavior, first);
            tracks.set_animation(PRIMARY_TRACK, &clips.idle, true);
            return false;
        };
        tracks.add_animation(PRIMARY_TRACK, then, true, 0.0);

        self.state = match behavior {
            Behavior::Glance => BehaviorState::GlanceEpisode { entry },
            Behavior::Extended => BehaviorState::ExtendedEpisode(ExtendedPhase::Enter {
                entry,
                hold: self.rng.draw(self.config.hold),
            }),
        };
        self.counters.episodes += 1;
        log::debug!("Episode started: {}", self.state.name());
        true
    }

    fn step_extended(&mut self, phase: ExtendedPhase, dt: f32, tracks: &mut dyn AnimationTracks) {
        let next = match phase {
            ExtendedPhase::Enter { entry, hold } => {
                if !tracks.is_entry_complete(PRIMARY_TRACK, entry) {
                    return;
                }
                // The hold loop was queued behind the prepare clip
                ExtendedPhase::Hold {
                    remaining: hold,
                    until_variation: self.rng.draw(self.config.variation),
                    variation: None,
                }
            }
            ExtendedPhase::Hold {
                remaining,
                until_variation,
                variation,
            } => {
                let remaining = remaining - dt;
                if remaining <= 0.0 {
                    match self.exit_extended(tracks) {
                        Some(exit) => exit,
                        None => return,
                    }
                } else if let Some(id) = variation {
                    let done = tracks.is_entry_complete(PRIMARY_TRACK, id);
                    ExtendedPhase::Hold {
                        remaining,
                        until_variation,
                        variation: (!done).then_some(id),
                    }
                } else if until_variation - dt <= 0.0 {
                    let clips = &self.config.clips;
                    let id = tracks.set_animation(PRIMARY_TRACK, &clips.variation, false);
                    tracks.add_animation(PRIMARY_TRACK, &clips.hold, true, 0.0);
                    if id.is_some() {
                        self.counters.variations += 1;
                    }
                    ExtendedPhase::Hold {
                        remaining,
                        until_variation: self.rng.draw(self.config.variation),
                        variation: id,
                    }
                } else {
                    ExtendedPhase::Hold {
                        remaining,
                        until_variation: until_variation - dt,
                        variation: None,
                    }
                }
            }
            ExtendedPhase::Exit { entry } => {
                if tracks.is_entry_complete(PRIMARY_TRACK, entry) {
                    self.return_to_idle();
                }
                return;
            }
        };
        self.state = BehaviorState::ExtendedEpisode(next);
    }

    /// Start the put-away clip. Goes straight to Idle when it is missing.
    fn exit_extended(&mut self, tracks: &mut dyn AnimationTracks) -> Option<ExtendedPhase> {
        let clips = &self.config.clips;
        match tracks.set_animation(PRIMARY_TRACK, &clips.put_away, false) {
            Some(entry) => {
                tracks.add_animation(PRIMARY_TRACK, &clips.idle, true, 0.0);
                Some(ExtendedPhase::Exit { entry })
            }
            None => {
                log::warn!("Put-away clip '{}' is missing", clips.put_away);
                tracks.set_animation(PRIMARY_TRACK, &clips.idle, true);
                self.return_to_idle();
                None
            }
        }
    }

    fn return_to_idle(&mut self) {
        log::debug!("Episode '{}' finished", self.state.name());
        self.state = BehaviorState::Idle;
        self.glance.rearm(&mut self.rng, self.config.glance);
    }
}

impl<R> std::fmt::Debug for IdleDriver<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleDriver")
            .field("state", &self.state)
            .field("blink", &self.blink)
            .field("glance", &self.glance)
            .field("episode", &self.episode)
            .field("counters", &self.counters)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdleClips;
    use puppet_rig::{AnimationClip, AnimationState, SkeletonData};

    /// Every draw returns the same fraction.
    struct FixedRng(f32);

    impl IdleRng for FixedRng {
        fn next_f32(&mut self) -> f32 {
            self.0
        }
    }

    fn tracks() -> AnimationState {
        tracks_with_look_around(3.0)
    }

    fn tracks_with_look_around(seconds: f32) -> AnimationState {
        let clips = IdleClips::default();
        let mut anims = vec![
            AnimationClip::empty(clips.idle.as_str(), 40.0 / 30.0),
            AnimationClip::empty(clips.blink.as_str(), 0.2),
            AnimationClip::empty(clips.look_around.as_str(), seconds),
            AnimationClip::empty(clips.prepare.as_str(), 1.0),
            AnimationClip::empty(clips.hold.as_str(), 2.0),
            AnimationClip::empty(clips.variation.as_str(), 0.8),
            AnimationClip::empty(clips.put_away.as_str(), 1.0),
        ];
        anims.extend(clips.looks.iter().map(|l| AnimationClip::empty(l.as_str(), 0.8)));
        AnimationState::new(SkeletonData::new("t", vec![], vec![], vec![], anims).unwrap())
    }

    #[test]
    fn test_timer_fires_at_threshold() {
        let mut t = Timer {
            elapsed: 0.0,
            next_fire: 3.0,
        };
        assert!(!t.advance(1.0));
        assert!(!t.advance(1.0));
        assert!(t.advance(1.0));
    }

    #[test]
    fn test_fixed_draw_of_three_blinks_three_times_in_ten_seconds() {
        // 2 + 0.25 * (6 - 2) = 3
        let mut driver = IdleDriver::new(IdleConfig::default(), FixedRng(0.25));
        let mut tracks = tracks();
        assert_eq!(driver.blink_timer().next_fire, 3.0);

        let mut fired_at = Vec::new();
        for second in 1..=10 {
            let before = driver.counters().blinks;
            driver.update(1.0, &mut tracks);
            if driver.counters().blinks > before {
                fired_at.push(second);
            }
        }
        assert_eq!(fired_at, vec![3, 6, 9]);
        assert_eq!(driver.counters().skipped, 0);
        assert!(driver.state().is_idle());
    }

    #[test]
    fn test_snap_delays_overlay_to_loop_boundary() {
        let mut driver = IdleDriver::new(IdleConfig::default(), FixedRng(0.25));
        let mut tracks = tracks();
        for _ in 0..3 {
            driver.update(1.0, &mut tracks);
        }
        // Idle is 4/3 s long; at t=3 the next boundary is 1 s away
        let blink = tracks.current(FACE_TRACK).unwrap();
        assert!((blink.delay - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_blink_during_look_around_snaps_to_idle_period() {
        let config = IdleConfig {
            blink: TimerRange::new(3.0, 3.0),
            glance: TimerRange::new(60.0, 60.0),
            episode: TimerRange::new(60.0, 60.0),
            ..Default::default()
        };
        let mut driver = IdleDriver::new(config, FixedRng(0.0));
        let mut tracks = tracks_with_look_around(8.0);
        assert!(driver.force_behavior(Behavior::Glance, &mut tracks));
        for _ in 0..3 {
            driver.update(1.0, &mut tracks);
        }
        assert!(matches!(driver.state(), BehaviorState::GlanceEpisode { .. }));
        let blink = tracks.current(FACE_TRACK).unwrap();
        assert!(blink.delay <= 40.0 / 30.0);
    }

    #[test]
    fn test_hold_length_drawn_when_episode_begins() {
        let mut driver = IdleDriver::new(IdleConfig::default(), FixedRng(0.5));
        let mut tracks = tracks();
        assert!(driver.force_behavior(Behavior::Extended, &mut tracks));
        let hold = match driver.state() {
            BehaviorState::ExtendedEpisode(ExtendedPhase::Enter { hold, .. }) => *hold,
            other => panic!("unexpected state {:?}", other),
        };
        let range = driver.config().hold;
        assert!(hold >= range.min && hold <= range.max);

        // Prepare is 1 s long
        driver.update(1.1, &mut tracks);
        match driver.state() {
            BehaviorState::ExtendedEpisode(ExtendedPhase::Hold { remaining, .. }) => {
                assert_eq!(*remaining, hold);
            }
            other => panic!("unexpected state {:?}", other),
        }
    }

    #[test]
    fn test_without_snap_overlay_starts_immediately() {
        let mut driver = IdleDriver::new(IdleConfig::default(), FixedRng(0.25));
        driver.set_snap_to_boundary(false);
        let mut tracks = tracks();
        for _ in 0..3 {
            driver.update(1.0, &mut tracks);
        }
        assert_eq!(tracks.current(FACE_TRACK).unwrap().delay, 0.0);
    }

    #[test]
    fn test_busy_face_track_skips_blink() {
        let mut driver = IdleDriver::new(IdleConfig::default(), FixedRng(0.25));
        let mut tracks = tracks();
        driver.update(1.0, &mut tracks);
        driver.update(1.0, &mut tracks);
        // Something else still owns the face track when the blink fires
        tracks.set_animation(FACE_TRACK, "Idle/LookAround", false);
        driver.update(1.0, &mut tracks);
        assert_eq!(driver.counters().blinks, 0);
        assert_eq!(driver.counters().skipped, 1);
        // The timer re-arms regardless
        assert_eq!(driver.blink_timer().elapsed, 0.0);
    }

    #[test]
    fn test_episode_weight_picks_glance() {
        let config = IdleConfig {
            episode: TimerRange::new(1.0, 1.0),
            ..Default::default()
        };
        // 0.25 < 0.7
        let mut driver = IdleDriver::new(config, FixedRng(0.25));
        let mut tracks = tracks();
        driver.update(1.0, &mut tracks);
        assert!(matches!(driver.state(), BehaviorState::GlanceEpisode { .. }));
        assert_eq!(tracks.current(PRIMARY_TRACK).unwrap().animation, "Idle/LookAround");
    }

    #[test]
    fn test_episode_weight_picks_extended() {
        let config = IdleConfig {
            episode: TimerRange::new(1.0, 1.0),
            ..Default::default()
        };
        let mut driver = IdleDriver::new(config, FixedRng(0.9));
        let mut tracks = tracks();
        driver.update(1.0, &mut tracks);
        assert!(matches!(
            driver.state(),
            BehaviorState::ExtendedEpisode(ExtendedPhase::Enter { .. })
        ));
    }

    #[test]
    fn test_force_behavior_outside_idle_is_noop() {
        let mut driver = IdleDriver::with_seed(IdleConfig::default(), 1);
        let mut tracks = tracks();
        assert!(driver.force_behavior(Behavior::Extended, &mut tracks));
        assert!(!driver.force_behavior(Behavior::Glance, &mut tracks));
        assert_eq!(driver.state().behavior(), Some(Behavior::Extended));
        assert_eq!(driver.counters().episodes, 1);
    }

    #[test]
    fn test_force_idle_restarts_loop() {
        let mut driver = IdleDriver::with_seed(IdleConfig::default(), 1);
        let mut tracks = tracks();
        driver.force_behavior(Behavior::Extended, &mut tracks);
        driver.update(0.5, &mut tracks);
        driver.force_idle(&mut tracks);
        assert!(driver.state().is_idle());
        let current = tracks.current(PRIMARY_TRACK).unwrap();
        assert_eq!(current.animation, "Idle/Idle");
        assert!(current.looping);
    }

    #[test]
    fn test_missing_episode_clip_stays_idle() {
        let mut config = IdleConfig::default();
        config.clips.look_around = "Nope".to_string();
        let mut driver = IdleDriver::with_seed(config, 3);
        let mut tracks = tracks();
        assert!(!driver.force_behavior(Behavior::Glance, &mut tracks));
        assert!(driver.state().is_idle());
        assert_eq!(tracks.current(PRIMARY_TRACK).unwrap().animation, "Idle/Idle");
    }
}
