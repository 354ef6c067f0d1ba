//! Long-running driver simulations against the critter rig's clips

use puppet_idle::{
    Behavior, BehaviorState, ExtendedPhase, IdleConfig, IdleDriver, TimerRange, FACE_TRACK,
    GAZE_TRACK, PRIMARY_TRACK,
};
use puppet_rig::{AnimationState, AnimationTracks, Skeleton, SkeletonData};

const CRITTER: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../assets/rigs/critter.ron"
));

const DT: f32 = 1.0 / 30.0;

fn rig() -> (Skeleton, AnimationState) {
    let data = SkeletonData::from_ron_str(CRITTER).unwrap();
    (Skeleton::new(data.clone()), AnimationState::new(data))
}

/// Episodes pushed far out so only overlays run.
fn overlays_only() -> IdleConfig {
    IdleConfig {
        episode: TimerRange::new(1.0e6, 1.0e6),
        ..Default::default()
    }
}

#[test]
fn test_blink_rate_matches_range_mean() {
    let (_, mut tracks) = rig();
    let mut driver = IdleDriver::with_seed(overlays_only(), 1234);

    let seconds = 600.0;
    let frames = (seconds / DT) as usize;
    for _ in 0..frames {
        driver.update(DT, &mut tracks);
    }

    let expected = seconds / driver.config().blink.mean();
    let fired = driver.counters().blinks as f32;
    assert!(
        (fired - expected).abs() < expected * 0.15,
        "{} blinks, expected about {}",
        fired,
        expected
    );
    // Overlays are shorter than the minimum gap, so none is ever skipped
    assert_eq!(driver.counters().skipped, 0);
}

#[test]
fn test_blinks_never_overlap() {
    let (_, mut tracks) = rig();
    let mut driver = IdleDriver::with_seed(overlays_only(), 99);
    let mut last_blink = None;

    for _ in 0..(120.0 / DT) as usize {
        let before = driver.counters().blinks;
        let busy = tracks.is_busy(FACE_TRACK);
        driver.update(DT, &mut tracks);
        if driver.counters().blinks > before {
            // The previous blink had finished before this one was queued
            assert!(!busy);
            let entry = tracks.current(FACE_TRACK).map(|e| e.id);
            assert_ne!(entry, last_blink);
            last_blink = entry;
        }
    }
    assert!(driver.counters().blinks > 10);
}

#[test]
fn test_glance_episode_returns_to_idle_loop() {
    let (_, mut tracks) = rig();
    let mut driver = IdleDriver::with_seed(overlays_only(), 5);
    driver.update(DT, &mut tracks);
    assert!(driver.force_behavior(Behavior::Glance, &mut tracks));
    assert_eq!(
        tracks.current(PRIMARY_TRACK).unwrap().animation,
        "Idle/LookAround"
    );
    assert!(tracks.current(GAZE_TRACK).is_none());

    let mut frames = 0;
    while !driver.state().is_idle() && frames < 200 {
        driver.update(DT, &mut tracks);
        // No glances while the episode owns the gaze
        assert_eq!(driver.counters().glances, 0);
        frames += 1;
    }
    assert!(driver.state().is_idle());
    // 3 s clip at 30 fps
    assert!((89..=92).contains(&frames), "took {} frames", frames);

    let current = tracks.current(PRIMARY_TRACK).unwrap();
    assert_eq!(current.animation, "Idle/Idle");
    assert!(current.looping);
    assert!(driver.glance_timer().elapsed < 0.001);
}

#[test]
fn test_extended_episode_runs_all_phases() {
    let (mut skeleton, mut tracks) = rig();
    let mut driver = IdleDriver::with_seed(overlays_only(), 77);
    driver.update(DT, &mut tracks);
    assert!(driver.force_behavior(Behavior::Extended, &mut tracks));

    let mut phases = vec![driver.state().name()];
    let mut hold_blink = None;
    let mut elapsed = 0.0;
    while !driver.state().is_idle() && elapsed < 60.0 {
        driver.update(DT, &mut tracks);
        tracks.apply(&mut skeleton);
        skeleton.update_world_transform();
        elapsed += DT;

        let name = driver.state().name();
        if phases.last() != Some(&name) {
            phases.push(name);
        }
        if let BehaviorState::ExtendedEpisode(ExtendedPhase::Hold { .. }) = driver.state() {
            // Blink scheduling is frozen during the hold
            let elapsed = driver.blink_timer().elapsed;
            assert_eq!(*hold_blink.get_or_insert(elapsed), elapsed);
        }
    }

    assert_eq!(
        phases,
        ["extended/enter", "extended/hold", "extended/exit", "idle"]
    );
    // 1 s prepare + 30..40 s hold + 1 s put-away
    assert!(elapsed > 31.5 && elapsed < 42.5, "episode took {}", elapsed);
    // At most 7 s between variations plus the 0.8 s clip itself
    assert!(driver.counters().variations >= 3);
    assert_eq!(tracks.current(PRIMARY_TRACK).unwrap().animation, "Idle/Idle");
}

#[test]
fn test_scheduled_episodes_eventually_happen() {
    let (_, mut tracks) = rig();
    let config = IdleConfig {
        episode: TimerRange::new(5.0, 6.0),
        ..Default::default()
    };
    let mut driver = IdleDriver::with_seed(config, 2024);
    for _ in 0..(30.0 / DT) as usize {
        driver.update(DT, &mut tracks);
    }
    assert!(driver.counters().episodes >= 1);
}
