//! Track-based animation state
//!
//! Each track plays one entry at a time and keeps a FIFO queue of entries
//! waiting for it to finish. Tracks are applied in index order, so higher
//! tracks (face and gaze overlays) override what the base track keys.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::data::SkeletonData;
use crate::skeleton::Skeleton;

/// Identifies one queued or playing entry across the state's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u64);

/// A clip scheduled on a track.
#[derive(Debug, Clone)]
pub struct TrackEntry {
    pub id: EntryId,
    pub animation: String,
    pub duration: f32,
    pub looping: bool,
    /// Seconds left before the entry starts advancing
    pub delay: f32,
    /// Seconds the entry has been playing
    pub track_time: f32,
    /// Track time at which a looping entry yields to its queue
    pub handover_at: Option<f32>,
}

impl TrackEntry {
    /// True once the clip has played through at least once.
    pub fn is_complete(&self) -> bool {
        self.delay <= 0.0 && self.track_time >= self.duration
    }

    /// Clip-local time, wrapped for looping entries.
    pub fn animation_time(&self) -> f32 {
        if self.looping && self.duration > 0.0 {
            self.track_time % self.duration
        } else {
            self.track_time.min(self.duration)
        }
    }

    /// Seconds until the next loop boundary (or the clip end for one-shots).
    pub fn time_to_loop_boundary(&self) -> f32 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        if self.looping {
            self.duration - self.track_time.rem_euclid(self.duration)
        } else {
            (self.duration - self.track_time).max(0.0)
        }
    }
}

/// The track interface the behavior driver is written against.
pub trait AnimationTracks {
    /// Replace whatever plays on `track`, dropping its queue.
    /// Returns `None` when the animation does not exist.
    fn set_animation(&mut self, track: usize, name: &str, looping: bool) -> Option<EntryId>;

    /// Queue after the current entry, or start after `delay` if the track is idle.
    fn add_animation(
        &mut self,
        track: usize,
        name: &str,
        looping: bool,
        delay: f32,
    ) -> Option<EntryId>;

    fn clear_track(&mut self, track: usize);

    fn current(&self, track: usize) -> Option<&TrackEntry>;

    /// True if the entry finished playing or was replaced.
    fn is_entry_complete(&self, track: usize, id: EntryId) -> bool;

    fn animation_duration(&self, name: &str) -> Option<f32>;

    fn update(&mut self, delta: f32);

    /// Something is delayed, playing, or queued on the track.
    fn is_busy(&self, track: usize) -> bool {
        self.current(track).is_some_and(|e| !e.is_complete())
    }
}

#[derive(Debug, Clone, Default)]
struct Track {
    current: Option<TrackEntry>,
    queue: VecDeque<TrackEntry>,
}

/// Animation state over a skeleton's clips.
#[derive(Debug, Clone)]
pub struct AnimationState {
    data: Arc<SkeletonData>,
    tracks: Vec<Track>,
    next_id: u64,
}

impl AnimationState {
    pub fn new(data: Arc<SkeletonData>) -> Self {
        Self {
            data,
            tracks: Vec::new(),
            next_id: 0,
        }
    }

    pub fn data(&self) -> &Arc<SkeletonData> {
        &self.data
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    fn track_mut(&mut self, index: usize) -> &mut Track {
        if self.tracks.len() <= index {
            self.tracks.resize_with(index + 1, Track::default);
        }
        &mut self.tracks[index]
    }

    fn make_entry(&mut self, name: &str, looping: bool, delay: f32) -> Option<TrackEntry> {
        let Some(clip) = self.data.find_animation(name) else {
            log::warn!(
                "Animation '{}' not found in skeleton '{}'",
                name,
                self.data.name
            );
            return None;
        };
        let duration = clip.duration;
        self.next_id += 1;
        Some(TrackEntry {
            id: EntryId(self.next_id),
            animation: name.to_string(),
            duration,
            looping,
            delay: delay.max(0.0),
            track_time: 0.0,
            handover_at: None,
        })
    }

    /// Pose the skeleton from every track's current entry.
    ///
    /// Bones are reset to setup first so keys never accumulate.
    pub fn apply(&self, skeleton: &mut Skeleton) {
        skeleton.set_bones_to_setup_pose();
        for track in &self.tracks {
            let Some(entry) = &track.current else {
                continue;
            };
            if entry.delay > 0.0 {
                continue;
            }
            if let Some(clip) = self.data.find_animation(&entry.animation) {
                clip.apply(skeleton, entry.animation_time());
            }
        }
    }
}

impl AnimationTracks for AnimationState {
    fn set_animation(&mut self, track: usize, name: &str, looping: bool) -> Option<EntryId> {
        let entry = self.make_entry(name, looping, 0.0)?;
        let id = entry.id;
        let t = self.track_mut(track);
        t.queue.clear();
        t.current = Some(entry);
        Some(id)
    }

    fn add_animation(
        &mut self,
        track: usize,
        name: &str,
        looping: bool,
        delay: f32,
    ) -> Option<EntryId> {
        let entry = self.make_entry(name, looping, delay)?;
        let id = entry.id;
        let t = self.track_mut(track);
        let idle = match &t.current {
            None => true,
            Some(cur) => t.queue.is_empty() && !cur.looping && cur.is_complete(),
        };
        if idle {
            t.current = Some(entry);
        } else {
            // A loop yields at the end of the iteration it is in when
            // something first queues behind it.
            if let Some(cur) = t.current.as_mut().filter(|c| c.looping) {
                if cur.handover_at.is_none() {
                    cur.handover_at = Some(cur.track_time + cur.time_to_loop_boundary());
                }
            }
            t.queue.push_back(entry);
        }
        Some(id)
    }

    fn clear_track(&mut self, track: usize) {
        if let Some(t) = self.tracks.get_mut(track) {
            t.current = None;
            t.queue.clear();
        }
    }

    fn current(&self, track: usize) -> Option<&TrackEntry> {
        self.tracks.get(track).and_then(|t| t.current.as_ref())
    }

    fn is_entry_complete(&self, track: usize, id: EntryId) -> bool {
        let Some(t) = self.tracks.get(track) else {
            return true;
        };
        if let Some(cur) = t.current.as_ref().filter(|c| c.id == id) {
            return cur.is_complete();
        }
        !t.queue.iter().any(|e| e.id == id)
    }

    fn animation_duration(&self, name: &str) -> Option<f32> {
        self.data.find_animation(name).map(|c| c.duration)
    }

    fn is_busy(&self, track: usize) -> bool {
        self.tracks.get(track).is_some_and(|t| {
            !t.queue.is_empty() || t.current.as_ref().is_some_and(|e| !e.is_complete())
        })
    }

    fn update(&mut self, delta: f32) {
        for t in &mut self.tracks {
            let Some(cur) = t.current.as_mut() else {
                continue;
            };

            let mut step = delta;
            if cur.delay > 0.0 {
                let spent = cur.delay.min(step);
                cur.delay -= spent;
                step -= spent;
            }
            cur.track_time += step;

            // Hand over to queued entries, carrying leftover time forward.
            while let Some(cur) = t.current.as_ref() {
                if t.queue.is_empty() || cur.delay > 0.0 {
                    break;
                }
                let overflow = if cur.looping {
                    let end = cur.handover_at.unwrap_or(cur.duration);
                    if cur.track_time < end {
                        break;
                    }
                    cur.track_time - end
                } else {
                    if cur.track_time < cur.duration {
                        break;
                    }
                    cur.track_time - cur.duration
                };
                let Some(mut next) = t.queue.pop_front() else {
                    break;
                };
                let spent = next.delay.min(overflow);
                next.delay -= spent;
                next.track_time = overflow - spent;
                t.current = Some(next);
            }
        }
    }
}
