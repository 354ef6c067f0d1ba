//! Keyframed animation clips
//!
//! Clips are applied as hard cuts: a clip sets every property it keys and
//! leaves the rest alone. There is no mixing between clips.

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::skeleton::Skeleton;

/// Bone property animated by a `BoneTimeline`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoneProperty {
    Rotate,
    TranslateX,
    TranslateY,
    ScaleX,
    ScaleY,
}

/// Linear keys `(time, value)` for one bone property.
///
/// Rotation and translation values are offsets from the setup pose; scale
/// values multiply the setup scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneTimeline {
    pub bone: String,
    pub property: BoneProperty,
    pub keys: Vec<(f32, f32)>,
}

/// Slot keys. Attachment keys are stepped; color keys are linear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SlotTimeline {
    Attachment {
        slot: String,
        keys: Vec<(f32, Option<String>)>,
    },
    Color {
        slot: String,
        keys: Vec<(f32, Color)>,
    },
}

/// A named clip with a fixed duration in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    #[serde(default)]
    pub bones: Vec<BoneTimeline>,
    #[serde(default)]
    pub slots: Vec<SlotTimeline>,
}

impl AnimationClip {
    /// A clip with no timelines, useful for timing-only tracks.
    pub fn empty(name: impl Into<String>, duration: f32) -> Self {
        Self {
            name: name.into(),
            duration,
            bones: Vec::new(),
            slots: Vec::new(),
        }
    }

    /// Pose `skeleton` at `time` seconds into the clip.
    pub fn apply(&self, skeleton: &mut Skeleton, time: f32) {
        for timeline in &self.bones {
            let Some(index) = skeleton.data().find_bone(&timeline.bone) else {
                continue;
            };
            let Some(value) = sample_linear(&timeline.keys, time) else {
                continue;
            };
            let setup = &skeleton.data().bones[index];
            let (sx, sy, rot, x, y) = (setup.scale_x, setup.scale_y, setup.rotation, setup.x, setup.y);
            let Some(bone) = skeleton.bone_mut(index) else {
                continue;
            };
            match timeline.property {
                BoneProperty::Rotate => bone.local.rotation = rot + value,
                BoneProperty::TranslateX => bone.local.x = x + value,
                BoneProperty::TranslateY => bone.local.y = y + value,
                BoneProperty::ScaleX => bone.local.scale_x = sx * value,
                BoneProperty::ScaleY => bone.local.scale_y = sy * value,
            }
        }

        for timeline in &self.slots {
            match timeline {
                SlotTimeline::Attachment { slot, keys } => {
                    if let Some(name) = sample_step(keys, time) {
                        skeleton.set_attachment(slot, name.as_deref());
                    }
                }
                SlotTimeline::Color { slot, keys } => {
                    let Some(index) = skeleton.data().find_slot(slot) else {
                        continue;
                    };
                    if let Some(color) = sample_color(keys, time) {
                        if let Some(s) = skeleton.slot_mut(index) {
                            s.color = color;
                        }
                    }
                }
            }
        }
    }
}

fn segment<T>(keys: &[(f32, T)], time: f32) -> Option<(usize, f32)> {
    let first = keys.first()?;
    if time <= first.0 {
        return Some((0, 0.0));
    }
    let next = keys.iter().position(|(t, _)| *t > time);
    match next {
        None => Some((keys.len() - 1, 0.0)),
        Some(n) => {
            let (t0, t1) = (keys[n - 1].0, keys[n].0);
            Some((n - 1, (time - t0) / (t1 - t0)))
        }
    }
}

fn sample_linear(keys: &[(f32, f32)], time: f32) -> Option<f32> {
    let (i, alpha) = segment(keys, time)?;
    let a = keys[i].1;
    Some(match keys.get(i + 1) {
        Some((_, b)) if alpha > 0.0 => a + (b - a) * alpha,
        _ => a,
    })
}

fn sample_color(keys: &[(f32, Color)], time: f32) -> Option<Color> {
    let (i, alpha) = segment(keys, time)?;
    let a = keys[i].1;
    Some(match keys.get(i + 1) {
        Some((_, b)) if alpha > 0.0 => a.lerp(b, alpha),
        _ => a,
    })
}

fn sample_step<T>(keys: &[(f32, T)], time: f32) -> Option<&T> {
    if keys.first()?.0 > time {
        return None;
    }
    let (i, _) = segment(keys, time)?;
    Some(&keys[i].1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_linear_interpolates() {
        let keys = [(0.0, 0.0), (1.0, 10.0), (2.0, 0.0)];
        assert_eq!(sample_linear(&keys, 0.5), Some(5.0));
        assert_eq!(sample_linear(&keys, 1.5), Some(5.0));
        assert_eq!(sample_linear(&keys, 3.0), Some(0.0));
        assert_eq!(sample_linear(&keys, -1.0), Some(0.0));
        assert_eq!(sample_linear(&[], 1.0), None);
    }

    #[test]
    fn test_sample_step_holds_until_next_key() {
        let keys = [(0.1, "closed"), (0.2, "open")];
        assert_eq!(sample_step(&keys, 0.0), None);
        assert_eq!(sample_step(&keys, 0.15), Some(&"closed"));
        assert_eq!(sample_step(&keys, 0.2), Some(&"open"));
        assert_eq!(sample_step(&keys, 5.0), Some(&"open"));
    }
}
