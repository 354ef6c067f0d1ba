//! Runtime skeleton instance: posed bones, slots and draw order

use std::sync::Arc;

use glam::{Affine2, Vec2};

use crate::attachment::Attachment;
use crate::color::Color;
use crate::data::{SkeletonData, DEFAULT_SKIN};

/// Local transform of a posed bone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneTransform {
    pub x: f32,
    pub y: f32,
    /// Degrees
    pub rotation: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl BoneTransform {
    pub fn to_affine(&self) -> Affine2 {
        Affine2::from_scale_angle_translation(
            Vec2::new(self.scale_x, self.scale_y),
            self.rotation.to_radians(),
            Vec2::new(self.x, self.y),
        )
    }
}

/// A bone with its current local pose and derived world transform.
#[derive(Debug, Clone)]
pub struct Bone {
    pub local: BoneTransform,
    pub world: Affine2,
}

/// Runtime state of a slot.
#[derive(Debug, Clone)]
pub struct Slot {
    /// Index of the slot in the skeleton's slot list
    pub index: usize,
    pub name: String,
    pub bone: usize,
    pub color: Color,
    attachment: Option<Arc<Attachment>>,
}

impl Slot {
    pub fn attachment(&self) -> Option<&Arc<Attachment>> {
        self.attachment.as_ref()
    }

    pub fn attachment_name(&self) -> Option<&str> {
        self.attachment.as_deref().map(Attachment::name)
    }
}

/// Posed instance of a `SkeletonData`.
///
/// Owned by the caller. The renderer only reads it; the behavior driver and
/// cosmetic equip calls mutate it between frames.
#[derive(Debug, Clone)]
pub struct Skeleton {
    data: Arc<SkeletonData>,
    bones: Vec<Bone>,
    slots: Vec<Slot>,
    /// Slot indices in back-to-front paint order
    pub draw_order: Vec<usize>,
    skin: Option<String>,
    /// Skeleton-wide tint multiplied into every slot
    pub color: Color,
    pub x: f32,
    pub y: f32,
    pub scale_x: f32,
    pub scale_y: f32,
}

impl Skeleton {
    pub fn new(data: Arc<SkeletonData>) -> Self {
        let bones = data
            .bones
            .iter()
            .map(|b| Bone {
                local: BoneTransform {
                    x: b.x,
                    y: b.y,
                    rotation: b.rotation,
                    scale_x: b.scale_x,
                    scale_y: b.scale_y,
                },
                world: Affine2::IDENTITY,
            })
            .collect();
        let slots = data
            .slots
            .iter()
            .enumerate()
            .map(|(index, s)| Slot {
                index,
                name: s.name.clone(),
                bone: data.slot_bone(index),
                color: s.color,
                attachment: None,
            })
            .collect();
        let draw_order = (0..data.slots.len()).collect();

        let mut skeleton = Self {
            data,
            bones,
            slots,
            draw_order,
            skin: None,
            color: Color::WHITE,
            x: 0.0,
            y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
        };
        skeleton.set_slots_to_setup_pose();
        skeleton.update_world_transform();
        skeleton
    }

    pub fn data(&self) -> &Arc<SkeletonData> {
        &self.data
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone_mut(&mut self, index: usize) -> Option<&mut Bone> {
        self.bones.get_mut(index)
    }

    pub fn bone_world(&self, index: usize) -> &Affine2 {
        &self.bones[index].world
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn slot(&self, index: usize) -> Option<&Slot> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut Slot> {
        self.slots.get_mut(index)
    }

    pub fn find_slot(&self, name: &str) -> Option<&Slot> {
        self.data.find_slot(name).map(|i| &self.slots[i])
    }

    pub fn find_bone(&self, name: &str) -> Option<&Bone> {
        self.data.find_bone(name).map(|i| &self.bones[i])
    }

    pub fn skin_name(&self) -> Option<&str> {
        self.skin.as_deref()
    }

    /// Switch the active skin. Returns false (and logs) when the skin does not exist.
    ///
    /// Like a fresh equip, slots showing their setup attachment pick up the
    /// new skin's variant on the next `set_slots_to_setup_pose`.
    pub fn set_skin(&mut self, name: &str) -> bool {
        if self.data.find_skin(name).is_none() {
            log::warn!("Skeleton '{}': unknown skin '{}'", self.data.name, name);
            return false;
        }
        self.skin = Some(name.to_string());
        true
    }

    /// Clear the active skin so only the default skin is consulted.
    pub fn clear_skin(&mut self) {
        self.skin = None;
    }

    /// Resolve an attachment by name: active skin first, then the default skin.
    pub fn get_attachment(&self, slot: usize, name: &str) -> Option<Arc<Attachment>> {
        let slot_name = &self.data.slots.get(slot)?.name;
        let active = self
            .skin
            .as_deref()
            .and_then(|s| self.data.find_skin(s))
            .and_then(|skin| skin.attachment(slot_name, name));
        active
            .or_else(|| {
                self.data
                    .default_skin()
                    .filter(|_| self.skin.as_deref() != Some(DEFAULT_SKIN))
                    .and_then(|skin| skin.attachment(slot_name, name))
            })
            .cloned()
    }

    /// Show the named attachment on a slot, or clear it with `None`.
    ///
    /// Returns false when the slot or attachment cannot be found; the slot is
    /// left untouched in that case.
    pub fn set_attachment(&mut self, slot_name: &str, attachment: Option<&str>) -> bool {
        let Some(index) = self.data.find_slot(slot_name) else {
            log::warn!("set_attachment: unknown slot '{}'", slot_name);
            return false;
        };
        match attachment {
            None => {
                self.slots[index].attachment = None;
                true
            }
            Some(name) => match self.get_attachment(index, name) {
                Some(found) => {
                    self.slots[index].attachment = Some(found);
                    true
                }
                None => {
                    log::warn!(
                        "set_attachment: no attachment '{}' for slot '{}'",
                        name,
                        slot_name
                    );
                    false
                }
            },
        }
    }

    /// Assign an already-resolved attachment (e.g. one found in another skin).
    pub fn assign_attachment(&mut self, slot: usize, attachment: Option<Arc<Attachment>>) {
        if let Some(s) = self.slots.get_mut(slot) {
            s.attachment = attachment;
        }
    }

    pub fn set_to_setup_pose(&mut self) {
        self.set_bones_to_setup_pose();
        self.set_slots_to_setup_pose();
    }

    pub fn set_bones_to_setup_pose(&mut self) {
        for (bone, data) in self.bones.iter_mut().zip(&self.data.bones) {
            bone.local = BoneTransform {
                x: data.x,
                y: data.y,
                rotation: data.rotation,
                scale_x: data.scale_x,
                scale_y: data.scale_y,
            };
        }
    }

    pub fn set_slots_to_setup_pose(&mut self) {
        self.draw_order = (0..self.slots.len()).collect();
        for i in 0..self.slots.len() {
            let setup = &self.data.slots[i];
            let color = setup.color;
            let attachment = setup
                .attachment
                .as_deref()
                .and_then(|name| self.get_attachment(i, name));
            let slot = &mut self.slots[i];
            slot.color = color;
            slot.attachment = attachment;
        }
    }

    /// Recompute every bone's world transform from the local poses.
    /// Parents always precede children, so one forward pass suffices.
    pub fn update_world_transform(&mut self) {
        let root = Affine2::from_scale_angle_translation(
            Vec2::new(self.scale_x, self.scale_y),
            0.0,
            Vec2::new(self.x, self.y),
        );
        for i in 0..self.bones.len() {
            let parent_world = match self.data.bone_parent(i) {
                Some(p) => self.bones[p].world,
                None => root,
            };
            let local = self.bones[i].local.to_affine();
            self.bones[i].world = parent_world * local;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attachment::{RegionAttachment, QUAD_TRIANGLES};
    use crate::data::{BoneData, Skin, SkinEntry, SlotData};

    fn region(name: &str) -> Arc<Attachment> {
        Arc::new(Attachment::Region(RegionAttachment {
            name: name.into(),
            path: None,
            region: None,
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            width: 2.0,
            height: 2.0,
            uvs: [Vec2::ZERO; 4],
            color: Color::WHITE,
        }))
    }

    fn rig() -> Arc<SkeletonData> {
        SkeletonData::new(
            "test",
            vec![
                BoneData {
                    name: "root".into(),
                    parent: None,
                    x: 10.0,
                    y: 0.0,
                    rotation: 0.0,
                    scale_x: 1.0,
                    scale_y: 1.0,
                },
                BoneData {
                    name: "arm".into(),
                    parent: Some("root".into()),
                    x: 5.0,
                    y: 0.0,
                    rotation: 90.0,
                    scale_x: 1.0,
                    scale_y: 1.0,
                },
            ],
            vec![SlotData {
                name: "Hat".into(),
                bone: "arm".into(),
                color: Color::WHITE,
                attachment: Some("hat".into()),
            }],
            vec![
                Skin {
                    name: DEFAULT_SKIN.into(),
                    attachments: vec![SkinEntry {
                        slot: "Hat".into(),
                        attachment: region("hat"),
                    }],
                },
                Skin {
                    name: "winter".into(),
                    attachments: vec![
                        SkinEntry {
                            slot: "Hat".into(),
                            attachment: region("hat"),
                        },
                        SkinEntry {
                            slot: "Hat".into(),
                            attachment: region("HatShader"),
                        },
                    ],
                },
            ],
            vec![],
        )
        .unwrap()
    }

    #[test]
    fn test_setup_pose_assigns_attachment() {
        let skeleton = Skeleton::new(rig());
        assert_eq!(skeleton.slots()[0].attachment_name(), Some("hat"));
        assert_eq!(QUAD_TRIANGLES.len(), 6);
    }

    #[test]
    fn test_world_transform_chains_parents() {
        let skeleton = Skeleton::new(rig());
        let p = skeleton.bone_world(1).transform_point2(Vec2::new(1.0, 0.0));
        // root at x=10, arm at +5 rotated 90 degrees: local +x maps to +y
        assert!((p - Vec2::new(15.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn test_set_attachment_and_clear() {
        let mut skeleton = Skeleton::new(rig());
        assert!(skeleton.set_attachment("Hat", None));
        assert!(skeleton.slots()[0].attachment().is_none());

        // Not in the default skin and no active skin
        assert!(!skeleton.set_attachment("Hat", Some("HatShader")));

        assert!(skeleton.set_skin("winter"));
        assert!(skeleton.set_attachment("Hat", Some("HatShader")));
        assert_eq!(skeleton.slots()[0].attachment_name(), Some("HatShader"));
    }

    #[test]
    fn test_unknown_skin_is_not_fatal() {
        let mut skeleton = Skeleton::new(rig());
        assert!(!skeleton.set_skin("nope"));
        assert_eq!(skeleton.skin_name(), None);
    }

    #[test]
    fn test_find_attachment_in_any_skin() {
        let data = rig();
        assert!(data.find_attachment_in_any_skin("Hat", "HatShader").is_some());
        assert!(data.find_attachment_in_any_skin("Hat", "missing").is_none());
    }
}
