//! Authored skeleton data: bones, slots, skins and animation clips
//!
//! Data is written in RON and referenced by name. `SkeletonData::build`
//! validates every cross-reference once so runtime lookups never fail on
//! dangling names.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::animation::AnimationClip;
use crate::attachment::{Attachment, MeshAttachment, VertexData};
use crate::color::Color;
use crate::RigError;

/// Name of the skin consulted when the active skin lacks an attachment.
pub const DEFAULT_SKIN: &str = "default";

fn one() -> f32 {
    1.0
}

/// Setup pose of a single bone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoneData {
    pub name: String,
    /// Parent bone name; parents must be declared before children
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
    /// Rotation in degrees
    #[serde(default)]
    pub rotation: f32,
    #[serde(default = "one")]
    pub scale_x: f32,
    #[serde(default = "one")]
    pub scale_y: f32,
}

/// Setup state of a slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotData {
    pub name: String,
    pub bone: String,
    #[serde(default)]
    pub color: Color,
    /// Attachment shown in the setup pose
    #[serde(default)]
    pub attachment: Option<String>,
}

/// One attachment entry of a skin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkinEntry {
    pub slot: String,
    pub attachment: Arc<Attachment>,
}

/// A named set of attachments keyed by (slot, attachment name).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Skin {
    pub name: String,
    #[serde(default)]
    pub attachments: Vec<SkinEntry>,
}

impl Skin {
    pub fn attachment(&self, slot: &str, name: &str) -> Option<&Arc<Attachment>> {
        self.attachments
            .iter()
            .find(|e| e.slot == slot && e.attachment.name() == name)
            .map(|e| &e.attachment)
    }
}

/// Complete authored rig.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkeletonData {
    pub name: String,
    pub bones: Vec<BoneData>,
    pub slots: Vec<SlotData>,
    #[serde(default)]
    pub skins: Vec<Skin>,
    #[serde(default)]
    pub animations: Vec<AnimationClip>,

    #[serde(skip)]
    index: RigIndex,
}

#[derive(Debug, Clone, Default)]
struct RigIndex {
    bones: HashMap<String, usize>,
    slots: HashMap<String, usize>,
    bone_parents: Vec<Option<usize>>,
    slot_bones: Vec<usize>,
    animations: HashMap<String, usize>,
}

impl SkeletonData {
    /// Parse RON and validate.
    pub fn from_ron_str(source: &str) -> Result<Arc<Self>, RigError> {
        let data: SkeletonData = ron::from_str(source)?;
        data.build()
    }

    /// Assemble from parts and validate.
    pub fn new(
        name: impl Into<String>,
        bones: Vec<BoneData>,
        slots: Vec<SlotData>,
        skins: Vec<Skin>,
        animations: Vec<AnimationClip>,
    ) -> Result<Arc<Self>, RigError> {
        Self {
            name: name.into(),
            bones,
            slots,
            skins,
            animations,
            index: RigIndex::default(),
        }
        .build()
    }

    /// Resolve all name references. Fails on unknown or out-of-order names.
    pub fn build(mut self) -> Result<Arc<Self>, RigError> {
        let mut index = RigIndex::default();

        for (i, bone) in self.bones.iter().enumerate() {
            if index.bones.insert(bone.name.clone(), i).is_some() {
                return Err(RigError::Duplicate {
                    kind: "bone",
                    name: bone.name.clone(),
                });
            }
        }
        for bone in &self.bones {
            let parent = match &bone.parent {
                None => None,
                Some(parent) => {
                    let p = *index.bones.get(parent).ok_or_else(|| RigError::UnknownParent {
                        bone: bone.name.clone(),
                        parent: parent.clone(),
                    })?;
                    if p >= index.bone_parents.len() {
                        return Err(RigError::ParentOrder {
                            bone: bone.name.clone(),
                            parent: parent.clone(),
                        });
                    }
                    Some(p)
                }
            };
            index.bone_parents.push(parent);
        }

        for (i, slot) in self.slots.iter().enumerate() {
            if index.slots.insert(slot.name.clone(), i).is_some() {
                return Err(RigError::Duplicate {
                    kind: "slot",
                    name: slot.name.clone(),
                });
            }
            let bone = *index.bones.get(&slot.bone).ok_or_else(|| RigError::UnknownBone {
                slot: slot.name.clone(),
                bone: slot.bone.clone(),
            })?;
            index.slot_bones.push(bone);
        }

        for skin in &self.skins {
            for entry in &skin.attachments {
                if !index.slots.contains_key(&entry.slot) {
                    return Err(RigError::UnknownSlot {
                        skin: skin.name.clone(),
                        slot: entry.slot.clone(),
                    });
                }
                self.check_vertex_bones(&entry.attachment)?;
                if let Attachment::Mesh(mesh) = &*entry.attachment {
                    check_triangles(mesh)?;
                }
            }
        }

        for (i, clip) in self.animations.iter().enumerate() {
            if index.animations.insert(clip.name.clone(), i).is_some() {
                return Err(RigError::Duplicate {
                    kind: "animation",
                    name: clip.name.clone(),
                });
            }
        }

        self.index = index;
        Ok(Arc::new(self))
    }

    fn check_vertex_bones(&self, attachment: &Attachment) -> Result<(), RigError> {
        let vertices: Option<&VertexData> = match attachment {
            Attachment::Region(_) => None,
            Attachment::Mesh(mesh) => Some(&mesh.vertices),
            Attachment::Clipping(clip) => Some(&clip.vertices),
        };
        if let Some(vertices) = vertices {
            if let Some(index) = vertices.bone_indices().find(|&b| b >= self.bones.len()) {
                return Err(RigError::BoneIndexOutOfRange {
                    attachment: attachment.name().to_string(),
                    index,
                });
            }
        }
        Ok(())
    }

    pub fn find_bone(&self, name: &str) -> Option<usize> {
        self.index.bones.get(name).copied()
    }

    pub fn find_slot(&self, name: &str) -> Option<usize> {
        self.index.slots.get(name).copied()
    }

    pub fn bone_parent(&self, bone: usize) -> Option<usize> {
        self.index.bone_parents.get(bone).copied().flatten()
    }

    pub fn slot_bone(&self, slot: usize) -> usize {
        self.index.slot_bones[slot]
    }

    pub fn find_skin(&self, name: &str) -> Option<&Skin> {
        self.skins.iter().find(|s| s.name == name)
    }

    pub fn default_skin(&self) -> Option<&Skin> {
        self.find_skin(DEFAULT_SKIN)
    }

    pub fn find_animation(&self, name: &str) -> Option<&AnimationClip> {
        self.index
            .animations
            .get(name)
            .map(|&i| &self.animations[i])
    }

    /// Look an attachment up in the default skin first, then every other skin.
    pub fn find_attachment_in_any_skin(
        &self,
        slot: &str,
        name: &str,
    ) -> Option<&Arc<Attachment>> {
        self.default_skin()
            .and_then(|skin| skin.attachment(slot, name))
            .or_else(|| {
                self.skins
                    .iter()
                    .filter(|s| s.name != DEFAULT_SKIN)
                    .find_map(|skin| skin.attachment(slot, name))
            })
    }
}

/// Every triangle index must address a vertex that also has a uv.
fn check_triangles(mesh: &MeshAttachment) -> Result<(), RigError> {
    let count = mesh.vertices.vertex_count().min(mesh.uvs.len());
    match mesh.triangles.iter().find(|&&i| usize::from(i) >= count) {
        Some(&index) => Err(RigError::TriangleIndexOutOfRange {
            attachment: mesh.name.clone(),
            index,
            count,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bone(name: &str, parent: Option<&str>) -> BoneData {
        BoneData {
            name: name.into(),
            parent: parent.map(Into::into),
            x: 0.0,
            y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
        }
    }

    fn slot(name: &str, bone: &str) -> SlotData {
        SlotData {
            name: name.into(),
            bone: bone.into(),
            color: Color::WHITE,
            attachment: None,
        }
    }

    #[test]
    fn test_build_resolves_names() {
        let data = SkeletonData::new(
            "rig",
            vec![bone("root", None), bone("head", Some("root"))],
            vec![slot("Head", "head")],
            vec![],
            vec![],
        )
        .unwrap();

        assert_eq!(data.find_bone("head"), Some(1));
        assert_eq!(data.bone_parent(1), Some(0));
        assert_eq!(data.bone_parent(0), None);
        assert_eq!(data.slot_bone(0), 1);
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let err = SkeletonData::new("rig", vec![bone("a", Some("nope"))], vec![], vec![], vec![])
            .unwrap_err();
        assert!(matches!(err, RigError::UnknownParent { .. }));
    }

    #[test]
    fn test_parent_order_enforced() {
        let err = SkeletonData::new(
            "rig",
            vec![bone("child", Some("root")), bone("root", None)],
            vec![],
            vec![],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, RigError::ParentOrder { .. }));
    }

    #[test]
    fn test_unknown_slot_bone_rejected() {
        let err = SkeletonData::new(
            "rig",
            vec![bone("root", None)],
            vec![slot("Head", "missing")],
            vec![],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, RigError::UnknownBone { .. }));
    }

    #[test]
    fn test_out_of_range_triangle_rejected() {
        let source = r#"(
            name: "rig",
            bones: [(name: "root")],
            slots: [(name: "Body", bone: "root", attachment: Some("Body"))],
            skins: [(
                name: "default",
                attachments: [(slot: "Body", attachment: Mesh((
                    name: "Body",
                    vertices: Local([(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)]),
                    uvs: [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0)],
                    triangles: [0, 1, 3],
                )))],
            )],
        )"#;
        let err = SkeletonData::from_ron_str(source).unwrap_err();
        assert!(matches!(
            err,
            RigError::TriangleIndexOutOfRange { index: 3, count: 3, .. }
        ));
    }

    #[test]
    fn test_duplicate_slot_rejected() {
        let err = SkeletonData::new(
            "rig",
            vec![bone("root", None)],
            vec![slot("A", "root"), slot("A", "root")],
            vec![],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, RigError::Duplicate { kind: "slot", .. }));
    }
}
