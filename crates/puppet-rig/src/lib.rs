//! Skeleton rig model for Puppet
//!
//! Authored data (`SkeletonData`) is loaded once and shared through `Arc`;
//! each character owns a posed `Skeleton` and an `AnimationState`.

pub mod animation;
pub mod attachment;
pub mod color;
pub mod data;
pub mod error;
pub mod skeleton;
pub mod tracks;

pub use animation::{AnimationClip, BoneProperty, BoneTimeline, SlotTimeline};
pub use attachment::{
    AtlasRegion, Attachment, BoneInfluence, ClippingAttachment, MeshAttachment, RegionAttachment,
    VertexData, QUAD_TRIANGLES,
};
pub use color::Color;
pub use data::{BoneData, SkeletonData, Skin, SkinEntry, SlotData, DEFAULT_SKIN};
pub use error::RigError;
pub use skeleton::{Bone, BoneTransform, Skeleton, Slot};
pub use tracks::{AnimationState, AnimationTracks, EntryId, TrackEntry};
