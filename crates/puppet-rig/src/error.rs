//! Error types for rig loading and validation

use thiserror::Error;

/// Errors raised while loading or validating skeleton data.
///
/// Per-frame operations never return these; they only surface when a rig is
/// built from authored data.
#[derive(Debug, Error)]
pub enum RigError {
    #[error("failed to parse skeleton data: {0}")]
    Parse(#[from] ron::error::SpannedError),

    #[error("bone '{bone}' references unknown parent '{parent}'")]
    UnknownParent { bone: String, parent: String },

    #[error("bone '{bone}' must be declared after its parent '{parent}'")]
    ParentOrder { bone: String, parent: String },

    #[error("slot '{slot}' references unknown bone '{bone}'")]
    UnknownBone { slot: String, bone: String },

    #[error("skin '{skin}' references unknown slot '{slot}'")]
    UnknownSlot { skin: String, slot: String },

    #[error("weighted vertex in attachment '{attachment}' references bone index {index}")]
    BoneIndexOutOfRange { attachment: String, index: usize },

    #[error("mesh '{attachment}' has triangle index {index} but only {count} vertices with uvs")]
    TriangleIndexOutOfRange {
        attachment: String,
        index: u16,
        count: usize,
    },

    #[error("duplicate {kind} name '{name}'")]
    Duplicate { kind: &'static str, name: String },

    #[error("invalid color '{0}' (expected #rrggbb or #rrggbbaa)")]
    InvalidColor(String),
}
