//! Puppet skeletal mesh renderer
//!
//! Turns a posed [`puppet_rig::Skeleton`] into per-slot geometry every frame:
//! - [`renderer`]: draw-order traversal, texture resolution, tinting
//! - [`clipping`]: clip-polygon masking of following slots
//! - [`material`]: default materials and their cache
//! - [`recolor`]: mask-weighted and hue-indexed recolor materials
//! - [`cosmetics`]: the outfit-driven material override
//! - `gpu` (feature `gpu`): headless wgpu backend

pub mod clipping;
pub mod cosmetics;
pub mod error;
pub mod geometry;
pub mod material;
pub mod overrides;
pub mod recolor;
pub mod renderer;
pub mod texture;
pub mod uniform;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use clipping::{ClipOutcome, SkeletonClipper};
pub use cosmetics::{
    is_hair_slot, is_shader_attachment, is_skin_slot, shader_attachment_for, CosmeticOverride,
    CosmeticsConfig, HAIR_SHADER, HAIR_SLOTS, SKIN_SLOTS,
};
pub use error::RenderError;
pub use geometry::{GrowableBuffer, SlotRenderable, SlotVertex};
pub use material::{
    alpha_test_for_slot, is_pupil_slot, BasicMaterial, Material, MaterialCache, MaterialHandle,
    MaterialKind, DEFAULT_ALPHA_TEST,
};
pub use overrides::{MaterialOverride, OverrideChain};
pub use recolor::{
    HueColors, HueRecolorMaterial, HueRecolorOptions, MaskColors, MaskRecolorMaterial,
    MaskRecolorOptions, RecolorColors, RecolorFactory, RecolorKey, RecolorTechnique, ShadeMode,
};
pub use renderer::{FrameStats, RenderContext, RendererConfig, SkeletonMesh};
pub use texture::{Texture, TextureHandle, TextureId, TexturePages, TextureResolver};
pub use uniform::DrawUniform;

#[cfg(feature = "gpu")]
pub use gpu::GpuRenderer;
