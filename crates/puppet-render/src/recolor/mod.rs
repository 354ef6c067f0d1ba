//! Runtime recolor materials
//!
//! Two techniques remap colors in a base texture to caller-chosen colors:
//!
//! - [`mask`]: an artist-painted mask page weights up to four colors per pixel
//! - [`hue`]: flat placeholder hues in the base texture select the color
//!
//! Both carry a CPU reference implementation of their WGSL fragment shader
//! so results can be checked without a GPU.

pub mod factory;
pub mod hue;
pub mod mask;

pub use factory::{RecolorFactory, RecolorKey, RecolorTechnique};
pub use hue::{classify_hue, HueClass, HueColors, HueRecolorMaterial, HueRecolorOptions};
pub use mask::{MaskColors, MaskRecolorMaterial, MaskRecolorOptions, ShadeMode};

use puppet_rig::Color;
use serde::{Deserialize, Serialize};

/// Rec. 601 luma weights shared by both shaders.
pub const LUMA_WEIGHTS: [f32; 3] = [0.299, 0.587, 0.114];

/// Optional per-channel colors as authored on a cosmetic item.
///
/// For mask recolor the fields map to mask channels R, G, B and A. For
/// hue-indexed recolor they map to the red, green, blue and yellow classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RecolorColors {
    #[serde(default)]
    pub r: Option<Color>,
    #[serde(default)]
    pub g: Option<Color>,
    #[serde(default)]
    pub b: Option<Color>,
    #[serde(default)]
    pub a: Option<Color>,
}

impl RecolorColors {
    pub fn is_empty(&self) -> bool {
        self.r.is_none() && self.g.is_none() && self.b.is_none() && self.a.is_none()
    }
}

pub(crate) fn luma(rgb: [f32; 3]) -> f32 {
    rgb[0] * LUMA_WEIGHTS[0] + rgb[1] * LUMA_WEIGHTS[1] + rgb[2] * LUMA_WEIGHTS[2]
}

pub(crate) fn mix(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        a[0] + (b[0] - a[0]) * t,
        a[1] + (b[1] - a[1]) * t,
        a[2] + (b[2] - a[2]) * t,
    ]
}

pub(crate) fn scale(a: [f32; 3], s: f32) -> [f32; 3] {
    [a[0] * s, a[1] * s, a[2] * s]
}

pub(crate) fn color_bits(color: &Color) -> [u32; 4] {
    [
        color.r.to_bits(),
        color.g.to_bits(),
        color.b.to_bits(),
        color.a.to_bits(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_luma_of_white_is_one() {
        assert!((luma([1.0, 1.0, 1.0]) - 1.0).abs() < 1e-6);
        assert_eq!(luma([0.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_recolor_colors_from_ron() {
        let colors: RecolorColors = ron::from_str(r##"(r: Some("#2563eb"))"##).unwrap();
        assert_eq!(colors.r.unwrap().to_hex(), "#2563eb");
        assert!(colors.g.is_none());
        assert!(!colors.is_empty());
        assert!(RecolorColors::default().is_empty());
    }
}
