//! Mask-weighted recolor
//!
//! A mask page the same layout as the base page holds four independent
//! weights per pixel. The output color is the weight-sum of the four
//! channel colors, optionally shaded by the base luminance and blended
//! back over the base by total weight times strength.

use glam::Vec2;
use puppet_rig::Color;
use serde::{Deserialize, Serialize};

use super::{color_bits, luma, mix, scale, RecolorColors};
use crate::material::DEFAULT_ALPHA_TEST;
use crate::texture::TextureHandle;

/// Total mask weight at or below which auto-fallback kicks in.
pub const EMPTY_MASK_EPSILON: f32 = 0.0001;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShadeMode {
    /// Multiply the target color by the base luminance
    #[default]
    Shade,
    /// Flat target color
    Replace,
}

impl ShadeMode {
    pub fn factor(&self) -> f32 {
        match self {
            Self::Shade => 1.0,
            Self::Replace => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskRecolorOptions {
    pub alpha_test: f32,
    pub premultiplied_alpha: bool,
    pub mode: ShadeMode,
    /// Clamped to 0..1
    pub strength: f32,
    /// Base luma at or below which pixels pass through (0 disables)
    pub preserve_dark_threshold: f32,
    /// Output the raw mask instead of recoloring
    pub debug_mask_view: bool,
    /// Recolor pixels whose mask weights sum to zero as if fully masked
    pub auto_fallback_when_mask_empty: bool,
}

impl Default for MaskRecolorOptions {
    fn default() -> Self {
        Self {
            alpha_test: DEFAULT_ALPHA_TEST,
            premultiplied_alpha: true,
            mode: ShadeMode::Shade,
            strength: 1.0,
            preserve_dark_threshold: 0.0,
            debug_mask_view: false,
            auto_fallback_when_mask_empty: true,
        }
    }
}

impl MaskRecolorOptions {
    fn sanitized(mut self) -> Self {
        self.strength = self.strength.clamp(0.0, 1.0);
        self.preserve_dark_threshold = self.preserve_dark_threshold.clamp(0.0, 1.0);
        self
    }

    pub(crate) fn key_bits(&self) -> [u32; 3] {
        let flags = self.debug_mask_view as u32 | (self.auto_fallback_when_mask_empty as u32) << 1;
        [self.strength.to_bits(), flags, 0]
    }
}

/// Colors for mask channels R, G, B, A. Unspecified channels are black.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskColors {
    pub r: Color,
    pub g: Color,
    pub b: Color,
    pub a: Color,
}

impl Default for MaskColors {
    fn default() -> Self {
        Self {
            r: Color::BLACK,
            g: Color::BLACK,
            b: Color::BLACK,
            a: Color::BLACK,
        }
    }
}

impl From<&RecolorColors> for MaskColors {
    fn from(colors: &RecolorColors) -> Self {
        let mut out = Self::default();
        out.apply(colors);
        out
    }
}

impl MaskColors {
    /// Overwrite only the channels present in `colors`.
    pub fn apply(&mut self, colors: &RecolorColors) {
        if let Some(c) = colors.r {
            self.r = c;
        }
        if let Some(c) = colors.g {
            self.g = c;
        }
        if let Some(c) = colors.b {
            self.b = c;
        }
        if let Some(c) = colors.a {
            self.a = c;
        }
    }

    pub(crate) fn key_bits(&self) -> [[u32; 4]; 4] {
        [
            color_bits(&self.r),
            color_bits(&self.g),
            color_bits(&self.b),
            color_bits(&self.a),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct MaskRecolorMaterial {
    base: TextureHandle,
    mask: TextureHandle,
    colors: MaskColors,
    options: MaskRecolorOptions,
    global_alpha: f32,
}

impl MaskRecolorMaterial {
    pub fn new(
        base: TextureHandle,
        mask: TextureHandle,
        colors: MaskColors,
        options: MaskRecolorOptions,
    ) -> Self {
        if base.width() != mask.width() || base.height() != mask.height() {
            log::warn!(
                "Mask page '{}' ({}x{}) does not match base page '{}' ({}x{})",
                mask.name(),
                mask.width(),
                mask.height(),
                base.name(),
                base.width(),
                base.height()
            );
        }
        Self {
            base,
            mask,
            colors,
            options: options.sanitized(),
            global_alpha: 1.0,
        }
    }

    pub fn base(&self) -> &TextureHandle {
        &self.base
    }

    pub fn mask(&self) -> &TextureHandle {
        &self.mask
    }

    pub fn colors(&self) -> &MaskColors {
        &self.colors
    }

    pub fn options(&self) -> &MaskRecolorOptions {
        &self.options
    }

    pub fn global_alpha(&self) -> f32 {
        self.global_alpha
    }

    pub fn update_colors(&mut self, colors: &RecolorColors) {
        self.colors.apply(colors);
    }

    pub fn update_options(&mut self, edit: impl FnOnce(&mut MaskRecolorOptions)) {
        edit(&mut self.options);
        self.options = self.options.sanitized();
    }

    pub fn update_alpha(&mut self, alpha: f32) {
        self.global_alpha = alpha.clamp(0.0, 1.0);
    }

    /// Shade one texel pair. `None` means the fragment is discarded.
    pub fn shade_texel(&self, tex: [f32; 4], mask: [f32; 4]) -> Option<[f32; 4]> {
        let o = &self.options;
        if tex[3] <= o.alpha_test {
            return None;
        }
        let base = [tex[0], tex[1], tex[2]];
        let out_alpha = tex[3] * self.global_alpha;

        if o.debug_mask_view {
            let mut dbg = [mask[0], mask[1], mask[2]];
            if o.premultiplied_alpha {
                dbg = scale(dbg, out_alpha);
            }
            return Some([dbg[0], dbg[1], dbg[2], out_alpha]);
        }

        let y = luma(base);
        if o.preserve_dark_threshold > 0.0 && y <= o.preserve_dark_threshold {
            let keep = if o.premultiplied_alpha {
                scale(base, tex[3] * self.global_alpha)
            } else {
                base
            };
            return Some([keep[0], keep[1], keep[2], out_alpha]);
        }

        let c = &self.colors;
        let mut target = [0.0; 3];
        for (color, weight) in [(c.r, mask[0]), (c.g, mask[1]), (c.b, mask[2]), (c.a, mask[3])] {
            target[0] += color.r * weight;
            target[1] += color.g * weight;
            target[2] += color.b * weight;
        }
        let shaded = mix(target, scale(target, y.max(0.0)), o.mode.factor());

        let mut weight = (mask[0] + mask[1] + mask[2] + mask[3]).clamp(0.0, 1.0);
        if o.auto_fallback_when_mask_empty && weight <= EMPTY_MASK_EPSILON {
            weight = 1.0;
        }

        let mut rgb = mix(base, shaded, weight * o.strength);
        if o.premultiplied_alpha {
            rgb = scale(rgb, out_alpha);
        }
        Some([rgb[0], rgb[1], rgb[2], out_alpha])
    }

    /// Sample both pages at `uv` and shade. Pages without CPU pixels
    /// discard; a mask without pixels reads as empty.
    pub fn sample(&self, uv: Vec2) -> Option<[f32; 4]> {
        let tex = self.base.sample(uv)?;
        let mask = self.mask.sample(uv).unwrap_or([0.0; 4]);
        self.shade_texel(tex, mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::Texture;

    fn material(colors: RecolorColors, options: MaskRecolorOptions) -> MaskRecolorMaterial {
        MaskRecolorMaterial::new(
            Texture::new("hat.png", 1, 1),
            Texture::new("hat_mask.png", 1, 1),
            MaskColors::from(&colors),
            options,
        )
    }

    fn red() -> RecolorColors {
        RecolorColors {
            r: Some(Color::RED),
            ..Default::default()
        }
    }

    fn close(a: [f32; 4], b: [f32; 4]) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-5)
    }

    #[test]
    fn test_unspecified_channels_are_black() {
        let colors = MaskColors::from(&red());
        assert_eq!(colors.r, Color::RED);
        assert_eq!(colors.g, Color::BLACK);
        assert_eq!(colors.a, Color::BLACK);
    }

    #[test]
    fn test_replace_mode_is_exact_weighted_sum() {
        let mut colors = red();
        colors.g = Some(Color::new(0.0, 0.0, 1.0, 1.0));
        let mat = material(
            colors,
            MaskRecolorOptions {
                mode: ShadeMode::Replace,
                ..Default::default()
            },
        );
        let out = mat.shade_texel([0.5, 0.5, 0.5, 1.0], [0.25, 0.75, 0.0, 0.0]).unwrap();
        assert!(close(out, [0.25, 0.0, 0.75, 1.0]), "{out:?}");
    }

    #[test]
    fn test_shade_mode_scales_by_luma() {
        let mat = material(red(), MaskRecolorOptions::default());
        let grey = 0.6;
        let out = mat
            .shade_texel([grey, grey, grey, 1.0], [1.0, 0.0, 0.0, 0.0])
            .unwrap();
        assert!(close(out, [grey, 0.0, 0.0, 1.0]), "{out:?}");
    }

    #[test]
    fn test_empty_mask_with_auto_fallback_paints_zero_sum() {
        // Every weight is zero, so the forced full-weight target is black.
        let mat = material(red(), MaskRecolorOptions::default());
        let out = mat.shade_texel([0.8, 0.4, 0.2, 1.0], [0.0; 4]).unwrap();
        assert!(close(out, [0.0, 0.0, 0.0, 1.0]), "{out:?}");
    }

    #[test]
    fn test_empty_mask_without_auto_fallback_is_untouched() {
        let mat = material(
            red(),
            MaskRecolorOptions {
                auto_fallback_when_mask_empty: false,
                ..Default::default()
            },
        );
        let out = mat.shade_texel([0.8, 0.4, 0.2, 1.0], [0.0; 4]).unwrap();
        assert!(close(out, [0.8, 0.4, 0.2, 1.0]), "{out:?}");
    }

    #[test]
    fn test_preserve_dark_keeps_outline() {
        let mat = material(
            red(),
            MaskRecolorOptions {
                preserve_dark_threshold: 0.14,
                ..Default::default()
            },
        );
        let ink = [0.05, 0.05, 0.05, 1.0];
        let out = mat.shade_texel(ink, [1.0, 0.0, 0.0, 0.0]).unwrap();
        assert!(close(out, ink));
    }

    #[test]
    fn test_alpha_test_discards_and_global_alpha_scales() {
        let mut mat = material(red(), MaskRecolorOptions::default());
        assert!(mat.shade_texel([1.0, 1.0, 1.0, 0.001], [1.0, 0.0, 0.0, 0.0]).is_none());

        mat.update_alpha(0.5);
        let out = mat
            .shade_texel([1.0, 1.0, 1.0, 1.0], [1.0, 0.0, 0.0, 0.0])
            .unwrap();
        assert!(close(out, [0.5, 0.0, 0.0, 0.5]), "{out:?}");

        mat.update_alpha(3.0);
        assert_eq!(mat.global_alpha(), 1.0);
    }

    #[test]
    fn test_debug_view_outputs_mask() {
        let mat = material(
            red(),
            MaskRecolorOptions {
                debug_mask_view: true,
                premultiplied_alpha: false,
                ..Default::default()
            },
        );
        let out = mat.shade_texel([0.3, 0.3, 0.3, 1.0], [0.1, 0.2, 0.3, 0.4]).unwrap();
        assert!(close(out, [0.1, 0.2, 0.3, 1.0]));
    }

    #[test]
    fn test_update_colors_is_partial_and_options_clamp() {
        let mut mat = material(red(), MaskRecolorOptions::default());
        mat.update_colors(&RecolorColors {
            g: Some(Color::GREEN),
            ..Default::default()
        });
        assert_eq!(mat.colors().r, Color::RED);
        assert_eq!(mat.colors().g, Color::GREEN);

        mat.update_options(|o| o.strength = 4.0);
        assert_eq!(mat.options().strength, 1.0);
    }
}
