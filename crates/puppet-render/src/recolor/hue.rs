//! Hue-indexed recolor
//!
//! Artwork marks paintable regions with flat, saturated placeholder hues
//! (red, green, blue and optionally yellow). Each pixel is classified at
//! shade time and the matching target color is substituted. All math runs
//! in linear space: samples are decoded with gamma 2.2 and re-encoded after.

use glam::Vec2;
use puppet_rig::Color;
use serde::{Deserialize, Serialize};

use super::{color_bits, luma, mix, scale, RecolorColors};
use crate::material::DEFAULT_ALPHA_TEST;
use crate::texture::TextureHandle;

pub const GAMMA: f32 = 2.2;

/// Dominance margin a channel must win by.
pub const HUE_TOLERANCE: f32 = 0.06;

/// Minimum linear intensity for a pixel to be classified at all.
pub const MIN_INTENSITY: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HueClass {
    None,
    Red,
    Green,
    Blue,
    Yellow,
}

/// Classify a linear RGB color by channel dominance.
///
/// Yellow is checked first (when enabled), then red, green and blue.
/// Pixels whose brightest channel is at or below [`MIN_INTENSITY`] are
/// `None`.
pub fn classify_hue(rgb: [f32; 3], use_yellow: bool) -> HueClass {
    let [r, g, b] = rgb;
    if r.max(g).max(b) <= MIN_INTENSITY {
        return HueClass::None;
    }
    let tol = HUE_TOLERANCE;
    if use_yellow && r > MIN_INTENSITY && g > MIN_INTENSITY && r > b + tol && g > b + tol {
        HueClass::Yellow
    } else if r > g + tol && r > b + tol {
        HueClass::Red
    } else if g > r + tol && g > b + tol {
        HueClass::Green
    } else if b > r + tol && b > g + tol {
        HueClass::Blue
    } else {
        HueClass::None
    }
}

pub fn srgb_to_linear(rgb: [f32; 3]) -> [f32; 3] {
    rgb.map(|c| c.max(0.0).powf(GAMMA))
}

pub fn linear_to_srgb(rgb: [f32; 3]) -> [f32; 3] {
    rgb.map(|c| c.max(0.0).powf(1.0 / GAMMA))
}

fn saturation(rgb: [f32; 3]) -> f32 {
    let max = rgb[0].max(rgb[1]).max(rgb[2]);
    let min = rgb[0].min(rgb[1]).min(rgb[2]);
    if max > 1e-5 {
        (max - min) / max
    } else {
        0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HueRecolorOptions {
    /// Scaled by the global alpha before comparing
    pub alpha_test: f32,
    /// Clamped to 0..1
    pub strength: f32,
    /// Multiply targets by the base luminance (never applied to blue)
    pub shade_mode: bool,
    /// Pixels less saturated than this pass through
    pub sat_min: f32,
    pub use_yellow: bool,
    /// Linear luma at or below which non-blue pixels pass through
    pub preserve_dark_threshold: f32,
}

impl Default for HueRecolorOptions {
    fn default() -> Self {
        Self {
            alpha_test: DEFAULT_ALPHA_TEST,
            strength: 1.0,
            shade_mode: true,
            sat_min: 0.2,
            use_yellow: false,
            preserve_dark_threshold: 0.15,
        }
    }
}

impl HueRecolorOptions {
    /// Tuning used for outfit cosmetics: looser saturation gate and the
    /// yellow class enabled.
    pub fn cosmetic(alpha_test: f32) -> Self {
        Self {
            alpha_test,
            sat_min: 0.1,
            use_yellow: true,
            ..Self::default()
        }
    }

    fn sanitized(mut self) -> Self {
        self.strength = self.strength.clamp(0.0, 1.0);
        self
    }

    pub(crate) fn key_bits(&self) -> [u32; 3] {
        [
            self.strength.to_bits(),
            self.sat_min.to_bits(),
            self.use_yellow as u32,
        ]
    }
}

/// Target color per hue class.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HueColors {
    pub red: Color,
    pub green: Color,
    pub blue: Color,
    pub yellow: Color,
}

impl Default for HueColors {
    fn default() -> Self {
        Self {
            red: Color::RED,
            green: Color::GREEN,
            blue: Color::BLUE,
            yellow: Color::YELLOW,
        }
    }
}

impl HueColors {
    /// Mapping used for cosmetics: blue falls back to the primary (red)
    /// color so single-color items tint blue regions too.
    pub fn from_cosmetic(colors: &RecolorColors) -> Self {
        Self {
            red: colors.r.unwrap_or(Color::RED),
            green: colors.g.unwrap_or(Color::GREEN),
            blue: colors.b.or(colors.r).unwrap_or(Color::RED),
            yellow: colors.a.unwrap_or(Color::YELLOW),
        }
    }

    /// Overwrite only the classes present in `colors` (r, g, b, a map to
    /// red, green, blue, yellow).
    pub fn apply(&mut self, colors: &RecolorColors) {
        if let Some(c) = colors.r {
            self.red = c;
        }
        if let Some(c) = colors.g {
            self.green = c;
        }
        if let Some(c) = colors.b {
            self.blue = c;
        }
        if let Some(c) = colors.a {
            self.yellow = c;
        }
    }

    pub fn for_class(&self, class: HueClass) -> Option<Color> {
        match class {
            HueClass::None => None,
            HueClass::Red => Some(self.red),
            HueClass::Green => Some(self.green),
            HueClass::Blue => Some(self.blue),
            HueClass::Yellow => Some(self.yellow),
        }
    }

    pub(crate) fn key_bits(&self) -> [[u32; 4]; 4] {
        [
            color_bits(&self.red),
            color_bits(&self.green),
            color_bits(&self.blue),
            color_bits(&self.yellow),
        ]
    }
}

#[derive(Debug, Clone)]
pub struct HueRecolorMaterial {
    base: TextureHandle,
    colors: HueColors,
    options: HueRecolorOptions,
    global_alpha: f32,
}

impl HueRecolorMaterial {
    pub fn new(base: TextureHandle, colors: HueColors, options: HueRecolorOptions) -> Self {
        Self {
            base,
            colors,
            options: options.sanitized(),
            global_alpha: 1.0,
        }
    }

    pub fn base(&self) -> &TextureHandle {
        &self.base
    }

    pub fn colors(&self) -> &HueColors {
        &self.colors
    }

    pub fn options(&self) -> &HueRecolorOptions {
        &self.options
    }

    pub fn global_alpha(&self) -> f32 {
        self.global_alpha
    }

    pub fn update_colors(&mut self, colors: &RecolorColors) {
        self.colors.apply(colors);
    }

    pub fn update_options(&mut self, edit: impl FnOnce(&mut HueRecolorOptions)) {
        edit(&mut self.options);
        self.options = self.options.sanitized();
    }

    pub fn update_alpha(&mut self, alpha: f32) {
        self.global_alpha = alpha.clamp(0.0, 1.0);
    }

    /// Shade one texel. `None` means the fragment is discarded.
    ///
    /// Output is premultiplied by the global alpha; surviving fragments are
    /// otherwise opaque.
    pub fn shade_texel(&self, tex: [f32; 4]) -> Option<[f32; 4]> {
        let o = &self.options;
        if tex[3] <= o.alpha_test * self.global_alpha {
            return None;
        }
        let linear = srgb_to_linear([tex[0], tex[1], tex[2]]);
        let out = self.recolor_linear(linear).unwrap_or(linear);
        let rgb = scale(linear_to_srgb(out), self.global_alpha);
        Some([rgb[0], rgb[1], rgb[2], self.global_alpha])
    }

    /// Recolored linear RGB, or `None` when the pixel passes through.
    fn recolor_linear(&self, linear: [f32; 3]) -> Option<[f32; 3]> {
        let o = &self.options;
        let y = luma(linear);
        let [r, g, b] = linear;
        let blueish = b > r && b > g && b > 0.1;
        if y <= o.preserve_dark_threshold && !blueish {
            return None;
        }
        if saturation(linear) < o.sat_min {
            return None;
        }
        let class = classify_hue(linear, o.use_yellow);
        let target = self.colors.for_class(class)?;
        let target = srgb_to_linear(target.rgb());

        Some(if class == HueClass::Blue {
            mix(linear, target, o.strength)
        } else {
            let shade = if o.shade_mode { 1.0 } else { 0.0 };
            let shaded = mix(target, scale(target, y), shade);
            mix(linear, shaded, o.strength)
        })
    }

    pub fn sample(&self, uv: Vec2) -> Option<[f32; 4]> {
        self.shade_texel(self.base.sample(uv)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::texture::Texture;

    fn material(colors: HueColors, options: HueRecolorOptions) -> HueRecolorMaterial {
        HueRecolorMaterial::new(Texture::new("skeleton.png", 1, 1), colors, options)
    }

    fn close3(a: [f32; 4], b: [f32; 3]) -> bool {
        (0..3).all(|i| (a[i] - b[i]).abs() < 1e-3)
    }

    #[test]
    fn test_classify_primary_hues() {
        assert_eq!(classify_hue([0.9, 0.1, 0.1], false), HueClass::Red);
        assert_eq!(classify_hue([0.1, 0.9, 0.1], false), HueClass::Green);
        assert_eq!(classify_hue([0.1, 0.1, 0.9], false), HueClass::Blue);
        assert_eq!(classify_hue([0.5, 0.5, 0.5], false), HueClass::None);
        assert_eq!(classify_hue([0.04, 0.0, 0.0], false), HueClass::None);
    }

    #[test]
    fn test_yellow_only_when_enabled() {
        let yellowish = [0.9, 0.85, 0.1];
        assert_eq!(classify_hue(yellowish, true), HueClass::Yellow);
        // Without the yellow class neither red nor green dominates
        assert_eq!(classify_hue(yellowish, false), HueClass::None);
    }

    #[test]
    fn test_classification_is_pure() {
        let px = [0.7, 0.2, 0.15];
        let first = classify_hue(px, true);
        for _ in 0..100 {
            assert_eq!(classify_hue(px, true), first);
        }
    }

    #[test]
    fn test_cosmetic_color_mapping() {
        let colors = HueColors::from_cosmetic(&RecolorColors {
            r: Some(Color::GREEN),
            ..Default::default()
        });
        assert_eq!(colors.red, Color::GREEN);
        assert_eq!(colors.green, Color::GREEN);
        assert_eq!(colors.blue, Color::GREEN);
        assert_eq!(colors.yellow, Color::YELLOW);

        let defaults = HueColors::from_cosmetic(&RecolorColors::default());
        assert_eq!(defaults.blue, Color::RED);
        assert_eq!(HueColors::default().blue, Color::BLUE);
    }

    #[test]
    fn test_red_region_recolored_with_shading() {
        let target = Color::new(0.0, 0.0, 1.0, 1.0);
        let mat = material(
            HueColors {
                red: target,
                ..Default::default()
            },
            HueRecolorOptions::default(),
        );
        let out = mat.shade_texel([1.0, 0.0, 0.0, 1.0]).unwrap();
        // Linear luma of pure red is 0.299; blue target shaded by it
        let expected_b = 0.299f32.powf(1.0 / GAMMA);
        assert!(close3(out, [0.0, 0.0, expected_b]), "{out:?}");
        assert_eq!(out[3], 1.0);
    }

    #[test]
    fn test_blue_region_skips_shading() {
        let target = Color::new(1.0, 0.0, 0.0, 1.0);
        let mat = material(
            HueColors {
                blue: target,
                ..Default::default()
            },
            HueRecolorOptions::default(),
        );
        let out = mat.shade_texel([0.0, 0.0, 0.6, 1.0]).unwrap();
        assert!(close3(out, [1.0, 0.0, 0.0]), "{out:?}");
    }

    #[test]
    fn test_dark_and_grey_pixels_pass_through() {
        let mat = material(HueColors::default(), HueRecolorOptions::default());
        let ink = [0.1, 0.02, 0.02, 1.0];
        assert!(close3(mat.shade_texel(ink).unwrap(), [0.1, 0.02, 0.02]));

        let grey = [0.7, 0.7, 0.7, 1.0];
        assert!(close3(mat.shade_texel(grey).unwrap(), [0.7, 0.7, 0.7]));
    }

    #[test]
    fn test_alpha_test_scales_with_global_alpha() {
        let mut mat = material(HueColors::default(), HueRecolorOptions::default());
        assert!(mat.shade_texel([1.0, 0.0, 0.0, 0.001]).is_none());
        mat.update_alpha(0.5);
        // 0.001 > 0.0015 * 0.5
        let out = mat.shade_texel([1.0, 0.0, 0.0, 0.001]).unwrap();
        assert_eq!(out[3], 0.5);
    }
}
