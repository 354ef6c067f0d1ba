//! Cosmetic recolor override
//!
//! Knows which slots belong to the hat, the skin and the hair, and turns an
//! outfit's recolor colors into recolor materials for them.

use std::rc::Rc;

use puppet_rig::Slot;
use serde::{Deserialize, Serialize};

use crate::material::{alpha_test_for_slot, MaterialHandle};
use crate::overrides::MaterialOverride;
use crate::recolor::{HueColors, HueRecolorOptions, MaskRecolorOptions, RecolorColors, RecolorFactory};
use crate::texture::{TextureHandle, TextureResolver};

/// Recolorable body slots and the shader variant each switches to.
pub const SKIN_SLOTS: &[(&str, &str)] = &[
    ("Tail", "NewTailShader"),
    ("R_Wing", "R_WingShader"),
    ("L_Wing", "L_WingShader"),
    ("L_Leg", "L_LegShader"),
    ("L_Arm", "L_ArmShader"),
    ("L_Hand", "L_HandShader"),
    ("R_Leg", "R_LegShader"),
    ("R_Arm", "R_ArmShader"),
    ("R_Hand", "R_HandShader"),
    ("L_Ear", "L_EarShader"),
    ("Head", "HeadShader"),
    ("R_Ear", "R_EarShader"),
    ("Cheeks", "CheeksShader"),
    ("Nose", "NoseShader"),
    ("Torso", "TorsoShader"),
    ("L_Lid", "L_LidShader"),
    ("R_Lid", "R_LidShader"),
];

/// Hair slots; every style uses the same shader attachment.
pub const HAIR_SLOTS: &[&str] = &["HairFront", "HairBack"];

pub const HAIR_SHADER: &str = "WindsweptShader";

pub fn is_skin_slot(name: &str) -> bool {
    SKIN_SLOTS.iter().any(|(slot, _)| *slot == name)
}

pub fn is_hair_slot(name: &str) -> bool {
    HAIR_SLOTS.contains(&name)
}

/// Shader-variant attachment for a skin or hair slot.
pub fn shader_attachment_for(slot: &str) -> Option<&'static str> {
    if is_hair_slot(slot) {
        return Some(HAIR_SHADER);
    }
    SKIN_SLOTS
        .iter()
        .find(|(name, _)| *name == slot)
        .map(|(_, shader)| *shader)
}

/// Attachments authored with flat placeholder hues end in `Shader`.
pub fn is_shader_attachment(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with("shader")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CosmeticsConfig {
    /// Slot that shows the equipped hat
    pub hat_slot: String,
    /// Suffix appended to a page stem to find its recolor mask
    /// (`skeleton_2.png` → `skeleton_2_mask.png`)
    pub mask_suffix: String,
    /// Use the mask technique for hats when a mask page resolves
    pub prefer_mask: bool,
    pub mask: MaskRecolorOptions,
}

impl Default for CosmeticsConfig {
    fn default() -> Self {
        Self {
            hat_slot: "Hat_Base".to_string(),
            mask_suffix: "_mask".to_string(),
            prefer_mask: true,
            mask: MaskRecolorOptions::default(),
        }
    }
}

impl CosmeticsConfig {
    pub fn mask_page_name(&self, page: &str) -> String {
        match page.rsplit_once('.') {
            Some((stem, ext)) => format!("{stem}{}.{ext}", self.mask_suffix),
            None => format!("{page}{}", self.mask_suffix),
        }
    }
}

/// Override installed while any outfit part carries recolor colors.
pub struct CosmeticOverride {
    pub hat: Option<RecolorColors>,
    pub skin: Option<RecolorColors>,
    pub hair: Option<RecolorColors>,
    config: CosmeticsConfig,
    masks: Option<Rc<dyn TextureResolver>>,
}

impl CosmeticOverride {
    pub fn new(config: CosmeticsConfig) -> Self {
        Self {
            hat: None,
            skin: None,
            hair: None,
            config,
            masks: None,
        }
    }

    /// Resolver used to look up mask pages for hats.
    pub fn with_masks(mut self, resolver: Rc<dyn TextureResolver>) -> Self {
        self.masks = Some(resolver);
        self
    }

    pub fn config(&self) -> &CosmeticsConfig {
        &self.config
    }

    /// True when no part recolors, in which case the override is pointless.
    pub fn is_empty(&self) -> bool {
        [self.hat, self.skin, self.hair]
            .iter()
            .all(|c| c.as_ref().map_or(true, RecolorColors::is_empty))
    }

    fn mask_for(&self, base: &TextureHandle) -> Option<TextureHandle> {
        if !self.config.prefer_mask {
            return None;
        }
        let masks = self.masks.as_ref()?;
        let mask = masks.resolve(&self.config.mask_page_name(base.name()))?;
        if mask.width() != base.width() || mask.height() != base.height() {
            log::warn!(
                "Mask '{}' is {}x{} but '{}' is {}x{}, using hue recolor",
                mask.name(),
                mask.width(),
                mask.height(),
                base.name(),
                base.width(),
                base.height()
            );
            return None;
        }
        Some(mask)
    }

    fn hue(
        factory: &mut RecolorFactory,
        slot: &Slot,
        attachment: &str,
        base: &TextureHandle,
        colors: &RecolorColors,
    ) -> MaterialHandle {
        factory.hue_recolor(
            base,
            HueColors::from_cosmetic(colors),
            HueRecolorOptions::cosmetic(alpha_test_for_slot(&slot.name)),
            &slot.name,
            attachment,
        )
    }
}

impl MaterialOverride for CosmeticOverride {
    fn resolve(
        &mut self,
        slot: &Slot,
        base: &TextureHandle,
        factory: &mut RecolorFactory,
    ) -> Option<MaterialHandle> {
        let attachment = slot.attachment_name()?;

        if slot.name == self.config.hat_slot {
            let colors = self.hat.filter(|c| !c.is_empty())?;
            if let Some(mask) = self.mask_for(base) {
                let options = MaskRecolorOptions {
                    alpha_test: alpha_test_for_slot(&slot.name),
                    ..self.config.mask
                };
                return Some(factory.mask_recolor(base, &mask, &colors, options, &slot.name, attachment));
            }
            return Some(Self::hue(factory, slot, attachment, base, &colors));
        }

        if !is_shader_attachment(attachment) {
            return None;
        }
        let colors = if is_hair_slot(&slot.name) {
            self.hair
        } else if is_skin_slot(&slot.name) {
            self.skin
        } else {
            None
        }?;
        if colors.is_empty() {
            return None;
        }
        Some(Self::hue(factory, slot, attachment, base, &colors))
    }
}

impl std::fmt::Debug for CosmeticOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosmeticOverride")
            .field("hat", &self.hat)
            .field("skin", &self.skin)
            .field("hair", &self.hair)
            .field("config", &self.config)
            .field("masks", &self.masks.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use puppet_rig::Color;

    #[test]
    fn test_slot_tables() {
        assert_eq!(shader_attachment_for("Tail"), Some("NewTailShader"));
        assert_eq!(shader_attachment_for("Head"), Some("HeadShader"));
        assert_eq!(shader_attachment_for("HairBack"), Some("WindsweptShader"));
        assert_eq!(shader_attachment_for("Hat_Base"), None);
        assert!(is_skin_slot("L_Lid"));
        assert!(!is_skin_slot("L_Pupil"));
        assert!(is_hair_slot("HairFront"));
    }

    #[test]
    fn test_shader_attachment_names() {
        assert!(is_shader_attachment("HeadShader"));
        assert!(is_shader_attachment("newtailshader"));
        assert!(!is_shader_attachment("Head"));
        assert!(!is_shader_attachment("ShaderHead"));
    }

    #[test]
    fn test_mask_page_name() {
        let config = CosmeticsConfig::default();
        assert_eq!(config.mask_page_name("skeleton_2.png"), "skeleton_2_mask.png");
        assert_eq!(config.mask_page_name("hats"), "hats_mask");
    }

    #[test]
    fn test_empty_override() {
        let mut o = CosmeticOverride::new(CosmeticsConfig::default());
        assert!(o.is_empty());
        o.skin = Some(RecolorColors::default());
        assert!(o.is_empty());
        o.hat = Some(RecolorColors {
            r: Some(Color::RED),
            ..Default::default()
        });
        assert!(!o.is_empty());
    }
}
