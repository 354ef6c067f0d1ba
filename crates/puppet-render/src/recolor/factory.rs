//! Recolor material cache
//!
//! Identical requests share one material instance. The key covers texture
//! identity, every resolved color, the slot and attachment the material is
//! made for, and the option flags. Nothing is evicted automatically; use
//! `retire`, `retain` or `clear` when a configuration is dropped for good.

use ahash::AHashMap;

use super::{
    HueColors, HueRecolorMaterial, HueRecolorOptions, MaskColors, MaskRecolorMaterial,
    MaskRecolorOptions, RecolorColors,
};
use crate::material::{Material, MaterialHandle};
use crate::texture::{TextureHandle, TextureId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecolorTechnique {
    Mask,
    Hue,
}

/// Composite cache key for a recolor material.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecolorKey {
    pub technique: RecolorTechnique,
    pub base: TextureId,
    pub mask: Option<TextureId>,
    pub slot: String,
    pub attachment: String,
    colors: [[u32; 4]; 4],
    alpha_test: u32,
    premultiplied_alpha: bool,
    shade: bool,
    preserve_dark: u32,
    extra: [u32; 3],
}

impl RecolorKey {
    fn for_material(material: &Material, slot: &str, attachment: &str) -> Option<Self> {
        let key = match material {
            Material::Basic(_) => return None,
            Material::MaskRecolor(m) => {
                let o = m.options();
                Self {
                    technique: RecolorTechnique::Mask,
                    base: m.base().id(),
                    mask: Some(m.mask().id()),
                    slot: slot.to_string(),
                    attachment: attachment.to_string(),
                    colors: m.colors().key_bits(),
                    alpha_test: o.alpha_test.to_bits(),
                    premultiplied_alpha: o.premultiplied_alpha,
                    shade: o.mode.factor() > 0.0,
                    preserve_dark: o.preserve_dark_threshold.to_bits(),
                    extra: o.key_bits(),
                }
            }
            Material::HueIndexed(m) => {
                let o = m.options();
                Self {
                    technique: RecolorTechnique::Hue,
                    base: m.base().id(),
                    mask: None,
                    slot: slot.to_string(),
                    attachment: attachment.to_string(),
                    colors: m.colors().key_bits(),
                    alpha_test: o.alpha_test.to_bits(),
                    premultiplied_alpha: true,
                    shade: o.shade_mode,
                    preserve_dark: o.preserve_dark_threshold.to_bits(),
                    extra: o.key_bits(),
                }
            }
        };
        Some(key)
    }
}

/// Builds and caches recolor materials.
///
/// Owned by a render context rather than shared globally, so separate
/// previews never see each other's materials.
#[derive(Debug, Default)]
pub struct RecolorFactory {
    entries: AHashMap<RecolorKey, MaterialHandle>,
    created: usize,
}

impl RecolorFactory {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_insert(&mut self, material: Material, slot: &str, attachment: &str) -> MaterialHandle {
        let Some(key) = RecolorKey::for_material(&material, slot, attachment) else {
            return MaterialHandle::new(material);
        };
        if let Some(found) = self.entries.get(&key) {
            return found.clone();
        }
        log::debug!(
            "Creating {:?} recolor material for slot '{}' attachment '{}' on '{}'",
            key.technique,
            slot,
            attachment,
            material.texture().name()
        );
        let handle = MaterialHandle::new(material);
        self.entries.insert(key, handle.clone());
        self.created += 1;
        handle
    }

    /// Mask-weighted material for one slot/attachment.
    pub fn mask_recolor(
        &mut self,
        base: &TextureHandle,
        mask: &TextureHandle,
        colors: &RecolorColors,
        options: MaskRecolorOptions,
        slot: &str,
        attachment: &str,
    ) -> MaterialHandle {
        let material = MaskRecolorMaterial::new(
            base.clone(),
            mask.clone(),
            MaskColors::from(colors),
            options,
        );
        self.get_or_insert(Material::MaskRecolor(material), slot, attachment)
    }

    /// Hue-indexed material for one slot/attachment.
    pub fn hue_recolor(
        &mut self,
        base: &TextureHandle,
        colors: HueColors,
        options: HueRecolorOptions,
        slot: &str,
        attachment: &str,
    ) -> MaterialHandle {
        let material = HueRecolorMaterial::new(base.clone(), colors, options);
        self.get_or_insert(Material::HueIndexed(material), slot, attachment)
    }

    /// Partially update colors in place, keeping the cache key in sync.
    pub fn update_colors(&mut self, material: &MaterialHandle, colors: &RecolorColors) -> bool {
        let updated = match &mut *material.borrow_mut() {
            Material::Basic(_) => false,
            Material::MaskRecolor(m) => {
                m.update_colors(colors);
                true
            }
            Material::HueIndexed(m) => {
                m.update_colors(colors);
                true
            }
        };
        if updated {
            self.rekey(material);
        }
        updated
    }

    /// Edit mask options in place. Returns false for other material kinds.
    pub fn update_mask_options(
        &mut self,
        material: &MaterialHandle,
        edit: impl FnOnce(&mut MaskRecolorOptions),
    ) -> bool {
        let updated = match &mut *material.borrow_mut() {
            Material::MaskRecolor(m) => {
                m.update_options(edit);
                true
            }
            _ => false,
        };
        if updated {
            self.rekey(material);
        }
        updated
    }

    /// Edit hue options in place. Returns false for other material kinds.
    pub fn update_hue_options(
        &mut self,
        material: &MaterialHandle,
        edit: impl FnOnce(&mut HueRecolorOptions),
    ) -> bool {
        let updated = match &mut *material.borrow_mut() {
            Material::HueIndexed(m) => {
                m.update_options(edit);
                true
            }
            _ => false,
        };
        if updated {
            self.rekey(material);
        }
        updated
    }

    /// Per-frame global alpha (clamped to 0..1). Not part of the key.
    pub fn update_alpha(&self, material: &MaterialHandle, alpha: f32) {
        material.borrow_mut().set_global_alpha(alpha);
    }

    fn rekey(&mut self, material: &MaterialHandle) {
        let Some(old) = self
            .entries
            .iter()
            .find(|(_, m)| m.ptr_eq(material))
            .map(|(k, _)| k.clone())
        else {
            return;
        };
        self.entries.remove(&old);
        let new = RecolorKey::for_material(&material.borrow(), &old.slot, &old.attachment);
        if let Some(new) = new {
            if let Some(displaced) = self.entries.insert(new, material.clone()) {
                log::debug!("Recolor material {} displaced by update", displaced.id());
            }
        }
    }

    /// Drop a material from the cache. Existing handles stay valid.
    pub fn retire(&mut self, material: &MaterialHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|_, m| !m.ptr_eq(material));
        before != self.entries.len()
    }

    /// Keep only the entries for which `keep` returns true.
    pub fn retain(&mut self, mut keep: impl FnMut(&RecolorKey, &MaterialHandle) -> bool) {
        self.entries.retain(|k, m| keep(k, m));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Materials created over the factory's lifetime.
    pub fn created(&self) -> usize {
        self.created
    }
}
