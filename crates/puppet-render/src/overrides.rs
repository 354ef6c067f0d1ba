//! Material override seam
//!
//! The renderer asks an override for a material before falling back to the
//! default cache. Overrides compose through [`OverrideChain`], so hat, skin
//! and hair systems stay independent of each other and of the renderer.

use puppet_rig::Slot;

use crate::material::MaterialHandle;
use crate::recolor::RecolorFactory;
use crate::texture::TextureHandle;

pub trait MaterialOverride {
    /// Material for this slot, or `None` to use the default material.
    fn resolve(
        &mut self,
        slot: &Slot,
        base: &TextureHandle,
        factory: &mut RecolorFactory,
    ) -> Option<MaterialHandle>;
}

impl<F> MaterialOverride for F
where
    F: FnMut(&Slot, &TextureHandle, &mut RecolorFactory) -> Option<MaterialHandle>,
{
    fn resolve(
        &mut self,
        slot: &Slot,
        base: &TextureHandle,
        factory: &mut RecolorFactory,
    ) -> Option<MaterialHandle> {
        self(slot, base, factory)
    }
}

/// Chain of responsibility: the first override returning a material wins.
#[derive(Default)]
pub struct OverrideChain {
    links: Vec<Box<dyn MaterialOverride>>,
}

impl OverrideChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, link: impl MaterialOverride + 'static) -> Self {
        self.push(link);
        self
    }

    pub fn push(&mut self, link: impl MaterialOverride + 'static) {
        self.links.push(Box::new(link));
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

impl MaterialOverride for OverrideChain {
    fn resolve(
        &mut self,
        slot: &Slot,
        base: &TextureHandle,
        factory: &mut RecolorFactory,
    ) -> Option<MaterialHandle> {
        self.links
            .iter_mut()
            .find_map(|link| link.resolve(slot, base, factory))
    }
}

impl std::fmt::Debug for OverrideChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverrideChain")
            .field("links", &self.links.len())
            .finish()
    }
}
