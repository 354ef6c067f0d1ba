//! Materials and the default material cache

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashMap;
use glam::Vec2;

use crate::recolor::{HueRecolorMaterial, MaskRecolorMaterial};
use crate::texture::{TextureHandle, TextureId};

/// Alpha test applied to every slot except the delicate ones.
pub const DEFAULT_ALPHA_TEST: f32 = 0.0015;

/// True for pupil slots (`Pupil`, `L_Pupil`, `R-Pupil`, `eye_LPupil`, ...).
///
/// Pupils are tiny and soft-edged, so any alpha test eats them.
pub fn is_pupil_slot(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    let Some(prefix) = lower.strip_suffix("pupil") else {
        return false;
    };
    // Optional '_' then optional side letter, read from the end, must leave
    // either nothing or a '_'/'-' separator.
    fn boundary(s: &str) -> bool {
        s.is_empty() || s.ends_with(['_', '-'])
    }
    fn side(s: &str) -> Option<&str> {
        s.strip_suffix('l').or_else(|| s.strip_suffix('r'))
    }

    let mut stems = vec![prefix];
    if let Some(s) = prefix.strip_suffix('_') {
        stems.push(s);
    }
    stems
        .into_iter()
        .any(|s| boundary(s) || side(s).is_some_and(boundary))
}

/// Alpha test for a slot: zero for pupils, the default otherwise.
pub fn alpha_test_for_slot(name: &str) -> f32 {
    if is_pupil_slot(name) {
        0.0
    } else {
        DEFAULT_ALPHA_TEST
    }
}

/// Plain textured material. Tint and opacity live on the renderable so one
/// cached material can serve every slot that shares a page.
#[derive(Debug, Clone)]
pub struct BasicMaterial {
    pub texture: TextureHandle,
    pub premultiplied_alpha: bool,
    pub alpha_test: f32,
}

impl BasicMaterial {
    /// CPU reference of the basic fragment shader. `tint` is the
    /// renderable's (already premultiplied when PMA is on) color.
    pub fn shade(&self, uv: Vec2, tint: [f32; 4]) -> Option<[f32; 4]> {
        let tex = self.texture.sample(uv)?;
        if tex[3] <= self.alpha_test {
            return None;
        }
        let rgb = if self.premultiplied_alpha {
            [tex[0] * tex[3], tex[1] * tex[3], tex[2] * tex[3]]
        } else {
            [tex[0], tex[1], tex[2]]
        };
        Some([
            rgb[0] * tint[0],
            rgb[1] * tint[1],
            rgb[2] * tint[2],
            tex[3] * tint[3],
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MaterialKind {
    Basic,
    MaskRecolor,
    HueIndexed,
}

#[derive(Debug, Clone)]
pub enum Material {
    Basic(BasicMaterial),
    MaskRecolor(MaskRecolorMaterial),
    HueIndexed(HueRecolorMaterial),
}

impl Material {
    pub fn kind(&self) -> MaterialKind {
        match self {
            Self::Basic(_) => MaterialKind::Basic,
            Self::MaskRecolor(_) => MaterialKind::MaskRecolor,
            Self::HueIndexed(_) => MaterialKind::HueIndexed,
        }
    }

    pub fn texture(&self) -> &TextureHandle {
        match self {
            Self::Basic(m) => &m.texture,
            Self::MaskRecolor(m) => m.base(),
            Self::HueIndexed(m) => m.base(),
        }
    }

    pub fn is_recolor(&self) -> bool {
        !matches!(self, Self::Basic(_))
    }

    pub fn alpha_test(&self) -> f32 {
        match self {
            Self::Basic(m) => m.alpha_test,
            Self::MaskRecolor(m) => m.options().alpha_test,
            Self::HueIndexed(m) => m.options().alpha_test,
        }
    }

    /// Write the per-frame global alpha into a recolor material.
    /// Basic materials take their alpha from the renderable instead.
    pub fn set_global_alpha(&mut self, alpha: f32) {
        match self {
            Self::Basic(_) => {}
            Self::MaskRecolor(m) => m.update_alpha(alpha),
            Self::HueIndexed(m) => m.update_alpha(alpha),
        }
    }

    /// Shade one UV sample on the CPU; `None` means the fragment is discarded.
    pub fn shade(&self, uv: Vec2, tint: [f32; 4]) -> Option<[f32; 4]> {
        match self {
            Self::Basic(m) => m.shade(uv, tint),
            Self::MaskRecolor(m) => m.sample(uv),
            Self::HueIndexed(m) => m.sample(uv),
        }
    }
}

static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(1);

/// Shared handle to a material.
///
/// Cloning shares the material; `ptr_eq` tells cache hits apart from fresh
/// instances. Rendering is single-threaded, so `Rc<RefCell<_>>` suffices.
#[derive(Debug, Clone)]
pub struct MaterialHandle {
    id: u64,
    inner: Rc<RefCell<Material>>,
}

impl MaterialHandle {
    pub fn new(material: Material) -> Self {
        Self {
            id: NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed),
            inner: Rc::new(RefCell::new(material)),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn ptr_eq(&self, other: &MaterialHandle) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn borrow(&self) -> Ref<'_, Material> {
        self.inner.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Material> {
        self.inner.borrow_mut()
    }

    pub fn kind(&self) -> MaterialKind {
        self.inner.borrow().kind()
    }
}

impl PartialEq for MaterialHandle {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BasicKey {
    texture: TextureId,
    alpha_test: u32,
    premultiplied_alpha: bool,
}

/// Default materials keyed by (texture, alpha test, premultiplied alpha).
#[derive(Debug, Default)]
pub struct MaterialCache {
    map: AHashMap<BasicKey, MaterialHandle>,
    created: usize,
}

impl MaterialCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch or create the basic material for this key.
    pub fn get(
        &mut self,
        texture: &TextureHandle,
        premultiplied_alpha: bool,
        alpha_test: f32,
    ) -> MaterialHandle {
        let key = BasicKey {
            texture: texture.id(),
            alpha_test: alpha_test.to_bits(),
            premultiplied_alpha,
        };
        if let Some(found) = self.map.get(&key) {
            return found.clone();
        }
        log::debug!(
            "Creating basic material for '{}' (alpha_test={}, pma={})",
            texture.name(),
            alpha_test,
            premultiplied_alpha
        );
        let handle = MaterialHandle::new(Material::Basic(BasicMaterial {
            texture: texture.clone(),
            premultiplied_alpha,
            alpha_test,
        }));
        self.map.insert(key, handle.clone());
        self.created += 1;
        handle
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Materials created over the cache's lifetime.
    pub fn created(&self) -> usize {
        self.created
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }
}
