//! Skeletal mesh renderer
//!
//! [`SkeletonMesh::refresh`] walks the skeleton's draw order once per frame
//! and rewrites one [`SlotRenderable`] per slot. Failures stay local to the
//! slot: it is hidden for the frame and the walk continues.

use std::rc::Rc;

use ahash::AHashSet;
use glam::Vec2;
use puppet_rig::{Attachment, Color, Skeleton, Slot, QUAD_TRIANGLES};
use serde::{Deserialize, Serialize};

use crate::clipping::{ClipOutcome, SkeletonClipper};
use crate::geometry::SlotRenderable;
use crate::material::{alpha_test_for_slot, Material, MaterialCache, MaterialHandle};
use crate::overrides::MaterialOverride;
use crate::recolor::RecolorFactory;
use crate::texture::{TextureHandle, TextureResolver};

const QUAD: &[u16] = &QUAD_TRIANGLES;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    pub premultiplied_alpha: bool,
    /// Equippable accessory slot drawn slightly ahead of its draw index
    pub head_accessory_slot: Option<String>,
    /// Subtracted from the accessory's order; kept inside (0, 1)
    pub head_accessory_bias: f32,
    /// Page tried when neither the atlas page nor the attachment resolves
    pub default_page: String,
    /// Combined alpha at or below which a slot is hidden
    pub visibility_epsilon: f32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            premultiplied_alpha: true,
            head_accessory_slot: Some("Hat_Base".to_string()),
            head_accessory_bias: 0.1,
            default_page: "skeleton.png".to_string(),
            visibility_epsilon: 0.001,
        }
    }
}

/// Material caches shared by every mesh drawn into the same scene.
///
/// Separate contexts never share materials, so a preview and the main scene
/// can each own one.
#[derive(Debug, Default)]
pub struct RenderContext {
    pub materials: MaterialCache,
    pub recolor: RecolorFactory,
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Per-frame counters returned by `refresh`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub visible: usize,
    pub hidden: usize,
    /// Slots whose geometry went through the clipper
    pub clipped: usize,
    pub clip_regions: usize,
    pub missing_textures: usize,
    pub triangles: usize,
}

pub struct SkeletonMesh {
    config: RendererConfig,
    renderables: Vec<SlotRenderable>,
    clipper: SkeletonClipper,
    material_override: Option<Box<dyn MaterialOverride>>,
    resolver: Rc<dyn TextureResolver>,
    world: Vec<Vec2>,
    /// Texture candidates already reported missing, to keep logs readable
    reported: AHashSet<String>,
}

impl SkeletonMesh {
    pub fn new(skeleton: &Skeleton, resolver: Rc<dyn TextureResolver>, config: RendererConfig) -> Self {
        let mut config = config;
        if !(config.head_accessory_bias > 0.0 && config.head_accessory_bias < 1.0) {
            log::warn!(
                "head_accessory_bias {} outside (0, 1), using 0.1",
                config.head_accessory_bias
            );
            config.head_accessory_bias = 0.1;
        }
        log::info!(
            "Creating mesh for skeleton '{}' ({} slots)",
            skeleton.data().name,
            skeleton.slots().len()
        );
        Self {
            config,
            renderables: skeleton
                .slots()
                .iter()
                .map(|s| SlotRenderable::new(s.name.clone()))
                .collect(),
            clipper: SkeletonClipper::new(),
            material_override: None,
            resolver,
            world: Vec::new(),
            reported: AHashSet::new(),
        }
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn set_material_override(&mut self, material_override: Option<Box<dyn MaterialOverride>>) {
        self.material_override = material_override;
    }

    pub fn has_material_override(&self) -> bool {
        self.material_override.is_some()
    }

    pub fn set_resolver(&mut self, resolver: Rc<dyn TextureResolver>) {
        self.resolver = resolver;
        self.reported.clear();
    }

    pub fn resolver(&self) -> &Rc<dyn TextureResolver> {
        &self.resolver
    }

    /// Renderables indexed by slot index.
    pub fn renderables(&self) -> &[SlotRenderable] {
        &self.renderables
    }

    pub fn renderable(&self, slot_name: &str) -> Option<&SlotRenderable> {
        self.renderables.iter().find(|r| r.slot_name() == slot_name)
    }

    /// Visible renderables in paint order.
    pub fn draw_list(&self) -> Vec<&SlotRenderable> {
        let mut list: Vec<&SlotRenderable> = self
            .renderables
            .iter()
            .filter(|r| r.visible && r.material().is_some())
            .collect();
        list.sort_by(|a, b| a.render_order.total_cmp(&b.render_order));
        list
    }

    /// Rebuild every slot's geometry and material for the current pose.
    ///
    /// Call after the pose and world transforms are updated for the frame.
    pub fn refresh(&mut self, skeleton: &Skeleton, ctx: &mut RenderContext) -> FrameStats {
        if self.renderables.len() != skeleton.slots().len() {
            log::warn!(
                "Slot count changed ({} -> {}), rebuilding renderables",
                self.renderables.len(),
                skeleton.slots().len()
            );
            self.renderables = skeleton
                .slots()
                .iter()
                .map(|s| SlotRenderable::new(s.name.clone()))
                .collect();
        }

        let Self {
            config,
            renderables,
            clipper,
            material_override,
            resolver,
            world,
            reported,
        } = self;
        let config = &*config;

        let mut stats = FrameStats::default();
        let mut drawn = vec![false; renderables.len()];
        clipper.clip_end();

        for (order, &slot_index) in skeleton.draw_order.iter().enumerate() {
            let Some(slot) = skeleton.slot(slot_index) else {
                continue;
            };
            drawn[slot_index] = true;
            let renderable = &mut renderables[slot_index];

            let visible = match slot.attachment().map(|a| &**a) {
                None => false,
                Some(Attachment::Clipping(clip)) => {
                    clip.vertices.compute_world_vertices(skeleton, slot.bone, world);
                    if clipper.clip_start(clip, world) > 0 {
                        stats.clip_regions += 1;
                    }
                    false
                }
                Some(attachment) => match resolve_texture(&**resolver, config, slot, attachment) {
                    Some(texture) => SlotFrame {
                        config,
                        clipper: &mut *clipper,
                        material_override: &mut *material_override,
                        world: &mut *world,
                        stats: &mut stats,
                    }
                    .draw(skeleton, slot, attachment, &texture, order, renderable, ctx),
                    None => {
                        if reported.insert(attachment.name().to_string()) {
                            log::warn!(
                                "No texture for attachment '{}' on slot '{}', hiding",
                                attachment.name(),
                                slot.name
                            );
                        }
                        stats.missing_textures += 1;
                        false
                    }
                },
            };

            renderable.visible = visible;
            if visible {
                stats.visible += 1;
                stats.triangles += renderable.triangle_count();
            } else {
                stats.hidden += 1;
            }
            clipper.clip_end_with_slot(&slot.name);
        }
        clipper.clip_end();

        // Slots missing from the draw order are not painted this frame
        for (renderable, drawn) in renderables.iter_mut().zip(drawn) {
            if !drawn {
                renderable.hide();
            }
        }
        log::trace!("Frame: {:?}", stats);
        stats
    }
}

/// Texture candidates in order: atlas page, region name,
/// `<attachment>.png`, the default page.
fn resolve_texture(
    resolver: &dyn TextureResolver,
    config: &RendererConfig,
    slot: &Slot,
    attachment: &Attachment,
) -> Option<TextureHandle> {
    let region = attachment.region();
    let file = format!("{}.png", attachment.path().unwrap_or(attachment.name()));
    let candidates = [
        region.map(|r| r.page.as_str()),
        region.map(|r| r.name.as_str()),
        Some(file.as_str()),
        Some(config.default_page.as_str()),
    ];
    let found = candidates
        .into_iter()
        .flatten()
        .find_map(|name| resolver.resolve(name));
    if found.is_none() {
        log::debug!("No texture candidate resolved for slot '{}'", slot.name);
    }
    found
}

/// Borrowed state for drawing one slot.
struct SlotFrame<'a> {
    config: &'a RendererConfig,
    clipper: &'a mut SkeletonClipper,
    material_override: &'a mut Option<Box<dyn MaterialOverride>>,
    world: &'a mut Vec<Vec2>,
    stats: &'a mut FrameStats,
}

impl SlotFrame<'_> {
    /// Returns whether the slot ends up visible.
    #[allow(clippy::too_many_arguments)]
    fn draw(
        &mut self,
        skeleton: &Skeleton,
        slot: &Slot,
        attachment: &Attachment,
        texture: &TextureHandle,
        order: usize,
        renderable: &mut SlotRenderable,
        ctx: &mut RenderContext,
    ) -> bool {
        renderable.render_order = order as f32;
        if self.config.head_accessory_slot.as_deref() == Some(slot.name.as_str()) {
            renderable.render_order -= self.config.head_accessory_bias;
        }

        let (uvs, triangles): (&[Vec2], &[u16]) = match attachment {
            Attachment::Region(region) => {
                region.compute_world_vertices(skeleton.bone_world(slot.bone), self.world);
                (&region.uvs[..], QUAD)
            }
            Attachment::Mesh(mesh) => {
                mesh.vertices
                    .compute_world_vertices(skeleton, slot.bone, self.world);
                (&mesh.uvs[..], &mesh.triangles[..])
            }
            Attachment::Clipping(_) => return false,
        };
        if uvs.len() < self.world.len() {
            log::warn!(
                "Attachment '{}' has {} uvs for {} vertices, hiding",
                attachment.name(),
                uvs.len(),
                self.world.len()
            );
            renderable.clear();
            return false;
        }

        if self.clipper.is_clipping() {
            self.stats.clipped += 1;
            match self.clipper.clip_triangles(self.world, uvs, triangles) {
                ClipOutcome::Unchanged => renderable.set_geometry(self.world, uvs, triangles),
                ClipOutcome::Clipped if self.clipper.triangles().is_empty() => {
                    renderable.clear();
                    return false;
                }
                ClipOutcome::Clipped => renderable.set_geometry(
                    self.clipper.positions(),
                    self.clipper.uvs(),
                    self.clipper.triangles(),
                ),
            }
        } else {
            renderable.set_geometry(self.world, uvs, triangles);
        }

        let material = self
            .material_override
            .as_mut()
            .and_then(|o| o.resolve(slot, texture, &mut ctx.recolor))
            .unwrap_or_else(|| {
                ctx.materials.get(
                    texture,
                    self.config.premultiplied_alpha,
                    alpha_test_for_slot(&slot.name),
                )
            });

        let tint = slot
            .color
            .mul(&skeleton.color)
            .mul(&attachment.color());
        renderable.tint = apply_tint(&material, tint, self.config.premultiplied_alpha);
        renderable.set_material(Some(material));

        tint.a > self.config.visibility_epsilon
    }
}

/// Renderable tint for a material. Basic materials take the color directly
/// (premultiplied when PMA is on); recolor materials get alpha as a uniform.
fn apply_tint(material: &MaterialHandle, tint: Color, premultiplied_alpha: bool) -> [f32; 4] {
    let mut inner = material.borrow_mut();
    match &mut *inner {
        Material::Basic(_) if premultiplied_alpha => {
            [tint.r * tint.a, tint.g * tint.a, tint.b * tint.a, tint.a]
        }
        Material::Basic(_) => tint.to_array(),
        recolor => {
            recolor.set_global_alpha(tint.a);
            [1.0; 4]
        }
    }
}
