//! Character controller: one rig instance with its tracks, idle driver and mesh

use std::rc::Rc;
use std::sync::Arc;

use glam::Vec2;
use puppet_idle::{Behavior, IdleDriver, PRIMARY_TRACK};
use puppet_render::{FrameStats, MaterialOverride, RenderContext, SkeletonMesh, TextureResolver};
use puppet_rig::{AnimationState, AnimationTracks, Skeleton, SkeletonData};

use crate::config::PuppetConfig;
use crate::wardrobe::{Outfit, Wardrobe};

/// Owns everything needed to animate and draw one character.
///
/// Per frame: [`update`](Self::update) with the elapsed time, then
/// [`refresh`](Self::refresh) before drawing the mesh.
pub struct CharacterController {
    skeleton: Skeleton,
    state: AnimationState,
    idle: IdleDriver,
    mesh: SkeletonMesh,
    wardrobe: Wardrobe,
    outfit: Option<Outfit>,
    character_bone: Option<usize>,
}

impl CharacterController {
    pub fn new(
        data: Arc<SkeletonData>,
        resolver: Rc<dyn TextureResolver>,
        wardrobe: Wardrobe,
        config: &PuppetConfig,
    ) -> Self {
        let mut skeleton = Skeleton::new(data.clone());
        skeleton.set_to_setup_pose();
        skeleton.update_world_transform();

        let mut state = AnimationState::new(data.clone());
        let mut idle = match config.simulation.seed {
            Some(seed) => IdleDriver::with_seed(config.idle.clone(), seed),
            None => IdleDriver::from_entropy(config.idle.clone()),
        };
        idle.start(&mut state);

        let mesh = SkeletonMesh::new(&skeleton, resolver, config.renderer.clone());
        let character_bone = data.find_bone(&config.character.character_bone);
        if character_bone.is_none() {
            log::debug!(
                "Rig '{}' has no '{}' bone, feet stay at the origin",
                data.name,
                config.character.character_bone
            );
        }

        let mut controller = Self {
            skeleton,
            state,
            idle,
            mesh,
            wardrobe,
            outfit: None,
            character_bone,
        };
        if controller.idle.config().clips.idle != config.character.animation {
            controller.set_animation(&config.character.animation, true);
        }
        log::info!(
            "Character '{}' ready with {} slots",
            data.name,
            controller.skeleton.slots().len()
        );
        controller
    }

    /// Advance behaviors and tracks by `dt` seconds and re-pose the skeleton.
    pub fn update(&mut self, dt: f32) {
        self.idle.update(dt, &mut self.state);
        self.state.apply(&mut self.skeleton);
        self.skeleton.update_world_transform();
    }

    /// Rebuild draw data for the current pose.
    pub fn refresh(&mut self, ctx: &mut RenderContext) -> FrameStats {
        self.mesh.refresh(&self.skeleton, ctx)
    }

    /// Play a clip on the primary track, falling back to a clip that exists.
    ///
    /// Returns the name actually played.
    pub fn set_animation(&mut self, name: &str, looping: bool) -> Option<String> {
        let resolved = resolve_animation(
            self.skeleton.data(),
            name,
            &self.idle.config().clips.idle,
        )?;
        self.state.set_animation(PRIMARY_TRACK, &resolved, looping)?;
        Some(resolved)
    }

    /// Start an episode by name (`glance`, `extended`, ...).
    pub fn force_behavior(&mut self, name: &str) -> bool {
        match name.parse::<Behavior>() {
            Ok(behavior) => self.idle.force_behavior(behavior, &mut self.state),
            Err(e) => {
                log::warn!("{}", e);
                false
            }
        }
    }

    pub fn force_idle(&mut self) {
        self.idle.force_idle(&mut self.state);
    }

    /// Equip an outfit, or drop recoloring with `None`.
    pub fn apply_outfit(&mut self, outfit: Option<Outfit>) {
        let cosmetic = self.wardrobe.apply(outfit.as_ref(), &mut self.skeleton);
        self.mesh
            .set_material_override(cosmetic.map(|c| Box::new(c) as Box<dyn MaterialOverride>));
        self.outfit = outfit;
    }

    /// Local position of the character bone, where the feet touch the ground.
    pub fn feet_local_position(&self) -> Vec2 {
        self.character_bone
            .and_then(|i| self.skeleton.bones().get(i))
            .map_or(Vec2::ZERO, |bone| Vec2::new(bone.local.x, bone.local.y))
    }

    /// World-space bounding box `(min, max)` of every visible slot after the
    /// last refresh.
    pub fn bounds(&self) -> Option<(Vec2, Vec2)> {
        self.mesh
            .draw_list()
            .into_iter()
            .flat_map(|r| r.vertices().iter())
            .map(|v| Vec2::from_array(v.position))
            .fold(None, |acc, p| match acc {
                None => Some((p, p)),
                Some((min, max)) => Some((min.min(p), max.max(p))),
            })
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn skeleton_mut(&mut self) -> &mut Skeleton {
        &mut self.skeleton
    }

    pub fn state(&self) -> &AnimationState {
        &self.state
    }

    pub fn idle(&self) -> &IdleDriver {
        &self.idle
    }

    pub fn idle_mut(&mut self) -> &mut IdleDriver {
        &mut self.idle
    }

    pub fn mesh(&self) -> &SkeletonMesh {
        &self.mesh
    }

    pub fn outfit(&self) -> Option<&Outfit> {
        self.outfit.as_ref()
    }

    pub fn wardrobe(&self) -> &Wardrobe {
        &self.wardrobe
    }
}

/// Exact name, then case-insensitive, then the idle loop, then the first clip.
fn resolve_animation(data: &SkeletonData, requested: &str, idle: &str) -> Option<String> {
    if data.find_animation(requested).is_some() {
        return Some(requested.to_string());
    }
    if let Some(clip) = data
        .animations
        .iter()
        .find(|clip| clip.name.eq_ignore_ascii_case(requested))
    {
        return Some(clip.name.clone());
    }

    let fallback = data
        .find_animation(idle)
        .or_else(|| data.animations.first());
    match fallback {
        Some(clip) => {
            log::warn!(
                "Animation '{}' not found in '{}', using '{}'",
                requested,
                data.name,
                clip.name
            );
            Some(clip.name.clone())
        }
        None => {
            log::warn!("Rig '{}' has no animations", data.name);
            None
        }
    }
}
