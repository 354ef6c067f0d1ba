//! Controller and wardrobe tests against the critter rig and bundled catalog

use std::rc::Rc;

use glam::Vec2;
use puppet::{
    load_catalog, CharacterController, Equipped, Outfit, PuppetConfig, Wardrobe,
};
use puppet_idle::{Behavior, BehaviorState, PRIMARY_TRACK};
use puppet_render::{
    MaterialKind, RecolorColors, RenderContext, Texture, TexturePages, TextureResolver,
};
use puppet_rig::{AnimationTracks, SkeletonData};

const CRITTER: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../assets/rigs/critter.ron"
));

const CAP_SKIN: &str = "Hats/Baseball Caps/White Baseball Cap";
const DT: f32 = 1.0 / 30.0;

fn config() -> PuppetConfig {
    let mut config = PuppetConfig::default();
    config.simulation.seed = Some(7);
    config
}

fn controller_with(config: &PuppetConfig) -> CharacterController {
    let data = SkeletonData::from_ron_str(CRITTER).unwrap();
    let mut pages = TexturePages::new();
    pages.insert(Texture::solid("skeleton.png", 8, 8, [255, 255, 255, 255]));
    pages.insert(Texture::solid("skeleton_2.png", 4, 4, [128, 128, 128, 255]));
    pages.insert(Texture::solid("skeleton_2_mask.png", 4, 4, [255, 0, 0, 0]));
    let resolver: Rc<dyn TextureResolver> = Rc::new(pages);

    let wardrobe = Wardrobe::new(load_catalog(None).unwrap(), config.cosmetics.clone())
        .with_masks(resolver.clone());
    CharacterController::new(data, resolver, wardrobe, config)
}

fn controller() -> CharacterController {
    controller_with(&config())
}

fn outfit(hat: Option<&str>, skin: Option<&str>, hair: Option<Equipped>) -> Outfit {
    Outfit {
        name: "test".into(),
        hat: hat.map(Equipped::new),
        skin: skin.map(Equipped::new),
        hair,
    }
}

fn attachment<'a>(controller: &'a CharacterController, slot: &str) -> Option<&'a str> {
    controller.skeleton().find_slot(slot).unwrap().attachment_name()
}

fn material_kind(controller: &CharacterController, slot: &str) -> Option<MaterialKind> {
    controller
        .mesh()
        .renderable(slot)
        .and_then(|r| r.material())
        .map(|m| m.kind())
}

// ============================================================================
// Frame loop
// ============================================================================

#[test]
fn test_starts_on_idle_loop() {
    let c = controller();
    let current = c.state().current(PRIMARY_TRACK).unwrap();
    assert_eq!(current.animation, "Idle/Idle");
    assert!(current.looping);
    assert!(!c.mesh().has_material_override());
}

#[test]
fn test_update_and_refresh_keep_slots_visible() {
    let mut c = controller();
    let mut ctx = RenderContext::new();
    for _ in 0..(10.0 / DT) as usize {
        c.update(DT);
        let stats = c.refresh(&mut ctx);
        assert!(stats.visible >= 5);
        assert_eq!(stats.missing_textures, 0);
    }
    // 10 s with blinks every 2..6 s
    assert!(c.idle().counters().blinks >= 1);

    let (min, max) = c.bounds().unwrap();
    assert!(min.x < max.x && min.y < max.y);
}

#[test]
fn test_bounds_empty_before_refresh() {
    assert!(controller().bounds().is_none());
}

// ============================================================================
// Animation selection
// ============================================================================

#[test]
fn test_set_animation_resolves_names() {
    let mut c = controller();
    assert_eq!(
        c.set_animation("idle/lookaround", false).as_deref(),
        Some("Idle/LookAround")
    );
    assert_eq!(
        c.state().current(PRIMARY_TRACK).unwrap().animation,
        "Idle/LookAround"
    );
    assert_eq!(c.set_animation("Dance", true).as_deref(), Some("Idle/Idle"));
}

#[test]
fn test_startup_animation_from_config() {
    let mut config = config();
    config.character.animation = "read/loop".into();
    let c = controller_with(&config);
    assert_eq!(c.state().current(PRIMARY_TRACK).unwrap().animation, "Read/Loop");
}

#[test]
fn test_force_behavior_by_name() {
    let mut c = controller();
    assert!(!c.force_behavior("dance"));
    assert!(c.force_behavior("glance"));
    assert_eq!(c.idle().state().behavior(), Some(Behavior::Glance));
    // Only one episode at a time
    assert!(!c.force_behavior("extended"));

    c.force_idle();
    assert_eq!(*c.idle().state(), BehaviorState::Idle);
    assert_eq!(c.state().current(PRIMARY_TRACK).unwrap().animation, "Idle/Idle");
}

#[test]
fn test_feet_position_from_character_bone() {
    assert_eq!(controller().feet_local_position(), Vec2::ZERO);

    let mut config = config();
    config.character.character_bone = "torso".into();
    assert_eq!(controller_with(&config).feet_local_position(), Vec2::new(0.0, 20.0));
}

// ============================================================================
// Outfits
// ============================================================================

#[test]
fn test_hat_outfit_equips_skin_and_mask_recolor() {
    let mut c = controller();
    c.apply_outfit(Some(outfit(Some("red_baseball_cap"), None, None)));
    assert_eq!(c.skeleton().skin_name(), Some(CAP_SKIN));
    assert!(c.mesh().has_material_override());

    let mut ctx = RenderContext::new();
    c.refresh(&mut ctx);
    assert_eq!(material_kind(&c, "Hat_Base"), Some(MaterialKind::MaskRecolor));
    // Nothing else recolors
    assert_eq!(material_kind(&c, "Head"), Some(MaterialKind::Basic));
}

#[test]
fn test_plain_hat_installs_no_override() {
    let mut c = controller();
    c.apply_outfit(Some(outfit(Some("top_hat"), None, None)));
    assert_eq!(c.skeleton().skin_name(), Some("Hats/Top Hat"));
    assert!(!c.mesh().has_material_override());
    assert_eq!(c.outfit().unwrap().hat, Some(Equipped::new("top_hat")));
}

#[test]
fn test_skin_outfit_switches_to_shader_variants() {
    let mut c = controller();
    c.apply_outfit(Some(outfit(None, Some("skin_sunset"), None)));
    assert_eq!(attachment(&c, "Tail"), Some("NewTailShader"));
    assert_eq!(attachment(&c, "Torso"), Some("TorsoShader"));
    assert_eq!(attachment(&c, "Head"), Some("HeadShader"));
    assert_eq!(attachment(&c, "L_Lid"), Some("L_LidShader"));
    // The default skin is never equipped explicitly
    assert_eq!(c.skeleton().skin_name(), None);

    let mut ctx = RenderContext::new();
    c.refresh(&mut ctx);
    assert_eq!(material_kind(&c, "Head"), Some(MaterialKind::HueIndexed));
    assert_eq!(material_kind(&c, "L_Pupil"), Some(MaterialKind::Basic));
}

#[test]
fn test_hair_styles_pick_their_slots() {
    let mut c = controller();
    c.apply_outfit(Some(outfit(None, None, Some(Equipped::new("windswept_short")))));
    assert_eq!(attachment(&c, "HairFront"), Some("WindsweptShader"));
    assert_eq!(attachment(&c, "HairBack"), None);

    c.apply_outfit(Some(outfit(None, None, Some(Equipped::new("windswept_long")))));
    assert_eq!(attachment(&c, "HairFront"), Some("WindsweptShader"));
    assert_eq!(attachment(&c, "HairBack"), Some("WindsweptShader"));
}

#[test]
fn test_hair_without_colors_stays_hidden() {
    let mut c = controller();
    let hair = Equipped {
        item: "windswept_long".into(),
        recolor: Some(RecolorColors::default()),
    };
    c.apply_outfit(Some(outfit(None, None, Some(hair))));
    assert_eq!(attachment(&c, "HairFront"), None);
    assert_eq!(attachment(&c, "HairBack"), None);
    assert!(!c.mesh().has_material_override());
}

#[test]
fn test_clearing_outfit_drops_override_only() {
    let mut c = controller();
    c.apply_outfit(Some(outfit(Some("blue_baseball_cap"), Some("skin_ocean"), None)));
    assert!(c.mesh().has_material_override());

    c.apply_outfit(None);
    assert!(!c.mesh().has_material_override());
    assert!(c.outfit().is_none());
    // Skin stays equipped
    assert_eq!(c.skeleton().skin_name(), Some(CAP_SKIN));

    let mut ctx = RenderContext::new();
    c.refresh(&mut ctx);
    assert_eq!(material_kind(&c, "Hat_Base"), Some(MaterialKind::Basic));
}

#[test]
fn test_unknown_items_are_ignored() {
    let mut c = controller();
    c.apply_outfit(Some(outfit(Some("no_such_hat"), Some("no_such_skin"), None)));
    assert_eq!(c.skeleton().skin_name(), None);
    assert!(!c.mesh().has_material_override());
}

#[test]
fn test_bundled_outfits_parse() {
    for source in [
        include_str!("../../../assets/outfits/sunset_reader.ron"),
        include_str!("../../../assets/outfits/top_hat.ron"),
    ] {
        let outfit = Outfit::from_ron_str(source).unwrap();
        assert!(outfit.hat.is_some());
    }
}
