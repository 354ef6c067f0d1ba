//! Integration tests against the shared critter rig

use std::sync::Arc;

use glam::Vec2;
use puppet_rig::{
    AnimationState, AnimationTracks, Attachment, RigError, Skeleton, SkeletonData,
};

const CRITTER: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../assets/rigs/critter.ron"
));

const CAP_SKIN: &str = "Hats/Baseball Caps/White Baseball Cap";

fn critter() -> Arc<SkeletonData> {
    SkeletonData::from_ron_str(CRITTER).expect("critter rig should parse")
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_fixture_loads() {
    let data = critter();
    assert_eq!(data.name, "critter");
    assert_eq!(data.slots.len(), 10);
    assert_eq!(data.find_slot("Hat_Base"), Some(9));
    assert_eq!(data.bone_parent(data.find_bone("eyes").unwrap()), data.find_bone("head"));
    assert!(data.default_skin().is_some());
    assert!(data.find_animation("Idle/Idle").is_some());
}

#[test]
fn test_malformed_ron_is_parse_error() {
    let err = SkeletonData::from_ron_str("(name: \"broken\", bones: [").unwrap_err();
    assert!(matches!(err, RigError::Parse(_)));
}

// ============================================================================
// Skins
// ============================================================================

#[test]
fn test_hat_slot_empty_until_skin_equipped() {
    let mut skeleton = Skeleton::new(critter());
    assert!(skeleton.find_slot("Hat_Base").unwrap().attachment().is_none());

    assert!(skeleton.set_skin(CAP_SKIN));
    skeleton.set_slots_to_setup_pose();

    let hat = skeleton.find_slot("Hat_Base").unwrap().attachment().unwrap();
    assert_eq!(hat.region().unwrap().page, "skeleton_2.png");
    // Default-skin attachments stay reachable under a hat skin
    assert_eq!(
        skeleton.find_slot("Head").unwrap().attachment_name(),
        Some("Head")
    );
}

#[test]
fn test_find_attachment_in_any_skin_prefers_default() {
    let data = critter();
    let hat = data.find_attachment_in_any_skin("Hat_Base", "Hat_Base").unwrap();
    assert_eq!(hat.region().unwrap().name, "Hats/Baseball Cap");

    let head = data.find_attachment_in_any_skin("Head", "HeadShader").unwrap();
    assert!(matches!(head.as_ref(), Attachment::Region(_)));
}

// ============================================================================
// Pose
// ============================================================================

#[test]
fn test_weighted_mesh_blends_bones() {
    let mut skeleton = Skeleton::new(critter());
    assert!(skeleton.set_attachment("Torso", Some("TorsoShader")));
    let slot = skeleton.find_slot("Torso").unwrap();
    let Some(Attachment::Mesh(mesh)) = slot.attachment().map(|a| a.as_ref()) else {
        panic!("TorsoShader should be a mesh");
    };

    let mut out = Vec::new();
    mesh.vertices
        .compute_world_vertices(&skeleton, slot.bone, &mut out);
    assert_eq!(out.len(), 4);
    assert!((out[1] - Vec2::new(-10.0, 30.0)).length() < 1e-4);
    assert!((out[0] - Vec2::new(-10.0, 10.0)).length() < 1e-4);
}

#[test]
fn test_idle_clip_moves_torso() {
    let data = critter();
    let mut skeleton = Skeleton::new(data.clone());
    let mut state = AnimationState::new(data);
    state.set_animation(0, "Idle/Idle", true).unwrap();

    state.update(0.6666667);
    state.apply(&mut skeleton);
    skeleton.update_world_transform();

    let torso = skeleton.find_bone("torso").unwrap();
    assert!((torso.world.translation.y - 21.5).abs() < 1e-4);

    // Looping wraps back to the setup pose at the clip boundary
    state.update(0.6666667);
    state.apply(&mut skeleton);
    skeleton.update_world_transform();
    let torso = skeleton.find_bone("torso").unwrap();
    assert!((torso.world.translation.y - 20.0).abs() < 1e-3);
}

#[test]
fn test_blink_keys_lid_attachment() {
    let data = critter();
    let mut skeleton = Skeleton::new(data.clone());
    let mut state = AnimationState::new(data);
    let blink = state.set_animation(1, "Eyes/Blink", false).unwrap();

    state.update(0.1);
    state.apply(&mut skeleton);
    assert_eq!(
        skeleton.find_slot("L_Lid").unwrap().attachment_name(),
        Some("L_Lid")
    );

    state.update(0.15);
    state.apply(&mut skeleton);
    assert!(skeleton.find_slot("L_Lid").unwrap().attachment().is_none());
    assert!(state.is_entry_complete(1, blink));
}
