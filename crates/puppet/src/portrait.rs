//! Conversation portrait: an emotion loop with a mouth overlay
//!
//! Track 0 loops the emotion clip, track 1 holds the closed mouth while the
//! character is silent, track 2 plays the one-shot flip pose.

use std::fmt;
use std::rc::Rc;
use std::str::FromStr;
use std::sync::Arc;

use puppet_render::{FrameStats, RenderContext, RendererConfig, SkeletonMesh, TextureResolver};
use puppet_rig::{AnimationState, AnimationTracks, Skeleton, SkeletonData};

pub const EMOTION_TRACK: usize = 0;
pub const MOUTH_TRACK: usize = 1;
pub const FLIP_TRACK: usize = 2;

pub const FLIP_ANIMATION: &str = "Position/FlipX";

/// Padding added around the requested portrait size.
const PORTRAIT_PADDING: u32 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Emotion {
    #[default]
    Neutral,
    Angry,
    Fearful,
    Happy,
    Sad,
    Disgusted,
}

impl Emotion {
    pub fn animation(self) -> &'static str {
        match self {
            Self::Neutral => "Neutral",
            Self::Angry => "Angry",
            Self::Fearful => "Fearful",
            Self::Happy => "Happy",
            Self::Sad => "Sad",
            Self::Disgusted => "Disgusted",
        }
    }

    /// Closed-mouth clip shown while not talking.
    pub fn mouth_animation(self) -> &'static str {
        match self {
            Self::Neutral => "Mouth/NeutralMouth",
            Self::Angry => "Mouth/AngryMouth",
            Self::Fearful => "Mouth/FearfulMouth",
            Self::Happy => "Mouth/HappyMouth",
            Self::Sad => "Mouth/SadMouth",
            Self::Disgusted => "Mouth/DisgustedMouth",
        }
    }
}

impl FromStr for Emotion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "neutral" => Ok(Self::Neutral),
            "angry" => Ok(Self::Angry),
            "fearful" => Ok(Self::Fearful),
            "happy" => Ok(Self::Happy),
            "sad" => Ok(Self::Sad),
            "disgusted" => Ok(Self::Disgusted),
            other => Err(format!("unknown emotion '{}'", other)),
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.animation())
    }
}

/// Expression state requested by the conversation UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Expression {
    pub emotion: Emotion,
    pub talking: bool,
    pub flipped: bool,
}

pub struct PortraitController {
    skeleton: Skeleton,
    state: AnimationState,
    mesh: SkeletonMesh,
    expression: Expression,
    size: u32,
}

impl PortraitController {
    pub fn new(
        data: Arc<SkeletonData>,
        resolver: Rc<dyn TextureResolver>,
        config: RendererConfig,
        expression: Expression,
        size: u32,
    ) -> Self {
        let mut skeleton = Skeleton::new(data.clone());
        skeleton.set_to_setup_pose();
        skeleton.update_world_transform();
        let mesh = SkeletonMesh::new(&skeleton, resolver, config);

        let mut portrait = Self {
            skeleton,
            state: AnimationState::new(data),
            mesh,
            expression,
            size,
        };
        portrait.set_expression(expression);
        portrait.skeleton.update_world_transform();
        portrait
    }

    /// Switch emotion, mouth and facing. Missing clips are logged and skipped.
    pub fn set_expression(&mut self, expression: Expression) {
        log::debug!("Portrait expression: {:?}", expression);
        let data = self.state.data().clone();
        let emotion = expression.emotion.animation();

        if data.find_animation(emotion).is_some() {
            self.state.set_animation(EMOTION_TRACK, emotion, true);
        } else if let Some(first) = data.animations.first() {
            log::warn!(
                "Emotion '{}' missing from '{}', using '{}'",
                emotion,
                data.name,
                first.name
            );
            self.state.set_animation(EMOTION_TRACK, &first.name, true);
        } else {
            log::warn!("Portrait '{}' has no animations", data.name);
        }

        if expression.talking {
            // The emotion clip animates the mouth itself
            self.state.clear_track(MOUTH_TRACK);
        } else {
            let mouth = expression.emotion.mouth_animation();
            if data.find_animation(mouth).is_some() {
                self.state.set_animation(MOUTH_TRACK, mouth, true);
            } else {
                log::warn!("Closed mouth '{}' missing from '{}'", mouth, data.name);
                self.state.clear_track(MOUTH_TRACK);
            }
        }

        if !expression.flipped {
            self.state.clear_track(FLIP_TRACK);
        } else if data.find_animation(FLIP_ANIMATION).is_some() {
            self.state.set_animation(FLIP_TRACK, FLIP_ANIMATION, false);
        } else {
            log::warn!("Flip clip '{}' missing from '{}'", FLIP_ANIMATION, data.name);
        }

        self.expression = expression;
    }

    pub fn update(&mut self, dt: f32) {
        self.state.update(dt);
        self.state.apply(&mut self.skeleton);
        self.skeleton.update_world_transform();
    }

    pub fn refresh(&mut self, ctx: &mut RenderContext) -> FrameStats {
        self.mesh.refresh(&self.skeleton, ctx)
    }

    /// Display size `(width, height)`: portraits are a quarter taller than wide.
    pub fn size(&self) -> (u32, u32) {
        let height = (self.size as f32 * 1.25).round() as u32;
        (self.size + PORTRAIT_PADDING, height + PORTRAIT_PADDING)
    }

    pub fn expression(&self) -> Expression {
        self.expression
    }

    pub fn skeleton(&self) -> &Skeleton {
        &self.skeleton
    }

    pub fn state(&self) -> &AnimationState {
        &self.state
    }

    pub fn mesh(&self) -> &SkeletonMesh {
        &self.mesh
    }
}
