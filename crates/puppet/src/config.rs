//! Puppet configuration with layered loading
//!
//! Configuration is loaded from multiple sources (lowest to highest priority):
//! 1. Compiled defaults
//! 2. `puppet.ron` file (if exists), or an explicit file passed on the CLI
//! 3. Environment variables prefixed with `PUPPET_`
//!
//! Example environment variable: `PUPPET_IDLE__GLANCE_EPISODE_WEIGHT=0.5`

use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use puppet_idle::IdleConfig;
use puppet_render::{CosmeticsConfig, RendererConfig};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PuppetConfig {
    #[serde(default)]
    pub character: CharacterConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,

    #[serde(default)]
    pub capture: CaptureConfig,

    #[serde(default)]
    pub idle: IdleConfig,

    #[serde(default)]
    pub renderer: RendererConfig,

    #[serde(default)]
    pub cosmetics: CosmeticsConfig,
}

/// Which rig to load and how to dress it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterConfig {
    /// RON rig file
    pub rig: String,
    /// Directory holding atlas pages; placeholders are generated when unset
    pub pages: Option<String>,
    /// Cosmetic catalog file; the bundled catalog is used when unset
    pub catalog: Option<String>,
    pub outfit: Option<String>,
    /// Clip played on the primary track at startup
    pub animation: String,
    /// Bone whose setup position marks the character's feet
    pub character_bone: String,
}

impl Default for CharacterConfig {
    fn default() -> Self {
        Self {
            rig: "assets/rigs/critter.ron".to_string(),
            pages: None,
            catalog: None,
            outfit: None,
            animation: "Idle/Idle".to_string(),
            character_bone: "Character".to_string(),
        }
    }
}

/// Headless frame loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub frames: u32,
    pub fps: f32,
    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,
    /// Log frame statistics every N frames (0 disables)
    pub log_every: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            frames: 300,
            fps: 30.0,
            seed: None,
            log_every: 30,
        }
    }
}

/// Offscreen capture of the last frame
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub width: u32,
    pub height: u32,
    pub pixels_per_unit: f32,
    /// PNG written after the last frame
    pub output: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 256,
            height: 256,
            pixels_per_unit: 2.0,
            output: "puppet.png".to_string(),
        }
    }
}

impl PuppetConfig {
    /// Load configuration with layered priority:
    /// 1. Compiled defaults (lowest priority)
    /// 2. `puppet.ron` file (if exists)
    /// 3. Environment variables prefixed with `PUPPET_` (highest priority)
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Like [`load`](Self::load), but `path` replaces `puppet.ron` and must exist.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) => File::from(path).format(config::FileFormat::Ron).required(true),
            None => File::with_name("puppet")
                .format(config::FileFormat::Ron)
                .required(false),
        };

        let builder = Config::builder()
            // Layer 1: Compiled defaults
            .set_default("character.rig", "assets/rigs/critter.ron")?
            .set_default("character.animation", "Idle/Idle")?
            .set_default("character.character_bone", "Character")?
            .set_default("simulation.frames", 300_i64)?
            .set_default("simulation.fps", 30.0)?
            .set_default("simulation.log_every", 30_i64)?
            .set_default("capture.width", 256_i64)?
            .set_default("capture.height", 256_i64)?
            .set_default("capture.pixels_per_unit", 2.0)?
            .set_default("capture.output", "puppet.png")?
            // Layer 2: Config file
            .add_source(file)
            // Layer 3: Environment variables (PUPPET_SIMULATION__FPS, etc.)
            .add_source(Environment::with_prefix("PUPPET").separator("__"));

        let config = builder.build().context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Seconds per simulated frame.
    pub fn frame_dt(&self) -> f32 {
        if self.simulation.fps > 0.0 {
            1.0 / self.simulation.fps
        } else {
            log::warn!("Non-positive fps {}, using 30", self.simulation.fps);
            1.0 / 30.0
        }
    }
}
