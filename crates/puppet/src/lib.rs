//! Puppet character controller and demo plumbing
//!
//! Ties the rig, renderer and idle driver together:
//! - [`controller`]: one animated, drawable character
//! - [`wardrobe`]: cosmetic catalog and outfit application
//! - [`config`]: layered configuration
//! - [`pages`]: atlas page loading and PNG capture
//! - [`portrait`]: emotion-driven conversation portraits

pub mod config;
pub mod controller;
pub mod pages;
pub mod portrait;
pub mod wardrobe;

pub use config::{CaptureConfig, CharacterConfig, PuppetConfig, SimulationConfig};
pub use controller::CharacterController;
pub use portrait::{Emotion, Expression, PortraitController};
pub use wardrobe::{Catalog, CosmeticItem, CosmeticSocket, Equipped, HairStyle, Outfit, Wardrobe};

use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use puppet_render::TextureResolver;
use puppet_rig::SkeletonData;

/// Catalog used when no catalog file is configured.
pub const DEFAULT_CATALOG: &str = include_str!("../../../assets/cosmetics/catalog.ron");

fn read(path: &str, what: &str) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {} {}", what, path))
}

pub fn load_catalog(path: Option<&str>) -> Result<Catalog> {
    match path {
        Some(path) => Catalog::from_ron_str(&read(path, "catalog")?),
        None => Catalog::from_ron_str(DEFAULT_CATALOG),
    }
}

/// Build a character from configuration: rig, pages, catalog and outfit.
pub fn load_character(config: &PuppetConfig) -> Result<CharacterController> {
    let character = &config.character;
    let source = read(&character.rig, "rig")?;
    let data = SkeletonData::from_ron_str(&source)
        .with_context(|| format!("Failed to load rig {}", character.rig))?;

    let pages = match &character.pages {
        Some(dir) => pages::load_pages(Path::new(dir))?,
        None => {
            log::info!("No page directory configured, using placeholder pages");
            pages::placeholder_pages(&data, &config.renderer.default_page)
        }
    };
    let resolver: Rc<dyn TextureResolver> = Rc::new(pages);

    let catalog = load_catalog(character.catalog.as_deref())?;
    let wardrobe = Wardrobe::new(catalog, config.cosmetics.clone()).with_masks(resolver.clone());
    let mut controller = CharacterController::new(data, resolver, wardrobe, config);

    if let Some(path) = &character.outfit {
        let outfit = Outfit::from_ron_str(&read(path, "outfit")?)?;
        log::info!("Equipping outfit '{}'", outfit.name);
        controller.apply_outfit(Some(outfit));
    }
    Ok(controller)
}
